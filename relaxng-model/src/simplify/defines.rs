use crate::{RelaxError, SourceMap};
use relaxng_syntax::tree::{NodeId, Tree};
use std::collections::{HashMap, HashSet, VecDeque};

/// Gives every `element` a `define` of its own, and inlines references to all other definitions
pub fn isolate_elements(tree: &mut Tree, sources: &SourceMap) -> Result<(), RelaxError> {
    let root = tree.root();
    let mut taken: HashSet<String> = defines(tree, root)
        .into_iter()
        .filter_map(|d| tree.attribute(d, "name").map(|n| n.to_string()))
        .collect();
    let mut counter = 0;
    for el in tree.descendant_elements(root) {
        if !tree.is(el, "element") || is_sole_define_content(tree, el) {
            continue;
        }
        let local = tree
            .first_element_child(el)
            .filter(|c| tree.is(*c, "name"))
            .map(|c| tree.text_content(c))
            .unwrap_or_else(|| "anon".to_string());
        let name = loop {
            let candidate = format!("__{}-elt-{}", local, counter);
            counter += 1;
            if !taken.contains(&candidate) {
                break candidate;
            }
        };
        taken.insert(name.clone());
        let reference = tree.new_element_like("ref", el);
        tree.set_attribute(reference, "name", &name);
        tree.replace(el, reference);
        let define = tree.new_element_like("define", el);
        tree.set_attribute(define, "name", &name);
        tree.append_child(define, el);
        tree.append_child(root, define);
    }

    let by_name: HashMap<String, NodeId> = defines(tree, root)
        .into_iter()
        .filter_map(|d| tree.attribute(d, "name").map(|n| (n.to_string(), d)))
        .collect();
    let mut stack = vec![];
    for c in tree.element_children(root) {
        if tree.is(c, "start") || is_element_define(tree, c) {
            inline_refs(tree, sources, c, &by_name, &mut stack)?;
        }
    }
    for d in defines(tree, root) {
        if !is_element_define(tree, d) {
            tree.detach(d);
        }
    }
    Ok(())
}

fn inline_refs(
    tree: &mut Tree,
    sources: &SourceMap,
    el: NodeId,
    by_name: &HashMap<String, NodeId>,
    stack: &mut Vec<String>,
) -> Result<(), RelaxError> {
    if tree.is(el, "ref") {
        let name = tree.attribute(el, "name").unwrap_or_default().to_string();
        let define = match by_name.get(&name) {
            Some(d) => *d,
            None => {
                return Err(RelaxError::UndefinedReference {
                    span: sources.span_of(tree, el),
                    identifier: name,
                })
            }
        };
        if is_element_define(tree, define) {
            return Ok(());
        }
        if stack.contains(&name) {
            return Err(RelaxError::RecursiveReference {
                ref_id: name,
                ref_span: sources.span_of(tree, el),
                def_span: sources.span_of(tree, define),
            });
        }
        let content = match tree.first_element_child(define) {
            Some(c) => c,
            None => return Ok(()),
        };
        let copy = tree.deep_copy(content);
        tree.replace(el, copy);
        stack.push(name);
        let result = inline_refs(tree, sources, copy, by_name, stack);
        stack.pop();
        return result;
    }
    for c in tree.element_children(el) {
        inline_refs(tree, sources, c, by_name, stack)?;
    }
    Ok(())
}

/// Removes the definitions that cannot be reached from `start`
pub fn remove_unreferenced(tree: &mut Tree) {
    let root = tree.root();
    let all = defines(tree, root);
    let by_name: HashMap<String, NodeId> = all
        .iter()
        .filter_map(|d| tree.attribute(*d, "name").map(|n| (n.to_string(), *d)))
        .collect();
    let mut reached: HashSet<NodeId> = HashSet::new();
    let mut queue: VecDeque<NodeId> = tree
        .element_children(root)
        .into_iter()
        .filter(|c| tree.is(*c, "start"))
        .collect();
    while let Some(next) = queue.pop_front() {
        for d in tree.descendant_elements(next) {
            if !tree.is(d, "ref") {
                continue;
            }
            if let Some(target) = tree.attribute(d, "name").and_then(|n| by_name.get(n)) {
                if reached.insert(*target) {
                    queue.push_back(*target);
                }
            }
        }
    }
    for d in all {
        if !reached.contains(&d) {
            tree.detach(d);
        }
    }
}

fn defines(tree: &Tree, root: NodeId) -> Vec<NodeId> {
    tree.element_children(root)
        .into_iter()
        .filter(|c| tree.is(*c, "define"))
        .collect()
}

fn is_sole_define_content(tree: &Tree, el: NodeId) -> bool {
    match tree.parent(el) {
        Some(p) => tree.is(p, "define") && tree.element_children(p).len() == 1,
        None => false,
    }
}

fn is_element_define(tree: &Tree, define: NodeId) -> bool {
    if !tree.is(define, "define") {
        return false;
    }
    let children = tree.element_children(define);
    children.len() == 1 && tree.is(children[0], "element")
}
