use super::invalid;
use crate::{RelaxError, SourceMap};
use relaxng_syntax::tree::{NodeId, Tree};
use std::collections::{HashMap, HashSet};

/// Leaves a single top-level grammar holding every definition, with nested grammars replaced by
/// their start patterns and `parentRef` replaced by `ref`
pub fn flatten_grammars(tree: &mut Tree, sources: &SourceMap) -> Result<(), RelaxError> {
    let root = tree.root();
    if !tree.is(root, "grammar") {
        let grammar = tree.new_element_like("grammar", root);
        let start = tree.new_element_like("start", root);
        tree.replace(root, grammar);
        tree.append_child(grammar, start);
        tree.append_child(start, root);
    }
    let root = tree.root();

    let all = tree.descendant_elements(root);
    let grammars: Vec<NodeId> = all
        .iter()
        .copied()
        .filter(|e| tree.is(*e, "grammar"))
        .collect();
    let ids: HashMap<NodeId, usize> = grammars.iter().enumerate().map(|(i, g)| (*g, i)).collect();
    let mut defined: HashMap<NodeId, HashSet<String>> = HashMap::new();
    for g in &grammars {
        let names = tree
            .element_children(*g)
            .into_iter()
            .filter(|c| tree.is(*c, "define"))
            .filter_map(|c| tree.attribute(c, "name").map(|n| n.to_string()))
            .collect();
        defined.insert(*g, names);
    }
    // names only need qualifying when there is more than one scope, which keeps the step a
    // no-op on already simplified schemas
    let rename = grammars.len() > 1;

    for el in all {
        let kind = tree.name(el).to_string();
        let is_parent_ref = match kind.as_str() {
            "ref" => false,
            "parentRef" => true,
            "define" => {
                let id = tree.parent(el).and_then(|g| ids.get(&g).copied());
                if let (true, Some(id)) = (rename, id) {
                    qualify(tree, el, id);
                }
                continue;
            }
            _ => continue,
        };
        let name = match tree.attribute(el, "name") {
            Some(n) => n.to_string(),
            None => {
                let message = format!("'{}' requires a 'name' attribute", kind);
                return Err(invalid(tree, sources, el, message));
            }
        };
        let own = enclosing_grammar(tree, el);
        let target = if is_parent_ref {
            match own.and_then(|g| tree.parent(g)).and_then(|p| enclosing_grammar(tree, p)) {
                Some(g) => g,
                None => return Err(RelaxError::NoParentAvailable(sources.span_of(tree, el))),
            }
        } else {
            match own {
                Some(g) => g,
                None => {
                    return Err(RelaxError::UndefinedReference {
                        span: sources.span_of(tree, el),
                        identifier: name,
                    })
                }
            }
        };
        if !defined[&target].contains(&name) {
            return Err(RelaxError::UndefinedReference {
                span: sources.span_of(tree, el),
                identifier: name,
            });
        }
        if rename {
            qualify(tree, el, ids[&target]);
        }
        if is_parent_ref {
            tree.rename(el, "ref");
        }
    }

    for g in grammars.into_iter().rev() {
        if g == root {
            continue;
        }
        let mut start = None;
        for c in tree.element_children(g) {
            if tree.is(c, "define") {
                tree.append_child(root, c);
            } else if tree.is(c, "start") {
                start = Some(c);
            }
        }
        let content = start.and_then(|s| tree.first_element_child(s));
        match content {
            Some(content) => tree.replace(g, content),
            None => {
                return Err(RelaxError::StartRuleNotDefined {
                    span: sources.span_of(tree, g),
                })
            }
        }
    }
    Ok(())
}

fn qualify(tree: &mut Tree, el: NodeId, grammar_id: usize) {
    if let Some(name) = tree.attribute(el, "name") {
        let name = format!("{}-gr-{}", name, grammar_id);
        tree.set_attribute(el, "name", &name);
    }
}

fn enclosing_grammar(tree: &Tree, el: NodeId) -> Option<NodeId> {
    tree.ancestors(el).find(|a| tree.is(*a, "grammar"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use relaxng_syntax::tree::FileId;
    use relaxng_syntax::xml;

    fn apply(text: &str) -> Result<String, RelaxError> {
        let mut tree = xml::parse(FileId(0), text).unwrap();
        flatten_grammars(&mut tree, &SourceMap::default())?;
        Ok(tree.to_xml_string(tree.root()))
    }

    #[test]
    fn single_grammar_unchanged() {
        let text = r#"<grammar xmlns="http://relaxng.org/ns/structure/1.0"><start><ref name="a"/></start><define name="a"><text/></define></grammar>"#;
        assert_eq!(apply(text).unwrap(), text);
    }

    #[test]
    fn pattern_root_wrapped() {
        assert_eq!(
            apply(r#"<text xmlns="http://relaxng.org/ns/structure/1.0"/>"#).unwrap(),
            r#"<grammar xmlns="http://relaxng.org/ns/structure/1.0"><start><text/></start></grammar>"#
        );
    }

    #[test]
    fn same_name_in_two_scopes() {
        let out = apply(
            r#"<grammar xmlns="http://relaxng.org/ns/structure/1.0"><start><ref name="a"/></start><define name="a"><grammar><start><ref name="a"/></start><define name="a"><parentRef name="b"/></define></grammar></define><define name="b"><text/></define></grammar>"#,
        )
        .unwrap();
        assert_eq!(
            out,
            r#"<grammar xmlns="http://relaxng.org/ns/structure/1.0"><start><ref name="a-gr-0"/></start><define name="a-gr-0"><ref name="a-gr-1"/></define><define name="b-gr-0"><text/></define><define name="a-gr-1"><ref name="b-gr-0"/></define></grammar>"#
        );
    }

    #[test]
    fn dangling_ref() {
        assert_matches!(
            apply(r#"<grammar xmlns="http://relaxng.org/ns/structure/1.0"><start><ref name="nope"/></start></grammar>"#),
            Err(RelaxError::UndefinedReference { ref identifier, .. }) if identifier == "nope"
        );
    }
}
