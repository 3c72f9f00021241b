use super::{invalid, nest};
use crate::{RelaxError, SourceMap};
use relaxng_syntax::tree::{NodeId, Tree};

/// Merges the `start` components of each grammar, and its `define` components of the same name,
/// according to their `combine` attributes
pub fn combine_components(tree: &mut Tree, sources: &SourceMap) -> Result<(), RelaxError> {
    let root = tree.root();
    for el in tree.descendant_elements(root) {
        if tree.is(el, "grammar") {
            combine_grammar(tree, sources, el)?;
        }
    }
    Ok(())
}

fn combine_grammar(tree: &mut Tree, sources: &SourceMap, grammar: NodeId) -> Result<(), RelaxError> {
    // `None` is the start component
    let mut components: Vec<(Option<String>, Vec<NodeId>)> = vec![];
    for c in tree.element_children(grammar) {
        let key = match tree.name(c) {
            "start" => None,
            "define" => match tree.attribute(c, "name") {
                Some(name) => Some(name.to_string()),
                None => {
                    return Err(invalid(
                        tree,
                        sources,
                        c,
                        "'define' requires a 'name' attribute".to_string(),
                    ))
                }
            },
            _ => continue,
        };
        match components.iter_mut().find(|(k, _)| *k == key) {
            Some((_, nodes)) => nodes.push(c),
            None => components.push((key, vec![c])),
        }
    }
    if !components.iter().any(|(k, _)| k.is_none()) {
        return Err(RelaxError::StartRuleNotDefined {
            span: sources.span_of(tree, grammar),
        });
    }
    for (key, nodes) in components {
        let name = key.unwrap_or_else(|| "start".to_string());
        let combine = combine_rule(tree, sources, &name, &nodes)?;
        for n in &nodes {
            tree.remove_attribute(*n, "combine");
        }
        let kind = match combine {
            Some(kind) => kind,
            None => continue,
        };
        let first = nodes[0];
        let mut items = vec![];
        for n in &nodes {
            items.extend(tree.element_children(*n));
        }
        for n in &nodes[1..] {
            tree.detach(*n);
        }
        if let Some(combined) = nest(tree, &kind, first, items) {
            tree.append_child(first, combined);
        }
    }
    Ok(())
}

/// The single combine method used by the given components, or `None` if there is only one
fn combine_rule(
    tree: &Tree,
    sources: &SourceMap,
    name: &str,
    nodes: &[NodeId],
) -> Result<Option<String>, RelaxError> {
    let mut original: Option<NodeId> = None;
    let mut rule: Option<(String, NodeId)> = None;
    for n in nodes {
        match tree.attribute(*n, "combine") {
            None => {
                if let Some(o) = original {
                    return Err(RelaxError::DuplicateDefinition {
                        name: name.to_string(),
                        duplicate: sources.span_of(tree, *n),
                        original: sources.span_of(tree, o),
                    });
                }
                original = Some(*n);
            }
            Some(c) if c == "choice" || c == "interleave" => match &rule {
                Some((existing, that)) if existing != c => {
                    return Err(RelaxError::DefineRulesMixesChoiceAndInterleave {
                        name: name.to_string(),
                        this_span: sources.span_of(tree, *n),
                        that_span: sources.span_of(tree, *that),
                    })
                }
                Some(_) => (),
                None => rule = Some((c.to_string(), *n)),
            },
            Some(c) => {
                return Err(invalid(
                    tree,
                    sources,
                    *n,
                    format!("invalid combine method {:?}", c),
                ))
            }
        }
    }
    if nodes.len() < 2 {
        return Ok(None);
    }
    match rule {
        Some((kind, _)) => Ok(Some(kind)),
        // two components, neither with a combine attribute, were reported above
        None => Ok(None),
    }
}
