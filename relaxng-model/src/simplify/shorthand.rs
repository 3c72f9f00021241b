use super::{invalid, nest};
use crate::{RelaxError, SourceMap};
use relaxng_syntax::tree::{NodeId, Tree};

const XMLNS_URI: &str = "http://www.w3.org/2000/xmlns";

/// Reduces every pattern to the binary forms used by the later steps, expanding `mixed`,
/// `optional` and `zeroOrMore` and checking the restrictions on name classes
pub fn expand(tree: &mut Tree, sources: &SourceMap) -> Result<(), RelaxError> {
    let root = tree.root();
    visit(tree, sources, root)
}

fn visit(tree: &mut Tree, sources: &SourceMap, el: NodeId) -> Result<(), RelaxError> {
    for c in tree.element_children(el) {
        visit(tree, sources, c)?;
    }
    let name = tree.name(el).to_string();
    match name.as_str() {
        "define" | "oneOrMore" | "zeroOrMore" | "optional" | "list" | "mixed" => {
            let children = tree.element_children(el);
            if children.is_empty() {
                return Err(invalid(
                    tree,
                    sources,
                    el,
                    format!("'{}' requires at least one pattern", name),
                ));
            }
            group_children(tree, sources, el, children)?;
            match name.as_str() {
                "mixed" => {
                    tree.rename(el, "interleave");
                    let text = tree.new_element_like("text", el);
                    tree.append_child(el, text);
                }
                "optional" => {
                    tree.rename(el, "choice");
                    let empty = tree.new_element_like("empty", el);
                    tree.append_child(el, empty);
                }
                "zeroOrMore" => {
                    tree.rename(el, "choice");
                    if let Some(child) = tree.first_element_child(el) {
                        tree.wrap(child, "oneOrMore");
                    }
                    let empty = tree.new_element_like("empty", el);
                    tree.append_child(el, empty);
                }
                _ => (),
            }
        }
        "element" => {
            let children = tree.element_children(el);
            if children.len() < 2 {
                return Err(invalid(
                    tree,
                    sources,
                    el,
                    "'element' requires a name class and at least one pattern".to_string(),
                ));
            }
            group_children(tree, sources, el, children[1..].to_vec())?;
        }
        "attribute" => {
            let children = tree.element_children(el);
            match children.len() {
                0 => {
                    return Err(invalid(
                        tree,
                        sources,
                        el,
                        "'attribute' requires a name class".to_string(),
                    ))
                }
                1 => {
                    let text = tree.new_element_like("text", el);
                    tree.append_child(el, text);
                }
                2 => (),
                _ => {
                    return Err(invalid(
                        tree,
                        sources,
                        el,
                        "'attribute' may contain only one pattern".to_string(),
                    ))
                }
            }
            check_attribute_name(tree, sources, children[0])?;
        }
        "except" => {
            let children = tree.element_children(el);
            if children.is_empty() {
                return Err(invalid(
                    tree,
                    sources,
                    el,
                    "'except' requires at least one child".to_string(),
                ));
            }
            if children.len() > 1 {
                let choice = tree.new_element_like("choice", el);
                for c in children {
                    tree.append_child(choice, c);
                }
                binarize(tree, sources, choice)?;
                tree.append_child(el, choice);
            }
        }
        "choice" | "group" | "interleave" => binarize(tree, sources, el)?,
        "anyName" => check_except(tree, sources, el, &["anyName"])?,
        "nsName" => check_except(tree, sources, el, &["anyName", "nsName"])?,
        _ => (),
    }
    Ok(())
}

/// Moves `children` of `el` into a binary `group`, unless there is only one
fn group_children(
    tree: &mut Tree,
    sources: &SourceMap,
    el: NodeId,
    children: Vec<NodeId>,
) -> Result<(), RelaxError> {
    if children.len() < 2 {
        return Ok(());
    }
    let group = tree.new_element_like("group", el);
    for c in children {
        tree.append_child(group, c);
    }
    binarize(tree, sources, group)?;
    tree.append_child(el, group);
    Ok(())
}

fn binarize(tree: &mut Tree, sources: &SourceMap, el: NodeId) -> Result<(), RelaxError> {
    let mut children = tree.element_children(el);
    match children.len() {
        0 => {
            let message = format!("'{}' requires at least one child", tree.name(el));
            Err(invalid(tree, sources, el, message))
        }
        1 => {
            tree.replace(el, children[0]);
            Ok(())
        }
        2 => Ok(()),
        _ => {
            let last = children.pop();
            let name = tree.name(el).to_string();
            if let Some(head) = nest(tree, &name, el, children) {
                tree.insert_child(el, 0, head);
            }
            if let Some(last) = last {
                tree.append_child(el, last);
            }
            Ok(())
        }
    }
}

/// `anyName` may not exclude an `anyName`, nor `nsName` an `nsName` or `anyName`
fn check_except(
    tree: &Tree,
    sources: &SourceMap,
    el: NodeId,
    forbidden: &[&str],
) -> Result<(), RelaxError> {
    let except = match tree.element_children(el).into_iter().find(|c| tree.is(*c, "except")) {
        Some(e) => e,
        None => return Ok(()),
    };
    for d in tree.descendant_elements(except) {
        let name = tree.name(d);
        if forbidden.contains(&name) {
            return Err(invalid(
                tree,
                sources,
                d,
                format!("'{}' is not allowed in the except of '{}'", name, tree.name(el)),
            ));
        }
    }
    Ok(())
}

fn check_attribute_name(
    tree: &Tree,
    sources: &SourceMap,
    name_class: NodeId,
) -> Result<(), RelaxError> {
    for d in tree.descendant_elements(name_class) {
        let ns = tree.attribute(d, "ns").unwrap_or("");
        match tree.name(d) {
            "name" if ns.is_empty() && tree.text_content(d) == "xmlns" => {
                return Err(invalid(
                    tree,
                    sources,
                    d,
                    "an attribute may not be named 'xmlns'".to_string(),
                ))
            }
            "name" | "nsName" if ns == XMLNS_URI => {
                return Err(invalid(
                    tree,
                    sources,
                    d,
                    format!("an attribute may not be in the '{}' namespace", XMLNS_URI),
                ))
            }
            _ => (),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use relaxng_syntax::tree::FileId;
    use relaxng_syntax::xml;

    fn apply(text: &str) -> Result<String, RelaxError> {
        let mut tree = xml::parse(FileId(0), text).unwrap();
        expand(&mut tree, &SourceMap::default())?;
        Ok(tree.to_xml_string(tree.root()))
    }

    #[test]
    fn left_nested() {
        assert_eq!(
            apply(r#"<choice xmlns="http://relaxng.org/ns/structure/1.0"><text/><empty/><notAllowed/></choice>"#)
                .unwrap(),
            r#"<choice xmlns="http://relaxng.org/ns/structure/1.0"><choice><text/><empty/></choice><notAllowed/></choice>"#
        );
    }

    #[test]
    fn single_child_replaced() {
        assert_eq!(
            apply(r#"<list xmlns="http://relaxng.org/ns/structure/1.0"><group><text/></group></list>"#)
                .unwrap(),
            r#"<list xmlns="http://relaxng.org/ns/structure/1.0"><text/></list>"#
        );
    }

    #[test]
    fn mixed_and_element_bodies() {
        assert_eq!(
            apply(r#"<element xmlns="http://relaxng.org/ns/structure/1.0"><name ns="">a</name><mixed><empty/><text/></mixed><empty/></element>"#)
                .unwrap(),
            r#"<element xmlns="http://relaxng.org/ns/structure/1.0"><name ns="">a</name><group><interleave><group><empty/><text/></group><text/></interleave><empty/></group></element>"#
        );
    }

    #[test]
    fn except_restrictions() {
        assert_matches!(
            apply(r#"<anyName xmlns="http://relaxng.org/ns/structure/1.0"><except><anyName/></except></anyName>"#),
            Err(RelaxError::InvalidSchema { .. })
        );
        assert_matches!(
            apply(r#"<nsName ns="a" xmlns="http://relaxng.org/ns/structure/1.0"><except><nsName ns="b"/></except></nsName>"#),
            Err(RelaxError::InvalidSchema { .. })
        );
        assert_matches!(
            apply(r#"<anyName xmlns="http://relaxng.org/ns/structure/1.0"><except><nsName ns="b"/></except></anyName>"#),
            Ok(_)
        );
    }

    #[test]
    fn xmlns_attribute() {
        assert_matches!(
            apply(r#"<attribute xmlns="http://relaxng.org/ns/structure/1.0"><name ns="">xmlns</name></attribute>"#),
            Err(RelaxError::InvalidSchema { ref message, .. }) if message.contains("xmlns")
        );
    }
}
