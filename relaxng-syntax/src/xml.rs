use crate::tree::{FileId, Location, Namespace, NodeId, Tree};
use log::trace;
use roxmltree::Node;
use std::ops::Range;
use std::rc::Rc;

pub const NS: &str = "http://relaxng.org/ns/structure/1.0";
pub const ANNOTATIONS_NS: &str = "http://relaxng.org/ns/compatibility/annotations/1.0";
pub const XML_NS: &str = "http://www.w3.org/XML/1998/namespace";

pub type Span = Range<usize>;

#[derive(Debug)]
pub enum Error {
    /// Expected value was not present in the input
    Expected(Span, &'static str),
    /// An unexpected value was present in the input
    Unexpected(Span, &'static str),
    Xml(Span, String),
}

type Result<T> = std::result::Result<T, Error>;

/// Parses a schema document into a fresh tree, whose root is the document element
pub fn parse(file: FileId, text: &str) -> Result<Tree> {
    let mut tree = Tree::new();
    let root = parse_into(&mut tree, file, text)?;
    tree.set_root(root);
    Ok(tree)
}

/// Parses a schema document into the given tree, returning the (detached) element corresponding
/// to the document element.
///
/// Elements from foreign namespaces are dropped, along with any namespaced attributes other than
/// `xml:base`.  The text of `a:documentation` annotations is attached to the parent element.
pub fn parse_into(tree: &mut Tree, file: FileId, text: &str) -> Result<NodeId> {
    let doc = roxmltree::Document::parse(text).map_err(|e| {
        // roxmltree reports a row/column position, but we deal in byte offsets
        let start = offset_of(text, e.pos().row as usize, e.pos().col as usize);
        Error::Xml(start..start, e.to_string())
    })?;
    let root = doc.root_element();
    if root.tag_name().namespace() != Some(NS) {
        return Err(Error::Expected(
            root.range(),
            "Expected root element with http://relaxng.org/ns/structure/1.0 namespace",
        ));
    }
    convert(tree, file, root, None)
}

fn offset_of(text: &str, row: usize, col: usize) -> usize {
    let mut off = 0;
    for (i, line) in text.split_inclusive('\n').enumerate() {
        if i + 1 == row {
            return off
                + line
                    .char_indices()
                    .nth(col.saturating_sub(1))
                    .map(|(o, _)| o)
                    .unwrap_or(line.len());
        }
        off += line.len();
    }
    text.len()
}

fn convert(
    tree: &mut Tree,
    file: FileId,
    node: Node,
    parent_namespaces: Option<&Rc<Vec<Namespace>>>,
) -> Result<NodeId> {
    let name = node.tag_name().name();
    let allowed = allowed_attributes(name)
        .ok_or(Error::Unexpected(node.range(), "Unknown Relax NG element"))?;
    let namespaces: Vec<Namespace> = node
        .namespaces()
        .map(|ns| Namespace {
            prefix: ns.name().map(|p| p.to_string()),
            uri: ns.uri().to_string(),
        })
        .collect();
    // most elements share the bindings of their parent
    let namespaces = match parent_namespaces {
        Some(p) if **p == namespaces => p.clone(),
        _ => Rc::new(namespaces),
    };
    let id = tree.new_element_with(
        name,
        namespaces.clone(),
        Some(Location {
            file,
            range: node.range(),
        }),
    );
    for a in node.attributes() {
        match a.namespace() {
            None | Some(NS) => {
                if !allowed.contains(&a.name()) && !COMMON_ATTRIBUTES.contains(&a.name()) {
                    return Err(Error::Unexpected(node.range(), "Unexpected attribute"));
                }
                tree.set_attribute(id, a.name(), a.value());
            }
            Some(XML_NS) if a.name() == "base" => tree.set_attribute(id, "xml:base", a.value()),
            Some(_) => (),
        }
    }
    for child in node.children() {
        if child.is_element() {
            match child.tag_name().namespace() {
                Some(NS) => {
                    let c = convert(tree, file, child, Some(&namespaces))?;
                    tree.append_child(id, c);
                }
                Some(ANNOTATIONS_NS) if child.tag_name().name() == "documentation" => {
                    let doc: String = child
                        .descendants()
                        .filter(|n| n.is_text())
                        .filter_map(|n| n.text())
                        .collect();
                    let el = tree.element_mut(id);
                    match el.documentation {
                        Some(ref mut existing) => {
                            existing.push('\n');
                            existing.push_str(&doc);
                        }
                        None => el.documentation = Some(doc),
                    }
                }
                _ => trace!("dropping foreign element {:?}", child.tag_name()),
            }
        } else if child.is_text() {
            let text = child.text().unwrap_or("");
            if !TEXT_CONTENT.contains(&name) && !is_whitespace(text) {
                return Err(Error::Unexpected(child.range(), "Unexpected text"));
            }
            let t = tree.new_text(
                text,
                Some(Location {
                    file,
                    range: child.range(),
                }),
            );
            tree.append_child(id, t);
        }
    }
    Ok(id)
}

const COMMON_ATTRIBUTES: &[&str] = &["ns", "datatypeLibrary"];

/// Elements whose text content is significant
const TEXT_CONTENT: &[&str] = &["name", "value", "param"];

fn allowed_attributes(element: &str) -> Option<&'static [&'static str]> {
    Some(match element {
        "element" | "attribute" => &["name"],
        "group" | "interleave" | "choice" | "optional" | "zeroOrMore" | "oneOrMore" | "list"
        | "mixed" | "empty" | "text" | "notAllowed" | "grammar" | "div" | "except" | "name"
        | "anyName" | "nsName" => &[],
        "ref" | "parentRef" | "param" => &["name"],
        "value" | "data" => &["type"],
        "externalRef" | "include" => &["href"],
        "start" => &["combine"],
        "define" => &["name", "combine"],
        _ => return None,
    })
}

pub fn is_whitespace(text: &str) -> bool {
    text.chars().all(|c| matches!(c, ' ' | '\t' | '\r' | '\n'))
}

/// Scans schema text for `include` or `externalRef` elements, stopping at the first one found
/// without building a tree.
pub fn depends_on_external_file(text: &str) -> std::result::Result<bool, xmlparser::Error> {
    use xmlparser::{ElementEnd, Token};

    // (prefix, uri, depth at which the binding was declared)
    let mut bindings: Vec<(&str, &str, usize)> = vec![];
    let mut depth = 0;
    let mut pending: Option<(&str, &str)> = None;
    for token in xmlparser::Tokenizer::from(text) {
        match token? {
            Token::ElementStart { prefix, local, .. } => {
                pending = Some((prefix.as_str(), local.as_str()));
            }
            Token::Attribute {
                prefix,
                local,
                value,
                ..
            } => {
                if prefix.as_str() == "xmlns" {
                    bindings.push((local.as_str(), value.as_str(), depth + 1));
                } else if prefix.as_str().is_empty() && local.as_str() == "xmlns" {
                    bindings.push(("", value.as_str(), depth + 1));
                }
            }
            Token::ElementEnd { end, .. } => match end {
                ElementEnd::Open | ElementEnd::Empty => {
                    depth += 1;
                    if let Some((prefix, local)) = pending.take() {
                        let uri = bindings
                            .iter()
                            .rev()
                            .find(|(p, _, _)| *p == prefix)
                            .map(|(_, u, _)| *u);
                        if uri == Some(NS) && (local == "include" || local == "externalRef") {
                            return Ok(true);
                        }
                    }
                    if let ElementEnd::Empty = end {
                        bindings.retain(|(_, _, d)| *d != depth);
                        depth -= 1;
                    }
                }
                ElementEnd::Close(..) => {
                    bindings.retain(|(_, _, d)| *d != depth);
                    depth -= 1;
                }
            },
            _ => (),
        }
    }
    Ok(false)
}

pub fn is_nc_name(val: &str) -> bool {
    let mut chars = val.chars();
    match chars.next() {
        Some(c) if is_nc_name_start_char(c) => chars.all(is_nc_name_char),
        _ => false,
    }
}

pub fn is_nc_name_start_char(c: char) -> bool {
    matches!(c, 'A'..='Z'
        | '_'
        | 'a'..='z'
        | '\u{C0}'..='\u{D6}'
        | '\u{D8}'..='\u{F6}'
        | '\u{F8}'..='\u{2FF}'
        | '\u{370}'..='\u{37D}'
        | '\u{37F}'..='\u{1FFF}'
        | '\u{200C}'..='\u{200D}'
        | '\u{2070}'..='\u{218F}'
        | '\u{2C00}'..='\u{2FEF}'
        | '\u{3001}'..='\u{D7FF}'
        | '\u{F900}'..='\u{FDCF}'
        | '\u{FDF0}'..='\u{FFFD}'
        | '\u{10000}'..='\u{EFFFF}')
}

pub fn is_nc_name_char(c: char) -> bool {
    if is_nc_name_start_char(c) {
        true
    } else {
        matches!(c, '-'
            | '.'
            | '0'..='9'
            | '\u{B7}'
            | '\u{0300}'..='\u{036F}'
            | '\u{203F}'..='\u{2040}')
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::*;

    #[test]
    fn it_works() {
        let tree = parse(
            FileId(0),
            "<?xml version = '1.0' encoding = 'utf-8' ?>
 <element xmlns=\"http://relaxng.org/ns/structure/1.0\" name=\"library\"><text/></element>",
        )
        .unwrap();
        let root = tree.root();
        assert_eq!(tree.name(root), "element");
        assert_eq!(tree.attribute(root, "name"), Some("library"));
        assert_eq!(tree.element_children(root).len(), 1);
    }

    #[test]
    fn foreign_content_dropped() {
        let tree = parse(
            FileId(0),
            "<element xmlns='http://relaxng.org/ns/structure/1.0'
                      xmlns:a='http://relaxng.org/ns/compatibility/annotations/1.0'
                      xmlns:f='urn:foreign'
                      name='x' f:junk='1'>
                <a:documentation>An x</a:documentation>
                <f:stuff><text/></f:stuff>
                <empty/>
            </element>",
        )
        .unwrap();
        let root = tree.root();
        assert_eq!(tree.element(root).attributes.len(), 1);
        assert_eq!(tree.element(root).documentation.as_deref(), Some("An x"));
        let kids = tree.element_children(root);
        assert_eq!(kids.len(), 1);
        assert!(tree.is(kids[0], "empty"));
        let ns = &tree.element(root).namespaces;
        assert!(ns
            .iter()
            .any(|n| n.prefix.as_deref() == Some("f") && n.uri == "urn:foreign"));
    }

    #[test]
    fn wrong_root_namespace() {
        assert_matches!(
            parse(FileId(0), "<element name='x'/>"),
            Err(Error::Expected(_, _))
        );
    }

    #[test]
    fn unknown_attribute() {
        assert_matches!(
            parse(
                FileId(0),
                "<empty xmlns='http://relaxng.org/ns/structure/1.0' name='x'/>"
            ),
            Err(Error::Unexpected(_, "Unexpected attribute"))
        );
    }

    #[test]
    fn stray_text() {
        assert_matches!(
            parse(
                FileId(0),
                "<group xmlns='http://relaxng.org/ns/structure/1.0'>oops<empty/></group>"
            ),
            Err(Error::Unexpected(_, "Unexpected text"))
        );
    }

    #[test]
    fn malformed() {
        assert_matches!(
            parse(FileId(0), "<group xmlns='http://relaxng.org/ns/structure/1.0'>"),
            Err(Error::Xml(_, _))
        );
    }

    #[test]
    fn external_scan() {
        assert_eq!(
            depends_on_external_file(
                "<grammar xmlns='http://relaxng.org/ns/structure/1.0'><include href='x.rng'/></grammar>"
            )
            .unwrap(),
            true
        );
        assert_eq!(
            depends_on_external_file(
                "<r:grammar xmlns:r='http://relaxng.org/ns/structure/1.0'><r:start><r:externalRef href='x'/></r:start></r:grammar>"
            )
            .unwrap(),
            true
        );
        // an element called include in some other namespace doesn't count
        assert_eq!(
            depends_on_external_file(
                "<grammar xmlns='http://relaxng.org/ns/structure/1.0'><x:include xmlns:x='urn:x'/></grammar>"
            )
            .unwrap(),
            false
        );
        assert_eq!(
            depends_on_external_file(
                "<element xmlns='http://relaxng.org/ns/structure/1.0' name='a'><empty/></element>"
            )
            .unwrap(),
            false
        );
    }

    #[test]
    fn nc_names() {
        assert!(is_nc_name("foo-bar.baz"));
        assert!(!is_nc_name("1foo"));
        assert!(!is_nc_name("a:b"));
        assert!(!is_nc_name(""));
    }
}
