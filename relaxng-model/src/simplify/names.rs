use crate::{RelaxError, SourceMap};
use relaxng_syntax::tree::{NodeId, Tree};
use relaxng_syntax::xml::XML_NS;

/// Turns `name` attributes of `element` and `attribute` into `name` children, gives every
/// `name`, `nsName` and `value` an explicit `ns`, and resolves prefixed names
pub fn expand_names(tree: &mut Tree, sources: &SourceMap) -> Result<(), RelaxError> {
    let root = tree.root();
    visit(tree, sources, root, "")
}

fn visit(
    tree: &mut Tree,
    sources: &SourceMap,
    el: NodeId,
    inherited: &str,
) -> Result<(), RelaxError> {
    let name = tree.name(el).to_string();
    let own_ns = tree.attribute(el, "ns").map(|ns| ns.to_string());
    let current = own_ns.clone().unwrap_or_else(|| inherited.to_string());

    if name == "element" || name == "attribute" {
        if let Some(qname) = tree.remove_attribute(el, "name") {
            let name_el = tree.new_element_like("name", el);
            let location = tree.location(el).cloned();
            let text = tree.new_text(&qname, location);
            tree.append_child(name_el, text);
            // unlike elements, attributes do not inherit the default namespace
            if name == "attribute" && own_ns.is_none() {
                tree.set_attribute(name_el, "ns", "");
            }
            tree.insert_child(el, 0, name_el);
        }
    }

    match name.as_str() {
        "name" | "nsName" | "value" => {
            if own_ns.is_none() {
                tree.set_attribute(el, "ns", &current);
            }
            if name == "name" {
                resolve_prefix(tree, sources, el)?;
            }
        }
        _ => {
            tree.remove_attribute(el, "ns");
        }
    }

    for c in tree.element_children(el) {
        visit(tree, sources, c, &current)?;
    }
    Ok(())
}

fn resolve_prefix(tree: &mut Tree, sources: &SourceMap, el: NodeId) -> Result<(), RelaxError> {
    let text = tree.text_content(el);
    let pos = match text.find(':') {
        Some(pos) => pos,
        None => return Ok(()),
    };
    let prefix = &text[..pos];
    let local = text[pos + 1..].to_string();
    let uri = if prefix == "xml" {
        Some(XML_NS.to_string())
    } else {
        tree.element(el)
            .namespaces
            .iter()
            .rev()
            .find(|ns| ns.prefix.as_deref() == Some(prefix))
            .map(|ns| ns.uri.clone())
    };
    match uri {
        Some(uri) => {
            tree.set_attribute(el, "ns", &uri);
            tree.set_text_content(el, &local);
            Ok(())
        }
        None => Err(RelaxError::UndefinedNamespacePrefix {
            span: sources.span_of(tree, el),
            prefix: prefix.to_string(),
        }),
    }
}
