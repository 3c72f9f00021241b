use crate::{RelaxError, SourceMap};
use relaxng_syntax::tree::{NodeId, Tree};
use relaxng_syntax::uri;

/// `data` and `value` elements receive the `datatypeLibrary` in effect for them, and the
/// attribute is removed from everything else
pub fn inherit_libraries(tree: &mut Tree, sources: &SourceMap) -> Result<(), RelaxError> {
    let root = tree.root();
    visit(tree, sources, root, "")
}

fn visit(
    tree: &mut Tree,
    sources: &SourceMap,
    el: NodeId,
    inherited: &str,
) -> Result<(), RelaxError> {
    let own = tree.remove_attribute(el, "datatypeLibrary");
    if let Some(uri) = &own {
        uri::check_datatype_library(uri).map_err(|reason| RelaxError::InvalidDatatypeLibrary {
            span: sources.span_of(tree, el),
            uri: uri.clone(),
            reason,
        })?;
    }
    let current = own.as_deref().unwrap_or(inherited).to_string();
    let name = tree.name(el).to_string();
    match name.as_str() {
        "value" if tree.attribute(el, "type").is_none() => {
            tree.set_attribute(el, "type", "token");
            tree.set_attribute(el, "datatypeLibrary", "");
        }
        "data" | "value" => tree.set_attribute(el, "datatypeLibrary", &current),
        _ => (),
    }
    for c in tree.element_children(el) {
        visit(tree, sources, c, &current)?;
    }
    Ok(())
}
