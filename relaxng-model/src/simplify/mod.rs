//! Rewrites a schema tree, in place, into the simplified form described in section 4 of the
//! Relax NG specification.
//!
//! Loading (and with it the first step, the replacement of external references) is done by
//! [`externals::load()`]; [`simplify()`] runs the remaining steps in order.  Each step relies on
//! the shape left by the ones before it.

use crate::{RelaxError, SourceMap};
use log::debug;
use relaxng_syntax::tree::{NodeId, Tree};

mod combine;
mod datatypes;
mod defines;
mod divs;
pub mod externals;
mod grammars;
mod names;
mod propagate;
mod shorthand;

pub fn simplify(tree: &mut Tree, sources: &SourceMap) -> Result<NodeId, RelaxError> {
    debug!("step 4: datatypeLibrary inheritance");
    datatypes::inherit_libraries(tree, sources)?;
    debug!("step 6: name and ns attributes");
    names::expand_names(tree, sources)?;
    debug!("step 9: div removal");
    divs::remove_divs(tree);
    debug!("step 10: shorthand expansion");
    shorthand::expand(tree, sources)?;
    debug!("step 14: start and define combination");
    combine::combine_components(tree, sources)?;
    debug!("step 15: grammar flattening");
    grammars::flatten_grammars(tree, sources)?;
    debug!("step 16: element definitions");
    defines::isolate_elements(tree, sources)?;
    debug!("step 17: notAllowed propagation");
    propagate::not_allowed(tree);
    defines::remove_unreferenced(tree);
    debug!("step 18: empty propagation");
    propagate::empty(tree);
    Ok(tree.root())
}

fn invalid(tree: &Tree, sources: &SourceMap, node: NodeId, message: String) -> RelaxError {
    RelaxError::InvalidSchema {
        span: sources.span_of(tree, node),
        message,
    }
}

/// Builds a left-nested binary tree of `name` elements over `items`, returning the single item
/// unchanged when there is only one
fn nest(tree: &mut Tree, name: &str, template: NodeId, items: Vec<NodeId>) -> Option<NodeId> {
    let mut items = items.into_iter();
    let mut acc = items.next()?;
    for item in items {
        let pair = tree.new_element_like(name, template);
        tree.append_child(pair, acc);
        tree.append_child(pair, item);
        acc = pair;
    }
    Some(acc)
}
