use relaxng_syntax::tree::{NodeId, Tree};

/// Collapses patterns that can never match into `notAllowed`.  Working bottom-up means one
/// pass reaches the fixpoint.
pub fn not_allowed(tree: &mut Tree) {
    let root = tree.root();
    visit_not_allowed(tree, root);
}

fn visit_not_allowed(tree: &mut Tree, el: NodeId) {
    for c in tree.element_children(el) {
        visit_not_allowed(tree, c);
    }
    let children = tree.element_children(el);
    let not_allowed: Vec<bool> = children
        .iter()
        .map(|c| tree.is(*c, "notAllowed"))
        .collect();
    let name = tree.name(el).to_string();
    match name.as_str() {
        "attribute" | "list" | "group" | "interleave" | "oneOrMore"
            if not_allowed.contains(&true) =>
        {
            replace_with(tree, el, "notAllowed")
        }
        "choice" if children.len() == 2 => match (not_allowed[0], not_allowed[1]) {
            (true, true) => replace_with(tree, el, "notAllowed"),
            (true, false) => tree.replace(el, children[1]),
            (false, true) => tree.replace(el, children[0]),
            (false, false) => (),
        },
        "except" if not_allowed.contains(&true) => tree.detach(el),
        _ => (),
    }
}

/// Removes redundant `empty` patterns, and puts `empty` first in any `choice` containing one
pub fn empty(tree: &mut Tree) {
    let root = tree.root();
    visit_empty(tree, root);
}

fn visit_empty(tree: &mut Tree, el: NodeId) {
    for c in tree.element_children(el) {
        visit_empty(tree, c);
    }
    let children = tree.element_children(el);
    let empty: Vec<bool> = children.iter().map(|c| tree.is(*c, "empty")).collect();
    let name = tree.name(el).to_string();
    match name.as_str() {
        "group" | "interleave" | "choice" if children.len() == 2 => {
            match (empty[0], empty[1]) {
                (true, true) => replace_with(tree, el, "empty"),
                (true, false) if name != "choice" => tree.replace(el, children[1]),
                (false, true) if name != "choice" => tree.replace(el, children[0]),
                (false, true) => tree.insert_child(el, 0, children[1]),
                _ => (),
            }
        }
        "oneOrMore" if empty.contains(&true) => replace_with(tree, el, "empty"),
        _ => (),
    }
}

fn replace_with(tree: &mut Tree, el: NodeId, name: &str) {
    let replacement = tree.new_element_like(name, el);
    tree.replace(el, replacement);
}
