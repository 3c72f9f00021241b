use relaxng_syntax::tree::Tree;

/// Replaces each `div` by its children
pub fn remove_divs(tree: &mut Tree) {
    let root = tree.root();
    for el in tree.descendant_elements(root) {
        if el != root && tree.is(el, "div") {
            tree.unwrap_element(el);
        }
    }
}
