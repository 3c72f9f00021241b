//! A mutable arena of schema elements, used while a schema is being simplified.
//!
//! All elements in the tree are implicitly in the Relax NG namespace; foreign elements and
//! attributes are discarded while parsing (see [`crate::xml`]).  Nodes are addressed by
//! [`NodeId`] handles, and every node has at most one parent.

use std::fmt::Write;
use std::ops::Range;
use std::rc::Rc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// Identifies the source document a node was parsed from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileId(pub usize);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub file: FileId,
    pub range: Range<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub value: String,
}

/// An in-scope namespace binding; `prefix` is `None` for the default namespace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Namespace {
    pub prefix: Option<String>,
    pub uri: String,
}

#[derive(Debug, Clone)]
pub struct Element {
    pub name: String,
    pub attributes: Vec<Attribute>,
    pub namespaces: Rc<Vec<Namespace>>,
    pub documentation: Option<String>,
    children: Vec<NodeId>,
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Element(Element),
    Text(String),
}

#[derive(Debug, Clone)]
struct Node {
    parent: Option<NodeId>,
    kind: NodeKind,
    location: Option<Location>,
}

#[derive(Debug, Clone, Default)]
pub struct Tree {
    nodes: Vec<Node>,
    root: Option<NodeId>,
}

impl Tree {
    pub fn new() -> Tree {
        Tree::default()
    }

    /// The root element.  Panics if no root has been set.
    pub fn root(&self) -> NodeId {
        self.root.expect("tree has no root element")
    }

    pub fn has_root(&self) -> bool {
        self.root.is_some()
    }

    pub fn set_root(&mut self, id: NodeId) {
        self.detach(id);
        self.root = Some(id);
    }

    fn push(&mut self, kind: NodeKind, location: Option<Location>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            parent: None,
            kind,
            location,
        });
        id
    }

    pub fn new_element(&mut self, name: &str) -> NodeId {
        self.new_element_with(name, Rc::new(vec![]), None)
    }

    pub fn new_element_with(
        &mut self,
        name: &str,
        namespaces: Rc<Vec<Namespace>>,
        location: Option<Location>,
    ) -> NodeId {
        self.push(
            NodeKind::Element(Element {
                name: name.to_string(),
                attributes: vec![],
                namespaces,
                documentation: None,
                children: vec![],
            }),
            location,
        )
    }

    /// Creates a detached element which inherits the namespace bindings and source location of
    /// `template`, for elements synthesised during simplification
    pub fn new_element_like(&mut self, name: &str, template: NodeId) -> NodeId {
        let namespaces = self
            .element_opt(template)
            .map(|e| e.namespaces.clone())
            .unwrap_or_default();
        let location = self.location(template).cloned();
        self.new_element_with(name, namespaces, location)
    }

    pub fn new_text(&mut self, text: &str, location: Option<Location>) -> NodeId {
        self.push(NodeKind::Text(text.to_string()), location)
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.0].kind
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        matches!(self.nodes[id.0].kind, NodeKind::Element(_))
    }

    /// True if `id` is an element with the given local name
    pub fn is(&self, id: NodeId, name: &str) -> bool {
        match &self.nodes[id.0].kind {
            NodeKind::Element(e) => e.name == name,
            NodeKind::Text(_) => false,
        }
    }

    pub fn element_opt(&self, id: NodeId) -> Option<&Element> {
        match &self.nodes[id.0].kind {
            NodeKind::Element(e) => Some(e),
            NodeKind::Text(_) => None,
        }
    }

    /// Panics if `id` is a text node
    pub fn element(&self, id: NodeId) -> &Element {
        self.element_opt(id).expect("expected an element node")
    }

    pub fn element_mut(&mut self, id: NodeId) -> &mut Element {
        match &mut self.nodes[id.0].kind {
            NodeKind::Element(e) => e,
            NodeKind::Text(_) => panic!("expected an element node"),
        }
    }

    pub fn name(&self, id: NodeId) -> &str {
        &self.element(id).name
    }

    pub fn rename(&mut self, id: NodeId, name: &str) {
        self.element_mut(id).name = name.to_string();
    }

    pub fn text(&self, id: NodeId) -> Option<&str> {
        match &self.nodes[id.0].kind {
            NodeKind::Text(t) => Some(t),
            NodeKind::Element(_) => None,
        }
    }

    pub fn set_text(&mut self, id: NodeId, value: &str) {
        match &mut self.nodes[id.0].kind {
            NodeKind::Text(t) => *t = value.to_string(),
            NodeKind::Element(_) => panic!("expected a text node"),
        }
    }

    /// The concatenation of the text children of the given element
    pub fn text_content(&self, id: NodeId) -> String {
        let mut result = String::new();
        for c in self.children(id) {
            if let Some(t) = self.text(*c) {
                result.push_str(t);
            }
        }
        result
    }

    /// Replaces all children of the element with a single text node (or none, when `value` is
    /// empty)
    pub fn set_text_content(&mut self, id: NodeId, value: &str) {
        for c in self.children(id).to_vec() {
            self.remove_child(id, c);
        }
        if !value.is_empty() {
            let location = self.location(id).cloned();
            let text = self.new_text(value, location);
            self.append_child(id, text);
        }
    }

    pub fn location(&self, id: NodeId) -> Option<&Location> {
        self.nodes[id.0].location.as_ref()
    }

    /// The location of this node, or else of its nearest located ancestor
    pub fn nearest_location(&self, id: NodeId) -> Option<&Location> {
        let mut this = Some(id);
        while let Some(node) = this {
            if let Some(loc) = self.location(node) {
                return Some(loc);
            }
            this = self.parent(node);
        }
        None
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn ancestors(&self, id: NodeId) -> Ancestors<'_> {
        Ancestors {
            tree: self,
            next: Some(id),
        }
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        match &self.nodes[id.0].kind {
            NodeKind::Element(e) => &e.children,
            NodeKind::Text(_) => &[],
        }
    }

    pub fn element_children(&self, id: NodeId) -> Vec<NodeId> {
        self.children(id)
            .iter()
            .copied()
            .filter(|c| self.is_element(*c))
            .collect()
    }

    pub fn first_element_child(&self, id: NodeId) -> Option<NodeId> {
        self.children(id).iter().copied().find(|c| self.is_element(*c))
    }

    pub fn child_position(&self, parent: NodeId, child: NodeId) -> Option<usize> {
        self.children(parent).iter().position(|c| *c == child)
    }

    /// Removes the node from its parent (if any), leaving it as a free-standing subtree
    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.nodes[id.0].parent {
            self.remove_child(parent, id);
        } else if self.root == Some(id) {
            self.root = None;
        }
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        let len = self.children(parent).len();
        self.insert_child(parent, len, child);
    }

    pub fn insert_child(&mut self, parent: NodeId, index: usize, child: NodeId) {
        self.detach(child);
        let index = index.min(self.children(parent).len());
        self.element_mut(parent).children.insert(index, child);
        self.nodes[child.0].parent = Some(parent);
    }

    /// Panics if `child` is not a child of `parent`
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) {
        let pos = self
            .child_position(parent, child)
            .unwrap_or_else(|| panic!("{:?} is not a child of {:?}", child, parent));
        self.element_mut(parent).children.remove(pos);
        self.nodes[child.0].parent = None;
    }

    /// Puts `new` in the position currently occupied by `old` (which may be the root), detaching
    /// `old`
    pub fn replace(&mut self, old: NodeId, new: NodeId) {
        if old == new {
            return;
        }
        self.detach(new);
        match self.parent(old) {
            Some(parent) => {
                let pos = self
                    .child_position(parent, old)
                    .unwrap_or_else(|| panic!("{:?} is not a child of {:?}", old, parent));
                self.element_mut(parent).children[pos] = new;
                self.nodes[new.0].parent = Some(parent);
                self.nodes[old.0].parent = None;
            }
            None => {
                if self.root == Some(old) {
                    self.root = Some(new);
                }
            }
        }
    }

    /// Replaces the given element by its own children, in place
    pub fn unwrap_element(&mut self, id: NodeId) {
        let parent = self
            .parent(id)
            .unwrap_or_else(|| panic!("{:?} has no parent", id));
        let mut pos = self
            .child_position(parent, id)
            .unwrap_or_else(|| panic!("{:?} is not a child of {:?}", id, parent));
        self.remove_child(parent, id);
        for c in self.children(id).to_vec() {
            self.insert_child(parent, pos, c);
            pos += 1;
        }
    }

    /// Wraps `id` in a new element called `name`, which takes its place in the tree
    pub fn wrap(&mut self, id: NodeId, name: &str) -> NodeId {
        let wrapper = self.new_element_like(name, id);
        self.replace(id, wrapper);
        self.append_child(wrapper, id);
        wrapper
    }

    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element_opt(id).and_then(|e| {
            e.attributes
                .iter()
                .find(|a| a.name == name)
                .map(|a| a.value.as_str())
        })
    }

    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) {
        let el = self.element_mut(id);
        if let Some(a) = el.attributes.iter_mut().find(|a| a.name == name) {
            a.value = value.to_string();
        } else {
            el.attributes.push(Attribute {
                name: name.to_string(),
                value: value.to_string(),
            });
        }
    }

    pub fn remove_attribute(&mut self, id: NodeId, name: &str) -> Option<String> {
        let el = self.element_mut(id);
        let pos = el.attributes.iter().position(|a| a.name == name)?;
        Some(el.attributes.remove(pos).value)
    }

    /// Copies the subtree rooted at `id`; the copy is detached
    pub fn deep_copy(&mut self, id: NodeId) -> NodeId {
        let node = &self.nodes[id.0];
        let location = node.location.clone();
        let copy = match &node.kind {
            NodeKind::Text(t) => {
                let t = t.clone();
                return self.new_text(&t, location);
            }
            NodeKind::Element(e) => {
                let mut e = e.clone();
                e.children = vec![];
                self.push(NodeKind::Element(e), location)
            }
        };
        for c in self.children(id).to_vec() {
            let child_copy = self.deep_copy(c);
            self.append_child(copy, child_copy);
        }
        copy
    }

    /// All element nodes of the subtree rooted at `id`, in document order
    pub fn descendant_elements(&self, id: NodeId) -> Vec<NodeId> {
        let mut result = vec![];
        let mut stack = vec![id];
        while let Some(node) = stack.pop() {
            if self.is_element(node) {
                result.push(node);
                stack.extend(self.children(node).iter().rev());
            }
        }
        result
    }

    /// A debugging path such as `/grammar/define[@name='foo']/element`
    pub fn path(&self, id: NodeId) -> String {
        let mut parts = vec![];
        for node in self.ancestors(id) {
            if let Some(e) = self.element_opt(node) {
                match e.attributes.iter().find(|a| a.name == "name") {
                    Some(a) if e.name == "define" || e.name == "ref" => {
                        parts.push(format!("{}[@name='{}']", e.name, a.value))
                    }
                    _ => parts.push(e.name.clone()),
                }
            }
        }
        let mut result = String::new();
        for p in parts.iter().rev() {
            result.push('/');
            result.push_str(p);
        }
        result
    }

    /// Serialises the subtree rooted at `id` as Relax NG XML, with attributes in sorted order so
    /// that structurally equal trees serialise identically
    pub fn to_xml_string(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.write_xml(id, &mut out, true);
        out
    }

    fn write_xml(&self, id: NodeId, out: &mut String, top: bool) {
        match &self.nodes[id.0].kind {
            NodeKind::Text(t) => escape_into(out, t, false),
            NodeKind::Element(e) => {
                out.push('<');
                out.push_str(&e.name);
                if top {
                    out.push_str(" xmlns=\"");
                    out.push_str(crate::xml::NS);
                    out.push('"');
                }
                let mut attrs: Vec<_> = e.attributes.iter().collect();
                attrs.sort_by(|a, b| a.name.cmp(&b.name));
                for a in attrs {
                    let _ = write!(out, " {}=\"", a.name);
                    escape_into(out, &a.value, true);
                    out.push('"');
                }
                if e.children.is_empty() {
                    out.push_str("/>");
                } else {
                    out.push('>');
                    for c in &e.children {
                        self.write_xml(*c, out, false);
                    }
                    let _ = write!(out, "</{}>", e.name);
                }
            }
        }
    }
}

fn escape_into(out: &mut String, text: &str, attribute: bool) {
    for c in text.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' if attribute => out.push_str("&quot;"),
            '\n' if attribute => out.push_str("&#10;"),
            '\t' if attribute => out.push_str("&#9;"),
            '\r' => out.push_str("&#13;"),
            _ => out.push(c),
        }
    }
}

pub struct Ancestors<'t> {
    tree: &'t Tree,
    next: Option<NodeId>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let this = self.next?;
        self.next = self.tree.parent(this);
        Some(this)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn sample() -> (Tree, NodeId, NodeId, NodeId) {
        let mut tree = Tree::new();
        let root = tree.new_element("group");
        tree.set_root(root);
        let a = tree.new_element("empty");
        let b = tree.new_element("text");
        tree.append_child(root, a);
        tree.append_child(root, b);
        (tree, root, a, b)
    }

    #[test]
    fn reparenting_detaches() {
        let (mut tree, root, a, b) = sample();
        tree.append_child(b, a);
        assert_eq!(tree.children(root), &[b]);
        assert_eq!(tree.parent(a), Some(b));
    }

    #[test]
    #[should_panic]
    fn remove_non_child() {
        let (mut tree, _root, a, b) = sample();
        tree.remove_child(a, b);
    }

    #[test]
    fn replace_root() {
        let (mut tree, root, _a, _b) = sample();
        let wrapper = tree.wrap(root, "grammar");
        assert_eq!(tree.root(), wrapper);
        assert_eq!(tree.parent(root), Some(wrapper));
    }

    #[test]
    fn unwrap_keeps_order() {
        let (mut tree, root, a, b) = sample();
        let div = tree.new_element("div");
        tree.insert_child(root, 1, div);
        let c = tree.new_element("notAllowed");
        tree.append_child(div, c);
        tree.unwrap_element(div);
        assert_eq!(tree.children(root), &[a, c, b]);
        assert_matches!(tree.parent(div), None);
    }

    #[test]
    fn copy_is_detached_and_equal() {
        let (mut tree, root, a, _b) = sample();
        tree.set_attribute(a, "ns", "urn:x");
        let copy = tree.deep_copy(root);
        assert_eq!(tree.parent(copy), None);
        assert_eq!(tree.to_xml_string(copy), tree.to_xml_string(root));
    }

    #[test]
    fn serialise() {
        let (mut tree, root, a, _b) = sample();
        tree.set_attribute(a, "name", "x<y");
        assert_eq!(
            tree.to_xml_string(root),
            "<group xmlns=\"http://relaxng.org/ns/structure/1.0\"><empty name=\"x&lt;y\"/><text/></group>"
        );
    }
}
