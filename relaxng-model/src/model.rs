//! The simplified pattern graph against which documents are validated.
//!
//! Patterns live in an arena owned by the [`Grammar`] and refer to each other by [`PatternId`].
//! Cycles only occur through [`Pattern::Ref`], which names a [`DefineId`] whose body is always
//! an `element` pattern (or `notAllowed`).

use crate::datatype::{Datatype, ParsedParams, ParsedValue};
use crate::names::{NameClass, QualifiedName};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PatternId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DefineId(pub u32);

#[derive(Clone)]
pub struct DataPattern {
    pub type_name: String,
    pub library: String,
    pub datatype: Arc<dyn Datatype>,
    pub params: ParsedParams,
    pub except: Option<PatternId>,
}

#[derive(Clone)]
pub struct ValuePattern {
    pub type_name: String,
    pub library: String,
    pub ns: String,
    pub raw_value: String,
    pub datatype: Arc<dyn Datatype>,
    pub value: ParsedValue,
    /// Prefix bindings in scope for the value in the schema, kept only for datatypes which need
    /// a context
    pub context: Vec<(String, String)>,
}

#[derive(Clone)]
pub enum Pattern {
    Empty,
    Text,
    NotAllowed,
    Data(DataPattern),
    Value(ValuePattern),
    List(PatternId),
    Attribute(NameClass, PatternId),
    Element(NameClass, PatternId),
    Choice(PatternId, PatternId),
    Group(PatternId, PatternId),
    Interleave(PatternId, PatternId),
    OneOrMore(PatternId),
    Ref(DefineId),
}

// Factored out to avoid dumping datatype internals
impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pattern::Empty => f.write_str("Empty"),
            Pattern::Text => f.write_str("Text"),
            Pattern::NotAllowed => f.write_str("NotAllowed"),
            Pattern::Data(d) => f
                .debug_struct("Data")
                .field("type", &d.type_name)
                .field("library", &d.library)
                .field("params", &d.params.raw)
                .field("except", &d.except)
                .finish(),
            Pattern::Value(v) => f
                .debug_struct("Value")
                .field("type", &v.type_name)
                .field("library", &v.library)
                .field("ns", &v.ns)
                .field("value", &v.raw_value)
                .finish(),
            Pattern::List(p) => f.debug_tuple("List").field(p).finish(),
            Pattern::Attribute(n, p) => f.debug_tuple("Attribute").field(&n.describe()).field(p).finish(),
            Pattern::Element(n, p) => f.debug_tuple("Element").field(&n.describe()).field(p).finish(),
            Pattern::Choice(a, b) => f.debug_tuple("Choice").field(a).field(b).finish(),
            Pattern::Group(a, b) => f.debug_tuple("Group").field(a).field(b).finish(),
            Pattern::Interleave(a, b) => f.debug_tuple("Interleave").field(a).field(b).finish(),
            Pattern::OneOrMore(p) => f.debug_tuple("OneOrMore").field(p).finish(),
            Pattern::Ref(d) => f.debug_tuple("Ref").field(d).finish(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Node {
    pub pattern: Pattern,
    pub xml_path: String,
    has_attrs: bool,
    has_empty: bool,
}

impl Node {
    /// True when the pattern is, or contains without crossing an element, an attribute pattern
    pub fn has_attrs(&self) -> bool {
        self.has_attrs
    }

    /// True when the pattern can match empty content
    pub fn has_empty_pattern(&self) -> bool {
        self.has_empty
    }
}

#[derive(Debug, Clone)]
pub struct Define {
    pub name: String,
    pub pattern: PatternId,
}

/// A fully simplified schema, immutable once built
#[derive(Debug)]
pub struct Grammar {
    nodes: Vec<Node>,
    defines: Vec<Define>,
    start: PatternId,
    namespaces: BTreeSet<String>,
    element_index: HashMap<QualifiedName, Vec<DefineId>>,
    wildcard_elements: Vec<DefineId>,
}

impl Grammar {
    pub fn start(&self) -> PatternId {
        self.start
    }

    pub fn node(&self, id: PatternId) -> &Node {
        &self.nodes[id.0 as usize]
    }

    pub fn pattern(&self, id: PatternId) -> &Pattern {
        &self.nodes[id.0 as usize].pattern
    }

    pub fn define(&self, id: DefineId) -> &Define {
        &self.defines[id.0 as usize]
    }

    pub fn defines(&self) -> impl Iterator<Item = (DefineId, &Define)> {
        self.defines
            .iter()
            .enumerate()
            .map(|(i, d)| (DefineId(i as u32), d))
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Every namespace mentioned by an element or attribute name class, with the `*` and
    /// `::except` markers described in [`NameClass::namespaces()`]
    pub fn namespaces(&self) -> &BTreeSet<String> {
        &self.namespaces
    }

    /// The name class of the element defined by `id`, if its body is an element
    pub fn define_name_class(&self, id: DefineId) -> Option<&NameClass> {
        match self.pattern(self.define(id).pattern) {
            Pattern::Element(nc, _) => Some(nc),
            _ => None,
        }
    }

    /// All defines whose element could carry the given name, wherever they appear in the grammar
    pub fn element_defines_matching(&self, name: &QualifiedName) -> Vec<DefineId> {
        let mut result: Vec<DefineId> = self
            .element_index
            .get(name)
            .cloned()
            .unwrap_or_default();
        for d in &self.wildcard_elements {
            if let Some(nc) = self.define_name_class(*d) {
                if nc.matches_name(name) && !result.contains(d) {
                    result.push(*d);
                }
            }
        }
        result
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    UndefinedReference { name: String },
    DuplicateDefine { name: String },
    MissingStart,
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildError::UndefinedReference { name } => {
                write!(f, "reference to undefined pattern {:?}", name)
            }
            BuildError::DuplicateDefine { name } => write!(f, "{:?} defined twice", name),
            BuildError::MissingStart => f.write_str("grammar has no start pattern"),
        }
    }
}

/// Accumulates pattern nodes (children before parents) and define bodies, then runs the
/// prepare pass in [`GrammarBuilder::finish()`]
#[derive(Default)]
pub struct GrammarBuilder {
    nodes: Vec<Node>,
    defines: Vec<(String, Option<PatternId>)>,
    define_index: HashMap<String, DefineId>,
}

impl GrammarBuilder {
    pub fn new() -> GrammarBuilder {
        GrammarBuilder::default()
    }

    pub fn add(&mut self, pattern: Pattern, xml_path: String) -> PatternId {
        let id = PatternId(self.nodes.len() as u32);
        self.nodes.push(Node {
            pattern,
            xml_path,
            has_attrs: false,
            has_empty: false,
        });
        id
    }

    /// The id for the named define, allocated on first use so that refs may precede their
    /// definition
    pub fn define_id(&mut self, name: &str) -> DefineId {
        if let Some(id) = self.define_index.get(name) {
            return *id;
        }
        let id = DefineId(self.defines.len() as u32);
        self.defines.push((name.to_string(), None));
        self.define_index.insert(name.to_string(), id);
        id
    }

    pub fn set_define(&mut self, name: &str, pattern: PatternId) -> Result<DefineId, BuildError> {
        let id = self.define_id(name);
        let slot = &mut self.defines[id.0 as usize].1;
        if slot.is_some() {
            return Err(BuildError::DuplicateDefine {
                name: name.to_string(),
            });
        }
        *slot = Some(pattern);
        Ok(id)
    }

    pub fn finish(self, start: PatternId) -> Result<Grammar, BuildError> {
        let mut defines = Vec::with_capacity(self.defines.len());
        for (name, pattern) in self.defines {
            match pattern {
                Some(pattern) => defines.push(Define { name, pattern }),
                None => return Err(BuildError::UndefinedReference { name }),
            }
        }
        let mut grammar = Grammar {
            nodes: self.nodes,
            defines,
            start,
            namespaces: BTreeSet::new(),
            element_index: HashMap::new(),
            wildcard_elements: vec![],
        };
        grammar.prepare();
        Ok(grammar)
    }
}

impl Grammar {
    fn prepare(&mut self) {
        let count = self.nodes.len();
        let mut has_attrs = vec![None; count];
        let mut has_empty = vec![None; count];
        for i in 0..count {
            let id = PatternId(i as u32);
            compute_has_attrs(&self.nodes, id, &mut has_attrs);
            compute_has_empty(&self.nodes, id, &mut has_empty);
        }
        for (i, node) in self.nodes.iter_mut().enumerate() {
            node.has_attrs = has_attrs[i].unwrap_or(false);
            node.has_empty = has_empty[i].unwrap_or(false);
        }

        for node in &self.nodes {
            if let Pattern::Element(nc, _) | Pattern::Attribute(nc, _) = &node.pattern {
                self.namespaces.extend(nc.namespaces());
            }
        }

        for (i, d) in self.defines.iter().enumerate() {
            let id = DefineId(i as u32);
            if let Pattern::Element(nc, _) = &self.nodes[d.pattern.0 as usize].pattern {
                match nc.to_array() {
                    Some(names) => {
                        for n in names {
                            let entry = self.element_index.entry(n).or_default();
                            if !entry.contains(&id) {
                                entry.push(id);
                            }
                        }
                    }
                    None => self.wildcard_elements.push(id),
                }
            }
        }
    }
}

// the pattern graph below an element is acyclic, since refs are not followed

fn compute_has_attrs(nodes: &[Node], id: PatternId, memo: &mut Vec<Option<bool>>) -> bool {
    if let Some(v) = memo[id.0 as usize] {
        return v;
    }
    let v = match &nodes[id.0 as usize].pattern {
        Pattern::Attribute(..) => true,
        Pattern::Choice(a, b) | Pattern::Group(a, b) | Pattern::Interleave(a, b) => {
            let a = compute_has_attrs(nodes, *a, memo);
            let b = compute_has_attrs(nodes, *b, memo);
            a || b
        }
        Pattern::OneOrMore(p) => compute_has_attrs(nodes, *p, memo),
        _ => false,
    };
    memo[id.0 as usize] = Some(v);
    v
}

fn compute_has_empty(nodes: &[Node], id: PatternId, memo: &mut Vec<Option<bool>>) -> bool {
    if let Some(v) = memo[id.0 as usize] {
        return v;
    }
    let v = match &nodes[id.0 as usize].pattern {
        Pattern::Empty | Pattern::Text => true,
        Pattern::Choice(a, b) => {
            let a = compute_has_empty(nodes, *a, memo);
            let b = compute_has_empty(nodes, *b, memo);
            a || b
        }
        Pattern::Group(a, b) | Pattern::Interleave(a, b) => {
            let a = compute_has_empty(nodes, *a, memo);
            let b = compute_has_empty(nodes, *b, memo);
            a && b
        }
        Pattern::OneOrMore(p) => compute_has_empty(nodes, *p, memo),
        _ => false,
    };
    memo[id.0 as usize] = Some(v);
    v
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn prepare_computes_properties() {
        let mut b = GrammarBuilder::new();
        let text = b.add(Pattern::Text, String::new());
        let attr = b.add(Pattern::Attribute(NameClass::named("", "a"), text), String::new());
        let empty = b.add(Pattern::Empty, String::new());
        let choice = b.add(Pattern::Choice(empty, attr), String::new());
        let group = b.add(Pattern::Group(choice, text), String::new());
        let el = b.add(
            Pattern::Element(NameClass::named("urn:x", "e"), group),
            String::new(),
        );
        let d = b.set_define("e", el).unwrap();
        let start = b.add(Pattern::Ref(d), String::new());
        let g = b.finish(start).unwrap();

        assert!(g.node(attr).has_attrs());
        assert!(!g.node(attr).has_empty_pattern());
        assert!(g.node(choice).has_attrs());
        assert!(g.node(choice).has_empty_pattern());
        assert!(g.node(group).has_empty_pattern());
        assert!(!g.node(el).has_attrs());
        assert!(g.namespaces().contains("urn:x"));
        assert_eq!(
            g.element_defines_matching(&QualifiedName::new("urn:x", "e")),
            vec![d]
        );
    }

    #[test]
    fn dangling_ref() {
        let mut b = GrammarBuilder::new();
        let d = b.define_id("missing");
        let start = b.add(Pattern::Ref(d), String::new());
        assert_matches!(
            b.finish(start),
            Err(BuildError::UndefinedReference { ref name }) if name == "missing"
        );
    }

    #[test]
    fn wildcard_index() {
        let mut b = GrammarBuilder::new();
        let empty = b.add(Pattern::Empty, String::new());
        let el = b.add(Pattern::Element(NameClass::ns_name("urn:y", None), empty), String::new());
        let d = b.set_define("any", el).unwrap();
        let start = b.add(Pattern::Ref(d), String::new());
        let g = b.finish(start).unwrap();
        assert_eq!(g.element_defines_matching(&QualifiedName::new("urn:y", "q")), vec![d]);
        assert!(g
            .element_defines_matching(&QualifiedName::new("urn:z", "q"))
            .is_empty());
    }
}
