//! The compiled-schema interchange format.
//!
//! A compiled grammar is written as `{"v": 3, "o": <options>, "d": <grammar>}`, where every
//! pattern is an array whose first element is a kind code (or, in verbose mode, the kind's
//! name), optionally followed by the pattern's debugging path, then by the kind-specific fields:
//!
//! | kind        | fields                                        |
//! |-------------|-----------------------------------------------|
//! | Grammar     | start, `[Array, Define...]`                   |
//! | Define      | name, element                                 |
//! | Data        | type, library, `[Array, name, value...]`, except? |
//! | Value       | type, library, ns, value, `[Array, prefix, uri...]`? |
//! | Ref         | name                                          |
//! | Attribute, Element | name class, pattern                    |
//! | Choice, Group, Interleave | pattern, pattern                |
//! | List, OneOrMore | pattern                                   |
//! | Name        | ns, local name                                |
//! | NameChoice  | name class, name class                        |
//! | NsName      | ns, except?                                   |
//! | AnyName     | except?                                       |
//!
//! Only patterns carry a path; `Grammar`, `Define` and name classes never do.  Define names may
//! be replaced by integers, most frequently mentioned first.

use crate::datatype::{
    self, DefaultNameResolver, ParameterParsingError, RawParam, Registry, ValueValidationError,
};
use crate::model::{
    BuildError, DataPattern, DefineId, Grammar, GrammarBuilder, Pattern, PatternId, ValuePattern,
};
use crate::names::NameClass;
use serde_json::{json, Value};
use std::cmp::Reverse;
use std::collections::HashMap;

pub const VERSION: u64 = 3;
/// Bit of the `o` field set when patterns carry no path
pub const NO_PATHS: u64 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Array = 0,
    Empty = 1,
    Data = 2,
    List = 3,
    Param = 4,
    Value = 5,
    NotAllowed = 6,
    Text = 7,
    Ref = 8,
    OneOrMore = 9,
    Choice = 10,
    Group = 11,
    Attribute = 12,
    Element = 13,
    Define = 14,
    Grammar = 15,
    Interleave = 17,
    Name = 18,
    NameChoice = 19,
    NsName = 20,
    AnyName = 21,
}

const KINDS: [(Kind, &str); 21] = [
    (Kind::Array, "Array"),
    (Kind::Empty, "Empty"),
    (Kind::Data, "Data"),
    (Kind::List, "List"),
    (Kind::Param, "Param"),
    (Kind::Value, "Value"),
    (Kind::NotAllowed, "NotAllowed"),
    (Kind::Text, "Text"),
    (Kind::Ref, "Ref"),
    (Kind::OneOrMore, "OneOrMore"),
    (Kind::Choice, "Choice"),
    (Kind::Group, "Group"),
    (Kind::Attribute, "Attribute"),
    (Kind::Element, "Element"),
    (Kind::Define, "Define"),
    (Kind::Grammar, "Grammar"),
    (Kind::Interleave, "Interleave"),
    (Kind::Name, "Name"),
    (Kind::NameChoice, "NameChoice"),
    (Kind::NsName, "NsName"),
    (Kind::AnyName, "AnyName"),
];

impl Kind {
    pub fn code(self) -> u64 {
        self as u64
    }

    pub fn name(self) -> &'static str {
        KINDS
            .iter()
            .find(|(k, _)| *k == self)
            .map(|(_, n)| *n)
            .unwrap_or("?")
    }

    pub fn from_code(code: u64) -> Option<Kind> {
        KINDS.iter().find(|(k, _)| k.code() == code).map(|(k, _)| *k)
    }

    pub fn from_name(name: &str) -> Option<Kind> {
        KINDS.iter().find(|(_, n)| *n == name).map(|(k, _)| *k)
    }

    fn has_path(self) -> bool {
        !matches!(
            self,
            Kind::Array
                | Kind::Param
                | Kind::Define
                | Kind::Grammar
                | Kind::Name
                | Kind::NameChoice
                | Kind::NsName
                | Kind::AnyName
        )
    }
}

#[derive(Debug, thiserror::Error)]
pub enum JsonError {
    #[error("Invalid JSON: {0}")]
    Syntax(#[from] serde_json::Error),
    #[error("The schema file has no format version, so was written by an older release; upgrade your schema file by compiling the schema again")]
    Unversioned,
    #[error("Unsupported schema file format version {0}")]
    UnsupportedVersion(String),
    #[error("Malformed schema file: {0}")]
    Malformed(String),
    #[error(transparent)]
    Datatype(#[from] datatype::Errors),
    #[error(transparent)]
    Parameter(#[from] ParameterParsingError),
    #[error(transparent)]
    Value(#[from] ValueValidationError),
    #[error("Malformed schema file: {0}")]
    Grammar(BuildError),
}

fn malformed(message: impl Into<String>) -> JsonError {
    JsonError::Malformed(message.into())
}

#[derive(Debug, Clone)]
pub struct JsonOptions {
    /// Write kind names instead of kind codes
    pub verbose: bool,
    /// Write the debugging path of every pattern
    pub include_paths: bool,
    /// Replace define names with small integers
    pub renumber: bool,
}

impl Default for JsonOptions {
    fn default() -> Self {
        JsonOptions {
            verbose: false,
            include_paths: false,
            renumber: true,
        }
    }
}

pub fn write(grammar: &Grammar, options: &JsonOptions) -> String {
    to_value(grammar, options).to_string()
}

pub fn to_value(grammar: &Grammar, options: &JsonOptions) -> Value {
    let names = if options.renumber {
        Some(renumbering(grammar))
    } else {
        None
    };
    let writer = Writer {
        grammar,
        options,
        names,
    };
    let o = if options.include_paths { 0 } else { NO_PATHS };
    json!({"v": VERSION, "o": o, "d": writer.grammar()})
}

/// Define names ranked by how often they are mentioned, ties going to the earliest mention
fn renumbering(grammar: &Grammar) -> HashMap<String, u64> {
    let mut mentions = vec![];
    collect_refs(grammar, grammar.start(), &mut mentions);
    for (id, define) in grammar.defines() {
        mentions.push(id);
        collect_refs(grammar, define.pattern, &mut mentions);
    }
    let mut order: Vec<DefineId> = vec![];
    let mut counts: HashMap<DefineId, usize> = HashMap::new();
    for d in mentions {
        let count = counts.entry(d).or_insert(0);
        if *count == 0 {
            order.push(d);
        }
        *count += 1;
    }
    order.sort_by_key(|d| Reverse(counts[d]));
    order
        .into_iter()
        .enumerate()
        .map(|(i, d)| (grammar.define(d).name.clone(), i as u64))
        .collect()
}

/// The refs below `id`, in the order the writer visits them
fn collect_refs(grammar: &Grammar, id: PatternId, out: &mut Vec<DefineId>) {
    match grammar.pattern(id) {
        Pattern::Ref(d) => out.push(*d),
        Pattern::Data(DataPattern {
            except: Some(e), ..
        }) => collect_refs(grammar, *e, out),
        Pattern::List(p) | Pattern::OneOrMore(p) => collect_refs(grammar, *p, out),
        Pattern::Attribute(_, p) | Pattern::Element(_, p) => collect_refs(grammar, *p, out),
        Pattern::Choice(a, b) | Pattern::Group(a, b) | Pattern::Interleave(a, b) => {
            collect_refs(grammar, *a, out);
            collect_refs(grammar, *b, out);
        }
        _ => (),
    }
}

struct Writer<'a> {
    grammar: &'a Grammar,
    options: &'a JsonOptions,
    names: Option<HashMap<String, u64>>,
}

impl<'a> Writer<'a> {
    fn tag(&self, kind: Kind) -> Value {
        if self.options.verbose {
            json!(kind.name())
        } else {
            json!(kind.code())
        }
    }

    fn define_name(&self, name: &str) -> Value {
        match self.names.as_ref().and_then(|m| m.get(name)) {
            Some(n) => json!(n),
            None => json!(name),
        }
    }

    fn array(&self, items: Vec<Value>) -> Value {
        let mut v = vec![self.tag(Kind::Array)];
        v.extend(items);
        Value::Array(v)
    }

    fn grammar(&self) -> Value {
        let defines = self
            .grammar
            .defines()
            .map(|(_, d)| {
                json!([
                    self.tag(Kind::Define),
                    self.define_name(&d.name),
                    self.pattern(d.pattern)
                ])
            })
            .collect();
        json!([
            self.tag(Kind::Grammar),
            self.pattern(self.grammar.start()),
            self.array(defines)
        ])
    }

    fn pattern(&self, id: PatternId) -> Value {
        let node = self.grammar.node(id);
        let (kind, fields) = match &node.pattern {
            Pattern::Empty => (Kind::Empty, vec![]),
            Pattern::Text => (Kind::Text, vec![]),
            Pattern::NotAllowed => (Kind::NotAllowed, vec![]),
            Pattern::Data(d) => {
                let params = d
                    .params
                    .raw
                    .iter()
                    .flat_map(|p| vec![json!(p.name), json!(p.value)])
                    .collect();
                let mut fields = vec![json!(d.type_name), json!(d.library), self.array(params)];
                if let Some(e) = d.except {
                    fields.push(self.pattern(e));
                }
                (Kind::Data, fields)
            }
            Pattern::Value(v) => {
                let mut fields = vec![
                    json!(v.type_name),
                    json!(v.library),
                    json!(v.ns),
                    json!(v.raw_value),
                ];
                if !v.context.is_empty() {
                    let context = v
                        .context
                        .iter()
                        .flat_map(|(p, u)| vec![json!(p), json!(u)])
                        .collect();
                    fields.push(self.array(context));
                }
                (Kind::Value, fields)
            }
            Pattern::List(p) => (Kind::List, vec![self.pattern(*p)]),
            Pattern::OneOrMore(p) => (Kind::OneOrMore, vec![self.pattern(*p)]),
            Pattern::Ref(d) => (
                Kind::Ref,
                vec![self.define_name(&self.grammar.define(*d).name)],
            ),
            Pattern::Attribute(nc, p) => (
                Kind::Attribute,
                vec![self.name_class(nc), self.pattern(*p)],
            ),
            Pattern::Element(nc, p) => (Kind::Element, vec![self.name_class(nc), self.pattern(*p)]),
            Pattern::Choice(a, b) => (Kind::Choice, vec![self.pattern(*a), self.pattern(*b)]),
            Pattern::Group(a, b) => (Kind::Group, vec![self.pattern(*a), self.pattern(*b)]),
            Pattern::Interleave(a, b) => {
                (Kind::Interleave, vec![self.pattern(*a), self.pattern(*b)])
            }
        };
        let mut v = vec![self.tag(kind)];
        if self.options.include_paths {
            v.push(json!(node.xml_path));
        }
        v.extend(fields);
        Value::Array(v)
    }

    fn name_class(&self, nc: &NameClass) -> Value {
        match nc {
            NameClass::Named {
                namespace_uri,
                name,
            } => json!([self.tag(Kind::Name), namespace_uri, name]),
            NameClass::NsName {
                namespace_uri,
                except,
            } => {
                let mut v = vec![self.tag(Kind::NsName), json!(namespace_uri)];
                if let Some(e) = except {
                    v.push(self.name_class(e));
                }
                Value::Array(v)
            }
            NameClass::AnyName { except } => {
                let mut v = vec![self.tag(Kind::AnyName)];
                if let Some(e) = except {
                    v.push(self.name_class(e));
                }
                Value::Array(v)
            }
            NameClass::Alt { a, b } => json!([
                self.tag(Kind::NameChoice),
                self.name_class(a),
                self.name_class(b)
            ]),
        }
    }
}

pub fn read(text: &str, registry: &Registry) -> Result<Grammar, JsonError> {
    let value: Value = serde_json::from_str(text)?;
    from_value(&value, registry)
}

pub fn from_value(value: &Value, registry: &Registry) -> Result<Grammar, JsonError> {
    let obj = value
        .as_object()
        .ok_or_else(|| malformed("the top level must be an object"))?;
    match obj.get("v") {
        None => return Err(JsonError::Unversioned),
        Some(v) if v.as_u64() == Some(VERSION) => (),
        Some(v) => return Err(JsonError::UnsupportedVersion(v.to_string())),
    }
    let options = obj.get("o").and_then(Value::as_u64).unwrap_or(0);
    let d = obj.get("d").ok_or_else(|| malformed("missing 'd'"))?;
    let mut reader = Reader {
        registry,
        paths: options & NO_PATHS == 0,
        builder: GrammarBuilder::new(),
    };
    reader.grammar(d)
}

struct Reader<'a> {
    registry: &'a Registry,
    paths: bool,
    builder: GrammarBuilder,
}

struct Parts<'v> {
    kind: Kind,
    path: String,
    fields: &'v [Value],
}

impl<'v> Parts<'v> {
    fn field(&self, i: usize) -> Result<&'v Value, JsonError> {
        self.fields
            .get(i)
            .ok_or_else(|| malformed(format!("{} is missing field {}", self.kind.name(), i)))
    }

    fn str(&self, i: usize) -> Result<&'v str, JsonError> {
        self.field(i)?
            .as_str()
            .ok_or_else(|| malformed(format!("{} field {} must be a string", self.kind.name(), i)))
    }
}

impl<'a> Reader<'a> {
    fn parts<'v>(&self, value: &'v Value) -> Result<Parts<'v>, JsonError> {
        let items = value
            .as_array()
            .ok_or_else(|| malformed(format!("expected an array, found {}", value)))?;
        let kind = match items.first() {
            Some(Value::Number(n)) => n.as_u64().and_then(Kind::from_code),
            Some(Value::String(s)) => Kind::from_name(s),
            _ => None,
        }
        .ok_or_else(|| malformed(format!("unknown kind in {}", value)))?;
        if kind.has_path() && self.paths {
            let path = items
                .get(1)
                .and_then(Value::as_str)
                .ok_or_else(|| malformed(format!("{} is missing its path", kind.name())))?;
            Ok(Parts {
                kind,
                path: path.to_string(),
                fields: &items[2..],
            })
        } else {
            Ok(Parts {
                kind,
                path: String::new(),
                fields: &items[1..],
            })
        }
    }

    fn expect<'v>(&self, value: &'v Value, kind: Kind) -> Result<Parts<'v>, JsonError> {
        let parts = self.parts(value)?;
        if parts.kind != kind {
            return Err(malformed(format!(
                "expected {}, found {}",
                kind.name(),
                parts.kind.name()
            )));
        }
        Ok(parts)
    }

    fn strings(&self, value: &Value) -> Result<Vec<String>, JsonError> {
        self.expect(value, Kind::Array)?
            .fields
            .iter()
            .map(|v| {
                v.as_str()
                    .map(|s| s.to_string())
                    .ok_or_else(|| malformed(format!("expected a string, found {}", v)))
            })
            .collect()
    }

    fn define_name(&self, value: &Value) -> Result<String, JsonError> {
        match value {
            Value::String(s) => Ok(s.clone()),
            Value::Number(n) => Ok(n.to_string()),
            other => Err(malformed(format!("invalid define name {}", other))),
        }
    }

    fn grammar(&mut self, value: &Value) -> Result<Grammar, JsonError> {
        let g = self.expect(value, Kind::Grammar)?;
        let defines = self.expect(g.field(1)?, Kind::Array)?;
        let mut bodies = vec![];
        // allocate ids in file order before any ref is seen
        for d in defines.fields {
            let d = self.expect(d, Kind::Define)?;
            let name = self.define_name(d.field(0)?)?;
            self.builder.define_id(&name);
            bodies.push((name, d.field(1)?));
        }
        let start = self.pattern(g.field(0)?)?;
        for (name, body) in bodies {
            let body = self.pattern(body)?;
            self.builder
                .set_define(&name, body)
                .map_err(JsonError::Grammar)?;
        }
        let builder = std::mem::take(&mut self.builder);
        builder.finish(start).map_err(JsonError::Grammar)
    }

    fn pattern(&mut self, value: &Value) -> Result<PatternId, JsonError> {
        let p = self.parts(value)?;
        let pattern = match p.kind {
            Kind::Empty => Pattern::Empty,
            Kind::Text => Pattern::Text,
            Kind::NotAllowed => Pattern::NotAllowed,
            Kind::Data => Pattern::Data(self.data(&p)?),
            Kind::Value => Pattern::Value(self.value(&p)?),
            Kind::List => Pattern::List(self.pattern(p.field(0)?)?),
            Kind::OneOrMore => Pattern::OneOrMore(self.pattern(p.field(0)?)?),
            Kind::Ref => {
                let name = self.define_name(p.field(0)?)?;
                Pattern::Ref(self.builder.define_id(&name))
            }
            Kind::Attribute => Pattern::Attribute(
                self.name_class(p.field(0)?)?,
                self.pattern(p.field(1)?)?,
            ),
            Kind::Element => Pattern::Element(
                self.name_class(p.field(0)?)?,
                self.pattern(p.field(1)?)?,
            ),
            Kind::Choice => Pattern::Choice(self.pattern(p.field(0)?)?, self.pattern(p.field(1)?)?),
            Kind::Group => Pattern::Group(self.pattern(p.field(0)?)?, self.pattern(p.field(1)?)?),
            Kind::Interleave => {
                Pattern::Interleave(self.pattern(p.field(0)?)?, self.pattern(p.field(1)?)?)
            }
            other => return Err(malformed(format!("{} is not a pattern", other.name()))),
        };
        Ok(self.builder.add(pattern, p.path))
    }

    fn data(&mut self, p: &Parts<'_>) -> Result<DataPattern, JsonError> {
        let type_name = p.str(0)?.to_string();
        let library = p.str(1)?.to_string();
        let datatype = self.registry.find(&library, &type_name)?;
        let flat = self.strings(p.field(2)?)?;
        if flat.len() % 2 != 0 {
            return Err(malformed("data parameters must be name/value pairs"));
        }
        let raw: Vec<RawParam> = flat
            .chunks(2)
            .map(|pair| RawParam::new(&pair[0], &pair[1]))
            .collect();
        let params = datatype.parse_params(&p.path, &raw)?;
        let except = match p.fields.get(3) {
            Some(e) => Some(self.pattern(e)?),
            None => None,
        };
        Ok(DataPattern {
            type_name,
            library,
            datatype,
            params,
            except,
        })
    }

    fn value(&mut self, p: &Parts<'_>) -> Result<ValuePattern, JsonError> {
        let type_name = p.str(0)?.to_string();
        let library = p.str(1)?.to_string();
        let ns = p.str(2)?.to_string();
        let raw_value = p.str(3)?.to_string();
        let datatype = self.registry.find(&library, &type_name)?;
        let context = match p.fields.get(4) {
            Some(c) => {
                let flat = self.strings(c)?;
                if flat.len() % 2 != 0 {
                    return Err(malformed("value context must be prefix/uri pairs"));
                }
                flat.chunks(2)
                    .map(|pair| (pair[0].clone(), pair[1].clone()))
                    .collect()
            }
            None => vec![],
        };
        let mut resolver = DefaultNameResolver::default();
        for (prefix, uri) in &context {
            resolver.define_prefix(prefix, uri);
        }
        resolver.define_prefix("", &ns);
        let value = datatype.parse_value(&p.path, &raw_value, Some(&resolver))?;
        Ok(ValuePattern {
            type_name,
            library,
            ns,
            raw_value,
            datatype,
            value,
            context,
        })
    }

    fn name_class(&self, value: &Value) -> Result<NameClass, JsonError> {
        let p = self.parts(value)?;
        let except = |i: usize| -> Result<Option<NameClass>, JsonError> {
            p.fields.get(i).map(|e| self.name_class(e)).transpose()
        };
        match p.kind {
            Kind::Name => Ok(NameClass::named(p.str(0)?, p.str(1)?)),
            Kind::NsName => Ok(NameClass::ns_name(p.str(0)?, except(1)?)),
            Kind::AnyName => Ok(NameClass::any_name(except(0)?)),
            Kind::NameChoice => Ok(NameClass::alt(
                self.name_class(p.field(0)?)?,
                self.name_class(p.field(1)?)?,
            )),
            other => Err(malformed(format!("{} is not a name class", other.name()))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SourceMap;
    use assert_matches::assert_matches;
    use relaxng_syntax::tree::FileId;
    use relaxng_syntax::xml;

    const SIMPLIFIED: &str = r#"<grammar xmlns="http://relaxng.org/ns/structure/1.0" xmlns:p="urn:p">
        <start><choice><ref name="doc"/><ref name="item"/></choice></start>
        <define name="doc"><element><name ns="urn:d">doc</name>
          <group>
            <attribute><choice><name ns="">a</name><nsName ns="urn:x"><except><name ns="urn:x">b</name></except></nsName></choice>
              <data type="integer" datatypeLibrary="http://www.w3.org/2001/XMLSchema-datatypes"><param name="minInclusive">1</param><except><value type="integer" datatypeLibrary="http://www.w3.org/2001/XMLSchema-datatypes" ns="">5</value></except></data>
            </attribute>
            <oneOrMore><ref name="item"/></oneOrMore>
          </group>
        </element></define>
        <define name="item"><element><anyName><except><nsName ns="urn:d"/></except></anyName>
          <choice><empty/><interleave><list><value type="QName" datatypeLibrary="http://www.w3.org/2001/XMLSchema-datatypes" ns="urn:q">p:x</value></list><ref name="item"/></interleave></choice>
        </element></define>
      </grammar>"#;

    fn grammar() -> Grammar {
        let mut tree = xml::parse(FileId(0), SIMPLIFIED).unwrap();
        for el in tree.descendant_elements(tree.root()) {
            for c in tree.children(el).to_vec() {
                if tree.text(c).map(xml::is_whitespace).unwrap_or(false) {
                    tree.remove_child(el, c);
                }
            }
        }
        let (g, _) =
            crate::build::build(&tree, &SourceMap::default(), &Registry::builtin(), true).unwrap();
        g
    }

    #[test]
    fn kind_codes() {
        assert_eq!(Kind::Array.code(), 0);
        assert_eq!(Kind::Grammar.code(), 15);
        assert_eq!(Kind::from_code(16), None);
        assert_eq!(Kind::from_code(17), Some(Kind::Interleave));
        assert_eq!(Kind::from_name("AnyName"), Some(Kind::AnyName));
    }

    #[test]
    fn round_trip() {
        let g = grammar();
        let registry = Registry::builtin();
        for options in [
            JsonOptions::default(),
            JsonOptions {
                verbose: true,
                include_paths: true,
                renumber: false,
            },
        ] {
            let first = write(&g, &options);
            let again = read(&first, &registry).unwrap();
            assert_eq!(write(&again, &options), first);
            assert_eq!(again.node_count(), g.node_count());
        }
    }

    #[test]
    fn frequent_names_get_small_numbers() {
        let v = to_value(&grammar(), &JsonOptions::default());
        assert_eq!(v["v"], json!(3));
        assert_eq!(v["o"], json!(NO_PATHS));
        // "item" is mentioned four times, "doc" twice
        let defines = &v["d"][2];
        assert_eq!(defines[1][1], json!(1));
        assert_eq!(defines[2][1], json!(0));
    }

    #[test]
    fn verbose_paths() {
        let options = JsonOptions {
            verbose: true,
            include_paths: true,
            renumber: false,
        };
        let v = to_value(&grammar(), &options);
        assert_eq!(v["o"], json!(0));
        assert_eq!(v["d"][0], json!("Grammar"));
        assert_eq!(v["d"][1][0], json!("Choice"));
        assert_eq!(v["d"][1][1], json!("/grammar/start/choice"));
        assert_eq!(v["d"][2][1][1], json!("doc"));
    }

    #[test]
    fn versions() {
        assert_matches!(
            read(r#"{"d": [15, [1], [0]]}"#, &Registry::builtin()),
            Err(JsonError::Unversioned)
        );
        assert!(JsonError::Unversioned
            .to_string()
            .contains("upgrade your schema file"));
        assert_matches!(
            read(r#"{"v": 2, "d": [15, [1], [0]]}"#, &Registry::builtin()),
            Err(JsonError::UnsupportedVersion(_))
        );
        assert_matches!(
            read(r#"{"v": 3, "o": 1, "d": [15, [1], [0]]}"#, &Registry::builtin()),
            Ok(_)
        );
    }

    #[test]
    fn bad_parameters_are_reported() {
        assert_matches!(
            read(
                r#"{"v":3,"o":1,"d":[15,[2,"integer","http://www.w3.org/2001/XMLSchema-datatypes",[0,"minInclusive","10","maxInclusive","5"]],[0]]}"#,
                &Registry::builtin()
            ),
            Err(JsonError::Parameter(_))
        );
    }
}
