//! Datatype libraries, and the registry through which schemas find them.
//!
//! A [`Registry`] is populated with libraries up front, then frozen behind an `Arc` and handed
//! to the [`Compiler`](crate::Compiler).  Datatypes are `Send + Sync` so that compiled grammars
//! can be shared between threads.

use crate::names::QualifiedName;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

pub mod regexp;
pub mod relax;
pub mod xsd;

/// Resolves prefixed names appearing in datatype values (e.g. values of type `xsd:QName`)
pub trait NameResolver {
    /// Resolves `qname` against the current namespace context.  Unprefixed attribute names are
    /// in no namespace, while unprefixed element names take the default namespace.
    fn resolve_name(&self, qname: &str, attribute: bool) -> Option<QualifiedName>;
}

/// A stack of namespace contexts, with the `xml` prefix predefined
#[derive(Debug, Clone)]
pub struct DefaultNameResolver {
    contexts: Vec<Vec<(String, String)>>,
}

impl Default for DefaultNameResolver {
    fn default() -> Self {
        DefaultNameResolver {
            contexts: vec![vec![(
                "xml".to_string(),
                "http://www.w3.org/XML/1998/namespace".to_string(),
            )]],
        }
    }
}

impl DefaultNameResolver {
    pub fn enter_context(&mut self) {
        self.contexts.push(vec![]);
    }

    /// Panics if there is no context to leave
    pub fn leave_context(&mut self) {
        if self.contexts.len() <= 1 {
            panic!("trying to leave the initial namespace context");
        }
        self.contexts.pop();
    }

    /// Binds `prefix` (the empty string for the default namespace) in the current context
    pub fn define_prefix(&mut self, prefix: &str, uri: &str) {
        if let Some(ctx) = self.contexts.last_mut() {
            ctx.push((prefix.to_string(), uri.to_string()));
        }
    }

    pub fn prefix_uri(&self, prefix: &str) -> Option<&str> {
        self.contexts
            .iter()
            .rev()
            .flat_map(|c| c.iter().rev())
            .find(|(p, _)| p == prefix)
            .map(|(_, u)| u.as_str())
    }
}

impl NameResolver for DefaultNameResolver {
    fn resolve_name(&self, qname: &str, attribute: bool) -> Option<QualifiedName> {
        resolve_with(qname, attribute, |p| self.prefix_uri(p))
    }
}

/// Shared QName resolution logic, given a prefix lookup
pub fn resolve_with<'a>(
    qname: &str,
    attribute: bool,
    lookup: impl Fn(&str) -> Option<&'a str>,
) -> Option<QualifiedName> {
    let qname = qname.trim();
    match qname.find(':') {
        Some(pos) => {
            let prefix = &qname[..pos];
            let local = &qname[pos + 1..];
            if local.contains(':') {
                return None;
            }
            lookup(prefix).map(|uri| QualifiedName::new(uri, local))
        }
        None => {
            if attribute {
                Some(QualifiedName::new("", qname))
            } else {
                Some(QualifiedName::new(lookup("").unwrap_or(""), qname))
            }
        }
    }
}

/// An unparsed `param` from a `data` pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawParam {
    pub name: String,
    pub value: String,
}

impl RawParam {
    pub fn new(name: &str, value: &str) -> RawParam {
        RawParam {
            name: name.to_string(),
            value: value.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ParamError {
    pub message: String,
}

impl ParamError {
    pub fn new(message: impl Into<String>) -> ParamError {
        ParamError {
            message: message.into(),
        }
    }
}

/// All the problems found with the parameters of one `data` pattern
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{location}: {}", join(.errors))]
pub struct ParameterParsingError {
    pub location: String,
    pub errors: Vec<ParamError>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ValueError {
    pub message: String,
}

impl ValueError {
    pub fn new(message: impl Into<String>) -> ValueError {
        ValueError {
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{location}: {}", join(.errors))]
pub struct ValueValidationError {
    pub location: String,
    pub errors: Vec<ValueError>,
}

fn join<T: fmt::Display>(errors: &[T]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Parameters of a `data` pattern, after parsing by the datatype
#[derive(Debug, Clone, Default)]
pub struct ParsedParams {
    pub raw: Vec<RawParam>,
    pub facets: xsd::Facets,
}

/// A value in the value space of some datatype
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedValue {
    String(String),
    Decimal(bigdecimal::BigDecimal),
    Float(f64),
    Boolean(bool),
    QName(QualifiedName),
    Binary(Vec<u8>),
    DateTime(xsd::Temporal),
    List(Vec<ParsedValue>),
}

pub trait Datatype: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    /// True when values can only be interpreted with a namespace context
    fn needs_context(&self) -> bool {
        false
    }

    fn parse_params(
        &self,
        location: &str,
        params: &[RawParam],
    ) -> Result<ParsedParams, ParameterParsingError>;

    fn parse_value(
        &self,
        location: &str,
        value: &str,
        context: Option<&dyn NameResolver>,
    ) -> Result<ParsedValue, ValueValidationError>;

    /// `None` if the value is allowed, otherwise the reasons it is not
    fn disallows(
        &self,
        value: &str,
        params: &ParsedParams,
        context: Option<&dyn NameResolver>,
    ) -> Option<Vec<ValueError>>;

    fn equal(
        &self,
        value: &str,
        schema_value: &ParsedValue,
        context: Option<&dyn NameResolver>,
    ) -> bool;

    fn value_length(&self, value: &str) -> usize;
}

pub trait DatatypeLibrary: Send + Sync {
    fn uri(&self) -> &str;
    fn datatype(&self, name: &str) -> Option<Arc<dyn Datatype>>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Errors {
    #[error("Unsupported datatype library namespace {namespace:?}")]
    UnsupportedDatatypeLibrary { namespace: String },
    #[error("The datatype library {library:?} does not support the type {name:?}")]
    UnknownDatatype { library: String, name: String },
}

/// The set of datatype libraries available to schemas
#[derive(Default)]
pub struct Registry {
    libraries: HashMap<String, Arc<dyn DatatypeLibrary>>,
}

impl Registry {
    pub fn new() -> Registry {
        Registry::default()
    }

    /// A frozen registry holding the Relax NG built-in and XML Schema libraries
    pub fn builtin() -> Arc<Registry> {
        let mut reg = Registry::new();
        reg.add(Arc::new(relax::BuiltinLibrary::default()));
        reg.add(Arc::new(xsd::XsdLibrary::default()));
        Arc::new(reg)
    }

    pub fn add(&mut self, lib: Arc<dyn DatatypeLibrary>) {
        self.libraries.insert(lib.uri().to_string(), lib);
    }

    pub fn find(&self, library: &str, name: &str) -> Result<Arc<dyn Datatype>, Errors> {
        let lib = self
            .libraries
            .get(library)
            .ok_or_else(|| Errors::UnsupportedDatatypeLibrary {
                namespace: library.to_string(),
            })?;
        lib.datatype(name).ok_or_else(|| Errors::UnknownDatatype {
            library: library.to_string(),
            name: name.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn resolver_contexts() {
        let mut r = DefaultNameResolver::default();
        r.enter_context();
        r.define_prefix("", "urn:default");
        r.define_prefix("x", "urn:x");
        assert_eq!(
            r.resolve_name("x:a", false),
            Some(QualifiedName::new("urn:x", "a"))
        );
        assert_eq!(
            r.resolve_name("a", false),
            Some(QualifiedName::new("urn:default", "a"))
        );
        assert_eq!(r.resolve_name("a", true), Some(QualifiedName::new("", "a")));
        assert_eq!(
            r.resolve_name("xml:lang", true),
            Some(QualifiedName::new("http://www.w3.org/XML/1998/namespace", "lang"))
        );
        r.leave_context();
        assert_eq!(r.resolve_name("x:a", false), None);
    }

    #[test]
    #[should_panic]
    fn leave_initial_context() {
        DefaultNameResolver::default().leave_context();
    }

    #[test]
    fn registry_lookup() {
        let reg = Registry::builtin();
        assert_matches!(reg.find("", "token"), Ok(_));
        assert_matches!(reg.find(xsd::NAMESPACE_URI, "int"), Ok(_));
        assert_matches!(
            reg.find("urn:nope", "int"),
            Err(Errors::UnsupportedDatatypeLibrary { .. })
        );
        assert_matches!(reg.find("", "int"), Err(Errors::UnknownDatatype { .. }));
    }
}
