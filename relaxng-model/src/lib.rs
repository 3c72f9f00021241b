//! Loading, simplification and compilation of Relax NG schemas.
//!
//! A [`Compiler`] loads a schema document (and whatever it includes) through a
//! [`ResourceLoader`], rewrites it into the simplified form, checks the restrictions that the
//! simplified form must obey, and finally builds an immutable [`model::Grammar`] ready for
//! validation.

use crate::datatype::{ParameterParsingError, Registry, ValueValidationError};
use codemap::CodeMap;
use relaxng_syntax::tree::{FileId, Location, NodeId, Tree};
use relaxng_syntax::uri::HrefError;
use std::fs;
use std::io;
use std::sync::Arc;
use url::Url;

mod build;
pub mod datatype;
pub mod json;
pub mod model;
pub mod names;
mod restrictions;
mod simplify;

#[derive(Debug, thiserror::Error)]
pub enum RelaxError {
    #[error("Problem loading {0}: {1}")]
    Io(Url, io::Error),
    /// Wraps a problem found while loading a resource via `include` or `externalRef`
    #[error("{1}")]
    IncludeError(codemap::Span, Box<RelaxError>),
    #[error("{1:?}")]
    XmlParse(codemap::Span, relaxng_syntax::xml::Error),
    #[error("Invalid href {href:?}: {reason:?}")]
    InvalidHref {
        span: codemap::Span,
        href: String,
        reason: HrefError,
    },
    #[error("Import loop: {}", join_urls(.chain))]
    IncludeLoop { span: codemap::Span, chain: Vec<Url> },
    #[error("Included files must have a top-level 'grammar' element")]
    IncludedFileMustBeGrammar { span: codemap::Span },
    /// The name is specified as an override for an include, but the included grammar did not
    /// have a definition of that name to be overridden
    #[error("Override {name:?} has no corresponding definition in included grammar")]
    OverrideMissingFromInclude {
        override_span: codemap::Span,
        include_span: codemap::Span,
        name: String,
    },
    #[error("{reason}: {uri:?}")]
    InvalidDatatypeLibrary {
        span: codemap::Span,
        uri: String,
        reason: &'static str,
    },
    #[error("Undefined namespace prefix {prefix:?}")]
    UndefinedNamespacePrefix { span: codemap::Span, prefix: String },
    /// The schema document does not have the structure Relax NG requires
    #[error("{message}")]
    InvalidSchema { span: codemap::Span, message: String },
    #[error("Duplicate definition of {name:?}")]
    DuplicateDefinition {
        name: String,
        duplicate: codemap::Span,
        original: codemap::Span,
    },
    /// the grammar combines some definition with both `choice` and `interleave`
    #[error("Definition of {name:?} mixes 'choice' and 'interleave' combine-rules")]
    DefineRulesMixesChoiceAndInterleave {
        name: String,
        this_span: codemap::Span,
        that_span: codemap::Span,
    },
    /// a `grammar` failed to specify a `start` pattern
    #[error("Grammar is missing a start rule")]
    StartRuleNotDefined { span: codemap::Span },
    #[error("Undefined: {identifier:?}")]
    UndefinedReference {
        span: codemap::Span,
        identifier: String,
    },
    /// a `parentRef` was used in a grammar that has no parent
    #[error("parentRef is not available in this context")]
    NoParentAvailable(codemap::Span),
    #[error("Recursive reference to {ref_id:?}")]
    RecursiveReference {
        ref_id: String,
        ref_span: codemap::Span,
        def_span: codemap::Span,
    },
    /// One of the restrictions on the simplified form of the schema is broken
    #[error("{message}")]
    Restriction { span: codemap::Span, message: String },
    #[error("{error}")]
    DatatypeError {
        span: codemap::Span,
        error: datatype::Errors,
    },
    #[error("{error}")]
    ParameterError {
        span: codemap::Span,
        error: ParameterParsingError,
    },
    #[error("{error}")]
    ValueError {
        span: codemap::Span,
        error: ValueValidationError,
    },
    #[error("{0}")]
    Json(#[from] json::JsonError),
}

fn join_urls(chain: &[Url]) -> String {
    chain
        .iter()
        .map(|u| u.as_str())
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// Broad classification of [`RelaxError`] values, for callers that need to branch on the kind
/// of failure rather than its details
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// the schema is not a correct Relax NG schema
    Schema,
    /// a datatype, parameter or value in the schema is unusable
    Datatype,
    /// a resource could not be loaded
    Io,
}

impl RelaxError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            RelaxError::Io(..) => ErrorCategory::Io,
            RelaxError::IncludeError(_, e) => e.category(),
            RelaxError::DatatypeError { .. }
            | RelaxError::ParameterError { .. }
            | RelaxError::ValueError { .. } => ErrorCategory::Datatype,
            _ => ErrorCategory::Schema,
        }
    }
}

/// A schema document as returned by a [`ResourceLoader`]
#[derive(Debug, Clone)]
pub struct Resource {
    url: Url,
    text: String,
}

impl Resource {
    pub fn new(url: Url, text: String) -> Resource {
        Resource { url, text }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

/// The only way schema loading performs I/O
pub trait ResourceLoader {
    fn load(&self, url: &Url) -> Result<Resource, RelaxError>;
}

/// Loads `file:` URLs from the local filesystem
pub struct FsLoader;

impl ResourceLoader for FsLoader {
    fn load(&self, url: &Url) -> Result<Resource, RelaxError> {
        let path = url.to_file_path().map_err(|_| {
            RelaxError::Io(
                url.clone(),
                io::Error::new(io::ErrorKind::InvalidInput, "not a file URL"),
            )
        })?;
        let text = fs::read_to_string(&path).map_err(|e| RelaxError::Io(url.clone(), e))?;
        Ok(Resource::new(url.clone(), text))
    }
}

/// The text of every loaded schema document, for turning tree locations into diagnostics
pub struct SourceMap {
    codemap: CodeMap,
    files: Vec<Arc<codemap::File>>,
    // spans for nodes that have no location at all
    generated: Arc<codemap::File>,
}

impl Default for SourceMap {
    fn default() -> Self {
        let mut codemap = CodeMap::new();
        let generated = codemap.add_file("<generated>".to_string(), String::new());
        SourceMap {
            codemap,
            files: vec![],
            generated,
        }
    }
}

impl SourceMap {
    pub fn add(&mut self, name: String, text: String) -> (FileId, Arc<codemap::File>) {
        let file = self.codemap.add_file(name, text);
        self.files.push(file.clone());
        (FileId(self.files.len() - 1), file)
    }

    pub fn codemap(&self) -> &CodeMap {
        &self.codemap
    }

    pub fn span(&self, location: &Location) -> codemap::Span {
        match self.files.get(location.file.0) {
            Some(f) => f
                .span
                .subspan(location.range.start as u64, location.range.end as u64),
            None => self.generated.span,
        }
    }

    /// The span of the node, or of its closest ancestor with a known location
    pub fn span_of(&self, tree: &Tree, id: NodeId) -> codemap::Span {
        tree.nearest_location(id)
            .map(|l| self.span(l))
            .unwrap_or(self.generated.span)
    }

    /// A placeholder span for problems that have no position in any document
    pub fn unknown_span(&self) -> codemap::Span {
        self.generated.span
    }
}

#[derive(Debug, Clone)]
pub struct CompilerOptions {
    /// The input is already in simplified form, so the simplification steps are skipped
    pub simplified_input: bool,
    /// Check the restrictions on the simplified form before building the grammar
    pub check_constraints: bool,
    /// Record a debugging path for every pattern
    pub keep_paths: bool,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        CompilerOptions {
            simplified_input: false,
            check_constraints: true,
            keep_paths: true,
        }
    }
}

/// A problem with the schema that does not prevent its use
#[derive(Debug, Clone)]
pub struct Warning {
    pub span: codemap::Span,
    pub message: String,
}

#[derive(Debug)]
pub struct Schema {
    pub grammar: Arc<model::Grammar>,
    pub warnings: Vec<Warning>,
}

pub struct Compiler<L: ResourceLoader> {
    sources: SourceMap,
    loader: L,
    registry: Arc<Registry>,
    options: CompilerOptions,
}

impl Default for Compiler<FsLoader> {
    fn default() -> Self {
        Self::new(FsLoader, CompilerOptions::default())
    }
}

impl<L: ResourceLoader> Compiler<L> {
    pub fn new(loader: L, options: CompilerOptions) -> Compiler<L> {
        Compiler {
            sources: SourceMap::default(),
            loader,
            registry: Registry::builtin(),
            options,
        }
    }

    /// Use the given (frozen) set of datatype libraries instead of the built-in ones
    pub fn with_registry(mut self, registry: Arc<Registry>) -> Compiler<L> {
        self.registry = registry;
        self
    }

    pub fn options(&self) -> &CompilerOptions {
        &self.options
    }

    pub fn codemap(&self) -> &CodeMap {
        self.sources.codemap()
    }

    /// Loads the schema at `url` and everything it refers to, returning the simplified tree
    pub fn simplify(&mut self, url: &Url) -> Result<Tree, RelaxError> {
        let mut tree = Tree::new();
        let root =
            simplify::externals::load(&mut tree, url, &self.loader, &mut self.sources, None)?;
        tree.set_root(root);
        if !self.options.simplified_input {
            simplify::simplify(&mut tree, &self.sources)?;
        }
        Ok(tree)
    }

    pub fn compile(&mut self, url: &Url) -> Result<Schema, RelaxError> {
        let tree = self.simplify(url)?;
        if self.options.check_constraints {
            restrictions::check(&tree, &self.sources)?;
        }
        let (grammar, warnings) = build::build(
            &tree,
            &self.sources,
            &self.registry,
            self.options.keep_paths,
        )?;
        for w in &warnings {
            log::warn!("{}", w.message);
        }
        Ok(Schema {
            grammar: Arc::new(grammar),
            warnings,
        })
    }

    pub fn dump_diagnostic(&self, err: &RelaxError) {
        let mut emitter = codemap_diagnostic::Emitter::stderr(
            codemap_diagnostic::ColorConfig::Always,
            Some(self.sources.codemap()),
        );
        let d = self.diagnostic(err);
        emitter.emit(&[d]);
    }

    #[allow(clippy::only_used_in_recursion)]
    pub fn diagnostic(&self, err: &RelaxError) -> codemap_diagnostic::Diagnostic {
        match err {
            RelaxError::IncludeError(span, err) => {
                let mut d = self.diagnostic(err);
                let style = if d.spans.is_empty() {
                    codemap_diagnostic::SpanStyle::Primary
                } else {
                    codemap_diagnostic::SpanStyle::Secondary
                };
                let label = codemap_diagnostic::SpanLabel {
                    span: *span,
                    style,
                    label: Some("as included here".to_owned()),
                };
                d.spans.push(label);
                d
            }
            RelaxError::Io(url, err) => codemap_diagnostic::Diagnostic {
                level: codemap_diagnostic::Level::Error,
                message: format!("Problem loading {}: {:?}", url, err.kind()),
                code: None,
                spans: vec![],
            },
            RelaxError::XmlParse(span, e) => {
                let message = match e {
                    relaxng_syntax::xml::Error::Expected(_, msg) => format!("Expected: {}", msg),
                    relaxng_syntax::xml::Error::Unexpected(_, msg) => {
                        format!("Unexpected {}", msg)
                    }
                    relaxng_syntax::xml::Error::Xml(_, msg) => {
                        format!("XML parsing error: {}", msg)
                    }
                };
                simple(message, *span, None)
            }
            RelaxError::InvalidHref { span, .. } => simple(err.to_string(), *span, None),
            RelaxError::IncludeLoop { span, .. } => simple(
                err.to_string(),
                *span,
                Some("Remove recursive include reference"),
            ),
            RelaxError::IncludedFileMustBeGrammar { span } => simple(
                "Included files must use a top-level 'grammar', not any other pattern element"
                    .to_string(),
                *span,
                Some("Add a 'grammar' declaration at the top level"),
            ),
            RelaxError::OverrideMissingFromInclude {
                override_span,
                include_span,
                name,
            } => {
                let override_label = codemap_diagnostic::SpanLabel {
                    span: *override_span,
                    style: codemap_diagnostic::SpanStyle::Primary,
                    label: Some("Either remove this override...".to_string()),
                };
                let include_label = codemap_diagnostic::SpanLabel {
                    span: *include_span,
                    style: codemap_diagnostic::SpanStyle::Secondary,
                    label: Some(format!(
                        "...or add a definition for {:?} to this grammar",
                        name
                    )),
                };
                codemap_diagnostic::Diagnostic {
                    level: codemap_diagnostic::Level::Error,
                    message: err.to_string(),
                    code: None,
                    spans: vec![override_label, include_label],
                }
            }
            RelaxError::InvalidDatatypeLibrary { span, .. }
            | RelaxError::InvalidSchema { span, .. }
            | RelaxError::Restriction { span, .. } => simple(err.to_string(), *span, None),
            RelaxError::UndefinedNamespacePrefix { span, .. } => {
                simple(err.to_string(), *span, Some("undefined"))
            }
            RelaxError::DuplicateDefinition {
                duplicate,
                original,
                ..
            } => {
                let dup = codemap_diagnostic::SpanLabel {
                    span: *duplicate,
                    style: codemap_diagnostic::SpanStyle::Primary,
                    label: Some("Duplicated here".to_string()),
                };
                let orig = codemap_diagnostic::SpanLabel {
                    span: *original,
                    style: codemap_diagnostic::SpanStyle::Secondary,
                    label: Some("First seen here".to_string()),
                };
                codemap_diagnostic::Diagnostic {
                    level: codemap_diagnostic::Level::Error,
                    message: err.to_string(),
                    code: None,
                    spans: vec![dup, orig],
                }
            }
            RelaxError::DefineRulesMixesChoiceAndInterleave {
                this_span,
                that_span,
                ..
            } => {
                let dup = codemap_diagnostic::SpanLabel {
                    span: *this_span,
                    style: codemap_diagnostic::SpanStyle::Primary,
                    label: Some("Defined here with one combine-rule".to_string()),
                };
                let orig = codemap_diagnostic::SpanLabel {
                    span: *that_span,
                    style: codemap_diagnostic::SpanStyle::Secondary,
                    label: Some(
                        "Previously defined here with a different combine-rule".to_string(),
                    ),
                };
                codemap_diagnostic::Diagnostic {
                    level: codemap_diagnostic::Level::Error,
                    message: err.to_string(),
                    code: None,
                    spans: vec![dup, orig],
                }
            }
            RelaxError::StartRuleNotDefined { span } => {
                simple(err.to_string(), *span, Some("needs a 'start' rule"))
            }
            RelaxError::UndefinedReference { span, .. } => simple(
                err.to_string(),
                *span,
                Some("name is referenced here, but is not defined"),
            ),
            RelaxError::NoParentAvailable(span) => simple(
                err.to_string(),
                *span,
                Some("No parent grammar in which to look-up this name"),
            ),
            RelaxError::RecursiveReference {
                ref_span,
                def_span,
                ..
            } => {
                let label = codemap_diagnostic::SpanLabel {
                    span: *ref_span,
                    style: codemap_diagnostic::SpanStyle::Primary,
                    label: None,
                };
                let definition = codemap_diagnostic::SpanLabel {
                    span: *def_span,
                    style: codemap_diagnostic::SpanStyle::Secondary,
                    label: Some("Definition is here".to_string()),
                };
                codemap_diagnostic::Diagnostic {
                    level: codemap_diagnostic::Level::Error,
                    message: err.to_string(),
                    code: None,
                    spans: vec![label, definition],
                }
            }
            RelaxError::DatatypeError { span, .. } => simple(err.to_string(), *span, None),
            RelaxError::ParameterError { span, error } => {
                let labels = error
                    .errors
                    .iter()
                    .map(|e| codemap_diagnostic::SpanLabel {
                        span: *span,
                        style: codemap_diagnostic::SpanStyle::Primary,
                        label: Some(e.message.clone()),
                    })
                    .collect();
                codemap_diagnostic::Diagnostic {
                    level: codemap_diagnostic::Level::Error,
                    message: "Problematic datatype parameters".to_string(),
                    code: None,
                    spans: labels,
                }
            }
            RelaxError::ValueError { span, error } => {
                let labels = error
                    .errors
                    .iter()
                    .map(|e| codemap_diagnostic::SpanLabel {
                        span: *span,
                        style: codemap_diagnostic::SpanStyle::Primary,
                        label: Some(e.message.clone()),
                    })
                    .collect();
                codemap_diagnostic::Diagnostic {
                    level: codemap_diagnostic::Level::Error,
                    message: "Invalid value".to_string(),
                    code: None,
                    spans: labels,
                }
            }
            RelaxError::Json(e) => codemap_diagnostic::Diagnostic {
                level: codemap_diagnostic::Level::Error,
                message: e.to_string(),
                code: None,
                spans: vec![],
            },
        }
    }
}

fn simple(
    message: String,
    span: codemap::Span,
    label: Option<&str>,
) -> codemap_diagnostic::Diagnostic {
    let label = codemap_diagnostic::SpanLabel {
        span,
        style: codemap_diagnostic::SpanStyle::Primary,
        label: label.map(|l| l.to_string()),
    };
    codemap_diagnostic::Diagnostic {
        level: codemap_diagnostic::Level::Error,
        message,
        code: None,
        spans: vec![label],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Pattern;
    use crate::names::NameClass;
    use assert_matches::*;
    use std::collections::HashMap;

    struct FS(HashMap<&'static str, &'static str>);
    impl ResourceLoader for FS {
        fn load(&self, url: &Url) -> Result<Resource, RelaxError> {
            match self.0.get(url.path()) {
                Some(t) => Ok(Resource::new(url.clone(), t.to_string())),
                None => Err(RelaxError::Io(
                    url.clone(),
                    io::Error::from(io::ErrorKind::NotFound),
                )),
            }
        }
    }

    fn fs(files: &[(&'static str, &'static str)]) -> FS {
        FS(files.iter().cloned().collect())
    }

    fn url(path: &str) -> Url {
        Url::parse("mem:/").unwrap().join(path).unwrap()
    }

    fn compile(files: &[(&'static str, &'static str)]) -> Result<Schema, RelaxError> {
        let mut c = Compiler::new(fs(files), CompilerOptions::default());
        c.compile(&url(files[0].0))
    }

    fn simplified(files: &[(&'static str, &'static str)]) -> String {
        let mut c = Compiler::new(fs(files), CompilerOptions::default());
        match c.simplify(&url(files[0].0)) {
            Ok(tree) => tree.to_xml_string(tree.root()),
            Err(e) => {
                c.dump_diagnostic(&e);
                panic!("{:?}", e);
            }
        }
    }

    #[test]
    fn refs() {
        let schema = compile(&[(
            "/test.rng",
            r#"<grammar xmlns="http://relaxng.org/ns/structure/1.0">
                 <start><ref name="foo"/></start>
                 <define name="foo">
                   <element name="x"><choice><ref name="foo"/><empty/></choice></element>
                 </define>
               </grammar>"#,
        )])
        .unwrap();
        let g = &schema.grammar;
        assert_matches!(g.pattern(g.start()), Pattern::Ref(d) => {
            let def = g.define(*d);
            assert_matches!(g.pattern(def.pattern), Pattern::Element(NameClass::Named { name, .. }, content) => {
                assert_eq!(name, "x");
                assert_matches!(g.pattern(*content), Pattern::Choice(a, b) => {
                    assert_matches!(g.pattern(*a), Pattern::Empty);
                    assert_matches!(g.pattern(*b), Pattern::Ref(d2) if d2 == d);
                })
            })
        })
    }

    #[test]
    fn include_self_ref() {
        let schema = compile(&[
            (
                "/main.rng",
                r#"<element name="doc" xmlns="http://relaxng.org/ns/structure/1.0">
                     <grammar><start><ref name="blocks"/></start><include href="elements.rng"/></grammar>
                   </element>"#,
            ),
            (
                "/elements.rng",
                r#"<grammar xmlns="http://relaxng.org/ns/structure/1.0">
                     <define name="blocks">
                       <element name="container"><optional><ref name="blocks"/></optional></element>
                     </define>
                   </grammar>"#,
            ),
        ]);
        assert_matches!(schema, Ok(s) => assert_eq!(s.grammar.defines().count(), 2));
    }

    #[test]
    fn include_cycle() {
        let err = compile(&[
            (
                "/a.rng",
                r#"<grammar xmlns="http://relaxng.org/ns/structure/1.0"><include href="b.rng"/></grammar>"#,
            ),
            (
                "/b.rng",
                r#"<grammar xmlns="http://relaxng.org/ns/structure/1.0"><include href="a.rng"/></grammar>"#,
            ),
        ])
        .err()
        .unwrap();
        assert_eq!(err.category(), ErrorCategory::Schema);
        let mut err = &err;
        while let RelaxError::IncludeError(_, inner) = err {
            err = inner;
        }
        assert_matches!(err, RelaxError::IncludeLoop { chain, .. } => {
            let names: Vec<_> = chain.iter().map(|u| u.path()).collect();
            assert_eq!(names, vec!["/a.rng", "/b.rng", "/a.rng"]);
        });
    }

    #[test]
    fn datatype_parameter_conflict() {
        let err = compile(&[(
            "/t.rng",
            r#"<element name="n" xmlns="http://relaxng.org/ns/structure/1.0"
                        datatypeLibrary="http://www.w3.org/2001/XMLSchema-datatypes">
                 <data type="int">
                   <param name="minInclusive">10</param>
                   <param name="maxInclusive">5</param>
                 </data>
               </element>"#,
        )])
        .err()
        .unwrap();
        assert_eq!(err.category(), ErrorCategory::Datatype);
        assert_matches!(err, RelaxError::ParameterError { error, .. } => {
            assert_eq!(error.errors[0].message, "minInclusive conflicts with maxInclusive");
        });
    }

    #[test]
    fn missing_file() {
        let err = compile(&[(
            "/t.rng",
            r#"<externalRef href="nope.rng" xmlns="http://relaxng.org/ns/structure/1.0"/>"#,
        )])
        .err()
        .unwrap();
        assert_eq!(err.category(), ErrorCategory::Io);
    }

    #[test]
    fn override_without_counterpart() {
        let err = compile(&[
            (
                "/a.rng",
                r#"<grammar xmlns="http://relaxng.org/ns/structure/1.0">
                     <include href="b.rng"><define name="missing"><empty/></define></include>
                   </grammar>"#,
            ),
            (
                "/b.rng",
                r#"<grammar xmlns="http://relaxng.org/ns/structure/1.0">
                     <start><element name="a"><empty/></element></start>
                   </grammar>"#,
            ),
        ])
        .err()
        .unwrap();
        assert_matches!(err, RelaxError::OverrideMissingFromInclude { name, .. } if name == "missing");
    }

    #[test]
    fn override_replaces_definition() {
        let out = simplified(&[
            (
                "/a.rng",
                r#"<grammar xmlns="http://relaxng.org/ns/structure/1.0">
                     <include href="b.rng"><define name="v"><text/></define></include>
                   </grammar>"#,
            ),
            (
                "/b.rng",
                r#"<grammar xmlns="http://relaxng.org/ns/structure/1.0">
                     <start><element name="a"><ref name="v"/></element></start>
                     <define name="v"><empty/></define>
                   </grammar>"#,
            ),
        ]);
        assert!(out.contains("<text/>"), "{}", out);
        assert!(!out.contains("<empty/>"), "{}", out);
    }

    #[test]
    fn external_ref_inherits_ns() {
        let out = simplified(&[
            (
                "/a.rng",
                r#"<element name="top" ns="urn:a" xmlns="http://relaxng.org/ns/structure/1.0">
                     <externalRef href="b.rng" ns="urn:b"/>
                   </element>"#,
            ),
            (
                "/b.rng",
                r#"<element name="inner" xmlns="http://relaxng.org/ns/structure/1.0"><empty/></element>"#,
            ),
        ]);
        assert!(out.contains(r#"<name ns="urn:b">inner</name>"#), "{}", out);
        assert!(out.contains(r#"<name ns="urn:a">top</name>"#), "{}", out);
    }

    #[test]
    fn simplification_is_idempotent() {
        let first = simplified(&[(
            "/t.rng",
            r#"<grammar xmlns="http://relaxng.org/ns/structure/1.0"
                        xmlns:x="urn:x"
                        datatypeLibrary="http://www.w3.org/2001/XMLSchema-datatypes">
                 <start>
                   <element name="x:doc">
                     <optional><attribute name="id"><data type="ID"/></attribute></optional>
                     <zeroOrMore><ref name="item"/></zeroOrMore>
                     <mixed><element name="note"><text/></element></mixed>
                   </element>
                 </start>
                 <define name="item">
                   <element name="item"><choice><value>a</value><value>b</value><value>c</value></choice></element>
                 </define>
               </grammar>"#,
        )]);
        let text: &'static str = Box::leak(first.clone().into_boxed_str());
        let second = simplified(&[("/s.rng", text)]);
        assert_eq!(first, second);
    }
}
