//! Validation of XML documents against a compiled Relax NG [`Grammar`].
//!
//! The core is [`GrammarWalker`], which consumes a stream of [`Event`]s.  [`Validator`] is a
//! front end producing those events from an `xmlparser` token stream.

use fnv::FnvHashMap;
use relaxng_model::datatype::DefaultNameResolver;
use relaxng_model::model::Grammar;
use relaxng_model::names::QualifiedName;
use std::collections::VecDeque;
use std::ops::Range;
use xmlparser::{ElementEnd, EntityDefinition, StrSpan, Token, Tokenizer};

pub mod errors;
pub mod events;
pub mod grammar;
pub mod walker;

pub use errors::ValidationError;
pub use events::{Event, Expected};
pub use grammar::GrammarWalker;

#[derive(Debug)]
pub enum ValidatorError<'a> {
    Xml(xmlparser::Error),
    /// The document does not conform to the grammar
    Invalid {
        span: Range<usize>,
        errors: Vec<ValidationError>,
        expected: Vec<Expected>,
    },
    UndefinedNamespacePrefix {
        prefix: StrSpan<'a>,
    },
    UndefinedEntity {
        name: &'a str,
        span: Range<usize>,
    },
    InvalidOrUnclosedEntity {
        span: Range<usize>,
    },
    /// Entities defined by reference to some external resource are not loaded
    ExternalEntity {
        name: StrSpan<'a>,
    },
}

pub struct Validator<'a> {
    walker: GrammarWalker<'a>,
    tokenizer: Tokenizer<'a>,
    stack: ElementStack<'a>,
    resolver: DefaultNameResolver,
    entity_definitions: FnvHashMap<String, String>,
    // character data seen since the last tag, which may arrive in several tokens
    text: Option<(Range<usize>, String)>,
    queued: VecDeque<ValidatorError<'a>>,
    // end of the most recent tag, where errors found at the end of the document are reported
    pos: usize,
    finished: bool,
}

impl<'a> Validator<'a> {
    pub fn new(grammar: &'a Grammar, tokenizer: Tokenizer<'a>) -> Validator<'a> {
        let mut entity_definitions = FnvHashMap::default();
        entity_definitions.insert("lt".to_string(), "<".to_string());
        entity_definitions.insert("gt".to_string(), ">".to_string());
        entity_definitions.insert("amp".to_string(), "&".to_string());
        entity_definitions.insert("apos".to_string(), "'".to_string());
        entity_definitions.insert("quot".to_string(), "\"".to_string());
        Validator {
            walker: GrammarWalker::new(grammar),
            tokenizer,
            stack: ElementStack::default(),
            resolver: DefaultNameResolver::default(),
            entity_definitions,
            text: None,
            queued: VecDeque::new(),
            pos: 0,
            finished: false,
        }
    }

    /// Processes the next token of the document.  Validation carries on after an `Err`, so
    /// callers wanting every problem should keep calling until `None` is returned.
    pub fn validate_next(&mut self) -> Option<Result<(), ValidatorError<'a>>> {
        if let Some(err) = self.queued.pop_front() {
            return Some(Err(err));
        }
        if self.finished {
            return None;
        }
        match self.tokenizer.next() {
            Some(Ok(token)) => {
                if let Err(err) = self.validate(token) {
                    self.queued.push_back(err);
                }
                Some(self.queued.pop_front().map_or(Ok(()), Err))
            }
            Some(Err(err)) => {
                self.finished = true;
                Some(Err(ValidatorError::Xml(err)))
            }
            None => {
                self.finished = true;
                let end = self.pos;
                let errors = self.walker.end();
                if errors.is_empty() {
                    None
                } else {
                    Some(Err(ValidatorError::Invalid {
                        span: end..end,
                        errors,
                        expected: self.walker.expected().to_vec(),
                    }))
                }
            }
        }
    }

    /// The events the grammar would accept at this point in the document
    pub fn possible(&self) -> Vec<Expected> {
        self.walker.possible()
    }

    fn validate(&mut self, token: Token<'a>) -> Result<(), ValidatorError<'a>> {
        match token {
            Token::ElementStart {
                prefix,
                local,
                span: _,
            } => {
                self.flush_text();
                self.stack.push(prefix, local);
                Ok(())
            }
            Token::Attribute {
                prefix,
                local,
                value,
                span,
            } => {
                self.stack.add_attr(prefix, local, value, span);
                Ok(())
            }
            Token::ElementEnd { end, span } => {
                self.pos = span.end();
                let span = span.start()..span.end();
                match end {
                    ElementEnd::Open => self.start_tag(span),
                    ElementEnd::Empty => {
                        if let Err(err) = self.start_tag(span.clone()) {
                            self.queued.push_back(err);
                        }
                        self.end_tag(span)
                    }
                    ElementEnd::Close(_, _) => {
                        self.flush_text();
                        self.end_tag(span)
                    }
                }
            }
            Token::Text { text } => {
                if self.stack.is_empty() {
                    // only whitespace may appear outside the document element
                    return Ok(());
                }
                let decoded = self.decode(text, false)?;
                self.push_text(text.start()..text.end(), &decoded);
                Ok(())
            }
            Token::Cdata { text, span } => {
                self.push_text(span.start()..span.end(), text.as_str());
                Ok(())
            }
            Token::EntityDeclaration {
                name,
                definition,
                span: _,
            } => match definition {
                EntityDefinition::EntityValue(val) => {
                    self.entity_definitions
                        .insert(name.to_string(), val.to_string());
                    Ok(())
                }
                EntityDefinition::ExternalId(_) => Err(ValidatorError::ExternalEntity { name }),
            },
            Token::Declaration { .. }
            | Token::ProcessingInstruction { .. }
            | Token::Comment { .. }
            | Token::DtdStart { .. }
            | Token::EmptyDtd { .. }
            | Token::DtdEnd { .. } => Ok(()),
        }
    }

    fn start_tag(&mut self, span: Range<usize>) -> Result<(), ValidatorError<'a>> {
        self.resolver.enter_context();
        for ns in self.stack.current_namespaces() {
            self.resolver
                .define_prefix(ns.prefix.as_str(), ns.namespace_uri.as_str());
        }
        let name = match self.stack.resolve_current() {
            Ok(name) => name,
            Err(err) => {
                self.queued.push_back(err);
                self.stack.fallback_name()
            }
        };
        let mut attributes = vec![];
        for attr in self.stack.current_attributes() {
            match self.stack.resolve_attribute(attr) {
                Ok(attr_name) => match self.decode(attr.value, true) {
                    Ok(value) => attributes.push((attr_name, value)),
                    Err(err) => {
                        self.queued.push_back(err);
                        attributes.push((attr_name, attr.value.to_string()));
                    }
                },
                Err(err) => self.queued.push_back(err),
            }
        }
        let errors = self
            .walker
            .fire_event(Event::StartTagAndAttributes(name, attributes), &self.resolver);
        self.invalid(span, errors)
    }

    fn end_tag(&mut self, span: Range<usize>) -> Result<(), ValidatorError<'a>> {
        let name = match self.stack.pop() {
            Some(name) => name,
            // the tokenizer does not check that tags balance
            None => {
                return self.invalid(
                    span,
                    vec![ValidationError::message("end tag without a start tag")],
                )
            }
        };
        let errors = self.walker.fire_event(Event::EndTag(name), &self.resolver);
        self.resolver.leave_context();
        self.invalid(span, errors)
    }

    fn push_text(&mut self, span: Range<usize>, text: &str) {
        match &mut self.text {
            Some((pending_span, pending)) => {
                pending_span.end = span.end;
                pending.push_str(text);
            }
            None => self.text = Some((span, text.to_string())),
        }
    }

    fn flush_text(&mut self) {
        if let Some((span, text)) = self.text.take() {
            let errors = self.walker.fire_event(Event::Text(text), &self.resolver);
            if let Err(err) = self.invalid(span, errors) {
                self.queued.push_back(err);
            }
        }
    }

    fn invalid(
        &self,
        span: Range<usize>,
        errors: Vec<ValidationError>,
    ) -> Result<(), ValidatorError<'a>> {
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ValidatorError::Invalid {
                span,
                errors,
                expected: self.walker.expected().to_vec(),
            })
        }
    }

    /// Replaces entity and character references.  Attribute values also have their whitespace
    /// characters normalised to spaces, as an XML processor would.
    fn decode(&self, text: StrSpan<'a>, attribute: bool) -> Result<String, ValidatorError<'a>> {
        let mut buffer = String::new();
        for part in parse_entities(text.start(), text.as_str()) {
            match part? {
                Txt::Text(_pos, val) => {
                    if attribute {
                        buffer.extend(val.chars().map(|c| {
                            if walker::is_whitespace_char(c) {
                                ' '
                            } else {
                                c
                            }
                        }));
                    } else {
                        buffer.push_str(val);
                    }
                }
                Txt::Entity(pos, name) => match self.entity_definitions.get(name) {
                    Some(val) => buffer.push_str(val),
                    None => {
                        return Err(ValidatorError::UndefinedEntity {
                            name,
                            span: pos..pos + name.len(),
                        })
                    }
                },
                Txt::Char(_pos, val) => buffer.push(val),
            }
        }
        Ok(buffer)
    }

    pub fn diagnostic(
        &self,
        name: String,
        source: String,
        err: &ValidatorError,
    ) -> (codemap::CodeMap, Vec<codemap_diagnostic::Diagnostic>) {
        let mut map = codemap::CodeMap::new();
        let file = map.add_file(name, source);
        let mut diagnostics = vec![];
        let error = |span: codemap::Span, label: Option<String>, message: String| {
            codemap_diagnostic::Diagnostic {
                level: codemap_diagnostic::Level::Error,
                message,
                code: None,
                spans: vec![codemap_diagnostic::SpanLabel {
                    span,
                    label,
                    style: codemap_diagnostic::SpanStyle::Primary,
                }],
            }
        };
        let subspan = |range: &Range<usize>| {
            let len = file.source().len();
            file.span
                .subspan(range.start.min(len) as _, range.end.min(len) as _)
        };
        match err {
            ValidatorError::Xml(err) => {
                let row = (err.pos().row as usize).saturating_sub(1);
                let span = if row < file.num_lines() {
                    file.line_span(row)
                } else {
                    file.span
                };
                diagnostics.push(error(span, None, format!("{}", err)));
            }
            ValidatorError::Invalid {
                span,
                errors,
                expected,
            } => {
                for e in errors {
                    diagnostics.push(error(subspan(span), Some("invalid".to_string()), e.to_string()));
                }
                if !expected.is_empty() {
                    let desc: Vec<String> = expected.iter().map(ToString::to_string).collect();
                    diagnostics.push(codemap_diagnostic::Diagnostic {
                        level: codemap_diagnostic::Level::Help,
                        message: format!("Expected {}", desc.join(", ")),
                        code: None,
                        spans: vec![],
                    });
                }
            }
            ValidatorError::UndefinedNamespacePrefix { prefix } => {
                diagnostics.push(error(
                    subspan(&(prefix.start()..prefix.end())),
                    Some(format!(
                        "Add an xmlns:{}=\"..\" attribute to define this prefix",
                        prefix.as_str()
                    )),
                    format!("The prefix {:?} is not defined", prefix.as_str()),
                ));
            }
            ValidatorError::UndefinedEntity { name, span } => {
                diagnostics.push(error(
                    subspan(span),
                    Some("undefined".to_string()),
                    format!("The entity &{};  is not defined", name),
                ));
            }
            ValidatorError::InvalidOrUnclosedEntity { span } => {
                diagnostics.push(error(
                    subspan(span),
                    None,
                    "Invalid or unclosed entity reference".to_string(),
                ));
            }
            ValidatorError::ExternalEntity { name } => {
                diagnostics.push(error(
                    subspan(&(name.start()..name.end())),
                    None,
                    format!("The external entity {:?} cannot be loaded", name.as_str()),
                ));
            }
        }
        (map, diagnostics)
    }
}

#[derive(Debug)]
enum Txt<'a> {
    Text(usize, &'a str),
    Entity(usize, &'a str),
    Char(usize, char),
}

fn parse_entities(pos: usize, text: &str) -> impl Iterator<Item = Result<Txt, ValidatorError>> {
    struct Entities<'a> {
        text: &'a str,
        pos: usize,
        offset: usize,
        in_entity: bool,
    }
    impl<'a> Iterator for Entities<'a> {
        type Item = Result<Txt<'a>, ValidatorError<'a>>;

        fn next(&mut self) -> Option<Self::Item> {
            if self.offset == self.text.len() {
                return None;
            }
            for (i, c) in self.text[self.offset..].char_indices() {
                if self.in_entity {
                    if c == ';' {
                        self.in_entity = false;
                        let text = &self.text[self.offset..self.offset + i];
                        let result = if let Some(text) = text.strip_prefix('#') {
                            numeric_entity(self.pos + self.offset, text)
                        } else {
                            Ok(Txt::Entity(self.offset + self.pos, text))
                        };
                        self.offset += i + 1;
                        return Some(result);
                    }
                } else if c == '&' {
                    self.in_entity = true;
                    let result = Txt::Text(
                        self.offset + self.pos,
                        &self.text[self.offset..self.offset + i],
                    );
                    self.offset += i + 1;
                    return Some(Ok(result));
                }
            }
            if self.in_entity {
                let span = self.pos + self.offset - 1..self.pos + self.offset;
                self.offset = self.text.len();
                Some(Err(ValidatorError::InvalidOrUnclosedEntity { span }))
            } else {
                let result = Txt::Text(self.offset + self.pos, &self.text[self.offset..]);
                self.offset = self.text.len();
                Some(Ok(result))
            }
        }
    }
    fn numeric_entity<'a>(pos: usize, text: &str) -> Result<Txt<'a>, ValidatorError<'a>> {
        if text.is_empty() {
            return Err(ValidatorError::InvalidOrUnclosedEntity { span: pos..pos });
        }
        let c = if let Some(text) = text.strip_prefix('x') {
            let pos = pos + 1;
            if text.is_empty() {
                return Err(ValidatorError::InvalidOrUnclosedEntity { span: pos..pos });
            }
            u32::from_str_radix(text, 16)
                .map_err(|_e| ValidatorError::InvalidOrUnclosedEntity { span: pos..pos })?
        } else {
            text.parse()
                .map_err(|_e| ValidatorError::InvalidOrUnclosedEntity { span: pos..pos })?
        };
        Ok(Txt::Char(
            pos,
            std::char::from_u32(c)
                .ok_or(ValidatorError::InvalidOrUnclosedEntity { span: pos..pos })?,
        ))
    }
    Entities {
        text,
        pos,
        offset: 0,
        in_entity: false,
    }
}

#[derive(Default)]
struct ElementStack<'a> {
    elements: Vec<ElementState<'a>>,
}

impl<'a> ElementStack<'a> {
    fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    fn lookup_namespace_uri(&self, prefix: &str) -> Option<StrSpan<'a>> {
        self.elements
            .iter()
            .rev()
            .find_map(|elem| elem.lookup_namespace_uri(prefix))
    }

    fn try_lookup_namespace_uri(&self, prefix: StrSpan<'a>) -> Result<String, ValidatorError<'a>> {
        if prefix.as_str() == "xml" {
            return Ok("http://www.w3.org/XML/1998/namespace".to_string());
        }
        self.lookup_namespace_uri(&prefix)
            .map(|uri| uri.to_string())
            .ok_or(ValidatorError::UndefinedNamespacePrefix { prefix })
    }

    fn push(&mut self, prefix: StrSpan<'a>, local: StrSpan<'a>) {
        self.elements.push(ElementState {
            prefix,
            local,
            namespaces: vec![],
            attributes: vec![],
            resolved: None,
        })
    }

    fn add_attr(
        &mut self,
        prefix: StrSpan<'a>,
        local: StrSpan<'a>,
        value: StrSpan<'a>,
        span: StrSpan<'a>,
    ) {
        let curr = match self.elements.last_mut() {
            Some(curr) => curr,
            None => return,
        };
        if prefix.as_str() == "xmlns" {
            curr.namespaces.push(Ns {
                prefix: local,
                namespace_uri: value,
            })
        } else if prefix.as_str() == "" && local.as_str() == "xmlns" {
            curr.namespaces.push(Ns {
                prefix,
                namespace_uri: value,
            })
        } else {
            curr.attributes.push(UnresolvedAttr {
                prefix,
                local,
                value,
                span,
            })
        }
    }

    fn current_namespaces(&self) -> Vec<Ns<'a>> {
        self.elements
            .last()
            .map(|e| e.namespaces.clone())
            .unwrap_or_default()
    }

    fn current_attributes(&self) -> Vec<UnresolvedAttr<'a>> {
        self.elements
            .last()
            .map(|e| e.attributes.clone())
            .unwrap_or_default()
    }

    /// Resolves the name of the innermost element, remembering it for the end tag
    fn resolve_current(&mut self) -> Result<QualifiedName, ValidatorError<'a>> {
        let (prefix, local) = match self.elements.last() {
            Some(curr) => (curr.prefix, curr.local),
            None => return Ok(QualifiedName::new("", "")),
        };
        let namespace_uri = if prefix.as_str().is_empty() {
            self.lookup_namespace_uri("")
                .map(|uri| uri.to_string())
                .unwrap_or_default()
        } else {
            self.try_lookup_namespace_uri(prefix)?
        };
        let name = QualifiedName::new(&namespace_uri, local.as_str());
        if let Some(curr) = self.elements.last_mut() {
            curr.resolved = Some(name.clone());
        }
        Ok(name)
    }

    /// The name used for an element whose prefix could not be resolved
    fn fallback_name(&mut self) -> QualifiedName {
        let name = match self.elements.last() {
            Some(curr) => QualifiedName::new("", curr.local.as_str()),
            None => QualifiedName::new("", ""),
        };
        if let Some(curr) = self.elements.last_mut() {
            curr.resolved = Some(name.clone());
        }
        name
    }

    fn resolve_attribute(&self, attr: UnresolvedAttr<'a>) -> Result<QualifiedName, ValidatorError<'a>> {
        // unprefixed attributes are in no namespace, whatever the default namespace
        let namespace_uri = if attr.prefix.as_str().is_empty() {
            String::new()
        } else {
            self.try_lookup_namespace_uri(attr.prefix)?
        };
        Ok(QualifiedName::new(&namespace_uri, attr.local.as_str()))
    }

    /// Pops the innermost element, giving the name its start tag resolved to
    fn pop(&mut self) -> Option<QualifiedName> {
        self.elements.pop().map(|e| {
            e.resolved
                .unwrap_or_else(|| QualifiedName::new("", e.local.as_str()))
        })
    }
}

#[derive(Clone, Copy)]
struct UnresolvedAttr<'a> {
    prefix: StrSpan<'a>,
    local: StrSpan<'a>,
    value: StrSpan<'a>,
    #[allow(unused)]
    span: StrSpan<'a>,
}

struct ElementState<'a> {
    prefix: StrSpan<'a>,
    local: StrSpan<'a>,
    namespaces: Vec<Ns<'a>>,
    attributes: Vec<UnresolvedAttr<'a>>,
    resolved: Option<QualifiedName>,
}

impl<'a> ElementState<'a> {
    fn lookup_namespace_uri(&self, prefix: &str) -> Option<StrSpan<'a>> {
        self.namespaces
            .iter()
            .find(|ns| ns.prefix.as_str() == prefix)
            .map(|ns| ns.namespace_uri)
    }
}

#[derive(Clone, Copy)]
struct Ns<'a> {
    prefix: StrSpan<'a>,
    namespace_uri: StrSpan<'a>,
}

#[cfg(test)]
mod tests {
    use crate::{Validator, ValidatorError};
    use assert_matches::assert_matches;
    use relaxng_model::{Compiler, CompilerOptions, RelaxError, Resource, ResourceLoader, Schema};
    use std::io;
    use url::Url;

    struct FS(String);
    impl ResourceLoader for FS {
        fn load(&self, url: &Url) -> Result<Resource, RelaxError> {
            match url.path() {
                "/main.rng" => Ok(Resource::new(url.clone(), self.0.clone())),
                _ => Err(RelaxError::Io(
                    url.clone(),
                    io::Error::from(io::ErrorKind::NotFound),
                )),
            }
        }
    }

    struct Fixture {
        schema: Schema,
    }
    impl Fixture {
        fn correct(schema: &str) -> Fixture {
            let mut c = Compiler::new(FS(schema.to_string()), CompilerOptions::default());
            let input = Url::parse("mem:/main.rng").unwrap();
            let schema = match c.compile(&input) {
                Ok(s) => s,
                Err(e) => {
                    c.dump_diagnostic(&e);
                    panic!("{e:?}");
                }
            };
            Fixture { schema }
        }

        fn check(&self, xml: &str) -> Vec<String> {
            let reader = xmlparser::Tokenizer::from(xml);
            let mut v = Validator::new(&self.schema.grammar, reader);
            let mut errors = vec![];
            while let Some(i) = v.validate_next() {
                if let Err(err) = i {
                    let (map, d) = v.diagnostic("doc.xml".to_string(), xml.to_string(), &err);
                    let mut emitter = codemap_diagnostic::Emitter::stderr(
                        codemap_diagnostic::ColorConfig::Auto,
                        Some(&map),
                    );
                    emitter.emit(&d[..]);
                    errors.push(format!("{err:?}"));
                }
            }
            errors
        }

        fn valid(&self, xml: &str) {
            let errors = self.check(xml);
            assert!(errors.is_empty(), "{errors:?}");
        }

        fn invalid(&self, xml: &str) {
            assert!(
                !self.check(xml).is_empty(),
                "Invalid input was accepted by the validator"
            )
        }
    }

    const RNG: &str = "http://relaxng.org/ns/structure/1.0";
    const XSD: &str = "http://www.w3.org/2001/XMLSchema-datatypes";

    fn grammar(body: &str) -> Fixture {
        Fixture::correct(&format!(
            r#"<grammar xmlns="{RNG}" datatypeLibrary="{XSD}">{body}</grammar>"#
        ))
    }

    fn start(body: &str) -> Fixture {
        grammar(&format!("<start>{body}</start>"))
    }

    #[test]
    fn recur() {
        grammar(
            r#"<start><ref name="b"/></start>
               <define name="b"><element name="a"><optional><ref name="b"/></optional></element></define>"#,
        )
        .valid("<?xml version=\"1.0\"?><a><a></a></a>");
    }

    #[test]
    fn attr() {
        start(r#"<element name="a"><attribute name="b"/></element>"#)
            .valid("<?xml version=\"1.0\"?><a b=\"\"/>");
    }

    #[test]
    fn attr_group_incomplete() {
        // schema requires both attributes, but the instance document only has the first one
        start(r#"<element name="e"><attribute name="a"/><attribute name="b"/></element>"#)
            .invalid("<?xml version=\"1.0\"?><e a=\"\"/>");
    }

    #[test]
    fn attr_choice() {
        let f = start(
            r#"<element name="a"><choice><attribute name="a"/><attribute name="b"/></choice></element>"#,
        );
        f.valid("<a a=\"\"/>");
        f.valid("<a b=\"\"/>");
        f.invalid("<a/>");
        f.invalid("<a c=\"\"/>");
    }

    #[test]
    fn attr_unexpected() {
        start(r#"<element name="a"><attribute name="a"/></element>"#)
            .invalid("<?xml version=\"1.0\"?><a a=\"\" b=\"\"/>");
    }

    #[test]
    fn attr_value_typed() {
        let f = start(r#"<element name="a"><attribute name="n"><data type="int"/></attribute></element>"#);
        f.valid("<a n=\" 42 \"/>");
        f.invalid("<a n=\"forty-two\"/>");
    }

    #[test]
    fn elem_text_empty() {
        // if the only child of an element is whitespace, this should still match 'empty'
        start(r#"<element name="e"><empty/></element>"#).valid("<?xml version=\"1.0\"?><e> </e>");
    }

    #[test]
    fn elem_only_children_whitespace() {
        start(r#"<element name="e1"><element name="e2"><empty/></element></element>"#)
            .valid("<?xml version=\"1.0\"?><e1> <e2/> </e1>");
    }

    #[test]
    fn list() {
        start(
            r#"<element name="e1"><list><value type="token" datatypeLibrary="">one</value><value type="token" datatypeLibrary="">two</value></list></element>"#,
        )
        .valid("<?xml version=\"1.0\"?><e1>one two</e1>");
    }

    #[test]
    fn list_one_or_more() {
        let f = start(
            r#"<element name="e1"><list><oneOrMore><value datatypeLibrary="">x</value></oneOrMore></list></element>"#,
        );
        f.valid("<?xml version=\"1.0\"?><e1>x</e1>");
        f.valid("<e1> x  x x </e1>");
        f.invalid("<e1>x y</e1>");
        f.invalid("<e1/>");
    }

    #[test]
    fn element_whitespace_one_or_more() {
        // the whitespace prior to the initial <b/> should not make the doc invalid
        start(r#"<element name="a"><oneOrMore><element name="b"><empty/></element></oneOrMore></element>"#)
            .valid("<a> <b/><b/><b/></a>");
    }

    #[test]
    fn text_element_group() {
        start(r#"<element name="a"><text/><element name="b"><empty/></element></element>"#)
            .valid("<a>foo <b/></a>");
    }

    #[test]
    fn text_between_elements() {
        let f = start(
            r#"<element name="e"><element name="c"><empty/></element><element name="d"><empty/></element></element>"#,
        );
        f.valid("<e><c/>   <d/></e>");
        let errors = f.check("<e><c/>X<d/></e>");
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("text not allowed here"), "{errors:?}");
    }

    #[test]
    fn datavalue_in_parts() {
        // the ampersand means the text reaches the validator in pieces, which must be joined
        // into a single value
        start(r#"<element name="a"><data type="string"/></element>"#).valid("<a>foo &amp; bar</a>");
    }

    #[test]
    fn cdata_joins_text() {
        start(r#"<element name="a"><value type="string">x &lt; y</value></element>"#)
            .valid("<a>x <![CDATA[<]]> y</a>");
    }

    #[test]
    fn top_level_grammar() {
        grammar(r#"<start><element name="a"><empty/></element></start>"#).valid("<a/>");
        Fixture::correct(&format!(r#"<element name="a" xmlns="{RNG}"><empty/></element>"#))
            .valid("<a/>");
    }

    #[test]
    fn attribute_any_other_namespace() {
        start(
            r#"<element name="MPD" ns="urn:foo">
                 <optional><attribute name="mediaPresentationDuration"><data type="duration"/></attribute></optional>
                 <oneOrMore><attribute><anyName><except><nsName ns="urn:foo"/><nsName ns=""/></except></anyName></attribute></oneOrMore>
               </element>"#,
        )
        .invalid(
            "<?xml version=\"1.0\"?>\
            <MPD xmlns=\"urn:foo\" mediaPresentationDuration=\"PT0H11M58.998S\"></MPD>",
        );
    }

    #[test]
    fn namespaces() {
        let f = start(r#"<element name="a" ns="urn:x"><attribute name="b" ns="urn:y"/></element>"#);
        f.valid(r#"<p:a xmlns:p="urn:x" xmlns:q="urn:y" q:b=""/>"#);
        f.valid(r#"<a xmlns="urn:x" xmlns:q="urn:y" q:b=""/>"#);
        // the default namespace does not apply to attributes
        f.invalid(r#"<a xmlns="urn:x" b=""/>"#);
    }

    #[test]
    fn qname_values() {
        let f = start(r#"<element name="a"><data type="QName"/></element>"#);
        f.valid(r#"<a xmlns:p="urn:p">p:x</a>"#);
        f.invalid(r#"<a>q:x</a>"#);
    }

    #[test]
    fn undefined_prefix() {
        let f = start(r#"<element name="a"><empty/></element>"#);
        let reader = xmlparser::Tokenizer::from("<x:a/>");
        let mut v = Validator::new(&f.schema.grammar, reader);
        let mut errors = vec![];
        while let Some(r) = v.validate_next() {
            if let Err(e) = r {
                errors.push(e);
            }
        }
        assert_matches!(
            &errors[0],
            ValidatorError::UndefinedNamespacePrefix { prefix } if prefix.as_str() == "x"
        );
    }

    #[test]
    fn entities() {
        let f = start(r#"<element name="a"><value>bar</value></element>"#);
        f.valid(r#"<!DOCTYPE a [<!ENTITY foo "bar">]><a>&foo;</a>"#);
        f.valid("<a>&#98;&#x61;r</a>");
        let reader = xmlparser::Tokenizer::from("<a>&nope;</a>");
        let mut v = Validator::new(&f.schema.grammar, reader);
        let mut first = None;
        while let Some(r) = v.validate_next() {
            if let Err(e) = r {
                first.get_or_insert(e);
            }
        }
        assert_matches!(first, Some(ValidatorError::UndefinedEntity { name: "nope", .. }));
    }

    #[test]
    fn errors_carry_on() {
        let f = start(
            r#"<element name="a"><zeroOrMore><element name="b"><data type="int"/></element></zeroOrMore></element>"#,
        );
        let reader = xmlparser::Tokenizer::from("<a><b>1</b><b>x</b><b>2</b><b>y</b></a>");
        let mut v = Validator::new(&f.schema.grammar, reader);
        let mut messages = vec![];
        while let Some(r) = v.validate_next() {
            if let Err(ValidatorError::Invalid { errors, .. }) = r {
                messages.extend(errors.iter().map(ToString::to_string));
            }
        }
        let rejected = messages
            .iter()
            .filter(|m| *m == "text not allowed here")
            .count();
        assert_eq!(rejected, 2, "{messages:?}");
    }

    #[test]
    fn parse_entities() {
        let mut iter = super::parse_entities(0, "foo &bar; blat");
        assert_matches!(iter.next(), Some(Ok(super::Txt::Text(0, "foo "))));
        assert_matches!(iter.next(), Some(Ok(super::Txt::Entity(5, "bar"))));
        assert_matches!(iter.next(), Some(Ok(super::Txt::Text(9, " blat"))));
        assert_matches!(iter.next(), None);
    }
}
