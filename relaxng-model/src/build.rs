//! Turns a simplified schema tree into a [`Grammar`].

use crate::datatype::{xsd, DefaultNameResolver, RawParam, Registry};
use crate::model::{BuildError, DataPattern, Grammar, GrammarBuilder, Pattern, PatternId, ValuePattern};
use crate::names::NameClass;
use crate::{RelaxError, SourceMap, Warning};
use relaxng_syntax::tree::{NodeId, Tree};
use std::sync::Arc;

pub(crate) fn build(
    tree: &Tree,
    sources: &SourceMap,
    registry: &Arc<Registry>,
    keep_paths: bool,
) -> Result<(Grammar, Vec<Warning>), RelaxError> {
    let mut b = Builder {
        tree,
        sources,
        registry: registry.as_ref(),
        keep_paths,
        grammar: GrammarBuilder::new(),
        warnings: vec![],
    };
    let root = tree.root();
    if !tree.is(root, "grammar") {
        return Err(invalid(tree, sources, root, "expected a 'grammar' element".to_string()));
    }
    let mut start = None;
    for c in tree.element_children(root) {
        match tree.name(c) {
            "start" => start = Some(b.content(c)?),
            "define" => {
                let body = b.content(c)?;
                let name = tree.attribute(c, "name").unwrap_or_default();
                b.grammar
                    .set_define(name, body)
                    .map_err(|e| invalid(tree, sources, c, e.to_string()))?;
            }
            other => {
                return Err(invalid(
                    tree,
                    sources,
                    c,
                    format!("'{}' is not allowed in a simplified grammar", other),
                ))
            }
        }
    }
    let start = match start {
        Some(s) => s,
        None => {
            return Err(RelaxError::StartRuleNotDefined {
                span: sources.span_of(tree, root),
            })
        }
    };
    let grammar = b.grammar.finish(start).map_err(|e| match e {
        BuildError::UndefinedReference { name } => RelaxError::UndefinedReference {
            span: sources.span_of(tree, root),
            identifier: name,
        },
        other => invalid(tree, sources, root, other.to_string()),
    })?;
    Ok((grammar, b.warnings))
}

struct Builder<'a> {
    tree: &'a Tree,
    sources: &'a SourceMap,
    registry: &'a Registry,
    keep_paths: bool,
    grammar: GrammarBuilder,
    warnings: Vec<Warning>,
}

impl<'a> Builder<'a> {
    /// The pattern held by a `start`, `define`, `list` or similar single-child element
    fn content(&mut self, el: NodeId) -> Result<PatternId, RelaxError> {
        match self.tree.first_element_child(el) {
            Some(c) => self.pattern(c),
            None => Err(invalid(
                self.tree,
                self.sources,
                el,
                format!("'{}' requires a pattern", self.tree.name(el)),
            )),
        }
    }

    fn pair(&mut self, el: NodeId) -> Result<(NodeId, NodeId), RelaxError> {
        let children = self.tree.element_children(el);
        if children.len() != 2 {
            return Err(invalid(
                self.tree,
                self.sources,
                el,
                format!("'{}' must have exactly two children", self.tree.name(el)),
            ));
        }
        Ok((children[0], children[1]))
    }

    fn pattern(&mut self, el: NodeId) -> Result<PatternId, RelaxError> {
        let pattern = match self.tree.name(el) {
            "empty" => Pattern::Empty,
            "text" => Pattern::Text,
            "notAllowed" => Pattern::NotAllowed,
            "data" => Pattern::Data(self.data(el)?),
            "value" => Pattern::Value(self.value(el)?),
            "list" => Pattern::List(self.content(el)?),
            "oneOrMore" => Pattern::OneOrMore(self.content(el)?),
            "attribute" | "element" => {
                let (nc, content) = self.pair(el)?;
                let nc = name_class_of(self.tree, self.sources, nc)?;
                let content = self.pattern(content)?;
                if self.tree.is(el, "attribute") {
                    Pattern::Attribute(nc, content)
                } else {
                    Pattern::Element(nc, content)
                }
            }
            "choice" | "group" | "interleave" => {
                let (a, b) = self.pair(el)?;
                let a = self.pattern(a)?;
                let b = self.pattern(b)?;
                match self.tree.name(el) {
                    "choice" => Pattern::Choice(a, b),
                    "group" => Pattern::Group(a, b),
                    _ => Pattern::Interleave(a, b),
                }
            }
            "ref" => {
                let name = self.tree.attribute(el, "name").unwrap_or_default();
                Pattern::Ref(self.grammar.define_id(name))
            }
            other => {
                return Err(invalid(
                    self.tree,
                    self.sources,
                    el,
                    format!("'{}' is not allowed in a simplified pattern", other),
                ))
            }
        };
        let path = self.path(el);
        Ok(self.grammar.add(pattern, path))
    }

    fn path(&self, el: NodeId) -> String {
        if self.keep_paths {
            self.tree.path(el)
        } else {
            String::new()
        }
    }

    fn data(&mut self, el: NodeId) -> Result<DataPattern, RelaxError> {
        let span = self.sources.span_of(self.tree, el);
        let type_name = self.tree.attribute(el, "type").unwrap_or_default().to_string();
        let library = self
            .tree
            .attribute(el, "datatypeLibrary")
            .unwrap_or_default()
            .to_string();
        let datatype = self
            .registry
            .find(&library, &type_name)
            .map_err(|error| RelaxError::DatatypeError { span, error })?;
        if library == xsd::NAMESPACE_URI && (type_name == "ENTITY" || type_name == "ENTITIES") {
            self.warnings.push(Warning {
                span,
                message: format!(
                    "{}: the {} datatype is accepted but entities are not checked",
                    self.tree.path(el),
                    type_name
                ),
            });
        }
        let mut raw = vec![];
        let mut except = None;
        for c in self.tree.element_children(el) {
            match self.tree.name(c) {
                "param" => raw.push(RawParam::new(
                    self.tree.attribute(c, "name").unwrap_or_default(),
                    &self.tree.text_content(c),
                )),
                "except" => except = Some(self.content(c)?),
                other => {
                    return Err(invalid(
                        self.tree,
                        self.sources,
                        c,
                        format!("'{}' is not allowed in 'data'", other),
                    ))
                }
            }
        }
        let params = datatype
            .parse_params(&self.tree.path(el), &raw)
            .map_err(|error| RelaxError::ParameterError { span, error })?;
        Ok(DataPattern {
            type_name,
            library,
            datatype,
            params,
            except,
        })
    }

    fn value(&mut self, el: NodeId) -> Result<ValuePattern, RelaxError> {
        let span = self.sources.span_of(self.tree, el);
        let type_name = self.tree.attribute(el, "type").unwrap_or("token").to_string();
        let library = self
            .tree
            .attribute(el, "datatypeLibrary")
            .unwrap_or_default()
            .to_string();
        let ns = self.tree.attribute(el, "ns").unwrap_or_default().to_string();
        let raw_value = self.tree.text_content(el);
        let datatype = self
            .registry
            .find(&library, &type_name)
            .map_err(|error| RelaxError::DatatypeError { span, error })?;

        // the default namespace for a value is given by `ns`, not by the schema document
        let mut context: Vec<(String, String)> = self
            .tree
            .element(el)
            .namespaces
            .iter()
            .filter_map(|n| n.prefix.as_ref().map(|p| (p.clone(), n.uri.clone())))
            .collect();
        context.push((String::new(), ns.clone()));
        let mut resolver = DefaultNameResolver::default();
        for (prefix, uri) in &context {
            resolver.define_prefix(prefix, uri);
        }
        let value = datatype
            .parse_value(&self.tree.path(el), &raw_value, Some(&resolver))
            .map_err(|error| RelaxError::ValueError { span, error })?;
        if !datatype.needs_context() {
            context.clear();
        }
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
}

/// Reads a name class from the simplified tree
pub(crate) fn name_class_of(
    tree: &Tree,
    sources: &SourceMap,
    el: NodeId,
) -> Result<NameClass, RelaxError> {
    let ns = tree.attribute(el, "ns").unwrap_or_default();
    let except = |tree: &Tree| -> Result<Option<NameClass>, RelaxError> {
        let except = tree
            .element_children(el)
            .into_iter()
            .find(|c| tree.is(*c, "except"))
            .and_then(|e| tree.first_element_child(e));
        except.map(|e| name_class_of(tree, sources, e)).transpose()
    };
    match tree.name(el) {
        "name" => Ok(NameClass::named(ns, &tree.text_content(el))),
        "nsName" => Ok(NameClass::ns_name(ns, except(tree)?)),
        "anyName" => Ok(NameClass::any_name(except(tree)?)),
        "choice" => {
            let children = tree.element_children(el);
            if children.len() != 2 {
                return Err(invalid(
                    tree,
                    sources,
                    el,
                    "a name class 'choice' must have exactly two children".to_string(),
                ));
            }
            Ok(NameClass::alt(
                name_class_of(tree, sources, children[0])?,
                name_class_of(tree, sources, children[1])?,
            ))
        }
        other => Err(invalid(
            tree,
            sources,
            el,
            format!("'{}' is not a name class", other),
        )),
    }
}

fn invalid(tree: &Tree, sources: &SourceMap, el: NodeId, message: String) -> RelaxError {
    RelaxError::InvalidSchema {
        span: sources.span_of(tree, el),
        message,
    }
}
