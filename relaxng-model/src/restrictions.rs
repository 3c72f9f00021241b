//! Checks the restrictions of section 7 of the Relax NG specification, which apply to the
//! simplified form of a schema.

use crate::build::name_class_of;
use crate::names::NameClass;
use crate::{RelaxError, SourceMap};
use relaxng_syntax::tree::{NodeId, Tree};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum ContentType {
    Empty,
    Complex,
    Simple,
}

fn groupable(a: ContentType, b: ContentType) -> bool {
    a == ContentType::Empty
        || b == ContentType::Empty
        || (a == ContentType::Complex && b == ContentType::Complex)
}

struct Summary {
    content: ContentType,
    attributes: Vec<NameClass>,
    elements: Vec<NameClass>,
    text: bool,
}

impl Summary {
    fn of(content: ContentType) -> Summary {
        Summary {
            content,
            attributes: vec![],
            elements: vec![],
            text: false,
        }
    }

    fn merge(mut self, other: Summary, content: ContentType) -> Summary {
        self.content = content;
        self.attributes.extend(other.attributes);
        self.elements.extend(other.elements);
        self.text |= other.text;
        self
    }
}

/// Where in the schema the pattern being checked sits
#[derive(Debug, Default, Clone, Copy)]
struct Context {
    start: bool,
    attribute: bool,
    list: bool,
    data_except: bool,
    one_or_more: bool,
    one_or_more_group: bool,
}

impl Context {
    /// The name of the enclosing construct forbidding the given pattern here, if any
    fn forbids(&self, pattern: &str) -> Option<&'static str> {
        let (start, attribute, list, except, repeated_group) = match pattern {
            "attribute" => (true, true, true, true, true),
            "ref" => (false, true, true, true, false),
            "oneOrMore" => (true, false, false, true, false),
            "list" => (true, false, true, true, false),
            "text" => (true, false, true, true, false),
            "empty" | "group" => (true, false, false, true, false),
            "interleave" => (true, false, true, true, false),
            "data" | "value" => (true, false, false, false, false),
            _ => return None,
        };
        if start && self.start {
            Some("start")
        } else if attribute && self.attribute {
            Some("attribute")
        } else if list && self.list {
            Some("list")
        } else if except && self.data_except {
            Some("data/except")
        } else if repeated_group && self.one_or_more_group {
            Some("oneOrMore//group")
        } else {
            None
        }
    }
}

pub(crate) fn check(tree: &Tree, sources: &SourceMap) -> Result<(), RelaxError> {
    let root = tree.root();
    let mut element_names = HashMap::new();
    for d in tree.element_children(root) {
        if !tree.is(d, "define") {
            continue;
        }
        if let Some(el) = tree.first_element_child(d).filter(|e| tree.is(*e, "element")) {
            if let Some(nc) = tree.first_element_child(el) {
                let name = tree.attribute(d, "name").unwrap_or_default().to_string();
                element_names.insert(name, name_class_of(tree, sources, nc)?);
            }
        }
    }
    let checker = Checker {
        tree,
        sources,
        element_names,
    };
    for c in tree.element_children(root) {
        let content = match tree.first_element_child(c) {
            Some(content) => content,
            None => continue,
        };
        if tree.is(c, "start") {
            let ctx = Context {
                start: true,
                ..Context::default()
            };
            checker.visit(content, ctx)?;
        } else if tree.is(content, "element") {
            let children = tree.element_children(content);
            if let Some(body) = children.get(1) {
                checker.visit(*body, Context::default())?;
            }
        } else {
            checker.visit(content, Context::default())?;
        }
    }
    Ok(())
}

struct Checker<'a> {
    tree: &'a Tree,
    sources: &'a SourceMap,
    // the name classes of element definitions, by define name
    element_names: HashMap<String, NameClass>,
}

impl<'a> Checker<'a> {
    fn error(&self, el: NodeId, message: String) -> RelaxError {
        RelaxError::Restriction {
            span: self.sources.span_of(self.tree, el),
            message,
        }
    }

    fn visit(&self, el: NodeId, ctx: Context) -> Result<Summary, RelaxError> {
        let name = self.tree.name(el);
        if let Some(outer) = ctx.forbids(name) {
            return Err(self.error(el, format!("'{}' is not allowed inside '{}'", name, outer)));
        }
        let children = self.tree.element_children(el);
        match name {
            "empty" | "notAllowed" => Ok(Summary::of(ContentType::Empty)),
            "text" => {
                let mut s = Summary::of(ContentType::Complex);
                s.text = true;
                Ok(s)
            }
            "value" => Ok(Summary::of(ContentType::Simple)),
            "data" => {
                for c in &children {
                    if self.tree.is(*c, "except") {
                        if let Some(p) = self.tree.first_element_child(*c) {
                            let inner = Context {
                                data_except: true,
                                ..ctx
                            };
                            self.visit(p, inner)?;
                        }
                    }
                }
                Ok(Summary::of(ContentType::Simple))
            }
            "list" => {
                let inner = Context { list: true, ..ctx };
                for c in &children {
                    self.visit(*c, inner)?;
                }
                Ok(Summary::of(ContentType::Simple))
            }
            "ref" => {
                let mut s = Summary::of(ContentType::Complex);
                let target = self.tree.attribute(el, "name").unwrap_or_default();
                if let Some(nc) = self.element_names.get(target) {
                    s.elements.push(nc.clone());
                }
                Ok(s)
            }
            "attribute" => {
                let nc = match children.first() {
                    Some(nc) => name_class_of(self.tree, self.sources, *nc)?,
                    None => return Err(self.error(el, "'attribute' requires a name class".to_string())),
                };
                if !nc.simple() && !ctx.one_or_more {
                    return Err(self.error(
                        el,
                        format!(
                            "an attribute named by a wildcard ({}) must be repeated by 'oneOrMore'",
                            nc.describe()
                        ),
                    ));
                }
                let inner = Context {
                    attribute: true,
                    ..ctx
                };
                if let Some(p) = children.get(1) {
                    self.visit(*p, inner)?;
                }
                let mut s = Summary::of(ContentType::Empty);
                s.attributes.push(nc);
                Ok(s)
            }
            "oneOrMore" => {
                let inner = Context {
                    one_or_more: true,
                    ..ctx
                };
                let s = match children.first() {
                    Some(c) => self.visit(*c, inner)?,
                    None => return Ok(Summary::of(ContentType::Empty)),
                };
                if !self.lenient(ctx) && !groupable(s.content, s.content) {
                    return Err(self.error(
                        el,
                        "'oneOrMore' may not repeat data or value patterns outside a list"
                            .to_string(),
                    ));
                }
                Ok(s)
            }
            "choice" | "group" | "interleave" => {
                let inner = Context {
                    one_or_more_group: ctx.one_or_more_group
                        || (ctx.one_or_more && name != "choice"),
                    ..ctx
                };
                let (a, b) = match children.as_slice() {
                    [a, b] => (self.visit(*a, inner)?, self.visit(*b, inner)?),
                    _ => {
                        return Err(self.error(el, format!("'{}' must have two children", name)))
                    }
                };
                if name == "choice" {
                    let content = a.content.max(b.content);
                    return Ok(a.merge(b, content));
                }
                for x in &a.attributes {
                    for y in &b.attributes {
                        if x.intersects(y) {
                            return Err(self.error(
                                el,
                                format!(
                                    "attributes {} and {} may both occur in the same '{}'",
                                    x.describe(),
                                    y.describe(),
                                    name
                                ),
                            ));
                        }
                    }
                }
                if name == "interleave" {
                    for x in &a.elements {
                        for y in &b.elements {
                            if x.intersects(y) {
                                return Err(self.error(
                                    el,
                                    format!(
                                        "elements {} and {} overlap across 'interleave'",
                                        x.describe(),
                                        y.describe()
                                    ),
                                ));
                            }
                        }
                    }
                    if a.text && b.text {
                        return Err(self.error(
                            el,
                            "'text' may not appear on both sides of 'interleave'".to_string(),
                        ));
                    }
                }
                if !self.lenient(ctx) && !groupable(a.content, b.content) {
                    return Err(self.error(
                        el,
                        format!(
                            "'{}' may not combine data or value patterns with other content",
                            name
                        ),
                    ));
                }
                let content = a.content.max(b.content);
                Ok(a.merge(b, content))
            }
            other => Err(self.error(el, format!("'{}' is not allowed here", other))),
        }
    }

    // a list or attribute value is a single string, so its parts need not be groupable
    fn lenient(&self, ctx: Context) -> bool {
        ctx.list || ctx.attribute
    }
}
