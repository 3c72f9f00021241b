//! Replaces `externalRef` and `include` elements by the documents they refer to, also removing
//! insignificant whitespace and resolving `xml:base` as each document is visited.

use crate::{RelaxError, ResourceLoader, SourceMap};
use log::debug;
use relaxng_syntax::tree::{NodeId, Tree};
use relaxng_syntax::{uri, xml};
use url::Url;

/// Loads the document at `url` into `tree`, returning its (detached) root element with all
/// external references already replaced.  `referrer` is the span of the `include` or
/// `externalRef` causing the load, if any.
pub fn load<L: ResourceLoader>(
    tree: &mut Tree,
    url: &Url,
    loader: &L,
    sources: &mut SourceMap,
    referrer: Option<codemap::Span>,
) -> Result<NodeId, RelaxError> {
    let mut flattener = Flattener {
        tree,
        loader,
        sources,
        stack: vec![],
    };
    flattener.load(url, referrer)
}

struct Flattener<'a, L> {
    tree: &'a mut Tree,
    loader: &'a L,
    sources: &'a mut SourceMap,
    // the documents currently being loaded, outermost first
    stack: Vec<Url>,
}

fn wrap(referrer: Option<codemap::Span>, err: RelaxError) -> RelaxError {
    match referrer {
        Some(span) => RelaxError::IncludeError(span, Box::new(err)),
        None => err,
    }
}

impl<'a, L: ResourceLoader> Flattener<'a, L> {
    fn load(&mut self, url: &Url, referrer: Option<codemap::Span>) -> Result<NodeId, RelaxError> {
        if self.stack.contains(url) {
            let mut chain = self.stack.clone();
            chain.push(url.clone());
            return Err(RelaxError::IncludeLoop {
                span: referrer.unwrap_or_else(|| self.sources.unknown_span()),
                chain,
            });
        }
        debug!("loading {}", url);
        let resource = self.loader.load(url).map_err(|e| wrap(referrer, e))?;
        let (file_id, file) = self
            .sources
            .add(url.to_string(), resource.text().to_string());
        let root = xml::parse_into(self.tree, file_id, file.source()).map_err(|e| {
            let span = match &e {
                xml::Error::Expected(span, _)
                | xml::Error::Unexpected(span, _)
                | xml::Error::Xml(span, _) => file.span.subspan(span.start as _, span.end as _),
            };
            wrap(referrer, RelaxError::XmlParse(span, e))
        })?;
        self.stack.push(url.clone());
        let result = self.flatten(root, url, &mut vec![]);
        self.stack.pop();
        result.map_err(|e| wrap(referrer, e))
    }

    fn flatten(
        &mut self,
        el: NodeId,
        document: &Url,
        bases: &mut Vec<String>,
    ) -> Result<NodeId, RelaxError> {
        let base = self.tree.remove_attribute(el, "xml:base");
        if let Some(b) = &base {
            bases.push(b.clone());
        }
        let result = self.flatten_element(el, document, bases);
        if base.is_some() {
            bases.pop();
        }
        result
    }

    fn flatten_element(
        &mut self,
        el: NodeId,
        document: &Url,
        bases: &mut Vec<String>,
    ) -> Result<NodeId, RelaxError> {
        for attr in &["name", "type", "combine"] {
            if let Some(v) = self.tree.attribute(el, attr).map(|v| v.trim().to_string()) {
                self.tree.set_attribute(el, attr, &v);
            }
        }
        let name = self.tree.name(el).to_string();
        if name != "value" && name != "param" {
            for c in self.tree.children(el).to_vec() {
                if self.tree.text(c).map(xml::is_whitespace).unwrap_or(false) {
                    self.tree.remove_child(el, c);
                }
            }
        }
        if name == "name" {
            let text = self.tree.text_content(el).trim().to_string();
            self.tree.set_text_content(el, &text);
        }
        match name.as_str() {
            "externalRef" => {
                let url = self.resolve(el, document, bases)?;
                let span = self.sources.span_of(self.tree, el);
                let root = self.load(&url, Some(span))?;
                if self.tree.attribute(root, "ns").is_none() {
                    if let Some(ns) = self.tree.attribute(el, "ns").map(|s| s.to_string()) {
                        self.tree.set_attribute(root, "ns", &ns);
                    }
                }
                self.tree.replace(el, root);
                Ok(root)
            }
            "include" => {
                let url = self.resolve(el, document, bases)?;
                let span = self.sources.span_of(self.tree, el);
                let grammar = self.load(&url, Some(span))?;
                if !self.tree.is(grammar, "grammar") {
                    return Err(RelaxError::IncludeError(
                        span,
                        Box::new(RelaxError::IncludedFileMustBeGrammar {
                            span: self.sources.span_of(self.tree, grammar),
                        }),
                    ));
                }
                for c in self.tree.element_children(el) {
                    self.flatten(c, document, bases)?;
                }
                self.remove_overridden(el, grammar)?;
                self.tree.remove_attribute(el, "href");
                self.tree.rename(el, "div");
                self.tree.rename(grammar, "div");
                self.tree.insert_child(el, 0, grammar);
                Ok(el)
            }
            _ => {
                for c in self.tree.element_children(el) {
                    self.flatten(c, document, bases)?;
                }
                Ok(el)
            }
        }
    }

    fn resolve(&self, el: NodeId, document: &Url, bases: &[String]) -> Result<Url, RelaxError> {
        let span = self.sources.span_of(self.tree, el);
        let href = match self.tree.attribute(el, "href") {
            Some(h) => h.to_string(),
            None => {
                return Err(RelaxError::InvalidSchema {
                    span,
                    message: format!("'{}' requires an 'href' attribute", self.tree.name(el)),
                })
            }
        };
        let bases: Vec<&str> = bases.iter().map(|b| b.as_str()).collect();
        uri::resolve_href(document, &bases, &href)
            .map_err(|reason| RelaxError::InvalidHref { span, href, reason })
    }

    /// Removes from the included grammar the `start` and `define` components which the
    /// `include` element overrides
    fn remove_overridden(&mut self, include: NodeId, grammar: NodeId) -> Result<(), RelaxError> {
        let mut overrides = vec![];
        components(self.tree, include, &mut overrides);
        if overrides.is_empty() {
            return Ok(());
        }
        let mut targets = vec![];
        components(self.tree, grammar, &mut targets);
        for o in overrides {
            let is_start = self.tree.is(o, "start");
            let name = self.tree.attribute(o, "name").map(|n| n.to_string());
            let matching: Vec<NodeId> = targets
                .iter()
                .copied()
                .filter(|t| {
                    if is_start {
                        self.tree.is(*t, "start")
                    } else {
                        self.tree.is(*t, "define")
                            && self.tree.attribute(*t, "name") == name.as_deref()
                    }
                })
                .collect();
            if matching.is_empty() {
                return Err(RelaxError::OverrideMissingFromInclude {
                    override_span: self.sources.span_of(self.tree, o),
                    include_span: self.sources.span_of(self.tree, include),
                    name: name.unwrap_or_else(|| "start".to_string()),
                });
            }
            for m in matching {
                debug!("{} overridden", self.tree.path(m));
                self.tree.detach(m);
            }
        }
        Ok(())
    }
}

/// The `start` and `define` children of a grammar, include or div, looking inside nested divs
fn components(tree: &Tree, el: NodeId, out: &mut Vec<NodeId>) {
    for c in tree.element_children(el) {
        match tree.name(c) {
            "start" | "define" => out.push(c),
            "div" => components(tree, c, out),
            _ => (),
        }
    }
}
