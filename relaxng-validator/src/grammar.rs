//! The entry point for validating a document against a [`Grammar`].

use crate::errors::ValidationError;
use crate::events::{push_unique, Event, Expected};
use crate::walker::{is_whitespace, ElementWalker, FireResult, Walker};
use log::{debug, trace};
use relaxng_model::datatype::NameResolver;
use relaxng_model::model::Grammar;
use relaxng_model::names::{NameClass, QualifiedName};

// One entry per open element (plus one for the document itself).  Holding several walkers
// means that more than one definition could still account for the element.
#[derive(Clone)]
struct Level<'g> {
    walkers: Vec<Walker<'g>>,
    // set within an element that was only accepted by guessing its definition, where no further
    // guessing is done
    inferred: bool,
    has_content: bool,
}

impl<'g> Level<'g> {
    fn new(walkers: Vec<Walker<'g>>, inferred: bool) -> Level<'g> {
        Level {
            walkers,
            inferred,
            has_content: false,
        }
    }

    fn misplaced() -> Level<'g> {
        Level::new(vec![Walker::Misplaced], true)
    }

    fn is_misplaced(&self) -> bool {
        self.walkers.iter().all(Walker::is_misplaced)
    }

    fn possible(&self) -> Vec<Expected> {
        let mut result = vec![];
        for w in &self.walkers {
            push_unique(&mut result, w.possible());
        }
        result
    }

    /// Offers the event to every walker, keeping those that accept it.  `None` when no walker
    /// accepts it, in which case the level is unchanged.
    fn fire(&mut self, event: &Event, resolver: &dyn NameResolver) -> Option<FireResult<'g>> {
        let mut matched = vec![];
        let mut rejected = vec![];
        for mut w in std::mem::take(&mut self.walkers) {
            let result = w.fire_event(event, resolver);
            if result.matched {
                matched.push((w, result));
            } else {
                rejected.push(w);
            }
        }
        if matched.is_empty() {
            self.walkers = rejected;
            return None;
        }
        let any_clean = matched.iter().any(|(_, r)| r.errors.is_empty());
        let mut outcome = FireResult::matched();
        let mut first = true;
        for (w, result) in matched {
            if any_clean && !result.errors.is_empty() {
                continue;
            }
            if first {
                outcome.errors = result.errors;
                first = false;
            }
            outcome.refs.extend(result.refs);
            self.walkers.push(w);
        }
        Some(outcome)
    }
}

/// Validates a whole document, one event at a time.
///
/// The walker tolerates invalid documents: every event is accepted, and the problems found are
/// returned from [`fire_event()`](GrammarWalker::fire_event) and
/// [`end()`](GrammarWalker::end).  An unexpected element is validated against its definition
/// when the grammar has exactly one element of that name, and otherwise skipped along with its
/// content.
///
/// Whitespace-only text is held back, since whitespace between elements is insignificant.  It is
/// only passed on when it turns out to be the sole content of an element.
#[derive(Clone)]
pub struct GrammarWalker<'g> {
    grammar: &'g Grammar,
    levels: Vec<Level<'g>>,
    suspended: Option<String>,
    expected: Vec<Expected>,
}

impl<'g> GrammarWalker<'g> {
    pub fn new(grammar: &'g Grammar) -> GrammarWalker<'g> {
        GrammarWalker {
            grammar,
            levels: vec![Level::new(vec![Walker::new(grammar, grammar.start())], false)],
            suspended: None,
            expected: vec![],
        }
    }

    pub fn grammar(&self) -> &'g Grammar {
        self.grammar
    }

    /// Number of open elements
    pub fn depth(&self) -> usize {
        self.levels.len() - 1
    }

    pub fn fire_event(&mut self, event: Event, resolver: &dyn NameResolver) -> Vec<ValidationError> {
        trace!("fire_event({:?})", event);
        match event {
            Event::StartTagAndAttributes(name, attributes) => {
                let mut errors = self.fire_event(Event::EnterStartTag(name), resolver);
                for (name, value) in attributes {
                    errors.extend(
                        self.fire_event(Event::AttributeNameAndValue(name, value), resolver),
                    );
                }
                errors.extend(self.fire_event(Event::LeaveStartTag, resolver));
                errors
            }
            Event::Text(text) => {
                if is_whitespace(&text) {
                    match &mut self.suspended {
                        Some(pending) => pending.push_str(&text),
                        None => self.suspended = Some(text),
                    }
                    return vec![];
                }
                let text = match self.suspended.take() {
                    Some(mut pending) => {
                        pending.push_str(&text);
                        pending
                    }
                    None => text,
                };
                self.top().has_content = true;
                self.dispatch(Event::Text(text), resolver)
            }
            Event::EnterStartTag(name) => {
                self.suspended = None;
                self.top().has_content = true;
                self.enter(name, resolver)
            }
            Event::EndTag(name) => {
                if let Some(pending) = self.suspended.take() {
                    if !self.top().has_content {
                        // only content of the element, so it may satisfy a data pattern, but
                        // whitespace-only text is never an error where no text is expected
                        match self.top().fire(&Event::Text(pending), resolver) {
                            Some(result) if !result.errors.is_empty() => {
                                trace!("whitespace ignored: {} complaint(s)", result.errors.len())
                            }
                            Some(_) | None => {}
                        }
                    }
                }
                self.leave(name, resolver)
            }
            event => self.dispatch(event, resolver),
        }
    }

    /// Errors for anything the document still lacks, once it has ended
    pub fn end(&mut self) -> Vec<ValidationError> {
        self.suspended = None;
        if self.levels.len() > 1 {
            return vec![ValidationError::message("document ended inside an element")];
        }
        let level = &mut self.levels[0];
        let mut first = None;
        for w in level.walkers.iter_mut() {
            let errors = w.end();
            if errors.is_empty() {
                return errors;
            }
            first.get_or_insert(errors);
        }
        let errors = first.unwrap_or_default();
        if !errors.is_empty() {
            self.expected = self.levels[0].possible();
        }
        errors
    }

    /// The events that would be accepted next
    pub fn possible(&self) -> Vec<Expected> {
        self.levels
            .last()
            .map(Level::possible)
            .unwrap_or_default()
    }

    /// What was expected at the point the most recent errors were found
    pub fn expected(&self) -> &[Expected] {
        &self.expected
    }

    fn top(&mut self) -> &mut Level<'g> {
        let last = self.levels.len() - 1;
        &mut self.levels[last]
    }

    fn dispatch(&mut self, event: Event, resolver: &dyn NameResolver) -> Vec<ValidationError> {
        let level = self.top();
        match level.fire(&event, resolver) {
            Some(result) => {
                if !result.errors.is_empty() {
                    self.expected = self.top().possible();
                }
                result.errors
            }
            None => {
                self.expected = self.top().possible();
                match event {
                    Event::Text(_) => vec![ValidationError::message("text not allowed here")],
                    Event::AttributeName(name) | Event::AttributeNameAndValue(name, _) => {
                        vec![ValidationError::attribute_name(
                            "attribute not allowed here",
                            named(&name),
                        )]
                    }
                    _ => vec![],
                }
            }
        }
    }

    fn enter(&mut self, name: QualifiedName, resolver: &dyn NameResolver) -> Vec<ValidationError> {
        if self.top().is_misplaced() {
            self.levels.push(Level::misplaced());
            return vec![];
        }
        let inferred = self.top().inferred;
        let event = Event::EnterStartTag(name);
        match self.top().fire(&event, resolver) {
            Some(result) if !result.refs.is_empty() => {
                let walkers = result
                    .refs
                    .into_iter()
                    .map(|w| Walker::Element(Box::new(w)))
                    .collect();
                self.levels.push(Level::new(walkers, inferred));
                result.errors
            }
            Some(result) => {
                self.levels.push(Level::misplaced());
                result.errors
            }
            None => match event {
                Event::EnterStartTag(name) => self.recover(name),
                _ => vec![],
            },
        }
    }

    fn recover(&mut self, name: QualifiedName) -> Vec<ValidationError> {
        self.expected = self.top().possible();
        let error = ValidationError::element("tag not allowed here", named(&name));
        let candidates = self.grammar.element_defines_matching(&name);
        if !self.top().inferred && candidates.len() == 1 {
            let define = candidates[0];
            if let Some(w) = ElementWalker::for_define(self.grammar, define, name.clone()) {
                debug!(
                    "unexpected element {}, validating as {:?}",
                    name,
                    self.grammar.define(define).name
                );
                self.levels
                    .push(Level::new(vec![Walker::Element(Box::new(w))], true));
                return vec![error];
            }
        }
        debug!(
            "unexpected element {} with {} candidate definitions, skipping it",
            name,
            candidates.len()
        );
        self.levels.push(Level::misplaced());
        vec![error]
    }

    fn leave(&mut self, name: QualifiedName, resolver: &dyn NameResolver) -> Vec<ValidationError> {
        if self.levels.len() == 1 {
            return vec![ValidationError::element("unexpected end tag", named(&name))];
        }
        let before = if self.top().walkers.iter().any(Walker::can_close) {
            None
        } else {
            Some(self.top().possible())
        };
        let event = Event::EndTag(name);
        let result = self.top().fire(&event, resolver);
        self.levels.pop();
        match result {
            Some(result) => {
                if !result.errors.is_empty() {
                    if let Some(before) = before {
                        self.expected = before;
                    }
                }
                result.errors
            }
            None => match event {
                Event::EndTag(name) => {
                    vec![ValidationError::element("unexpected end tag", named(&name))]
                }
                _ => vec![],
            },
        }
    }
}

fn named(name: &QualifiedName) -> NameClass {
    NameClass::named(&name.namespace_uri, &name.local_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use relaxng_model::datatype::DefaultNameResolver;
    use relaxng_model::model::{GrammarBuilder, Pattern};

    fn q(local: &str) -> QualifiedName {
        QualifiedName::new("", local)
    }

    // doc { a { text }, b { empty } } plus an unreferenced definition of c
    fn grammar() -> Grammar {
        let mut b = GrammarBuilder::new();
        let empty = b.add(Pattern::Empty, String::new());
        let text = b.add(Pattern::Text, String::new());
        let ea = b.add(Pattern::Element(NameClass::named("", "a"), text), String::new());
        let da = b.set_define("a", ea).unwrap();
        let eb = b.add(Pattern::Element(NameClass::named("", "b"), empty), String::new());
        let db = b.set_define("b", eb).unwrap();
        let ec = b.add(Pattern::Element(NameClass::named("", "c"), empty), String::new());
        b.set_define("c", ec).unwrap();
        let ra = b.add(Pattern::Ref(da), String::new());
        let rb = b.add(Pattern::Ref(db), String::new());
        let group = b.add(Pattern::Group(ra, rb), String::new());
        let edoc = b.add(Pattern::Element(NameClass::named("", "doc"), group), String::new());
        let ddoc = b.set_define("doc", edoc).unwrap();
        let start = b.add(Pattern::Ref(ddoc), String::new());
        b.finish(start).unwrap()
    }

    fn run(g: &Grammar, events: Vec<Event>) -> Vec<ValidationError> {
        let resolver = DefaultNameResolver::default();
        let mut w = GrammarWalker::new(g);
        let mut errors = vec![];
        for e in events {
            errors.extend(w.fire_event(e, &resolver));
        }
        errors.extend(w.end());
        errors
    }

    fn element(name: &str, content: Vec<Event>) -> Vec<Event> {
        let mut events = vec![Event::StartTagAndAttributes(q(name), vec![])];
        events.extend(content);
        events.push(Event::EndTag(q(name)));
        events
    }

    #[test]
    fn valid_document() {
        let g = grammar();
        let mut content = element("a", vec![Event::Text("hi".to_string())]);
        content.push(Event::Text("\n  ".to_string()));
        content.extend(element("b", vec![]));
        assert!(run(&g, element("doc", content)).is_empty());
    }

    #[test]
    fn missing_root() {
        let g = grammar();
        let errors = run(&g, vec![]);
        assert_matches!(&errors[..], [ValidationError::ElementName { message, .. }] if message == "tag required");
    }

    #[test]
    fn unexpected_element_is_inferred() {
        let g = grammar();
        // c is defined, so its content is still checked, which finds the text
        let mut content = element("a", vec![]);
        content.extend(element("c", vec![Event::Text("x".to_string())]));
        content.extend(element("b", vec![]));
        let errors = run(&g, element("doc", content));
        assert_eq!(
            errors,
            vec![
                ValidationError::element("tag not allowed here", NameClass::named("", "c")),
                ValidationError::message("text not allowed here"),
            ]
        );
    }

    #[test]
    fn unknown_element_is_skipped() {
        let g = grammar();
        let mut content = element("a", vec![]);
        content.extend(element(
            "zzz",
            element("a", vec![Event::Text("ignored".to_string())]),
        ));
        content.extend(element("b", vec![]));
        let errors = run(&g, element("doc", content));
        assert_eq!(
            errors,
            vec![ValidationError::element(
                "tag not allowed here",
                NameClass::named("", "zzz")
            )]
        );
    }

    #[test]
    fn whitespace_as_sole_content() {
        let g = grammar();
        let mut content = element("a", vec![Event::Text("  ".to_string())]);
        content.extend(element("b", vec![Event::Text("\t".to_string())]));
        assert!(run(&g, element("doc", content)).is_empty());
    }

    #[test]
    fn whitespace_where_elements_are_required() {
        let g = grammar();
        let errors = run(&g, element("doc", vec![Event::Text(" \n ".to_string())]));
        assert!(!errors.is_empty());
        assert_eq!(errors, run(&g, element("doc", vec![])));
    }

    #[test]
    fn possible_after_start_tag() {
        let g = grammar();
        let resolver = DefaultNameResolver::default();
        let mut w = GrammarWalker::new(&g);
        assert_eq!(w.possible(), vec![Expected::EnterStartTag(NameClass::named("", "doc"))]);
        w.fire_event(Event::StartTagAndAttributes(q("doc"), vec![]), &resolver);
        assert_eq!(w.possible(), vec![Expected::EnterStartTag(NameClass::named("", "a"))]);
    }

    #[test]
    fn determinism() {
        let g = grammar();
        let mut content = element("b", vec![]);
        content.extend(element("a", vec![]));
        let first = run(&g, element("doc", content.clone()));
        let second = run(&g, element("doc", content));
        assert!(!first.is_empty());
        assert_eq!(first, second);
    }
}
