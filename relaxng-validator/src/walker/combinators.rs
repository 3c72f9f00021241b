use super::{is_whitespace, union, FireResult, Walker};
use crate::errors::ValidationError;
use crate::events::{Event, Expected};
use relaxng_model::datatype::NameResolver;
use relaxng_model::model::{Grammar, PatternId};

// Each combinator caches `can_end` and `can_end_attribute`, refreshing them from its children
// (whose own values are cached) whenever its state may have changed.  Children without any
// attribute patterns are never offered attribute events.

/// Tracks both branches until an event is accepted by only one of them, after which the other
/// branch is dropped for good
#[derive(Clone)]
pub struct ChoiceWalker<'g> {
    a: Option<Walker<'g>>,
    b: Option<Walker<'g>>,
    a_attrs: bool,
    b_attrs: bool,
    can_end: bool,
    can_end_attribute: bool,
}

impl<'g> ChoiceWalker<'g> {
    pub fn new(grammar: &'g Grammar, id: PatternId, a: PatternId, b: PatternId) -> ChoiceWalker<'g> {
        let node = grammar.node(id);
        let mut walker = ChoiceWalker {
            a: Some(Walker::new(grammar, a)),
            b: Some(Walker::new(grammar, b)),
            a_attrs: grammar.node(a).has_attrs(),
            b_attrs: grammar.node(b).has_attrs(),
            can_end: node.has_empty_pattern(),
            can_end_attribute: !node.has_attrs(),
        };
        if !(walker.can_end && walker.can_end_attribute) {
            walker.refresh();
        }
        walker
    }

    fn refresh(&mut self) {
        self.can_end = self.a.as_ref().map_or(false, Walker::can_end)
            || self.b.as_ref().map_or(false, Walker::can_end);
        self.can_end_attribute = self.a.as_ref().map_or(false, Walker::can_end_attribute)
            || self.b.as_ref().map_or(false, Walker::can_end_attribute);
    }

    pub fn fire_event(&mut self, event: &Event, resolver: &dyn NameResolver) -> FireResult<'g> {
        let result = self.fire(event, resolver);
        if result.matched {
            self.refresh();
        }
        result
    }

    fn fire(&mut self, event: &Event, resolver: &dyn NameResolver) -> FireResult<'g> {
        let attribute = event.is_attribute_event();
        let (fire_a, fire_b) = (!attribute || self.a_attrs, !attribute || self.b_attrs);
        let ra = self.a.as_mut().map(|w| {
            if fire_a {
                w.fire_event(event, resolver)
            } else {
                FireResult::unmatched()
            }
        });
        let rb = self.b.as_mut().map(|w| {
            if fire_b {
                w.fire_event(event, resolver)
            } else {
                FireResult::unmatched()
            }
        });
        match (ra, rb) {
            (Some(mut ra), Some(rb)) if ra.matched && rb.matched => {
                // a branch that accepted the event cleanly beats one that complained about it
                if ra.errors.is_empty() && !rb.errors.is_empty() {
                    self.b = None;
                    ra
                } else if rb.errors.is_empty() && !ra.errors.is_empty() {
                    self.a = None;
                    rb
                } else {
                    ra.refs.extend(rb.refs);
                    ra
                }
            }
            (Some(ra), _) if ra.matched => {
                self.b = None;
                ra
            }
            (_, Some(rb)) if rb.matched => {
                self.a = None;
                rb
            }
            _ => FireResult::unmatched(),
        }
    }

    pub fn possible(&self) -> Vec<Expected> {
        union(
            self.a.as_ref().map(Walker::possible).unwrap_or_default(),
            self.b.as_ref().map(Walker::possible).unwrap_or_default(),
        )
    }

    pub fn possible_attributes(&self) -> Vec<Expected> {
        union(
            self.a
                .as_ref()
                .filter(|_| self.a_attrs)
                .map(Walker::possible_attributes)
                .unwrap_or_default(),
            self.b
                .as_ref()
                .filter(|_| self.b_attrs)
                .map(Walker::possible_attributes)
                .unwrap_or_default(),
        )
    }

    pub fn end(&mut self) -> Vec<ValidationError> {
        let errors = match (&mut self.a, &mut self.b) {
            (Some(a), Some(b)) => {
                if a.can_end() {
                    a.end()
                } else if b.can_end() {
                    b.end()
                } else {
                    vec![choice_error(a.possible(), b.possible())]
                }
            }
            (Some(w), None) | (None, Some(w)) => w.end(),
            (None, None) => vec![],
        };
        self.refresh();
        errors
    }

    /// A branch still lacking attributes once the start tag is over can no longer match, so it
    /// is dropped
    pub fn end_attributes(&mut self) -> Vec<ValidationError> {
        let errors = match (&mut self.a, &mut self.b) {
            (Some(a), Some(b)) => match (a.can_end_attribute(), b.can_end_attribute()) {
                (true, true) => {
                    let mut errors = if self.a_attrs { a.end_attributes() } else { vec![] };
                    if self.b_attrs {
                        errors.extend(b.end_attributes());
                    }
                    errors
                }
                (true, false) => {
                    let errors = a.end_attributes();
                    self.b = None;
                    errors
                }
                (false, true) => {
                    let errors = b.end_attributes();
                    self.a = None;
                    errors
                }
                (false, false) => {
                    vec![choice_error(a.possible_attributes(), b.possible_attributes())]
                }
            },
            (Some(w), None) | (None, Some(w)) => w.end_attributes(),
            (None, None) => vec![],
        };
        self.refresh();
        errors
    }

    pub fn can_end(&self) -> bool {
        self.can_end
    }

    pub fn can_end_attribute(&self) -> bool {
        self.can_end_attribute
    }
}

fn choice_error(a: Vec<Expected>, b: Vec<Expected>) -> ValidationError {
    if !a.is_empty() && !b.is_empty() && a.iter().chain(b.iter()).all(Expected::is_value) {
        return ValidationError::ValueChoice {
            message: "one value required".to_string(),
            values: a.iter().chain(b.iter()).map(ToString::to_string).collect(),
        };
    }
    ValidationError::Choice {
        names_a: a.iter().filter_map(Expected::name_class).cloned().collect(),
        names_b: b.iter().filter_map(Expected::name_class).cloned().collect(),
    }
}

/// `choice(empty, X)`: whitespace never engages `X`, and once `X` has matched something it
/// has to be completed
#[derive(Clone)]
pub struct OptionalWalker<'g> {
    sub: Walker<'g>,
    engaged: bool,
    ended: bool,
    can_end: bool,
    can_end_attribute: bool,
}

impl<'g> OptionalWalker<'g> {
    pub fn new(grammar: &'g Grammar, sub: PatternId) -> OptionalWalker<'g> {
        OptionalWalker {
            sub: Walker::new(grammar, sub),
            engaged: false,
            ended: false,
            can_end: true,
            can_end_attribute: true,
        }
    }

    fn refresh(&mut self) {
        self.can_end = self.ended || !self.engaged || self.sub.can_end();
        self.can_end_attribute = !self.engaged || self.sub.can_end_attribute();
    }

    pub fn fire_event(&mut self, event: &Event, resolver: &dyn NameResolver) -> FireResult<'g> {
        let whitespace = matches!(event, Event::Text(text) if is_whitespace(text));
        if whitespace && !self.engaged {
            return FireResult::matched();
        }
        let result = self.sub.fire_event(event, resolver);
        if result.matched {
            self.engaged = true;
            self.refresh();
            result
        } else if whitespace {
            FireResult::matched()
        } else {
            result
        }
    }

    pub fn possible(&self) -> Vec<Expected> {
        self.sub.possible()
    }

    pub fn possible_attributes(&self) -> Vec<Expected> {
        self.sub.possible_attributes()
    }

    pub fn end(&mut self) -> Vec<ValidationError> {
        if self.ended || !self.engaged {
            self.ended = true;
            self.refresh();
            return vec![];
        }
        let errors = self.sub.end();
        self.ended = errors.is_empty();
        self.refresh();
        errors
    }

    pub fn end_attributes(&mut self) -> Vec<ValidationError> {
        if !self.engaged {
            return vec![];
        }
        let errors = self.sub.end_attributes();
        self.refresh();
        errors
    }

    pub fn can_end(&self) -> bool {
        self.can_end
    }

    pub fn can_end_attribute(&self) -> bool {
        self.can_end_attribute
    }
}

#[derive(Clone)]
pub struct GroupWalker<'g> {
    a: Walker<'g>,
    b: Walker<'g>,
    a_ended: bool,
    a_attrs: bool,
    b_attrs: bool,
    can_end: bool,
    can_end_attribute: bool,
}

impl<'g> GroupWalker<'g> {
    pub fn new(grammar: &'g Grammar, id: PatternId, a: PatternId, b: PatternId) -> GroupWalker<'g> {
        let node = grammar.node(id);
        let mut walker = GroupWalker {
            a: Walker::new(grammar, a),
            b: Walker::new(grammar, b),
            a_ended: false,
            a_attrs: grammar.node(a).has_attrs(),
            b_attrs: grammar.node(b).has_attrs(),
            can_end: node.has_empty_pattern(),
            can_end_attribute: !node.has_attrs(),
        };
        if !(walker.can_end && walker.can_end_attribute) {
            walker.refresh();
        }
        walker
    }

    fn refresh(&mut self) {
        self.can_end = (self.a_ended || self.a.can_end()) && self.b.can_end();
        self.can_end_attribute = self.a.can_end_attribute() && self.b.can_end_attribute();
    }

    pub fn fire_event(&mut self, event: &Event, resolver: &dyn NameResolver) -> FireResult<'g> {
        let result = self.fire(event, resolver);
        if result.matched {
            self.refresh();
        }
        result
    }

    fn fire(&mut self, event: &Event, resolver: &dyn NameResolver) -> FireResult<'g> {
        // attribute order is insignificant, so either side may take an attribute
        if event.is_attribute_event() {
            if self.a_attrs {
                let result = self.a.fire_event(event, resolver);
                if result.matched {
                    return result;
                }
            }
            if self.b_attrs {
                return self.b.fire_event(event, resolver);
            }
            return FireResult::unmatched();
        }
        if self.a_ended {
            return self.b.fire_event(event, resolver);
        }
        let result = self.a.fire_event(event, resolver);
        if result.matched || !self.a.can_end() {
            return result;
        }
        let mut result = self.b.fire_event(event, resolver);
        if result.matched {
            self.a_ended = true;
            let mut errors = self.a.end();
            errors.append(&mut result.errors);
            result.errors = errors;
        }
        result
    }

    pub fn possible(&self) -> Vec<Expected> {
        if self.a_ended {
            self.b.possible()
        } else if self.a.can_end() {
            union(self.a.possible(), self.b.possible())
        } else {
            self.a.possible()
        }
    }

    pub fn possible_attributes(&self) -> Vec<Expected> {
        match (self.a_attrs, self.b_attrs) {
            (true, true) => union(self.a.possible_attributes(), self.b.possible_attributes()),
            (true, false) => self.a.possible_attributes(),
            (false, true) => self.b.possible_attributes(),
            (false, false) => vec![],
        }
    }

    pub fn end(&mut self) -> Vec<ValidationError> {
        let mut errors = if self.a_ended { vec![] } else { self.a.end() };
        errors.extend(self.b.end());
        self.refresh();
        errors
    }

    pub fn end_attributes(&mut self) -> Vec<ValidationError> {
        let mut errors = if self.a_attrs { self.a.end_attributes() } else { vec![] };
        if self.b_attrs {
            errors.extend(self.b.end_attributes());
        }
        self.refresh();
        errors
    }

    pub fn can_end(&self) -> bool {
        self.can_end
    }

    pub fn can_end_attribute(&self) -> bool {
        self.can_end_attribute
    }
}

/// Offers each event to the first side, then the second.  The restrictions on `interleave`
/// guarantee that at most one side can accept any given event.
#[derive(Clone)]
pub struct InterleaveWalker<'g> {
    a: Walker<'g>,
    b: Walker<'g>,
    a_attrs: bool,
    b_attrs: bool,
    can_end: bool,
    can_end_attribute: bool,
}

impl<'g> InterleaveWalker<'g> {
    pub fn new(grammar: &'g Grammar, id: PatternId, a: PatternId, b: PatternId) -> InterleaveWalker<'g> {
        let node = grammar.node(id);
        let mut walker = InterleaveWalker {
            a: Walker::new(grammar, a),
            b: Walker::new(grammar, b),
            a_attrs: grammar.node(a).has_attrs(),
            b_attrs: grammar.node(b).has_attrs(),
            can_end: node.has_empty_pattern(),
            can_end_attribute: !node.has_attrs(),
        };
        if !(walker.can_end && walker.can_end_attribute) {
            walker.refresh();
        }
        walker
    }

    fn refresh(&mut self) {
        self.can_end = self.a.can_end() && self.b.can_end();
        self.can_end_attribute = self.a.can_end_attribute() && self.b.can_end_attribute();
    }

    pub fn fire_event(&mut self, event: &Event, resolver: &dyn NameResolver) -> FireResult<'g> {
        let attribute = event.is_attribute_event();
        let mut result = FireResult::unmatched();
        if !attribute || self.a_attrs {
            result = self.a.fire_event(event, resolver);
        }
        if !result.matched && (!attribute || self.b_attrs) {
            result = self.b.fire_event(event, resolver);
        }
        if result.matched {
            self.refresh();
        }
        result
    }

    pub fn possible(&self) -> Vec<Expected> {
        union(self.a.possible(), self.b.possible())
    }

    pub fn possible_attributes(&self) -> Vec<Expected> {
        match (self.a_attrs, self.b_attrs) {
            (true, true) => union(self.a.possible_attributes(), self.b.possible_attributes()),
            (true, false) => self.a.possible_attributes(),
            (false, true) => self.b.possible_attributes(),
            (false, false) => vec![],
        }
    }

    pub fn end(&mut self) -> Vec<ValidationError> {
        let mut errors = self.a.end();
        errors.extend(self.b.end());
        self.refresh();
        errors
    }

    pub fn end_attributes(&mut self) -> Vec<ValidationError> {
        let mut errors = if self.a_attrs { self.a.end_attributes() } else { vec![] };
        if self.b_attrs {
            errors.extend(self.b.end_attributes());
        }
        self.refresh();
        errors
    }

    pub fn can_end(&self) -> bool {
        self.can_end
    }

    pub fn can_end_attribute(&self) -> bool {
        self.can_end_attribute
    }
}

#[derive(Clone)]
pub struct OneOrMoreWalker<'g> {
    grammar: &'g Grammar,
    child: PatternId,
    child_attrs: bool,
    current: Walker<'g>,
    // created on first need, and kept if it did not match
    next: Option<Walker<'g>>,
    can_end: bool,
    can_end_attribute: bool,
}

impl<'g> OneOrMoreWalker<'g> {
    pub fn new(grammar: &'g Grammar, id: PatternId, child: PatternId) -> OneOrMoreWalker<'g> {
        let node = grammar.node(id);
        let mut walker = OneOrMoreWalker {
            grammar,
            child,
            child_attrs: grammar.node(child).has_attrs(),
            current: Walker::new(grammar, child),
            next: None,
            can_end: node.has_empty_pattern(),
            can_end_attribute: !node.has_attrs(),
        };
        if !(walker.can_end && walker.can_end_attribute) {
            walker.refresh();
        }
        walker
    }

    fn refresh(&mut self) {
        self.can_end = self.current.can_end();
        self.can_end_attribute = self.current.can_end_attribute();
    }

    pub fn fire_event(&mut self, event: &Event, resolver: &dyn NameResolver) -> FireResult<'g> {
        let result = self.fire(event, resolver);
        if result.matched {
            self.refresh();
        }
        result
    }

    fn fire(&mut self, event: &Event, resolver: &dyn NameResolver) -> FireResult<'g> {
        let attribute = event.is_attribute_event();
        if attribute && !self.child_attrs {
            return FireResult::unmatched();
        }
        let result = self.current.fire_event(event, resolver);
        if result.matched {
            return result;
        }
        let ready = if attribute {
            self.current.can_end_attribute()
        } else {
            self.current.can_end()
        };
        if !ready {
            return result;
        }
        let grammar = self.grammar;
        let child = self.child;
        let mut next = self
            .next
            .take()
            .unwrap_or_else(|| Walker::new(grammar, child));
        let mut next_result = next.fire_event(event, resolver);
        if !next_result.matched {
            self.next = Some(next);
            return next_result;
        }
        let mut errors = if attribute {
            self.current.end_attributes()
        } else {
            self.current.end()
        };
        errors.append(&mut next_result.errors);
        next_result.errors = errors;
        self.current = next;
        next_result
    }

    fn fresh(&self) -> Walker<'g> {
        Walker::new(self.grammar, self.child)
    }

    pub fn possible(&self) -> Vec<Expected> {
        if self.current.can_end() {
            union(self.current.possible(), self.fresh().possible())
        } else {
            self.current.possible()
        }
    }

    pub fn possible_attributes(&self) -> Vec<Expected> {
        if !self.child_attrs {
            vec![]
        } else if self.current.can_end_attribute() {
            union(
                self.current.possible_attributes(),
                self.fresh().possible_attributes(),
            )
        } else {
            self.current.possible_attributes()
        }
    }

    pub fn end(&mut self) -> Vec<ValidationError> {
        let errors = self.current.end();
        self.refresh();
        errors
    }

    pub fn end_attributes(&mut self) -> Vec<ValidationError> {
        if !self.child_attrs {
            return vec![];
        }
        let errors = self.current.end_attributes();
        self.refresh();
        errors
    }

    pub fn can_end(&self) -> bool {
        self.can_end
    }

    pub fn can_end_attribute(&self) -> bool {
        self.can_end_attribute
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relaxng_model::datatype::DefaultNameResolver;
    use relaxng_model::model::{GrammarBuilder, Pattern};
    use relaxng_model::names::{NameClass, QualifiedName};

    fn text(s: &str) -> Event {
        Event::Text(s.to_string())
    }

    // element doc { choice(a, b) } where a and b are empty elements
    fn choice_of_elements() -> relaxng_model::model::Grammar {
        let mut b = GrammarBuilder::new();
        let empty = b.add(Pattern::Empty, String::new());
        let ea = b.add(Pattern::Element(NameClass::named("", "a"), empty), String::new());
        let da = b.set_define("a", ea).unwrap();
        let eb = b.add(Pattern::Element(NameClass::named("", "b"), empty), String::new());
        let db = b.set_define("b", eb).unwrap();
        let ra = b.add(Pattern::Ref(da), String::new());
        let rb = b.add(Pattern::Ref(db), String::new());
        let choice = b.add(Pattern::Choice(ra, rb), String::new());
        b.finish(choice).unwrap()
    }

    #[test]
    fn choice_drops_the_other_branch() {
        let g = choice_of_elements();
        let r = DefaultNameResolver::default();
        let mut w = Walker::new(&g, g.start());
        assert!(!w.can_end());
        assert_eq!(w.possible().len(), 2);
        let res = w.fire_event(&Event::EnterStartTag(QualifiedName::new("", "b")), &r);
        assert!(res.matched);
        assert_eq!(res.refs.len(), 1);
        assert!(w.can_end());
        assert!(w.possible().is_empty());
        let res = w.fire_event(&Event::EnterStartTag(QualifiedName::new("", "a")), &r);
        assert!(!res.matched);
    }

    #[test]
    fn choice_error_names_both_sides() {
        let g = choice_of_elements();
        let mut w = Walker::new(&g, g.start());
        assert_eq!(
            w.end(),
            vec![ValidationError::Choice {
                names_a: vec![NameClass::named("", "a")],
                names_b: vec![NameClass::named("", "b")],
            }]
        );
    }

    #[test]
    fn optional_ignores_whitespace() {
        let mut b = GrammarBuilder::new();
        let empty = b.add(Pattern::Empty, String::new());
        let t = b.add(Pattern::Text, String::new());
        let el = b.add(Pattern::Element(NameClass::named("", "x"), t), String::new());
        let d = b.set_define("x", el).unwrap();
        let r = b.add(Pattern::Ref(d), String::new());
        let opt = b.add(Pattern::Choice(empty, r), String::new());
        let g = b.finish(opt).unwrap();
        let resolver = DefaultNameResolver::default();

        let mut w = Walker::new(&g, g.start());
        assert!(matches!(w, Walker::Optional(_)));
        assert!(w.fire_event(&text("  \n"), &resolver).matched);
        assert!(w.can_end());
        assert!(w.end().is_empty());
        // ending is sticky
        assert!(w.can_end());
    }

    #[test]
    fn one_or_more_iterates() {
        let mut b = GrammarBuilder::new();
        let t = b.add(Pattern::Text, String::new());
        let el = b.add(Pattern::Element(NameClass::named("", "item"), t), String::new());
        let d = b.set_define("item", el).unwrap();
        let r = b.add(Pattern::Ref(d), String::new());
        let more = b.add(Pattern::OneOrMore(r), String::new());
        let g = b.finish(more).unwrap();
        let resolver = DefaultNameResolver::default();
        let item = Event::EnterStartTag(QualifiedName::new("", "item"));

        let mut w = Walker::new(&g, g.start());
        assert!(!w.can_end());
        assert!(!w.clone().end().is_empty());
        for _ in 0..3 {
            let res = w.fire_event(&item, &resolver);
            assert!(res.matched);
            assert_eq!(res.refs.len(), 1);
            assert!(w.can_end());
        }
        assert!(w.end().is_empty());
    }

    #[test]
    fn group_waits_for_first_side() {
        let mut b = GrammarBuilder::new();
        let empty = b.add(Pattern::Empty, String::new());
        let ec = b.add(Pattern::Element(NameClass::named("", "c"), empty), String::new());
        let dc = b.set_define("c", ec).unwrap();
        let ed = b.add(Pattern::Element(NameClass::named("", "d"), empty), String::new());
        let dd = b.set_define("d", ed).unwrap();
        let rc = b.add(Pattern::Ref(dc), String::new());
        let rd = b.add(Pattern::Ref(dd), String::new());
        let group = b.add(Pattern::Group(rc, rd), String::new());
        let g = b.finish(group).unwrap();
        let resolver = DefaultNameResolver::default();

        let mut w = Walker::new(&g, g.start());
        let d = Event::EnterStartTag(QualifiedName::new("", "d"));
        assert!(!w.fire_event(&d, &resolver).matched);
        assert!(w
            .fire_event(&Event::EnterStartTag(QualifiedName::new("", "c")), &resolver)
            .matched);
        assert!(!w.can_end());
        assert!(w.fire_event(&d, &resolver).matched);
        assert!(w.can_end());
    }

    #[test]
    fn nested_groups_track_can_end() {
        // group(group(group(c0, c1), c2), ...), each ci an empty element
        let mut b = GrammarBuilder::new();
        let empty = b.add(Pattern::Empty, String::new());
        let mut group = None;
        for i in 0..12 {
            let name = format!("c{i}");
            let el = b.add(Pattern::Element(NameClass::named("", &name), empty), String::new());
            let d = b.set_define(&name, el).unwrap();
            let r = b.add(Pattern::Ref(d), String::new());
            group = Some(match group {
                None => r,
                Some(prev) => b.add(Pattern::Group(prev, r), String::new()),
            });
        }
        let g = b.finish(group.unwrap()).unwrap();
        let resolver = DefaultNameResolver::default();

        let mut w = Walker::new(&g, g.start());
        assert!(!w.can_end());
        assert!(w.can_end_attribute());
        for i in 0..12 {
            let name = format!("c{i}");
            let res = w.fire_event(&Event::EnterStartTag(QualifiedName::new("", &name)), &resolver);
            assert!(res.matched, "{name}");
            assert_eq!(w.can_end(), i == 11, "{name}");
        }
        assert!(w.end().is_empty());
    }

    #[test]
    fn attribute_events_only_reach_sides_with_attributes() {
        // group(element x, attribute a)
        let mut b = GrammarBuilder::new();
        let empty = b.add(Pattern::Empty, String::new());
        let t = b.add(Pattern::Text, String::new());
        let ex = b.add(Pattern::Element(NameClass::named("", "x"), empty), String::new());
        let dx = b.set_define("x", ex).unwrap();
        let rx = b.add(Pattern::Ref(dx), String::new());
        let attr = b.add(Pattern::Attribute(NameClass::named("", "a"), t), String::new());
        let group = b.add(Pattern::Group(rx, attr), String::new());
        let g = b.finish(group).unwrap();
        let resolver = DefaultNameResolver::default();

        let mut w = Walker::new(&g, g.start());
        assert!(!w.can_end_attribute());
        assert_eq!(
            w.possible_attributes(),
            vec![Expected::AttributeName(NameClass::named("", "a"))]
        );
        let event = Event::AttributeNameAndValue(QualifiedName::new("", "a"), "1".to_string());
        assert!(w.fire_event(&event, &resolver).matched);
        assert!(w.can_end_attribute());
        assert!(w.end_attributes().is_empty());
        assert!(!w.can_end());
        assert!(w
            .fire_event(&Event::EnterStartTag(QualifiedName::new("", "x")), &resolver)
            .matched);
        assert!(w.can_end());
    }

    #[test]
    fn content_without_attributes_ignores_attribute_events() {
        let g = choice_of_elements();
        let resolver = DefaultNameResolver::default();
        let mut w = Walker::new(&g, g.start());
        assert!(w.can_end_attribute());
        assert!(w.possible_attributes().is_empty());
        let event = Event::AttributeNameAndValue(QualifiedName::new("", "a"), "1".to_string());
        assert!(!w.fire_event(&event, &resolver).matched);
        assert!(w.end_attributes().is_empty());
        // both branches survive
        assert_eq!(w.possible().len(), 2);
    }
}
