//! Walkers track how much of a pattern a document has matched so far.
//!
//! There is one walker kind per pattern kind.  A walker is fed [`Event`]s one at a time and
//! updates its own state; cloning a walker gives an independent copy, which is how alternatives
//! are explored.  The leaf patterns that carry no state (`empty`, `text` and `notAllowed`) are
//! unit variants, so copying them costs nothing.
//!
//! Walkers never descend into a child element's content.  When a start tag matches a reference
//! to an element definition, a fresh [`ElementWalker`] is handed back in
//! [`FireResult::refs`] and the caller (ultimately the
//! [`GrammarWalker`](crate::grammar::GrammarWalker)) validates the child element with it.

use crate::errors::ValidationError;
use crate::events::{push_unique, Event, Expected};
use relaxng_model::datatype::NameResolver;
use relaxng_model::model::{Grammar, Pattern, PatternId};

mod attribute;
mod combinators;
mod element;
mod leaf;

use attribute::AttributeWalker;
use combinators::{ChoiceWalker, GroupWalker, InterleaveWalker, OneOrMoreWalker, OptionalWalker};
pub use element::ElementWalker;
use element::RefWalker;
use leaf::{DataWalker, ListWalker, ValueWalker};

/// The outcome of offering an event to a walker
#[derive(Default)]
pub struct FireResult<'g> {
    /// false when the walker could not accept the event, in which case its state is unchanged
    pub matched: bool,
    pub errors: Vec<ValidationError>,
    /// walkers for the content of a child element whose start tag was just matched
    pub refs: Vec<ElementWalker<'g>>,
}

impl<'g> FireResult<'g> {
    pub(crate) fn matched() -> FireResult<'g> {
        FireResult {
            matched: true,
            ..FireResult::default()
        }
    }

    pub(crate) fn unmatched() -> FireResult<'g> {
        FireResult::default()
    }

    pub(crate) fn with_errors(errors: Vec<ValidationError>) -> FireResult<'g> {
        FireResult {
            matched: true,
            errors,
            refs: vec![],
        }
    }
}

#[derive(Clone)]
pub enum Walker<'g> {
    Empty,
    Text,
    NotAllowed,
    /// Stands in for an element that was not expected, accepting whatever it contains
    Misplaced,
    Data(DataWalker<'g>),
    Value(ValueWalker<'g>),
    List(ListWalker<'g>),
    Attribute(AttributeWalker<'g>),
    Ref(RefWalker<'g>),
    Element(Box<ElementWalker<'g>>),
    Choice(Box<ChoiceWalker<'g>>),
    Optional(Box<OptionalWalker<'g>>),
    Group(Box<GroupWalker<'g>>),
    Interleave(Box<InterleaveWalker<'g>>),
    OneOrMore(Box<OneOrMoreWalker<'g>>),
}

impl<'g> Walker<'g> {
    pub fn new(grammar: &'g Grammar, id: PatternId) -> Walker<'g> {
        match grammar.pattern(id) {
            Pattern::Empty => Walker::Empty,
            Pattern::Text => Walker::Text,
            Pattern::NotAllowed => Walker::NotAllowed,
            Pattern::Data(data) => Walker::Data(DataWalker::new(grammar, data)),
            Pattern::Value(value) => Walker::Value(ValueWalker::new(value)),
            Pattern::List(child) => Walker::List(ListWalker::new(grammar, *child)),
            Pattern::Attribute(name, child) => {
                Walker::Attribute(AttributeWalker::new(grammar, name, *child))
            }
            Pattern::Element(..) => RefWalker::walker(grammar, id),
            Pattern::Ref(define) => RefWalker::walker(grammar, grammar.define(*define).pattern),
            Pattern::Choice(a, b) => match (grammar.pattern(*a), grammar.pattern(*b)) {
                (Pattern::Empty, _) => Walker::Optional(Box::new(OptionalWalker::new(grammar, *b))),
                (_, Pattern::Empty) => Walker::Optional(Box::new(OptionalWalker::new(grammar, *a))),
                _ => Walker::Choice(Box::new(ChoiceWalker::new(grammar, id, *a, *b))),
            },
            Pattern::Group(a, b) => Walker::Group(Box::new(GroupWalker::new(grammar, id, *a, *b))),
            Pattern::Interleave(a, b) => {
                Walker::Interleave(Box::new(InterleaveWalker::new(grammar, id, *a, *b)))
            }
            Pattern::OneOrMore(child) => {
                Walker::OneOrMore(Box::new(OneOrMoreWalker::new(grammar, id, *child)))
            }
        }
    }

    pub fn fire_event(&mut self, event: &Event, resolver: &dyn NameResolver) -> FireResult<'g> {
        match self {
            Walker::Empty => match event {
                Event::Text(text) if is_whitespace(text) => FireResult::matched(),
                _ => FireResult::unmatched(),
            },
            Walker::Text => match event {
                Event::Text(_) => FireResult::matched(),
                _ => FireResult::unmatched(),
            },
            Walker::NotAllowed => FireResult::unmatched(),
            Walker::Misplaced => match event {
                Event::EnterStartTag(_) | Event::StartTagAndAttributes(..) => {
                    FireResult::unmatched()
                }
                _ => FireResult::matched(),
            },
            Walker::Data(w) => w.fire_event(event, resolver),
            Walker::Value(w) => w.fire_event(event, resolver),
            Walker::List(w) => w.fire_event(event, resolver),
            Walker::Attribute(w) => w.fire_event(event, resolver),
            Walker::Ref(w) => w.fire_event(event),
            Walker::Element(w) => w.fire_event(event, resolver),
            Walker::Choice(w) => w.fire_event(event, resolver),
            Walker::Optional(w) => w.fire_event(event, resolver),
            Walker::Group(w) => w.fire_event(event, resolver),
            Walker::Interleave(w) => w.fire_event(event, resolver),
            Walker::OneOrMore(w) => w.fire_event(event, resolver),
        }
    }

    /// The non-attribute events this walker could accept next.  An element walker reports
    /// attribute events too, since it alone knows whether its start tag is still open.
    pub fn possible(&self) -> Vec<Expected> {
        match self {
            Walker::Empty | Walker::NotAllowed | Walker::Misplaced | Walker::Attribute(_) => {
                vec![]
            }
            Walker::Text => vec![Expected::Text],
            Walker::Data(w) => w.possible(),
            Walker::Value(w) => w.possible(),
            Walker::List(w) => w.possible(),
            Walker::Ref(w) => w.possible(),
            Walker::Element(w) => w.possible(),
            Walker::Choice(w) => w.possible(),
            Walker::Optional(w) => w.possible(),
            Walker::Group(w) => w.possible(),
            Walker::Interleave(w) => w.possible(),
            Walker::OneOrMore(w) => w.possible(),
        }
    }

    /// The attribute events this walker could accept next.
    ///
    /// Panics when called on an element walker, whose attributes are reported by
    /// [`possible()`](Walker::possible).
    pub fn possible_attributes(&self) -> Vec<Expected> {
        match self {
            Walker::Attribute(w) => w.possible_attributes(),
            Walker::Element(_) => {
                panic!("possible_attributes() called on an element walker")
            }
            Walker::Choice(w) => w.possible_attributes(),
            Walker::Optional(w) => w.possible_attributes(),
            Walker::Group(w) => w.possible_attributes(),
            Walker::Interleave(w) => w.possible_attributes(),
            Walker::OneOrMore(w) => w.possible_attributes(),
            _ => vec![],
        }
    }

    /// Errors for content that is still required when the enclosing element ends
    pub fn end(&mut self) -> Vec<ValidationError> {
        match self {
            Walker::Empty | Walker::Text | Walker::Misplaced | Walker::Attribute(_) => vec![],
            Walker::NotAllowed => vec![ValidationError::message("no content is allowed here")],
            Walker::Data(w) => w.end(),
            Walker::Value(w) => w.end(),
            Walker::List(w) => w.end(),
            Walker::Ref(w) => w.end(),
            Walker::Element(w) => w.end(),
            Walker::Choice(w) => w.end(),
            Walker::Optional(w) => w.end(),
            Walker::Group(w) => w.end(),
            Walker::Interleave(w) => w.end(),
            Walker::OneOrMore(w) => w.end(),
        }
    }

    /// Errors for attributes that are still required when the start tag closes
    pub fn end_attributes(&mut self) -> Vec<ValidationError> {
        match self {
            Walker::Attribute(w) => w.end_attributes(),
            Walker::Choice(w) => w.end_attributes(),
            Walker::Optional(w) => w.end_attributes(),
            Walker::Group(w) => w.end_attributes(),
            Walker::Interleave(w) => w.end_attributes(),
            Walker::OneOrMore(w) => w.end_attributes(),
            _ => vec![],
        }
    }

    /// Whether the content seen so far is complete.  Every walker keeps this as a field, so
    /// asking is constant time however deep the pattern is.
    pub fn can_end(&self) -> bool {
        match self {
            Walker::Empty | Walker::Text | Walker::Misplaced | Walker::Attribute(_) => true,
            Walker::NotAllowed => false,
            Walker::Data(w) => w.can_end(),
            Walker::Value(w) => w.can_end(),
            Walker::List(w) => w.can_end(),
            Walker::Ref(w) => w.can_end(),
            Walker::Element(w) => w.can_end(),
            Walker::Choice(w) => w.can_end(),
            Walker::Optional(w) => w.can_end(),
            Walker::Group(w) => w.can_end(),
            Walker::Interleave(w) => w.can_end(),
            Walker::OneOrMore(w) => w.can_end(),
        }
    }

    pub fn can_end_attribute(&self) -> bool {
        match self {
            Walker::Attribute(w) => w.can_end_attribute(),
            Walker::Choice(w) => w.can_end_attribute(),
            Walker::Optional(w) => w.can_end_attribute(),
            Walker::Group(w) => w.can_end_attribute(),
            Walker::Interleave(w) => w.can_end_attribute(),
            Walker::OneOrMore(w) => w.can_end_attribute(),
            _ => true,
        }
    }

    /// Whether an end tag would be accepted without errors
    pub(crate) fn can_close(&self) -> bool {
        match self {
            Walker::Element(w) => w.content_can_end(),
            other => other.can_end(),
        }
    }

    pub(crate) fn is_misplaced(&self) -> bool {
        matches!(self, Walker::Misplaced)
    }
}

pub(crate) fn is_whitespace_char(c: char) -> bool {
    ['\x20', '\x09', '\x0d', '\x0a'].contains(&c)
}

pub(crate) fn is_whitespace(s: &str) -> bool {
    s.chars().all(is_whitespace_char)
}

/// Whether `text` alone is acceptable to a fresh walker for `id`
pub(crate) fn text_matches(
    grammar: &Grammar,
    id: PatternId,
    text: &str,
    resolver: &dyn NameResolver,
) -> bool {
    let mut walker = Walker::new(grammar, id);
    let result = walker.fire_event(&Event::Text(text.to_string()), resolver);
    result.matched && result.errors.is_empty() && walker.end().is_empty()
}

pub(crate) fn union(a: Vec<Expected>, b: Vec<Expected>) -> Vec<Expected> {
    let mut result = a;
    push_unique(&mut result, b);
    result
}
