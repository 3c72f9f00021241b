use super::leaf::data_allows;
use super::{text_matches, FireResult};
use crate::errors::ValidationError;
use crate::events::{Event, Expected};
use relaxng_model::datatype::NameResolver;
use relaxng_model::model::{DataPattern, Grammar, Pattern, PatternId};
use relaxng_model::names::{NameClass, QualifiedName};

// the common shapes of attribute content get a shortcut, anything else runs a walker
#[derive(Clone, Copy)]
enum ValueCheck<'g> {
    Text,
    Data(&'g DataPattern),
    Generic(PatternId),
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum State {
    AwaitingName,
    AwaitingValue,
    Done,
}

#[derive(Clone)]
pub struct AttributeWalker<'g> {
    grammar: &'g Grammar,
    name_class: &'g NameClass,
    check: ValueCheck<'g>,
    state: State,
    seen: Option<QualifiedName>,
}

impl<'g> AttributeWalker<'g> {
    pub fn new(grammar: &'g Grammar, name_class: &'g NameClass, child: PatternId) -> AttributeWalker<'g> {
        let check = match grammar.pattern(child) {
            Pattern::Text => ValueCheck::Text,
            Pattern::Data(data) => ValueCheck::Data(data),
            _ => ValueCheck::Generic(child),
        };
        AttributeWalker {
            grammar,
            name_class,
            check,
            state: State::AwaitingName,
            seen: None,
        }
    }

    pub fn fire_event(&mut self, event: &Event, resolver: &dyn NameResolver) -> FireResult<'g> {
        match event {
            Event::AttributeName(name)
                if self.state == State::AwaitingName && self.name_class.matches_name(name) =>
            {
                self.state = State::AwaitingValue;
                self.seen = Some(name.clone());
                FireResult::matched()
            }
            Event::AttributeValue(value) if self.state == State::AwaitingValue => {
                self.state = State::Done;
                self.check_value(value, resolver)
            }
            Event::AttributeNameAndValue(name, value)
                if self.state == State::AwaitingName && self.name_class.matches_name(name) =>
            {
                self.state = State::Done;
                self.seen = Some(name.clone());
                self.check_value(value, resolver)
            }
            _ => FireResult::unmatched(),
        }
    }

    fn check_value(&self, value: &str, resolver: &dyn NameResolver) -> FireResult<'g> {
        let ok = match self.check {
            ValueCheck::Text => true,
            ValueCheck::Data(data) => data_allows(self.grammar, data, value, resolver),
            ValueCheck::Generic(child) => text_matches(self.grammar, child, value, resolver),
        };
        if ok {
            FireResult::matched()
        } else {
            FireResult::with_errors(vec![ValidationError::attribute_value(
                "invalid attribute value",
                self.seen_name(),
            )])
        }
    }

    fn seen_name(&self) -> NameClass {
        match &self.seen {
            Some(name) => NameClass::named(&name.namespace_uri, &name.local_name),
            None => self.name_class.clone(),
        }
    }

    pub fn possible_attributes(&self) -> Vec<Expected> {
        match self.state {
            State::AwaitingName => vec![Expected::AttributeName(self.name_class.clone())],
            State::AwaitingValue => vec![Expected::AttributeValue(self.seen_name())],
            State::Done => vec![],
        }
    }

    pub fn end_attributes(&mut self) -> Vec<ValidationError> {
        match self.state {
            State::AwaitingName => vec![ValidationError::attribute_name(
                "attribute missing",
                self.name_class.clone(),
            )],
            State::AwaitingValue => vec![ValidationError::attribute_value(
                "attribute value missing",
                self.seen_name(),
            )],
            State::Done => vec![],
        }
    }

    pub fn can_end_attribute(&self) -> bool {
        self.state == State::Done
    }
}
