use super::{union, FireResult, Walker};
use crate::errors::ValidationError;
use crate::events::{Event, Expected};
use relaxng_model::datatype::NameResolver;
use relaxng_model::model::{DefineId, Grammar, Pattern, PatternId};
use relaxng_model::names::{NameClass, QualifiedName};

/// Matches the start tag of a referenced element, handing the element's content over to a new
/// [`ElementWalker`]
#[derive(Clone)]
pub struct RefWalker<'g> {
    grammar: &'g Grammar,
    element: PatternId,
    name_class: &'g NameClass,
    matched: bool,
}

impl<'g> RefWalker<'g> {
    /// A walker for the element pattern `element`.  Definitions that simplified to something
    /// other than an element can never match, so they get the `notAllowed` walker.
    pub fn walker(grammar: &'g Grammar, element: PatternId) -> Walker<'g> {
        match grammar.pattern(element) {
            Pattern::Element(name_class, _) => Walker::Ref(RefWalker {
                grammar,
                element,
                name_class,
                matched: false,
            }),
            _ => Walker::NotAllowed,
        }
    }

    pub fn fire_event(&mut self, event: &Event) -> FireResult<'g> {
        match event {
            Event::EnterStartTag(name) | Event::StartTagAndAttributes(name, _)
                if !self.matched && self.name_class.matches_name(name) =>
            {
                self.matched = true;
                FireResult {
                    matched: true,
                    errors: vec![],
                    refs: ElementWalker::new(self.grammar, self.element, name.clone())
                        .into_iter()
                        .collect(),
                }
            }
            _ => FireResult::unmatched(),
        }
    }

    pub fn possible(&self) -> Vec<Expected> {
        if self.matched {
            vec![]
        } else {
            vec![Expected::EnterStartTag(self.name_class.clone())]
        }
    }

    pub fn end(&mut self) -> Vec<ValidationError> {
        if self.matched {
            vec![]
        } else {
            vec![ValidationError::element(
                "tag required",
                self.name_class.clone(),
            )]
        }
    }

    pub fn can_end(&self) -> bool {
        self.matched
    }
}

/// Validates one element of the document, from just after the name in its start tag up to its
/// end tag
#[derive(Clone)]
pub struct ElementWalker<'g> {
    name: QualifiedName,
    content: Walker<'g>,
    start_tag_ended: bool,
    ended: bool,
    // the next attribute value belongs to an attribute that was rejected
    skip_value: bool,
}

impl<'g> ElementWalker<'g> {
    /// `None` if `element` is not an element pattern
    pub fn new(grammar: &'g Grammar, element: PatternId, name: QualifiedName) -> Option<ElementWalker<'g>> {
        match grammar.pattern(element) {
            Pattern::Element(_, content) => Some(ElementWalker {
                name,
                content: Walker::new(grammar, *content),
                start_tag_ended: false,
                ended: false,
                skip_value: false,
            }),
            _ => None,
        }
    }

    pub fn for_define(grammar: &'g Grammar, define: DefineId, name: QualifiedName) -> Option<ElementWalker<'g>> {
        ElementWalker::new(grammar, grammar.define(define).pattern, name)
    }

    pub fn name(&self) -> &QualifiedName {
        &self.name
    }

    pub fn fire_event(&mut self, event: &Event, resolver: &dyn NameResolver) -> FireResult<'g> {
        match event {
            Event::AttributeName(name) | Event::AttributeNameAndValue(name, _)
                if !self.start_tag_ended =>
            {
                let result = self.content.fire_event(event, resolver);
                if result.matched {
                    result
                } else {
                    self.skip_value = matches!(event, Event::AttributeName(_));
                    FireResult::with_errors(vec![ValidationError::attribute_name(
                        "attribute not allowed here",
                        NameClass::named(&name.namespace_uri, &name.local_name),
                    )])
                }
            }
            Event::AttributeValue(_) if !self.start_tag_ended => {
                if self.skip_value {
                    self.skip_value = false;
                    return FireResult::matched();
                }
                let result = self.content.fire_event(event, resolver);
                if result.matched {
                    result
                } else {
                    FireResult::with_errors(vec![ValidationError::message(
                        "unexpected attribute value",
                    )])
                }
            }
            Event::LeaveStartTag if !self.start_tag_ended => {
                self.start_tag_ended = true;
                FireResult::with_errors(self.content.end_attributes())
            }
            Event::Text(_) if self.start_tag_ended && !self.ended => {
                let result = self.content.fire_event(event, resolver);
                if result.matched {
                    result
                } else {
                    FireResult::with_errors(vec![ValidationError::message("text not allowed here")])
                }
            }
            Event::EnterStartTag(_) | Event::StartTagAndAttributes(..)
                if self.start_tag_ended && !self.ended =>
            {
                self.content.fire_event(event, resolver)
            }
            Event::EndTag(name) if !self.ended && *name == self.name => {
                self.ended = true;
                let mut errors = vec![];
                if !self.start_tag_ended {
                    self.start_tag_ended = true;
                    errors.extend(self.content.end_attributes());
                }
                errors.extend(self.content.end());
                FireResult::with_errors(errors)
            }
            _ => FireResult::unmatched(),
        }
    }

    pub fn possible(&self) -> Vec<Expected> {
        if !self.start_tag_ended {
            let mut result = self.content.possible_attributes();
            if self.content.can_end_attribute() {
                result.push(Expected::LeaveStartTag);
            }
            result
        } else if self.ended {
            vec![]
        } else {
            let mut result = self.content.possible();
            if self.content.can_end() {
                result = union(result, vec![Expected::EndTag(self.name.clone())]);
            }
            result
        }
    }

    pub fn end(&mut self) -> Vec<ValidationError> {
        if self.ended {
            vec![]
        } else {
            vec![ValidationError::element(
                "element not closed",
                NameClass::named(&self.name.namespace_uri, &self.name.local_name),
            )]
        }
    }

    pub fn can_end(&self) -> bool {
        self.ended
    }

    pub(crate) fn content_can_end(&self) -> bool {
        self.content.can_end()
    }
}
