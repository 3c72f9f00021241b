use super::{is_whitespace_char, text_matches, FireResult, Walker};
use crate::errors::ValidationError;
use crate::events::{Event, Expected};
use relaxng_model::datatype::NameResolver;
use relaxng_model::model::{DataPattern, Grammar, PatternId, ValuePattern};
use relaxng_model::names::QualifiedName;

// Used to decide whether empty content is acceptable before any document context exists.  No
// prefix is bound, which is fine since the empty string is never a valid QName.
struct NoContext;

impl NameResolver for NoContext {
    fn resolve_name(&self, _qname: &str, _attribute: bool) -> Option<QualifiedName> {
        None
    }
}

pub(crate) fn data_allows(
    grammar: &Grammar,
    data: &DataPattern,
    text: &str,
    resolver: &dyn NameResolver,
) -> bool {
    if data
        .datatype
        .disallows(text, &data.params, Some(resolver))
        .is_some()
    {
        return false;
    }
    match data.except {
        Some(except) => !text_matches(grammar, except, text, resolver),
        None => true,
    }
}

#[derive(Clone)]
pub struct DataWalker<'g> {
    grammar: &'g Grammar,
    data: &'g DataPattern,
    matched: bool,
    can_end: bool,
}

impl<'g> DataWalker<'g> {
    pub fn new(grammar: &'g Grammar, data: &'g DataPattern) -> DataWalker<'g> {
        DataWalker {
            grammar,
            data,
            matched: false,
            can_end: data_allows(grammar, data, "", &NoContext),
        }
    }

    pub fn fire_event(&mut self, event: &Event, resolver: &dyn NameResolver) -> FireResult<'g> {
        match event {
            Event::Text(text)
                if !self.matched && data_allows(self.grammar, self.data, text, resolver) =>
            {
                self.matched = true;
                self.can_end = true;
                FireResult::matched()
            }
            _ => FireResult::unmatched(),
        }
    }

    pub fn possible(&self) -> Vec<Expected> {
        if self.matched {
            vec![]
        } else {
            vec![Expected::Data(self.data.type_name.clone())]
        }
    }

    pub fn end(&mut self) -> Vec<ValidationError> {
        if self.can_end {
            vec![]
        } else {
            vec![ValidationError::Message {
                message: format!("{} value required", self.data.type_name),
            }]
        }
    }

    pub fn can_end(&self) -> bool {
        self.can_end
    }
}

#[derive(Clone)]
pub struct ValueWalker<'g> {
    value: &'g ValuePattern,
    matched: bool,
    can_end: bool,
}

impl<'g> ValueWalker<'g> {
    pub fn new(value: &'g ValuePattern) -> ValueWalker<'g> {
        ValueWalker {
            value,
            matched: false,
            can_end: value.datatype.equal("", &value.value, Some(&NoContext)),
        }
    }

    pub fn fire_event(&mut self, event: &Event, resolver: &dyn NameResolver) -> FireResult<'g> {
        match event {
            Event::Text(text)
                if !self.matched
                    && self.value.datatype.equal(text, &self.value.value, Some(resolver)) =>
            {
                self.matched = true;
                self.can_end = true;
                FireResult::matched()
            }
            _ => FireResult::unmatched(),
        }
    }

    pub fn possible(&self) -> Vec<Expected> {
        if self.matched {
            vec![]
        } else {
            vec![Expected::Value(self.value.raw_value.clone())]
        }
    }

    pub fn end(&mut self) -> Vec<ValidationError> {
        if self.can_end {
            vec![]
        } else {
            vec![ValidationError::Message {
                message: format!("value {:?} required", self.value.raw_value),
            }]
        }
    }

    pub fn can_end(&self) -> bool {
        self.can_end
    }
}

/// Splits text on whitespace and matches the tokens, in order, against the list's pattern
#[derive(Clone)]
pub struct ListWalker<'g> {
    grammar: &'g Grammar,
    child: PatternId,
    matched: bool,
    can_end: bool,
}

impl<'g> ListWalker<'g> {
    pub fn new(grammar: &'g Grammar, child: PatternId) -> ListWalker<'g> {
        ListWalker {
            grammar,
            child,
            matched: false,
            can_end: Walker::new(grammar, child).can_end(),
        }
    }

    pub fn fire_event(&mut self, event: &Event, resolver: &dyn NameResolver) -> FireResult<'g> {
        let text = match event {
            Event::Text(text) if !self.matched => text,
            _ => return FireResult::unmatched(),
        };
        let mut walker = Walker::new(self.grammar, self.child);
        for token in text.split(is_whitespace_char).filter(|t| !t.is_empty()) {
            let result = walker.fire_event(&Event::Text(token.to_string()), resolver);
            if !result.matched || !result.errors.is_empty() {
                return FireResult::unmatched();
            }
        }
        if !walker.end().is_empty() {
            return FireResult::unmatched();
        }
        self.matched = true;
        self.can_end = true;
        FireResult::matched()
    }

    pub fn possible(&self) -> Vec<Expected> {
        if self.matched {
            vec![]
        } else {
            Walker::new(self.grammar, self.child).possible()
        }
    }

    pub fn end(&mut self) -> Vec<ValidationError> {
        if self.can_end {
            vec![]
        } else {
            Walker::new(self.grammar, self.child).end()
        }
    }

    pub fn can_end(&self) -> bool {
        self.can_end
    }
}
