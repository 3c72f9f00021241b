//! The document events that drive validation, and descriptions of the events a walker would
//! accept next.

use relaxng_model::names::{NameClass, QualifiedName};
use std::fmt;

/// One step of a document, as produced by an XML front end.  Names are already resolved
/// against the namespace declarations in scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    EnterStartTag(QualifiedName),
    LeaveStartTag,
    AttributeName(QualifiedName),
    AttributeValue(String),
    AttributeNameAndValue(QualifiedName, String),
    /// A whole start tag in one go, equivalent to `EnterStartTag`, an `AttributeNameAndValue`
    /// per attribute, and `LeaveStartTag`
    StartTagAndAttributes(QualifiedName, Vec<(QualifiedName, String)>),
    Text(String),
    EndTag(QualifiedName),
}

impl Event {
    pub fn is_attribute_event(&self) -> bool {
        matches!(
            self,
            Event::AttributeName(_) | Event::AttributeValue(_) | Event::AttributeNameAndValue(..)
        )
    }
}

/// An event that some walker is ready to accept
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Expected {
    EnterStartTag(NameClass),
    LeaveStartTag,
    AttributeName(NameClass),
    /// the value of the named attribute
    AttributeValue(NameClass),
    Text,
    /// text conforming to the named datatype
    Data(String),
    /// text equal to the given value
    Value(String),
    EndTag(QualifiedName),
}

impl Expected {
    /// The name class carried by tag and attribute-name expectations
    pub fn name_class(&self) -> Option<&NameClass> {
        match self {
            Expected::EnterStartTag(nc) | Expected::AttributeName(nc) => Some(nc),
            _ => None,
        }
    }

    pub fn is_value(&self) -> bool {
        matches!(self, Expected::Value(_))
    }
}

impl fmt::Display for Expected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expected::EnterStartTag(nc) => write!(f, "<{}>", nc.describe()),
            Expected::LeaveStartTag => f.write_str("end of start tag"),
            Expected::AttributeName(nc) => write!(f, "attribute {}", nc.describe()),
            Expected::AttributeValue(nc) => write!(f, "value of attribute {}", nc.describe()),
            Expected::Text => f.write_str("text"),
            Expected::Data(name) => write!(f, "{} value", name),
            Expected::Value(v) => write!(f, "{:?}", v),
            Expected::EndTag(name) => write!(f, "</{}>", name),
        }
    }
}

pub(crate) fn push_unique(into: &mut Vec<Expected>, items: Vec<Expected>) {
    for e in items {
        if !into.contains(&e) {
            into.push(e);
        }
    }
}
