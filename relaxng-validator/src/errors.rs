use relaxng_model::names::NameClass;

/// A way in which a document fails to conform to the grammar.  Validation carries on after
/// each of these, so a walk may produce many.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{message}")]
    Message { message: String },
    #[error("{message}: {}", .name.describe())]
    ElementName { message: String, name: NameClass },
    #[error("{message}: {}", .name.describe())]
    AttributeName { message: String, name: NameClass },
    #[error("{message}: {}", .name.describe())]
    AttributeValue { message: String, name: NameClass },
    /// Neither side of a choice was satisfied
    #[error("must choose either {} or {}", describe_all(.names_a), describe_all(.names_b))]
    Choice {
        names_a: Vec<NameClass>,
        names_b: Vec<NameClass>,
    },
    #[error("{message}: {}", .values.join(", "))]
    ValueChoice {
        message: String,
        values: Vec<String>,
    },
}

fn describe_all(names: &[NameClass]) -> String {
    let names: Vec<String> = names.iter().map(NameClass::describe).collect();
    if names.is_empty() {
        "{}".to_string()
    } else {
        names.join(", ")
    }
}

impl ValidationError {
    pub(crate) fn message(message: &str) -> ValidationError {
        ValidationError::Message {
            message: message.to_string(),
        }
    }

    pub(crate) fn element(message: &str, name: NameClass) -> ValidationError {
        ValidationError::ElementName {
            message: message.to_string(),
            name,
        }
    }

    pub(crate) fn attribute_name(message: &str, name: NameClass) -> ValidationError {
        ValidationError::AttributeName {
            message: message.to_string(),
            name,
        }
    }

    pub(crate) fn attribute_value(message: &str, name: NameClass) -> ValidationError {
        ValidationError::AttributeValue {
            message: message.to_string(),
            name,
        }
    }
}
