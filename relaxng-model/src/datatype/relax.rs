//! The RELAX NG built-in datatype library

use super::{
    Datatype, DatatypeLibrary, NameResolver, ParamError, ParameterParsingError, ParsedParams,
    ParsedValue, RawParam, ValueError, ValueValidationError,
};
use std::sync::Arc;

// TODO: return Cow
pub fn normalize_whitespace(val: &str) -> String {
    let mut last_space = false;
    let mut out = String::new();
    for c in val.chars().skip_while(|c| c.is_ascii_whitespace()) {
        if c.is_ascii_whitespace() {
            last_space = true;
        } else {
            if last_space {
                out.push(' ');
            }
            out.push(c);
            last_space = false;
        }
    }
    out
}

#[derive(PartialEq, Eq, Hash, Clone, Copy, Debug)]
pub enum BuiltinDatatype {
    Token,
    String,
}

impl BuiltinDatatype {
    fn normalize(&self, value: &str) -> String {
        match self {
            BuiltinDatatype::Token => normalize_whitespace(value),
            BuiltinDatatype::String => value.to_string(),
        }
    }
}

impl Datatype for BuiltinDatatype {
    fn name(&self) -> &str {
        match self {
            BuiltinDatatype::Token => "token",
            BuiltinDatatype::String => "string",
        }
    }

    fn parse_params(
        &self,
        location: &str,
        params: &[RawParam],
    ) -> Result<ParsedParams, ParameterParsingError> {
        if params.is_empty() {
            Ok(ParsedParams::default())
        } else {
            Err(ParameterParsingError {
                location: location.to_string(),
                errors: params
                    .iter()
                    .map(|p| {
                        ParamError::new(format!(
                            "relaxng built-in datatype supports no parameters, but found {:?}",
                            p.name
                        ))
                    })
                    .collect(),
            })
        }
    }

    fn parse_value(
        &self,
        _location: &str,
        value: &str,
        _context: Option<&dyn NameResolver>,
    ) -> Result<ParsedValue, ValueValidationError> {
        Ok(ParsedValue::String(self.normalize(value)))
    }

    fn disallows(
        &self,
        _value: &str,
        _params: &ParsedParams,
        _context: Option<&dyn NameResolver>,
    ) -> Option<Vec<ValueError>> {
        None
    }

    fn equal(
        &self,
        value: &str,
        schema_value: &ParsedValue,
        _context: Option<&dyn NameResolver>,
    ) -> bool {
        match schema_value {
            ParsedValue::String(s) => *s == self.normalize(value),
            _ => false,
        }
    }

    fn value_length(&self, value: &str) -> usize {
        self.normalize(value).chars().count()
    }
}

/// Library for the empty namespace URI, providing `string` and `token`
#[derive(Default)]
pub struct BuiltinLibrary;

impl DatatypeLibrary for BuiltinLibrary {
    fn uri(&self) -> &str {
        ""
    }

    fn datatype(&self, name: &str) -> Option<Arc<dyn Datatype>> {
        match name {
            "string" => Some(Arc::new(BuiltinDatatype::String)),
            "token" => Some(Arc::new(BuiltinDatatype::Token)),
            _ => None,
        }
    }
}
