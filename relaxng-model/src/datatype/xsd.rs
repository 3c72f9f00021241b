use super::relax::normalize_whitespace;
use super::{
    regexp, Datatype, DatatypeLibrary, NameResolver, ParamError, ParameterParsingError,
    ParsedParams, ParsedValue, RawParam, ValueError, ValueValidationError,
};
use bigdecimal::BigDecimal;
use lazy_static::lazy_static;
use num_bigint::BigInt;
use relaxng_syntax::xml::{is_nc_name, is_nc_name_char, is_nc_name_start_char};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::convert::TryFrom;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex};

pub const NAMESPACE_URI: &str = "http://www.w3.org/2001/XMLSchema-datatypes";

lazy_static! {
    static ref LANG_RE: regex::Regex = regex::Regex::new(r"^[a-zA-Z]{1,8}(-[a-zA-Z0-9]{1,8})*$").unwrap();
    static ref DATETIME_RE: regex::Regex = regex::Regex::new(r"^-?\d{4,}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(\.\d+)?(Z|[+-]\d{2}:\d{2})?$").unwrap();
    static ref DATE_RE: regex::Regex = regex::Regex::new(r"^-?\d{4,}-\d{2}-\d{2}(Z|[+-]\d{2}:\d{2})?$").unwrap();
    static ref TIME_RE: regex::Regex = regex::Regex::new(r"^\d{2}:\d{2}:\d{2}(\.\d+)?(Z|[+-]\d{2}:\d{2})?$").unwrap();
    static ref GYEAR_RE: regex::Regex = regex::Regex::new(r"^-?\d{4,}(Z|[+-]\d{2}:\d{2})?$").unwrap();
    static ref GYEARMONTH_RE: regex::Regex = regex::Regex::new(r"^-?\d{4,}-\d{2}(Z|[+-]\d{2}:\d{2})?$").unwrap();
    static ref GMONTH_RE: regex::Regex = regex::Regex::new(r"^--\d{2}(Z|[+-]\d{2}:\d{2})?$").unwrap();
    static ref GMONTHDAY_RE: regex::Regex = regex::Regex::new(r"^--\d{2}-\d{2}(Z|[+-]\d{2}:\d{2})?$").unwrap();
    static ref GDAY_RE: regex::Regex = regex::Regex::new(r"^---\d{2}(Z|[+-]\d{2}:\d{2})?$").unwrap();
    static ref DURATION_RE: regex::Regex = regex::Regex::new(r"^-?P(\d+Y)?(\d+M)?(\d+D)?(T(\d+H)?(\d+M)?(\d+(\.\d+)?S)?)?$").unwrap();
    static ref DECIMAL_RE: regex::Regex = regex::Regex::new(r"^[+-]?(\d+(\.\d*)?|\.\d+)$").unwrap();
    static ref INTEGER_RE: regex::Regex = regex::Regex::new(r"^[+-]?\d+$").unwrap();
    static ref FLOAT_RE: regex::Regex = regex::Regex::new(r"^([+-]?(\d+(\.\d*)?|\.\d+)([eE][+-]?\d+)?|-?INF|NaN)$").unwrap();
    static ref BASE64_RE: regex::Regex = regex::Regex::new(r"^([A-Za-z0-9+/]{4})*([A-Za-z0-9+/]{2}==|[A-Za-z0-9+/]{3}=)?$").unwrap();
    static ref HEX_RE: regex::Regex = regex::Regex::new(r"^([0-9a-fA-F]{2})*$").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Kind {
    String,
    NormalizedString,
    Token,
    Language,
    Name,
    NcName,
    NmToken,
    NmTokens,
    Id,
    IdRef,
    IdRefs,
    Entity,
    Entities,
    QName,
    Notation,
    AnyUri,
    Base64Binary,
    HexBinary,
    Boolean,
    Decimal,
    Integer,
    NonPositiveInteger,
    NegativeInteger,
    Long,
    Int,
    Short,
    Byte,
    NonNegativeInteger,
    UnsignedLong,
    UnsignedInt,
    UnsignedShort,
    UnsignedByte,
    PositiveInteger,
    Float,
    Double,
    Duration,
    DateTime,
    Date,
    Time,
    GYear,
    GYearMonth,
    GMonth,
    GMonthDay,
    GDay,
}

const TYPES: &[(&str, Kind)] = &[
    ("string", Kind::String),
    ("normalizedString", Kind::NormalizedString),
    ("token", Kind::Token),
    ("language", Kind::Language),
    ("Name", Kind::Name),
    ("NCName", Kind::NcName),
    ("NMTOKEN", Kind::NmToken),
    ("NMTOKENS", Kind::NmTokens),
    ("ID", Kind::Id),
    ("IDREF", Kind::IdRef),
    ("IDREFS", Kind::IdRefs),
    ("ENTITY", Kind::Entity),
    ("ENTITIES", Kind::Entities),
    ("QName", Kind::QName),
    ("NOTATION", Kind::Notation),
    ("anyURI", Kind::AnyUri),
    ("base64Binary", Kind::Base64Binary),
    ("hexBinary", Kind::HexBinary),
    ("boolean", Kind::Boolean),
    ("decimal", Kind::Decimal),
    ("integer", Kind::Integer),
    ("nonPositiveInteger", Kind::NonPositiveInteger),
    ("negativeInteger", Kind::NegativeInteger),
    ("long", Kind::Long),
    ("int", Kind::Int),
    ("short", Kind::Short),
    ("byte", Kind::Byte),
    ("nonNegativeInteger", Kind::NonNegativeInteger),
    ("unsignedLong", Kind::UnsignedLong),
    ("unsignedInt", Kind::UnsignedInt),
    ("unsignedShort", Kind::UnsignedShort),
    ("unsignedByte", Kind::UnsignedByte),
    ("positiveInteger", Kind::PositiveInteger),
    ("float", Kind::Float),
    ("double", Kind::Double),
    ("duration", Kind::Duration),
    ("dateTime", Kind::DateTime),
    ("date", Kind::Date),
    ("time", Kind::Time),
    ("gYear", Kind::GYear),
    ("gYearMonth", Kind::GYearMonth),
    ("gMonth", Kind::GMonth),
    ("gMonthDay", Kind::GMonthDay),
    ("gDay", Kind::GDay),
];

/// Which group of facets applies to a type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Family {
    Length,
    Decimal,
    Float,
    Ordered,
    PatternOnly,
}

impl Family {
    fn allows(self, param: &str) -> bool {
        match param {
            "pattern" => true,
            "length" | "minLength" | "maxLength" => self == Family::Length,
            "totalDigits" | "fractionDigits" => self == Family::Decimal,
            "minInclusive" | "minExclusive" | "maxInclusive" | "maxExclusive" => matches!(
                self,
                Family::Decimal | Family::Float | Family::Ordered
            ),
            _ => false,
        }
    }
}

const KNOWN_PARAMS: &[&str] = &[
    "length",
    "minLength",
    "maxLength",
    "pattern",
    "totalDigits",
    "fractionDigits",
    "minInclusive",
    "minExclusive",
    "maxInclusive",
    "maxExclusive",
];

impl Kind {
    fn family(self) -> Family {
        match self {
            Kind::String
            | Kind::NormalizedString
            | Kind::Token
            | Kind::Language
            | Kind::Name
            | Kind::NcName
            | Kind::NmToken
            | Kind::NmTokens
            | Kind::Id
            | Kind::IdRef
            | Kind::IdRefs
            | Kind::Entity
            | Kind::Entities
            | Kind::QName
            | Kind::Notation
            | Kind::AnyUri
            | Kind::Base64Binary
            | Kind::HexBinary => Family::Length,
            Kind::Decimal
            | Kind::Integer
            | Kind::NonPositiveInteger
            | Kind::NegativeInteger
            | Kind::Long
            | Kind::Int
            | Kind::Short
            | Kind::Byte
            | Kind::NonNegativeInteger
            | Kind::UnsignedLong
            | Kind::UnsignedInt
            | Kind::UnsignedShort
            | Kind::UnsignedByte
            | Kind::PositiveInteger => Family::Decimal,
            Kind::Float | Kind::Double => Family::Float,
            Kind::DateTime | Kind::Date => Family::Ordered,
            Kind::Boolean
            | Kind::Duration
            | Kind::Time
            | Kind::GYear
            | Kind::GYearMonth
            | Kind::GMonth
            | Kind::GMonthDay
            | Kind::GDay => Family::PatternOnly,
        }
    }

    fn is_integer(self) -> bool {
        self.family() == Family::Decimal && self != Kind::Decimal
    }

    /// The implicit inclusive range of the integer-derived types
    fn default_range(self) -> (Option<i128>, Option<i128>) {
        match self {
            Kind::NonPositiveInteger => (None, Some(0)),
            Kind::NegativeInteger => (None, Some(-1)),
            Kind::Long => (Some(i64::MIN as i128), Some(i64::MAX as i128)),
            Kind::Int => (Some(i32::MIN as i128), Some(i32::MAX as i128)),
            Kind::Short => (Some(i16::MIN as i128), Some(i16::MAX as i128)),
            Kind::Byte => (Some(i8::MIN as i128), Some(i8::MAX as i128)),
            Kind::NonNegativeInteger => (Some(0), None),
            Kind::UnsignedLong => (Some(0), Some(u64::MAX as i128)),
            Kind::UnsignedInt => (Some(0), Some(u32::MAX as i128)),
            Kind::UnsignedShort => (Some(0), Some(u16::MAX as i128)),
            Kind::UnsignedByte => (Some(0), Some(u8::MAX as i128)),
            Kind::PositiveInteger => (Some(1), None),
            _ => (None, None),
        }
    }

    fn is_list(self) -> bool {
        matches!(self, Kind::NmTokens | Kind::IdRefs | Kind::Entities)
    }
}

/// A value on which the bounds facets operate
#[derive(Debug, Clone, PartialEq)]
pub enum Ordered {
    Decimal(BigDecimal),
    Float(f64),
    Temporal(Temporal),
}

impl PartialOrd for Ordered {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Ordered::Decimal(a), Ordered::Decimal(b)) => a.partial_cmp(b),
            (Ordered::Float(a), Ordered::Float(b)) => a.partial_cmp(b),
            (Ordered::Temporal(a), Ordered::Temporal(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

impl fmt::Display for Ordered {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ordered::Decimal(d) => write!(f, "{}", d),
            Ordered::Float(v) => write!(f, "{}", v),
            Ordered::Temporal(t) => write!(f, "{}", t.instant),
        }
    }
}

/// A `date` or `dateTime`, normalised to UTC when a timezone was given.
///
/// Values with and without a timezone are not comparable.
#[derive(Debug, Clone, PartialEq)]
pub struct Temporal {
    instant: chrono::NaiveDateTime,
    timezoned: bool,
}

impl PartialOrd for Temporal {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        if self.timezoned == other.timezoned {
            self.instant.partial_cmp(&other.instant)
        } else {
            None
        }
    }
}

fn split_timezone(v: &str) -> Option<(&str, Option<i64>)> {
    if let Some(base) = v.strip_suffix('Z') {
        return Some((base, Some(0)));
    }
    let len = v.len();
    let bytes = v.as_bytes();
    if len > 6 && (bytes[len - 6] == b'+' || bytes[len - 6] == b'-') && bytes[len - 3] == b':' {
        let hours: i64 = v[len - 5..len - 3].parse().ok()?;
        let minutes: i64 = v[len - 2..].parse().ok()?;
        let sign = if bytes[len - 6] == b'-' { -1 } else { 1 };
        return Some((&v[..len - 6], Some(sign * (hours * 60 + minutes))));
    }
    Some((v, None))
}

fn parse_temporal(v: &str, with_time: bool) -> Option<Temporal> {
    let (base, offset) = split_timezone(v)?;
    let naive = if with_time {
        chrono::NaiveDateTime::parse_from_str(base, "%Y-%m-%dT%H:%M:%S%.f").ok()?
    } else {
        chrono::NaiveDate::parse_from_str(base, "%Y-%m-%d")
            .ok()?
            .and_hms_opt(0, 0, 0)?
    };
    let instant = naive - chrono::Duration::minutes(offset.unwrap_or(0));
    Some(Temporal {
        instant,
        timezoned: offset.is_some(),
    })
}

#[derive(PartialEq, Eq, Hash, Clone, Debug)]
enum Min<T: PartialOrd> {
    Unbounded,
    Inclusive(T),
    Exclusive(T),
}
impl<T: PartialOrd> Min<T> {
    fn is_valid(&self, v: &T) -> bool {
        match self {
            Min::Unbounded => true,
            Min::Inclusive(min) => min <= v,
            Min::Exclusive(min) => min < v,
        }
    }
}
#[derive(PartialEq, Eq, Hash, Clone, Debug)]
enum Max<T: PartialOrd> {
    Unbounded,
    Inclusive(T),
    Exclusive(T),
}
impl<T: PartialOrd> Max<T> {
    fn is_valid(&self, v: &T) -> bool {
        match self {
            Max::Unbounded => true,
            Max::Inclusive(max) => v <= max,
            Max::Exclusive(max) => v < max,
        }
    }
}
#[derive(PartialEq, Eq, Hash, Clone, Debug)]
pub struct MinMaxFacet<T: PartialOrd> {
    min: Min<T>,
    max: Max<T>,
}
impl<T: PartialOrd> Default for MinMaxFacet<T> {
    fn default() -> Self {
        MinMaxFacet {
            min: Min::Unbounded,
            max: Max::Unbounded,
        }
    }
}
impl<T> MinMaxFacet<T>
where
    T: PartialOrd,
{
    fn check_against_max(&self, val: &T, name: &str) -> Result<(), ParamError> {
        match &self.max {
            Max::Unbounded => Ok(()),
            Max::Inclusive(max) => {
                if val > max {
                    Err(ParamError::new(format!(
                        "{} conflicts with maxInclusive",
                        name
                    )))
                } else {
                    Ok(())
                }
            }
            Max::Exclusive(max) => {
                if val >= max {
                    Err(ParamError::new(format!(
                        "{} conflicts with maxExclusive",
                        name
                    )))
                } else {
                    Ok(())
                }
            }
        }
    }

    fn check_against_min(&self, val: &T, name: &str) -> Result<(), ParamError> {
        match &self.min {
            Min::Unbounded => Ok(()),
            Min::Inclusive(min) => {
                if min > val {
                    Err(ParamError::new(format!(
                        "minInclusive conflicts with {}",
                        name
                    )))
                } else {
                    Ok(())
                }
            }
            Min::Exclusive(min) => {
                if min >= val {
                    Err(ParamError::new(format!(
                        "minExclusive conflicts with {}",
                        name
                    )))
                } else {
                    Ok(())
                }
            }
        }
    }

    fn min_inclusive(&mut self, val: T) -> Result<(), ParamError> {
        self.check_against_max(&val, "minInclusive")?;
        self.min = match self.min {
            Min::Unbounded => Min::Inclusive(val),
            Min::Inclusive(_) => return Err(repeated("minInclusive")),
            Min::Exclusive(_) => {
                return Err(ParamError::new("minInclusive conflicts with minExclusive"))
            }
        };
        Ok(())
    }
    fn min_exclusive(&mut self, val: T) -> Result<(), ParamError> {
        self.check_against_max(&val, "minExclusive")?;
        self.min = match self.min {
            Min::Unbounded => Min::Exclusive(val),
            Min::Inclusive(_) => {
                return Err(ParamError::new("minExclusive conflicts with minInclusive"))
            }
            Min::Exclusive(_) => return Err(repeated("minExclusive")),
        };
        Ok(())
    }
    fn max_inclusive(&mut self, val: T) -> Result<(), ParamError> {
        self.check_against_min(&val, "maxInclusive")?;
        self.max = match self.max {
            Max::Unbounded => Max::Inclusive(val),
            Max::Inclusive(_) => return Err(repeated("maxInclusive")),
            Max::Exclusive(_) => {
                return Err(ParamError::new("maxInclusive conflicts with maxExclusive"))
            }
        };
        Ok(())
    }
    fn max_exclusive(&mut self, val: T) -> Result<(), ParamError> {
        self.check_against_min(&val, "maxExclusive")?;
        self.max = match self.max {
            Max::Unbounded => Max::Exclusive(val),
            Max::Inclusive(_) => {
                return Err(ParamError::new("maxExclusive conflicts with maxInclusive"))
            }
            Max::Exclusive(_) => return Err(repeated("maxExclusive")),
        };
        Ok(())
    }

    fn is_valid(&self, v: &T) -> bool {
        self.min.is_valid(v) && self.max.is_valid(v)
    }
}

fn repeated(name: &str) -> ParamError {
    ParamError::new(format!("{} may not be repeated", name))
}

#[derive(Clone)]
pub struct PatternFacet(String, Arc<regex::Regex>);
impl PartialEq for PatternFacet {
    fn eq(&self, other: &Self) -> bool {
        self.0 == other.0
    }
}
impl Eq for PatternFacet {}
impl fmt::Debug for PatternFacet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        f.debug_tuple("PatternFacet").field(&self.0).finish()
    }
}
impl PatternFacet {
    fn is_valid(&self, value: &str) -> bool {
        self.1.is_match(value)
    }
}

/// Compiled `pattern` facets, shared between all datatypes of a library, keyed by the XML Schema
/// source of the expression
#[derive(Debug, Default)]
pub struct PatternCache {
    compiled: Mutex<HashMap<String, Arc<regex::Regex>>>,
}

impl PatternCache {
    pub fn get(&self, source: &str) -> Result<Arc<regex::Regex>, regexp::RegexError> {
        let mut compiled = self.compiled.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(re) = compiled.get(source) {
            return Ok(re.clone());
        }
        let re = Arc::new(regexp::compile(source)?);
        compiled.insert(source.to_string(), re.clone());
        Ok(re)
    }
}

/// The facets of a `data` pattern from the XML Schema library
#[derive(Debug, Clone, Default)]
pub struct Facets {
    length: Option<usize>,
    min_length: Option<usize>,
    max_length: Option<usize>,
    patterns: Vec<PatternFacet>,
    total_digits: Option<usize>,
    fraction_digits: Option<usize>,
    bounds: MinMaxFacet<Ordered>,
}

fn set_once(slot: &mut Option<usize>, name: &str, value: usize) -> Result<(), ParamError> {
    if slot.is_some() {
        return Err(repeated(name));
    }
    *slot = Some(value);
    Ok(())
}

#[derive(Debug)]
pub struct XsdDatatype {
    kind: Kind,
    name: &'static str,
    patterns: Arc<PatternCache>,
}

impl XsdDatatype {
    fn whitespace(&self, value: &str) -> String {
        match self.kind {
            Kind::String => value.to_string(),
            Kind::NormalizedString => value
                .chars()
                .map(|c| if matches!(c, '\t' | '\n' | '\r') { ' ' } else { c })
                .collect(),
            _ => normalize_whitespace(value),
        }
    }

    fn invalid(&self, value: &str) -> ValueError {
        ValueError::new(format!("{:?} is not a valid {}", value, self.name))
    }

    /// Parses an already whitespace-normalised value, including the implicit range of the
    /// integer types
    fn lexical(
        &self,
        v: &str,
        context: Option<&dyn NameResolver>,
    ) -> Result<ParsedValue, ValueError> {
        let check = |ok: bool| {
            if ok {
                Ok(ParsedValue::String(v.to_string()))
            } else {
                Err(self.invalid(v))
            }
        };
        match self.kind {
            Kind::String | Kind::NormalizedString | Kind::Token => check(true),
            Kind::Language => check(LANG_RE.is_match(v)),
            Kind::Name => check(is_name(v)),
            Kind::NcName | Kind::Id | Kind::IdRef | Kind::Entity => check(is_nc_name(v)),
            Kind::NmToken => check(is_nm_token(v)),
            Kind::NmTokens | Kind::IdRefs | Kind::Entities => {
                let items: Vec<&str> = v.split(' ').filter(|s| !s.is_empty()).collect();
                if items.is_empty() {
                    return Err(ValueError::new(format!("{} must not be empty", self.name)));
                }
                let item_ok: fn(&str) -> bool = if self.kind == Kind::NmTokens {
                    is_nm_token
                } else {
                    is_nc_name
                };
                if let Some(bad) = items.iter().find(|i| !item_ok(i)) {
                    return Err(ValueError::new(format!(
                        "{:?} is not a valid item of {}",
                        bad, self.name
                    )));
                }
                Ok(ParsedValue::List(
                    items
                        .into_iter()
                        .map(|i| ParsedValue::String(i.to_string()))
                        .collect(),
                ))
            }
            Kind::QName | Kind::Notation => {
                let lexically_ok = match v.find(':') {
                    Some(pos) => is_nc_name(&v[..pos]) && is_nc_name(&v[pos + 1..]),
                    None => is_nc_name(v),
                };
                if !lexically_ok {
                    return Err(self.invalid(v));
                }
                match context {
                    Some(ctx) => ctx
                        .resolve_name(v, false)
                        .map(ParsedValue::QName)
                        .ok_or_else(|| {
                            ValueError::new(format!("cannot resolve the prefix of {:?}", v))
                        }),
                    None => check(true),
                }
            }
            Kind::AnyUri => check(uriparse::URIReference::try_from(v).is_ok()),
            Kind::Base64Binary => {
                let compact: String = v.chars().filter(|c| !c.is_ascii_whitespace()).collect();
                if BASE64_RE.is_match(&compact) {
                    Ok(ParsedValue::Binary(decode_base64(&compact)))
                } else {
                    Err(self.invalid(v))
                }
            }
            Kind::HexBinary => {
                if HEX_RE.is_match(v) {
                    let bytes = (0..v.len())
                        .step_by(2)
                        .filter_map(|i| u8::from_str_radix(&v[i..i + 2], 16).ok())
                        .collect();
                    Ok(ParsedValue::Binary(bytes))
                } else {
                    Err(self.invalid(v))
                }
            }
            Kind::Boolean => match v {
                "true" | "1" => Ok(ParsedValue::Boolean(true)),
                "false" | "0" => Ok(ParsedValue::Boolean(false)),
                _ => Err(self.invalid(v)),
            },
            Kind::Decimal => {
                if !DECIMAL_RE.is_match(v) {
                    return Err(self.invalid(v));
                }
                parse_decimal(v)
                    .map(ParsedValue::Decimal)
                    .ok_or_else(|| self.invalid(v))
            }
            Kind::Float | Kind::Double => {
                if !FLOAT_RE.is_match(v) {
                    return Err(self.invalid(v));
                }
                let f = match v {
                    "INF" => f64::INFINITY,
                    "-INF" => f64::NEG_INFINITY,
                    "NaN" => f64::NAN,
                    _ => f64::from_str(v).map_err(|_| self.invalid(v))?,
                };
                let f = if self.kind == Kind::Float {
                    f as f32 as f64
                } else {
                    f
                };
                Ok(ParsedValue::Float(f))
            }
            Kind::DateTime => {
                if !DATETIME_RE.is_match(v) {
                    return Err(self.invalid(v));
                }
                parse_temporal(v, true)
                    .map(ParsedValue::DateTime)
                    .ok_or_else(|| self.invalid(v))
            }
            Kind::Date => {
                if !DATE_RE.is_match(v) {
                    return Err(self.invalid(v));
                }
                parse_temporal(v, false)
                    .map(ParsedValue::DateTime)
                    .ok_or_else(|| self.invalid(v))
            }
            Kind::Duration => check(
                DURATION_RE.is_match(v) && !v.ends_with('P') && !v.ends_with('T'),
            ),
            Kind::Time => check(TIME_RE.is_match(v)),
            Kind::GYear => check(GYEAR_RE.is_match(v)),
            Kind::GYearMonth => check(GYEARMONTH_RE.is_match(v)),
            Kind::GMonth => check(GMONTH_RE.is_match(v)),
            Kind::GMonthDay => check(GMONTHDAY_RE.is_match(v)),
            Kind::GDay => check(GDAY_RE.is_match(v)),
            Kind::Integer
            | Kind::NonPositiveInteger
            | Kind::NegativeInteger
            | Kind::Long
            | Kind::Int
            | Kind::Short
            | Kind::Byte
            | Kind::NonNegativeInteger
            | Kind::UnsignedLong
            | Kind::UnsignedInt
            | Kind::UnsignedShort
            | Kind::UnsignedByte
            | Kind::PositiveInteger => {
                if !INTEGER_RE.is_match(v) {
                    return Err(self.invalid(v));
                }
                let d = parse_decimal(v).ok_or_else(|| self.invalid(v))?;
                let (min, max) = self.kind.default_range();
                let below = min.map(|m| d < BigDecimal::new(BigInt::from(m), 0));
                let above = max.map(|m| d > BigDecimal::new(BigInt::from(m), 0));
                if below == Some(true) || above == Some(true) {
                    return Err(ValueError::new(format!(
                        "{} is out of range for {}",
                        v, self.name
                    )));
                }
                Ok(ParsedValue::Decimal(d))
            }
        }
    }

    fn length_of(&self, normalized: &str, parsed: &ParsedValue) -> usize {
        match parsed {
            ParsedValue::Binary(b) => b.len(),
            ParsedValue::List(items) => items.len(),
            _ => normalized.chars().count(),
        }
    }

    fn bound(&self, param: &RawParam) -> Result<Ordered, ParamError> {
        let normalized = self.whitespace(&param.value);
        match self.lexical(&normalized, None) {
            Ok(ParsedValue::Decimal(d)) => Ok(Ordered::Decimal(d)),
            Ok(ParsedValue::Float(f)) => Ok(Ordered::Float(f)),
            Ok(ParsedValue::DateTime(t)) => Ok(Ordered::Temporal(t)),
            Ok(_) => Err(ParamError::new(format!(
                "{} is not supported for {}",
                param.name, self.name
            ))),
            Err(e) => Err(ParamError::new(format!(
                "invalid value for {}: {}",
                param.name, e
            ))),
        }
    }

    fn apply_param(&self, facets: &mut Facets, param: &RawParam) -> Result<(), ParamError> {
        if !KNOWN_PARAMS.contains(&param.name.as_str()) {
            return Err(ParamError::new(format!(
                "unknown parameter {:?}",
                param.name
            )));
        }
        if !self.kind.family().allows(&param.name) {
            return Err(ParamError::new(format!(
                "{} is not a valid parameter for {}",
                param.name, self.name
            )));
        }
        match param.name.as_str() {
            "length" => set_once(&mut facets.length, "length", parse_usize(param)?),
            "minLength" => set_once(&mut facets.min_length, "minLength", parse_usize(param)?),
            "maxLength" => set_once(&mut facets.max_length, "maxLength", parse_usize(param)?),
            "totalDigits" => {
                let n = parse_usize(param)?;
                if n == 0 {
                    return Err(ParamError::new("totalDigits must be a positive integer"));
                }
                set_once(&mut facets.total_digits, "totalDigits", n)
            }
            "fractionDigits" => set_once(
                &mut facets.fraction_digits,
                "fractionDigits",
                parse_usize(param)?,
            ),
            "pattern" => {
                let re = self.patterns.get(&param.value).map_err(|e| {
                    ParamError::new(format!("invalid pattern {:?}: {}", param.value, e))
                })?;
                facets.patterns.push(PatternFacet(param.value.clone(), re));
                Ok(())
            }
            "minInclusive" => facets.bounds.min_inclusive(self.bound(param)?),
            "minExclusive" => facets.bounds.min_exclusive(self.bound(param)?),
            "maxInclusive" => facets.bounds.max_inclusive(self.bound(param)?),
            "maxExclusive" => facets.bounds.max_exclusive(self.bound(param)?),
            _ => unreachable!(),
        }
    }

    fn check_facets(
        &self,
        normalized: &str,
        parsed: &ParsedValue,
        facets: &Facets,
        errors: &mut Vec<ValueError>,
    ) {
        let len = self.length_of(normalized, parsed);
        if let Some(n) = facets.length {
            if len != n {
                errors.push(ValueError::new(format!("length of value should be {}", n)));
            }
        }
        if let Some(n) = facets.min_length {
            if len < n {
                errors.push(ValueError::new(format!(
                    "length of value should be greater than or equal to {}",
                    n
                )));
            }
        }
        if let Some(n) = facets.max_length {
            if len > n {
                errors.push(ValueError::new(format!(
                    "length of value should be less than or equal to {}",
                    n
                )));
            }
        }
        for p in &facets.patterns {
            if !p.is_valid(normalized) {
                errors.push(ValueError::new(format!(
                    "value does not match the pattern {}",
                    p.0
                )));
            }
        }
        if let ParsedValue::Decimal(_) = parsed {
            let (total, fraction) = count_digits(normalized);
            if let Some(n) = facets.total_digits {
                if total > n {
                    errors.push(ValueError::new(format!(
                        "value must have at most {} digits",
                        n
                    )));
                }
            }
            if let Some(n) = facets.fraction_digits {
                if fraction > n {
                    errors.push(ValueError::new(format!(
                        "value must have at most {} fraction digits",
                        n
                    )));
                }
            }
        }
        let ordered = match parsed {
            ParsedValue::Decimal(d) => Some(Ordered::Decimal(d.clone())),
            ParsedValue::Float(f) => Some(Ordered::Float(*f)),
            ParsedValue::DateTime(t) => Some(Ordered::Temporal(t.clone())),
            _ => None,
        };
        if let Some(o) = ordered {
            if !facets.bounds.is_valid(&o) {
                errors.push(ValueError::new(bound_message(&facets.bounds)));
            }
        }
    }

    fn check_consistency(&self, facets: &Facets, errors: &mut Vec<ParamError>) {
        if let (Some(min), Some(max)) = (facets.min_length, facets.max_length) {
            if min > max {
                errors.push(ParamError::new(
                    "minLength must be less than or equal to maxLength",
                ));
            }
        }
        if let Some(len) = facets.length {
            if facets.min_length.map(|m| len < m).unwrap_or(false)
                || facets.max_length.map(|m| len > m).unwrap_or(false)
            {
                errors.push(ParamError::new(
                    "length conflicts with minLength or maxLength",
                ));
            }
        }
        if let (Some(total), Some(fraction)) = (facets.total_digits, facets.fraction_digits) {
            if fraction > total {
                errors.push(ParamError::new(
                    "fractionDigits must be less than or equal to totalDigits",
                ));
            }
        }
    }
}

fn bound_message(bounds: &MinMaxFacet<Ordered>) -> String {
    let mut parts = vec![];
    match &bounds.min {
        Min::Unbounded => (),
        Min::Inclusive(v) => parts.push(format!("greater than or equal to {}", v)),
        Min::Exclusive(v) => parts.push(format!("greater than {}", v)),
    }
    match &bounds.max {
        Max::Unbounded => (),
        Max::Inclusive(v) => parts.push(format!("less than or equal to {}", v)),
        Max::Exclusive(v) => parts.push(format!("less than {}", v)),
    }
    format!("value must be {}", parts.join(" and "))
}

fn parse_usize(param: &RawParam) -> Result<usize, ParamError> {
    param.value.trim().parse().map_err(|e: std::num::ParseIntError| {
        ParamError::new(format!("invalid value for {}: {}", param.name, e))
    })
}

fn parse_decimal(v: &str) -> Option<BigDecimal> {
    let v = v.strip_prefix('+').unwrap_or(v);
    let (neg, digits) = match v.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, v),
    };
    let mut s = String::new();
    if neg {
        s.push('-');
    }
    if digits.starts_with('.') {
        s.push('0');
    }
    s.push_str(digits);
    if digits.ends_with('.') {
        s.push('0');
    }
    BigDecimal::from_str(&s).ok()
}

/// (total digits, fraction digits) of a decimal lexical value, ignoring insignificant zeros
fn count_digits(v: &str) -> (usize, usize) {
    let v = v.trim_start_matches(|c| c == '+' || c == '-');
    let (int, frac) = match v.find('.') {
        Some(pos) => (&v[..pos], &v[pos + 1..]),
        None => (v, ""),
    };
    let int = int.trim_start_matches('0');
    let frac = frac.trim_end_matches('0');
    ((int.len() + frac.len()).max(1), frac.len())
}

fn is_name(v: &str) -> bool {
    let mut chars = v.chars();
    match chars.next() {
        Some(c) if is_nc_name_start_char(c) || c == ':' => {
            chars.all(|c| is_nc_name_char(c) || c == ':')
        }
        _ => false,
    }
}

fn is_nm_token(v: &str) -> bool {
    !v.is_empty() && v.chars().all(|c| is_nc_name_char(c) || c == ':')
}

fn decode_base64(v: &str) -> Vec<u8> {
    fn sextet(c: u8) -> u32 {
        match c {
            b'A'..=b'Z' => (c - b'A') as u32,
            b'a'..=b'z' => (c - b'a' + 26) as u32,
            b'0'..=b'9' => (c - b'0' + 52) as u32,
            b'+' => 62,
            _ => 63,
        }
    }
    let mut out = vec![];
    for chunk in v.as_bytes().chunks(4) {
        let data: Vec<u8> = chunk.iter().copied().filter(|c| *c != b'=').collect();
        let mut acc = 0u32;
        for (i, c) in data.iter().enumerate() {
            acc |= sextet(*c) << (18 - 6 * i);
        }
        let bytes = [(acc >> 16) as u8, (acc >> 8) as u8, acc as u8];
        let n = match data.len() {
            4 => 3,
            3 => 2,
            2 => 1,
            _ => 0,
        };
        out.extend_from_slice(&bytes[..n]);
    }
    out
}

impl Datatype for XsdDatatype {
    fn name(&self) -> &str {
        self.name
    }

    fn needs_context(&self) -> bool {
        matches!(self.kind, Kind::QName | Kind::Notation)
    }

    fn parse_params(
        &self,
        location: &str,
        params: &[RawParam],
    ) -> Result<ParsedParams, ParameterParsingError> {
        let mut facets = Facets::default();
        let mut errors = vec![];
        for p in params {
            if let Err(e) = self.apply_param(&mut facets, p) {
                errors.push(e);
            }
        }
        self.check_consistency(&facets, &mut errors);
        if errors.is_empty() {
            Ok(ParsedParams {
                raw: params.to_vec(),
                facets,
            })
        } else {
            Err(ParameterParsingError {
                location: location.to_string(),
                errors,
            })
        }
    }

    fn parse_value(
        &self,
        location: &str,
        value: &str,
        context: Option<&dyn NameResolver>,
    ) -> Result<ParsedValue, ValueValidationError> {
        let normalized = self.whitespace(value);
        self.lexical(&normalized, context)
            .map_err(|e| ValueValidationError {
                location: location.to_string(),
                errors: vec![e],
            })
    }

    fn disallows(
        &self,
        value: &str,
        params: &ParsedParams,
        context: Option<&dyn NameResolver>,
    ) -> Option<Vec<ValueError>> {
        let normalized = self.whitespace(value);
        let parsed = match self.lexical(&normalized, context) {
            Ok(v) => v,
            Err(e) => return Some(vec![e]),
        };
        let mut errors = vec![];
        self.check_facets(&normalized, &parsed, &params.facets, &mut errors);
        if errors.is_empty() {
            None
        } else {
            Some(errors)
        }
    }

    fn equal(
        &self,
        value: &str,
        schema_value: &ParsedValue,
        context: Option<&dyn NameResolver>,
    ) -> bool {
        let normalized = self.whitespace(value);
        match self.lexical(&normalized, context) {
            Ok(v) => v == *schema_value,
            Err(_) => false,
        }
    }

    fn value_length(&self, value: &str) -> usize {
        let normalized = self.whitespace(value);
        match self.lexical(&normalized, None) {
            Ok(parsed) => self.length_of(&normalized, &parsed),
            Err(_) => normalized.chars().count(),
        }
    }
}

/// The XML Schema datatype library
#[derive(Default)]
pub struct XsdLibrary {
    patterns: Arc<PatternCache>,
}

impl DatatypeLibrary for XsdLibrary {
    fn uri(&self) -> &str {
        NAMESPACE_URI
    }

    fn datatype(&self, name: &str) -> Option<Arc<dyn Datatype>> {
        TYPES.iter().find(|(n, _)| *n == name).map(|(n, kind)| {
            Arc::new(XsdDatatype {
                kind: *kind,
                name: *n,
                patterns: self.patterns.clone(),
            }) as Arc<dyn Datatype>
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::datatype::DefaultNameResolver;
    use crate::names::QualifiedName;
    use assert_matches::assert_matches;

    fn dt(name: &str) -> Arc<dyn Datatype> {
        XsdLibrary::default().datatype(name).unwrap()
    }

    fn params(name: &str, p: &[(&str, &str)]) -> Result<ParsedParams, ParameterParsingError> {
        let raw: Vec<_> = p.iter().map(|(n, v)| RawParam::new(n, v)).collect();
        dt(name).parse_params("test", &raw)
    }

    fn allows(name: &str, p: &[(&str, &str)], value: &str) -> bool {
        let params = params(name, p).unwrap();
        dt(name).disallows(value, &params, None).is_none()
    }

    #[test]
    fn conflicting_bounds() {
        let err = params("int", &[("minInclusive", "10"), ("maxInclusive", "5")]).unwrap_err();
        assert_eq!(err.errors.len(), 1);
        assert_eq!(err.errors[0].message, "minInclusive conflicts with maxInclusive");
        let err = params("int", &[("maxInclusive", "5"), ("minInclusive", "10")]).unwrap_err();
        assert_eq!(err.errors[0].message, "minInclusive conflicts with maxInclusive");
    }

    #[test]
    fn errors_are_aggregated() {
        let err = params(
            "string",
            &[
                ("minLength", "5"),
                ("maxLength", "2"),
                ("totalDigits", "3"),
                ("bogus", "1"),
            ],
        )
        .unwrap_err();
        assert_eq!(err.errors.len(), 3);
        assert_eq!(err.location, "test");
    }

    #[test]
    fn repeated_params() {
        assert_matches!(params("string", &[("length", "1"), ("length", "2")]), Err(_));
        assert_matches!(params("string", &[("pattern", "a"), ("pattern", "b")]), Ok(_));
    }

    #[test]
    fn default_ranges() {
        assert!(allows("byte", &[], "127"));
        assert!(!allows("byte", &[], "128"));
        assert!(!allows("unsignedInt", &[], "-1"));
        assert!(allows("unsignedLong", &[], "18446744073709551615"));
        assert!(!allows("positiveInteger", &[], "0"));
        // explicit bounds are themselves values of the type
        assert_matches!(params("byte", &[("maxInclusive", "200")]), Err(_));
    }

    #[test]
    fn bounds() {
        let p = &[("minExclusive", "1.5"), ("maxInclusive", "3")];
        assert!(!allows("decimal", p, "1.5"));
        assert!(allows("decimal", p, "3.000"));
        assert!(!allows("decimal", p, "3.01"));
        assert!(allows("double", &[("maxExclusive", "1e3")], "999.9"));
        assert!(!allows("double", &[("maxExclusive", "1e3")], "INF"));
    }

    #[test]
    fn digits() {
        let p = &[("totalDigits", "4"), ("fractionDigits", "2")];
        assert!(allows("decimal", p, "12.30"));
        assert!(allows("decimal", p, "0012.34"));
        assert!(!allows("decimal", p, "123.45"));
        assert!(!allows("decimal", p, "1.234"));
    }

    #[test]
    fn lengths() {
        assert!(allows("string", &[("length", "3")], "abc"));
        assert!(!allows("string", &[("length", "3")], "abcd"));
        assert!(allows("token", &[("maxLength", "3")], "  abc  "));
        assert!(allows("hexBinary", &[("length", "2")], "0aFF"));
        assert!(allows("base64Binary", &[("length", "4")], "AAECAw=="));
        assert!(allows("NMTOKENS", &[("minLength", "2")], "a b"));
        assert!(!allows("NMTOKENS", &[("minLength", "2")], "a"));
        assert_matches!(params("int", &[("length", "3")]), Err(_));
    }

    #[test]
    fn patterns() {
        let p = &[("pattern", "[A-Z]{2}\\d")];
        assert!(allows("token", p, " AB1 "));
        assert!(!allows("token", p, "AB12"));
        assert_matches!(params("string", &[("pattern", "(")]), Err(_));
    }

    #[test]
    fn lexical_spaces() {
        assert!(allows("boolean", &[], " true "));
        assert!(!allows("boolean", &[], "yes"));
        assert!(allows("NCName", &[], "foo"));
        assert!(!allows("NCName", &[], "a:b"));
        assert!(allows("Name", &[], "a:b"));
        assert!(allows("date", &[], "2020-02-29"));
        assert!(!allows("date", &[], "2021-02-29"));
        assert!(allows("dateTime", &[], "2020-01-01T10:00:00.5Z"));
        assert!(allows("duration", &[], "P1Y2MT3H"));
        assert!(!allows("duration", &[], "P"));
        assert!(!allows("duration", &[], "P1DT"));
        assert!(allows("gYearMonth", &[], "2020-01"));
        assert!(allows("anyURI", &[], "http://example.com/a?b"));
        assert!(allows("language", &[], "en-GB"));
        assert!(allows("float", &[], "-INF"));
        assert!(!allows("float", &[], "inf"));
    }

    #[test]
    fn date_bounds_with_timezones() {
        let p = &[("minInclusive", "2020-01-01Z")];
        assert!(allows("date", p, "2020-01-01Z"));
        assert!(allows("date", p, "2020-01-01-05:00"));
        assert!(!allows("date", p, "2019-12-31Z"));
    }

    #[test]
    fn value_equality() {
        let d = dt("decimal");
        let v = d.parse_value("test", "1.50", None).unwrap();
        assert!(d.equal("1.5", &v, None));
        assert!(d.equal("+01.500", &v, None));
        assert!(!d.equal("1.51", &v, None));
        let b = dt("boolean");
        let v = b.parse_value("test", "1", None).unwrap();
        assert!(b.equal("true", &v, None));
    }

    #[test]
    fn qnames() {
        let q = dt("QName");
        assert!(q.needs_context());
        let mut resolver = DefaultNameResolver::default();
        resolver.enter_context();
        resolver.define_prefix("x", "urn:x");
        let v = q.parse_value("test", "x:foo", Some(&resolver)).unwrap();
        assert_eq!(v, ParsedValue::QName(QualifiedName::new("urn:x", "foo")));
        let mut other = DefaultNameResolver::default();
        other.enter_context();
        other.define_prefix("y", "urn:x");
        assert!(q.equal("y:foo", &v, Some(&other)));
        assert_matches!(q.parse_value("test", "z:foo", Some(&resolver)), Err(_));
    }

    #[test]
    fn base64_lengths() {
        assert_eq!(dt("base64Binary").value_length("AAECAw=="), 4);
        assert_eq!(dt("base64Binary").value_length("AAEC"), 3);
        assert_eq!(dt("hexBinary").value_length("0a0b0c"), 3);
        assert_eq!(dt("IDREFS").value_length(" a  b c "), 3);
    }

    #[test]
    fn pattern_cache_is_shared() {
        let lib = XsdLibrary::default();
        let a = lib.patterns.get("a+").unwrap();
        let b = lib.patterns.get("a+").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }
}
