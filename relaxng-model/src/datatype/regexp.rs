//! Translation of XML Schema regular expressions (as used by the `pattern` facet) into the syntax
//! of the `regex` crate.
//!
//! XML Schema expressions are implicitly anchored at both ends, so the translation is wrapped in
//! `\A(?:...)\z`.  Character class subtraction maps onto the `--` class-difference operator, and
//! the multi-character escapes map onto (possibly nested) bracketed classes.

use nom::branch::alt;
use nom::bytes::complete::take_while1;
use nom::character::complete::{anychar, char, digit1, none_of, one_of};
use nom::combinator::{map, opt};
use nom::error::{ErrorKind, ParseError};
use nom::multi::many0;
use nom::sequence::{delimited, preceded};
use nom::{IResult, Parser};
use nom_locate::LocatedSpan;

type Span<'a> = LocatedSpan<&'a str>;

#[derive(Debug, thiserror::Error)]
pub enum RegexError {
    #[error("invalid regular expression at offset {offset}: {message}")]
    Syntax { offset: usize, message: String },
    #[error(transparent)]
    Compile(#[from] regex::Error),
}

#[derive(Debug)]
struct Failure<'a> {
    input: Span<'a>,
    message: Option<String>,
}

impl<'a> ParseError<Span<'a>> for Failure<'a> {
    fn from_error_kind(input: Span<'a>, _kind: ErrorKind) -> Self {
        Failure {
            input,
            message: None,
        }
    }

    fn append(_input: Span<'a>, _kind: ErrorKind, other: Self) -> Self {
        other
    }
}

type Res<'a, T> = IResult<Span<'a>, T, Failure<'a>>;

fn fail<'a, T>(input: Span<'a>, message: impl Into<String>) -> Res<'a, T> {
    Err(nom::Err::Failure(Failure {
        input,
        message: Some(message.into()),
    }))
}

/// Translates the XML Schema expression to an anchored `regex` crate expression
pub fn translate(pattern: &str) -> Result<String, RegexError> {
    match reg_exp(Span::new(pattern)) {
        Ok((rest, body)) => match rest.fragment().chars().next() {
            None => Ok(format!(r"\A(?:{})\z", body)),
            Some(c) => Err(RegexError::Syntax {
                offset: rest.location_offset(),
                message: format!("unexpected {:?}", c),
            }),
        },
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(RegexError::Syntax {
            offset: e.input.location_offset(),
            message: e
                .message
                .unwrap_or_else(|| "malformed expression".to_string()),
        }),
        Err(nom::Err::Incomplete(_)) => Err(RegexError::Syntax {
            offset: pattern.len(),
            message: "unexpected end of expression".to_string(),
        }),
    }
}

pub fn compile(pattern: &str) -> Result<regex::Regex, RegexError> {
    let translated = translate(pattern)?;
    Ok(regex::Regex::new(&translated)?)
}

fn reg_exp(i: Span) -> Res<String> {
    let (i, first) = branch(i)?;
    let (i, rest) = many0(preceded(char('|'), branch)).parse(i)?;
    let mut out = first;
    for b in rest {
        out.push('|');
        out.push_str(&b);
    }
    Ok((i, out))
}

fn branch(i: Span) -> Res<String> {
    map(many0(piece), |pieces| pieces.concat()).parse(i)
}

fn piece(i: Span) -> Res<String> {
    map((atom, opt(quantifier)), |(a, q)| match q {
        Some(q) => format!("{}{}", a, q),
        None => a,
    })
    .parse(i)
}

fn quantifier(i: Span) -> Res<String> {
    alt((map(one_of("?*+"), |c: char| c.to_string()), quantity)).parse(i)
}

fn quantity(i: Span) -> Res<String> {
    let (i, _) = char('{').parse(i)?;
    let (i, min) = digit1(i)?;
    let (i, max) = opt(preceded(char(','), opt(digit1))).parse(i)?;
    let (i, _) = char('}').parse(i)?;
    let q = match max {
        None => format!("{{{}}}", min.fragment()),
        Some(None) => format!("{{{},}}", min.fragment()),
        Some(Some(max)) => {
            if max.fragment().parse::<u64>().ok() < min.fragment().parse::<u64>().ok() {
                return fail(max, "quantifier maximum is less than its minimum");
            }
            format!("{{{},{}}}", min.fragment(), max.fragment())
        }
    };
    Ok((i, q))
}

fn atom(i: Span) -> Res<String> {
    alt((
        char_class_expr,
        map(char('.'), |_| r"[^\n\r]".to_string()),
        map(preceded(char('\\'), escape), |e| e.outside_class()),
        map(delimited(char('('), reg_exp, char(')')), |r| {
            format!("(?:{})", r)
        }),
        map(none_of(".\\?*+{}()|[]"), |c: char| regex::escape(&c.to_string())),
    ))
    .parse(i)
}

enum Escape {
    Char(char),
    /// a complete bracketed class, such as `[\p{Nd}]`
    Class(String),
}

impl Escape {
    fn outside_class(self) -> String {
        match self {
            Escape::Char(c) => regex::escape(&c.to_string()),
            Escape::Class(c) => c,
        }
    }
}

const NAME_START: &str = r"A-Z_a-z:\x{C0}-\x{D6}\x{D8}-\x{F6}\x{F8}-\x{2FF}\x{370}-\x{37D}\x{37F}-\x{1FFF}\x{200C}-\x{200D}\x{2070}-\x{218F}\x{2C00}-\x{2FEF}\x{3001}-\x{D7FF}\x{F900}-\x{FDCF}\x{FDF0}-\x{FFFD}\x{10000}-\x{EFFFF}";
const NAME_REST: &str = r"\-.0-9\x{B7}\x{300}-\x{36F}\x{203F}-\x{2040}";

fn escape(i: Span) -> Res<Escape> {
    let (rest, c) = anychar(i)?;
    let class = |s: String| -> Res<Escape> { Ok((rest, Escape::Class(s))) };
    match c {
        'n' => Ok((rest, Escape::Char('\n'))),
        'r' => Ok((rest, Escape::Char('\r'))),
        't' => Ok((rest, Escape::Char('\t'))),
        '\\' | '|' | '.' | '-' | '^' | '?' | '*' | '+' | '{' | '}' | '(' | ')' | '[' | ']' => {
            Ok((rest, Escape::Char(c)))
        }
        's' => class(r"[\x20\t\n\r]".to_string()),
        'S' => class(r"[^\x20\t\n\r]".to_string()),
        'i' => class(format!("[{}]", NAME_START)),
        'I' => class(format!("[^{}]", NAME_START)),
        'c' => class(format!("[{}{}]", NAME_START, NAME_REST)),
        'C' => class(format!("[^{}{}]", NAME_START, NAME_REST)),
        'd' => class(r"[\p{Nd}]".to_string()),
        'D' => class(r"[^\p{Nd}]".to_string()),
        'w' => class(r"[^\p{P}\p{Z}\p{C}]".to_string()),
        'W' => class(r"[\p{P}\p{Z}\p{C}]".to_string()),
        'p' => category(rest, false),
        'P' => category(rest, true),
        _ => fail(i, format!("unknown escape \\{}", c)),
    }
}

const CATEGORIES: &[&str] = &[
    "L", "Lu", "Ll", "Lt", "Lm", "Lo", "M", "Mn", "Mc", "Me", "N", "Nd", "Nl", "No", "P", "Pc",
    "Pd", "Ps", "Pe", "Pi", "Pf", "Po", "Z", "Zs", "Zl", "Zp", "S", "Sm", "Sc", "Sk", "So", "C",
    "Cc", "Cf", "Co", "Cn",
];

fn category(i: Span, negated: bool) -> Res<Escape> {
    let (rest, name) = delimited(
        char('{'),
        take_while1(|c: char| c.is_ascii_alphanumeric() || c == '-'),
        char('}'),
    )
    .parse(i)?;
    let name = *name.fragment();
    if name.starts_with("Is") {
        return fail(
            i,
            format!("Unicode block escapes such as \\p{{{}}} are not supported", name),
        );
    }
    if !CATEGORIES.contains(&name) {
        return fail(i, format!("unknown Unicode category {:?}", name));
    }
    let neg = if negated { "^" } else { "" };
    Ok((rest, Escape::Class(format!("[{}\\p{{{}}}]", neg, name))))
}

fn char_class_expr(i: Span) -> Res<String> {
    let (i, _) = char('[').parse(i)?;
    let (i, negated) = opt(char('^')).parse(i)?;
    let (i, items) = pos_char_group(i)?;
    let (i, subtract) = opt(preceded(char('-'), char_class_expr)).parse(i)?;
    let (i, _) = char(']').parse(i)?;
    let base = format!("[{}{}]", if negated.is_some() { "^" } else { "" }, items);
    Ok((
        i,
        match subtract {
            Some(s) => format!("[{}--{}]", base, s),
            None => base,
        },
    ))
}

fn class_atom(i: Span) -> Res<Escape> {
    alt((
        preceded(char('\\'), escape),
        map(none_of("\\[]"), Escape::Char),
    ))
    .parse(i)
}

fn class_char(c: char) -> String {
    if c.is_ascii_alphanumeric() {
        c.to_string()
    } else {
        format!("\\x{{{:X}}}", c as u32)
    }
}

fn pos_char_group(mut i: Span) -> Res<String> {
    let mut out = String::new();
    loop {
        let frag = *i.fragment();
        match frag.chars().next() {
            None => return fail(i, "unterminated character class"),
            Some(']') => break,
            Some('-') if frag[1..].starts_with('[') => break,
            Some('[') => return fail(i, "unescaped '[' within character class"),
            _ => (),
        }
        let (rest, start) = class_atom(i)?;
        match start {
            Escape::Class(c) => {
                out.push_str(&c);
                i = rest;
            }
            Escape::Char(c) => {
                let after = *rest.fragment();
                let is_range = after.starts_with('-')
                    && after.len() > 1
                    && !after[1..].starts_with('[')
                    && !after[1..].starts_with(']');
                if is_range {
                    let (rest, _) = char('-').parse(rest)?;
                    let (rest, end) = class_atom(rest)?;
                    match end {
                        Escape::Char(e) => {
                            if e < c {
                                return fail(i, "character range is out of order");
                            }
                            out.push_str(&class_char(c));
                            out.push('-');
                            out.push_str(&class_char(e));
                        }
                        Escape::Class(_) => {
                            return fail(i, "a range may not end with a multi-character escape")
                        }
                    }
                    i = rest;
                } else {
                    out.push_str(&class_char(c));
                    i = rest;
                }
            }
        }
    }
    if out.is_empty() {
        return fail(i, "empty character class");
    }
    Ok((i, out))
}
