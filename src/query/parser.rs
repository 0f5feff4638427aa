//! Query expression parser
//!
//! Parses the supported query subset into a [`ParsedQuery`]:
//!
//! ```promql
//! # Function over a range vector
//! avg_over_time(cpu{instance="m0"}[60000ms])
//! max_over_time(cpu{instance="m0"}[5m])
//!
//! # Leading numeric argument (e.g. a quantile)
//! quantile_over_time(0.99, latency{instance="m0"}[1h])
//! ```
//!
//! Anything else — a bare selector, a missing range vector, a non-equality
//! label matcher, a non-numeric leading argument — is a client-input error
//! with a distinct message.

use nom::{
    bytes::complete::{take_while, take_while1},
    character::complete::{char, digit1, multispace0},
    number::complete::double,
    IResult,
};

use crate::query::error::{QueryError, QueryResult};
use crate::types::SeriesKey;

/// A parsed, validated query expression.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedQuery {
    /// Function name (e.g. "avg_over_time")
    pub func: String,
    /// Target series identity (metric name plus equality-matched labels)
    pub key: SeriesKey,
    /// Leading numeric argument; 0.0 when the function takes none
    pub arg: f64,
    /// Trailing-window size in milliseconds
    pub range_ms: i64,
}

/// Parse a query expression.
pub fn parse_query(input: &str) -> QueryResult<ParsedQuery> {
    let input = input.trim();
    if input.is_empty() {
        return Err(QueryError::parse("empty query expression"));
    }

    // Function name followed by an argument list is the only accepted shape.
    let (rest, func) = identifier(input)
        .map_err(|_| QueryError::parse("query must be a function call (e.g. avg_over_time(...))"))?;
    let (rest, _) = open_paren(rest).map_err(|_| {
        QueryError::parse("query must be a function call (e.g. avg_over_time(...))")
    })?;

    // Optional leading numeric argument: `func(0.99, selector[range])`.
    let (rest, arg) = match leading_number(rest) {
        Ok((rest, value)) => (rest, value),
        Err(_) => {
            if has_leading_argument(rest) {
                return Err(QueryError::validation(
                    "numeric argument (like quantile) must be a number",
                ));
            }
            (rest, 0.0)
        }
    };

    // Vector selector: metric name plus optional label matchers.
    let (rest, metric) = ws_identifier(rest)
        .map_err(|_| QueryError::parse("expected a metric selector inside the function call"))?;
    let (rest, matchers) = label_matchers(rest)?;

    // The trailing argument must be a range vector.
    let (rest, range_ms) = range_selector(rest).map_err(|_| {
        QueryError::parse("the last argument must be a range vector (e.g. metric[60000ms])")
    })?;

    let (rest, _) = close_paren(rest)
        .map_err(|_| QueryError::parse("expected ')' after the range vector"))?;
    if !rest.trim().is_empty() {
        return Err(QueryError::parse(format!(
            "unexpected trailing input: '{}'",
            rest.trim()
        )));
    }

    let mut builder = SeriesKey::builder().metric_name(metric);
    for (name, value) in matchers {
        builder = builder.label(name, value);
    }

    Ok(ParsedQuery {
        func: func.to_string(),
        key: builder.build(),
        arg,
        range_ms,
    })
}

// ============================================================================
// Token parsers
// ============================================================================

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == ':'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == ':'
}

/// Parse a metric or function identifier.
fn identifier(input: &str) -> IResult<&str, &str> {
    let (rest, name) = take_while1(is_ident_char)(input)?;
    if !name.starts_with(is_ident_start) {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Alpha,
        )));
    }
    Ok((rest, name))
}

fn ws_identifier(input: &str) -> IResult<&str, &str> {
    let (input, _) = multispace0(input)?;
    identifier(input)
}

fn open_paren(input: &str) -> IResult<&str, char> {
    let (input, _) = multispace0(input)?;
    char('(')(input)
}

fn close_paren(input: &str) -> IResult<&str, char> {
    let (input, _) = multispace0(input)?;
    char(')')(input)
}

/// Parse `number ,` at the start of the argument list.
fn leading_number(input: &str) -> IResult<&str, f64> {
    let (input, _) = multispace0(input)?;
    let (input, value) = double(input)?;
    let (input, _) = multispace0(input)?;
    let (input, _) = char(',')(input)?;
    Ok((input, value))
}

/// Detect a comma separating a non-numeric first argument from the selector.
///
/// Commas inside label braces don't count; only a top-level comma before the
/// range bracket means the call has a leading argument.
fn has_leading_argument(input: &str) -> bool {
    let mut in_braces = false;
    let mut in_string = false;
    for c in input.chars() {
        match c {
            '"' => in_string = !in_string,
            _ if in_string => {}
            '{' => in_braces = true,
            '}' => in_braces = false,
            ',' if !in_braces => return true,
            '[' | ')' if !in_braces => return false,
            _ => {}
        }
    }
    false
}

/// Parse an optional `{name="value", ...}` matcher block.
///
/// Only equality matchers are supported; `!=`, `=~` and `!~` are recognized
/// and rejected with a validation error.
fn label_matchers(input: &str) -> QueryResult<(&str, Vec<(String, String)>)> {
    let (mut rest, _) = multispace0::<&str, nom::error::Error<&str>>(input)
        .map_err(|_| QueryError::parse("invalid selector"))?;

    if !rest.starts_with('{') {
        return Ok((rest, Vec::new()));
    }
    rest = &rest[1..];

    let mut matchers = Vec::new();
    loop {
        let (r, _) = multispace0::<&str, nom::error::Error<&str>>(rest)
            .map_err(|_| QueryError::parse("invalid label matcher"))?;
        rest = r;

        if let Some(r) = rest.strip_prefix('}') {
            rest = r;
            break;
        }

        let (r, name) = identifier(rest)
            .map_err(|_| QueryError::parse("expected a label name inside '{...}'"))?;
        let (r, _) = multispace0::<&str, nom::error::Error<&str>>(r)
            .map_err(|_| QueryError::parse("invalid label matcher"))?;

        let Some((r, op)) = matcher_op(r) else {
            return Err(QueryError::parse(format!(
                "expected a matcher after label '{}'",
                name
            )));
        };
        if op != "=" {
            return Err(QueryError::validation(
                "only '=' label matchers are supported",
            ));
        }

        let (r, value) = quoted_string(r)
            .map_err(|_| QueryError::parse(format!("expected a quoted value for label '{}'", name)))?;
        matchers.push((name.to_string(), value.to_string()));

        let (r, _) = multispace0::<&str, nom::error::Error<&str>>(r)
            .map_err(|_| QueryError::parse("invalid label matcher"))?;
        rest = r;

        if let Some(r) = rest.strip_prefix(',') {
            rest = r;
        } else if let Some(r) = rest.strip_prefix('}') {
            rest = r;
            break;
        } else {
            return Err(QueryError::parse("expected ',' or '}' in label matchers"));
        }
    }

    Ok((rest, matchers))
}

/// Match one of the four matcher operators. Longest first.
fn matcher_op(input: &str) -> Option<(&str, &'static str)> {
    for op in ["=~", "!~", "!=", "="] {
        if let Some(rest) = input.strip_prefix(op) {
            return Some((rest, op));
        }
    }
    None
}

/// Parse a double-quoted string (no escape handling).
fn quoted_string(input: &str) -> IResult<&str, &str> {
    let (input, _) = multispace0(input)?;
    let (input, _) = char('"')(input)?;
    let (input, value) = take_while(|c| c != '"')(input)?;
    let (input, _) = char('"')(input)?;
    Ok((input, value))
}

/// Parse `[<duration>]` into milliseconds.
fn range_selector(input: &str) -> IResult<&str, i64> {
    let (input, _) = multispace0(input)?;
    let (input, _) = char('[')(input)?;
    let (input, ms) = duration_ms(input)?;
    let (input, _) = char(']')(input)?;
    Ok((input, ms))
}

/// Parse a duration literal such as `60000ms`, `30s`, `5m`, `1h`, `2d`.
fn duration_ms(input: &str) -> IResult<&str, i64> {
    let (input, digits) = digit1(input)?;
    let value: i64 = digits.parse().map_err(|_| {
        nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Digit))
    })?;

    let (rest, multiplier) = if let Some(r) = input.strip_prefix("ms") {
        (r, 1)
    } else if let Some(r) = input.strip_prefix('s') {
        (r, 1_000)
    } else if let Some(r) = input.strip_prefix('m') {
        (r, 60_000)
    } else if let Some(r) = input.strip_prefix('h') {
        (r, 3_600_000)
    } else if let Some(r) = input.strip_prefix('d') {
        (r, 86_400_000)
    } else if let Some(r) = input.strip_prefix('w') {
        (r, 604_800_000)
    } else {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Tag,
        )));
    };

    Ok((rest, value * multiplier))
}
