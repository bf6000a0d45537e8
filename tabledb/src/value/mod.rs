use crate::schema::{Field, FieldKind};
use chrono::{SecondsFormat, Utc};
use serde::de::{self, Deserializer, SeqAccess, Visitor};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// A stored or computed cell value.
///
/// Relation and multiselect values are always `Ids`, even for zero or one element.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
    Ids(Vec<String>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Null, empty text and empty sequences count as empty.
    pub fn is_empty(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Text(s) => s.is_empty(),
            Value::Ids(ids) => ids.is_empty(),
            Value::Bool(_) | Value::Number(_) => false,
        }
    }

    /// Numeric reading of a value. Null, empty text and anything unparseable
    /// come out as NaN so callers can drop them with `is_finite`.
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Null => f64::NAN,
            Value::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Value::Number(n) => *n,
            Value::Text(s) => parse_number(s).unwrap_or(f64::NAN),
            Value::Ids(ids) if ids.len() == 1 => parse_number(&ids[0]).unwrap_or(f64::NAN),
            Value::Ids(_) => f64::NAN,
        }
    }

    /// Numeric reading used by comparison filters. Unlike [`to_number`](Self::to_number),
    /// null, blank text and an empty sequence read as 0; only text that is not
    /// a number is NaN.
    pub fn to_comparable_number(&self) -> f64 {
        match self {
            Value::Null => 0.0,
            Value::Text(s) => comparable_number(s),
            Value::Ids(ids) => match ids.as_slice() {
                [] => 0.0,
                [only] => comparable_number(only),
                _ => f64::NAN,
            },
            Value::Bool(_) | Value::Number(_) => self.to_number(),
        }
    }

    /// Plain string form: numbers without a trailing ".0", sequences joined with ",".
    pub fn to_plain_string(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => format_number(*n),
            Value::Text(s) => s.clone(),
            Value::Ids(ids) => ids.join(","),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(f64::from(n))
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Vec<String>> for Value {
    fn from(ids: Vec<String>) -> Self {
        Value::Ids(ids)
    }
}

impl From<Vec<&str>> for Value {
    fn from(ids: Vec<&str>) -> Self {
        Value::Ids(ids.into_iter().map(str::to_string).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

// Sequence elements of any scalar type are read as strings, so hand-edited
// documents with numeric ids still load.
impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct ValueVisitor;

        impl<'de> Visitor<'de> for ValueVisitor {
            type Value = Value;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("null, a boolean, a number, a string or a list of scalars")
            }

            fn visit_unit<E: de::Error>(self) -> Result<Value, E> {
                Ok(Value::Null)
            }

            fn visit_none<E: de::Error>(self) -> Result<Value, E> {
                Ok(Value::Null)
            }

            fn visit_some<D: Deserializer<'de>>(self, d: D) -> Result<Value, D::Error> {
                Value::deserialize(d)
            }

            fn visit_bool<E: de::Error>(self, b: bool) -> Result<Value, E> {
                Ok(Value::Bool(b))
            }

            fn visit_i64<E: de::Error>(self, n: i64) -> Result<Value, E> {
                Ok(Value::Number(n as f64))
            }

            fn visit_u64<E: de::Error>(self, n: u64) -> Result<Value, E> {
                Ok(Value::Number(n as f64))
            }

            fn visit_f64<E: de::Error>(self, n: f64) -> Result<Value, E> {
                Ok(Value::Number(n))
            }

            fn visit_str<E: de::Error>(self, s: &str) -> Result<Value, E> {
                Ok(Value::Text(s.to_string()))
            }

            fn visit_string<E: de::Error>(self, s: String) -> Result<Value, E> {
                Ok(Value::Text(s))
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Value, A::Error> {
                let mut ids = Vec::new();
                while let Some(item) = seq.next_element::<Value>()? {
                    match item {
                        Value::Ids(_) => {
                            return Err(de::Error::custom("nested lists are not supported"))
                        }
                        other => ids.push(other.to_plain_string()),
                    }
                }
                Ok(Value::Ids(ids))
            }
        }

        deserializer.deserialize_any(ValueVisitor)
    }
}

/// Format a number the way it reads in a cell: `12`, `1.5`, `NaN`, `Infinity`.
pub fn format_number(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        let text = if n > 0.0 { "Infinity" } else { "-Infinity" };
        text.to_string()
    } else if n == 0.0 {
        "0".to_string()
    } else {
        n.to_string()
    }
}

/// Strict decimal parse of a whole string. Surrounding whitespace is ignored,
/// the empty string and words like "inf"/"nan" are rejected; hex literals and
/// the spelled-out "Infinity" are accepted.
pub fn parse_number(text: &str) -> Option<f64> {
    let t = text.trim();
    if t.is_empty() {
        return None;
    }
    let (sign, unsigned) = match t.as_bytes()[0] {
        b'-' => (-1.0, &t[1..]),
        b'+' => (1.0, &t[1..]),
        _ => (1.0, t),
    };
    if unsigned == "Infinity" {
        return Some(sign * f64::INFINITY);
    }
    if let Some(hex) = unsigned
        .strip_prefix("0x")
        .or_else(|| unsigned.strip_prefix("0X"))
    {
        // JS does not accept a sign in front of hex literals
        if sign < 0.0 || t.starts_with('+') {
            return None;
        }
        return u64::from_str_radix(hex, 16).ok().map(|n| n as f64);
    }
    let numeric_chars = unsigned
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | 'e' | 'E' | '+' | '-'));
    if !numeric_chars || !unsigned.starts_with(|c: char| c.is_ascii_digit() || c == '.') {
        return None;
    }
    unsigned.parse::<f64>().ok().map(|n| sign * n)
}

/// Numeric reading of filter text: blank is 0, anything unparseable is NaN.
pub fn comparable_number(text: &str) -> f64 {
    if text.trim().is_empty() {
        return 0.0;
    }
    parse_number(text).unwrap_or(f64::NAN)
}

/// Ordering used by view sorts: nulls first, numbers numerically, booleans
/// as 0/1, everything else as case-insensitive natural text order.
pub fn compare(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Less,
        (_, Value::Null) => Ordering::Greater,
        (Value::Number(x), Value::Number(y)) => x.partial_cmp(y).unwrap_or(Ordering::Equal),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => natural_cmp(&to_filter_string(a), &to_filter_string(b)),
    }
}

/// Compare strings with digit runs ordered by numeric value, so "item2" < "item10".
fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut left = a.chars().peekable();
    let mut right = b.chars().peekable();
    loop {
        match (left.peek().copied(), right.peek().copied()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(x), Some(y)) if x.is_ascii_digit() && y.is_ascii_digit() => {
                let x_run = take_digits(&mut left);
                let y_run = take_digits(&mut right);
                let ord = cmp_digit_runs(&x_run, &y_run);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            (Some(x), Some(y)) => {
                let ord = x.cmp(&y);
                if ord != Ordering::Equal {
                    return ord;
                }
                left.next();
                right.next();
            }
        }
    }
}

fn take_digits(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> String {
    let mut run = String::new();
    while let Some(c) = chars.peek().copied().filter(char::is_ascii_digit) {
        run.push(c);
        chars.next();
    }
    run
}

fn cmp_digit_runs(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// Lower-cased string form matched by filters. Null reads as "".
pub fn to_filter_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Ids(ids) => ids.join(", ").to_lowercase(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => format_number(*n).to_lowercase(),
        Value::Text(s) => s.to_lowercase(),
    }
}

/// Cell text for display surfaces.
pub fn display_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Ids(ids) => ids.join(", "),
        Value::Bool(true) => "✓".to_string(),
        Value::Bool(false) => "—".to_string(),
        Value::Number(n) => format_number(*n),
        Value::Text(s) => s.clone(),
    }
}

fn now_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn split_list(value: &Value) -> Vec<String> {
    match value {
        Value::Ids(items) => items.iter().filter(|s| !s.is_empty()).cloned().collect(),
        Value::Text(s) => s
            .split([';', ','])
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect(),
        Value::Number(_) | Value::Bool(_) | Value::Null => Vec::new(),
    }
}

/// What an absent or empty value coerces to.
fn empty_default(field: &Field) -> Value {
    match field.kind {
        FieldKind::MultiSelect(_) | FieldKind::Relation { .. } => Value::Ids(Vec::new()),
        FieldKind::CreatedAt | FieldKind::LastEditedAt => Value::Text(now_timestamp()),
        _ => Value::Null,
    }
}

/// Coerce an arbitrary previous value into the canonical storage form for `field`.
///
/// `None` stands for an absent key. Absent, null and empty-string inputs take the
/// field's empty default: `[]` for list fields, a fresh timestamp for
/// createdAt/lastEditedAt, null otherwise. Computed fields always coerce to null.
/// List fields split text on `;`/`,` and drop numbers and booleans.
pub fn coerce(field: &Field, value: Option<&Value>) -> Value {
    let value = match value {
        None | Some(Value::Null) => None,
        Some(Value::Text(s)) if s.is_empty() => None,
        Some(v) => Some(v),
    };

    let Some(value) = value else {
        return empty_default(field);
    };

    match &field.kind {
        FieldKind::Number => {
            let n = value.to_number();
            if n.is_finite() {
                Value::Number(n)
            } else {
                Value::Null
            }
        }
        FieldKind::Checkbox => Value::Bool(match value {
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0,
            Value::Text(s) => {
                let normalized = s.trim().to_lowercase();
                matches!(normalized.as_str(), "true" | "1" | "yes" | "on")
            }
            Value::Ids(_) | Value::Null => false,
        }),
        FieldKind::MultiSelect(_) | FieldKind::Relation { .. } => Value::Ids(split_list(value)),
        FieldKind::Rollup { .. } | FieldKind::Formula { .. } => Value::Null,
        FieldKind::Select(choices) | FieldKind::Status(choices) => {
            let candidate = match value {
                Value::Ids(items) => items.first().cloned(),
                other => Some(other.to_plain_string()),
            };
            match candidate {
                Some(c) if c.is_empty() => Value::Null,
                Some(c) if !choices.options.is_empty() && !choices.options.contains(&c) => {
                    Value::Null
                }
                Some(c) => Value::Text(c),
                None => Value::Null,
            }
        }
        FieldKind::Text
        | FieldKind::Date
        | FieldKind::Url
        | FieldKind::Email
        | FieldKind::Phone
        | FieldKind::CreatedAt
        | FieldKind::LastEditedAt => match value.to_plain_string() {
            // an empty or blank-only sequence renders as ""
            text if text.is_empty() => empty_default(field),
            text => Value::Text(text),
        },
    }
}
