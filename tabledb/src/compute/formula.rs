use super::arith::{evaluate_arithmetic, is_arithmetic};
use crate::schema::Record;
use crate::value::{format_number, parse_number, Value};
use chrono::{SecondsFormat, Utc};
use regex::{Captures, Regex};
use std::sync::OnceLock;

fn function_call_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^([a-zA-Z_][a-zA-Z0-9_]*)\((.*)\)$").expect("static regex")
    })
}

fn field_ref_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\{([^}]+)\}").expect("static regex"))
}

fn whole_field_ref_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\{([^}]+)\}$").expect("static regex"))
}

fn condition_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(.+?)(>=|<=|!=|=|>|<)(.+)").expect("static regex"))
}

/// An evaluated function argument.
#[derive(Debug, Clone, PartialEq)]
enum Token {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl Token {
    /// Numeric reading of an argument: null is 0, blank text is 0, junk is NaN.
    fn to_number(&self) -> f64 {
        match self {
            Token::Null => 0.0,
            Token::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Token::Number(n) => *n,
            Token::Text(s) if s.trim().is_empty() => 0.0,
            Token::Text(s) => parse_number(s).unwrap_or(f64::NAN),
        }
    }

    /// String reading of an argument: null is "".
    fn to_text(&self) -> String {
        match self {
            Token::Null => String::new(),
            Token::Bool(b) => b.to_string(),
            Token::Number(n) => format_number(*n),
            Token::Text(s) => s.clone(),
        }
    }

    fn into_value(self) -> Value {
        match self {
            Token::Null => Value::Null,
            Token::Bool(b) => Value::Bool(b),
            Token::Number(n) => Value::Number(n),
            Token::Text(s) => Value::Text(s),
        }
    }
}

/// Evaluate a formula expression against a record's stored values.
///
/// Three forms are tried in order: a single top-level function call
/// (`IF(...)`, `SUM(...)`, ...), pure arithmetic once `{field}` references are
/// replaced by numbers, and finally a text template. Never fails: anything that
/// cannot be evaluated comes back as null or best-effort text.
pub fn compute_formula(record: &Record, expression: &str) -> Value {
    let mut expression = expression.trim();
    if expression.is_empty() {
        return Value::Null;
    }
    if let Some(rest) = expression.strip_prefix('=') {
        expression = rest.trim();
    }

    if let Some(caps) = function_call_pattern().captures(expression) {
        let name = caps[1].to_uppercase();
        let args: Vec<Token> = split_args(&caps[2])
            .iter()
            .map(|arg| evaluate_token(arg, record))
            .collect();
        return apply_function(&name, args, record);
    }

    let numeric = substitute_fields(expression, record, |value| {
        let n = value.map(Value::to_number).unwrap_or(f64::NAN);
        if n.is_finite() {
            format_number(n)
        } else {
            "0".to_string()
        }
    });
    // Arithmetic that fails to evaluate falls through to the template form.
    if is_arithmetic(&numeric) {
        match evaluate_arithmetic(&numeric) {
            Ok(n) if n.is_finite() => return Value::Number(n),
            Ok(n) => log::debug!("Formula '{expression}' evaluated to non-finite {n}"),
            Err(e) => log::debug!("Formula '{expression}' is not arithmetic: {e}"),
        }
    }

    let text = substitute_fields(expression, record, |value| match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::Ids(ids)) => ids.join(", "),
        Some(other) => other.to_plain_string(),
    });
    match parse_number(&text) {
        Some(n) if n.is_finite() => Value::Number(n),
        _ => Value::Text(text),
    }
}

/// Replace every `{fieldId}` with `render(value)`; ids are matched trimmed.
fn substitute_fields<F>(expression: &str, record: &Record, render: F) -> String
where
    F: Fn(Option<&Value>) -> String,
{
    field_ref_pattern()
        .replace_all(expression, |caps: &Captures| render(record.get(caps[1].trim())))
        .into_owned()
}

/// Split a function argument list on top-level commas. Commas inside quotes or
/// nested parentheses do not split.
fn split_args(args: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;

    for ch in args.chars() {
        if (ch == '"' || ch == '\'') && (quote.is_none() || quote == Some(ch)) {
            quote = if quote.is_some() { None } else { Some(ch) };
            current.push(ch);
            continue;
        }
        if quote.is_none() {
            match ch {
                '(' => depth += 1,
                ')' => depth = depth.saturating_sub(1),
                ',' if depth == 0 => {
                    out.push(current.trim().to_string());
                    current.clear();
                    continue;
                }
                _ => {}
            }
        }
        current.push(ch);
    }
    if !current.trim().is_empty() {
        out.push(current.trim().to_string());
    }
    out
}

fn evaluate_token(token: &str, record: &Record) -> Token {
    let t = token.trim();
    if t.is_empty() {
        return Token::Null;
    }
    let quoted = (t.starts_with('"') && t.ends_with('"'))
        || (t.starts_with('\'') && t.ends_with('\''));
    if quoted {
        let inner = if t.len() >= 2 { &t[1..t.len() - 1] } else { "" };
        return Token::Text(inner.to_string());
    }
    let has_word_chars = t.chars().any(|c| c.is_ascii_alphabetic() || c == '{' || c == '}');
    if !has_word_chars {
        if let Some(n) = parse_number(t).filter(|n| n.is_finite()) {
            return Token::Number(n);
        }
    }
    if let Some(caps) = whole_field_ref_pattern().captures(t) {
        return match record.get(caps[1].trim()) {
            None | Some(Value::Null) => Token::Null,
            Some(Value::Ids(ids)) => Token::Text(ids.join(", ")),
            Some(Value::Bool(b)) => Token::Bool(*b),
            Some(Value::Number(n)) => Token::Number(*n),
            Some(Value::Text(s)) => Token::Text(s.clone()),
        };
    }
    match t.to_lowercase().as_str() {
        "true" => Token::Bool(true),
        "false" => Token::Bool(false),
        _ => Token::Text(t.to_string()),
    }
}

fn numeric_args(args: &[Token]) -> Vec<f64> {
    args.iter()
        .map(Token::to_number)
        .filter(|n| n.is_finite())
        .collect()
}

fn finite_or_null(n: f64) -> Value {
    if n.is_finite() {
        Value::Number(n)
    } else {
        Value::Null
    }
}

fn apply_function(name: &str, args: Vec<Token>, record: &Record) -> Value {
    let first = args.first().cloned().unwrap_or(Token::Null);
    match name {
        "SUM" => Value::Number(numeric_args(&args).iter().sum()),
        "AVG" => {
            let nums = numeric_args(&args);
            if nums.is_empty() {
                Value::Number(0.0)
            } else {
                Value::Number(nums.iter().sum::<f64>() / nums.len() as f64)
            }
        }
        "MIN" => {
            let nums = numeric_args(&args);
            let min = nums.iter().copied().fold(f64::INFINITY, f64::min);
            Value::Number(if nums.is_empty() { 0.0 } else { min })
        }
        "MAX" => {
            let nums = numeric_args(&args);
            let max = nums.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            Value::Number(if nums.is_empty() { 0.0 } else { max })
        }
        "ABS" => finite_or_null(first.to_number().abs()),
        "ROUND" => finite_or_null((first.to_number() + 0.5).floor()),
        "LEN" => Value::Number(first.to_text().chars().count() as f64),
        "UPPER" => Value::Text(first.to_text().to_uppercase()),
        "LOWER" => Value::Text(first.to_text().to_lowercase()),
        "CONCAT" => Value::Text(args.iter().map(Token::to_text).collect()),
        "NOW" => Value::Text(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
        "TODAY" => Value::Text(Utc::now().format("%Y-%m-%d").to_string()),
        "IF" => {
            let branch = if evaluate_condition(&first, record) {
                args.get(1)
            } else {
                args.get(2)
            };
            match branch {
                None | Some(Token::Null) => Value::Text(String::new()),
                Some(token) => token.clone().into_value(),
            }
        }
        // unknown functions echo their first argument
        _ => match first {
            Token::Null => Value::Null,
            other => Value::Text(other.to_text()),
        },
    }
}

/// Truthiness of an `IF` condition. Text conditions may hold one comparison
/// (`>= <= != = > <`); numeric if either side is a number, else string order.
fn evaluate_condition(raw: &Token, record: &Record) -> bool {
    let condition = match raw {
        Token::Bool(b) => return *b,
        Token::Number(n) => return *n != 0.0,
        Token::Null => return false,
        Token::Text(s) => s.trim(),
    };
    let Some(caps) = condition_pattern().captures(condition) else {
        return !condition.is_empty();
    };
    let left = evaluate_token(caps[1].trim(), record);
    let right = evaluate_token(caps[3].trim(), record);
    let op = &caps[2];

    if matches!(left, Token::Number(_)) || matches!(right, Token::Number(_)) {
        let (l, r) = (left.to_number(), right.to_number());
        return match op {
            ">" => l > r,
            "<" => l < r,
            ">=" => l >= r,
            "<=" => l <= r,
            "=" => l == r,
            "!=" => l != r,
            _ => false,
        };
    }
    let (l, r) = (left.to_text(), right.to_text());
    match op {
        "=" => l == r,
        "!=" => l != r,
        ">" => l > r,
        "<" => l < r,
        ">=" => l >= r,
        "<=" => l <= r,
        _ => false,
    }
}
