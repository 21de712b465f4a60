//! Predicate library
//!
//! Stateless validators for common checks. Each constructor returns a
//! synchronous [`Validator`] ready to attach to an attribute.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use crate::adapter::TaskFn;
use crate::schema::Validator;

const FUZZY_EMAIL_PATTERN: &str = r"[^\s@]+@[^\s@]+\.[^\s@]+";

/// Names accepted by [`by_name`]
pub const NAMES: &[&str] = &[
    "isEmpty",
    "isArray",
    "isObject",
    "isString",
    "isNumber",
    "isFinite",
    "isBoolean",
    "isNull",
    "isFuzzyEmail",
    "min",
    "max",
    "minmax",
];

/// Null, empty string, empty array or empty object
pub fn is_empty() -> Validator {
    TaskFn::sync(|v: &Value| match v {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(o) => o.is_empty(),
        _ => false,
    })
}

pub fn is_array() -> Validator {
    TaskFn::sync(Value::is_array)
}

pub fn is_object() -> Validator {
    TaskFn::sync(Value::is_object)
}

pub fn is_string() -> Validator {
    TaskFn::sync(Value::is_string)
}

pub fn is_number() -> Validator {
    TaskFn::sync(Value::is_number)
}

/// A number that is not infinite or NaN
pub fn is_finite() -> Validator {
    TaskFn::sync(|v: &Value| v.as_f64().is_some_and(f64::is_finite))
}

pub fn is_boolean() -> Validator {
    TaskFn::sync(Value::is_boolean)
}

pub fn is_null() -> Validator {
    TaskFn::sync(Value::is_null)
}

/// Loose `local@domain.tld` shape check
pub fn is_fuzzy_email() -> Validator {
    TaskFn::sync(|v: &Value| {
        let Some(s) = v.as_str() else {
            return false;
        };
        fuzzy_email_regex().is_some_and(|re| re.is_match(s))
    })
}

/// Numbers at least `bound`; strings and arrays at least `bound` long
pub fn min(bound: f64) -> Validator {
    TaskFn::sync(move |v: &Value| measure(v).is_some_and(|m| m >= bound))
}

/// Numbers at most `bound`; strings and arrays at most `bound` long
pub fn max(bound: f64) -> Validator {
    TaskFn::sync(move |v: &Value| measure(v).is_some_and(|m| m <= bound))
}

/// Inclusive range check with the same measure as [`min`] and [`max`]
pub fn minmax(lower: f64, upper: f64) -> Validator {
    TaskFn::sync(move |v: &Value| measure(v).is_some_and(|m| m >= lower && m <= upper))
}

/// Look up a validator by its library name.
///
/// Bounded validators take their bounds from `args`. Returns `Err` with a
/// reason when the name is unknown or the arguments don't fit.
pub fn by_name(name: &str, args: &[Value]) -> Result<Validator, String> {
    let validator = match name {
        "isEmpty" => is_empty(),
        "isArray" => is_array(),
        "isObject" => is_object(),
        "isString" => is_string(),
        "isNumber" => is_number(),
        "isFinite" => is_finite(),
        "isBoolean" => is_boolean(),
        "isNull" => is_null(),
        "isFuzzyEmail" => is_fuzzy_email(),
        "min" => min(bound(name, args, 0)?),
        "max" => max(bound(name, args, 0)?),
        "minmax" => minmax(bound(name, args, 0)?, bound(name, args, 1)?),
        _ => return Err(format!("unknown validator `{name}`")),
    };

    let expected = match name {
        "min" | "max" => 1,
        "minmax" => 2,
        _ => 0,
    };
    if args.len() != expected {
        return Err(format!(
            "`{name}` takes {expected} argument(s), got {}",
            args.len()
        ));
    }

    Ok(validator)
}

fn bound(name: &str, args: &[Value], index: usize) -> Result<f64, String> {
    args.get(index)
        .and_then(Value::as_f64)
        .ok_or_else(|| format!("`{name}` needs a numeric bound at position {index}"))
}

fn measure(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => Some(s.chars().count() as f64),
        Value::Array(a) => Some(a.len() as f64),
        _ => None,
    }
}

fn fuzzy_email_regex() -> Option<&'static Regex> {
    static FUZZY_EMAIL: OnceLock<Option<Regex>> = OnceLock::new();
    FUZZY_EMAIL
        .get_or_init(|| Regex::new(FUZZY_EMAIL_PATTERN).ok())
        .as_ref()
}
