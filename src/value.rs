//! Typed match results and the conversion table
//!
//! Every type tag a reference may carry (`%{NOTSPACE:status:int}`) maps to a
//! variant of [`ValueType`]. The set is closed, so dispatch is an exhaustive
//! `match` instead of an open registry: adding a tag without a conversion is
//! a compile error.
//!
//! Conversions never fail the surrounding match. Unparseable input degrades
//! into a defaulted value: zero for the integer tags, NaN for the float and
//! date tags, null for `json`.

use serde::Serialize;

use crate::dateformat;

/// A converted field value inside a match result
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    Json(serde_json::Value),
}

impl Value {
    /// True for the `Null` variant
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

/// The supported type tags, one conversion per variant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Byte,
    Boolean,
    Short,
    Int,
    Long,
    Float,
    Double,
    Date,
    DateTime,
    Str,
    Json,
}

impl ValueType {
    /// Look up a tag token from a reference. Returns `None` for unknown tags;
    /// the caller turns that into an unsupported-type error.
    pub fn from_tag(tag: &str) -> Option<ValueType> {
        match tag {
            "byte" => Some(ValueType::Byte),
            "boolean" => Some(ValueType::Boolean),
            "short" => Some(ValueType::Short),
            "int" => Some(ValueType::Int),
            "long" => Some(ValueType::Long),
            "float" => Some(ValueType::Float),
            "double" => Some(ValueType::Double),
            "date" => Some(ValueType::Date),
            "datetime" => Some(ValueType::DateTime),
            "string" => Some(ValueType::Str),
            "json" => Some(ValueType::Json),
            _ => None,
        }
    }

    /// Convert a raw captured string into a typed value.
    ///
    /// `date_format` is the per-field chrono format derived at resolution
    /// time; it is consulted only by the `date`/`datetime` tags.
    pub fn convert(&self, raw: &str, date_format: Option<&str>) -> Value {
        match self {
            ValueType::Byte | ValueType::Short | ValueType::Int | ValueType::Long => {
                Value::Int(parse_integer(raw))
            }
            ValueType::Float | ValueType::Double => {
                Value::Float(raw.trim().parse::<f64>().unwrap_or(f64::NAN))
            }
            ValueType::Boolean => Value::Bool(raw == "true"),
            ValueType::Str => Value::Str(raw.to_string()),
            ValueType::Json => match serde_json::from_str(raw) {
                Ok(v) => Value::Json(v),
                Err(_) => Value::Null,
            },
            ValueType::Date | ValueType::DateTime => dateformat::parse_timestamp(raw, date_format),
        }
    }
}

/// Integer parse with a float fallback, defaulting to zero
fn parse_integer(raw: &str) -> i64 {
    let trimmed = raw.trim();
    trimmed
        .parse::<i64>()
        .ok()
        .or_else(|| trimmed.parse::<f64>().ok().map(|f| f as i64))
        .unwrap_or(0)
}
