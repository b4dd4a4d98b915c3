//! Error types for pattern compilation and loading
//!
//! Structural errors (unknown reference, unsupported type tag, duplicate id,
//! bad field name) abort the operation that raised them. Data-quality
//! problems are not errors: a non-matching input yields `Ok(None)` from the
//! match entry points, and an unconvertible field value degrades into a
//! defaulted [`Value`](crate::Value).

use std::fmt;

/// Errors that can occur while compiling, registering or loading patterns
#[derive(Debug, Clone, PartialEq)]
pub enum GrokError {
    /// A `%{NAME...}` reference names a pattern the collection does not know
    UnknownPattern(String),
    /// A reference carries a type tag outside the supported set
    UnsupportedType(String),
    /// `create_pattern` was called with an id that is already registered
    DuplicatePattern(String),
    /// The same field name appears in two references of one expression
    FieldNameConflict(String),
    /// A field name contains characters outside `[A-Za-z0-9_]`
    InvalidFieldName(String),
    /// The resolved expression was rejected by the regex engine
    Regex(String),
    /// A definition source could not be read
    Io(String),
}

impl fmt::Display for GrokError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GrokError::UnknownPattern(name) => write!(f, "pattern \"{}\" not found", name),
            GrokError::UnsupportedType(tag) => write!(f, "type not supported: {}", tag),
            GrokError::DuplicatePattern(id) => {
                write!(f, "pattern with id {} already exists", id)
            }
            GrokError::FieldNameConflict(field) => write!(f, "Field name conflict: {}", field),
            GrokError::InvalidFieldName(field) => write!(f, "Invalid field name: {}", field),
            GrokError::Regex(msg) => write!(f, "invalid regex: {}", msg),
            GrokError::Io(msg) => write!(f, "IO error: {}", msg),
        }
    }
}

impl std::error::Error for GrokError {}

impl From<std::io::Error> for GrokError {
    fn from(err: std::io::Error) -> Self {
        GrokError::Io(err.to_string())
    }
}

impl From<regex::Error> for GrokError {
    fn from(err: regex::Error) -> Self {
        GrokError::Regex(err.to_string())
    }
}
