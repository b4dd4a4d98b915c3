//! Compiled patterns and match execution
//!
//! A [`GrokPattern`] is one fully resolved pattern: the original expression,
//! the expanded regex text, the ordered field table recovered by the scanner,
//! the per-field type and date-format metadata collected from its references,
//! and a lazily built engine handle.
//!
//! The engine handle is compiled at most once, from a name-stripped copy of
//! the resolved text, and cached in a `OnceCell`; patterns are immutable
//! after resolution and can be shared across tasks.

use std::collections::HashMap;

use once_cell::sync::OnceCell;
use regex::Regex;

use crate::error::GrokError;
use crate::scanner;
use crate::value::{Value, ValueType};

/// Field-name sentinel for a capturing group whose value must never appear
/// in results
pub const UNWANTED: &str = "UNWANTED";

/// A field-name → value mapping produced by a successful match
pub type Matches = HashMap<String, Value>;

/// One named or ad-hoc pattern, compiled and ready to match
#[derive(Debug)]
pub struct GrokPattern {
    id: String,
    expression: String,
    resolved: String,
    /// Index 0 is the whole-match placeholder; entry `i` names the field of
    /// capture group `i`, `None` for unnamed groups.
    fields: Vec<Option<String>>,
    /// Type tags of this pattern's own references. Presence here is also
    /// what marks a field as top-level for null emission.
    types: HashMap<String, ValueType>,
    /// Translated chrono formats for `date`/`datetime` fields
    date_formats: HashMap<String, String>,
    engine: OnceCell<Regex>,
}

impl GrokPattern {
    pub(crate) fn new(
        id: String,
        expression: String,
        resolved: String,
        types: HashMap<String, ValueType>,
        date_formats: HashMap<String, String>,
    ) -> GrokPattern {
        let fields = scanner::field_table(&resolved);
        GrokPattern {
            id,
            expression,
            resolved,
            fields,
            types,
            date_formats,
            engine: OnceCell::new(),
        }
    }

    /// Identifier within the owning collection
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The original, unexpanded expression
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// The fully expanded regex text
    pub fn resolved(&self) -> &str {
        &self.resolved
    }

    /// The capture-index → field-name table (index 0 is the whole match)
    pub fn fields(&self) -> &[Option<String>] {
        &self.fields
    }

    /// Build the engine handle on first use, then reuse it forever
    pub(crate) fn engine(&self) -> Result<&Regex, GrokError> {
        self.engine.get_or_try_init(|| {
            let stripped = scanner::strip_group_names(&self.resolved);
            let regex = Regex::new(&stripped)?;
            debug_assert_eq!(regex.captures_len(), self.fields.len());
            Ok(regex)
        })
    }

    /// Match `text` and assemble the typed field mapping.
    ///
    /// Returns `Ok(None)` when the pattern does not match; that is a normal
    /// outcome, not an error. On a match, every participating named group
    /// contributes its (converted) value, and a non-participating group
    /// whose field belongs to this pattern's own references still appears
    /// with a `Null` value. Deeper non-participating fields are omitted.
    pub fn parse_sync(&self, text: &str) -> Result<Option<Matches>, GrokError> {
        let regex = self.engine()?;
        let caps = match regex.captures(text) {
            Some(caps) => caps,
            None => return Ok(None),
        };

        let mut result = Matches::new();
        for (index, slot) in self.fields.iter().enumerate().skip(1) {
            let field = match slot {
                Some(field) if field != UNWANTED => field,
                _ => continue,
            };
            match caps.get(index) {
                Some(m) => {
                    let value = match self.types.get(field) {
                        Some(value_type) => value_type
                            .convert(m.as_str(), self.date_formats.get(field).map(String::as_str)),
                        None => Value::Str(m.as_str().to_string()),
                    };
                    result.insert(field.clone(), value);
                }
                None => {
                    if self.types.contains_key(field) {
                        result.insert(field.clone(), Value::Null);
                    }
                }
            }
        }
        Ok(Some(result))
    }

    /// Asynchronous match with a deferred-completion guarantee.
    ///
    /// The returned future is never ready on its first poll: it yields to the
    /// scheduler before matching, so completion always happens strictly after
    /// the initiating call has returned to the caller. The match itself is
    /// the same synchronous computation as [`parse_sync`](Self::parse_sync).
    pub async fn parse(&self, text: &str) -> Result<Option<Matches>, GrokError> {
        tokio::task::yield_now().await;
        self.parse_sync(text)
    }
}
