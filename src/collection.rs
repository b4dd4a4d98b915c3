//! Pattern registry and reference resolution
//!
//! A [`GrokCollection`] maps identifiers to patterns and owns the expansion
//! algorithm: every `%{NAME}`, `%{NAME:FIELD}`, `%{NAME:FIELD:TYPE}` or
//! `%{NAME:FIELD;TYPE;DATEFORMAT}` reference is replaced by the referenced
//! pattern's own resolved text wrapped in a named capturing group. Resolution
//! is depth-first and memoized: a pattern is resolved at most once no matter
//! how many other patterns reference it, and load order across definition
//! sources is irrelevant as long as everything is loaded before first use.
//!
//! Definition sources are line-oriented: a line matching
//! `^([A-Z0-9_]+)\s+(.+)$` defines a pattern, anything else (blank lines,
//! comments, malformed lines) is silently skipped. Loaded patterns stay
//! unresolved until referenced or looked up.
//!
//! Cyclic references are not detected; a cycle recurses until the call stack
//! is exhausted. Authors must avoid them.

use std::collections::HashMap;
use std::ops::Range;
use std::path::Path;
use std::sync::Arc;

use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::dateformat;
use crate::error::GrokError;
use crate::pattern::{GrokPattern, UNWANTED};
use crate::value::ValueType;

/// `%{NAME}` with up to three optional `:`/`;`-delimited segments
static REFERENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"%\{([A-Z0-9_]+)(?:[:;]([^:;}]+))?(?:[:;]([^:;}]+))?(?:[:;]([^;}]+))?\}").unwrap()
});

/// `ID  expression` definition line
static DEFINITION_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([A-Z0-9_]+)\s+(.+)$").unwrap());

/// One parsed `%{...}` reference
struct Reference {
    span: Range<usize>,
    name: String,
    field: String,
    type_tag: Option<String>,
    date_format: Option<String>,
}

fn scan_references(expression: &str) -> Vec<Reference> {
    REFERENCE
        .captures_iter(expression)
        .map(|caps| {
            let name = caps[1].to_string();
            let field = caps
                .get(2)
                .map(|m| m.as_str().to_string())
                .unwrap_or_else(|| name.clone());
            Reference {
                span: caps.get(0).map(|m| m.range()).unwrap_or(0..0),
                name,
                field,
                type_tag: caps.get(3).map(|m| m.as_str().to_string()),
                date_format: caps.get(4).map(|m| m.as_str().to_string()),
            }
        })
        .collect()
}

fn is_valid_field_name(field: &str) -> bool {
    !field.is_empty()
        && field
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// A registered pattern: its definition text plus the memoized compiled form
struct Entry {
    expression: String,
    compiled: Option<Arc<GrokPattern>>,
}

/// Registry of patterns keyed by identifier
#[derive(Default)]
pub struct GrokCollection {
    entries: HashMap<String, Entry>,
    next_auto_id: usize,
}

impl GrokCollection {
    /// Create an empty collection
    pub fn new() -> GrokCollection {
        GrokCollection::default()
    }

    /// Number of registered patterns (resolved or not)
    pub fn count(&self) -> usize {
        self.entries.len()
    }

    /// Build a new pattern from `expression`, resolve it immediately and
    /// register it.
    ///
    /// An omitted `id` is auto-generated as `pattern-<n>`; auto-generated
    /// identifiers are not guaranteed stable across runs. An `id` that is
    /// already registered fails with a duplicate-identifier error and leaves
    /// the existing entry untouched.
    pub fn create_pattern(
        &mut self,
        expression: &str,
        id: Option<&str>,
    ) -> Result<Arc<GrokPattern>, GrokError> {
        let id = match id {
            Some(id) => id.to_string(),
            None => {
                let id = format!("pattern-{}", self.next_auto_id);
                self.next_auto_id += 1;
                id
            }
        };
        if self.entries.contains_key(&id) {
            return Err(GrokError::DuplicatePattern(id));
        }
        let pattern = Arc::new(self.compile(expression, &id, false)?);
        self.entries.insert(
            id,
            Entry {
                expression: expression.to_string(),
                compiled: Some(pattern.clone()),
            },
        );
        Ok(pattern)
    }

    /// Look up a pattern by id, resolving it on first use.
    ///
    /// Returns `Ok(None)` when the id is unknown; nothing is created
    /// implicitly.
    pub fn get_pattern(&mut self, id: &str) -> Result<Option<Arc<GrokPattern>>, GrokError> {
        if !self.entries.contains_key(id) {
            return Ok(None);
        }
        self.resolve_named(id).map(Some)
    }

    /// Load line-oriented definitions from a string, returning the number of
    /// defining lines. Non-matching lines are skipped, not errors.
    /// Redefining an id replaces its expression and drops its memoized form.
    pub fn load_str(&mut self, text: &str) -> usize {
        let mut defined = 0;
        for line in text.lines() {
            if let Some(caps) = DEFINITION_LINE.captures(line) {
                self.entries.insert(
                    caps[1].to_string(),
                    Entry {
                        expression: caps[2].to_string(),
                        compiled: None,
                    },
                );
                defined += 1;
            }
        }
        debug!("loaded {} pattern definitions", defined);
        defined
    }

    /// Blocking definition-file load; returns the number of defined patterns
    pub fn load_sync(&mut self, path: impl AsRef<Path>) -> Result<usize, GrokError> {
        let text = std::fs::read_to_string(path)?;
        Ok(self.load_str(&text))
    }

    /// Asynchronous definition-file load.
    ///
    /// The returned future is never ready on its first poll, so completion
    /// always happens strictly after the initiating call has returned.
    pub async fn load(&mut self, path: impl AsRef<Path>) -> Result<usize, GrokError> {
        tokio::task::yield_now().await;
        let text = tokio::fs::read_to_string(path).await?;
        Ok(self.load_str(&text))
    }

    /// Resolve a registered pattern, memoizing the result
    pub(crate) fn resolve_named(&mut self, name: &str) -> Result<Arc<GrokPattern>, GrokError> {
        let expression = match self.entries.get(name) {
            Some(entry) => {
                if let Some(compiled) = &entry.compiled {
                    return Ok(compiled.clone());
                }
                entry.expression.clone()
            }
            None => return Err(GrokError::UnknownPattern(name.to_string())),
        };
        let pattern = Arc::new(self.compile(&expression, name, false)?);
        if let Some(entry) = self.entries.get_mut(name) {
            entry.compiled = Some(pattern.clone());
        }
        Ok(pattern)
    }

    /// Expand every reference in `expression` into a named capturing group
    /// around the referenced pattern's resolved text, depth-first through
    /// the registry. In debug mode the inserted groups are marked optional,
    /// which the failure localizer uses to test sub-pattern participation.
    pub(crate) fn compile(
        &mut self,
        expression: &str,
        id: &str,
        debug_mode: bool,
    ) -> Result<GrokPattern, GrokError> {
        let mut types: HashMap<String, ValueType> = HashMap::new();
        let mut date_formats: HashMap<String, String> = HashMap::new();
        let mut resolved = String::with_capacity(expression.len());
        let mut last = 0;

        for reference in scan_references(expression) {
            if !is_valid_field_name(&reference.field) {
                return Err(GrokError::InvalidFieldName(reference.field));
            }
            if reference.field != UNWANTED {
                let value_type = match &reference.type_tag {
                    Some(tag) => ValueType::from_tag(tag)
                        .ok_or_else(|| GrokError::UnsupportedType(tag.clone()))?,
                    None => ValueType::Str,
                };
                if types.insert(reference.field.clone(), value_type).is_some() {
                    return Err(GrokError::FieldNameConflict(reference.field));
                }
                if let Some(format) = &reference.date_format {
                    date_formats.insert(reference.field.clone(), dateformat::to_chrono(format));
                }
            }

            let sub = self.resolve_named(&reference.name)?;
            resolved.push_str(&expression[last..reference.span.start]);
            resolved.push_str("(?<");
            resolved.push_str(&reference.field);
            resolved.push('>');
            resolved.push_str(sub.resolved());
            resolved.push(')');
            if debug_mode {
                resolved.push('?');
            }
            last = reference.span.end;
        }
        resolved.push_str(&expression[last..]);

        debug!("compiled pattern '{}'", id);
        Ok(GrokPattern::new(
            id.to_string(),
            expression.to_string(),
            resolved,
            types,
            date_formats,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn definition_lines_are_parsed_and_rest_skipped() {
        let mut coll = GrokCollection::new();
        let defined = coll.load_str(
            "# comment line\n\
             WORD \\b\\w+\\b\n\
             \n\
             lowercase not a definition\n\
             NUMBER_2 [0-9]+\n",
        );
        assert_eq!(defined, 2);
        assert_eq!(coll.count(), 2);
    }

    #[test]
    fn expression_is_kept_verbatim() {
        let mut coll = GrokCollection::new();
        coll.load_str("GREEDY .*  trailing kept");
        let pattern = coll.get_pattern("GREEDY").unwrap().unwrap();
        assert_eq!(pattern.expression(), ".*  trailing kept");
    }

    #[test]
    fn reference_free_pattern_resolves_to_itself() {
        let mut coll = GrokCollection::new();
        let pattern = coll.create_pattern(r"(\d+)-(\d+)", None).unwrap();
        assert_eq!(pattern.resolved(), pattern.expression());
        assert_eq!(pattern.fields().len(), 3);
    }

    #[test]
    fn references_expand_into_named_groups() {
        let mut coll = GrokCollection::new();
        coll.load_str("WORD \\b\\w+\\b");
        let pattern = coll.create_pattern("%{WORD:verb}!", None).unwrap();
        assert_eq!(pattern.resolved(), r"(?<verb>\b\w+\b)!");
    }

    #[test]
    fn field_defaults_to_reference_name() {
        let mut coll = GrokCollection::new();
        coll.load_str("WORD \\b\\w+\\b");
        let pattern = coll.create_pattern("%{WORD} %{WORD:who}", None).unwrap();
        let result = pattern.parse_sync("hello world").unwrap().unwrap();
        assert_eq!(result["WORD"], Value::Str("hello".to_string()));
        assert_eq!(result["who"], Value::Str("world".to_string()));
    }

    #[test]
    fn resolution_is_memoized() {
        let mut coll = GrokCollection::new();
        coll.load_str("NUM [0-9]+\nPAIR %{NUM:a}-%{NUM:b}");
        let first = coll.get_pattern("NUM").unwrap().unwrap();
        let second = coll.get_pattern("NUM").unwrap().unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        // shared sub-pattern substitutes byte-identical text in both parents
        let left = coll.create_pattern("%{NUM:x}", None).unwrap();
        let right = coll.create_pattern("%{NUM:y}", None).unwrap();
        assert_eq!(left.resolved(), "(?<x>[0-9]+)");
        assert_eq!(right.resolved(), "(?<y>[0-9]+)");
        let pair = coll.get_pattern("PAIR").unwrap().unwrap();
        assert_eq!(pair.resolved(), "(?<a>[0-9]+)-(?<b>[0-9]+)");
    }

    #[test]
    fn unknown_reference_fails() {
        let mut coll = GrokCollection::new();
        let err = coll.create_pattern("%{NOPE:x}", None).unwrap_err();
        assert_eq!(err, GrokError::UnknownPattern("NOPE".to_string()));
    }

    #[test]
    fn unsupported_type_fails() {
        let mut coll = GrokCollection::new();
        coll.load_str("WORD \\b\\w+\\b");
        let err = coll.create_pattern("%{WORD:x:decimal}", None).unwrap_err();
        assert_eq!(err, GrokError::UnsupportedType("decimal".to_string()));
    }

    #[test]
    fn duplicate_id_is_rejected_without_overwrite() {
        let mut coll = GrokCollection::new();
        coll.create_pattern("first", Some("p")).unwrap();
        let err = coll.create_pattern("second", Some("p")).unwrap_err();
        assert_eq!(err, GrokError::DuplicatePattern("p".to_string()));
        let kept = coll.get_pattern("p").unwrap().unwrap();
        assert_eq!(kept.expression(), "first");
    }

    #[test]
    fn auto_ids_are_sequential() {
        let mut coll = GrokCollection::new();
        let a = coll.create_pattern("a", None).unwrap();
        let b = coll.create_pattern("b", None).unwrap();
        assert_eq!(a.id(), "pattern-0");
        assert_eq!(b.id(), "pattern-1");
    }

    #[test]
    fn conflicting_field_names_are_rejected() {
        let mut coll = GrokCollection::new();
        coll.load_str("NUM [0-9]+");
        let err = coll
            .create_pattern("%{NUM:took:float} %{NUM:took:float}", None)
            .unwrap_err();
        assert_eq!(err, GrokError::FieldNameConflict("took".to_string()));
    }

    #[test]
    fn unwanted_fields_never_conflict() {
        let mut coll = GrokCollection::new();
        coll.load_str("NUM [0-9]+");
        let pattern = coll
            .create_pattern("%{NUM:UNWANTED}-%{NUM:UNWANTED}", None)
            .unwrap();
        let result = pattern.parse_sync("12-34").unwrap().unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn field_names_are_validated() {
        let mut coll = GrokCollection::new();
        coll.load_str("DATA .*");
        let err = coll.create_pattern("%{DATA:User-agent}", None).unwrap_err();
        assert_eq!(err, GrokError::InvalidFieldName("User-agent".to_string()));
    }

    #[test]
    fn getting_an_unknown_id_is_none() {
        let mut coll = GrokCollection::new();
        assert!(coll.get_pattern("MISSING").unwrap().is_none());
    }

    #[test]
    fn date_format_segment_is_translated_at_resolution() {
        let mut coll = GrokCollection::new();
        coll.load_str("STAMP [0-9A-Za-z/: +-]+");
        let pattern = coll
            .create_pattern("%{STAMP:when;date;dd/MMM/yyyy:HH:mm:ss Z}", None)
            .unwrap();
        let result = pattern
            .parse_sync("21/Apr/2017:10:55:46 +0800")
            .unwrap()
            .unwrap();
        assert_eq!(result["when"], Value::Int(1492743346000));
    }
}
