//! # grok
//!
//! A grok pattern compiler: named pattern definitions are composed with
//! `%{NAME}` references, resolved into a single regex, and matched against
//! log lines to produce field-name keyed, optionally typed results.
//!
//! ```no_run
//! let mut patterns = grok::load_default_sync(None);
//! let pattern = patterns
//!     .create_pattern("%{WORD:verb} %{URIPATH:url}", None)
//!     .unwrap();
//! let result = pattern.parse_sync("DELETE /ping HTTP/1.1").unwrap();
//! ```
//!
//! A reference is `%{NAME}`, `%{NAME:field}`, `%{NAME:field:type}` or
//! `%{NAME:field:date;FORMAT}` (`;` works as a separator wherever `:` does).
//! Fields named `UNWANTED` capture without ever being reported, which is how
//! the bundled definitions keep their structural internals out of results.

pub mod collection;
pub mod dateformat;
pub mod debug;
pub mod error;
pub mod pattern;
pub mod scanner;
pub mod value;

use std::path::Path;

use log::debug;

pub use collection::GrokCollection;
pub use error::GrokError;
pub use pattern::{GrokPattern, Matches, UNWANTED};
pub use value::{Value, ValueType};

/// The bundled definition files, embedded at build time
pub const DEFAULT_PATTERN_FILES: &[(&str, &str)] = &[
    ("grok-patterns", include_str!("../patterns/grok-patterns")),
    ("haproxy", include_str!("../patterns/haproxy")),
    ("extras", include_str!("../patterns/extras")),
];

fn module_wanted(name: &str, modules: Option<&[&str]>) -> bool {
    match modules {
        None => true,
        Some([]) => true,
        Some(wanted) => wanted.contains(&name),
    }
}

/// Build a collection from the bundled definitions.
///
/// `modules` restricts loading to the named files; `None` or an empty slice
/// loads everything.
pub fn load_default_sync(modules: Option<&[&str]>) -> GrokCollection {
    let mut collection = GrokCollection::new();
    for (name, text) in DEFAULT_PATTERN_FILES {
        if module_wanted(name, modules) {
            let defined = collection.load_str(text);
            debug!("bundled module '{}': {} definitions", name, defined);
        }
    }
    collection
}

/// Asynchronous counterpart of [`load_default_sync`].
///
/// The returned future is never ready on its first poll, so completion
/// always happens strictly after the initiating call has returned.
pub async fn load_default(modules: Option<&[&str]>) -> GrokCollection {
    tokio::task::yield_now().await;
    load_default_sync(modules)
}

/// Build a collection from every definition file in `dir`, filtered by the
/// same allow-list rule as [`load_default_sync`].
pub fn load_dir_sync(
    dir: impl AsRef<Path>,
    modules: Option<&[&str]>,
) -> Result<GrokCollection, GrokError> {
    let mut collection = GrokCollection::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name();
        if module_wanted(&name.to_string_lossy(), modules) {
            collection.load_sync(entry.path())?;
        }
    }
    Ok(collection)
}

/// Asynchronous counterpart of [`load_dir_sync`].
///
/// All wanted files are read concurrently; any read error fails the whole
/// load, never yielding a partially filled collection.
pub async fn load_dir(
    dir: impl AsRef<Path>,
    modules: Option<&[&str]>,
) -> Result<GrokCollection, GrokError> {
    tokio::task::yield_now().await;

    let mut paths = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        if !entry.file_type().await?.is_file() {
            continue;
        }
        let name = entry.file_name();
        if module_wanted(&name.to_string_lossy(), modules) {
            paths.push(entry.path());
        }
    }

    let reads = paths.iter().map(tokio::fs::read_to_string);
    let texts = futures::future::try_join_all(reads).await?;

    let mut collection = GrokCollection::new();
    for text in &texts {
        collection.load_str(text);
    }
    Ok(collection)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_modules_resolve() {
        let mut patterns = load_default_sync(None);
        assert!(patterns.count() > 0);
        assert!(patterns.get_pattern("IPV4").unwrap().is_some());
        assert!(patterns.get_pattern("HAPROXYHTTP").unwrap().is_some());
        assert!(patterns.get_pattern("JSON").unwrap().is_some());
    }

    #[test]
    fn allow_list_restricts_modules() {
        let mut patterns = load_default_sync(Some(&["grok-patterns"]));
        assert!(patterns.get_pattern("IPV4").unwrap().is_some());
        assert!(patterns.get_pattern("HAPROXYHTTP").unwrap().is_none());
    }

    #[test]
    fn empty_allow_list_loads_everything() {
        let mut patterns = load_default_sync(Some(&[]));
        assert!(patterns.get_pattern("HAPROXYHTTP").unwrap().is_some());
    }
}
