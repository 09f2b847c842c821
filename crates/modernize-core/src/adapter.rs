//! Extractor trait implemented by each language crate.
//!
//! An extractor turns one file's text into a [`UnitFacts`]. The contract is
//! strict:
//!
//! - **Total**: never fails and never panics on malformed input; anything
//!   that cannot be parsed becomes an empty list or a
//!   [`Diagnostic`](crate::facts::Diagnostic) on the unit
//! - **Deterministic**: identical `(path, text)` gives identical facts
//! - **Pure**: no I/O beyond the given text, no shared mutable state, so the
//!   caller may run extractors on many files concurrently
//!
//! Project-level work (unique names, ancestor chains across units, summary)
//! belongs to [`ProjectFacts::assemble`](crate::facts::ProjectFacts::assemble),
//! not to extractors.

use std::path::Path;

use crate::facts::{Language, UnitFacts};

/// Language-specific structural extractor.
pub trait StructuralExtractor: Send + Sync {
    /// Extract the facts of one file.
    ///
    /// `path` is used for the unit name fallback, diagnostics and filename
    /// heuristics only; it is never opened.
    fn extract_unit(&self, path: &str, text: &str) -> UnitFacts;

    /// Get the language this extractor supports.
    fn language(&self) -> Language;
}

/// File stem of `path`, the unit name fallback when no header is found.
pub fn unit_name_from_path(path: &str) -> String {
    Path::new(path)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("unnamed")
        .to_string()
}

/// Push `name` unless an equal name (case-insensitive) is already present.
pub fn push_unique(names: &mut Vec<String>, name: &str) {
    if !names.iter().any(|n| n.eq_ignore_ascii_case(name)) {
        names.push(name.to_string());
    }
}
