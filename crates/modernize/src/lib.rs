//! modernize - legacy migration planning and rewrite coverage auditing.
//!
//! This crate is the front door over the workspace: a small library facade
//! and the `modernize` CLI binary.
//!
//! ## Pipeline
//!
//! ```text
//! (path, text)* --extract_unit--> UnitFacts* --build_project_facts--> ProjectFacts
//! ProjectFacts --plan_migration--> MigrationPlan
//! (ProjectFacts, ProjectFacts) --compare_projects--> CoverageReport
//! ```
//!
//! Extraction is pure and runs file-parallel; all I/O happens in
//! [`analyze_directory`] before any extractor is called.
//!
//! ## Modules
//!
//! - `cli` - command implementations used by the binary

pub mod cli;

use std::path::Path;

use rayon::prelude::*;
use tracing::debug;

use modernize_core::adapter::{unit_name_from_path, StructuralExtractor};
use modernize_core::cache::{sha256_hex, FactsCache};
use modernize_core::compare::{self, CoverageReport};
use modernize_core::config::{ComparatorConfig, ExtractorConfig, MapperConfig};
use modernize_core::facts::{Diagnostic, Language, ProjectFacts, UnitFacts};
use modernize_core::mapper::{self, MigrationPlan};
use modernize_core::workspace::{load_sources, SourceConfig};
use modernize_java::JavaExtractor;
use modernize_pascal::PascalExtractor;

// Re-export core types for convenience
pub use modernize_core::config::{AnalysisConfig, CliOverrides, ResolvedConfig};
pub use modernize_core::error::{ModernizeError, ModernizeResult, OutputErrorCode};
pub use modernize_core::output::{ErrorInfo, ErrorResponse, SCHEMA_VERSION};

/// Extractor for a language, if one is supported.
pub fn extractor_for(
    language: Language,
    config: &ExtractorConfig,
) -> Option<Box<dyn StructuralExtractor>> {
    match language {
        Language::Pascal => Some(Box::new(PascalExtractor::new(config.clone()))),
        Language::Java => Some(Box::new(JavaExtractor::new(config.clone()))),
        Language::Unknown => None,
    }
}

/// Extract one file, choosing the extractor by extension.
///
/// A file of an unsupported type becomes an empty unit carrying an input
/// diagnostic.
pub fn extract_unit(path: &str, text: &str, config: &ExtractorConfig) -> UnitFacts {
    let language = Language::from_path(Path::new(path));
    match extractor_for(language, config) {
        Some(extractor) => extractor.extract_unit(path, text),
        None => {
            let mut unit = UnitFacts::new(unit_name_from_path(path), path, Language::Unknown);
            unit.diagnostics
                .push(Diagnostic::input_error(path, "unsupported file type"));
            unit
        }
    }
}

/// Extract every file in parallel and assemble the project.
///
/// The result does not depend on the order of `files`.
pub fn build_project_facts(files: &[(String, String)], config: &ExtractorConfig) -> ProjectFacts {
    let units: Vec<UnitFacts> = files
        .par_iter()
        .map(|(path, text)| extract_unit(path, text, config))
        .collect();
    ProjectFacts::assemble(units, Vec::new())
}

/// Derive the migration plan of a source project.
pub fn plan_migration(facts: &ProjectFacts, config: &MapperConfig) -> ModernizeResult<MigrationPlan> {
    mapper::plan(facts, config)
}

/// Audit how much of `source` a rewritten `target` covers.
pub fn compare_projects(
    source: &ProjectFacts,
    target: &ProjectFacts,
    config: &ComparatorConfig,
) -> ModernizeResult<CoverageReport> {
    compare::compare(source, target, config)
}

/// Fingerprint of an extractor configuration, used as the cache key salt.
pub fn config_fingerprint(config: &ExtractorConfig) -> ModernizeResult<String> {
    Ok(sha256_hex(&serde_json::to_vec(config)?))
}

/// Load a directory and build its facts.
///
/// Unreadable files end up as project diagnostics. With a cache, each file
/// is looked up by its absolute path and mtime before extraction, so
/// projects sharing a cache directory never share entries.
pub fn analyze_directory(
    root: &Path,
    sources: &SourceConfig,
    config: &ExtractorConfig,
    cache: Option<&FactsCache>,
) -> ModernizeResult<ProjectFacts> {
    let loaded = load_sources(root, sources)?;
    debug!(
        root = %loaded.root.display(),
        files = loaded.files.len(),
        unreadable = loaded.diagnostics.len(),
        "loaded sources"
    );

    let units: Vec<UnitFacts> = loaded
        .files
        .par_iter()
        .map(|file| {
            let extract = || extract_unit(&file.path, &file.text, config);
            match cache {
                Some(cache) => {
                    let key = loaded.root.join(&file.path);
                    cache.get_or_extract(&key.to_string_lossy(), file.mtime, extract)
                }
                None => extract(),
            }
        })
        .collect();
    Ok(ProjectFacts::assemble(units, loaded.diagnostics))
}
