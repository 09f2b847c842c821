//! CLI command implementations.
//!
//! Each `run_*` function performs one command and returns its response
//! envelope; `main.rs` only parses arguments, calls these and emits the
//! result. Keeping the commands here lets the integration tests drive them
//! without spawning the binary.
//!
//! ## Error Handling
//!
//! All functions return `ModernizeResult<T>`. Per-file problems never reach
//! this layer as errors; they travel inside the facts as diagnostics.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use modernize_core::cache::{FactsCache, DEFAULT_CACHE_DIR};
use modernize_core::config::{AnalysisConfig, ExtractorConfig};
use modernize_core::error::ModernizeResult;
use modernize_core::facts::ProjectFacts;
use modernize_core::output::{CacheCleanResponse, CompareResponse, FactsResponse, PlanResponse};
use modernize_core::workspace::SourceConfig;

use crate::{analyze_directory, compare_projects, config_fingerprint, plan_migration};

/// Where (and whether) extracted facts are cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheMode {
    Disabled,
    Dir(PathBuf),
}

impl CacheMode {
    /// `--no-cache` wins over `--cache-dir`; the default directory otherwise.
    pub fn from_flags(cache_dir: Option<PathBuf>, no_cache: bool) -> Self {
        if no_cache {
            CacheMode::Disabled
        } else {
            CacheMode::Dir(cache_dir.unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE_DIR)))
        }
    }

    /// Open the cache for an extractor configuration.
    pub fn open(&self, config: &ExtractorConfig) -> ModernizeResult<Option<FactsCache>> {
        match self {
            CacheMode::Disabled => Ok(None),
            CacheMode::Dir(dir) => {
                let cache = FactsCache::open(dir, config_fingerprint(config)?)?;
                debug!(dir = %dir.display(), "facts cache enabled");
                Ok(Some(cache))
            }
        }
    }
}

fn load(root: &Path, config: &AnalysisConfig, cache: &CacheMode) -> ModernizeResult<ProjectFacts> {
    let cache = cache.open(&config.extractor)?;
    let facts = analyze_directory(root, &SourceConfig::default(), &config.extractor, cache.as_ref())?;
    info!(
        root = %root.display(),
        units = facts.units.len(),
        diagnostics = facts.diagnostics.len(),
        "analyzed directory"
    );
    Ok(facts)
}

/// `facts <DIR>`
pub fn run_facts(root: &Path, config: &AnalysisConfig, cache: &CacheMode) -> ModernizeResult<FactsResponse> {
    let facts = load(root, config, cache)?;
    Ok(FactsResponse::new(root.display().to_string(), facts))
}

/// `plan <DIR>`
pub fn run_plan(root: &Path, config: &AnalysisConfig, cache: &CacheMode) -> ModernizeResult<PlanResponse> {
    let facts = load(root, config, cache)?;
    let plan = plan_migration(&facts, &config.mapper)?;
    Ok(PlanResponse::new(
        root.display().to_string(),
        facts.diagnostics.len(),
        plan,
    ))
}

/// `compare <SOURCE_DIR> <TARGET_DIR>`
pub fn run_compare(
    source_root: &Path,
    target_root: &Path,
    config: &AnalysisConfig,
    cache: &CacheMode,
) -> ModernizeResult<CompareResponse> {
    let source = load(source_root, config, cache)?;
    let target = load(target_root, config, cache)?;
    let report = compare_projects(&source, &target, &config.comparator)?;
    Ok(CompareResponse::new(
        source_root.display().to_string(),
        target_root.display().to_string(),
        report,
    ))
}

/// `cache clean`
pub fn run_cache_clean(cache: &CacheMode, config: &ExtractorConfig) -> ModernizeResult<CacheCleanResponse> {
    let Some(cache) = cache.open(config)? else {
        return Ok(CacheCleanResponse::new("", 0));
    };
    let removed = cache.clean()?;
    info!(dir = %cache.dir().display(), removed, "cache cleaned");
    Ok(CacheCleanResponse::new(cache.dir().display().to_string(), removed))
}
