//! Directory loading: the caller-boundary I/O that feeds the extractors.
//!
//! Extraction itself never touches the filesystem. This module walks a
//! project directory once and returns every source file's text in memory:
//! - Deterministic ordering (sorted by relative path, forward slashes)
//! - Language filter by extension
//! - Default VCS/build directory exclusions plus user glob patterns
//! - Lossy decoding, since legacy sources are rarely valid UTF-8
//! - Unreadable files become [`Diagnostic`]s, never a failed batch

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{ModernizeError, ModernizeResult};
use crate::facts::{Diagnostic, Language};

// ============================================================================
// Language Detection
// ============================================================================

impl Language {
    /// Detect the language from a file extension (case-insensitive).
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("pas" | "dpr" | "dpk" | "lpr" | "pp") => Language::Pascal,
            Some("java") => Language::Java,
            _ => Language::Unknown,
        }
    }

    /// File extensions recognized for this language.
    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            Language::Pascal => &["pas", "dpr", "dpk", "lpr", "pp"],
            Language::Java => &["java"],
            Language::Unknown => &[],
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Language::Pascal => write!(f, "pascal"),
            Language::Java => write!(f, "java"),
            Language::Unknown => write!(f, "unknown"),
        }
    }
}

// ============================================================================
// Source Files
// ============================================================================

/// One source file loaded into memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Relative path from the project root (always forward slashes).
    pub path: String,
    /// Decoded text.
    pub text: String,
    /// Detected language.
    pub language: Language,
    /// File size in bytes.
    pub size_bytes: u64,
    /// File modification time (cache key component).
    pub mtime: Option<SystemTime>,
}

/// Configuration for [`load_sources`].
#[derive(Debug, Clone, Default)]
pub struct SourceConfig {
    /// Languages to include (empty = all supported languages).
    pub languages: Vec<Language>,
    /// Glob patterns, relative to the root, to exclude (in addition to defaults).
    pub exclude_patterns: Vec<String>,
    /// Whether to follow symlinks.
    pub follow_symlinks: bool,
    /// Maximum file size to include (bytes). Larger files are skipped.
    pub max_file_size: Option<u64>,
}

impl SourceConfig {
    /// Create a new config for a specific language.
    pub fn for_language(language: Language) -> Self {
        SourceConfig {
            languages: vec![language],
            ..Default::default()
        }
    }

    /// Add an exclude pattern.
    pub fn exclude(mut self, pattern: &str) -> Self {
        self.exclude_patterns.push(pattern.to_string());
        self
    }

    fn accepts(&self, language: Language) -> bool {
        if language == Language::Unknown {
            return false;
        }
        self.languages.is_empty() || self.languages.contains(&language)
    }
}

/// Result of loading a directory.
#[derive(Debug, Clone, Default)]
pub struct LoadedSources {
    /// Canonical project root.
    pub root: PathBuf,
    /// Files sorted by path.
    pub files: Vec<SourceFile>,
    /// One entry per file or directory that could not be read.
    pub diagnostics: Vec<Diagnostic>,
}

// ============================================================================
// Default Exclusion Patterns
// ============================================================================

/// Default directories to exclude from a project walk.
const DEFAULT_EXCLUDE_DIRS: &[&str] = &[
    ".git",
    ".hg",
    ".svn",
    "__history",
    "__recovery",
    "node_modules",
    "target",
    "build",
    "dist",
    "out",
    ".idea",
    ".vscode",
    ".gradle",
    ".mvn",
    "Win32",
    "Win64",
    ".modernize-cache",
];

/// Check if a path should be excluded based on default patterns.
fn should_exclude(path: &Path) -> bool {
    path.components().any(|component| match component {
        std::path::Component::Normal(name) => {
            let name = name.to_string_lossy();
            DEFAULT_EXCLUDE_DIRS.iter().any(|pattern| name == *pattern)
        }
        _ => false,
    })
}

/// Build a GlobSet from a list of pattern strings.
fn build_glob_set(patterns: &[String]) -> ModernizeResult<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).map_err(|e| {
            ModernizeError::invalid_args(format!("invalid exclude pattern '{pattern}': {e}"))
        })?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| ModernizeError::invalid_args(format!("invalid exclude patterns: {e}")))
}

/// Decode file bytes, dropping a UTF-8 BOM and replacing invalid sequences.
pub fn decode_lossy(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

// ============================================================================
// Loading
// ============================================================================

/// Load every supported source file below `root`.
///
/// Fails only when `root` itself is unusable or an exclude pattern is
/// invalid. Per-file failures are recorded in
/// [`LoadedSources::diagnostics`].
pub fn load_sources(root: &Path, config: &SourceConfig) -> ModernizeResult<LoadedSources> {
    if !root.is_dir() {
        return Err(ModernizeError::input(
            root.display().to_string(),
            "not a readable directory",
        ));
    }
    let root = root
        .canonicalize()
        .map_err(|e| ModernizeError::input(root.display().to_string(), e.to_string()))?;
    let excludes = build_glob_set(&config.exclude_patterns)?;

    let mut files = Vec::new();
    let mut diagnostics = Vec::new();

    for entry in WalkDir::new(&root)
        .follow_links(config.follow_symlinks)
        .into_iter()
        .filter_entry(|e| {
            e.depth() == 0 || !should_exclude(e.path().strip_prefix(&root).unwrap_or(e.path()))
        })
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                let path = err
                    .path()
                    .map(|p| relative_str(&root, p))
                    .unwrap_or_default();
                warn!(path = %path, error = %err, "skipping unreadable entry");
                diagnostics.push(Diagnostic::input_error(path, err.to_string()));
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let relative = relative_str(&root, entry.path());
        let language = Language::from_path(entry.path());
        if !config.accepts(language) || excludes.is_match(&relative) {
            continue;
        }

        let metadata = match entry.metadata() {
            Ok(m) => m,
            Err(err) => {
                warn!(path = %relative, error = %err, "skipping file without metadata");
                diagnostics.push(Diagnostic::input_error(relative, err.to_string()));
                continue;
            }
        };
        if config.max_file_size.is_some_and(|max| metadata.len() > max) {
            debug!(path = %relative, size = metadata.len(), "skipping oversized file");
            continue;
        }

        match fs::read(entry.path()) {
            Ok(bytes) => files.push(SourceFile {
                text: decode_lossy(&bytes),
                path: relative,
                language,
                size_bytes: metadata.len(),
                mtime: metadata.modified().ok(),
            }),
            Err(err) => {
                warn!(path = %relative, error = %err, "skipping unreadable file");
                diagnostics.push(Diagnostic::input_error(relative, err.to_string()));
            }
        }
    }

    files.sort_by(|a, b| a.path.cmp(&b.path));
    debug!(root = %root.display(), files = files.len(), "loaded sources");

    Ok(LoadedSources {
        root,
        files,
        diagnostics,
    })
}

/// Forward-slash path of `path` relative to `root`.
fn relative_str(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace(std::path::MAIN_SEPARATOR, "/")
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(dir: &Path, relative: &str, content: &[u8]) {
        let path = dir.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    /// Create a small mixed project.
    fn create_test_project() -> TempDir {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "src/uClientes.pas", b"unit uClientes;\n");
        write(dir.path(), "src/Projeto.dpr", b"program Projeto;\n");
        write(dir.path(), "java/App.java", b"class App {}\n");
        write(dir.path(), "README.md", b"# docs\n");
        write(dir.path(), ".git/hooks/x.pas", b"unit x;\n");
        write(dir.path(), "__history/uClientes.pas.~1~", b"old\n");
        write(dir.path(), "gen/Generated.java", b"class Generated {}\n");
        dir
    }

    mod language_tests {
        use super::*;

        #[test]
        fn detection_by_extension() {
            assert_eq!(Language::from_path(Path::new("a/Main.PAS")), Language::Pascal);
            assert_eq!(Language::from_path(Path::new("Projeto.dpr")), Language::Pascal);
            assert_eq!(Language::from_path(Path::new("App.java")), Language::Java);
            assert_eq!(Language::from_path(Path::new("form.dfm")), Language::Unknown);
            assert_eq!(Language::Pascal.to_string(), "pascal");
        }
    }

    mod load_tests {
        use super::*;

        #[test]
        fn files_sorted_and_filtered() {
            let dir = create_test_project();
            let loaded = load_sources(dir.path(), &SourceConfig::default()).unwrap();
            let paths: Vec<_> = loaded.files.iter().map(|f| f.path.as_str()).collect();
            assert_eq!(
                paths,
                vec![
                    "gen/Generated.java",
                    "java/App.java",
                    "src/Projeto.dpr",
                    "src/uClientes.pas"
                ]
            );
            assert!(loaded.diagnostics.is_empty());
        }

        #[test]
        fn language_filter_and_globs() {
            let dir = create_test_project();
            let config = SourceConfig::for_language(Language::Java).exclude("gen/**");
            let loaded = load_sources(dir.path(), &config).unwrap();
            let paths: Vec<_> = loaded.files.iter().map(|f| f.path.as_str()).collect();
            assert_eq!(paths, vec!["java/App.java"]);
        }

        #[test]
        fn invalid_utf8_decoded_lossily() {
            let dir = TempDir::new().unwrap();
            write(dir.path(), "Acentos.pas", b"\xEF\xBB\xBFunit Acentos; // a\xE7\xE3o\n");
            let loaded = load_sources(dir.path(), &SourceConfig::default()).unwrap();
            assert!(loaded.files[0].text.starts_with("unit Acentos;"));
            assert!(loaded.files[0].text.contains('\u{FFFD}'));
            assert!(loaded.files[0].mtime.is_some());
        }

        #[test]
        fn missing_root_is_input_error() {
            let dir = TempDir::new().unwrap();
            let err = load_sources(&dir.path().join("nope"), &SourceConfig::default()).unwrap_err();
            assert!(matches!(err, ModernizeError::InputError { .. }));
        }

        #[test]
        fn bad_glob_is_invalid_arguments() {
            let dir = create_test_project();
            let config = SourceConfig::default().exclude("[");
            let err = load_sources(dir.path(), &config).unwrap_err();
            assert!(matches!(err, ModernizeError::InvalidArguments { .. }));
        }
    }
}
