//! Explicit configuration values for extraction, mapping and comparison.
//!
//! Every tunable threshold and keyword table lives here as a plain value that
//! callers thread into the entry points. Nothing reads global state.
//!
//! ## Layering
//!
//! [`ResolvedConfig::resolve`] builds the CLI configuration with recorded
//! provenance. Precedence, highest first:
//!
//! 1. CLI flags
//! 2. Environment variables (`MODERNIZE_COVERAGE_THRESHOLD`,
//!    `MODERNIZE_MIN_CONFIDENCE`, `MODERNIZE_SIMILARITY_FLOOR`)
//! 3. JSON config file (`--config`)
//! 4. Defaults
//!
//! ## Thresholds
//!
//! | Constant | Default | Used by |
//! |----------|---------|---------|
//! | [`SIMILARITY_FLOOR`] | 0.7 | comparator name similarity |
//! | [`MIN_CONFIDENCE`] | 0.3 | comparator edge acceptance |
//! | [`COVERAGE_THRESHOLD`] | 75.0 | coverage validation rule |
//!
//! These carry no documented derivation; they are defaults, not optima.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ModernizeError, ModernizeResult};

/// Minimum character-aligned similarity ratio for a fuzzy name match.
pub const SIMILARITY_FLOOR: f64 = 0.7;

/// Minimum confidence for a correspondence edge.
pub const MIN_CONFIDENCE: f64 = 0.3;

/// Overall coverage percentage required for the coverage rule to pass.
pub const COVERAGE_THRESHOLD: f64 = 75.0;

/// Coverage below which a high-priority recommendation is raised.
pub const RECOMMENDATION_COVERAGE: f64 = 80.0;

/// Environment variable overriding [`ComparatorConfig::coverage_threshold`].
pub const ENV_COVERAGE_THRESHOLD: &str = "MODERNIZE_COVERAGE_THRESHOLD";
/// Environment variable overriding [`ComparatorConfig::min_confidence`].
pub const ENV_MIN_CONFIDENCE: &str = "MODERNIZE_MIN_CONFIDENCE";
/// Environment variable overriding [`ComparatorConfig::similarity_floor`].
pub const ENV_SIMILARITY_FLOOR: &str = "MODERNIZE_SIMILARITY_FLOOR";

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

// ============================================================================
// Extractor
// ============================================================================

/// Marker tables used by the structural extractors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Supertypes that make a class form-like.
    pub form_supertypes: Vec<String>,
    /// Supertypes that make a class a data module.
    pub data_module_supertypes: Vec<String>,
    /// Dataset, query and connection component types.
    pub dataset_component_types: Vec<String>,
    /// Dataset methods recorded as data-access calls.
    pub dataset_methods: Vec<String>,
    /// Transaction-control methods.
    pub transaction_methods: Vec<String>,
    /// File-name tokens marking a service unit.
    pub service_filename_tokens: Vec<String>,
    /// File-name tokens marking a utility unit.
    pub utility_filename_tokens: Vec<String>,
    /// Routine-name suffixes marking an event handler.
    pub event_handler_suffixes: Vec<String>,
    /// Deepest routine or type nesting followed before the rest of a
    /// construct is read flat.
    pub max_nesting_depth: usize,
}

/// Default for [`ExtractorConfig::max_nesting_depth`].
pub const DEFAULT_MAX_NESTING_DEPTH: usize = 64;

impl Default for ExtractorConfig {
    fn default() -> Self {
        ExtractorConfig {
            form_supertypes: strings(&["TForm", "TFrame", "TCustomForm"]),
            data_module_supertypes: strings(&["TDataModule"]),
            dataset_component_types: strings(&[
                "TQuery",
                "TTable",
                "TStoredProc",
                "TDatabase",
                "TADOQuery",
                "TADOTable",
                "TADOConnection",
                "TADOStoredProc",
                "TFDQuery",
                "TFDTable",
                "TFDConnection",
                "TFDStoredProc",
                "TIBQuery",
                "TIBTable",
                "TIBDatabase",
                "TSQLQuery",
                "TSQLConnection",
                "TClientDataSet",
                "TDataSource",
            ]),
            dataset_methods: strings(&[
                "Open", "Close", "ExecSQL", "Post", "Edit", "Insert", "Append", "Delete",
                "Refresh", "ApplyUpdates",
            ]),
            transaction_methods: strings(&[
                "StartTransaction",
                "BeginTrans",
                "Commit",
                "CommitTrans",
                "Rollback",
                "RollbackTrans",
            ]),
            service_filename_tokens: strings(&["service", "servico", "manager"]),
            utility_filename_tokens: strings(&["util", "utils", "helper", "funcoes", "lib"]),
            event_handler_suffixes: strings(&[
                "Click", "DblClick", "Change", "Enter", "Exit", "KeyPress", "KeyDown", "KeyUp",
                "Show", "Create", "Destroy",
            ]),
            max_nesting_depth: DEFAULT_MAX_NESTING_DEPTH,
        }
    }
}

impl ExtractorConfig {
    /// True when `type_name` is one of the form-like supertypes.
    pub fn is_form_supertype(&self, type_name: &str) -> bool {
        contains_ignore_case(&self.form_supertypes, type_name)
    }

    /// True when `type_name` is one of the data-module supertypes.
    pub fn is_data_module_supertype(&self, type_name: &str) -> bool {
        contains_ignore_case(&self.data_module_supertypes, type_name)
    }

    /// True when `type_name` is a dataset/query/connection component type.
    pub fn is_dataset_component(&self, type_name: &str) -> bool {
        contains_ignore_case(&self.dataset_component_types, type_name)
    }

    /// True when a routine named `name` looks like an event handler.
    pub fn is_event_handler(&self, name: &str) -> bool {
        let lower = name.to_ascii_lowercase();
        self.event_handler_suffixes.iter().any(|suffix| {
            let suffix = suffix.to_ascii_lowercase();
            lower.len() > suffix.len() && lower.ends_with(&suffix)
        })
    }
}

fn contains_ignore_case(list: &[String], item: &str) -> bool {
    list.iter().any(|s| s.eq_ignore_ascii_case(item))
}

// ============================================================================
// Mapper
// ============================================================================

/// Classification keywords, naming rules and scoring thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapperConfig {
    /// Routine name fragments meaning validation.
    pub validation_keywords: Vec<String>,
    /// Routine name fragments meaning computation.
    pub computation_keywords: Vec<String>,
    /// Routine name fragments meaning a UI event.
    pub ui_event_keywords: Vec<String>,
    /// Class name fragments meaning data/model.
    pub data_keywords: Vec<String>,
    /// Class name fragments meaning orchestration.
    pub orchestration_keywords: Vec<String>,
    /// Leading characters stripped when followed by an uppercase letter.
    pub type_prefix_chars: String,
    /// Leading role prefixes stripped when followed by an uppercase letter.
    pub role_prefixes: Vec<String>,
    /// Trailing role suffixes stripped before the canonical suffix is added.
    pub role_suffixes: Vec<String>,
    /// Parameter count past which routine complexity gets +1.
    pub param_low_threshold: usize,
    /// Parameter count past which routine complexity gets another +1.
    pub param_high_threshold: usize,
    /// Method count past which class complexity gets +1.
    pub method_low_threshold: usize,
    /// Method count past which class complexity gets another +1.
    pub method_high_threshold: usize,
    /// Property count past which class complexity gets +1.
    pub property_threshold: usize,
    /// Return types that add +1 to routine complexity.
    pub complex_return_types: Vec<String>,
    /// Fixed score of form-like classes.
    pub form_complexity: u8,
    /// Fixed score of data modules.
    pub data_module_complexity: u8,
    /// Complexity at or above which a component is high complexity.
    pub high_complexity: u8,
    /// Weeks per low-complexity component (score <= 2).
    pub effort_low_weeks: f64,
    /// Weeks per medium-complexity component (score 3).
    pub effort_medium_weeks: f64,
    /// Weeks per high-complexity component (score >= 4).
    pub effort_high_weeks: f64,
}

impl Default for MapperConfig {
    fn default() -> Self {
        MapperConfig {
            validation_keywords: strings(&["validate", "valida", "check", "verify", "verifica"]),
            computation_keywords: strings(&[
                "calculate",
                "calcula",
                "compute",
                "process",
                "processa",
            ]),
            ui_event_keywords: strings(&[
                "click", "button", "btn", "event", "change", "keypress", "keydown", "keyup",
            ]),
            data_keywords: strings(&["data", "entity", "model", "dto", "dados"]),
            orchestration_keywords: strings(&["service", "manager", "servico", "gerenciador"]),
            type_prefix_chars: "T".to_string(),
            role_prefixes: strings(&["datamodule", "form", "frm", "dm", "btn"]),
            role_suffixes: strings(&[
                "DataModule",
                "Form",
                "Frm",
                "DM",
                "Click",
                "Handler",
                "Event",
                "Unit",
            ]),
            param_low_threshold: 2,
            param_high_threshold: 5,
            method_low_threshold: 5,
            method_high_threshold: 10,
            property_threshold: 10,
            complex_return_types: strings(&["Variant", "OleVariant", "Pointer"]),
            form_complexity: 3,
            data_module_complexity: 4,
            high_complexity: 4,
            effort_low_weeks: 0.5,
            effort_medium_weeks: 1.0,
            effort_high_weeks: 2.0,
        }
    }
}

// ============================================================================
// Comparator
// ============================================================================

/// Matching thresholds, normalization lists and the type table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComparatorConfig {
    /// See [`SIMILARITY_FLOOR`].
    pub similarity_floor: f64,
    /// See [`MIN_CONFIDENCE`].
    pub min_confidence: f64,
    /// See [`COVERAGE_THRESHOLD`].
    pub coverage_threshold: f64,
    /// See [`RECOMMENDATION_COVERAGE`].
    pub recommendation_coverage: f64,
    /// Prefixes stripped (one, case-insensitive) during name normalization.
    pub normalize_prefixes: Vec<String>,
    /// Suffixes stripped (one, case-insensitive) during name normalization.
    pub normalize_suffixes: Vec<String>,
    /// Role prefixes stripped from class names (`frm`, `dm`, ...).
    pub class_prefixes: Vec<String>,
    /// Role suffixes stripped from class names (`Form`, `Controller`, ...).
    pub class_suffixes: Vec<String>,
    /// Lowercase type name to canonical lowercase type name.
    pub type_equivalences: BTreeMap<String, String>,
}

impl Default for ComparatorConfig {
    fn default() -> Self {
        let type_equivalences = [
            ("string", "string"),
            ("ansistring", "string"),
            ("widestring", "string"),
            ("unicodestring", "string"),
            ("char", "char"),
            ("character", "char"),
            ("integer", "integer"),
            ("int", "integer"),
            ("longint", "integer"),
            ("smallint", "integer"),
            ("cardinal", "integer"),
            ("int64", "long"),
            ("long", "long"),
            ("boolean", "boolean"),
            ("bool", "boolean"),
            ("double", "double"),
            ("real", "double"),
            ("extended", "double"),
            ("single", "float"),
            ("float", "float"),
            ("currency", "bigdecimal"),
            ("bigdecimal", "bigdecimal"),
            ("tdatetime", "localdatetime"),
            ("localdatetime", "localdatetime"),
            ("tdate", "localdate"),
            ("localdate", "localdate"),
            ("void", "void"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        ComparatorConfig {
            similarity_floor: SIMILARITY_FLOOR,
            min_confidence: MIN_CONFIDENCE,
            coverage_threshold: COVERAGE_THRESHOLD,
            recommendation_coverage: RECOMMENDATION_COVERAGE,
            normalize_prefixes: strings(&[
                "btn", "frm", "get", "set", "create", "delete", "update",
            ]),
            normalize_suffixes: strings(&["click", "handler", "action", "event", "method"]),
            class_prefixes: strings(&["datamodule", "form", "frm", "dm"]),
            class_suffixes: strings(&[
                "datamodule",
                "controller",
                "repository",
                "service",
                "entity",
                "impl",
                "form",
                "frm",
                "dm",
            ]),
            type_equivalences,
        }
    }
}

impl ComparatorConfig {
    /// Canonical lowercase form of a type name under the equivalence table.
    pub fn canonical_type(&self, type_name: &str) -> String {
        let lower = type_name.trim().to_ascii_lowercase();
        self.type_equivalences
            .get(&lower)
            .cloned()
            .unwrap_or(lower)
    }

    /// Check the numeric ranges.
    pub fn validate(&self) -> ModernizeResult<()> {
        check_unit_interval("similarity_floor", self.similarity_floor)?;
        check_unit_interval("min_confidence", self.min_confidence)?;
        check_percentage("coverage_threshold", self.coverage_threshold)?;
        check_percentage("recommendation_coverage", self.recommendation_coverage)
    }
}

fn check_unit_interval(name: &str, value: f64) -> ModernizeResult<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ModernizeError::invalid_args(format!(
            "{name} must be within 0..=1, got {value}"
        )))
    }
}

fn check_percentage(name: &str, value: f64) -> ModernizeResult<()> {
    if (0.0..=100.0).contains(&value) {
        Ok(())
    } else {
        Err(ModernizeError::invalid_args(format!(
            "{name} must be within 0..=100, got {value}"
        )))
    }
}

// ============================================================================
// Bundle
// ============================================================================

/// All configuration of one analysis run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub extractor: ExtractorConfig,
    pub mapper: MapperConfig,
    pub comparator: ComparatorConfig,
}

impl AnalysisConfig {
    /// Load a (possibly partial) JSON config file; missing keys keep defaults.
    pub fn from_json_file(path: &Path) -> ModernizeResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            ModernizeError::invalid_args(format!("cannot read config {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&text).map_err(|e| {
            ModernizeError::invalid_args(format!("malformed config {}: {}", path.display(), e))
        })
    }
}

// ============================================================================
// Configuration Sources
// ============================================================================

/// Configuration value source (for precedence tracking).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigSource {
    /// Built-in default value.
    Default = 0,
    /// From the `--config` JSON file.
    ConfigFile = 1,
    /// From environment variable.
    EnvVar = 2,
    /// From CLI flag (highest precedence).
    CliFlag = 3,
}

/// A configuration value with its source.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigValue<T> {
    /// The actual value.
    pub value: T,
    /// Where the value came from.
    pub source: ConfigSource,
}

impl<T> ConfigValue<T> {
    /// Create a new config value with the given source.
    pub fn new(value: T, source: ConfigSource) -> Self {
        ConfigValue { value, source }
    }

    /// Merge with another value, preferring higher precedence.
    pub fn merge(self, other: Self) -> Self {
        if other.source >= self.source {
            other
        } else {
            self
        }
    }
}

// ============================================================================
// Configuration Resolution
// ============================================================================

/// CLI configuration overrides.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    /// --coverage-threshold flag.
    pub coverage_threshold: Option<f64>,
    /// --min-confidence flag.
    pub min_confidence: Option<f64>,
    /// --similarity-floor flag.
    pub similarity_floor: Option<f64>,
}

/// Resolved configuration with precedence information.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Tables and thresholds from defaults and the config file.
    pub base: AnalysisConfig,
    pub coverage_threshold: ConfigValue<f64>,
    pub min_confidence: ConfigValue<f64>,
    pub similarity_floor: ConfigValue<f64>,
}

impl ResolvedConfig {
    /// Resolve configuration from all sources, reading the process environment.
    pub fn resolve(config_file: Option<&Path>, cli: &CliOverrides) -> ModernizeResult<Self> {
        Self::resolve_with_env(config_file, cli, |key| std::env::var(key).ok())
    }

    /// Resolve configuration with an explicit environment lookup.
    pub fn resolve_with_env(
        config_file: Option<&Path>,
        cli: &CliOverrides,
        env: impl Fn(&str) -> Option<String>,
    ) -> ModernizeResult<Self> {
        let mut config = Self::defaults();
        if let Some(path) = config_file {
            config.apply_config_file(AnalysisConfig::from_json_file(path)?);
        }
        config.apply_env_vars(env)?;
        config.apply_cli_overrides(cli);
        config.to_analysis_config().comparator.validate()?;
        Ok(config)
    }

    fn defaults() -> Self {
        let base = AnalysisConfig::default();
        let value = |v| ConfigValue::new(v, ConfigSource::Default);
        ResolvedConfig {
            coverage_threshold: value(base.comparator.coverage_threshold),
            min_confidence: value(base.comparator.min_confidence),
            similarity_floor: value(base.comparator.similarity_floor),
            base,
        }
    }

    fn apply_config_file(&mut self, file: AnalysisConfig) {
        let value = |v| ConfigValue::new(v, ConfigSource::ConfigFile);
        self.coverage_threshold = value(file.comparator.coverage_threshold);
        self.min_confidence = value(file.comparator.min_confidence);
        self.similarity_floor = value(file.comparator.similarity_floor);
        self.base = file;
    }

    fn apply_env_vars(&mut self, env: impl Fn(&str) -> Option<String>) -> ModernizeResult<()> {
        let parse = |key: &str| -> ModernizeResult<Option<ConfigValue<f64>>> {
            match env(key) {
                None => Ok(None),
                Some(raw) => raw
                    .trim()
                    .parse::<f64>()
                    .map(|v| Some(ConfigValue::new(v, ConfigSource::EnvVar)))
                    .map_err(|_| {
                        ModernizeError::invalid_args(format!("{key} is not a number: {raw:?}"))
                    }),
            }
        };
        if let Some(v) = parse(ENV_COVERAGE_THRESHOLD)? {
            self.coverage_threshold = self.coverage_threshold.clone().merge(v);
        }
        if let Some(v) = parse(ENV_MIN_CONFIDENCE)? {
            self.min_confidence = self.min_confidence.clone().merge(v);
        }
        if let Some(v) = parse(ENV_SIMILARITY_FLOOR)? {
            self.similarity_floor = self.similarity_floor.clone().merge(v);
        }
        Ok(())
    }

    fn apply_cli_overrides(&mut self, overrides: &CliOverrides) {
        if let Some(v) = overrides.coverage_threshold {
            self.coverage_threshold = ConfigValue::new(v, ConfigSource::CliFlag);
        }
        if let Some(v) = overrides.min_confidence {
            self.min_confidence = ConfigValue::new(v, ConfigSource::CliFlag);
        }
        if let Some(v) = overrides.similarity_floor {
            self.similarity_floor = ConfigValue::new(v, ConfigSource::CliFlag);
        }
    }

    /// The effective configuration passed to the entry points.
    pub fn to_analysis_config(&self) -> AnalysisConfig {
        let mut config = self.base.clone();
        config.comparator.coverage_threshold = self.coverage_threshold.value;
        config.comparator.min_confidence = self.min_confidence.value;
        config.comparator.similarity_floor = self.similarity_floor.value;
        config
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    mod default_tests {
        use super::*;

        #[test]
        fn named_thresholds_are_defaults() {
            let config = ComparatorConfig::default();
            assert_eq!(config.similarity_floor, SIMILARITY_FLOOR);
            assert_eq!(config.min_confidence, MIN_CONFIDENCE);
            assert_eq!(config.coverage_threshold, COVERAGE_THRESHOLD);
            assert!(config.validate().is_ok());
        }

        #[test]
        fn type_table_canonicalizes() {
            let config = ComparatorConfig::default();
            assert_eq!(config.canonical_type("TDateTime"), "localdatetime");
            assert_eq!(config.canonical_type("LocalDateTime"), "localdatetime");
            assert_eq!(config.canonical_type("Integer"), "integer");
            assert_eq!(config.canonical_type("TCliente"), "tcliente");
        }

        #[test]
        fn event_handler_suffixes() {
            let config = ExtractorConfig::default();
            assert!(config.is_event_handler("btnSalvarClick"));
            assert!(config.is_event_handler("edtNomeExit"));
            assert!(!config.is_event_handler("Click"));
            assert!(!config.is_event_handler("CalcularTotal"));
        }

        #[test]
        fn partial_json_keeps_defaults() {
            let config: AnalysisConfig =
                serde_json::from_str(r#"{"comparator": {"coverage_threshold": 90.0}}"#).unwrap();
            assert_eq!(config.comparator.coverage_threshold, 90.0);
            assert_eq!(config.comparator.min_confidence, MIN_CONFIDENCE);
            assert_eq!(config.mapper.form_complexity, 3);
        }
    }

    mod resolve_tests {
        use super::*;

        #[test]
        fn defaults_when_nothing_set() {
            let config =
                ResolvedConfig::resolve_with_env(None, &CliOverrides::default(), env_of(&[]))
                    .unwrap();
            assert_eq!(config.coverage_threshold.source, ConfigSource::Default);
            assert_eq!(config.to_analysis_config(), AnalysisConfig::default());
        }

        #[test]
        fn env_overrides_file_and_cli_overrides_env() {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("modernize.json");
            std::fs::write(
                &path,
                r#"{"comparator": {"coverage_threshold": 60.0, "min_confidence": 0.4}}"#,
            )
            .unwrap();

            let cli = CliOverrides {
                min_confidence: Some(0.5),
                ..Default::default()
            };
            let config = ResolvedConfig::resolve_with_env(
                Some(&path),
                &cli,
                env_of(&[(ENV_COVERAGE_THRESHOLD, "70"), (ENV_MIN_CONFIDENCE, "0.45")]),
            )
            .unwrap();

            assert_eq!(config.coverage_threshold.value, 70.0);
            assert_eq!(config.coverage_threshold.source, ConfigSource::EnvVar);
            assert_eq!(config.min_confidence.value, 0.5);
            assert_eq!(config.min_confidence.source, ConfigSource::CliFlag);
            assert_eq!(config.similarity_floor.source, ConfigSource::ConfigFile);
        }

        #[test]
        fn non_numeric_env_is_invalid_arguments() {
            let err = ResolvedConfig::resolve_with_env(
                None,
                &CliOverrides::default(),
                env_of(&[(ENV_SIMILARITY_FLOOR, "high")]),
            )
            .unwrap_err();
            assert!(matches!(err, ModernizeError::InvalidArguments { .. }));
        }

        #[test]
        fn out_of_range_cli_value_rejected() {
            let cli = CliOverrides {
                coverage_threshold: Some(120.0),
                ..Default::default()
            };
            let err = ResolvedConfig::resolve_with_env(None, &cli, env_of(&[])).unwrap_err();
            assert!(err.to_string().contains("coverage_threshold"));
        }

        #[test]
        fn merge_prefers_higher_precedence() {
            let low = ConfigValue::new(1.0, ConfigSource::ConfigFile);
            let high = ConfigValue::new(2.0, ConfigSource::CliFlag);
            assert_eq!(low.clone().merge(high.clone()).value, 2.0);
            assert_eq!(high.merge(low).value, 2.0);
        }
    }
}
