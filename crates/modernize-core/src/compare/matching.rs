//! Candidate scoring for correspondence edges.
//!
//! Confidence is a fixed weighted sum of match signals, divided by 100 and
//! clamped to `[0, 1]`:
//!
//! | Signal | Points |
//! |--------|--------|
//! | exact case-insensitive name | 50 |
//! | else equal normalized names | 30 |
//! | else similarity ratio `r` above the floor | `30 * r` |
//! | equal parameter count | 30 |
//! | parameter count off by one | 10 |
//! | equivalent return types (both present) | 20 |
//!
//! A pair without any name signal is never a candidate, whatever its
//! signature.

use crate::config::ComparatorConfig;
use crate::facts::{ClassFacts, RoutineFacts};

pub const EXACT_NAME_POINTS: f64 = 50.0;
pub const NORMALIZED_NAME_POINTS: f64 = 30.0;
pub const SIMILAR_NAME_POINTS: f64 = 30.0;
pub const PARAM_EQUAL_POINTS: f64 = 30.0;
pub const PARAM_NEAR_POINTS: f64 = 10.0;
pub const RETURN_TYPE_POINTS: f64 = 20.0;

/// A comparable source or target entity.
#[derive(Debug, Clone, PartialEq)]
pub struct Entity<'a> {
    pub name: &'a str,
    pub unit: &'a str,
    /// Parameter count; `None` for classes.
    pub arity: Option<usize>,
    pub return_type: Option<&'a str>,
    /// Normalized lowercase name.
    pub key: String,
}

impl<'a> Entity<'a> {
    pub fn routine(routine: &'a RoutineFacts, unit: &'a str, config: &ComparatorConfig) -> Self {
        Entity {
            name: &routine.name,
            unit,
            arity: Some(routine.arity()),
            return_type: routine.return_type.as_deref(),
            key: routine_key(&routine.name, config),
        }
    }

    pub fn class(class: &'a ClassFacts, unit: &'a str, config: &ComparatorConfig) -> Self {
        Entity {
            name: &class.name,
            unit,
            arity: None,
            return_type: None,
            key: class_key(&class.name, config),
        }
    }
}

/// A scored target for one source entity.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate<'a> {
    pub target: &'a Entity<'a>,
    pub confidence: f64,
    pub signals: Vec<String>,
    pub notes: Vec<String>,
}

// ============================================================================
// Name Normalization
// ============================================================================

fn strip_one_prefix<'s>(name: &'s str, prefixes: &[String]) -> &'s str {
    for prefix in prefixes {
        let prefix = prefix.to_lowercase();
        if let Some(rest) = name.strip_prefix(prefix.as_str()) {
            if !rest.is_empty() {
                return rest;
            }
        }
    }
    name
}

fn strip_one_suffix<'s>(name: &'s str, suffixes: &[String]) -> &'s str {
    for suffix in suffixes {
        let suffix = suffix.to_lowercase();
        if let Some(rest) = name.strip_suffix(suffix.as_str()) {
            if !rest.is_empty() {
                return rest;
            }
        }
    }
    name
}

/// Routine name with one common prefix and one common suffix removed.
///
/// `btnSalvarClick` and `SalvarHandler` both become `salvar`.
pub fn routine_key(name: &str, config: &ComparatorConfig) -> String {
    let lower = name.trim().to_lowercase();
    let stripped = strip_one_prefix(&lower, &config.normalize_prefixes);
    let stripped = strip_one_suffix(stripped, &config.normalize_suffixes);
    stripped.trim_matches('_').to_string()
}

/// Class name without the type prefix and one role prefix and suffix.
///
/// `TClienteForm`, `TdmCliente` and `ClienteController` all become `cliente`.
pub fn class_key(name: &str, config: &ComparatorConfig) -> String {
    let trimmed = name.trim();
    let lower = trimmed.to_lowercase();
    let mut rest = lower.as_str();

    let mut chars = trimmed.chars();
    if let (Some('T'), Some(second)) = (chars.next(), chars.next()) {
        let after = &lower[1..];
        if second.is_uppercase()
            || config
                .class_prefixes
                .iter()
                .any(|p| after.starts_with(p.to_lowercase().as_str()))
        {
            rest = after;
        }
    }

    let stripped = strip_one_prefix(rest, &config.class_prefixes);
    let stripped = strip_one_suffix(stripped, &config.class_suffixes);
    stripped.trim_matches('_').to_string()
}

/// Fraction of equal characters at equal positions, over the longer length.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let longest = a.len().max(b.len());
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let equal = a.iter().zip(&b).filter(|(x, y)| x == y).count();
    equal as f64 / longest as f64
}

// ============================================================================
// Scoring
// ============================================================================

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

/// Score `target` as a counterpart of `source`; `None` without a name signal.
pub fn score<'a>(
    source: &Entity<'_>,
    target: &'a Entity<'a>,
    config: &ComparatorConfig,
) -> Option<Candidate<'a>> {
    let mut points = 0.0;
    let mut signals = Vec::new();
    let mut notes = Vec::new();

    if source.name.to_lowercase() == target.name.to_lowercase() {
        points += EXACT_NAME_POINTS;
        signals.push("exact_name".to_string());
    } else if !source.key.is_empty() && source.key == target.key {
        points += NORMALIZED_NAME_POINTS;
        signals.push("normalized_name".to_string());
    } else {
        let ratio = similarity(&source.key, &target.key);
        if ratio <= config.similarity_floor {
            return None;
        }
        points += SIMILAR_NAME_POINTS * ratio;
        signals.push(format!("similar_name({ratio:.2})"));
    }
    if source.name != target.name {
        notes.push(format!("renamed: {} -> {}", source.name, target.name));
    }

    if let (Some(src), Some(tgt)) = (source.arity, target.arity) {
        if src == tgt {
            points += PARAM_EQUAL_POINTS;
            signals.push("param_count".to_string());
        } else {
            if src.abs_diff(tgt) == 1 {
                points += PARAM_NEAR_POINTS;
                signals.push("param_count_near".to_string());
            }
            notes.push(format!("parameters: {src} -> {tgt}"));
        }
    }

    if let (Some(src), Some(tgt)) = (source.return_type, target.return_type) {
        if config.canonical_type(src) == config.canonical_type(tgt) {
            points += RETURN_TYPE_POINTS;
            signals.push("return_type".to_string());
        } else {
            notes.push(format!("return type: {src} -> {tgt}"));
        }
    }

    Some(Candidate {
        target,
        confidence: round4((points / 100.0).clamp(0.0, 1.0)),
        signals,
        notes,
    })
}

/// Highest-confidence candidate among `targets`.
///
/// Ties go to the lexicographically smallest target name, then unit.
pub fn best_candidate<'a>(
    source: &Entity<'_>,
    targets: &'a [Entity<'a>],
    config: &ComparatorConfig,
) -> Option<Candidate<'a>> {
    let mut best: Option<Candidate<'a>> = None;
    for target in targets {
        let Some(candidate) = score(source, target, config) else {
            continue;
        };
        let better = match &best {
            None => true,
            Some(current) => {
                candidate.confidence > current.confidence
                    || (candidate.confidence == current.confidence
                        && (target.name, target.unit) < (current.target.name, current.target.unit))
            }
        };
        if better {
            best = Some(candidate);
        }
    }
    best
}
