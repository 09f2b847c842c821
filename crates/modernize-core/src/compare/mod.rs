//! ProjectComparator: how completely a rewrite corresponds to its source.
//!
//! [`compare`] matches source entities to target entities independently per
//! [`Category`], computes capped coverage, applies the fixed validation rules
//! and derives recommendations. It is a single synchronous pass with no
//! state; the report depends only on the two fact sets and the
//! [`ComparatorConfig`].
//!
//! | Category | Source entities | Target entities |
//! |----------|-----------------|-----------------|
//! | `routines` | every routine and method | every routine and method |
//! | `classes` | every class | every class |
//! | `forms` | form-like classes | controller classes |
//! | `data_modules` | data-module classes | service classes |
//!
//! Targets may be matched by several source entities; coverage is
//! asymmetric, so extra target entities never lower it.

pub mod matching;
pub mod validation;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::ComparatorConfig;
use crate::error::{ModernizeError, ModernizeResult};
use crate::facts::{ProjectFacts, Stereotype};
use crate::mapper::{check_facts, round2};

use matching::{best_candidate, Entity};
pub use validation::{
    Recommendation, RecommendationPriority, ValidationFinding, ValidationStatus,
};

/// Current schema version for serialized coverage reports.
pub const REPORT_SCHEMA_VERSION: u32 = 1;

// ============================================================================
// Types
// ============================================================================

/// Entity category compared independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Routines,
    Classes,
    Forms,
    DataModules,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Routines,
        Category::Classes,
        Category::Forms,
        Category::DataModules,
    ];
}

/// Qualitative band of a coverage percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoverageStatus {
    /// 90% and above.
    Excellent,
    /// 75% and above.
    Good,
    /// 50% and above.
    Partial,
    Insufficient,
}

impl CoverageStatus {
    pub fn from_coverage(coverage: f64) -> Self {
        if coverage >= 90.0 {
            CoverageStatus::Excellent
        } else if coverage >= 75.0 {
            CoverageStatus::Good
        } else if coverage >= 50.0 {
            CoverageStatus::Partial
        } else {
            CoverageStatus::Insufficient
        }
    }
}

/// Coverage of one non-empty category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryCoverage {
    pub category: Category,
    pub source_count: usize,
    pub target_count: usize,
    pub matched: usize,
    /// `min(100, matched / source_count * 100)`, two decimals.
    pub coverage: f64,
    pub status: CoverageStatus,
}

/// A proposed link from one source entity to one target entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrespondenceEdge {
    pub category: Category,
    pub source: String,
    pub source_unit: String,
    pub target: String,
    pub target_unit: String,
    /// Within `[0, 1]`.
    pub confidence: f64,
    /// Match signals that contributed points.
    pub signals: Vec<String>,
    /// Human-readable discrepancies.
    pub notes: Vec<String>,
}

/// The best candidate that fell below the confidence floor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedCandidate {
    pub target: String,
    pub target_unit: String,
    pub confidence: f64,
}

/// A source entity without a counterpart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Gap {
    pub category: Category,
    pub name: String,
    pub unit: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub best_candidate: Option<RejectedCandidate>,
}

/// Stereotype counts of the target project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetSummary {
    pub classes: usize,
    pub routines: usize,
    pub endpoints: usize,
    pub controllers: usize,
    pub services: usize,
    pub repositories: usize,
    pub entities: usize,
    pub configurations: usize,
    pub components: usize,
}

impl TargetSummary {
    pub fn from_facts(target: &ProjectFacts) -> Self {
        let mut summary = TargetSummary::default();
        for (_, class) in target.all_classes() {
            summary.classes += 1;
            match class.stereotype {
                Some(Stereotype::Controller) => summary.controllers += 1,
                Some(Stereotype::Service) => summary.services += 1,
                Some(Stereotype::Repository) => summary.repositories += 1,
                Some(Stereotype::Entity) => summary.entities += 1,
                Some(Stereotype::Configuration) => summary.configurations += 1,
                Some(Stereotype::Component) => summary.components += 1,
                None => {}
            }
        }
        for (_, routine) in target.all_routines() {
            summary.routines += 1;
            if routine.endpoint.is_some() {
                summary.endpoints += 1;
            }
        }
        summary
    }
}

/// The comparison result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageReport {
    pub schema_version: u32,
    /// Categories with at least one source entity, in [`Category::ALL`] order.
    pub categories: Vec<CategoryCoverage>,
    /// Mean over `categories`, two decimals.
    pub overall_coverage: f64,
    pub coverage_status: CoverageStatus,
    pub edges: Vec<CorrespondenceEdge>,
    pub gaps: Vec<Gap>,
    pub validations: Vec<ValidationFinding>,
    pub status: ValidationStatus,
    pub target_summary: TargetSummary,
    pub recommendations: Vec<Recommendation>,
}

// ============================================================================
// Entity Collection
// ============================================================================

fn sorted(mut entities: Vec<Entity<'_>>) -> Vec<Entity<'_>> {
    entities.sort_by(|a, b| a.name.cmp(b.name).then_with(|| a.unit.cmp(b.unit)));
    entities
}

fn source_entities<'a>(
    facts: &'a ProjectFacts,
    category: Category,
    config: &ComparatorConfig,
) -> Vec<Entity<'a>> {
    let entities: Vec<Entity<'a>> = match category {
        Category::Routines => facts
            .all_routines()
            .map(|(u, r)| Entity::routine(r, &u.name, config))
            .collect(),
        Category::Classes => facts
            .all_classes()
            .map(|(u, c)| Entity::class(c, &u.name, config))
            .collect(),
        Category::Forms => facts
            .all_classes()
            .filter(|(_, c)| c.is_form_like)
            .map(|(u, c)| Entity::class(c, &u.name, config))
            .collect(),
        Category::DataModules => facts
            .all_classes()
            .filter(|(_, c)| c.is_data_module)
            .map(|(u, c)| Entity::class(c, &u.name, config))
            .collect(),
    };
    sorted(entities)
}

fn target_entities<'a>(
    facts: &'a ProjectFacts,
    category: Category,
    config: &ComparatorConfig,
) -> Vec<Entity<'a>> {
    let with_stereotype = |stereotype: Stereotype| -> Vec<Entity<'a>> {
        facts
            .all_classes()
            .filter(|(_, c)| c.stereotype == Some(stereotype))
            .map(|(u, c)| Entity::class(c, &u.name, config))
            .collect()
    };
    let entities: Vec<Entity<'a>> = match category {
        Category::Routines | Category::Classes => return source_entities(facts, category, config),
        Category::Forms => with_stereotype(Stereotype::Controller),
        Category::DataModules => with_stereotype(Stereotype::Service),
    };
    sorted(entities)
}

// ============================================================================
// Comparison
// ============================================================================

/// Compare a source project with its rewrite.
///
/// # Errors
///
/// [`ModernizeError::Precondition`] when either project carries another
/// schema version or has no units, or when the source has no routine and no
/// class to compare.
pub fn compare(
    source: &ProjectFacts,
    target: &ProjectFacts,
    config: &ComparatorConfig,
) -> ModernizeResult<CoverageReport> {
    check_facts(source, "source")?;
    check_facts(target, "target")?;
    config.validate()?;

    let mut categories = Vec::new();
    let mut edges = Vec::new();
    let mut gaps = Vec::new();

    for category in Category::ALL {
        let sources = source_entities(source, category, config);
        if sources.is_empty() {
            continue;
        }
        let targets = target_entities(target, category, config);

        let mut matched = 0;
        for entity in &sources {
            match best_candidate(entity, &targets, config) {
                Some(candidate) if candidate.confidence >= config.min_confidence => {
                    matched += 1;
                    edges.push(CorrespondenceEdge {
                        category,
                        source: entity.name.to_string(),
                        source_unit: entity.unit.to_string(),
                        target: candidate.target.name.to_string(),
                        target_unit: candidate.target.unit.to_string(),
                        confidence: candidate.confidence,
                        signals: candidate.signals,
                        notes: candidate.notes,
                    });
                }
                rejected => gaps.push(Gap {
                    category,
                    name: entity.name.to_string(),
                    unit: entity.unit.to_string(),
                    best_candidate: rejected.map(|c| RejectedCandidate {
                        target: c.target.name.to_string(),
                        target_unit: c.target.unit.to_string(),
                        confidence: c.confidence,
                    }),
                }),
            }
        }

        let coverage = round2((matched as f64 / sources.len() as f64 * 100.0).min(100.0));
        categories.push(CategoryCoverage {
            category,
            source_count: sources.len(),
            target_count: targets.len(),
            matched,
            coverage,
            status: CoverageStatus::from_coverage(coverage),
        });
    }

    if categories.is_empty() {
        return Err(ModernizeError::precondition(
            "source project has no routines or classes to compare",
        ));
    }

    let overall_coverage = round2(
        categories.iter().map(|c| c.coverage).sum::<f64>() / categories.len() as f64,
    );
    let target_summary = TargetSummary::from_facts(target);
    let validations = validation::validate(source, &target_summary, overall_coverage, config);
    let status = validation::aggregate_status(&validations);
    let recommendations =
        validation::recommend(&validations, overall_coverage, gaps.len(), config);

    info!(
        overall_coverage,
        edges = edges.len(),
        gaps = gaps.len(),
        status = ?status,
        "projects compared"
    );

    Ok(CoverageReport {
        schema_version: REPORT_SCHEMA_VERSION,
        categories,
        overall_coverage,
        coverage_status: CoverageStatus::from_coverage(overall_coverage),
        edges,
        gaps,
        validations,
        status,
        target_summary,
        recommendations,
    })
}

// ============================================================================
// Tests
// ============================================================================
