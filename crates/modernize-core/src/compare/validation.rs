//! Fixed validation rules and recommendations over a comparison.
//!
//! | Rule | Applies when | PASS | otherwise |
//! |------|--------------|------|-----------|
//! | `coverage` | always | overall coverage >= threshold | WARN |
//! | `controllers` | source has forms | target has a controller | FAIL |
//! | `persistence` | source has data access | target has entities and repositories | WARN |
//!
//! Aggregate status: FAIL if any rule failed, else WARN if warnings
//! outnumber passes, else PASS.

use serde::{Deserialize, Serialize};

use crate::config::ComparatorConfig;
use crate::facts::{ProjectFacts, UnitKind};

use super::TargetSummary;

/// Outcome of one rule, and of the whole report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ValidationStatus {
    Pass,
    Warn,
    Fail,
}

/// One validation finding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationFinding {
    /// Rule identifier (`coverage`, `controllers`, `persistence`).
    pub rule: String,
    pub status: ValidationStatus,
    pub message: String,
}

impl ValidationFinding {
    fn new(rule: &str, status: ValidationStatus, message: String) -> Self {
        ValidationFinding {
            rule: rule.to_string(),
            status,
            message,
        }
    }
}

/// Priority of a recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationPriority {
    Critical,
    High,
}

/// A data-driven follow-up action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub priority: RecommendationPriority,
    pub category: String,
    pub recommendation: String,
    pub rationale: String,
}

/// True when the source project has form-like classes or Form units.
pub fn source_has_forms(source: &ProjectFacts) -> bool {
    source
        .units
        .iter()
        .any(|u| u.kind == UnitKind::Form || u.classes.iter().any(|c| c.is_form_like))
}

/// True when the source project accesses a database.
pub fn source_has_data_access(source: &ProjectFacts) -> bool {
    source.units.iter().any(|u| {
        u.kind == UnitKind::DataModule
            || !u.database_ops.is_empty()
            || u.classes
                .iter()
                .any(|c| c.is_data_module || c.is_data_access_like)
    })
}

/// Apply the rules in fixed order.
pub fn validate(
    source: &ProjectFacts,
    target: &TargetSummary,
    overall_coverage: f64,
    config: &ComparatorConfig,
) -> Vec<ValidationFinding> {
    let mut findings = Vec::new();

    if overall_coverage >= config.coverage_threshold {
        findings.push(ValidationFinding::new(
            "coverage",
            ValidationStatus::Pass,
            format!(
                "overall coverage {overall_coverage:.2}% meets the {:.2}% threshold",
                config.coverage_threshold
            ),
        ));
    } else {
        findings.push(ValidationFinding::new(
            "coverage",
            ValidationStatus::Warn,
            format!(
                "overall coverage {overall_coverage:.2}% is below the {:.2}% threshold",
                config.coverage_threshold
            ),
        ));
    }

    if source_has_forms(source) {
        if target.controllers > 0 {
            findings.push(ValidationFinding::new(
                "controllers",
                ValidationStatus::Pass,
                format!("{} controller(s) replace the source forms", target.controllers),
            ));
        } else {
            findings.push(ValidationFinding::new(
                "controllers",
                ValidationStatus::Fail,
                "source has forms but the target has no controllers; the MVC web layer is missing"
                    .to_string(),
            ));
        }
    }

    if source_has_data_access(source) {
        if target.entities > 0 && target.repositories > 0 {
            findings.push(ValidationFinding::new(
                "persistence",
                ValidationStatus::Pass,
                format!(
                    "{} entit(ies) and {} repositor(ies) replace the source data access",
                    target.entities, target.repositories
                ),
            ));
        } else {
            findings.push(ValidationFinding::new(
                "persistence",
                ValidationStatus::Warn,
                format!(
                    "source accesses a database but the target has {} entit(ies) and {} repositor(ies)",
                    target.entities, target.repositories
                ),
            ));
        }
    }

    findings
}

/// Aggregate status of a set of findings.
pub fn aggregate_status(findings: &[ValidationFinding]) -> ValidationStatus {
    let count = |status: ValidationStatus| findings.iter().filter(|f| f.status == status).count();
    if count(ValidationStatus::Fail) > 0 {
        ValidationStatus::Fail
    } else if count(ValidationStatus::Warn) > count(ValidationStatus::Pass) {
        ValidationStatus::Warn
    } else {
        ValidationStatus::Pass
    }
}

/// Recommendations derived from the findings and the overall coverage.
pub fn recommend(
    findings: &[ValidationFinding],
    overall_coverage: f64,
    gap_count: usize,
    config: &ComparatorConfig,
) -> Vec<Recommendation> {
    let mut recommendations = Vec::new();

    let failed = findings
        .iter()
        .filter(|f| f.status == ValidationStatus::Fail)
        .count();
    if failed > 0 {
        recommendations.push(Recommendation {
            priority: RecommendationPriority::Critical,
            category: "validation".to_string(),
            recommendation: "Fix the failed validations before sign-off".to_string(),
            rationale: format!("{failed} validation(s) failed"),
        });
    }

    if overall_coverage < config.recommendation_coverage {
        recommendations.push(Recommendation {
            priority: RecommendationPriority::High,
            category: "completeness".to_string(),
            recommendation: "Review the unmatched source entities and migrate missing behavior"
                .to_string(),
            rationale: format!(
                "overall coverage {overall_coverage:.1}% with {gap_count} unmatched entit(ies)"
            ),
        });
    }

    recommendations
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finding(status: ValidationStatus) -> ValidationFinding {
        ValidationFinding::new("r", status, String::new())
    }

    #[test]
    fn aggregate_rules() {
        use ValidationStatus::*;
        assert_eq!(aggregate_status(&[finding(Pass), finding(Fail)]), Fail);
        assert_eq!(aggregate_status(&[finding(Pass), finding(Warn)]), Pass);
        assert_eq!(
            aggregate_status(&[finding(Warn), finding(Warn), finding(Pass)]),
            Warn
        );
        assert_eq!(aggregate_status(&[]), Pass);
    }

    #[test]
    fn status_serializes_uppercase() {
        assert_eq!(
            serde_json::to_string(&ValidationStatus::Warn).unwrap(),
            "\"WARN\""
        );
    }

    #[test]
    fn recommendations_follow_findings() {
        let config = ComparatorConfig::default();
        let recs = recommend(&[finding(ValidationStatus::Fail)], 50.0, 3, &config);
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].priority, RecommendationPriority::Critical);
        assert_eq!(recs[1].priority, RecommendationPriority::High);

        let recs = recommend(&[finding(ValidationStatus::Pass)], 90.0, 0, &config);
        assert!(recs.is_empty());
    }
}
