//! MigrationMapper: source facts to component mappings and a phased plan.
//!
//! [`plan`] is a single synchronous pass over an assembled
//! [`ProjectFacts`]. The result is recomputed from scratch on every call and
//! depends only on the facts and the [`MapperConfig`]:
//!
//! 1. Map every free routine and class (see [`classify`]) and one repository
//!    per distinct table referenced by SQL operations
//! 2. Name each target with the pure transform in [`naming`]
//! 3. Sort mappings by id, then distribute them over the fixed
//!    [`phases`] template
//! 4. Summarize complexity and surface risk factors

pub mod classify;
pub mod naming;
pub mod phases;

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::MapperConfig;
use crate::error::{ModernizeError, ModernizeResult};
use crate::facts::{DatabaseOpKind, ProjectFacts, FACTS_SCHEMA_VERSION};

use classify::{class_complexity, classify_class, classify_routine, effort_weeks, routine_complexity};
use naming::{repository_name, target_name};

/// Current schema version for serialized plans.
pub const PLAN_SCHEMA_VERSION: u32 = 1;

/// How many components the priority list holds.
pub const PRIORITY_LIST_LEN: usize = 10;

// ============================================================================
// Types
// ============================================================================

/// Kind of component on the target platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    Controller,
    Service,
    Entity,
    Repository,
    Utility,
    Validator,
    Component,
}

impl TargetKind {
    /// Suffix appended to generated names.
    pub fn canonical_suffix(&self) -> &'static str {
        match self {
            TargetKind::Controller => "Controller",
            TargetKind::Service => "Service",
            TargetKind::Entity => "",
            TargetKind::Repository => "Repository",
            TargetKind::Utility => "Utils",
            TargetKind::Validator => "Validator",
            TargetKind::Component => "Component",
        }
    }

    /// Stable snake_case name, matching the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            TargetKind::Controller => "controller",
            TargetKind::Service => "service",
            TargetKind::Entity => "entity",
            TargetKind::Repository => "repository",
            TargetKind::Utility => "utility",
            TargetKind::Validator => "validator",
            TargetKind::Component => "component",
        }
    }
}

/// What a mapping was derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceEntityKind {
    Routine,
    Class,
    Table,
}

/// One source entity mapped onto a target component.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentMapping {
    /// Stable identifier: `routine:Unit.Name`, `class:Unit.Name` or `table:NAME`.
    pub id: String,
    pub source_name: String,
    pub source_kind: SourceEntityKind,
    /// Declaring unit; `None` for tables.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    pub target_kind: TargetKind,
    pub target_name: String,
    /// 1 to 5.
    pub complexity: u8,
    /// Parent type, called routines, or referencing units.
    pub dependencies: Vec<String>,
    pub notes: Vec<String>,
}

/// One scheduling bucket of the plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationPhase {
    /// 1 to 4.
    pub number: u8,
    pub name: String,
    /// max(template minimum, effort).
    pub duration_weeks: f64,
    /// Summed effort of the assigned components.
    pub effort_weeks: f64,
    pub deliverables: Vec<String>,
    /// Ids of the assigned [`ComponentMapping`]s.
    pub components: Vec<String>,
}

/// Overall complexity level of a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplexityLevel {
    Low,
    Medium,
    High,
}

impl ComplexityLevel {
    /// `low` up to 2, `medium` up to 3.5, else `high`.
    pub fn from_average(average: f64) -> Self {
        if average <= 2.0 {
            ComplexityLevel::Low
        } else if average <= 3.5 {
            ComplexityLevel::Medium
        } else {
            ComplexityLevel::High
        }
    }
}

/// Aggregate view of a plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanSummary {
    pub component_count: usize,
    /// Rounded to two decimals; 0 for an empty plan.
    pub average_complexity: f64,
    pub level: ComplexityLevel,
    /// Score (1-5) to component count; every score is present.
    pub complexity_distribution: BTreeMap<u8, usize>,
    /// Target kind to component count.
    pub kind_counts: BTreeMap<String, usize>,
    /// Highest-complexity component ids, complexity descending then id.
    pub priority: Vec<String>,
    pub risk_factors: Vec<String>,
}

/// The derived migration plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationPlan {
    pub schema_version: u32,
    /// Sorted by id.
    pub components: Vec<ComponentMapping>,
    /// Always the four template phases, in order.
    pub phases: Vec<MigrationPhase>,
    pub summary: PlanSummary,
    /// Summed effort of every component.
    pub total_effort_weeks: f64,
    /// Summed phase durations.
    pub total_duration_weeks: f64,
}

// ============================================================================
// Planning
// ============================================================================

/// Check that `facts` can be planned or compared.
pub(crate) fn check_facts(facts: &ProjectFacts, role: &str) -> ModernizeResult<()> {
    if facts.schema_version != FACTS_SCHEMA_VERSION {
        return Err(ModernizeError::precondition(format!(
            "{role} facts have schema version {}, expected {}",
            facts.schema_version, FACTS_SCHEMA_VERSION
        )));
    }
    if facts.is_empty() {
        return Err(ModernizeError::precondition(format!(
            "{role} project has no units"
        )));
    }
    Ok(())
}

/// Derive the migration plan of a source project.
///
/// # Errors
///
/// [`ModernizeError::Precondition`] when the facts carry another schema
/// version or contain no units.
pub fn plan(facts: &ProjectFacts, config: &MapperConfig) -> ModernizeResult<MigrationPlan> {
    check_facts(facts, "source")?;

    let mut components = map_components(facts, config);
    components.sort_by(|a, b| a.id.cmp(&b.id));

    let phases = phases::build_phases(&components, config);
    let summary = summarize(&components, facts, config);
    let total_effort_weeks = components
        .iter()
        .map(|c| effort_weeks(c.complexity, config))
        .sum();
    let total_duration_weeks = phases.iter().map(|p| p.duration_weeks).sum();

    info!(
        components = components.len(),
        effort_weeks = total_effort_weeks,
        level = ?summary.level,
        "migration plan derived"
    );

    Ok(MigrationPlan {
        schema_version: PLAN_SCHEMA_VERSION,
        components,
        phases,
        summary,
        total_effort_weeks,
        total_duration_weeks,
    })
}

/// Allocate `base`, or `base#n` when already taken.
fn unique_id(base: String, used: &mut HashMap<String, usize>) -> String {
    let count = used.entry(base.clone()).or_insert(0);
    *count += 1;
    if *count == 1 {
        base
    } else {
        format!("{base}#{count}")
    }
}

fn map_components(facts: &ProjectFacts, config: &MapperConfig) -> Vec<ComponentMapping> {
    let mut used = HashMap::new();
    let mut components = Vec::new();

    let free_routines: BTreeSet<String> = facts
        .units
        .iter()
        .flat_map(|u| u.routines.iter().map(|r| r.name.to_lowercase()))
        .collect();

    for unit in &facts.units {
        for routine in &unit.routines {
            let kind = classify_routine(routine, unit, config);
            let mut notes = Vec::new();
            if routine.is_event_handler {
                notes.push("event handler; expose as an endpoint".to_string());
            }
            if !routine.has_body {
                notes.push("no body found; declaration only".to_string());
            }
            let dependencies = routine
                .call_hints
                .iter()
                .filter(|c| {
                    !c.eq_ignore_ascii_case(&routine.name)
                        && free_routines.contains(&c.to_lowercase())
                })
                .cloned()
                .collect();
            components.push(ComponentMapping {
                id: unique_id(format!("routine:{}.{}", unit.name, routine.name), &mut used),
                source_name: routine.name.clone(),
                source_kind: SourceEntityKind::Routine,
                unit: Some(unit.name.clone()),
                target_kind: kind,
                target_name: target_name(&routine.name, kind, config),
                complexity: routine_complexity(routine, config),
                dependencies,
                notes,
            });
        }

        for class in &unit.classes {
            let kind = classify_class(class, config);
            let mut notes = Vec::new();
            if class.is_form_like {
                notes.push("form: fixed complexity, UI rebuilt on the client".to_string());
            } else if class.is_data_module {
                notes.push("data module: fixed complexity, SQL moves to repositories".to_string());
            }
            let components_held = unit
                .database_ops
                .iter()
                .filter(|op| {
                    op.kind == DatabaseOpKind::Component
                        && op.owner.as_deref() == Some(class.name.as_str())
                })
                .count();
            if components_held > 0 {
                notes.push(format!("{components_held} dataset component(s)"));
            }
            components.push(ComponentMapping {
                id: unique_id(format!("class:{}.{}", unit.name, class.name), &mut used),
                source_name: class.name.clone(),
                source_kind: SourceEntityKind::Class,
                unit: Some(unit.name.clone()),
                target_kind: kind,
                target_name: target_name(&class.name, kind, config),
                complexity: class_complexity(class, config),
                dependencies: class.parent.iter().cloned().collect(),
                notes,
            });
        }
    }

    // One repository per distinct table, case-insensitively.
    let mut tables: BTreeMap<String, (String, BTreeSet<String>, usize)> = BTreeMap::new();
    for unit in &facts.units {
        for op in unit.database_ops.iter().filter(|op| op.kind.is_sql()) {
            if let Some(table) = &op.table {
                let entry = tables
                    .entry(table.to_uppercase())
                    .or_insert_with(|| (table.clone(), BTreeSet::new(), 0));
                entry.1.insert(unit.name.clone());
                entry.2 += 1;
            }
        }
    }
    for (key, (table, units, statements)) in tables {
        components.push(ComponentMapping {
            id: unique_id(format!("table:{key}"), &mut used),
            source_name: table.clone(),
            source_kind: SourceEntityKind::Table,
            unit: None,
            target_kind: TargetKind::Repository,
            target_name: repository_name(&table),
            complexity: 2,
            dependencies: units.into_iter().collect(),
            notes: vec![format!("{statements} embedded SQL statement(s)")],
        });
    }

    components
}

fn summarize(
    components: &[ComponentMapping],
    facts: &ProjectFacts,
    config: &MapperConfig,
) -> PlanSummary {
    let count = components.len();
    let total: u32 = components.iter().map(|c| u32::from(c.complexity)).sum();
    let average = if count == 0 {
        0.0
    } else {
        round2(f64::from(total) / count as f64)
    };

    let mut distribution: BTreeMap<u8, usize> = (1..=5).map(|score| (score, 0)).collect();
    let mut kind_counts: BTreeMap<String, usize> = BTreeMap::new();
    for component in components {
        *distribution.entry(component.complexity).or_insert(0) += 1;
        *kind_counts
            .entry(component.target_kind.as_str().to_string())
            .or_insert(0) += 1;
    }

    let mut ranked: Vec<&ComponentMapping> = components.iter().collect();
    ranked.sort_by(|a, b| b.complexity.cmp(&a.complexity).then_with(|| a.id.cmp(&b.id)));
    let priority = ranked
        .iter()
        .take(PRIORITY_LIST_LEN)
        .map(|c| c.id.clone())
        .collect();

    let mut risk_factors = Vec::new();
    let maximal = distribution.get(&5).copied().unwrap_or(0);
    if maximal > 0 {
        risk_factors.push(format!(
            "{maximal} component(s) at maximum complexity (5)"
        ));
    }
    let high = components
        .iter()
        .filter(|c| c.complexity >= config.high_complexity)
        .count();
    if high > 0 {
        risk_factors.push(format!(
            "{high} high-complexity component(s) (>= {})",
            config.high_complexity
        ));
    }
    let embedded_sql: usize = facts
        .units
        .iter()
        .map(|u| u.database_ops.iter().filter(|op| op.kind.is_sql()).count())
        .sum();
    if embedded_sql > 0 {
        risk_factors.push(format!(
            "{embedded_sql} embedded SQL statement(s) must move into repositories"
        ));
    }
    if !facts.diagnostics.is_empty() {
        risk_factors.push(format!(
            "{} diagnostic(s): some input was only partially analyzed",
            facts.diagnostics.len()
        ));
    }

    PlanSummary {
        component_count: count,
        average_complexity: average,
        level: ComplexityLevel::from_average(average),
        complexity_distribution: distribution,
        kind_counts,
        priority,
        risk_factors,
    }
}

/// Round to two decimals.
pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

// ============================================================================
// Tests
// ============================================================================
