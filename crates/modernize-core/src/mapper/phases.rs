//! The fixed four-phase migration template.
//!
//! Assignment is a filter over the component mappings by kind and complexity,
//! never an optimizer. Every component lands in exactly one phase:
//!
//! | Phase | Components | Minimum weeks |
//! |-------|------------|---------------|
//! | 1 Preparation and scaffolding | utility, validator, component below the high threshold | 2 |
//! | 2 Entities and services | entity, service, repository below the high threshold | 3 |
//! | 3 Controllers and APIs | controller below the high threshold | 4 |
//! | 4 High-complexity components and integration | everything at or above the high threshold | 3 |
//!
//! A phase lasts the larger of its minimum and the summed effort of its
//! components.

use crate::config::MapperConfig;

use super::classify::effort_weeks;
use super::{ComponentMapping, MigrationPhase, TargetKind};

struct PhaseTemplate {
    name: &'static str,
    min_weeks: f64,
    deliverables: &'static [&'static str],
}

const TEMPLATES: [PhaseTemplate; 4] = [
    PhaseTemplate {
        name: "Preparation and scaffolding",
        min_weeks: 2.0,
        deliverables: &[
            "Target project skeleton and build configuration",
            "Shared utilities and validators",
            "Continuous integration pipeline",
        ],
    },
    PhaseTemplate {
        name: "Entities and services",
        min_weeks: 3.0,
        deliverables: &[
            "Persistence entities",
            "Repositories replacing embedded SQL",
            "Service layer",
        ],
    },
    PhaseTemplate {
        name: "Controllers and APIs",
        min_weeks: 4.0,
        deliverables: &["REST controllers replacing forms", "API contracts"],
    },
    PhaseTemplate {
        name: "High-complexity components and integration",
        min_weeks: 3.0,
        deliverables: &[
            "Migrated high-complexity components",
            "Integration tests",
            "Data migration and cut-over plan",
        ],
    },
];

/// Index (0-3) of the phase a component belongs to.
pub fn phase_index(mapping: &ComponentMapping, config: &MapperConfig) -> usize {
    if mapping.complexity >= config.high_complexity {
        return 3;
    }
    match mapping.target_kind {
        TargetKind::Utility | TargetKind::Validator | TargetKind::Component => 0,
        TargetKind::Entity | TargetKind::Service | TargetKind::Repository => 1,
        TargetKind::Controller => 2,
    }
}

/// Build the four phases for `components` (already in canonical order).
pub fn build_phases(components: &[ComponentMapping], config: &MapperConfig) -> Vec<MigrationPhase> {
    let mut assigned: [Vec<&ComponentMapping>; 4] = Default::default();
    for mapping in components {
        assigned[phase_index(mapping, config)].push(mapping);
    }

    TEMPLATES
        .iter()
        .zip(assigned)
        .enumerate()
        .map(|(index, (template, members))| {
            let effort: f64 = members
                .iter()
                .map(|m| effort_weeks(m.complexity, config))
                .sum();
            MigrationPhase {
                number: (index + 1) as u8,
                name: template.name.to_string(),
                duration_weeks: template.min_weeks.max(effort),
                effort_weeks: effort,
                deliverables: template.deliverables.iter().map(|d| d.to_string()).collect(),
                components: members.iter().map(|m| m.id.clone()).collect(),
            }
        })
        .collect()
}
