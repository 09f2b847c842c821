//! Target-kind classification and complexity scoring.
//!
//! Both rule sets are priority-ordered; the first matching rule wins.
//!
//! | Entity | Rule | Target kind |
//! |--------|------|-------------|
//! | routine | name has a validation keyword | `validator` |
//! | routine | name has a computation keyword | `service` |
//! | routine | UI event name, event handler, or owned by a Form unit | `controller` |
//! | routine | otherwise | `utility` |
//! | class | form-like | `controller` (fixed score) |
//! | class | data module | `service` (fixed score) |
//! | class | name has a data/model keyword | `entity` |
//! | class | name has an orchestration keyword | `service` |
//! | class | otherwise | `component` |

use crate::config::MapperConfig;
use crate::facts::{ClassFacts, RoutineFacts, UnitFacts, UnitKind};

use super::TargetKind;

/// Lowest and highest complexity scores.
pub const MIN_COMPLEXITY: u8 = 1;
pub const MAX_COMPLEXITY: u8 = 5;

fn contains_any(name: &str, keywords: &[String]) -> bool {
    let lower = name.to_lowercase();
    keywords
        .iter()
        .any(|k| lower.contains(k.to_lowercase().as_str()))
}

/// Target kind of a free routine declared in `unit`.
pub fn classify_routine(routine: &RoutineFacts, unit: &UnitFacts, config: &MapperConfig) -> TargetKind {
    if contains_any(&routine.name, &config.validation_keywords) {
        TargetKind::Validator
    } else if contains_any(&routine.name, &config.computation_keywords) {
        TargetKind::Service
    } else if contains_any(&routine.name, &config.ui_event_keywords)
        || routine.is_event_handler
        || unit.kind == UnitKind::Form
    {
        TargetKind::Controller
    } else {
        TargetKind::Utility
    }
}

/// Target kind of a class.
pub fn classify_class(class: &ClassFacts, config: &MapperConfig) -> TargetKind {
    if class.is_form_like {
        TargetKind::Controller
    } else if class.is_data_module {
        TargetKind::Service
    } else if contains_any(&class.name, &config.data_keywords) {
        TargetKind::Entity
    } else if contains_any(&class.name, &config.orchestration_keywords) {
        TargetKind::Service
    } else {
        TargetKind::Component
    }
}

fn clamp(score: u32) -> u8 {
    score.clamp(u32::from(MIN_COMPLEXITY), u32::from(MAX_COMPLEXITY)) as u8
}

/// Complexity score (1-5) of a routine.
///
/// Base 1; +1 past the low parameter threshold, +1 more past the high one;
/// +1 for an opaque return type.
pub fn routine_complexity(routine: &RoutineFacts, config: &MapperConfig) -> u8 {
    let params = routine.arity();
    let mut score = 1;
    if params > config.param_low_threshold {
        score += 1;
    }
    if params > config.param_high_threshold {
        score += 1;
    }
    if routine.return_type.as_deref().is_some_and(|rt| {
        config
            .complex_return_types
            .iter()
            .any(|c| c.eq_ignore_ascii_case(rt))
    }) {
        score += 1;
    }
    clamp(score)
}

/// Complexity score (1-5) of a class.
///
/// Form-like classes and data modules get their fixed scores: their real
/// weight (design-time wiring, embedded SQL) is invisible to static text.
/// Otherwise base 2; +1 past the low method threshold, +1 more past the high
/// one; +1 past the property threshold.
pub fn class_complexity(class: &ClassFacts, config: &MapperConfig) -> u8 {
    if class.is_form_like {
        return config.form_complexity.clamp(MIN_COMPLEXITY, MAX_COMPLEXITY);
    }
    if class.is_data_module {
        return config
            .data_module_complexity
            .clamp(MIN_COMPLEXITY, MAX_COMPLEXITY);
    }
    let methods = class.methods.len();
    let mut score = 2;
    if methods > config.method_low_threshold {
        score += 1;
    }
    if methods > config.method_high_threshold {
        score += 1;
    }
    if class.property_count() > config.property_threshold {
        score += 1;
    }
    clamp(score)
}

/// Effort in weeks of one component with the given score.
pub fn effort_weeks(complexity: u8, config: &MapperConfig) -> f64 {
    match complexity {
        0..=2 => config.effort_low_weeks,
        3 => config.effort_medium_weeks,
        _ => config.effort_high_weeks,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facts::{FieldFacts, Language, Param, RoutineKind, Visibility};

    fn routine(name: &str, params: usize) -> RoutineFacts {
        let mut r = RoutineFacts::new(name, RoutineKind::Procedure);
        r.params = (0..params)
            .map(|i| Param::new(format!("p{i}"), Some("Integer".to_string())))
            .collect();
        r
    }

    fn plain_unit() -> UnitFacts {
        let mut unit = UnitFacts::new("Utils", "utils.pas", Language::Pascal);
        unit.kind = UnitKind::PlainUnit;
        unit
    }

    mod routine_tests {
        use super::*;

        #[test]
        fn priority_order_validation_first() {
            let config = MapperConfig::default();
            let unit = plain_unit();
            // Matches both validation and computation keywords.
            let r = routine("ValidarECalcularTotal", 0);
            assert_eq!(classify_routine(&r, &unit, &config), TargetKind::Validator);
            assert_eq!(
                classify_routine(&routine("CalcularTotal", 0), &unit, &config),
                TargetKind::Service
            );
            assert_eq!(
                classify_routine(&routine("btnSalvarClick", 1), &unit, &config),
                TargetKind::Controller
            );
            assert_eq!(
                classify_routine(&routine("FormatarCPF", 1), &unit, &config),
                TargetKind::Utility
            );
        }

        #[test]
        fn form_unit_makes_controller() {
            let config = MapperConfig::default();
            let mut unit = plain_unit();
            unit.kind = UnitKind::Form;
            assert_eq!(
                classify_routine(&routine("AtualizarGrade", 0), &unit, &config),
                TargetKind::Controller
            );
        }

        #[test]
        fn complexity_thresholds() {
            let config = MapperConfig::default();
            assert_eq!(routine_complexity(&routine("a", 0), &config), 1);
            assert_eq!(routine_complexity(&routine("a", 2), &config), 1);
            assert_eq!(routine_complexity(&routine("a", 3), &config), 2);
            assert_eq!(routine_complexity(&routine("a", 6), &config), 3);

            let mut r = routine("a", 6);
            r.return_type = Some("OleVariant".to_string());
            assert_eq!(routine_complexity(&r, &config), 4);
        }
    }

    mod class_tests {
        use super::*;

        #[test]
        fn form_like_is_controller_with_fixed_score() {
            let config = MapperConfig::default();
            let mut class = ClassFacts::new("TClienteForm");
            class.is_form_like = true;
            for i in 0..20 {
                class.methods.push(routine(&format!("M{i}"), 0));
            }
            assert_eq!(classify_class(&class, &config), TargetKind::Controller);
            assert_eq!(class_complexity(&class, &config), 3);
        }

        #[test]
        fn data_module_is_service_with_fixed_score() {
            let config = MapperConfig::default();
            let mut class = ClassFacts::new("TDM");
            class.is_data_module = true;
            assert_eq!(classify_class(&class, &config), TargetKind::Service);
            assert_eq!(class_complexity(&class, &config), 4);
        }

        #[test]
        fn name_rules() {
            let config = MapperConfig::default();
            assert_eq!(
                classify_class(&ClassFacts::new("TClienteModel"), &config),
                TargetKind::Entity
            );
            assert_eq!(
                classify_class(&ClassFacts::new("TPedidoManager"), &config),
                TargetKind::Service
            );
            assert_eq!(
                classify_class(&ClassFacts::new("TImpressora"), &config),
                TargetKind::Component
            );
        }

        #[test]
        fn complexity_counts_methods_and_properties() {
            let config = MapperConfig::default();
            let mut class = ClassFacts::new("TImpressora");
            assert_eq!(class_complexity(&class, &config), 2);
            for i in 0..11 {
                class.methods.push(routine(&format!("M{i}"), 0));
                class.fields.push(FieldFacts {
                    name: format!("P{i}"),
                    type_name: None,
                    visibility: Visibility::Published,
                    is_property: true,
                    annotations: Vec::new(),
                    line: 1,
                });
            }
            assert_eq!(class_complexity(&class, &config), 5);
        }

        #[test]
        fn effort_buckets() {
            let config = MapperConfig::default();
            assert_eq!(effort_weeks(1, &config), 0.5);
            assert_eq!(effort_weeks(3, &config), 1.0);
            assert_eq!(effort_weeks(5, &config), 2.0);
        }
    }
}
