//! Purity, order invariance and numeric bounds of the pipeline.

mod support;

use serde_json::json;

use modernize::{build_project_facts, compare_projects, extract_unit, plan_migration};
use modernize_core::config::{ComparatorConfig, ExtractorConfig, MapperConfig};
use modernize_core::facts::ProjectFacts;

use support::{facts, source_files, target_files};

fn permutations(files: &[(String, String)]) -> Vec<Vec<(String, String)>> {
    let mut reversed = files.to_vec();
    reversed.reverse();
    let mut rotated = files.to_vec();
    rotated.rotate_left(1);
    vec![files.to_vec(), reversed, rotated]
}

mod purity_tests {
    use super::*;

    #[test]
    fn extraction_is_repeatable() {
        let config = ExtractorConfig::default();
        for (path, text) in source_files().iter().chain(target_files().iter()) {
            assert_eq!(
                extract_unit(path, text, &config),
                extract_unit(path, text, &config),
                "{path}"
            );
        }
    }

    #[test]
    fn plan_and_report_are_repeatable() {
        let source = facts(&source_files());
        let target = facts(&target_files());
        let mapper = MapperConfig::default();
        let comparator = ComparatorConfig::default();
        assert_eq!(
            plan_migration(&source, &mapper).unwrap(),
            plan_migration(&source, &mapper).unwrap()
        );
        assert_eq!(
            compare_projects(&source, &target, &comparator).unwrap(),
            compare_projects(&source, &target, &comparator).unwrap()
        );
    }

    #[test]
    fn serialized_output_is_byte_identical() {
        let a = serde_json::to_string(&facts(&source_files())).unwrap();
        let b = serde_json::to_string(&facts(&source_files())).unwrap();
        assert_eq!(a, b);
    }
}

mod order_tests {
    use super::*;

    #[test]
    fn facts_ignore_input_order() {
        let expected = facts(&source_files());
        for files in permutations(&source_files()) {
            assert_eq!(facts(&files), expected);
        }
    }

    #[test]
    fn plan_and_report_ignore_input_order() {
        let mapper = MapperConfig::default();
        let comparator = ComparatorConfig::default();
        let base_source = facts(&source_files());
        let base_target = facts(&target_files());
        let expected_plan = plan_migration(&base_source, &mapper).unwrap();
        let expected_report = compare_projects(&base_source, &base_target, &comparator).unwrap();

        for source_files in permutations(&source_files()) {
            for target_files in permutations(&target_files()) {
                let source = facts(&source_files);
                let target = facts(&target_files);
                assert_eq!(plan_migration(&source, &mapper).unwrap(), expected_plan);
                assert_eq!(
                    compare_projects(&source, &target, &comparator).unwrap(),
                    expected_report
                );
            }
        }
    }
}

mod bounds_tests {
    use super::*;

    fn all_projects() -> Vec<ProjectFacts> {
        vec![facts(&source_files()), facts(&target_files())]
    }

    #[test]
    fn complexity_is_at_least_one() {
        for project in all_projects() {
            for (_, routine) in project.all_routines() {
                assert!(routine.complexity >= 1, "{}", routine.name);
            }
        }
    }

    #[test]
    fn coverage_and_confidence_stay_in_range() {
        let source = facts(&source_files());
        let target = facts(&target_files());
        let report = compare_projects(&source, &target, &ComparatorConfig::default()).unwrap();
        for category in &report.categories {
            assert!((0.0..=100.0).contains(&category.coverage), "{category:?}");
        }
        assert!((0.0..=100.0).contains(&report.overall_coverage));
        for edge in &report.edges {
            assert!((0.0..=1.0).contains(&edge.confidence), "{edge:?}");
        }
    }

    #[test]
    fn coverage_is_capped_when_target_is_larger() {
        let source = build_project_facts(
            &[(
                "uA.pas".to_string(),
                "unit uA;\ninterface\nprocedure Somar;\nimplementation\nprocedure Somar;\nbegin\nend;\nend.\n"
                    .to_string(),
            )],
            &ExtractorConfig::default(),
        );
        let methods: String = (0..20)
            .map(|i| format!("    public void somar{i}() {{ }}\n"))
            .collect();
        let target_text = format!("class Somas {{\n    public void somar() {{ }}\n{methods}}}\n");
        let target = build_project_facts(
            &[("Somas.java".to_string(), target_text)],
            &ExtractorConfig::default(),
        );

        let report = compare_projects(&source, &target, &ComparatorConfig::default()).unwrap();
        let routines = &report.categories[0];
        assert_eq!(routines.source_count, 1);
        assert_eq!(routines.target_count, 21);
        assert_eq!(routines.coverage, 100.0);
        assert!(report.overall_coverage <= 100.0);
    }
}

mod serialization_tests {
    use super::*;

    #[test]
    fn outputs_are_plain_versioned_trees() {
        let source = facts(&source_files());
        let target = facts(&target_files());
        let plan = plan_migration(&source, &MapperConfig::default()).unwrap();
        let report = compare_projects(&source, &target, &ComparatorConfig::default()).unwrap();

        let facts_json = serde_json::to_value(&source).unwrap();
        let plan_json = serde_json::to_value(&plan).unwrap();
        let report_json = serde_json::to_value(&report).unwrap();
        for value in [&facts_json, &plan_json, &report_json] {
            assert!(value["schema_version"].is_u64());
        }

        assert_eq!(report_json["status"], json!("PASS"));
        let form = facts_json["units"]
            .as_array()
            .unwrap()
            .iter()
            .find(|u| u["name"] == json!("uClientes"))
            .unwrap();
        assert_eq!(form["kind"], json!("form"));
        assert_eq!(form["language"], json!("pascal"));

        let restored: ProjectFacts = serde_json::from_value(facts_json).unwrap();
        assert_eq!(restored, source);
    }
}
