//! Java structural extractor for the rewritten target codebase.
//!
//! Produces the same [`UnitFacts`] shape as the legacy extractor so the
//! comparator can line the two projects up. Type and member declarations come
//! from [`declarations`]; Spring and JPA conventions (stereotypes, request
//! mappings, repositories, `@Query`, `@Table`) from [`spring`].
//!
//! A unit is named by its fully-qualified primary type: the first public
//! top-level type, else the first top-level type, else the file stem.

pub mod declarations;
pub mod spring;

use std::collections::HashSet;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use modernize_core::adapter::{unit_name_from_path, StructuralExtractor};
use modernize_core::config::ExtractorConfig;
use modernize_core::facts::{
    DatabaseOpFacts, DatabaseOpKind, DependencyRef, DependencyScope, Language, SizeMetrics,
    Stereotype, UnitFacts, UnitKind,
};
use modernize_core::sql;
use modernize_core::text::{ScrubbedSource, Syntax};

use crate::declarations::ParsedType;

static PACKAGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*package\s+([\w.]+)\s*;").unwrap());
static IMPORT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*import\s+(?:static\s+)?([\w.]+(?:\.\*)?)\s*;").unwrap()
});

/// Structural extractor for Java compilation units.
#[derive(Debug, Clone, Default)]
pub struct JavaExtractor {
    config: ExtractorConfig,
}

impl JavaExtractor {
    pub fn new(config: ExtractorConfig) -> Self {
        JavaExtractor { config }
    }
}

impl StructuralExtractor for JavaExtractor {
    fn extract_unit(&self, path: &str, text: &str) -> UnitFacts {
        let unit = extract(&self.config, path, text);
        debug!(
            unit = %unit.name,
            kind = unit.kind.as_str(),
            classes = unit.classes.len(),
            diagnostics = unit.diagnostics.len(),
            "extracted java unit"
        );
        unit
    }

    fn language(&self) -> Language {
        Language::Java
    }
}

fn extract(config: &ExtractorConfig, path: &str, text: &str) -> UnitFacts {
    let scrubbed = ScrubbedSource::new(text, Syntax::Java);
    let code = scrubbed.code.as_str();

    let package = PACKAGE_RE.captures(code).map(|caps| caps[1].to_string());
    let (types, diagnostics) = declarations::parse_types(&scrubbed, path, config.max_nesting_depth);

    let primary = types
        .iter()
        .filter(|t| t.top_level)
        .find(|t| t.modifiers.iter().any(|m| m == "public"))
        .or_else(|| types.iter().find(|t| t.top_level));
    let name = match (&package, primary) {
        (Some(package), Some(ty)) => format!("{package}.{}", ty.facts.name),
        (None, Some(ty)) => ty.facts.name.clone(),
        (_, None) => unit_name_from_path(path),
    };
    let mut unit = UnitFacts::new(name, path, Language::Java);
    unit.diagnostics = diagnostics;

    let mut seen = HashSet::new();
    unit.dependencies = IMPORT_RE
        .captures_iter(code)
        .filter(|caps| seen.insert(caps[1].to_string()))
        .map(|caps| DependencyRef {
            name: caps[1].to_string(),
            scope: DependencyScope::Import,
        })
        .collect();

    let mut ops = Vec::new();
    let mut query_literals = HashSet::new();
    let mut owners: Vec<(std::ops::Range<usize>, String)> = Vec::new();
    let has_package = package.is_some();
    for mut ty in types {
        annotate_type(&scrubbed, &mut ty, &mut ops, &mut query_literals, &mut owners);
        unit.classes.push(ty.facts);
    }

    // SQL literals outside `@Query`, e.g. JdbcTemplate calls.
    for stmt in sql::find_statements(&scrubbed.literals) {
        if query_literals.contains(&stmt.literal_index) {
            continue;
        }
        let Some(literal) = scrubbed.literals.get(stmt.literal_index) else {
            continue;
        };
        let at = literal.span.start;
        ops.push(DatabaseOpFacts {
            kind: stmt.kind,
            raw: stmt.fragment,
            table: stmt.table,
            component_type: None,
            owner: owners
                .iter()
                .filter(|(range, _)| range.contains(&at))
                .min_by_key(|(range, _)| range.len())
                .map(|(_, name)| name.clone()),
            line: scrubbed.line_at(at),
        });
    }
    ops.sort_by_key(|op| op.line);
    unit.database_ops = ops;

    for class in &mut unit.classes {
        let prefix = format!("{}.", class.name);
        class.is_data_access_like |= unit.database_ops.iter().any(|op| {
            op.owner
                .as_deref()
                .is_some_and(|o| o == class.name || o.starts_with(&prefix))
        });
    }

    unit.kind = classify(config, path, &unit, has_package);

    let (total, code_lines, comment, blank) = scrubbed.line_counts();
    unit.metrics = SizeMetrics {
        total_lines: total,
        code_lines,
        comment_lines: comment,
        blank_lines: blank,
        max_nesting_depth: brace_depth(code),
    };
    unit
}

/// Apply Spring conventions to one type and collect its data operations.
fn annotate_type(
    scrubbed: &ScrubbedSource,
    ty: &mut ParsedType,
    ops: &mut Vec<DatabaseOpFacts>,
    query_literals: &mut HashSet<usize>,
    owners: &mut Vec<(std::ops::Range<usize>, String)>,
) {
    let code = scrubbed.code.as_str();
    let class_name = ty.facts.name.clone();
    owners.push((ty.span.clone(), class_name.clone()));

    ty.facts.stereotype = spring::stereotype(ty, code);
    ty.facts.table = spring::table_name(scrubbed, ty);
    ty.facts.is_data_access_like = matches!(
        ty.facts.stereotype,
        Some(Stereotype::Repository | Stereotype::Entity)
    );

    if let Some((raw, entity)) = spring::repository_entity(&code[ty.header.clone()]) {
        ops.push(DatabaseOpFacts {
            kind: DatabaseOpKind::Repository,
            raw,
            table: None,
            component_type: Some(entity),
            owner: Some(class_name.clone()),
            line: ty.facts.line,
        });
    }

    let base = spring::base_path(scrubbed, ty);
    for (routine, parsed) in ty.facts.methods.iter_mut().zip(&ty.methods) {
        let owner = format!("{class_name}.{}", routine.name);
        owners.push((parsed.span.clone(), owner.clone()));
        routine.endpoint = spring::endpoint(scrubbed, base.as_deref(), &parsed.annotations);
        if let Some(query) = spring::query(scrubbed, &parsed.annotations) {
            query_literals.insert(query.literal_index);
            ops.push(DatabaseOpFacts {
                kind: query.kind,
                raw: query.text,
                table: query.table,
                component_type: None,
                owner: Some(owner),
                line: routine.line,
            });
        }
    }
}

fn classify(config: &ExtractorConfig, path: &str, unit: &UnitFacts, has_package: bool) -> UnitKind {
    let stem = Path::new(path)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    let has_token = |tokens: &[String]| {
        tokens
            .iter()
            .any(|t| stem.contains(t.to_ascii_lowercase().as_str()))
    };

    if has_token(&config.service_filename_tokens) {
        UnitKind::Service
    } else if has_token(&config.utility_filename_tokens) {
        UnitKind::Utility
    } else if has_package || !unit.classes.is_empty() {
        UnitKind::PlainUnit
    } else {
        UnitKind::Unknown
    }
}

/// Deepest `{}` nesting in scrubbed code.
fn brace_depth(code: &str) -> u32 {
    let mut depth = 0u32;
    let mut max = 0u32;
    for ch in code.chars() {
        match ch {
            '{' => {
                depth += 1;
                max = max.max(depth);
            }
            '}' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    max
}

#[cfg(test)]
mod tests {
    use super::*;
    use modernize_core::facts::{RoutineKind, Visibility};

    fn extract(path: &str, text: &str) -> UnitFacts {
        JavaExtractor::default().extract_unit(path, text)
    }

    const CONTROLLER: &str = r#"package com.acme.clientes;

import java.util.List;
import org.springframework.web.bind.annotation.*;
import static org.junit.Assert.*;

/**
 * Cadastro de clientes.
 */
@RestController
@RequestMapping("/api/clientes")
public class ClienteController {

    private final ClienteService service;

    public ClienteController(ClienteService service) {
        this.service = service;
    }

    @GetMapping
    public List<Cliente> listar() {
        return service.listar();
    }

    @PostMapping("/{id}")
    public Cliente salvar(@PathVariable Long id, @RequestBody Cliente cliente) {
        if (cliente.getNome() == null) {
            throw new IllegalArgumentException("nome");
        }
        return service.salvar(cliente);
    }
}
"#;

    const REPOSITORY: &str = r#"package com.acme.clientes;

import org.springframework.data.jpa.repository.JpaRepository;

public interface ClienteRepository extends JpaRepository<Cliente, Long> {

    @Query("SELECT c FROM Cliente c WHERE c.ativo = true")
    List<Cliente> ativos();

    Cliente findByCpf(String cpf);
}
"#;

    const ENTITY: &str = r#"package com.acme.clientes;

@Entity
@Table(name = "CLIENTES")
public class Cliente {
    @Id
    private Long id;
    private String nome;

    public String getNome() { return nome; }
}
"#;

    mod unit_tests {
        use super::*;

        #[test]
        fn controller_unit() {
            let unit = extract("src/main/java/com/acme/clientes/ClienteController.java", CONTROLLER);
            assert_eq!(unit.name, "com.acme.clientes.ClienteController");
            assert_eq!(unit.language, Language::Java);
            assert_eq!(unit.kind, UnitKind::PlainUnit);
            assert!(unit.diagnostics.is_empty());

            let deps: Vec<_> = unit.dependencies.iter().map(|d| d.name.as_str()).collect();
            assert_eq!(
                deps,
                vec![
                    "java.util.List",
                    "org.springframework.web.bind.annotation.*",
                    "org.junit.Assert.*",
                ]
            );
            assert!(unit.dependencies.iter().all(|d| d.scope == DependencyScope::Import));

            let class = &unit.classes[0];
            assert_eq!(class.stereotype, Some(Stereotype::Controller));
            assert_eq!(class.methods.len(), 3);
            assert_eq!(class.methods[0].kind, RoutineKind::Constructor);

            let listar = &class.methods[1];
            let endpoint = listar.endpoint.as_ref().unwrap();
            assert_eq!(endpoint.http_method, "GET");
            assert_eq!(endpoint.path, "/api/clientes");

            let salvar = &class.methods[2];
            let endpoint = salvar.endpoint.as_ref().unwrap();
            assert_eq!(endpoint.http_method, "POST");
            assert_eq!(endpoint.path, "/api/clientes/{id}");
            assert_eq!(salvar.arity(), 2);
            assert_eq!(salvar.complexity, 2);
            assert_eq!(salvar.visibility, Some(Visibility::Public));
            assert_eq!(salvar.annotations, vec!["@PostMapping"]);

            assert!(class.methods[0].endpoint.is_none());
            assert!(unit.metrics.comment_lines >= 3);
            assert_eq!(unit.metrics.max_nesting_depth, 3);
        }

        #[test]
        fn repository_unit() {
            let unit = extract("ClienteRepository.java", REPOSITORY);
            assert_eq!(unit.name, "com.acme.clientes.ClienteRepository");
            let class = &unit.classes[0];
            assert_eq!(class.stereotype, Some(Stereotype::Repository));
            assert!(class.is_data_access_like);
            assert_eq!(class.interfaces, vec!["JpaRepository"]);

            let got: Vec<_> = unit
                .database_ops
                .iter()
                .map(|op| (op.kind, op.owner.as_deref()))
                .collect();
            assert_eq!(
                got,
                vec![
                    (DatabaseOpKind::Repository, Some("ClienteRepository")),
                    (DatabaseOpKind::Select, Some("ClienteRepository.ativos")),
                ]
            );
            assert_eq!(unit.database_ops[0].component_type.as_deref(), Some("Cliente"));
            assert_eq!(unit.database_ops[1].table.as_deref(), Some("Cliente"));
        }

        #[test]
        fn entity_unit() {
            let unit = extract("Cliente.java", ENTITY);
            let class = &unit.classes[0];
            assert_eq!(class.stereotype, Some(Stereotype::Entity));
            assert_eq!(class.table.as_deref(), Some("CLIENTES"));
            assert!(class.is_data_access_like);
            assert_eq!(class.fields.len(), 2);
            assert_eq!(class.fields[0].annotations, vec!["@Id"]);
            assert_eq!(class.methods[0].return_type.as_deref(), Some("String"));
        }

        #[test]
        fn jdbc_sql_literal_is_owned_by_method() {
            let text = "class PedidoDao {\n  void apagar(long id) {\n    jdbc.update(\"DELETE FROM PEDIDOS WHERE ID = ?\", id);\n  }\n}";
            let unit = extract("PedidoDao.java", text);
            assert_eq!(unit.database_ops.len(), 1);
            let op = &unit.database_ops[0];
            assert_eq!(op.kind, DatabaseOpKind::Delete);
            assert_eq!(op.table.as_deref(), Some("PEDIDOS"));
            assert_eq!(op.owner.as_deref(), Some("PedidoDao.apagar"));
            assert_eq!(op.line, 3);
            assert_eq!(unit.name, "PedidoDao");
        }
    }

    mod naming_tests {
        use super::*;

        #[test]
        fn primary_type_prefers_public() {
            let text = "package p;\nclass Helper {}\npublic class Main {}\n";
            assert_eq!(extract("Main.java", text).name, "p.Main");
        }

        #[test]
        fn stem_fallback_and_kinds() {
            let unit = extract("src/Vazio.java", "// nada\n");
            assert_eq!(unit.name, "Vazio");
            assert_eq!(unit.kind, UnitKind::Unknown);

            let unit = extract("ClienteService.java", "package p;\nclass ClienteService {}\n");
            assert_eq!(unit.kind, UnitKind::Service);
            let unit = extract("StringUtils.java", "class StringUtils {}\n");
            assert_eq!(unit.kind, UnitKind::Utility);
        }

        #[test]
        fn malformed_input_never_panics() {
            for text in [
                "",
                "}}}{{{",
                "class",
                "public class A extends",
                "@",
                "@interface",
                "class A { void m( { }",
                "enum E { A, B",
                "record R(",
                "class Ç { String s = \"unterminated",
            ] {
                let unit = extract("X.java", text);
                assert_eq!(unit.language, Language::Java);
            }
        }

        #[test]
        fn extraction_is_deterministic() {
            let a = extract("ClienteController.java", CONTROLLER);
            let b = extract("ClienteController.java", CONTROLLER);
            assert_eq!(a, b);
        }
    }

    mod adversarial_tests {
        use super::*;
        use modernize_core::config::DEFAULT_MAX_NESTING_DEPTH;
        use modernize_core::facts::DiagnosticKind;

        fn reasons(unit: &UnitFacts) -> Vec<&str> {
            assert!(unit
                .diagnostics
                .iter()
                .all(|d| d.kind == DiagnosticKind::MalformedConstruct));
            unit.diagnostics.iter().map(|d| d.reason.as_str()).collect()
        }

        #[test]
        fn hundred_thousand_unclosed_classes_return() {
            let text: String = (0..100_000).map(|i| format!("class A{i} {{ ")).collect();
            let unit = extract("A0.java", &text);
            assert_eq!(unit.classes.len(), DEFAULT_MAX_NESTING_DEPTH + 1);
            let reasons = reasons(&unit);
            assert!(reasons.contains(&"type 'A0' has no closing brace"));
            assert!(reasons.contains(&"type 'A64' nests deeper than 64 levels"));
        }

        #[test]
        fn deeply_nested_closed_classes_return() {
            let depth = 10_000;
            let mut text: String = (0..depth).map(|i| format!("class A{i} {{\n")).collect();
            text.push_str(&"}\n".repeat(depth));
            let unit = extract("A0.java", &text);
            assert_eq!(unit.classes.len(), DEFAULT_MAX_NESTING_DEPTH + 1);
            assert_eq!(reasons(&unit), vec!["type 'A64' nests deeper than 64 levels"]);
            assert_eq!(unit.metrics.max_nesting_depth, 10_000);
        }

        #[test]
        fn huge_unterminated_method_body_returns() {
            let mut text = String::from("class A {\n  void m() {\n");
            text.push_str(&"    if (x) {\n".repeat(100_000));
            let unit = extract("A.java", &text);
            assert_eq!(unit.classes.len(), 1);
            let method = &unit.classes[0].methods[0];
            assert!(method.has_body);
            assert!(method.complexity > 100_000);
            let reasons = reasons(&unit);
            assert!(reasons.contains(&"method 'm' has no closing brace"));
            assert!(reasons.contains(&"type 'A' has no closing brace"));
        }

        #[test]
        fn thousands_of_unclosed_method_headers_return() {
            let mut text = String::from("class Api {\n");
            for i in 0..100_000 {
                text.push_str(&format!("  void m{i}(int a;\n"));
            }
            text.push_str("}\n");
            let unit = extract("Api.java", &text);
            assert_eq!(unit.classes.len(), 1);
            assert!(reasons(&unit).contains(&"method 'm0' has no closing parenthesis"));
        }
    }
}
