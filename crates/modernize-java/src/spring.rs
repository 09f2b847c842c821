//! Spring and JPA conventions: stereotypes, request mappings, repository
//! interfaces, `@Query` and `@Table`.

use std::sync::LazyLock;

use regex::Regex;

use modernize_core::facts::{DatabaseOpKind, EndpointFacts, Stereotype};
use modernize_core::sql;
use modernize_core::text::{words, ScrubbedSource};

use crate::declarations::{Annotation, ParsedType, TypeKind};

static REPOSITORY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b((?:Jpa|Crud|PagingAndSorting|ListCrud|Mongo|Reactive)?Repository)\s*<\s*([\w.]+)\s*,\s*([\w.]+)\s*>").unwrap()
});

/// Stereotype from annotations, falling back to the type name suffix.
pub fn stereotype(ty: &ParsedType, code: &str) -> Option<Stereotype> {
    for annotation in &ty.annotations {
        let found = match annotation.name.as_str() {
            "RestController" | "Controller" => Some(Stereotype::Controller),
            "Service" => Some(Stereotype::Service),
            "Repository" => Some(Stereotype::Repository),
            "Entity" | "Embeddable" | "MappedSuperclass" => Some(Stereotype::Entity),
            "Configuration" | "SpringBootApplication" => Some(Stereotype::Configuration),
            "Component" => Some(Stereotype::Component),
            _ => None,
        };
        if found.is_some() {
            return found;
        }
    }

    if ty.kind == TypeKind::Interface && repository_entity(&code[ty.header.clone()]).is_some() {
        return Some(Stereotype::Repository);
    }

    let name = ty.facts.name.as_str();
    if name.ends_with("Controller") || name.ends_with("Resource") {
        Some(Stereotype::Controller)
    } else if name.ends_with("Service") || name.ends_with("ServiceImpl") {
        Some(Stereotype::Service)
    } else if name.ends_with("Repository") || name.ends_with("Dao") || name.ends_with("DAO") {
        Some(Stereotype::Repository)
    } else if name.ends_with("Config") || name.ends_with("Configuration") {
        Some(Stereotype::Configuration)
    } else {
        None
    }
}

/// `(raw, entity)` for a header extending a Spring Data repository.
pub fn repository_entity(header: &str) -> Option<(String, String)> {
    let caps = REPOSITORY_RE.captures(header)?;
    let raw = format!("{}<{}, {}>", &caps[1], &caps[2], &caps[3]);
    let entity = caps[2].rsplit('.').next().unwrap_or(&caps[2]).to_string();
    Some((raw, entity))
}

/// String value of attribute `keys` of an annotation, or its positional value.
///
/// `@Table(name = "CLIENTES")` answers `name`; `@GetMapping("/x")` answers
/// the positional value.
pub fn attribute(scrubbed: &ScrubbedSource, annotation: &Annotation, keys: &[&str]) -> Option<String> {
    let args = annotation.args.clone()?;
    let code = scrubbed.code.as_str();
    for (offset, word) in words(&code[args.clone()]) {
        let at = args.start + offset;
        let after = code[at + word.len()..args.end].trim_start();
        if keys.contains(&word) && after.starts_with('=') {
            return scrubbed
                .literals_in(at..args.end)
                .next()
                .map(|lit| lit.value.clone());
        }
    }
    let first = scrubbed.literals_in(args.clone()).next()?;
    let before = &code[args.start..first.span.start];
    (!before.contains('=')).then(|| first.value.clone())
}

fn find<'a>(annotations: &'a [Annotation], names: &[&str]) -> Option<&'a Annotation> {
    annotations.iter().find(|a| names.contains(&a.name.as_str()))
}

/// Value of `@Table(name = ...)`.
pub fn table_name(scrubbed: &ScrubbedSource, ty: &ParsedType) -> Option<String> {
    let table = find(&ty.annotations, &["Table"])?;
    attribute(scrubbed, table, &["name"]).filter(|name| !name.is_empty())
}

/// Path prefix from a type-level `@RequestMapping`.
pub fn base_path(scrubbed: &ScrubbedSource, ty: &ParsedType) -> Option<String> {
    let mapping = find(&ty.annotations, &["RequestMapping"])?;
    attribute(scrubbed, mapping, &["value", "path"])
}

/// HTTP method for a mapping annotation.
fn http_method(scrubbed: &ScrubbedSource, annotation: &Annotation) -> Option<String> {
    let method = match annotation.name.as_str() {
        "GetMapping" => "GET",
        "PostMapping" => "POST",
        "PutMapping" => "PUT",
        "DeleteMapping" => "DELETE",
        "PatchMapping" => "PATCH",
        "RequestMapping" => {
            let code = scrubbed.code.as_str();
            let explicit = annotation.args.clone().and_then(|args| {
                let mut previous = None;
                words(&code[args])
                    .find_map(|(_, w)| (previous.replace(w) == Some("RequestMethod")).then_some(w))
            });
            return Some(explicit.unwrap_or("ANY").to_ascii_uppercase());
        }
        _ => return None,
    };
    Some(method.to_string())
}

/// Join a base path and a method path into a single absolute path.
pub fn join_paths(base: Option<&str>, path: Option<&str>) -> String {
    let mut joined = String::new();
    for part in [base, path].into_iter().flatten() {
        let part = part.trim().trim_matches('/');
        if !part.is_empty() {
            joined.push('/');
            joined.push_str(part);
        }
    }
    if joined.is_empty() {
        joined.push('/');
    }
    joined
}

/// Endpoint exposed by a method, if it carries a mapping annotation.
pub fn endpoint(
    scrubbed: &ScrubbedSource,
    base: Option<&str>,
    annotations: &[Annotation],
) -> Option<EndpointFacts> {
    annotations.iter().find_map(|annotation| {
        let http_method = http_method(scrubbed, annotation)?;
        let path = attribute(scrubbed, annotation, &["value", "path"]);
        Some(EndpointFacts {
            http_method,
            path: join_paths(base, path.as_deref()),
        })
    })
}

/// A `@Query` on a method: the literal index and its statement text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryAnnotation {
    pub literal_index: usize,
    pub text: String,
    pub kind: DatabaseOpKind,
    pub table: Option<String>,
}

/// Statement declared by `@Query`; JPQL keeps its SQL verb.
pub fn query(scrubbed: &ScrubbedSource, annotations: &[Annotation]) -> Option<QueryAnnotation> {
    let annotation = find(annotations, &["Query", "NativeQuery"])?;
    let text = attribute(scrubbed, annotation, &["value"])?;
    let literal_index = scrubbed
        .literals
        .iter()
        .position(|lit| annotation.args.as_ref().is_some_and(|a| a.contains(&lit.span.start)))?;
    let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
    let kind = sql::statement_kind(&text).unwrap_or(DatabaseOpKind::OtherSql);
    Some(QueryAnnotation {
        literal_index,
        table: sql::referenced_table(&text),
        text,
        kind,
    })
}
