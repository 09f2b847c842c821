//! Target naming: a pure transform from a source name and a target kind.
//!
//! 1. Strip one leading type-prefix character when followed by uppercase
//!    (`TClienteForm` -> `ClienteForm`)
//! 2. Strip one role prefix when followed by uppercase (`btnSalvar` -> `Salvar`)
//! 3. Strip one role suffix (`ClienteForm` -> `Cliente`)
//! 4. Capitalize and append the canonical suffix of the kind, unless present

use crate::config::MapperConfig;

use super::TargetKind;

/// Generated target name for `source` mapped to `kind`.
pub fn target_name(source: &str, kind: TargetKind, config: &MapperConfig) -> String {
    let base = strip_decorations(source, config);
    let base = if base.is_empty() { source } else { base };
    let mut name = capitalize(base);
    let suffix = kind.canonical_suffix();
    if !suffix.is_empty() && !ends_with_ignore_case(&name, suffix) {
        name.push_str(suffix);
    }
    name
}

/// Target name of the repository for a table (`dbo.CLIENTES` -> `ClientesRepository`).
pub fn repository_name(table: &str) -> String {
    let last = table.rsplit('.').next().unwrap_or(table);
    let mut name: String = last
        .split(|c: char| c == '_' || c == ' ' || c == '-')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let lower = part.to_lowercase();
            capitalize(&lower)
        })
        .collect();
    if name.is_empty() {
        name.push_str("Table");
    }
    name.push_str(TargetKind::Repository.canonical_suffix());
    name
}

/// Source name without type prefix, role prefix and role suffix.
pub fn strip_decorations<'a>(source: &'a str, config: &MapperConfig) -> &'a str {
    let mut name = source.trim();

    let mut chars = name.chars();
    if let (Some(first), Some(second)) = (chars.next(), chars.next()) {
        if config.type_prefix_chars.contains(first) && second.is_uppercase() {
            name = &name[first.len_utf8()..];
        }
    }

    for prefix in &config.role_prefixes {
        if let Some(rest) = strip_prefix_ignore_case(name, prefix) {
            if rest.chars().next().is_some_and(char::is_uppercase) {
                name = rest;
                break;
            }
        }
    }

    for suffix in &config.role_suffixes {
        if name.len() > suffix.len() && ends_with_ignore_case(name, suffix) {
            name = &name[..name.len() - suffix.len()];
            break;
        }
    }

    name
}

fn strip_prefix_ignore_case<'a>(name: &'a str, prefix: &str) -> Option<&'a str> {
    let head = name.get(..prefix.len())?;
    if head.eq_ignore_ascii_case(prefix) {
        name.get(prefix.len()..)
    } else {
        None
    }
}

fn ends_with_ignore_case(name: &str, suffix: &str) -> bool {
    name.len() >= suffix.len()
        && name
            .get(name.len() - suffix.len()..)
            .is_some_and(|tail| tail.eq_ignore_ascii_case(suffix))
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
