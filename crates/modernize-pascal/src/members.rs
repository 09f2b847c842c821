//! Class declarations and the members of their bodies.
//!
//! A class is found by its `Name = class` introducer and its body runs to the
//! matching `end`. Nested `record` blocks open a level; another class
//! introducer, a section keyword or `begin` before the matching `end` means
//! the body was never terminated. In that case the members read so far are
//! kept and the unit gets a malformed-construct diagnostic.

use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;

use modernize_core::config::ExtractorConfig;
use modernize_core::facts::{
    ClassFacts, DatabaseOpFacts, DatabaseOpKind, Diagnostic, FieldFacts, Visibility,
};
use modernize_core::text::{
    find_matching, next_word, prev_significant, scan_block, split_top_level, words, BlockEnd,
    BlockStep, ScrubbedSource,
};

use crate::routines::{is_identifier, leading_word, parse_header, routine_kind, squash, DIRECTIVES};

static CLASS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b([A-Za-z_]\w*)\s*=\s*(?:packed\s+)?class\b").unwrap());

static OTHER_TYPE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)=\s*(?:packed\s+)?(record|object|interface|dispinterface)\b").unwrap()
});

const PROPERTY_SPECIFIERS: &[&str] = &[
    "read",
    "write",
    "default",
    "nodefault",
    "stored",
    "index",
    "implements",
];

/// A class declaration with the byte ranges the unit walk must skip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassDecl {
    pub facts: ClassFacts,
    /// From the introducer to the end of the declaration.
    pub span: Range<usize>,
    pub terminated: bool,
    /// Dataset component fields as data-access operations.
    pub components: Vec<DatabaseOpFacts>,
}

// ============================================================================
// Discovery
// ============================================================================

fn class_body_step(code: &str, word: &str, start: usize, end: usize) -> BlockStep {
    match word.to_ascii_lowercase().as_str() {
        "end" => BlockStep::Close,
        "record" => BlockStep::Open,
        "class" => {
            let introduces_type = prev_significant(code, start) == Some('=')
                && !next_word(code, end).is_some_and(|(_, w)| w.eq_ignore_ascii_case("of"));
            if introduces_type {
                BlockStep::Abort
            } else {
                BlockStep::Skip
            }
        }
        "implementation" | "initialization" | "finalization" | "begin" => BlockStep::Abort,
        _ => BlockStep::Skip,
    }
}

/// Find every class declaration in the scrubbed unit, in source order.
///
/// Forward declarations (`TFoo = class;`), class references (`class of`) and
/// class helpers are not declarations. Unterminated bodies push a diagnostic.
pub fn find_classes(
    scrubbed: &ScrubbedSource,
    path: &str,
    config: &ExtractorConfig,
    diagnostics: &mut Vec<Diagnostic>,
) -> Vec<ClassDecl> {
    let code = scrubbed.code.as_str();
    let mut classes: Vec<ClassDecl> = Vec::new();

    for caps in CLASS_RE.captures_iter(code) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        if classes.iter().any(|c| c.span.contains(&whole.start()) && c.terminated) {
            continue;
        }
        let mut cursor = whole.end();

        // Modifiers, references and helpers.
        if let Some((at, word)) = next_word(code, cursor) {
            match word.to_ascii_lowercase().as_str() {
                "of" | "helper" => continue,
                "abstract" | "sealed" => cursor = at + word.len(),
                _ => {}
            }
        }
        let after = code[cursor..].trim_start();
        if after.starts_with(';') {
            continue;
        }

        let mut class = ClassFacts::new(name.as_str());
        class.line = scrubbed.line_at(name.start());

        if after.starts_with('(') {
            let open = code.len() - after.len();
            let close = find_matching(code, open, '(', ')').unwrap_or(code.len());
            let mut ancestors = split_top_level(&code[open + 1..close.max(open + 1)], ',')
                .into_iter()
                .map(squash);
            class.parent = ancestors.next();
            class.interfaces = ancestors.collect();
            cursor = (close + 1).min(code.len());
            if code[cursor..].trim_start().starts_with(';') {
                finish_roles(&mut class, false, config);
                classes.push(ClassDecl {
                    facts: class,
                    span: whole.start()..cursor,
                    terminated: true,
                    components: Vec::new(),
                });
                continue;
            }
        }

        let scan = scan_block(code, cursor, |word, start, end| {
            class_body_step(code, word, start, end)
        });
        let (body_end, span_end, terminated) = match scan.end {
            BlockEnd::Closed(end) => (end - "end".len(), end, true),
            BlockEnd::Aborted(at) => (at, at, false),
            BlockEnd::Eof => (code.len(), code.len(), false),
        };
        if !terminated {
            warn!(class = %class.name, path, "class declaration has no terminating end");
            diagnostics.push(Diagnostic::malformed(
                path,
                format!("class '{}' has no terminating end", class.name),
                class.line,
            ));
        }

        let components = read_members(scrubbed, cursor..body_end, &mut class, config);
        finish_roles(&mut class, !components.is_empty(), config);
        classes.push(ClassDecl {
            facts: class,
            span: whole.start()..span_end,
            terminated,
            components,
        });
    }
    classes
}

fn finish_roles(class: &mut ClassFacts, has_components: bool, config: &ExtractorConfig) {
    if let Some(parent) = class.parent.as_deref() {
        class.is_form_like = config.is_form_supertype(parent);
        class.is_data_module = config.is_data_module_supertype(parent);
    }
    class.is_data_access_like = class.is_data_module || has_components;
}

/// Byte ranges of `record`, `object` and `interface` type bodies.
///
/// Their members look like routine declarations, so the unit walk skips them.
pub fn find_other_types(code: &str) -> Vec<Range<usize>> {
    let mut ranges: Vec<Range<usize>> = Vec::new();
    for m in OTHER_TYPE_RE.find_iter(code) {
        if ranges.iter().any(|r| r.contains(&m.start())) {
            continue;
        }
        let after = code[m.end()..].trim_start();
        if after.starts_with(';') {
            continue;
        }
        let scan = scan_block(code, m.end(), |word, _, _| {
            match word.to_ascii_lowercase().as_str() {
                "end" => BlockStep::Close,
                "record" => BlockStep::Open,
                "implementation" | "begin" => BlockStep::Abort,
                _ => BlockStep::Skip,
            }
        });
        ranges.push(m.start()..scan.body_end(code.len()));
    }
    ranges
}

// ============================================================================
// Members
// ============================================================================

fn push_piece<'a>(code: &'a str, range: Range<usize>, pieces: &mut Vec<(usize, &'a str)>) {
    let raw = &code[range.clone()];
    let trimmed = raw.trim_start();
    let offset = range.start + (raw.len() - trimmed.len());
    let trimmed = trimmed.trim_end();
    if !trimmed.is_empty() {
        pieces.push((offset, trimmed));
    }
}

/// Split `range` on top-level `;`, yielding trimmed pieces and their offsets.
fn split_declarations(code: &str, range: Range<usize>) -> Vec<(usize, &str)> {
    let mut pieces = Vec::new();
    let mut depth = 0u32;
    let mut start = range.start;
    for (i, ch) in code[range.clone()].char_indices() {
        let at = range.start + i;
        match ch {
            '(' | '[' => depth += 1,
            ')' | ']' => depth = depth.saturating_sub(1),
            ';' if depth == 0 => {
                push_piece(code, start..at, &mut pieces);
                start = at + 1;
            }
            _ => {}
        }
    }
    push_piece(code, start..range.end, &mut pieces);
    pieces
}

fn visibility_keyword(word: &str) -> Option<Visibility> {
    match word.to_ascii_lowercase().as_str() {
        "private" => Some(Visibility::Private),
        "protected" => Some(Visibility::Protected),
        "public" | "automated" => Some(Visibility::Public),
        "published" => Some(Visibility::Published),
        _ => None,
    }
}

fn count_words(text: &str, keyword: &str) -> usize {
    words(text)
        .filter(|(_, w)| w.eq_ignore_ascii_case(keyword))
        .count()
}

/// Parse the declarations of a class body into `class`.
///
/// Returns the dataset component fields as data-access operations.
fn read_members(
    scrubbed: &ScrubbedSource,
    body: Range<usize>,
    class: &mut ClassFacts,
    config: &ExtractorConfig,
) -> Vec<DatabaseOpFacts> {
    let code = scrubbed.code.as_str();
    let mut components = Vec::new();
    let mut visibility = Visibility::Published;
    let mut record_depth = 0usize;
    let mut skipping_section = false;

    for (offset, piece) in split_declarations(code, body) {
        let opens = count_words(piece, "record");
        let closes = count_words(piece, "end");
        if record_depth > 0 {
            record_depth = (record_depth + opens).saturating_sub(closes);
            continue;
        }

        // Leading visibility and section keywords.
        let mut text = piece;
        let mut text_offset = offset;
        let mut class_level = false;
        while let Some((word, rest)) = leading_word(text) {
            match word.to_ascii_lowercase().as_str() {
                "strict" => {}
                "var" => skipping_section = false,
                "const" | "type" => skipping_section = true,
                "class" if !class_level => class_level = true,
                _ => match visibility_keyword(word) {
                    Some(v) => {
                        visibility = v;
                        skipping_section = false;
                    }
                    None => break,
                },
            }
            let rest = rest.trim_start();
            text_offset += text.len() - rest.len();
            text = rest;
        }
        if text.is_empty() {
            continue;
        }
        let line = scrubbed.line_at(text_offset);
        let first = leading_word(text).map(|(w, _)| w.to_ascii_lowercase());

        if routine_kind(first.as_deref().unwrap_or_default()).is_some() {
            skipping_section = false;
            if let Some(header) = parse_header(text) {
                let mut method = header.to_facts(line);
                method.owner = Some(class.name.clone());
                method.visibility = Some(visibility);
                method.is_class_level = class_level;
                method.is_event_handler = config.is_event_handler(&method.name)
                    || method
                        .params
                        .iter()
                        .any(|p| p.name.eq_ignore_ascii_case("Sender"));
                class.methods.push(method);
            }
            continue;
        }

        if let Some(first) = first.as_deref() {
            if DIRECTIVES.contains(&first) {
                if let Some(last) = class.methods.last_mut() {
                    last.directives.push(first.to_string());
                }
                continue;
            }
            if first == "property" {
                if let Some(field) = parse_property(text, visibility, line) {
                    class.fields.push(field);
                }
                continue;
            }
        }
        if skipping_section {
            continue;
        }

        let Some((names, type_text)) = text.split_once(':') else {
            continue;
        };
        let type_text = if opens > 0 {
            record_depth = opens.saturating_sub(closes);
            "record".to_string()
        } else {
            squash(type_text.split('=').next().unwrap_or_default())
        };
        let type_name = (!type_text.is_empty()).then_some(type_text);
        for name in names.split(',').map(str::trim) {
            if !is_identifier(name) {
                continue;
            }
            if let Some(ty) = type_name.as_deref() {
                if config.is_dataset_component(ty) {
                    components.push(DatabaseOpFacts {
                        kind: DatabaseOpKind::Component,
                        raw: format!("{name}: {ty}"),
                        table: None,
                        component_type: Some(ty.to_string()),
                        owner: Some(class.name.clone()),
                        line,
                    });
                }
            }
            class.fields.push(FieldFacts {
                name: name.to_string(),
                type_name: type_name.clone(),
                visibility,
                is_property: false,
                annotations: Vec::new(),
                line,
            });
        }
    }
    components
}

/// Parse `property Name[Index: Integer]: Type read FName write SetName`.
///
/// A redeclared property without a type (`property Caption;`) keeps `None`.
fn parse_property(text: &str, visibility: Visibility, line: u32) -> Option<FieldFacts> {
    let (_, rest) = leading_word(text)?;
    let (name, mut rest) = leading_word(rest)?;
    rest = rest.trim_start();
    if rest.starts_with('[') {
        let close = find_matching(rest, 0, '[', ']')?;
        rest = rest[close + 1..].trim_start();
    }
    let type_name = rest.strip_prefix(':').and_then(|ty| {
        let cut = words(ty)
            .find(|(_, w)| PROPERTY_SPECIFIERS.iter().any(|s| w.eq_ignore_ascii_case(s)))
            .map_or(ty.len(), |(at, _)| at);
        let ty = squash(&ty[..cut]);
        (!ty.is_empty()).then_some(ty)
    });
    Some(FieldFacts {
        name: name.to_string(),
        type_name,
        visibility,
        is_property: true,
        annotations: Vec::new(),
        line,
    })
}
