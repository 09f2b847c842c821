//! Object Pascal / Delphi structural extractor.
//!
//! Turns one `.pas`/`.dpr` file into [`UnitFacts`] without a full parser.
//! Comments and literal contents are masked first; every scan below then runs
//! over the masked text, so a keyword inside a string or comment never counts.
//!
//! | Step | Module |
//! |------|--------|
//! | header, sections, `uses` | [`sections`] |
//! | class declarations, fields, properties, method headers | [`members`] |
//! | routine headers, bodies, complexity, calls | [`routines`] |
//! | dataset calls, transactions, SQL literals | [`data`] |
//!
//! Block scans are counter-based and single-pass: an unterminated class or
//! routine consumes to the end of its section and leaves a diagnostic, never
//! an error.

pub mod data;
pub mod members;
pub mod routines;
pub mod sections;

use std::collections::HashMap;
use std::ops::Range;
use std::path::Path;

use tracing::{debug, warn};

use modernize_core::adapter::{push_unique, unit_name_from_path, StructuralExtractor};
use modernize_core::config::ExtractorConfig;
use modernize_core::facts::{
    Diagnostic, Language, RoutineFacts, SizeMetrics, UnitFacts, UnitKind, Visibility,
};
use modernize_core::text::{next_word, words, ScrubbedSource, Syntax};

use crate::data::OwnerSpan;
use crate::members::ClassDecl;
use crate::routines::{
    class_prefix_start, is_routine_start, parse_header, parse_routines, routine_kind,
    statement_end, ParsedRoutine,
};
use crate::sections::{HeaderKind, Sections};

/// Structural extractor for Object Pascal units, programs and packages.
#[derive(Debug, Clone, Default)]
pub struct PascalExtractor {
    config: ExtractorConfig,
}

impl PascalExtractor {
    pub fn new(config: ExtractorConfig) -> Self {
        PascalExtractor { config }
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }
}

impl StructuralExtractor for PascalExtractor {
    fn extract_unit(&self, path: &str, text: &str) -> UnitFacts {
        let unit = UnitScan::new(&self.config, path, text).run();
        debug!(
            unit = %unit.name,
            kind = unit.kind.as_str(),
            classes = unit.classes.len(),
            routines = unit.routines.len(),
            diagnostics = unit.diagnostics.len(),
            "extracted pascal unit"
        );
        unit
    }

    fn language(&self) -> Language {
        Language::Pascal
    }
}

// ============================================================================
// Unit Scan
// ============================================================================

/// State of one file's extraction.
struct UnitScan<'a> {
    config: &'a ExtractorConfig,
    path: &'a str,
    scrubbed: ScrubbedSource,
    diagnostics: Vec<Diagnostic>,
    max_depth: u32,
}

fn in_ranges(ranges: &[Range<usize>], offset: usize) -> Option<&Range<usize>> {
    ranges.iter().find(|r| r.contains(&offset))
}

impl<'a> UnitScan<'a> {
    fn new(config: &'a ExtractorConfig, path: &'a str, text: &str) -> Self {
        UnitScan {
            config,
            path,
            scrubbed: ScrubbedSource::new(text, Syntax::Pascal),
            diagnostics: Vec::new(),
            max_depth: 0,
        }
    }

    fn run(mut self) -> UnitFacts {
        let code_len = self.scrubbed.code.len();
        let header = sections::parse_header(&self.scrubbed.code);
        let name = header
            .as_ref()
            .map(|h| h.name.clone())
            .unwrap_or_else(|| unit_name_from_path(self.path));
        let mut unit = UnitFacts::new(name, self.path, Language::Pascal);

        let sections = sections::find_sections(
            &self.scrubbed.code,
            header.as_ref().map_or(0, |h| h.end),
        );
        unit.dependencies = sections::parse_uses(&self.scrubbed.code, &sections);

        let mut classes =
            members::find_classes(&self.scrubbed, self.path, self.config, &mut self.diagnostics);
        let mut skipped: Vec<Range<usize>> = classes.iter().map(|c| c.span.clone()).collect();
        skipped.extend(members::find_other_types(&self.scrubbed.code));

        let mut free = FreeRoutines::default();
        for routine in self.interface_routines(&sections, &skipped) {
            free.push(routine);
        }

        let implementation = sections.implementation_range(code_len);
        let parsed = self.implementation_routines(implementation.clone(), &skipped);
        let mut owners = Vec::new();
        for routine in &parsed {
            self.attach(routine, &mut classes, &mut free, &mut owners);
        }
        unit.routines = free.routines;

        // Data access: class components, then calls and SQL in code order.
        let components = data::component_names(&self.scrubbed.code, self.config);
        let mut regions = vec![implementation];
        regions.extend(sections.tail.clone());
        let mut ops: Vec<_> = classes
            .iter()
            .flat_map(|c| c.components.iter().cloned())
            .collect();
        ops.extend(data::find_calls(
            &self.scrubbed,
            &regions,
            &components,
            &owners,
            self.config,
        ));
        ops.extend(data::find_sql(&self.scrubbed, &owners));
        ops.sort_by_key(|op| op.line);
        unit.database_ops = ops;

        unit.classes = classes.into_iter().map(|c| c.facts).collect();
        if unit.database_ops.iter().any(|op| op.kind.is_sql()) {
            for class in &mut unit.classes {
                let name = class.name.to_ascii_lowercase();
                let owns_sql = unit.database_ops.iter().any(|op| {
                    op.kind.is_sql()
                        && op.owner.as_deref().is_some_and(|o| {
                            o.to_ascii_lowercase().starts_with(&format!("{name}."))
                        })
                });
                class.is_data_access_like |= owns_sql;
            }
        }

        unit.kind = self.classify(&unit, header.as_ref().map(|h| h.kind));

        let (total, code, comment, blank) = self.scrubbed.line_counts();
        unit.metrics = SizeMetrics {
            total_lines: total,
            code_lines: code,
            comment_lines: comment,
            blank_lines: blank,
            max_nesting_depth: self.max_depth,
        };
        unit.diagnostics = self.diagnostics;
        unit
    }

    /// Free routines declared in the interface section.
    fn interface_routines(
        &self,
        sections: &Sections,
        skipped: &[Range<usize>],
    ) -> Vec<RoutineFacts> {
        let Some(interface) = sections.interface.clone() else {
            return Vec::new();
        };
        let code = self.scrubbed.code.as_str();
        let mut routines = Vec::new();
        let mut cursor = interface.start;
        while let Some((offset, word)) = words(&code[cursor..interface.end]).next() {
            let at = cursor + offset;
            cursor = at + word.len();
            if let Some(range) = in_ranges(skipped, at) {
                cursor = range.end.clamp(cursor, interface.end);
                continue;
            }
            if routine_kind(word).is_none() || !is_routine_start(code, at) {
                continue;
            }
            let end = statement_end(code, at, interface.end);
            let Some(header) = parse_header(&code[at..end]) else {
                continue;
            };
            let mut routine = header.to_facts(self.scrubbed.line_at(at));
            routine.visibility = Some(Visibility::Public);
            cursor = (end + 1).min(interface.end);

            while let Some((word_at, directive)) = next_word(&code[..interface.end], cursor) {
                if !routines::DIRECTIVES.iter().any(|d| directive.eq_ignore_ascii_case(d)) {
                    break;
                }
                routine.directives.push(directive.to_ascii_lowercase());
                cursor = (statement_end(code, word_at, interface.end) + 1).min(interface.end);
            }
            routines.push(routine);
        }
        routines
    }

    /// Top-level routines of the implementation section, in source order.
    fn implementation_routines(
        &self,
        range: Range<usize>,
        skipped: &[Range<usize>],
    ) -> Vec<ParsedRoutine> {
        let code = self.scrubbed.code.as_str();
        let mut parsed = Vec::new();
        let mut cursor = range.start;
        while let Some((offset, word)) = words(&code[cursor..range.end]).next() {
            let at = cursor + offset;
            cursor = at + word.len();
            if let Some(skip) = in_ranges(skipped, at) {
                cursor = skip.end.clamp(cursor, range.end);
                continue;
            }
            if routine_kind(word).is_none() || !is_routine_start(code, at) {
                continue;
            }
            let start = class_prefix_start(code, at).unwrap_or(at);
            let found = parse_routines(code, start, range.end, self.config.max_nesting_depth);
            if let Some(end) = found.iter().map(|r| r.end).max() {
                cursor = end.max(cursor);
            }
            parsed.extend(found);
        }
        parsed
    }

    /// Facts of one parsed routine; records nesting depth and diagnostics.
    fn routine_facts(&mut self, parsed: &ParsedRoutine) -> RoutineFacts {
        let mut routine = parsed.header.to_facts(self.scrubbed.line_at(parsed.start));
        routine.directives = parsed.directives.clone();
        if let Some(body) = parsed.body.clone() {
            let text = &self.scrubbed.code[body];
            routine.has_body = true;
            routine.complexity = routines::complexity(text);
            routine.call_hints = routines::call_hints(text);
            self.max_depth = self.max_depth.max(parsed.max_depth);
        }
        if parsed.unterminated {
            let what = if parsed.body.is_some() {
                "has no terminating end"
            } else {
                "has no body"
            };
            warn!(routine = %routine.name, path = self.path, "routine {what}");
            self.diagnostics.push(Diagnostic::malformed(
                self.path,
                format!("routine '{}' {what}", qualified_name(&routine)),
                routine.line,
            ));
        }
        if parsed.nesting_capped {
            let depth = self.config.max_nesting_depth;
            warn!(routine = %routine.name, path = self.path, depth, "routine nesting capped");
            self.diagnostics.push(Diagnostic::malformed(
                self.path,
                format!(
                    "routine '{}' nests deeper than {depth} levels",
                    qualified_name(&routine)
                ),
                routine.line,
            ));
        }
        routine.is_event_handler = self.config.is_event_handler(&routine.name)
            || routine
                .params
                .iter()
                .any(|p| p.name.eq_ignore_ascii_case("Sender"));
        routine
    }

    /// Merge a parsed implementation into its declaration, or add it.
    fn attach(
        &mut self,
        parsed: &ParsedRoutine,
        classes: &mut [ClassDecl],
        free: &mut FreeRoutines,
        owners: &mut Vec<OwnerSpan>,
    ) {
        let routine = self.routine_facts(parsed);
        owners.push(OwnerSpan {
            range: parsed.start..parsed.end,
            name: qualified_name(&routine),
        });

        // Nested routines at every depth, in source order.
        let mut pending: Vec<&ParsedRoutine> = parsed.nested.iter().rev().collect();
        while let Some(nested) = pending.pop() {
            let mut facts = self.routine_facts(nested);
            facts.visibility = Some(Visibility::Private);
            facts.directives.push("nested".to_string());
            owners.push(OwnerSpan {
                range: nested.start..nested.end,
                name: facts.name.clone(),
            });
            free.push(facts);
            pending.extend(nested.nested.iter().rev());
        }

        let class_index = routine.owner.as_deref().and_then(|owner| {
            let simple = owner.rsplit('.').next().unwrap_or(owner);
            classes
                .iter()
                .position(|c| c.facts.name.eq_ignore_ascii_case(simple))
        });
        match class_index {
            Some(index) => {
                let methods = &mut classes[index].facts.methods;
                match find_declaration(methods, 0..methods.len(), &routine) {
                    Some(declared) => absorb(&mut methods[declared], routine),
                    None => methods.push(routine),
                }
            }
            None if routine.owner.is_some() => free.push(routine),
            None => free.merge(routine, Some(Visibility::Private)),
        }
    }

    fn classify(&self, unit: &UnitFacts, header: Option<HeaderKind>) -> UnitKind {
        let stem = Path::new(self.path)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let has_token = |tokens: &[String]| {
            tokens
                .iter()
                .any(|t| stem.contains(t.to_ascii_lowercase().as_str()))
        };

        if unit.classes.iter().any(|c| c.is_form_like) {
            UnitKind::Form
        } else if unit.classes.iter().any(|c| c.is_data_module) {
            UnitKind::DataModule
        } else if has_token(&self.config.service_filename_tokens) {
            UnitKind::Service
        } else if has_token(&self.config.utility_filename_tokens) {
            UnitKind::Utility
        } else if header == Some(HeaderKind::Unit) {
            UnitKind::PlainUnit
        } else {
            UnitKind::Unknown
        }
    }
}

fn qualified_name(routine: &RoutineFacts) -> String {
    match &routine.owner {
        Some(owner) => format!("{owner}.{}", routine.name),
        None => routine.name.clone(),
    }
}

/// Free routines of a unit, indexed by lowercase name.
#[derive(Debug, Default)]
struct FreeRoutines {
    routines: Vec<RoutineFacts>,
    by_name: HashMap<String, Vec<usize>>,
}

impl FreeRoutines {
    fn push(&mut self, routine: RoutineFacts) {
        self.by_name
            .entry(routine.name.to_ascii_lowercase())
            .or_default()
            .push(self.routines.len());
        self.routines.push(routine);
    }

    /// Merge an implementation into its declaration, or add it with
    /// `visibility` when it has none.
    fn merge(&mut self, implementation: RoutineFacts, visibility: Option<Visibility>) {
        let candidates = self
            .by_name
            .get(&implementation.name.to_ascii_lowercase())
            .map(Vec::as_slice)
            .unwrap_or_default();
        match find_declaration(&self.routines, candidates.iter().copied(), &implementation) {
            Some(index) => absorb(&mut self.routines[index], implementation),
            None => {
                let mut implementation = implementation;
                if implementation.visibility.is_none() {
                    implementation.visibility = visibility;
                }
                self.push(implementation);
            }
        }
    }
}

/// Index of the bodyless declaration among `candidates` that `implementation`
/// belongs to.
///
/// A declaration matches by name and arity, else by name alone.
fn find_declaration(
    declared: &[RoutineFacts],
    candidates: impl Iterator<Item = usize> + Clone,
    implementation: &RoutineFacts,
) -> Option<usize> {
    let same_name = |i: &usize| {
        let r = &declared[*i];
        !r.has_body && r.name.eq_ignore_ascii_case(&implementation.name)
    };
    let by_arity = candidates
        .clone()
        .find(|i| same_name(i) && declared[*i].arity() == implementation.arity());
    // Implementations may omit the parameter list of a declared routine.
    match by_arity {
        None if implementation.params.is_empty() => candidates.clone().find(same_name),
        found => found,
    }
}

fn absorb(declaration: &mut RoutineFacts, implementation: RoutineFacts) {
    declaration.has_body = implementation.has_body;
    declaration.complexity = implementation.complexity;
    declaration.call_hints = implementation.call_hints;
    for directive in &implementation.directives {
        push_unique(&mut declaration.directives, directive);
    }
}
