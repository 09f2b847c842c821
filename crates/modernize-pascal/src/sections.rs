//! Unit header, section boundaries and `uses` clauses.

use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;

use modernize_core::facts::{DependencyRef, DependencyScope};
use modernize_core::text::{prev_significant, split_top_level, words};

static HEADER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^\s*(unit|program|library|package)\s+([A-Za-z_][\w.]*)\s*;").unwrap()
});

/// Kind of compilation unit named by the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderKind {
    Unit,
    Program,
    Library,
    Package,
}

/// The `unit X;` / `program X;` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitHeader {
    pub kind: HeaderKind,
    pub name: String,
    /// Offset just past the terminating `;`.
    pub end: usize,
}

/// Find the header in scrubbed code.
pub fn parse_header(code: &str) -> Option<UnitHeader> {
    let caps = HEADER_RE.captures(code)?;
    let kind = match caps[1].to_ascii_lowercase().as_str() {
        "unit" => HeaderKind::Unit,
        "program" => HeaderKind::Program,
        "library" => HeaderKind::Library,
        _ => HeaderKind::Package,
    };
    Some(UnitHeader {
        kind,
        name: caps[2].to_string(),
        end: caps.get(0).map_or(0, |m| m.end()),
    })
}

/// Byte ranges of the unit sections.
///
/// A program or library has no `interface`/`implementation` split; everything
/// after the header is treated as implementation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sections {
    pub interface: Option<Range<usize>>,
    pub implementation: Option<Range<usize>>,
    /// `initialization` and `finalization` blocks together.
    pub tail: Option<Range<usize>>,
}

impl Sections {
    /// True when `offset` lies in the interface section.
    pub fn in_interface(&self, offset: usize) -> bool {
        self.interface.as_ref().is_some_and(|r| r.contains(&offset))
    }

    /// Where implementation code may appear, falling back to the whole text.
    pub fn implementation_range(&self, len: usize) -> Range<usize> {
        self.implementation.clone().unwrap_or(0..len)
    }
}

/// Locate the section keywords after `header_end`.
///
/// `interface` only counts as a section keyword at statement start, so the
/// word inside `IInterface` or a `= interface` type declaration is ignored.
pub fn find_sections(code: &str, header_end: usize) -> Sections {
    let mut interface_at = None;
    let mut implementation_at = None;
    let mut tail_at = None;
    for (offset, word) in words(&code[header_end..]) {
        let at = header_end + offset;
        let lower = word.to_ascii_lowercase();
        match lower.as_str() {
            "interface"
                if interface_at.is_none()
                    && implementation_at.is_none()
                    && matches!(prev_significant(code, at), None | Some(';')) =>
            {
                interface_at = Some(at + word.len());
            }
            "implementation" if implementation_at.is_none() => {
                implementation_at = Some(at);
            }
            "initialization" | "finalization" if implementation_at.is_some() && tail_at.is_none() => {
                tail_at = Some(at);
            }
            _ => {}
        }
    }

    let len = code.len();
    let mut sections = Sections::default();
    match (interface_at, implementation_at) {
        (Some(start), Some(impl_at)) => {
            sections.interface = Some(start..impl_at);
            let impl_start = impl_at + "implementation".len();
            sections.implementation = Some(impl_start..tail_at.unwrap_or(len));
        }
        (Some(start), None) => {
            sections.interface = Some(start..len);
        }
        (None, Some(impl_at)) => {
            let impl_start = impl_at + "implementation".len();
            sections.implementation = Some(impl_start..tail_at.unwrap_or(len));
        }
        (None, None) => {
            sections.implementation = Some(header_end..len);
        }
    }
    if let Some(tail) = tail_at {
        sections.tail = Some(tail..len);
    }
    sections
}

/// Every `uses` clause in declaration order, deduplicated by name.
///
/// Items may carry a file path (`Unit1 in 'Unit1.pas'`); only the name is
/// kept. Clauses before the implementation section, or in a program header,
/// get [`DependencyScope::Interface`].
pub fn parse_uses(code: &str, sections: &Sections) -> Vec<DependencyRef> {
    let mut deps: Vec<DependencyRef> = Vec::new();
    let implementation_start = sections.implementation.as_ref().map(|r| r.start);
    let program_like = sections.interface.is_none();

    for (offset, word) in words(code) {
        if !word.eq_ignore_ascii_case("uses") {
            continue;
        }
        let clause_start = offset + word.len();
        let clause_end = code[clause_start..]
            .find(';')
            .map_or(code.len(), |i| clause_start + i);
        let scope = match implementation_start {
            Some(start) if offset >= start && !program_like => DependencyScope::Implementation,
            _ => DependencyScope::Interface,
        };
        for item in split_top_level(&code[clause_start..clause_end], ',') {
            let Some(name) = leading_dotted(item) else {
                continue;
            };
            if !deps.iter().any(|d| d.name.eq_ignore_ascii_case(name)) {
                deps.push(DependencyRef {
                    name: name.to_string(),
                    scope,
                });
            }
        }
    }
    deps
}

/// Leading dotted identifier (`Vcl.Forms`) of `text`.
fn leading_dotted(text: &str) -> Option<&str> {
    let text = text.trim_start();
    let len = text
        .char_indices()
        .find(|(_, c)| !(c.is_alphanumeric() || *c == '_' || *c == '.'))
        .map_or(text.len(), |(i, _)| i);
    let name = text[..len].trim_matches('.');
    name.starts_with(|c: char| c.is_alphabetic() || c == '_')
        .then_some(name)
}
