//! Routine headers, parameter lists and bodies.
//!
//! Headers are parsed by hand rather than by regex: parameter groups are
//! separated by `;`, which a regex cannot tell apart from the header
//! terminator without tracking parenthesis depth.
//!
//! Bodies are isolated with [`scan_block`]: `begin`, `case`, `try` and `asm`
//! open a block, `end` closes one, and a section keyword aborts the scan. An
//! unterminated body consumes to the end of its section.

use std::ops::Range;

use modernize_core::facts::{Param, RoutineFacts, RoutineKind};
use modernize_core::text::{
    is_ident_char, next_word, prev_significant, scan_block, split_top_level, words, BlockEnd,
    BlockStep,
};

/// Branching keywords counted for the complexity estimate.
pub const BRANCH_KEYWORDS: &[&str] = &["if", "while", "for", "repeat", "case", "try", "and", "or"];

const PARAM_MODIFIERS: &[&str] = &["const", "var", "out", "constref"];

/// Routine directives recorded on [`RoutineFacts::directives`].
pub const DIRECTIVES: &[&str] = &[
    "virtual",
    "override",
    "abstract",
    "overload",
    "reintroduce",
    "dynamic",
    "static",
    "final",
    "inline",
    "stdcall",
    "cdecl",
    "register",
    "safecall",
    "pascal",
    "message",
    "deprecated",
    "platform",
    "experimental",
    "assembler",
    "varargs",
    "forward",
    "external",
];

/// Reserved words and intrinsics that never count as calls.
const NON_CALLS: &[&str] = &[
    "and", "array", "as", "asm", "begin", "case", "class", "const", "constructor", "destructor",
    "div", "do", "downto", "else", "end", "except", "exit", "file", "finally", "for", "function",
    "goto", "if", "in", "inherited", "is", "mod", "nil", "not", "of", "or", "procedure", "raise",
    "record", "repeat", "set", "shl", "shr", "then", "to", "try", "type", "until", "uses", "var",
    "while", "with", "xor", "result", "self", "true", "false", "break", "continue", "on",
];

/// Words after which an identifier starts a statement.
const STATEMENT_STARTERS: &[&str] = &[
    "begin", "then", "else", "do", "try", "finally", "except", "repeat",
];

fn is_one_of(word: &str, list: &[&str]) -> bool {
    list.iter().any(|k| word.eq_ignore_ascii_case(k))
}

/// Routine kind of a header keyword.
pub fn routine_kind(word: &str) -> Option<RoutineKind> {
    match word.to_ascii_lowercase().as_str() {
        "procedure" => Some(RoutineKind::Procedure),
        "function" => Some(RoutineKind::Function),
        "constructor" => Some(RoutineKind::Constructor),
        "destructor" => Some(RoutineKind::Destructor),
        _ => None,
    }
}

/// Leading identifier of `text` (after whitespace) and the rest.
pub fn leading_word(text: &str) -> Option<(&str, &str)> {
    let text = text.trim_start();
    let len = text
        .char_indices()
        .find(|(_, c)| !is_ident_char(*c))
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    if len == 0 {
        None
    } else {
        Some((&text[..len], &text[len..]))
    }
}

/// True when `text` is a plain identifier.
pub fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    matches!(chars.next(), Some(c) if c.is_alphabetic() || c == '_') && chars.all(is_ident_char)
}

/// Collapse runs of whitespace.
pub fn squash(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ============================================================================
// Headers
// ============================================================================

/// A parsed routine header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutineHeader {
    pub kind: RoutineKind,
    /// Qualifier of `TClass.Method`.
    pub owner: Option<String>,
    pub name: String,
    pub params: Vec<Param>,
    pub return_type: Option<String>,
    pub is_class_level: bool,
}

impl RoutineHeader {
    /// Facts for this header, declared at `line`.
    pub fn to_facts(&self, line: u32) -> RoutineFacts {
        let mut routine = RoutineFacts::new(self.name.clone(), self.kind);
        routine.owner = self.owner.clone();
        routine.params = self.params.clone();
        routine.return_type = self.return_type.clone();
        routine.is_class_level = self.is_class_level;
        routine.line = line;
        routine
    }
}

/// Parse `[class] procedure|function|constructor|destructor Name[(params)][: Type]`.
///
/// `text` must not extend past the header's terminating `;`.
pub fn parse_header(text: &str) -> Option<RoutineHeader> {
    let (mut word, mut rest) = leading_word(text)?;
    let is_class_level = word.eq_ignore_ascii_case("class");
    if is_class_level {
        (word, rest) = leading_word(rest)?;
    }
    let kind = routine_kind(word)?;

    let rest = rest.trim_start();
    let name_len = rest
        .char_indices()
        .find(|(_, c)| !(is_ident_char(*c) || *c == '.'))
        .map(|(i, _)| i)
        .unwrap_or(rest.len());
    let qualified = rest[..name_len].trim_matches('.');
    if qualified.is_empty() {
        return None;
    }
    let (owner, name) = match qualified.rsplit_once('.') {
        Some((owner, name)) => (Some(owner.to_string()), name.to_string()),
        None => (None, qualified.to_string()),
    };

    let mut rest = rest[name_len..].trim_start();
    let mut params = Vec::new();
    if rest.starts_with('(') {
        let close = modernize_core::text::find_matching(rest, 0, '(', ')').unwrap_or(rest.len());
        params = parse_params(&rest[1..close.max(1)]);
        rest = rest.get(close + 1..).unwrap_or("").trim_start();
    }

    let return_type = rest
        .strip_prefix(':')
        .map(squash)
        .filter(|t| !t.is_empty());

    Some(RoutineHeader {
        kind,
        owner,
        name,
        params,
        return_type,
        is_class_level,
    })
}

/// Parse a parameter list: `const A, B: Integer; var C; D: Double = 0`.
///
/// Groups split on top-level `;`, names on `,`. A missing type is kept as
/// `None`; default values are dropped.
pub fn parse_params(text: &str) -> Vec<Param> {
    let mut params = Vec::new();
    for group in split_top_level(text, ';') {
        let (modifier, group) = match leading_word(group) {
            Some((word, rest))
                if is_one_of(word, PARAM_MODIFIERS) && rest.starts_with(char::is_whitespace) =>
            {
                (Some(word.to_ascii_lowercase()), rest.trim_start())
            }
            _ => (None, group),
        };
        let (names, type_name) = match group.split_once(':') {
            Some((names, ty)) => {
                let ty = ty.split('=').next().unwrap_or_default();
                let ty = squash(ty);
                (names, (!ty.is_empty()).then_some(ty))
            }
            None => (group, None),
        };
        for name in names.split(',').map(str::trim) {
            if is_identifier(name) {
                let mut param = Param::new(name, type_name.clone());
                param.modifier = modifier.clone();
                params.push(param);
            }
        }
    }
    params
}

/// Offset of the first `;` at parenthesis depth zero at or after `from`, or `limit`.
pub fn statement_end(code: &str, from: usize, limit: usize) -> usize {
    let mut depth = 0u32;
    for (i, ch) in code[from..limit].char_indices() {
        match ch {
            '(' | '[' => depth += 1,
            ')' | ']' => depth = depth.saturating_sub(1),
            ';' if depth == 0 => return from + i,
            _ => {}
        }
    }
    limit
}

/// True when a routine keyword at `offset` starts a declaration rather than
/// a procedural type (`TNotify = procedure(...)`, `OnDone: procedure`).
pub fn is_routine_start(code: &str, offset: usize) -> bool {
    !matches!(prev_significant(code, offset), Some('=' | ':' | '(' | ','))
}

/// Start of the `class` word directly before `offset`, if any.
pub fn class_prefix_start(code: &str, offset: usize) -> Option<usize> {
    let before = code[..offset].trim_end();
    let start = before.len().checked_sub(5)?;
    let word = before.get(start..)?;
    let boundary = !matches!(before[..start].chars().next_back(), Some(c) if is_ident_char(c));
    (word.eq_ignore_ascii_case("class") && boundary).then_some(start)
}

// ============================================================================
// Bodies
// ============================================================================

/// A routine found in an implementation section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRoutine {
    pub header: RoutineHeader,
    /// Offset of the header's first word.
    pub start: usize,
    /// Offset just past the routine, including the trailing `;`.
    pub end: usize,
    pub directives: Vec<String>,
    /// Statements between `begin` and the matching `end`.
    pub body: Option<Range<usize>>,
    /// True when the body was missing or ran to the end of its section.
    pub unterminated: bool,
    /// True when routines nested inside this one were too deep to follow.
    pub nesting_capped: bool,
    pub max_depth: u32,
    pub nested: Vec<ParsedRoutine>,
}

fn body_step(word: &str) -> BlockStep {
    match word.to_ascii_lowercase().as_str() {
        "begin" | "case" | "try" | "asm" => BlockStep::Open,
        "end" => BlockStep::Close,
        "implementation" | "initialization" | "finalization" => BlockStep::Abort,
        _ => BlockStep::Skip,
    }
}

/// Skip a `;` directly after `offset`.
fn past_semicolon(code: &str, offset: usize, limit: usize) -> usize {
    let tail = &code[offset..limit];
    let trimmed = tail.trim_start();
    if trimmed.starts_with(';') {
        offset + (tail.len() - trimmed.len()) + 1
    } else {
        offset
    }
}

/// Header and directives at `start`; true when they end the routine.
fn parse_declaration(code: &str, start: usize, limit: usize) -> Option<(ParsedRoutine, bool)> {
    let header_end = statement_end(code, start, limit);
    let header = parse_header(&code[start..header_end])?;
    let mut cursor = (header_end + 1).min(limit);

    let mut directives = Vec::new();
    let mut declaration_only = false;
    while let Some((word_start, word)) = next_word(&code[..limit], cursor) {
        if !is_one_of(word, DIRECTIVES) {
            break;
        }
        let lower = word.to_ascii_lowercase();
        declaration_only |= lower == "forward" || lower == "external";
        directives.push(lower);
        cursor = (statement_end(code, word_start, limit) + 1).min(limit);
    }

    let routine = ParsedRoutine {
        header,
        start,
        end: cursor,
        directives,
        body: None,
        unterminated: false,
        nesting_capped: false,
        max_depth: 0,
        nested: Vec::new(),
    };
    Some((routine, declaration_only))
}

/// Scan the body opened just before `body_start`.
fn read_body(code: &str, routine: &mut ParsedRoutine, body_start: usize, limit: usize) {
    let scan = scan_block(&code[..limit], body_start, |word, _, _| body_step(word));
    routine.max_depth = scan.max_depth;
    match scan.end {
        BlockEnd::Closed(end) => {
            routine.body = Some(body_start..end - "end".len());
            routine.end = past_semicolon(code, end, limit);
        }
        BlockEnd::Aborted(at) => {
            routine.body = Some(body_start..at);
            routine.unterminated = true;
            routine.end = at;
        }
        BlockEnd::Eof => {
            routine.body = Some(body_start..limit);
            routine.unterminated = true;
            routine.end = limit;
        }
    }
}

/// Parse the routine whose header starts at `start`, without reading past `limit`.
///
/// Handles directives, `forward`/`external` declarations, local declaration
/// sections with nested routines, and the body. Open routines are kept on an
/// explicit stack; past `max_nesting` open routines, further headers are
/// recorded as declarations and the innermost routine is marked
/// [`ParsedRoutine::nesting_capped`].
///
/// Usually returns one routine. A header never followed by `begin`/`asm`
/// is a bodyless declaration: it comes back unterminated, and the routines
/// collected after it are returned as its siblings, in source order.
pub fn parse_routines(
    code: &str,
    start: usize,
    limit: usize,
    max_nesting: usize,
) -> Vec<ParsedRoutine> {
    let Some((root, declaration_only)) = parse_declaration(code, start, limit) else {
        return Vec::new();
    };
    if declaration_only {
        return vec![root];
    }

    // Routines still reading local declarations, outermost first.
    let mut cursor = root.end;
    let mut open = vec![root];
    loop {
        let depth = open.len();
        let Some(top) = open.last_mut() else {
            break;
        };
        let Some((offset, word)) = words(&code[cursor..limit]).next() else {
            break;
        };
        let word_start = cursor + offset;
        let word_end = word_start + word.len();
        match word.to_ascii_lowercase().as_str() {
            "begin" | "asm" => {
                read_body(code, top, word_end, limit);
                cursor = top.end.max(word_end);
                if let Some(done) = open.pop() {
                    match open.last_mut() {
                        Some(parent) => parent.nested.push(done),
                        None => return vec![done],
                    }
                }
            }
            "implementation" | "initialization" | "finalization" => break,
            _ if routine_kind(word).is_some() && is_routine_start(code, word_start) => {
                match parse_declaration(code, word_start, limit) {
                    Some((nested, declaration_only)) => {
                        cursor = nested.end.max(word_end);
                        if declaration_only {
                            top.nested.push(nested);
                        } else if depth >= max_nesting.max(1) {
                            top.nesting_capped = true;
                            top.nested.push(nested);
                        } else {
                            open.push(nested);
                        }
                    }
                    None => cursor = word_end,
                }
            }
            _ => cursor = word_end,
        }
    }

    // No open routine reached a body.
    let mut found = Vec::new();
    while let Some(mut routine) = open.pop() {
        routine.unterminated = true;
        found.extend(std::mem::take(&mut routine.nested).into_iter().rev());
        found.push(routine);
    }
    found.reverse();
    found
}

// ============================================================================
// Body Analysis
// ============================================================================

/// 1 + whole-word branching keywords in `body`.
pub fn complexity(body: &str) -> u32 {
    1 + modernize_core::text::count_keywords(body, BRANCH_KEYWORDS, false)
}

/// Names called from `body`, deduplicated in first-seen order.
///
/// A call is an undotted identifier followed by `(`, or one standing alone as
/// a statement (`Validar;`).
pub fn call_hints(body: &str) -> Vec<String> {
    let mut calls = Vec::new();
    let mut previous: Option<&str> = None;
    for (offset, word) in words(body) {
        let prev_word = previous.replace(word);
        if is_one_of(word, NON_CALLS) || word.starts_with(|c: char| c.is_ascii_digit()) {
            continue;
        }
        let before = prev_significant(body, offset);
        if before == Some('.') {
            continue;
        }
        let after = body[offset + word.len()..].trim_start();
        let is_call = if after.starts_with('(') {
            true
        } else {
            let at_statement_start = match before {
                None | Some(';') => true,
                Some(c) if is_ident_char(c) => {
                    prev_word.is_some_and(|w| is_one_of(w, STATEMENT_STARTERS))
                }
                _ => false,
            };
            let at_statement_end = after.is_empty()
                || after.starts_with(';')
                || leading_word(after).is_some_and(|(w, _)| is_one_of(w, &["end", "else", "until"]));
            at_statement_start && at_statement_end
        };
        if is_call {
            modernize_core::adapter::push_unique(&mut calls, word);
        }
    }
    calls
}

#[cfg(test)]
mod tests {
    use super::*;

    mod header_tests {
        use super::*;

        #[test]
        fn method_implementation_header() {
            let h = parse_header("procedure TClienteForm.btnSalvarClick(Sender: TObject)").unwrap();
            assert_eq!(h.kind, RoutineKind::Procedure);
            assert_eq!(h.owner.as_deref(), Some("TClienteForm"));
            assert_eq!(h.name, "btnSalvarClick");
            assert_eq!(h.params, vec![Param::new("Sender", Some("TObject".to_string()))]);
            assert_eq!(h.return_type, None);
        }

        #[test]
        fn function_without_params() {
            let h = parse_header("class function GetInstance: TConfig").unwrap();
            assert!(h.is_class_level);
            assert_eq!(h.kind, RoutineKind::Function);
            assert!(h.params.is_empty());
            assert_eq!(h.return_type.as_deref(), Some("TConfig"));
        }

        #[test]
        fn not_a_header() {
            assert!(parse_header("property Nome: string").is_none());
            assert!(parse_header("procedure").is_none());
        }

        #[test]
        fn params_with_modifiers_defaults_and_untyped() {
            let params = parse_params("const A, B: Integer; var Buffer; Taxa: Double = 0.1");
            let names: Vec<_> = params.iter().map(|p| p.name.as_str()).collect();
            assert_eq!(names, vec!["A", "B", "Buffer", "Taxa"]);
            assert_eq!(params[1].modifier.as_deref(), Some("const"));
            assert_eq!(params[2].type_name, None);
            assert_eq!(params[2].modifier.as_deref(), Some("var"));
            assert_eq!(params[3].type_name.as_deref(), Some("Double"));
        }

        #[test]
        fn procedural_types_are_not_routines() {
            let code = "TNotify = procedure(Sender: TObject) of object;";
            let offset = code.find("procedure").unwrap();
            assert!(!is_routine_start(code, offset));
            let code = "begin end; procedure X;";
            assert!(is_routine_start(code, code.find("procedure").unwrap()));
        }

        #[test]
        fn class_prefix() {
            let code = "  class procedure Registrar;";
            let offset = code.find("procedure").unwrap();
            assert_eq!(class_prefix_start(code, offset), Some(2));
            let code = "subclass procedure X;";
            assert_eq!(class_prefix_start(code, code.find("procedure").unwrap()), None);
        }
    }

    mod body_tests {
        use super::*;
        use modernize_core::config::DEFAULT_MAX_NESTING_DEPTH;

        fn parse_one(code: &str) -> ParsedRoutine {
            let mut found = parse_routines(code, 0, code.len(), DEFAULT_MAX_NESTING_DEPTH);
            assert_eq!(found.len(), 1, "{found:?}");
            found.remove(0)
        }

        /// Depth of the deepest chain of nested routines.
        fn nesting(routine: &ParsedRoutine) -> usize {
            let mut deepest = 0;
            let mut level = vec![(routine, 1)];
            while let Some((r, depth)) = level.pop() {
                deepest = deepest.max(depth);
                level.extend(r.nested.iter().map(|n| (n, depth + 1)));
            }
            deepest
        }

        fn any_capped(found: &[ParsedRoutine]) -> bool {
            let mut stack: Vec<&ParsedRoutine> = found.iter().collect();
            while let Some(r) = stack.pop() {
                if r.nesting_capped {
                    return true;
                }
                stack.extend(r.nested.iter());
            }
            false
        }

        #[test]
        fn routine_with_nested_and_body() {
            let code = "procedure Externa(A: Integer);\n\
                        var X: Integer;\n\
                        \x20 procedure Interna;\n\
                        \x20 begin X := 1; end;\n\
                        begin\n\
                        \x20 if A > 0 then begin Interna; end;\n\
                        \x20 case A of 1: ; end;\n\
                        end;\n\
                        procedure Depois; begin end;";
            let routine = parse_one(code);
            assert_eq!(routine.header.name, "Externa");
            assert_eq!(routine.nested.len(), 1);
            assert_eq!(routine.nested[0].header.name, "Interna");
            assert!(!routine.unterminated);
            let body = &code[routine.body.clone().unwrap()];
            assert_eq!(complexity(body), 3);
            assert_eq!(routine.max_depth, 2);
            assert!(code[routine.end..].trim_start().starts_with("procedure Depois"));
        }

        #[test]
        fn forward_and_external_have_no_body() {
            let code = "function Soma(A, B: Integer): Integer; stdcall; external 'calc.dll';\nbegin end.";
            let routine = parse_one(code);
            assert_eq!(routine.directives, vec!["stdcall", "external"]);
            assert!(routine.body.is_none());
            assert!(!routine.unterminated);
        }

        #[test]
        fn unterminated_body_stops_at_section() {
            let code = "procedure A; begin if X then begin Y; end; \ninitialization\n Z;";
            let routine = parse_one(code);
            assert!(routine.unterminated);
            assert!(code[routine.end..].starts_with("initialization"));
        }

        #[test]
        fn headers_without_bodies_are_sibling_declarations() {
            let code = "procedure A;\nprocedure B(X: Integer);\nfunction C: Integer;\n";
            let found = parse_routines(code, 0, code.len(), DEFAULT_MAX_NESTING_DEPTH);
            let names: Vec<_> = found.iter().map(|r| r.header.name.as_str()).collect();
            assert_eq!(names, vec!["A", "B", "C"]);
            for routine in &found {
                assert!(routine.unterminated);
                assert!(routine.body.is_none());
                assert!(routine.nested.is_empty());
            }
            assert!(code[found[2].end..].trim().is_empty());
        }

        #[test]
        fn bodied_routine_after_bodyless_header_is_a_sibling() {
            let code = "procedure A;\nprocedure B;\nbegin\nend;\ninitialization\n";
            let found = parse_routines(code, 0, code.len(), DEFAULT_MAX_NESTING_DEPTH);
            assert_eq!(found.len(), 2);
            assert!(found[0].unterminated && found[0].body.is_none());
            assert!(!found[1].unterminated && found[1].body.is_some());
        }

        #[test]
        fn nesting_past_the_cap_is_read_flat() {
            let mut code = String::new();
            for i in 0..10 {
                code.push_str(&format!("procedure P{i};\n"));
            }
            for _ in 0..10 {
                code.push_str("begin\nend;\n");
            }
            let found = parse_routines(&code, 0, code.len(), 3);
            assert!(!found.is_empty());
            assert!(found.iter().all(|r| nesting(r) <= 4));
            assert!(any_capped(&found));
        }

        #[test]
        fn ten_thousand_nested_routines_return() {
            let depth = 10_000;
            let mut code = String::new();
            for i in 0..depth {
                code.push_str(&format!("procedure P{i};\n"));
            }
            code.push_str(&"begin end;\n".repeat(depth));
            let found = parse_routines(&code, 0, code.len(), DEFAULT_MAX_NESTING_DEPTH);
            assert_eq!(found[0].header.name, "P0");
            assert!(any_capped(&found));
            assert!(found.iter().all(|r| nesting(r) <= DEFAULT_MAX_NESTING_DEPTH + 1));
        }

        #[test]
        fn calls_found() {
            let body = " Validar; x := Calcular(1) + obj.Metodo(2); if ok then Salvar else Cancelar; \
                        ShowMessage('ok'); inherited; Exit; ";
            assert_eq!(
                call_hints(body),
                vec!["Validar", "Calcular", "Salvar", "Cancelar", "ShowMessage"]
            );
        }

        #[test]
        fn complexity_counts_whole_words_only() {
            assert_eq!(complexity("if a and b or c then"), 4);
            assert_eq!(complexity("Ifx := Fortune; Order;"), 1);
        }
    }
}
