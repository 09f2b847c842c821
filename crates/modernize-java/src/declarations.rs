//! Type declarations and their members.
//!
//! Java is brace-delimited, so every block is isolated through a
//! [`MatchIndex`] of the scrubbed text. A declaration is read as a
//! prefix of annotations and modifiers followed by one of:
//!
//! | Next token | Declaration |
//! |------------|-------------|
//! | `class` / `interface` / `enum` / `record` / `@interface` | nested type |
//! | identifier ... `(` | method or constructor |
//! | identifier ... `=` or `;` | one or more fields |
//! | `{` | initializer block (skipped) |
//!
//! A type or method whose closing brace is missing consumes to the end of the
//! enclosing block and leaves a malformed-construct diagnostic. Types nested
//! deeper than the configured depth are recorded without their members.

use std::ops::Range;

use tracing::warn;

use modernize_core::adapter::push_unique;
use modernize_core::facts::{
    ClassFacts, Diagnostic, FieldFacts, Param, RoutineFacts, RoutineKind, Visibility,
};
use modernize_core::text::{
    count_keywords, find_matching, is_ident_char, next_word, split_top_level, words, MatchIndex,
    ScrubbedSource,
};

/// Declaration modifiers.
pub const MODIFIERS: &[&str] = &[
    "public",
    "protected",
    "private",
    "static",
    "final",
    "abstract",
    "synchronized",
    "native",
    "transient",
    "volatile",
    "strictfp",
    "default",
    "sealed",
];

/// Branching keywords counted for the complexity estimate.
pub const BRANCH_KEYWORDS: &[&str] = &["if", "for", "while", "case", "catch"];

/// Words followed by `(` that are not calls.
const NON_CALLS: &[&str] = &[
    "if", "for", "while", "switch", "catch", "synchronized", "return", "new", "super", "this",
    "try", "throw", "assert", "yield",
];

/// Kind of type declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Class,
    Interface,
    Enum,
    Record,
    /// `@interface`
    Annotation,
}

impl TypeKind {
    fn from_keyword(word: &str) -> Option<Self> {
        match word {
            "class" => Some(TypeKind::Class),
            "interface" => Some(TypeKind::Interface),
            "enum" => Some(TypeKind::Enum),
            "record" => Some(TypeKind::Record),
            _ => None,
        }
    }

    /// Members without a modifier are public in interfaces.
    fn default_visibility(&self) -> Visibility {
        match self {
            TypeKind::Interface | TypeKind::Annotation => Visibility::Public,
            _ => Visibility::Package,
        }
    }
}

/// An annotation with the byte range of its argument list (inside the parens).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annotation {
    /// Simple name (`org.x.Service` becomes `Service`).
    pub name: String,
    pub args: Option<Range<usize>>,
}

impl Annotation {
    /// `@Name`, as recorded on the facts.
    pub fn label(&self) -> String {
        format!("@{}", self.name)
    }
}

/// Annotations and modifiers before a declaration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Prefix {
    pub annotations: Vec<Annotation>,
    pub modifiers: Vec<String>,
    /// Offset of the first significant character after the prefix.
    pub end: usize,
}

impl Prefix {
    fn has(&self, modifier: &str) -> bool {
        self.modifiers.iter().any(|m| m == modifier)
    }

    fn visibility(&self, default: Visibility) -> Visibility {
        if self.has("public") {
            Visibility::Public
        } else if self.has("protected") {
            Visibility::Protected
        } else if self.has("private") {
            Visibility::Private
        } else {
            default
        }
    }

    fn labels(&self) -> Vec<String> {
        self.annotations.iter().map(Annotation::label).collect()
    }

    /// Modifiers other than visibility, recorded as directives.
    fn directives(&self) -> Vec<String> {
        self.modifiers
            .iter()
            .filter(|m| !matches!(m.as_str(), "public" | "protected" | "private" | "static"))
            .cloned()
            .collect()
    }
}

/// A method with the annotations the Spring pass needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedMethod {
    pub annotations: Vec<Annotation>,
    /// Whole declaration, annotations included.
    pub span: Range<usize>,
}

/// A type declaration, flattened: nested types follow their outer type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedType {
    pub facts: ClassFacts,
    pub kind: TypeKind,
    pub annotations: Vec<Annotation>,
    pub modifiers: Vec<String>,
    /// Text between the name and the opening brace.
    pub header: Range<usize>,
    /// Parallel to `facts.methods`.
    pub methods: Vec<ParsedMethod>,
    pub span: Range<usize>,
    pub top_level: bool,
}

// ============================================================================
// Scanning Helpers
// ============================================================================

fn skip_whitespace(code: &str, from: usize, limit: usize) -> usize {
    let tail = &code[from..limit];
    from + (tail.len() - tail.trim_start().len())
}

fn ident_len(text: &str) -> usize {
    text.char_indices()
        .find(|(_, c)| !(is_ident_char(*c) || *c == '$'))
        .map_or(text.len(), |(i, _)| i)
}

/// First of `targets` at depth zero over `()`, `[]` and `{}`, from `from`.
fn find_top_level(code: &str, from: usize, limit: usize, targets: &[char]) -> Option<usize> {
    let mut depth = 0u32;
    for (i, ch) in code[from..limit].char_indices() {
        if depth == 0 && targets.contains(&ch) {
            return Some(from + i);
        }
        match ch {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    None
}

/// Identifier ending at `end` (after trailing whitespace and `[]`), with its start.
fn trailing_identifier(code: &str, start: usize, end: usize) -> Option<(usize, &str)> {
    let text = code[start..end].trim_end().trim_end_matches(['[', ']', ' ']);
    let name_start = text
        .char_indices()
        .rev()
        .take_while(|(_, c)| is_ident_char(*c) || *c == '$')
        .last()
        .map(|(i, _)| i)?;
    let name = &text[name_start..];
    if name.starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }
    Some((start + name_start, name))
}

/// Read annotations and modifiers starting at `cursor`.
pub fn read_prefix(code: &str, cursor: usize, limit: usize) -> Prefix {
    read_prefix_with(code, cursor, limit, |open| {
        find_matching(&code[..limit], open, '(', ')')
    })
}

/// [`read_prefix`] with `close_paren` finding the `)` of an annotation.
fn read_prefix_with(
    code: &str,
    mut cursor: usize,
    limit: usize,
    close_paren: impl Fn(usize) -> Option<usize>,
) -> Prefix {
    let mut prefix = Prefix::default();
    loop {
        cursor = skip_whitespace(code, cursor, limit);
        let rest = &code[cursor..limit];
        if let Some(after_at) = rest.strip_prefix('@') {
            let after_at = after_at.trim_start();
            let name_start = limit - after_at.len();
            let mut len = 0;
            while let Some(seg) = code.get(name_start + len..limit) {
                let seg_len = ident_len(seg);
                if seg_len == 0 {
                    break;
                }
                len += seg_len;
                if code[name_start + len..limit].starts_with('.') {
                    len += 1;
                } else {
                    break;
                }
            }
            let qualified = code[name_start..name_start + len].trim_end_matches('.');
            if qualified.is_empty() || qualified == "interface" {
                break;
            }
            let name = qualified.rsplit('.').next().unwrap_or(qualified).to_string();
            let mut end = name_start + len;
            let mut args = None;
            let open = skip_whitespace(code, end, limit);
            if code[open..limit].starts_with('(') {
                if let Some(close) = close_paren(open).filter(|c| *c < limit) {
                    args = Some(open + 1..close);
                    end = close + 1;
                }
            }
            prefix.annotations.push(Annotation { name, args });
            cursor = end;
            continue;
        }
        match next_word(&code[..limit], cursor) {
            Some((at, word)) if at == cursor && MODIFIERS.contains(&word) => {
                prefix.modifiers.push(word.to_string());
                cursor = at + word.len();
            }
            _ => break,
        }
    }
    prefix.end = cursor;
    prefix
}

/// Parse a parameter list: `@Valid @RequestBody final Cliente c, String... tags`.
pub fn parse_params(text: &str) -> Vec<Param> {
    let mut params = Vec::new();
    for part in split_top_level(text, ',') {
        let prefix = read_prefix(part, 0, part.len());
        let rest = &part[prefix.end..];
        let Some((name_at, name)) = trailing_identifier(rest, 0, rest.len()) else {
            continue;
        };
        let type_text = squash(&rest[..name_at]);
        let mut param = Param::new(name, (!type_text.is_empty()).then_some(type_text));
        if prefix.has("final") {
            param.modifier = Some("final".to_string());
        }
        params.push(param);
    }
    params
}

/// Collapse runs of whitespace.
pub fn squash(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// 1 + branching keywords + `&&`, `||` and `?` operators.
pub fn complexity(body: &str) -> u32 {
    let operators = body.matches("&&").count() + body.matches("||").count() + body.matches('?').count();
    1 + count_keywords(body, BRANCH_KEYWORDS, true) + operators as u32
}

/// Names of methods invoked in `body`, deduplicated in first-seen order.
pub fn call_hints(body: &str) -> Vec<String> {
    let mut calls = Vec::new();
    let mut previous: Option<&str> = None;
    for (offset, word) in words(body) {
        let prev_word = previous.replace(word);
        if NON_CALLS.contains(&word)
            || prev_word == Some("new")
            || word.starts_with(|c: char| c.is_ascii_digit())
        {
            continue;
        }
        if body[offset + word.len()..].trim_start().starts_with('(') {
            push_unique(&mut calls, word);
        }
    }
    calls
}

// ============================================================================
// Declaration Parser
// ============================================================================

/// Parse every type declaration of a compilation unit.
///
/// Types nested more than `max_depth` levels deep are recorded without
/// members, with a diagnostic.
pub fn parse_types(
    scrubbed: &ScrubbedSource,
    path: &str,
    max_depth: usize,
) -> (Vec<ParsedType>, Vec<Diagnostic>) {
    let code = scrubbed.code.as_str();
    let mut parser = DeclParser {
        scrubbed,
        path,
        braces: MatchIndex::new(code, '{', '}'),
        parens: MatchIndex::new(code, '(', ')'),
        max_depth: max_depth.max(1),
        types: Vec::new(),
        diagnostics: Vec::new(),
    };
    parser.parse_scope(0..code.len(), None, 0);
    (parser.types, parser.diagnostics)
}

struct DeclParser<'a> {
    scrubbed: &'a ScrubbedSource,
    path: &'a str,
    braces: MatchIndex,
    parens: MatchIndex,
    max_depth: usize,
    types: Vec<ParsedType>,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> DeclParser<'a> {
    fn code(&self) -> &'a str {
        self.scrubbed.code.as_str()
    }

    fn malformed(&mut self, what: &str, name: &str, at: usize, delimiter: &str) {
        let line = self.scrubbed.line_at(at);
        warn!(path = self.path, name, line, "{what} has no closing {delimiter}");
        self.diagnostics.push(Diagnostic::malformed(
            self.path,
            format!("{what} '{name}' has no closing {delimiter}"),
            line,
        ));
    }

    /// Closing brace of the block opened at `open`, if before `limit`.
    fn close_brace(&self, open: usize, limit: usize) -> Option<usize> {
        self.braces.matching(open).filter(|c| *c < limit)
    }

    /// Walk the declarations in `range`, `depth` types deep; `owner` indexes
    /// `self.types`.
    fn parse_scope(&mut self, range: Range<usize>, owner: Option<usize>, depth: usize) {
        let code = self.code();
        let mut cursor = range.start;

        if let Some(index) = owner {
            if self.types[index].kind == TypeKind::Enum {
                // Constants come first and end at the first top-level `;`.
                cursor = find_top_level(code, cursor, range.end, &[';']).map_or(range.end, |i| i + 1);
            }
        }

        while cursor < range.end {
            let prefix = read_prefix_with(code, cursor, range.end, |open| self.parens.matching(open));
            let at = prefix.end;
            if at >= range.end {
                break;
            }
            let rest = &code[at..range.end];

            if rest.starts_with(';') {
                cursor = at + 1;
                continue;
            }
            if rest.starts_with('{') {
                cursor = self.close_brace(at, range.end).map_or(range.end, |c| c + 1);
                continue;
            }
            if let Some(annotation_type) = rest.strip_prefix('@') {
                let annotation_type = annotation_type.trim_start();
                cursor = if annotation_type.starts_with("interface") {
                    let kw_at = range.end - annotation_type.len();
                    let kind = TypeKind::Annotation;
                    self.parse_type(prefix, kw_at, kind, range.end, owner, depth + 1)
                } else {
                    at + 1
                };
                continue;
            }

            let word = next_word(&code[..range.end], at).filter(|(w_at, _)| *w_at == at);
            let type_kind = word.and_then(|(_, w)| TypeKind::from_keyword(w)).filter(|kind| {
                // `record` is contextual: it must be followed by a name.
                *kind != TypeKind::Record
                    || next_word(&code[..range.end], at + "record".len()).is_some()
            });
            if let Some(kind) = type_kind {
                cursor = self.parse_type(prefix, at, kind, range.end, owner, depth + 1);
                continue;
            }

            match owner {
                Some(index) => cursor = self.parse_member(prefix, cursor, index, range.end),
                // `package` and `import` statements.
                None => {
                    cursor = find_top_level(code, at, range.end, &[';']).map_or(range.end, |i| i + 1)
                }
            }
        }
    }

    /// Parse a type whose keyword starts at `kw_at`, `depth` levels deep;
    /// returns the offset past it.
    fn parse_type(
        &mut self,
        prefix: Prefix,
        kw_at: usize,
        kind: TypeKind,
        limit: usize,
        outer: Option<usize>,
        depth: usize,
    ) -> usize {
        let code = self.code();
        let kw_len = if kind == TypeKind::Annotation {
            "interface".len()
        } else {
            ident_len(&code[kw_at..limit])
        };
        let Some((name_at, name)) = next_word(&code[..limit], kw_at + kw_len) else {
            return limit;
        };
        let name_end = name_at + name.len();
        let Some(open) = find_top_level(code, name_end, limit, &['{', ';']) else {
            return limit;
        };
        if !code[open..].starts_with('{') {
            return open + 1;
        }

        let mut facts = ClassFacts::new(name);
        facts.line = self.scrubbed.line_at(name_at);
        facts.annotations = prefix.labels();
        let header = name_end..open;
        self.read_header(&mut facts, kind, header.clone());

        let (body_end, end) = match self.close_brace(open, limit) {
            Some(close) => (close, close + 1),
            None => {
                self.malformed("type", name, name_at, "brace");
                (limit, limit)
            }
        };

        let index = self.types.len();
        self.types.push(ParsedType {
            facts,
            kind,
            annotations: prefix.annotations,
            modifiers: prefix.modifiers,
            header,
            methods: Vec::new(),
            span: kw_at..end,
            top_level: outer.is_none(),
        });
        if depth > self.max_depth {
            let line = self.scrubbed.line_at(name_at);
            let max_depth = self.max_depth;
            warn!(path = self.path, name, line, max_depth, "type nesting capped");
            self.diagnostics.push(Diagnostic::malformed(
                self.path,
                format!("type '{name}' nests deeper than {max_depth} levels"),
                line,
            ));
        } else {
            self.parse_scope(open + 1..body_end, Some(index), depth);
        }
        end
    }

    /// `extends`, `implements` and record components.
    fn read_header(&self, facts: &mut ClassFacts, kind: TypeKind, header: Range<usize>) {
        let code = self.code();
        let mut text_start = skip_whitespace(code, header.start, header.end);
        if code[text_start..header.end].starts_with('<') {
            if let Some(close) = find_matching(&code[..header.end], text_start, '<', '>') {
                text_start = close + 1;
            }
        }

        if kind == TypeKind::Record {
            let open = skip_whitespace(code, text_start, header.end);
            if code[open..header.end].starts_with('(') {
                if let Some(close) = self.parens.matching(open).filter(|c| *c < header.end) {
                    for param in parse_params(&code[open + 1..close]) {
                        facts.fields.push(FieldFacts {
                            name: param.name,
                            type_name: param.type_name,
                            visibility: Visibility::Private,
                            is_property: false,
                            annotations: Vec::new(),
                            line: self.scrubbed.line_at(open),
                        });
                    }
                    text_start = close + 1;
                }
            }
        }

        // Clause keywords split the rest of the header.
        let text = &code[text_start..header.end];
        let mut clauses: Vec<(&str, usize)> = words(text)
            .filter(|(_, w)| matches!(*w, "extends" | "implements" | "permits"))
            .map(|(at, w)| (w, at))
            .collect();
        clauses.push(("", text.len()));
        for pair in clauses.windows(2) {
            let (keyword, at) = pair[0];
            let items: Vec<String> = split_top_level(&text[at + keyword.len()..pair[1].1], ',')
                .into_iter()
                .map(|item| squash(item.split('<').next().unwrap_or(item)))
                .filter(|item| !item.is_empty())
                .collect();
            match (keyword, kind) {
                ("extends", TypeKind::Class) => {
                    let mut items = items.into_iter();
                    facts.parent = items.next();
                    facts.interfaces.extend(items);
                }
                ("extends", _) | ("implements", _) => facts.interfaces.extend(items),
                _ => {}
            }
        }
    }

    /// Parse one member at `start`; returns the offset past it.
    fn parse_member(&mut self, prefix: Prefix, start: usize, owner: usize, limit: usize) -> usize {
        let code = self.code();
        let at = prefix.end;

        // Generic angle brackets never contain the member terminators.
        let mut angle = 0u32;
        let mut stop = None;
        for (i, ch) in code[at..limit].char_indices() {
            match ch {
                '<' => angle += 1,
                '>' => angle = angle.saturating_sub(1),
                '(' | '=' | ';' | '{' if angle == 0 => {
                    stop = Some((at + i, ch));
                    break;
                }
                _ => {}
            }
        }
        let Some((stop_at, stop_char)) = stop else {
            return limit;
        };

        match stop_char {
            '(' => self.parse_method(prefix, start, stop_at, owner, limit),
            '{' => self.close_brace(stop_at, limit).map_or(limit, |c| c + 1),
            _ => self.parse_fields(prefix, stop_at, owner, limit),
        }
    }

    fn parse_method(
        &mut self,
        prefix: Prefix,
        start: usize,
        paren: usize,
        owner: usize,
        limit: usize,
    ) -> usize {
        let code = self.code();
        let at = prefix.end;
        let Some((name_at, name)) = trailing_identifier(code, at, paren) else {
            return find_top_level(code, paren, limit, &[';', '{']).map_or(limit, |i| i + 1);
        };

        // Type parameters of a generic method.
        let mut type_start = at;
        if code[at..name_at].starts_with('<') {
            if let Some(close) = find_matching(&code[..name_at], at, '<', '>') {
                type_start = close + 1;
            }
        }
        let return_text = squash(&code[type_start..name_at]);

        let Some(close) = self.parens.matching(paren).filter(|c| *c < limit) else {
            self.malformed("method", name, name_at, "parenthesis");
            return limit;
        };
        let owner_kind = self.types[owner].kind;
        let mut routine = RoutineFacts::new(
            name,
            if return_text.is_empty() {
                RoutineKind::Constructor
            } else {
                RoutineKind::Method
            },
        );
        routine.owner = Some(self.types[owner].facts.name.clone());
        routine.params = parse_params(&code[paren + 1..close]);
        routine.return_type = (!return_text.is_empty() && return_text != "void").then_some(return_text);
        routine.visibility = Some(prefix.visibility(owner_kind.default_visibility()));
        routine.is_class_level = prefix.has("static");
        routine.directives = prefix.directives();
        routine.annotations = prefix.labels();
        routine.line = self.scrubbed.line_at(name_at);

        // `throws` clauses and annotation defaults sit before the body.
        let end = match find_top_level(code, close + 1, limit, &['{', ';']) {
            Some(open) if code[open..].starts_with('{') => {
                let (body_end, end) = match self.close_brace(open, limit) {
                    Some(c) => (c, c + 1),
                    None => {
                        self.malformed("method", name, name_at, "brace");
                        (limit, limit)
                    }
                };
                let body = &code[open + 1..body_end];
                routine.has_body = true;
                routine.complexity = complexity(body);
                routine.call_hints = call_hints(body);
                end
            }
            Some(semicolon) => semicolon + 1,
            None => limit,
        };

        let ty = &mut self.types[owner];
        ty.facts.methods.push(routine);
        ty.methods.push(ParsedMethod {
            annotations: prefix.annotations,
            span: start..end,
        });
        end
    }

    fn parse_fields(&mut self, prefix: Prefix, stop_at: usize, owner: usize, limit: usize) -> usize {
        let code = self.code();
        let at = prefix.end;
        let end = find_top_level(code, stop_at, limit, &[';']).unwrap_or(limit);
        let visibility = prefix.visibility(self.types[owner].kind.default_visibility());
        let labels = prefix.labels();
        let line = self.scrubbed.line_at(at);

        let mut type_name: Option<String> = None;
        let mut fields = Vec::new();
        for (i, part) in split_top_level(&code[at..end], ',').into_iter().enumerate() {
            let declarator = part.split('=').next().unwrap_or(part);
            let Some((name_at, name)) = trailing_identifier(declarator, 0, declarator.len()) else {
                continue;
            };
            if i == 0 {
                let ty = squash(&declarator[..name_at]);
                type_name = (!ty.is_empty()).then_some(ty);
            }
            fields.push(FieldFacts {
                name: name.to_string(),
                type_name: type_name.clone(),
                visibility,
                is_property: false,
                annotations: labels.clone(),
                line,
            });
        }
        self.types[owner].facts.fields.extend(fields);
        if end < limit {
            end + 1
        } else {
            limit
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use modernize_core::config::DEFAULT_MAX_NESTING_DEPTH;
    use modernize_core::text::Syntax;

    fn parse(text: &str) -> (Vec<ParsedType>, Vec<Diagnostic>) {
        let scrubbed = ScrubbedSource::new(text, Syntax::Java);
        parse_types(&scrubbed, "X.java", DEFAULT_MAX_NESTING_DEPTH)
    }

    const CONTROLLER: &str = r#"package com.acme.clientes;

import org.springframework.web.bind.annotation.*;

@RestController
@RequestMapping("/clientes")
public class ClienteController extends BaseController implements Auditavel, Serializable {
    private final ClienteService service;
    private static final int LIMITE = 10, MAXIMO = 20;

    public ClienteController(ClienteService service) {
        this.service = service;
    }

    @PostMapping("/salvar")
    public ResponseEntity<Cliente> salvarHandler(@Valid @RequestBody Cliente cliente) throws IOException {
        if (cliente == null || cliente.getNome().isEmpty()) {
            return ResponseEntity.badRequest().build();
        }
        return ResponseEntity.ok(service.salvar(cliente));
    }

    public <T> List<T> listar(Map<String, List<T>> filtro, int... ids) {
        return new ArrayList<>();
    }

    static class Interna {
        void nada() {}
    }
}
"#;

    mod type_tests {
        use super::*;

        #[test]
        fn class_header_and_annotations() {
            let (types, diagnostics) = parse(CONTROLLER);
            assert!(diagnostics.is_empty());
            assert_eq!(types.len(), 2);
            let class = &types[0].facts;
            assert_eq!(class.name, "ClienteController");
            assert_eq!(class.line, 7);
            assert_eq!(class.parent.as_deref(), Some("BaseController"));
            assert_eq!(class.interfaces, vec!["Auditavel", "Serializable"]);
            assert_eq!(class.annotations, vec!["@RestController", "@RequestMapping"]);
            assert!(types[0].top_level);
            assert_eq!(types[1].facts.name, "Interna");
            assert!(!types[1].top_level);
            assert_eq!(types[1].facts.methods[0].visibility, Some(Visibility::Package));
        }

        #[test]
        fn methods_and_constructors() {
            let (types, _) = parse(CONTROLLER);
            let methods = &types[0].facts.methods;
            let names: Vec<_> = methods.iter().map(|m| m.name.as_str()).collect();
            assert_eq!(names, vec!["ClienteController", "salvarHandler", "listar"]);

            assert_eq!(methods[0].kind, RoutineKind::Constructor);
            assert_eq!(methods[0].return_type, None);

            let salvar = &methods[1];
            assert_eq!(salvar.kind, RoutineKind::Method);
            assert_eq!(salvar.return_type.as_deref(), Some("ResponseEntity<Cliente>"));
            assert_eq!(salvar.params, vec![Param::new("cliente", Some("Cliente".into()))]);
            assert_eq!(salvar.annotations, vec!["@PostMapping"]);
            assert_eq!(salvar.visibility, Some(Visibility::Public));
            // if + || -> 3
            assert_eq!(salvar.complexity, 3);
            assert!(salvar.call_hints.contains(&"salvar".to_string()));
            assert!(!salvar.call_hints.contains(&"if".to_string()));

            let listar = &methods[2];
            assert_eq!(listar.return_type.as_deref(), Some("List<T>"));
            assert_eq!(listar.arity(), 2);
            assert_eq!(listar.params[1].type_name.as_deref(), Some("int..."));
        }

        #[test]
        fn fields_with_shared_type() {
            let (types, _) = parse(CONTROLLER);
            let fields = &types[0].facts.fields;
            let got: Vec<_> = fields
                .iter()
                .map(|f| (f.name.as_str(), f.type_name.as_deref()))
                .collect();
            assert_eq!(
                got,
                vec![
                    ("service", Some("ClienteService")),
                    ("LIMITE", Some("int")),
                    ("MAXIMO", Some("int")),
                ]
            );
            assert_eq!(fields[0].visibility, Visibility::Private);
        }

        #[test]
        fn interface_enum_and_record() {
            let text = "public interface ClienteRepository extends JpaRepository<Cliente, Long> {\n\
                List<Cliente> findByNome(String nome);\n}\n\
                enum Status { ATIVO(\"a\"), INATIVO(\"i\"); private final String c; Status(String c) { this.c = c; } }\n\
                record Ponto(int x, int y) implements Comparable<Ponto> { }";
            let (types, diagnostics) = parse(text);
            assert!(diagnostics.is_empty());
            let names: Vec<_> = types.iter().map(|t| (t.facts.name.as_str(), t.kind)).collect();
            assert_eq!(
                names,
                vec![
                    ("ClienteRepository", TypeKind::Interface),
                    ("Status", TypeKind::Enum),
                    ("Ponto", TypeKind::Record),
                ]
            );
            let repo = &types[0].facts;
            assert_eq!(repo.interfaces, vec!["JpaRepository"]);
            assert_eq!(repo.methods[0].visibility, Some(Visibility::Public));
            assert!(!repo.methods[0].has_body);

            let status = &types[1].facts;
            assert_eq!(status.fields.len(), 1);
            assert_eq!(status.methods[0].kind, RoutineKind::Constructor);

            let ponto = &types[2].facts;
            assert_eq!(ponto.fields.len(), 2);
            assert_eq!(ponto.interfaces, vec!["Comparable"]);
        }

        #[test]
        fn nesting_past_the_cap_is_recorded_without_members() {
            let text = "class A { class B { class C { class D { int x; } } } }";
            let scrubbed = ScrubbedSource::new(text, Syntax::Java);
            let (types, diagnostics) = parse_types(&scrubbed, "X.java", 2);
            let names: Vec<_> = types.iter().map(|t| t.facts.name.as_str()).collect();
            assert_eq!(names, vec!["A", "B", "C"]);
            assert!(types[2].facts.fields.is_empty());
            assert_eq!(diagnostics.len(), 1);
            assert_eq!(diagnostics[0].reason, "type 'C' nests deeper than 2 levels");
        }

        #[test]
        fn unclosed_parameter_list_reports() {
            let (types, diagnostics) = parse("class A {\n  void salvar(int a;\n}\n");
            assert!(types[0].facts.methods.is_empty());
            assert!(diagnostics
                .iter()
                .any(|d| d.reason == "method 'salvar' has no closing parenthesis"));
        }

        #[test]
        fn unclosed_type_reports_and_keeps_members() {
            let text = "class Quebrada {\n  void a() { }\n  void b() {\n";
            let (types, diagnostics) = parse(text);
            assert_eq!(types.len(), 1);
            assert_eq!(types[0].facts.methods.len(), 2);
            assert!(!diagnostics.is_empty());
            assert!(diagnostics.iter().any(|d| d.reason.contains("Quebrada")));
        }
    }

    mod body_tests {
        use super::*;

        #[test]
        fn complexity_counts_operators() {
            assert_eq!(complexity(""), 1);
            assert_eq!(complexity("if (a && b) { } else if (c) { } x = d ? 1 : 2;"), 5);
            assert_eq!(complexity("switch (x) { case 1: break; case 2: break; }"), 3);
            assert_eq!(complexity("try { } catch (E e) { } while (t) { }"), 3);
        }

        #[test]
        fn calls_skip_keywords_and_constructors() {
            let calls = call_hints("if (ok()) { repo.save(new Cliente(nome)); return this.map(x); }");
            assert_eq!(calls, vec!["ok", "save", "map"]);
        }
    }
}
