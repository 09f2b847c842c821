//! Lexical utilities shared by the language extractors.
//!
//! Extraction is deliberately lexical. Everything here works on a
//! [`ScrubbedSource`]: the original text with comments and string contents
//! blanked out, so that keyword and header matching never fires inside a
//! comment or literal.
//!
//! ## Coordinate Conventions
//!
//! - The scrubbed code has the **same byte length** as the original text, so
//!   byte offsets are interchangeable between the two
//! - Lines are **1-indexed**; byte offsets are **0-indexed**
//!
//! ## Bounded Scanning
//!
//! [`scan_block`] is the only block-isolation primitive. It walks words once,
//! left to right, with an explicit depth counter; an unterminated block
//! consumes to end of input instead of looping or backtracking.
//! Brace-delimited languages look blocks up in a [`MatchIndex`] built in one
//! pass, so an unterminated brace costs a lookup rather than a rescan.

use std::collections::HashMap;
use std::ops::Range;

// ============================================================================
// Scrubbing
// ============================================================================

/// Comment and literal syntax of a source language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Syntax {
    /// `{ }`, `(* *)` and `//` comments; `'...'` strings with `''` escapes.
    Pascal,
    /// `//` and `/* */` comments; `"..."`, `'c'` and `"""` text blocks.
    Java,
}

/// A string literal found while scrubbing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Literal {
    /// Byte range of the literal in the original text, delimiters included.
    pub span: Range<usize>,
    /// Unescaped contents.
    pub value: String,
}

/// Source text with comments and literal contents masked out.
#[derive(Debug, Clone)]
pub struct ScrubbedSource {
    /// Same byte length as the input; comments and literal contents are spaces,
    /// newlines and literal delimiters are kept.
    pub code: String,
    /// Literals in source order.
    pub literals: Vec<Literal>,
    line_starts: Vec<usize>,
    line_has_code: Vec<bool>,
    line_has_comment: Vec<bool>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum State {
    Code,
    LineComment,
    /// Closing delimiter of the open block comment.
    BlockComment(&'static str),
    /// Quote character of the open string.
    Str(char),
    TextBlock,
}

impl ScrubbedSource {
    /// Scrub `text` according to `syntax`.
    pub fn new(text: &str, syntax: Syntax) -> Self {
        let mut code = String::with_capacity(text.len());
        let mut literals = Vec::new();
        let mut line_has_code = vec![false];
        let mut line_has_comment = vec![false];
        let mut line_starts = vec![0];

        let mut state = State::Code;
        let mut literal_start = 0usize;
        let mut literal_value = String::new();
        let bytes = text.as_bytes();
        let mut chars = text.char_indices().peekable();

        let blank = |code: &mut String, ch: char| {
            for _ in 0..ch.len_utf8() {
                code.push(' ');
            }
        };

        while let Some((i, ch)) = chars.next() {
            if ch == '\n' {
                code.push('\n');
                line_starts.push(i + 1);
                line_has_code.push(false);
                line_has_comment.push(false);
                match state {
                    State::LineComment => state = State::Code,
                    State::Str(_) => {
                        // Unterminated single-line string: close it at the newline.
                        literals.push(Literal {
                            span: literal_start..i,
                            value: std::mem::take(&mut literal_value),
                        });
                        state = State::Code;
                    }
                    State::TextBlock => literal_value.push('\n'),
                    _ => {}
                }
                continue;
            }
            let line = line_starts.len() - 1;
            let next = bytes.get(i + 1).copied();

            match state {
                State::Code => match (syntax, ch, next) {
                    (_, '/', Some(b'/')) => {
                        state = State::LineComment;
                        line_has_comment[line] = true;
                        code.push(' ');
                    }
                    (Syntax::Pascal, '{', _) => {
                        state = State::BlockComment("}");
                        line_has_comment[line] = true;
                        code.push(' ');
                    }
                    (Syntax::Pascal, '(', Some(b'*')) => {
                        state = State::BlockComment("*)");
                        line_has_comment[line] = true;
                        code.push(' ');
                    }
                    (Syntax::Java, '/', Some(b'*')) => {
                        state = State::BlockComment("*/");
                        line_has_comment[line] = true;
                        code.push(' ');
                    }
                    (Syntax::Java, '"', _) if text[i..].starts_with("\"\"\"") => {
                        state = State::TextBlock;
                        literal_start = i;
                        line_has_code[line] = true;
                        code.push_str("\"\"\"");
                        chars.next();
                        chars.next();
                    }
                    (Syntax::Pascal, '\'', _) | (Syntax::Java, '"' | '\'', _) => {
                        state = State::Str(ch);
                        literal_start = i;
                        line_has_code[line] = true;
                        code.push(ch);
                    }
                    _ => {
                        if !ch.is_whitespace() {
                            line_has_code[line] = true;
                        }
                        code.push(ch);
                    }
                },
                State::LineComment => {
                    line_has_comment[line] = true;
                    blank(&mut code, ch);
                }
                State::BlockComment(close) => {
                    line_has_comment[line] = true;
                    if text[i..].starts_with(close) {
                        // Blank every byte of the closing delimiter.
                        for _ in 0..close.len() {
                            code.push(' ');
                        }
                        for _ in 1..close.chars().count() {
                            chars.next();
                        }
                        state = State::Code;
                    } else {
                        blank(&mut code, ch);
                    }
                }
                State::Str(quote) => {
                    line_has_code[line] = true;
                    if syntax == Syntax::Java && ch == '\\' {
                        blank(&mut code, ch);
                        if let Some(&(_, escaped)) = chars.peek() {
                            if escaped != '\n' {
                                chars.next();
                                blank(&mut code, escaped);
                                literal_value.push(unescape_java(escaped));
                            }
                        }
                    } else if ch == quote {
                        if syntax == Syntax::Pascal && next == Some(b'\'') {
                            // '' inside a Pascal string is an escaped quote.
                            code.push_str("  ");
                            chars.next();
                            literal_value.push('\'');
                        } else {
                            code.push(quote);
                            literals.push(Literal {
                                span: literal_start..i + 1,
                                value: std::mem::take(&mut literal_value),
                            });
                            state = State::Code;
                        }
                    } else {
                        blank(&mut code, ch);
                        literal_value.push(ch);
                    }
                }
                State::TextBlock => {
                    line_has_code[line] = true;
                    if text[i..].starts_with("\"\"\"") {
                        code.push_str("\"\"\"");
                        chars.next();
                        chars.next();
                        literals.push(Literal {
                            span: literal_start..i + 3,
                            value: std::mem::take(&mut literal_value),
                        });
                        state = State::Code;
                    } else {
                        blank(&mut code, ch);
                        literal_value.push(ch);
                    }
                }
            }
        }

        if matches!(state, State::Str(_) | State::TextBlock) {
            literals.push(Literal {
                span: literal_start..text.len(),
                value: literal_value,
            });
        }

        ScrubbedSource {
            code,
            literals,
            line_starts,
            line_has_code,
            line_has_comment,
        }
    }

    /// 1-indexed line containing byte `offset`.
    pub fn line_at(&self, offset: usize) -> u32 {
        let idx = match self.line_starts.binary_search(&offset) {
            Ok(idx) => idx,
            Err(idx) => idx.saturating_sub(1),
        };
        (idx + 1) as u32
    }

    /// Literals whose span starts inside `range`.
    pub fn literals_in(&self, range: Range<usize>) -> impl Iterator<Item = &Literal> {
        self.literals
            .iter()
            .filter(move |lit| range.contains(&lit.span.start))
    }

    /// Line counts: `(total, code, comment_only, blank)`.
    ///
    /// A line with both code and a comment counts as code. A trailing newline
    /// does not open a new line.
    pub fn line_counts(&self) -> (u32, u32, u32, u32) {
        let mut total = self.line_starts.len();
        if self.code.is_empty() || self.code.ends_with('\n') {
            total -= 1;
        }
        let mut code = 0;
        let mut comment = 0;
        let mut blank = 0;
        for line in 0..total {
            if self.line_has_code[line] {
                code += 1;
            } else if self.line_has_comment[line] {
                comment += 1;
            } else {
                blank += 1;
            }
        }
        (total as u32, code, comment, blank)
    }
}

fn unescape_java(ch: char) -> char {
    match ch {
        'n' | 't' | 'r' => ' ',
        other => other,
    }
}

// ============================================================================
// Words
// ============================================================================

/// True for characters that may continue an identifier.
pub fn is_ident_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_'
}

/// Iterate identifier-like words as `(byte_offset, word)`.
pub fn words(code: &str) -> impl Iterator<Item = (usize, &str)> {
    let mut rest = code.char_indices().peekable();
    std::iter::from_fn(move || {
        while let Some(&(_, ch)) = rest.peek() {
            if is_ident_char(ch) {
                break;
            }
            rest.next();
        }
        let (start, _) = *rest.peek()?;
        let mut end = start;
        while let Some(&(i, ch)) = rest.peek() {
            if !is_ident_char(ch) {
                break;
            }
            end = i + ch.len_utf8();
            rest.next();
        }
        Some((start, &code[start..end]))
    })
}

/// Count whole-word occurrences of any of `keywords`.
pub fn count_keywords(code: &str, keywords: &[&str], case_sensitive: bool) -> u32 {
    words(code)
        .filter(|(_, w)| {
            keywords.iter().any(|k| {
                if case_sensitive {
                    w == k
                } else {
                    w.eq_ignore_ascii_case(k)
                }
            })
        })
        .count() as u32
}

/// Last non-whitespace character before `offset`.
pub fn prev_significant(code: &str, offset: usize) -> Option<char> {
    code[..offset].chars().rev().find(|c| !c.is_whitespace())
}

/// The word starting after `offset`, skipping whitespace.
pub fn next_word(code: &str, offset: usize) -> Option<(usize, &str)> {
    let tail = &code[offset..];
    let skipped = tail.len() - tail.trim_start().len();
    let start = offset + skipped;
    let len = code[start..]
        .char_indices()
        .find(|(_, c)| !is_ident_char(*c))
        .map(|(i, _)| i)
        .unwrap_or(code.len() - start);
    if len == 0 {
        None
    } else {
        Some((start, &code[start..start + len]))
    }
}

// ============================================================================
// Delimiters
// ============================================================================

/// Split on `sep` at nesting depth zero over `()`, `[]`, `{}` and `<>`.
///
/// Pieces are trimmed; empty pieces are dropped.
pub fn split_top_level(text: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, ch) in text.char_indices() {
        match ch {
            '(' | '[' | '{' | '<' => depth += 1,
            ')' | ']' | '}' | '>' => depth = (depth - 1).max(0),
            c if c == sep && depth == 0 => {
                parts.push(text[start..i].trim());
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(text[start..].trim());
    parts.retain(|p| !p.is_empty());
    parts
}

/// Offset of the delimiter closing the one at `open_at`, counting nesting.
///
/// Returns `None` when the input ends first.
pub fn find_matching(code: &str, open_at: usize, open: char, close: char) -> Option<usize> {
    let mut depth = 0u32;
    for (i, ch) in code[open_at..].char_indices() {
        if ch == open {
            depth += 1;
        } else if ch == close {
            depth = depth.saturating_sub(1);
            if depth == 0 {
                return Some(open_at + i);
            }
        }
    }
    None
}

/// Every `open` in a text paired with its closing delimiter.
///
/// Answers the same as [`find_matching`] over the indexed text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchIndex {
    closes: HashMap<usize, usize>,
}

impl MatchIndex {
    pub fn new(code: &str, open: char, close: char) -> Self {
        let mut closes = HashMap::new();
        let mut pending = Vec::new();
        for (i, ch) in code.char_indices() {
            if ch == open {
                pending.push(i);
            } else if ch == close {
                if let Some(at) = pending.pop() {
                    closes.insert(at, i);
                }
            }
        }
        MatchIndex { closes }
    }

    /// Offset closing the delimiter at `open_at`; `None` when unterminated.
    pub fn matching(&self, open_at: usize) -> Option<usize> {
        self.closes.get(&open_at).copied()
    }
}

// ============================================================================
// Block Scanning
// ============================================================================

/// Classification of a word during [`scan_block`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockStep {
    /// Opens a nested block.
    Open,
    /// Closes the innermost block.
    Close,
    /// Cannot appear inside this block; the block is malformed.
    Abort,
    /// Anything else.
    Skip,
}

/// How a block scan ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockEnd {
    /// Depth returned to zero; offset is just past the closing word.
    Closed(usize),
    /// An aborting word was seen; offset is its start.
    Aborted(usize),
    /// Input ended with the block still open.
    Eof,
}

/// Result of a counter-based block scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockScan {
    pub end: BlockEnd,
    /// Deepest depth reached, counting the outermost block as 1.
    pub max_depth: u32,
}

impl BlockScan {
    /// Offset where the block body stops, `eof` when unterminated.
    pub fn body_end(&self, eof: usize) -> usize {
        match self.end {
            BlockEnd::Closed(end) | BlockEnd::Aborted(end) => end,
            BlockEnd::Eof => eof,
        }
    }

    /// True when the block closed normally.
    pub fn is_closed(&self) -> bool {
        matches!(self.end, BlockEnd::Closed(_))
    }
}

/// Scan `code` from `start` with the outermost block already open.
///
/// `classify(word, start, end)` decides what each word does. The scan visits
/// every word at most once, so it is linear in the remaining input.
pub fn scan_block(
    code: &str,
    start: usize,
    mut classify: impl FnMut(&str, usize, usize) -> BlockStep,
) -> BlockScan {
    let mut depth = 1u32;
    let mut max_depth = 1u32;
    for (offset, word) in words(&code[start..]) {
        let word_start = start + offset;
        let word_end = word_start + word.len();
        match classify(word, word_start, word_end) {
            BlockStep::Open => {
                depth += 1;
                max_depth = max_depth.max(depth);
            }
            BlockStep::Close => {
                depth -= 1;
                if depth == 0 {
                    return BlockScan {
                        end: BlockEnd::Closed(word_end),
                        max_depth,
                    };
                }
            }
            BlockStep::Abort => {
                return BlockScan {
                    end: BlockEnd::Aborted(word_start),
                    max_depth,
                };
            }
            BlockStep::Skip => {}
        }
    }
    BlockScan {
        end: BlockEnd::Eof,
        max_depth,
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    mod scrub_tests {
        use super::*;

        #[test]
        fn pascal_comments_and_strings_masked() {
            let text = "x := 'if a then'; { if } (* while *) // for\ny := 1;";
            let src = ScrubbedSource::new(text, Syntax::Pascal);

            assert_eq!(src.code.len(), text.len());
            assert_eq!(count_keywords(&src.code, &["if", "while", "for"], false), 0);
            assert_eq!(src.literals.len(), 1);
            assert_eq!(src.literals[0].value, "if a then");
            assert!(src.code.contains("y := 1;"));
        }

        #[test]
        fn pascal_doubled_quote_is_escape() {
            let text = "s := 'it''s';";
            let src = ScrubbedSource::new(text, Syntax::Pascal);
            assert_eq!(src.literals[0].value, "it's");
            assert_eq!(src.code.len(), text.len());
            assert!(src.code.ends_with("';"));
        }

        #[test]
        fn java_escapes_and_text_blocks() {
            let text = "String a = \"say \\\"hi\\\"\"; String b = \"\"\"\nSELECT 1\n\"\"\";";
            let src = ScrubbedSource::new(text, Syntax::Java);
            assert_eq!(src.code.len(), text.len());
            assert_eq!(src.literals.len(), 2);
            assert_eq!(src.literals[0].value, "say \"hi\"");
            assert_eq!(src.literals[1].value.trim(), "SELECT 1");
        }

        #[test]
        fn multibyte_comment_keeps_length() {
            let text = "// ação\nx;";
            let src = ScrubbedSource::new(text, Syntax::Java);
            assert_eq!(src.code.len(), text.len());
            assert_eq!(src.line_at(text.find('x').unwrap()), 2);
        }

        #[test]
        fn line_counts_classify_lines() {
            let text = "a;\n\n// note\nb; // trailing\n";
            let src = ScrubbedSource::new(text, Syntax::Java);
            assert_eq!(src.line_counts(), (4, 2, 1, 1));
        }
    }

    mod word_tests {
        use super::*;

        #[test]
        fn words_yield_offsets() {
            let found: Vec<_> = words("if (a1 and_b) then").collect();
            assert_eq!(found, vec![(0, "if"), (4, "a1"), (7, "and_b"), (14, "then")]);
        }

        #[test]
        fn keyword_count_is_whole_word() {
            assert_eq!(count_keywords("ifx if IF notif", &["if"], false), 2);
            assert_eq!(count_keywords("ifx if IF notif", &["if"], true), 1);
        }

        #[test]
        fn next_word_skips_whitespace() {
            assert_eq!(next_word("  FROM  Clientes c", 6), Some((8, "Clientes")));
            assert_eq!(next_word("x = (", 1), None);
        }
    }

    mod delimiter_tests {
        use super::*;

        #[test]
        fn split_respects_nesting() {
            let parts = split_top_level("Map<String, Integer> m, f(a, b), c", ',');
            assert_eq!(parts, vec!["Map<String, Integer> m", "f(a, b)", "c"]);
        }

        #[test]
        fn matching_paren_found() {
            let code = "f(a, (b), c) + 1";
            assert_eq!(find_matching(code, 1, '(', ')'), Some(11));
            assert_eq!(find_matching("f(a", 1, '(', ')'), None);
        }

        #[test]
        fn index_agrees_with_find_matching() {
            let code = "class A { void f() { if (x) { } } { } } } { class B {";
            let index = MatchIndex::new(code, '{', '}');
            for (at, _) in code.match_indices('{') {
                assert_eq!(index.matching(at), find_matching(code, at, '{', '}'), "at {at}");
            }
            assert_eq!(index.matching(0), None);
        }
    }

    mod block_scan_tests {
        use super::*;

        fn pascal_classify(word: &str, _: usize, _: usize) -> BlockStep {
            match word.to_ascii_lowercase().as_str() {
                "begin" | "try" | "case" => BlockStep::Open,
                "end" => BlockStep::Close,
                "implementation" => BlockStep::Abort,
                _ => BlockStep::Skip,
            }
        }

        #[test]
        fn nested_blocks_close_at_depth_zero() {
            let code = "begin if x then begin y; end; end; z";
            let scan = scan_block(code, 5, pascal_classify);
            assert_eq!(scan.end, BlockEnd::Closed(code.find("end; z").unwrap() + 3));
            assert_eq!(scan.max_depth, 2);
        }

        #[test]
        fn unterminated_block_runs_to_eof() {
            let code = "begin begin x;";
            let scan = scan_block(code, 5, pascal_classify);
            assert_eq!(scan.end, BlockEnd::Eof);
            assert_eq!(scan.body_end(code.len()), code.len());
        }

        #[test]
        fn abort_word_stops_scan() {
            let code = "class x; implementation";
            let scan = scan_block(code, 5, pascal_classify);
            assert_eq!(scan.end, BlockEnd::Aborted(9));
            assert!(!scan.is_closed());
        }
    }
}
