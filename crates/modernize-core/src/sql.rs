//! SQL literal analysis shared by the extractors.
//!
//! Legacy code usually builds statements from several literals
//! (`SQL.Add('SELECT *'); SQL.Add('FROM CLIENTES');`), so a statement starts at
//! a literal with a leading SQL verb and may continue into the next few
//! literals that do not start a statement themselves.

use crate::facts::DatabaseOpKind;
use crate::text::Literal;

/// Literals this short (after trimming) are never statements.
pub const MIN_STATEMENT_LEN: usize = 6;

/// How many following literals a statement may continue into.
pub const CONTINUATION_LIMIT: usize = 5;

const OTHER_VERBS: &[&str] = &[
    "CREATE", "ALTER", "DROP", "EXEC", "EXECUTE", "MERGE", "TRUNCATE", "CALL",
];

const CLAUSE_WORDS: &[&str] = &["FROM", "INTO", "SET", "WHERE", "VALUES", "TABLE", "JOIN"];

/// One SQL statement recognized in a run of literals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlStatement {
    /// Index of the literal where the statement starts.
    pub literal_index: usize,
    pub kind: DatabaseOpKind,
    /// Trimmed text of the starting literal.
    pub fragment: String,
    pub table: Option<String>,
}

/// Kind of statement a text starts with, if any.
///
/// The verb must be written in upper case, or the text must also contain a
/// clause word, so that UI messages such as `'Update failed'` are not taken
/// for SQL.
pub fn statement_kind(text: &str) -> Option<DatabaseOpKind> {
    let trimmed = text.trim();
    if trimmed.len() < MIN_STATEMENT_LEN {
        return None;
    }
    let verb = trimmed
        .split(|c: char| c.is_whitespace() || c == '(')
        .next()
        .unwrap_or_default();
    let upper = verb.to_ascii_uppercase();
    let kind = match upper.as_str() {
        "SELECT" => DatabaseOpKind::Select,
        "INSERT" => DatabaseOpKind::Insert,
        "UPDATE" => DatabaseOpKind::Update,
        "DELETE" => DatabaseOpKind::Delete,
        v if OTHER_VERBS.contains(&v) => DatabaseOpKind::OtherSql,
        _ => return None,
    };
    if verb == upper || has_clause_word(trimmed) {
        Some(kind)
    } else {
        None
    }
}

fn has_clause_word(text: &str) -> bool {
    text.split_whitespace()
        .skip(1)
        .any(|w| CLAUSE_WORDS.iter().any(|c| w.eq_ignore_ascii_case(c)))
}

/// Table named after the first `FROM`, `INTO` or `UPDATE` keyword.
///
/// Quotes, brackets and trailing punctuation are stripped; a subquery
/// (`FROM (SELECT ...`) yields `None`.
pub fn referenced_table(statement: &str) -> Option<String> {
    let tokens: Vec<&str> = statement.split_whitespace().collect();
    let at = tokens.iter().position(|t| {
        ["FROM", "INTO", "UPDATE"]
            .iter()
            .any(|k| t.eq_ignore_ascii_case(k))
    })?;
    let raw = tokens.get(at + 1)?;
    if raw.starts_with('(') {
        return None;
    }
    let table: String = raw
        .trim_matches(|c: char| matches!(c, '[' | ']' | '"' | '`' | ',' | ';' | '(' | ')'))
        .to_string();
    let valid = table
        .chars()
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_');
    if valid {
        Some(table.split('(').next().unwrap_or(&table).to_string())
    } else {
        None
    }
}

/// Find every statement in a unit's literals, in source order.
pub fn find_statements(literals: &[Literal]) -> Vec<SqlStatement> {
    let mut statements = Vec::new();
    for (index, literal) in literals.iter().enumerate() {
        let Some(kind) = statement_kind(&literal.value) else {
            continue;
        };
        let mut text = literal.value.trim().to_string();
        for next in literals.iter().skip(index + 1).take(CONTINUATION_LIMIT) {
            if statement_kind(&next.value).is_some() {
                break;
            }
            text.push(' ');
            text.push_str(next.value.trim());
        }
        statements.push(SqlStatement {
            literal_index: index,
            kind,
            fragment: literal.value.trim().to_string(),
            table: referenced_table(&text),
        });
    }
    statements
}
