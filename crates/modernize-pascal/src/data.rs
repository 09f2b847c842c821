//! Data-access operations in routine bodies: dataset calls, transaction
//! control and embedded SQL.

use std::collections::HashSet;
use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;

use modernize_core::config::ExtractorConfig;
use modernize_core::facts::{DatabaseOpFacts, DatabaseOpKind};
use modernize_core::sql;
use modernize_core::text::{is_ident_char, prev_significant, words, ScrubbedSource};

static COMPONENT_VAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([A-Za-z_]\w*)\s*:\s*(T\w+)\s*[;)=]").unwrap());

/// Dataset methods recorded even when the receiver is not a known component.
const ALWAYS_DATA_METHODS: &[&str] = &["ExecSQL", "ExecProc", "ApplyUpdates"];

/// Code region attributed to a routine, used to fill [`DatabaseOpFacts::owner`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerSpan {
    pub range: Range<usize>,
    /// `TClass.Method` or the bare routine name.
    pub name: String,
}

/// Innermost owner containing `offset`.
pub fn owner_at(owners: &[OwnerSpan], offset: usize) -> Option<String> {
    owners
        .iter()
        .filter(|o| o.range.contains(&offset))
        .min_by_key(|o| o.range.len())
        .map(|o| o.name.clone())
}

/// Lowercase names of every variable or field declared with a dataset type.
pub fn component_names(code: &str, config: &ExtractorConfig) -> HashSet<String> {
    COMPONENT_VAR_RE
        .captures_iter(code)
        .filter(|caps| config.is_dataset_component(&caps[2]))
        .map(|caps| caps[1].to_ascii_lowercase())
        .collect()
}

/// Receiver word immediately before the `.` that precedes `offset`.
fn receiver_before(code: &str, offset: usize) -> Option<&str> {
    let before = code[..offset].trim_end().strip_suffix('.')?.trim_end();
    let start = before
        .char_indices()
        .rev()
        .take_while(|(_, c)| is_ident_char(*c))
        .last()
        .map(|(i, _)| i)?;
    Some(&before[start..])
}

fn contains_ignore_case(list: &[String], word: &str) -> bool {
    list.iter().any(|m| m.eq_ignore_ascii_case(word))
}

/// Dataset and transaction calls in `regions`.
///
/// `qry.Open` counts when `qry` is a known component, `x.ExecSQL` always
/// does, and any transaction method counts whatever the receiver.
pub fn find_calls(
    scrubbed: &ScrubbedSource,
    regions: &[Range<usize>],
    components: &HashSet<String>,
    owners: &[OwnerSpan],
    config: &ExtractorConfig,
) -> Vec<DatabaseOpFacts> {
    let code = scrubbed.code.as_str();
    let mut ops = Vec::new();
    for region in regions {
        for (offset, method) in words(&code[region.clone()]) {
            let at = region.start + offset;
            if prev_significant(code, at) != Some('.') {
                continue;
            }
            let Some(receiver) = receiver_before(code, at) else {
                continue;
            };
            let kind = if contains_ignore_case(&config.transaction_methods, method) {
                DatabaseOpKind::Transaction
            } else if contains_ignore_case(&config.dataset_methods, method)
                && (components.contains(&receiver.to_ascii_lowercase())
                    || ALWAYS_DATA_METHODS
                        .iter()
                        .any(|m| m.eq_ignore_ascii_case(method)))
            {
                DatabaseOpKind::DatasetCall
            } else {
                continue;
            };
            ops.push(DatabaseOpFacts {
                kind,
                raw: format!("{receiver}.{method}"),
                table: None,
                component_type: None,
                owner: owner_at(owners, at),
                line: scrubbed.line_at(at),
            });
        }
    }
    ops
}

/// SQL statements among the unit's literals.
pub fn find_sql(scrubbed: &ScrubbedSource, owners: &[OwnerSpan]) -> Vec<DatabaseOpFacts> {
    sql::find_statements(&scrubbed.literals)
        .into_iter()
        .filter_map(|stmt| {
            let literal = scrubbed.literals.get(stmt.literal_index)?;
            Some(DatabaseOpFacts {
                kind: stmt.kind,
                raw: stmt.fragment,
                table: stmt.table,
                component_type: None,
                owner: owner_at(owners, literal.span.start),
                line: scrubbed.line_at(literal.span.start),
            })
        })
        .collect()
}
