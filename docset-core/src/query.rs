//! Dialect-aware SQL composition for symbol lookups

use crate::schema::Dialect;

/// Maximum rows returned per docset per search
pub const RESULT_LIMIT: usize = 1000;

const LEGACY_SELECT: &str = "SELECT type, name, path FROM searchIndex";
const LEGACY_NAME: &str = "name";

const OBJECT_SELECT: &str = "SELECT ty.ZTYPENAME, t.ZTOKENNAME, f.ZPATH, m.ZANCHOR \
     FROM ZTOKEN t, ZTOKENTYPE ty, ZFILEPATH f, ZTOKENMETAINFORMATION m";
const OBJECT_JOIN: &str = "ty.Z_PK = t.ZTOKENTYPE AND f.Z_PK = m.ZFILE AND m.ZTOKEN = t.Z_PK";
const OBJECT_NAME: &str = "t.ZTOKENNAME";

/// Build the query for `pattern` against a docset of the given dialect.
///
/// Each whitespace-separated term must appear somewhere in the symbol name
/// (SQLite's LIKE folds ASCII case). Shorter names sort first, ties broken by
/// lowercase name.
pub fn compose(dialect: Dialect, pattern: &str) -> String {
    let (select, join, name_col) = match dialect {
        Dialect::LegacyIndex => (LEGACY_SELECT, None, LEGACY_NAME),
        Dialect::ObjectIndex => (OBJECT_SELECT, Some(OBJECT_JOIN), OBJECT_NAME),
    };

    let mut predicates: Vec<String> = join.iter().map(|j| j.to_string()).collect();
    predicates.extend(
        pattern
            .split_whitespace()
            .map(|term| format!("{} LIKE '%{}%' ESCAPE '\\'", name_col, escape_literal(term))),
    );

    let mut sql = String::from(select);
    if !predicates.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&predicates.join(" AND "));
    }
    sql.push_str(&format!(
        " ORDER BY LENGTH({name}), LOWER({name}) LIMIT {limit}",
        name = name_col,
        limit = RESULT_LIMIT
    ));
    sql
}

/// Backslash-escape LIKE wildcards and double single quotes
fn escape_literal(term: &str) -> String {
    let mut out = String::with_capacity(term.len());
    for c in term.chars() {
        match c {
            '\\' | '%' | '_' => {
                out.push('\\');
                out.push(c);
            }
            '\'' => out.push_str("''"),
            _ => out.push(c),
        }
    }
    out
}
