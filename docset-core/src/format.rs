//! Candidate display formatting

use crate::engine::Row;
use serde::Serialize;

/// Template used when none is configured
pub const DEFAULT_TEMPLATE: &str = "%d %n";

/// A formatted, selectable search result
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Candidate {
    pub display: String,
    pub docset: String,
    pub row: Row,
}

/// Render `template` for a row of `docset`.
///
/// `%d` docset name, `%n` symbol name, `%t` symbol type, `%f` file stem.
/// Any other `%x` sequence is copied through unchanged.
pub fn format(template: &str, docset: &str, row: &Row) -> String {
    let mut out = String::with_capacity(template.len() + row.symbol_name.len());
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.peek().copied() {
            Some('d') => out.push_str(docset),
            Some('n') => out.push_str(&row.symbol_name),
            Some('t') => out.push_str(&row.symbol_type),
            Some('f') => out.push_str(file_stem(&row.file_path)),
            _ => {
                out.push('%');
                continue;
            }
        }
        chars.next();
    }
    out
}

/// Last path segment with any `#fragment` and `.html`/`.htm` suffix removed.
pub fn file_stem(path: &str) -> &str {
    let path = path.split('#').next().unwrap_or(path);
    let segment = path.rsplit('/').next().unwrap_or(path);
    segment
        .strip_suffix(".html")
        .or_else(|| segment.strip_suffix(".htm"))
        .unwrap_or(segment)
}
