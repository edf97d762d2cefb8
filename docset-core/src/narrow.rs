//! Docset narrowing: a query starting with "<docset name> " searches only
//! that docset.

use crate::registry::Connection;

/// Connections to search and the pattern to search them with
#[derive(Debug)]
pub struct Narrowed<'a> {
    pub connections: Vec<&'a Connection>,
    pub pattern: String,
}

/// Restrict `connections` when `pattern` is prefixed by a docset name.
///
/// Matching is case-insensitive and requires a single space after the name.
/// The first matching connection in order wins; its prefix is stripped from
/// the returned pattern.
pub fn narrow<'a>(pattern: &str, connections: &[&'a Connection]) -> Narrowed<'a> {
    for conn in connections {
        if let Some(rest) = strip_docset_prefix(pattern, &conn.name) {
            tracing::debug!(docset = %conn.name, pattern = rest, "narrowed search");
            return Narrowed {
                connections: vec![*conn],
                pattern: rest.to_string(),
            };
        }
    }

    Narrowed {
        connections: connections.to_vec(),
        pattern: pattern.to_string(),
    }
}

fn strip_docset_prefix<'p>(pattern: &'p str, name: &str) -> Option<&'p str> {
    let head = pattern.get(..name.len())?;
    let rest = pattern.get(name.len()..)?.strip_prefix(' ')?;
    (head.to_lowercase() == name.to_lowercase()).then_some(rest)
}
