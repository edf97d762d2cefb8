//! Query execution against docset databases.
//!
//! Two engines are available: [`SqliteEngine`] runs queries in-process and
//! reads typed columns, [`ProcessEngine`] shells out to a `sqlite3` binary and
//! parses its pipe-delimited list output.

use crate::error::DocsetError;
use crate::schema::Dialect;
use rusqlite::{Connection, OpenFlags};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Command;

/// Field separator requested from the `sqlite3` list mode
pub const FIELD_SEPARATOR: char = '|';

/// One symbol hit from a docset index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Row {
    pub symbol_type: String,
    pub symbol_name: String,
    pub file_path: String,
    /// Only populated by the object index dialect
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anchor: Option<String>,
}

impl Row {
    pub fn new(
        symbol_type: impl Into<String>,
        symbol_name: impl Into<String>,
        file_path: impl Into<String>,
    ) -> Self {
        Self {
            symbol_type: symbol_type.into(),
            symbol_name: symbol_name.into(),
            file_path: file_path.into(),
            anchor: None,
        }
    }

    pub fn with_anchor(mut self, anchor: impl Into<String>) -> Self {
        let anchor = anchor.into();
        self.anchor = (!anchor.is_empty()).then_some(anchor);
        self
    }
}

/// Runs a composed query and returns its rows.
pub trait QueryEngine {
    fn execute(&self, db_path: &Path, dialect: Dialect, sql: &str) -> crate::Result<Vec<Row>>;
}

/// In-process engine backed by rusqlite.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteEngine;

impl QueryEngine for SqliteEngine {
    fn execute(&self, db_path: &Path, dialect: Dialect, sql: &str) -> crate::Result<Vec<Row>> {
        let conn = Connection::open_with_flags(
            db_path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| DocsetError::UnreadableDatabase {
            path: db_path.to_path_buf(),
            message: e.to_string(),
        })?;

        let mut stmt = conn.prepare(sql)?;
        let has_anchor = dialect == Dialect::ObjectIndex;
        let rows = stmt.query_map([], |row| {
            let symbol_type: Option<String> = row.get(0)?;
            let symbol_name: Option<String> = row.get(1)?;
            let file_path: Option<String> = row.get(2)?;
            let anchor: Option<String> = if has_anchor { row.get(3)? } else { None };
            Ok((symbol_type, symbol_name, file_path, anchor))
        })?;

        let mut out = Vec::new();
        for row in rows {
            match row {
                Ok((Some(ty), Some(name), Some(path), anchor)) => {
                    let row = Row::new(ty, name, path);
                    out.push(match anchor {
                        Some(anchor) => row.with_anchor(anchor),
                        None => row,
                    });
                }
                Ok(_) => tracing::debug!(db = %db_path.display(), "dropping row with NULL column"),
                Err(e) => tracing::debug!(db = %db_path.display(), error = %e, "dropping unreadable row"),
            }
        }
        Ok(out)
    }
}

/// Engine that invokes an external `sqlite3` binary.
#[derive(Debug, Clone)]
pub struct ProcessEngine {
    program: String,
    debug: bool,
}

impl ProcessEngine {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            debug: false,
        }
    }

    /// Surface the engine's stderr at warn level instead of debug
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }
}

impl Default for ProcessEngine {
    fn default() -> Self {
        Self::new("sqlite3")
    }
}

impl QueryEngine for ProcessEngine {
    fn execute(&self, db_path: &Path, dialect: Dialect, sql: &str) -> crate::Result<Vec<Row>> {
        let output = Command::new(&self.program)
            .arg("-list")
            .arg("-separator")
            .arg(FIELD_SEPARATOR.to_string())
            .arg(db_path)
            .arg(sql)
            .output()
            .map_err(|e| DocsetError::EngineUnavailable {
                program: self.program.clone(),
                message: e.to_string(),
            })?;

        let stderr = String::from_utf8_lossy(&output.stderr);
        let stderr = stderr.trim();
        if !output.status.success() || !stderr.is_empty() {
            // Rows already written to stdout are still returned.
            if self.debug {
                tracing::warn!(
                    db = %db_path.display(),
                    status = %output.status,
                    stderr,
                    "query engine reported errors"
                );
            } else {
                tracing::debug!(db = %db_path.display(), status = %output.status, stderr);
            }
        }

        Ok(parse_table(&String::from_utf8_lossy(&output.stdout), dialect))
    }
}

/// Parse `sqlite3 -list` output into rows.
///
/// Records are newline separated and fields are `|` separated, with no
/// escaping. Records with fewer fields than the dialect selects are dropped.
/// Records with more fields (a symbol or path containing `|`) keep the leading
/// columns and fold the remainder into the last one, so such rows come back
/// with shifted columns.
pub fn parse_table(output: &str, dialect: Dialect) -> Vec<Row> {
    let width = dialect.column_count();

    output
        .lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.is_empty())
        .filter_map(|line| {
            let fields: Vec<&str> = line.splitn(width, FIELD_SEPARATOR).collect();
            if fields.len() < width {
                tracing::debug!(line, "dropping malformed row");
                return None;
            }
            let row = Row::new(fields[0], fields[1], fields[2]);
            Some(match dialect {
                Dialect::LegacyIndex => row,
                Dialect::ObjectIndex => row.with_anchor(fields[3]),
            })
        })
        .collect()
}
