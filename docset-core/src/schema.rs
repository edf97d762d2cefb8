//! Docset schema detection.
//!
//! Docsets ship one of two index layouts: a flat `searchIndex` table, or the
//! Core Data style `ZTOKEN` family of tables that also records anchors.

use crate::error::DocsetError;
use rusqlite::{Connection, OpenFlags};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;

/// Table that marks the flat index layout
pub const LEGACY_INDEX_TABLE: &str = "searchIndex";

/// On-disk schema shape of a docset index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dialect {
    /// Flat `searchIndex(name, type, path)` table
    LegacyIndex,
    /// `ZTOKEN` / `ZTOKENTYPE` / `ZFILEPATH` / `ZTOKENMETAINFORMATION` tables
    ObjectIndex,
}

impl Dialect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LegacyIndex => "legacy_index",
            Self::ObjectIndex => "object_index",
        }
    }

    /// Number of columns a composed query selects for this dialect
    pub fn column_count(&self) -> usize {
        match self {
            Self::LegacyIndex => 3,
            Self::ObjectIndex => 4,
        }
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dialect {
    type Err = DocsetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "legacy_index" | "DASH" => Ok(Self::LegacyIndex),
            "object_index" | "ZDASH" => Ok(Self::ObjectIndex),
            other => Err(DocsetError::UnsupportedDialect(other.to_string())),
        }
    }
}

/// Classifies a docset database into a [`Dialect`].
pub trait DialectProbe {
    fn detect(&self, db_path: &Path) -> crate::Result<Dialect>;
}

/// Reads the table catalog through a read-only SQLite handle.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteProbe;

impl DialectProbe for SqliteProbe {
    fn detect(&self, db_path: &Path) -> crate::Result<Dialect> {
        detect(db_path)
    }
}

/// Detect the dialect of the database at `db_path`.
pub fn detect(db_path: &Path) -> crate::Result<Dialect> {
    let unreadable = |message: String| DocsetError::UnreadableDatabase {
        path: db_path.to_path_buf(),
        message,
    };

    if !db_path.is_file() {
        return Err(unreadable("no such file".to_string()));
    }

    let conn = Connection::open_with_flags(
        db_path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )
    .map_err(|e| unreadable(e.to_string()))?;

    let tables = table_names(&conn).map_err(|e| unreadable(e.to_string()))?;

    let dialect = if tables.iter().any(|t| t == LEGACY_INDEX_TABLE) {
        Dialect::LegacyIndex
    } else {
        Dialect::ObjectIndex
    };
    tracing::debug!(db = %db_path.display(), %dialect, "detected docset dialect");
    Ok(dialect)
}

fn table_names(conn: &Connection) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT name FROM sqlite_master WHERE type = 'table'")?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
    rows.collect()
}
