//! Multi-docset search orchestration

use crate::config::{Config, EngineKind};
use crate::engine::{ProcessEngine, QueryEngine, SqliteEngine};
use crate::format::{format, Candidate, DEFAULT_TEMPLATE};
use crate::narrow::narrow;
use crate::query::compose;
use crate::registry::{Connection, Registry};
use crate::schema::DialectProbe;

/// Patterns shorter than this return nothing by default
pub const DEFAULT_MIN_LENGTH: usize = 3;

/// Search options
#[derive(Debug, Clone)]
pub struct SearchOptions {
    pub min_length: usize,
    pub template: String,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            min_length: DEFAULT_MIN_LENGTH,
            template: DEFAULT_TEMPLATE.to_string(),
        }
    }
}

impl SearchOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            min_length: config.search.min_length,
            template: config.search.candidate_format.clone(),
        }
    }

    pub fn with_min_length(mut self, min_length: usize) -> Self {
        self.min_length = min_length;
        self
    }

    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.template = template.into();
        self
    }
}

/// Build the query engine selected in config
pub fn engine_from_config(config: &Config) -> Box<dyn QueryEngine> {
    match config.search.engine {
        EngineKind::Sqlite => Box::new(SqliteEngine),
        EngineKind::Process => Box::new(
            ProcessEngine::new(config.search.sqlite_program.clone())
                .with_debug(config.debug.enabled),
        ),
    }
}

/// Searches the registry's active docsets.
///
/// Borrows the registry; register docsets before constructing a searcher.
pub struct Searcher<'a, P: DialectProbe> {
    registry: &'a Registry<P>,
    engine: &'a dyn QueryEngine,
    options: SearchOptions,
}

impl<'a, P: DialectProbe> Searcher<'a, P> {
    pub fn new(registry: &'a Registry<P>, engine: &'a dyn QueryEngine) -> Self {
        Self {
            registry,
            engine,
            options: SearchOptions::default(),
        }
    }

    pub fn with_options(mut self, options: SearchOptions) -> Self {
        self.options = options;
        self
    }

    /// Search active docsets for `pattern`.
    ///
    /// Results are grouped per docset in active-set order; within a docset
    /// they keep the query's length-then-name ordering.
    pub fn search(&self, pattern: &str) -> Vec<Candidate> {
        if pattern.chars().count() < self.options.min_length {
            return Vec::new();
        }
        self.run(pattern)
    }

    /// Every symbol of every active docset, up to the per-docset limit.
    pub fn list_all(&self) -> Vec<Candidate> {
        self.run("")
    }

    fn run(&self, pattern: &str) -> Vec<Candidate> {
        let available = self.registry.available();
        let narrowed = narrow(pattern, &available);

        narrowed
            .connections
            .iter()
            .flat_map(|conn| self.search_docset(conn, &narrowed.pattern))
            .collect()
    }

    fn search_docset(&self, conn: &Connection, pattern: &str) -> Vec<Candidate> {
        let sql = compose(conn.dialect, pattern);
        tracing::debug!(docset = %conn.name, %sql, "querying docset");

        match self.engine.execute(&conn.db_path, conn.dialect, &sql) {
            Ok(rows) => rows
                .into_iter()
                .map(|row| Candidate {
                    display: format(&self.options.template, &conn.name, &row),
                    docset: conn.name.clone(),
                    row,
                })
                .collect(),
            Err(e) => {
                tracing::warn!(docset = %conn.name, error = %e, "skipping docset");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Row;
    use crate::error::DocsetError;
    use crate::schema::Dialect;
    use std::cell::RefCell;
    use std::fs;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    struct FixedProbe;

    impl DialectProbe for FixedProbe {
        fn detect(&self, _db_path: &Path) -> crate::Result<Dialect> {
            Ok(Dialect::LegacyIndex)
        }
    }

    /// Engine returning canned rows keyed by database path
    #[derive(Default)]
    struct ScriptedEngine {
        calls: RefCell<Vec<(PathBuf, String)>>,
        fail_for: Option<PathBuf>,
    }

    impl QueryEngine for ScriptedEngine {
        fn execute(&self, db_path: &Path, _dialect: Dialect, sql: &str) -> crate::Result<Vec<Row>> {
            self.calls
                .borrow_mut()
                .push((db_path.to_path_buf(), sql.to_string()));
            if self.fail_for.as_deref() == Some(db_path) {
                return Err(DocsetError::UnreadableDatabase {
                    path: db_path.to_path_buf(),
                    message: "boom".to_string(),
                });
            }
            let docset = db_path
                .ancestors()
                .find_map(|p| p.file_stem().filter(|_| p.extension().is_some_and(|e| e == "docset")))
                .and_then(|s| s.to_str())
                .unwrap_or("?")
                .to_string();
            Ok(vec![
                Row::new("func", format!("{docset}One"), "one.html"),
                Row::new("func", format!("{docset}Two"), "two.html"),
            ])
        }
    }

    fn registry(root: &Path, common: &[&str]) -> Registry<FixedProbe> {
        for name in common {
            fs::create_dir_all(root.join(format!("{name}.docset"))).unwrap();
        }
        let mut registry = Registry::with_probe(root, FixedProbe);
        registry.ensure_common(common.iter().copied()).unwrap();
        registry
    }

    #[test]
    fn test_short_pattern_queries_nothing() {
        let root = TempDir::new().unwrap();
        let registry = registry(root.path(), &["Redis"]);
        let engine = ScriptedEngine::default();
        let searcher = Searcher::new(&registry, &engine)
            .with_options(SearchOptions::default().with_min_length(3));

        assert!(searcher.search("bl").is_empty());
        assert!(engine.calls.borrow().is_empty());
    }

    #[test]
    fn test_results_concatenate_in_connection_order() {
        let root = TempDir::new().unwrap();
        let registry = registry(root.path(), &["Redis", "Go"]);
        let engine = ScriptedEngine::default();
        let searcher = Searcher::new(&registry, &engine);

        let names: Vec<_> = searcher
            .search("one two")
            .into_iter()
            .map(|c| c.row.symbol_name)
            .collect();
        assert_eq!(names, ["RedisOne", "RedisTwo", "GoOne", "GoTwo"]);
    }

    #[test]
    fn test_narrowed_search_strips_prefix() {
        let root = TempDir::new().unwrap();
        let registry = registry(root.path(), &["Redis", "Go"]);
        let engine = ScriptedEngine::default();
        let searcher = Searcher::new(&registry, &engine);

        let candidates = searcher.search("redis blpop");
        assert!(candidates.iter().all(|c| c.docset == "Redis"));

        let calls = engine.calls.borrow();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].1.contains("LIKE '%blpop%'"));
        assert!(!calls[0].1.contains("redis"));
    }

    #[test]
    fn test_failing_docset_is_skipped() {
        let root = TempDir::new().unwrap();
        let registry = registry(root.path(), &["Redis", "Go"]);
        let engine = ScriptedEngine {
            fail_for: Some(registry.get("Redis").unwrap().db_path.clone()),
            ..Default::default()
        };
        let searcher = Searcher::new(&registry, &engine);

        let candidates = searcher.search("anything");
        assert_eq!(candidates.len(), 2);
        assert!(candidates.iter().all(|c| c.docset == "Go"));
    }

    #[test]
    fn test_list_all_bypasses_min_length() {
        let root = TempDir::new().unwrap();
        let registry = registry(root.path(), &["Redis"]);
        let engine = ScriptedEngine::default();
        let searcher = Searcher::new(&registry, &engine)
            .with_options(SearchOptions::default().with_min_length(10));

        assert_eq!(searcher.list_all().len(), 2);
        assert!(!engine.calls.borrow()[0].1.contains("WHERE"));
    }

    #[test]
    fn test_candidates_use_template() {
        let root = TempDir::new().unwrap();
        let registry = registry(root.path(), &["Redis"]);
        let engine = ScriptedEngine::default();
        let searcher = Searcher::new(&registry, &engine)
            .with_options(SearchOptions::default().with_template("%n [%t] %f"));

        let candidates = searcher.search("one");
        assert_eq!(candidates[0].display, "RedisOne [func] one");
    }

    #[test]
    fn test_min_length_counts_chars() {
        let root = TempDir::new().unwrap();
        let registry = registry(root.path(), &["Redis"]);
        let engine = ScriptedEngine::default();
        let searcher = Searcher::new(&registry, &engine);

        // three chars, six bytes
        assert!(!searcher.search("äöü").is_empty());
    }
}
