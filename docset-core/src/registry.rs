//! Connection registry: docset name -> resolved database and dialect.
//!
//! The registry is an explicit value owned by the caller. Entries are created
//! lazily the first time a name shows up in the common or contextual active
//! set, and only go away on [`Registry::reset`] or deactivation.

use crate::engine::Row;
use crate::error::DocsetError;
use crate::schema::{Dialect, DialectProbe, SqliteProbe};
use crate::url::result_url;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

/// Directory suffix of a docset package
pub const DOCSET_EXTENSION: &str = "docset";
/// Index database inside a docset package
pub const DATABASE_PATH: &str = "Contents/Resources/docSet.dsidx";
/// Documents tree inside a docset package
pub const DOCUMENTS_PATH: &str = "Contents/Resources/Documents";

/// A resolved, reusable docset handle
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Connection {
    pub name: String,
    pub docset_dir: PathBuf,
    pub db_path: PathBuf,
    pub dialect: Dialect,
}

/// A docset layout guess: maps (root, name) to a candidate package directory.
type Layout = fn(&Path, &str) -> Option<PathBuf>;

/// Layout guesses, tried in order.
const LAYOUTS: &[Layout] = &[flat_layout, nested_layout, nested_any_layout];

/// `<root>/<name>.docset`
fn flat_layout(root: &Path, name: &str) -> Option<PathBuf> {
    Some(root.join(format!("{}.{}", name, DOCSET_EXTENSION)))
}

/// `<root>/<name>/<name>.docset`
fn nested_layout(root: &Path, name: &str) -> Option<PathBuf> {
    Some(root.join(name).join(format!("{}.{}", name, DOCSET_EXTENSION)))
}

/// `<root>/<name>/<anything>.docset`, when exactly one such directory exists
fn nested_any_layout(root: &Path, name: &str) -> Option<PathBuf> {
    let entries = fs::read_dir(root.join(name)).ok()?;
    let mut packages: Vec<PathBuf> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.is_dir() && is_docset_package(p))
        .collect();
    if packages.len() == 1 {
        packages.pop()
    } else {
        None
    }
}

fn is_docset_package(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some(DOCSET_EXTENSION)
}

/// Find the package directory for `name` under `root`.
pub fn resolve_docset_dir(root: &Path, name: &str) -> crate::Result<PathBuf> {
    LAYOUTS
        .iter()
        .filter_map(|layout| layout(root, name))
        .find(|candidate| candidate.is_dir())
        .ok_or_else(|| DocsetError::DocsetNotFound {
            name: name.to_string(),
            root: root.to_path_buf(),
        })
}

/// Names of the docsets installed under `root`, sorted.
///
/// Recognizes `<Name>.docset` packages at the top level and directories that
/// resolve through one of the nested layouts.
pub fn installed_docsets(root: &Path) -> crate::Result<Vec<String>> {
    let mut names = Vec::new();
    if !root.is_dir() {
        return Ok(names);
    }

    for entry in fs::read_dir(root)? {
        let path = entry?.path();
        if !path.is_dir() {
            continue;
        }
        if is_docset_package(&path) {
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        } else if let Some(name) = path.file_name().and_then(|s| s.to_str()) {
            if resolve_docset_dir(root, name).is_ok() {
                names.push(name.to_string());
            }
        }
    }

    names.sort();
    names.dedup();
    Ok(names)
}

/// Process-wide docset connection cache with two active sets
pub struct Registry<P: DialectProbe = SqliteProbe> {
    root: PathBuf,
    probe: P,
    connections: HashMap<String, Connection>,
    common: Vec<String>,
    contextual: Vec<String>,
}

impl Registry<SqliteProbe> {
    /// Create an empty registry for docsets installed under `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_probe(root, SqliteProbe)
    }
}

impl<P: DialectProbe> Registry<P> {
    pub fn with_probe(root: impl Into<PathBuf>, probe: P) -> Self {
        Self {
            root: root.into(),
            probe,
            connections: HashMap::new(),
            common: Vec::new(),
            contextual: Vec::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn probe(&self) -> &P {
        &self.probe
    }

    pub fn common(&self) -> &[String] {
        &self.common
    }

    pub fn contextual(&self) -> &[String] {
        &self.contextual
    }

    pub fn get(&self, name: &str) -> Option<&Connection> {
        self.connections.get(name)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Make `names` the common active set and register any new ones.
    ///
    /// Names already registered are skipped. The first name that cannot be
    /// resolved or detected aborts with its error.
    pub fn ensure_common<I, S>(&mut self, names: I) -> crate::Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.common = dedup_names(names);
        for name in self.common.clone() {
            self.ensure(&name)?;
        }
        Ok(())
    }

    /// Make `names` the contextual active set and register any new ones.
    pub fn ensure_contextual<I, S>(&mut self, names: I) -> crate::Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.contextual = dedup_names(names);
        for name in self.contextual.clone() {
            self.ensure(&name)?;
        }
        Ok(())
    }

    /// Append `name` to the common set and register it.
    pub fn activate_common(&mut self, name: &str) -> crate::Result<&Connection> {
        if !self.common.iter().any(|n| n == name) {
            self.common.push(name.to_string());
        }
        self.ensure(name)
    }

    /// Remove `name` from the common set. Returns whether it was active.
    ///
    /// The connection is dropped unless the contextual set still uses it.
    pub fn deactivate_common(&mut self, name: &str) -> bool {
        let before = self.common.len();
        self.common.retain(|n| n != name);
        let removed = self.common.len() != before;
        if removed && !self.contextual.iter().any(|n| n == name) {
            self.connections.remove(name);
        }
        removed
    }

    /// Connections to search: contextual first, then common, each name once.
    pub fn available(&self) -> Vec<&Connection> {
        let mut seen = HashSet::new();
        self.contextual
            .iter()
            .chain(self.common.iter())
            .filter(|name| seen.insert(*name))
            .filter_map(|name| self.connections.get(name))
            .collect()
    }

    /// Drop every cached connection; the next `ensure_*` call re-detects.
    pub fn reset(&mut self) {
        tracing::debug!(count = self.connections.len(), "resetting docset registry");
        self.connections.clear();
    }

    /// URL of a row's page inside `docset`.
    pub fn result_url(&self, docset: &str, row: &Row) -> String {
        let docset_dir = self
            .connections
            .get(docset)
            .map(|c| c.docset_dir.clone())
            .unwrap_or_else(|| self.root.join(format!("{}.{}", docset, DOCSET_EXTENSION)));
        result_url(&docset_dir, &row.file_path, row.anchor.as_deref())
    }

    fn ensure(&mut self, name: &str) -> crate::Result<&Connection> {
        if !self.connections.contains_key(name) {
            let docset_dir = resolve_docset_dir(&self.root, name)?;
            let db_path = docset_dir.join(DATABASE_PATH);
            let dialect = self.probe.detect(&db_path)?;
            tracing::debug!(docset = name, %dialect, dir = %docset_dir.display(), "registered docset");
            self.connections.insert(
                name.to_string(),
                Connection {
                    name: name.to_string(),
                    docset_dir,
                    db_path,
                    dialect,
                },
            );
        }
        self.connections
            .get(name)
            .ok_or_else(|| DocsetError::DocsetNotFound {
                name: name.to_string(),
                root: self.root.clone(),
            })
    }
}

fn dedup_names<I, S>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut seen = HashSet::new();
    names
        .into_iter()
        .map(Into::into)
        .filter(|name| seen.insert(name.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use tempfile::TempDir;

    /// Probe that records every path it is asked about
    #[derive(Default)]
    struct CountingProbe {
        calls: RefCell<Vec<PathBuf>>,
    }

    impl DialectProbe for CountingProbe {
        fn detect(&self, db_path: &Path) -> crate::Result<Dialect> {
            self.calls.borrow_mut().push(db_path.to_path_buf());
            Ok(Dialect::LegacyIndex)
        }
    }

    fn make_package(dir: &Path) {
        fs::create_dir_all(dir.join(DOCUMENTS_PATH)).unwrap();
    }

    #[test]
    fn test_resolve_flat_layout() {
        let root = TempDir::new().unwrap();
        make_package(&root.path().join("Redis.docset"));
        let dir = resolve_docset_dir(root.path(), "Redis").unwrap();
        assert_eq!(dir, root.path().join("Redis.docset"));
    }

    #[test]
    fn test_resolve_nested_layout() {
        let root = TempDir::new().unwrap();
        make_package(&root.path().join("Go/Go.docset"));
        let dir = resolve_docset_dir(root.path(), "Go").unwrap();
        assert_eq!(dir, root.path().join("Go/Go.docset"));
    }

    #[test]
    fn test_resolve_nested_any_layout() {
        let root = TempDir::new().unwrap();
        make_package(&root.path().join("Python_3/Python 3.docset"));
        let dir = resolve_docset_dir(root.path(), "Python_3").unwrap();
        assert_eq!(dir, root.path().join("Python_3/Python 3.docset"));
    }

    #[test]
    fn test_resolve_nested_any_requires_single_package() {
        let root = TempDir::new().unwrap();
        make_package(&root.path().join("Bundle/A.docset"));
        make_package(&root.path().join("Bundle/B.docset"));
        assert!(matches!(
            resolve_docset_dir(root.path(), "Bundle"),
            Err(DocsetError::DocsetNotFound { .. })
        ));
    }

    #[test]
    fn test_resolve_prefers_flat_layout() {
        let root = TempDir::new().unwrap();
        make_package(&root.path().join("Go.docset"));
        make_package(&root.path().join("Go/Go.docset"));
        let dir = resolve_docset_dir(root.path(), "Go").unwrap();
        assert_eq!(dir, root.path().join("Go.docset"));
    }

    #[test]
    fn test_resolve_is_deterministic() {
        let root = TempDir::new().unwrap();
        make_package(&root.path().join("Redis.docset"));
        assert_eq!(
            resolve_docset_dir(root.path(), "Redis").unwrap(),
            resolve_docset_dir(root.path(), "Redis").unwrap()
        );
        let first = resolve_docset_dir(root.path(), "Missing").unwrap_err();
        let second = resolve_docset_dir(root.path(), "Missing").unwrap_err();
        assert_eq!(first.to_string(), second.to_string());
    }

    #[test]
    fn test_ensure_common_detects_once_per_name() {
        let root = TempDir::new().unwrap();
        make_package(&root.path().join("Redis.docset"));
        make_package(&root.path().join("Go.docset"));

        let mut registry = Registry::with_probe(root.path(), CountingProbe::default());
        registry.ensure_common(["Redis", "Go"]).unwrap();
        registry.ensure_common(["Redis", "Go"]).unwrap();
        assert_eq!(registry.probe().calls.borrow().len(), 2);

        registry.reset();
        assert!(registry.is_empty());
        registry.ensure_common(["Redis", "Go"]).unwrap();
        assert_eq!(registry.probe().calls.borrow().len(), 4);
    }

    #[test]
    fn test_ensure_contextual_shares_namespace() {
        let root = TempDir::new().unwrap();
        make_package(&root.path().join("Redis.docset"));

        let mut registry = Registry::with_probe(root.path(), CountingProbe::default());
        registry.ensure_common(["Redis"]).unwrap();
        registry.ensure_contextual(["Redis"]).unwrap();
        assert_eq!(registry.probe().calls.borrow().len(), 1);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_ensure_common_missing_docset_is_error() {
        let root = TempDir::new().unwrap();
        let mut registry = Registry::with_probe(root.path(), CountingProbe::default());
        let err = registry.ensure_common(["Nope"]).unwrap_err();
        assert!(matches!(err, DocsetError::DocsetNotFound { name, .. } if name == "Nope"));
    }

    #[test]
    fn test_ensure_common_unreadable_database_is_error() {
        let root = TempDir::new().unwrap();
        make_package(&root.path().join("Redis.docset"));
        let mut registry = Registry::new(root.path());
        let err = registry.ensure_common(["Redis"]).unwrap_err();
        assert!(matches!(err, DocsetError::UnreadableDatabase { .. }));
    }

    #[test]
    fn test_available_orders_contextual_first() {
        let root = TempDir::new().unwrap();
        for name in ["A", "B", "C"] {
            make_package(&root.path().join(format!("{name}.docset")));
        }

        let mut registry = Registry::with_probe(root.path(), CountingProbe::default());
        registry.ensure_common(["A", "B"]).unwrap();
        registry.ensure_contextual(["C", "B"]).unwrap();

        let names: Vec<_> = registry.available().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["C", "B", "A"]);
    }

    #[test]
    fn test_activate_and_deactivate_common() {
        let root = TempDir::new().unwrap();
        make_package(&root.path().join("Redis.docset"));

        let mut registry = Registry::with_probe(root.path(), CountingProbe::default());
        let conn = registry.activate_common("Redis").unwrap();
        assert_eq!(conn.name, "Redis");
        registry.activate_common("Redis").unwrap();
        assert_eq!(registry.common(), ["Redis"]);

        assert!(registry.deactivate_common("Redis"));
        assert!(registry.get("Redis").is_none());
        assert!(!registry.deactivate_common("Redis"));
    }

    #[test]
    fn test_deactivate_keeps_contextual_connection() {
        let root = TempDir::new().unwrap();
        make_package(&root.path().join("Redis.docset"));

        let mut registry = Registry::with_probe(root.path(), CountingProbe::default());
        registry.ensure_common(["Redis"]).unwrap();
        registry.ensure_contextual(["Redis"]).unwrap();
        registry.deactivate_common("Redis");
        assert!(registry.get("Redis").is_some());
    }

    #[test]
    fn test_installed_docsets() {
        let root = TempDir::new().unwrap();
        make_package(&root.path().join("Redis.docset"));
        make_package(&root.path().join("Go/Go.docset"));
        fs::create_dir_all(root.path().join("empty")).unwrap();
        fs::write(root.path().join("notes.txt"), "x").unwrap();

        assert_eq!(installed_docsets(root.path()).unwrap(), ["Go", "Redis"]);
    }

    #[test]
    fn test_installed_docsets_missing_root() {
        let root = TempDir::new().unwrap();
        assert!(installed_docsets(&root.path().join("absent")).unwrap().is_empty());
    }

    #[test]
    fn test_result_url_for_unregistered_docset() {
        let registry = Registry::new("/docsets");
        let url = registry.result_url("Redis", &Row::new("func", "x", "topics/problems.html"));
        assert_eq!(
            url,
            "file:///docsets/Redis.docset/Contents/Resources/Documents/topics/problems.html"
        );
    }
}
