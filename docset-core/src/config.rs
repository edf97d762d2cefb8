//! Configuration for docset

use crate::DocsetError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default configuration as TOML
pub const DEFAULT_CONFIG: &str = r#"# Docset Configuration

[docsets]
# Root directory holding installed <Name>.docset packages ("~" is expanded)
path = "~/.docsets"
# Docsets searched by default
common = []

[contexts]
# Docsets searched in a given context, ahead of the common ones
# rust = ["Rust"]
# python = ["Python 3", "Django"]

[search]
# Patterns shorter than this return nothing
min_length = 3
# %d docset, %n symbol name, %t symbol type, %f file stem
candidate_format = "%d %n"
# "sqlite" (in-process) or "process" (external sqlite3 binary)
engine = "sqlite"
sqlite_program = "sqlite3"

[install]
# Network timeout (e.g., "5s", "1m")
timeout = "5s"
tar_program = "tar"

[browser]
# Command used to open result URLs; empty picks the platform default
command = ""

[debug]
# Surface query engine diagnostics
enabled = false
"#;

/// Docset configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub docsets: DocsetsConfig,
    #[serde(default)]
    pub contexts: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub install: InstallConfig,
    #[serde(default)]
    pub browser: BrowserConfig,
    #[serde(default)]
    pub debug: DebugConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocsetsConfig {
    #[serde(default = "default_docsets_path")]
    pub path: String,
    #[serde(default)]
    pub common: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_min_length")]
    pub min_length: usize,
    #[serde(default = "default_candidate_format")]
    pub candidate_format: String,
    #[serde(default)]
    pub engine: EngineKind,
    #[serde(default = "default_sqlite_program")]
    pub sqlite_program: String,
}

/// Which query engine runs composed queries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    #[default]
    Sqlite,
    Process,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallConfig {
    #[serde(default = "default_timeout")]
    pub timeout: String,
    #[serde(default = "default_tar_program")]
    pub tar_program: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BrowserConfig {
    #[serde(default)]
    pub command: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DebugConfig {
    #[serde(default)]
    pub enabled: bool,
}

// Default value functions
fn default_docsets_path() -> String {
    "~/.docsets".to_string()
}
fn default_min_length() -> usize {
    3
}
fn default_candidate_format() -> String {
    "%d %n".to_string()
}
fn default_sqlite_program() -> String {
    "sqlite3".to_string()
}
fn default_timeout() -> String {
    "5s".to_string()
}
fn default_tar_program() -> String {
    "tar".to_string()
}

impl Default for DocsetsConfig {
    fn default() -> Self {
        Self {
            path: default_docsets_path(),
            common: Vec::new(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            min_length: default_min_length(),
            candidate_format: default_candidate_format(),
            engine: EngineKind::default(),
            sqlite_program: default_sqlite_program(),
        }
    }
}

impl Default for InstallConfig {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            tar_program: default_tar_program(),
        }
    }
}

impl Config {
    /// Load config from a TOML file
    pub fn load(path: &Path) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Load config, falling back to defaults when the file does not exist
    pub fn load_or_default(path: &Path) -> crate::Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse config from TOML string
    pub fn from_toml(content: &str) -> crate::Result<Self> {
        toml::from_str(content).map_err(|e| DocsetError::ConfigParse(e.to_string()))
    }

    /// Write config back as TOML, creating parent directories
    pub fn save(&self, path: &Path) -> crate::Result<()> {
        let content =
            toml::to_string_pretty(self).map_err(|e| DocsetError::ConfigParse(e.to_string()))?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Resolve the config file location.
    ///
    /// Priority: explicit path, `DOCSET_CONFIG`, then the XDG config home
    /// (`~/.config/docset/config.toml`).
    pub fn default_path(explicit: Option<&Path>) -> crate::Result<PathBuf> {
        if let Some(path) = explicit {
            return Ok(path.to_path_buf());
        }
        if let Ok(val) = std::env::var("DOCSET_CONFIG") {
            return Ok(PathBuf::from(val));
        }
        xdg::BaseDirectories::with_prefix("docset")
            .get_config_home()
            .map(|dir| dir.join("config.toml"))
            .ok_or_else(|| {
                DocsetError::ConfigParse("could not determine XDG config home directory".into())
            })
    }

    /// Docsets root with a leading "~" expanded
    pub fn docsets_path(&self) -> PathBuf {
        expand_home(&self.docsets.path)
    }

    /// Get network timeout as Duration
    pub fn timeout_duration(&self) -> Duration {
        parse_duration(&self.install.timeout).unwrap_or(Duration::from_secs(5))
    }

    /// Contextual active set for a context name (empty when unknown)
    pub fn context_docsets(&self, context: &str) -> &[String] {
        self.contexts
            .get(context)
            .map(|names| names.as_slice())
            .unwrap_or(&[])
    }
}

fn expand_home(path: &str) -> PathBuf {
    if path == "~" || path.starts_with("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            let rest = path.trim_start_matches('~').trim_start_matches('/');
            return PathBuf::from(home).join(rest);
        }
    }
    PathBuf::from(path)
}

/// Parse duration string (e.g., "5s", "30m", "1h")
fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    let (idx, unit) = s.char_indices().last()?;
    let num: u64 = s[..idx].parse().ok()?;

    let scale = match unit {
        's' => 1,
        'm' => 60,
        'h' => 3600,
        'd' => 86400,
        _ => return None,
    };
    num.checked_mul(scale).map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_parses() {
        let config = Config::from_toml(DEFAULT_CONFIG).unwrap();
        assert_eq!(config.search.min_length, 3);
        assert_eq!(config.search.candidate_format, "%d %n");
        assert_eq!(config.search.engine, EngineKind::Sqlite);
        assert!(config.docsets.common.is_empty());
        assert!(!config.debug.enabled);
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("30s"), Some(Duration::from_secs(30)));
        assert_eq!(parse_duration("5m"), Some(Duration::from_secs(300)));
        assert_eq!(parse_duration("1h"), Some(Duration::from_secs(3600)));
        assert_eq!(parse_duration("invalid"), None);
    }

    #[test]
    fn test_parse_duration_rejects_multibyte_unit_and_overflow() {
        assert_eq!(parse_duration("5µ"), None);
        assert_eq!(parse_duration("µ"), None);
        assert_eq!(parse_duration("999999999999999999d"), None);
    }

    #[test]
    fn test_bad_timeout_falls_back_to_default() {
        let mut config = Config::default();
        config.install.timeout = "5µ".to_string();
        assert_eq!(config.timeout_duration(), Duration::from_secs(5));
        config.install.timeout = "999999999999999999d".to_string();
        assert_eq!(config.timeout_duration(), Duration::from_secs(5));
    }

    #[test]
    fn test_timeout_duration() {
        let config = Config::from_toml(DEFAULT_CONFIG).unwrap();
        assert_eq!(config.timeout_duration(), Duration::from_secs(5));
    }

    #[test]
    fn test_contexts_and_engine() {
        let config = Config::from_toml(
            r#"
            [contexts]
            rust = ["Rust", "Tokio"]
            [search]
            engine = "process"
            "#,
        )
        .unwrap();
        assert_eq!(config.context_docsets("rust"), ["Rust", "Tokio"]);
        assert!(config.context_docsets("go").is_empty());
        assert_eq!(config.search.engine, EngineKind::Process);
    }

    #[test]
    fn test_save_roundtrip() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested/config.toml");
        let mut config = Config::default();
        config.docsets.common = vec!["Redis".to_string()];
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.docsets.common, vec!["Redis".to_string()]);
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = Config::load_or_default(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.search.min_length, 3);
    }

    #[test]
    fn test_absolute_docsets_path_untouched() {
        let mut config = Config::default();
        config.docsets.path = "/opt/docsets".to_string();
        assert_eq!(config.docsets_path(), PathBuf::from("/opt/docsets"));
    }
}
