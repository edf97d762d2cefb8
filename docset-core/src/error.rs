//! Error types for docset operations

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Structured error payload for machine-readable CLI output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub code: String,
    pub message: String,
    pub hint: String,
}

impl ErrorEnvelope {
    pub fn new(
        code: impl Into<String>,
        message: impl Into<String>,
        hint: impl Into<String>,
    ) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            hint: hint.into(),
        }
    }
}

/// Why an archive could not be unpacked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionFailure {
    /// The archiver hit a file name or path length limit
    PathTooLong,
    /// Any other non-zero exit; carries the archiver's diagnostic output
    Other(String),
}

impl std::fmt::Display for ExtractionFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PathTooLong => write!(f, "path too long for the file system"),
            Self::Other(msg) => write!(f, "{}", msg),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DocsetError {
    #[error("Docset not found: {name} (looked under {})", .root.display())]
    DocsetNotFound { name: String, root: PathBuf },

    #[error("Unreadable docset database {}: {message}", .path.display())]
    UnreadableDatabase { path: PathBuf, message: String },

    #[error("Unsupported docset dialect: {0}")]
    UnsupportedDialect(String),

    #[error("Query engine unavailable ({program}): {message}")]
    EngineUnavailable { program: String, message: String },

    #[error("Download failed for {url}: {message}")]
    DownloadFailed { url: String, message: String },

    #[error("Timed out fetching {url}")]
    TimeoutExceeded { url: String },

    #[error("Extraction of {} failed: {kind}", .archive.display())]
    ExtractionFailed {
        archive: PathBuf,
        kind: ExtractionFailure,
    },

    #[error("Could not determine the docset extracted from {}", .0.display())]
    AmbiguousExtractionResult(PathBuf),

    #[error("Feed parse error: {0}")]
    FeedParse(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DocsetError {
    /// Stable identifier used in JSON error output.
    pub fn code(&self) -> &'static str {
        match self {
            Self::DocsetNotFound { .. } => "docset_not_found",
            Self::UnreadableDatabase { .. } => "unreadable_database",
            Self::UnsupportedDialect(_) => "unsupported_dialect",
            Self::EngineUnavailable { .. } => "engine_unavailable",
            Self::DownloadFailed { .. } => "download_failed",
            Self::TimeoutExceeded { .. } => "timeout_exceeded",
            Self::ExtractionFailed { .. } => "extraction_failed",
            Self::AmbiguousExtractionResult(_) => "ambiguous_extraction_result",
            Self::FeedParse(_) => "feed_parse",
            Self::Database(_) => "database",
            Self::Io(_) => "io",
            Self::ConfigParse(_) => "config_parse",
            Self::Serialization(_) => "serialization",
        }
    }

    /// A short actionable suggestion for the user.
    pub fn hint(&self) -> &'static str {
        match self {
            Self::DocsetNotFound { .. } => {
                "Install the docset or remove it from the active set in config.toml"
            }
            Self::UnreadableDatabase { .. } => "Reinstall the docset; its index looks damaged",
            Self::EngineUnavailable { .. } => {
                "Install sqlite3 or set search.engine = \"sqlite\" in config.toml"
            }
            Self::TimeoutExceeded { .. } => "Raise install.timeout in config.toml and retry",
            Self::ExtractionFailed {
                kind: ExtractionFailure::PathTooLong,
                ..
            } => "Move the docsets root to a shorter path",
            _ => "",
        }
    }

    pub fn envelope(&self) -> ErrorEnvelope {
        ErrorEnvelope::new(self.code(), self.to_string(), self.hint())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_carries_code_and_hint() {
        let err = DocsetError::DocsetNotFound {
            name: "Redis".to_string(),
            root: PathBuf::from("/tmp/docsets"),
        };
        let env = err.envelope();
        assert_eq!(env.code, "docset_not_found");
        assert!(env.message.contains("Redis"));
        assert!(!env.hint.is_empty());
    }

    #[test]
    fn test_path_too_long_message() {
        let err = DocsetError::ExtractionFailed {
            archive: PathBuf::from("a.tgz"),
            kind: ExtractionFailure::PathTooLong,
        };
        assert!(err.to_string().contains("path too long"));
        assert_eq!(err.code(), "extraction_failed");
    }
}
