//! Docset installation: fetch an archive, unpack it under the docsets root and
//! activate the result.

use crate::config::Config;
use crate::error::{DocsetError, ExtractionFailure};
use crate::feeds::{fetch, fetch_error, http_client};
use crate::registry::{Registry, DOCSET_EXTENSION};
use crate::schema::DialectProbe;
use serde::Serialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;
use tempfile::NamedTempFile;

/// Where the archive comes from
#[derive(Debug, Clone)]
pub enum InstallSource {
    /// Download from this URL
    Url(String),
    /// Use an archive already on disk
    Archive(PathBuf),
}

/// Outcome of a successful install
#[derive(Debug, Clone, Serialize)]
pub struct InstalledDocset {
    /// Name the docset was registered under
    pub name: String,
    /// Name the caller asked for
    pub requested: String,
    pub docset_dir: PathBuf,
}

pub struct Installer {
    root: PathBuf,
    timeout: Duration,
    tar_program: String,
}

impl Installer {
    pub fn new(root: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            root: root.into(),
            timeout,
            tar_program: "tar".to_string(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.docsets_path(), config.timeout_duration())
            .with_tar_program(config.install.tar_program.clone())
    }

    pub fn with_tar_program(mut self, program: impl Into<String>) -> Self {
        self.tar_program = program.into();
        self
    }

    /// Install a docset and add it to the registry's common set.
    ///
    /// The registered name comes from the archive's top-level entry and may
    /// differ from `requested`.
    pub fn install<P: DialectProbe>(
        &self,
        registry: &mut Registry<P>,
        source: InstallSource,
        requested: &str,
    ) -> crate::Result<InstalledDocset> {
        // Keeps a downloaded archive alive until extraction is done.
        let download;
        let archive = match &source {
            InstallSource::Url(url) => {
                download = self.download(url)?;
                download.path().to_path_buf()
            }
            InstallSource::Archive(path) => path.clone(),
        };

        let top_level = self.extract(&archive)?;
        let name = docset_name(&top_level);
        if name != requested {
            tracing::info!(requested, installed = %name, "docset installed under a different name");
        }

        let conn = registry.activate_common(&name)?;
        Ok(InstalledDocset {
            name: name.clone(),
            requested: requested.to_string(),
            docset_dir: conn.docset_dir.clone(),
        })
    }

    /// Download `url` into a temporary file
    pub fn download(&self, url: &str) -> crate::Result<NamedTempFile> {
        let client = http_client(self.timeout)?;
        let mut resp = fetch(&client, url)?;

        let mut file = NamedTempFile::new()?;
        resp.copy_to(&mut file).map_err(|e| fetch_error(url, e))?;
        file.flush()?;
        tracing::debug!(url, path = %file.path().display(), "downloaded archive");
        Ok(file)
    }

    /// Unpack `archive` into the docsets root and return its top-level entry
    pub fn extract(&self, archive: &Path) -> crate::Result<String> {
        fs::create_dir_all(&self.root)?;

        let output = Command::new(&self.tar_program)
            .arg("xvf")
            .arg(archive)
            .arg("-C")
            .arg(&self.root)
            .output()
            .map_err(|e| DocsetError::ExtractionFailed {
                archive: archive.to_path_buf(),
                kind: ExtractionFailure::Other(format!("failed to run {}: {}", self.tar_program, e)),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        if !output.status.success() {
            return Err(DocsetError::ExtractionFailed {
                archive: archive.to_path_buf(),
                kind: classify_extraction_failure(&stderr),
            });
        }

        // GNU tar lists on stdout, bsdtar lists on stderr.
        top_level_entry(&stdout)
            .or_else(|| top_level_entry(&stderr))
            .ok_or_else(|| DocsetError::AmbiguousExtractionResult(archive.to_path_buf()))
    }
}

/// Top-level directory named by the first entry of a `tar v` listing
pub fn top_level_entry(listing: &str) -> Option<String> {
    listing
        .lines()
        .map(|line| line.trim())
        .map(|line| line.strip_prefix("x ").unwrap_or(line))
        .map(|line| line.trim_start_matches("./"))
        .find(|line| !line.is_empty())
        .and_then(|line| line.split('/').next())
        .filter(|first| !first.is_empty())
        .map(|first| first.to_string())
}

/// Registry name for an extracted top-level entry: `Redis.docset` -> `Redis`
pub fn docset_name(top_level: &str) -> String {
    top_level
        .strip_suffix(&format!(".{}", DOCSET_EXTENSION))
        .unwrap_or(top_level)
        .to_string()
}

fn classify_extraction_failure(stderr: &str) -> ExtractionFailure {
    let lower = stderr.to_lowercase();
    if lower.contains("name too long") || lower.contains("path too long") {
        ExtractionFailure::PathTooLong
    } else {
        ExtractionFailure::Other(stderr.trim().to_string())
    }
}
