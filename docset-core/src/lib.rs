//! Docset Core - keyword search over offline documentation docsets
//!
//! This library detects docset index schemas, composes dialect-aware queries,
//! caches resolved docsets in an explicit registry and fans searches out
//! across the active docsets.

pub mod config;
pub mod engine;
pub mod error;
pub mod feeds;
pub mod format;
pub mod install;
pub mod narrow;
pub mod query;
pub mod registry;
pub mod schema;
pub mod search;
pub mod url;

pub use config::{Config, EngineKind};
pub use engine::{parse_table, ProcessEngine, QueryEngine, Row, SqliteEngine};
pub use error::{DocsetError, ErrorEnvelope, ExtractionFailure};
pub use feeds::{ContribDocset, FeedClient};
pub use format::{format, Candidate};
pub use install::{InstallSource, InstalledDocset, Installer};
pub use narrow::{narrow, Narrowed};
pub use query::{compose, RESULT_LIMIT};
pub use registry::{installed_docsets, resolve_docset_dir, Connection, Registry};
pub use schema::{detect, Dialect, DialectProbe, SqliteProbe};
pub use search::{engine_from_config, SearchOptions, Searcher};
pub use url::result_url;

/// Result type alias for docset operations
pub type Result<T> = std::result::Result<T, DocsetError>;
