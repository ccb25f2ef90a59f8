//! Error types for gridmap-core.
//!
//! Two taxonomies with different propagation policies:
//! - [`ConfigError`]: configuration-time faults. Fatal at startup, never
//!   retried.
//! - [`ResolveError`]: per-file faults. Callers catch these at the
//!   single-file boundary and convert them into a skip-and-log outcome.

use std::path::PathBuf;

use thiserror::Error;

/// Configuration-time errors. Fatal at startup.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read configuration file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("missing configuration section [{0}]")]
    MissingSection(String),

    #[error("missing option '{option}' in section [{section}]")]
    MissingOption { section: String, option: String },

    #[error("malformed template '{template}': {reason}")]
    MalformedTemplate { template: String, reason: String },

    #[error("malformed mapping table for facet '{facet}': {reason}")]
    MalformedMap { facet: String, reason: String },

    #[error("duplicate mapping-table key [{key}] for facet '{facet}'")]
    DuplicateMapKey { facet: String, key: String },

    #[error("circular mapping-table dependency involving facet '{facet}'")]
    MapCycle { facet: String },

    #[error("unsupported checksum declaration '{0}' (only SHA256 clients are supported)")]
    UnsupportedChecksum(String),
}

/// Per-file resolution errors. Recorded per file; the run continues.
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("path {path} does not match the directory format of project '{project}'")]
    PathMatch { project: String, path: PathBuf },

    #[error("value '{value}' of facet '{facet}' is not declared in section [project:{project}]")]
    UndeclaredFacetValue {
        project: String,
        facet: String,
        value: String,
    },

    #[error("no option list or mapping table declared for facet '{facet}' in section [project:{project}]")]
    MissingVocabularyDeclaration { project: String, facet: String },

    #[error("mapping table for facet '{facet}' in section [project:{project}] has no entry for key [{key}]")]
    MapLookup {
        project: String,
        facet: String,
        key: String,
    },

    #[error("value '{0}' does not match the ensemble grammar r<i>i<i>p<i>")]
    InvalidEnsemble(String),

    #[error("cannot resolve 'latest' version for {path}: {reason}")]
    VersionResolution { path: PathBuf, reason: String },

    #[error("incomplete dataset identifier: missing facet(s) {0:?}")]
    IncompleteIdentifier(Vec<String>),
}

/// Result alias for configuration-time operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result alias for per-file resolution operations.
pub type ResolveResult<T> = std::result::Result<T, ResolveError>;
