//! gridmap-core
//!
//! Core primitives for preparing climate-data archives for publication on a
//! federated data grid:
//! - Directory-format template compilation (DRS path grammar -> typed matchers)
//! - Controlled-vocabulary store (option lists and mapping tables)
//! - Facet resolution (path -> complete, validated facet set)
//! - Dataset identifier assembly (`project.facet1.facet2...#version`)
//! - Version-aware directory tree walking
//! - Vocabulary auditing (observed vs. declared facet values)
//! - Checksum and mapfile-record utilities
//!
//! Design goals:
//! - **Deterministic resolution:** resolving the same path against the same
//!   vocabulary always yields the same facet set and identifier.
//! - **Immutable after load:** templates and vocabularies are compiled once
//!   from configuration and are safe for concurrent read access.
//! - **Explicit failures:** configuration faults are fatal at load; per-file
//!   faults are typed `ResolveError`s the caller can skip-and-log.
//!
//! The crate performs filesystem reads (tree walking, symlink resolution,
//! checksums) but never writes. Mapfile writing, worker pools, and the CLI
//! surface live in higher layers.

pub mod audit;
pub mod checksum;
pub mod config;
pub mod errors;
pub mod facets;
pub mod identifier;
pub mod mapfile;
pub mod resolver;
pub mod template;
pub mod vocab;
pub mod walker;

pub use crate::errors::{ConfigError, ConfigResult, ResolveError, ResolveResult};

/// Default data-file extension accepted by the compiled pattern and walker.
pub const DEFAULT_EXTENSION: &str = ".nc";

/// Facets that are exempt from option-list checking during resolution.
///
/// `project` is forced from configuration, `version` is normalized through
/// the version selector, and `variable`/`filename` vary per file rather than
/// per dataset.
pub const EXEMPT_FACETS: &[&str] = &["project", "filename", "variable", "version"];

/// Convenience re-exports.
pub mod prelude {
    pub use crate::audit::{audit_tree, AuditReport, FacetAudit};
    pub use crate::checksum::{checksum_file, ChecksumAlgorithm, ChecksumSpec};
    pub use crate::config::{Config, ProjectSection};
    pub use crate::facets::FacetSet;
    pub use crate::identifier::{DatasetId, IdentifierTemplate};
    pub use crate::mapfile::{render_mapfile_name, MapfileRecord};
    pub use crate::resolver::FacetResolver;
    pub use crate::template::DirectoryFormat;
    pub use crate::vocab::{FacetRule, MappingTable, VocabularyStore};
    pub use crate::walker::{DrsWalker, VersionSelection, WalkedFile};
    pub use crate::{ConfigError, ConfigResult, ResolveError, ResolveResult};
}
