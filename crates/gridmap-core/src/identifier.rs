//! Dataset identifier assembly.
//!
//! The identifier template is the project's `dataset_id` option, an ordered
//! mix of literals and `%(facet)s` placeholders rendered as a dot-joined
//! string, e.g. `projx.%(institute)s.%(model)s.%(experiment)s.%(ensemble)s`.
//!
//! Version suffix policy: `DatasetId::with_version` appends
//! `#<version-without-leading-v>`; [`trim_version`] strips a trailing
//! `#version` for display. Both forms derive from one canonical facet set
//! without re-resolving.

use crate::errors::{ConfigError, ConfigResult, ResolveError, ResolveResult};
use crate::facets::FacetSet;
use crate::template::{parse_tokens, Token};

/// A compiled `dataset_id` template.
#[derive(Debug, Clone)]
pub struct IdentifierTemplate {
    raw: String,
    tokens: Vec<Token>,
}

impl IdentifierTemplate {
    pub fn compile(template: &str) -> ConfigResult<Self> {
        let tokens = parse_tokens(template)?;
        if !tokens.iter().any(|t| matches!(t, Token::Placeholder(_))) {
            return Err(ConfigError::MalformedTemplate {
                template: template.to_string(),
                reason: "dataset_id declares no facets".to_string(),
            });
        }
        Ok(Self {
            raw: template.to_string(),
            tokens,
        })
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Ordered facet names required to build an identifier.
    pub fn facet_names(&self) -> Vec<&str> {
        self.tokens
            .iter()
            .filter_map(|t| match t {
                Token::Placeholder(name) => Some(name.as_str()),
                Token::Literal(_) => None,
            })
            .collect()
    }

    /// Assemble the identifier from a validated facet set.
    ///
    /// Fails with `IncompleteIdentifier` when a required facet is absent or
    /// empty; reaching that error indicates a resolver bug, since the
    /// resolver contract guarantees completeness.
    pub fn build(&self, facets: &FacetSet) -> ResolveResult<DatasetId> {
        let mut id = String::new();
        let mut missing = Vec::new();
        for token in &self.tokens {
            match token {
                Token::Literal(text) => id.push_str(text),
                Token::Placeholder(name) => match facets.get(name) {
                    Some(value) if !value.is_empty() => id.push_str(value),
                    _ => missing.push(name.clone()),
                },
            }
        }
        if !missing.is_empty() {
            return Err(ResolveError::IncompleteIdentifier(missing));
        }
        Ok(DatasetId { id })
    }
}

/// A canonical dot-separated dataset identifier, without version suffix.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct DatasetId {
    id: String,
}

impl DatasetId {
    pub fn as_str(&self) -> &str {
        &self.id
    }

    /// The identifier with the `#<version>` suffix appended; the leading
    /// `v` of a version directory name is stripped.
    pub fn with_version(&self, version: &str) -> String {
        let bare = version.strip_prefix('v').unwrap_or(version);
        format!("{}#{}", self.id, bare)
    }
}

impl std::fmt::Display for DatasetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.id)
    }
}

/// Strip a trailing `#version` suffix (and everything after `#`).
pub fn trim_version(identifier: &str) -> &str {
    match identifier.split_once('#') {
        Some((id, _)) => id,
        None => identifier,
    }
}
