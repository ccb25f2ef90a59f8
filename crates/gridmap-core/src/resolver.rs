//! Facet resolution: one absolute file path -> a complete, validated
//! [`FacetSet`].
//!
//! Resolution stages, in order:
//! 1. apply the compiled directory format to the path (no match is a
//!    per-file `PathMatch` failure, not fatal to the run)
//! 2. force `project` to the lower-cased configured project id
//! 3. normalize `version` through the `latest` symlink when requested (or
//!    when the path embeds a literal `latest` component)
//! 4. validate every extracted facet against the vocabulary
//! 5. derive the facets required by the identifier template that the path
//!    did not provide, via mapping tables
//!
//! Present facets are validated before missing facets are derived, because
//! mapping tables depend on facets resolved earlier. Cycles between mapping
//! tables were already rejected when the vocabulary store was built, so the
//! recursive derivation below terminates in a single pass.

use std::path::Path;

use crate::errors::{ResolveError, ResolveResult};
use crate::facets::{is_valid_ensemble, FacetSet};
use crate::identifier::IdentifierTemplate;
use crate::template::DirectoryFormat;
use crate::vocab::{FacetRule, VocabularyStore};
use crate::EXEMPT_FACETS;

/// Resolves file paths to validated facet sets. Read-only after
/// construction; safe to share across workers.
#[derive(Debug)]
pub struct FacetResolver<'a> {
    project: String,
    pattern: &'a DirectoryFormat,
    identifier: &'a IdentifierTemplate,
    vocab: &'a VocabularyStore,
    latest_symlink: bool,
}

impl<'a> FacetResolver<'a> {
    pub fn new(
        project: &str,
        pattern: &'a DirectoryFormat,
        identifier: &'a IdentifierTemplate,
        vocab: &'a VocabularyStore,
    ) -> Self {
        Self {
            project: project.to_lowercase(),
            pattern,
            identifier,
            vocab,
            latest_symlink: false,
        }
    }

    /// Resolve the `version` facet through the `latest` symlink instead of
    /// trusting a path-embedded `latest` literal.
    pub fn with_latest_symlink(mut self, enabled: bool) -> Self {
        self.latest_symlink = enabled;
        self
    }

    /// The lower-cased project id forced into every facet set.
    pub fn project(&self) -> &str {
        &self.project
    }

    /// Turn one absolute file path into a complete, validated facet set.
    pub fn resolve(&self, path: &Path) -> ResolveResult<FacetSet> {
        let extraction = self.pattern.extract(&self.project, path)?;

        let mut facets = FacetSet::new();
        for (name, value) in &extraction.facets {
            facets.insert(name.clone(), value.clone());
        }
        facets.insert("project", self.project.clone());

        if self.latest_symlink || facets.version() == Some("latest") {
            let version = resolve_latest_version(path)?;
            facets.insert("version", version);
        }

        self.validate_present(&facets)?;

        for facet in self.identifier.facet_names() {
            self.ensure(facet, &mut facets)?;
        }

        Ok(facets)
    }

    /// Validate every path-extracted facet against the vocabulary.
    fn validate_present(&self, facets: &FacetSet) -> ResolveResult<()> {
        for (facet, value) in facets.iter() {
            if EXEMPT_FACETS.contains(&facet) {
                continue;
            }
            match self.vocab.rule(facet) {
                FacetRule::Options(_) => {
                    if self.vocab.is_legal(facet, value) != Some(true) {
                        return Err(ResolveError::UndeclaredFacetValue {
                            project: self.project.clone(),
                            facet: facet.to_string(),
                            value: value.to_string(),
                        });
                    }
                }
                // A mapping table declares the facet; the extracted value
                // stands and feeds later derivations.
                FacetRule::Map(_) => {}
                FacetRule::Undeclared => {
                    if facet == "ensemble" {
                        if !is_valid_ensemble(value) {
                            return Err(ResolveError::InvalidEnsemble(value.to_string()));
                        }
                    } else {
                        return Err(ResolveError::MissingVocabularyDeclaration {
                            project: self.project.clone(),
                            facet: facet.to_string(),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// Make sure a required facet is present, deriving it (and its
    /// mapping-table dependencies) when missing.
    fn ensure(&self, facet: &str, facets: &mut FacetSet) -> ResolveResult<()> {
        if facets.contains(facet) {
            return Ok(());
        }
        match self.vocab.rule(facet) {
            FacetRule::Map(table) => {
                let deps: Vec<String> = table.from_keys().to_vec();
                for dep in &deps {
                    if !facets.contains(dep)
                        && matches!(self.vocab.rule(dep), FacetRule::Map(_))
                    {
                        self.ensure(dep, facets)?;
                    }
                }
                let value = self.vocab.derive(facet, facets)?;
                if facet == "ensemble" && !is_valid_ensemble(&value) {
                    return Err(ResolveError::InvalidEnsemble(value));
                }
                facets.insert(facet, value);
                Ok(())
            }
            _ => Err(ResolveError::MissingVocabularyDeclaration {
                project: self.project.clone(),
                facet: facet.to_string(),
            }),
        }
    }
}

/// Follow the `latest` component of a path to its on-disk target and return
/// the target directory's basename as the true version.
fn resolve_latest_version(path: &Path) -> ResolveResult<String> {
    let link = path
        .ancestors()
        .find(|a| a.file_name().is_some_and(|n| n == "latest"))
        .ok_or_else(|| ResolveError::VersionResolution {
            path: path.to_path_buf(),
            reason: "path has no 'latest' component".to_string(),
        })?;
    let target =
        std::fs::canonicalize(link).map_err(|e| ResolveError::VersionResolution {
            path: link.to_path_buf(),
            reason: e.to_string(),
        })?;
    target
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .ok_or_else(|| ResolveError::VersionResolution {
            path: link.to_path_buf(),
            reason: "symlink target has no basename".to_string(),
        })
}
