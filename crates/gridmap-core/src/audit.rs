//! Vocabulary auditing: observed facet values vs. declared vocabulary.
//!
//! The auditor walks the dataset part of the tree only (it stops at the
//! member/ensemble level instead of descending into version, variable, or
//! file names), collects the facet values actually used on disk, and
//! compares them per facet against the vocabulary store.
//!
//! A directory that does not line up with the dataset segments of the
//! template is skipped with a warning. The aggregate answers one question:
//! were any undeclared values used? Facets without any declaration are
//! reported but never raise the flag.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use serde::Serialize;
use tracing::warn;

use crate::template::DirectoryFormat;
use crate::vocab::VocabularyStore;

/// Per-facet audit outcome.
#[derive(Debug, Clone, Serialize)]
pub struct FacetAudit {
    pub facet: String,
    /// Values observed in the directory tree.
    pub observed: BTreeSet<String>,
    /// Values declared in configuration; `None` when the facet carries no
    /// declaration (unconstrained).
    pub declared: Option<BTreeSet<String>>,
    /// Observed but not declared.
    pub undeclared: BTreeSet<String>,
    /// Declared but never observed.
    pub unused: BTreeSet<String>,
}

/// Aggregate audit result across all facets of one project.
#[derive(Debug, Clone, Serialize)]
pub struct AuditReport {
    pub project: String,
    /// Dataset directories that matched the template.
    pub scanned: usize,
    /// Directories skipped because their facet count did not line up.
    pub skipped: usize,
    pub facets: Vec<FacetAudit>,
    /// True when any declared facet was observed with an undeclared value.
    pub has_undeclared: bool,
}

/// Walk `roots` and audit observed facet values against the vocabulary.
pub fn audit_tree(
    roots: &[PathBuf],
    pattern: &DirectoryFormat,
    vocab: &VocabularyStore,
) -> AuditReport {
    let mut observed: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
    let mut scanned = 0usize;
    let mut skipped = 0usize;

    // Dataset directories sit at exactly this depth below a scan root; the
    // scan root stands in for the template's %(root)s prefix.
    let dataset_depth = pattern.dataset_segments().len();

    for root in roots {
        let mut walk = walkdir::WalkDir::new(root)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter();
        loop {
            let entry = match walk.next() {
                Some(Ok(entry)) => entry,
                Some(Err(e)) => {
                    warn!(error = %e, "skipping unreadable directory entry");
                    continue;
                }
                None => break,
            };
            if !entry.file_type().is_dir() || entry.depth() != dataset_depth {
                continue;
            }
            match pattern.extract_dataset_dir(entry.path()) {
                Some(facets) => {
                    for (facet, value) in facets {
                        observed.entry(facet).or_default().insert(value);
                    }
                    scanned += 1;
                }
                None => {
                    warn!(
                        path = %entry.path().display(),
                        "directory does not match the dataset part of the directory format, skipping"
                    );
                    skipped += 1;
                }
            }
            // Never descend below the dataset level.
            walk.skip_current_dir();
        }
    }

    let mut facets = Vec::new();
    let mut has_undeclared = false;
    let audited: BTreeSet<String> = pattern
        .dataset_segments()
        .iter()
        .filter_map(|s| match s {
            crate::template::SegmentMatcher::Facet(name) => Some(name.clone()),
            _ => None,
        })
        .collect();

    for facet in audited {
        let seen = observed.remove(&facet).unwrap_or_default();
        let declared = vocab.declared_values(&facet);
        let (undeclared, unused) = match &declared {
            Some(declared) => (
                seen.difference(declared).cloned().collect::<BTreeSet<_>>(),
                declared.difference(&seen).cloned().collect::<BTreeSet<_>>(),
            ),
            None => (BTreeSet::new(), BTreeSet::new()),
        };
        if !undeclared.is_empty() {
            has_undeclared = true;
        }
        facets.push(FacetAudit {
            facet,
            observed: seen,
            declared,
            undeclared,
            unused,
        });
    }

    AuditReport {
        project: vocab.project().to_string(),
        scanned,
        skipped,
        facets,
        has_undeclared,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProjectSection;

    const DIR_FORMAT: &str = "%(root)s/%(institute)s/%(experiment)s/%(ensemble)s/%(version)s";

    fn vocab(experiments: &str) -> VocabularyStore {
        let section = ProjectSection::for_tests(
            "projx",
            &[
                ("institute_options", "NASA"),
                ("experiment_options", experiments),
            ],
        );
        VocabularyStore::from_project(
            &section,
            &["institute", "experiment", "ensemble", "version"],
        )
        .unwrap()
    }

    fn build_tree(root: &std::path::Path, experiments: &[&str]) {
        for exp in experiments {
            let dir = root.join("NASA").join(exp).join("r1i1p1/v1");
            std::fs::create_dir_all(dir).unwrap();
        }
    }

    #[test]
    fn undeclared_values_are_reported() {
        let tmp = tempfile::tempdir().unwrap();
        build_tree(tmp.path(), &["A", "B", "C"]);
        let pattern = DirectoryFormat::compile(DIR_FORMAT).unwrap();
        let store = vocab("A, B");
        let report = audit_tree(&[tmp.path().to_path_buf()], &pattern, &store);

        assert!(report.has_undeclared);
        let exp = report
            .facets
            .iter()
            .find(|f| f.facet == "experiment")
            .unwrap();
        assert!(exp.undeclared.contains("C"));
        assert!(exp.unused.is_empty());
        assert_eq!(report.scanned, 3);
    }

    #[test]
    fn unused_declared_values_are_reported() {
        let tmp = tempfile::tempdir().unwrap();
        build_tree(tmp.path(), &["A"]);
        let pattern = DirectoryFormat::compile(DIR_FORMAT).unwrap();
        let store = vocab("A, B");
        let report = audit_tree(&[tmp.path().to_path_buf()], &pattern, &store);

        assert!(!report.has_undeclared);
        let exp = report
            .facets
            .iter()
            .find(|f| f.facet == "experiment")
            .unwrap();
        assert!(exp.unused.contains("B"));
    }

    #[test]
    fn unconstrained_facets_never_raise_the_flag() {
        let tmp = tempfile::tempdir().unwrap();
        build_tree(tmp.path(), &["A"]);
        let pattern = DirectoryFormat::compile(DIR_FORMAT).unwrap();
        let store = vocab("A");
        let report = audit_tree(&[tmp.path().to_path_buf()], &pattern, &store);

        let ens = report
            .facets
            .iter()
            .find(|f| f.facet == "ensemble")
            .unwrap();
        assert!(ens.declared.is_none());
        assert!(ens.observed.contains("r1i1p1"));
        assert!(!report.has_undeclared);
    }
}
