//! Version-aware DRS tree walking.
//!
//! [`DrsWalker`] lazily enumerates candidate data files under one or more
//! scan roots according to a [`VersionSelection`] policy:
//!
//! - `LatestSymlink`: only paths reached through a `latest` symlink segment
//! - `Explicit(v)`: only paths containing the exact version directory `v`
//! - `AllVersions`: every `v<digits>` segment qualifies
//! - `LatestOnDisk` (default): for each dataset, only the lexicographically
//!   greatest sibling `v<digits>` directory qualifies
//!
//! A scan root that itself embeds a version segment silently overrides the
//! requested policy for that root. Directories that cannot be listed are
//! logged at WARN and skipped; the walk itself never fails.
//!
//! The sequence is consumed exactly once per run. Ordering within one root
//! is deterministic (walkdir sorted by file name); no ordering is promised
//! across roots beyond their argument order.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::warn;
use walkdir::WalkDir;

use crate::DEFAULT_EXTENSION;

/// Version-selection policy for one run. Policies are mutually exclusive.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum VersionSelection {
    /// Only descend through `latest` symlink segments.
    LatestSymlink,
    /// Only a specific version directory name (e.g. `v20200101`).
    Explicit(String),
    /// Every version directory qualifies.
    AllVersions,
    /// The greatest on-disk sibling version directory per dataset.
    #[default]
    LatestOnDisk,
}

/// One candidate data file yielded by the walker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkedFile {
    pub path: PathBuf,
    /// The version directory name the file was selected under. `None` in
    /// latest-symlink mode, where the resolver follows the symlink itself.
    pub version: Option<String>,
}

/// Lazy, non-restartable iterator over qualifying files.
pub struct DrsWalker {
    roots: std::vec::IntoIter<(PathBuf, VersionSelection)>,
    current: Option<(walkdir::IntoIter, VersionSelection)>,
    extension: String,
    latest_cache: HashMap<PathBuf, Option<String>>,
}

impl DrsWalker {
    pub fn new(roots: &[PathBuf], selection: VersionSelection) -> Self {
        Self::with_extension(roots, selection, DEFAULT_EXTENSION)
    }

    pub fn with_extension(
        roots: &[PathBuf],
        selection: VersionSelection,
        extension: &str,
    ) -> Self {
        let roots: Vec<(PathBuf, VersionSelection)> = roots
            .iter()
            .map(|root| {
                let effective = embedded_selection(root).unwrap_or_else(|| selection.clone());
                (root.clone(), effective)
            })
            .collect();
        Self {
            roots: roots.into_iter(),
            current: None,
            extension: extension.to_string(),
            latest_cache: HashMap::new(),
        }
    }

    /// Decide whether a file qualifies under the selection policy, and under
    /// which version directory.
    fn qualify(&mut self, path: &Path, selection: &VersionSelection) -> Option<Option<String>> {
        let version_dir = path
            .ancestors()
            .skip(1)
            .find(|a| a.file_name().and_then(|n| n.to_str()).is_some_and(is_version_name));
        let has_latest = path
            .ancestors()
            .skip(1)
            .any(|a| a.file_name().is_some_and(|n| n == "latest"));

        match selection {
            VersionSelection::LatestSymlink => has_latest.then_some(None),
            VersionSelection::Explicit(wanted) => path
                .ancestors()
                .skip(1)
                .any(|a| a.file_name().is_some_and(|n| n == wanted.as_str()))
                .then(|| Some(wanted.clone())),
            VersionSelection::AllVersions => {
                let dir = version_dir?;
                Some(Some(dir.file_name()?.to_str()?.to_string()))
            }
            VersionSelection::LatestOnDisk => {
                let dir = version_dir?;
                let name = dir.file_name()?.to_str()?.to_string();
                let parent = dir.parent()?.to_path_buf();
                let latest = self.latest_on_disk(&parent)?;
                (latest == name).then_some(Some(name))
            }
        }
    }

    /// The lexicographically greatest `v<digits>` directory among the
    /// children of `parent`. Cached per parent for the lifetime of the walk.
    fn latest_on_disk(&mut self, parent: &Path) -> Option<String> {
        if let Some(cached) = self.latest_cache.get(parent) {
            return cached.clone();
        }
        let latest = match std::fs::read_dir(parent) {
            Ok(entries) => entries
                .filter_map(|e| e.ok())
                .filter(|e| e.path().is_dir())
                .filter_map(|e| e.file_name().to_str().map(str::to_string))
                .filter(|name| is_version_name(name))
                .max(),
            Err(e) => {
                warn!(path = %parent.display(), error = %e, "cannot list version directories");
                None
            }
        };
        self.latest_cache.insert(parent.to_path_buf(), latest.clone());
        latest
    }
}

impl Iterator for DrsWalker {
    type Item = WalkedFile;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (iter, selection) = match &mut self.current {
                Some(current) => current,
                None => {
                    let (root, selection) = self.roots.next()?;
                    let iter = WalkDir::new(&root)
                        .follow_links(true)
                        .sort_by_file_name()
                        .into_iter();
                    self.current = Some((iter, selection));
                    continue;
                }
            };

            let entry = match iter.next() {
                Some(Ok(entry)) => entry,
                Some(Err(e)) => {
                    warn!(error = %e, "skipping unreadable directory entry");
                    continue;
                }
                None => {
                    self.current = None;
                    continue;
                }
            };

            if !entry.file_type().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy();
            if !name.ends_with(&self.extension) {
                continue;
            }

            let selection = selection.clone();
            let path = entry.into_path();
            if let Some(version) = self.qualify(&path, &selection) {
                return Some(WalkedFile { path, version });
            }
        }
    }
}

/// `v` followed by one or more digits.
pub fn is_version_name(name: &str) -> bool {
    name.len() > 1
        && name.starts_with('v')
        && name[1..].chars().all(|c| c.is_ascii_digit())
}

/// The version policy a scan root itself embeds, if any: an explicit
/// `v<digits>` component pins that version, a `latest` component selects
/// symlink mode.
fn embedded_selection(root: &Path) -> Option<VersionSelection> {
    for ancestor in root.ancestors() {
        if let Some(name) = ancestor.file_name().and_then(|n| n.to_str()) {
            if is_version_name(name) {
                return Some(VersionSelection::Explicit(name.to_string()));
            }
            if name == "latest" {
                return Some(VersionSelection::LatestSymlink);
            }
        }
    }
    None
}
