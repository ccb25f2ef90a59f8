//! The `map` subcommand: scan DRS trees and write publication mapfiles.
//!
//! A fixed-size worker pool consumes the lazy walker sequence; each worker
//! resolves one file to completion (facets -> identifier -> stat/checksum ->
//! mapfile line). Per-file failures become tagged skip outcomes aggregated
//! by this driver; only configuration errors abort the run.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, UNIX_EPOCH};

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::iter::{ParallelBridge, ParallelIterator};
use serde::Serialize;
use time::OffsetDateTime;
use tracing::warn;

use gridmap_core::prelude::*;

use crate::output::Reporter;
use crate::writer::MapfileWriter;

const LOCK_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct MapRequest {
    pub project: String,
    pub directories: Vec<PathBuf>,
    pub mapfile: String,
    pub outdir: PathBuf,
    pub latest_symlink: bool,
    pub select_version: Option<String>,
    pub all_versions: bool,
    pub no_version: bool,
    pub no_checksum: bool,
    pub tech_notes_url: Option<String>,
    pub tech_notes_title: Option<String>,
    pub max_workers: usize,
}

impl MapRequest {
    fn selection(&self) -> VersionSelection {
        if self.latest_symlink {
            VersionSelection::LatestSymlink
        } else if let Some(version) = &self.select_version {
            VersionSelection::Explicit(version.clone())
        } else if self.all_versions {
            VersionSelection::AllVersions
        } else {
            VersionSelection::LatestOnDisk
        }
    }
}

/// Per-file processing outcome, returned across the pool boundary instead
/// of an exception.
enum FileOutcome {
    Mapped { mapfile: PathBuf },
    Skipped,
}

#[derive(Debug, Serialize)]
struct MapSummary {
    project: String,
    scanned: usize,
    mapped: usize,
    skipped: usize,
    mapfiles: BTreeSet<String>,
    exit_code: u8,
}

pub fn run(reporter: &Reporter, config_path: &std::path::Path, req: MapRequest) -> Result<u8> {
    let config = Config::from_file(config_path)?;
    let section = config.project(&req.project)?;
    let pattern = DirectoryFormat::compile(section.directory_format()?)?;
    let identifier = IdentifierTemplate::compile(section.dataset_id()?)?;

    let mut facet_names: Vec<&str> = pattern.facet_names();
    for facet in identifier.facet_names() {
        if !facet_names.contains(&facet) {
            facet_names.push(facet);
        }
    }
    let vocab = VocabularyStore::from_project(section, &facet_names)?;

    let selection = req.selection();
    let resolver = FacetResolver::new(&req.project, &pattern, &identifier, &vocab)
        .with_latest_symlink(selection == VersionSelection::LatestSymlink);
    let checksum = if req.no_checksum {
        None
    } else {
        config.checksum()?
    };

    let writer = MapfileWriter::new(&req.outdir, LOCK_TIMEOUT);
    let now = OffsetDateTime::now_utc();
    let pid = std::process::id();

    let progress = ProgressBar::new_spinner();
    progress.set_style(
        ProgressStyle::with_template("{spinner} {pos} file(s) processed")
            .expect("static template"),
    );
    let mapped = AtomicUsize::new(0);
    let skipped = AtomicUsize::new(0);

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(req.max_workers)
        .build()
        .context("failed to build worker pool")?;

    let walker = DrsWalker::new(&req.directories, selection);
    let outcomes: Vec<FileOutcome> = pool.install(|| {
        walker
            .par_bridge()
            .map(|file| {
                let outcome = process_file(
                    &file, &resolver, &identifier, checksum.as_ref(), &writer, &req, now, pid,
                );
                match &outcome {
                    FileOutcome::Mapped { .. } => mapped.fetch_add(1, Ordering::Relaxed),
                    FileOutcome::Skipped => skipped.fetch_add(1, Ordering::Relaxed),
                };
                progress.inc(1);
                outcome
            })
            .collect()
    });
    progress.finish_and_clear();

    let mapped = mapped.load(Ordering::Relaxed);
    let skipped = skipped.load(Ordering::Relaxed);
    let mapfiles: BTreeSet<String> = outcomes
        .iter()
        .filter_map(|o| match o {
            FileOutcome::Mapped { mapfile } => Some(mapfile.display().to_string()),
            FileOutcome::Skipped => None,
        })
        .collect();

    // 0: all mapped; 1: nothing mapped (or nothing found); 2: partial.
    let exit_code = if mapped == 0 {
        1
    } else if skipped > 0 {
        2
    } else {
        0
    };

    let summary = MapSummary {
        project: req.project.clone(),
        scanned: outcomes.len(),
        mapped,
        skipped,
        mapfiles,
        exit_code,
    };
    let text = format!(
        "project {}: {} file(s) scanned, {} mapped, {} skipped, {} mapfile(s) written",
        summary.project,
        summary.scanned,
        summary.mapped,
        summary.skipped,
        summary.mapfiles.len()
    );
    reporter.print(&summary, &text)?;
    Ok(exit_code)
}

#[allow(clippy::too_many_arguments)]
fn process_file(
    file: &WalkedFile,
    resolver: &FacetResolver<'_>,
    identifier: &IdentifierTemplate,
    checksum: Option<&ChecksumSpec>,
    writer: &MapfileWriter,
    req: &MapRequest,
    now: OffsetDateTime,
    pid: u32,
) -> FileOutcome {
    match try_process(file, resolver, identifier, checksum, writer, req, now, pid) {
        Ok(mapfile) => FileOutcome::Mapped { mapfile },
        Err(e) => {
            warn!(path = %file.path.display(), error = %e, "skipping file");
            FileOutcome::Skipped
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn try_process(
    file: &WalkedFile,
    resolver: &FacetResolver<'_>,
    identifier: &IdentifierTemplate,
    checksum: Option<&ChecksumSpec>,
    writer: &MapfileWriter,
    req: &MapRequest,
    now: OffsetDateTime,
    pid: u32,
) -> Result<PathBuf> {
    let facets = resolver.resolve(&file.path)?;
    let dataset_id = identifier.build(&facets)?;
    let version = facets
        .version()
        .map(str::to_string)
        .or_else(|| file.version.clone());

    let metadata = std::fs::metadata(&file.path)
        .with_context(|| format!("cannot stat {}", file.path.display()))?;
    let mtime = metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs())
        .unwrap_or(0);

    let digest = match checksum {
        Some(spec) => {
            let digest = checksum_file(&file.path, spec.algorithm())
                .with_context(|| format!("checksum failed for {}", file.path.display()))?;
            Some((digest, spec.label().to_string()))
        }
        None => None,
    };

    let record = MapfileRecord {
        dataset_id: dataset_id.as_str().to_string(),
        version: if req.no_version { None } else { version.clone() },
        path: file.path.clone(),
        size: metadata.len(),
        mtime,
        checksum: digest,
        tech_notes: req.tech_notes_url.clone(),
        tech_notes_title: req.tech_notes_title.clone(),
    };

    let name = render_mapfile_name(
        &req.mapfile,
        dataset_id.as_str(),
        version.as_deref(),
        now,
        pid,
    );
    let path = writer.append(&name, &record.format_line())?;
    Ok(path)
}
