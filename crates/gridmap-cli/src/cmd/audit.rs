//! The `audit` subcommand: compare on-disk facet values against the
//! declared vocabulary and fail (exit 1) when undeclared values are used.

use std::fmt::Write as _;
use std::path::PathBuf;

use anyhow::Result;

use gridmap_core::prelude::*;

use crate::output::Reporter;

pub fn run(
    reporter: &Reporter,
    config_path: &std::path::Path,
    project: &str,
    directories: &[PathBuf],
) -> Result<u8> {
    let config = Config::from_file(config_path)?;
    let section = config.project(project)?;
    let pattern = DirectoryFormat::compile(section.directory_format()?)?;
    let identifier = IdentifierTemplate::compile(section.dataset_id()?)?;

    let mut facet_names: Vec<&str> = pattern.facet_names();
    for facet in identifier.facet_names() {
        if !facet_names.contains(&facet) {
            facet_names.push(facet);
        }
    }
    let vocab = VocabularyStore::from_project(section, &facet_names)?;

    let report = audit_tree(directories, &pattern, &vocab);
    reporter.print(&report, &render(&report))?;

    Ok(u8::from(report.has_undeclared))
}

fn render(report: &AuditReport) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "project {}: {} dataset(s) scanned, {} skipped",
        report.project, report.scanned, report.skipped
    );
    for facet in &report.facets {
        match &facet.declared {
            Some(_) => {
                let _ = writeln!(
                    out,
                    "  {}: {} observed, {} undeclared, {} unused",
                    facet.facet,
                    facet.observed.len(),
                    facet.undeclared.len(),
                    facet.unused.len()
                );
                for value in &facet.undeclared {
                    let _ = writeln!(out, "    undeclared value: {value}");
                }
                for value in &facet.unused {
                    let _ = writeln!(out, "    unused value: {value}");
                }
            }
            None => {
                let _ = writeln!(
                    out,
                    "  {}: {} observed (no declaration)",
                    facet.facet,
                    facet.observed.len()
                );
            }
        }
    }
    let verdict = if report.has_undeclared {
        "undeclared facet values found"
    } else {
        "vocabulary is consistent"
    };
    let _ = write!(out, "{verdict}");
    out
}
