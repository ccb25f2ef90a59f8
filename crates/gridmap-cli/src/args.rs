use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug, Clone)]
#[command(name = "gridmap", version, about = "Prepare DRS archives for data-grid publication")]
pub struct Cli {
    /// Emit JSON output on stdout.
    #[arg(long, global = true)]
    pub json: bool,

    /// Configuration file with [project:<id>] sections.
    #[arg(short = 'i', long, global = true, default_value = "gridmap.ini")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Scan DRS trees and write publication mapfiles.
    Map {
        /// Project section id (looked up as [project:<id>]).
        #[arg(long)]
        project: String,

        /// Directories to scan.
        #[arg(required = true)]
        directories: Vec<PathBuf>,

        /// Mapfile name template; tokens: {dataset_id} {version} {date} {pid}.
        /// Without {dataset_id} all datasets share one mapfile.
        #[arg(long, default_value = gridmap_core::mapfile::DEFAULT_MAPFILE_TEMPLATE)]
        mapfile: String,

        /// Output directory for mapfiles.
        #[arg(long, default_value = ".")]
        outdir: PathBuf,

        /// Only consider paths reached through a `latest` symlink.
        #[arg(long, conflicts_with_all = ["select_version", "all_versions"])]
        latest_symlink: bool,

        /// Only consider a specific version directory (e.g. v20200101).
        #[arg(long = "version", value_name = "VERSION", conflicts_with = "all_versions")]
        select_version: Option<String>,

        /// Consider every on-disk version.
        #[arg(long)]
        all_versions: bool,

        /// Omit the #version suffix from dataset identifiers.
        #[arg(long)]
        no_version: bool,

        /// Skip checksum computation even when configured.
        #[arg(long)]
        no_checksum: bool,

        /// Technical-notes URL recorded on every line.
        #[arg(long, value_name = "URL")]
        tech_notes_url: Option<String>,

        /// Title for the technical-notes URL.
        #[arg(long, value_name = "TITLE", requires = "tech_notes_url")]
        tech_notes_title: Option<String>,

        /// Worker pool size.
        #[arg(long, default_value_t = 4)]
        max_workers: usize,
    },

    /// Compare facet values used on disk against the declared vocabulary.
    Audit {
        /// Project section id (looked up as [project:<id>]).
        #[arg(long)]
        project: String,

        /// Directories to scan (dataset part only).
        #[arg(required = true)]
        directories: Vec<PathBuf>,
    },
}
