//! Subcommand dispatch.
//!
//! Each subcommand returns the process exit code; configuration-time
//! failures bubble up as `anyhow` errors and exit 1 from `main`.

pub mod audit;
pub mod map;

use anyhow::Result;

use crate::args::{Cli, Command};
use crate::output::Reporter;

pub fn dispatch(cli: Cli) -> Result<u8> {
    let reporter = Reporter::new(cli.json);
    match cli.command {
        Command::Map {
            project,
            directories,
            mapfile,
            outdir,
            latest_symlink,
            select_version,
            all_versions,
            no_version,
            no_checksum,
            tech_notes_url,
            tech_notes_title,
            max_workers,
        } => map::run(
            &reporter,
            &cli.config,
            map::MapRequest {
                project,
                directories,
                mapfile,
                outdir,
                latest_symlink,
                select_version,
                all_versions,
                no_version,
                no_checksum,
                tech_notes_url,
                tech_notes_title,
                max_workers,
            },
        ),
        Command::Audit {
            project,
            directories,
        } => audit::run(&reporter, &cli.config, &project, &directories),
    }
}
