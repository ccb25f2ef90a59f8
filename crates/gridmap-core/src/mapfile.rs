//! Mapfile records and naming.
//!
//! A mapfile is the publication manifest consumed by downstream tooling:
//! one line per data file, pipe-separated with surrounding spaces, field
//! order fixed:
//!
//! ```text
//! dataset_id[#version] | /abs/path.nc | <size> | mod_time=<epoch>.000000 \
//!     [| checksum=<hex> | checksum_type=<ALGO>] \
//!     [| dataset_tech_notes=<url>] [| dataset_tech_notes_title=<title>]
//! ```
//!
//! The format is bit-exact; consumers treat each line as an independent
//! record, so line order within a mapfile carries no meaning.
//!
//! Mapfile names come from a user template with literal token substitution:
//! `{dataset_id}`, `{version}`, `{date}` (YYYYDDMM) and `{pid}`. A template
//! without `{dataset_id}` collapses every dataset into one shared file.

use std::path::{Path, PathBuf};

use time::format_description::FormatItem;
use time::macros::format_description;
use time::OffsetDateTime;

/// Historical mapfile date token layout: year, then day, then month.
const DATE_FORMAT: &[FormatItem<'_>] = format_description!("[year][day][month]");

/// Default mapfile name template.
pub const DEFAULT_MAPFILE_TEMPLATE: &str = "{dataset_id}.{version}";

/// One publication record, formatted into one mapfile line.
#[derive(Debug, Clone)]
pub struct MapfileRecord {
    /// Dataset identifier without version suffix.
    pub dataset_id: String,
    /// Version directory name (e.g. `v20190101`); rendered as `#20190101`.
    /// `None` omits the suffix.
    pub version: Option<String>,
    /// Absolute path of the data file.
    pub path: PathBuf,
    /// File size in bytes.
    pub size: u64,
    /// Modification time, seconds since the epoch.
    pub mtime: u64,
    /// Checksum hex digest and its `checksum_type` label.
    pub checksum: Option<(String, String)>,
    pub tech_notes: Option<String>,
    pub tech_notes_title: Option<String>,
}

impl MapfileRecord {
    /// Render the bit-exact mapfile line (without trailing newline).
    pub fn format_line(&self) -> String {
        let id = match &self.version {
            Some(version) => format!(
                "{}#{}",
                self.dataset_id,
                version.strip_prefix('v').unwrap_or(version)
            ),
            None => self.dataset_id.clone(),
        };
        let mut line = format!(
            "{id} | {} | {} | mod_time={}.000000",
            self.path.display(),
            self.size,
            self.mtime
        );
        if let Some((digest, label)) = &self.checksum {
            line.push_str(&format!(" | checksum={digest} | checksum_type={label}"));
        }
        if let Some(url) = &self.tech_notes {
            line.push_str(&format!(" | dataset_tech_notes={url}"));
        }
        if let Some(title) = &self.tech_notes_title {
            line.push_str(&format!(" | dataset_tech_notes_title={title}"));
        }
        line
    }
}

/// Substitute naming tokens into a mapfile name template and append the
/// `.map` extension.
pub fn render_mapfile_name(
    template: &str,
    dataset_id: &str,
    version: Option<&str>,
    now: OffsetDateTime,
    pid: u32,
) -> String {
    let date = now
        .date()
        .format(&DATE_FORMAT)
        .unwrap_or_else(|_| String::new());
    let mut name = template
        .replace("{dataset_id}", dataset_id)
        .replace("{version}", version.unwrap_or(""))
        .replace("{date}", &date)
        .replace("{pid}", &pid.to_string());
    // A version-less dataset must not leave a dangling separator.
    while name.ends_with('.') {
        name.pop();
    }
    if !name.ends_with(".map") {
        name.push_str(".map");
    }
    name
}

/// Resolve a rendered mapfile name below the output directory.
pub fn mapfile_path(outdir: &Path, name: &str) -> PathBuf {
    outdir.join(name)
}
