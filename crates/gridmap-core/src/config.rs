//! Configuration loader for gridmap.
//!
//! Projects are declared in an INI-style file, one `[project:<id>]` section
//! per project, plus a `[default]` section for run-wide options:
//!
//! ```ini
//! [default]
//! checksum = sha256sum | SHA256
//!
//! [project:projx]
//! dataset_id = projx.%(institute)s.%(model)s.%(experiment)s.%(ensemble)s
//! directory_format = %(root)s/%(institute)s/%(model)s/%(experiment)s/%(ensemble)s/%(version)s
//! institute_options = NASA, NOAA
//! model_family_map = map(institute : model_family)
//!     NASA | modelA
//!     NOAA | modelB
//! ```
//!
//! Lines starting with whitespace continue the previous value; this is how
//! mapping tables span multiple lines. Values are kept as raw strings here;
//! templates and tables are compiled by [`crate::template`] and
//! [`crate::vocab`].
//!
//! The loader itself never interprets facet semantics. All configuration is
//! immutable after load.

use std::collections::BTreeMap;
use std::path::Path;

use crate::checksum::ChecksumSpec;
use crate::errors::{ConfigError, ConfigResult};

/// A parsed configuration file: the `[default]` section plus per-project
/// sections.
#[derive(Debug, Clone)]
pub struct Config {
    defaults: BTreeMap<String, String>,
    projects: BTreeMap<String, ProjectSection>,
}

/// One `[project:<id>]` section, exposing raw option values.
#[derive(Debug, Clone)]
pub struct ProjectSection {
    id: String,
    options: BTreeMap<String, String>,
}

impl Config {
    /// Load a configuration file from disk.
    pub fn from_file(path: &Path) -> ConfigResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_str(&text)
    }

    /// Parse configuration text.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(text: &str) -> ConfigResult<Self> {
        let mut defaults = BTreeMap::new();
        let mut projects: BTreeMap<String, ProjectSection> = BTreeMap::new();

        let mut section: Option<String> = None;
        let mut last_key: Option<String> = None;

        for raw_line in text.lines() {
            let trimmed = raw_line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') || trimmed.starts_with(';') {
                continue;
            }

            // Continuation line: leading whitespace extends the previous value.
            if raw_line.starts_with(|c: char| c.is_whitespace()) {
                if let (Some(sec), Some(key)) = (&section, &last_key) {
                    let target = match sec.as_str() {
                        "default" => Some(&mut defaults),
                        _ => projects.get_mut(sec).map(|p| &mut p.options),
                    };
                    if let Some(value) = target.and_then(|t| t.get_mut(key)) {
                        value.push('\n');
                        value.push_str(trimmed);
                    }
                }
                continue;
            }

            if let Some(name) = trimmed.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
                let name = name.trim().to_string();
                if let Some(id) = name.strip_prefix("project:") {
                    let id = id.trim().to_string();
                    projects.insert(
                        name.clone(),
                        ProjectSection {
                            id,
                            options: BTreeMap::new(),
                        },
                    );
                }
                section = Some(name);
                last_key = None;
                continue;
            }

            if let Some((key, value)) = trimmed.split_once('=') {
                let key = key.trim().to_string();
                let value = value.trim().to_string();
                match section.as_deref() {
                    Some("default") => {
                        defaults.insert(key.clone(), value);
                    }
                    Some(sec) => {
                        if let Some(project) = projects.get_mut(sec) {
                            project.options.insert(key.clone(), value);
                        }
                    }
                    None => continue,
                }
                last_key = Some(key);
            }
        }

        Ok(Self { defaults, projects })
    }

    /// Look up the section for a project id.
    pub fn project(&self, id: &str) -> ConfigResult<&ProjectSection> {
        let name = format!("project:{id}");
        self.projects
            .get(&name)
            .ok_or(ConfigError::MissingSection(name))
    }

    /// Ids of every declared project.
    pub fn project_ids(&self) -> Vec<&str> {
        self.projects.values().map(|p| p.id.as_str()).collect()
    }

    /// The `[default] checksum` declaration, if present.
    pub fn checksum(&self) -> ConfigResult<Option<ChecksumSpec>> {
        match self.defaults.get("checksum") {
            Some(raw) => Ok(Some(ChecksumSpec::parse(raw)?)),
            None => Ok(None),
        }
    }

    /// A raw `[default]` option.
    pub fn default_option(&self, key: &str) -> Option<&str> {
        self.defaults.get(key).map(String::as_str)
    }
}

impl ProjectSection {
    /// The project id (the part after `project:` in the section header).
    pub fn id(&self) -> &str {
        &self.id
    }

    /// A raw option value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.options.get(key).map(String::as_str)
    }

    /// A raw option value, or a `ConfigError` naming the section.
    pub fn require(&self, key: &str) -> ConfigResult<&str> {
        self.get(key).ok_or_else(|| ConfigError::MissingOption {
            section: format!("project:{}", self.id),
            option: key.to_string(),
        })
    }

    /// The ordered dataset-id template string.
    pub fn dataset_id(&self) -> ConfigResult<&str> {
        self.require("dataset_id")
    }

    /// The directory-format template string.
    pub fn directory_format(&self) -> ConfigResult<&str> {
        self.require("directory_format")
    }

    /// Comma-separated option list for a facet (`<facet>_options`), if
    /// declared.
    pub fn facet_options(&self, facet: &str) -> Option<Vec<String>> {
        self.get(&format!("{facet}_options")).map(|raw| {
            raw.split(',')
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .collect()
        })
    }

    /// Raw mapping-table declaration for a facet (`<facet>_map`), if
    /// declared.
    pub fn facet_map(&self, facet: &str) -> Option<&str> {
        self.get(&format!("{facet}_map"))
    }

    #[cfg(test)]
    pub(crate) fn for_tests(id: &str, options: &[(&str, &str)]) -> Self {
        Self {
            id: id.to_string(),
            options: options
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[default]
checksum = sha256sum | SHA256

# vocabulary for the projx test project
[project:projx]
dataset_id = projx.%(institute)s.%(model)s
directory_format = %(root)s/%(institute)s/%(model)s/%(version)s
institute_options = NASA, NOAA
model_family_map = map(institute : model_family)
    NASA | modelA
    NOAA | modelB
"#;

    #[test]
    fn parses_sections_and_options() {
        let cfg = Config::from_str(SAMPLE).unwrap();
        let proj = cfg.project("projx").unwrap();
        assert_eq!(proj.id(), "projx");
        assert_eq!(proj.dataset_id().unwrap(), "projx.%(institute)s.%(model)s");
        assert_eq!(
            proj.facet_options("institute").unwrap(),
            vec!["NASA".to_string(), "NOAA".to_string()]
        );
    }

    #[test]
    fn continuation_lines_join_map_tables() {
        let cfg = Config::from_str(SAMPLE).unwrap();
        let proj = cfg.project("projx").unwrap();
        let map = proj.facet_map("model_family").unwrap();
        let lines: Vec<&str> = map.lines().collect();
        assert_eq!(lines[0], "map(institute : model_family)");
        assert_eq!(lines[1], "NASA | modelA");
        assert_eq!(lines[2], "NOAA | modelB");
    }

    #[test]
    fn checksum_declaration_parsed() {
        let cfg = Config::from_str(SAMPLE).unwrap();
        let spec = cfg.checksum().unwrap().unwrap();
        assert_eq!(spec.label(), "SHA256");
    }

    #[test]
    fn missing_section_is_an_error() {
        let cfg = Config::from_str(SAMPLE).unwrap();
        assert!(matches!(
            cfg.project("nope"),
            Err(ConfigError::MissingSection(_))
        ));
    }

    #[test]
    fn missing_option_names_section() {
        let cfg = Config::from_str("[project:p]\ndataset_id = x\n").unwrap();
        let proj = cfg.project("p").unwrap();
        match proj.directory_format() {
            Err(ConfigError::MissingOption { section, option }) => {
                assert_eq!(section, "project:p");
                assert_eq!(option, "directory_format");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}
