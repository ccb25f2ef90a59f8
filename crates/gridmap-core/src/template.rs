//! Directory-format compiler.
//!
//! Compiles a declarative DRS template string such as
//! `%(root)s/%(institute)s/%(model)s/%(experiment)s/%(ensemble)s/%(version)s`
//! into a typed list of segment matchers, one per path component, plus an
//! implicit trailing filename segment with a required extension.
//!
//! Matching rules:
//! - `%(root)s` accepts any number of leading path components (at least one).
//! - Every other placeholder accepts exactly one component made of word
//!   characters and hyphens. Dots are rejected inside a facet value because
//!   dots are the identifier separator.
//! - Literal segments must match exactly, including any literal dots.
//! - The filename must end with the configured extension (`.nc` by default).
//!
//! Matching a well-formed DRS path yields exactly one value per facet plus
//! the filename (and the root prefix if the template declares one). The
//! compiled form is immutable and shared read-only across workers.

use std::collections::BTreeMap;
use std::path::Path;

use crate::errors::{ConfigError, ConfigResult, ResolveError, ResolveResult};
use crate::DEFAULT_EXTENSION;

/// One token of a template string: literal text or a `%(name)s` placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Literal(String),
    Placeholder(String),
}

/// Parse a template string into tokens, failing on unbalanced placeholders.
pub fn parse_tokens(template: &str) -> ConfigResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut rest = template;

    while let Some(start) = rest.find("%(") {
        if start > 0 {
            tokens.push(Token::Literal(rest[..start].to_string()));
        }
        let after = &rest[start + 2..];
        let end = after.find(")s").ok_or_else(|| ConfigError::MalformedTemplate {
            template: template.to_string(),
            reason: "unterminated placeholder (expected ')s')".to_string(),
        })?;
        let name = &after[..end];
        if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(ConfigError::MalformedTemplate {
                template: template.to_string(),
                reason: format!("invalid placeholder name '{name}'"),
            });
        }
        tokens.push(Token::Placeholder(name.to_string()));
        rest = &after[end + 2..];
    }
    if !rest.is_empty() {
        tokens.push(Token::Literal(rest.to_string()));
    }
    Ok(tokens)
}

/// One compiled matcher for a single path component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegmentMatcher {
    /// `%(root)s`: greedy prefix of one or more components.
    Root,
    /// Fixed text, matched exactly.
    Literal(String),
    /// A named facet: one component of word characters and hyphens.
    Facet(String),
}

/// The result of matching one file path against a compiled pattern.
#[derive(Debug, Clone)]
pub struct Extraction {
    /// The components consumed by `%(root)s`, joined as an absolute path.
    pub root: Option<String>,
    /// Facet name -> extracted value, one entry per facet segment.
    pub facets: BTreeMap<String, String>,
    /// The final path component (always ends with the extension filter).
    pub filename: String,
}

/// A compiled directory-format template.
#[derive(Debug, Clone)]
pub struct DirectoryFormat {
    raw: String,
    segments: Vec<SegmentMatcher>,
    extension: String,
}

impl DirectoryFormat {
    /// Compile a template with the default `.nc` extension filter.
    pub fn compile(template: &str) -> ConfigResult<Self> {
        Self::compile_with_extension(template, DEFAULT_EXTENSION)
    }

    /// Compile a template with a custom filename extension filter.
    pub fn compile_with_extension(template: &str, extension: &str) -> ConfigResult<Self> {
        let mut segments = Vec::new();
        for part in template.split('/') {
            if part.is_empty() {
                continue;
            }
            let tokens = parse_tokens(part)?;
            let matcher = match tokens.as_slice() {
                [Token::Placeholder(name)] if name == "root" => SegmentMatcher::Root,
                [Token::Placeholder(name)] => SegmentMatcher::Facet(name.clone()),
                [Token::Literal(text)] => SegmentMatcher::Literal(text.clone()),
                _ => {
                    return Err(ConfigError::MalformedTemplate {
                        template: template.to_string(),
                        reason: format!(
                            "segment '{part}' must be a single placeholder or a literal"
                        ),
                    })
                }
            };
            if matcher == SegmentMatcher::Root && !segments.is_empty() {
                return Err(ConfigError::MalformedTemplate {
                    template: template.to_string(),
                    reason: "%(root)s must be the first segment".to_string(),
                });
            }
            segments.push(matcher);
        }
        if segments.is_empty() {
            return Err(ConfigError::MalformedTemplate {
                template: template.to_string(),
                reason: "template has no segments".to_string(),
            });
        }
        Ok(Self {
            raw: template.to_string(),
            segments,
            extension: extension.to_string(),
        })
    }

    /// The raw template string this pattern was compiled from.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// The filename extension filter.
    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// Ordered facet names found in the template, excluding `root`.
    pub fn facet_names(&self) -> Vec<&str> {
        self.segments
            .iter()
            .filter_map(|s| match s {
                SegmentMatcher::Facet(name) => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }

    fn has_root(&self) -> bool {
        matches!(self.segments.first(), Some(SegmentMatcher::Root))
    }

    /// Segments after the optional root.
    fn tail_segments(&self) -> &[SegmentMatcher] {
        if self.has_root() {
            &self.segments[1..]
        } else {
            &self.segments
        }
    }

    /// The dataset part of the template: segments after the root, up to (not
    /// including) the `version` segment when one is declared.
    pub fn dataset_segments(&self) -> &[SegmentMatcher] {
        let tail = self.tail_segments();
        let cut = tail
            .iter()
            .position(|s| matches!(s, SegmentMatcher::Facet(name) if name == "version"))
            .unwrap_or(tail.len());
        &tail[..cut]
    }

    /// Apply the compiled pattern to one absolute file path.
    pub fn extract(&self, project: &str, path: &Path) -> ResolveResult<Extraction> {
        let fail = || ResolveError::PathMatch {
            project: project.to_string(),
            path: path.to_path_buf(),
        };

        let components = path_components(path);
        // Last component is the filename; the template matches the directories.
        let (filename, dirs) = components.split_last().ok_or_else(fail)?;
        if !filename.ends_with(&self.extension) {
            return Err(fail());
        }

        let tail = self.tail_segments();
        let root = if self.has_root() {
            if dirs.len() < tail.len() + 1 {
                return Err(fail());
            }
            let root_len = dirs.len() - tail.len();
            Some(format!("/{}", dirs[..root_len].join("/")))
        } else {
            if dirs.len() != tail.len() {
                return Err(fail());
            }
            None
        };

        let start = dirs.len() - tail.len();
        let mut facets = BTreeMap::new();
        for (segment, value) in tail.iter().zip(&dirs[start..]) {
            match segment {
                SegmentMatcher::Root => unreachable!("root is always first"),
                SegmentMatcher::Literal(text) => {
                    if text != value {
                        return Err(fail());
                    }
                }
                SegmentMatcher::Facet(name) => {
                    if !is_facet_value(value) {
                        return Err(fail());
                    }
                    if let Some(previous) = facets.get(name.as_str()) {
                        // Repeated placeholders must agree.
                        if previous != value {
                            return Err(fail());
                        }
                    }
                    facets.insert(name.clone(), value.to_string());
                }
            }
        }

        Ok(Extraction {
            root,
            facets,
            filename: filename.to_string(),
        })
    }

    /// Match a directory path against the dataset part of the template only.
    ///
    /// Used by the vocabulary auditor, which stops at the member/ensemble
    /// level instead of descending to files. Returns `None` when the path
    /// does not line up with the dataset segments.
    pub fn extract_dataset_dir(&self, path: &Path) -> Option<BTreeMap<String, String>> {
        let components = path_components(path);
        let segments = self.dataset_segments();
        if segments.is_empty() {
            return None;
        }
        if self.has_root() {
            if components.len() < segments.len() + 1 {
                return None;
            }
        } else if components.len() != segments.len() {
            return None;
        }

        let start = components.len() - segments.len();
        let mut facets = BTreeMap::new();
        for (segment, value) in segments.iter().zip(&components[start..]) {
            match segment {
                SegmentMatcher::Root => return None,
                SegmentMatcher::Literal(text) => {
                    if text != value {
                        return None;
                    }
                }
                SegmentMatcher::Facet(name) => {
                    if !is_facet_value(value) {
                        return None;
                    }
                    facets.insert(name.clone(), value.to_string());
                }
            }
        }
        Some(facets)
    }
}

/// Facet values accept word characters and hyphens. Dots and separators are
/// rejected: dots are reserved for the identifier, separators for the path.
fn is_facet_value(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

fn path_components(path: &Path) -> Vec<String> {
    path.components()
        .filter_map(|c| match c {
            std::path::Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    const TEMPLATE: &str =
        "%(root)s/%(institute)s/%(model)s/%(experiment)s/%(ensemble)s/%(version)s";

    #[test]
    fn facet_names_exclude_root() {
        let fmt = DirectoryFormat::compile(TEMPLATE).unwrap();
        assert_eq!(
            fmt.facet_names(),
            vec!["institute", "model", "experiment", "ensemble", "version"]
        );
    }

    #[test]
    fn extracts_all_facets() {
        let fmt = DirectoryFormat::compile(TEMPLATE).unwrap();
        let path = PathBuf::from("/data/archive/NASA/model1/rcp45/r1i1p1/v20190101/tas.nc");
        let ex = fmt.extract("projx", &path).unwrap();
        assert_eq!(ex.root.as_deref(), Some("/data/archive"));
        assert_eq!(ex.facets["institute"], "NASA");
        assert_eq!(ex.facets["version"], "v20190101");
        assert_eq!(ex.filename, "tas.nc");
    }

    #[test]
    fn rejects_wrong_extension() {
        let fmt = DirectoryFormat::compile(TEMPLATE).unwrap();
        let path = PathBuf::from("/data/NASA/model1/rcp45/r1i1p1/v1/tas.txt");
        assert!(matches!(
            fmt.extract("projx", &path),
            Err(ResolveError::PathMatch { .. })
        ));
    }

    #[test]
    fn rejects_dot_inside_facet_value() {
        let fmt = DirectoryFormat::compile(TEMPLATE).unwrap();
        let path = PathBuf::from("/data/NA.SA/model1/rcp45/r1i1p1/v1/tas.nc");
        assert!(fmt.extract("projx", &path).is_err());
    }

    #[test]
    fn rejects_too_shallow_path() {
        let fmt = DirectoryFormat::compile(TEMPLATE).unwrap();
        let path = PathBuf::from("/NASA/model1/rcp45/tas.nc");
        assert!(fmt.extract("projx", &path).is_err());
    }

    #[test]
    fn literal_segments_must_match() {
        let fmt = DirectoryFormat::compile("%(root)s/archive/%(model)s/%(version)s").unwrap();
        let good = PathBuf::from("/data/archive/m1/v1/x.nc");
        let bad = PathBuf::from("/data/other/m1/v1/x.nc");
        assert!(fmt.extract("p", &good).is_ok());
        assert!(fmt.extract("p", &bad).is_err());
    }

    #[test]
    fn unterminated_placeholder_is_config_error() {
        assert!(matches!(
            DirectoryFormat::compile("%(root)s/%(model"),
            Err(ConfigError::MalformedTemplate { .. })
        ));
    }

    #[test]
    fn dataset_segments_stop_before_version() {
        let fmt = DirectoryFormat::compile(TEMPLATE).unwrap();
        assert_eq!(fmt.dataset_segments().len(), 4);
        let dir = PathBuf::from("/data/NASA/model1/rcp45/r1i1p1");
        let facets = fmt.extract_dataset_dir(&dir).unwrap();
        assert_eq!(facets["ensemble"], "r1i1p1");
        assert!(!facets.contains_key("version"));
    }

    #[test]
    fn custom_extension_filter() {
        let fmt = DirectoryFormat::compile_with_extension("%(root)s/%(v)s", ".grb").unwrap();
        assert!(fmt.extract("p", &PathBuf::from("/d/x/f.grb")).is_ok());
        assert!(fmt.extract("p", &PathBuf::from("/d/x/f.nc")).is_err());
    }
}
