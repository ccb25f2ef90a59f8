//! Controlled-vocabulary store.
//!
//! Answers, per project and facet: "is value V legal?" and "what is the
//! derived value of facet F given already-known facets?".
//!
//! For each facet referenced by the project's templates the store records,
//! in lookup order:
//! 1. an explicit option list (`<facet>_options`, comma-separated), else
//! 2. a mapping table (`<facet>_map`, `map(from...:to...)` header plus
//!    pipe-separated rows), else
//! 3. undeclared (no constraint).
//!
//! Invariants enforced at load time, never at lookup time:
//! - a mapping table's "to" keys include the facet it is registered under
//! - lookup keys are unique within one table
//! - mapping tables do not depend on each other in a cycle
//!
//! The store is immutable after construction and safe for concurrent reads.

use std::collections::{BTreeMap, BTreeSet};

use crate::config::ProjectSection;
use crate::errors::{ConfigError, ConfigResult, ResolveError, ResolveResult};
use crate::facets::FacetSet;

/// A declarative facet-to-facet lookup table.
#[derive(Debug, Clone)]
pub struct MappingTable {
    from_keys: Vec<String>,
    to_keys: Vec<String>,
    rows: BTreeMap<Vec<String>, Vec<String>>,
}

impl MappingTable {
    /// Parse a raw `<facet>_map` declaration.
    ///
    /// The first line is the header `map(from1,from2,...:to1,to2,...)`;
    /// each following line is a pipe-separated row whose leading N columns
    /// (N = number of "from" keys) form the lookup key.
    pub fn parse(facet: &str, raw: &str) -> ConfigResult<Self> {
        let malformed = |reason: String| ConfigError::MalformedMap {
            facet: facet.to_string(),
            reason,
        };

        let mut lines = raw.lines();
        let header = lines.next().map(str::trim).unwrap_or_default();
        let inner = header
            .strip_prefix("map(")
            .and_then(|s| s.strip_suffix(')'))
            .ok_or_else(|| malformed(format!("bad header '{header}'")))?;
        let (from, to) = inner
            .split_once(':')
            .ok_or_else(|| malformed("header is missing ':'".to_string()))?;

        let split_keys = |s: &str| -> Vec<String> {
            s.split(',')
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty())
                .collect()
        };
        let from_keys = split_keys(from);
        let to_keys = split_keys(to);
        if from_keys.is_empty() || to_keys.is_empty() {
            return Err(malformed("header declares no keys".to_string()));
        }
        if !to_keys.iter().any(|k| k == facet) {
            return Err(malformed(format!(
                "'to' keys {to_keys:?} do not include '{facet}'"
            )));
        }

        let mut rows = BTreeMap::new();
        for line in lines {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let columns: Vec<String> = line.split('|').map(|c| c.trim().to_string()).collect();
            if columns.len() != from_keys.len() + to_keys.len() {
                return Err(malformed(format!(
                    "row '{line}' has {} columns, expected {}",
                    columns.len(),
                    from_keys.len() + to_keys.len()
                )));
            }
            let key: Vec<String> = columns[..from_keys.len()].to_vec();
            let value: Vec<String> = columns[from_keys.len()..].to_vec();
            if rows.insert(key.clone(), value).is_some() {
                return Err(ConfigError::DuplicateMapKey {
                    facet: facet.to_string(),
                    key: key.join(", "),
                });
            }
        }

        Ok(Self {
            from_keys,
            to_keys,
            rows,
        })
    }

    /// The ordered "from" facet names.
    pub fn from_keys(&self) -> &[String] {
        &self.from_keys
    }

    /// The ordered "to" facet names.
    pub fn to_keys(&self) -> &[String] {
        &self.to_keys
    }

    /// Look up the output tuple for a "from" tuple. A miss is `None`; the
    /// caller decides how to surface it.
    pub fn lookup(&self, key: &[String]) -> Option<&[String]> {
        self.rows.get(key).map(Vec::as_slice)
    }

    /// Every value appearing in the named column, "from" or "to" side.
    pub fn column_values(&self, facet: &str) -> BTreeSet<String> {
        if let Some(i) = self.from_keys.iter().position(|k| k == facet) {
            return self.rows.keys().map(|k| k[i].clone()).collect();
        }
        if let Some(i) = self.to_keys.iter().position(|k| k == facet) {
            return self.rows.values().map(|v| v[i].clone()).collect();
        }
        BTreeSet::new()
    }
}

/// The declared legality rule for one facet.
#[derive(Debug, Clone)]
pub enum FacetRule {
    /// Finite list of legal values.
    Options(BTreeSet<String>),
    /// Value derived from other facets through a lookup table.
    Map(MappingTable),
    /// No constraint.
    Undeclared,
}

/// Per-project vocabulary: one [`FacetRule`] per referenced facet.
#[derive(Debug, Clone)]
pub struct VocabularyStore {
    project: String,
    rules: BTreeMap<String, FacetRule>,
}

impl VocabularyStore {
    /// Build the vocabulary for every facet referenced by the project's
    /// templates. Mapping-table invariants and cross-table cycles are
    /// checked here, once.
    pub fn from_project(section: &ProjectSection, facets: &[&str]) -> ConfigResult<Self> {
        let mut rules = BTreeMap::new();
        for &facet in facets {
            let rule = if let Some(options) = section.facet_options(facet) {
                FacetRule::Options(options.into_iter().collect())
            } else if let Some(raw) = section.facet_map(facet) {
                FacetRule::Map(MappingTable::parse(facet, raw)?)
            } else {
                FacetRule::Undeclared
            };
            rules.insert(facet.to_string(), rule);
        }

        let store = Self {
            project: section.id().to_string(),
            rules,
        };
        store.check_cycles()?;
        Ok(store)
    }

    /// Detect circular dependencies between mapping tables in a single pass.
    fn check_cycles(&self) -> ConfigResult<()> {
        for facet in self.rules.keys() {
            let mut trail = Vec::new();
            self.visit(facet, &mut trail)?;
        }
        Ok(())
    }

    fn visit(&self, facet: &str, trail: &mut Vec<String>) -> ConfigResult<()> {
        if trail.iter().any(|f| f == facet) {
            return Err(ConfigError::MapCycle {
                facet: facet.to_string(),
            });
        }
        if let Some(FacetRule::Map(table)) = self.rules.get(facet) {
            trail.push(facet.to_string());
            for from in table.from_keys() {
                self.visit(from, trail)?;
            }
            trail.pop();
        }
        Ok(())
    }

    /// The project id this vocabulary belongs to.
    pub fn project(&self) -> &str {
        &self.project
    }

    /// The rule for a facet; unknown facets are unconstrained.
    pub fn rule(&self, facet: &str) -> &FacetRule {
        static UNDECLARED: FacetRule = FacetRule::Undeclared;
        self.rules.get(facet).unwrap_or(&UNDECLARED)
    }

    /// Membership test for option-declared facets. `None` when the facet has
    /// no option list.
    pub fn is_legal(&self, facet: &str, value: &str) -> Option<bool> {
        match self.rule(facet) {
            FacetRule::Options(options) => Some(options.contains(value)),
            _ => None,
        }
    }

    /// Derive the value of a map-declared facet from already-known facets.
    pub fn derive(&self, facet: &str, known: &FacetSet) -> ResolveResult<String> {
        let table = match self.rule(facet) {
            FacetRule::Map(table) => table,
            _ => {
                return Err(ResolveError::MissingVocabularyDeclaration {
                    project: self.project.clone(),
                    facet: facet.to_string(),
                })
            }
        };

        let mut key = Vec::with_capacity(table.from_keys().len());
        for from in table.from_keys() {
            match known.get(from) {
                Some(value) => key.push(value.to_string()),
                None => {
                    return Err(ResolveError::MapLookup {
                        project: self.project.clone(),
                        facet: facet.to_string(),
                        key: format!("missing dependency '{from}'"),
                    })
                }
            }
        }

        let row = table.lookup(&key).ok_or_else(|| ResolveError::MapLookup {
            project: self.project.clone(),
            facet: facet.to_string(),
            key: key.join(", "),
        })?;
        let index = table
            .to_keys()
            .iter()
            .position(|k| k == facet)
            .expect("checked at parse time");
        Ok(row[index].clone())
    }

    /// Values declared for a facet, for audit comparisons. `None` for
    /// unconstrained facets.
    pub fn declared_values(&self, facet: &str) -> Option<BTreeSet<String>> {
        match self.rule(facet) {
            FacetRule::Options(options) => Some(options.clone()),
            FacetRule::Map(table) => Some(table.column_values(facet)),
            FacetRule::Undeclared => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProjectSection;

    const MAP: &str = "map(institute : model_family)\nNASA | modelA\nNOAA | modelB";

    fn section() -> ProjectSection {
        ProjectSection::for_tests(
            "projx",
            &[
                ("institute_options", "NASA, NOAA"),
                ("model_family_map", MAP),
            ],
        )
    }

    #[test]
    fn option_membership() {
        let store =
            VocabularyStore::from_project(&section(), &["institute", "model_family"]).unwrap();
        assert_eq!(store.is_legal("institute", "NASA"), Some(true));
        assert_eq!(store.is_legal("institute", "ESA"), Some(false));
        assert_eq!(store.is_legal("model_family", "modelA"), None);
    }

    #[test]
    fn map_derivation() {
        let store =
            VocabularyStore::from_project(&section(), &["institute", "model_family"]).unwrap();
        let mut known = FacetSet::new();
        known.insert("institute", "NOAA");
        assert_eq!(store.derive("model_family", &known).unwrap(), "modelB");
    }

    #[test]
    fn map_miss_is_resolve_error() {
        let store =
            VocabularyStore::from_project(&section(), &["institute", "model_family"]).unwrap();
        let mut known = FacetSet::new();
        known.insert("institute", "ESA");
        assert!(matches!(
            store.derive("model_family", &known),
            Err(ResolveError::MapLookup { .. })
        ));
    }

    #[test]
    fn duplicate_map_key_fails_at_load() {
        let raw = "map(a : b)\nx | 1\nx | 2";
        assert!(matches!(
            MappingTable::parse("b", raw),
            Err(ConfigError::DuplicateMapKey { .. })
        ));
    }

    #[test]
    fn to_keys_must_include_registered_facet() {
        let raw = "map(a : c)\nx | 1";
        assert!(matches!(
            MappingTable::parse("b", raw),
            Err(ConfigError::MalformedMap { .. })
        ));
    }

    #[test]
    fn bad_row_width_fails_at_load() {
        let raw = "map(a : b)\nx | 1 | 2";
        assert!(MappingTable::parse("b", raw).is_err());
    }

    #[test]
    fn map_cycle_detected_at_load() {
        let section = ProjectSection::for_tests(
            "p",
            &[
                ("a_map", "map(b : a)\nx | 1"),
                ("b_map", "map(a : b)\n1 | x"),
            ],
        );
        assert!(matches!(
            VocabularyStore::from_project(&section, &["a", "b"]),
            Err(ConfigError::MapCycle { .. })
        ));
    }

    #[test]
    fn declared_values_cover_map_columns() {
        let store =
            VocabularyStore::from_project(&section(), &["institute", "model_family"]).unwrap();
        let declared = store.declared_values("model_family").unwrap();
        assert!(declared.contains("modelA"));
        assert!(declared.contains("modelB"));
        assert!(store.declared_values("unknown").is_none());
    }
}
