//! Facet sets and facet-value grammars.
//!
//! A [`FacetSet`] is the complete metadata for one file or dataset: facet
//! name -> value, with `project` always forced to the lower-cased configured
//! project id. Iteration order is deterministic (sorted by facet name); the
//! identifier order comes from the project's identifier template, not from
//! the set itself.

use std::collections::BTreeMap;

use serde::Serialize;

/// An ordered facet-name -> value mapping for one file or dataset.
///
/// Mutated only during resolution (raw extraction, normalization, derived
/// fill-in); treated as immutable once an identifier has been built from it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FacetSet {
    values: BTreeMap<String, String>,
}

impl FacetSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, facet: impl Into<String>, value: impl Into<String>) {
        self.values.insert(facet.into(), value.into());
    }

    pub fn get(&self, facet: &str) -> Option<&str> {
        self.values.get(facet).map(String::as_str)
    }

    pub fn contains(&self, facet: &str) -> bool {
        self.values.contains_key(facet)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The lower-cased project id, when present.
    pub fn project(&self) -> Option<&str> {
        self.get("project")
    }

    /// The version directory name (e.g. `v20190101`), when present.
    pub fn version(&self) -> Option<&str> {
        self.get("version")
    }
}

impl FromIterator<(String, String)> for FacetSet {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

/// Check a value against the ensemble grammar:
/// `r<int>i<int>p<int>` with optional trailing letter+digits groups
/// (e.g. `r1i1p1`, `r10i2p3f1`).
pub fn is_valid_ensemble(value: &str) -> bool {
    let mut rest = value;
    for marker in ['r', 'i', 'p'] {
        rest = match rest.strip_prefix(marker) {
            Some(r) => r,
            None => return false,
        };
        let digits = rest.chars().take_while(|c| c.is_ascii_digit()).count();
        if digits == 0 {
            return false;
        }
        rest = &rest[digits..];
    }
    // Optional extension groups: one letter followed by digits, repeated.
    while !rest.is_empty() {
        let mut chars = rest.chars();
        match chars.next() {
            Some(c) if c.is_ascii_lowercase() => {}
            _ => return false,
        }
        rest = chars.as_str();
        let digits = rest.chars().take_while(|c| c.is_ascii_digit()).count();
        if digits == 0 {
            return false;
        }
        rest = &rest[digits..];
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensemble_grammar_accepts_triples() {
        assert!(is_valid_ensemble("r1i1p1"));
        assert!(is_valid_ensemble("r10i2p3"));
        assert!(is_valid_ensemble("r10i2p3f1"));
        assert!(is_valid_ensemble("r1i1p1f1g2"));
    }

    #[test]
    fn ensemble_grammar_rejects_partials() {
        assert!(!is_valid_ensemble("r1i1"));
        assert!(!is_valid_ensemble("ens1"));
        assert!(!is_valid_ensemble("r1i1p"));
        assert!(!is_valid_ensemble("r1i1p1f"));
        assert!(!is_valid_ensemble(""));
        assert!(!is_valid_ensemble("rip"));
    }

    #[test]
    fn facet_set_iterates_sorted() {
        let mut set = FacetSet::new();
        set.insert("model", "m1");
        set.insert("institute", "NASA");
        let keys: Vec<&str> = set.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["institute", "model"]);
    }
}
