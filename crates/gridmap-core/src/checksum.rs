//! Checksum utilities for data files.
//!
//! The `[default] checksum` option keeps the historical `<client> | <LABEL>`
//! grammar (e.g. `sha256sum | SHA256`), but hashing runs in-process: only
//! clients that compute SHA256 are accepted, anything else is rejected at
//! load time. No implicit algorithm defaults; callers pass a parsed
//! [`ChecksumSpec`] explicitly.

use std::io;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::errors::{ConfigError, ConfigResult};

/// Supported checksum algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumAlgorithm {
    Sha256,
}

impl ChecksumAlgorithm {
    /// The label written into mapfile `checksum_type` fields.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Sha256 => "SHA256",
        }
    }
}

/// A parsed `checksum = <client> | <LABEL>` declaration.
#[derive(Debug, Clone)]
pub struct ChecksumSpec {
    client: String,
    algorithm: ChecksumAlgorithm,
}

impl ChecksumSpec {
    /// Parse the raw declaration. Only SHA256 clients are supported.
    pub fn parse(raw: &str) -> ConfigResult<Self> {
        let (client, label) = raw
            .split_once('|')
            .map(|(c, l)| (c.trim(), l.trim()))
            .ok_or_else(|| ConfigError::UnsupportedChecksum(raw.to_string()))?;
        let algorithm = match (client, label) {
            ("sha256sum" | "shasum", "SHA256") => ChecksumAlgorithm::Sha256,
            _ => return Err(ConfigError::UnsupportedChecksum(raw.to_string())),
        };
        Ok(Self {
            client: client.to_string(),
            algorithm,
        })
    }

    /// The configured client name (kept for reporting).
    pub fn client(&self) -> &str {
        &self.client
    }

    pub fn algorithm(&self) -> ChecksumAlgorithm {
        self.algorithm
    }

    /// The `checksum_type` label.
    pub fn label(&self) -> &'static str {
        self.algorithm.label()
    }
}

/// Stream a file through the selected algorithm and return lowercase hex.
pub fn checksum_file(path: &Path, algorithm: ChecksumAlgorithm) -> io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    match algorithm {
        ChecksumAlgorithm::Sha256 => {
            let mut hasher = Sha256::new();
            io::copy(&mut file, &mut hasher)?;
            Ok(hex::encode(hasher.finalize()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_supported_clients() {
        let spec = ChecksumSpec::parse("sha256sum | SHA256").unwrap();
        assert_eq!(spec.client(), "sha256sum");
        assert_eq!(spec.label(), "SHA256");
    }

    #[test]
    fn rejects_unknown_clients() {
        assert!(matches!(
            ChecksumSpec::parse("md5sum | MD5"),
            Err(ConfigError::UnsupportedChecksum(_))
        ));
        assert!(ChecksumSpec::parse("sha256sum").is_err());
    }

    #[test]
    fn checksum_is_stable() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("f.nc");
        std::fs::write(&path, b"abc").unwrap();
        let a = checksum_file(&path, ChecksumAlgorithm::Sha256).unwrap();
        let b = checksum_file(&path, ChecksumAlgorithm::Sha256).unwrap();
        assert_eq!(a, b);
        // sha256("abc")
        assert_eq!(
            a,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
