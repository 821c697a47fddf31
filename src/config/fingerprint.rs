//! Content fingerprinting for change detection.
//!
//! The fingerprint only gates re-reconciliation. It carries no integrity
//! meaning; SHA-256 is used because it is at hand, not for its security.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use thiserror::Error;

/// Errors raised while fingerprinting the configuration source.
#[derive(Debug, Error)]
pub enum FingerprintError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Hash of the raw configuration bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    pub fn of(bytes: &[u8]) -> Self {
        let digest = Sha256::digest(bytes);
        let mut out = [0u8; 32];
        out.copy_from_slice(&digest);
        Self(out)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// Bytes read from the source together with their fingerprint.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub fingerprint: Fingerprint,
    pub contents: Vec<u8>,
}

impl Snapshot {
    pub fn read(path: &Path) -> Result<Self, FingerprintError> {
        let contents = fs::read(path).map_err(|source| FingerprintError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            fingerprint: Fingerprint::of(&contents),
            contents,
        })
    }
}

/// Result of comparing the source against the stored fingerprint.
#[derive(Debug, Clone)]
pub enum Change {
    Unchanged,
    Changed(Snapshot),
}

/// Tracks the fingerprint of the last successfully loaded configuration.
#[derive(Debug)]
pub struct ChangeDetector {
    path: PathBuf,
    current: Option<Fingerprint>,
}

impl ChangeDetector {
    /// Create a detector with no stored fingerprint; the first check reports a change.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            current: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn current(&self) -> Option<Fingerprint> {
        self.current
    }

    /// Read the source and compare it with the stored fingerprint.
    ///
    /// Does not update the stored fingerprint; call [`commit`](Self::commit)
    /// once the snapshot has loaded successfully.
    pub fn check(&self) -> Result<Change, FingerprintError> {
        let snapshot = Snapshot::read(&self.path)?;
        if self.current == Some(snapshot.fingerprint) {
            Ok(Change::Unchanged)
        } else {
            Ok(Change::Changed(snapshot))
        }
    }

    pub fn has_changed(&self) -> Result<bool, FingerprintError> {
        Ok(matches!(self.check()?, Change::Changed(_)))
    }

    pub fn commit(&mut self, fingerprint: Fingerprint) {
        self.current = Some(fingerprint);
    }
}
