// src/fingerprint.rs
use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::feed::Candidate;

/// Stable dedup key for a feed entry: SHA-256 over the (title, link) identity.
pub fn fingerprint(title: &str, link: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(title.as_bytes());
    hasher.update(b"-");
    hasher.update(link.as_bytes());
    format!("{:x}", hasher.finalize())
}

pub fn fingerprint_of(candidate: &Candidate) -> String {
    fingerprint(&candidate.title, &candidate.link)
}

/// Append-only log of published fingerprints, one lowercase hex digest per
/// line. Loaded whole at startup; grows monotonically, never compacted.
/// Not safe for two processes appending concurrently.
#[derive(Debug)]
pub struct FingerprintLog {
    path: PathBuf,
    seen: HashSet<String>,
}

impl FingerprintLog {
    /// A missing file is an empty set (first run), not an error.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let seen = match fs::read_to_string(&path) {
            Ok(s) => s
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashSet::new(),
            Err(e) => {
                return Err(e).with_context(|| format!("reading fingerprint log {}", path.display()))
            }
        };
        Ok(Self { path, seen })
    }

    pub fn is_seen(&self, fp: &str) -> bool {
        self.seen.contains(fp)
    }

    /// Append one fingerprint and mirror it into the in-memory set.
    pub fn commit(&mut self, fp: &str) -> Result<()> {
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .with_context(|| format!("opening fingerprint log {}", self.path.display()))?;
        writeln!(f, "{fp}").context("appending fingerprint")?;
        self.seen.insert(fp.to_string());
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_identity_same_digest() {
        let a = fingerprint("Title", "https://example.test/a");
        let b = fingerprint("Title", "https://example.test/a");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn either_field_changes_the_digest() {
        let base = fingerprint("Title", "https://example.test/a");
        assert_ne!(base, fingerprint("Title 2", "https://example.test/a"));
        assert_ne!(base, fingerprint("Title", "https://example.test/b"));
    }

    #[test]
    fn missing_log_is_empty_set() {
        let dir = tempfile::tempdir().unwrap();
        let log = FingerprintLog::load(dir.path().join("fingerprints.log")).unwrap();
        assert!(log.is_empty());
    }

    #[test]
    fn commit_persists_across_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fingerprints.log");
        let fp = fingerprint("Title", "https://example.test/a");

        let mut log = FingerprintLog::load(&path).unwrap();
        assert!(!log.is_seen(&fp));
        log.commit(&fp).unwrap();
        assert!(log.is_seen(&fp));

        let reloaded = FingerprintLog::load(&path).unwrap();
        assert!(reloaded.is_seen(&fp));
        assert_eq!(reloaded.len(), 1);
    }
}
