//! # Content Cache Store
//!
//! Filesystem-backed artifact store. Artifacts live directly under the
//! cache root, named by their [`CacheKey`]. Staging files share the root
//! (so the final rename never crosses a filesystem) and carry a dot prefix
//! that no key can produce.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;

use crate::error::CacheError;
use crate::key::CacheKey;

/// File name prefix of in-flight staging files.
const STAGING_PREFIX: &str = ".staging-";

/// A complete artifact at its key path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedArtifact {
    pub key: CacheKey,
    pub path: PathBuf,
    pub len: u64,
}

/// Counts of committed artifacts, for metrics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: u64,
    pub bytes: u64,
}

/// Content-addressed artifact store rooted at a directory.
///
/// The root does not need to exist; it is created by the first write.
#[derive(Debug, Clone)]
pub struct ContentCache {
    root: PathBuf,
}

impl ContentCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Canonical path of `key`, whether or not it exists yet.
    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.root.join(key.as_str())
    }

    /// Return the artifact for `key` if one has been committed.
    pub fn lookup(&self, key: &CacheKey) -> Option<CachedArtifact> {
        let path = self.path_for(key);
        match fs::metadata(&path) {
            Ok(meta) if meta.is_file() => Some(CachedArtifact {
                key: key.clone(),
                path,
                len: meta.len(),
            }),
            _ => None,
        }
    }

    /// Write `bytes` under `key`, replacing any previous artifact.
    pub fn store(&self, key: &CacheKey, bytes: &[u8]) -> Result<CachedArtifact, CacheError> {
        let mut pending = self.stage(key)?;
        pending.write_all(bytes)?;
        pending.commit()
    }

    /// Open a staging file for `key` that a producer can write in place.
    ///
    /// The artifact becomes visible only through [`PendingArtifact::commit`].
    /// Dropping the returned value removes the staging file.
    pub fn stage(&self, key: &CacheKey) -> Result<PendingArtifact, CacheError> {
        fs::create_dir_all(&self.root)?;
        let file = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .suffix(key.kind().suffix())
            .tempfile_in(&self.root)?;
        Ok(PendingArtifact {
            key: key.clone(),
            dest: self.path_for(key),
            file,
        })
    }

    /// Count committed artifacts and their total size.
    ///
    /// A missing root is an empty cache.
    pub fn stats(&self) -> Result<CacheStats, CacheError> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(CacheStats::default())
            }
            Err(e) => return Err(e.into()),
        };
        let mut stats = CacheStats::default();
        for entry in entries {
            let entry = entry?;
            if entry.file_name().to_string_lossy().starts_with(STAGING_PREFIX) {
                continue;
            }
            let meta = entry.metadata()?;
            if meta.is_file() {
                stats.entries += 1;
                stats.bytes += meta.len();
            }
        }
        Ok(stats)
    }
}

/// An artifact being produced, not yet visible under its key.
#[derive(Debug)]
pub struct PendingArtifact {
    key: CacheKey,
    dest: PathBuf,
    file: NamedTempFile,
}

impl PendingArtifact {
    /// Path of the staging file, for producers that write by path.
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Append bytes through the staging file handle.
    pub fn write_all(&mut self, bytes: &[u8]) -> Result<(), CacheError> {
        self.file.as_file_mut().write_all(bytes)?;
        Ok(())
    }

    /// Flush the staging file and rename it onto the key path.
    ///
    /// Fails without publishing anything if the staging file is empty.
    pub fn commit(self) -> Result<CachedArtifact, CacheError> {
        let staged = self.file.path().to_path_buf();
        let len = fs::metadata(&staged)?.len();
        if len == 0 {
            return Err(CacheError::EmptyArtifact(self.key.to_string()));
        }

        // Producers may write by path rather than through our handle, so
        // sync whatever inode the path currently names.
        File::open(&staged)?.sync_all()?;
        publish_permissions(&staged)?;

        self.file
            .persist(&self.dest)
            .map_err(|e| CacheError::Io(e.error))?;

        tracing::debug!(key = %self.key, len, "artifact committed");

        Ok(CachedArtifact {
            key: self.key,
            path: self.dest,
            len,
        })
    }
}

/// Staging files are created owner-only; published artifacts are world-readable.
#[cfg(unix)]
fn publish_permissions(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o644))
}

#[cfg(not(unix))]
fn publish_permissions(_path: &Path) -> std::io::Result<()> {
    Ok(())
}
