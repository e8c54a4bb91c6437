//! # Cache Keys
//!
//! A key is the artifact's file name under the cache root:
//!
//! | Source      | Preview                          | Mesh                          |
//! |-------------|----------------------------------|-------------------------------|
//! | upload      | `{sha256}_{w}x{h}.svg`           | `{sha256}_t{tol}.stl`         |
//! | server path | `{sha256(path)}_{mtime}_{w}x{h}.svg` | `{sha256(path)}_{mtime}_t{tol}.stl` |
//!
//! `mtime` is nanoseconds since the UNIX epoch as reported by the
//! filesystem. Filesystems with coarser timestamps can yield a false hit
//! when a file is rewritten twice within one tick.

use stp_core::{ArtifactKind, OutputParams, SourceIdentity};

/// Deterministic name of a cached artifact.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    name: String,
    kind: ArtifactKind,
}

impl CacheKey {
    /// Build the key for `identity` rendered with `params`.
    pub fn new(identity: &SourceIdentity, params: &OutputParams) -> Self {
        let kind = params.kind();
        Self {
            name: format!(
                "{}_{}{}",
                identity.key_prefix(),
                params.key_segment(),
                kind.suffix()
            ),
            kind,
        }
    }

    /// The key as a file name.
    pub fn as_str(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ArtifactKind {
        self.kind
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}
