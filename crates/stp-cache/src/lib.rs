//! # stp-cache: Content-Addressed Artifact Cache
//!
//! Maps a deterministic [`CacheKey`] to an immutable artifact file under a
//! configured root directory. Existence on disk is the only metadata: there
//! is no index file and no eviction.
//!
//! ## Concurrency Invariant
//!
//! Every write goes to a private staging file inside the cache root and is
//! renamed onto the key path only when complete. Two requests racing on the
//! same key both write full artifacts; the last rename wins and a reader
//! never observes a partially written file at a key path.

pub mod error;
pub mod key;
pub mod store;

pub use error::CacheError;
pub use key::CacheKey;
pub use store::{CacheStats, CachedArtifact, ContentCache, PendingArtifact};
