//! # stp-core: Foundational Types for the STEP Thumbnail Service
//!
//! Domain primitives shared by the cache, the geometry engine seam, and the
//! HTTP layer. Every value here is validated at construction, so downstream
//! crates never see an unsupported extension, an empty upload, or an
//! out-of-range output parameter.
//!
//! ## Key Types
//!
//! - [`SourceFile`]: an uploaded model or a path on the server filesystem.
//! - [`SourceIdentity`]: what a cache key is derived from (content digest,
//!   or path digest plus modification time).
//! - [`OutputParams`]: preview dimensions or mesh tolerance, tagged with the
//!   [`ArtifactKind`] they produce.
//! - [`ContentDigest`]: SHA-256 over raw bytes.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `stp-*` crates (leaf of the DAG).
//! - No filesystem access; no `unsafe`.
//! - No `.unwrap()` outside tests.

pub mod digest;
pub mod error;
pub mod params;
pub mod source;

pub use digest::{sha256_digest, ContentDigest};
pub use error::ValidationError;
pub use params::{
    ArtifactKind, OutputParams, PreviewSize, Tolerance, DEFAULT_HEIGHT, DEFAULT_TOLERANCE,
    DEFAULT_WIDTH, MAX_DIMENSION,
};
pub use source::{ModelExtension, SourceFile, SourceIdentity, Upload, MAX_UPLOAD_BYTES};
