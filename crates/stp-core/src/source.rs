//! # Model Sources
//!
//! A model reaches the service either as an uploaded payload or as a path
//! that already exists on the server. Both normalize to [`SourceFile`]
//! before the orchestrator sees them; the orchestrator never branches on
//! how the request was framed.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::digest::{sha256_digest, ContentDigest};
use crate::error::ValidationError;

/// Largest accepted upload payload (50 MiB).
pub const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Recognized STEP exchange-format suffixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelExtension {
    Stp,
    Step,
}

impl ModelExtension {
    /// Parse the suffix of a file name, case-insensitively.
    ///
    /// The rejected suffix is reported lowercase with its leading dot, or
    /// as an empty string when the name has none.
    pub fn from_file_name(name: &str) -> Result<Self, ValidationError> {
        let ext = Path::new(name)
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy().to_lowercase()))
            .unwrap_or_default();
        match ext.as_str() {
            ".stp" => Ok(Self::Stp),
            ".step" => Ok(Self::Step),
            _ => Err(ValidationError::UnsupportedExtension(ext)),
        }
    }

    /// The suffix including its dot.
    pub fn as_suffix(&self) -> &'static str {
        match self {
            Self::Stp => ".stp",
            Self::Step => ".step",
        }
    }
}

/// An uploaded model held in memory until it is staged.
#[derive(Debug, Clone)]
pub struct Upload {
    file_name: String,
    extension: ModelExtension,
    bytes: Vec<u8>,
}

impl Upload {
    /// Validate an upload.
    ///
    /// Checks run in this order: filename present, suffix recognized,
    /// payload within [`MAX_UPLOAD_BYTES`], payload non-empty. Nothing is
    /// hashed until all of them pass.
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Result<Self, ValidationError> {
        let file_name = file_name.into();
        if file_name.is_empty() {
            return Err(ValidationError::EmptyFilename);
        }
        let extension = ModelExtension::from_file_name(&file_name)?;
        if bytes.len() > MAX_UPLOAD_BYTES {
            return Err(ValidationError::FileTooLarge {
                size: bytes.len(),
                max: MAX_UPLOAD_BYTES,
            });
        }
        if bytes.is_empty() {
            return Err(ValidationError::EmptyFile);
        }
        Ok(Self {
            file_name,
            extension,
            bytes,
        })
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// File name without directories or suffix, used for download hints.
    pub fn stem(&self) -> &str {
        Path::new(&self.file_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("model")
    }

    pub fn extension(&self) -> ModelExtension {
        self.extension
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Content identity of the payload. The filename does not participate.
    pub fn identity(&self) -> SourceIdentity {
        SourceIdentity::Content(sha256_digest(&self.bytes))
    }
}

/// A model to convert, normalized from either request framing.
#[derive(Debug, Clone)]
pub enum SourceFile {
    /// Bytes uploaded with the request.
    Upload(Upload),
    /// A file that already lives on the server filesystem.
    ServerPath {
        path: PathBuf,
        extension: ModelExtension,
    },
}

impl SourceFile {
    /// Validate an upload and wrap it.
    pub fn upload(file_name: impl Into<String>, bytes: Vec<u8>) -> Result<Self, ValidationError> {
        Upload::new(file_name, bytes).map(Self::Upload)
    }

    /// Validate a server path reference. Existence is checked later, by
    /// whoever has filesystem access.
    pub fn server_path(path: impl Into<PathBuf>) -> Result<Self, ValidationError> {
        let path = path.into();
        if path.as_os_str().is_empty() {
            return Err(ValidationError::MissingPath);
        }
        let extension = ModelExtension::from_file_name(&path.to_string_lossy())?;
        Ok(Self::ServerPath { path, extension })
    }

    pub fn extension(&self) -> ModelExtension {
        match self {
            Self::Upload(upload) => upload.extension(),
            Self::ServerPath { extension, .. } => *extension,
        }
    }

    /// Short human label for logs.
    pub fn describe(&self) -> String {
        match self {
            Self::Upload(upload) => format!("upload:{}", upload.file_name()),
            Self::ServerPath { path, .. } => format!("path:{}", path.display()),
        }
    }
}

/// What a cache key is derived from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceIdentity {
    /// Digest of the uploaded bytes.
    Content(ContentDigest),
    /// Digest of the path string plus the file's modification time.
    ///
    /// Editing the referenced file changes `modified_nanos` and therefore
    /// the key; stale entries are simply never looked up again.
    Path {
        path_digest: ContentDigest,
        modified_nanos: u128,
    },
}

impl SourceIdentity {
    /// Identity of a server path as of the given modification time.
    pub fn for_path(path: &Path, modified: SystemTime) -> Self {
        let modified_nanos = modified
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        Self::Path {
            path_digest: sha256_digest(path.to_string_lossy().as_bytes()),
            modified_nanos,
        }
    }

    /// The source segment(s) of a cache key.
    pub fn key_prefix(&self) -> String {
        match self {
            Self::Content(digest) => digest.to_hex(),
            Self::Path {
                path_digest,
                modified_nanos,
            } => format!("{}_{modified_nanos}", path_digest.to_hex()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn extension_is_case_insensitive() {
        assert_eq!(ModelExtension::from_file_name("part.STEP"), Ok(ModelExtension::Step));
        assert_eq!(ModelExtension::from_file_name("a.b.stp"), Ok(ModelExtension::Stp));
    }

    #[test]
    fn extension_rejects_other_suffixes() {
        assert_eq!(
            ModelExtension::from_file_name("model.txt"),
            Err(ValidationError::UnsupportedExtension(".txt".into()))
        );
        assert_eq!(
            ModelExtension::from_file_name("README"),
            Err(ValidationError::UnsupportedExtension(String::new()))
        );
    }

    #[test]
    fn upload_validation_order() {
        assert_eq!(Upload::new("", vec![1]).unwrap_err(), ValidationError::EmptyFilename);
        assert!(matches!(
            Upload::new("x.txt", Vec::new()).unwrap_err(),
            ValidationError::UnsupportedExtension(_)
        ));
        assert_eq!(Upload::new("x.step", Vec::new()).unwrap_err(), ValidationError::EmptyFile);
    }

    #[test]
    fn upload_rejects_oversized_payload() {
        let err = Upload::new("big.stp", vec![0u8; MAX_UPLOAD_BYTES + 1]).unwrap_err();
        assert_eq!(
            err,
            ValidationError::FileTooLarge {
                size: MAX_UPLOAD_BYTES + 1,
                max: MAX_UPLOAD_BYTES
            }
        );
    }

    #[test]
    fn upload_identity_ignores_filename() {
        let a = Upload::new("a.step", b"solid".to_vec()).unwrap();
        let b = Upload::new("other-name.STP", b"solid".to_vec()).unwrap();
        assert_eq!(a.identity(), b.identity());
    }

    #[test]
    fn upload_stem() {
        let u = Upload::new("bracket.v2.step", b"x".to_vec()).unwrap();
        assert_eq!(u.stem(), "bracket.v2");
    }

    #[test]
    fn server_path_requires_path_and_extension() {
        assert_eq!(SourceFile::server_path("").unwrap_err(), ValidationError::MissingPath);
        assert!(SourceFile::server_path("/data/part.igs").is_err());
        let src = SourceFile::server_path("/data/part.step").unwrap();
        assert_eq!(src.extension(), ModelExtension::Step);
    }

    #[test]
    fn path_identity_tracks_mtime() {
        let path = Path::new("/data/part.step");
        let t0 = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
        let t1 = t0 + Duration::from_nanos(1);
        assert_eq!(SourceIdentity::for_path(path, t0), SourceIdentity::for_path(path, t0));
        assert_ne!(SourceIdentity::for_path(path, t0), SourceIdentity::for_path(path, t1));
    }

    #[test]
    fn path_key_prefix_contains_mtime() {
        let t = UNIX_EPOCH + Duration::from_secs(2);
        let id = SourceIdentity::for_path(Path::new("/p.stp"), t);
        assert!(id.key_prefix().ends_with("_2000000000"));
    }
}
