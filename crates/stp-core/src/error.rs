//! # Validation Errors
//!
//! Client-caused request problems. These never touch the cache or the
//! geometry engine and map to HTTP 400 at the transport boundary.

use thiserror::Error;

/// A request was rejected before any staging or engine work.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// The multipart form carried no `file` field.
    #[error("No file uploaded")]
    MissingFile,

    /// The uploaded file field had an empty filename.
    #[error("Empty filename")]
    EmptyFilename,

    /// The file suffix is not a recognized STEP suffix.
    #[error("Unsupported file type: {0}, expected .stp or .step")]
    UnsupportedExtension(String),

    /// The uploaded payload was zero bytes long.
    #[error("Empty file")]
    EmptyFile,

    /// The uploaded payload exceeded the upload limit.
    #[error("File too large: {size} bytes, max {max}")]
    FileTooLarge {
        /// Observed size (a lower bound when the stream was cut short).
        size: usize,
        /// Configured maximum.
        max: usize,
    },

    /// The request body as a whole exceeded the transport limit.
    #[error("File too large: request body exceeds {max} bytes")]
    BodyTooLarge {
        /// Transport body limit.
        max: usize,
    },

    /// A JSON request omitted `path`.
    #[error("Missing 'path' in request body")]
    MissingPath,

    /// Width or height outside `1..=MAX_DIMENSION`.
    #[error("Invalid {name}: {value}, expected 1..={max}")]
    InvalidDimension {
        /// `"width"` or `"height"`.
        name: &'static str,
        /// The rejected value.
        value: i64,
        /// Upper bound.
        max: u32,
    },

    /// Tolerance not finite or not positive.
    #[error("Invalid tolerance: {0}, expected a finite value > 0")]
    InvalidTolerance(f64),

    /// Malformed form field or body.
    #[error("Invalid request: {0}")]
    Malformed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_extension_message() {
        let err = ValidationError::UnsupportedExtension(".txt".into());
        assert_eq!(
            err.to_string(),
            "Unsupported file type: .txt, expected .stp or .step"
        );
    }

    #[test]
    fn too_large_message() {
        let err = ValidationError::FileTooLarge { size: 60, max: 50 };
        assert_eq!(err.to_string(), "File too large: 60 bytes, max 50");
    }

    #[test]
    fn missing_path_message() {
        assert_eq!(
            ValidationError::MissingPath.to_string(),
            "Missing 'path' in request body"
        );
    }
}
