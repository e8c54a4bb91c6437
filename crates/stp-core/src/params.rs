//! # Output Parameters
//!
//! Normalized parameters of one conversion. The artifact kind is carried by
//! the [`OutputParams`] variant, so a preview size can never be paired with
//! a mesh suffix in a cache key.

use crate::error::ValidationError;

/// Preview width used when the request does not specify one.
pub const DEFAULT_WIDTH: u32 = 400;

/// Preview height used when the request does not specify one.
pub const DEFAULT_HEIGHT: u32 = 300;

/// Largest accepted preview width or height.
pub const MAX_DIMENSION: u32 = 8192;

/// Tessellation tolerance used when the request does not specify one.
pub const DEFAULT_TOLERANCE: f64 = 0.1;

/// The kind of artifact a conversion produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    /// 2D SVG projection.
    Preview,
    /// Binary STL mesh.
    Mesh,
}

impl ArtifactKind {
    /// File suffix used for cache keys, including the dot.
    pub fn suffix(&self) -> &'static str {
        match self {
            Self::Preview => ".svg",
            Self::Mesh => ".stl",
        }
    }

    /// HTTP content type of the artifact.
    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Preview => "image/svg+xml",
            Self::Mesh => "application/sla",
        }
    }

    /// Label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Preview => "preview",
            Self::Mesh => "mesh",
        }
    }
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pixel dimensions of a preview image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PreviewSize {
    width: u32,
    height: u32,
}

impl PreviewSize {
    /// Validate optional request dimensions, falling back to 400x300.
    pub fn new(width: Option<i64>, height: Option<i64>) -> Result<Self, ValidationError> {
        Ok(Self {
            width: dimension("width", width, DEFAULT_WIDTH)?,
            height: dimension("height", height, DEFAULT_HEIGHT)?,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }
}

impl Default for PreviewSize {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
        }
    }
}

fn dimension(name: &'static str, value: Option<i64>, default: u32) -> Result<u32, ValidationError> {
    match value {
        None => Ok(default),
        Some(v) if v >= 1 && v <= i64::from(MAX_DIMENSION) => Ok(v as u32),
        Some(v) => Err(ValidationError::InvalidDimension {
            name,
            value: v,
            max: MAX_DIMENSION,
        }),
    }
}

/// Maximum deviation between a surface and its triangulated approximation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerance(f64);

impl Tolerance {
    /// Validate an optional tolerance, falling back to 0.1.
    pub fn new(value: Option<f64>) -> Result<Self, ValidationError> {
        let v = value.unwrap_or(DEFAULT_TOLERANCE);
        if !v.is_finite() || v <= 0.0 {
            return Err(ValidationError::InvalidTolerance(v));
        }
        Ok(Self(v))
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Self(DEFAULT_TOLERANCE)
    }
}

/// Shortest round-trip rendering, so distinct tolerances never share text.
impl std::fmt::Display for Tolerance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Output parameters of a single conversion request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutputParams {
    /// SVG preview at the given size.
    Preview(PreviewSize),
    /// STL mesh at the given tolerance.
    Mesh(Tolerance),
}

impl OutputParams {
    pub fn kind(&self) -> ArtifactKind {
        match self {
            Self::Preview(_) => ArtifactKind::Preview,
            Self::Mesh(_) => ArtifactKind::Mesh,
        }
    }

    /// The parameter segment of a cache key: `400x300` or `t0.1`.
    pub fn key_segment(&self) -> String {
        match self {
            Self::Preview(size) => format!("{}x{}", size.width(), size.height()),
            Self::Mesh(tolerance) => format!("t{tolerance}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_defaults() {
        let size = PreviewSize::new(None, None).unwrap();
        assert_eq!((size.width(), size.height()), (400, 300));
        assert_eq!(size, PreviewSize::default());
    }

    #[test]
    fn preview_rejects_zero_and_oversized() {
        assert!(matches!(
            PreviewSize::new(Some(0), None),
            Err(ValidationError::InvalidDimension { name: "width", .. })
        ));
        assert!(matches!(
            PreviewSize::new(None, Some(i64::from(MAX_DIMENSION) + 1)),
            Err(ValidationError::InvalidDimension { name: "height", .. })
        ));
        assert!(PreviewSize::new(Some(-5), None).is_err());
    }

    #[test]
    fn tolerance_default_and_validation() {
        assert_eq!(Tolerance::new(None).unwrap().value(), 0.1);
        assert!(Tolerance::new(Some(0.0)).is_err());
        assert!(Tolerance::new(Some(-0.5)).is_err());
        assert!(Tolerance::new(Some(f64::NAN)).is_err());
        assert!(Tolerance::new(Some(f64::INFINITY)).is_err());
    }

    #[test]
    fn key_segments() {
        let preview = OutputParams::Preview(PreviewSize::default());
        assert_eq!(preview.key_segment(), "400x300");
        assert_eq!(preview.kind(), ArtifactKind::Preview);

        let mesh = OutputParams::Mesh(Tolerance::new(Some(0.01)).unwrap());
        assert_eq!(mesh.key_segment(), "t0.01");
        assert_eq!(mesh.kind(), ArtifactKind::Mesh);
    }

    #[test]
    fn artifact_kind_wire_values() {
        assert_eq!(ArtifactKind::Preview.content_type(), "image/svg+xml");
        assert_eq!(ArtifactKind::Mesh.content_type(), "application/sla");
        assert_eq!(ArtifactKind::Mesh.suffix(), ".stl");
    }
}
