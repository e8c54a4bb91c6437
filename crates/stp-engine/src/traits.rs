//! # Geometry Engine Trait
//!
//! Implementations must be `Send + Sync`: one engine handle is shared by
//! every in-flight request.

use std::path::Path;
use std::time::Duration;

use stp_core::Tolerance;
use thiserror::Error;

use crate::svg::SvgOptions;

/// Failure inside the geometry engine. Never cached.
#[derive(Error, Debug)]
pub enum EngineError {
    /// The engine rejected the model (malformed geometry, unsupported entities).
    #[error("{0}")]
    Failed(String),

    /// The engine did not finish within its time budget.
    #[error("geometry engine timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    /// The engine process could not be started.
    #[error("failed to launch geometry engine {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The engine produced output that could not be used.
    #[error("geometry engine produced invalid output: {0}")]
    InvalidOutput(String),

    /// I/O around the engine call (scratch files, pipes).
    #[error("geometry engine I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A CAD geometry kernel: loads a STEP model and projects or tessellates it.
pub trait GeometryEngine: Send + Sync {
    /// Load the model at `input` and return an SVG projection of it.
    fn render_svg(&self, input: &Path, options: &SvgOptions) -> Result<String, EngineError>;

    /// Load the model at `input` and write a binary STL mesh to `output`.
    fn export_stl(
        &self,
        input: &Path,
        tolerance: Tolerance,
        output: &Path,
    ) -> Result<(), EngineError>;
}
