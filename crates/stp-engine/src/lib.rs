//! # stp-engine: Geometry Engine Seam
//!
//! The service does no geometry work of its own. Everything that touches
//! STEP parsing, B-rep reconstruction, projection, or tessellation sits
//! behind the [`GeometryEngine`] trait.
//!
//! - [`CommandEngine`]: runs an external converter program per call, with
//!   a hard timeout.
//! - [`MockEngine`]: deterministic, call-counting double with failure
//!   injection, for orchestrator and HTTP tests.
//! - [`svg`]: projection options and the `viewBox` post-processing step.
//!
//! Engine calls are synchronous and may take seconds. Async callers must
//! run them on a blocking worker.

pub mod command;
pub mod mock;
pub mod svg;
pub mod traits;

pub use command::CommandEngine;
pub use mock::MockEngine;
pub use svg::{ensure_view_box, SvgOptions};
pub use traits::{EngineError, GeometryEngine};
