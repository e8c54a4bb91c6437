//! # Mock Geometry Engine
//!
//! Deterministic stand-in for a CAD kernel. Output depends only on the
//! input bytes and the requested parameters, so repeated calls with the
//! same input produce identical artifacts. Every call is counted and the
//! last input path is recorded, which lets tests assert that cache hits
//! skip the engine and that staged inputs were cleaned up.
//!
//! The SVG it emits deliberately has no `viewBox`.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use parking_lot::Mutex;
use stp_core::{sha256_digest, Tolerance};

use crate::svg::SvgOptions;
use crate::traits::{EngineError, GeometryEngine};

#[derive(Debug, Default)]
pub struct MockEngine {
    svg_calls: AtomicUsize,
    stl_calls: AtomicUsize,
    failure: Mutex<Option<String>>,
    empty_mesh: AtomicBool,
    last_input: Mutex<Option<PathBuf>>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with `message`.
    pub fn fail_with(&self, message: impl Into<String>) {
        *self.failure.lock() = Some(message.into());
    }

    /// Undo [`fail_with`](Self::fail_with).
    pub fn recover(&self) {
        *self.failure.lock() = None;
    }

    /// Make `export_stl` succeed without writing any bytes.
    pub fn emit_empty_mesh(&self, empty: bool) {
        self.empty_mesh.store(empty, Ordering::SeqCst);
    }

    pub fn svg_calls(&self) -> usize {
        self.svg_calls.load(Ordering::SeqCst)
    }

    pub fn stl_calls(&self) -> usize {
        self.stl_calls.load(Ordering::SeqCst)
    }

    /// Total engine invocations of either kind.
    pub fn calls(&self) -> usize {
        self.svg_calls() + self.stl_calls()
    }

    /// The input path of the most recent call.
    pub fn last_input(&self) -> Option<PathBuf> {
        self.last_input.lock().clone()
    }

    fn load(&self, input: &Path) -> Result<Vec<u8>, EngineError> {
        *self.last_input.lock() = Some(input.to_path_buf());
        if let Some(message) = self.failure.lock().clone() {
            return Err(EngineError::Failed(message));
        }
        Ok(std::fs::read(input)?)
    }
}

impl GeometryEngine for MockEngine {
    fn render_svg(&self, input: &Path, options: &SvgOptions) -> Result<String, EngineError> {
        self.svg_calls.fetch_add(1, Ordering::SeqCst);
        let model = self.load(input)?;
        Ok(format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{}" height="{}"><desc>{}</desc><path d="M0,0 L{},{}"/></svg>"#,
            options.width,
            options.height,
            sha256_digest(&model).to_hex(),
            options.width,
            options.height,
        ))
    }

    fn export_stl(
        &self,
        input: &Path,
        tolerance: Tolerance,
        output: &Path,
    ) -> Result<(), EngineError> {
        self.stl_calls.fetch_add(1, Ordering::SeqCst);
        let model = self.load(input)?;
        if self.empty_mesh.load(Ordering::SeqCst) {
            return Ok(());
        }
        // 80-byte header followed by a zero triangle count.
        let mut stl = format!("mock {} t{tolerance}", sha256_digest(&model).to_hex()).into_bytes();
        stl.resize(80, b' ');
        stl.extend_from_slice(&0u32.to_le_bytes());
        std::fs::write(output, stl)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stp_core::PreviewSize;

    #[test]
    fn counts_calls_and_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("m.step");
        std::fs::write(&input, b"ISO-10303-21;").unwrap();
        let engine = MockEngine::new();
        let opts = SvgOptions::thumbnail(PreviewSize::default());

        let a = engine.render_svg(&input, &opts).unwrap();
        let b = engine.render_svg(&input, &opts).unwrap();
        assert_eq!(a, b);
        assert!(!a.contains("viewBox"));
        assert_eq!(engine.svg_calls(), 2);
        assert_eq!(engine.last_input().as_deref(), Some(input.as_path()));
    }

    #[test]
    fn failure_injection() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("m.step");
        std::fs::write(&input, b"x").unwrap();
        let engine = MockEngine::new();
        engine.fail_with("bad geometry");

        let err = engine
            .export_stl(&input, Tolerance::default(), &dir.path().join("o.stl"))
            .unwrap_err();
        assert_eq!(err.to_string(), "bad geometry");
        assert_eq!(engine.stl_calls(), 1);

        engine.recover();
        engine
            .export_stl(&input, Tolerance::default(), &dir.path().join("o.stl"))
            .unwrap();
        assert_eq!(std::fs::metadata(dir.path().join("o.stl")).unwrap().len(), 84);
    }
}
