//! # Request Orchestration
//!
//! Turns a validated [`SourceFile`] plus output parameters into a cached
//! artifact:
//!
//! ```text
//! identify source → derive CacheKey → lookup ─ hit ──────────────→ Rendered(Hit)
//!                                         └─ miss → stage input → engine → store → Rendered(Miss)
//! ```
//!
//! Everything here is synchronous and may block for as long as the engine
//! takes. Handlers call it through `tokio::task::spawn_blocking`.
//!
//! ## Staging
//!
//! Uploads are written to a private temp file that exists only while the
//! engine runs; the [`StagedInput`] guard deletes it on every exit path.
//! Server paths are handed to the engine in place. Meshes are written by
//! the engine straight into a [`PendingArtifact`](stp_cache::PendingArtifact)
//! inside the cache root, so large STL files are never copied.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use stp_cache::{CacheError, CacheKey, CachedArtifact, ContentCache};
use stp_core::{
    ArtifactKind, OutputParams, PreviewSize, SourceFile, SourceIdentity, Tolerance,
    ValidationError,
};
use stp_engine::{ensure_view_box, EngineError, GeometryEngine, SvgOptions};
use tempfile::NamedTempFile;
use thiserror::Error;

/// Whether an artifact came from the cache or was produced for this request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
}

impl CacheStatus {
    /// Value of the `X-Cache` response header.
    pub fn as_header(&self) -> &'static str {
        match self {
            Self::Hit => "HIT",
            Self::Miss => "MISS",
        }
    }

    /// Label value for cache metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            Self::Hit => "hit",
            Self::Miss => "miss",
        }
    }
}

/// A committed artifact and how it was obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    pub artifact: CachedArtifact,
    pub cache: CacheStatus,
}

/// Orchestration failure, classified for the transport layer.
#[derive(Error, Debug)]
pub enum OrchestratorError {
    /// The request itself is unacceptable.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A server path does not name a readable regular file.
    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The geometry engine failed. Nothing was cached.
    #[error("{}: {source}", failure_prefix(.kind))]
    Generation {
        kind: ArtifactKind,
        source: EngineError,
    },

    /// The cache or staging area could not be written.
    #[error(transparent)]
    Storage(#[from] CacheError),
}

fn failure_prefix(kind: &ArtifactKind) -> &'static str {
    match kind {
        ArtifactKind::Preview => "Failed to process STEP file",
        ArtifactKind::Mesh => "Failed to convert",
    }
}

impl OrchestratorError {
    fn generation(kind: ArtifactKind, source: EngineError) -> Self {
        Self::Generation { kind, source }
    }

    fn staging(err: std::io::Error) -> Self {
        Self::Storage(CacheError::Io(err))
    }
}

/// The model file handed to the engine.
#[derive(Debug)]
pub enum StagedInput<'a> {
    /// An upload copied to a scratch file, removed on drop.
    Scratch(NamedTempFile),
    /// A server path used as-is.
    InPlace(&'a Path),
}

impl StagedInput<'_> {
    pub fn path(&self) -> &Path {
        match self {
            Self::Scratch(file) => file.path(),
            Self::InPlace(path) => path,
        }
    }
}

/// Cache-first driver around a [`GeometryEngine`].
pub struct Orchestrator {
    cache: ContentCache,
    engine: Arc<dyn GeometryEngine>,
    staging_dir: Option<PathBuf>,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("cache", &self.cache)
            .field("staging_dir", &self.staging_dir)
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    pub fn new(cache: ContentCache, engine: Arc<dyn GeometryEngine>) -> Self {
        Self {
            cache,
            engine,
            staging_dir: None,
        }
    }

    /// Stage uploads under `dir` instead of the system temp directory.
    pub fn with_staging_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.staging_dir = Some(dir.into());
        self
    }

    pub fn cache(&self) -> &ContentCache {
        &self.cache
    }

    /// Produce (or fetch) the SVG thumbnail of `source` at `size`.
    pub fn render_preview(
        &self,
        source: &SourceFile,
        size: PreviewSize,
    ) -> Result<Rendered, OrchestratorError> {
        let identity = self.identify(source)?;
        let key = CacheKey::new(&identity, &OutputParams::Preview(size));
        if let Some(artifact) = self.cache.lookup(&key) {
            tracing::debug!(key = %key, source = %source.describe(), "preview cache hit");
            return Ok(Rendered {
                artifact,
                cache: CacheStatus::Hit,
            });
        }

        let started = Instant::now();
        let input = self.stage_input(source)?;
        let svg = self
            .engine
            .render_svg(input.path(), &SvgOptions::thumbnail(size))
            .map_err(|e| OrchestratorError::generation(ArtifactKind::Preview, e))?;
        let svg = ensure_view_box(&svg, size.width(), size.height());
        let artifact = self.cache.store(&key, svg.as_bytes())?;

        tracing::info!(
            key = %key,
            source = %source.describe(),
            len = artifact.len,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "preview rendered"
        );
        Ok(Rendered {
            artifact,
            cache: CacheStatus::Miss,
        })
    }

    /// Produce (or fetch) the binary STL mesh of `source` at `tolerance`.
    pub fn convert_to_mesh(
        &self,
        source: &SourceFile,
        tolerance: Tolerance,
    ) -> Result<Rendered, OrchestratorError> {
        let identity = self.identify(source)?;
        let key = CacheKey::new(&identity, &OutputParams::Mesh(tolerance));
        if let Some(artifact) = self.cache.lookup(&key) {
            tracing::debug!(key = %key, source = %source.describe(), "mesh cache hit");
            return Ok(Rendered {
                artifact,
                cache: CacheStatus::Hit,
            });
        }

        let started = Instant::now();
        let input = self.stage_input(source)?;
        let pending = self.cache.stage(&key)?;
        self.engine
            .export_stl(input.path(), tolerance, pending.path())
            .map_err(|e| OrchestratorError::generation(ArtifactKind::Mesh, e))?;
        let artifact = pending.commit().map_err(|e| match e {
            CacheError::EmptyArtifact(_) => OrchestratorError::generation(
                ArtifactKind::Mesh,
                EngineError::InvalidOutput("engine produced an empty mesh".into()),
            ),
            other => OrchestratorError::Storage(other),
        })?;

        tracing::info!(
            key = %key,
            source = %source.describe(),
            len = artifact.len,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "mesh exported"
        );
        Ok(Rendered {
            artifact,
            cache: CacheStatus::Miss,
        })
    }

    /// Derive the identity a cache key is built from.
    ///
    /// Server paths must name an existing regular file; anything else,
    /// including an unreadable one, is reported as not found.
    fn identify(&self, source: &SourceFile) -> Result<SourceIdentity, OrchestratorError> {
        match source {
            SourceFile::Upload(upload) => Ok(upload.identity()),
            SourceFile::ServerPath { path, .. } => {
                let meta = match fs::metadata(path) {
                    Ok(meta) if meta.is_file() => meta,
                    _ => return Err(OrchestratorError::NotFound(path.clone())),
                };
                let modified = meta.modified().map_err(OrchestratorError::staging)?;
                Ok(SourceIdentity::for_path(path, modified))
            }
        }
    }

    fn stage_input<'a>(&self, source: &'a SourceFile) -> Result<StagedInput<'a>, OrchestratorError> {
        match source {
            SourceFile::ServerPath { path, .. } => Ok(StagedInput::InPlace(path)),
            SourceFile::Upload(upload) => {
                let mut builder = tempfile::Builder::new();
                builder
                    .prefix("stp-upload-")
                    .suffix(upload.extension().as_suffix());
                let mut file = match &self.staging_dir {
                    Some(dir) => {
                        fs::create_dir_all(dir).map_err(OrchestratorError::staging)?;
                        builder.tempfile_in(dir)
                    }
                    None => builder.tempfile(),
                }
                .map_err(OrchestratorError::staging)?;
                file.write_all(upload.bytes())
                    .and_then(|()| file.flush())
                    .map_err(OrchestratorError::staging)?;
                Ok(StagedInput::Scratch(file))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stp_engine::MockEngine;

    const MODEL: &[u8] = b"ISO-10303-21;\nHEADER;\nENDSEC;\nDATA;\nENDSEC;\nEND-ISO-10303-21;\n";

    struct Fixture {
        root: tempfile::TempDir,
        staging: PathBuf,
        engine: Arc<MockEngine>,
        orchestrator: Orchestrator,
    }

    fn fixture() -> Fixture {
        let root = tempfile::tempdir().unwrap();
        let staging = root.path().join("staging");
        let engine = Arc::new(MockEngine::new());
        let orchestrator = Orchestrator::new(ContentCache::new(root.path().join("cache")), engine.clone())
            .with_staging_dir(&staging);
        Fixture {
            root,
            staging,
            engine,
            orchestrator,
        }
    }

    fn staging_is_empty(dir: &Path) -> bool {
        match fs::read_dir(dir) {
            Ok(mut entries) => entries.next().is_none(),
            Err(_) => true,
        }
    }

    #[test]
    fn preview_miss_then_hit() {
        let fx = fixture();
        let source = SourceFile::upload("part.step", MODEL.to_vec()).unwrap();

        let first = fx.orchestrator.render_preview(&source, PreviewSize::default()).unwrap();
        assert_eq!(first.cache, CacheStatus::Miss);
        let second = fx.orchestrator.render_preview(&source, PreviewSize::default()).unwrap();
        assert_eq!(second.cache, CacheStatus::Hit);

        assert_eq!(fx.engine.svg_calls(), 1);
        assert_eq!(first.artifact.path, second.artifact.path);
        assert!(first.artifact.key.as_str().ends_with("_400x300.svg"));
    }

    #[test]
    fn preview_gets_view_box() {
        let fx = fixture();
        let source = SourceFile::upload("part.stp", MODEL.to_vec()).unwrap();
        let size = PreviewSize::new(Some(640), Some(480)).unwrap();

        let rendered = fx.orchestrator.render_preview(&source, size).unwrap();
        let svg = fs::read_to_string(&rendered.artifact.path).unwrap();
        assert_eq!(svg.matches("viewBox=").count(), 1);
        assert!(svg.contains(r#"viewBox="0 0 640 480""#));
    }

    #[test]
    fn upload_filename_does_not_affect_key() {
        let fx = fixture();
        let a = SourceFile::upload("a.step", MODEL.to_vec()).unwrap();
        let b = SourceFile::upload("B.STP", MODEL.to_vec()).unwrap();

        fx.orchestrator.render_preview(&a, PreviewSize::default()).unwrap();
        let second = fx.orchestrator.render_preview(&b, PreviewSize::default()).unwrap();
        assert_eq!(second.cache, CacheStatus::Hit);
        assert_eq!(fx.engine.svg_calls(), 1);
    }

    #[test]
    fn dimensions_produce_distinct_entries() {
        let fx = fixture();
        let source = SourceFile::upload("part.step", MODEL.to_vec()).unwrap();

        let small = fx
            .orchestrator
            .render_preview(&source, PreviewSize::new(Some(200), Some(150)).unwrap())
            .unwrap();
        let large = fx
            .orchestrator
            .render_preview(&source, PreviewSize::new(Some(800), Some(600)).unwrap())
            .unwrap();
        assert_ne!(small.artifact.key, large.artifact.key);
        assert_eq!(fx.engine.svg_calls(), 2);
    }

    #[test]
    fn staged_upload_is_removed() {
        let fx = fixture();
        let source = SourceFile::upload("part.step", MODEL.to_vec()).unwrap();

        fx.orchestrator.render_preview(&source, PreviewSize::default()).unwrap();
        let staged = fx.engine.last_input().unwrap();
        assert!(staged.starts_with(&fx.staging));
        assert!(!staged.exists());
        assert!(staging_is_empty(&fx.staging));
    }

    #[test]
    fn failure_is_not_cached_and_cleans_up() {
        let fx = fixture();
        let source = SourceFile::upload("part.step", MODEL.to_vec()).unwrap();
        fx.engine.fail_with("no shapes found");

        let err = fx
            .orchestrator
            .render_preview(&source, PreviewSize::default())
            .unwrap_err();
        assert_eq!(err.to_string(), "Failed to process STEP file: no shapes found");
        assert!(staging_is_empty(&fx.staging));
        assert_eq!(fx.orchestrator.cache().stats().unwrap().entries, 0);

        fx.engine.recover();
        let retry = fx.orchestrator.render_preview(&source, PreviewSize::default()).unwrap();
        assert_eq!(retry.cache, CacheStatus::Miss);
        assert_eq!(fx.engine.svg_calls(), 2);
    }

    #[test]
    fn server_path_is_used_in_place() {
        let fx = fixture();
        let model = fx.root.path().join("bracket.step");
        fs::write(&model, MODEL).unwrap();
        let source = SourceFile::server_path(&model).unwrap();

        let rendered = fx.orchestrator.render_preview(&source, PreviewSize::default()).unwrap();
        assert_eq!(fx.engine.last_input().unwrap(), model);
        assert!(model.exists());
        let parts: Vec<&str> = rendered.artifact.key.as_str().split('_').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[2], "400x300.svg");
    }

    #[test]
    fn missing_server_path_is_not_found() {
        let fx = fixture();
        let source = SourceFile::server_path("/nonexistent/missing.step").unwrap();

        let err = fx
            .orchestrator
            .render_preview(&source, PreviewSize::default())
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::NotFound(_)));
        assert_eq!(err.to_string(), "File not found: /nonexistent/missing.step");
        assert_eq!(fx.engine.calls(), 0);
    }

    #[test]
    fn directory_path_is_not_found() {
        let fx = fixture();
        let dir = fx.root.path().join("assembly.step");
        fs::create_dir(&dir).unwrap();
        let source = SourceFile::server_path(&dir).unwrap();

        let err = fx
            .orchestrator
            .convert_to_mesh(&source, Tolerance::default())
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::NotFound(_)));
    }

    #[test]
    fn mesh_miss_then_hit() {
        let fx = fixture();
        let source = SourceFile::upload("part.step", MODEL.to_vec()).unwrap();

        let first = fx.orchestrator.convert_to_mesh(&source, Tolerance::default()).unwrap();
        let second = fx.orchestrator.convert_to_mesh(&source, Tolerance::default()).unwrap();
        assert_eq!(first.cache, CacheStatus::Miss);
        assert_eq!(second.cache, CacheStatus::Hit);
        assert_eq!(fx.engine.stl_calls(), 1);
        assert!(first.artifact.key.as_str().ends_with("_t0.1.stl"));
        assert!(first.artifact.len >= 84);
    }

    #[test]
    fn mesh_tolerance_changes_key() {
        let fx = fixture();
        let source = SourceFile::upload("part.step", MODEL.to_vec()).unwrap();

        let coarse = fx
            .orchestrator
            .convert_to_mesh(&source, Tolerance::new(Some(0.5)).unwrap())
            .unwrap();
        let fine = fx
            .orchestrator
            .convert_to_mesh(&source, Tolerance::new(Some(0.01)).unwrap())
            .unwrap();
        assert_ne!(coarse.artifact.key, fine.artifact.key);
        assert_eq!(fx.engine.stl_calls(), 2);
    }

    #[test]
    fn empty_mesh_is_a_generation_failure() {
        let fx = fixture();
        let source = SourceFile::upload("part.step", MODEL.to_vec()).unwrap();
        fx.engine.emit_empty_mesh(true);

        let err = fx
            .orchestrator
            .convert_to_mesh(&source, Tolerance::default())
            .unwrap_err();
        assert!(matches!(
            err,
            OrchestratorError::Generation {
                kind: ArtifactKind::Mesh,
                ..
            }
        ));
        assert!(err.to_string().starts_with("Failed to convert: "));
        assert_eq!(fx.orchestrator.cache().stats().unwrap().entries, 0);
    }

    #[test]
    fn mesh_failure_leaves_no_staging_file() {
        let fx = fixture();
        let source = SourceFile::upload("part.step", MODEL.to_vec()).unwrap();
        fx.engine.fail_with("tessellation failed");

        let err = fx
            .orchestrator
            .convert_to_mesh(&source, Tolerance::default())
            .unwrap_err();
        assert_eq!(err.to_string(), "Failed to convert: tessellation failed");
        let leftovers: Vec<_> = fs::read_dir(fx.orchestrator.cache().root())
            .unwrap()
            .collect();
        assert!(leftovers.is_empty());
        assert!(fx.engine.last_input().unwrap().starts_with(&fx.staging));
        assert!(staging_is_empty(&fx.staging));
    }
}
