//! # Route Handlers
//!
//! Handlers only translate HTTP framing into a [`SourceFile`] plus output
//! parameters, run the orchestrator on the blocking pool, and stream the
//! resulting artifact back. They never decide cache or engine behavior.
//!
//! [`SourceFile`]: stp_core::SourceFile

pub mod convert;
pub mod health;
pub mod thumbnail;

use std::collections::HashMap;
use std::time::Instant;

use axum::body::Body;
use axum::extract::multipart::{Multipart, MultipartError};
use axum::extract::rejection::JsonRejection;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::Response;
use axum::Router;
use stp_core::{ArtifactKind, SourceFile, ValidationError, MAX_UPLOAD_BYTES};
use tokio_util::io::ReaderStream;

use crate::error::AppError;
use crate::orchestration::{Orchestrator, OrchestratorError, Rendered};
use crate::state::AppState;

/// Response header reporting whether the artifact was served from cache.
pub const X_CACHE: &str = "x-cache";

/// All artifact and health routes.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(thumbnail::router())
        .merge(convert::router())
}

/// Run one orchestration on the blocking pool and record its outcome.
pub(crate) async fn orchestrate<F>(
    state: &AppState,
    kind: ArtifactKind,
    job: F,
) -> Result<Rendered, AppError>
where
    F: FnOnce(&Orchestrator) -> Result<Rendered, OrchestratorError> + Send + 'static,
{
    let orchestrator = state.orchestrator.clone();
    let started = Instant::now();
    let outcome = tokio::task::spawn_blocking(move || job(&orchestrator))
        .await
        .map_err(|e| AppError::Internal(format!("orchestration task failed: {e}")))?;

    match &outcome {
        Ok(rendered) => {
            state
                .metrics
                .record_lookup(kind, rendered.cache, started.elapsed().as_secs_f64())
        }
        Err(OrchestratorError::Generation { .. }) => state.metrics.record_engine_failure(kind),
        Err(_) => {}
    }
    Ok(outcome?)
}

/// Stream a cached artifact from disk.
///
/// `disposition` is the full `Content-Disposition` value.
pub(crate) async fn artifact_response(
    rendered: Rendered,
    disposition: String,
) -> Result<Response, AppError> {
    let Rendered { artifact, cache } = rendered;
    let file = tokio::fs::File::open(&artifact.path)
        .await
        .map_err(|e| AppError::Internal(format!("open {}: {e}", artifact.path.display())))?;
    let len = file
        .metadata()
        .await
        .map_err(|e| AppError::Internal(format!("stat {}: {e}", artifact.path.display())))?
        .len();

    let disposition = HeaderValue::from_str(&disposition)
        .map_err(|e| AppError::Internal(format!("invalid Content-Disposition: {e}")))?;

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, artifact.key.kind().content_type())
        .header(header::CONTENT_LENGTH, len)
        .header(header::CONTENT_DISPOSITION, disposition)
        .header(X_CACHE, cache.as_header())
        .body(Body::from_stream(ReaderStream::new(file)))
        .map_err(|e| AppError::Internal(format!("failed to build response: {e}")))
}

/// Restrict a download name stem to characters that are safe in a quoted
/// header parameter.
pub(crate) fn safe_stem(stem: &str) -> String {
    let cleaned: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.trim_matches(|c| c == '_' || c == '.').is_empty() {
        "model".to_string()
    } else {
        cleaned
    }
}

/// Download name stem for a source: the upload's name or the path's file stem.
pub(crate) fn source_stem(source: &SourceFile) -> String {
    let stem = match source {
        SourceFile::Upload(upload) => upload.stem().to_string(),
        SourceFile::ServerPath { path, .. } => path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default(),
    };
    safe_stem(&stem)
}

/// Map a JSON body rejection. A body that is not JSON at all carries no path.
pub(crate) fn json_rejection(rejection: JsonRejection) -> AppError {
    match rejection {
        JsonRejection::MissingJsonContentType(_) => ValidationError::MissingPath.into(),
        other => ValidationError::Malformed(other.body_text()).into(),
    }
}

/// A multipart upload: the `file` part plus any plain text fields.
#[derive(Debug, Default)]
pub(crate) struct UploadForm {
    pub file: Option<(String, Vec<u8>)>,
    pub fields: HashMap<String, String>,
}

impl UploadForm {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }
}

fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ValidationError::BodyTooLarge {
            max: MAX_UPLOAD_BYTES,
        }
        .into()
    } else {
        ValidationError::Malformed(err.body_text()).into()
    }
}

/// Read a multipart body, counting `file` bytes as they arrive.
///
/// Bytes past [`MAX_UPLOAD_BYTES`] are counted but not buffered, so the
/// error can report the real size without holding it in memory.
pub(crate) async fn read_upload_form(mut multipart: Multipart) -> Result<UploadForm, AppError> {
    let mut form = UploadForm::default();
    while let Some(mut field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        if name == "file" {
            let file_name = field.file_name().unwrap_or_default().to_string();
            let mut bytes = Vec::new();
            let mut size = 0usize;
            while let Some(chunk) = field.chunk().await.map_err(multipart_error)? {
                size += chunk.len();
                if size <= MAX_UPLOAD_BYTES {
                    bytes.extend_from_slice(&chunk);
                }
            }
            if size > MAX_UPLOAD_BYTES {
                return Err(ValidationError::FileTooLarge {
                    size,
                    max: MAX_UPLOAD_BYTES,
                }
                .into());
            }
            form.file = Some((file_name, bytes));
        } else {
            let value = field.text().await.map_err(multipart_error)?;
            form.fields.insert(name, value);
        }
    }
    Ok(form)
}

/// Parse an optional integer form field.
pub(crate) fn int_field(form: &UploadForm, name: &str) -> Result<Option<i64>, AppError> {
    form.field(name)
        .map(|v| {
            v.parse::<i64>().map_err(|_| {
                AppError::from(ValidationError::Malformed(format!(
                    "{name} must be an integer, got {v:?}"
                )))
            })
        })
        .transpose()
}

/// Parse an optional float form field.
pub(crate) fn float_field(form: &UploadForm, name: &str) -> Result<Option<f64>, AppError> {
    form.field(name)
        .map(|v| {
            v.parse::<f64>().map_err(|_| {
                AppError::from(ValidationError::Malformed(format!(
                    "{name} must be a number, got {v:?}"
                )))
            })
        })
        .transpose()
}
