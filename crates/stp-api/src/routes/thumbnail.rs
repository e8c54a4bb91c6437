// SPDX-License-Identifier: BUSL-1.1
//! # Thumbnail API
//!
//! - `POST /thumbnail`: SVG preview of an uploaded model (multipart)
//! - `POST /thumbnail/from-path`: SVG preview of a model on the server (JSON)
//!
//! Both return `image/svg+xml` with `X-Cache: HIT|MISS`.

use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Multipart, State};
use axum::response::Response;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use stp_core::{ArtifactKind, PreviewSize, SourceFile, ValidationError};
use utoipa::ToSchema;

use super::{artifact_response, int_field, json_rejection, orchestrate, read_upload_form, source_stem};
use crate::error::{AppError, ErrorBody};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// Multipart form accepted by `POST /thumbnail`.
#[derive(Debug, ToSchema)]
pub struct ThumbnailUpload {
    /// The `.stp` / `.step` model.
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
    /// Output width in pixels (default 400).
    pub width: Option<i64>,
    /// Output height in pixels (default 300).
    pub height: Option<i64>,
}

/// JSON body accepted by `POST /thumbnail/from-path`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ThumbnailPathRequest {
    /// Absolute path of a model readable by the service.
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub width: Option<i64>,
    #[serde(default)]
    pub height: Option<i64>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/thumbnail", post(thumbnail_upload))
        .route("/thumbnail/from-path", post(thumbnail_from_path))
}

fn preview_disposition(source: &SourceFile) -> String {
    format!("inline; filename=\"{}_preview.svg\"", source_stem(source))
}

async fn render(state: &AppState, source: SourceFile, size: PreviewSize) -> Result<Response, AppError> {
    let disposition = preview_disposition(&source);
    let rendered = orchestrate(state, ArtifactKind::Preview, move |orchestrator| {
        orchestrator.render_preview(&source, size)
    })
    .await?;
    artifact_response(rendered, disposition).await
}

/// POST /thumbnail: Render a preview of an uploaded model.
#[utoipa::path(
    post,
    path = "/thumbnail",
    request_body(content = ThumbnailUpload, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "SVG preview", content_type = "image/svg+xml", body = String,
            headers(("x-cache" = String, description = "HIT or MISS"))),
        (status = 400, description = "Missing, empty, oversized, or unsupported file", body = ErrorBody),
        (status = 500, description = "Preview generation failed", body = ErrorBody),
    ),
    tag = "thumbnail"
)]
pub async fn thumbnail_upload(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, AppError> {
    let multipart = multipart.map_err(|_| AppError::from(ValidationError::MissingFile))?;
    let mut form = read_upload_form(multipart).await?;
    let (file_name, bytes) = form.file.take().ok_or(ValidationError::MissingFile)?;
    let source = SourceFile::upload(file_name, bytes)?;
    let size = PreviewSize::new(int_field(&form, "width")?, int_field(&form, "height")?)?;
    render(&state, source, size).await
}

/// POST /thumbnail/from-path: Render a preview of a model on the server.
#[utoipa::path(
    post,
    path = "/thumbnail/from-path",
    request_body = ThumbnailPathRequest,
    responses(
        (status = 200, description = "SVG preview", content_type = "image/svg+xml", body = String,
            headers(("x-cache" = String, description = "HIT or MISS"))),
        (status = 400, description = "Missing path or unsupported extension", body = ErrorBody),
        (status = 404, description = "Path does not exist", body = ErrorBody),
        (status = 500, description = "Preview generation failed", body = ErrorBody),
    ),
    tag = "thumbnail"
)]
pub async fn thumbnail_from_path(
    State(state): State<AppState>,
    body: Result<Json<ThumbnailPathRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(request) = body.map_err(json_rejection)?;
    let source = SourceFile::server_path(request.path.unwrap_or_default())?;
    let size = PreviewSize::new(request.width, request.height)?;
    render(&state, source, size).await
}
