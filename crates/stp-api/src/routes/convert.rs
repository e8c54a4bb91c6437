// SPDX-License-Identifier: BUSL-1.1
//! # Mesh Conversion API
//!
//! - `POST /convert/stl`: upload (multipart) or server path (JSON)
//! - `POST /convert/stl/from-path`: server path (JSON) only
//!
//! `/convert/stl` picks its entry point from the `Content-Type` header and
//! hands off to [`convert_upload`] or [`convert_path`]; both produce a
//! normalized [`SourceFile`] for the same orchestration.

use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Multipart, Request, State};
use axum::http::header;
use axum::response::Response;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use stp_core::{ArtifactKind, SourceFile, Tolerance, ValidationError};
use utoipa::ToSchema;

use super::{artifact_response, float_field, json_rejection, orchestrate, read_upload_form};
use crate::error::{AppError, ErrorBody};
use crate::state::AppState;

/// Mesh downloads always carry this name.
const MESH_DISPOSITION: &str = "attachment; filename=\"model.stl\"";

/// Multipart form accepted by `POST /convert/stl`.
#[derive(Debug, ToSchema)]
pub struct MeshUpload {
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
    /// Tessellation tolerance (default 0.1).
    pub tolerance: Option<f64>,
}

/// JSON body accepted by the path-based conversion endpoints.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct MeshPathRequest {
    #[serde(default)]
    pub path: Option<String>,
    #[serde(default)]
    pub tolerance: Option<f64>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/convert/stl", post(convert_stl))
        .route("/convert/stl/from-path", post(convert_stl_from_path))
}

async fn convert(state: &AppState, source: SourceFile, tolerance: Tolerance) -> Result<Response, AppError> {
    let rendered = orchestrate(state, ArtifactKind::Mesh, move |orchestrator| {
        orchestrator.convert_to_mesh(&source, tolerance)
    })
    .await?;
    artifact_response(rendered, MESH_DISPOSITION.to_string()).await
}

/// Convert an uploaded model.
pub async fn convert_upload(
    state: AppState,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, AppError> {
    let multipart = multipart.map_err(|_| AppError::from(ValidationError::MissingFile))?;
    let mut form = read_upload_form(multipart).await?;
    let (file_name, bytes) = form.file.take().ok_or(ValidationError::MissingFile)?;
    let source = SourceFile::upload(file_name, bytes)?;
    let tolerance = Tolerance::new(float_field(&form, "tolerance")?)?;
    convert(&state, source, tolerance).await
}

/// Convert a model that already lives on the server.
pub async fn convert_path(
    state: AppState,
    body: Result<Json<MeshPathRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(request) = body.map_err(json_rejection)?;
    let source = SourceFile::server_path(request.path.unwrap_or_default())?;
    let tolerance = Tolerance::new(request.tolerance)?;
    convert(&state, source, tolerance).await
}

/// POST /convert/stl: Convert a model to a binary STL mesh.
///
/// JSON bodies (`{path, tolerance?}`) are accepted as well; they are
/// documented under `/convert/stl/from-path`.
#[utoipa::path(
    post,
    path = "/convert/stl",
    request_body(content = MeshUpload, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Binary STL mesh", content_type = "application/sla", body = String,
            headers(("x-cache" = String, description = "HIT or MISS"))),
        (status = 400, description = "Missing or unsupported file, or invalid tolerance", body = ErrorBody),
        (status = 404, description = "Path does not exist", body = ErrorBody),
        (status = 500, description = "Conversion failed", body = ErrorBody),
    ),
    tag = "convert"
)]
pub async fn convert_stl(
    State(state): State<AppState>,
    request: Request,
) -> Result<Response, AppError> {
    let is_json = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.contains("json"));

    if is_json {
        let body = Json::<MeshPathRequest>::from_request(request, &state).await;
        convert_path(state, body).await
    } else {
        let multipart = Multipart::from_request(request, &state).await;
        convert_upload(state, multipart).await
    }
}

/// POST /convert/stl/from-path: Convert a model on the server.
#[utoipa::path(
    post,
    path = "/convert/stl/from-path",
    request_body = MeshPathRequest,
    responses(
        (status = 200, description = "Binary STL mesh", content_type = "application/sla", body = String,
            headers(("x-cache" = String, description = "HIT or MISS"))),
        (status = 400, description = "Missing path, unsupported extension, or invalid tolerance", body = ErrorBody),
        (status = 404, description = "Path does not exist", body = ErrorBody),
        (status = 500, description = "Conversion failed", body = ErrorBody),
    ),
    tag = "convert"
)]
pub async fn convert_stl_from_path(
    State(state): State<AppState>,
    body: Result<Json<MeshPathRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    convert_path(state, body).await
}
