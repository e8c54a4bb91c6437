//! # OpenAPI Specification Assembly
//!
//! Collects the utoipa-documented handlers into one OpenAPI document,
//! served at `/openapi.json`.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "stp-thumbnail",
        version = "0.1.0",
        description = "SVG thumbnails and STL meshes for STEP (.stp/.step) CAD models.\n\nResults are cached by content hash (uploads) or by path plus modification time (server paths). Every artifact response carries `X-Cache: HIT|MISS`. Errors are returned as `{\"error\": \"<message>\"}`.",
        license(name = "BUSL-1.1")
    ),
    servers(
        (url = "http://127.0.0.1:5001", description = "Local default"),
    ),
    paths(
        crate::routes::health::health,
        crate::routes::thumbnail::thumbnail_upload,
        crate::routes::thumbnail::thumbnail_from_path,
        crate::routes::convert::convert_stl,
        crate::routes::convert::convert_stl_from_path,
    ),
    components(schemas(
        crate::error::ErrorBody,
        crate::routes::health::HealthResponse,
        crate::routes::thumbnail::ThumbnailUpload,
        crate::routes::thumbnail::ThumbnailPathRequest,
        crate::routes::convert::MeshUpload,
        crate::routes::convert::MeshPathRequest,
    )),
    tags(
        (name = "health", description = "Liveness"),
        (name = "thumbnail", description = "SVG previews"),
        (name = "convert", description = "STL mesh conversion"),
    )
)]
pub struct ApiDoc;

/// Serves the OpenAPI JSON spec at `/openapi.json`.
pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_json))
}

/// GET /openapi.json: Return the generated OpenAPI specification.
async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_lists_every_route() {
        let spec = ApiDoc::openapi();
        for path in [
            "/health",
            "/thumbnail",
            "/thumbnail/from-path",
            "/convert/stl",
            "/convert/stl/from-path",
        ] {
            assert!(spec.paths.paths.contains_key(path), "missing {path}");
        }
    }

    #[test]
    fn spec_has_request_schemas() {
        let spec = ApiDoc::openapi();
        let schemas = &spec.components.as_ref().unwrap().schemas;
        for name in ["ErrorBody", "ThumbnailPathRequest", "MeshPathRequest", "MeshUpload"] {
            assert!(schemas.contains_key(name), "missing {name} schema");
        }
    }

    #[test]
    fn error_responses_reference_error_body() {
        let json = serde_json::to_value(ApiDoc::openapi()).unwrap();
        for path in ["/thumbnail", "/thumbnail/from-path", "/convert/stl", "/convert/stl/from-path"] {
            let schema = &json["paths"][path]["post"]["responses"]["400"]["content"]["application/json"]["schema"];
            assert_eq!(schema["$ref"], "#/components/schemas/ErrorBody", "{path}");
        }
    }

    #[test]
    fn spec_serializes_to_json() {
        let json = serde_json::to_string(&ApiDoc::openapi()).unwrap();
        assert!(json.contains("openapi"));
        assert!(json.contains("image/svg+xml"));
    }
}
