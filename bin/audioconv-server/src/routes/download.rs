//! Retrieval of stored artifacts.

use audioconv_core::resolve_download;
use axum::extract::{Path, State};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use std::sync::Arc;
use tracing::info;
use utoipa::OpenApi;

use crate::error::ServerError;
use crate::routes::attachment::file_attachment;
use crate::schemas::ErrorBody;
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(paths(download))]
pub struct DownloadApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/download/{filename}", get(download))
}

/// Download a previously converted file by name.
///
/// Names that resolve outside the output directory, through `..` or a
/// symlink, are refused with 403.
#[utoipa::path(
    get,
    path = "/download/{filename}",
    tag = "convert",
    params(
        ("filename" = String, Path, description = "Artifact name returned by /convert")
    ),
    responses(
        (status = 200, description = "Artifact bytes", content_type = "application/octet-stream"),
        (status = 403, description = "Path escapes the output directory", body = ErrorBody),
        (status = 404, description = "No such artifact", body = ErrorBody)
    )
)]
pub async fn download(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
) -> Result<Response, ServerError> {
    let artifact = resolve_download(&state.paths, &filename).await?;
    info!(file = %artifact.file_name, size = artifact.size, "serving artifact");
    file_attachment(&artifact.path, artifact.media_type, &artifact.file_name).await
}
