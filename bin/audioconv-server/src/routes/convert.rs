//! Upload-and-convert endpoint.

use audioconv_core::{
    ConversionRequest, ConvertError, DeliveryMode, OutputArtifact, ScratchFile, TargetFormat,
};
use axum::extract::multipart::MultipartError;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use std::sync::Arc;
use tracing::{debug, info};
use utoipa::OpenApi;

use crate::config::Config;
use crate::error::ServerError;
use crate::routes::attachment::file_attachment;
use crate::schemas::{ConvertForm, ErrorBody, LinkedResponse};
use crate::state::AppState;

/// Room for multipart framing and the small text fields on top of the file.
const MULTIPART_OVERHEAD: u64 = 1024 * 1024;

#[derive(OpenApi)]
#[openapi(
    paths(convert),
    components(schemas(ConvertForm, LinkedResponse, ErrorBody))
)]
pub struct ConvertApi;

pub fn router(max_file_size_bytes: u64) -> Router<Arc<AppState>> {
    let body_limit =
        usize::try_from(max_file_size_bytes.saturating_add(MULTIPART_OVERHEAD)).unwrap_or(usize::MAX);
    Router::new().route(
        "/convert",
        post(convert).layer(DefaultBodyLimit::max(body_limit)),
    )
}

/// Upload an audio file and convert it to `target_format`.
///
/// With `download=true` the converted bytes are returned directly; otherwise
/// the artifact is stored and a JSON body with its download URL is returned.
#[utoipa::path(
    post,
    path = "/convert",
    tag = "convert",
    request_body(content = ConvertForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Stored artifact (download=false)", body = LinkedResponse),
        (status = 400, description = "Unsupported format or unusable input", body = ErrorBody),
        (status = 413, description = "Upload exceeds the size limit", body = ErrorBody),
        (status = 500, description = "Converter failed", body = ErrorBody),
        (status = 504, description = "Conversion timed out", body = ErrorBody)
    )
)]
pub async fn convert(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Response, ServerError> {
    let limit_mb = state.config.max_file_size_mb;
    let mut target_format: Option<TargetFormat> = None;
    let mut delivery = DeliveryMode::default();
    let mut upload: Option<(Option<String>, ScratchFile)> = None;

    // Fields may arrive in any order. An unsupported format seen before the
    // file rejects the request without reading the upload; seen after it, the
    // dropped scratch file cleans up after itself.
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, limit_mb))?
    {
        let name = field.name().unwrap_or_default().to_owned();
        match name.as_str() {
            "file" => {
                if upload.is_some() {
                    return Err(ServerError::BadRequest("only one file may be uploaded".into()));
                }
                let filename = field
                    .file_name()
                    .filter(|n| !n.is_empty())
                    .map(str::to_owned);
                let scratch = state.ingestor.ingest(filename.as_deref(), field).await?;
                upload = Some((filename, scratch));
            }
            "target_format" => {
                let raw = field.text().await.map_err(|e| multipart_error(e, limit_mb))?;
                target_format = Some(TargetFormat::parse(&raw)?);
            }
            "download" => {
                let raw = field.text().await.map_err(|e| multipart_error(e, limit_mb))?;
                delivery = DeliveryMode::parse_flag(&raw).ok_or_else(|| {
                    ServerError::BadRequest(format!("download must be a boolean, got '{raw}'"))
                })?;
            }
            other => debug!(field = other, "ignoring unknown multipart field"),
        }
    }

    let target_format = target_format
        .ok_or_else(|| ServerError::BadRequest("missing field 'target_format'".into()))?;
    let (source_filename, scratch) =
        upload.ok_or_else(|| ServerError::BadRequest("missing field 'file'".into()))?;

    let request = ConversionRequest {
        source_filename,
        target_format,
        delivery,
    };
    let artifact = state.pipeline.convert(&request, scratch).await?;

    match request.delivery {
        DeliveryMode::Inline => {
            file_attachment(artifact.path(), artifact.media_type(), artifact.file_name()).await
        }
        DeliveryMode::Linked => Ok(linked_response(&state.config, &headers, &artifact)),
    }
}

fn linked_response(config: &Config, headers: &HeaderMap, artifact: &OutputArtifact) -> Response {
    let download_url = format!(
        "{}/download/{}",
        base_url(config, headers),
        artifact.file_name()
    );
    info!(file = %artifact.file_name(), %download_url, "artifact stored");

    (
        StatusCode::OK,
        Json(LinkedResponse {
            status: "ok".to_owned(),
            output_path: artifact.path().display().to_string(),
            download_url,
        }),
    )
        .into_response()
}

/// Origin clients should use to reach this service.
///
/// The configured public URL wins; otherwise it is rebuilt from
/// `X-Forwarded-Proto` (default `http`) and the `Host` header.
fn base_url(config: &Config, headers: &HeaderMap) -> String {
    if let Some(url) = &config.public_base_url {
        return url.clone();
    }

    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or("http");
    let host = headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");

    format!("{scheme}://{host}")
}

fn multipart_error(e: MultipartError, limit_mb: u64) -> ServerError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ConvertError::PayloadTooLarge { limit_mb }.into()
    } else {
        ServerError::BadRequest(format!("malformed multipart body: {}", e.body_text()))
    }
}
