//! Request/response bodies shared by the HTTP routes and the OpenAPI document.

use audioconv_core::HealthReport;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// `GET /` body.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ServiceInfo {
    pub status: String,
    pub service: String,
}

/// Multipart form accepted by `POST /convert`.
///
/// Only used to describe the form in the OpenAPI document; the handler reads
/// the fields directly from the multipart stream.
#[allow(dead_code)]
#[derive(Debug, ToSchema)]
pub struct ConvertForm {
    /// Audio file to convert.
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
    /// `mp3` or `ogg`.
    #[schema(example = "mp3")]
    pub target_format: String,
    /// Return the converted bytes instead of a download link.
    /// Accepts `true`/`false`, `1`/`0`, `yes`/`no`, `on`/`off`.
    #[schema(value_type = Option<bool>)]
    pub download: Option<String>,
}

/// `POST /convert` body for linked delivery.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LinkedResponse {
    pub status: String,
    /// Absolute path of the artifact on the server.
    pub output_path: String,
    pub download_url: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ConverterToolInfo {
    pub available: bool,
    pub version: Option<String>,
}

/// `GET /health` body.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// `healthy` or `degraded`.
    pub status: String,
    pub converter_tool: ConverterToolInfo,
    pub supported_formats: Vec<String>,
    pub max_file_size_mb: u64,
}

impl From<HealthReport> for HealthResponse {
    fn from(report: HealthReport) -> Self {
        Self {
            status: report.status.as_str().to_owned(),
            converter_tool: ConverterToolInfo {
                available: report.converter_tool.available,
                version: report.converter_tool.version,
            },
            supported_formats: report
                .supported_formats
                .into_iter()
                .map(str::to_owned)
                .collect(),
            max_file_size_mb: report.max_file_size_mb,
        }
    }
}

/// Body of every error response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    /// Failure category, e.g. `unsupported_format` or `timeout`.
    pub error: String,
    pub detail: String,
}
