//! Converter health report.

use audioconv_core::HealthReport;
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use std::sync::Arc;
use utoipa::OpenApi;

use crate::schemas::{ConverterToolInfo, HealthResponse};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(paths(get_health), components(schemas(HealthResponse, ConverterToolInfo)))]
pub struct HealthApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(get_health))
}

/// Converter availability, supported formats and the upload limit.
///
/// Always answers 200; an unreachable converter shows up as
/// `"status": "degraded"` rather than an error.
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Health report", body = HealthResponse)
    )
)]
pub async fn get_health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let report =
        HealthReport::probe(state.pipeline.converter(), state.config.max_file_size_mb).await;
    Json(report.into())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::routes::testing::{body_json, get, test_app};
    use audioconv_core::testing::Script;
    use axum::http::StatusCode;

    #[tokio::test]
    async fn healthy_when_converter_answers() {
        let app = test_app(Script::Copy).await;
        let resp = get(&app, "/health").await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body = body_json(resp).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["converterTool"]["available"], true);
        assert_eq!(body["converterTool"]["version"], "6.1.1-scripted");
        assert_eq!(body["supportedFormats"], serde_json::json!(["mp3", "ogg"]));
        assert_eq!(body["maxFileSizeMb"], 1);
    }

    #[tokio::test]
    async fn degraded_when_converter_is_missing() {
        let app = test_app(Script::Unavailable).await;
        let resp = get(&app, "/health").await;
        assert_eq!(resp.status(), StatusCode::OK);

        let body = body_json(resp).await;
        assert_eq!(body["status"], "degraded");
        assert_eq!(body["converterTool"]["available"], false);
        assert!(body["converterTool"]["version"].is_null());
    }
}
