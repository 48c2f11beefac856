//! Service banner.

use axum::routing::get;
use axum::{Json, Router};
use std::sync::Arc;
use utoipa::OpenApi;

use crate::schemas::ServiceInfo;
use crate::state::AppState;

pub const SERVICE_NAME: &str = "Audio Converter";

#[derive(OpenApi)]
#[openapi(paths(get_root), components(schemas(ServiceInfo)))]
pub struct RootApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/", get(get_root))
}

/// Liveness check. Does not touch the converter; see `/health` for that.
#[utoipa::path(
    get,
    path = "/",
    tag = "health",
    responses(
        (status = 200, description = "Service is up", body = ServiceInfo)
    )
)]
pub async fn get_root() -> Json<ServiceInfo> {
    Json(ServiceInfo {
        status: "ok".to_owned(),
        service: SERVICE_NAME.to_owned(),
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn root_reports_service_name() {
        let Json(body) = get_root().await;
        assert_eq!(body.status, "ok");
        assert_eq!(body.service, "Audio Converter");
    }
}
