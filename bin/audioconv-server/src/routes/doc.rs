use axum::routing::get;
use axum::{Json, Router};
use std::sync::Arc;
use utoipa::OpenApi;

use crate::routes::{convert, download, health, root};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(info(
    title = "audioconv-server",
    description = "Upload-and-convert audio API",
    version = "0.1.0"
))]
pub struct ApiDoc;

pub fn get_docs() -> utoipa::openapi::OpenApi {
    let mut docs = ApiDoc::openapi();
    docs.merge(root::RootApi::openapi());
    docs.merge(convert::ConvertApi::openapi());
    docs.merge(download::DownloadApi::openapi());
    docs.merge(health::HealthApi::openapi());
    docs
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/api-docs/openapi.json", get(openapi_json))
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(get_docs())
}
