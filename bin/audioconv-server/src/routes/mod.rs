//! Axum router construction.
//!
//! [`build`] assembles the complete application router, including:
//! - Middleware layers (CORS, per-request trace-ID injection)
//! - `POST /convert` with a body limit derived from the upload limit
//! - `GET /download/{filename}`, `GET /health` and the `GET /` banner
//! - Optional OpenAPI document (disable with `AUDIOCONV_ENABLE_DOCS=false`)

mod attachment;
mod convert;
pub mod doc;
mod download;
mod health;
mod root;
#[cfg(test)]
mod testing;

use axum::{Router, middleware};
use crate::middleware::{cors, trace};
use crate::state::AppState;
use std::sync::Arc;

// ── Router builder ────────────────────────────────────────────────────────────

/// Build the complete Axum [`Router`] for the application.
pub fn build(state: Arc<AppState>) -> Router {
    let mut app = Router::new()
        .merge(root::router())
        .merge(convert::router(state.config.max_file_size_bytes()))
        .merge(download::router())
        .merge(health::router());

    if state.config.enable_docs {
        app = app.merge(doc::router());
    }

    app
        // Outermost layers execute first on the way in.
        .layer(cors::cors_layer(&state))
        .layer(middleware::from_fn(trace::trace_middleware))
        .with_state(state)
}
