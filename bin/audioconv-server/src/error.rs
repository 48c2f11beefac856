//! Unified server error type.
//!
//! Every handler returns `Result<T, ServerError>`, which implements
//! [`axum::response::IntoResponse`] so errors are automatically converted
//! to a JSON body `{"error": <category>, "detail": <message>}` with a stable
//! status code per [`ErrorCategory`].
//!
//! **Security note:** filesystem errors and unexpected internal failures are
//! logged with full detail but only a generic message is returned, so paths
//! and tool output never leak to clients. Converter diagnostics are already
//! truncated by the classifier before they get here.

use audioconv_core::{ConvertError, ErrorCategory};
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

/// All errors that can occur in the audioconv-server request lifecycle.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Propagated from the conversion lifecycle.
    #[error(transparent)]
    Convert(#[from] ConvertError),

    /// The caller sent a malformed request (missing field, bad multipart).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// An unclassified internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            ServerError::Convert(e) => e.category(),
            ServerError::BadRequest(_) => ErrorCategory::InvalidInput,
            ServerError::Internal(_) => ErrorCategory::InternalError,
        }
    }
}

/// HTTP status for each failure category.
///
/// Timeouts map to 504 so clients can tell a slow conversion apart from a
/// broken one.
pub fn status_for(category: ErrorCategory) -> StatusCode {
    match category {
        ErrorCategory::UnsupportedFormat | ErrorCategory::InvalidInput => StatusCode::BAD_REQUEST,
        ErrorCategory::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
        ErrorCategory::Timeout => StatusCode::GATEWAY_TIMEOUT,
        ErrorCategory::ConversionFailed | ErrorCategory::InternalError => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
        ErrorCategory::NotFound => StatusCode::NOT_FOUND,
        ErrorCategory::AccessDenied => StatusCode::FORBIDDEN,
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let category = self.category();
        let status = status_for(category);

        let client_message = match &self {
            ServerError::Convert(ConvertError::Io(e)) => {
                error!(error = %e, "filesystem error");
                "internal server error".to_owned()
            }
            ServerError::Convert(e) => {
                if status.is_server_error() {
                    warn!(%category, error = %e, "request failed");
                }
                e.client_message()
            }
            ServerError::BadRequest(m) => m.clone(),
            ServerError::Internal(m) => {
                error!(message = %m, "internal server error");
                "internal server error".to_owned()
            }
        };

        (
            status,
            Json(json!({ "error": category.as_ref(), "detail": client_message })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use http_body_util::BodyExt;
    use tracing_test::traced_test;

    async fn body_json(resp: Response) -> serde_json::Value {
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn statuses_per_category() {
        assert_eq!(status_for(ErrorCategory::UnsupportedFormat), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(ErrorCategory::PayloadTooLarge), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(status_for(ErrorCategory::InvalidInput), StatusCode::BAD_REQUEST);
        assert_eq!(status_for(ErrorCategory::Timeout), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(status_for(ErrorCategory::ConversionFailed), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(status_for(ErrorCategory::InternalError), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(status_for(ErrorCategory::NotFound), StatusCode::NOT_FOUND);
        assert_eq!(status_for(ErrorCategory::AccessDenied), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn conversion_failure_body_carries_category_and_detail() {
        let resp = ServerError::from(ConvertError::ConversionFailed("tail line".into())).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_json(resp).await;
        assert_eq!(body["error"], "conversion_failed");
        assert_eq!(body["detail"], "tail line");
    }

    #[tokio::test]
    #[traced_test]
    async fn io_detail_is_not_exposed() {
        let io = std::io::Error::other("/var/secret/output/x.mp3: disk full");
        let resp = ServerError::from(ConvertError::Io(io)).into_response();
        let body = body_json(resp).await;

        assert_eq!(body["error"], "internal_error");
        assert_eq!(body["detail"], "internal server error");
        assert!(logs_contain("disk full"));
    }

    #[tokio::test]
    async fn bad_request_is_invalid_input() {
        let resp = ServerError::BadRequest("missing field 'file'".into()).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(resp).await["error"], "invalid_input");
    }
}
