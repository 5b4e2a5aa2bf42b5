//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use commerce::{CommerceError, ErrorKind};
use serde_json::json;

/// API-level error type that maps to HTTP responses.
///
/// Every body has the shape `{"error": <message>, "reason": <code>}`.
/// Security and upstream failures get a generic message; details go to the log.
#[derive(Debug)]
pub enum ApiError {
    /// Resource not found.
    NotFound(String),
    /// Bad request from the client.
    BadRequest(String),
    /// The caller could not be identified.
    Unauthorized(String),
    /// The caller lacks the required role.
    Forbidden(String),
    /// Error raised by the commerce pipeline.
    Commerce(CommerceError),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, reason) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg, "not_found"),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg, "bad_request"),
            ApiError::Unauthorized(msg) => {
                tracing::debug!(reason = %msg, "request rejected");
                (
                    StatusCode::UNAUTHORIZED,
                    "unauthorized".to_string(),
                    "unauthorized",
                )
            }
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg, "forbidden"),
            ApiError::Commerce(err) => return commerce_error_to_response(err),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                    "internal",
                )
            }
        };

        let body = json!({ "error": message, "reason": reason });
        (status, axum::Json(body)).into_response()
    }
}

fn commerce_error_to_response(err: CommerceError) -> Response {
    let reason = err.code();
    let (status, message) = match err.kind() {
        ErrorKind::NotFound => (StatusCode::NOT_FOUND, err.to_string()),
        ErrorKind::Conflict => (StatusCode::CONFLICT, err.to_string()),
        ErrorKind::BadRequest => (StatusCode::BAD_REQUEST, err.to_string()),
        ErrorKind::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized".to_string()),
        ErrorKind::Upstream => {
            tracing::error!(error = %err, "payment gateway failure");
            (
                StatusCode::BAD_GATEWAY,
                "payment provider unavailable".to_string(),
            )
        }
        ErrorKind::Internal => {
            tracing::error!(error = %err, "internal server error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal server error".to_string(),
            )
        }
    };

    let mut body = json!({ "error": message, "reason": reason });
    if let CommerceError::PaymentPending(session) = &err {
        body["token"] = json!(session.token);
        body["redirect_url"] = json!(session.redirect_url);
    }
    (status, axum::Json(body)).into_response()
}

impl From<CommerceError> for ApiError {
    fn from(err: CommerceError) -> Self {
        ApiError::Commerce(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use commerce::GatewayError;
    use domain::PaymentSession;

    async fn body_of(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_upstream_message_is_generic() {
        let err = ApiError::from(CommerceError::Gateway(GatewayError::Rejected {
            status: 401,
            message: "server key sk-live-123 rejected".into(),
        }));
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);

        let body = body_of(response).await;
        assert_eq!(body["reason"], "upstream_failure");
        assert!(!body["error"].as_str().unwrap().contains("sk-live"));
    }

    #[tokio::test]
    async fn test_invalid_signature_is_401() {
        let response = ApiError::from(CommerceError::InvalidSignature).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_of(response).await["reason"], "invalid_signature");
    }

    #[tokio::test]
    async fn test_payment_pending_carries_session() {
        let response = ApiError::from(CommerceError::PaymentPending(PaymentSession {
            token: "tok".into(),
            redirect_url: "https://pay.test/tok".into(),
        }))
        .into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let body = body_of(response).await;
        assert_eq!(body["reason"], "payment_pending");
        assert_eq!(body["redirect_url"], "https://pay.test/tok");
    }

    #[tokio::test]
    async fn test_forbidden() {
        let response = ApiError::Forbidden("admin only".into()).into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(body_of(response).await["error"], "admin only");
    }
}
