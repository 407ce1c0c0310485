use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::error;

use gatehouse_auth::AuthError;

/// HTTP mapping for the auth error taxonomy. Rejections stay generic on
/// purpose: a 401 never says which check failed, and provider outages are
/// kept distinct from bad credentials so clients can tell "you are wrong"
/// from "we are down".
pub struct ApiError(pub AuthError);

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        Self(e)
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        Self(AuthError::Storage(e))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            AuthError::MalformedToken
            | AuthError::InvalidToken
            | AuthError::ExpiredToken
            | AuthError::SessionRevoked
            | AuthError::UserNotFound
            | AuthError::CredentialMismatch => (StatusCode::UNAUTHORIZED, "unauthorized"),
            AuthError::AdminGrantMissing => (StatusCode::FORBIDDEN, "forbidden"),
            AuthError::ProviderUnavailable => {
                (StatusCode::SERVICE_UNAVAILABLE, "service unavailable")
            }
            AuthError::Storage(e) => {
                error!("storage error on auth path: {e:#}");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error")
            }
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}
