//! Maps `redub-core`'s error vocabulary onto HTTP status codes (spec
//! §7). One enum, one `IntoResponse` impl — no per-route error mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use redub_core::CoreError;
use serde::Serialize;

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

pub struct ApiError(pub CoreError);

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            CoreError::InvalidRequest(_) | CoreError::UnsupportedLanguage(_) => StatusCode::BAD_REQUEST,
            CoreError::NotFound | CoreError::ArtifactNotReady => StatusCode::NOT_FOUND,
            CoreError::VoiceNotFound(_) => StatusCode::UNPROCESSABLE_ENTITY,
            CoreError::QuotaExceeded => StatusCode::TOO_MANY_REQUESTS,
            CoreError::BudgetExceeded { .. } => StatusCode::PAYMENT_REQUIRED,
            CoreError::SourceUnavailable(_) | CoreError::TransientNetwork(_) | CoreError::TransientRemote(_) => StatusCode::BAD_GATEWAY,
            CoreError::Cancelled => StatusCode::CONFLICT,
            CoreError::StageFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(ErrorBody { error: self.0.to_string() });
        (status, body).into_response()
    }
}
