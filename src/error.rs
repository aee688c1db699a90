// Application error type and its conversion into HTTP responses

use axum::{
    Json,
    extract::{
        multipart::MultipartRejection,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::{
    backend::BackendError, listing_form::FormError, query::QueryParseError,
    registration::RegistrationError,
};

#[derive(Debug)]
pub enum AppError {
    InternalServerError(anyhow::Error),
    Unauthorized(String),
    BadRequest(String),
    NotFound(String),
    PayloadTooLarge(String),
    // Backend answered, but not with something we can pass on as-is
    BadGateway(String),
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        AppError::InternalServerError(error)
    }
}

// The backend's own `detail` message is what the user should see for
// client-side mistakes (duplicate email, wrong password, ...)
impl From<BackendError> for AppError {
    fn from(error: BackendError) -> Self {
        match error {
            BackendError::Status { status, detail } => match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AppError::Unauthorized(detail),
                StatusCode::NOT_FOUND => AppError::NotFound(detail),
                s if s.is_client_error() => AppError::BadRequest(detail),
                s => AppError::BadGateway(format!("Backend returned {}: {}", s, detail)),
            },
            BackendError::Decode(e) => AppError::BadGateway(format!("Malformed backend response: {}", e)),
            BackendError::Network(e) => {
                AppError::InternalServerError(anyhow::Error::new(e).context("Backend request failed"))
            }
        }
    }
}

impl From<FormError> for AppError {
    fn from(error: FormError) -> Self {
        AppError::BadRequest(error.to_string())
    }
}

impl From<RegistrationError> for AppError {
    fn from(error: RegistrationError) -> Self {
        AppError::BadRequest(error.to_string())
    }
}

impl From<QueryParseError> for AppError {
    fn from(error: QueryParseError) -> Self {
        AppError::BadRequest(error.to_string())
    }
}

// Extractor failures answer with the same {detail} body the pages' scripts read
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<MultipartRejection> for AppError {
    fn from(rejection: MultipartRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            AppError::InternalServerError(e) => {
                tracing::error!("Internal server error: {:?}", e);
                // Don't expose internal details to the client
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
            }
            AppError::Unauthorized(message) => {
                tracing::warn!("Unauthorized access attempt: {}", message);
                (StatusCode::UNAUTHORIZED, message)
            }
            AppError::BadRequest(message) => {
                tracing::debug!("Rejected request: {}", message);
                (StatusCode::BAD_REQUEST, message)
            }
            AppError::NotFound(message) => (StatusCode::NOT_FOUND, message),
            AppError::PayloadTooLarge(message) => {
                tracing::warn!("Rejected oversized request: {}", message);
                (StatusCode::PAYLOAD_TOO_LARGE, message)
            }
            AppError::BadGateway(message) => {
                tracing::error!("Upstream failure: {}", message);
                (StatusCode::BAD_GATEWAY, "Marketplace service unavailable".to_string())
            }
        };

        (status, Json(json!({ "detail": detail }))).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_client_errors_keep_their_detail() {
        let err: AppError = BackendError::Status {
            status: StatusCode::BAD_REQUEST,
            detail: "Email already registered".into(),
        }
        .into();
        assert!(matches!(err, AppError::BadRequest(ref d) if d == "Email already registered"));

        let err: AppError = BackendError::Status {
            status: StatusCode::UNAUTHORIZED,
            detail: "Invalid credentials".into(),
        }
        .into();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[test]
    fn backend_server_errors_become_bad_gateway() {
        let err: AppError = BackendError::Status {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            detail: "Failed to fetch listings".into(),
        }
        .into();
        assert_eq!(err.into_response().status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn oversized_uploads_are_413() {
        let err = AppError::PayloadTooLarge("Uploads are limited to 20 MB".into());
        assert_eq!(err.into_response().status(), StatusCode::PAYLOAD_TOO_LARGE);
    }
}
