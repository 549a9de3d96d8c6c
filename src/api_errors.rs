use derive_more::Display;
use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;

use crate::errors::CsrfError;

/// Errors raised outside the intake gates: routing misses and the token
/// endpoint.
#[derive(Debug, Display)]
pub enum ApiError {
    #[display("Internal server error")]
    InternalServerError,

    #[display("Not found")]
    NotFound,

    #[display("Method not allowed")]
    MethodNotAllowed,
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::InternalServerError => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({ "error": self.to_string() }))
    }
}

impl From<CsrfError> for ApiError {
    fn from(err: CsrfError) -> Self {
        match err {
            CsrfError::NotEnabled => ApiError::NotFound,
            other => {
                tracing::error!("CSRF token issuance failed: {}", other);
                ApiError::InternalServerError
            }
        }
    }
}
