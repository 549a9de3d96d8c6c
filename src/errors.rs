use std::time::Duration;

use actix_web::{
    error::ResponseError,
    http::{header::{self, ContentType}, StatusCode},
    HttpResponse
};
use jsonwebtoken::errors::{ErrorKind, Error as JwtError};
use derive_more::Display;

/// Failures of the contact intake pipeline, one variant per gate.
///
/// The display string is exactly what the client sees in the `error` key,
/// so backend variants render the same generic message and keep their
/// detail for the logs.
#[derive(Debug, Display)]
pub enum IntakeError {
    #[display("Too many requests")]
    RateLimited { retry_after_secs: u64 },

    #[display("Invalid CSRF token")]
    InvalidCsrfToken,

    #[display("All fields are required")]
    MissingFields,

    #[display("Invalid email format")]
    InvalidEmail,

    #[display("Unable to determine client identity")]
    MissingClientIdentity,

    #[display("Payload too large")]
    PayloadTooLarge,

    #[display("Invalid request body")]
    UnreadableBody,

    #[display("Internal server error")]
    Persistence(StoreError),

    #[display("Internal server error")]
    Limiter(LimiterError),
}

impl IntakeError {
    /// Detail for server-side logs; never sent to the client.
    pub fn detail(&self) -> String {
        match self {
            IntakeError::Persistence(e) => e.to_string(),
            IntakeError::Limiter(e) => e.to_string(),
            _ => self.to_string(),
        }
    }

    pub fn to_http_response(&self) -> HttpResponse {
        self.error_response()
    }
}

impl ResponseError for IntakeError {
    fn error_response(&self) -> HttpResponse {
        let mut builder = HttpResponse::build(self.status_code());
        builder.insert_header(ContentType::json());

        if let IntakeError::RateLimited { retry_after_secs } = self {
            builder.insert_header((header::RETRY_AFTER, retry_after_secs.to_string()));
        }

        builder.json(serde_json::json!({"error": self.to_string()}))
    }

    fn status_code(&self) -> StatusCode {
        match self {
            IntakeError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            IntakeError::InvalidCsrfToken => StatusCode::FORBIDDEN,
            IntakeError::MissingFields => StatusCode::BAD_REQUEST,
            IntakeError::InvalidEmail => StatusCode::BAD_REQUEST,
            IntakeError::MissingClientIdentity => StatusCode::BAD_REQUEST,
            IntakeError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            IntakeError::UnreadableBody => StatusCode::BAD_REQUEST,
            IntakeError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
            IntakeError::Limiter(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for IntakeError {
    fn from(err: StoreError) -> Self {
        IntakeError::Persistence(err)
    }
}

impl From<LimiterError> for IntakeError {
    fn from(err: LimiterError) -> Self {
        IntakeError::Limiter(err)
    }
}

#[derive(Debug, Display)]
pub enum StoreError {
    #[display("Store request failed: {_0}")]
    Request(String),

    #[display("Store rejected the write ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[display("Database error: {_0}")]
    Database(String),

    #[display("Store call timed out after {}ms", _0.as_millis())]
    Timeout(Duration),
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        StoreError::Request(err.to_string())
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Database(err.to_string())
    }
}

#[derive(Debug, Display)]
pub enum LimiterError {
    #[display("Redis connection failed: {_0}")]
    RedisConnection(String),

    #[display("Redis operation failed: {_0}")]
    RedisOperation(String),
}

impl std::error::Error for StoreError {}
impl std::error::Error for LimiterError {}

impl From<deadpool_redis::PoolError> for LimiterError {
    fn from(err: deadpool_redis::PoolError) -> Self {
        LimiterError::RedisConnection(err.to_string())
    }
}

impl From<redis::RedisError> for LimiterError {
    fn from(err: redis::RedisError) -> Self {
        LimiterError::RedisOperation(err.to_string())
    }
}

#[derive(Debug, Display, PartialEq)]
pub enum CsrfError {
    #[display("Signed CSRF tokens are not enabled")]
    NotEnabled,

    #[display("Token creation error")]
    TokenCreation,

    #[display("Invalid token")]
    InvalidToken,

    #[display("Token expired")]
    TokenExpired,

    #[display("Session mismatch")]
    SessionMismatch,
}

impl From<JwtError> for CsrfError {
    fn from(e: JwtError) -> Self {
        match e.kind() {
            ErrorKind::ExpiredSignature => CsrfError::TokenExpired,
            _ => CsrfError::InvalidToken,
        }
    }
}
