use actix_web::{HttpResponse, ResponseError};

use crate::api_errors::ApiError;

pub async fn not_found() -> HttpResponse {
    ApiError::NotFound.error_response()
}

pub async fn method_not_allowed() -> HttpResponse {
    ApiError::MethodNotAllowed.error_response()
}
