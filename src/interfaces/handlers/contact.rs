use actix_web::{web, HttpRequest, HttpResponse};
use futures_util::StreamExt;

use crate::{
    errors::IntakeError,
    use_cases::contact::IntakeRequest,
    utils::get_client_ip::get_client_identity,
    AppState,
};

/// CORS preflight: no gate runs, the security middleware adds the headers.
pub async fn contact_preflight() -> HttpResponse {
    HttpResponse::NoContent().finish()
}

pub async fn submit_contact(
    req: HttpRequest,
    payload: web::Payload,
    state: web::Data<AppState>,
) -> HttpResponse {
    let client = match get_client_identity(&req, &state.identity) {
        Ok(client) => client,
        Err(e) => {
            tracing::warn!("Contact request without client identity");
            return e.to_http_response();
        }
    };

    let csrf_token = req
        .headers()
        .get(state.csrf_header.as_str())
        .and_then(|value| value.to_str().ok());
    let csrf_session = req.cookie(&state.csrf_cookie);

    let request = IntakeRequest {
        client: &client,
        csrf_token,
        csrf_session: csrf_session.as_ref().map(|cookie| cookie.value()),
        body: read_body(payload, state.payload_limit),
    };

    match state.contact_intake.submit(request).await {
        Ok(response) => HttpResponse::Ok().json(response),
        Err(e) => {
            tracing::debug!("Contact intake failed: {}", e.detail());
            e.to_http_response()
        }
    }
}

async fn read_body(mut payload: web::Payload, limit: usize) -> Result<Vec<u8>, IntakeError> {
    let mut body = Vec::new();

    while let Some(chunk) = payload.next().await {
        let chunk = chunk.map_err(|e| {
            tracing::info!("Failed to read contact body: {}", e);
            IntakeError::UnreadableBody
        })?;

        if body.len() + chunk.len() > limit {
            return Err(IntakeError::PayloadTooLarge);
        }
        body.extend_from_slice(&chunk);
    }

    Ok(body)
}
