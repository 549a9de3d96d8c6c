use actix_web::HttpRequest;

use crate::{
    errors::IntakeError,
    settings::{IdentitySettings, MissingIdentityPolicy},
};

/// Bucket shared by every client whose identity cannot be determined.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// First entry of a forwarded-for style header, trimmed. `None` when the
/// header is absent, not valid text, or blank.
pub fn forwarded_client(req: &HttpRequest, header: &str) -> Option<String> {
    req.headers()
        .get(header)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Resolves the rate-limit key for a request according to the configured
/// missing-identity policy.
pub fn get_client_identity(req: &HttpRequest, settings: &IdentitySettings) -> Result<String, IntakeError> {
    if let Some(client) = forwarded_client(req, &settings.header) {
        return Ok(client);
    }

    match settings.on_missing {
        MissingIdentityPolicy::Shared => Ok(UNKNOWN_CLIENT.to_string()),
        MissingIdentityPolicy::Peer => Ok(req
            .peer_addr()
            .map(|addr| addr.ip().to_string())
            .unwrap_or_else(|| UNKNOWN_CLIENT.to_string())),
        MissingIdentityPolicy::Reject => Err(IntakeError::MissingClientIdentity),
    }
}
