use actix_web::{
    cookie::{time::Duration as CookieDuration, Cookie, SameSite},
    web, HttpResponse,
};

use crate::{api_errors::ApiError, entities::csrf::CsrfTokenResponse, AppState};

/// Issues a session-bound anti-forgery token. Answers 404 unless signed
/// tokens are enabled.
pub async fn issue_csrf_token(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let issued = state.contact_intake.csrf().issue()?;

    let cookie = Cookie::build(state.csrf_cookie.clone(), issued.session_id)
        .path("/")
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Strict)
        .max_age(CookieDuration::seconds(issued.expires_in_secs))
        .finish();

    Ok(HttpResponse::Ok()
        .cookie(cookie)
        .json(CsrfTokenResponse { token: issued.token }))
}
