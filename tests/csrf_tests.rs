mod test_utils;

use reqwest::StatusCode;
use serde_json::Value;
use test_contact::*;
use test_utils::*;

struct IssuedToken {
    token: String,
    cookie: String,
    set_cookie: String,
}

async fn fetch_token(app: &TestApp) -> IssuedToken {
    let response = app.client
        .get(app.url("/api/csrf-token"))
        .send()
        .await
        .expect("Failed to fetch CSRF token");

    assert_eq!(response.status(), StatusCode::OK);

    let set_cookie = response.headers()["set-cookie"]
        .to_str()
        .expect("cookie header is ASCII")
        .to_string();
    let cookie = set_cookie
        .split(';')
        .next()
        .expect("cookie has a name=value pair")
        .to_string();

    let body: Value = response.json().await.unwrap();
    let token = body["token"].as_str().expect("token in body").to_string();

    IssuedToken { token, cookie, set_cookie }
}

async fn post_signed(app: &TestApp, ip: &str, token: &str, cookie: Option<&str>) -> reqwest::Response {
    let mut request = app.client
        .post(app.url("/api/contact"))
        .header("x-forwarded-for", ip)
        .header("x-csrf-token", token)
        .json(&valid_contact());

    if let Some(cookie) = cookie {
        request = request.header("cookie", cookie);
    }

    request.send().await.unwrap()
}

#[actix_rt::test]
async fn token_endpoint_sets_a_strict_session_cookie() {
    let app = TestApp::spawn_signed().await;

    let issued = fetch_token(&app).await;

    assert!(issued.cookie.starts_with("contact_sid="));
    assert!(issued.set_cookie.contains("HttpOnly"));
    assert!(issued.set_cookie.contains("Secure"));
    assert!(issued.set_cookie.contains("SameSite=Strict"));
    assert!(!issued.token.is_empty());
}

#[actix_rt::test]
async fn issued_token_with_its_cookie_is_accepted() {
    let app = TestApp::spawn_signed().await;
    let issued = fetch_token(&app).await;

    let response = post_signed(&app, &client_ip(40), &issued.token, Some(&issued.cookie)).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(app.store.count(), 1);
}

#[actix_rt::test]
async fn token_without_its_session_cookie_is_forbidden() {
    let app = TestApp::spawn_signed().await;
    let issued = fetch_token(&app).await;

    let response = post_signed(&app, &client_ip(41), &issued.token, None).await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(app.store.count(), 0);
}

#[actix_rt::test]
async fn token_from_another_session_is_forbidden() {
    let app = TestApp::spawn_signed().await;
    let first = fetch_token(&app).await;
    let second = fetch_token(&app).await;

    let response = post_signed(&app, &client_ip(42), &first.token, Some(&second.cookie)).await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(app.store.count(), 0);
}

#[actix_rt::test]
async fn browser_generated_token_is_not_enough_in_signed_mode() {
    let app = TestApp::spawn_signed().await;

    let response = post_signed(&app, &client_ip(43), VALID_TOKEN, Some("contact_sid=forged")).await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[actix_rt::test]
async fn health_reports_signed_mode() {
    let app = TestApp::spawn_signed().await;

    let body: Value = app.client
        .get(app.url("/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(body["csrf_mode"], "signed");
}

#[actix_rt::test]
async fn signed_mode_allows_credentialed_cross_origin_requests() {
    let app = TestApp::spawn_signed().await;
    let issued = fetch_token(&app).await;

    let response = post_signed(&app, &client_ip(44), &issued.token, Some(&issued.cookie)).await;

    assert_eq!(response.status(), StatusCode::OK);
    let headers = response.headers();
    assert_eq!(headers["access-control-allow-credentials"], "true");
    assert_eq!(headers["access-control-allow-origin"], SIGNED_ORIGIN);
}

#[test]
fn signed_mode_refuses_wildcard_origin() {
    let mut config = signed_config();
    assert!(config.validate().is_ok());

    config.cors_allow_origin = "*".into();
    let message = config.validate().unwrap_err().to_string();
    assert!(message.contains("CORS_ALLOW_ORIGIN"));
}
