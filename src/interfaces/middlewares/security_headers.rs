use actix_web::{
    body::{BoxBody, MessageBody},
    dev::{Service, ServiceRequest, ServiceResponse, Transform},
    http::header::{self, HeaderName, HeaderValue, InvalidHeaderValue},
    Error,
};
use futures_util::future::{ok, LocalBoxFuture, Ready};
use std::{rc::Rc, sync::Arc, task::{Context, Poll}};

use crate::settings::{AppConfig, CsrfMode};

/// Adds the fixed security and CORS header set to every response,
/// including error responses produced further down the stack.
#[derive(Clone)]
pub struct SecurityHeaders {
    headers: Arc<Vec<(HeaderName, HeaderValue)>>,
}

impl SecurityHeaders {
    pub fn from_config(config: &AppConfig) -> Result<Self, InvalidHeaderValue> {
        let allow_headers = format!(
            "authorization, x-client-info, apikey, content-type, {}",
            config.csrf.header.to_ascii_lowercase()
        );

        let mut headers = vec![
            (
                header::STRICT_TRANSPORT_SECURITY,
                HeaderValue::from_static("max-age=31536000; includeSubDomains"),
            ),
            (header::X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff")),
            (header::X_FRAME_OPTIONS, HeaderValue::from_static("DENY")),
            (
                header::CONTENT_SECURITY_POLICY,
                HeaderValue::from_static("default-src 'none'; frame-ancestors 'none'"),
            ),
            (
                header::REFERRER_POLICY,
                HeaderValue::from_static("strict-origin-when-cross-origin"),
            ),
            (
                header::ACCESS_CONTROL_ALLOW_ORIGIN,
                HeaderValue::from_str(&config.cors_allow_origin)?,
            ),
            (
                header::ACCESS_CONTROL_ALLOW_METHODS,
                HeaderValue::from_static("POST, OPTIONS"),
            ),
            (header::ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_str(&allow_headers)?),
            (header::ACCESS_CONTROL_MAX_AGE, HeaderValue::from_static("86400")),
        ];

        // Signed mode relies on the session cookie crossing origins.
        if config.csrf.mode == CsrfMode::Signed {
            headers.push((
                header::ACCESS_CONTROL_ALLOW_CREDENTIALS,
                HeaderValue::from_static("true"),
            ));
        }

        Ok(SecurityHeaders { headers: Arc::new(headers) })
    }
}

impl<S, B> Transform<S, ServiceRequest> for SecurityHeaders
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type InitError = ();
    type Transform = SecurityHeadersService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(SecurityHeadersService {
            service: Rc::new(service),
            headers: Arc::clone(&self.headers),
        })
    }
}

pub struct SecurityHeadersService<S> {
    service: Rc<S>,
    headers: Arc<Vec<(HeaderName, HeaderValue)>>,
}

impl<S, B> Service<ServiceRequest> for SecurityHeadersService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    B: MessageBody + 'static,
{
    type Response = ServiceResponse<BoxBody>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&self, ctx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(ctx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let headers = Arc::clone(&self.headers);

        Box::pin(async move {
            let mut res = service.call(req).await?.map_into_boxed_body();

            let response_headers = res.headers_mut();
            for (name, value) in headers.iter() {
                response_headers.insert(name.clone(), value.clone());
            }

            Ok(res)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{http::StatusCode, test as actix_test, web, App, HttpResponse};

    #[actix_web::test]
    async fn headers_are_added_to_success_and_error_responses() {
        let config = AppConfig {
            cors_allow_origin: "https://portfolio.example".into(),
            ..Default::default()
        };
        let app = actix_test::init_service(
            App::new()
                .wrap(SecurityHeaders::from_config(&config).unwrap())
                .route("/ok", web::get().to(|| async { HttpResponse::Ok().finish() }))
                .route(
                    "/fail",
                    web::get().to(|| async {
                        Err::<HttpResponse, _>(actix_web::error::ErrorBadRequest("bad"))
                    }),
                ),
        )
        .await;

        for path in ["/ok", "/fail", "/missing"] {
            let res = actix_test::call_service(&app, actix_test::TestRequest::get().uri(path).to_request()).await;
            let headers = res.headers();

            assert_eq!(headers.get(header::X_FRAME_OPTIONS).unwrap(), "DENY", "path: {path}");
            assert_eq!(
                headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
                "https://portfolio.example"
            );
            let allowed = headers.get(header::ACCESS_CONTROL_ALLOW_HEADERS).unwrap();
            assert!(allowed.to_str().unwrap().ends_with("x-csrf-token"));
        }

        let res = actix_test::call_service(&app, actix_test::TestRequest::get().uri("/fail").to_request()).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert!(res.headers().get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS).is_none());
    }

    #[actix_web::test]
    async fn routed_requests_with_path_parameters_pass_through() {
        let app = actix_test::init_service(
            App::new()
                .wrap(SecurityHeaders::from_config(&AppConfig::default()).unwrap())
                .service(
                    web::resource("/items/{id}")
                        .route(web::get().to(|id: web::Path<u32>| async move {
                            HttpResponse::Ok().body(id.to_string())
                        })),
                ),
        )
        .await;

        let req = actix_test::TestRequest::get().uri("/items/42").to_request();
        let res = actix_test::call_service(&app, req).await;

        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers().get(header::X_CONTENT_TYPE_OPTIONS).unwrap(), "nosniff");
        let body = actix_test::read_body(res).await;
        assert_eq!(&body[..], b"42");
    }

    #[test]
    fn signed_mode_allows_credentials() {
        let mut config = AppConfig {
            cors_allow_origin: "https://portfolio.example".into(),
            ..Default::default()
        };
        config.csrf.mode = CsrfMode::Signed;

        let middleware = SecurityHeaders::from_config(&config).unwrap();
        let credentials = middleware
            .headers
            .iter()
            .find(|(name, _)| *name == header::ACCESS_CONTROL_ALLOW_CREDENTIALS)
            .map(|(_, value)| value.clone());

        assert_eq!(credentials, Some(HeaderValue::from_static("true")));
    }

    #[test]
    fn rejects_origin_that_is_not_a_header_value() {
        let config = AppConfig {
            cors_allow_origin: "https://bad\norigin".into(),
            ..Default::default()
        };
        assert!(SecurityHeaders::from_config(&config).is_err());
    }
}
