use actix_web::{http::Method, web};

use crate::handlers::{contact, csrf, fallback};

pub fn config_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/contact")
            .route(web::post().to(contact::submit_contact))
            .route(web::method(Method::OPTIONS).to(contact::contact_preflight))
            .default_service(web::to(fallback::method_not_allowed))
    );

    cfg.service(
        web::resource("/csrf-token")
            .route(web::get().to(csrf::issue_csrf_token))
            .default_service(web::to(fallback::method_not_allowed))
    );
}
