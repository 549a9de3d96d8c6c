use actix_web::web;

use crate::handlers::{fallback, home::home, system::health_check};

mod contact;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(home);
    cfg.service(health_check);

    cfg.service(
        web::scope("/api")
            .configure(contact::config_routes)
    );

    cfg.default_service(web::to(fallback::not_found));
}
