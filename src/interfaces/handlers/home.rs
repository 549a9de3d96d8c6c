use actix_web::{get, HttpResponse, Responder};

#[get("/")]
pub async fn home() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "message": "Portfolio contact intake service",
        "status": "Ok",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "contact": "/api/contact",
            "csrf_token": "/api/csrf-token",
            "health": "/health"
        }
    }))
}
