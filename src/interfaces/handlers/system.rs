use actix_web::{web, get, HttpResponse, Responder};
use chrono::Utc;
use humantime::format_duration;
use parking_lot::RwLock;
use std::{sync::atomic::{AtomicI64, Ordering}, time::Duration};
use sysinfo::{ProcessesToUpdate, System};
use serde::Serialize;
use crate::{constants::{HEALTH_CACHE_TTL_SECS, START_TIME}, AppState};

#[derive(Serialize, Clone)]
struct BackendStatus {
    backend: &'static str,
    status: &'static str,
}

#[derive(Serialize, Clone)]
struct HealthCheckResponse {
    status: &'static str,
    uptime: String,
    timestamp: String,
    start_at: String,
    version: &'static str,
    memory_usage: String,
    csrf_mode: &'static str,
    store: BackendStatus,
    rate_limiter: BackendStatus,
}

/// Last health report, reused until it is older than the TTL so that
/// polling `/health` does not hit the backends on every call.
pub struct HealthCache {
    last_check: AtomicI64,
    cached: RwLock<Option<HealthCheckResponse>>,
    ttl_secs: i64,
}

impl HealthCache {
    pub fn new(ttl_secs: i64) -> Self {
        HealthCache {
            last_check: AtomicI64::new(0),
            cached: RwLock::new(None),
            ttl_secs,
        }
    }

    fn fresh(&self, now: i64) -> Option<HealthCheckResponse> {
        if now - self.last_check.load(Ordering::Relaxed) >= self.ttl_secs {
            return None;
        }
        self.cached.read().clone()
    }

    fn store(&self, now: i64, response: HealthCheckResponse) {
        *self.cached.write() = Some(response);
        self.last_check.store(now, Ordering::Relaxed);
    }
}

impl Default for HealthCache {
    fn default() -> Self {
        HealthCache::new(HEALTH_CACHE_TTL_SECS)
    }
}

fn process_memory() -> String {
    let Ok(pid) = sysinfo::get_current_pid() else {
        return "Unknown".to_string();
    };

    let mut sys = System::new();
    sys.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);

    sys.process(pid).map_or("Unknown".to_string(), |p|
        format!("{:.2} MB", p.memory() as f64 / 1024.0 / 1024.0)
    )
}

async fn build_health_response(state: &AppState) -> HealthCheckResponse {
    let now_utc = Utc::now();
    let uptime_secs = now_utc.signed_duration_since(*START_TIME).num_seconds().max(0) as u64;
    let human_uptime = format_duration(Duration::from_secs(uptime_secs));

    let intake = &state.contact_intake;

    let store_status = match intake.store().ping().await {
        Ok(_) => "OK",
        Err(e) => {
            tracing::warn!("Contact store health check failed: {}", e);
            "Unavailable"
        }
    };

    let limiter_status = match intake.limiter().ping().await {
        Ok(_) => "OK",
        Err(e) => {
            tracing::warn!("Rate limiter health check failed: {}", e);
            "Unavailable"
        }
    };

    let healthy = store_status == "OK" && limiter_status == "OK";

    HealthCheckResponse {
        status: if healthy { "healthy" } else { "degraded" },
        uptime: human_uptime.to_string(),
        timestamp: now_utc.to_rfc3339(),
        start_at: START_TIME.to_rfc3339(),
        version: env!("CARGO_PKG_VERSION"),
        memory_usage: process_memory(),
        csrf_mode: intake.csrf().mode_name(),
        store: BackendStatus {
            backend: intake.store().backend_name(),
            status: store_status,
        },
        rate_limiter: BackendStatus {
            backend: intake.limiter().backend_name(),
            status: limiter_status,
        },
    }
}

#[get("/health")]
pub async fn health_check(state: web::Data<AppState>) -> impl Responder {
    let now = Utc::now().timestamp();

    let response = match state.health_cache.fresh(now) {
        Some(cached) => cached,
        None => {
            let response = build_health_response(&state).await;
            state.health_cache.store(now, response.clone());
            response
        }
    };

    if response.status == "healthy" {
        HttpResponse::Ok().json(response)
    } else {
        HttpResponse::ServiceUnavailable().json(response)
    }
}
