use std::sync::Arc;

use anyhow::Context;

mod domain;
mod interfaces;
mod infrastructure;
pub mod errors;
pub mod api_errors;
pub mod settings;
pub mod constants;
pub mod graceful_shutdown;
pub mod background_task;
pub mod telemetry;

pub use domain::{entities, use_cases, validation};
pub use interfaces::{handlers, repositories, middlewares, routes};
pub use infrastructure::{auth, db, limiter, utils};

use auth::csrf::CsrfValidator;
use handlers::system::HealthCache;
use db::postgres::create_pool;
use limiter::{rate_limiter::InMemoryRateLimiter, redis_limiter::RedisRateLimiter};
use repositories::{
    contact::ContactStore, rate_limit::RateLimitStore, rest_contact::RestContactStore,
    sqlx_repo::SqlxContactStore,
};
use settings::{AppConfig, IdentitySettings, LimiterBackend, StoreBackend};
use use_cases::contact::{ContactIntake, IntakePolicy};

pub struct AppState {
    pub contact_intake: ContactIntake,
    pub identity: IdentitySettings,
    pub csrf_header: String,
    pub csrf_cookie: String,
    pub payload_limit: usize,
    pub health_cache: HealthCache,
}

impl AppState {
    pub fn new(
        config: &AppConfig,
        limiter: Arc<dyn RateLimitStore>,
        store: Arc<dyn ContactStore>,
    ) -> Self {
        let contact_intake = ContactIntake::new(
            limiter,
            CsrfValidator::from_settings(&config.csrf),
            store,
            IntakePolicy::from_config(config),
        );

        AppState {
            contact_intake,
            identity: config.identity.clone(),
            csrf_header: config.csrf.header.to_ascii_lowercase(),
            csrf_cookie: config.csrf.cookie_name.clone(),
            payload_limit: config.payload_limit,
            health_cache: HealthCache::default(),
        }
    }
}

/// Backends selected by configuration. `sweeper` is set when the limiter
/// lives in process memory and needs periodic cleanup.
pub struct Backends {
    pub store: Arc<dyn ContactStore>,
    pub limiter: Arc<dyn RateLimitStore>,
    pub sweeper: Option<InMemoryRateLimiter>,
}

pub async fn build_backends(config: &AppConfig) -> anyhow::Result<Backends> {
    let store: Arc<dyn ContactStore> = match config.store.backend {
        StoreBackend::Rest => {
            let store = RestContactStore::new(
                &config.store.rest_url,
                &config.store.api_key,
                &config.store.table,
            )
            .context("Invalid contact store URL")?;
            tracing::info!(endpoint = %store.endpoint(), "Using REST contact store");
            Arc::new(store)
        }
        StoreBackend::Postgres => {
            let pool = create_pool(&config.store.database_url, config.store.timeout())
                .await
                .context("Failed to create database connection pool")?;

            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .context("Failed to run contact migrations")?;

            tracing::info!("Using Postgres contact store");
            Arc::new(SqlxContactStore::new(pool))
        }
    };

    let rate_limit = &config.rate_limit;
    let (limiter, sweeper): (Arc<dyn RateLimitStore>, Option<InMemoryRateLimiter>) = match rate_limit.backend {
        LimiterBackend::Memory => {
            let limiter = InMemoryRateLimiter::new(rate_limit.window(), rate_limit.max_tracked_clients);
            let shared: Arc<dyn RateLimitStore> = Arc::new(limiter.clone());
            (shared, Some(limiter))
        }
        LimiterBackend::Redis => {
            let url = rate_limit
                .redis_url
                .as_deref()
                .context("Redis rate limiter selected without a URL")?;
            let limiter = RedisRateLimiter::new(url, rate_limit.window(), rate_limit.redis_key_prefix.clone())?;

            if let Err(e) = limiter.ping().await {
                tracing::warn!("Redis rate limiter not reachable at startup: {}", e);
            }
            let shared: Arc<dyn RateLimitStore> = Arc::new(limiter);
            (shared, None)
        }
    };

    tracing::info!(
        store = store.backend_name(),
        limiter = limiter.backend_name(),
        "Contact backends ready"
    );

    Ok(Backends { store, limiter, sweeper })
}
