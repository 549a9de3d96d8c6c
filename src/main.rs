use actix_web::{middleware::NormalizePath, web, App, HttpServer};
use anyhow::Context;
use tracing_actix_web::TracingLogger;

use portfolio_contact::{
    background_task::start_limiter_sweep,
    build_backends,
    constants::START_TIME,
    graceful_shutdown::shutdown_signal,
    middlewares::security_headers::SecurityHeaders,
    routes::configure_routes,
    settings::AppConfig,
    telemetry::init_tracing,
    AppState,
};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = match AppConfig::new() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    init_tracing(&config.log)?;
    tracing::info!(started_at = %*START_TIME, "Loaded configuration: {:?}", config);

    let backends = build_backends(&config).await?;

    if let Some(limiter) = backends.sweeper.clone() {
        tokio::spawn(start_limiter_sweep(limiter, config.rate_limit.sweep_interval()));
    }

    let security_headers = SecurityHeaders::from_config(&config)
        .context("Invalid security header configuration")?;

    let app_state = web::Data::new(AppState::new(&config, backends.limiter, backends.store));

    let server_addr = format!("{}:{}", config.host, config.port);

    tracing::info!(
        "🚀 Starting {} v{} on {} ({} workers)",
        config.name,
        env!("CARGO_PKG_VERSION"),
        server_addr,
        config.worker_count
    );

    let server = HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .wrap(security_headers.clone())
            .wrap(NormalizePath::trim())
            .wrap(TracingLogger::default())
            .configure(configure_routes)
    })
    .workers(config.worker_count)
    .bind(&server_addr)
    .with_context(|| format!("Failed to bind {}", server_addr))?
    .run();

    tokio::select! {
        res = server => res.context("HTTP server error")?,
        _ = shutdown_signal() => {},
    }

    Ok(())
}
