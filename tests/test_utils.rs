use actix_web::{middleware::NormalizePath, web, App, HttpServer};
use async_trait::async_trait;
use parking_lot::Mutex;
use portfolio_contact::{
    entities::contact::ContactSubmission,
    errors::StoreError,
    limiter::rate_limiter::InMemoryRateLimiter,
    middlewares::security_headers::SecurityHeaders,
    repositories::contact::ContactStore,
    routes::configure_routes,
    settings::{AppConfig, AppEnvironment, CsrfMode},
    AppState,
};
use reqwest::Client;
use std::{
    net::TcpListener,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};
use tracing_actix_web::TracingLogger;

/// In-process stand-in for the record store. Keeps every write so tests
/// can assert on exactly what would have been persisted.
#[derive(Default)]
pub struct RecordingStore {
    records: Mutex<Vec<ContactSubmission>>,
    fail: AtomicBool,
    delay: Mutex<Option<Duration>>,
    pings: AtomicUsize,
}

#[allow(dead_code)]
impl RecordingStore {
    pub fn records(&self) -> Vec<ContactSubmission> {
        self.records.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.records.lock().len()
    }

    pub fn fail_writes(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    pub fn delay_writes(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    pub fn ping_count(&self) -> usize {
        self.pings.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContactStore for RecordingStore {
    async fn create(&self, submission: &ContactSubmission) -> Result<(), StoreError> {
        let delay = *self.delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.fail.load(Ordering::SeqCst) {
            return Err(StoreError::Rejected {
                status: 503,
                body: "store unavailable".into(),
            });
        }

        self.records.lock().push(submission.clone());
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "recording"
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.pings.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct TestApp {
    pub address: String,
    pub client: Client,
    pub store: Arc<RecordingStore>,
    pub limiter: InMemoryRateLimiter,
    pub config: AppConfig,
}

#[allow(dead_code)]
impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with(test_config()).await
    }

    pub async fn spawn_signed() -> Self {
        Self::spawn_with(signed_config()).await
    }

    pub async fn spawn_with(config: AppConfig) -> Self {
        let store = Arc::new(RecordingStore::default());
        let limiter = InMemoryRateLimiter::new(
            config.rate_limit.window(),
            config.rate_limit.max_tracked_clients,
        );

        let state = web::Data::new(AppState::new(
            &config,
            Arc::new(limiter.clone()),
            store.clone(),
        ));
        let security_headers =
            SecurityHeaders::from_config(&config).expect("Invalid test header config");

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let address = format!("http://127.0.0.1:{}", port);

        let server = HttpServer::new(move || {
            App::new()
                .app_data(state.clone())
                .wrap(security_headers.clone())
                .wrap(NormalizePath::trim())
                .wrap(TracingLogger::default())
                .configure(configure_routes)
        })
        .listen(listener)
        .expect("Failed to bind server")
        .workers(config.worker_count)
        .run();

        tokio::spawn(server);

        let client = Client::new();
        while client.get(&format!("{}/", address)).send().await.is_err() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        Self {
            address,
            client,
            store,
            limiter,
            config,
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    /// Posts `body` as JSON with the given client address and CSRF token.
    pub async fn post_contact(
        &self,
        client_ip: &str,
        csrf_token: Option<&str>,
        body: &serde_json::Value,
    ) -> reqwest::Response {
        let mut request = self
            .client
            .post(self.url("/api/contact"))
            .header("x-forwarded-for", client_ip)
            .json(body);

        if let Some(token) = csrf_token {
            request = request.header("x-csrf-token", token);
        }

        request.send().await.expect("Failed to post contact form")
    }
}

pub fn test_config() -> AppConfig {
    let mut config = AppConfig {
        env: AppEnvironment::Testing,
        name: "Portfolio Contact Test".to_string(),
        host: "127.0.0.1".to_string(),
        port: 0,
        worker_count: 1,
        ..Default::default()
    };
    config.store.rest_url = "http://127.0.0.1:1".into();
    config.store.api_key = "test-api-key".into();
    config
}

#[allow(dead_code)]
pub const SIGNED_ORIGIN: &str = "https://portfolio.example";

#[allow(dead_code)]
pub fn signed_config() -> AppConfig {
    let mut config = test_config();
    config.cors_allow_origin = SIGNED_ORIGIN.into();
    config.csrf.mode = CsrfMode::Signed;
    config.csrf.secret = "test_csrf_secret_that_is_long_enough_1234567890".into();
    config
}
