use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use dotenv::dotenv;
use std::{env, fmt, str::FromStr, time::Duration};
use url::Url;
use uuid::Uuid;

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum AppEnvironment {
    Development,
    Production,
    Testing,
}

impl FromStr for AppEnvironment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "development" => Ok(AppEnvironment::Development),
            "production" => Ok(AppEnvironment::Production),
            "testing" => Ok(AppEnvironment::Testing),
            _ => Err(ConfigError::Message(format!("Invalid environment: {}", s))),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogSettings {
    #[serde(default = "default_log_format")]
    pub format: LogFormat,

    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogSettings {
    fn default() -> Self {
        LogSettings {
            format: default_log_format(),
            level: default_log_level(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LimiterBackend {
    Memory,
    Redis,
}

#[derive(Deserialize, Clone)]
pub struct RateLimitSettings {
    #[serde(default = "default_limiter_backend")]
    pub backend: LimiterBackend,

    #[serde(default = "default_max_requests")]
    pub max_requests: u32,

    #[serde(default = "default_window_secs")]
    pub window_secs: u64,

    /// Upper bound on distinct client identities tracked in memory.
    #[serde(default = "default_max_tracked_clients")]
    pub max_tracked_clients: usize,

    #[serde(default = "default_retry_after_secs")]
    pub retry_after_secs: u64,

    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    #[serde(default)]
    pub redis_url: Option<String>,

    #[serde(default = "default_redis_key_prefix")]
    pub redis_key_prefix: String,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        RateLimitSettings {
            backend: default_limiter_backend(),
            max_requests: default_max_requests(),
            window_secs: default_window_secs(),
            max_tracked_clients: default_max_tracked_clients(),
            retry_after_secs: default_retry_after_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            redis_url: None,
            redis_key_prefix: default_redis_key_prefix(),
        }
    }
}

impl RateLimitSettings {
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum CsrfMode {
    /// Accept any token of the expected length.
    Shape,
    /// Require a server-issued token bound to the session cookie.
    Signed,
}

#[derive(Deserialize, Clone)]
pub struct CsrfSettings {
    #[serde(default = "default_csrf_mode")]
    pub mode: CsrfMode,

    #[serde(default = "default_csrf_header")]
    pub header: String,

    #[serde(default = "default_csrf_token_length")]
    pub token_length: usize,

    #[serde(default)]
    pub secret: String,

    #[serde(default = "default_csrf_token_ttl_secs")]
    pub token_ttl_secs: i64,

    #[serde(default = "default_csrf_cookie_name")]
    pub cookie_name: String,
}

impl Default for CsrfSettings {
    fn default() -> Self {
        CsrfSettings {
            mode: default_csrf_mode(),
            header: default_csrf_header(),
            token_length: default_csrf_token_length(),
            secret: String::new(),
            token_ttl_secs: default_csrf_token_ttl_secs(),
            cookie_name: default_csrf_cookie_name(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum MissingIdentityPolicy {
    /// Every anonymous client shares the sentinel bucket.
    Shared,
    /// Use the TCP peer address before falling back to the sentinel.
    Peer,
    /// Refuse requests that carry no identity.
    Reject,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IdentitySettings {
    #[serde(default = "default_identity_header")]
    pub header: String,

    #[serde(default = "default_on_missing")]
    pub on_missing: MissingIdentityPolicy,
}

impl Default for IdentitySettings {
    fn default() -> Self {
        IdentitySettings {
            header: default_identity_header(),
            on_missing: default_on_missing(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Rest,
    Postgres,
}

#[derive(Deserialize, Clone)]
pub struct StoreSettings {
    #[serde(default = "default_store_backend")]
    pub backend: StoreBackend,

    #[serde(default)]
    pub rest_url: String,

    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_store_table")]
    pub table: String,

    #[serde(default)]
    pub database_url: String,

    #[serde(default = "default_store_timeout_ms")]
    pub timeout_ms: u64,

    /// Portfolio owner recorded on every submission, when set.
    #[serde(default)]
    pub owner_id: Option<Uuid>,
}

impl Default for StoreSettings {
    fn default() -> Self {
        StoreSettings {
            backend: default_store_backend(),
            rest_url: String::new(),
            api_key: String::new(),
            table: default_store_table(),
            database_url: String::new(),
            timeout_ms: default_store_timeout_ms(),
            owner_id: None,
        }
    }
}

impl StoreSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Deserialize, Clone)]
#[serde(rename_all = "snake_case")]
pub struct AppConfig {
    #[serde(default = "default_env")]
    pub env: AppEnvironment,

    #[serde(default = "default_name")]
    pub name: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_worker_count")]
    pub worker_count: usize,

    #[serde(default = "default_payload_limit")]
    pub payload_limit: usize,

    #[serde(default = "default_cors_origin")]
    pub cors_allow_origin: String,

    #[serde(default)]
    pub log: LogSettings,

    #[serde(default)]
    pub rate_limit: RateLimitSettings,

    #[serde(default)]
    pub csrf: CsrfSettings,

    #[serde(default)]
    pub identity: IdentitySettings,

    #[serde(default)]
    pub store: StoreSettings,
}

fn default_env() -> AppEnvironment {
    AppEnvironment::Development
}
fn default_name() -> String {
    "Portfolio-Contact".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_worker_count() -> usize {
    num_cpus::get()
}
fn default_payload_limit() -> usize {
    64 * 1024
}
fn default_cors_origin() -> String {
    "*".to_string()
}
fn default_log_format() -> LogFormat {
    LogFormat::Pretty
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_limiter_backend() -> LimiterBackend {
    LimiterBackend::Memory
}
fn default_max_requests() -> u32 {
    10
}
fn default_window_secs() -> u64 {
    60
}
fn default_max_tracked_clients() -> usize {
    500
}
fn default_retry_after_secs() -> u64 {
    60
}
fn default_sweep_interval_secs() -> u64 {
    30
}
fn default_redis_key_prefix() -> String {
    "rl:contact".to_string()
}
fn default_csrf_mode() -> CsrfMode {
    CsrfMode::Shape
}
fn default_csrf_header() -> String {
    "x-csrf-token".to_string()
}
fn default_csrf_token_length() -> usize {
    32
}
fn default_csrf_token_ttl_secs() -> i64 {
    60 * 60
}
fn default_csrf_cookie_name() -> String {
    "contact_sid".to_string()
}
fn default_identity_header() -> String {
    "x-forwarded-for".to_string()
}
fn default_on_missing() -> MissingIdentityPolicy {
    MissingIdentityPolicy::Shared
}
fn default_store_backend() -> StoreBackend {
    StoreBackend::Rest
}
fn default_store_table() -> String {
    "contacts".to_string()
}
fn default_store_timeout_ms() -> u64 {
    5_000
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            env: default_env(),
            name: default_name(),
            port: default_port(),
            host: default_host(),
            worker_count: default_worker_count(),
            payload_limit: default_payload_limit(),
            cors_allow_origin: default_cors_origin(),
            log: LogSettings::default(),
            rate_limit: RateLimitSettings::default(),
            csrf: CsrfSettings::default(),
            identity: IdentitySettings::default(),
            store: StoreSettings::default(),
        }
    }
}

impl AppConfig {
    pub fn new() -> Result<Self, ConfigError> {
        dotenv().ok();

        let raw_env = env::var("APP_ENV").unwrap_or_else(|_| "development".into());
        let env_name = AppEnvironment::from_str(&raw_env)
            .map_err(|_| ConfigError::Message(format!("Invalid APP_ENV value: {}", raw_env)))?;

        let builder = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env_name)).required(false))
            .add_source(
                Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__")
                    .ignore_empty(true),
            );

        let mut config: Self = builder.build()?.try_deserialize()?;

        config.env = env_name;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if self.rate_limit.max_requests == 0 {
            errors.push("RATE_LIMIT__MAX_REQUESTS must be positive".to_string());
        }
        if self.rate_limit.window_secs == 0 {
            errors.push("RATE_LIMIT__WINDOW_SECS must be positive".to_string());
        }
        if self.rate_limit.max_tracked_clients == 0 {
            errors.push("RATE_LIMIT__MAX_TRACKED_CLIENTS must be positive".to_string());
        }
        if self.rate_limit.sweep_interval_secs == 0 {
            errors.push("RATE_LIMIT__SWEEP_INTERVAL_SECS must be positive".to_string());
        }
        if self.rate_limit.backend == LimiterBackend::Redis
            && self.rate_limit.redis_url.as_deref().is_none_or(|u| u.trim().is_empty())
        {
            errors.push("RATE_LIMIT__REDIS_URL must be set for the redis backend".to_string());
        }

        if self.csrf.header.trim().is_empty() {
            errors.push("CSRF__HEADER cannot be empty".to_string());
        }
        if self.csrf.mode == CsrfMode::Signed {
            if self.csrf.secret.len() < 32 {
                errors.push("CSRF__SECRET must be at least 32 characters in signed mode".to_string());
            }
            if self.csrf.token_ttl_secs <= 0 {
                errors.push("CSRF__TOKEN_TTL_SECS must be positive".to_string());
            }
            if self.cors_allow_origin.trim() == "*" {
                errors.push("CORS_ALLOW_ORIGIN must name a specific origin in signed CSRF mode".to_string());
            }
        }

        if self.identity.header.trim().is_empty() {
            errors.push("IDENTITY__HEADER cannot be empty".to_string());
        }

        match self.store.backend {
            StoreBackend::Rest => {
                if Url::parse(&self.store.rest_url).is_err() {
                    errors.push("STORE__REST_URL must be a valid URL".to_string());
                }
                if self.store.api_key.trim().is_empty() {
                    errors.push("STORE__API_KEY cannot be empty".to_string());
                }
            }
            StoreBackend::Postgres => {
                if self.store.database_url.trim().is_empty() {
                    errors.push("STORE__DATABASE_URL cannot be empty".to_string());
                }
            }
        }
        if self.store.table.trim().is_empty() {
            errors.push("STORE__TABLE cannot be empty".to_string());
        }
        if self.store.timeout_ms == 0 {
            errors.push("STORE__TIMEOUT_MS must be positive".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Message(errors.join(", ")))
        }
    }
}

impl fmt::Display for AppEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AppEnvironment::Development => "development",
            AppEnvironment::Production => "production",
            AppEnvironment::Testing => "testing",
        };
        write!(f, "{s}")
    }
}

trait Redact {
    fn redact(&self) -> &str;
}

impl Redact for str {
    fn redact(&self) -> &str {
        if self.is_empty() {
            "[MISSING]"
        } else {
            "[REDACTED]"
        }
    }
}

impl Redact for String {
    fn redact(&self) -> &str {
        self.as_str().redact()
    }
}

impl fmt::Debug for RateLimitSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimitSettings")
            .field("backend", &self.backend)
            .field("max_requests", &self.max_requests)
            .field("window_secs", &self.window_secs)
            .field("max_tracked_clients", &self.max_tracked_clients)
            .field("retry_after_secs", &self.retry_after_secs)
            .field("sweep_interval_secs", &self.sweep_interval_secs)
            .field("redis_url", &self.redis_url.as_deref().map(|url| url.redact()))
            .field("redis_key_prefix", &self.redis_key_prefix)
            .finish()
    }
}

impl fmt::Debug for CsrfSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CsrfSettings")
            .field("mode", &self.mode)
            .field("header", &self.header)
            .field("token_length", &self.token_length)
            .field("secret", &self.secret.redact())
            .field("token_ttl_secs", &self.token_ttl_secs)
            .field("cookie_name", &self.cookie_name)
            .finish()
    }
}

impl fmt::Debug for StoreSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreSettings")
            .field("backend", &self.backend)
            .field("rest_url", &self.rest_url)
            .field("api_key", &self.api_key.redact())
            .field("table", &self.table)
            .field("database_url", &self.database_url.redact())
            .field("timeout_ms", &self.timeout_ms)
            .field("owner_id", &self.owner_id)
            .finish()
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("name", &self.name)
            .field("port", &self.port)
            .field("host", &self.host)
            .field("worker_count", &self.worker_count)
            .field("payload_limit", &self.payload_limit)
            .field("cors_allow_origin", &self.cors_allow_origin)
            .field("log", &self.log)
            .field("rate_limit", &self.rate_limit)
            .field("csrf", &self.csrf)
            .field("identity", &self.identity)
            .field("store", &self.store)
            .finish()
    }
}
