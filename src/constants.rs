use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;

pub static START_TIME: Lazy<DateTime<Utc>> = Lazy::new(Utc::now);

/// Message returned for a stored submission.
pub const CONTACT_SENT_MESSAGE: &str = "Message sent successfully";

/// Seconds a `/health` report is served from cache.
pub const HEALTH_CACHE_TTL_SECS: i64 = 5;
