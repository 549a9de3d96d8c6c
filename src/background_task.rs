use tokio::time::{interval, Duration, MissedTickBehavior};

use crate::limiter::rate_limiter::InMemoryRateLimiter;

/// Periodically drops in-memory rate windows that have expired.
pub async fn start_limiter_sweep(limiter: InMemoryRateLimiter, every: Duration) {
    let mut interval = interval(every);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        interval.tick().await;

        let removed = limiter.sweep();
        if removed > 0 {
            tracing::info!(
                removed,
                tracked = limiter.tracked_clients(),
                "Swept expired rate limit windows"
            );
        } else {
            tracing::debug!("Rate limit sweep found nothing to remove");
        }
    }
}
