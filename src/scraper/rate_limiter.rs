use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

/// Minimum spacing between requests to the same domain.
///
/// Owned by whoever issues the requests; there is no process-wide instance.
pub struct RateLimiter {
    next_slot: Mutex<HashMap<String, Instant>>,
    delay: Duration,
}

impl RateLimiter {
    pub fn new(delay: Duration) -> Self {
        Self {
            next_slot: Mutex::new(HashMap::new()),
            delay,
        }
    }

    /// Reserve the next slot for `domain` and sleep until it opens
    pub async fn wait_for_domain(&self, domain: &str) {
        let wait = {
            let mut slots = self.next_slot.lock().await;
            let now = Instant::now();
            let slot = slots.get(domain).copied().filter(|s| *s > now).unwrap_or(now);
            slots.insert(domain.to_string(), slot + self.delay);
            slot.saturating_duration_since(now)
        };

        if !wait.is_zero() {
            debug!("Rate limiting: waiting {}ms for domain {}", wait.as_millis(), domain);
            tokio::time::sleep(wait).await;
        }
    }

}
