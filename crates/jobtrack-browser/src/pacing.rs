use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::trace;

/// Spaces out requests to the same domain.
///
/// Each caller reserves the next free slot for its domain, then sleeps until
/// it, so concurrent callers queue up instead of bursting.
#[derive(Debug)]
pub struct DomainPacer {
    next_slot: Mutex<HashMap<String, Instant>>,
    min_delay: Duration,
}

impl DomainPacer {
    pub fn new(min_delay: Duration) -> Self {
        Self {
            next_slot: Mutex::new(HashMap::new()),
            min_delay,
        }
    }

    /// Wait until `domain` may be hit again.
    pub async fn wait(&self, domain: &str) {
        let slot = {
            let mut slots = self.next_slot.lock().await;
            let now = Instant::now();
            let slot = slots
                .get(domain)
                .copied()
                .filter(|next| *next > now)
                .unwrap_or(now);
            slots.insert(domain.to_string(), slot + self.min_delay);
            slot
        };

        if slot > Instant::now() {
            trace!(domain, wait_ms = (slot - Instant::now()).as_millis(), "pacing request");
            tokio::time::sleep_until(slot).await;
        }
    }
}
