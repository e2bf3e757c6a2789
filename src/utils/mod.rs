use std::time::{Duration, Instant};
use tracing::debug;

/// Wall-clock timer for logging how long a scrape run took.
pub struct Timer {
    label: String,
    start: Instant,
}

impl Timer {
    pub fn start(label: impl Into<String>) -> Self {
        let label = label.into();
        debug!("starting: {}", label);
        Self {
            label,
            start: Instant::now(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        debug!("finished: {} (took {:.2?})", self.label, self.start.elapsed());
    }
}

/// Truncate to at most `max_chars` characters without splitting a char.
/// Used to keep model submissions inside their character budget.
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
