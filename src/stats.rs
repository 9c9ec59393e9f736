use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use serde::Serialize;

/// Process-wide byte counter and uptime clock, shared across every
/// connection via `Arc`. The counter is relaxed-ordering: it's a monotonic
/// total with no ordering dependency on anything else, so there's nothing
/// for a stronger ordering to buy us.
#[derive(Debug)]
pub struct Stats {
    total_bytes_transferred: AtomicU64,
    start_time: Instant,
}

impl Stats {
    pub fn new() -> Self {
        Stats { total_bytes_transferred: AtomicU64::new(0), start_time: Instant::now() }
    }

    pub fn add_bytes(&self, n: u64) {
        if n > 0 {
            self.total_bytes_transferred.fetch_add(n, Ordering::Relaxed);
        }
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes_transferred.load(Ordering::Relaxed)
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn render(&self) -> StatsDocument {
        let mut secs = self.uptime_seconds();
        let days = secs / 86_400;
        secs %= 86_400;
        let hours = secs / 3_600;
        secs %= 3_600;
        let minutes = secs / 60;
        let seconds = secs % 60;

        StatsDocument {
            total_bytes_transferred: self.total_bytes(),
            uptime: Uptime { days, hours, minutes, seconds },
        }
    }
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Serialize)]
pub struct Uptime {
    pub days: u64,
    pub hours: u64,
    pub minutes: u64,
    pub seconds: u64,
}

#[derive(Debug, Serialize)]
pub struct StatsDocument {
    pub total_bytes_transferred: u64,
    pub uptime: Uptime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates_bytes() {
        let stats = Stats::new();
        stats.add_bytes(10);
        stats.add_bytes(5);
        assert_eq!(stats.total_bytes(), 15);
    }

    #[test]
    fn renders_expected_json_shape() {
        let stats = Stats::new();
        stats.add_bytes(42);
        let doc = stats.render();
        assert_eq!(doc.total_bytes_transferred, 42);
        let json = serde_json::to_string(&doc).unwrap();
        assert!(json.contains("\"total_bytes_transferred\":42"));
        assert!(json.contains("\"uptime\""));
        assert!(json.contains("\"days\""));
    }
}
