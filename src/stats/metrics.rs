//! Statistics for decode sessions

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::host::Delivery;

/// Lock-free counters updated from engine threads
#[derive(Debug, Default)]
pub struct SessionCounters {
    displayed: AtomicU64,
    delivered: AtomicU64,
    dropped: AtomicU64,
    failed: AtomicU64,
    lock_misses: AtomicU64,
}

impl SessionCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a display callback and its delivery outcome
    pub fn record_display(&self, outcome: Delivery) {
        self.displayed.fetch_add(1, Ordering::Relaxed);
        let counter = match outcome {
            Delivery::Delivered => &self.delivered,
            Delivery::Dropped => &self.dropped,
            Delivery::Failed => &self.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a lock callback that could not be answered
    pub fn record_lock_miss(&self) {
        self.lock_misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a snapshot
    pub fn snapshot(&self, negotiations: u32, uptime: Duration) -> SessionStats {
        SessionStats {
            frames_displayed: self.displayed.load(Ordering::Relaxed),
            frames_delivered: self.delivered.load(Ordering::Relaxed),
            deliveries_dropped: self.dropped.load(Ordering::Relaxed),
            deliveries_failed: self.failed.load(Ordering::Relaxed),
            lock_misses: self.lock_misses.load(Ordering::Relaxed),
            negotiations,
            uptime,
        }
    }
}

/// Session-level statistics
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Display callbacks that reached a sink
    pub frames_displayed: u64,
    /// Frames the sink accepted
    pub frames_delivered: u64,
    /// Frames dropped because the host runtime was unreachable
    pub deliveries_dropped: u64,
    /// Frames the sink rejected or panicked on
    pub deliveries_failed: u64,
    /// Lock callbacks answered with no buffer
    pub lock_misses: u64,
    /// Completed format negotiations
    pub negotiations: u32,
    /// Time since the session was created
    pub uptime: Duration,
}

impl SessionStats {
    /// Delivered frames per second over the session lifetime
    pub fn delivery_rate(&self) -> f64 {
        let secs = self.uptime.as_secs_f64();
        if secs > 0.0 {
            self.frames_delivered as f64 / secs
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_start_at_zero() {
        let counters = SessionCounters::new();
        let stats = counters.snapshot(0, Duration::ZERO);
        assert_eq!(stats, SessionStats::default());
    }

    #[test]
    fn test_record_display_outcomes() {
        let counters = SessionCounters::new();
        counters.record_display(Delivery::Delivered);
        counters.record_display(Delivery::Delivered);
        counters.record_display(Delivery::Dropped);
        counters.record_display(Delivery::Failed);
        counters.record_lock_miss();

        let stats = counters.snapshot(1, Duration::from_secs(2));
        assert_eq!(stats.frames_displayed, 4);
        assert_eq!(stats.frames_delivered, 2);
        assert_eq!(stats.deliveries_dropped, 1);
        assert_eq!(stats.deliveries_failed, 1);
        assert_eq!(stats.lock_misses, 1);
        assert_eq!(stats.negotiations, 1);
    }

    #[test]
    fn test_delivery_rate() {
        let stats = SessionStats {
            frames_delivered: 300,
            uptime: Duration::from_secs(10),
            ..Default::default()
        };
        assert_eq!(stats.delivery_rate(), 30.0);

        let stats = SessionStats::default();
        assert_eq!(stats.delivery_rate(), 0.0);
    }
}
