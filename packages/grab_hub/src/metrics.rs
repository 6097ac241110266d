//! Server metrics for observability
//!
//! Runtime counters for monitoring hub health and traffic.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Server-wide metrics
#[derive(Debug, Default)]
pub struct ServerMetrics {
    // Session metrics
    /// Currently connected WebSocket sessions
    pub active_sessions: AtomicU64,
    /// Total sessions since server start
    pub total_sessions: AtomicU64,

    // Subscription metrics
    pub subscriptions_started: AtomicU64,
    pub subscriptions_ended: AtomicU64,

    // Traffic metrics
    /// Inbound command frames decoded successfully
    pub commands_received: AtomicU64,
    /// Inbound frames dropped as malformed
    pub commands_rejected: AtomicU64,
    /// Outbound batch frames written
    pub batches_sent: AtomicU64,
    /// Events carried by those batches
    pub events_sent: AtomicU64,
    /// Events lost to live-feed lag
    pub events_dropped: AtomicU64,
    /// Batches dropped on serialization failure
    pub serialize_failures: AtomicU64,

    /// Server start time (for uptime calculation)
    start_time: Option<Instant>,
}

impl ServerMetrics {
    pub fn new() -> Self {
        Self {
            start_time: Some(Instant::now()),
            ..Default::default()
        }
    }

    // Session tracking
    pub fn session_opened(&self) {
        self.active_sessions.fetch_add(1, Ordering::Relaxed);
        self.total_sessions.fetch_add(1, Ordering::Relaxed);
    }

    pub fn session_closed(&self) {
        self.active_sessions.fetch_sub(1, Ordering::Relaxed);
    }

    // Subscription tracking
    pub fn subscription_started(&self) {
        self.subscriptions_started.fetch_add(1, Ordering::Relaxed);
    }

    pub fn subscription_ended(&self) {
        self.subscriptions_ended.fetch_add(1, Ordering::Relaxed);
    }

    pub fn subscriptions_ended_by(&self, n: u64) {
        self.subscriptions_ended.fetch_add(n, Ordering::Relaxed);
    }

    // Traffic tracking
    pub fn command_received(&self) {
        self.commands_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn command_rejected(&self) {
        self.commands_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn batch_sent(&self, events: u64) {
        self.batches_sent.fetch_add(1, Ordering::Relaxed);
        self.events_sent.fetch_add(events, Ordering::Relaxed);
    }

    pub fn events_dropped_by(&self, n: u64) {
        self.events_dropped.fetch_add(n, Ordering::Relaxed);
    }

    pub fn serialize_failure(&self) {
        self.serialize_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.map(|t| t.elapsed().as_secs()).unwrap_or(0)
    }

    /// Create a snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        let started = self.subscriptions_started.load(Ordering::Relaxed);
        let ended = self.subscriptions_ended.load(Ordering::Relaxed);
        MetricsSnapshot {
            uptime_secs: self.uptime_secs(),
            sessions: SessionMetrics {
                active: self.active_sessions.load(Ordering::Relaxed),
                total: self.total_sessions.load(Ordering::Relaxed),
            },
            subscriptions: SubscriptionMetrics {
                active: started.saturating_sub(ended),
                started,
                ended,
            },
            traffic: TrafficMetrics {
                commands_received: self.commands_received.load(Ordering::Relaxed),
                commands_rejected: self.commands_rejected.load(Ordering::Relaxed),
                batches_sent: self.batches_sent.load(Ordering::Relaxed),
                events_sent: self.events_sent.load(Ordering::Relaxed),
                events_dropped: self.events_dropped.load(Ordering::Relaxed),
                serialize_failures: self.serialize_failures.load(Ordering::Relaxed),
            },
        }
    }
}

/// Serializable snapshot of metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub uptime_secs: u64,
    pub sessions: SessionMetrics,
    pub subscriptions: SubscriptionMetrics,
    pub traffic: TrafficMetrics,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMetrics {
    pub active: u64,
    pub total: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionMetrics {
    pub active: u64,
    pub started: u64,
    pub ended: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrafficMetrics {
    pub commands_received: u64,
    pub commands_rejected: u64,
    pub batches_sent: u64,
    pub events_sent: u64,
    pub events_dropped: u64,
    pub serialize_failures: u64,
}

/// Health status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub sessions: u64,
    pub subscriptions: u64,
    pub uptime_secs: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_tracking() {
        let metrics = ServerMetrics::new();

        metrics.session_opened();
        metrics.session_opened();
        assert_eq!(metrics.active_sessions.load(Ordering::Relaxed), 2);
        assert_eq!(metrics.total_sessions.load(Ordering::Relaxed), 2);

        metrics.session_closed();
        assert_eq!(metrics.active_sessions.load(Ordering::Relaxed), 1);
        assert_eq!(metrics.total_sessions.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn test_subscription_balance() {
        let metrics = ServerMetrics::new();

        metrics.subscription_started();
        metrics.subscription_started();
        metrics.subscription_started();
        metrics.subscriptions_ended_by(2);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.subscriptions.started, 3);
        assert_eq!(snapshot.subscriptions.ended, 2);
        assert_eq!(snapshot.subscriptions.active, 1);
    }

    #[test]
    fn test_snapshot() {
        let metrics = ServerMetrics::new();
        metrics.session_opened();
        metrics.command_received();
        metrics.batch_sent(5);
        metrics.events_dropped_by(2);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.sessions.active, 1);
        assert_eq!(snapshot.traffic.commands_received, 1);
        assert_eq!(snapshot.traffic.batches_sent, 1);
        assert_eq!(snapshot.traffic.events_sent, 5);
        assert_eq!(snapshot.traffic.events_dropped, 2);
    }
}
