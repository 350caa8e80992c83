//! Statistics and metrics for the fan-out server

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Registry-wide counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RegistryStats {
    /// Rooms with at least one subscriber
    pub rooms: usize,
    /// Live subscriptions across all rooms
    pub subscribers: usize,
    /// Publish calls, including those to empty rooms
    pub published: u64,
    /// Messages accepted by subscriber queues
    pub delivered: u64,
    /// Messages lost to full subscriber queues
    pub dropped: u64,
}

impl RegistryStats {
    /// Fraction of offered messages that were dropped
    pub fn drop_ratio(&self) -> f64 {
        let offered = self.delivered + self.dropped;
        if offered > 0 {
            self.dropped as f64 / offered as f64
        } else {
            0.0
        }
    }
}

/// Server-wide statistics snapshot
#[derive(Debug, Clone, Default)]
pub struct ServerStats {
    /// Native protocol connections ever accepted
    pub total_native_connections: u64,
    /// Native protocol connections currently open
    pub active_native_connections: u64,
    /// Gateway connections ever accepted
    pub total_gateway_connections: u64,
    /// Gateway connections currently open
    pub active_gateway_connections: u64,
    /// Connections refused by the connection limit
    pub rejected_connections: u64,
    /// Uptime
    pub uptime: Duration,
}

/// Live counters behind [`ServerStats`]
#[derive(Debug)]
pub struct ServerCounters {
    started_at: Instant,
    total_native: AtomicU64,
    active_native: AtomicU64,
    total_gateway: AtomicU64,
    active_gateway: AtomicU64,
    rejected: AtomicU64,
}

/// Kind of client connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionKind {
    /// Native duplex protocol over TCP
    Native,
    /// WebSocket gateway
    Gateway,
}

impl ServerCounters {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            total_native: AtomicU64::new(0),
            active_native: AtomicU64::new(0),
            total_gateway: AtomicU64::new(0),
            active_gateway: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
        }
    }

    /// Record an accepted connection
    pub fn connection_opened(&self, kind: ConnectionKind) {
        let (total, active) = self.pair(kind);
        total.fetch_add(1, Ordering::Relaxed);
        active.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a closed connection
    pub fn connection_closed(&self, kind: ConnectionKind) {
        let (_, active) = self.pair(kind);
        active.fetch_sub(1, Ordering::Relaxed);
    }

    /// Record a connection refused by the limit
    pub fn connection_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Take a snapshot
    pub fn snapshot(&self) -> ServerStats {
        ServerStats {
            total_native_connections: self.total_native.load(Ordering::Relaxed),
            active_native_connections: self.active_native.load(Ordering::Relaxed),
            total_gateway_connections: self.total_gateway.load(Ordering::Relaxed),
            active_gateway_connections: self.active_gateway.load(Ordering::Relaxed),
            rejected_connections: self.rejected.load(Ordering::Relaxed),
            uptime: self.started_at.elapsed(),
        }
    }

    fn pair(&self, kind: ConnectionKind) -> (&AtomicU64, &AtomicU64) {
        match kind {
            ConnectionKind::Native => (&self.total_native, &self.active_native),
            ConnectionKind::Gateway => (&self.total_gateway, &self.active_gateway),
        }
    }
}

impl Default for ServerCounters {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_stats_drop_ratio() {
        let stats = RegistryStats {
            delivered: 6,
            dropped: 2,
            ..Default::default()
        };
        assert!((stats.drop_ratio() - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn test_registry_stats_drop_ratio_nothing_offered() {
        assert_eq!(RegistryStats::default().drop_ratio(), 0.0);
    }

    #[test]
    fn test_server_counters() {
        let counters = ServerCounters::new();

        counters.connection_opened(ConnectionKind::Native);
        counters.connection_opened(ConnectionKind::Native);
        counters.connection_opened(ConnectionKind::Gateway);
        counters.connection_closed(ConnectionKind::Native);
        counters.connection_rejected();

        let stats = counters.snapshot();
        assert_eq!(stats.total_native_connections, 2);
        assert_eq!(stats.active_native_connections, 1);
        assert_eq!(stats.total_gateway_connections, 1);
        assert_eq!(stats.active_gateway_connections, 1);
        assert_eq!(stats.rejected_connections, 1);
    }
}
