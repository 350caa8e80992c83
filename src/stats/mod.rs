//! Operator-facing counters

pub mod metrics;

pub use metrics::{ConnectionKind, RegistryStats, ServerCounters, ServerStats};
