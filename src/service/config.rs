//! Distribution service configuration

use std::time::Duration;

/// Default deadline for a single store call
pub const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_secs(5);

/// Message service configuration
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Deadline applied to every store call
    pub store_timeout: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }
}

impl ServiceConfig {
    /// Set the store deadline
    pub fn store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }
}
