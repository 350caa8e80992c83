//! Registry configuration

/// Default number of messages a subscriber queue holds before dropping
pub const DEFAULT_QUEUE_CAPACITY: usize = 10;

/// Room registry configuration
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Capacity of each subscriber's delivery queue
    pub queue_capacity: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl RegistryConfig {
    /// Set the subscriber queue capacity (at least 1)
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        assert_eq!(RegistryConfig::default().queue_capacity, DEFAULT_QUEUE_CAPACITY);
    }

    #[test]
    fn test_queue_capacity_floor() {
        let config = RegistryConfig::default().queue_capacity(0);
        assert_eq!(config.queue_capacity, 1);
    }
}
