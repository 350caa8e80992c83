//! Server configuration

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use crate::bridge::DEFAULT_PATH_PREFIX;
use crate::error::ConfigError;
use crate::protocol::DEFAULT_MAX_FRAME_SIZE;
use crate::registry::RegistryConfig;
use crate::service::ServiceConfig;

/// Default native protocol port
pub const DEFAULT_NATIVE_PORT: u16 = 50051;

/// Default gateway port
pub const DEFAULT_GATEWAY_PORT: u16 = 8000;

/// Server configuration options
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Native protocol listen address
    pub native_addr: SocketAddr,

    /// WebSocket gateway listen address
    pub gateway_addr: SocketAddr,

    /// Request path prefix the gateway accepts; the rest is the room id
    pub gateway_path_prefix: String,

    /// Native server the gateway forwards to (None = this process)
    pub gateway_upstream: Option<SocketAddr>,

    /// Maximum concurrent connections across both listeners (0 = unlimited)
    pub max_connections: usize,

    /// Enable TCP_NODELAY (disable Nagle's algorithm)
    pub tcp_nodelay: bool,

    /// Largest native frame accepted or sent
    pub max_frame_size: usize,

    /// Room registry settings
    pub registry: RegistryConfig,

    /// Message service settings
    pub service: ServiceConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        let host = IpAddr::V4(Ipv4Addr::UNSPECIFIED);

        Self {
            native_addr: SocketAddr::new(host, DEFAULT_NATIVE_PORT),
            gateway_addr: SocketAddr::new(host, DEFAULT_GATEWAY_PORT),
            gateway_path_prefix: DEFAULT_PATH_PREFIX.to_string(),
            gateway_upstream: None,
            max_connections: 0,
            tcp_nodelay: true,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            registry: RegistryConfig::default(),
            service: ServiceConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from the environment
    ///
    /// Reads a `.env` file if present. Unset keys keep their defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "Loaded environment file");
        }

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from a key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(host) = parse_key::<IpAddr, _>(&lookup, "BIND_HOST")? {
            config.native_addr.set_ip(host);
            config.gateway_addr.set_ip(host);
        }
        if let Some(port) = parse_key::<u16, _>(&lookup, "NATIVE_PORT")? {
            config.native_addr.set_port(port);
        }
        if let Some(port) = parse_key::<u16, _>(&lookup, "GATEWAY_PORT")? {
            config.gateway_addr.set_port(port);
        }
        if let Some(upstream) = parse_key::<SocketAddr, _>(&lookup, "GATEWAY_UPSTREAM")? {
            config.gateway_upstream = Some(upstream);
        }
        if let Some(max) = parse_key::<usize, _>(&lookup, "MAX_CONNECTIONS")? {
            config.max_connections = max;
        }
        if let Some(secs) = parse_key::<u64, _>(&lookup, "STORE_TIMEOUT_SECS")? {
            config.service = config.service.store_timeout(Duration::from_secs(secs));
        }
        if let Some(capacity) = parse_key::<usize, _>(&lookup, "SUBSCRIBER_QUEUE_CAPACITY")? {
            config.registry = config.registry.queue_capacity(capacity);
        }

        Ok(config)
    }

    /// Set the native listen address
    pub fn native_addr(mut self, addr: SocketAddr) -> Self {
        self.native_addr = addr;
        self
    }

    /// Set the gateway listen address
    pub fn gateway_addr(mut self, addr: SocketAddr) -> Self {
        self.gateway_addr = addr;
        self
    }

    /// Set the gateway path prefix
    pub fn gateway_path_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.gateway_path_prefix = prefix.into();
        self
    }

    /// Forward gateway sessions to a remote native server
    pub fn gateway_upstream(mut self, addr: SocketAddr) -> Self {
        self.gateway_upstream = Some(addr);
        self
    }

    /// Set maximum connections
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }

    /// Set the native frame size limit
    pub fn max_frame_size(mut self, size: usize) -> Self {
        self.max_frame_size = size;
        self
    }

    /// Set registry configuration
    pub fn registry(mut self, registry: RegistryConfig) -> Self {
        self.registry = registry;
        self
    }

    /// Set service configuration
    pub fn service(mut self, service: ServiceConfig) -> Self {
        self.service = service;
        self
    }
}

fn parse_key<T, F>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        None => Ok(None),
        Some(value) if value.trim().is_empty() => Ok(None),
        Some(value) => {
            let parsed = value.trim().parse::<T>();
            match parsed {
                Ok(parsed) => Ok(Some(parsed)),
                Err(_) => Err(ConfigError::InvalidValue { key, value }),
            }
        }
    }
}
