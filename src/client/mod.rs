//! Native protocol client
//!
//! Used by the gateway to reach a remote native server, and by tools and
//! tests that talk to a server directly.

pub mod config;
pub mod connector;

pub use config::ClientConfig;
pub use connector::{ChatClient, TcpConnector, TcpEventSink, TcpEventSource};
