//! The datagram service: a socket reader, a worker pool that verifies and
//! dispatches `WRITE`/`TAIL`/`PING`/`QUERY` commands, and the query engine.

mod config;
mod metrics;
mod pool;
mod query;
mod service;

pub use config::{RateLimitConfig, Secrets, ServiceConfig};
pub use metrics::ServiceMetrics;
pub use service::{spawn, DatagramService};
