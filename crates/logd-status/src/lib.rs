//! The HTTP status endpoint: a background snapshot-recompute task, a
//! per-caller rate limiter, and the Axum server that serves the cached
//! snapshot on every request.

mod rate_limit;
mod server;
mod snapshot;

pub use server::{spawn, StatusConfig};
pub use snapshot::{RingInfo, StatusSnapshot, StoreSnapshot, UdpSnapshot};
