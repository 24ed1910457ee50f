use std::time::Duration;

/// Read and write secrets distinguishing `TAIL`/`PING`/`QUERY` from `WRITE`.
#[derive(Clone)]
pub struct Secrets {
    pub read: Vec<u8>,
    pub write: Vec<u8>,
}

#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub every: Duration,
    pub burst: u32,
}

#[derive(Clone)]
pub struct ServiceConfig {
    pub laddr_port: String,
    pub worker_pool_size: usize,
    pub secrets: Secrets,
    /// How often the guard's replay filter is fully cleared.
    pub guard_reset_period: Duration,
    pub tail_rate_limit: RateLimitConfig,
    pub query_rate_limit: RateLimitConfig,
    pub ping_period: Duration,
    pub missed_pings_allowed: u32,
    /// Hard ceiling applied to every query's effective limit, regardless of
    /// what the client requested (0 meaning "uncapped" resolves to this).
    pub query_hard_limit: usize,
}
