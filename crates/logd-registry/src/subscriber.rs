use logd_proto::{Msg, QueryParams};
use logd_ratelimit::TokenBucket;
use std::sync::Arc;
use std::time::Instant;

/// A live tailer: identity is the remote address+port string held as the key
/// in [`crate::Registry`]'s table.
pub struct Subscriber {
    pub query_params: QueryParams,
    pub limiter: Arc<TokenBucket>,
    pub last_ping: Instant,
}

impl Subscriber {
    pub fn new(query_params: QueryParams, limiter: Arc<TokenBucket>) -> Self {
        Self {
            query_params,
            limiter,
            last_ping: Instant::now(),
        }
    }
}

/// Whether `msg` matches `sub`'s filters: key prefix, minimum severity, and
/// the optional HTTP metadata predicates, all applied identically when set.
pub fn should_send(sub: &Subscriber, msg: &Msg) -> bool {
    let p = &sub.query_params;

    if !p.key_prefix.is_empty() && !msg.key.starts_with(p.key_prefix.as_str()) {
        return false;
    }
    if let Some(floor) = p.lvl {
        match msg.lvl {
            Some(lvl) => {
                if lvl > floor {
                    return false;
                }
            }
            None => return false,
        }
    }
    if let Some(method) = p.http_method {
        if msg.http_method != Some(method) {
            return false;
        }
    }
    if let Some(ref url_prefix) = p.url {
        match &msg.url {
            Some(url) if url.starts_with(url_prefix.as_str()) => {}
            _ => return false,
        }
    }
    if let Some(status) = p.response_status {
        if msg.response_status != Some(status) {
            return false;
        }
    }
    true
}
