use logd_proto::{decode_msg, encode_msg, Msg, QueryParams, END_SENTINEL};
use logd_ratelimit::TokenBucket;
use logd_store::Store;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::net::UdpSocket;

/// Pause before the `+END` sentinel, giving in-flight datagrams a head
/// start so they are likely (not guaranteed) to arrive first.
const DRAIN_PAUSE: Duration = Duration::from_millis(20);

/// Runs a `QUERY`: streams matching records to `addr`, then sends the
/// `+END` sentinel. Runs on the worker task that received the command.
pub async fn run(
    store: &Store,
    socket: &UdpSocket,
    addr: SocketAddr,
    params: &QueryParams,
    rate_limiter: &TokenBucket,
    hard_limit: usize,
) {
    let resolved_limit = if params.limit == 0 {
        hard_limit
    } else {
        (params.limit as usize).min(hard_limit)
    };

    let records = store.read(&params.key_prefix, params.offset as usize, resolved_limit);
    for record in records {
        let Ok(msg) = decode_msg(&record) else {
            continue;
        };
        if !matches(params, &msg) {
            continue;
        }
        rate_limiter.acquire().await;
        if let Err(e) = socket.send_to(&record, addr).await {
            eprintln!("logd-net: query send to {addr} failed: {e}");
        }
    }

    tokio::time::sleep(DRAIN_PAUSE).await;
    let end = Msg::reply(END_SENTINEL, now_nanos());
    if let Err(e) = socket.send_to(&encode_msg(&end), addr).await {
        eprintln!("logd-net: query end-sentinel send to {addr} failed: {e}");
    }
}

fn matches(params: &QueryParams, msg: &Msg) -> bool {
    if !params.key_prefix.is_empty() && !msg.key.starts_with(params.key_prefix.as_str()) {
        return false;
    }
    if let Some(t_start) = params.t_start {
        if msg.t < t_start {
            return false;
        }
    }
    if let Some(t_end) = params.t_end {
        if msg.t > t_end {
            return false;
        }
    }
    if let Some(floor) = params.lvl {
        match msg.lvl {
            Some(lvl) if lvl <= floor => {}
            _ => return false,
        }
    }
    if let Some(ref needle) = params.txt {
        match &msg.txt {
            Some(txt) if txt.to_lowercase().contains(&needle.to_lowercase()) => {}
            _ => return false,
        }
    }
    if let Some(method) = params.http_method {
        if msg.http_method != Some(method) {
            return false;
        }
    }
    if let Some(ref url_prefix) = params.url {
        match &msg.url {
            Some(url) if url.starts_with(url_prefix.as_str()) => {}
            _ => return false,
        }
    }
    if let Some(status) = params.response_status {
        if msg.response_status != Some(status) {
            return false;
        }
    }
    true
}

fn now_nanos() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use logd_store::StoreConfig;
    use std::collections::HashMap;
    use tokio::net::UdpSocket;

    fn store() -> Store {
        let mut ring_sizes = HashMap::new();
        ring_sizes.insert("/prod/api".to_string(), 32);
        Store::new(StoreConfig {
            ring_sizes,
            fallback_size: 8,
        })
    }

    fn msg(key: &str, txt: &str) -> Msg {
        Msg {
            t: 0,
            key: key.to_string(),
            lvl: None,
            txt: Some(txt.to_string()),
            http_method: None,
            url: None,
            response_status: None,
        }
    }

    #[tokio::test]
    async fn query_streams_matches_then_sentinel() {
        let store = store();
        for i in 0..5 {
            store.write("/prod/api", encode_msg(&msg("/prod/api/foo", &format!("m{i}"))));
        }

        let server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let client_addr = client.local_addr().unwrap();

        let params = QueryParams {
            key_prefix: "/prod/api".to_string(),
            offset: 0,
            limit: 3,
            ..Default::default()
        };
        let limiter = TokenBucket::unlimited();

        run(&store, &server, client_addr, &params, &limiter, 100_000).await;

        let mut buf = [0u8; 1920];
        let mut received = Vec::new();
        for _ in 0..4 {
            let (len, _) = client.recv_from(&mut buf).await.unwrap();
            received.push(decode_msg(&buf[..len]).unwrap());
        }
        assert_eq!(received.len(), 4);
        assert_eq!(received[3].txt.as_deref(), Some(END_SENTINEL));
        assert_eq!(received[3].key, logd_proto::REPLY_KEY);
    }
}
