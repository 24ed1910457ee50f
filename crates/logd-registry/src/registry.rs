use crate::subscriber::{should_send, Subscriber};
use async_trait::async_trait;
use logd_proto::{encode_msg, Msg, KICK_SENTINEL};
use logd_ratelimit::TokenBucket;
use logd_shutdown::ShutdownSignal;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Where the service loop delivers fan-out and kick datagrams. Implemented
/// over the real datagram socket by the service that owns it; the registry
/// itself never touches a socket.
#[async_trait]
pub trait DatagramSink: Send + Sync {
    async fn send_to(&self, bytes: &[u8], addr: &str);
}

/// A request to register a new tailer, carried on the `new_tail` channel.
pub struct NewTail {
    pub addr: String,
    pub query_params: logd_proto::QueryParams,
    pub limiter: Arc<TokenBucket>,
}

/// Tuning for the liveness sweep: a subscriber is kicked once its last ping
/// is older than `ping_period * missed_pings_allowed`.
#[derive(Debug, Clone, Copy)]
pub struct LivenessConfig {
    pub ping_period: Duration,
    pub missed_pings_allowed: u32,
}

/// A cloneable handle to the running service loop's three input channels.
#[derive(Clone)]
pub struct RegistryHandle {
    new_tail: mpsc::Sender<NewTail>,
    ping: mpsc::Sender<String>,
    broadcast: mpsc::Sender<(Msg, Arc<Vec<u8>>)>,
}

impl RegistryHandle {
    pub async fn register_tail(&self, tail: NewTail) {
        let _ = self.new_tail.send(tail).await;
    }

    pub async fn ping(&self, addr: String) {
        let _ = self.ping.send(addr).await;
    }

    /// Queues `msg` (pre-encoded as `bytes`) for fan-out to every matching
    /// subscriber. A full channel applies backpressure to the caller, per
    /// the broadcast backpressure policy.
    pub async fn broadcast(&self, msg: Msg, bytes: Arc<Vec<u8>>) {
        let _ = self.broadcast.send((msg, bytes)).await;
    }
}

/// Spawns the single task that owns the subscriber table: all table
/// mutation and fan-out delivery happens here, serialized through one
/// `select!` loop, so the registry itself needs no lock.
pub fn spawn(
    sink: Arc<dyn DatagramSink>,
    liveness: LivenessConfig,
    shutdown: ShutdownSignal,
) -> (RegistryHandle, JoinHandle<()>) {
    let (new_tail_tx, mut new_tail_rx) = mpsc::channel::<NewTail>(256);
    let (ping_tx, mut ping_rx) = mpsc::channel::<String>(256);
    let (broadcast_tx, mut broadcast_rx) = mpsc::channel::<(Msg, Arc<Vec<u8>>)>(1024);

    let handle = tokio::spawn(async move {
        let mut tails: HashMap<String, Subscriber> = HashMap::new();
        let mut ticker = tokio::time::interval(liveness.ping_period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let kick_after = liveness.ping_period * liveness.missed_pings_allowed;

        loop {
            tokio::select! {
                Some((msg, bytes)) = broadcast_rx.recv() => {
                    for (addr, sub) in &tails {
                        if should_send(sub, &msg) {
                            sub.limiter.acquire().await;
                            sink.send_to(&bytes, addr).await;
                        }
                    }
                }
                Some(addr) = ping_rx.recv() => {
                    if let Some(sub) = tails.get_mut(&addr) {
                        sub.last_ping = Instant::now();
                    }
                }
                Some(tail) = new_tail_rx.recv() => {
                    tails.insert(tail.addr, Subscriber::new(tail.query_params, tail.limiter));
                }
                _ = ticker.tick() => {
                    let now = Instant::now();
                    let stale: Vec<String> = tails
                        .iter()
                        .filter(|(_, sub)| now.duration_since(sub.last_ping) > kick_after)
                        .map(|(addr, _)| addr.clone())
                        .collect();
                    for addr in stale {
                        tails.remove(&addr);
                        let kick = Msg::reply(KICK_SENTINEL, now_nanos());
                        sink.send_to(&encode_msg(&kick), &addr).await;
                    }
                }
                () = shutdown.cancelled() => return,
            }
        }
    });

    (
        RegistryHandle {
            new_tail: new_tail_tx,
            ping: ping_tx,
            broadcast: broadcast_tx,
        },
        handle,
    )
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
    use logd_proto::QueryParams;
    use std::sync::Mutex;
    use tokio::sync::Notify;

    struct RecordingSink {
        sent: Mutex<Vec<(String, Vec<u8>)>>,
        notify: Notify,
    }

    impl RecordingSink {
        fn new() -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                notify: Notify::new(),
            }
        }

        async fn wait_for(&self, n: usize) {
            loop {
                if self.sent.lock().unwrap().len() >= n {
                    return;
                }
                self.notify.notified().await;
            }
        }
    }

    #[async_trait]
    impl DatagramSink for RecordingSink {
        async fn send_to(&self, bytes: &[u8], addr: &str) {
            self.sent
                .lock()
                .unwrap()
                .push((addr.to_string(), bytes.to_vec()));
            self.notify.notify_waiters();
        }
    }

    fn liveness() -> LivenessConfig {
        LivenessConfig {
            ping_period: Duration::from_millis(20),
            missed_pings_allowed: 3,
        }
    }

    #[tokio::test]
    async fn matching_subscriber_receives_broadcast() {
        let sink = Arc::new(RecordingSink::new());
        let shutdown = ShutdownSignal::new();
        let (handle, task) = spawn(sink.clone(), liveness(), shutdown.clone());

        handle
            .register_tail(NewTail {
                addr: "127.0.0.1:9000".to_string(),
                query_params: QueryParams {
                    key_prefix: "/prod".to_string(),
                    ..Default::default()
                },
                limiter: Arc::new(TokenBucket::unlimited()),
            })
            .await;

        let msg = Msg {
            t: 0,
            key: "/prod/api/foo".to_string(),
            lvl: None,
            txt: Some("hello".to_string()),
            http_method: None,
            url: None,
            response_status: None,
        };
        handle.broadcast(msg, Arc::new(vec![1, 2, 3])).await;

        sink.wait_for(1).await;
        assert_eq!(sink.sent.lock().unwrap()[0].0, "127.0.0.1:9000");

        shutdown.shutdown();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn non_matching_subscriber_is_skipped() {
        let sink = Arc::new(RecordingSink::new());
        let shutdown = ShutdownSignal::new();
        let (handle, task) = spawn(sink.clone(), liveness(), shutdown.clone());

        handle
            .register_tail(NewTail {
                addr: "127.0.0.1:9001".to_string(),
                query_params: QueryParams {
                    key_prefix: "/prod".to_string(),
                    ..Default::default()
                },
                limiter: Arc::new(TokenBucket::unlimited()),
            })
            .await;

        let msg = Msg {
            t: 0,
            key: "/dev/api/foo".to_string(),
            lvl: None,
            txt: None,
            http_method: None,
            url: None,
            response_status: None,
        };
        handle.broadcast(msg, Arc::new(vec![9])).await;

        // give the loop a chance to process; nothing should arrive.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(sink.sent.lock().unwrap().is_empty());

        shutdown.shutdown();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn stale_subscriber_is_kicked() {
        let sink = Arc::new(RecordingSink::new());
        let shutdown = ShutdownSignal::new();
        let (handle, task) = spawn(sink.clone(), liveness(), shutdown.clone());

        handle
            .register_tail(NewTail {
                addr: "127.0.0.1:9002".to_string(),
                query_params: QueryParams::default(),
                limiter: Arc::new(TokenBucket::unlimited()),
            })
            .await;

        tokio::time::advance(Duration::from_millis(20 * 4)).await;
        sink.wait_for(1).await;

        let sent = sink.sent.lock().unwrap();
        assert_eq!(sent[0].0, "127.0.0.1:9002");
        let kicked = logd_proto::decode_msg(&sent[0].1).unwrap();
        assert_eq!(kicked.txt.as_deref(), Some(KICK_SENTINEL));
        drop(sent);

        shutdown.shutdown();
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn ping_refreshes_liveness() {
        let sink = Arc::new(RecordingSink::new());
        let shutdown = ShutdownSignal::new();
        let (handle, task) = spawn(sink.clone(), liveness(), shutdown.clone());

        handle
            .register_tail(NewTail {
                addr: "127.0.0.1:9003".to_string(),
                query_params: QueryParams::default(),
                limiter: Arc::new(TokenBucket::unlimited()),
            })
            .await;

        tokio::time::advance(Duration::from_millis(30)).await;
        handle.ping("127.0.0.1:9003".to_string()).await;
        tokio::time::sleep(Duration::from_millis(1)).await;
        tokio::time::advance(Duration::from_millis(30)).await;
        tokio::time::sleep(Duration::from_millis(1)).await;

        assert!(sink.sent.lock().unwrap().is_empty());

        shutdown.shutdown();
        task.await.unwrap();
    }
}
