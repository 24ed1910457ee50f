use crate::config::ServiceConfig;
use crate::metrics::ServiceMetrics;
use crate::pool::{Packet, PacketPool, MAX_PACKET_SIZE};
use async_trait::async_trait;
use logd_auth::Guard;
use logd_proto::{decode_cmd, encode_msg, CmdName, Envelope, Msg};
use logd_ratelimit::TokenBucket;
use logd_registry::{DatagramSink, LivenessConfig, NewTail, RegistryHandle};
use logd_shutdown::ShutdownSignal;
use logd_store::Store;
use std::net::SocketAddr;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

/// Handle to the running datagram service: the registry's channels and the
/// metrics shared across the reader and worker tasks.
pub struct DatagramService {
    pub registry: RegistryHandle,
    pub metrics: Arc<ServiceMetrics>,
}

/// Sends fan-out/kick datagrams over the service's own socket. Parses each
/// subscriber's stored `ip:port` string back into a [`SocketAddr`] per send;
/// a send that fails to parse or write is logged and dropped.
struct SocketSink(Arc<UdpSocket>);

#[async_trait]
impl DatagramSink for SocketSink {
    async fn send_to(&self, bytes: &[u8], addr: &str) {
        match SocketAddr::from_str(addr) {
            Ok(addr) => {
                if let Err(e) = self.0.send_to(bytes, addr).await {
                    eprintln!("logd-net: send to {addr} failed: {e}");
                }
            }
            Err(e) => eprintln!("logd-net: bad subscriber address {addr:?}: {e}"),
        }
    }
}

/// Binds the socket and spawns the reader, worker pool, registry service
/// loop, and guard-reset task. Returns immediately; tasks run until
/// `shutdown` fires.
pub async fn spawn(
    cfg: ServiceConfig,
    guard: Arc<Guard>,
    store: Arc<Store>,
    shutdown: ShutdownSignal,
) -> std::io::Result<(DatagramService, Vec<JoinHandle<()>>)> {
    let socket = Arc::new(UdpSocket::bind(&cfg.laddr_port).await?);
    let pool = Arc::new(PacketPool::new());
    let metrics = Arc::new(ServiceMetrics::default());

    let (registry, registry_task) = logd_registry::spawn(
        Arc::new(SocketSink(socket.clone())),
        LivenessConfig {
            ping_period: cfg.ping_period,
            missed_pings_allowed: cfg.missed_pings_allowed,
        },
        shutdown.clone(),
    );

    let guard_reset_task =
        Guard::spawn_reset_task(guard.clone(), cfg.guard_reset_period, shutdown.clone());

    let (packet_tx, packet_rx) = mpsc::channel::<(Packet, SocketAddr)>(4096);
    let packet_rx = Arc::new(Mutex::new(packet_rx));

    let mut tasks = vec![registry_task, guard_reset_task];

    tasks.push(spawn_reader(
        socket.clone(),
        pool.clone(),
        packet_tx,
        metrics.clone(),
        shutdown.clone(),
    ));

    for _ in 0..cfg.worker_pool_size.max(1) {
        tasks.push(spawn_worker(
            packet_rx.clone(),
            pool.clone(),
            socket.clone(),
            guard.clone(),
            store.clone(),
            registry.clone(),
            cfg.clone(),
            metrics.clone(),
            shutdown.clone(),
        ));
    }

    Ok((DatagramService { registry, metrics }, tasks))
}

fn spawn_reader(
    socket: Arc<UdpSocket>,
    pool: Arc<PacketPool>,
    packet_tx: mpsc::Sender<(Packet, SocketAddr)>,
    metrics: Arc<ServiceMetrics>,
    shutdown: ShutdownSignal,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let mut buf = pool.acquire();
            tokio::select! {
                res = socket.recv_from(&mut buf[..]) => {
                    match res {
                        Ok((len, addr)) => {
                            metrics.inc_received();
                            let packet = Packet::new(buf, len.min(MAX_PACKET_SIZE));
                            if packet_tx.try_send((packet, addr)).is_err() {
                                metrics.inc_dropped();
                            }
                        }
                        Err(e) => {
                            eprintln!("logd-net: recv_from failed: {e}");
                            pool.release(Packet::new(buf, 0));
                        }
                    }
                }
                () = shutdown.cancelled() => return,
            }
        }
    })
}

#[allow(clippy::too_many_arguments)]
fn spawn_worker(
    packet_rx: Arc<Mutex<mpsc::Receiver<(Packet, SocketAddr)>>>,
    pool: Arc<PacketPool>,
    socket: Arc<UdpSocket>,
    guard: Arc<Guard>,
    store: Arc<Store>,
    registry: RegistryHandle,
    cfg: ServiceConfig,
    metrics: Arc<ServiceMetrics>,
    shutdown: ShutdownSignal,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let mut rx = packet_rx.lock().await;
            let next = tokio::select! {
                biased;
                () = shutdown.cancelled() => None,
                item = rx.recv() => item,
            };
            drop(rx);
            let Some((packet, addr)) = next else { return };

            dispatch(
                &packet, addr, &guard, &store, &registry, &socket, &cfg, &metrics,
            )
            .await;
            pool.release(packet);
        }
    })
}

async fn dispatch(
    packet: &Packet,
    addr: SocketAddr,
    guard: &Guard,
    store: &Store,
    registry: &RegistryHandle,
    socket: &UdpSocket,
    cfg: &ServiceConfig,
    metrics: &ServiceMetrics,
) {
    let Ok(envelope) = Envelope::unpack(packet.as_slice()) else {
        return;
    };
    let Ok(cmd) = decode_cmd(envelope.payload) else {
        return;
    };

    match cmd.name {
        CmdName::Write => {
            if !guard.good(&cfg.secrets.write, &envelope) {
                return;
            }
            let Some(msg) = cmd.msg else { return };
            let Some(store_key) = msg.store_key() else {
                return;
            };
            let bytes = encode_msg(&msg);
            store.write(&store_key, bytes.clone());
            metrics.inc_writes();
            registry.broadcast(msg, Arc::new(bytes)).await;
        }
        CmdName::Tail => {
            if !guard.good(&cfg.secrets.read, &envelope) {
                return;
            }
            let query_params = cmd.query_params.unwrap_or_default();
            registry
                .register_tail(NewTail {
                    addr: addr.to_string(),
                    query_params,
                    limiter: Arc::new(TokenBucket::new(
                        cfg.tail_rate_limit.every,
                        cfg.tail_rate_limit.burst,
                    )),
                })
                .await;
            metrics.inc_tails();
            let greeting = Msg::reply("tail ok", now_nanos());
            if let Err(e) = socket.send_to(&encode_msg(&greeting), addr).await {
                eprintln!("logd-net: tail greeting to {addr} failed: {e}");
            }
        }
        CmdName::Ping => {
            if !guard.good(&cfg.secrets.read, &envelope) {
                return;
            }
            registry.ping(addr.to_string()).await;
        }
        CmdName::Query => {
            if !guard.good(&cfg.secrets.read, &envelope) {
                return;
            }
            let params = cmd.query_params.unwrap_or_default();
            let limiter = TokenBucket::new(cfg.query_rate_limit.every, cfg.query_rate_limit.burst);
            metrics.inc_queries();
            crate::query::run(store, socket, addr, &params, &limiter, cfg.query_hard_limit).await;
        }
    }
}

fn now_nanos() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as i64)
        .unwrap_or(0)
}
