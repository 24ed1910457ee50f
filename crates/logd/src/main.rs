//! Process entry point: loads configuration, wires the guard, store,
//! datagram service, and status endpoint together, and drives graceful
//! shutdown on `SIGINT`/`SIGTERM`.

use logd_auth::{Guard, GuardConfig};
use logd_net::{RateLimitConfig, Secrets, ServiceConfig};
use logd_shutdown::ShutdownSignal;
use logd_status::StatusConfig;
use logd_store::{Store, StoreConfig};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal::unix::{signal, SignalKind};

/// Fixed liveness cadence: ping every 2s, kick a tailer after 3 consecutive
/// missed pings.
const PING_PERIOD: Duration = Duration::from_secs(2);
const MISSED_PINGS_ALLOWED: u32 = 3;
const QUERY_HARD_LIMIT: usize = 100_000;

#[tokio::main]
async fn main() -> ExitCode {
    let config_path = std::env::args().nth(1).unwrap_or_else(|| "logd.yaml".to_string());

    let settings = match logd_config::load(&config_path) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("logd: failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    let shutdown = ShutdownSignal::new();

    let guard = Arc::new(Guard::new(GuardConfig {
        filter_cap: settings.udp.guard.filter_cap,
        filter_ttl: settings.udp.guard.filter_ttl,
        packet_ttl: settings.udp.guard.packet_ttl,
    }));

    let store = Arc::new(Store::new(StoreConfig {
        ring_sizes: settings.store.ring_sizes,
        fallback_size: settings.store.fallback_size,
    }));

    let service_cfg = ServiceConfig {
        laddr_port: settings.udp.laddr_port,
        worker_pool_size: settings.udp.worker_pool_size,
        secrets: Secrets {
            read: settings.udp.secrets.read.into_bytes(),
            write: settings.udp.secrets.write.into_bytes(),
        },
        guard_reset_period: settings.udp.guard.filter_ttl,
        tail_rate_limit: RateLimitConfig {
            every: settings.udp.tail_rate_limit.every,
            burst: settings.udp.tail_rate_limit.burst,
        },
        query_rate_limit: RateLimitConfig {
            every: settings.udp.query_rate_limit.every,
            burst: settings.udp.query_rate_limit.burst,
        },
        ping_period: PING_PERIOD,
        missed_pings_allowed: MISSED_PINGS_ALLOWED,
        query_hard_limit: QUERY_HARD_LIMIT,
    };

    let (net_service, net_tasks) =
        match logd_net::spawn(service_cfg, guard, store.clone(), shutdown.clone()).await {
            Ok(result) => result,
            Err(e) => {
                eprintln!("logd: failed to bind datagram socket: {e}");
                return ExitCode::FAILURE;
            }
        };
    let metrics = net_service.metrics.clone();
    drop(net_service);

    let status_cfg = StatusConfig {
        laddr_port: settings.status.laddr_port,
        rate_limit_every: settings.status.rate_limit.every,
        rate_limit_burst: settings.status.rate_limit.burst,
        access_control_allow_origin: settings.status.access_control_allow_origin,
        commit: std::env::var("LOGD_COMMIT").unwrap_or_default(),
    };
    let status_tasks = match logd_status::spawn(status_cfg, store, metrics, shutdown.clone()).await {
        Ok(tasks) => tasks,
        Err(e) => {
            eprintln!("logd: failed to bind status listener: {e}");
            shutdown.shutdown();
            for task in net_tasks {
                let _ = task.await;
            }
            return ExitCode::FAILURE;
        }
    };

    wait_for_signal().await;
    println!("logd: shutdown signal received, draining");
    shutdown.shutdown();

    for task in net_tasks.into_iter().chain(status_tasks) {
        let _ = task.await;
    }

    ExitCode::SUCCESS
}

async fn wait_for_signal() {
    let mut sigint = signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");
    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    tokio::select! {
        _ = sigint.recv() => {}
        _ = sigterm.recv() => {}
    }
}
