use logd_net::ServiceMetrics;
use logd_shutdown::ShutdownSignal;
use logd_status::StatusConfig;
use logd_store::{Store, StoreConfig};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

fn store() -> Arc<Store> {
    let mut ring_sizes = HashMap::new();
    ring_sizes.insert("/prod/api".to_string(), 16);
    Arc::new(Store::new(StoreConfig {
        ring_sizes,
        fallback_size: 16,
    }))
}

#[tokio::test]
async fn status_endpoint_reports_store_counters_after_warmup() {
    let store = store();
    store.write("/prod/api", vec![1, 2, 3]);

    let shutdown = ShutdownSignal::new();
    let cfg = StatusConfig {
        laddr_port: "127.0.0.1:28822".to_string(),
        rate_limit_every: Duration::from_millis(1),
        rate_limit_burst: 100,
        access_control_allow_origin: "*".to_string(),
        commit: "test-build".to_string(),
    };

    let metrics = Arc::new(ServiceMetrics::default());

    let _tasks = logd_status::spawn(cfg, store.clone(), metrics, shutdown.clone())
        .await
        .unwrap();

    // The recompute task ticks once a second; wait past the first tick.
    tokio::time::sleep(Duration::from_millis(1100)).await;

    let client = reqwest::Client::new();
    let resp = client
        .get("http://127.0.0.1:28822/")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(
        resp.headers().get("access-control-allow-origin").unwrap(),
        "*"
    );
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["store"]["nwrites"], 1);
    assert_eq!(body["udp"]["packets_received"], 0);

    shutdown.shutdown();
}
