use crate::rate_limit::{spawn_cleanup, CallerLimiter, CallerMethod};
use crate::snapshot::{self, SnapshotCache};
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::Router;
use logd_net::ServiceMetrics;
use logd_shutdown::ShutdownSignal;
use logd_store::Store;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

pub struct StatusConfig {
    pub laddr_port: String,
    pub rate_limit_every: Duration,
    pub rate_limit_burst: u32,
    pub access_control_allow_origin: String,
    pub commit: String,
}

struct AppState {
    cache: Arc<SnapshotCache>,
    limiter: Arc<CallerLimiter>,
    allow_origin: HeaderValue,
}

/// Binds the HTTP listener and spawns the server, snapshot-recompute, and
/// rate-limit-cleanup tasks. Returns once the listener is bound so a caller
/// can treat a bind failure as fatal before other subsystems start.
pub async fn spawn(
    cfg: StatusConfig,
    store: Arc<Store>,
    metrics: Arc<ServiceMetrics>,
    shutdown: ShutdownSignal,
) -> std::io::Result<Vec<JoinHandle<()>>> {
    let listener = TcpListener::bind(&cfg.laddr_port).await?;

    let cache = Arc::new(SnapshotCache::new());
    let limiter = Arc::new(CallerLimiter::new(cfg.rate_limit_every, cfg.rate_limit_burst));
    let allow_origin = HeaderValue::from_str(&cfg.access_control_allow_origin)
        .unwrap_or_else(|_| HeaderValue::from_static("*"));

    let state = Arc::new(AppState {
        cache: cache.clone(),
        limiter: limiter.clone(),
        allow_origin,
    });

    let app = Router::new()
        .route("/*path", any(handler))
        .route("/", any(handler))
        .with_state(state);

    let snapshot_task = snapshot::spawn(store, metrics, cfg.commit, cache, shutdown.clone());
    let cleanup_task = spawn_cleanup(limiter, shutdown.clone());

    let server_shutdown = shutdown.clone();
    let server_task = tokio::spawn(async move {
        let result = axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move { server_shutdown.cancelled().await })
        .await;
        if let Err(e) = result {
            eprintln!("logd-status: server error: {e}");
        }
    });

    Ok(vec![server_task, snapshot_task, cleanup_task])
}

async fn handler(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    method: Method,
) -> Response {
    let caller_method = match method {
        Method::GET => CallerMethod::Get,
        Method::OPTIONS => CallerMethod::Options,
        _ => CallerMethod::Other,
    };

    if !state.limiter.admit(caller_method, addr.ip()).await {
        return with_cors(&state, StatusCode::TOO_MANY_REQUESTS.into_response());
    }

    let response = match method {
        Method::OPTIONS => StatusCode::OK.into_response(),
        Method::GET => {
            let bytes = (*state.cache.current()).clone();
            ([(axum::http::header::CONTENT_TYPE, "application/json")], bytes).into_response()
        }
        _ => StatusCode::METHOD_NOT_ALLOWED.into_response(),
    };
    with_cors(&state, response)
}

fn with_cors(state: &AppState, mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.insert(
        axum::http::header::ACCESS_CONTROL_ALLOW_ORIGIN,
        state.allow_origin.clone(),
    );
    headers.insert(
        axum::http::header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("GET"),
    );
    response
}
