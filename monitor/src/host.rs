use std::{collections::HashMap, io::ErrorKind, net::SocketAddr, path::PathBuf, sync::Arc};

use anyhow::Context;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use hazard_common::{
    protocol::endpoint_for_host, MonitorConfig, SyncController, ThresholdEdit,
};
use serde::Serialize;
use tokio::{
    net::TcpListener,
    sync::{watch, Mutex},
};
use tower_http::services::ServeDir;
use tracing::{info, warn};

use crate::{
    display::{MonitorDisplay, MonitorView},
    driver::{Driver, DriverHandle},
    transport::WsConnector,
};

#[derive(Clone)]
struct AppState {
    driver: DriverHandle,
    store: AppStore,
    running: Arc<MonitorConfig>,
}

#[derive(Clone)]
struct AppStore {
    config_path: Arc<PathBuf>,
    lock: Arc<Mutex<()>>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Serialize)]
struct VentilationResponse {
    sent: bool,
}

#[derive(Debug, Serialize)]
struct ConfigUpdateResponse {
    #[serde(rename = "restartRequired")]
    restart_required: bool,
    config: MonitorConfig,
}

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let store = AppStore::new();
    let mut config = store.load_config().await.unwrap_or_else(|err| {
        warn!("failed to load monitor config from store: {err:#}");
        MonitorConfig::default()
    });
    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    config.sanitize();

    let controller = SyncController::from_config(&config);
    let (view_tx, view_rx) = watch::channel(MonitorView::new(
        controller.state().clone(),
        controller.alerts(),
        controller.status(),
    ));
    let driver = Driver::new(
        controller,
        WsConnector::new(config.endpoint_url.clone()),
        MonitorDisplay::new(view_tx),
    );
    let handle = driver.handle(view_rx);
    let driver_task = tokio::spawn(driver.run());

    let app_state = AppState {
        driver: handle.clone(),
        store,
        running: Arc::new(config.clone()),
    };

    let web_root = format!("{}/web", env!("CARGO_MANIFEST_DIR"));
    let app = api_routes()
        .fallback_service(ServeDir::new(web_root))
        .with_state(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind monitor server at {addr}"))?;

    info!(
        "monitor listening on http://{addr}, node endpoint {}",
        config.endpoint_url
    );
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    handle.shutdown();
    driver_task.await.context("driver task failed")?;
    Ok(())
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/api/state", get(handle_get_state))
        .route("/api/alerts", get(handle_get_alerts))
        .route("/api/status", get(handle_get_status))
        .route("/api/dashboard", get(handle_get_dashboard))
        .route("/api/view", get(handle_get_view))
        .route("/api/thresholds", post(handle_post_thresholds))
        .route("/api/ventilation", post(handle_post_ventilation))
        .route(
            "/api/config",
            get(handle_get_config).put(handle_put_config),
        )
}

fn apply_env_overrides(config: &mut MonitorConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(url) = lookup("NODE_URL") {
        config.endpoint_url = url;
    } else if let Some(host) = lookup("NODE_HOST") {
        config.endpoint_url = endpoint_for_host(&host);
    }

    if let Some(port) = lookup("MONITOR_HTTP_PORT").and_then(|value| value.parse::<u16>().ok()) {
        config.http_port = port;
    }

    if let Some(cap) = lookup("MONITOR_HISTORY_CAP").and_then(|value| value.parse::<usize>().ok())
    {
        config.history_cap = cap;
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for shutdown signal: {err}");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

async fn handle_get_state(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.driver.view().state)
}

async fn handle_get_alerts(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.driver.view().alerts)
}

async fn handle_get_status(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.driver.view().status)
}

async fn handle_get_dashboard(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.driver.view().dashboard)
}

async fn handle_get_view(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.driver.view())
}

async fn handle_post_thresholds(
    State(state): State<AppState>,
    Json(edit): Json<ThresholdEdit>,
) -> impl IntoResponse {
    match state.driver.update_thresholds(edit).await {
        Ok(reply) => Json(reply).into_response(),
        Err(err) => {
            warn!("threshold update not processed: {err:#}");
            error_response(StatusCode::SERVICE_UNAVAILABLE, "Monitor is shutting down")
        }
    }
}

async fn handle_post_ventilation(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> impl IntoResponse {
    let Some(value) = params.get("override") else {
        return error_response(StatusCode::BAD_REQUEST, "Missing 'override' parameter");
    };
    let Some(manual_override) = parse_flag(value) else {
        return error_response(StatusCode::BAD_REQUEST, "Invalid 'override' value");
    };
    let ventilation_on = match params.get("state").map(|value| parse_flag(value)) {
        None => false,
        Some(Some(on)) => on,
        Some(None) => return error_response(StatusCode::BAD_REQUEST, "Invalid 'state' value"),
    };

    match state
        .driver
        .manual_ventilation(manual_override, ventilation_on)
        .await
    {
        Ok(sent) => Json(VentilationResponse { sent }).into_response(),
        Err(err) => {
            warn!("ventilation command not processed: {err:#}");
            error_response(StatusCode::SERVICE_UNAVAILABLE, "Monitor is shutting down")
        }
    }
}

async fn handle_get_config(State(state): State<AppState>) -> impl IntoResponse {
    let config = state.store.load_config().await.unwrap_or_else(|err| {
        warn!("failed to load monitor config from store: {err:#}");
        MonitorConfig::default()
    });
    Json(config)
}

async fn handle_put_config(
    State(state): State<AppState>,
    Json(mut update): Json<MonitorConfig>,
) -> impl IntoResponse {
    if !update.endpoint_url.starts_with("ws://") {
        return error_response(StatusCode::BAD_REQUEST, "endpoint_url must start with ws://");
    }
    update.sanitize();

    if let Err(err) = state.store.save_config(&update).await {
        warn!("failed to persist monitor config update: {err:#}");
        return error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to persist monitor settings",
        );
    }

    Json(ConfigUpdateResponse {
        restart_required: state.running.restart_required(&update),
        config: update,
    })
    .into_response()
}

impl AppStore {
    fn new() -> Self {
        let data_dir = std::env::var("MONITOR_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./.hazard-monitor"));
        Self::in_dir(data_dir)
    }

    fn in_dir(data_dir: PathBuf) -> Self {
        Self {
            config_path: Arc::new(data_dir.join("monitor.json")),
            lock: Arc::new(Mutex::new(())),
        }
    }

    async fn load_config(&self) -> anyhow::Result<MonitorConfig> {
        let _guard = self.lock.lock().await;
        match tokio::fs::read(self.config_path.as_ref()).await {
            Ok(raw) => Ok(serde_json::from_slice::<MonitorConfig>(&raw)?),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(MonitorConfig::default()),
            Err(err) => Err(err.into()),
        }
    }

    async fn save_config(&self, config: &MonitorConfig) -> anyhow::Result<()> {
        let _guard = self.lock.lock().await;
        let path = self.config_path.as_ref().clone();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let payload = serde_json::to_vec_pretty(config)?;
        tokio::fs::write(path, payload).await?;
        Ok(())
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "on" => Some(true),
        "false" | "0" | "off" => Some(false),
        _ => None,
    }
}

fn error_response(status: StatusCode, message: &str) -> axum::response::Response {
    (
        status,
        Json(ErrorBody {
            error: message.to_string(),
        }),
    )
        .into_response()
}
