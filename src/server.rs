use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;

use crate::action::ChargeMode;
use crate::config::ServerConfig;
use crate::influx::Forwarder;
use crate::mqtt::StatusPublisher;
use crate::wallbox::{Outcome, Wallbox};
use crate::webhooks::{self, GrafanaAlert, Topics};

#[derive(Clone)]
pub struct AppState {
    pub wallbox: Arc<Wallbox>,
    pub influx: Forwarder,
    pub auth_token: Option<Arc<str>>,
    pub solar_threshold_w: f64,
    pub status_publisher: Option<StatusPublisher>,
}

impl AppState {
    pub fn new(wallbox: Arc<Wallbox>, config: &ServerConfig) -> Self {
        Self {
            wallbox,
            influx: Forwarder::new(config.influxdb.as_ref()),
            auth_token: config.auth_token.as_deref().map(Arc::from),
            solar_threshold_w: config.solar_threshold_w,
            status_publisher: None,
        }
    }

    pub fn with_status_publisher(mut self, publisher: StatusPublisher) -> Self {
        self.status_publisher = Some(publisher);
        self
    }

    pub async fn get_status(&self) -> Result<String, eyre::Report> {
        let status = self.wallbox.get_status().await?;
        self.publish_status(&status);
        Ok(status)
    }

    pub async fn get_mode(&self) -> Result<String, eyre::Report> {
        self.wallbox.get_mode().await
    }

    pub async fn start_charging(&self) -> Result<Outcome, eyre::Report> {
        let outcome = self.wallbox.start_charging().await?;
        self.publish_outcome(&outcome);
        Ok(outcome)
    }

    pub async fn stop_charging(&self) -> Result<Outcome, eyre::Report> {
        let outcome = self.wallbox.stop_charging().await?;
        self.publish_outcome(&outcome);
        Ok(outcome)
    }

    pub async fn set_mode(&self, mode: ChargeMode) -> Result<Outcome, eyre::Report> {
        let outcome = self.wallbox.set_mode(mode).await?;
        self.publish_outcome(&outcome);
        Ok(outcome)
    }

    fn publish_outcome(&self, outcome: &Outcome) {
        if let Some(status) = &outcome.reading().status {
            self.publish_status(status);
        }
    }

    fn publish_status(&self, status: &str) {
        if let Some(publisher) = &self.status_publisher {
            publisher.publish(status);
        }
    }
}

/// Error body is always `{"error": message}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl From<eyre::Report> for ApiError {
    fn from(e: eyre::Report) -> Self {
        ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

type ApiResult = Result<Json<Value>, ApiError>;

fn timestamp() -> String {
    chrono::Local::now().to_rfc3339()
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/wallbox/status", get(get_status))
        .route("/wallbox/mode", get(get_mode).post(set_mode))
        .route("/wallbox/start", post(start_charging))
        .route("/wallbox/stop", post(stop_charging))
        .route("/webhook/grafana", post(grafana_webhook))
        .route("/webhook/mqtt", post(mqtt_webhook))
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(state.clone(), require_token))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(
    config: &ServerConfig,
    state: AppState,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<(), eyre::Report> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Starting webhook server on {addr}");
    tracing::info!(
        "Authentication: {}",
        if state.auth_token.is_some() { "enabled" } else { "disabled" }
    );

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

async fn require_token(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let Some(expected) = state.auth_token.as_deref() else {
        return next.run(request).await;
    };

    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    let rejection = match token {
        None => Some("Missing or invalid authorization header"),
        Some(token) if token != expected => Some("Invalid token"),
        Some(_) => None,
    };

    match rejection {
        Some(message) => ApiError::new(StatusCode::UNAUTHORIZED, message).into_response(),
        None => next.run(request).await,
    }
}

async fn not_found() -> ApiError {
    ApiError::new(StatusCode::NOT_FOUND, "Endpoint not found")
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": timestamp(),
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn get_status(State(state): State<AppState>) -> ApiResult {
    let status = state.get_status().await.inspect_err(|e| {
        tracing::error!("Error getting status: {e}");
    })?;
    tracing::info!("Status requested: {status}");

    state
        .influx
        .send("wallbox_status", &[("status", status.as_str().into())])
        .await;

    Ok(Json(json!({ "status": status, "timestamp": timestamp() })))
}

async fn get_mode(State(state): State<AppState>) -> ApiResult {
    let mode = state.get_mode().await.inspect_err(|e| {
        tracing::error!("Error getting mode: {e}");
    })?;
    tracing::info!("Mode requested: {mode}");

    state
        .influx
        .send("wallbox_mode", &[("mode", mode.as_str().into())])
        .await;

    Ok(Json(json!({ "mode": mode, "timestamp": timestamp() })))
}

async fn set_mode(State(state): State<AppState>, body: Bytes) -> ApiResult {
    let body: Option<Value> = serde_json::from_slice(&body).ok();
    let Some(requested) = body.as_ref().and_then(|b| b.get("mode")) else {
        return Err(ApiError::new(StatusCode::BAD_REQUEST, "Missing mode parameter"));
    };
    let Some(mode) = requested.as_str().and_then(|m| m.parse::<ChargeMode>().ok()) else {
        return Err(ApiError::new(
            StatusCode::BAD_REQUEST,
            "Invalid mode. Must be eco, full, or solar",
        ));
    };

    let outcome = state.set_mode(mode).await.inspect_err(|e| {
        tracing::error!("Error setting mode: {e}");
    })?;
    let success = outcome.success();
    tracing::info!(
        "Mode set to {mode}: {}",
        if success { "success" } else { "failed" }
    );

    state
        .influx
        .send(
            "wallbox_mode_change",
            &[("mode", mode.as_str().into()), ("success", success.into())],
        )
        .await;

    Ok(Json(json!({
        "success": success,
        "mode": mode.as_str(),
        "outcome": outcome.kind(),
        "timestamp": timestamp(),
    })))
}

async fn start_charging(State(state): State<AppState>) -> ApiResult {
    let outcome = state.start_charging().await.inspect_err(|e| {
        tracing::error!("Error starting charging: {e}");
    })?;
    action_response(&state, "start", &outcome).await
}

async fn stop_charging(State(state): State<AppState>) -> ApiResult {
    let outcome = state.stop_charging().await.inspect_err(|e| {
        tracing::error!("Error stopping charging: {e}");
    })?;
    action_response(&state, "stop", &outcome).await
}

async fn action_response(state: &AppState, action: &str, outcome: &Outcome) -> ApiResult {
    let success = outcome.success();
    tracing::info!(
        "{action} charging: {}",
        if success { "success" } else { "failed" }
    );

    state
        .influx
        .send(
            "wallbox_action",
            &[("action", action.into()), ("success", success.into())],
        )
        .await;

    Ok(Json(json!({
        "success": success,
        "action": action,
        "outcome": outcome.kind(),
        "timestamp": timestamp(),
    })))
}

async fn grafana_webhook(State(state): State<AppState>, body: Bytes) -> ApiResult {
    let alert: GrafanaAlert = serde_json::from_slice(&body).map_err(|e| {
        tracing::error!("Error handling Grafana webhook: {e}");
        ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;
    tracing::info!(
        state = %alert.state,
        rule = %alert.rule_name,
        "Grafana webhook received"
    );

    Ok(Json(webhooks::handle_grafana(&state, &alert).await))
}

#[derive(Debug, serde::Deserialize)]
struct MqttWebhook {
    #[serde(default)]
    topic: String,
    #[serde(default)]
    message: Value,
}

async fn mqtt_webhook(State(state): State<AppState>, body: Bytes) -> ApiResult {
    let hook: MqttWebhook = serde_json::from_slice(&body).map_err(|e| {
        tracing::error!("Error handling MQTT webhook: {e}");
        ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;

    Ok(Json(
        webhooks::handle_mqtt_message(&state, &Topics::default(), &hook.topic, &hook.message)
            .await,
    ))
}
