//! REST API for the companion app
//!
//! Control endpoints validate their input and return immediately; the work
//! runs on a spawned task. Read endpoints answer from the controller.

use anyhow::{Context, Result};
use axum::{
    extract::{Query, State},
    http::{Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use crate::controller::{Controller, DeviceInfo, EqState, FullState, MediaAction, PartialState};
use crate::settings::Settings;
use crate::state::EqBand;

/// Errors returned to API clients
#[derive(Debug, Error)]
pub enum ApiError {
    /// Rejected request; nothing was changed
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    fn invalid(message: impl Into<String>) -> Self {
        ApiError::Validation(message.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "detail": self.to_string() }))).into_response()
    }
}

impl From<crate::settings::SettingsError> for ApiError {
    fn from(e: crate::settings::SettingsError) -> Self {
        error!("Settings error in API handler: {}", e);
        ApiError::Internal(e.to_string())
    }
}

type ApiResult = Result<Json<Value>, ApiError>;

// ===== Request bodies =====

#[derive(Debug, Deserialize)]
pub struct VolumeRequest {
    pub volume: i64,
}

#[derive(Debug, Deserialize)]
pub struct PlaybackRequest {
    pub value: String,
}

/// The app sends presets either as numbers or as numeric strings
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PresetValue {
    Number(i64),
    Text(String),
}

impl PresetValue {
    fn as_int(&self) -> Option<i64> {
        match self {
            PresetValue::Number(n) => Some(*n),
            PresetValue::Text(s) => s.trim().parse().ok(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct EqRequest {
    pub band_type: String,
    pub preset: PresetValue,
}

#[derive(Debug, Deserialize)]
pub struct ValueQuery {
    pub value: String,
}

#[derive(Debug, Deserialize)]
pub struct NameQuery {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct NetworkConnectRequest {
    pub ssid: String,
    pub password: String,
}

// ===== Router =====

/// Build the API router
pub fn build_router(controller: Arc<Controller>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/", get(device_info))
        .route("/settings", get(get_settings))
        .route("/settings/name", post(rename_device))
        .route("/settings/reset", post(reset_settings))
        .route("/control/volume", post(set_volume))
        .route("/control/playback", post(playback))
        .route("/control/eq", get(get_eq).post(set_eq))
        .route("/control/eq/status", post(set_eq_status))
        .route("/control/local/volume", post(set_local_volume))
        .route("/control/local/mute", post(set_local_mute))
        .route("/status/state", get(full_state))
        .route("/status/partial_state", get(partial_state))
        .route("/network/ssid", get(network_ssid))
        .route("/network/scan", get(network_scan))
        .route("/network/connect", post(network_connect))
        .route("/api/health", get(health_check))
        .layer(cors)
        .with_state(controller)
}

fn check_volume(volume: i64) -> Result<i32, ApiError> {
    if !(0..=100).contains(&volume) {
        return Err(ApiError::invalid("Volume must be 0-100"));
    }
    Ok(volume as i32)
}

/// Run `work` in the background so the response does not wait on hardware
fn spawn_work<F>(controller: &Arc<Controller>, work: impl FnOnce(Arc<Controller>) -> F)
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    tokio::spawn(work(Arc::clone(controller)));
}

// ===== Device and settings =====

/// GET / - Device identity
async fn device_info(State(controller): State<Arc<Controller>>) -> Json<DeviceInfo> {
    Json(controller.device_info())
}

/// GET /settings - The whole settings document
async fn get_settings(State(controller): State<Arc<Controller>>) -> Json<Settings> {
    Json(controller.settings().get_all())
}

/// POST /settings/name?name=...
async fn rename_device(
    State(controller): State<Arc<Controller>>,
    Query(query): Query<NameQuery>,
) -> ApiResult {
    let name = query.name.trim();
    if name.is_empty() {
        return Err(ApiError::invalid("name must not be empty"));
    }
    controller.rename_device(name).await?;
    Ok(Json(json!({ "status": "updated", "name": name })))
}

/// POST /settings/reset
async fn reset_settings(State(controller): State<Arc<Controller>>) -> ApiResult {
    controller.reset_settings().await?;
    Ok(Json(json!({ "status": "reset_to_default" })))
}

// ===== Control =====

/// POST /control/volume - Logical volume through the active source
async fn set_volume(
    State(controller): State<Arc<Controller>>,
    Json(req): Json<VolumeRequest>,
) -> ApiResult {
    let volume = check_volume(req.volume)?;
    spawn_work(&controller, |c| async move {
        c.set_volume(volume, true).await;
    });
    Ok(Json(json!({ "status": "processing", "target_volume": volume })))
}

/// POST /control/playback - play_pause, next or prev
async fn playback(
    State(controller): State<Arc<Controller>>,
    Json(req): Json<PlaybackRequest>,
) -> ApiResult {
    let action = match req.value.as_str() {
        "play_pause" => MediaAction::PlayPause,
        "next" => MediaAction::Next,
        "prev" => MediaAction::Prev,
        _ => return Err(ApiError::invalid("Invalid playback action")),
    };
    spawn_work(&controller, |c| async move {
        c.media_action(action).await;
    });
    Ok(Json(json!({ "status": "executed", "action": action })))
}

/// POST /control/eq - Preset for one band
async fn set_eq(
    State(controller): State<Arc<Controller>>,
    Json(req): Json<EqRequest>,
) -> ApiResult {
    let preset = req
        .preset
        .as_int()
        .ok_or_else(|| ApiError::invalid("preset must be an integer between -6 and 6"))?;
    let band: EqBand = req
        .band_type
        .parse()
        .map_err(|_| ApiError::invalid("band_type must be 'bass' or 'treble'"))?;
    if !(-6..=6).contains(&preset) {
        return Err(ApiError::invalid("preset must be between -6 and 6"));
    }

    let preset = preset as i8;
    spawn_work(&controller, |c| async move {
        c.set_eq_gain(band, preset).await;
    });
    Ok(Json(json!({
        "status": "processing",
        "band_type": band,
        "preset": format!("{}-{}", band, preset),
    })))
}

/// GET /control/eq
async fn get_eq(State(controller): State<Arc<Controller>>) -> Json<EqState> {
    Json(controller.eq_state())
}

/// POST /control/eq/status?value=on|off - Keeps the stored presets
async fn set_eq_status(
    State(controller): State<Arc<Controller>>,
    Query(query): Query<ValueQuery>,
) -> ApiResult {
    let on = match query.value.as_str() {
        "on" => true,
        "off" => false,
        _ => return Err(ApiError::invalid("Value must be 'on' or 'off'")),
    };
    spawn_work(&controller, |c| async move {
        c.set_eq_enabled(on).await;
    });
    Ok(Json(json!({ "status": "updated", "eq_enabled": on })))
}

/// POST /control/local/volume
async fn set_local_volume(
    State(controller): State<Arc<Controller>>,
    Json(req): Json<VolumeRequest>,
) -> ApiResult {
    let volume = check_volume(req.volume)?;
    spawn_work(&controller, |c| async move {
        c.set_volume(volume, true).await;
    });
    Ok(Json(json!({ "status": "executed", "local_volume": volume })))
}

/// POST /control/local/mute?value=mute|unmute - Volume to 0 or 100
async fn set_local_mute(
    State(controller): State<Arc<Controller>>,
    Query(query): Query<ValueQuery>,
) -> ApiResult {
    let mute = match query.value.as_str() {
        "mute" => true,
        "unmute" => false,
        _ => return Err(ApiError::invalid("Value must be 'mute' or 'unmute'")),
    };
    let volume = if mute { 0 } else { 100 };
    spawn_work(&controller, |c| async move {
        c.set_volume(volume, true).await;
    });
    Ok(Json(json!({ "status": "executed", "mute": mute })))
}

// ===== Status =====

/// GET /status/state
async fn full_state(State(controller): State<Arc<Controller>>) -> Json<FullState> {
    Json(controller.full_state().await)
}

/// GET /status/partial_state
async fn partial_state(State(controller): State<Arc<Controller>>) -> Json<PartialState> {
    Json(controller.partial_state().await)
}

// ===== Network =====

/// GET /network/ssid - The remembered network
async fn network_ssid(State(controller): State<Arc<Controller>>) -> Json<Value> {
    let ssid = controller.settings().get(|s| s.wifi.ssid.clone());
    Json(json!({ "ssid": ssid }))
}

/// GET /network/scan
async fn network_scan(State(controller): State<Arc<Controller>>) -> Json<Value> {
    let networks = controller.scan_wifi().await;
    Json(json!({ "networks": networks }))
}

/// POST /network/connect
async fn network_connect(
    State(controller): State<Arc<Controller>>,
    Json(req): Json<NetworkConnectRequest>,
) -> ApiResult {
    if req.ssid.is_empty() || req.password.is_empty() {
        return Err(ApiError::invalid("SSID and password are required"));
    }
    let ssid = req.ssid.clone();
    spawn_work(&controller, |c| async move {
        if let Err(e) = c.connect_wifi(&req.ssid, &req.password).await {
            error!("Failed to store Wi-Fi credentials: {}", e);
        }
    });
    Ok(Json(json!({ "status": "connecting", "ssid": ssid })))
}

/// GET /api/health
async fn health_check() -> &'static str {
    "ok"
}

/// Serve the API until `shutdown` flips
pub async fn start_server(
    controller: Arc<Controller>,
    addr: SocketAddr,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()> {
    let router = build_router(controller);

    info!("🌐 Starting API server on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind API server on {}", addr))?;

    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = shutdown.changed().await;
        })
        .await
        .context("API server error")?;

    Ok(())
}
