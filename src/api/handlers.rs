//! API route handlers.

use std::fmt::Display;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::discovery::{self, PortInfo};
use crate::session::{LoggedEvent, SmsRecord};

use super::server::ApiState;

/// Handler error carrying a status code and a reason string.
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    fn internal(error: impl Display) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: error.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

/// Health response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_seconds: u64,
    pub sessions: usize,
}

/// Status response for connect/disconnect/send operations
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: &'static str,
    pub port: String,
}

/// SMS send request
#[derive(Debug, Deserialize)]
pub struct SmsRequest {
    pub phone: String,
    pub text: String,
}

/// USSD send request
#[derive(Debug, Deserialize)]
pub struct UssdRequest {
    pub code: String,
}

/// GET /healthz
pub async fn healthz(State(state): State<Arc<ApiState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: state.started.elapsed().as_secs(),
        sessions: state.registry.count().await,
    })
}

/// GET /ports
pub async fn ports() -> Result<Json<Vec<PortInfo>>, ApiError> {
    let ports = discovery::list_ports().map_err(ApiError::internal)?;
    Ok(Json(ports))
}

/// GET /sessions
pub async fn sessions(State(state): State<Arc<ApiState>>) -> Json<Vec<String>> {
    Json(state.registry.list_sessions().await)
}

/// POST /sessions/{port}/connect
pub async fn connect(
    State(state): State<Arc<ApiState>>,
    Path(port): Path<String>,
) -> Result<Json<StatusResponse>, ApiError> {
    debug!(port = %port, "api connect");
    state
        .registry
        .connect(&port)
        .await
        .map_err(ApiError::internal)?;
    Ok(Json(StatusResponse {
        status: "connected",
        port,
    }))
}

/// POST /sessions/{port}/disconnect
pub async fn disconnect(
    State(state): State<Arc<ApiState>>,
    Path(port): Path<String>,
) -> Json<StatusResponse> {
    debug!(port = %port, "api disconnect");
    state.registry.disconnect(&port).await;
    Json(StatusResponse {
        status: "disconnected",
        port,
    })
}

/// POST /sessions/{port}/sms
pub async fn send_sms(
    State(state): State<Arc<ApiState>>,
    Path(port): Path<String>,
    Json(request): Json<SmsRequest>,
) -> Result<Json<StatusResponse>, ApiError> {
    let session = state
        .registry
        .get(&port)
        .await
        .ok_or_else(|| ApiError::not_found("session not connected"))?;

    session
        .send_sms(&request.phone, &request.text)
        .await
        .map_err(ApiError::internal)?;

    Ok(Json(StatusResponse {
        status: "sent",
        port,
    }))
}

/// POST /sessions/{port}/ussd
pub async fn send_ussd(
    State(state): State<Arc<ApiState>>,
    Path(port): Path<String>,
    Json(request): Json<UssdRequest>,
) -> Result<Json<StatusResponse>, ApiError> {
    let session = state
        .registry
        .get(&port)
        .await
        .ok_or_else(|| ApiError::not_found("session not connected"))?;

    session
        .send_ussd(&request.code)
        .await
        .map_err(ApiError::internal)?;

    Ok(Json(StatusResponse {
        status: "sent",
        port,
    }))
}

/// GET /sessions/{port}/sms/inbox
pub async fn inbox(
    State(state): State<Arc<ApiState>>,
    Path(port): Path<String>,
) -> Result<Json<Vec<SmsRecord>>, ApiError> {
    let session = state
        .registry
        .get(&port)
        .await
        .ok_or_else(|| ApiError::not_found("session not connected"))?;
    Ok(Json(session.inbox()))
}

/// GET /sessions/{port}/log
pub async fn event_log(
    State(state): State<Arc<ApiState>>,
    Path(port): Path<String>,
) -> Result<Json<Vec<LoggedEvent>>, ApiError> {
    let session = state
        .registry
        .get(&port)
        .await
        .ok_or_else(|| ApiError::not_found("session not connected"))?;
    Ok(Json(session.event_log()))
}
