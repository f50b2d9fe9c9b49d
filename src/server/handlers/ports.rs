//! Port discovery and selection.

use axum::{Json, extract::State, http::StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::transport::{self, PortDescriptor};

use super::super::state::AppState;
use super::{ApiFailure, api_error};

#[derive(Debug, Serialize)]
pub struct PortList {
    pub ports: Vec<PortDescriptor>,
    pub selected: Option<String>,
}

/// GET /api/ports - List serial ports and the one in use.
pub async fn list(State(state): State<Arc<AppState>>) -> Result<Json<PortList>, ApiFailure> {
    let ports = tokio::task::spawn_blocking(transport::list_ports)
        .await
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, format!("Task error: {}", e)))?
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;
    let selected = state.selected().await.map(|(path, _)| path);
    Ok(Json(PortList { ports, selected }))
}

#[derive(Debug, Deserialize)]
pub struct SelectPort {
    pub path: String,
}

#[derive(Debug, Serialize)]
pub struct PortSelected {
    pub ok: bool,
    pub path: String,
    pub profile: String,
}

/// POST /api/port - Open a serial port and make it the active printer.
pub async fn select(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SelectPort>,
) -> Result<Json<PortSelected>, ApiFailure> {
    let config = state.config.clone();
    let path = req.path.clone();
    let port = tokio::task::spawn_blocking(move || AppState::open_port(&config, &path))
        .await
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, format!("Task error: {}", e)))?
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))?;

    state.select(port).await;
    info!("selected port {}", req.path);

    Ok(Json(PortSelected {
        ok: true,
        path: req.path,
        profile: state.config.profile.name.clone(),
    }))
}
