//! HTTP handlers for the server.

pub mod device;
pub mod ports;

use axum::{Json, http::StatusCode};
use serde::Serialize;
use std::sync::Arc;

use crate::error::FiscalError;
use crate::fiscal::FiscalPrinter;
use crate::transport::DynTransport;

use super::state::AppState;

/// Error body: `{"ok": false, "message": "..."}`.
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub ok: bool,
    pub message: String,
}

pub type ApiFailure = (StatusCode, Json<ApiError>);

pub fn api_error(status: StatusCode, message: impl Into<String>) -> ApiFailure {
    (
        status,
        Json(ApiError {
            ok: false,
            message: message.into(),
        }),
    )
}

/// HTTP status for a failed device operation.
pub fn status_for(err: &FiscalError) -> StatusCode {
    match err {
        FiscalError::InvalidField(_) => StatusCode::BAD_REQUEST,
        FiscalError::State { .. } => StatusCode::CONFLICT,
        FiscalError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::BAD_GATEWAY,
    }
}

/// Run `op` against the active printer on the blocking pool, holding the
/// session lock for its whole duration.
pub async fn with_printer<F, R>(state: &Arc<AppState>, op: F) -> Result<R, ApiFailure>
where
    F: FnOnce(&mut FiscalPrinter<DynTransport>) -> R + Send + 'static,
    R: Send + 'static,
{
    let (_, printer) = state.selected().await.ok_or_else(|| {
        api_error(
            StatusCode::CONFLICT,
            "No port selected. POST /api/port first.",
        )
    })?;

    tokio::task::spawn_blocking(move || {
        let mut session = printer.lock().map_err(|_| {
            api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Printer session lock poisoned",
            )
        })?;
        Ok(op(&mut *session))
    })
    .await
    .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, format!("Task error: {}", e)))?
}
