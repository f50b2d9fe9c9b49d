//! Device operations: status, test print, invoice.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::fiscal::{Invoice, InvoiceOutcome, StatusReport, TransactionState, test_page};

use super::super::state::AppState;
use super::{ApiFailure, api_error, status_for, with_printer};

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub ok: bool,
    pub state: TransactionState,
    #[serde(flatten)]
    pub report: StatusReport,
    /// Local time of the query, RFC 3339
    pub checked_at: String,
}

/// GET /api/status - Query the device status words.
pub async fn status(State(state): State<Arc<AppState>>) -> Result<Json<StatusResponse>, ApiFailure> {
    let (transaction, result) = with_printer(&state, |printer| {
        (printer.state(), printer.query_status())
    })
    .await?;
    let report = result.map_err(|e| api_error(status_for(&e), e.to_string()))?;

    Ok(Json(StatusResponse {
        ok: report.is_ready(),
        state: transaction,
        report,
        checked_at: chrono::Local::now().to_rfc3339(),
    }))
}

#[derive(Debug, Default, Deserialize)]
pub struct TestPrintRequest {
    /// Lines to print; the default test page when absent
    #[serde(default)]
    pub lines: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct TestPrintResponse {
    pub ok: bool,
    pub message: String,
}

/// POST /api/test-print - Print a non-fiscal test document.
pub async fn test_print(
    State(state): State<Arc<AppState>>,
    body: Option<Json<TestPrintRequest>>,
) -> Result<Json<TestPrintResponse>, ApiFailure> {
    let lines = body
        .and_then(|Json(req)| req.lines)
        .unwrap_or_else(test_page);
    let count = lines.len();

    with_printer(&state, move |printer| printer.test_print(&lines))
        .await?
        .map_err(|e| api_error(status_for(&e), e.to_string()))?;

    Ok(Json(TestPrintResponse {
        ok: true,
        message: format!("Test print sent ({} lines)", count),
    }))
}

/// POST /api/invoice - Print a fiscal invoice.
///
/// Device failures are reported in the outcome body, not as HTTP errors.
pub async fn invoice(
    State(state): State<Arc<AppState>>,
    Json(invoice): Json<Invoice>,
) -> Result<Json<InvoiceOutcome>, ApiFailure> {
    let outcome = with_printer(&state, move |printer| printer.print_invoice(&invoice)).await?;
    Ok(Json(outcome))
}
