//! # HTTP API for Fiscal Printing
//!
//! A thin JSON layer over [`FiscalPrinter`](crate::fiscal::FiscalPrinter) so
//! a point-of-sale frontend can drive the device without linking the crate.
//!
//! ## Usage
//!
//! ```bash
//! fiscalia serve --listen 127.0.0.1:8080 --device /dev/ttyUSB0
//! ```
//!
//! ## Endpoints
//!
//! | Method | Path | Body | Response |
//! |--------|------|------|----------|
//! | GET | `/api/ports` | | `{ports, selected}` |
//! | POST | `/api/port` | `{path}` | `{ok, path, profile}` |
//! | GET | `/api/status` | | `{ok, state, printer, fiscal, conditions, checked_at}` |
//! | POST | `/api/test-print` | `{lines?}` | `{ok, message}` |
//! | POST | `/api/invoice` | invoice JSON | `{ok, state, conditions, recovery, recovered, message}` |
//!
//! Device I/O runs on the blocking pool with the session lock held for the
//! whole operation, so concurrent requests are serialized per device.

mod handlers;
mod state;

pub use state::{AppState, ServerConfig};

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::error::FiscalError;

/// Build the API router around shared state.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/ports", get(handlers::ports::list))
        .route("/api/port", post(handlers::ports::select))
        .route("/api/status", get(handlers::device::status))
        .route("/api/test-print", post(handlers::device::test_print))
        .route("/api/invoice", post(handlers::device::invoice))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server.
///
/// ## Example
///
/// ```no_run
/// use fiscalia::printer::DeviceProfile;
/// use fiscalia::server::{serve, ServerConfig};
/// use fiscalia::transport::SerialConfig;
///
/// # async fn example() -> Result<(), fiscalia::error::FiscalError> {
/// let config = ServerConfig {
///     listen_addr: "127.0.0.1:8080".to_string(),
///     device_path: Some("/dev/ttyUSB0".to_string()),
///     profile: DeviceProfile::pnp(),
///     serial: SerialConfig::default(),
/// };
///
/// serve(config).await?;
/// # Ok(())
/// # }
/// ```
pub async fn serve(config: ServerConfig) -> Result<(), FiscalError> {
    let app_state = Arc::new(AppState::new(config.clone()));

    if let Some(path) = config.device_path.clone() {
        let open_config = config.clone();
        let opened = tokio::task::spawn_blocking(move || AppState::open_port(&open_config, &path))
            .await
            .map_err(|e| FiscalError::Transport(format!("Task error: {}", e)))?;
        match opened {
            Ok(port) => {
                info!("printer port: {}", port.path);
                app_state.select(port).await;
            }
            // Keep serving; a port can still be picked via POST /api/port
            Err(e) => warn!("could not open initial port: {}", e),
        }
    }

    let app = router(app_state);

    info!(
        "fiscalia HTTP server listening on {} (profile {})",
        config.listen_addr, config.profile.name
    );

    let listener = tokio::net::TcpListener::bind(&config.listen_addr)
        .await
        .map_err(|e| {
            FiscalError::Transport(format!("Failed to bind to {}: {}", config.listen_addr, e))
        })?;

    axum::serve(listener, app)
        .await
        .map_err(|e| FiscalError::Transport(format!("Server error: {}", e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::printer::DeviceProfile;
    use crate::transport::{DynTransport, Reply, ScriptedTransport, SerialConfig};
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use serde_json::{Value, json};
    use std::time::Duration;
    use tower::ServiceExt;

    fn config() -> ServerConfig {
        let mut profile = DeviceProfile::pnp()
            .with_timeouts(Duration::from_millis(50), Duration::from_millis(50));
        profile.reset_settle_ms = 0;
        ServerConfig {
            listen_addr: "127.0.0.1:0".to_string(),
            device_path: None,
            profile,
            serial: SerialConfig::default(),
        }
    }

    fn app_with(script: Vec<Reply>) -> Router {
        let config = config();
        let device = ScriptedTransport::new(config.profile.checksum, script);
        let state = AppState::with_transport(config, "/dev/ttyTEST0", Box::new(device) as DynTransport);
        router(Arc::new(state))
    }

    async fn call(app: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => request
                .header("content-type", "application/json")
                .body(Body::from(json.to_string())),
            None => request.body(Body::empty()),
        }
        .unwrap();

        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    fn invoice_json() -> Value {
        json!({
            "customer": { "name": "ACME C.A.", "tax_id": "J000000000" },
            "items": [
                { "description": "Widget", "quantity": 1, "unit_amount": 10.0, "tax_rate": 16.0 }
            ],
            "payment": { "method": "cash", "amount": 11.6 }
        })
    }

    #[tokio::test]
    async fn test_invoice_committed() {
        let app = app_with(vec![Reply::Ok, Reply::Ok, Reply::Ok, Reply::Ok]);
        let (status, body) = call(app, "POST", "/api/invoice", Some(invoice_json())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], true);
        assert_eq!(body["state"], "committed");
        assert_eq!(body["recovery"], "none");
        assert_eq!(body["conditions"], json!([]));
    }

    #[tokio::test]
    async fn test_invoice_refused_on_paper_out() {
        let app = app_with(vec![Reply::Status(0x4000, 0)]);
        let (status, body) = call(app, "POST", "/api/invoice", Some(invoice_json())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], false);
        assert_eq!(body["state"], "idle");
        assert_eq!(body["conditions"], json!(["paper_out"]));
    }

    #[tokio::test]
    async fn test_invoice_timeout_reports_recovery() {
        let app = app_with(vec![Reply::Ok, Reply::Ok, Reply::Silent, Reply::Ok]);
        let (_, body) = call(app, "POST", "/api/invoice", Some(invoice_json())).await;
        assert_eq!(body["ok"], false);
        assert_eq!(body["state"], "aborted");
        assert_eq!(body["recovery"], "terminated");
        assert_eq!(body["recovered"], true);
    }

    #[tokio::test]
    async fn test_status_endpoint() {
        let app = app_with(vec![Reply::Status(0, 0x0800)]);
        let (status, body) = call(app, "GET", "/api/status", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["ok"], false);
        assert_eq!(body["state"], "idle");
        assert_eq!(body["fiscal"], 0x0800);
        assert_eq!(body["conditions"], json!(["z_report_required"]));
    }

    #[tokio::test]
    async fn test_status_timeout_is_gateway_timeout() {
        let app = app_with(vec![Reply::Silent]);
        let (status, body) = call(app, "GET", "/api/status", None).await;
        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(body["ok"], false);
    }

    #[tokio::test]
    async fn test_test_print_with_lines() {
        let app = app_with(vec![Reply::Ok, Reply::Ok, Reply::Ok]);
        let (status, body) = call(
            app,
            "POST",
            "/api/test-print",
            Some(json!({ "lines": ["HOLA"] })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Test print sent (1 lines)");
    }

    #[tokio::test]
    async fn test_no_port_selected() {
        let state = AppState::new(config());
        let app = router(Arc::new(state));
        let (status, body) = call(app, "GET", "/api/status", None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["ok"], false);
    }

    #[tokio::test]
    async fn test_ports_lists_selected() {
        let app = app_with(vec![]);
        let (status, body) = call(app, "GET", "/api/ports", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["selected"], "/dev/ttyTEST0");
        assert!(body["ports"].is_array());
    }

    #[tokio::test]
    async fn test_select_missing_port() {
        let app = app_with(vec![]);
        let (status, body) = call(
            app,
            "POST",
            "/api/port",
            Some(json!({ "path": "/dev/fiscalia-missing" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["message"].as_str().unwrap().contains("fiscalia-missing"));
    }
}
