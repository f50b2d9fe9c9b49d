//! Server state and configuration.

use std::sync::{Arc, Mutex};

use tokio::sync::RwLock;

use crate::error::FiscalError;
use crate::fiscal::{FiscalPrinter, SharedPrinter};
use crate::printer::DeviceProfile;
use crate::transport::{DynTransport, SerialConfig, SerialTransport};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to listen on (e.g., "0.0.0.0:8080")
    pub listen_addr: String,
    /// Port to open at startup (e.g., "/dev/ttyUSB0"); can be changed via `POST /api/port`
    pub device_path: Option<String>,
    pub profile: DeviceProfile,
    pub serial: SerialConfig,
}

/// The port currently in use.
pub struct SelectedPort {
    pub path: String,
    pub printer: SharedPrinter<DynTransport>,
}

/// Application state shared across handlers.
pub struct AppState {
    pub config: ServerConfig,
    selected: RwLock<Option<SelectedPort>>,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        Self {
            config,
            selected: RwLock::new(None),
        }
    }

    /// State with a transport already attached, bypassing serial setup.
    pub fn with_transport(config: ServerConfig, path: &str, transport: DynTransport) -> Self {
        let printer = FiscalPrinter::new(transport, config.profile.clone());
        Self {
            config,
            selected: RwLock::new(Some(SelectedPort {
                path: path.to_string(),
                printer: Arc::new(Mutex::new(printer)),
            })),
        }
    }

    /// Open `path` as a serial port and make it the active printer.
    ///
    /// Blocks on the open; call from a blocking context.
    pub fn open_port(config: &ServerConfig, path: &str) -> Result<SelectedPort, FiscalError> {
        let transport = SerialTransport::open(path, config.serial)?;
        let printer = FiscalPrinter::new(Box::new(transport) as DynTransport, config.profile.clone());
        Ok(SelectedPort {
            path: path.to_string(),
            printer: Arc::new(Mutex::new(printer)),
        })
    }

    pub async fn select(&self, port: SelectedPort) {
        *self.selected.write().await = Some(port);
    }

    /// Path and session of the active printer, if any.
    pub async fn selected(&self) -> Option<(String, SharedPrinter<DynTransport>)> {
        self.selected
            .read()
            .await
            .as_ref()
            .map(|port| (port.path.clone(), port.printer.clone()))
    }
}
