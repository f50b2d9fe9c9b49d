//! # Serial Transport
//!
//! Talks to the fiscal printer over a serial device node: a native port
//! (`/dev/ttyS0`), a USB adapter (`/dev/ttyUSB0`, `/dev/ttyACM0`) or a
//! Bluetooth SPP binding (`/dev/rfcomm0`). Line setup and port discovery go
//! through the `serialport` crate.
//!
//! ## Line Settings
//!
//! The device expects 9600 baud, 8 data bits, no parity, 1 stop bit and no
//! flow control (0x11/0x13 are ordinary bytes in this protocol). The port is
//! opened raw so protocol bytes pass through unmodified.
//!
//! ## Permissions
//!
//! Serial nodes are usually owned by the `dialout` (or `uucp`) group:
//!
//! ```bash
//! $ sudo usermod -aG dialout $USER
//! ```

use std::io::{self, Read, Write};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serialport::{ClearBuffer, DataBits, FlowControl, SerialPort, SerialPortInfo, SerialPortType, StopBits};
use tracing::debug;

use super::Transport;
use crate::error::FiscalError;

/// Device name prefixes that are treated as fiscal printer candidates.
const PORT_PREFIXES: &[&str] = &["ttyS", "ttyUSB", "ttyACM", "rfcomm"];

/// Read timeout set at open; every read overrides it.
const OPEN_TIMEOUT: Duration = Duration::from_millis(50);

/// Parity setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Parity {
    #[default]
    None,
    Even,
    Odd,
}

impl From<Parity> for serialport::Parity {
    fn from(parity: Parity) -> Self {
        match parity {
            Parity::None => serialport::Parity::None,
            Parity::Even => serialport::Parity::Even,
            Parity::Odd => serialport::Parity::Odd,
        }
    }
}

/// Serial line parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerialConfig {
    pub baud_rate: u32,
    /// 7 or 8
    pub data_bits: u8,
    pub parity: Parity,
    /// 1 or 2
    pub stop_bits: u8,
}

impl SerialConfig {
    /// 9600 8N1, what every supported device ships with.
    pub const FISCAL_DEFAULT: Self = Self {
        baud_rate: 9600,
        data_bits: 8,
        parity: Parity::None,
        stop_bits: 1,
    };

    fn data_bits(&self) -> Result<DataBits, FiscalError> {
        match self.data_bits {
            7 => Ok(DataBits::Seven),
            8 => Ok(DataBits::Eight),
            other => Err(FiscalError::Transport(format!(
                "Unsupported data bits {}",
                other
            ))),
        }
    }

    fn stop_bits(&self) -> Result<StopBits, FiscalError> {
        match self.stop_bits {
            1 => Ok(StopBits::One),
            2 => Ok(StopBits::Two),
            other => Err(FiscalError::Transport(format!(
                "Unsupported stop bits {}",
                other
            ))),
        }
    }
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self::FISCAL_DEFAULT
    }
}

/// # Serial Printer Transport
///
/// ## Example
///
/// ```no_run
/// use fiscalia::transport::{SerialConfig, SerialTransport, Transport};
///
/// let mut port = SerialTransport::open("/dev/ttyUSB0", SerialConfig::default())?;
/// port.discard_input()?;
/// # Ok::<(), fiscalia::error::FiscalError>(())
/// ```
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
    path: String,
}

impl SerialTransport {
    /// Open and configure a serial device.
    ///
    /// ## Errors
    ///
    /// Returns [`FiscalError::Transport`] if:
    /// - The line settings are not supported
    /// - The device doesn't exist
    /// - Permission denied (may need the dialout group)
    pub fn open(path: &str, config: SerialConfig) -> Result<Self, FiscalError> {
        let port = serialport::new(path, config.baud_rate)
            .data_bits(config.data_bits()?)
            .parity(config.parity.into())
            .stop_bits(config.stop_bits()?)
            .flow_control(FlowControl::None)
            .timeout(OPEN_TIMEOUT)
            .open()
            .map_err(|e| FiscalError::Transport(format!("Failed to open {}: {}", path, e)))?;

        debug!(
            "opened {} at {} baud, {}{}{}",
            path,
            config.baud_rate,
            config.data_bits,
            match config.parity {
                Parity::None => 'N',
                Parity::Even => 'E',
                Parity::Odd => 'O',
            },
            config.stop_bits
        );

        Ok(Self {
            port,
            path: path.to_string(),
        })
    }

    /// Device node this transport was opened on.
    pub fn path(&self) -> &str {
        &self.path
    }
}

impl Transport for SerialTransport {
    fn write_all(&mut self, data: &[u8]) -> Result<(), FiscalError> {
        Write::write_all(&mut *self.port, data)
            .and_then(|()| Write::flush(&mut *self.port))
            .map_err(|e| FiscalError::Transport(format!("Write to {} failed: {}", self.path, e)))
    }

    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, FiscalError> {
        self.port
            .set_timeout(timeout)
            .map_err(|e| FiscalError::Transport(format!("Failed to set timeout: {}", e)))?;
        match Read::read(&mut *self.port, buf) {
            Ok(n) => Ok(n),
            Err(e)
                if matches!(
                    e.kind(),
                    io::ErrorKind::TimedOut
                        | io::ErrorKind::WouldBlock
                        | io::ErrorKind::Interrupted
                ) =>
            {
                Ok(0)
            }
            Err(e) => Err(FiscalError::Transport(format!("Read failed: {}", e))),
        }
    }

    fn discard_input(&mut self) -> Result<(), FiscalError> {
        self.port
            .clear(ClearBuffer::Input)
            .map_err(|e| FiscalError::Transport(format!("Failed to clear input: {}", e)))
    }
}

// ============================================================================
// PORT DISCOVERY
// ============================================================================

/// What kind of hardware sits behind a port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PortKind {
    Usb,
    Pci,
    Bluetooth,
    Unknown,
}

/// One serial port as reported by the OS.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PortDescriptor {
    pub path: String,
    pub kind: PortKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manufacturer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub serial_number: Option<String>,
    /// USB `vid:pid` in hex
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usb_id: Option<String>,
}

impl From<SerialPortInfo> for PortDescriptor {
    fn from(info: SerialPortInfo) -> Self {
        let mut descriptor = Self {
            path: info.port_name,
            kind: PortKind::Unknown,
            manufacturer: None,
            product: None,
            serial_number: None,
            usb_id: None,
        };
        match info.port_type {
            SerialPortType::UsbPort(usb) => {
                descriptor.kind = PortKind::Usb;
                descriptor.usb_id = Some(format!("{:04x}:{:04x}", usb.vid, usb.pid));
                descriptor.manufacturer = usb.manufacturer;
                descriptor.product = usb.product;
                descriptor.serial_number = usb.serial_number;
            }
            SerialPortType::PciPort => descriptor.kind = PortKind::Pci,
            SerialPortType::BluetoothPort => descriptor.kind = PortKind::Bluetooth,
            SerialPortType::Unknown => {}
        }
        descriptor
    }
}

impl std::fmt::Display for PortDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.path)?;
        let details: Vec<&str> = [&self.manufacturer, &self.product]
            .into_iter()
            .flatten()
            .map(String::as_str)
            .collect();
        if !details.is_empty() {
            write!(f, " ({})", details.join(" "))?;
        }
        Ok(())
    }
}

/// Whether a device name looks like a fiscal printer candidate.
pub fn is_port_name(name: &str) -> bool {
    let name = name.rsplit('/').next().unwrap_or(name);
    PORT_PREFIXES.iter().any(|prefix| {
        name.strip_prefix(prefix)
            .is_some_and(|rest| !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()))
    })
}

/// List candidate serial ports, sorted by path.
pub fn list_ports() -> Result<Vec<PortDescriptor>, FiscalError> {
    let ports = serialport::available_ports()
        .map_err(|e| FiscalError::Transport(format!("Failed to list serial ports: {}", e)))?;
    Ok(candidates(ports))
}

fn candidates(ports: Vec<SerialPortInfo>) -> Vec<PortDescriptor> {
    let mut ports: Vec<PortDescriptor> = ports
        .into_iter()
        .filter(|info| is_port_name(&info.port_name))
        .map(PortDescriptor::from)
        .collect();
    ports.sort_by(|a, b| a.path.cmp(&b.path));
    ports
}

// ============================================================================
// TESTS
// ============================================================================
