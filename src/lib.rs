//! # Fiscalia - Fiscal Printer Driver
//!
//! Fiscalia drives certified fiscal printers that speak the PnP serial
//! protocol: sequence-numbered, checksum-protected frames exchanged one at a
//! time over an RS-232 link. It provides:
//!
//! - **Protocol implementation**: frame building, checksums, response reassembly and parsing
//! - **Status decoding**: printer and fiscal status bits to symbolic conditions
//! - **Transactions**: the open → items → close invoice flow with abort/reset recovery
//! - **Transport**: serial TTY access plus a scripted device for tests
//! - **Collaborator surface**: CLI and HTTP API
//!
//! ## Quick Start
//!
//! ```no_run
//! use fiscalia::{
//!     fiscal::{FiscalPrinter, Invoice},
//!     printer::DeviceProfile,
//!     transport::{SerialConfig, SerialTransport},
//! };
//!
//! let transport = SerialTransport::open("/dev/ttyUSB0", SerialConfig::default())?;
//! let mut printer = FiscalPrinter::new(transport, DeviceProfile::pnp());
//!
//! let invoice: Invoice = serde_json::from_str(&std::fs::read_to_string("factura.json")?)
//!     .map_err(|e| fiscalia::FiscalError::InvalidField(e.to_string()))?;
//! let outcome = printer.print_invoice(&invoice);
//! println!("{} ({})", outcome.message, outcome.state);
//!
//! # Ok::<(), fiscalia::error::FiscalError>(())
//! ```
//!
//! ## Module Overview
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`protocol`] | Frames, checksums, assembler, parser, status bits |
//! | [`fiscal`] | Invoice data and the transaction state machine |
//! | [`transport`] | Serial and scripted byte channels |
//! | [`printer`] | Device profiles |
//! | [`server`] | HTTP API |
//! | [`error`] | Error types |

pub mod error;
pub mod fiscal;
pub mod printer;
pub mod protocol;
pub mod server;
pub mod transport;

// Re-exports for convenience
pub use error::FiscalError;
pub use fiscal::FiscalPrinter;
pub use printer::DeviceProfile;
