//! # Transport Layer
//!
//! Raw byte channels to a fiscal printer. The protocol layer never touches
//! file descriptors directly; everything goes through [`Transport`].
//!
//! ## Available Transports
//!
//! - [`serial`]: Serial ports (RS-232, USB serial adapters, RFCOMM) via `serialport`
//! - [`mock`]: Scripted in-memory device for tests and dry runs

use std::time::Duration;

use crate::error::FiscalError;

pub mod mock;
pub mod serial;

pub use mock::{Reply, ScriptedTransport};
pub use serial::{PortDescriptor, SerialConfig, SerialTransport, list_ports};

/// A bidirectional byte channel.
pub trait Transport {
    /// Write every byte, blocking until the driver accepted them.
    fn write_all(&mut self, data: &[u8]) -> Result<(), FiscalError>;

    /// Read whatever is available, waiting at most `timeout` for the first
    /// byte. `Ok(0)` means nothing arrived in time.
    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, FiscalError>;

    /// Drop any bytes received but not yet read.
    fn discard_input(&mut self) -> Result<(), FiscalError>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn write_all(&mut self, data: &[u8]) -> Result<(), FiscalError> {
        (**self).write_all(data)
    }

    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, FiscalError> {
        (**self).read(buf, timeout)
    }

    fn discard_input(&mut self) -> Result<(), FiscalError> {
        (**self).discard_input()
    }
}

/// Type-erased transport, as held by the HTTP server.
pub type DynTransport = Box<dyn Transport + Send>;
