//! # Printer Module
//!
//! Device-specific protocol settings.
//!
//! ## Modules
//!
//! - [`profile`]: Checksum strategy, close opcode, timeouts and reset sequence per device family

pub mod profile;

pub use profile::DeviceProfile;
