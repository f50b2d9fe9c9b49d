//! # Device Profiles
//!
//! Fiscal printers from the same family speak the same framing but differ in
//! small, incompatible details. A [`DeviceProfile`] captures those details so
//! the session code stays identical across devices.
//!
//! ## Built-in Profiles
//!
//! | Name | Checksum | Close | Notes |
//! |------|----------|-------|-------|
//! | `pnp` | 4 hex digits (additive) | `0x45` qualified close | Current firmware |
//! | `pnp-legacy` | 1 raw byte (XOR) | `0x44` totalize | Older firmware |
//!
//! ## Timing
//!
//! ```text
//! request ──► │◄──── response timeout (5 s) ────►│
//!             │  BUSY  │◄ +800 ms ►│ BUSY │◄ +800 ms ►│ ...
//! close   ──► │◄──────────── close timeout (20 s) ──────────►│
//! ```
//!
//! ## Usage
//!
//! ```
//! use fiscalia::printer::DeviceProfile;
//! use fiscalia::protocol::checksum::Checksum;
//!
//! let profile = DeviceProfile::parse("pnp-legacy").unwrap();
//! assert_eq!(profile.checksum, Checksum::Xor);
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::protocol::checksum::Checksum;
use crate::protocol::commands::CloseCommand;

/// Bytes that make the device abandon whatever it is doing and re-initialize
/// its serial state. Sent without framing or checksum.
pub const DEFAULT_RESET_SEQUENCE: [u8; 8] = [0x07, 0x08, 0x09, 0x0A, 0x0B, 0x0C, 0x0D, 0x0E];

/// Per-device protocol variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceProfile {
    /// Short identifier (`pnp`, `pnp-legacy`, ...)
    pub name: String,
    pub checksum: Checksum,
    /// Which opcode ends an invoice
    pub close: CloseCommand,
    /// Wait for an ordinary response
    pub response_timeout_ms: u64,
    /// Wait for the close response; the device prints the whole document first
    pub close_timeout_ms: u64,
    /// Added to the deadline per BUSY byte
    pub busy_extension_ms: u64,
    pub reset_sequence: Vec<u8>,
    /// Pause after the reset sequence before the device accepts frames again
    pub reset_settle_ms: u64,
}

impl DeviceProfile {
    /// Current firmware: additive checksum, qualified close.
    pub fn pnp() -> Self {
        Self {
            name: "pnp".to_string(),
            checksum: Checksum::Additive,
            close: CloseCommand::Qualified,
            response_timeout_ms: 5_000,
            close_timeout_ms: 20_000,
            busy_extension_ms: 800,
            reset_sequence: DEFAULT_RESET_SEQUENCE.to_vec(),
            reset_settle_ms: 2_000,
        }
    }

    /// Older firmware: single-byte XOR checksum, totalize close.
    pub fn pnp_legacy() -> Self {
        Self {
            name: "pnp-legacy".to_string(),
            checksum: Checksum::Xor,
            close: CloseCommand::Totalize,
            ..Self::pnp()
        }
    }

    #[inline]
    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }

    #[inline]
    pub fn close_timeout(&self) -> Duration {
        Duration::from_millis(self.close_timeout_ms)
    }

    #[inline]
    pub fn busy_extension(&self) -> Duration {
        Duration::from_millis(self.busy_extension_ms)
    }

    #[inline]
    pub fn reset_settle(&self) -> Duration {
        Duration::from_millis(self.reset_settle_ms)
    }

    /// Same profile with every wait scaled down, for simulated devices.
    pub fn with_timeouts(mut self, response: Duration, close: Duration) -> Self {
        self.response_timeout_ms = response.as_millis() as u64;
        self.close_timeout_ms = close.as_millis() as u64;
        self
    }

    /// Parse a profile name (case-insensitive).
    pub fn parse(s: &str) -> Result<Self, String> {
        let wanted = s.trim().to_lowercase();
        Self::built_in()
            .into_iter()
            .find(|p| p.name == wanted)
            .ok_or_else(|| {
                let names: Vec<String> = Self::built_in().into_iter().map(|p| p.name).collect();
                format!("Unknown profile '{}'. Use one of: {}", s, names.join(", "))
            })
    }

    /// List all built-in profiles.
    pub fn built_in() -> Vec<Self> {
        vec![Self::pnp(), Self::pnp_legacy()]
    }
}

impl Default for DeviceProfile {
    fn default() -> Self {
        Self::pnp()
    }
}

// ============================================================================
// TESTS
// ============================================================================
