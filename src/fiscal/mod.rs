//! # Fiscal Transactions
//!
//! A fiscal invoice is a multi-step conversation with the device. Once the
//! device has opened a fiscal document it refuses anything else until that
//! document is closed, so an interrupted invoice must be cleaned up before
//! the printer is usable again.
//!
//! ## State Machine
//!
//! ```text
//!          open_invoice        add_item          close
//!   Idle ─────────────► Open ───────────► Itemizing ─────► Closing ─────► Committed
//!    ▲                   │                 │  ▲ add_item      │
//!    │                   └────── any failure ─┴──────────────┘
//!    │                                     │
//!    │                                     ▼
//!    │                                  Failed ── recovery ──► Aborted
//!    └──────────── open_invoice from Committed / Aborted ─────────┘
//! ```
//!
//! ## Recovery
//!
//! 1. Send the terminate close (`0x45 T 000000000000`), which releases any
//!    open fiscal document.
//! 2. If that fails because the link is broken, write the hardware reset
//!    sequence, wait for the device to settle, and restart the sequence
//!    counter.
//!
//! When the device explicitly rejects the *open* request no document
//! exists, so nothing is sent.

use std::fmt;

use serde::Serialize;

pub mod invoice;
pub mod session;

pub use invoice::{Customer, Invoice, InvoiceLineItem, LineQualifier, Payment, PaymentMethod};
pub use session::{
    DEFAULT_TEST_LINES, FiscalPrinter, InvoiceOutcome, Recovery, SharedPrinter, StatusReport,
    test_page,
};

/// Where the in-flight invoice stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionState {
    /// No document has been opened in this session
    #[default]
    Idle,
    /// Header accepted, no lines yet
    Open,
    /// At least one line accepted
    Itemizing,
    /// Close sent, waiting for the device to print and commit
    Closing,
    /// Invoice committed to fiscal memory
    Committed,
    /// Transaction interrupted and cleaned up
    Aborted,
    /// Transaction interrupted, cleanup in progress
    Failed,
}

impl TransactionState {
    /// No fiscal document is (or may be) open on the device.
    #[inline]
    pub fn is_settled(self) -> bool {
        matches!(self, Self::Idle | Self::Committed | Self::Aborted)
    }

    /// A fiscal document is open on the device.
    #[inline]
    pub fn in_document(self) -> bool {
        matches!(self, Self::Open | Self::Itemizing | Self::Closing)
    }
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Open => "open",
            Self::Itemizing => "itemizing",
            Self::Closing => "closing",
            Self::Committed => "committed",
            Self::Aborted => "aborted",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settled_states() {
        assert!(TransactionState::Idle.is_settled());
        assert!(TransactionState::Committed.is_settled());
        assert!(TransactionState::Aborted.is_settled());
        assert!(!TransactionState::Failed.is_settled());
        assert!(!TransactionState::Itemizing.is_settled());
    }

    #[test]
    fn test_display_matches_serde() {
        for state in [
            TransactionState::Idle,
            TransactionState::Open,
            TransactionState::Itemizing,
            TransactionState::Closing,
            TransactionState::Committed,
            TransactionState::Aborted,
            TransactionState::Failed,
        ] {
            let json = serde_json::to_string(&state).unwrap();
            assert_eq!(json, format!("\"{}\"", state));
        }
    }
}
