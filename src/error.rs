//! # Error Types
//!
//! This module defines the error taxonomy used throughout the fiscalia library.
//!
//! Errors fall into three groups:
//!
//! - **Communication failures** (`Transport`, `Io`, `Timeout`, `Checksum`):
//!   the link itself misbehaved. These escalate to a hardware reset when the
//!   recovery close also fails.
//! - **Device-reported faults** (`Protocol`, `Status`): the device answered,
//!   and the answer was a rejection.
//! - **Caller mistakes** (`State`, `InvalidField`): rejected before any byte
//!   is written.

use std::time::Duration;

use thiserror::Error;

use crate::fiscal::TransactionState;
use crate::protocol::status::Condition;

/// Main error type for fiscalia operations
#[derive(Debug, Error)]
pub enum FiscalError {
    /// Transport-level errors (open, configure, write)
    #[error("Transport error: {0}")]
    Transport(String),

    /// No complete frame arrived before the deadline
    #[error("Timed out after {waited:?} waiting for response to command 0x{command:02X}")]
    Timeout { command: u8, waited: Duration },

    /// A frame arrived but its checksum did not match
    #[error("Checksum mismatch: computed {expected}, received {received}")]
    Checksum { expected: String, received: String },

    /// The device rejected the command or answered something unparseable
    #[error("Protocol error: {0}")]
    Protocol(ProtocolFault),

    /// The device answered with fault bits set in its status words
    #[error("Device reported fault on command 0x{command:02X}: {}", format_conditions(.conditions))]
    Status {
        command: u8,
        conditions: Vec<Condition>,
    },

    /// Operation not valid in the current transaction state
    #[error("Cannot {operation} while transaction is {state}")]
    State {
        operation: &'static str,
        state: TransactionState,
    },

    /// Field value that the device would reject (too long, bad charset, out of range)
    #[error("Invalid field: {0}")]
    InvalidField(String),

    /// I/O error wrapper
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Reasons the device's answer could not be accepted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolFault {
    /// Negative acknowledgment (0x15) instead of a response frame
    #[error("device sent NAK")]
    Nak,

    /// The response carried a literal `ERROR` token in one of its fields
    #[error("device returned error text: {0}")]
    ErrorToken(String),

    /// The echoed sequence number belongs to a different request
    #[error("sequence mismatch: sent 0x{sent:02X}, received 0x{received:02X}")]
    SequenceMismatch { sent: u8, received: u8 },

    /// Frame could not be decomposed into header, status words and fields
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl FiscalError {
    /// Whether this error means the link failed, as opposed to the device
    /// answering with a rejection.
    pub fn is_communication_failure(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::Io(_) | Self::Timeout { .. } | Self::Checksum { .. }
        )
    }

    /// Fault conditions carried by this error, if any.
    pub fn conditions(&self) -> &[Condition] {
        match self {
            Self::Status { conditions, .. } => conditions,
            _ => &[],
        }
    }
}

impl From<ProtocolFault> for FiscalError {
    fn from(fault: ProtocolFault) -> Self {
        Self::Protocol(fault)
    }
}

fn format_conditions(conditions: &[Condition]) -> String {
    conditions
        .iter()
        .map(|c| c.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_communication_failures() {
        assert!(FiscalError::Transport("gone".into()).is_communication_failure());
        assert!(
            FiscalError::Timeout {
                command: 0x42,
                waited: Duration::from_secs(5)
            }
            .is_communication_failure()
        );
        assert!(
            FiscalError::Checksum {
                expected: "0123".into(),
                received: "0124".into()
            }
            .is_communication_failure()
        );
        assert!(!FiscalError::Protocol(ProtocolFault::Nak).is_communication_failure());
        assert!(
            !FiscalError::Status {
                command: 0x40,
                conditions: vec![Condition::PaperOut]
            }
            .is_communication_failure()
        );
    }

    #[test]
    fn test_status_message_lists_conditions() {
        let err = FiscalError::Status {
            command: 0x40,
            conditions: vec![Condition::PaperOut, Condition::ZReportRequired],
        };
        let msg = err.to_string();
        assert!(msg.contains("0x40"));
        assert!(msg.contains("paper out"));
        assert!(msg.contains("Z report required"));
    }

    #[test]
    fn test_state_message() {
        let err = FiscalError::State {
            operation: "open invoice",
            state: TransactionState::Itemizing,
        };
        assert_eq!(
            err.to_string(),
            "Cannot open invoice while transaction is itemizing"
        );
    }
}
