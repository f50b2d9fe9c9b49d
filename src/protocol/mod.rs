//! # Fiscal Printer Protocol
//!
//! Low-level framing for the sequence-numbered, checksummed serial protocol
//! spoken by fiscal printers.
//!
//! ## Module Structure
//!
//! - [`commands`]: Control bytes, opcodes and request builders
//! - [`encoding`]: Latin-1 text encoding for field values
//! - [`checksum`]: Frame checksum strategies (additive hex, XOR)
//! - [`sequence`]: Cyclic sequence counter
//! - [`frame`]: Request/response frame layout
//! - [`assembler`]: Reassembly of fragmented responses with deadline handling
//! - [`response`]: Decomposition of responses into status words and fields
//! - [`status`]: Status-word bits to symbolic fault conditions
//!
//! ## Usage Example
//!
//! ```
//! use fiscalia::protocol::{checksum::Checksum, commands, frame::Frame, sequence::SequenceCounter};
//!
//! let mut seq = SequenceCounter::new();
//! let frame = Frame::build(seq.next(), &commands::status_query(), Checksum::Additive);
//!
//! assert_eq!(frame.opcode(), commands::CMD_STATUS);
//! assert_eq!(seq.peek(), 0x21);
//! // Write `frame.as_bytes()` to the transport...
//! ```

pub mod assembler;
pub mod checksum;
pub mod commands;
pub mod encoding;
pub mod frame;
pub mod response;
pub mod sequence;
pub mod status;

pub use assembler::{Feed, ResponseAssembler};
pub use checksum::Checksum;
pub use commands::Command;
pub use frame::Frame;
pub use response::ParsedResponse;
pub use sequence::SequenceCounter;
pub use status::{Condition, StatusWord};
