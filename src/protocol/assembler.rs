//! # Response Assembly
//!
//! Serial reads return whatever bytes happen to be in the driver buffer, so a
//! response may arrive in one piece, byte by byte, or anything in between.
//! [`ResponseAssembler`] accumulates chunks until a complete, checksum-valid
//! frame is present.
//!
//! ## Byte Handling
//!
//! | Byte | Before STX | Inside frame (before ETX) | After ETX |
//! |------|------------|---------------------------|-----------|
//! | STX | starts frame | restarts frame | checksum byte |
//! | BUSY (0x12) | extends deadline | extends deadline, not buffered | XOR: checksum byte; additive: as before ETX |
//! | NAK (0x15) | protocol error | buffered | checksum byte |
//! | other | discarded | buffered | checksum byte |
//!
//! ## Completion
//!
//! A frame is complete when the buffer holds at least `STX SEQ CMD ETX` plus
//! the checksum width, and ETX sits exactly `width` bytes from the end. The
//! checksum is then recomputed; a mismatch is terminal.
//!
//! ## Deadline
//!
//! The deadline is a plain [`Instant`]. Each BUSY byte pushes it forward by
//! a fixed increment, so a device that keeps signaling "still working" is
//! given more time, and the deadline never moves backwards.

use std::time::{Duration, Instant};

use tracing::{debug, trace, warn};

use crate::error::{FiscalError, ProtocolFault};
use crate::transport::Transport;

use super::checksum::Checksum;
use super::commands::{ACK, BUSY, ETX, NAK, STX};
use super::frame::{Frame, render_bytes};

/// Upper bound on a single response.
pub const MAX_RESPONSE_LEN: usize = 4096;

/// Longest single read while waiting, so deadline changes are noticed promptly.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// `STX SEQ CMD ETX`
const MIN_FRAME_BASE: usize = 4;

/// Outcome of feeding one chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Feed {
    /// A verified frame is ready
    Complete(Frame),
    /// More bytes are needed
    Continuing,
}

/// Reassembles one response from an arbitrarily fragmented byte stream.
#[derive(Debug)]
pub struct ResponseAssembler {
    command: u8,
    checksum: Checksum,
    buffer: Vec<u8>,
    etx_seen: bool,
    started: Instant,
    deadline: Instant,
    busy_extension: Duration,
    busy_signals: u32,
}

impl ResponseAssembler {
    /// Start waiting for the response to `command`.
    pub fn new(
        command: u8,
        checksum: Checksum,
        timeout: Duration,
        busy_extension: Duration,
        now: Instant,
    ) -> Self {
        Self {
            command,
            checksum,
            buffer: Vec::with_capacity(64),
            etx_seen: false,
            started: now,
            deadline: now + timeout,
            busy_extension,
            busy_signals: 0,
        }
    }

    /// Current deadline, including busy extensions.
    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// How many BUSY bytes have been received.
    pub fn busy_signals(&self) -> u32 {
        self.busy_signals
    }

    /// Consume a chunk of inbound bytes.
    ///
    /// Bytes after a completed frame within the same chunk are dropped; they
    /// cannot belong to this request.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Feed, FiscalError> {
        for (i, &byte) in chunk.iter().enumerate() {
            if self.buffer.is_empty() {
                match byte {
                    STX => self.buffer.push(byte),
                    BUSY => self.extend_deadline(),
                    NAK => return Err(FiscalError::Protocol(ProtocolFault::Nak)),
                    ACK => trace!("ACK before response frame"),
                    other => trace!("discarding 0x{:02X} before STX", other),
                }
                continue;
            }

            if !self.etx_seen {
                match byte {
                    BUSY => {
                        self.extend_deadline();
                        continue;
                    }
                    STX => {
                        warn!(
                            "restarting frame, discarded {}",
                            render_bytes(&self.buffer)
                        );
                        self.buffer.clear();
                        self.buffer.push(byte);
                        continue;
                    }
                    ETX if self.buffer.len() >= MIN_FRAME_BASE - 1 => self.etx_seen = true,
                    _ => {}
                }
            } else if byte == BUSY && self.checksum.is_textual() {
                self.extend_deadline();
                continue;
            }

            self.buffer.push(byte);
            if self.buffer.len() > MAX_RESPONSE_LEN {
                return Err(FiscalError::Protocol(ProtocolFault::Malformed(format!(
                    "response exceeds {} bytes",
                    MAX_RESPONSE_LEN
                ))));
            }

            if let Some(frame) = self.try_complete()? {
                let leftover = &chunk[i + 1..];
                if !leftover.is_empty() {
                    warn!(
                        "dropping {} bytes after response: {}",
                        leftover.len(),
                        render_bytes(leftover)
                    );
                }
                return Ok(Feed::Complete(frame));
            }
        }
        Ok(Feed::Continuing)
    }

    /// Fail with [`FiscalError::Timeout`] once the deadline has passed.
    pub fn check_deadline(&self, now: Instant) -> Result<(), FiscalError> {
        if now >= self.deadline {
            return Err(FiscalError::Timeout {
                command: self.command,
                waited: now.duration_since(self.started),
            });
        }
        Ok(())
    }

    /// Drive the assembler from a transport until a frame completes or the
    /// deadline passes.
    pub fn read_from<T: Transport + ?Sized>(
        mut self,
        transport: &mut T,
    ) -> Result<Frame, FiscalError> {
        let mut buf = [0u8; 256];
        loop {
            let now = Instant::now();
            self.check_deadline(now)?;
            let wait = self.deadline.duration_since(now).min(POLL_INTERVAL);
            let n = transport.read(&mut buf, wait)?;
            if n == 0 {
                continue;
            }
            trace!("rx {}", render_bytes(&buf[..n]));
            if let Feed::Complete(frame) = self.feed(&buf[..n])? {
                return Ok(frame);
            }
        }
    }

    fn extend_deadline(&mut self) {
        self.busy_signals += 1;
        self.deadline += self.busy_extension;
        debug!(
            "device busy (signal {}), deadline extended by {:?}",
            self.busy_signals, self.busy_extension
        );
    }

    fn try_complete(&mut self) -> Result<Option<Frame>, FiscalError> {
        let width = self.checksum.width();
        let len = self.buffer.len();
        if len < MIN_FRAME_BASE + width || self.buffer[len - width - 1] != ETX {
            return Ok(None);
        }

        let etx = len - width - 1;
        let expected = self.checksum.compute(&self.buffer[1..=etx]);
        let received = &self.buffer[etx + 1..];
        if expected != received {
            return Err(FiscalError::Checksum {
                expected: render_code(&expected),
                received: render_code(received),
            });
        }

        let bytes = std::mem::take(&mut self.buffer);
        self.etx_seen = false;
        Ok(Some(Frame::from_verified(bytes, width)))
    }
}

/// Checksum codes as text: ASCII hex stays as-is, raw bytes are hex-dumped.
fn render_code(code: &[u8]) -> String {
    if code.iter().all(u8::is_ascii_graphic) {
        String::from_utf8_lossy(code).into_owned()
    } else {
        code.iter().map(|b| format!("{:02X}", b)).collect()
    }
}
