//! # Scripted Transport
//!
//! An in-memory stand-in for a fiscal printer. Each request frame written to
//! it consumes the next [`Reply`] from a script; the reply is turned into
//! response bytes that echo the request's sequence number and opcode, so
//! tests only describe *what* the device answers, not how it is framed.
//!
//! Writes that are not frames (the hardware reset sequence) are recorded but
//! consume no reply.
//!
//! ```
//! use fiscalia::protocol::{checksum::Checksum, commands, frame::Frame};
//! use fiscalia::transport::{Reply, ScriptedTransport, Transport};
//! use std::time::Duration;
//!
//! let mut device = ScriptedTransport::new(Checksum::Additive, [Reply::Ok]);
//! let request = Frame::build(0x20, &commands::status_query(), Checksum::Additive);
//! device.write_all(request.as_bytes())?;
//!
//! let mut buf = [0u8; 64];
//! let n = device.read(&mut buf, Duration::from_millis(10))?;
//! assert_eq!(buf[1], 0x20);
//! assert_eq!(buf[2], commands::CMD_STATUS);
//! # let _ = n;
//! # Ok::<(), fiscalia::error::FiscalError>(())
//! ```

use std::collections::VecDeque;
use std::thread;
use std::time::Duration;

use super::Transport;
use crate::error::FiscalError;
use crate::protocol::checksum::Checksum;
use crate::protocol::commands::{BUSY, Command, STX};
use crate::protocol::frame::Frame;

/// How the simulated device answers one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Clean status words, no data
    Ok,
    /// Clean status words followed by data fields
    Data(Vec<String>),
    /// Given printer and fiscal status words
    Status(u16, u16),
    /// `n` busy bytes, then a clean response
    Busy(u32),
    /// A clean response delivered in chunks of this many bytes
    Fragmented(usize),
    /// A clean response echoing the wrong sequence number
    WrongSequence,
    /// A clean response with a corrupted checksum
    BadChecksum,
    /// These exact chunks, no framing added
    Raw(Vec<Vec<u8>>),
    /// Nothing at all
    Silent,
    /// The write itself fails
    WriteFails,
}

/// Scripted in-memory device. See the module docs.
#[derive(Debug)]
pub struct ScriptedTransport {
    checksum: Checksum,
    script: VecDeque<Reply>,
    pending: VecDeque<Vec<u8>>,
    writes: Vec<Vec<u8>>,
}

impl ScriptedTransport {
    pub fn new(checksum: Checksum, script: impl IntoIterator<Item = Reply>) -> Self {
        Self {
            checksum,
            script: script.into_iter().collect(),
            pending: VecDeque::new(),
            writes: Vec::new(),
        }
    }

    /// Append more replies to the script.
    pub fn push(&mut self, reply: Reply) {
        self.script.push_back(reply);
    }

    /// Every write, in order.
    pub fn writes(&self) -> &[Vec<u8>] {
        &self.writes
    }

    /// Total bytes written.
    pub fn bytes_written(&self) -> usize {
        self.writes.iter().map(Vec::len).sum()
    }

    /// Opcodes of the frames written, in order.
    pub fn sent_opcodes(&self) -> Vec<u8> {
        self.writes
            .iter()
            .filter(|w| w.len() >= 3 && w[0] == STX)
            .map(|w| w[2])
            .collect()
    }

    /// Replies not yet consumed.
    pub fn remaining(&self) -> usize {
        self.script.len()
    }

    fn respond(&mut self, seq: u8, opcode: u8, reply: Reply) {
        let checksum = self.checksum;
        let frame = |seq: u8, printer: u16, fiscal: u16, data: &[String]| {
            let cmd = data.iter().fold(
                Command::new(opcode)
                    .field(format!("{:04X}", printer).into_bytes())
                    .field(format!("{:04X}", fiscal).into_bytes()),
                |cmd, f| cmd.field(f.as_bytes().to_vec()),
            );
            Frame::build(seq, &cmd, checksum).as_bytes().to_vec()
        };

        match reply {
            Reply::Ok => self.pending.push_back(frame(seq, 0, 0, &[])),
            Reply::Data(fields) => self.pending.push_back(frame(seq, 0, 0, &fields)),
            Reply::Status(printer, fiscal) => {
                self.pending.push_back(frame(seq, printer, fiscal, &[]))
            }
            Reply::Busy(n) => {
                for _ in 0..n {
                    self.pending.push_back(vec![BUSY]);
                }
                self.pending.push_back(frame(seq, 0, 0, &[]));
            }
            Reply::Fragmented(size) => {
                let bytes = frame(seq, 0, 0, &[]);
                for chunk in bytes.chunks(size.max(1)) {
                    self.pending.push_back(chunk.to_vec());
                }
            }
            Reply::WrongSequence => {
                let other = if seq == 0x20 { 0x21 } else { seq - 1 };
                self.pending.push_back(frame(other, 0, 0, &[]));
            }
            Reply::BadChecksum => {
                let mut bytes = frame(seq, 0, 0, &[]);
                if let Some(last) = bytes.last_mut() {
                    *last ^= 0x01;
                }
                self.pending.push_back(bytes);
            }
            Reply::Raw(chunks) => self.pending.extend(chunks),
            Reply::Silent | Reply::WriteFails => {}
        }
    }
}

impl Transport for ScriptedTransport {
    fn write_all(&mut self, data: &[u8]) -> Result<(), FiscalError> {
        let is_frame = data.len() >= 3 && data[0] == STX;
        if is_frame && self.script.front() == Some(&Reply::WriteFails) {
            self.script.pop_front();
            return Err(FiscalError::Transport("Write failed: device unplugged".to_string()));
        }

        self.writes.push(data.to_vec());
        if is_frame {
            if let Some(reply) = self.script.pop_front() {
                self.respond(data[1], data[2], reply);
            }
        }
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, FiscalError> {
        let Some(mut chunk) = self.pending.pop_front() else {
            thread::sleep(timeout);
            return Ok(0);
        };
        let n = chunk.len().min(buf.len());
        buf[..n].copy_from_slice(&chunk[..n]);
        if n < chunk.len() {
            self.pending.push_front(chunk.split_off(n));
        }
        Ok(n)
    }

    fn discard_input(&mut self) -> Result<(), FiscalError> {
        self.pending.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::commands;
    use crate::protocol::response;

    fn request(seq: u8) -> Frame {
        Frame::build(seq, &commands::status_query(), Checksum::Additive)
    }

    fn read_all(device: &mut ScriptedTransport) -> Vec<u8> {
        let mut out = Vec::new();
        let mut buf = [0u8; 8];
        loop {
            let n = device.read(&mut buf, Duration::ZERO).unwrap();
            if n == 0 {
                return out;
            }
            out.extend_from_slice(&buf[..n]);
        }
    }

    #[test]
    fn test_echoes_sequence_and_opcode() {
        let mut device = ScriptedTransport::new(Checksum::Additive, [Reply::Status(0x4000, 0)]);
        device.write_all(request(0x2A).as_bytes()).unwrap();

        let bytes = read_all(&mut device);
        let frame = Frame::from_verified(bytes, 4);
        let parsed = response::parse(&frame).unwrap();
        assert_eq!(parsed.sequence, 0x2A);
        assert_eq!(parsed.command, commands::CMD_STATUS);
        assert_eq!(parsed.printer_status.0, 0x4000);
    }

    #[test]
    fn test_non_frame_writes_consume_no_reply() {
        let mut device = ScriptedTransport::new(Checksum::Additive, [Reply::Ok]);
        device.write_all(&[0x07, 0x08, 0x09]).unwrap();
        assert_eq!(device.remaining(), 1);
        assert!(device.sent_opcodes().is_empty());
        assert_eq!(device.bytes_written(), 3);
    }

    #[test]
    fn test_write_fails_records_nothing() {
        let mut device = ScriptedTransport::new(Checksum::Additive, [Reply::WriteFails]);
        assert!(device.write_all(request(0x20).as_bytes()).is_err());
        assert!(device.writes().is_empty());
    }

    #[test]
    fn test_discard_drops_pending() {
        let mut device = ScriptedTransport::new(Checksum::Additive, [Reply::Busy(3)]);
        device.write_all(request(0x20).as_bytes()).unwrap();
        device.discard_input().unwrap();
        assert!(read_all(&mut device).is_empty());
    }

    #[test]
    fn test_busy_bytes_precede_frame() {
        let mut device = ScriptedTransport::new(Checksum::Additive, [Reply::Busy(2)]);
        device.write_all(request(0x20).as_bytes()).unwrap();
        let bytes = read_all(&mut device);
        assert_eq!(&bytes[..3], &[BUSY, BUSY, STX]);
    }
}
