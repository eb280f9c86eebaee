//! Scripted in-memory transport for testing without hardware.

use super::Transport;
use crate::error::Result;
use std::collections::VecDeque;
use std::io;

/// Transport that replays scripted controller output and records every line
/// written to it.
///
/// Responses are queued with [`push_incoming`](MockTransport::push_incoming)
/// and consumed one line at a time by the protocol layer, so a test can
/// script an entire exchange up front (e.g. `"R1\nR1\nS0\n"` for a move that
/// takes two status polls to finish). Combined with
/// [`LinkSettings::instant`](super::LinkSettings::instant) this makes every
/// protocol test deterministic and sleep-free.
#[derive(Debug, Default)]
pub struct MockTransport {
    incoming: VecDeque<u8>,
    written: Vec<String>,
    partial_write: String,
    fail_next_write: bool,
}

impl MockTransport {
    /// Creates an empty transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues controller output for subsequent reads.
    pub fn push_incoming(&mut self, text: &str) {
        self.incoming.extend(text.bytes());
    }

    /// Makes the next write fail with an I/O error.
    pub fn fail_next_write(&mut self) {
        self.fail_next_write = true;
    }

    /// Complete lines written so far, without terminators.
    pub fn written_lines(&self) -> &[String] {
        &self.written
    }

    /// Clears the written-line record.
    pub fn clear_written(&mut self) {
        self.written.clear();
    }
}

impl Transport for MockTransport {
    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        if self.fail_next_write {
            self.fail_next_write = false;
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "mock write failure").into());
        }
        self.partial_write.push_str(&String::from_utf8_lossy(bytes));
        while let Some(idx) = self.partial_write.find('\n') {
            let raw: String = self.partial_write.drain(..=idx).collect();
            self.written
                .push(raw.trim_end_matches(['\n', '\r']).to_string());
        }
        Ok(())
    }

    fn read_some(&mut self, buf: &mut [u8]) -> Result<usize> {
        let n = buf.len().min(self.incoming.len());
        for slot in buf.iter_mut().take(n) {
            if let Some(byte) = self.incoming.pop_front() {
                *slot = byte;
            }
        }
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_written_lines() {
        let mut transport = MockTransport::new();
        transport.write_all(b"mox100\n").unwrap();
        transport.write_all(b"is").unwrap();
        transport.write_all(b"run\n").unwrap();
        assert_eq!(transport.written_lines(), ["mox100", "isrun"]);
    }

    #[test]
    fn replays_incoming_bytes_in_chunks() {
        let mut transport = MockTransport::new();
        transport.push_incoming("S0\r\n");
        let mut buf = [0u8; 2];
        assert_eq!(transport.read_some(&mut buf).unwrap(), 2);
        assert_eq!(&buf, b"S0");
        let mut rest = [0u8; 8];
        assert_eq!(transport.read_some(&mut rest).unwrap(), 2);
        assert_eq!(transport.read_some(&mut rest).unwrap(), 0);
    }

    #[test]
    fn write_failure_is_one_shot() {
        let mut transport = MockTransport::new();
        transport.fail_next_write();
        assert!(transport.write_all(b"home\n").is_err());
        assert!(transport.write_all(b"home\n").is_ok());
        assert_eq!(transport.written_lines(), ["home"]);
    }
}
