//! Blocking line-oriented exchange with the motor controller.
//!
//! The link owns the transport exclusively: there is exactly one thread of
//! control, so serial access is single-owner by construction rather than by
//! locking. Every wait is a poll loop with a fixed inter-poll delay and a
//! configured upper bound; a controller that never answers surfaces a
//! `ProtocolTimeout` instead of blocking forever.

use super::{Command, StatusFlag, END_OF_RESPONSE};
use crate::error::{ArspecError, Result};
use log::{info, trace};
use std::collections::VecDeque;
use std::thread;
use std::time::{Duration, Instant};

/// Byte-stream transport to the controller.
///
/// Implementations must not block: `read_some` drains whatever is already
/// buffered and returns 0 when nothing is pending.
pub trait Transport {
    /// Writes raw bytes to the controller.
    fn write_all(&mut self, bytes: &[u8]) -> Result<()>;

    /// Reads up to `buf.len()` buffered bytes; 0 when nothing is pending.
    fn read_some(&mut self, buf: &mut [u8]) -> Result<usize>;
}

/// Timing parameters for the protocol layer.
#[derive(Debug, Clone)]
pub struct LinkSettings {
    /// Delay after every command write, for controller processing latency.
    pub settle: Duration,
    /// Delay between polls while waiting for a response.
    pub poll_interval: Duration,
    /// Upper bound on any single wait for a flag or end-of-response marker.
    pub flag_timeout: Duration,
    /// Upper bound on a full motion (homing travel, longest scan move).
    pub motion_timeout: Duration,
}

impl Default for LinkSettings {
    fn default() -> Self {
        Self {
            settle: Duration::from_millis(100),
            poll_interval: Duration::from_millis(200),
            flag_timeout: Duration::from_secs(5),
            motion_timeout: Duration::from_secs(120),
        }
    }
}

impl LinkSettings {
    /// Zero-delay settings so tests run without sleeping.
    ///
    /// Waits fail as soon as the scripted input runs dry; the motion bound
    /// stays non-zero so a scripted still-running/idle poll sequence can
    /// drain before it trips.
    pub fn instant() -> Self {
        Self {
            settle: Duration::ZERO,
            poll_interval: Duration::ZERO,
            flag_timeout: Duration::ZERO,
            motion_timeout: Duration::from_secs(1),
        }
    }
}

/// One-line-command / multi-line-response exchange over a byte stream.
pub struct ProtocolLink<T: Transport> {
    transport: T,
    settings: LinkSettings,
    /// Complete lines received but not yet consumed.
    lines: VecDeque<String>,
    /// Partial trailing data awaiting its terminator.
    pending: String,
}

impl<T: Transport> ProtocolLink<T> {
    /// Wraps a transport with the given timing parameters.
    pub fn new(transport: T, settings: LinkSettings) -> Self {
        Self {
            transport,
            settings,
            lines: VecDeque::new(),
            pending: String::new(),
        }
    }

    /// Timing parameters in effect.
    pub fn settings(&self) -> &LinkSettings {
        &self.settings
    }

    /// Borrows the underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Mutably borrows the underlying transport.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Writes one encoded command line, then waits out the settle delay.
    pub fn send(&mut self, command: &Command) -> Result<()> {
        let line = format!("{}\n", command.encode());
        trace!("-> '{}'", line.escape_default());
        self.transport.write_all(line.as_bytes())?;
        thread::sleep(self.settings.settle);
        Ok(())
    }

    /// Drains whatever complete lines are currently buffered.
    ///
    /// Partial trailing data is kept for the next call, so split or
    /// duplicated chunks never corrupt line framing.
    pub fn read_available(&mut self) -> Result<Vec<String>> {
        self.pump()?;
        Ok(self.lines.drain(..).collect())
    }

    /// Polls until a line from the closed status set arrives.
    ///
    /// Non-flag lines are echoed to the operator log as they arrive. Fails
    /// with `ProtocolTimeout` once `flag_timeout` elapses.
    pub fn await_flag(&mut self) -> Result<StatusFlag> {
        let deadline = Instant::now() + self.settings.flag_timeout;
        loop {
            while let Some(line) = self.next_line()? {
                if let Some(flag) = StatusFlag::parse(&line) {
                    return Ok(flag);
                }
                info!("controller: {line}");
            }
            if Instant::now() >= deadline {
                return Err(ArspecError::ProtocolTimeout {
                    waiting_for: "status flag".to_string(),
                    timeout: self.settings.flag_timeout,
                });
            }
            thread::sleep(self.settings.poll_interval);
        }
    }

    /// Accumulates lines until one contains the end-of-response marker.
    ///
    /// The marker and its line terminator are stripped; text preceding the
    /// marker on the same line is kept as the final accumulated line.
    pub fn read_until_end(&mut self) -> Result<Vec<String>> {
        let deadline = Instant::now() + self.settings.flag_timeout;
        let mut collected = Vec::new();
        loop {
            while let Some(line) = self.next_line()? {
                if let Some(idx) = line.find(END_OF_RESPONSE) {
                    let head = line[..idx].trim_end();
                    if !head.is_empty() {
                        info!("controller: {head}");
                        collected.push(head.to_string());
                    }
                    return Ok(collected);
                }
                info!("controller: {line}");
                collected.push(line);
            }
            if Instant::now() >= deadline {
                return Err(ArspecError::ProtocolTimeout {
                    waiting_for: format!("'{END_OF_RESPONSE}' end-of-response marker"),
                    timeout: self.settings.flag_timeout,
                });
            }
            thread::sleep(self.settings.poll_interval);
        }
    }

    /// Pops the next buffered line, pumping the transport first.
    fn next_line(&mut self) -> Result<Option<String>> {
        self.pump()?;
        Ok(self.lines.pop_front())
    }

    /// Moves buffered transport bytes into the line queue.
    fn pump(&mut self) -> Result<()> {
        let mut buf = [0u8; 256];
        loop {
            let n = self.transport.read_some(&mut buf)?;
            if n == 0 {
                break;
            }
            self.pending.push_str(&String::from_utf8_lossy(&buf[..n]));
        }
        while let Some(idx) = self.pending.find('\n') {
            let raw: String = self.pending.drain(..=idx).collect();
            let line = raw.trim_end_matches(['\n', '\r']).to_string();
            trace!("<- '{}'", line.escape_default());
            if !line.is_empty() {
                self.lines.push_back(line);
            }
        }
        Ok(())
    }
}
