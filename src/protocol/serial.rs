//! Serial transport for the goniometer controller.

use super::Transport;
use crate::error::Result;
use log::info;
use serialport::SerialPort;
use std::io::{Read, Write};
use std::thread;
use std::time::Duration;

/// Non-blocking reads drain only what the OS has buffered, so the protocol
/// layer's own poll loop controls all waiting.
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
}

impl SerialTransport {
    /// Opens the port and waits out the controller's boot.
    ///
    /// Opening the port resets the controller; it needs about two seconds
    /// before it accepts commands, and prints a greeting banner which is
    /// logged here rather than left to confuse the first exchange.
    pub fn open(port_name: &str, baud_rate: u32) -> Result<Self> {
        let port = serialport::new(port_name, baud_rate)
            .timeout(Duration::from_millis(100))
            .flow_control(serialport::FlowControl::None)
            .open()?;
        let mut transport = Self { port };

        thread::sleep(Duration::from_secs(2));
        let mut greeting = String::new();
        let mut buf = [0u8; 256];
        loop {
            let n = transport.read_some(&mut buf)?;
            if n == 0 {
                break;
            }
            greeting.push_str(&String::from_utf8_lossy(&buf[..n]));
        }
        let greeting = greeting.trim();
        if !greeting.is_empty() {
            info!("controller greeting: {greeting}");
        }
        Ok(transport)
    }
}

impl Transport for SerialTransport {
    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        self.port.write_all(bytes)?;
        Ok(())
    }

    fn read_some(&mut self, buf: &mut [u8]) -> Result<usize> {
        let pending = self.port.bytes_to_read()? as usize;
        if pending == 0 {
            return Ok(0);
        }
        let want = pending.min(buf.len());
        let n = self.port.read(&mut buf[..want])?;
        Ok(n)
    }
}
