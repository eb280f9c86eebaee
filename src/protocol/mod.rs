//! Wire protocol for the goniometer motor controller.
//!
//! The controller speaks a line-oriented serial protocol: one newline
//! terminated command per line out, and a small closed set of status tokens
//! back (`S0` ok, `R1` motors running, `F0` invalid command), with `#CF`
//! marking the end of multi-line replies. Everything else the controller
//! prints is informational echo.
//!
//! Commands are a closed enum internally; the mnemonic strings exist only at
//! the transport boundary, so an invalid mnemonic is unrepresentable inside
//! the crate.

pub mod link;
pub mod mock;
#[cfg(feature = "serial")]
pub mod serial;

pub use link::{LinkSettings, ProtocolLink, Transport};
pub use mock::MockTransport;

use std::fmt;

/// Marker terminating a multi-line controller reply.
pub const END_OF_RESPONSE: &str = "#CF";

/// An outbound controller instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Drive all axes toward their limit switches.
    Home,
    /// Relative move of the X motor, in steps.
    MoveX(i32),
    /// Relative move of the Y motor, in steps.
    MoveY(i32),
    /// Relative move of the Z motor, in steps.
    MoveZ(i32),
    /// Query whether any motor is still running.
    IsRunning,
    /// Query the controller's step counters.
    QueryPosition,
    /// Overwrite the controller's step counters.
    SetPositions {
        /// X counter value in steps.
        x: i32,
        /// Y counter value in steps.
        y: i32,
        /// Z counter value in steps.
        z: i32,
    },
}

impl Command {
    /// Renders the wire mnemonic, without the line terminator.
    pub fn encode(&self) -> String {
        match self {
            Command::Home => "home".to_string(),
            Command::MoveX(steps) => format!("mox{steps}"),
            Command::MoveY(steps) => format!("moy{steps}"),
            Command::MoveZ(steps) => format!("moz{steps}"),
            Command::IsRunning => "isrun".to_string(),
            Command::QueryPosition => "pos".to_string(),
            Command::SetPositions { x, y, z } => format!("setpos{x},{y},{z}"),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.encode())
    }
}

/// A status token from the controller's closed response set.
///
/// Any line that is not one of these tokens is echo or framing noise and is
/// buffered/logged rather than treated as a flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusFlag {
    /// `S0` — command completed successfully / motors idle.
    Ok,
    /// `R1` — motion still in progress.
    MotorsRunning,
    /// `F0` — the controller did not recognize the command.
    InvalidCommand,
    /// `#CF` — end of a multi-line reply.
    EndOfResponse,
}

impl StatusFlag {
    /// Parses a response line; `None` for anything outside the closed set.
    pub fn parse(line: &str) -> Option<Self> {
        match line.trim() {
            "S0" => Some(StatusFlag::Ok),
            "R1" => Some(StatusFlag::MotorsRunning),
            "F0" => Some(StatusFlag::InvalidCommand),
            END_OF_RESPONSE => Some(StatusFlag::EndOfResponse),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_wire_mnemonics() {
        assert_eq!(Command::Home.encode(), "home");
        assert_eq!(Command::MoveX(-9510).encode(), "mox-9510");
        assert_eq!(Command::MoveY(605).encode(), "moy605");
        assert_eq!(Command::MoveZ(600).encode(), "moz600");
        assert_eq!(Command::IsRunning.encode(), "isrun");
        assert_eq!(Command::QueryPosition.encode(), "pos");
        assert_eq!(
            Command::SetPositions {
                x: 1210,
                y: 1210,
                z: 0
            }
            .encode(),
            "setpos1210,1210,0"
        );
    }

    #[test]
    fn parses_status_flags() {
        assert_eq!(StatusFlag::parse("S0"), Some(StatusFlag::Ok));
        assert_eq!(StatusFlag::parse("R1"), Some(StatusFlag::MotorsRunning));
        assert_eq!(StatusFlag::parse("F0"), Some(StatusFlag::InvalidCommand));
        assert_eq!(StatusFlag::parse("#CF"), Some(StatusFlag::EndOfResponse));
        assert_eq!(StatusFlag::parse("  S0 \r"), Some(StatusFlag::Ok));
    }

    #[test]
    fn noise_lines_are_not_flags() {
        assert_eq!(StatusFlag::parse(""), None);
        assert_eq!(StatusFlag::parse("motors ready"), None);
        assert_eq!(StatusFlag::parse("S1"), None);
        assert_eq!(StatusFlag::parse("((1210,1210))"), None);
    }
}
