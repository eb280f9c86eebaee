//! Custom error types for the crate.
//!
//! This module defines the primary error type, `ArspecError`, using the
//! `thiserror` crate. Hardware-facing failures carry enough context (axis,
//! requested value, bound) for an operator to diagnose them without
//! inspecting internal state.

use crate::axis::Axis;
use std::time::Duration;
use thiserror::Error;

/// Convenience alias for results using the crate error type.
pub type Result<T> = std::result::Result<T, ArspecError>;

/// Errors produced by the motion-control and provenance subsystems.
#[derive(Error, Debug)]
pub enum ArspecError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Configuration validation error: {0}")]
    Configuration(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "serial")]
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// The controller flagged the last command as unrecognized (`F0`).
    #[error("Controller rejected command '{command}' as invalid")]
    InvalidCommand { command: String },

    /// A commanded target would land outside the hard step limits.
    #[error(
        "{axis} axis target of {requested_steps} steps is outside hard limits [{low}, {high}]"
    )]
    LimitViolation {
        axis: Axis,
        requested_steps: i32,
        low: i32,
        high: i32,
    },

    /// No status flag arrived within the configured bound.
    #[error("Timed out after {timeout:?} waiting for {waiting_for}")]
    ProtocolTimeout {
        waiting_for: String,
        timeout: Duration,
    },

    /// A move was attempted before homing established a trusted reference.
    #[error("Axis positions are not calibrated; home the motors first")]
    CalibrationUnset,

    /// Discovered data files cannot be unambiguously paired with the plan.
    #[error("Provenance mismatch for {role} files: {detail}")]
    ProvenanceMismatch { role: String, detail: String },

    #[error("Unexpected controller response: {0}")]
    UnexpectedResponse(String),

    #[error("Malformed scan record: {0}")]
    ScanRecord(String),

    #[error("Invalid scan parameters: {0}")]
    ScanParameters(String),
}
