//! # arspec
//!
//! Motion control and scan provenance for an angle-resolved spectrometer.
//! The instrument is a two-arm goniometer (plus an uncalibrated
//! detector-height motor) driven by an open-loop stepper controller over a
//! line-oriented serial protocol. This crate keeps a trustworthy notion of
//! physical position across power cycles, enforces hard limits before every
//! move, and guarantees that acquired spectra are traceable to the angle at
//! which they were taken.
//!
//! ## Crate Structure
//!
//! - **`axis`**: pure angle↔step conversion, limits, and tracked position
//!   state. No I/O.
//! - **`protocol`**: the command/response wire protocol — typed commands,
//!   the closed status-flag set, and the blocking link with bounded waits.
//!   Includes the serial transport (feature `serial`) and a scripted mock.
//! - **`motion`**: the motion controller — limit-checked relative moves,
//!   the motion-complete barrier, counter overwrites, and position queries.
//! - **`homing`**: the homing sequence that re-establishes the calibrated
//!   reference against the hard limit switches.
//! - **`scan`**: specular and uncoupled (raster) plan generation, the plan
//!   record, and the sequencer that drives a plan with an acquisition gate
//!   between entries.
//! - **`provenance`**: pairing acquired data files with plan angles by
//!   acquisition sequence, and renaming them to embed the angles.
//! - **`config`**: TOML settings, including the per-axis calibration.
//! - **`error`**: the central error type.

pub mod axis;
pub mod config;
pub mod error;
pub mod homing;
pub mod motion;
pub mod protocol;
pub mod provenance;
pub mod scan;
