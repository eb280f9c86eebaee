//! Scan plan generation, persistence, and sequencing.
//!
//! A scan is an ordered list of `(x, y)` angle pairs. The order is
//! significant twice over: it is the execution order, and it is the key the
//! provenance matcher uses to pair acquired data files with angles. For
//! that reason the plan is written to a plain-text record before execution
//! begins, so the pairing survives a scan that fails partway.

use crate::error::{ArspecError, Result};
use crate::motion::MotionController;
use crate::protocol::Transport;
use log::info;
use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// One axis's sweep: start, stop, and step resolution in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScanAxisParameters {
    start_degrees: f64,
    stop_degrees: f64,
    step_degrees: f64,
}

impl ScanAxisParameters {
    /// Validates a sweep definition.
    ///
    /// The step must be non-zero and its sign must traverse from start
    /// toward stop (a single-point sweep with `start == stop` is allowed
    /// with either sign).
    pub fn new(start_degrees: f64, stop_degrees: f64, step_degrees: f64) -> Result<Self> {
        if step_degrees == 0.0 || !step_degrees.is_finite() {
            return Err(ArspecError::ScanParameters(format!(
                "step resolution must be non-zero, got {step_degrees}"
            )));
        }
        if (stop_degrees - start_degrees) * step_degrees < 0.0 {
            return Err(ArspecError::ScanParameters(format!(
                "step {step_degrees} deg cannot traverse {start_degrees} -> {stop_degrees} deg"
            )));
        }
        Ok(Self {
            start_degrees,
            stop_degrees,
            step_degrees,
        })
    }

    /// The sweep angles, inclusive of the stop.
    ///
    /// Points are accepted while within half a step of the stop along the
    /// traversal direction, so floating accumulation can neither drop the
    /// final point nor add a spurious one.
    pub fn angles(&self) -> Vec<f64> {
        let dir = self.step_degrees.signum();
        let tolerance = self.step_degrees.abs() / 2.0;
        let mut out = Vec::new();
        let mut k = 0u32;
        loop {
            let angle = self.start_degrees + f64::from(k) * self.step_degrees;
            if (angle - self.stop_degrees) * dir > tolerance {
                break;
            }
            out.push(angle);
            k += 1;
        }
        out
    }
}

/// Which physical axis the primary (fastest-varying) sweep drives.
///
/// Axis roles are mutually exclusive: the secondary axis is always the one
/// not chosen as primary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisOrder {
    /// Primary sweep on X, secondary on Y.
    XPrimary,
    /// Primary sweep on Y, secondary on X.
    YPrimary,
}

/// An ordered sequence of `(x, y)` angle pairs to visit.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanPlan {
    entries: Vec<(f64, f64)>,
}

impl ScanPlan {
    /// Specular plan: both arms sweep the same angles (mirror geometry).
    pub fn specular(params: ScanAxisParameters) -> Self {
        Self {
            entries: params.angles().into_iter().map(|a| (a, a)).collect(),
        }
    }

    /// Uncoupled plan: a 2-D raster with the primary axis varying fastest
    /// within each secondary value.
    pub fn uncoupled(
        primary: ScanAxisParameters,
        secondary: ScanAxisParameters,
        order: AxisOrder,
    ) -> Self {
        let primary_angles = primary.angles();
        let mut entries = Vec::with_capacity(primary_angles.len() * secondary.angles().len());
        for secondary_angle in secondary.angles() {
            for &primary_angle in &primary_angles {
                entries.push(match order {
                    AxisOrder::XPrimary => (primary_angle, secondary_angle),
                    AxisOrder::YPrimary => (secondary_angle, primary_angle),
                });
            }
        }
        Self { entries }
    }

    /// The ordered angle pairs.
    pub fn entries(&self) -> &[(f64, f64)] {
        &self.entries
    }

    /// Number of plan entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the plan has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Writes the record: one `"<x>,<y>"` line per entry.
    pub fn write_record(&self, path: &Path) -> Result<()> {
        let mut file = File::create(path)?;
        for (x, y) in &self.entries {
            writeln!(file, "{x},{y}")?;
        }
        Ok(())
    }

    /// Reads a record written by [`write_record`](ScanPlan::write_record).
    pub fn read_record(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let mut entries = Vec::new();
        for (number, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let (x, y) = line.split_once(',').ok_or_else(|| {
                ArspecError::ScanRecord(format!("line {}: expected '<x>,<y>'", number + 1))
            })?;
            let parse = |s: &str| -> Result<f64> {
                s.trim().parse::<f64>().map_err(|_| {
                    ArspecError::ScanRecord(format!("line {}: bad angle '{s}'", number + 1))
                })
            };
            entries.push((parse(x)?, parse(y)?));
        }
        if entries.is_empty() {
            return Err(ArspecError::ScanRecord("record has no entries".to_string()));
        }
        Ok(Self { entries })
    }
}

/// The external acquisition step between plan entries.
///
/// Acquisition itself (spectrometer exposure, operator action) is outside
/// this crate; the sequencer blocks on this until the data for the current
/// entry has been taken.
pub trait AcquisitionGate {
    /// Blocks until acquisition at `(x_degrees, y_degrees)` is confirmed.
    fn acquire(&mut self, index: usize, x_degrees: f64, y_degrees: f64) -> Result<()>;
}

/// Drives a motion controller through a plan, one acquisition per entry.
pub struct ScanSequencer {
    record_path: PathBuf,
}

impl ScanSequencer {
    /// Sequencer persisting its plan record at the given path.
    pub fn new(record_path: impl Into<PathBuf>) -> Self {
        Self {
            record_path: record_path.into(),
        }
    }

    /// Path of the plan record.
    pub fn record_path(&self) -> &Path {
        &self.record_path
    }

    /// Executes the plan.
    ///
    /// The record is written before the first move, independent of
    /// acquisition success. Each entry is a move, an explicit
    /// motion-complete barrier, then the acquisition gate. After the last
    /// entry both arms return to the plan's starting angles.
    pub fn run<T: Transport>(
        &self,
        controller: &mut MotionController<T>,
        plan: &ScanPlan,
        gate: &mut dyn AcquisitionGate,
    ) -> Result<()> {
        let Some(&(start_x, start_y)) = plan.entries().first() else {
            return Err(ArspecError::ScanParameters(
                "scan plan has no entries".to_string(),
            ));
        };

        plan.write_record(&self.record_path)?;
        info!(
            "Scan plan recorded to {} ({} entries)",
            self.record_path.display(),
            plan.len()
        );

        for (index, &(x, y)) in plan.entries().iter().enumerate() {
            controller.go_to_angle(x, y)?;
            controller.wait_for_motors()?;
            gate.acquire(index, x, y)?;
        }

        controller.go_to_angle(start_x, start_y)?;
        info!("Scan complete; returned to X {start_x} deg, Y {start_y} deg");
        Ok(())
    }
}
