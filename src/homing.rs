//! Homing: re-establishing the calibrated position reference.
//!
//! The steppers are open-loop, so the only absolute reference is the hard
//! limit switch on each axis. Homing drives both arms into their switches,
//! retreats to the configured soft-limit angle, and overwrites the
//! controller's step counters so controller-side and local tracking agree.
//! Until the final position-set succeeds, nothing is committed: a homing
//! run that fails partway leaves the controller uncalibrated, because the
//! arms are then at an unknown position.

use crate::axis::AxisState;
use crate::error::Result;
use crate::motion::MotionController;
use crate::protocol::{Command, Transport};
use log::info;
use std::fmt;

/// Phase of the homing sequence, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HomingState {
    /// Not homing.
    Idle,
    /// Home command issued; axes seeking their limit switches.
    LimitSwitchSeek,
    /// Both axes at the switches; offsets computed.
    AtLimitSwitch,
    /// Relative retreat toward the soft-limit park position in progress.
    MovingToSoftLimit,
    /// Counters set; tracked position trusted.
    Calibrated,
}

impl fmt::Display for HomingState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HomingState::Idle => "idle",
            HomingState::LimitSwitchSeek => "seeking limit switches",
            HomingState::AtLimitSwitch => "at limit switches",
            HomingState::MovingToSoftLimit => "moving to soft limit",
            HomingState::Calibrated => "calibrated",
        };
        write!(f, "{name}")
    }
}

impl<T: Transport> MotionController<T> {
    /// Homes both axes and parks them at the soft-limit angle.
    ///
    /// On success the tracked state of both axes is committed simultaneously
    /// to exactly `(soft_limit_steps, soft_limit_degrees)` and the
    /// controller becomes calibrated. On any failure the previous reference
    /// is discarded.
    pub fn home(&mut self) -> Result<()> {
        // Motion starts immediately, so the old reference is void from here.
        self.invalidate_calibration();

        let mut state = HomingState::LimitSwitchSeek;
        info!("Homing: {state}");
        self.link_mut().send(&Command::Home)?;
        // The controller acknowledges issuance with a short multi-line
        // banner; completion of the seek is signalled later via isrun.
        self.link_mut().read_until_end()?;

        let x_soft_steps = self.calibration().x.soft_limit_steps();
        let y_soft_steps = self.calibration().y.soft_limit_steps();
        let x_travel = self.calibration().x.home_offset_steps() + x_soft_steps;
        let y_travel = self.calibration().y.home_offset_steps() + y_soft_steps;
        state = HomingState::AtLimitSwitch;
        info!("Homing: {state}; retreat X {x_travel}, Y {y_travel} steps");

        state = HomingState::MovingToSoftLimit;
        info!("Homing: {state}");
        self.link_mut().send(&Command::MoveX(x_travel))?;
        self.link_mut().send(&Command::MoveY(y_travel))?;
        self.wait_for_motors()?;

        // Re-seed the controller's own counters so both sides agree on the
        // park position; the tracked state commits only on its success flag.
        self.send_set_positions(x_soft_steps, y_soft_steps, 0)?;

        let x_soft_degrees = self.calibration().x.soft_limit_degrees();
        let y_soft_degrees = self.calibration().y.soft_limit_degrees();
        self.commit_axes(
            AxisState {
                position_steps: x_soft_steps,
                angle_degrees: x_soft_degrees,
            },
            AxisState {
                position_steps: y_soft_steps,
                angle_degrees: y_soft_degrees,
            },
        );
        state = HomingState::Calibrated;
        info!("Homing: {state}; motors parked at X {x_soft_degrees} deg, Y {y_soft_degrees} deg");
        Ok(())
    }
}
