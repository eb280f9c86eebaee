//! Relative-move motion control with limit enforcement.
//!
//! The controller hardware is open-loop: the only authoritative position is
//! the step count this module tracks, so every move is commanded as a
//! relative delta from that count and committed only after the controller
//! reports completion. A failed or interrupted operation leaves the previous
//! last-known-good position intact.

use crate::axis::{Axis, AxisCalibration, AxisState};
use crate::error::{ArspecError, Result};
use crate::protocol::{Command, ProtocolLink, StatusFlag, Transport};
use log::{info, warn};
use std::thread;
use std::time::Instant;

/// Calibration for both goniometer arms.
#[derive(Debug, Clone)]
pub struct GonioCalibration {
    /// Sample arm calibration.
    pub x: AxisCalibration,
    /// Detector arm calibration.
    pub y: AxisCalibration,
}

impl GonioCalibration {
    /// Calibration for the named axis.
    pub fn axis(&self, axis: Axis) -> &AxisCalibration {
        match axis {
            Axis::X => &self.x,
            Axis::Y => &self.y,
        }
    }
}

/// A motor addressable by raw step moves. X and Y are the calibrated arms;
/// Z is the uncalibrated detector-height motor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Motor {
    /// Sample arm.
    X,
    /// Detector arm.
    Y,
    /// Detector height, raw steps only.
    Z,
}

/// Drives the goniometer through the command/response link, keeping the
/// tracked per-axis position consistent with the hardware.
///
/// The tracked position is only trustworthy after homing (or an explicit
/// position-set) establishes the calibrated reference; until then any
/// limit-checked move is refused.
pub struct MotionController<T: Transport> {
    link: ProtocolLink<T>,
    calibration: GonioCalibration,
    x: AxisState,
    y: AxisState,
    calibrated: bool,
}

impl<T: Transport> MotionController<T> {
    /// Creates a controller in the uncalibrated state.
    pub fn new(link: ProtocolLink<T>, calibration: GonioCalibration) -> Self {
        Self {
            link,
            calibration,
            x: AxisState::zero(),
            y: AxisState::zero(),
            calibrated: false,
        }
    }

    /// Calibration tables in use.
    pub fn calibration(&self) -> &GonioCalibration {
        &self.calibration
    }

    /// Tracked state of the named axis.
    pub fn axis_state(&self, axis: Axis) -> AxisState {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
        }
    }

    /// Whether a trusted position reference has been established.
    pub fn is_calibrated(&self) -> bool {
        self.calibrated
    }

    /// Borrows the protocol link.
    pub fn link(&self) -> &ProtocolLink<T> {
        &self.link
    }

    /// Mutably borrows the protocol link.
    pub fn link_mut(&mut self) -> &mut ProtocolLink<T> {
        &mut self.link
    }

    /// Moves both arms to the given angles.
    ///
    /// Targets are limit-checked before any motion is issued; a violation
    /// names the offending axis and bound and leaves all state untouched.
    /// Only axes with a non-zero step delta are commanded. Blocks until the
    /// controller reports motion complete, then commits both axes' tracked
    /// steps and angles together.
    pub fn go_to_angle(&mut self, x_degrees: f64, y_degrees: f64) -> Result<()> {
        if !self.calibrated {
            return Err(ArspecError::CalibrationUnset);
        }

        let x_target = self.calibration.x.angle_to_steps(x_degrees);
        let y_target = self.calibration.y.angle_to_steps(y_degrees);
        self.check_limits(Axis::X, x_target)?;
        self.check_limits(Axis::Y, y_target)?;

        let dx = x_target - self.x.position_steps;
        let dy = y_target - self.y.position_steps;
        if dx != 0 {
            self.link.send(&Command::MoveX(dx))?;
        }
        if dy != 0 {
            self.link.send(&Command::MoveY(dy))?;
        }
        self.wait_for_motors()?;

        self.x = AxisState {
            position_steps: x_target,
            angle_degrees: x_degrees,
        };
        self.y = AxisState {
            position_steps: y_target,
            angle_degrees: y_degrees,
        };
        info!("Motors moved to X {x_degrees} deg, Y {y_degrees} deg");
        Ok(())
    }

    /// Blocks until the controller reports all motors idle.
    ///
    /// Repeatedly issues a motion-status query and waits on the response
    /// flag. Used as the synchronization barrier between scan steps and as
    /// a standalone operation; bounded by the configured motion timeout.
    pub fn wait_for_motors(&mut self) -> Result<()> {
        let timeout = self.link.settings().motion_timeout;
        let deadline = Instant::now() + timeout;
        loop {
            self.link.send(&Command::IsRunning)?;
            match self.link.await_flag()? {
                StatusFlag::Ok => return Ok(()),
                StatusFlag::MotorsRunning => {}
                StatusFlag::InvalidCommand => {
                    return Err(ArspecError::InvalidCommand {
                        command: Command::IsRunning.encode(),
                    });
                }
                // Stray marker from an earlier exchange; keep polling.
                StatusFlag::EndOfResponse => {}
            }
            if Instant::now() >= deadline {
                return Err(ArspecError::ProtocolTimeout {
                    waiting_for: "motion completion".to_string(),
                    timeout,
                });
            }
            thread::sleep(self.link.settings().poll_interval);
        }
    }

    /// Overwrites the controller's step counters and the tracked state.
    ///
    /// Used during homing and manual recalibration, never during normal
    /// scanning. Tracked state commits only on a success flag; any other
    /// outcome leaves the controller uncalibrated, since its counter state
    /// is then unknown.
    pub fn set_motor_positions(&mut self, x_steps: i32, y_steps: i32, z_steps: i32) -> Result<()> {
        self.send_set_positions(x_steps, y_steps, z_steps)?;
        let x = AxisState {
            position_steps: x_steps,
            angle_degrees: self.calibration.x.steps_to_angle(x_steps),
        };
        let y = AxisState {
            position_steps: y_steps,
            angle_degrees: self.calibration.y.steps_to_angle(y_steps),
        };
        self.commit_axes(x, y);
        info!("Motor positions set to X {x_steps}, Y {y_steps} steps");
        Ok(())
    }

    /// Queries the controller's own step counters.
    ///
    /// Returns the controller-side `(x, y)` counts. The tracked state is
    /// updated only when calibrated; before a home the counters carry no
    /// physical meaning and nothing is committed.
    pub fn query_positions(&mut self) -> Result<(i32, i32)> {
        self.link.send(&Command::QueryPosition)?;
        let lines = self.link.read_until_end()?;
        let payload = lines
            .first()
            .ok_or_else(|| ArspecError::UnexpectedResponse("empty reply to pos query".into()))?;
        let (x_steps, y_steps) = parse_position_payload(payload)?;

        if self.calibrated {
            self.x = AxisState {
                position_steps: x_steps,
                angle_degrees: self.calibration.x.steps_to_angle(x_steps),
            };
            self.y = AxisState {
                position_steps: y_steps,
                angle_degrees: self.calibration.y.steps_to_angle(y_steps),
            };
        } else {
            warn!("Position query before homing; tracked state left unchanged");
        }
        Ok((x_steps, y_steps))
    }

    /// Relative raw-step move of a single motor.
    ///
    /// X/Y jogs are limit-checked against the tracked position when
    /// calibrated; before homing they are allowed (that is how a stuck axis
    /// is freed) but logged and left untracked. Z has no calibration table
    /// and is never tracked.
    pub fn jog(&mut self, motor: Motor, steps: i32) -> Result<()> {
        match motor {
            Motor::Z => {
                self.link.send(&Command::MoveZ(steps))?;
                self.wait_for_motors()
            }
            Motor::X | Motor::Y => {
                let axis = match motor {
                    Motor::X => Axis::X,
                    _ => Axis::Y,
                };
                if self.calibrated {
                    let target = self.axis_state(axis).position_steps + steps;
                    self.check_limits(axis, target)?;
                    self.send_axis_move(axis, steps)?;
                    self.wait_for_motors()?;
                    let state = AxisState {
                        position_steps: target,
                        angle_degrees: self.calibration.axis(axis).steps_to_angle(target),
                    };
                    match axis {
                        Axis::X => self.x = state,
                        Axis::Y => self.y = state,
                    }
                } else {
                    warn!("Jogging {axis} axis without calibration; limits not enforced");
                    self.send_axis_move(axis, steps)?;
                    self.wait_for_motors()?;
                }
                Ok(())
            }
        }
    }

    fn send_axis_move(&mut self, axis: Axis, steps: i32) -> Result<()> {
        let command = match axis {
            Axis::X => Command::MoveX(steps),
            Axis::Y => Command::MoveY(steps),
        };
        self.link.send(&command)
    }

    fn check_limits(&self, axis: Axis, target_steps: i32) -> Result<()> {
        let cal = self.calibration.axis(axis);
        if cal.within_hard_limits(target_steps) {
            Ok(())
        } else {
            let (low, high) = cal.hard_limit_steps();
            Err(ArspecError::LimitViolation {
                axis,
                requested_steps: target_steps,
                low,
                high,
            })
        }
    }

    /// Issues `setpos` and waits for its flag without touching tracked
    /// state. Homing commits exact soft-limit angles itself.
    pub(crate) fn send_set_positions(&mut self, x: i32, y: i32, z: i32) -> Result<()> {
        let command = Command::SetPositions { x, y, z };
        self.link.send(&command)?;
        match self.link.await_flag()? {
            StatusFlag::Ok => Ok(()),
            StatusFlag::InvalidCommand => {
                self.calibrated = false;
                Err(ArspecError::InvalidCommand {
                    command: command.encode(),
                })
            }
            other => {
                self.calibrated = false;
                Err(ArspecError::UnexpectedResponse(format!(
                    "{other:?} flag after '{}'",
                    command.encode()
                )))
            }
        }
    }

    /// Commits both axes together and marks the reference trusted.
    pub(crate) fn commit_axes(&mut self, x: AxisState, y: AxisState) {
        self.x = x;
        self.y = y;
        self.calibrated = true;
    }

    /// Marks the tracked position unknown/unsafe.
    pub(crate) fn invalidate_calibration(&mut self) {
        self.calibrated = false;
    }
}

/// Parses the `((x,y))` payload of a position-query reply.
///
/// Extra fields (a Z counter on three-motor firmware) are tolerated and
/// ignored.
fn parse_position_payload(payload: &str) -> Result<(i32, i32)> {
    let trimmed = payload
        .trim()
        .trim_matches(|c: char| c == '(' || c == ')' || c.is_whitespace());
    let mut parts = trimmed.split(',');
    let mut next_field = |name: &str| -> Result<i32> {
        parts
            .next()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .and_then(|s| s.parse::<i32>().ok())
            .ok_or_else(|| {
                ArspecError::UnexpectedResponse(format!(
                    "cannot parse {name} step count from '{payload}'"
                ))
            })
    };
    let x = next_field("X")?;
    let y = next_field("Y")?;
    Ok((x, y))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{LinkSettings, MockTransport};

    fn calibration() -> GonioCalibration {
        GonioCalibration {
            x: AxisCalibration::new(121.0, -10720, 10.0, (10.0, 90.0)).unwrap(),
            y: AxisCalibration::new(121.0, -10252, 10.0, (10.0, 90.0)).unwrap(),
        }
    }

    fn controller() -> MotionController<MockTransport> {
        let link = ProtocolLink::new(MockTransport::new(), LinkSettings::instant());
        MotionController::new(link, calibration())
    }

    /// Controller parked at the soft limit with a trusted reference, as
    /// after a successful home.
    fn calibrated_controller() -> MotionController<MockTransport> {
        let mut controller = controller();
        controller.link_mut().transport_mut().push_incoming("S0\r\n");
        controller.set_motor_positions(1210, 1210, 0).unwrap();
        controller.link_mut().transport_mut().clear_written();
        controller
    }

    #[test]
    fn go_to_angle_requires_calibration() {
        let mut controller = controller();
        assert!(matches!(
            controller.go_to_angle(30.0, 30.0),
            Err(ArspecError::CalibrationUnset)
        ));
        assert!(controller.link().transport().written_lines().is_empty());
    }

    #[test]
    fn go_to_angle_issues_relative_moves_and_commits() {
        let mut controller = calibrated_controller();
        controller.link_mut().transport_mut().push_incoming("S0\r\n");

        controller.go_to_angle(30.0, 45.0).unwrap();

        // 30 deg -> 3630 steps, 45 deg -> 5445 steps, relative to 1210.
        assert_eq!(
            controller.link().transport().written_lines(),
            ["mox2420", "moy4235", "isrun"]
        );
        assert_eq!(controller.axis_state(Axis::X).position_steps, 3630);
        assert_eq!(controller.axis_state(Axis::Y).position_steps, 5445);
        assert!((controller.axis_state(Axis::Y).angle_degrees - 45.0).abs() < f64::EPSILON);
    }

    #[test]
    fn go_to_angle_skips_axes_with_zero_delta() {
        let mut controller = calibrated_controller();
        controller.link_mut().transport_mut().push_incoming("S0\r\n");

        controller.go_to_angle(10.0, 20.0).unwrap();

        assert_eq!(
            controller.link().transport().written_lines(),
            ["moy1210", "isrun"]
        );
    }

    #[test]
    fn go_to_angle_rejects_limit_violation_without_moving() {
        let mut controller = calibrated_controller();
        let before_x = controller.axis_state(Axis::X);
        let before_y = controller.axis_state(Axis::Y);

        match controller.go_to_angle(95.0, 30.0) {
            Err(ArspecError::LimitViolation { axis, .. }) => assert_eq!(axis, Axis::X),
            other => panic!("expected limit violation, got {other:?}"),
        }

        assert!(controller.link().transport().written_lines().is_empty());
        assert_eq!(controller.axis_state(Axis::X), before_x);
        assert_eq!(controller.axis_state(Axis::Y), before_y);
    }

    #[test]
    fn wait_for_motors_polls_until_idle() {
        let mut controller = calibrated_controller();
        controller
            .link_mut()
            .transport_mut()
            .push_incoming("R1\r\nR1\r\nS0\r\n");

        controller.wait_for_motors().unwrap();

        assert_eq!(
            controller.link().transport().written_lines(),
            ["isrun", "isrun", "isrun"]
        );
    }

    #[test]
    fn wait_for_motors_times_out_when_controller_is_silent() {
        let mut controller = calibrated_controller();
        assert!(matches!(
            controller.wait_for_motors(),
            Err(ArspecError::ProtocolTimeout { .. })
        ));
    }

    #[test]
    fn failed_position_set_leaves_controller_uncalibrated() {
        let mut controller = calibrated_controller();
        let before = controller.axis_state(Axis::X);
        controller.link_mut().transport_mut().push_incoming("F0\r\n");

        assert!(matches!(
            controller.set_motor_positions(2420, 2420, 0),
            Err(ArspecError::InvalidCommand { .. })
        ));
        assert!(!controller.is_calibrated());
        assert_eq!(controller.axis_state(Axis::X), before);
    }

    #[test]
    fn query_positions_parses_framed_payload() {
        let mut controller = calibrated_controller();
        controller
            .link_mut()
            .transport_mut()
            .push_incoming("((3630,5445))\r\n#CF\r\n");

        let (x, y) = controller.query_positions().unwrap();
        assert_eq!((x, y), (3630, 5445));
        assert_eq!(controller.axis_state(Axis::X).position_steps, 3630);
        assert!((controller.axis_state(Axis::X).angle_degrees - 30.0).abs() < 1e-9);
    }

    #[test]
    fn query_positions_before_homing_does_not_commit() {
        let mut controller = controller();
        controller
            .link_mut()
            .transport_mut()
            .push_incoming("((3630,5445))\r\n#CF\r\n");

        let (x, y) = controller.query_positions().unwrap();
        assert_eq!((x, y), (3630, 5445));
        assert_eq!(controller.axis_state(Axis::X), AxisState::zero());
        assert!(!controller.is_calibrated());
    }

    #[test]
    fn query_positions_rejects_garbage_payload() {
        let mut controller = calibrated_controller();
        controller
            .link_mut()
            .transport_mut()
            .push_incoming("((lost,counts))\r\n#CF\r\n");
        assert!(matches!(
            controller.query_positions(),
            Err(ArspecError::UnexpectedResponse(_))
        ));
    }

    #[test]
    fn jog_z_is_uncalibrated_and_untracked() {
        let mut controller = calibrated_controller();
        let before = controller.axis_state(Axis::X);
        controller.link_mut().transport_mut().push_incoming("S0\r\n");

        controller.jog(Motor::Z, 600).unwrap();

        assert_eq!(
            controller.link().transport().written_lines(),
            ["moz600", "isrun"]
        );
        assert_eq!(controller.axis_state(Axis::X), before);
    }

    #[test]
    fn jog_x_is_limit_checked_when_calibrated() {
        let mut controller = calibrated_controller();
        assert!(matches!(
            controller.jog(Motor::X, 10000),
            Err(ArspecError::LimitViolation { axis: Axis::X, .. })
        ));
        assert!(controller.link().transport().written_lines().is_empty());

        controller.link_mut().transport_mut().push_incoming("S0\r\n");
        controller.jog(Motor::X, 121).unwrap();
        assert_eq!(controller.axis_state(Axis::X).position_steps, 1331);
    }

    #[test]
    fn parse_position_payload_accepts_extra_fields() {
        assert_eq!(parse_position_payload("((1210,1210,0))").unwrap(), (1210, 1210));
        assert_eq!(parse_position_payload("(3630,5445)").unwrap(), (3630, 5445));
    }
}
