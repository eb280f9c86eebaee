//! Property tests for limit enforcement in the motion controller.
//!
//! Whatever the current position and requested target, a move outside the
//! hard limits must be rejected before any command reaches the wire, with
//! the tracked position unchanged.

use arspec::axis::{Axis, AxisCalibration};
use arspec::error::ArspecError;
use arspec::motion::{GonioCalibration, MotionController};
use arspec::protocol::{LinkSettings, MockTransport, ProtocolLink};
use proptest::prelude::*;

fn calibration() -> GonioCalibration {
    GonioCalibration {
        x: AxisCalibration::new(121.0, -10720, 10.0, (10.0, 90.0)).unwrap(),
        y: AxisCalibration::new(121.0, -10252, 10.0, (10.0, 90.0)).unwrap(),
    }
}

/// Controller with a trusted reference parked at the given step counts.
fn controller_at(x_steps: i32, y_steps: i32) -> MotionController<MockTransport> {
    let mut transport = MockTransport::new();
    transport.push_incoming("S0\r\n");
    let link = ProtocolLink::new(transport, LinkSettings::instant());
    let mut controller = MotionController::new(link, calibration());
    controller.set_motor_positions(x_steps, y_steps, 0).unwrap();
    controller.link_mut().transport_mut().clear_written();
    controller
}

#[test]
fn move_before_homing_is_refused() {
    let link = ProtocolLink::new(MockTransport::new(), LinkSettings::instant());
    let mut controller = MotionController::new(link, calibration());
    assert!(matches!(
        controller.go_to_angle(45.0, 45.0),
        Err(ArspecError::CalibrationUnset)
    ));
    assert!(controller.link().transport().written_lines().is_empty());
}

proptest! {
    #[test]
    fn never_issues_an_out_of_bounds_move(
        current_x in 1210i32..=10890,
        current_y in 1210i32..=10890,
        target_x in -30.0f64..120.0,
        target_y in -30.0f64..120.0,
    ) {
        let mut controller = controller_at(current_x, current_y);
        let x_steps = (target_x * 121.0).round() as i32;
        let y_steps = (target_y * 121.0).round() as i32;
        let in_bounds =
            (1210..=10890).contains(&x_steps) && (1210..=10890).contains(&y_steps);

        if in_bounds {
            controller.link_mut().transport_mut().push_incoming("S0\r\n");
            controller.go_to_angle(target_x, target_y).unwrap();
            prop_assert_eq!(controller.axis_state(Axis::X).position_steps, x_steps);
            prop_assert_eq!(controller.axis_state(Axis::Y).position_steps, y_steps);
        } else {
            let result = controller.go_to_angle(target_x, target_y);
            let is_limit_violation = matches!(result, Err(ArspecError::LimitViolation { .. }));
            prop_assert!(is_limit_violation);
            // Rejected with nothing written and nothing committed.
            prop_assert!(controller.link().transport().written_lines().is_empty());
            prop_assert_eq!(controller.axis_state(Axis::X).position_steps, current_x);
            prop_assert_eq!(controller.axis_state(Axis::Y).position_steps, current_y);
        }
    }
}
