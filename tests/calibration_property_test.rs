//! Property tests for the angle/step conversion arithmetic.

use arspec::axis::AxisCalibration;
use proptest::prelude::*;

fn cal() -> AxisCalibration {
    AxisCalibration::new(121.0, -10720, 10.0, (10.0, 90.0)).unwrap()
}

proptest! {
    // Converting an angle to whole steps and back may only lose the
    // sub-step remainder.
    #[test]
    fn round_trip_is_within_one_step(angle in -720.0f64..720.0) {
        let cal = cal();
        let back = cal.steps_to_angle(cal.angle_to_steps(angle));
        prop_assert!(
            (back - angle).abs() < cal.degrees_per_step(),
            "{} round-tripped to {}", angle, back
        );
    }

    #[test]
    fn limit_check_matches_the_inclusive_interval(steps in -20000i32..20000) {
        let cal = cal();
        let (low, high) = cal.hard_limit_steps();
        prop_assert_eq!(cal.within_hard_limits(steps), steps >= low && steps <= high);
    }
}
