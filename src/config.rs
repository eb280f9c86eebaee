//! Configuration management.
//!
//! Settings load from `config/<name>.toml` (default `config/default.toml`).
//! Calibration constants live in the config because they are properties of
//! the physical setup, measured once when the goniometer is assembled.

use crate::axis::AxisCalibration;
use crate::error::Result;
use crate::motion::GonioCalibration;
use crate::protocol::LinkSettings;
use config::Config;
use serde::Deserialize;
use std::time::Duration;

/// Top-level application settings.
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    /// Default log filter (overridable via `RUST_LOG`).
    pub log_level: String,
    /// Serial link parameters.
    pub serial: SerialSettings,
    /// Per-axis calibration.
    pub axes: AxesSettings,
    /// Scan output locations.
    pub scan: ScanSettings,
}

/// Serial port and protocol timing configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct SerialSettings {
    /// Port device path, e.g. `/dev/ttyUSB0` or `COM4`.
    pub port: String,
    /// Baud rate; the controller ships at 9600.
    pub baud_rate: u32,
    /// Post-write settle delay.
    #[serde(with = "humantime_serde")]
    pub settle: Duration,
    /// Delay between status polls.
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
    /// Bound on any single wait for a response.
    #[serde(with = "humantime_serde")]
    pub flag_timeout: Duration,
    /// Bound on a complete motion.
    #[serde(with = "humantime_serde")]
    pub motion_timeout: Duration,
}

impl SerialSettings {
    /// Timing parameters for the protocol layer.
    pub fn link_settings(&self) -> LinkSettings {
        LinkSettings {
            settle: self.settle,
            poll_interval: self.poll_interval,
            flag_timeout: self.flag_timeout,
            motion_timeout: self.motion_timeout,
        }
    }
}

/// Calibration tables for both arms.
#[derive(Debug, Deserialize, Clone)]
pub struct AxesSettings {
    /// Sample arm.
    pub x: AxisSettings,
    /// Detector arm.
    pub y: AxisSettings,
}

impl AxesSettings {
    /// Builds validated calibrations for both axes.
    pub fn calibration(&self) -> Result<GonioCalibration> {
        Ok(GonioCalibration {
            x: self.x.calibration()?,
            y: self.y.calibration()?,
        })
    }
}

/// One axis's measured calibration.
#[derive(Debug, Deserialize, Clone)]
pub struct AxisSettings {
    /// Gearing: motor steps per degree of arm rotation.
    pub steps_per_degree: f64,
    /// Signed steps from the limit-switch trigger point to the origin.
    pub home_offset_steps: i32,
    /// Canonical home/park angle.
    pub soft_limit_degrees: f64,
    /// Lower hard limit.
    pub hard_limit_low_degrees: f64,
    /// Upper hard limit.
    pub hard_limit_high_degrees: f64,
}

impl AxisSettings {
    /// Builds the validated calibration for this axis.
    pub fn calibration(&self) -> Result<AxisCalibration> {
        AxisCalibration::new(
            self.steps_per_degree,
            self.home_offset_steps,
            self.soft_limit_degrees,
            (self.hard_limit_low_degrees, self.hard_limit_high_degrees),
        )
    }
}

/// Scan output configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct ScanSettings {
    /// Directory acquisitions are saved into and tagging operates on.
    pub data_dir: String,
    /// Name of the plan record file inside the data directory.
    pub record_filename: String,
}

impl Settings {
    /// Loads settings from `config/<name>.toml`.
    pub fn new(config_name: Option<&str>) -> Result<Self> {
        let config_path = format!("config/{}", config_name.unwrap_or("default"));
        let s = Config::builder()
            .add_source(config::File::with_name(&config_path))
            .build()?;
        Ok(s.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_parses_and_validates() {
        let settings = Settings::new(None).unwrap();
        assert_eq!(settings.serial.baud_rate, 9600);
        assert_eq!(settings.serial.poll_interval, Duration::from_millis(200));

        let calibration = settings.axes.calibration().unwrap();
        assert_eq!(calibration.x.soft_limit_steps(), 1210);
        assert_eq!(calibration.x.home_offset_steps(), -10720);
        assert_eq!(calibration.y.home_offset_steps(), -10252);
        assert_eq!(calibration.x.hard_limit_steps(), (1210, 10890));
    }
}
