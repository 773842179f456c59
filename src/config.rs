//! Estimator configuration
//!
//! Every threshold the engine uses lives here, defaulting to the values the
//! recorded datasets were tuned with (20 Hz accelerometer, 1 Hz GPS).

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{TrackerError, TrackerResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    /// Nominal gravity used to normalise raw readings [m/s²]
    pub g_earth: f64,
    /// FIR low-pass order (taps = order + 1)
    pub filter_order: usize,
    /// Low-pass cutoff [Hz]
    pub cutoff_hz: f64,
    /// Accelerometer sample rate [Hz]
    pub sample_rate_hz: f64,
    /// Delay applied to GPS fixes to line them up with filtered output [s]
    pub gps_filter_delay_s: f64,
    /// Expected GPS fix rate [Hz], sizes the GPS buffer
    pub gps_rate_hz: f64,
    /// Minimum speed for a trustworthy bearing [km/h]
    pub min_gps_speed_kmh: f64,
    /// Deviation from gravity that opens an acceleration event [g]
    pub event_threshold_g: f64,
    /// Window standard deviation below which a sample counts as stationary [g]
    pub stationary_threshold_g: f64,
    /// Longest event kept in the event buffer [s]
    pub max_event_duration_s: f64,
    /// Consecutive stationary samples needed to lock gravity
    pub gravity_samples: usize,
    /// Mean residual above which a yaw solve is rejected [g]
    pub max_mean_residual_g: f64,
    /// Minimum GPS acceleration samples for a yaw solve
    pub min_yaw_samples: usize,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            g_earth: 9.8,
            filter_order: 63,
            cutoff_hz: 0.3,
            sample_rate_hz: 20.0,
            gps_filter_delay_s: 1.5,
            gps_rate_hz: 1.0,
            min_gps_speed_kmh: 15.0,
            event_threshold_g: 0.12,
            stationary_threshold_g: 0.08,
            max_event_duration_s: 10.0,
            gravity_samples: 200,
            max_mean_residual_g: 0.1,
            min_yaw_samples: 2,
        }
    }
}

impl EstimatorConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> TrackerResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: EstimatorConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> TrackerResult<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> TrackerResult<()> {
        let invalid = |msg: &str| Err(TrackerError::InvalidConfig(msg.to_string()));

        if !(self.g_earth > 0.0) {
            return invalid("g_earth must be positive");
        }
        if self.filter_order == 0 {
            return invalid("filter_order must be at least 1");
        }
        if !(self.sample_rate_hz > 0.0) {
            return invalid("sample_rate_hz must be positive");
        }
        if !(self.cutoff_hz > 0.0) || self.cutoff_hz >= self.sample_rate_hz / 2.0 {
            return invalid("cutoff_hz must lie between 0 and the Nyquist frequency");
        }
        if !(self.gps_filter_delay_s >= 0.0) {
            return invalid("gps_filter_delay_s must not be negative");
        }
        if !(self.gps_rate_hz > 0.0) {
            return invalid("gps_rate_hz must be positive");
        }
        if !(self.max_event_duration_s > 0.0) {
            return invalid("max_event_duration_s must be positive");
        }
        if !(self.event_threshold_g > 0.0) || !(self.stationary_threshold_g > 0.0) {
            return invalid("event and stationary thresholds must be positive");
        }
        if self.gravity_samples == 0 {
            return invalid("gravity_samples must be at least 1");
        }
        if self.min_yaw_samples == 0 {
            return invalid("min_yaw_samples must be at least 1");
        }
        Ok(())
    }

    /// Samples the GPS stream is held back by: `ceil(delay × rate)`.
    pub fn gps_delay_samples(&self) -> usize {
        (self.gps_filter_delay_s * self.sample_rate_hz).ceil() as usize
    }

    /// Event buffer capacity: `ceil(max_duration × rate)`.
    pub fn event_capacity(&self) -> usize {
        ((self.max_event_duration_s * self.sample_rate_hz).ceil() as usize).max(1)
    }

    /// GPS buffer capacity: enough fixes to cover the delay plus a full event.
    pub fn gps_capacity(&self) -> usize {
        ((self.gps_filter_delay_s + self.max_event_duration_s) * self.gps_rate_hz).ceil() as usize + 1
    }
}
