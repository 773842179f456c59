//! Synthetic drives with a known mounting
//!
//! A scenario is a straight-line drive: steady speed long enough for gravity
//! to lock, a constant longitudinal acceleration, then steady speed again.
//! The accelerometer is mounted with the given roll, pitch and yaw, so the
//! generated records can be checked against the attitude the engine recovers.

use serde::{Deserialize, Serialize};

use crate::record::BatchRecord;
use crate::types::{pitch_matrix, roll_matrix, yaw_matrix, FixQuality, Vec3};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Scenario {
    pub sample_rate_hz: f64,
    pub gps_rate_hz: f64,
    pub roll_deg: f64,
    pub pitch_deg: f64,
    pub mount_yaw_deg: f64,
    /// Course over ground for the whole drive [deg]
    pub bearing_deg: f64,
    pub steady_s: f64,
    pub accel_s: f64,
    pub cruise_s: f64,
    pub start_speed_kmh: f64,
    pub accel_kmh_per_s: f64,
    pub altitude_m: f64,
}

impl Default for Scenario {
    fn default() -> Self {
        Self {
            sample_rate_hz: 20.0,
            gps_rate_hz: 1.0,
            roll_deg: 0.0,
            pitch_deg: 0.0,
            mount_yaw_deg: 0.0,
            bearing_deg: 0.0,
            steady_s: 15.0,
            accel_s: 10.0,
            cruise_s: 15.0,
            start_speed_kmh: 20.0,
            accel_kmh_per_s: 6.0,
            altitude_m: 100.0,
        }
    }
}

impl Scenario {
    pub fn duration_s(&self) -> f64 {
        self.steady_s + self.accel_s + self.cruise_s
    }

    /// Ground speed at time `t` [km/h]
    pub fn speed_at(&self, t: f64) -> f64 {
        let accelerating = (t - self.steady_s).clamp(0.0, self.accel_s);
        self.start_speed_kmh + self.accel_kmh_per_s * accelerating
    }

    fn is_accelerating(&self, t: f64) -> bool {
        t >= self.steady_s && t < self.steady_s + self.accel_s
    }

    /// Generate the drive as batch records with raw readings in m/s².
    pub fn records(&self, g_earth: f64) -> Vec<BatchRecord> {
        let tilt = roll_matrix(self.roll_deg.to_radians()) * pitch_matrix(self.pitch_deg.to_radians());
        let mount = tilt * yaw_matrix(self.mount_yaw_deg.to_radians());
        let gravity = tilt * Vec3::new(0.0, 0.0, 1.0);
        let forward_g = self.accel_kmh_per_s / 3.6 / g_earth;
        let thrust = mount * Vec3::new(forward_g, 0.0, 0.0);

        let count = (self.duration_s() * self.sample_rate_hz).round() as u64;
        (0..count)
            .map(|index| {
                let t = index as f64 / self.sample_rate_hz;
                let reading = if self.is_accelerating(t) {
                    gravity + thrust
                } else {
                    gravity
                };

                // The latest fix is the one from the start of the current GPS period
                let rtc = (t * self.gps_rate_hz).floor() / self.gps_rate_hz;
                BatchRecord {
                    contreg: index,
                    x: reading.x * g_earth,
                    y: reading.y * g_earth,
                    z: reading.z * g_earth,
                    gps_fix: Some(FixQuality::GOOD_CODE),
                    gps_speed: Some(self.speed_at(rtc)),
                    gps_direction: Some(self.bearing_deg),
                    gps_alt: Some(self.altitude_m),
                    gps_rtc: rtc,
                }
            })
            .collect()
    }
}
