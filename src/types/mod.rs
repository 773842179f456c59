pub mod linalg;

pub use linalg::*;

use serde::{Deserialize, Serialize};

/// Accelerometer sample in g units (raw reading / nominal g)
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AccelSample {
    pub index: u64,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl AccelSample {
    pub fn new(index: u64, x: f64, y: f64, z: f64) -> Self {
        Self { index, x, y, z }
    }

    /// Build a sample from a raw reading in m/s² by dividing by `g_earth`.
    pub fn from_raw(index: u64, x: f64, y: f64, z: f64, g_earth: f64) -> Self {
        Self::new(index, x / g_earth, y / g_earth, z / g_earth)
    }

    pub fn as_vector(&self) -> Vec3 {
        Vec3::new(self.x, self.y, self.z)
    }

    pub fn magnitude(&self) -> f64 {
        self.as_vector().norm()
    }
}

/// GPS fix quality as logged in the `gps_fix` column
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FixQuality {
    NoFix,
    Good,
    /// Any other receiver code (2D fixes, dead reckoning, ...)
    Other(i32),
}

impl FixQuality {
    pub const GOOD_CODE: i32 = 3;
    pub const NO_FIX_CODE: i32 = 0;

    pub fn from_code(code: i32) -> Self {
        match code {
            Self::GOOD_CODE => FixQuality::Good,
            Self::NO_FIX_CODE => FixQuality::NoFix,
            other => FixQuality::Other(other),
        }
    }

    pub fn code(&self) -> i32 {
        match self {
            FixQuality::NoFix => Self::NO_FIX_CODE,
            FixQuality::Good => Self::GOOD_CODE,
            FixQuality::Other(code) => *code,
        }
    }
}

/// One GPS fix as delivered by the location source
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GpsFixSample {
    /// Ground speed [km/h]
    pub speed_kmh: f64,
    /// Course over ground [deg, 0-360]
    pub bearing_deg: f64,
    pub altitude_m: f64,
    /// Seconds since the first sample of the run
    pub rtc: f64,
    pub fix: FixQuality,
}

impl GpsFixSample {
    pub fn new(speed_kmh: f64, bearing_deg: f64, altitude_m: f64, rtc: f64, fix: FixQuality) -> Self {
        Self {
            speed_kmh,
            bearing_deg,
            altitude_m,
            rtc,
            fix,
        }
    }

    /// A placeholder for a tick without a usable fix.
    pub fn no_fix(rtc: f64) -> Self {
        Self::new(0.0, 0.0, 0.0, rtc, FixQuality::NoFix)
    }

    /// True when the bearing can be trusted: good fix and moving at `min_speed_kmh` or faster.
    pub fn is_reliable(&self, min_speed_kmh: f64) -> bool {
        self.fix == FixQuality::Good && self.speed_kmh >= min_speed_kmh
    }
}

/// Current attitude solution; each angle stays `None` until estimated
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AttitudeEstimate {
    /// Roll [rad]
    pub phi: Option<f64>,
    /// Pitch [rad]
    pub theta: Option<f64>,
    /// Mounting yaw [rad]
    pub psi: Option<f64>,
}

impl AttitudeEstimate {
    pub fn phi_deg(&self) -> Option<f64> {
        self.phi.map(f64::to_degrees)
    }

    pub fn theta_deg(&self) -> Option<f64> {
        self.theta.map(f64::to_degrees)
    }

    pub fn psi_deg(&self) -> Option<f64> {
        self.psi.map(f64::to_degrees)
    }

    pub fn is_complete(&self) -> bool {
        self.phi.is_some() && self.theta.is_some() && self.psi.is_some()
    }
}

/// A change to the attitude estimate produced by one sample
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AttitudeUpdate {
    RollPitch {
        phi: f64,
        theta: f64,
    },
    Yaw {
        psi: f64,
        mean_residual: f64,
        samples: usize,
        /// Accumulated bearing change over the event's GPS fixes [deg]
        yaw_variation_deg: f64,
        /// Altitude span over the event's GPS fixes [m]
        altitude_variation_m: f64,
    },
}
