//! Gravity calibration from a stationary interval
//!
//! The detector accumulates filtered samples while the raw window is quiet.
//! Once `capacity` consecutive quiet samples are seen, the mean becomes the
//! gravity direction and roll/pitch are derived from it. The result is
//! produced once; afterwards the detector is locked until reset.

use crate::types::Vec3;

/// Locked gravity direction with the roll/pitch derived from it
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Calibration {
    /// Unit specific-force vector measured at rest (g units)
    pub gravity: Vec3,
    pub phi: f64,
    pub theta: f64,
}

impl Calibration {
    /// Roll/pitch from the mean at-rest reading.
    ///
    /// Readings are specific force, so a level device reads (0, 0, +1).
    /// Roll and pitch are taken from the downward direction `d = -g`:
    /// `phi = atan2(-d.y, -d.z)`, `theta = asin(d.x)`.
    pub fn from_mean(mean: Vec3) -> Option<Self> {
        let norm = mean.norm();
        if !norm.is_finite() || norm == 0.0 {
            return None;
        }
        let gravity = mean / norm;
        let down = -gravity;

        let phi = (-down.y).atan2(-down.z);
        let theta = down.x.clamp(-1.0, 1.0).asin();

        Some(Calibration {
            gravity,
            phi,
            theta,
        })
    }
}

pub struct CalibrationDetector {
    threshold: f64,
    capacity: usize,
    sum: Vec3,
    count: usize,
    locked: Option<Calibration>,
}

impl CalibrationDetector {
    pub fn new(stationary_threshold_g: f64, capacity: usize) -> Self {
        CalibrationDetector {
            threshold: stationary_threshold_g,
            capacity,
            sum: Vec3::zeros(),
            count: 0,
            locked: None,
        }
    }

    /// Feed one filtered sample with the current raw-window deviation.
    ///
    /// Returns the calibration exactly once, on the sample that completes a
    /// run of `capacity` consecutive stationary samples.
    pub fn observe(&mut self, filtered: Vec3, window_std_dev: f64) -> Option<Calibration> {
        if self.locked.is_some() {
            return None;
        }

        if window_std_dev < self.threshold {
            self.sum += filtered;
            self.count += 1;
        } else {
            self.sum = Vec3::zeros();
            self.count = 0;
        }

        if self.count < self.capacity {
            return None;
        }

        let mean = self.sum / self.count as f64;
        self.sum = Vec3::zeros();
        self.count = 0;

        let calibration = Calibration::from_mean(mean)?;
        log::info!(
            "Gravity locked: phi={:.2}° theta={:.2}° g=({:.3}, {:.3}, {:.3})",
            calibration.phi.to_degrees(),
            calibration.theta.to_degrees(),
            calibration.gravity.x,
            calibration.gravity.y,
            calibration.gravity.z
        );
        self.locked = Some(calibration);
        Some(calibration)
    }

    pub fn calibration(&self) -> Option<&Calibration> {
        self.locked.as_ref()
    }

    pub fn is_locked(&self) -> bool {
        self.locked.is_some()
    }

    /// Number of consecutive stationary samples collected so far
    pub fn progress(&self) -> usize {
        self.count
    }

    pub fn reset(&mut self) {
        self.sum = Vec3::zeros();
        self.count = 0;
        self.locked = None;
    }
}
