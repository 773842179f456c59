//! Attitude estimation engine
//!
//! Push-fed: the caller hands over GPS fixes and accelerometer samples in
//! arrival order and reads the estimate back after every sample. All state is
//! owned by the instance; nothing runs in the background.

use serde::{Deserialize, Serialize};

use crate::calibration::CalibrationDetector;
use crate::config::EstimatorConfig;
use crate::error::TrackerResult;
use crate::event::{EventDetector, EventTransition};
use crate::filters::FirFilter;
use crate::gps::GpsCorrelator;
use crate::record::BatchRecord;
use crate::types::{AccelSample, AttitudeEstimate, AttitudeUpdate, GpsFixSample};
use crate::yaw::YawSolver;

/// Running counters for one engine instance
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EstimatorStats {
    pub samples: u64,
    /// Sample count at which roll/pitch locked
    pub calibrated_at: Option<u64>,
    pub events: u64,
    pub yaw_attempts: u64,
    pub yaw_accepted: u64,
}

pub struct AttitudeEstimator {
    config: EstimatorConfig,
    filter: FirFilter,
    calibration: CalibrationDetector,
    events: EventDetector,
    gps: GpsCorrelator,
    solver: YawSolver,
    latest_fix: Option<GpsFixSample>,
    estimate: AttitudeEstimate,
    stats: EstimatorStats,
}

impl AttitudeEstimator {
    /// Build an engine from a validated configuration.
    pub fn new(config: EstimatorConfig) -> TrackerResult<Self> {
        config.validate()?;
        Ok(Self::from_config(config))
    }

    fn from_config(config: EstimatorConfig) -> Self {
        AttitudeEstimator {
            filter: FirFilter::new(config.filter_order, config.sample_rate_hz, config.cutoff_hz),
            calibration: CalibrationDetector::new(
                config.stationary_threshold_g,
                config.gravity_samples,
            ),
            events: EventDetector::new(config.event_threshold_g, config.event_capacity()),
            gps: GpsCorrelator::new(
                config.min_gps_speed_kmh,
                config.gps_delay_samples(),
                config.gps_capacity(),
            ),
            solver: YawSolver::new(
                config.g_earth,
                config.max_mean_residual_g,
                config.min_yaw_samples,
            ),
            latest_fix: None,
            estimate: AttitudeEstimate::default(),
            stats: EstimatorStats::default(),
            config,
        }
    }

    /// Make `fix` the current GPS state; it applies to every following
    /// accelerometer sample until replaced.
    pub fn feed_gps_fix(&mut self, fix: GpsFixSample) {
        self.latest_fix = Some(fix);
    }

    /// Advance the engine by one accelerometer sample (g units).
    pub fn feed_accel(&mut self, sample: AccelSample) -> Option<AttitudeUpdate> {
        let mut update = None;

        if let Some(filtered) = self.filter.apply(sample.as_vector()) {
            if !self.calibration.is_locked() {
                let std_dev = self.filter.window_std_dev();
                if let Some(calibration) = self.calibration.observe(filtered, std_dev) {
                    self.estimate.phi = Some(calibration.phi);
                    self.estimate.theta = Some(calibration.theta);
                    self.stats.calibrated_at = Some(self.stats.samples);
                    update = Some(AttitudeUpdate::RollPitch {
                        phi: calibration.phi,
                        theta: calibration.theta,
                    });
                }
            } else {
                let gravity = self.calibration.calibration().map(|c| c.gravity);
                match self.events.observe(filtered, gravity.as_ref()) {
                    EventTransition::Started => self.stats.events += 1,
                    EventTransition::Ended { .. } => {
                        update = self.solve_yaw();
                        self.gps.on_event_end();
                    }
                    EventTransition::Idle | EventTransition::Continuing => {}
                }
            }
        }

        self.gps
            .ingest(self.latest_fix, self.stats.samples, self.events.is_active());
        self.stats.samples += 1;
        update
    }

    fn solve_yaw(&mut self) -> Option<AttitudeUpdate> {
        let calibration = self.calibration.calibration()?;
        self.stats.yaw_attempts += 1;

        let solution = self
            .solver
            .solve(self.events.samples(), &self.gps, calibration)?;
        self.stats.yaw_accepted += 1;
        self.estimate.psi = Some(solution.psi);
        Some(AttitudeUpdate::Yaw {
            psi: solution.psi,
            mean_residual: solution.mean_residual,
            samples: solution.samples,
            yaw_variation_deg: solution.yaw_variation_deg,
            altitude_variation_m: solution.altitude_variation_m,
        })
    }

    /// Feed one batch row: its fix (if any) first, then its sample.
    pub fn process_record(&mut self, record: &BatchRecord) -> Option<AttitudeUpdate> {
        if let Some(fix) = record.gps_fix() {
            self.feed_gps_fix(fix);
        }
        self.feed_accel(record.accel_sample(self.config.g_earth))
    }

    pub fn estimate(&self) -> AttitudeEstimate {
        self.estimate
    }

    pub fn stats(&self) -> EstimatorStats {
        self.stats
    }

    pub fn config(&self) -> &EstimatorConfig {
        &self.config
    }

    /// Whether an acceleration event is currently open
    pub fn in_event(&self) -> bool {
        self.events.is_active()
    }

    /// Forget everything learned so far, keeping the configuration.
    pub fn reset(&mut self) {
        log::debug!("Estimator reset after {} samples", self.stats.samples);
        self.filter.reset();
        self.calibration.reset();
        self.events.reset();
        self.gps.reset();
        self.latest_fix = None;
        self.estimate = AttitudeEstimate::default();
        self.stats = EstimatorStats::default();
    }
}

impl Default for AttitudeEstimator {
    fn default() -> Self {
        Self::from_config(EstimatorConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulate::Scenario;
    use crate::types::FixQuality;
    use approx::assert_abs_diff_eq;

    fn feed_level(estimator: &mut AttitudeEstimator, count: u64) -> Vec<(u64, AttitudeUpdate)> {
        let mut updates = Vec::new();
        for _ in 0..count {
            let index = estimator.stats().samples;
            if let Some(update) = estimator.feed_accel(AccelSample::new(index, 0.0, 0.0, 1.0)) {
                updates.push((index, update));
            }
        }
        updates
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = EstimatorConfig {
            sample_rate_hz: 0.0,
            ..Default::default()
        };
        assert!(AttitudeEstimator::new(config).is_err());
        assert!(AttitudeEstimator::new(EstimatorConfig::default()).is_ok());
    }

    #[test]
    fn test_level_stream_locks_roll_pitch() {
        let mut estimator = AttitudeEstimator::default();
        let updates = feed_level(&mut estimator, 300);

        // The first filtered output (index 63) is also the first of 200 stationary samples
        assert_eq!(updates.len(), 1);
        let (index, update) = updates[0];
        assert_eq!(index, 262);
        match update {
            AttitudeUpdate::RollPitch { phi, theta } => {
                assert_abs_diff_eq!(phi, 0.0, epsilon = 1e-9);
                assert_abs_diff_eq!(theta, 0.0, epsilon = 1e-9);
            }
            other => panic!("expected roll/pitch, got {:?}", other),
        }

        let estimate = estimator.estimate();
        assert!(estimate.phi.is_some() && estimate.theta.is_some());
        assert_eq!(estimate.psi, None);
        assert_eq!(estimator.stats().calibrated_at, Some(262));
        assert_eq!(estimator.stats().events, 0);
    }

    #[test]
    fn test_noisy_stream_never_calibrates() {
        let mut estimator = AttitudeEstimator::default();
        for i in 0..600u64 {
            // Alternating ±0.16 g on x: window std 0.16 = 2 × ALOW
            let x = if i % 2 == 0 { 0.16 } else { -0.16 };
            assert!(estimator.feed_accel(AccelSample::new(i, x, 0.0, 1.0)).is_none());
        }
        assert_eq!(estimator.estimate(), AttitudeEstimate::default());
        assert_eq!(estimator.stats().calibrated_at, None);
    }

    #[test]
    fn test_event_without_gps_keeps_yaw_unset() {
        let mut estimator = AttitudeEstimator::default();
        feed_level(&mut estimator, 300);

        for i in 300..500u64 {
            estimator.feed_accel(AccelSample::new(i, 0.3, 0.0, 1.0));
        }
        assert!(estimator.in_event());
        feed_level(&mut estimator, 200);

        assert!(!estimator.in_event());
        let stats = estimator.stats();
        assert_eq!(stats.events, 1);
        assert_eq!(stats.yaw_attempts, 1);
        assert_eq!(stats.yaw_accepted, 0);
        assert_eq!(estimator.estimate().psi, None);
    }

    #[test]
    fn test_scenario_recovers_mounting_yaw() {
        let scenario = Scenario {
            mount_yaw_deg: 30.0,
            ..Default::default()
        };
        let config = EstimatorConfig::default();
        let mut estimator = AttitudeEstimator::default();

        let mut yaw_updates = 0;
        for record in scenario.records(config.g_earth) {
            if let Some(AttitudeUpdate::Yaw { .. }) = estimator.process_record(&record) {
                yaw_updates += 1;
            }
        }

        assert_eq!(yaw_updates, 1);
        let estimate = estimator.estimate();
        assert!(estimate.is_complete());
        assert_abs_diff_eq!(estimate.phi.unwrap(), 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(estimate.theta.unwrap(), 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(estimate.psi_deg().unwrap(), 30.0, epsilon = 0.1);
    }

    #[test]
    fn test_scenario_with_tilted_mount() {
        let scenario = Scenario {
            roll_deg: 4.0,
            pitch_deg: -3.0,
            mount_yaw_deg: -75.0,
            bearing_deg: 120.0,
            ..Default::default()
        };
        let mut estimator = AttitudeEstimator::default();
        for record in scenario.records(9.8) {
            estimator.process_record(&record);
        }

        let estimate = estimator.estimate();
        assert_abs_diff_eq!(estimate.phi_deg().unwrap(), 4.0, epsilon = 1e-6);
        assert_abs_diff_eq!(estimate.theta_deg().unwrap(), -3.0, epsilon = 1e-6);
        assert_abs_diff_eq!(estimate.psi_deg().unwrap(), -75.0, epsilon = 0.1);
    }

    #[test]
    fn test_instances_are_independent() {
        let mut calibrated = AttitudeEstimator::default();
        let mut fresh = AttitudeEstimator::default();
        feed_level(&mut calibrated, 300);
        feed_level(&mut fresh, 100);

        assert!(calibrated.estimate().phi.is_some());
        assert_eq!(fresh.estimate(), AttitudeEstimate::default());
        assert_eq!(fresh.stats().samples, 100);
    }

    #[test]
    fn test_reset_restores_fresh_state() {
        let mut estimator = AttitudeEstimator::default();
        estimator.feed_gps_fix(GpsFixSample::new(40.0, 0.0, 0.0, 0.0, FixQuality::Good));
        feed_level(&mut estimator, 300);
        assert!(estimator.estimate().phi.is_some());

        estimator.reset();
        assert_eq!(estimator.estimate(), AttitudeEstimate::default());
        assert_eq!(estimator.stats(), EstimatorStats::default());

        // Calibrates again from scratch at the same point
        let updates = feed_level(&mut estimator, 300);
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].0, 262);
    }
}
