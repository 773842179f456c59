//! Mounting-yaw solver
//!
//! GPS gives the vehicle's horizontal acceleration in the navigation frame;
//! the event buffer gives the same acceleration as the sensor felt it. Once
//! roll and pitch are known, the only unknown between the two is a rotation
//! about the vertical axis: the mounting yaw. Each GPS velocity pair yields
//! one closed-form estimate, and the estimate is accepted only when the
//! reconstructed body acceleration matches the measurement.

use serde::{Deserialize, Serialize};

use crate::calibration::Calibration;
use crate::gps::{AlignedFix, GpsCorrelator};
use crate::ring::RingBuffer;
use crate::types::{pitch_matrix, roll_matrix, yaw_matrix, Vec3};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct YawSolution {
    /// Mounting yaw [rad]
    pub psi: f64,
    /// Mean |measured - predicted| over the contributing samples [g]
    pub mean_residual: f64,
    pub samples: usize,
    /// Accumulated bearing change over the event's fixes [deg]
    pub yaw_variation_deg: f64,
    /// Altitude span over the event's fixes [m]
    pub altitude_variation_m: f64,
}

pub struct YawSolver {
    g_earth: f64,
    max_mean_residual: f64,
    min_samples: usize,
}

impl YawSolver {
    pub fn new(g_earth: f64, max_mean_residual: f64, min_samples: usize) -> Self {
        YawSolver {
            g_earth,
            max_mean_residual,
            min_samples,
        }
    }

    /// Solve for the mounting yaw from one finished event.
    ///
    /// `event` holds the event's filtered samples, newest last, with the
    /// newest sample taken on the tick before the solve. Only fixes recorded
    /// while the event was running take part; each pair is compared with the
    /// event sample taken when its first fix was recorded. Returns `None`
    /// when there is not enough GPS support or the fit is poor.
    pub fn solve(
        &self,
        event: &RingBuffer<Vec3>,
        gps: &GpsCorrelator,
        calibration: &Calibration,
    ) -> Option<YawSolution> {
        let suffix = gps.valid_suffix();
        let len = event.len();
        let first_inside = suffix
            .iter()
            .position(|fix| (1..=len).contains(&fix.age))
            .unwrap_or(suffix.len());
        let fixes = &suffix[first_inside..];
        if fixes.len() < 2 {
            log::debug!(
                "Yaw solve skipped: {} valid GPS fixes inside the event",
                fixes.len()
            );
            return None;
        }

        let r_phi = roll_matrix(calibration.phi);
        let r_theta = pitch_matrix(calibration.theta);
        let to_level = r_theta.transpose() * r_phi.transpose();
        let to_body = r_phi * r_theta;

        let mut psis = Vec::with_capacity(fixes.len() - 1);
        let mut residuals = Vec::with_capacity(fixes.len() - 1);

        for pair in fixes.windows(2) {
            let (first, second) = (&pair[0], &pair[1]);
            let Some((accel_gps, heading)) = self.gps_acceleration(first, second) else {
                continue;
            };
            let Some(measured) = event.get(len - first.age) else {
                continue;
            };

            let specific = measured - calibration.gravity;
            let w = to_level * specific;
            let v = yaw_matrix(heading) * accel_gps;

            let psi = (v.y * w.x - v.x * w.y).atan2(v.x * w.x + v.y * w.y);
            let predicted = to_body * yaw_matrix(psi) * v;

            residuals.push((specific - predicted).norm());
            psis.push(psi);
        }

        if psis.is_empty() {
            log::debug!("Yaw solve skipped: no GPS acceleration inside the event");
            return None;
        }

        let mean_residual = residuals.iter().sum::<f64>() / residuals.len() as f64;
        if psis.len() < self.min_samples || mean_residual >= self.max_mean_residual {
            log::debug!(
                "Yaw solve rejected: {} samples, mean residual {:.3} g",
                psis.len(),
                mean_residual
            );
            return None;
        }

        let psi = mean_angle(&psis);
        let (yaw_variation_deg, altitude_variation_m) = gps_variation(fixes);

        log::info!(
            "Yaw accepted: psi={:.2}° residual={:.3} g from {} GPS samples (yaw var {:.2}°, alt var {:.2} m)",
            psi.to_degrees(),
            mean_residual,
            psis.len(),
            yaw_variation_deg,
            altitude_variation_m
        );
        Some(YawSolution {
            psi,
            mean_residual,
            samples: psis.len(),
            yaw_variation_deg,
            altitude_variation_m,
        })
    }

    /// Horizontal acceleration [g] between two fixes, in the navigation
    /// frame, and the heading of the first fix. `None` when the pair carries
    /// no direction (same timestamp or unchanged velocity).
    fn gps_acceleration(&self, first: &AlignedFix, second: &AlignedFix) -> Option<(Vec3, f64)> {
        let dt = second.rtc - first.rtc;
        if dt == 0.0 {
            return None;
        }

        let (n1, e1) = first.velocity_ms();
        let (n2, e2) = second.velocity_ms();
        let accel = Vec3::new(
            (n2 - n1) / dt / self.g_earth,
            (e2 - e1) / dt / self.g_earth,
            0.0,
        );
        if accel.x == 0.0 && accel.y == 0.0 {
            return None;
        }

        Some((accel, e1.atan2(n1)))
    }
}

/// Circular mean; matches the arithmetic mean unless the angles straddle ±π.
fn mean_angle(angles: &[f64]) -> f64 {
    let (sin_sum, cos_sum) = angles
        .iter()
        .fold((0.0_f64, 0.0_f64), |(s, c), a| (s + a.sin(), c + a.cos()));
    sin_sum.atan2(cos_sum)
}

/// Total bearing change [deg] and altitude span [m] over `fixes`.
fn gps_variation(fixes: &[AlignedFix]) -> (f64, f64) {
    let yaw_variation: f64 = fixes
        .windows(2)
        .map(|pair| {
            let (b1, b2) = (pair[0].bearing_deg.to_radians(), pair[1].bearing_deg.to_radians());
            // Chord between the two unit headings -> included angle
            let chord = ((b2.cos() - b1.cos()).powi(2) + (b2.sin() - b1.sin()).powi(2)).sqrt();
            2.0 * (chord / 2.0).clamp(-1.0, 1.0).asin()
        })
        .sum();

    let (min_alt, max_alt) = fixes.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), f| {
        (lo.min(f.altitude_m), hi.max(f.altitude_m))
    });
    let altitude_variation = if fixes.is_empty() { 0.0 } else { max_alt - min_alt };

    (yaw_variation.to_degrees(), altitude_variation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FixQuality, GpsFixSample};
    use approx::assert_abs_diff_eq;

    const G: f64 = 9.8;

    fn level() -> Calibration {
        Calibration::from_mean(Vec3::new(0.0, 0.0, 1.0)).unwrap()
    }

    fn solver() -> YawSolver {
        YawSolver::new(G, 0.1, 2)
    }

    fn event_of(sample: Vec3, len: usize) -> RingBuffer<Vec3> {
        let mut ring = RingBuffer::new(200);
        for _ in 0..len {
            ring.push(sample);
        }
        ring
    }

    /// Feed one GPS fix per second at 20 Hz with no filter delay; the last
    /// fix keeps repeating for `trailing_ticks`.
    fn correlator_with(fixes: &[(f64, f64)], trailing_ticks: u64) -> GpsCorrelator {
        let mut gps = GpsCorrelator::new(15.0, 0, 13);
        let mut tick = 0u64;
        let mut latest = None;
        for (k, (speed, bearing)) in fixes.iter().enumerate() {
            latest = Some(GpsFixSample::new(*speed, *bearing, 0.0, k as f64, FixQuality::Good));
            for _ in 0..20 {
                gps.ingest(latest, tick, true);
                tick += 1;
            }
        }
        for _ in 0..trailing_ticks {
            gps.ingest(latest, tick, true);
            tick += 1;
        }
        gps
    }

    fn aligned(age: usize, bearing_deg: f64, altitude_m: f64) -> AlignedFix {
        AlignedFix {
            age,
            rtc: 0.0,
            speed_kmh: 30.0,
            bearing_deg,
            altitude_m,
        }
    }

    #[test]
    fn test_single_fix_returns_none() {
        let gps = correlator_with(&[(30.0, 0.0)], 0);
        let event = event_of(Vec3::new(0.1, 0.0, 1.0), 100);
        assert!(solver().solve(&event, &gps, &level()).is_none());
    }

    #[test]
    fn test_constant_velocity_returns_none() {
        let gps = correlator_with(&[(30.0, 45.0), (30.0, 45.0)], 0);
        let event = event_of(Vec3::new(0.1, 0.0, 1.0), 100);
        assert!(solver().solve(&event, &gps, &level()).is_none());
    }

    #[test]
    fn test_recovers_mounting_yaw() {
        let mount = 30f64.to_radians();
        // Straight-line acceleration heading north, +5 km/h every second
        let accel_g = 5.0 / 3.6 / G;
        let body = yaw_matrix(mount) * Vec3::new(accel_g, 0.0, 0.0);
        let event = event_of(Vec3::new(0.0, 0.0, 1.0) + body, 150);
        let gps = correlator_with(&[(20.0, 0.0), (25.0, 0.0), (30.0, 0.0), (35.0, 0.0)], 0);

        let solution = solver().solve(&event, &gps, &level()).expect("should solve");
        assert_abs_diff_eq!(solution.psi, mount, epsilon = 1e-9);
        assert!(solution.mean_residual < 1e-9);
        assert_eq!(solution.samples, 3);
        assert_abs_diff_eq!(solution.yaw_variation_deg, 0.0, epsilon = 1e-9);
        assert_abs_diff_eq!(solution.altitude_variation_m, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_recovers_yaw_on_tilted_mount_with_heading() {
        let (phi, theta, mount) = (0.15, -0.08, -1.2);
        let bearing = 60f64;
        let accel_g = 5.0 / 3.6 / G;

        let calibration = Calibration::from_mean(
            roll_matrix(phi) * pitch_matrix(theta) * Vec3::new(0.0, 0.0, 1.0),
        )
        .unwrap();
        // Vehicle-frame acceleration is purely longitudinal
        let body = roll_matrix(phi)
            * pitch_matrix(theta)
            * yaw_matrix(mount)
            * Vec3::new(accel_g, 0.0, 0.0);
        let event = event_of(calibration.gravity + body, 150);
        let gps = correlator_with(&[(40.0, bearing), (45.0, bearing), (50.0, bearing)], 3);

        let solution = solver().solve(&event, &gps, &calibration).expect("should solve");
        assert_abs_diff_eq!(solution.psi, mount, epsilon = 1e-9);
        assert_eq!(solution.samples, 2);
    }

    #[test]
    fn test_pair_reads_sample_at_first_fix() {
        // Fixes recorded at ages 60, 40 and 20. The event matches the GPS
        // acceleration exactly at those ages and doubles it everywhere else.
        let accel_g = 5.0 / 3.6 / G;
        let mut event = RingBuffer::new(200);
        for i in 0..100usize {
            let age = 100 - i;
            let scale = if age % 20 == 0 { 1.0 } else { 2.0 };
            event.push(Vec3::new(scale * accel_g, 0.0, 1.0));
        }
        let gps = correlator_with(&[(20.0, 0.0), (25.0, 0.0), (30.0, 0.0)], 0);

        let solution = solver().solve(&event, &gps, &level()).expect("should solve");
        assert_abs_diff_eq!(solution.psi, 0.0, epsilon = 1e-9);
        assert!(solution.mean_residual < 1e-9);
        assert_eq!(solution.samples, 2);
    }

    #[test]
    fn test_fix_before_event_start_is_dropped() {
        let accel_g = 5.0 / 3.6 / G;
        let sample = Vec3::new(accel_g, 0.0, 1.0);
        let gps = correlator_with(&[(20.0, 0.0), (25.0, 0.0), (30.0, 0.0)], 0);

        // Ages 60, 40, 20: a 50-sample event leaves one pair, a 70-sample event two
        assert!(solver().solve(&event_of(sample, 50), &gps, &level()).is_none());
        let solution = solver()
            .solve(&event_of(sample, 70), &gps, &level())
            .expect("should solve");
        assert_eq!(solution.samples, 2);
    }

    #[test]
    fn test_inconsistent_measurement_rejected() {
        // The sensor felt a 0.5 g lateral kick the GPS never saw
        let event = event_of(Vec3::new(0.0, 0.5, 1.0), 150);
        let gps = correlator_with(&[(20.0, 0.0), (25.0, 0.0), (30.0, 0.0)], 0);
        assert!(solver().solve(&event, &gps, &level()).is_none());
    }

    #[test]
    fn test_one_acceleration_sample_is_not_enough() {
        let event = event_of(Vec3::new(0.14, 0.0, 1.0), 150);
        let gps = correlator_with(&[(20.0, 0.0), (25.0, 0.0)], 0);
        assert!(solver().solve(&event, &gps, &level()).is_none());
    }

    #[test]
    fn test_fixes_outside_event_are_skipped() {
        let event = event_of(Vec3::new(0.14, 0.0, 1.0), 5);
        let gps = correlator_with(&[(20.0, 0.0), (25.0, 0.0), (30.0, 0.0)], 10);
        assert!(solver().solve(&event, &gps, &level()).is_none());
    }

    #[test]
    fn test_mean_angle() {
        let arithmetic = (0.1 + 0.3 + 0.5) / 3.0;
        assert_abs_diff_eq!(mean_angle(&[0.1, 0.3, 0.5]), arithmetic, epsilon = 1e-12);

        // Either side of ±π averages to π, not 0
        let across = mean_angle(&[3.1, -3.1]);
        assert_abs_diff_eq!(across.abs(), std::f64::consts::PI, epsilon = 1e-12);
    }

    #[test]
    fn test_gps_variation() {
        let fixes = [
            aligned(60, 350.0, 100.0),
            aligned(40, 10.0, 104.5),
            aligned(20, 40.0, 98.0),
        ];
        let (yaw_var, alt_var) = gps_variation(&fixes);
        // 350 -> 10 wraps through north: 20°, then 30°
        assert_abs_diff_eq!(yaw_var, 50.0, epsilon = 1e-9);
        assert_abs_diff_eq!(alt_var, 6.5, epsilon = 1e-12);
    }
}
