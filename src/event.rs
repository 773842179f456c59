use serde::{Deserialize, Serialize};

use crate::ring::RingBuffer;
use crate::types::Vec3;

/// What one filtered sample did to the event state
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "transition", rename_all = "snake_case")]
pub enum EventTransition {
    /// No event in progress (or detector not armed yet)
    Idle,
    Started,
    Continuing,
    /// The event closed on this sample; its samples stay readable until the next start.
    Ended {
        samples: usize,
        peak_deviation: f64,
    },
}

/// Flags acceleration events: filtered samples deviating from gravity by
/// more than `threshold` g.
pub struct EventDetector {
    threshold: f64,
    active: bool,
    samples: RingBuffer<Vec3>,
    max_deviation: f64,
    max_deviation_pos: usize,
}

impl EventDetector {
    pub fn new(event_threshold_g: f64, capacity: usize) -> Self {
        EventDetector {
            threshold: event_threshold_g,
            active: false,
            samples: RingBuffer::new(capacity),
            max_deviation: 0.0,
            max_deviation_pos: 0,
        }
    }

    /// Classify one filtered sample against the locked `gravity` vector.
    /// Without gravity the detector is not armed and always reports `Idle`.
    pub fn observe(&mut self, filtered: Vec3, gravity: Option<&Vec3>) -> EventTransition {
        let Some(gravity) = gravity else {
            return EventTransition::Idle;
        };

        let deviation = (filtered - gravity).norm();

        if deviation > self.threshold {
            let transition = if self.active {
                EventTransition::Continuing
            } else {
                self.active = true;
                self.samples.clear();
                EventTransition::Started
            };

            if self.samples.push(filtered).is_some() {
                if self.max_deviation_pos == 0 {
                    // The peak itself was evicted
                    self.rescan_peak(gravity);
                } else {
                    self.max_deviation_pos -= 1;
                }
            }
            if deviation > self.max_deviation {
                self.max_deviation = deviation;
                self.max_deviation_pos = self.samples.len() - 1;
            }
            if transition == EventTransition::Started {
                log::debug!("Event started: deviation {:.3} g", deviation);
            }
            return transition;
        }

        if !self.active {
            return EventTransition::Idle;
        }

        let ended = EventTransition::Ended {
            samples: self.samples.len(),
            peak_deviation: self.max_deviation,
        };
        log::debug!(
            "Event ended: {} samples, peak {:.3} g at #{}",
            self.samples.len(),
            self.max_deviation,
            self.max_deviation_pos
        );
        self.active = false;
        self.max_deviation = 0.0;
        self.max_deviation_pos = 0;
        ended
    }

    fn rescan_peak(&mut self, gravity: &Vec3) {
        self.max_deviation = 0.0;
        self.max_deviation_pos = 0;
        for (pos, sample) in self.samples.iter().enumerate() {
            let deviation = (sample - gravity).norm();
            if deviation > self.max_deviation {
                self.max_deviation = deviation;
                self.max_deviation_pos = pos;
            }
        }
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Filtered samples of the current (or last ended) event, oldest first
    pub fn samples(&self) -> &RingBuffer<Vec3> {
        &self.samples
    }

    /// Peak deviation of the event in progress and its position in the buffer
    pub fn peak(&self) -> Option<(f64, usize)> {
        self.active
            .then_some((self.max_deviation, self.max_deviation_pos))
    }

    pub fn reset(&mut self) {
        self.active = false;
        self.samples.clear();
        self.max_deviation = 0.0;
        self.max_deviation_pos = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const AHIGH: f64 = 0.12;

    fn gravity() -> Vec3 {
        Vec3::new(0.0, 0.0, 1.0)
    }

    #[test]
    fn test_unarmed_detector_is_idle() {
        let mut detector = EventDetector::new(AHIGH, 10);
        let kick = Vec3::new(0.5, 0.0, 1.0);
        assert_eq!(detector.observe(kick, None), EventTransition::Idle);
        assert!(!detector.is_active());
    }

    #[test]
    fn test_single_frame_event() {
        let mut detector = EventDetector::new(AHIGH, 10);
        let g = gravity();

        assert_eq!(detector.observe(g, Some(&g)), EventTransition::Idle);
        assert_eq!(
            detector.observe(Vec3::new(0.2, 0.0, 1.0), Some(&g)),
            EventTransition::Started
        );
        assert!(detector.is_active());

        match detector.observe(g, Some(&g)) {
            EventTransition::Ended {
                samples,
                peak_deviation,
            } => {
                assert_eq!(samples, 1);
                assert!((peak_deviation - 0.2).abs() < 1e-12);
            }
            other => panic!("expected Ended, got {:?}", other),
        }
        // Exactly one Ended
        assert_eq!(detector.observe(g, Some(&g)), EventTransition::Idle);
        assert_eq!(detector.samples().len(), 1);
    }

    #[test]
    fn test_continuing_tracks_peak() {
        let mut detector = EventDetector::new(AHIGH, 10);
        let g = gravity();
        detector.observe(Vec3::new(0.13, 0.0, 1.0), Some(&g));
        assert_eq!(
            detector.observe(Vec3::new(0.3, 0.0, 1.0), Some(&g)),
            EventTransition::Continuing
        );
        detector.observe(Vec3::new(0.2, 0.0, 1.0), Some(&g));

        let (peak, pos) = detector.peak().unwrap();
        assert!((peak - 0.3).abs() < 1e-12);
        assert_eq!(pos, 1);
    }

    #[test]
    fn test_buffer_bounded_to_capacity() {
        let mut detector = EventDetector::new(AHIGH, 5);
        let g = gravity();
        for i in 0..12 {
            detector.observe(Vec3::new(0.2 + i as f64 * 0.01, 0.0, 1.0), Some(&g));
        }
        assert_eq!(detector.samples().len(), 5);
        // Oldest evicted first: the buffer holds the last five samples
        let first = detector.samples().get(0).unwrap();
        assert!((first.x - 0.27).abs() < 1e-12);
    }

    #[test]
    fn test_peak_follows_eviction() {
        let mut detector = EventDetector::new(AHIGH, 3);
        let g = gravity();
        for x in [0.5, 0.2, 0.3, 0.25] {
            detector.observe(Vec3::new(x, 0.0, 1.0), Some(&g));
        }

        // 0.5 has left the buffer; [0.2, 0.3, 0.25] remain
        let (peak, pos) = detector.peak().unwrap();
        assert!((peak - 0.3).abs() < 1e-12);
        assert_eq!(pos, 1);

        match detector.observe(g, Some(&g)) {
            EventTransition::Ended { peak_deviation, .. } => {
                assert!((peak_deviation - 0.3).abs() < 1e-12)
            }
            other => panic!("expected Ended, got {:?}", other),
        }
    }

    #[test]
    fn test_new_event_clears_previous_samples() {
        let mut detector = EventDetector::new(AHIGH, 10);
        let g = gravity();
        for _ in 0..3 {
            detector.observe(Vec3::new(0.3, 0.0, 1.0), Some(&g));
        }
        detector.observe(g, Some(&g));
        detector.observe(Vec3::new(0.0, 0.4, 1.0), Some(&g));
        assert_eq!(detector.samples().len(), 1);
    }
}
