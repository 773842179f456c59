//! Async driver for live sources
//!
//! Sensor tasks push into one mpsc channel, which fixes the order in which the
//! engine sees GPS fixes and accelerometer samples. The engine runs on a
//! single task and publishes the estimate on a watch channel whenever it
//! changes.

use tokio::sync::{mpsc, watch};

use crate::estimator::AttitudeEstimator;
use crate::record::BatchRecord;
use crate::types::{AccelSample, AttitudeEstimate, GpsFixSample};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SensorEvent {
    Accel(AccelSample),
    Gps(GpsFixSample),
    /// Start a new run: the engine forgets its state
    Reset,
}

impl SensorEvent {
    /// Split a batch row into its GPS event (if any) followed by its sample.
    pub fn from_record(record: &BatchRecord, g_earth: f64) -> Vec<SensorEvent> {
        let mut events = Vec::with_capacity(2);
        if let Some(fix) = record.gps_fix() {
            events.push(SensorEvent::Gps(fix));
        }
        events.push(SensorEvent::Accel(record.accel_sample(g_earth)));
        events
    }
}

/// Run the engine until every sender is dropped, returning it for inspection.
pub async fn run_engine(
    mut rx: mpsc::Receiver<SensorEvent>,
    mut estimator: AttitudeEstimator,
    tx: watch::Sender<AttitudeEstimate>,
) -> AttitudeEstimator {
    while let Some(event) = rx.recv().await {
        match event {
            SensorEvent::Gps(fix) => estimator.feed_gps_fix(fix),
            SensorEvent::Accel(sample) => {
                if let Some(update) = estimator.feed_accel(sample) {
                    log::debug!("Attitude update at sample {}: {:?}", sample.index, update);
                    tx.send_replace(estimator.estimate());
                }
            }
            SensorEvent::Reset => {
                estimator.reset();
                tx.send_replace(estimator.estimate());
            }
        }
    }

    let stats = estimator.stats();
    log::info!(
        "Sensor stream closed after {} samples ({} events, {}/{} yaw solves accepted)",
        stats.samples,
        stats.events,
        stats.yaw_accepted,
        stats.yaw_attempts
    );
    estimator
}
