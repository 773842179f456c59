//! Mounting attitude estimation for vehicle accelerometers
//!
//! Roll and pitch come from gravity measured while the vehicle is steady;
//! the mounting yaw comes from acceleration events matched against GPS
//! velocity changes.

pub mod calibration;
pub mod config;
pub mod error;
pub mod estimator;
pub mod event;
pub mod filters;
pub mod gps;
pub mod logging;
pub mod record;
pub mod ring;
pub mod simulate;
pub mod stream;
pub mod types;
pub mod yaw;

pub use config::EstimatorConfig;
pub use error::{TrackerError, TrackerResult};
pub use estimator::{AttitudeEstimator, EstimatorStats};
pub use record::BatchRecord;
pub use types::{AccelSample, AttitudeEstimate, AttitudeUpdate, FixQuality, GpsFixSample};
