//! Linear algebra types for the attitude engine
//!
//! Fixed-size nalgebra aliases plus the elementary axis rotations used by
//! calibration and the yaw solver. All rotations are passive (frame)
//! rotations: they re-express a vector given in the outer frame inside the
//! rotated frame.

use nalgebra::{Matrix3, Vector3};

/// Acceleration vector in g units (x, y, z)
pub type Vec3 = Vector3<f64>;

/// 3×3 direction cosine matrix
pub type Mat3 = Matrix3<f64>;

/// Rotation by roll `phi` about the x axis.
pub fn roll_matrix(phi: f64) -> Mat3 {
    let (s, c) = phi.sin_cos();
    Mat3::new(
        1.0, 0.0, 0.0, //
        0.0, c, s, //
        0.0, -s, c,
    )
}

/// Rotation by pitch `theta` about the y axis.
pub fn pitch_matrix(theta: f64) -> Mat3 {
    let (s, c) = theta.sin_cos();
    Mat3::new(
        c, 0.0, -s, //
        0.0, 1.0, 0.0, //
        s, 0.0, c,
    )
}

/// Rotation by yaw `psi` about the z axis.
pub fn yaw_matrix(psi: f64) -> Mat3 {
    let (s, c) = psi.sin_cos();
    Mat3::new(
        c, s, 0.0, //
        -s, c, 0.0, //
        0.0, 0.0, 1.0,
    )
}
