use crate::ring::RingBuffer;
use crate::types::Vec3;

/// Design a windowed-sinc low-pass FIR filter
///
/// Coefficient `i` is the ideal low-pass impulse response at
/// `n = i - order/2`, tapered by a Hamming window and normalised so the
/// coefficients sum to 1 (unity DC gain).
pub fn design_lowpass(order: usize, sample_rate_hz: f64, cutoff_hz: f64) -> Vec<f64> {
    let fc = cutoff_hz / (sample_rate_hz / 2.0);
    let half = (order / 2) as f64;

    let mut coefficients: Vec<f64> = (0..=order)
        .map(|i| {
            let n = i as f64 - half;
            let sinc = if n == 0.0 {
                fc
            } else {
                (std::f64::consts::PI * fc * n).sin() / (std::f64::consts::PI * n)
            };
            let hamming =
                0.54 - 0.46 * (2.0 * std::f64::consts::PI * i as f64 / order as f64).cos();
            sinc * hamming
        })
        .collect();

    // Normalize
    let sum: f64 = coefficients.iter().sum();
    let total = if sum != 0.0 { sum } else { 1.0 };
    coefficients.iter_mut().for_each(|c| *c /= total);

    coefficients
}

/// Causal per-axis FIR low-pass over a sliding window of raw samples
pub struct FirFilter {
    coefficients: Vec<f64>,
    window: RingBuffer<Vec3>,
}

impl FirFilter {
    pub fn new(order: usize, sample_rate_hz: f64, cutoff_hz: f64) -> Self {
        Self::from_coefficients(design_lowpass(order, sample_rate_hz, cutoff_hz))
    }

    pub fn from_coefficients(coefficients: Vec<f64>) -> Self {
        let taps = coefficients.len();
        FirFilter {
            coefficients,
            window: RingBuffer::new(taps),
        }
    }

    /// Push a raw sample; returns the filtered sample once the window is full.
    pub fn apply(&mut self, raw: Vec3) -> Option<Vec3> {
        self.window.push(raw);
        if !self.is_primed() {
            return None;
        }

        let mut filtered = Vec3::zeros();
        for (sample, coeff) in self.window.iter().zip(self.coefficients.iter()) {
            filtered += sample * *coeff;
        }
        Some(filtered)
    }

    pub fn is_primed(&self) -> bool {
        self.window.is_full()
    }

    pub fn coefficients(&self) -> &[f64] {
        &self.coefficients
    }

    pub fn order(&self) -> usize {
        self.coefficients.len().saturating_sub(1)
    }

    /// Fixed latency of the filter output [samples]
    pub fn group_delay_samples(&self) -> usize {
        self.order() / 2
    }

    /// Spread of the raw window: per-axis population standard deviation,
    /// combined by Euclidean norm. Zero for an empty window.
    pub fn window_std_dev(&self) -> f64 {
        let count = self.window.len();
        if count == 0 {
            return 0.0;
        }

        let mean = self.window.iter().fold(Vec3::zeros(), |acc, s| acc + s) / count as f64;
        let variance = self
            .window
            .iter()
            .map(|s| (s - mean).component_mul(&(s - mean)))
            .fold(Vec3::zeros(), |acc, sq| acc + sq)
            / count as f64;

        // |(σx, σy, σz)| = sqrt(σx² + σy² + σz²)
        variance.sum().sqrt()
    }

    pub fn reset(&mut self) {
        self.window.clear();
    }
}
