//! Time-domain filters: the low-cut FIR and the post-filter registry

use std::f64::consts::PI;
use ndarray::{Array1, ArrayView1};
use crate::error::{PrepError, Result};

/// Tap count of the low-cut FIR.
pub const HIGHPASS_TAPS: usize = 255;

/// Coefficient shared by the pre-emphasis pair.
pub const PREEMPHASIS_COEF: f32 = 0.85;

/// Windowed-sinc high-pass (low-cut) FIR, applied causally.
///
/// Taps are designed with a Hamming window and scaled to unit gain at
/// Nyquist. The cutoff is normalised against the integer Nyquist rate
/// `sample_rate / 2`.
#[derive(Debug, Clone)]
pub struct HighpassFilter {
    taps: Vec<f32>,
}

impl HighpassFilter {
    pub fn new(sample_rate: u32, cutoff_hz: f32) -> Result<Self> {
        let nyquist = (sample_rate / 2) as f64;
        let cutoff = cutoff_hz as f64 / nyquist;
        if !(cutoff > 0.0 && cutoff < 1.0) {
            return Err(PrepError::config(format!(
                "High-pass cutoff {} Hz is outside (0, {}) Hz", cutoff_hz, nyquist
            )));
        }
        Ok(Self { taps: design_highpass(HIGHPASS_TAPS, cutoff) })
    }

    pub fn taps(&self) -> &[f32] {
        &self.taps
    }

    /// Causal convolution; output has the input's length.
    pub fn apply(&self, x: ArrayView1<f32>) -> Array1<f32> {
        let taps = &self.taps;
        Array1::from_shape_fn(x.len(), |n| {
            let depth = taps.len().min(n + 1);
            (0..depth).map(|k| taps[k] * x[n - k]).sum()
        })
    }
}

fn sinc(x: f64) -> f64 {
    if x == 0.0 {
        1.0
    } else {
        (PI * x).sin() / (PI * x)
    }
}

fn design_highpass(num_taps: usize, cutoff: f64) -> Vec<f32> {
    let alpha = (num_taps - 1) as f64 / 2.0;
    let mut taps: Vec<f64> = (0..num_taps)
        .map(|i| {
            let m = i as f64 - alpha;
            let window = 0.54 - 0.46 * (2.0 * PI * i as f64 / (num_taps - 1) as f64).cos();
            (sinc(m) - cutoff * sinc(cutoff * m)) * window
        })
        .collect();

    // unit gain at Nyquist
    let gain: f64 = taps
        .iter()
        .enumerate()
        .map(|(i, h)| h * (PI * (i as f64 - alpha)).cos())
        .sum();
    for h in taps.iter_mut() {
        *h /= gain;
    }

    taps.into_iter().map(|h| h as f32).collect()
}

/// Named time-domain transforms applied after gain scaling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostFilter {
    /// y[n] = x[n] - c * x[n-1]
    Preemphasis,
    /// y[n] = x[n] + c * y[n-1]
    InvPreemphasis,
}

impl PostFilter {
    /// Look up a registry key. Empty and `"none"` mean no filter.
    pub fn from_name(name: &str) -> Result<Option<Self>> {
        match name.trim() {
            "" | "none" => Ok(None),
            "preemphasis" => Ok(Some(PostFilter::Preemphasis)),
            "inv_preemphasis" => Ok(Some(PostFilter::InvPreemphasis)),
            other => Err(PrepError::config(format!(
                "Unknown preprocess filter {:?} (expected preemphasis, inv_preemphasis or none)", other
            ))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PostFilter::Preemphasis => "preemphasis",
            PostFilter::InvPreemphasis => "inv_preemphasis",
        }
    }

    pub fn apply(&self, x: ArrayView1<f32>) -> Array1<f32> {
        let coef = PREEMPHASIS_COEF;
        let mut y = Array1::zeros(x.len());
        match self {
            PostFilter::Preemphasis => {
                let mut prev = 0.0f32;
                for (out, &sample) in y.iter_mut().zip(x.iter()) {
                    *out = sample - coef * prev;
                    prev = sample;
                }
            }
            PostFilter::InvPreemphasis => {
                let mut prev = 0.0f32;
                for (out, &sample) in y.iter_mut().zip(x.iter()) {
                    *out = sample + coef * prev;
                    prev = *out;
                }
            }
        }
        y
    }
}
