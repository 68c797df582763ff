//! Log-mel spectrogram extraction.
//!
//! Two methods share one STFT front end:
//! - **original**: magnitude mel spectrogram, `log10(max(x, 1e-10))`
//! - **tacotron**: magnitude mel spectrogram, dynamic range compression
//!   `ln(max(x, 1e-5) * C)` with `C = 1`
//!
//! Framing is centered: the waveform is reflect-padded by `fft_size / 2` on
//! both sides, so a signal of `L` samples yields `1 + L / hop_size` frames.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use ndarray::{Array2, ArrayView1};
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use serde::{Deserialize, Serialize};

use crate::config::FeatureConfig;
use crate::error::{PrepError, Result};

const ORIGINAL_LOG_FLOOR: f32 = 1e-10;
const TACOTRON_LOG_FLOOR: f32 = 1e-5;
const TACOTRON_COMPRESSION: f32 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MelMethod {
    Original,
    Tacotron,
}

impl MelMethod {
    pub fn name(&self) -> &'static str {
        match self {
            MelMethod::Original => "original",
            MelMethod::Tacotron => "tacotron",
        }
    }

    fn compress(&self, magnitude: f32) -> f32 {
        match self {
            MelMethod::Original => magnitude.max(ORIGINAL_LOG_FLOOR).log10(),
            MelMethod::Tacotron => (magnitude.max(TACOTRON_LOG_FLOOR) * TACOTRON_COMPRESSION).ln(),
        }
    }
}

impl FromStr for MelMethod {
    type Err = PrepError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "original" => Ok(MelMethod::Original),
            "tacotron" => Ok(MelMethod::Tacotron),
            other => Err(PrepError::invalid_argument(format!(
                "Unknown mel method {:?} (expected original or tacotron)", other
            ))),
        }
    }
}

impl fmt::Display for MelMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Mel extractor with its FFT plan, window and filter bank built once.
///
/// Holds no per-call mutable state; share it across workers behind an `Arc`.
pub struct MelSpectrogramExtractor {
    fft_size: usize,
    hop_size: usize,
    num_mels: usize,
    fft: Arc<dyn Fft<f32>>,
    window: Vec<f32>,
    /// `[num_mels, fft_size / 2 + 1]`
    mel_basis: Array2<f32>,
}

impl fmt::Debug for MelSpectrogramExtractor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MelSpectrogramExtractor")
            .field("fft_size", &self.fft_size)
            .field("hop_size", &self.hop_size)
            .field("num_mels", &self.num_mels)
            .finish_non_exhaustive()
    }
}

impl MelSpectrogramExtractor {
    pub fn new(config: &FeatureConfig, sample_rate: u32) -> Self {
        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(config.fft_size);

        Self {
            fft_size: config.fft_size,
            hop_size: config.hop_size,
            num_mels: config.num_mels,
            fft,
            window: padded_hann_window(config.win_length, config.fft_size),
            mel_basis: slaney_mel_basis(
                config.num_mels,
                config.fft_size,
                sample_rate as f64,
                config.fmin as f64,
                config.fmax as f64,
            ),
        }
    }

    pub fn num_mels(&self) -> usize {
        self.num_mels
    }

    pub fn hop_size(&self) -> usize {
        self.hop_size
    }

    /// Frame count produced for a waveform of `len` samples.
    ///
    /// The padded signal is `len + 2 * (fft_size / 2)` long, which reduces
    /// to `1 + len / hop` for even FFT sizes.
    pub fn num_frames(&self, len: usize) -> usize {
        let padded = len + 2 * (self.fft_size / 2);
        1 + padded.saturating_sub(self.fft_size) / self.hop_size
    }

    /// Compute the `(frames, num_mels)` log-mel spectrogram.
    pub fn extract(&self, waveform: ArrayView1<f32>, method: MelMethod) -> Result<Array2<f32>> {
        if waveform.is_empty() {
            return Err(PrepError::invalid_argument("Cannot extract mel features from an empty waveform"));
        }

        let magnitude = self.magnitude_spectrogram(waveform);
        let mut mel = magnitude.dot(&self.mel_basis.t());
        mel.mapv_inplace(|v| method.compress(v));
        Ok(mel)
    }

    /// Like [`extract`](Self::extract) with the method given by name.
    pub fn extract_named(&self, waveform: ArrayView1<f32>, method: &str) -> Result<Array2<f32>> {
        self.extract(waveform, method.parse()?)
    }

    /// `(frames, fft_size / 2 + 1)` STFT magnitudes.
    fn magnitude_spectrogram(&self, waveform: ArrayView1<f32>) -> Array2<f32> {
        let len = waveform.len();
        let n_freqs = self.fft_size / 2 + 1;
        let num_frames = self.num_frames(len);
        let pad = (self.fft_size / 2) as isize;

        let mut magnitude = Array2::<f32>::zeros((num_frames, n_freqs));
        let mut buffer = vec![Complex::new(0.0f32, 0.0); self.fft_size];
        let mut scratch = vec![Complex::new(0.0f32, 0.0); self.fft.get_inplace_scratch_len()];

        for (t, mut row) in magnitude.rows_mut().into_iter().enumerate() {
            let start = (t * self.hop_size) as isize - pad;
            for (i, slot) in buffer.iter_mut().enumerate() {
                let idx = reflect_index(start + i as isize, len);
                *slot = Complex::new(waveform[idx] * self.window[i], 0.0);
            }

            self.fft.process_with_scratch(&mut buffer, &mut scratch);

            for (out, c) in row.iter_mut().zip(buffer.iter()) {
                *out = c.norm();
            }
        }

        magnitude
    }
}

/// Map an out-of-range index back into `[0, len)` by mirroring around the
/// edge samples (edge samples are not repeated).
fn reflect_index(idx: isize, len: usize) -> usize {
    if len == 1 {
        return 0;
    }
    let period = 2 * (len as isize - 1);
    let folded = idx.rem_euclid(period);
    if folded >= len as isize {
        (period - folded) as usize
    } else {
        folded as usize
    }
}

/// Periodic Hann window of `win_length`, zero-padded to `fft_size` around the center.
fn padded_hann_window(win_length: usize, fft_size: usize) -> Vec<f32> {
    let offset = (fft_size - win_length) / 2;
    let mut window = vec![0.0f32; fft_size];
    for n in 0..win_length {
        let phase = 2.0 * std::f64::consts::PI * n as f64 / win_length as f64;
        window[offset + n] = (0.5 - 0.5 * phase.cos()) as f32;
    }
    window
}

fn hz_to_mel(hz: f64) -> f64 {
    const F_SP: f64 = 200.0 / 3.0;
    const MIN_LOG_HZ: f64 = 1000.0;
    const MIN_LOG_MEL: f64 = MIN_LOG_HZ / F_SP;
    let logstep = 6.4f64.ln() / 27.0;

    if hz >= MIN_LOG_HZ {
        MIN_LOG_MEL + (hz / MIN_LOG_HZ).ln() / logstep
    } else {
        hz / F_SP
    }
}

fn mel_to_hz(mel: f64) -> f64 {
    const F_SP: f64 = 200.0 / 3.0;
    const MIN_LOG_HZ: f64 = 1000.0;
    const MIN_LOG_MEL: f64 = MIN_LOG_HZ / F_SP;
    let logstep = 6.4f64.ln() / 27.0;

    if mel >= MIN_LOG_MEL {
        MIN_LOG_HZ * (logstep * (mel - MIN_LOG_MEL)).exp()
    } else {
        F_SP * mel
    }
}

/// `num_mels + 2` band edges evenly spaced on the mel scale.
fn mel_band_edges(num_mels: usize, fmin: f64, fmax: f64) -> Vec<f64> {
    let mel_min = hz_to_mel(fmin);
    let mel_max = hz_to_mel(fmax);
    (0..num_mels + 2)
        .map(|i| mel_to_hz(mel_min + (mel_max - mel_min) * i as f64 / (num_mels + 1) as f64))
        .collect()
}

/// Triangular Slaney-scale filters with area (Slaney) normalisation.
fn slaney_mel_basis(num_mels: usize, fft_size: usize, sample_rate: f64, fmin: f64, fmax: f64) -> Array2<f32> {
    let n_freqs = fft_size / 2 + 1;
    let edges = mel_band_edges(num_mels, fmin, fmax);

    Array2::from_shape_fn((num_mels, n_freqs), |(m, k)| {
        let freq = k as f64 * sample_rate / fft_size as f64;
        let (left, center, right) = (edges[m], edges[m + 1], edges[m + 2]);
        let lower = (freq - left) / (center - left);
        let upper = (right - freq) / (right - center);
        let enorm = 2.0 / (right - left);
        (lower.min(upper).max(0.0) * enorm) as f32
    })
}
