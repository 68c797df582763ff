//! Leading/trailing silence removal

use ndarray::{s, Array1, ArrayView1};
use crate::config::AudioConfig;

const AMIN: f64 = 1e-10;

/// Energy-threshold trimmer.
///
/// Frames are centered (zero-padded by `frame_length / 2`) and spaced by
/// `hop_length`. A frame is kept when its mean-square energy lies within
/// `top_db` of the loudest frame.
#[derive(Debug, Clone)]
pub struct SilenceTrimmer {
    top_db: f32,
    frame_length: usize,
    hop_length: usize,
}

impl SilenceTrimmer {
    pub fn new(top_db: f32, frame_length: usize, hop_length: usize) -> Self {
        Self { top_db, frame_length, hop_length }
    }

    pub fn from_config(config: &AudioConfig) -> Self {
        Self::new(config.trim_top_db, config.trim_frame_length, config.trim_hop_length)
    }

    pub fn trim(&self, samples: ArrayView1<f32>) -> Array1<f32> {
        let (start, end) = self.nonsilent_bounds(samples);
        samples.slice(s![start..end]).to_owned()
    }

    /// Sample range `[start, end)` spanning the first through last loud frame.
    pub fn nonsilent_bounds(&self, samples: ArrayView1<f32>) -> (usize, usize) {
        let len = samples.len();
        if len == 0 {
            return (0, 0);
        }

        let energies = self.frame_energies(samples);
        let reference = energies.iter().cloned().fold(0.0f64, f64::max);
        let ref_db = 10.0 * reference.max(AMIN).log10();
        let threshold = -(self.top_db as f64);

        let loud = |e: &f64| 10.0 * e.max(AMIN).log10() - ref_db > threshold;
        let first = energies.iter().position(loud);
        let last = energies.iter().rposition(loud);

        match (first, last) {
            (Some(first), Some(last)) => {
                let start = (first * self.hop_length).min(len);
                let end = ((last + 1) * self.hop_length).min(len);
                (start, end)
            }
            _ => (0, 0),
        }
    }

    fn frame_energies(&self, samples: ArrayView1<f32>) -> Vec<f64> {
        let len = samples.len();
        let pad = self.frame_length / 2;
        let num_frames = 1 + len / self.hop_length;

        // prefix sums of x^2 over the unpadded signal
        let mut cumulative = Vec::with_capacity(len + 1);
        cumulative.push(0.0f64);
        let mut acc = 0.0f64;
        for &x in samples.iter() {
            acc += (x as f64) * (x as f64);
            cumulative.push(acc);
        }

        (0..num_frames)
            .map(|t| {
                let start = (t * self.hop_length).saturating_sub(pad).min(len);
                let end = (t * self.hop_length + self.frame_length - pad).min(len);
                (cumulative[end] - cumulative[start]) / self.frame_length as f64
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    fn trimmer() -> SilenceTrimmer {
        SilenceTrimmer::new(60.0, 2048, 512)
    }

    #[test]
    fn test_trims_leading_and_trailing_silence() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut samples = vec![0.0f32; 8192];
        samples.extend((0..16384).map(|_| rng.gen_range(-0.5f32..0.5)));
        samples.extend(vec![0.0f32; 8192]);
        let samples = Array1::from(samples);

        let (start, end) = trimmer().nonsilent_bounds(samples.view());
        // centered frames reach up to half a frame into the silence
        assert!(start <= 8192 && start >= 8192 - 1024, "start {}", start);
        assert!(end >= 8192 + 16384 && end <= 8192 + 16384 + 1024 + 512, "end {}", end);
        assert_eq!(start % 512, 0);

        let trimmed = trimmer().trim(samples.view());
        assert_eq!(trimmed.len(), end - start);
    }

    #[test]
    fn test_keeps_signal_without_silence() {
        let samples = Array1::from_shape_fn(10000, |i| (i as f32 * 0.05).sin() * 0.3);
        let trimmed = trimmer().trim(samples.view());
        assert_eq!(trimmed.len(), samples.len());
    }

    #[test]
    fn test_quiet_tail_below_threshold_is_removed() {
        let mut samples: Vec<f32> = (0..8192).map(|i| (i as f32 * 0.1).sin() * 0.5).collect();
        samples.extend(vec![1e-5f32; 16384]);
        let samples = Array1::from(samples);

        let (_, end) = trimmer().nonsilent_bounds(samples.view());
        assert!(end < 8192 + 2048, "end {}", end);
    }

    #[test]
    fn test_empty_input() {
        let samples = Array1::<f32>::zeros(0);
        assert_eq!(trimmer().nonsilent_bounds(samples.view()), (0, 0));
    }
}
