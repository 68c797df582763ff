//! Waveform / mel time-resolution alignment

use ndarray::{concatenate, s, Array1, ArrayView1, Axis};

use crate::error::{PrepError, Result};
use crate::processing::quantize::{QuantizedWaveform, SilenceValue};

/// Pads and truncates an encoded waveform to exactly `frames * hop_size`
/// samples so the vocoder can upsample mel frames by the hop size.
#[derive(Debug, Clone, Copy)]
pub struct AlignmentPadder {
    fft_size: usize,
    hop_size: usize,
}

impl AlignmentPadder {
    pub fn new(fft_size: usize, hop_size: usize) -> Self {
        Self { fft_size, hop_size }
    }

    pub fn hop_size(&self) -> usize {
        self.hop_size
    }

    /// Left/right pad in samples.
    ///
    /// Centered STFT frames start at sample 0, so nothing is added on the
    /// left; one FFT window on the right covers the last frame's extent.
    pub fn pad_amounts(&self) -> (usize, usize) {
        (0, self.fft_size)
    }

    pub fn align(&self, waveform: &QuantizedWaveform, silence: SilenceValue, frames: usize) -> Result<QuantizedWaveform> {
        match (waveform, silence) {
            (QuantizedWaveform::Codes(codes), SilenceValue::Code(value)) => {
                Ok(QuantizedWaveform::Codes(self.align_samples(codes.view(), value, frames)?))
            }
            (QuantizedWaveform::Samples(samples), SilenceValue::Amplitude(value)) => {
                Ok(QuantizedWaveform::Samples(self.align_samples(samples.view(), value, frames)?))
            }
            (waveform, silence) => Err(PrepError::alignment(format!(
                "Silence value {:?} does not match {} waveform", silence, waveform.dtype()
            ))),
        }
    }

    fn align_samples<T: Copy>(&self, samples: ArrayView1<T>, silence: T, frames: usize) -> Result<Array1<T>> {
        let (left, right) = self.pad_amounts();
        let target = frames * self.hop_size;

        let padded = if left > 0 || right > 0 {
            let head = Array1::from_elem(left, silence);
            let tail = Array1::from_elem(right, silence);
            concatenate(Axis(0), &[head.view(), samples.view(), tail.view()])
                .map_err(|e| PrepError::alignment(format!("Failed to pad waveform: {}", e)))?
        } else {
            samples.to_owned()
        };

        if padded.len() < target {
            return Err(PrepError::alignment(format!(
                "Padded waveform has {} samples, {} frames x hop {} need {}",
                padded.len(), frames, self.hop_size, target
            )));
        }

        let aligned = padded.slice(s![..target]).to_owned();
        debug_assert_eq!(aligned.len() % self.hop_size, 0);
        Ok(aligned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_align_matches_frame_count() {
        let padder = AlignmentPadder::new(1024, 256);
        let len = 32000;
        let frames = 1 + len / 256;
        let wav = QuantizedWaveform::Samples(Array1::from_elem(len, 0.25f32));

        let aligned = padder.align(&wav, SilenceValue::Amplitude(0.0), frames).unwrap();
        assert_eq!(aligned.len(), frames * 256);
        assert_eq!(aligned.len() % 256, 0);
        match aligned {
            QuantizedWaveform::Samples(samples) => {
                assert_eq!(samples[0], 0.25);
                assert_eq!(samples[len - 1], 0.25);
                assert_eq!(samples[len], 0.0);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_codes_padded_with_zero_code() {
        let padder = AlignmentPadder::new(1024, 256);
        let wav = QuantizedWaveform::Codes(Array1::from_elem(300, 200i16));
        let aligned = padder.align(&wav, SilenceValue::Code(127), 2).unwrap();
        match aligned {
            QuantizedWaveform::Codes(codes) => {
                assert_eq!(codes.len(), 512);
                assert_eq!(codes[299], 200);
                assert_eq!(codes[300], 127);
                assert_eq!(codes[511], 127);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_align_borrowed_strided_view() {
        let padder = AlignmentPadder::new(8, 4);
        let source = Array1::from_shape_fn(10, |i| i as f32);
        let aligned = padder.align_samples(source.slice(s![..;2]), -1.0, 2).unwrap();
        assert_eq!(aligned, Array1::from(vec![0.0, 2.0, 4.0, 6.0, 8.0, -1.0, -1.0, -1.0]));
    }

    #[test]
    fn test_truncates_long_input() {
        let padder = AlignmentPadder::new(1024, 256);
        let wav = QuantizedWaveform::Samples(Array1::from_elem(5000, 0.1f32));
        let aligned = padder.align(&wav, SilenceValue::Amplitude(0.0), 3).unwrap();
        assert_eq!(aligned.len(), 768);
    }

    #[test]
    fn test_too_short_is_hard_failure() {
        let padder = AlignmentPadder::new(1024, 256);
        let wav = QuantizedWaveform::Samples(Array1::from_elem(100, 0.1f32));
        let err = padder.align(&wav, SilenceValue::Amplitude(0.0), 10).unwrap_err();
        assert!(matches!(err, PrepError::Alignment { .. }));
    }

    #[test]
    fn test_dtype_mismatch_is_hard_failure() {
        let padder = AlignmentPadder::new(1024, 256);
        let wav = QuantizedWaveform::Codes(Array1::from_elem(512, 1i16));
        let err = padder.align(&wav, SilenceValue::Amplitude(0.0), 1).unwrap_err();
        assert!(matches!(err, PrepError::Alignment { .. }));
    }
}
