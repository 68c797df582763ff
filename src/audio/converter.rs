//! Sample rate conversion

use ndarray::{Array1, ArrayView1};
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use crate::error::{PrepError, Result};

/// Input frames fed to the resampler per call.
const RESAMPLE_CHUNK: usize = 1024;

pub struct AudioConverter;

impl AudioConverter {
    /// Band-limited sinc resampling.
    ///
    /// The anti-alias cutoff sits at 0.95 of the lower Nyquist rate. Output
    /// is delay-compensated and holds `ceil(len * target / source)` samples.
    pub fn resample(data: ArrayView1<f32>, source_rate: u32, target_rate: u32) -> Result<Array1<f32>> {
        if source_rate == 0 || target_rate == 0 {
            return Err(PrepError::audio("Sample rates must be greater than 0"));
        }
        if source_rate == target_rate {
            return Ok(data.to_owned());
        }
        if data.is_empty() {
            return Err(PrepError::audio("Input data is empty"));
        }

        let ratio = target_rate as f64 / source_rate as f64;
        let expected = (data.len() as f64 * ratio).ceil() as usize;

        let params = SincInterpolationParameters {
            sinc_len: 256,
            f_cutoff: 0.95,
            interpolation: SincInterpolationType::Linear,
            oversampling_factor: 256,
            window: WindowFunction::BlackmanHarris2,
        };
        let mut resampler = SincFixedIn::<f32>::new(ratio, 1.0, params, RESAMPLE_CHUNK, 1)
            .map_err(|e| PrepError::audio(format!("Failed to create resampler: {}", e)))?;
        let delay = resampler.output_delay();

        let input = data.to_vec();
        let mut output = Vec::with_capacity(expected + delay + RESAMPLE_CHUNK);
        let mut chunk = vec![0.0f32; RESAMPLE_CHUNK];
        let mut pos = 0;

        // zero chunks past the end flush the filter tail
        while output.len() < delay + expected {
            chunk.fill(0.0);
            if pos < input.len() {
                let end = (pos + RESAMPLE_CHUNK).min(input.len());
                chunk[..end - pos].copy_from_slice(&input[pos..end]);
            }
            pos += RESAMPLE_CHUNK;

            let resampled = resampler
                .process(&[chunk.as_slice()], None)
                .map_err(|e| PrepError::audio(format!("Resampling failed: {}", e)))?;
            output.extend_from_slice(&resampled[0]);
        }

        Ok(Array1::from(output[delay..delay + expected].to_vec()))
    }
}
