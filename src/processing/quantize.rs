//! Waveform target encodings (raw, mu-law, quantized mu-law)

use std::fmt;
use std::str::FromStr;

use ndarray::{s, Array1, ArrayView1};
use serde::{Deserialize, Serialize};

use crate::config::WaveformConfig;
use crate::error::{PrepError, Result};

/// Domain the vocoder is trained to predict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputType {
    #[serde(rename = "raw")]
    Raw,
    #[serde(rename = "mulaw")]
    Mulaw,
    #[serde(rename = "mulaw-quantize")]
    MulawQuantize,
}

impl InputType {
    pub fn name(&self) -> &'static str {
        match self {
            InputType::Raw => "raw",
            InputType::Mulaw => "mulaw",
            InputType::MulawQuantize => "mulaw-quantize",
        }
    }
}

impl FromStr for InputType {
    type Err = PrepError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "raw" => Ok(InputType::Raw),
            "mulaw" => Ok(InputType::Mulaw),
            "mulaw-quantize" => Ok(InputType::MulawQuantize),
            other => Err(PrepError::invalid_argument(format!(
                "Unknown input type {:?} (expected raw, mulaw or mulaw-quantize)", other
            ))),
        }
    }
}

impl fmt::Display for InputType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Encoded waveform in its persisted dtype.
#[derive(Debug, Clone, PartialEq)]
pub enum QuantizedWaveform {
    Codes(Array1<i16>),
    Samples(Array1<f32>),
}

impl QuantizedWaveform {
    pub fn len(&self) -> usize {
        match self {
            QuantizedWaveform::Codes(codes) => codes.len(),
            QuantizedWaveform::Samples(samples) => samples.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dtype(&self) -> &'static str {
        match self {
            QuantizedWaveform::Codes(_) => "int16",
            QuantizedWaveform::Samples(_) => "float32",
        }
    }
}

/// Padding value matching a [`QuantizedWaveform`] variant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SilenceValue {
    Code(i16),
    Amplitude(f32),
}

/// mu-law companding of `x` in [-1, 1].
pub fn mulaw(x: f32, mu: f32) -> f32 {
    let x = x as f64;
    let mu = mu as f64;
    (x.signum() * (1.0 + mu * x.abs()).ln() / (1.0 + mu).ln()) as f32
}

pub fn inv_mulaw(y: f32, mu: f32) -> f32 {
    let y = y as f64;
    let mu = mu as f64;
    (y.signum() * ((1.0 + mu).powf(y.abs()) - 1.0) / mu) as f32
}

/// Companded value scaled from [-1, 1] to an integer code in [0, mu].
pub fn mulaw_quantize(x: f32, mu: f32) -> i32 {
    let y = mulaw(x, mu) as f64;
    ((y + 1.0) / 2.0 * mu as f64).floor() as i32
}

pub fn inv_mulaw_quantize(code: i32, mu: f32) -> f32 {
    let y = 2.0 * code as f64 / mu as f64 - 1.0;
    inv_mulaw(y as f32, mu)
}

#[derive(Debug, Clone)]
pub struct WaveformQuantizer {
    input_type: InputType,
    mu: f32,
    silence_threshold: u32,
}

impl WaveformQuantizer {
    pub fn new(input_type: InputType, quantize_channels: usize, silence_threshold: u32) -> Self {
        Self {
            input_type,
            mu: (quantize_channels - 1) as f32,
            silence_threshold,
        }
    }

    pub fn from_config(config: &WaveformConfig) -> Self {
        Self::new(config.input_type, config.quantize_channels, config.silence_threshold)
    }

    pub fn input_type(&self) -> InputType {
        self.input_type
    }

    pub fn mu(&self) -> f32 {
        self.mu
    }

    pub fn zero_code(&self) -> i16 {
        mulaw_quantize(0.0, self.mu) as i16
    }

    /// Value used to pad the encoded waveform.
    pub fn silence(&self) -> SilenceValue {
        match self.input_type {
            InputType::MulawQuantize => SilenceValue::Code(self.zero_code()),
            InputType::Mulaw => SilenceValue::Amplitude(mulaw(0.0, self.mu)),
            InputType::Raw => SilenceValue::Amplitude(0.0),
        }
    }

    pub fn encode(&self, wav: ArrayView1<f32>) -> QuantizedWaveform {
        match self.input_type {
            InputType::MulawQuantize => {
                QuantizedWaveform::Codes(wav.mapv(|x| mulaw_quantize(x, self.mu) as i16))
            }
            InputType::Mulaw => QuantizedWaveform::Samples(wav.mapv(|x| mulaw(x, self.mu))),
            InputType::Raw => QuantizedWaveform::Samples(wav.to_owned()),
        }
    }

    /// Cut leading/trailing samples whose quantized code stays within
    /// `silence_threshold` of the zero code.
    ///
    /// The kept range is `[first loud, last loud)`; the last loud sample is
    /// dropped.
    ///
    /// Only active for mulaw-quantize with a threshold above 0; otherwise the
    /// waveform is returned unchanged.
    pub fn trim_silence(&self, wav: ArrayView1<f32>) -> Result<Array1<f32>> {
        if self.silence_threshold == 0 || self.input_type != InputType::MulawQuantize {
            return Ok(wav.to_owned());
        }

        let zero = self.zero_code() as i32;
        let threshold = self.silence_threshold as i32;
        let loud = |x: &f32| (mulaw_quantize(*x, self.mu) - zero).abs() > threshold;

        match (wav.iter().position(loud), wav.iter().rposition(loud)) {
            (Some(start), Some(end)) if start < end => Ok(wav.slice(s![start..end]).to_owned()),
            _ => Err(PrepError::processing(format!(
                "Quantized silence trim at threshold {} leaves no samples", self.silence_threshold
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_type_parsing() {
        assert_eq!("mulaw-quantize".parse::<InputType>().unwrap(), InputType::MulawQuantize);
        assert_eq!("raw".parse::<InputType>().unwrap(), InputType::Raw);
        assert!(matches!(
            "linear".parse::<InputType>(),
            Err(PrepError::InvalidArgument { .. })
        ));
    }

    #[test]
    fn test_mulaw_endpoints() {
        let mu = 255.0;
        assert_eq!(mulaw(0.0, mu), 0.0);
        assert!((mulaw(1.0, mu) - 1.0).abs() < 1e-6);
        assert!((mulaw(-1.0, mu) + 1.0).abs() < 1e-6);
        assert_eq!(mulaw_quantize(-1.0, mu), 0);
        assert_eq!(mulaw_quantize(1.0, mu), 255);
        assert_eq!(mulaw_quantize(0.0, mu), 127);
    }

    #[test]
    fn test_quantize_roundtrip_within_companding_error() {
        let mu = 255.0f32;
        // one code step in the companded domain is 2/mu wide
        let step = (1.0 + mu as f64).powf(2.0 / mu as f64) - 1.0;
        for i in -1000..=1000 {
            let x = i as f32 / 1000.0;
            let code = mulaw_quantize(x, mu);
            assert!((0..=255).contains(&code));
            let restored = inv_mulaw_quantize(code, mu) as f64;
            let bound = step * (x.abs() as f64 + 2.0 / mu as f64) + 1e-6;
            assert!((restored - x as f64).abs() <= bound, "x={} restored={}", x, restored);
        }
    }

    #[test]
    fn test_mulaw_inverse() {
        let mu = 65535.0;
        for x in [-0.9f32, -0.1, 0.0, 0.001, 0.5, 1.0] {
            assert!((inv_mulaw(mulaw(x, mu), mu) - x).abs() < 1e-4);
        }
    }

    #[test]
    fn test_encode_dtypes_and_silence() {
        let wav = Array1::from(vec![0.0f32, 0.5, -0.5]);

        let q = WaveformQuantizer::new(InputType::MulawQuantize, 256, 0);
        let encoded = q.encode(wav.view());
        assert_eq!(encoded.dtype(), "int16");
        assert_eq!(q.silence(), SilenceValue::Code(127));
        match encoded {
            QuantizedWaveform::Codes(codes) => assert_eq!(codes[0], 127),
            other => panic!("unexpected {:?}", other),
        }

        let m = WaveformQuantizer::new(InputType::Mulaw, 256, 0);
        assert_eq!(m.encode(wav.view()).dtype(), "float32");
        assert_eq!(m.silence(), SilenceValue::Amplitude(0.0));

        let r = WaveformQuantizer::new(InputType::Raw, 65536, 0);
        assert_eq!(r.encode(wav.view()), QuantizedWaveform::Samples(wav.clone()));
        assert_eq!(r.silence(), SilenceValue::Amplitude(0.0));
    }

    #[test]
    fn test_silence_trim_hook_inert_by_default() {
        let wav = Array1::from(vec![0.0f32, 0.0, 0.5, 0.0]);
        let q = WaveformQuantizer::new(InputType::MulawQuantize, 256, 0);
        assert_eq!(q.trim_silence(wav.view()).unwrap(), wav);
    }

    #[test]
    fn test_silence_trim_hook_when_enabled() {
        let wav = Array1::from(vec![0.0f32, 0.0001, 0.5, -0.3, 0.0002, 0.0]);
        let q = WaveformQuantizer::new(InputType::MulawQuantize, 256, 2);
        let trimmed = q.trim_silence(wav.view()).unwrap();
        assert_eq!(trimmed, Array1::from(vec![0.5f32]));

        let burst = Array1::from(vec![0.0f32, 0.4, 0.0, 0.0, -0.6, 0.7, 0.0]);
        assert_eq!(
            q.trim_silence(burst.view()).unwrap(),
            Array1::from(vec![0.4f32, 0.0, 0.0, -0.6])
        );

        // a single loud sample leaves nothing
        let click = Array1::from(vec![0.0f32, 0.9, 0.0]);
        assert!(q.trim_silence(click.view()).is_err());

        let silent = Array1::from(vec![0.0f32; 16]);
        assert!(q.trim_silence(silent.view()).is_err());

        // other modes ignore the threshold
        let raw = WaveformQuantizer::new(InputType::Raw, 256, 2);
        assert_eq!(raw.trim_silence(silent.view()).unwrap().len(), 16);
    }
}
