//! WAV loading and the mono utterance it produces

use std::fs::File;
use std::path::{Path, PathBuf};
use hound::{SampleFormat, WavReader, WavWriter};
use ndarray::{Array1, Array2, Axis};
use crate::audio::AudioConverter;
use crate::error::{PrepError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    Int16,
    Int24,
    Int32,
    Float32,
}

impl AudioFormat {
    fn from_spec(spec: &hound::WavSpec) -> Result<Self> {
        match (spec.sample_format, spec.bits_per_sample) {
            (SampleFormat::Int, 8 | 16) => Ok(AudioFormat::Int16),
            (SampleFormat::Int, 24) => Ok(AudioFormat::Int24),
            (SampleFormat::Int, 32) => Ok(AudioFormat::Int32),
            (SampleFormat::Float, 32) => Ok(AudioFormat::Float32),
            (format, bits) => Err(PrepError::audio(format!(
                "Unsupported sample format: {:?} at {} bits", format, bits
            ))),
        }
    }

    pub fn bits_per_sample(&self) -> u16 {
        match self {
            AudioFormat::Int16 => 16,
            AudioFormat::Int24 => 24,
            AudioFormat::Int32 | AudioFormat::Float32 => 32,
        }
    }

    fn to_sample_format(self) -> SampleFormat {
        match self {
            AudioFormat::Float32 => SampleFormat::Float,
            _ => SampleFormat::Int,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AudioHeader {
    pub sample_rate: u32,
    pub channels: u16,
    pub format: AudioFormat,
}

#[derive(Debug, Clone)]
pub enum AudioData {
    Mono(Array1<f32>),
    /// Interleaved frames, one column per channel.
    Multi(Array2<f32>),
}

impl AudioData {
    pub fn len(&self) -> usize {
        match self {
            AudioData::Mono(data) => data.len(),
            AudioData::Multi(data) => data.nrows(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Downmix by averaging channels.
    pub fn to_mono(&self) -> Array1<f32> {
        match self {
            AudioData::Mono(data) => data.clone(),
            AudioData::Multi(data) => data
                .mean_axis(Axis(1))
                .unwrap_or_else(|| Array1::zeros(data.nrows())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct WavAudio {
    pub header: AudioHeader,
    pub data: AudioData,
}

impl WavAudio {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let file = File::open(path).map_err(|e| PrepError::Audio {
            message: format!("Cannot open audio file {}: {}", path.display(), e),
        })?;

        let mut reader = WavReader::new(std::io::BufReader::new(file)).map_err(|e| PrepError::Audio {
            message: format!("Cannot create WAV reader for {}: {}", path.display(), e),
        })?;

        let spec = reader.spec();
        if spec.sample_rate == 0 {
            return Err(PrepError::audio("Invalid sample rate"));
        }
        if spec.channels == 0 {
            return Err(PrepError::audio("WAV file declares zero channels"));
        }
        let format = AudioFormat::from_spec(&spec)?;

        let samples: Vec<f32> = match spec.sample_format {
            SampleFormat::Float => reader
                .samples::<f32>()
                .collect::<std::result::Result<Vec<_>, _>>()
                .map_err(|e| PrepError::audio(format!("Failed to read sample: {}", e)))?,
            SampleFormat::Int => {
                let scale = (1u64 << (spec.bits_per_sample - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / scale))
                    .collect::<std::result::Result<Vec<_>, _>>()
                    .map_err(|e| PrepError::audio(format!("Failed to read sample: {}", e)))?
            }
        };

        let channels = spec.channels as usize;
        let data = if channels == 1 {
            AudioData::Mono(Array1::from(samples))
        } else {
            let frames = samples.len() / channels;
            let interleaved = Array2::from_shape_vec((frames, channels), samples[..frames * channels].to_vec())
                .map_err(|e| PrepError::audio(format!("Malformed interleaved data: {}", e)))?;
            AudioData::Multi(interleaved)
        };

        Ok(WavAudio {
            header: AudioHeader { sample_rate: spec.sample_rate, channels: spec.channels, format },
            data,
        })
    }

    pub fn new_mono(sample_rate: u32, data: Array1<f32>, format: AudioFormat) -> Self {
        WavAudio {
            header: AudioHeader { sample_rate, channels: 1, format },
            data: AudioData::Mono(data),
        }
    }

    /// Write PCM or float WAV in the header format. Samples are clamped to [-1, 1].
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let spec = hound::WavSpec {
            channels: self.header.channels,
            sample_rate: self.header.sample_rate,
            bits_per_sample: self.header.format.bits_per_sample(),
            sample_format: self.header.format.to_sample_format(),
        };
        let mut writer = WavWriter::create(path, spec).map_err(|e| PrepError::Audio {
            message: format!("Cannot create output file {}: {}", path.display(), e),
        })?;

        let samples: Box<dyn Iterator<Item = f32> + '_> = match &self.data {
            AudioData::Mono(data) => Box::new(data.iter().copied()),
            AudioData::Multi(data) => Box::new(data.iter().copied()),
        };
        let scale = ((1u64 << (spec.bits_per_sample - 1)) - 1) as f32;
        for sample in samples {
            let clamped = sample.clamp(-1.0, 1.0);
            match self.header.format {
                AudioFormat::Float32 => writer.write_sample(clamped)?,
                AudioFormat::Int16 => writer.write_sample((clamped * scale) as i16)?,
                AudioFormat::Int24 | AudioFormat::Int32 => writer.write_sample((clamped * scale) as i32)?,
            }
        }

        writer.finalize()?;
        Ok(())
    }

    pub fn sample_rate(&self) -> u32 {
        self.header.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.header.channels
    }
}

/// A loaded recording: mono samples at the pipeline sample rate.
#[derive(Debug, Clone)]
pub struct Utterance {
    pub path: PathBuf,
    pub samples: Array1<f32>,
    pub sample_rate: u32,
}

impl Utterance {
    /// Load `path`, downmix to mono and resample to `sample_rate`.
    pub fn load<P: AsRef<Path>>(path: P, sample_rate: u32) -> Result<Self> {
        let path = path.as_ref();
        let audio = WavAudio::from_file(path)?;
        let source_rate = audio.sample_rate();
        let mono = audio.data.to_mono();

        let samples = if source_rate == sample_rate {
            mono
        } else {
            log::debug!("Resampling {} from {} Hz to {} Hz", path.display(), source_rate, sample_rate);
            AudioConverter::resample(mono.view(), source_rate, sample_rate)?
        };

        Ok(Self { path: path.to_path_buf(), samples, sample_rate })
    }

    pub fn duration(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}
