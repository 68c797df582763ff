//! Per-utterance feature extraction and alignment

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ndarray::{Array1, Array2};

use crate::audio::{HighpassFilter, PostFilter, SilenceTrimmer, Utterance};
use crate::config::Config;
use crate::error::{PrepError, Result};
use crate::features::{MelMethod, MelSpectrogramExtractor};
use crate::processing::alignment::AlignmentPadder;
use crate::processing::quantize::WaveformQuantizer;
use crate::processing::speaker::SpeakerIdResolver;
use crate::processing::storage;

/// Transcript field written for every accepted utterance.
pub const TRANSCRIPT_PLACEHOLDER: &str = "dummy";

/// Metadata of one persisted (waveform, mel) pair.
#[derive(Debug, Clone, PartialEq)]
pub struct UtteranceRecord {
    pub wave_filename: String,
    pub mel_filename: String,
    pub frames: usize,
    pub text: String,
    pub speaker_id: u8,
}

/// An utterance skipped because its conditioned waveform clips.
#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    pub path: PathBuf,
    pub peak: f32,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} clips after gain (peak {:.4}), skipped", self.path.display(), self.peak)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProcessingResult {
    Accepted(UtteranceRecord),
    Rejected(Rejection),
}

impl ProcessingResult {
    pub fn is_sentinel(&self) -> bool {
        matches!(self, ProcessingResult::Rejected(_))
    }

    pub fn record(&self) -> Option<&UtteranceRecord> {
        match self {
            ProcessingResult::Accepted(record) => Some(record),
            ProcessingResult::Rejected(_) => None,
        }
    }

    pub fn wave_filename(&self) -> &str {
        self.record().map_or(TRANSCRIPT_PLACEHOLDER, |r| r.wave_filename.as_str())
    }

    pub fn mel_filename(&self) -> &str {
        self.record().map_or(TRANSCRIPT_PLACEHOLDER, |r| r.mel_filename.as_str())
    }

    /// Mel frame count, -1 for a rejected utterance.
    pub fn frame_count(&self) -> i64 {
        self.record().map_or(-1, |r| r.frames as i64)
    }

    pub fn text(&self) -> &str {
        self.record().map_or(TRANSCRIPT_PLACEHOLDER, |r| r.text.as_str())
    }

    pub fn speaker_id(&self) -> Option<u8> {
        self.record().map(|r| r.speaker_id)
    }
}

impl fmt::Display for ProcessingResult {
    /// `|`-joined fields; rejected utterances print as `dummy|dummy|-1|dummy`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessingResult::Accepted(r) => write!(
                f, "{}|{}|{}|{}|{}", r.wave_filename, r.mel_filename, r.frames, r.text, r.speaker_id
            ),
            ProcessingResult::Rejected(_) => write!(
                f, "{}|{}|{}|{}", self.wave_filename(), self.mel_filename(), self.frame_count(), self.text()
            ),
        }
    }
}

/// Turns one recording into an aligned waveform/mel pair on disk.
///
/// Holds only immutable state, so a single instance is shared by every
/// worker of the dataset pool.
#[derive(Debug)]
pub struct UtterancePipeline {
    sample_rate: u32,
    output_dir: PathBuf,
    trimmer: SilenceTrimmer,
    highpass: Option<HighpassFilter>,
    extractor: Arc<MelSpectrogramExtractor>,
    mel_method: MelMethod,
    global_gain_scale: f32,
    post_filter: Option<PostFilter>,
    quantizer: WaveformQuantizer,
    padder: AlignmentPadder,
    resolver: SpeakerIdResolver,
}

impl UtterancePipeline {
    pub fn new(config: &Config, extractor: Arc<MelSpectrogramExtractor>) -> Result<Self> {
        let highpass = if config.audio.highpass_cutoff > 0.0 {
            Some(HighpassFilter::new(config.sample_rate(), config.audio.highpass_cutoff)?)
        } else {
            None
        };

        std::fs::create_dir_all(&config.output_dir).map_err(|e| {
            PrepError::io(format!("Cannot create output dir {}: {}", config.output_dir.display(), e))
        })?;

        Ok(Self {
            sample_rate: config.sample_rate(),
            output_dir: config.output_dir.clone(),
            trimmer: SilenceTrimmer::from_config(&config.audio),
            highpass,
            extractor,
            mel_method: config.features.mel_method,
            global_gain_scale: config.waveform.global_gain_scale,
            post_filter: config.post_filter()?,
            quantizer: WaveformQuantizer::from_config(&config.waveform),
            padder: AlignmentPadder::new(config.fft_size(), config.hop_size()),
            resolver: SpeakerIdResolver::new(),
        })
    }

    /// Build the pipeline with a freshly planned extractor.
    pub fn from_config(config: &Config) -> Result<Self> {
        let extractor = MelSpectrogramExtractor::new(&config.features, config.sample_rate());
        Self::new(config, Arc::new(extractor))
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn process<P: AsRef<Path>>(&self, path: P) -> Result<ProcessingResult> {
        let path = path.as_ref();
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .ok_or_else(|| PrepError::invalid_argument(format!("No file name in {}", path.display())))?;

        let utterance = Utterance::load(path, self.sample_rate)?;
        log::debug!("{}: {:.2}s loaded", path.display(), utterance.duration());

        let wav = self.condition(utterance.samples)?;
        let mel = self.extractor.extract(wav.view(), self.mel_method)?;
        let wav = self.shape_target(wav);

        let peak = wav.iter().fold(0.0f32, |acc, x| acc.max(x.abs()));
        if peak > 1.0 {
            return Ok(ProcessingResult::Rejected(Rejection { path: path.to_path_buf(), peak }));
        }

        let frames = mel.nrows();
        let encoded = self.quantizer.encode(wav.view());
        let aligned = self.padder.align(&encoded, self.quantizer.silence(), frames)?;
        debug_assert_eq!(aligned.len(), frames * self.padder.hop_size());

        let record = self.persist(&stem, &aligned, &mel)?;
        log::debug!("{}: {} frames -> {}", path.display(), frames, record.mel_filename);
        Ok(ProcessingResult::Accepted(record))
    }

    /// Trim, low-cut, quantized-domain trim and clamp: the signal the mel
    /// spectrogram is computed from.
    fn condition(&self, samples: Array1<f32>) -> Result<Array1<f32>> {
        let mut wav = self.trimmer.trim(samples.view());
        if let Some(filter) = &self.highpass {
            wav = filter.apply(wav.view());
        }
        wav = self.quantizer.trim_silence(wav.view())?;
        wav.mapv_inplace(|x| x.clamp(-1.0, 1.0));
        Ok(wav)
    }

    /// Gain and post-filter, applied after mel extraction.
    fn shape_target(&self, mut wav: Array1<f32>) -> Array1<f32> {
        if self.global_gain_scale > 0.0 {
            wav *= self.global_gain_scale;
        }
        match &self.post_filter {
            Some(filter) => filter.apply(wav.view()),
            None => wav,
        }
    }

    fn persist(
        &self,
        stem: &str,
        waveform: &crate::processing::QuantizedWaveform,
        mel: &Array2<f32>,
    ) -> Result<UtteranceRecord> {
        let wave_filename = storage::wave_filename(stem);
        let mel_filename = storage::mel_filename(stem);
        storage::save_waveform(self.output_dir.join(&wave_filename), waveform)?;
        storage::save_mel(self.output_dir.join(&mel_filename), mel)?;

        let speaker_id = self.resolver.resolve(&wave_filename)?;

        Ok(UtteranceRecord {
            wave_filename,
            mel_filename,
            frames: mel.nrows(),
            text: TRANSCRIPT_PLACEHOLDER.to_string(),
            speaker_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{AudioFormat, WavAudio};
    use crate::processing::InputType;
    use std::f32::consts::PI;
    use tempfile::TempDir;

    fn test_config(dir: &TempDir) -> Config {
        let mut config = Config::default();
        config.audio.sample_rate = 16000;
        config.output_dir = dir.path().join("dump");
        config
    }

    fn write_sine(dir: &Path, name: &str, amplitude: f32, seconds: f32) -> PathBuf {
        let sr = 16000;
        let n = (sr as f32 * seconds) as usize;
        let data = Array1::from_shape_fn(n, |i| amplitude * (2.0 * PI * 440.0 * i as f32 / sr as f32).sin());
        let path = dir.join(name);
        WavAudio::new_mono(sr, data, AudioFormat::Float32).save_to_file(&path).unwrap();
        path
    }

    #[test]
    fn test_sine_produces_aligned_pair() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        let input = write_sine(dir.path(), "spk_01m_utt001.wav", 0.5, 2.0);

        let pipeline = UtterancePipeline::from_config(&config).unwrap();
        let result = pipeline.process(&input).unwrap();
        let record = result.record().cloned().unwrap();

        assert_eq!(record.wave_filename, "spk_01m_utt001-wave.npy");
        assert_eq!(record.mel_filename, "spk_01m_utt001-feats.npy");
        assert_eq!(record.text, TRANSCRIPT_PLACEHOLDER);
        assert_eq!(record.speaker_id, 0);

        let (mel_header, _) = storage::read_npy::<_, f32>(config.output_dir.join(&record.mel_filename)).unwrap();
        assert_eq!(mel_header.shape, vec![record.frames, 80]);

        let (wave_header, wave) = storage::read_npy::<_, f32>(config.output_dir.join(&record.wave_filename)).unwrap();
        assert_eq!(wave_header.shape, vec![record.frames * 256]);
        assert_eq!(wave.len() % 256, 0);
        assert!(wave.iter().all(|x| x.abs() <= 1.0));
    }

    #[test]
    fn test_clipping_gives_sentinel_without_files() {
        let dir = TempDir::new().unwrap();
        let mut config = test_config(&dir);
        config.waveform.global_gain_scale = 1.5;
        let input = write_sine(dir.path(), "spk_02n_utt004.wav", 0.9, 1.0);

        let pipeline = UtterancePipeline::from_config(&config).unwrap();
        let result = pipeline.process(&input).unwrap();

        assert!(result.is_sentinel());
        assert_eq!(result.wave_filename(), "dummy");
        assert_eq!(result.mel_filename(), "dummy");
        assert_eq!(result.frame_count(), -1);
        assert_eq!(result.text(), "dummy");
        assert_eq!(result.to_string(), "dummy|dummy|-1|dummy");
        match &result {
            ProcessingResult::Rejected(rejection) => assert!(rejection.peak > 1.0),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(std::fs::read_dir(&config.output_dir).unwrap().count(), 0);
    }

    #[test]
    fn test_mulaw_quantize_writes_int16_codes() {
        let dir = TempDir::new().unwrap();
        let mut config = test_config(&dir);
        config.waveform.input_type = InputType::MulawQuantize;
        config.waveform.quantize_channels = 256;
        config.features.mel_method = MelMethod::Tacotron;
        let input = write_sine(dir.path(), "spk_03n_utt001.wav", 0.5, 1.0);

        let pipeline = UtterancePipeline::from_config(&config).unwrap();
        let result = pipeline.process(&input).unwrap();
        assert_eq!(result.speaker_id(), Some(5));

        let (header, codes) =
            storage::read_npy::<_, i16>(config.output_dir.join(result.wave_filename())).unwrap();
        assert_eq!(header.descr, "<i2");
        assert_eq!(codes.len() as i64, result.frame_count() * 256);
        assert!(codes.iter().all(|c| (0..=255).contains(c)));
        // right padding carries the zero code
        assert_eq!(*codes.last().unwrap(), 127);
    }

    #[test]
    fn test_post_filter_applied() {
        let dir = TempDir::new().unwrap();
        let mut config = test_config(&dir);
        config.waveform.preprocess = "preemphasis".to_string();
        let input = write_sine(dir.path(), "spk_02m_utt010.wav", 0.5, 1.0);

        let pipeline = UtterancePipeline::from_config(&config).unwrap();
        let result = pipeline.process(&input).unwrap();
        assert_eq!(result.speaker_id(), Some(1));
        assert!(result.to_string().starts_with("spk_02m_utt010-wave.npy|spk_02m_utt010-feats.npy|"));
    }

    #[test]
    fn test_unknown_speaker_is_hard_failure() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        let input = write_sine(dir.path(), "spk_09x_utt002.wav", 0.5, 1.0);

        let pipeline = UtterancePipeline::from_config(&config).unwrap();
        let err = pipeline.process(&input).unwrap_err();
        assert!(matches!(err, PrepError::UnknownSpeaker { .. }));
    }

    #[test]
    fn test_missing_file_is_hard_failure() {
        let dir = TempDir::new().unwrap();
        let config = test_config(&dir);
        let pipeline = UtterancePipeline::from_config(&config).unwrap();
        assert!(pipeline.process(dir.path().join("spk_01m_missing.wav")).is_err());
    }
}
