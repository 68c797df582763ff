//! Configuration management for dataset preprocessing

use crate::audio::PostFilter;
use crate::error::{PrepError, Result};
use crate::features::MelMethod;
use crate::processing::InputType;
use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Immutable run configuration, threaded into every component constructor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Audio file extension matched during discovery, without the dot.
    pub extension: String,
    pub audio: AudioConfig,
    pub features: FeatureConfig,
    pub waveform: WaveformConfig,
    pub processing: ProcessingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub sample_rate: u32,
    /// Low-cut filter cutoff in Hz, 0 disables the filter.
    pub highpass_cutoff: f32,
    pub trim_top_db: f32,
    pub trim_frame_length: usize,
    pub trim_hop_length: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    pub fft_size: usize,
    pub hop_size: usize,
    pub win_length: usize,
    pub num_mels: usize,
    pub fmin: f32,
    pub fmax: f32,
    pub mel_method: MelMethod,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WaveformConfig {
    pub input_type: InputType,
    pub quantize_channels: usize,
    /// Applied after mel extraction when > 0.
    pub global_gain_scale: f32,
    /// Post-filter registry key, "" or "none" to disable.
    pub preprocess: String,
    /// Quantized-domain silence trim threshold, 0 keeps the hook inert.
    pub silence_threshold: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    pub worker_pool_size: usize,
    pub verbose: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("./wavs"),
            output_dir: PathBuf::from("./dump"),
            extension: "wav".to_string(),
            audio: AudioConfig::default(),
            features: FeatureConfig::default(),
            waveform: WaveformConfig::default(),
            processing: ProcessingConfig::default(),
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 22050,
            highpass_cutoff: 70.0,
            trim_top_db: 60.0,
            trim_frame_length: 2048,
            trim_hop_length: 512,
        }
    }
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            fft_size: 1024,
            hop_size: 256,
            win_length: 1024,
            num_mels: 80,
            fmin: 125.0,
            fmax: 7600.0,
            mel_method: MelMethod::Original,
        }
    }
}

impl Default for WaveformConfig {
    fn default() -> Self {
        Self {
            input_type: InputType::Raw,
            quantize_channels: 65536,
            global_gain_scale: 0.55,
            preprocess: String::new(),
            silence_threshold: 0,
        }
    }
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            worker_pool_size: 1,
            verbose: false,
        }
    }
}

impl Config {
    /// Get sample rate (convenience method)
    pub fn sample_rate(&self) -> u32 {
        self.audio.sample_rate
    }

    /// Get hop size (convenience method)
    pub fn hop_size(&self) -> usize {
        self.features.hop_size
    }

    /// Get FFT size (convenience method)
    pub fn fft_size(&self) -> usize {
        self.features.fft_size
    }

    pub fn worker_pool_size(&self) -> usize {
        self.processing.worker_pool_size
    }

    pub fn verbose(&self) -> bool {
        self.processing.verbose
    }

    /// Resolve the configured post-filter against the registry.
    pub fn post_filter(&self) -> Result<Option<PostFilter>> {
        PostFilter::from_name(&self.waveform.preprocess)
    }
}

#[derive(Debug, Clone, Parser)]
#[command(name = "melprep", about = "Build waveform / mel-spectrogram pairs for vocoder training", version)]
pub struct Args {
    #[arg(short = 'i', long = "input-dir", help = "Directory scanned recursively for audio files")]
    pub input_dir: Option<PathBuf>,

    #[arg(short = 'o', long = "output-dir", help = "Directory receiving the -wave/-feats arrays")]
    pub output_dir: Option<PathBuf>,

    #[arg(short = 'c', long = "config", help = "Config file path (TOML format)")]
    pub config_file: Option<PathBuf>,

    #[arg(short = 'w', long = "workers", help = "Worker pool size")]
    pub workers: Option<usize>,

    #[arg(long = "mel-method", help = "Mel extraction method: original | tacotron")]
    pub mel_method: Option<MelMethod>,

    #[arg(long = "input-type", help = "Waveform target: raw | mulaw | mulaw-quantize")]
    pub input_type: Option<InputType>,

    #[arg(short = 'r', long = "sample-rate", help = "Target sample rate (Hz)")]
    pub sample_rate: Option<u32>,

    #[arg(long = "extension", help = "Audio file extension to match")]
    pub extension: Option<String>,

    #[arg(short = 'v', long = "verbose", help = "Enable verbose output mode")]
    pub verbose: bool,

    #[arg(long = "dump-config", help = "Write the default config as TOML to this path and exit")]
    pub dump_config: Option<PathBuf>,
}

impl Config {
    /// Create config from command line arguments and config file
    ///
    /// Flags given on the command line override values from the file.
    pub fn from_args_and_config(args: Args) -> Result<Self> {
        let mut config = if let Some(config_path) = &args.config_file {
            Self::from_file(config_path)?
        } else {
            Self::default()
        };

        if let Some(input_dir) = args.input_dir {
            config.input_dir = input_dir;
        }
        if let Some(output_dir) = args.output_dir {
            config.output_dir = output_dir;
        }
        if let Some(workers) = args.workers {
            config.processing.worker_pool_size = workers;
        }
        if let Some(method) = args.mel_method {
            config.features.mel_method = method;
        }
        if let Some(input_type) = args.input_type {
            config.waveform.input_type = input_type;
        }
        if let Some(sample_rate) = args.sample_rate {
            config.audio.sample_rate = sample_rate;
        }
        if let Some(extension) = args.extension {
            config.extension = extension;
        }
        config.processing.verbose |= args.verbose;

        config.validate()?;

        Ok(config)
    }

    /// Load config from TOML config file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| PrepError::config(format!("Failed to read config file: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| PrepError::config(format!("Failed to parse config file: {}", e)))
    }

    /// Validate configuration parameter validity
    pub fn validate(&self) -> Result<()> {
        let audio = &self.audio;
        if audio.sample_rate == 0 {
            return Err(PrepError::config("Sample rate must be greater than 0"));
        }
        if audio.sample_rate > 192000 {
            return Err(PrepError::config("Sample rate cannot exceed 192000 Hz"));
        }
        let nyquist = audio.sample_rate as f32 / 2.0;
        if !(0.0..nyquist).contains(&audio.highpass_cutoff) {
            return Err(PrepError::config(format!(
                "High-pass cutoff must be in [0, {}) Hz", nyquist
            )));
        }
        if audio.trim_top_db <= 0.0 {
            return Err(PrepError::config("Trim threshold (top_db) must be positive"));
        }
        if audio.trim_frame_length == 0 || audio.trim_hop_length == 0 {
            return Err(PrepError::config("Trim frame and hop length must be greater than 0"));
        }

        let features = &self.features;
        if features.fft_size == 0 || features.hop_size == 0 || features.win_length == 0 {
            return Err(PrepError::config("FFT size, hop size and window length must be greater than 0"));
        }
        if features.hop_size > features.fft_size {
            return Err(PrepError::config("Hop size cannot exceed FFT size"));
        }
        if features.win_length > features.fft_size {
            return Err(PrepError::config("Window length cannot exceed FFT size"));
        }
        if features.num_mels == 0 {
            return Err(PrepError::config("Mel channel count must be greater than 0"));
        }
        if features.fmin < 0.0 || features.fmax <= features.fmin {
            return Err(PrepError::config("Mel frequency range must satisfy 0 <= fmin < fmax"));
        }
        if features.fmax > nyquist {
            return Err(PrepError::config(format!("fmax cannot exceed Nyquist ({} Hz)", nyquist)));
        }

        let waveform = &self.waveform;
        if waveform.quantize_channels < 2 {
            return Err(PrepError::config("Quantize channels must be at least 2"));
        }
        if waveform.input_type == InputType::MulawQuantize && waveform.quantize_channels > 32768 {
            return Err(PrepError::config(
                "mulaw-quantize codes are stored as int16, quantize channels cannot exceed 32768",
            ));
        }
        if !waveform.global_gain_scale.is_finite() {
            return Err(PrepError::config("Global gain scale must be finite"));
        }
        self.post_filter()?;

        if self.processing.worker_pool_size == 0 {
            return Err(PrepError::config("Worker pool size must be greater than 0"));
        }
        if self.processing.worker_pool_size > utils::cpu_count() * 2 {
            log::warn!(
                "Worker pool size {} exceeds 2x logical CPU cores ({})",
                self.processing.worker_pool_size,
                utils::cpu_count()
            );
        }
        if self.extension.trim_start_matches('.').is_empty() {
            return Err(PrepError::config("Audio extension cannot be empty"));
        }

        Ok(())
    }

    /// Save config to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| PrepError::config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| PrepError::config(format!("Failed to write config file: {}", e)))
    }

    /// Create default config file
    pub fn create_default_config<P: AsRef<Path>>(path: P) -> Result<()> {
        Self::default().save_to_file(path)
    }
}

pub mod utils {
    pub fn cpu_count() -> usize {
        num_cpus::get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["melprep"];
        argv.extend_from_slice(extra);
        Args::parse_from(argv)
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.sample_rate(), 22050);
        assert_eq!(config.fft_size(), 1024);
        assert_eq!(config.hop_size(), 256);
        assert_eq!(config.features.num_mels, 80);
        assert_eq!(config.worker_pool_size(), 1);
        assert_eq!(config.waveform.silence_threshold, 0);
        assert_eq!(config.features.mel_method, MelMethod::Original);
        assert_eq!(config.waveform.input_type, InputType::Raw);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();

        config.audio.sample_rate = 0;
        assert!(config.validate().is_err());
        config.audio.sample_rate = 22050;

        config.features.hop_size = 2048;
        assert!(config.validate().is_err());
        config.features.hop_size = 256;

        config.features.fmax = 20000.0;
        assert!(config.validate().is_err());
        config.features.fmax = 7600.0;

        config.processing.worker_pool_size = 0;
        assert!(config.validate().is_err());
        config.processing.worker_pool_size = 1;

        config.waveform.input_type = InputType::MulawQuantize;
        assert!(config.validate().is_err());
        config.waveform.quantize_channels = 256;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_post_filter_validated_up_front() {
        let mut config = Config::default();
        config.waveform.preprocess = "none".to_string();
        assert!(config.validate().is_ok());
        assert_eq!(config.post_filter().unwrap(), None);

        config.waveform.preprocess = "preemphasis".to_string();
        assert_eq!(config.post_filter().unwrap(), Some(PostFilter::Preemphasis));

        config.waveform.preprocess = "reverse".to_string();
        assert!(matches!(config.validate(), Err(PrepError::Config { .. })));
    }

    #[test]
    fn test_config_file_operations() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");

        let mut config = Config::default();
        config.features.mel_method = MelMethod::Tacotron;
        config.waveform.input_type = InputType::Mulaw;

        assert!(config.save_to_file(&config_path).is_ok());
        assert!(config_path.exists());

        let loaded = Config::from_file(&config_path).unwrap();
        assert_eq!(loaded.sample_rate(), config.sample_rate());
        assert_eq!(loaded.features.mel_method, MelMethod::Tacotron);
        assert_eq!(loaded.waveform.input_type, InputType::Mulaw);
    }

    #[test]
    fn test_partial_config_file_uses_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("partial.toml");
        std::fs::write(
            &config_path,
            "[features]\nmel_method = \"tacotron\"\n\n[waveform]\ninput_type = \"mulaw-quantize\"\nquantize_channels = 256\n",
        )
        .unwrap();

        let config = Config::from_file(&config_path).unwrap();
        assert_eq!(config.features.mel_method, MelMethod::Tacotron);
        assert_eq!(config.waveform.input_type, InputType::MulawQuantize);
        assert_eq!(config.hop_size(), 256);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_mel_method_in_file_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("bad.toml");
        std::fs::write(&config_path, "[features]\nmel_method = \"griffin\"\n").unwrap();
        assert!(Config::from_file(&config_path).is_err());
    }

    #[test]
    fn test_args_override_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        let mut file_config = Config::default();
        file_config.processing.worker_pool_size = 2;
        file_config.audio.sample_rate = 16000;
        file_config.save_to_file(&config_path).unwrap();

        let config = Config::from_args_and_config(args(&[
            "-c",
            config_path.to_str().unwrap(),
            "-w",
            "3",
            "--mel-method",
            "tacotron",
        ]))
        .unwrap();

        assert_eq!(config.worker_pool_size(), 3);
        assert_eq!(config.sample_rate(), 16000);
        assert_eq!(config.features.mel_method, MelMethod::Tacotron);
    }

    #[test]
    fn test_args_reject_unknown_mel_method() {
        let parsed = Args::try_parse_from(["melprep", "--mel-method", "wavenet"]);
        assert!(parsed.is_err());
    }
}
