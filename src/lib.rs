//! melprep - vocoder training data preparation
//!
//! Turns a directory of speech recordings into time-aligned waveform and
//! log-mel spectrogram arrays, with optional mu-law targets and speaker ids.

pub mod audio;
pub mod config;
pub mod error;
pub mod features;
pub mod processing;

pub use config::{Config, Args};
pub use error::{PrepError, Result};
pub use features::{MelMethod, MelSpectrogramExtractor};
pub use processing::{DatasetBuilder, DatasetReport, InputType, ProcessingResult, UtterancePipeline};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");

/// Install the env_logger backend. `RUST_LOG` still wins when set.
pub fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .try_init()
        .ok();
}

pub fn get_library_info() -> LibraryInfo {
    LibraryInfo {
        name: NAME.to_string(),
        version: VERSION.to_string(),
        description: DESCRIPTION.to_string(),
    }
}

#[derive(Debug, Clone)]
pub struct LibraryInfo {
    pub name: String,
    pub version: String,
    pub description: String,
}

impl std::fmt::Display for LibraryInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} v{} - {}", self.name, self.version, self.description)
    }
}
