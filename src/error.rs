//! Error Types

use thiserror::Error;

/// Main error type
///
/// Every variant is a hard failure. Clipped utterances are not errors; they
/// come back as [`crate::processing::ProcessingResult::Rejected`].
#[derive(Debug, Clone, Error)]
pub enum PrepError {
    #[error("Audio error: {message}")]
    Audio { message: String },
    #[error("Config error: {message}")]
    Config { message: String },
    #[error("IO error: {message}")]
    Io { message: String },
    #[error("Processing error: {message}")]
    Processing { message: String },
    #[error("Invalid argument: {message}")]
    InvalidArgument { message: String },
    #[error("Alignment error: {message}")]
    Alignment { message: String },
    #[error("Unknown speaker code {code:?} in {file}")]
    UnknownSpeaker { code: String, file: String },
}

impl PrepError {
    pub fn audio<S: Into<String>>(msg: S) -> Self { Self::Audio { message: msg.into() } }
    pub fn config<S: Into<String>>(msg: S) -> Self { Self::Config { message: msg.into() } }
    pub fn io<S: Into<String>>(msg: S) -> Self { Self::Io { message: msg.into() } }
    pub fn processing<S: Into<String>>(msg: S) -> Self { Self::Processing { message: msg.into() } }
    pub fn invalid_argument<S: Into<String>>(msg: S) -> Self { Self::InvalidArgument { message: msg.into() } }
    pub fn alignment<S: Into<String>>(msg: S) -> Self { Self::Alignment { message: msg.into() } }

    pub fn unknown_speaker<S: Into<String>, F: Into<String>>(code: S, file: F) -> Self {
        Self::UnknownSpeaker { code: code.into(), file: file.into() }
    }
}

pub type Result<T> = std::result::Result<T, PrepError>;

impl From<std::io::Error> for PrepError {
    fn from(err: std::io::Error) -> Self { Self::io(err.to_string()) }
}

impl From<hound::Error> for PrepError {
    fn from(err: hound::Error) -> Self { Self::audio(format!("WAV: {}", err)) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let e = PrepError::audio("test");
        assert!(e.to_string().contains("Audio"));

        let e = PrepError::unknown_speaker("09x", "spk_09x_utt002.wav");
        assert!(e.to_string().contains("09x"));
        assert!(e.to_string().contains("spk_09x_utt002.wav"));
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let e: PrepError = io.into();
        assert!(matches!(e, PrepError::Io { .. }));
    }
}
