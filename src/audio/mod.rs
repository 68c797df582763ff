//! Audio Processing Module
//!
//! Loading, resampling, silence trimming and time-domain filtering of the
//! raw recordings before feature extraction.

pub mod wav;
pub mod converter;
pub mod trim;
pub mod filter;

pub use wav::{WavAudio, AudioFormat, AudioHeader, AudioData, Utterance};
pub use converter::AudioConverter;
pub use trim::SilenceTrimmer;
pub use filter::{HighpassFilter, PostFilter};
