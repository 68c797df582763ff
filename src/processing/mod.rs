//! Dataset preparation pipeline
//!
//! Quantization, alignment, speaker labels and `.npy` persistence, the
//! per-utterance pipeline that chains them, and the parallel corpus builder.

pub mod quantize;
pub mod alignment;
pub mod speaker;
pub mod storage;
pub mod pipeline;
pub mod dataset;

pub use quantize::{InputType, QuantizedWaveform, SilenceValue, WaveformQuantizer};
pub use alignment::AlignmentPadder;
pub use speaker::{SpeakerIdResolver, SPEAKER_CODES};
pub use pipeline::{ProcessingResult, Rejection, UtterancePipeline, UtteranceRecord, TRANSCRIPT_PLACEHOLDER};
pub use dataset::{DatasetBuilder, DatasetReport, UtteranceOutcome};
