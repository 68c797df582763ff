//! Acoustic feature extraction

pub mod mel;

pub use mel::{MelMethod, MelSpectrogramExtractor};
