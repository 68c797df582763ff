//! Speaker id lookup from file names

use std::path::Path;

use crate::error::{PrepError, Result};

/// Speaker codes of the corpus and their ids.
pub const SPEAKER_CODES: [(&str, u8); 6] = [
    ("01m", 0),
    ("02m", 1),
    ("03m", 2),
    ("01n", 3),
    ("02n", 4),
    ("03n", 5),
];

/// Maps the second `_`-separated token of a file name to a speaker id.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpeakerIdResolver;

impl SpeakerIdResolver {
    pub fn new() -> Self {
        Self
    }

    pub fn num_speakers(&self) -> usize {
        SPEAKER_CODES.len()
    }

    pub fn resolve<P: AsRef<Path>>(&self, path: P) -> Result<u8> {
        let path = path.as_ref();
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        let code = file_name
            .split('_')
            .nth(1)
            .ok_or_else(|| PrepError::unknown_speaker("", file_name.clone()))?;

        SPEAKER_CODES
            .iter()
            .find(|(known, _)| *known == code)
            .map(|(_, id)| *id)
            .ok_or_else(|| PrepError::unknown_speaker(code, file_name.clone()))
    }
}
