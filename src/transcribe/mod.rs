//! Audio normalization and the remote speech-to-text client.

mod openai;
pub(crate) mod prepare;

pub use prepare::{NormalizationError, NormalizedAudio, normalize};

pub use openai::{OpenAiTranscriber, SpeechToText, TranscriptionError};
