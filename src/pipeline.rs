//! The transcription request pipeline.
//!
//! One trigger runs intake, normalization, the remote call and labelling in
//! order. Every failure stops the run and is reported through [`Outcome`];
//! nothing escapes [`Session::trigger`].

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::form::{AudioSource, AudioUpload, FormField, FormInput, TranscriptionRequest};
use crate::report::{ReportCategory, apply_label};
use crate::transcribe::{NormalizationError, SpeechToText, TranscriptionError, normalize};

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Live audio recording is not yet implemented. Please upload an audio file.")]
    LiveCaptureUnsupported,
    #[error(transparent)]
    Normalization(#[from] NormalizationError),
    #[error(transparent)]
    Transcription(#[from] TranscriptionError),
}

fn join_fields(fields: &[FormField]) -> String {
    fields
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// A finished transcription, ready for display
#[derive(Debug, Clone, Serialize)]
pub struct TranscriptionResult {
    pub requester_id: String,
    pub category: ReportCategory,
    /// Transcript as returned by the service, trimmed
    pub transcript: String,
    /// Category label, newline, transcript
    pub text: String,
    pub model: String,
    pub audio_duration_secs: f32,
    pub transcribed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Running,
    Success,
    Failed,
}

/// What a single trigger produced
#[derive(Debug)]
pub enum Outcome {
    Success(TranscriptionResult),
    Failed(PipelineError),
    /// Some required inputs were not filled in; nothing was run
    MissingInput(Vec<FormField>),
}

/// Runs requests against one transcription backend.
///
/// `trigger` takes `&mut self`, so a session never has two runs in flight.
pub struct Session<T> {
    transcriber: T,
    state: PipelineState,
}

impl<T: SpeechToText> Session<T> {
    pub fn new(transcriber: T) -> Self {
        Self {
            transcriber,
            state: PipelineState::Idle,
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn transcriber(&self) -> &T {
        &self.transcriber
    }

    /// Handle one activation of the form
    pub fn trigger(&mut self, input: FormInput) -> Outcome {
        let request = match input.collect() {
            Ok(request) => request,
            Err(missing) => {
                warn!("Not starting transcription, missing: {}", join_fields(&missing));
                self.state = PipelineState::Idle;
                return Outcome::MissingInput(missing);
            }
        };

        self.transition(PipelineState::Running);
        info!(
            "Starting transcription for user {} ({} report)",
            request.requester_id, request.category
        );

        match self.run(request) {
            Ok(result) => {
                self.transition(PipelineState::Success);
                Outcome::Success(result)
            }
            Err(e) => {
                warn!("Transcription failed: {}", e);
                self.transition(PipelineState::Failed);
                Outcome::Failed(e)
            }
        }
    }

    fn transition(&mut self, next: PipelineState) {
        info!("Pipeline state {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    fn run(&self, request: TranscriptionRequest) -> Result<TranscriptionResult, PipelineError> {
        let upload = match request.audio {
            AudioSource::Upload(upload) => upload,
            AudioSource::File(path) => {
                AudioUpload::from_path(&path).map_err(NormalizationError::from)?
            }
            AudioSource::LiveCapture => return Err(PipelineError::LiveCaptureUnsupported),
        };

        // Temp file is removed when `audio` drops, on every path out of here
        let audio = normalize(&upload)?;
        let transcript = self.transcriber.transcribe(&audio, &request.credential)?;
        let text = apply_label(request.category, &transcript);

        Ok(TranscriptionResult {
            requester_id: request.requester_id,
            category: request.category,
            transcript,
            text,
            model: self.transcriber.model().to_string(),
            audio_duration_secs: audio.duration_secs,
            transcribed_at: Utc::now(),
        })
    }
}
