//! Rendering pipeline outcomes for the user.

use std::io::{self, Write};

use serde_json::json;

use crate::pipeline::{Outcome, PipelineError};
use crate::transcribe::TranscriptionError;

pub const SUCCESS_NOTICE: &str = "✅ Transcription Successful!";
pub const MISSING_INPUT_NOTICE: &str =
    "⚠️ Please enter your API key, upload an audio file, and enter your User ID.";

/// Output style
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RenderFormat {
    #[default]
    Text,
    Json,
}

pub struct Presenter<W> {
    out: W,
    format: RenderFormat,
}

impl<W: Write> Presenter<W> {
    pub fn new(out: W, format: RenderFormat) -> Self {
        Self { out, format }
    }

    pub fn render(&mut self, outcome: &Outcome) -> io::Result<()> {
        match self.format {
            RenderFormat::Text => self.render_text(outcome),
            RenderFormat::Json => self.render_json(outcome),
        }?;
        self.out.flush()
    }

    fn render_text(&mut self, outcome: &Outcome) -> io::Result<()> {
        match outcome {
            Outcome::Success(result) => {
                writeln!(self.out, "{}", SUCCESS_NOTICE)?;
                writeln!(self.out)?;
                writeln!(self.out, "{}", result.text)
            }
            Outcome::Failed(e) => writeln!(self.out, "❌ Error: {}", e),
            Outcome::MissingInput(fields) => {
                writeln!(self.out, "{}", MISSING_INPUT_NOTICE)?;
                let names: Vec<String> = fields.iter().map(|f| f.to_string()).collect();
                writeln!(self.out, "Missing: {}", names.join(", "))
            }
        }
    }

    fn render_json(&mut self, outcome: &Outcome) -> io::Result<()> {
        let value = match outcome {
            Outcome::Success(result) => json!({
                "status": "success",
                "result": result,
            }),
            Outcome::Failed(e) => json!({
                "status": "error",
                "kind": error_kind(e),
                "message": e.to_string(),
            }),
            Outcome::MissingInput(fields) => json!({
                "status": "missing_input",
                "message": MISSING_INPUT_NOTICE,
                "missing": fields,
            }),
        };

        serde_json::to_writer_pretty(&mut self.out, &value)?;
        writeln!(self.out)
    }
}

/// Stable machine-readable name for an error
pub fn error_kind(error: &PipelineError) -> &'static str {
    match error {
        PipelineError::LiveCaptureUnsupported => "live_capture_unsupported",
        PipelineError::Normalization(_) => "normalization",
        PipelineError::Transcription(e) => match e {
            TranscriptionError::Io(_) => "io",
            TranscriptionError::Unauthorized(_) => "unauthorized",
            TranscriptionError::Timeout(_) => "timeout",
            TranscriptionError::Network(_) => "network",
            TranscriptionError::Service { .. } => "service",
            TranscriptionError::InvalidResponse(_) => "invalid_response",
            TranscriptionError::EmptyTranscript => "empty_transcript",
        },
    }
}
