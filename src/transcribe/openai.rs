use std::time::Instant;

use reqwest::blocking::multipart::{Form, Part};
use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

use super::NormalizedAudio;
use crate::config::TranscriberConfig;
use crate::form::Credential;

#[derive(Error, Debug)]
pub enum TranscriptionError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Authentication failed: {0}")]
    Unauthorized(String),
    #[error("Request timed out: {0}")]
    Timeout(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Transcription service error ({status}): {message}")]
    Service { status: u16, message: String },
    #[error("Unexpected response from transcription service: {0}")]
    InvalidResponse(String),
    #[error("Transcription service returned no text")]
    EmptyTranscript,
}

impl From<reqwest::Error> for TranscriptionError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TranscriptionError::Timeout(err.to_string())
        } else {
            TranscriptionError::Network(err.to_string())
        }
    }
}

/// A speech-to-text backend.
///
/// The credential is passed on every call, implementations keep no
/// per-user state.
pub trait SpeechToText {
    /// Model identifier used for requests
    fn model(&self) -> &str;

    /// Transcribe normalized audio into plain text
    fn transcribe(
        &self,
        audio: &NormalizedAudio,
        credential: &Credential,
    ) -> Result<String, TranscriptionError>;
}

#[derive(Deserialize)]
struct TranscriptionResponse {
    text: String,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

/// Client for an OpenAI-compatible `audio/transcriptions` endpoint
pub struct OpenAiTranscriber {
    client: reqwest::blocking::Client,
    endpoint: String,
    model: String,
}

impl OpenAiTranscriber {
    pub fn new(config: &TranscriberConfig) -> Result<Self, TranscriptionError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            client,
            endpoint: endpoint_url(&config.base_url),
            model: config.model.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl SpeechToText for OpenAiTranscriber {
    fn model(&self) -> &str {
        &self.model
    }

    fn transcribe(
        &self,
        audio: &NormalizedAudio,
        credential: &Credential,
    ) -> Result<String, TranscriptionError> {
        let start_time = Instant::now();
        let wav = audio.read_bytes()?;

        info!(
            "Sending {} samples ({:.1}s, {} bytes) to {} (model {})",
            audio.samples,
            audio.duration_secs,
            wav.len(),
            self.endpoint,
            self.model
        );

        let file_part = Part::bytes(wav).file_name("audio.wav").mime_str("audio/wav")?;
        let form = Form::new()
            .text("model", self.model.clone())
            .text("response_format", "json")
            .part("file", file_part);

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(credential.expose())
            .multipart(form)
            .send()?;

        let status = response.status();
        let body = response.text()?;

        if !status.is_success() {
            let err = classify_status(status, &body);
            warn!("Transcription request failed: {}", err);
            return Err(err);
        }

        let text = parse_transcript(&body)?;

        info!(
            "Transcribed in {:.1}s: {} characters",
            start_time.elapsed().as_secs_f32(),
            text.len()
        );

        Ok(text)
    }
}

fn endpoint_url(base_url: &str) -> String {
    format!("{}/audio/transcriptions", base_url.trim_end_matches('/'))
}

/// Map a non-success response to an error, keeping the service's message
fn classify_status(status: StatusCode, body: &str) -> TranscriptionError {
    let message = serde_json::from_str::<ErrorResponse>(body)
        .map(|e| e.error.message)
        .ok()
        .or_else(|| {
            let trimmed = body.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        })
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("unknown error")
                .to_string()
        });

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => TranscriptionError::Unauthorized(message),
        _ => TranscriptionError::Service {
            status: status.as_u16(),
            message,
        },
    }
}

/// Pull the transcript out of a successful response body
fn parse_transcript(body: &str) -> Result<String, TranscriptionError> {
    let response: TranscriptionResponse = serde_json::from_str(body)
        .map_err(|e| TranscriptionError::InvalidResponse(e.to_string()))?;

    let text = response.text.trim();
    if text.is_empty() {
        return Err(TranscriptionError::EmptyTranscript);
    }

    Ok(text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::AudioUpload;
    use crate::transcribe::normalize;
    use crate::transcribe::prepare::tests::sine_wav;
    use std::time::Duration;

    #[test]
    fn test_endpoint_url() {
        assert_eq!(
            endpoint_url("https://api.openai.com/v1"),
            "https://api.openai.com/v1/audio/transcriptions"
        );
        assert_eq!(
            endpoint_url("http://localhost:8000/v1/"),
            "http://localhost:8000/v1/audio/transcriptions"
        );
    }

    #[test]
    fn test_unauthorized_status() {
        let body = r#"{"error":{"message":"Incorrect API key provided","type":"invalid_request_error"}}"#;
        match classify_status(StatusCode::UNAUTHORIZED, body) {
            TranscriptionError::Unauthorized(message) => {
                assert_eq!(message, "Incorrect API key provided")
            }
            other => panic!("unexpected error: {:?}", other),
        }

        assert!(matches!(
            classify_status(StatusCode::FORBIDDEN, ""),
            TranscriptionError::Unauthorized(_)
        ));
    }

    #[test]
    fn test_service_error_passes_message_through() {
        let body = r#"{"error":{"message":"Audio file is too long"}}"#;
        match classify_status(StatusCode::BAD_REQUEST, body) {
            TranscriptionError::Service { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "Audio file is too long");
            }
            other => panic!("unexpected error: {:?}", other),
        }

        match classify_status(StatusCode::BAD_GATEWAY, "upstream down\n") {
            TranscriptionError::Service { status, message } => {
                assert_eq!(status, 502);
                assert_eq!(message, "upstream down");
            }
            other => panic!("unexpected error: {:?}", other),
        }

        match classify_status(StatusCode::SERVICE_UNAVAILABLE, "") {
            TranscriptionError::Service { message, .. } => {
                assert_eq!(message, "Service Unavailable")
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_parse_transcript() {
        assert_eq!(
            parse_transcript(r#"{"text":" no abnormality detected "}"#).unwrap(),
            "no abnormality detected"
        );
        assert!(matches!(
            parse_transcript(r#"{"text":"   "}"#),
            Err(TranscriptionError::EmptyTranscript)
        ));
        assert!(matches!(
            parse_transcript(r#"{"result":"x"}"#),
            Err(TranscriptionError::InvalidResponse(_))
        ));
        assert!(matches!(
            parse_transcript("not json"),
            Err(TranscriptionError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_unreachable_service_is_network_error() {
        let config = TranscriberConfig::default()
            .with_base_url("http://127.0.0.1:9/v1")
            .with_timeout(Duration::from_secs(5));
        let transcriber = OpenAiTranscriber::new(&config).unwrap();
        assert_eq!(transcriber.endpoint(), "http://127.0.0.1:9/v1/audio/transcriptions");

        let audio = normalize(&AudioUpload::new("a.wav", sine_wav(16000, 1, 0.1))).unwrap();
        let err = transcriber
            .transcribe(&audio, &Credential::new("sk-test"))
            .unwrap_err();

        assert!(matches!(
            err,
            TranscriptionError::Network(_) | TranscriptionError::Timeout(_)
        ));
    }
}
