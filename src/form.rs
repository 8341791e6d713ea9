//! Input collection for a single transcription request.
//!
//! A [`FormInput`] holds whatever the user supplied, possibly incomplete.
//! [`FormInput::collect`] turns it into a [`TranscriptionRequest`] once every
//! required field is present.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::report::ReportCategory;

/// Secret used to authorize the remote transcription call.
///
/// Never printed: `Debug` is redacted and there is no `Display`.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// Container types accepted for upload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioKind {
    Wav,
    Mp3,
    M4a,
}

impl AudioKind {
    pub fn extension(&self) -> &'static str {
        match self {
            AudioKind::Wav => "wav",
            AudioKind::Mp3 => "mp3",
            AudioKind::M4a => "m4a",
        }
    }

    /// Resolve the kind from a file name's extension (case-insensitive)
    pub fn from_file_name(file_name: &str) -> Option<Self> {
        let ext = Path::new(file_name).extension()?.to_str()?;
        match ext.to_lowercase().as_str() {
            "wav" => Some(AudioKind::Wav),
            "mp3" => Some(AudioKind::Mp3),
            "m4a" => Some(AudioKind::M4a),
            _ => None,
        }
    }
}

/// An uploaded audio file, held in memory
#[derive(Clone)]
pub struct AudioUpload {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

impl AudioUpload {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }

    /// Read an upload from disk
    pub fn from_path(path: &Path) -> io::Result<Self> {
        let bytes = fs::read(path)?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::new(file_name, bytes))
    }

    pub fn kind(&self) -> Option<AudioKind> {
        AudioKind::from_file_name(&self.file_name)
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

impl std::fmt::Debug for AudioUpload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioUpload")
            .field("file_name", &self.file_name)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Where the audio comes from
#[derive(Debug, Clone)]
pub enum AudioSource {
    Upload(AudioUpload),
    /// A file on disk, read when the request runs
    File(PathBuf),
    /// Recording from a microphone. Not supported; rejected by the pipeline.
    LiveCapture,
}

/// Required fields of the form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FormField {
    Credential,
    Audio,
    Category,
    RequesterId,
}

impl std::fmt::Display for FormField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FormField::Credential => "API key",
            FormField::Audio => "audio file",
            FormField::Category => "report type",
            FormField::RequesterId => "user ID",
        };
        f.write_str(name)
    }
}

/// Raw form state as submitted
#[derive(Debug, Clone, Default)]
pub struct FormInput {
    pub credential: Option<String>,
    pub audio: Option<AudioSource>,
    pub category: Option<ReportCategory>,
    pub requester_id: Option<String>,
}

/// A complete request, ready to run
#[derive(Debug, Clone)]
pub struct TranscriptionRequest {
    pub credential: Credential,
    pub audio: AudioSource,
    pub category: ReportCategory,
    pub requester_id: String,
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().is_none_or(|v| v.trim().is_empty())
}

impl FormInput {
    /// Required fields that are not filled in, in form order.
    ///
    /// Blank strings count as missing. An upload is present even when its
    /// contents are empty, that is caught by normalization.
    pub fn missing_fields(&self) -> Vec<FormField> {
        let mut missing = Vec::new();
        if is_blank(&self.credential) {
            missing.push(FormField::Credential);
        }
        if self.audio.is_none() {
            missing.push(FormField::Audio);
        }
        if self.category.is_none() {
            missing.push(FormField::Category);
        }
        if is_blank(&self.requester_id) {
            missing.push(FormField::RequesterId);
        }
        missing
    }

    /// Check every required field is filled in. On failure all missing
    /// fields are returned.
    pub fn collect(self) -> Result<TranscriptionRequest, Vec<FormField>> {
        let missing = self.missing_fields();
        let credential = present(self.credential);
        let requester_id = present(self.requester_id).map(|id| id.trim().to_string());

        match (credential, self.audio, self.category, requester_id) {
            (Some(credential), Some(audio), Some(category), Some(requester_id)) => {
                Ok(TranscriptionRequest {
                    credential: Credential::new(credential),
                    audio,
                    category,
                    requester_id,
                })
            }
            _ => Err(missing),
        }
    }
}
