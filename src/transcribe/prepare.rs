use std::io::{self, Cursor};
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{CODEC_TYPE_NULL, DecoderOptions};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSourceStream, MediaSourceStreamOptions};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{info, warn};

use crate::form::{AudioKind, AudioUpload};

/// Sample rate the transcription service works at
pub const WHISPER_SAMPLE_RATE: u32 = 16000;

#[derive(Error, Debug)]
pub enum NormalizationError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Audio file is empty")]
    EmptyPayload,
    #[error("Unsupported file type: {0} (expected wav, mp3 or m4a)")]
    UnsupportedExtension(String),
    #[error("Could not recognize audio format: {0}")]
    Unrecognized(String),
    #[error("No audio track found in file")]
    NoAudioTrack,
    #[error("Unsupported audio codec: {0}")]
    UnsupportedCodec(String),
    #[error("Failed to decode audio: {0}")]
    Decode(String),
    #[error("Audio file contains no samples")]
    NoSamples,
    #[error("Failed to write WAV: {0}")]
    Encode(#[from] hound::Error),
}

/// Upload re-encoded as 16kHz mono 16-bit PCM WAV.
///
/// The WAV lives in a temporary file that is removed when this value is
/// dropped.
#[derive(Debug)]
pub struct NormalizedAudio {
    file: NamedTempFile,
    /// Number of mono samples written
    pub samples: usize,
    /// Duration in seconds
    pub duration_secs: f32,
}

impl NormalizedAudio {
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Read the WAV file back (for the request body)
    pub fn read_bytes(&self) -> io::Result<Vec<u8>> {
        std::fs::read(self.path())
    }
}

/// Decoded audio before re-encoding
struct DecodedAudio {
    samples: Vec<f32>,
    sample_rate: u32,
}

/// Decode an upload and write it out in the canonical WAV format
pub fn normalize(upload: &AudioUpload) -> Result<NormalizedAudio, NormalizationError> {
    if upload.is_empty() {
        return Err(NormalizationError::EmptyPayload);
    }

    let kind = upload
        .kind()
        .ok_or_else(|| NormalizationError::UnsupportedExtension(upload.file_name.clone()))?;

    info!(
        "Normalizing {} ({} bytes, {})",
        upload.file_name,
        upload.bytes.len(),
        kind.extension()
    );

    let decoded = decode(&upload.bytes, kind)?;
    let samples = resample_linear(&decoded.samples, decoded.sample_rate, WHISPER_SAMPLE_RATE);
    if samples.is_empty() {
        return Err(NormalizationError::NoSamples);
    }

    let file = tempfile::Builder::new()
        .prefix("medscribe-")
        .suffix(".wav")
        .tempfile()?;
    write_wav(file.path(), &samples)?;

    let duration_secs = samples.len() as f32 / WHISPER_SAMPLE_RATE as f32;

    info!(
        "Resampled {}Hz -> {}Hz: {} samples ({:.1}s)",
        decoded.sample_rate,
        WHISPER_SAMPLE_RATE,
        samples.len(),
        duration_secs
    );

    Ok(NormalizedAudio {
        file,
        samples: samples.len(),
        duration_secs,
    })
}

/// Decode to mono f32 at the source sample rate.
///
/// A symphonia panic on a malformed header (a zero sample rate, for one)
/// becomes a `Decode` error.
fn decode(bytes: &[u8], kind: AudioKind) -> Result<DecodedAudio, NormalizationError> {
    panic::catch_unwind(AssertUnwindSafe(|| decode_stream(bytes, kind))).unwrap_or_else(|_| {
        Err(NormalizationError::Decode(
            "decoder rejected malformed audio header".to_string(),
        ))
    })
}

fn decode_stream(bytes: &[u8], kind: AudioKind) -> Result<DecodedAudio, NormalizationError> {
    let cursor = Cursor::new(bytes.to_vec());
    let mss = MediaSourceStream::new(Box::new(cursor), MediaSourceStreamOptions::default());

    let mut hint = Hint::new();
    hint.with_extension(kind.extension());

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| NormalizationError::Unrecognized(e.to_string()))?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(NormalizationError::NoAudioTrack)?;
    let track_id = track.id;
    let mut sample_rate = track.codec_params.sample_rate;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| NormalizationError::UnsupportedCodec(e.to_string()))?;

    let mut samples = Vec::new();
    let mut skipped_packets = 0usize;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == io::ErrorKind::UnexpectedEof => break,
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(NormalizationError::Decode(e.to_string())),
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(buffer) => {
                let spec = *buffer.spec();
                if sample_rate.is_none() {
                    sample_rate = Some(spec.rate);
                }
                let channels = spec.channels.count().max(1);

                let mut interleaved = SampleBuffer::<f32>::new(buffer.capacity() as u64, spec);
                interleaved.copy_interleaved_ref(buffer);

                // Downmix to mono
                samples.extend(
                    interleaved
                        .samples()
                        .chunks(channels)
                        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32),
                );
            }
            // Corrupt packets are skipped, the rest of the stream may still decode
            Err(SymphoniaError::DecodeError(e)) => {
                skipped_packets += 1;
                warn!("Skipping undecodable packet: {}", e);
            }
            Err(e) => return Err(NormalizationError::Decode(e.to_string())),
        }
    }

    if skipped_packets > 0 {
        warn!("Skipped {} corrupt packets", skipped_packets);
    }

    let sample_rate = sample_rate
        .filter(|&rate| rate > 0)
        .ok_or(NormalizationError::NoSamples)?;
    if samples.is_empty() {
        return Err(NormalizationError::NoSamples);
    }

    info!(
        "Decoded {} samples at {}Hz ({:.1}s)",
        samples.len(),
        sample_rate,
        samples.len() as f32 / sample_rate as f32
    );

    Ok(DecodedAudio {
        samples,
        sample_rate,
    })
}

/// Resample using linear interpolation
fn resample_linear(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == 0 || to_rate == 0 {
        return Vec::new();
    }
    if from_rate == to_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let out_len = (samples.len() as f64 / ratio).floor() as usize;

    (0..out_len)
        .map(|i| {
            let pos = i as f64 * ratio;
            let idx = pos as usize;
            let frac = (pos - idx as f64) as f32;
            let a = samples[idx];
            let b = samples.get(idx + 1).copied().unwrap_or(a);
            a + (b - a) * frac
        })
        .collect()
}

/// Write 16-bit mono PCM at the service sample rate
fn write_wav(path: &Path, samples: &[f32]) -> Result<(), NormalizationError> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: WHISPER_SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(path, spec)?;
    for sample in samples {
        let clamped = sample.clamp(-1.0, 1.0);
        writer.write_sample((clamped * 32767.0) as i16)?;
    }
    writer.finalize()?;

    Ok(())
}
