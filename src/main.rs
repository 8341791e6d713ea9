use anyhow::Context as _;
use clap::Parser;
use dotenvy::dotenv;
use indicatif::{ProgressBar, ProgressStyle};
use std::{convert::Infallible, io::Write, path::PathBuf, process::ExitCode, time::Duration};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod form;
mod pipeline;
mod present;
mod report;
mod transcribe;

use config::TranscriberConfig;
use form::{AudioSource, FormInput};
use pipeline::{Outcome, Session};
use present::{Presenter, RenderFormat};
use report::ReportCategory;
use transcribe::{OpenAiTranscriber, SpeechToText};

/// Medical report transcription: turn a dictated audio file into labelled text.
#[derive(Parser)]
#[command(name = "medscribe", version)]
struct Cli {
    /// OpenAI API key
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Audio file to transcribe (wav, mp3, m4a).
    #[arg(long, conflicts_with = "record")]
    audio: Option<PathBuf>,

    /// Record audio live instead of uploading a file.
    #[arg(long)]
    record: bool,

    /// Report type: USG, X-Ray, MRI, CT Scan or Other.
    #[arg(long, default_value = "USG", value_parser = parse_category)]
    report: ReportCategory,

    /// Your user ID, e.g. user123.
    #[arg(long)]
    user_id: Option<String>,

    /// Print the outcome as JSON.
    #[arg(long)]
    json: bool,
}

fn parse_category(s: &str) -> Result<ReportCategory, Infallible> {
    Ok(ReportCategory::parse(s))
}

fn main() -> ExitCode {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse(), std::io::stdout().lock()) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            eprintln!("❌ Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli, out: impl Write) -> anyhow::Result<u8> {
    let format = if cli.json {
        RenderFormat::Json
    } else {
        RenderFormat::Text
    };
    let mut presenter = Presenter::new(out, format);

    let audio = if cli.record {
        Some(AudioSource::LiveCapture)
    } else {
        cli.audio.map(AudioSource::File)
    };

    let input = FormInput {
        credential: cli.api_key,
        audio,
        category: Some(cli.report),
        requester_id: cli.user_id,
    };

    // Report missing fields before any setup can fail
    let missing = input.missing_fields();
    if !missing.is_empty() {
        warn!("Missing input: {:?}", missing);
        let outcome = Outcome::MissingInput(missing);
        presenter.render(&outcome).context("Failed to write output")?;
        return Ok(exit_code(&outcome));
    }

    let config = TranscriberConfig::from_env().context("Invalid transcription settings")?;
    let transcriber =
        OpenAiTranscriber::new(&config).context("Failed to set up the HTTP client")?;

    let mut session = Session::new(transcriber);
    info!(
        "Using model {} at {}",
        session.transcriber().model(),
        session.transcriber().endpoint()
    );

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message("Transcribing... Please wait...");
    spinner.enable_steady_tick(Duration::from_millis(100));

    let outcome = session.trigger(input);
    spinner.finish_and_clear();
    info!("Run finished in state {:?}", session.state());

    presenter.render(&outcome).context("Failed to write output")?;

    Ok(exit_code(&outcome))
}

fn exit_code(outcome: &Outcome) -> u8 {
    match outcome {
        Outcome::Success(_) => 0,
        Outcome::Failed(_) => 1,
        Outcome::MissingInput(_) => 2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use crate::present::MISSING_INPUT_NOTICE;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cli_parses_form_fields() {
        let cli = Cli::try_parse_from([
            "medscribe",
            "--api-key",
            "sk-test",
            "--audio",
            "dictation.m4a",
            "--report",
            "CT Scan",
            "--user-id",
            "user123",
        ])
        .unwrap();

        assert_eq!(cli.api_key.as_deref(), Some("sk-test"));
        assert_eq!(cli.audio, Some(PathBuf::from("dictation.m4a")));
        assert_eq!(cli.report, ReportCategory::CtScan);
        assert_eq!(cli.user_id.as_deref(), Some("user123"));
        assert!(!cli.record);
        assert!(!cli.json);
    }

    #[test]
    fn test_unknown_report_is_general() {
        let cli = Cli::try_parse_from(["medscribe", "--report", "Biopsy"]).unwrap();
        assert_eq!(cli.report, ReportCategory::Other);
    }

    #[test]
    fn test_missing_key_reported_before_audio_is_read() {
        let cli = Cli::try_parse_from([
            "medscribe",
            "--api-key",
            "",
            "--audio",
            "/nonexistent/dictation.wav",
            "--user-id",
            "u1",
        ])
        .unwrap();

        let mut out = Vec::new();
        let code = run(cli, &mut out).unwrap();
        let printed = String::from_utf8(out).unwrap();

        assert_eq!(code, 2);
        assert!(printed.contains(MISSING_INPUT_NOTICE));
        assert!(printed.contains("Missing: API key"));
        assert!(!printed.contains("Error"));
    }

    #[test]
    fn test_unreadable_audio_is_a_failed_run() {
        let cli = Cli::try_parse_from([
            "medscribe",
            "--api-key",
            "sk-test",
            "--audio",
            "/nonexistent/dictation.wav",
            "--user-id",
            "u1",
            "--json",
        ])
        .unwrap();

        let mut out = Vec::new();
        let code = run(cli, &mut out).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();

        assert_eq!(code, 1);
        assert_eq!(value["status"], "error");
        assert_eq!(value["kind"], "normalization");
    }

    #[test]
    fn test_record_conflicts_with_audio() {
        assert!(Cli::try_parse_from(["medscribe", "--record", "--audio", "a.wav"]).is_err());
    }
}
