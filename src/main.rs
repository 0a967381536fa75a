use std::io::{self, BufRead};
use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use eyre::{Result, bail};
use log::{debug, info};

use ytbrief::audio::YtDlpAudio;
use ytbrief::config::{ACCESS_KEY_ENV, Config, SECRET_KEY_ENV};
use ytbrief::storage::{HttpObjectStore, LocalObjectStore, ObjectStore, Publisher, S3ObjectStore, S3Settings};
use ytbrief::summarize::ChatSummarizer;
use ytbrief::transcribe::{DeepgramTranscriber, TranscriptionOptions};
use ytbrief::youtube::YouTubeCaptions;
use ytbrief::{Pipeline, PipelineOutcome};

mod cli;

use cli::{Cli, OutputFormat};

const STORAGE_TOKEN_ENV: &str = "STORAGE_TOKEN";

fn setup_logging() -> Result<()> {
    let log_dir = log_dir();
    std::fs::create_dir_all(&log_dir)?;
    let log_file = log_dir.join("ytbrief.log");

    let target = Box::new(std::fs::OpenOptions::new().create(true).append(true).open(&log_file)?);

    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized: {}", log_file.display());
    Ok(())
}

fn log_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ytbrief")
        .join("logs")
}

fn tool_version(name: &str, flag: &str) -> Option<String> {
    Command::new(name)
        .arg(flag)
        .output()
        .ok()
        .filter(|o| o.status.success())
        .map(|o| {
            String::from_utf8_lossy(&o.stdout)
                .trim()
                .lines()
                .next()
                .unwrap_or("")
                .to_string()
        })
}

fn tool_line(label: &str, version: Option<String>) -> String {
    match version {
        Some(v) => format!("  \x1b[32m✅\x1b[0m {label:<9} {v}"),
        None => format!("  \x1b[31m❌\x1b[0m {label:<9} (not found, needed for the audio fallback)"),
    }
}

fn build_after_help() -> String {
    let yt_dlp_line = tool_line("yt-dlp", tool_version("yt-dlp", "--version"));
    let ffmpeg_line = tool_line("ffmpeg", tool_version("ffmpeg", "-version"));
    let log_path = log_dir().join("ytbrief.log");

    format!(
        "\nREQUIRED TOOLS:\n{yt_dlp_line}\n{ffmpeg_line}\n\nConfig is read from: {}\nLogs are written to: {}",
        ytbrief::config::config_path().display(),
        log_path.display()
    )
}

fn build_store(config: &Config, client: &reqwest::Client, timeout: Duration) -> Box<dyn ObjectStore> {
    let access_key = std::env::var(ACCESS_KEY_ENV).ok();
    let secret_key = std::env::var(SECRET_KEY_ENV).ok();

    if let (Some(bucket), Some(access_key), Some(secret_key)) = (&config.storage.bucket, access_key, secret_key) {
        debug!("Publishing to S3 bucket {bucket} in {}", config.storage_region());
        return Box::new(S3ObjectStore::new(S3Settings {
            bucket: bucket.clone(),
            region: config.storage_region().to_string(),
            access_key,
            secret_key,
            endpoint: config.storage.endpoint.clone(),
            timeout: Some(timeout),
        }));
    }

    match (&config.storage.endpoint, &config.storage.bucket) {
        (Some(endpoint), Some(bucket)) => {
            debug!("Publishing to {endpoint}/{bucket}");
            let token = std::env::var(STORAGE_TOKEN_ENV).ok();
            Box::new(HttpObjectStore::new(client.clone(), endpoint, bucket, token))
        }
        _ => {
            let dir = config.local_storage_dir();
            debug!("No remote storage configured, publishing to {}", dir.display());
            Box::new(LocalObjectStore::new(dir))
        }
    }
}

fn build_pipeline(config: &Config, cli: &Cli, client: &reqwest::Client, timeout: Duration) -> Pipeline {
    let lang = cli
        .lang
        .clone()
        .or_else(|| config.default_lang.clone())
        .unwrap_or_else(|| "en".to_string());
    let output_dir = cli
        .output_dir
        .clone()
        .or_else(|| config.output_dir.clone())
        .unwrap_or_else(|| PathBuf::from("."));

    let audio = YtDlpAudio::new(config.audio_work_dir()).with_tools(
        config.audio.yt_dlp.as_deref().unwrap_or("yt-dlp"),
        config.audio.ffmpeg.as_deref().unwrap_or("ffmpeg"),
    );

    let publisher = Publisher::new(build_store(config, client, timeout), config.storage.public_base_url.clone());

    let gen_cfg = &config.generation;
    let summarizer = ChatSummarizer::from_env(
        client.clone(),
        gen_cfg.base_url.as_deref().unwrap_or(ytbrief::summarize::DEFAULT_BASE_URL),
    )
    .with_model(gen_cfg.model.as_deref().unwrap_or(ytbrief::summarize::DEFAULT_MODEL))
    .with_timezone(gen_cfg.timezone.as_deref().unwrap_or(ytbrief::summarize::DEFAULT_TIMEZONE));

    let transcriber = DeepgramTranscriber::from_env(
        client.clone(),
        config
            .transcription
            .base_url
            .as_deref()
            .unwrap_or(ytbrief::transcribe::DEFAULT_BASE_URL),
    );
    let mut options = TranscriptionOptions::default();
    if let Some(model) = &config.transcription.model {
        options.model = model.clone();
    }

    Pipeline::new(
        Box::new(YouTubeCaptions::new(client.clone())),
        Box::new(audio),
        publisher,
        Box::new(transcriber),
        Box::new(summarizer),
    )
    .with_lang(&lang)
    .with_output_dir(output_dir)
    .with_transcription_options(options)
}

fn report(video_id: &str, outcome: &PipelineOutcome, cli: &Cli) {
    match outcome {
        PipelineOutcome::CaptionSummary {
            transcript,
            transcript_path,
            artifact,
            summary,
        } => {
            if cli.verbose {
                eprintln!(
                    "Video: {video_id}\nSource: captions ({})\nUnits: {}\nTranscript: {}\nPublished: {}",
                    transcript.language,
                    transcript.len(),
                    transcript_path.display(),
                    artifact.public_url,
                );
            }
            if let Some(format) = cli.format {
                let rendered = match format {
                    OutputFormat::Timed => ytbrief::output::assemble(transcript),
                    OutputFormat::Text => ytbrief::output::render_text(transcript),
                    OutputFormat::Json => ytbrief::output::render_json(transcript),
                    OutputFormat::Srt => ytbrief::output::render_srt(transcript),
                };
                println!("{rendered}");
            }
            match &summary.text {
                Some(text) => println!("--- Summary ({video_id}) ---\n{text}"),
                None => println!("--- Summary ({video_id}) ---\n(the generation service returned no content)"),
            }
        }
        PipelineOutcome::AudioTranscription {
            artifact,
            result,
            saved_to,
        } => {
            if cli.verbose {
                eprintln!(
                    "Video: {video_id}\nSource: audio transcription\nAudio: {}",
                    artifact.public_url
                );
            }
            println!("Transcription for {video_id} saved to {}", saved_to.display());
            if let Some(summary) = ytbrief::transcribe::summary_text(result) {
                println!("--- Service summary ({video_id}) ---\n{summary}");
            } else if cli.verbose {
                if let Some(text) = ytbrief::transcribe::transcript_text(result) {
                    println!("{text}");
                }
            }
        }
        PipelineOutcome::Failed { stage, error } => {
            eprintln!("{video_id}: failed during {stage}: {error}");
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_logging()?;

    let after_help = build_after_help();
    let cmd = <Cli as clap::CommandFactory>::command().after_help(after_help);
    let matches = cmd.get_matches();
    let cli = <Cli as clap::FromArgMatches>::from_arg_matches(&matches)?;

    // Load config file (non-fatal if missing/invalid)
    let mut config = Config::load().unwrap_or_else(|e| {
        eprintln!("Ignoring invalid config {}: {e}", ytbrief::config::config_path().display());
        Config::default()
    });
    config.apply_env();

    if cli.verbose {
        let config_path = ytbrief::config::config_path();
        if config_path.exists() {
            eprintln!("Config: {}", config_path.display());
        }
    }

    let timeout = Duration::from_secs(cli.timeout.unwrap_or_else(|| config.request_timeout_secs()));
    let client = reqwest::Client::builder().timeout(timeout).build()?;

    let pipeline = build_pipeline(&config, &cli, &client, timeout);

    // Collect URLs: from args or stdin
    let urls = if !cli.urls.is_empty() {
        cli.urls.clone()
    } else {
        let stdin = io::stdin();
        stdin.lock().lines().collect::<Result<Vec<_>, _>>()?
    };

    let inputs: Vec<String> = urls
        .iter()
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
        .collect();

    if inputs.is_empty() {
        bail!("no URL or video ID provided\n\nUsage: ytbrief <URL>\n       echo <URL> | ytbrief");
    }

    let mut failed = 0;
    for url_input in &inputs {
        let video_id = ytbrief::extract_video_id(url_input)
            .ok_or_else(|| eyre::eyre!("could not extract video ID from: {url_input}\n\nSupported formats:\n  https://www.youtube.com/watch?v=ID\n  https://youtu.be/ID\n  https://www.youtube.com/embed/ID\n  https://www.youtube.com/shorts/ID\n  <11-character video ID>"))?;

        let outcome = pipeline.run(&video_id).await;
        if outcome.is_failed() {
            failed += 1;
        }
        report(&video_id, &outcome, &cli);
    }

    if failed > 0 {
        bail!("{failed} of {} runs failed (see {})", inputs.len(), log_dir().join("ytbrief.log").display());
    }

    Ok(())
}
