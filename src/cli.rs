use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Timed,
    Text,
    Json,
    Srt,
}

#[derive(Parser)]
#[command(
    name = "ytbrief",
    about = "YouTube transcript summarizer",
    version = env!("GIT_DESCRIBE"),
)]
pub struct Cli {
    /// YouTube video URLs or video IDs (reads from stdin if omitted)
    pub urls: Vec<String>,

    /// Caption language to look for
    #[arg(short, long)]
    pub lang: Option<String>,

    /// Directory for transcript and transcription files
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Echo the caption transcript to stdout in this format
    #[arg(short, long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Per-request HTTP timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Show branch, artifact and file details
    #[arg(short, long)]
    pub verbose: bool,
}
