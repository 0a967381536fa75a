use std::fmt;
use std::path::PathBuf;

use log::{debug, error, info};

use crate::Transcript;
use crate::audio::AudioSource;
use crate::error::{PipelineError, Result};
use crate::output::assemble;
use crate::storage::{ArtifactReference, Publisher};
use crate::summarize::{SummaryResult, Summarizer};
use crate::transcribe::{Transcriber, TranscriptionOptions};
use crate::youtube::CaptionSource;

const TRANSCRIPT_CONTENT_TYPE: &str = "text/plain; charset=utf-8";
const AUDIO_CONTENT_TYPE: &str = "audio/wav";

/// Where a run was when it stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Start,
    CaptionAttempted,
    Summarizing,
    FallbackAcquiring,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Start => write!(f, "caption extraction"),
            Stage::CaptionAttempted => write!(f, "branch selection"),
            Stage::Summarizing => write!(f, "caption summary"),
            Stage::FallbackAcquiring => write!(f, "audio fallback"),
        }
    }
}

/// Terminal result of one pipeline run
#[derive(Debug)]
pub enum PipelineOutcome {
    /// Captions were found, published and summarized. The summary text may be absent.
    CaptionSummary {
        transcript: Transcript,
        transcript_path: PathBuf,
        artifact: ArtifactReference,
        summary: SummaryResult,
    },
    /// No usable captions; the audio was transcribed by the external service.
    AudioTranscription {
        artifact: ArtifactReference,
        result: serde_json::Value,
        saved_to: PathBuf,
    },
    Failed {
        stage: Stage,
        error: PipelineError,
    },
}

impl PipelineOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, PipelineOutcome::Failed { .. })
    }
}

enum State {
    Start,
    CaptionAttempted(Transcript),
    Summarizing(Transcript),
    FallbackAcquiring,
}

enum Transition {
    Next(State),
    Finished(PipelineOutcome),
}

impl State {
    fn stage(&self) -> Stage {
        match self {
            State::Start => Stage::Start,
            State::CaptionAttempted(_) => Stage::CaptionAttempted,
            State::Summarizing(_) => Stage::Summarizing,
            State::FallbackAcquiring => Stage::FallbackAcquiring,
        }
    }
}

pub fn transcript_key(video_id: &str) -> String {
    format!("{video_id}-transcript.txt")
}

pub fn audio_key(video_id: &str) -> String {
    format!("{video_id}.wav")
}

pub fn transcription_file_name(video_id: &str) -> String {
    format!("{video_id}-transcription.json")
}

/// Sequences caption extraction, publishing, summarization and the audio
/// fallback for one video at a time.
///
/// Exactly one branch runs per call to [`Pipeline::run`]: the caption branch
/// when extraction yields a non-empty transcript, the audio branch when it
/// yields an empty one. Extraction errors end the run; they never trigger
/// the fallback.
pub struct Pipeline {
    captions: Box<dyn CaptionSource>,
    audio: Box<dyn AudioSource>,
    publisher: Publisher,
    transcriber: Box<dyn Transcriber>,
    summarizer: Box<dyn Summarizer>,
    lang: String,
    output_dir: PathBuf,
    transcription_options: TranscriptionOptions,
}

impl Pipeline {
    pub fn new(
        captions: Box<dyn CaptionSource>,
        audio: Box<dyn AudioSource>,
        publisher: Publisher,
        transcriber: Box<dyn Transcriber>,
        summarizer: Box<dyn Summarizer>,
    ) -> Self {
        Self {
            captions,
            audio,
            publisher,
            transcriber,
            summarizer,
            lang: "en".to_string(),
            output_dir: PathBuf::from("."),
            transcription_options: TranscriptionOptions::default(),
        }
    }

    pub fn with_lang(mut self, lang: &str) -> Self {
        self.lang = lang.to_string();
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_transcription_options(mut self, options: TranscriptionOptions) -> Self {
        self.transcription_options = options;
        self
    }

    /// Run the pipeline once for `video_id`. Failures are reported in the
    /// outcome, never retried.
    pub async fn run(&self, video_id: &str) -> PipelineOutcome {
        info!("Starting run for {video_id} (lang={})", self.lang);
        let mut state = State::Start;

        loop {
            let stage = state.stage();
            match self.advance(video_id, state).await {
                Ok(Transition::Finished(outcome)) => {
                    info!("Run for {video_id} finished after {stage}");
                    return outcome;
                }
                Ok(Transition::Next(next)) => {
                    debug!("{video_id}: {stage} -> {}", next.stage());
                    state = next;
                }
                Err(error) => {
                    error!("Run for {video_id} failed during {stage}: {error}");
                    return PipelineOutcome::Failed { stage, error };
                }
            }
        }
    }

    async fn advance(&self, video_id: &str, state: State) -> Result<Transition> {
        match state {
            State::Start => {
                let transcript = self.captions.extract_captions(video_id, &self.lang).await?;
                Ok(Transition::Next(State::CaptionAttempted(transcript)))
            }
            State::CaptionAttempted(transcript) if transcript.is_empty() => {
                Ok(Transition::Next(State::FallbackAcquiring))
            }
            State::CaptionAttempted(transcript) => Ok(Transition::Next(State::Summarizing(transcript))),
            State::Summarizing(transcript) => self
                .summarize_captions(transcript)
                .await
                .map(Transition::Finished),
            State::FallbackAcquiring => self.transcribe_audio(video_id).await.map(Transition::Finished),
        }
    }

    async fn summarize_captions(&self, transcript: Transcript) -> Result<PipelineOutcome> {
        let text = assemble(&transcript);
        let key = transcript_key(&transcript.video_id);

        tokio::fs::create_dir_all(&self.output_dir).await?;
        let transcript_path = self.output_dir.join(&key);
        tokio::fs::write(&transcript_path, &text).await?;
        info!("Transcript saved to {}", transcript_path.display());

        let artifact = self
            .publisher
            .publish(text.into_bytes(), &key, TRANSCRIPT_CONTENT_TYPE)
            .await?;
        let summary = self.summarizer.summarize(&artifact.public_url).await?;

        Ok(PipelineOutcome::CaptionSummary {
            transcript,
            transcript_path,
            artifact,
            summary,
        })
    }

    async fn transcribe_audio(&self, video_id: &str) -> Result<PipelineOutcome> {
        let wav = self.audio.acquire_audio(video_id).await?;
        let bytes = tokio::fs::read(&wav).await?;

        let artifact = self
            .publisher
            .publish(bytes, &audio_key(video_id), AUDIO_CONTENT_TYPE)
            .await?;
        let result = self
            .transcriber
            .transcribe_url(&artifact.public_url, &self.transcription_options)
            .await?;

        tokio::fs::create_dir_all(&self.output_dir).await?;
        let saved_to = self.output_dir.join(transcription_file_name(video_id));
        let json = serde_json::to_string_pretty(&result)
            .map_err(|e| PipelineError::Transcription(format!("cannot serialize result: {e}")))?;
        tokio::fs::write(&saved_to, json).await?;
        info!("Transcription result saved to {}", saved_to.display());

        Ok(PipelineOutcome::AudioTranscription {
            artifact,
            result,
            saved_to,
        })
    }
}
