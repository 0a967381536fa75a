use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use log::{debug, info};
use tokio::process::Command;

use crate::error::{PipelineError, Result};

/// Produces a local, transcoded audio file for a video.
#[async_trait]
pub trait AudioSource: Send + Sync {
    async fn acquire_audio(&self, video_id: &str) -> Result<PathBuf>;
}

/// Downloads the best audio-only stream with yt-dlp and transcodes it to
/// 16 kHz mono PCM WAV with ffmpeg.
#[derive(Debug, Clone)]
pub struct YtDlpAudio {
    work_dir: PathBuf,
    yt_dlp: String,
    ffmpeg: String,
    watch_base_url: String,
}

impl YtDlpAudio {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            yt_dlp: "yt-dlp".to_string(),
            ffmpeg: "ffmpeg".to_string(),
            watch_base_url: crate::youtube::DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_tools(mut self, yt_dlp: &str, ffmpeg: &str) -> Self {
        self.yt_dlp = yt_dlp.to_string();
        self.ffmpeg = ffmpeg.to_string();
        self
    }

    pub fn download_path(&self, video_id: &str) -> PathBuf {
        self.work_dir.join(format!("{video_id}.audio"))
    }

    pub fn wav_path(&self, video_id: &str) -> PathBuf {
        self.work_dir.join(format!("{video_id}.wav"))
    }

    async fn download(&self, video_id: &str) -> Result<PathBuf> {
        let url = format!("{}/watch?v={video_id}", self.watch_base_url);
        let output_path = self.download_path(video_id);
        let download_err = |reason: String| PipelineError::Download {
            video_id: video_id.to_string(),
            reason,
        };

        debug!("Downloading audio via {}: {url}", self.yt_dlp);

        // Waiting on the child's exit is the completion signal; the file is
        // not read before this returns.
        let output = Command::new(&self.yt_dlp)
            .args(download_args(&url, &output_path))
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| download_err(spawn_failure(&self.yt_dlp, &e)))?;

        if !output.status.success() {
            return Err(download_err(format!(
                "{} exited with {}: {}",
                self.yt_dlp,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        if !output_path.exists() {
            return Err(download_err(format!(
                "{} did not produce {}",
                self.yt_dlp,
                output_path.display()
            )));
        }

        Ok(output_path)
    }

    async fn transcode(&self, input: &Path, output_path: &Path) -> Result<()> {
        let transcode_err = |reason: String| PipelineError::Transcode {
            input: input.to_path_buf(),
            reason,
        };

        debug!("Transcoding {} -> {}", input.display(), output_path.display());

        let output = Command::new(&self.ffmpeg)
            .args(transcode_args(input, output_path))
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| transcode_err(spawn_failure(&self.ffmpeg, &e)))?;

        if !output.status.success() {
            return Err(transcode_err(format!(
                "{} exited with {}: {}",
                self.ffmpeg,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        if !output_path.exists() {
            return Err(transcode_err(format!(
                "{} did not produce {}",
                self.ffmpeg,
                output_path.display()
            )));
        }

        Ok(())
    }
}

#[async_trait]
impl AudioSource for YtDlpAudio {
    async fn acquire_audio(&self, video_id: &str) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.work_dir).await?;

        let downloaded = self.download(video_id).await?;
        let wav = self.wav_path(video_id);
        self.transcode(&downloaded, &wav).await?;

        info!("Audio for {video_id} ready at {}", wav.display());
        Ok(wav)
    }
}

fn download_args(url: &str, output_path: &Path) -> Vec<String> {
    vec![
        "-f".to_string(),
        "bestaudio".to_string(),
        "--no-playlist".to_string(),
        "--no-part".to_string(),
        "--force-overwrites".to_string(),
        "-o".to_string(),
        output_path.to_string_lossy().into_owned(),
        url.to_string(),
    ]
}

fn transcode_args(input: &Path, output_path: &Path) -> Vec<String> {
    vec![
        "-y".to_string(),
        "-i".to_string(),
        input.to_string_lossy().into_owned(),
        "-vn".to_string(),
        "-acodec".to_string(),
        "pcm_s16le".to_string(),
        "-ar".to_string(),
        "16000".to_string(),
        "-ac".to_string(),
        "1".to_string(),
        output_path.to_string_lossy().into_owned(),
    ]
}

fn spawn_failure(tool: &str, err: &std::io::Error) -> String {
    if err.kind() == std::io::ErrorKind::NotFound {
        format!("{tool} not found. Install it to enable the audio fallback (e.g. `pip install yt-dlp`, `apt install ffmpeg`)")
    } else {
        format!("failed to run {tool}: {err}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_download_args_request_audio_only() {
        let args = download_args("https://www.youtube.com/watch?v=abc", Path::new("/tmp/w/abc.audio"));
        assert_eq!(&args[..2], ["-f", "bestaudio"]);
        assert!(args.contains(&"/tmp/w/abc.audio".to_string()));
        assert_eq!(args.last().unwrap(), "https://www.youtube.com/watch?v=abc");
    }

    #[test]
    fn test_transcode_args_produce_pcm_wav() {
        let args = transcode_args(Path::new("in.audio"), Path::new("out.wav"));
        assert!(args.windows(2).any(|w| w == ["-acodec", "pcm_s16le"]));
        assert!(args.windows(2).any(|w| w == ["-i", "in.audio"]));
        assert_eq!(args.last().unwrap(), "out.wav");
    }

    #[tokio::test]
    async fn test_missing_downloader_is_download_error() {
        let dir = tempfile::tempdir().unwrap();
        let audio = YtDlpAudio::new(dir.path()).with_tools("/nonexistent/yt-dlp", "/nonexistent/ffmpeg");

        let err = audio.acquire_audio("abc").await.unwrap_err();
        match err {
            PipelineError::Download { video_id, reason } => {
                assert_eq!(video_id, "abc");
                assert!(reason.contains("not found"));
            }
            other => panic!("expected download error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_download_without_output_file_is_download_error() {
        let dir = tempfile::tempdir().unwrap();
        let audio = YtDlpAudio::new(dir.path()).with_tools("true", "true");

        let err = audio.acquire_audio("abc").await.unwrap_err();
        assert!(matches!(err, PipelineError::Download { .. }));
    }

    #[tokio::test]
    async fn test_transcode_failure_not_masked_by_download() {
        let dir = tempfile::tempdir().unwrap();
        let audio = YtDlpAudio::new(dir.path()).with_tools("true", "false");
        std::fs::write(audio.download_path("abc"), b"fake audio").unwrap();

        let err = audio.acquire_audio("abc").await.unwrap_err();
        assert!(matches!(err, PipelineError::Transcode { .. }));
    }
}
