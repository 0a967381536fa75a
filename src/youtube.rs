use std::sync::LazyLock;

use async_trait::async_trait;
use log::{debug, info};
use regex::{Captures, Regex};
use serde::Deserialize;

use crate::error::{PipelineError, Result};
use crate::{CaptionUnit, Transcript};

const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

pub const DEFAULT_BASE_URL: &str = "https://www.youtube.com";

const CLIENT_NAME: &str = "WEB";
const CLIENT_VERSION: &str = "2.20240401.01.00";

static API_KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""INNERTUBE_API_KEY"\s*:\s*"([^"]+)""#).expect("valid regex"));

static FMT_SUFFIX_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"&fmt=\w+$").expect("valid regex"));

static ENTITY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&(amp|lt|gt|quot|apos|#[0-9]+|#x[0-9a-fA-F]+);").expect("valid regex"));

/// Anything that can produce a caption transcript for a video.
///
/// An empty transcript means "no usable captions" and is not an error.
#[async_trait]
pub trait CaptionSource: Send + Sync {
    async fn extract_captions(&self, video_id: &str, lang: &str) -> Result<Transcript>;
}

#[derive(Debug, Deserialize)]
struct InnerTubePlayerResponse {
    captions: Option<CaptionsData>,
}

#[derive(Debug, Deserialize)]
struct CaptionsData {
    #[serde(rename = "playerCaptionsTracklistRenderer")]
    player_captions_tracklist_renderer: Option<CaptionTracklistRenderer>,
}

#[derive(Debug, Deserialize)]
struct CaptionTracklistRenderer {
    #[serde(rename = "captionTracks")]
    caption_tracks: Option<Vec<CaptionTrack>>,
}

#[derive(Debug, Deserialize)]
struct CaptionTrack {
    #[serde(rename = "baseUrl")]
    base_url: String,
    #[serde(rename = "languageCode")]
    language_code: String,
}

/// Caption extraction through the watch page and the InnerTube player endpoint.
///
/// This scrapes an undocumented internal API. If the watch page stops
/// embedding `INNERTUBE_API_KEY`, extraction fails with
/// [`PipelineError::UpstreamFormat`] rather than pretending there are no captions.
#[derive(Debug, Clone)]
pub struct YouTubeCaptions {
    client: reqwest::Client,
    base_url: String,
}

impl YouTubeCaptions {
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_base_url(client, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn get_text(&self, url: &str) -> Result<String> {
        self.client
            .get(url)
            .header("User-Agent", USER_AGENT)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| PipelineError::network(url, e))?
            .text()
            .await
            .map_err(|e| PipelineError::network(url, e))
    }

    async fn fetch_tracks(&self, api_key: &str, video_id: &str) -> Result<Vec<CaptionTrack>> {
        let player_url = format!("{}/youtubei/v1/player?key={api_key}", self.base_url);

        let body = serde_json::json!({
            "context": {
                "client": {
                    "clientName": CLIENT_NAME,
                    "clientVersion": CLIENT_VERSION
                }
            },
            "videoId": video_id
        });

        let raw = self
            .client
            .post(&player_url)
            .header("User-Agent", USER_AGENT)
            .json(&body)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| PipelineError::network(&player_url, e))?
            .text()
            .await
            .map_err(|e| PipelineError::network(&player_url, e))?;

        let resp: InnerTubePlayerResponse = serde_json::from_str(&raw)
            .map_err(|e| PipelineError::UpstreamFormat(format!("player response is not valid JSON: {e}")))?;

        Ok(resp
            .captions
            .and_then(|c| c.player_captions_tracklist_renderer)
            .and_then(|r| r.caption_tracks)
            .unwrap_or_default())
    }
}

#[async_trait]
impl CaptionSource for YouTubeCaptions {
    async fn extract_captions(&self, video_id: &str, lang: &str) -> Result<Transcript> {
        let watch_url = format!("{}/watch?v={video_id}", self.base_url);
        debug!("Fetching watch page: {watch_url}");

        let page_html = self.get_text(&watch_url).await?;
        let api_key = extract_api_key(&page_html)?;
        debug!("Extracted InnerTube API key for {video_id}");

        let tracks = self.fetch_tracks(&api_key, video_id).await?;
        if tracks.is_empty() {
            info!("No caption tracks for {video_id}");
            return Ok(Transcript::empty(video_id, lang));
        }

        let Some(track) = select_track(&tracks, lang) else {
            info!(
                "No {lang} caption track for {video_id} (available: {})",
                tracks
                    .iter()
                    .map(|t| t.language_code.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
            return Ok(Transcript::empty(video_id, lang));
        };

        let caption_url = strip_format_suffix(&track.base_url);
        debug!("Fetching caption markup: {caption_url}");
        let markup = self.get_text(&caption_url).await?;

        let units = parse_caption_markup(&markup)?;
        info!("Parsed {} caption units for {video_id}", units.len());

        Ok(Transcript {
            video_id: video_id.to_string(),
            language: track.language_code.clone(),
            units,
        })
    }
}

fn extract_api_key(html: &str) -> Result<String> {
    API_KEY_RE
        .captures(html)
        .map(|caps| caps[1].to_string())
        .ok_or_else(|| PipelineError::UpstreamFormat("INNERTUBE_API_KEY not found in watch page".to_string()))
}

fn select_track<'a>(tracks: &'a [CaptionTrack], lang: &str) -> Option<&'a CaptionTrack> {
    tracks.iter().find(|t| t.language_code == lang)
}

fn strip_format_suffix(url: &str) -> String {
    FMT_SUFFIX_RE.replace(url, "").into_owned()
}

/// Decode the predefined markup entities and numeric character references.
/// Unknown entities are left untouched.
fn decode_entities(raw: &str) -> String {
    ENTITY_RE
        .replace_all(raw, |caps: &Captures| {
            let name = &caps[1];
            let decoded = match name {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                _ => name
                    .strip_prefix("#x")
                    .map(|hex| u32::from_str_radix(hex, 16))
                    .unwrap_or_else(|| name[1..].parse::<u32>())
                    .ok()
                    .and_then(char::from_u32),
            };
            decoded.map(String::from).unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

fn parse_seconds(name: &str, raw: &[u8]) -> Result<f64> {
    let text = String::from_utf8_lossy(raw);
    match text.trim().parse::<f64>() {
        Ok(v) if v.is_finite() && v >= 0.0 => Ok(v),
        _ => Err(PipelineError::UpstreamFormat(format!(
            "caption node has malformed {name} attribute: {text:?}"
        ))),
    }
}

/// Parse `<text start=".." dur="..">..</text>` nodes in one pass.
///
/// Any malformed timing fails the whole parse; nodes missing an attribute or
/// carrying no text are skipped.
fn parse_caption_markup(markup: &str) -> Result<Vec<CaptionUnit>> {
    use quick_xml::Reader;
    use quick_xml::events::Event;

    struct OpenNode {
        start: Option<f64>,
        dur: Option<f64>,
        text: String,
    }

    let mut reader = Reader::from_str(markup);
    let mut units = Vec::new();
    let mut open: Option<OpenNode> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.name().as_ref() == b"text" => {
                let mut node = OpenNode {
                    start: None,
                    dur: None,
                    text: String::new(),
                };
                for attr in e.attributes() {
                    let attr =
                        attr.map_err(|err| PipelineError::UpstreamFormat(format!("bad caption attribute: {err}")))?;
                    match attr.key.as_ref() {
                        b"start" => node.start = Some(parse_seconds("start", &attr.value)?),
                        b"dur" => node.dur = Some(parse_seconds("dur", &attr.value)?),
                        _ => {}
                    }
                }
                open = Some(node);
            }
            Ok(Event::Text(e)) => {
                if let Some(node) = open.as_mut() {
                    node.text.push_str(&String::from_utf8_lossy(&e));
                }
            }
            Ok(Event::CData(e)) => {
                if let Some(node) = open.as_mut() {
                    node.text.push_str(&String::from_utf8_lossy(&e));
                }
            }
            Ok(Event::End(e)) if e.name().as_ref() == b"text" => {
                if let Some(OpenNode {
                    start: Some(start),
                    dur: Some(dur),
                    text,
                }) = open.take()
                {
                    if !text.is_empty() {
                        units.push(CaptionUnit::new(decode_entities(&text), start, dur));
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(PipelineError::UpstreamFormat(format!(
                    "error parsing caption markup at {}: {e}",
                    reader.buffer_position()
                )));
            }
            _ => {}
        }
    }

    Ok(units)
}
