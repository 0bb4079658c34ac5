//! Media metadata for the current clip.
//!
//! The bridge only needs the frame rate (to read `hh:mm:ss:ff` timecodes)
//! and the duration, but the probe reports the basic stream facts so hosts
//! can show them too.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::config::SyncConfig;
use crate::error::NotationError;
use crate::session::ScoringSession;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaInfo {
    pub width: u32,
    pub height: u32,
    /// Frames per second; 0 when unknown.
    pub fps: f64,
    /// Seconds; 0 when unknown.
    pub duration: f64,
    pub video_codec: Option<String>,
    pub audio_codec: Option<String>,
}

impl MediaInfo {
    /// Used when probing fails.
    pub fn placeholder() -> Self {
        Self {
            width: 0,
            height: 0,
            fps: 0.0,
            duration: 0.0,
            video_codec: None,
            audio_codec: None,
        }
    }

    /// Frame rate if known.
    pub fn known_fps(&self) -> Option<f64> {
        (self.fps.is_finite() && self.fps > 0.0).then_some(self.fps)
    }
}

pub trait MediaProbe: Send + Sync {
    fn media_info(&self, path: &Path) -> impl Future<Output = Result<MediaInfo, NotationError>> + Send;
}

/// Runs `ffprobe -show_streams -show_format -of json` with a timeout.
#[derive(Debug, Clone)]
pub struct FfprobeProbe {
    binary: PathBuf,
    timeout: Duration,
}

impl FfprobeProbe {
    pub fn new(timeout: Duration) -> Self {
        Self::with_binary("ffprobe", timeout)
    }

    pub fn from_config(config: &SyncConfig) -> Self {
        Self::new(config.probe_timeout())
    }

    pub fn with_binary(binary: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            timeout,
        }
    }
}

impl MediaProbe for FfprobeProbe {
    async fn media_info(&self, path: &Path) -> Result<MediaInfo, NotationError> {
        let child = Command::new(&self.binary)
            .args(["-v", "error", "-show_streams", "-show_format", "-of", "json"])
            .arg(path)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| NotationError::Probe(format!("ffprobe unavailable: {}", e)))?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| NotationError::Probe(format!("ffprobe timed out after {:?}", self.timeout)))??;

        if !output.status.success() {
            return Err(NotationError::Probe(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ));
        }
        let root: Value = serde_json::from_slice(&output.stdout)?;
        Ok(media_info_from_probe(&root))
    }
}

/// `"30000/1001"` or `"25"` as a number; 0 when unparseable.
pub fn parse_ratio(raw: &str) -> f64 {
    let text = raw.trim();
    match text.split_once('/') {
        Some((num, den)) => {
            let n = num.trim().parse::<f64>().unwrap_or(0.0);
            let d = den.trim().parse::<f64>().unwrap_or(1.0);
            if d.abs() < f64::EPSILON {
                0.0
            } else {
                n / d
            }
        }
        None => text.parse::<f64>().unwrap_or(0.0),
    }
}

fn number(value: Option<&Value>) -> f64 {
    value
        .and_then(|v| v.as_f64().or_else(|| v.as_str().and_then(|s| s.trim().parse().ok())))
        .filter(|n: &f64| n.is_finite())
        .unwrap_or(0.0)
}

fn stream<'a>(streams: &'a [Value], kind: &str) -> Option<&'a Value> {
    streams
        .iter()
        .find(|s| s.get("codec_type").and_then(Value::as_str) == Some(kind))
}

/// Read ffprobe's JSON output.
pub fn media_info_from_probe(root: &Value) -> MediaInfo {
    let streams = root.get("streams").and_then(Value::as_array).map(Vec::as_slice).unwrap_or(&[]);
    let video = stream(streams, "video");
    let audio = stream(streams, "audio");

    let dimension = |key: &str| {
        video
            .and_then(|s| s.get(key))
            .and_then(Value::as_u64)
            .and_then(|n| u32::try_from(n).ok())
            .unwrap_or(0)
    };
    let rate = |key: &str| {
        video
            .and_then(|s| s.get(key))
            .and_then(Value::as_str)
            .map(parse_ratio)
            .filter(|r| *r > 0.0)
    };
    let codec = |s: Option<&Value>| {
        s.and_then(|s| s.get("codec_name"))
            .and_then(Value::as_str)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
    };

    let mut duration = number(root.get("format").and_then(|f| f.get("duration")));
    if duration <= 0.0 {
        duration = number(video.and_then(|s| s.get("duration")));
    }

    MediaInfo {
        width: dimension("width"),
        height: dimension("height"),
        fps: rate("avg_frame_rate").or_else(|| rate("r_frame_rate")).unwrap_or(0.0),
        duration,
        video_codec: codec(video),
        audio_codec: codec(audio),
    }
}

/// Probe the current clip and store its frame rate as the session's fps
/// hint. A failed probe clears the hint so the configured default applies.
pub async fn refresh_fps_hint<P: MediaProbe>(session: &Arc<Mutex<ScoringSession>>, probe: &P) -> MediaInfo {
    let target = {
        let session = session.lock().unwrap();
        session
            .project()
            .current_clip()
            .filter(|clip| clip.has_video())
            .map(|clip| (clip.id.clone(), PathBuf::from(&clip.file_path)))
    };
    let Some((clip_id, path)) = target else {
        session.lock().unwrap().set_fps_hint(None);
        return MediaInfo::placeholder();
    };

    let info = match probe.media_info(&path).await {
        Ok(info) => info,
        Err(e) => {
            warn!("Failed to probe {:?}: {}", path, e);
            MediaInfo::placeholder()
        }
    };

    let mut session = session.lock().unwrap();
    if session.project().current_clip().map(|c| c.id.as_str()) == Some(clip_id.as_str()) {
        session.set_fps_hint(info.known_fps());
    } else {
        debug!("Clip changed while probing {}, dropping result", clip_id);
    }
    info
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_ratio() {
        assert!((parse_ratio("30000/1001") - 29.97).abs() < 0.01);
        assert_eq!(parse_ratio("25"), 25.0);
        assert_eq!(parse_ratio("1/0"), 0.0);
        assert_eq!(parse_ratio(""), 0.0);
    }

    #[test]
    fn test_media_info_from_probe() {
        let root = json!({
            "streams": [
                { "codec_type": "audio", "codec_name": "aac" },
                { "codec_type": "video", "codec_name": "h264", "width": 1920, "height": 1080,
                  "avg_frame_rate": "0/0", "r_frame_rate": "24000/1001" }
            ],
            "format": { "duration": "183.42" }
        });
        let info = media_info_from_probe(&root);
        assert_eq!((info.width, info.height), (1920, 1080));
        assert!((info.fps - 23.976).abs() < 0.001);
        assert_eq!(info.duration, 183.42);
        assert_eq!(info.video_codec.as_deref(), Some("h264"));
        assert_eq!(info.audio_codec.as_deref(), Some("aac"));
    }

    #[test]
    fn test_empty_probe_is_placeholder() {
        let info = media_info_from_probe(&json!({}));
        assert_eq!(info, MediaInfo::placeholder());
        assert_eq!(info.known_fps(), None);
    }

    struct FixedProbe(Option<f64>);

    impl MediaProbe for FixedProbe {
        async fn media_info(&self, _path: &Path) -> Result<MediaInfo, NotationError> {
            match self.0 {
                Some(fps) => Ok(MediaInfo {
                    fps,
                    ..MediaInfo::placeholder()
                }),
                None => Err(NotationError::Probe("unreadable".to_string())),
            }
        }
    }

    fn session_with_clip() -> Arc<Mutex<ScoringSession>> {
        let mut session = ScoringSession::new(SyncConfig::default());
        session.create_project("P", "J1");
        session.set_clips(vec![crate::project::Clip::from_path("c1", "/v/Kira-Intro.mp4", 0)]);
        Arc::new(Mutex::new(session))
    }

    #[tokio::test]
    async fn test_refresh_fps_hint_uses_probed_rate() {
        let session = session_with_clip();
        let info = refresh_fps_hint(&session, &FixedProbe(Some(24.0))).await;
        assert_eq!(info.fps, 24.0);
        assert_eq!(session.lock().unwrap().fps(), 24.0);

        refresh_fps_hint(&session, &FixedProbe(None)).await;
        assert_eq!(session.lock().unwrap().fps(), 30.0);
    }

    #[test]
    fn test_from_config_uses_probe_timeout() {
        let probe = FfprobeProbe::from_config(&SyncConfig::default());
        assert_eq!(probe.timeout, Duration::from_millis(2500));
    }

    #[tokio::test]
    async fn test_missing_binary_is_probe_error() {
        let probe = FfprobeProbe::with_binary("/nonexistent/ffprobe", Duration::from_secs(1));
        let err = probe.media_info(Path::new("clip.mp4")).await.unwrap_err();
        assert!(matches!(err, NotationError::Probe(_)));
    }
}
