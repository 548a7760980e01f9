//! Source inspection with the engine's probe tool.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::process::Command;

use greensub_common::error::{GreensubError, GreensubResult};
use greensub_process_runner::locate_program;

const PROBE_TIMEOUT: Duration = Duration::from_secs(15);

/// What the probe tool reports about a source file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MediaInfo {
    pub format_name: String,
    pub duration: Option<Duration>,
    pub size_bytes: Option<u64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub frame_rate: Option<f64>,
    pub video_codec: Option<String>,
    pub audio_codec: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
    #[serde(default)]
    format: ProbeFormat,
}

#[derive(Debug, Default, Deserialize)]
struct ProbeFormat {
    format_name: Option<String>,
    duration: Option<String>,
    size: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
}

/// Parse the probe tool's `-print_format json` output.
pub fn parse_probe_output(json: &[u8]) -> GreensubResult<MediaInfo> {
    let parsed: ProbeOutput = serde_json::from_slice(json)?;
    let stream = |kind: &str| {
        parsed
            .streams
            .iter()
            .find(|s| s.codec_type.as_deref() == Some(kind))
    };
    let video = stream("video");
    let audio = stream("audio");

    let duration = parsed
        .format
        .duration
        .as_deref()
        .and_then(|d| d.trim().parse::<f64>().ok())
        .filter(|secs| secs.is_finite() && *secs > 0.0)
        .map(Duration::from_secs_f64);

    Ok(MediaInfo {
        format_name: parsed
            .format
            .format_name
            .clone()
            .unwrap_or_else(|| "unknown".to_string()),
        duration,
        size_bytes: parsed.format.size.as_deref().and_then(|s| s.parse().ok()),
        width: video.and_then(|v| v.width).filter(|w| *w > 0),
        height: video.and_then(|v| v.height).filter(|h| *h > 0),
        frame_rate: video
            .and_then(|v| v.r_frame_rate.as_deref())
            .and_then(parse_ratio),
        video_codec: video.and_then(|v| v.codec_name.clone()),
        audio_codec: audio.and_then(|a| a.codec_name.clone()),
    })
}

/// `"30000/1001"` → 29.97. Zero denominators and zero rates yield `None`.
fn parse_ratio(text: &str) -> Option<f64> {
    let (num, den) = text.split_once('/')?;
    let num: f64 = num.trim().parse().ok()?;
    let den: f64 = den.trim().parse().ok()?;
    let rate = num / den;
    (den != 0.0 && rate.is_finite() && rate > 0.0).then_some(rate)
}

/// Runs the probe binary.
#[derive(Debug, Clone)]
pub struct MediaProbe {
    program: PathBuf,
}

impl MediaProbe {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub async fn inspect(&self, path: &Path) -> GreensubResult<MediaInfo> {
        let program = locate_program(&self.program)?;
        let mut target = OsString::from("file:");
        target.push(path);

        let output = Command::new(&program)
            .args([
                "-v",
                "error",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
            ])
            .arg(target)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();
        let output = tokio::time::timeout(PROBE_TIMEOUT, output)
            .await
            .map_err(|_| {
                GreensubError::runtime(
                    None,
                    format!("probe timed out after {}s", PROBE_TIMEOUT.as_secs()),
                )
            })??;

        if !output.status.success() {
            return Err(GreensubError::runtime(
                output.status.code(),
                String::from_utf8_lossy(&output.stderr).trim(),
            ));
        }
        parse_probe_output(&output.stdout)
    }

    /// Source duration, or `None` when probing fails. Progress then stays
    /// unknown until the render finishes.
    pub async fn duration(&self, path: &Path) -> Option<Duration> {
        match self.inspect(path).await {
            Ok(info) => {
                if info.duration.is_none() {
                    tracing::warn!(path = %path.display(), "Probe reported no duration");
                }
                info.duration
            }
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "Could not probe source duration");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "streams": [
            {"index": 0, "codec_type": "audio", "codec_name": "aac"},
            {"index": 1, "codec_type": "video", "codec_name": "h264",
             "width": 1280, "height": 720, "r_frame_rate": "30000/1001"}
        ],
        "format": {"format_name": "mov,mp4,m4a,3gp,3g2,mj2",
                   "duration": "12.480000", "size": "1048576"}
    }"#;

    #[test]
    fn test_parse_full_output() {
        let info = parse_probe_output(SAMPLE.as_bytes()).unwrap();
        assert_eq!(info.duration, Some(Duration::from_secs_f64(12.48)));
        assert_eq!((info.width, info.height), (Some(1280), Some(720)));
        assert_eq!(info.video_codec.as_deref(), Some("h264"));
        assert_eq!(info.audio_codec.as_deref(), Some("aac"));
        assert_eq!(info.size_bytes, Some(1_048_576));
        assert!((info.frame_rate.unwrap() - 29.97).abs() < 0.01);
    }

    #[test]
    fn test_parse_sparse_output() {
        let info = parse_probe_output(br#"{"format": {"duration": "N/A"}}"#).unwrap();
        assert_eq!(info.format_name, "unknown");
        assert_eq!(info.duration, None);
        assert_eq!(info.width, None);
        assert_eq!(info.frame_rate, None);

        assert!(parse_probe_output(b"not json").is_err());
    }

    #[test]
    fn test_parse_ratio() {
        assert_eq!(parse_ratio("25/1"), Some(25.0));
        assert_eq!(parse_ratio("0/0"), None);
        assert_eq!(parse_ratio("30"), None);
    }

    #[tokio::test]
    async fn test_missing_probe_degrades_to_unknown_duration() {
        let probe = MediaProbe::new("/nonexistent/ffprobe");
        assert!(probe.inspect(Path::new("clip.mp4")).await.is_err());
        assert_eq!(probe.duration(Path::new("clip.mp4")).await, None);
    }
}
