//! Subtitle staging.
//!
//! The user's subtitle file is never handed to the engine directly. It is
//! copied into a private temporary directory under a plain alphanumeric name,
//! re-encoded to UTF-8 with LF line endings, and, for SRT, rewritten with
//! canonical timecodes and sequential cue numbers. libass silently drops
//! cues with short millisecond fields or irregular spacing around `-->`.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use tempfile::TempDir;
use uuid::Uuid;

use greensub_common::error::{GreensubError, GreensubResult};
use greensub_job_model::{SubtitleFormat, SubtitleTrack};

/// A staged copy of a subtitle track. The copy and its directory are removed
/// when this value is dropped.
#[derive(Debug)]
pub struct StagedSubtitle {
    path: PathBuf,
    format: SubtitleFormat,
    cues: Option<usize>,
    _dir: TempDir,
}

impl StagedSubtitle {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> SubtitleFormat {
        self.format
    }

    /// Number of cues kept after SRT normalization.
    pub fn cue_count(&self) -> Option<usize> {
        self.cues
    }
}

/// One SRT cue with times in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubtitleCue {
    pub index: usize,
    pub start_ms: u64,
    pub end_ms: u64,
    pub text: String,
}

/// Copy `track` into a fresh temporary directory.
pub fn stage_subtitle(track: &SubtitleTrack) -> GreensubResult<StagedSubtitle> {
    let bytes = std::fs::read(&track.path).map_err(|e| {
        GreensubError::validation(
            "subtitle.path",
            format!("cannot read {}: {e}", track.path.display()),
        )
    })?;
    let text = normalize_line_endings(&decode_text(&bytes));

    let (content, cues) = match track.format {
        SubtitleFormat::Srt => {
            let cues = parse_srt(&text);
            if cues.is_empty() {
                tracing::warn!(path = %track.path.display(), "Subtitle file contains no cues");
            }
            (write_srt(&cues), Some(cues.len()))
        }
        SubtitleFormat::Ass | SubtitleFormat::Vtt => (text, None),
    };

    let dir = tempfile::Builder::new().prefix("greensub-").tempdir()?;
    let path = dir.path().join(format!(
        "sub_{}.{}",
        Uuid::new_v4().simple(),
        track.format.extension()
    ));
    std::fs::write(&path, content)?;

    tracing::debug!(
        source = %track.path.display(),
        staged = %path.display(),
        cues,
        "Subtitle staged"
    );

    Ok(StagedSubtitle {
        path,
        format: track.format,
        cues,
        _dir: dir,
    })
}

/// Decode subtitle bytes: UTF-8 or UTF-16 with a byte order mark, then plain
/// UTF-8, falling back to Latin-1 which accepts any byte sequence.
pub fn decode_text(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        return String::from_utf8_lossy(rest).into_owned();
    }
    if let Some(rest) = bytes.strip_prefix(&[0xFF, 0xFE]) {
        return decode_utf16(rest, u16::from_le_bytes);
    }
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        return decode_utf16(rest, u16::from_be_bytes);
    }
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => bytes.iter().map(|&b| char::from(b)).collect(),
    }
}

fn decode_utf16(bytes: &[u8], unit: fn([u8; 2]) -> u16) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| unit([pair[0], pair[1]]))
        .collect();
    String::from_utf16_lossy(&units)
}

fn normalize_line_endings(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}

fn timecode_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(\d{1,2}):(\d{2}):(\d{2})[,.](\d{1,3})\s*-->\s*(\d{1,2}):(\d{2}):(\d{2})[,.](\d{1,3})",
        )
        .unwrap_or_else(|e| unreachable!("timecode pattern is valid: {e}"))
    })
}

fn is_cue_number(line: &str) -> bool {
    let line = line.trim();
    !line.is_empty() && line.bytes().all(|b| b.is_ascii_digit())
}

/// Parse SRT text leniently. Cue numbers are optional and ignored, lines
/// that are neither a number nor a timecode are skipped, and cues are
/// renumbered from 1.
pub fn parse_srt(text: &str) -> Vec<SubtitleCue> {
    let text = normalize_line_endings(text);
    let lines: Vec<&str> = text.trim().split('\n').collect();
    let pattern = timecode_pattern();

    let mut cues = Vec::new();
    let mut i = 0;
    while i < lines.len() {
        if lines[i].trim().is_empty() {
            i += 1;
            continue;
        }
        if is_cue_number(lines[i]) {
            i += 1;
            if i >= lines.len() {
                break;
            }
        }

        let Some(caps) = pattern.captures(lines[i].trim()) else {
            i += 1;
            continue;
        };
        i += 1;
        let group = |n: usize| caps.get(n).map_or("", |m| m.as_str());
        let start_ms = timecode_ms(group(1), group(2), group(3), group(4));
        let end_ms = timecode_ms(group(5), group(6), group(7), group(8));

        let mut text_lines = Vec::new();
        while i < lines.len() {
            let line = lines[i];
            if line.trim().is_empty() {
                break;
            }
            let next_is_timecode = lines
                .get(i + 1)
                .is_some_and(|next| pattern.is_match(next));
            if is_cue_number(line) && next_is_timecode {
                break;
            }
            text_lines.push(line);
            i += 1;
        }

        cues.push(SubtitleCue {
            index: cues.len() + 1,
            start_ms,
            end_ms,
            text: text_lines.join("\n"),
        });
    }
    cues
}

/// Render cues in canonical `HH:MM:SS,mmm` form, one blank line between
/// cues and a trailing newline.
pub fn write_srt(cues: &[SubtitleCue]) -> String {
    let blocks: Vec<String> = cues
        .iter()
        .enumerate()
        .map(|(i, cue)| {
            format!(
                "{}\n{} --> {}\n{}",
                i + 1,
                format_timecode(cue.start_ms),
                format_timecode(cue.end_ms),
                cue.text
            )
        })
        .collect();
    let mut out = blocks.join("\n\n");
    out.push('\n');
    out
}

/// Normalize SRT text without touching the filesystem.
pub fn normalize_srt(text: &str) -> String {
    write_srt(&parse_srt(text))
}

fn timecode_ms(hours: &str, minutes: &str, seconds: &str, fraction: &str) -> u64 {
    let field = |s: &str| s.parse::<u64>().unwrap_or(0);
    // A short fraction is tenths or hundredths: ",07" is 70 ms.
    let millis = field(&format!("{fraction:0<3}"));
    (field(hours) * 3600 + field(minutes) * 60 + field(seconds)) * 1000 + millis
}

fn format_timecode(ms: u64) -> String {
    let hours = ms / 3_600_000;
    let minutes = (ms % 3_600_000) / 60_000;
    let seconds = (ms % 60_000) / 1000;
    let millis = ms % 1000;
    format!("{hours:02}:{minutes:02}:{seconds:02},{millis:03}")
}
