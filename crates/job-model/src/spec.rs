//! The job specification handed to the builder.

use std::fs::File;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use greensub_common::error::{GreensubError, GreensubResult};

use crate::encoding::Encoding;
use crate::layout::{Background, Canvas, Guides};
use crate::style::SubtitleStyle;

/// Largest accepted output frame rate.
pub const MAX_FRAME_RATE: u32 = 240;

/// Subtitle file format. Determines the decoder the engine uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubtitleFormat {
    Srt,
    Ass,
    Vtt,
}

impl SubtitleFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            SubtitleFormat::Srt => "srt",
            SubtitleFormat::Ass => "ass",
            SubtitleFormat::Vtt => "vtt",
        }
    }

    /// Guess the format from a file extension (`.ssa` is read as ASS).
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "srt" => Some(SubtitleFormat::Srt),
            "ass" | "ssa" => Some(SubtitleFormat::Ass),
            "vtt" => Some(SubtitleFormat::Vtt),
            _ => None,
        }
    }

    /// Whether the file carries its own styling that overrides may clash with.
    pub fn is_styled(&self) -> bool {
        matches!(self, SubtitleFormat::Ass)
    }
}

/// A subtitle file and its declared format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtitleTrack {
    pub path: PathBuf,
    pub format: SubtitleFormat,
}

impl SubtitleTrack {
    pub fn new(path: impl Into<PathBuf>, format: SubtitleFormat) -> Self {
        Self {
            path: path.into(),
            format,
        }
    }

    /// Track whose format is inferred from the file extension.
    pub fn from_path(path: impl Into<PathBuf>) -> GreensubResult<Self> {
        let path = path.into();
        let format = SubtitleFormat::from_path(&path).ok_or_else(|| {
            GreensubError::validation(
                "subtitle.format",
                format!("cannot infer format of {}", path.display()),
            )
        })?;
        Ok(Self { path, format })
    }
}

/// What the engine should produce.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobMode {
    /// Full encode of the whole source.
    Render,
    /// A single frame at the given source timestamp.
    Preview { at_secs: f64 },
}

impl JobMode {
    pub fn is_preview(&self) -> bool {
        matches!(self, JobMode::Preview { .. })
    }
}

/// A complete, immutable description of one preview or render.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSpec {
    /// Source media file.
    pub source: PathBuf,

    /// Subtitle track to burn in, if any.
    #[serde(default)]
    pub subtitle: Option<SubtitleTrack>,

    #[serde(default)]
    pub style: SubtitleStyle,

    #[serde(default)]
    pub guides: Guides,

    #[serde(default)]
    pub background: Background,

    #[serde(default)]
    pub canvas: Canvas,

    #[serde(default = "default_frame_rate")]
    pub frame_rate: u32,

    #[serde(default)]
    pub encoding: Encoding,

    pub mode: JobMode,

    /// Final output path. Required for renders.
    #[serde(default)]
    pub output: Option<PathBuf>,
}

fn default_frame_rate() -> u32 {
    25
}

impl JobSpec {
    /// Render job with default style, layout and encoding.
    pub fn render(source: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            subtitle: None,
            style: SubtitleStyle::default(),
            guides: Guides::default(),
            background: Background::default(),
            canvas: Canvas::default(),
            frame_rate: default_frame_rate(),
            encoding: Encoding::default(),
            mode: JobMode::Render,
            output: Some(output.into()),
        }
    }

    /// Preview job for the frame at `at_secs`.
    pub fn preview(source: impl Into<PathBuf>, at_secs: f64) -> Self {
        Self {
            mode: JobMode::Preview { at_secs },
            output: None,
            ..Self::render(source, PathBuf::new())
        }
    }

    /// Copy of this spec reading subtitles from `path` instead.
    pub fn with_subtitle_path(&self, path: impl Into<PathBuf>) -> Self {
        let mut spec = self.clone();
        if let Some(track) = spec.subtitle.as_mut() {
            track.path = path.into();
        }
        spec
    }

    /// Copy of this spec writing to `output` instead.
    pub fn with_output(&self, output: impl Into<PathBuf>) -> Self {
        Self {
            output: Some(output.into()),
            ..self.clone()
        }
    }

    /// Field checks that need no filesystem access.
    pub fn validate(&self) -> GreensubResult<()> {
        if self.source.as_os_str().is_empty() {
            return Err(GreensubError::validation("source", "path is empty"));
        }
        if let Some(track) = &self.subtitle {
            if track.path.as_os_str().is_empty() {
                return Err(GreensubError::validation("subtitle.path", "path is empty"));
            }
        }
        self.style.validate()?;
        self.canvas.validate()?;

        if self.frame_rate == 0 || self.frame_rate > MAX_FRAME_RATE {
            return Err(GreensubError::validation(
                "frame_rate",
                format!("{} is out of range (1..={MAX_FRAME_RATE})", self.frame_rate),
            ));
        }
        if let JobMode::Preview { at_secs } = self.mode {
            if !at_secs.is_finite() || at_secs < 0.0 {
                return Err(GreensubError::validation(
                    "mode.at_secs",
                    format!("{at_secs} is not a valid timestamp"),
                ));
            }
        }
        if self.mode == JobMode::Render {
            match &self.output {
                None => {
                    return Err(GreensubError::validation(
                        "output",
                        "a render needs an output path",
                    ))
                }
                Some(output) if output == &self.source => {
                    return Err(GreensubError::validation(
                        "output",
                        "output would overwrite the source",
                    ))
                }
                Some(output) if output.file_name().is_none() => {
                    return Err(GreensubError::validation(
                        "output",
                        format!("{} does not name a file", output.display()),
                    ))
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    /// Filesystem checks: the source and subtitle must be readable files and
    /// the output directory must exist.
    pub fn check_inputs(&self) -> GreensubResult<()> {
        self.validate()?;
        check_readable("source", &self.source)?;
        if let Some(track) = &self.subtitle {
            check_readable("subtitle.path", &track.path)?;
        }
        if let (JobMode::Render, Some(output)) = (self.mode, &self.output) {
            if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
                if !parent.is_dir() {
                    return Err(GreensubError::validation(
                        "output",
                        format!("directory {} does not exist", parent.display()),
                    ));
                }
            }
        }
        Ok(())
    }
}

fn check_readable(field: &str, path: &Path) -> GreensubResult<()> {
    if path.is_dir() {
        return Err(GreensubError::validation(
            field,
            format!("{} is a directory", path.display()),
        ));
    }
    File::open(path).map_err(|e| {
        GreensubError::validation(field, format!("cannot read {}: {e}", path.display()))
    })?;
    Ok(())
}
