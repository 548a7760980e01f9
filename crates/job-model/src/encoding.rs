//! Encoder choice, quality presets, and output containers.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use greensub_common::error::GreensubError;

/// Encoding parameters for a full render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Encoding {
    /// Encoder identifier naming a codec and backend (e.g. "hardware-h264").
    pub encoder: String,

    pub quality: Quality,

    pub container: Container,
}

impl Default for Encoding {
    fn default() -> Self {
        Self {
            encoder: "software-h264".to_string(),
            quality: Quality::Medium,
            container: Container::Mp4,
        }
    }
}

/// Quality preset. Each encoder family maps it to its own rate-control flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    Low,
    #[default]
    Medium,
    Best,
}

/// Output container format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Container {
    #[default]
    Mp4,
    Mov,
    Mkv,
}

impl Container {
    /// Conventional file extension.
    pub fn extension(&self) -> &'static str {
        match self {
            Container::Mp4 => "mp4",
            Container::Mov => "mov",
            Container::Mkv => "mkv",
        }
    }

    /// Whether the container benefits from moving the index to the front.
    pub fn supports_faststart(&self) -> bool {
        matches!(self, Container::Mp4 | Container::Mov)
    }
}

impl FromStr for Quality {
    type Err = GreensubError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Quality::Low),
            "medium" => Ok(Quality::Medium),
            "best" | "high" => Ok(Quality::Best),
            other => Err(GreensubError::validation(
                "encoding.quality",
                format!("unknown preset {other:?} (use low, medium, best)"),
            )),
        }
    }
}

impl FromStr for Container {
    type Err = GreensubError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mp4" => Ok(Container::Mp4),
            "mov" => Ok(Container::Mov),
            "mkv" | "matroska" => Ok(Container::Mkv),
            other => Err(GreensubError::validation(
                "encoding.container",
                format!("unknown container {other:?} (use mp4, mov, mkv)"),
            )),
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Quality::Low => "low",
            Quality::Medium => "medium",
            Quality::Best => "best",
        })
    }
}

impl fmt::Display for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}
