//! Subtitle style attributes.

use serde::{Deserialize, Serialize};

use greensub_common::error::{GreensubError, GreensubResult};

use crate::color::Rgba;

/// Largest accepted font size, in pixels.
pub const MAX_FONT_SIZE: u32 = 512;
/// Largest accepted font family name, in characters.
pub const MAX_FONT_FAMILY_LEN: usize = 128;
/// Largest accepted outline width or shadow offset, in pixels.
pub const MAX_STROKE_PX: u32 = 20;

/// How burned-in subtitles look.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtitleStyle {
    /// Font family name as known to the font provider (e.g. "Arial").
    pub font_family: String,

    /// Font size in pixels.
    pub font_size: u32,

    pub bold: bool,
    pub italic: bool,

    /// Fill color of the glyphs.
    pub text_color: Rgba,

    /// Outline color. Its own alpha is replaced by `outline_opacity`.
    pub outline_color: Rgba,

    /// Outline opacity in percent (0 = invisible, 100 = opaque).
    pub outline_opacity: u8,

    /// Outline stroke width in pixels (0 = no outline).
    #[serde(default = "default_outline_width")]
    pub outline_width: u32,

    /// Distance between the subtitle baseline area and the bottom edge.
    pub margin: Margin,

    /// Drop shadow below the glyphs.
    pub shadow: Shadow,
}

/// Vertical margin, in pixels or as a percentage of the frame height.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Margin {
    Pixels(u32),
    Percent(u8),
}

/// Drop shadow offset and opacity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Shadow {
    /// Offset in pixels (0 = no shadow).
    pub offset: u32,

    /// Opacity in percent.
    pub opacity: u8,
}

impl Margin {
    /// Margin in pixels for a frame of the given height.
    pub fn resolve(&self, frame_height: u32) -> u32 {
        match *self {
            Margin::Pixels(px) => px,
            Margin::Percent(pct) => {
                let pct = u64::from(pct.min(100));
                ((u64::from(frame_height) * pct + 50) / 100) as u32
            }
        }
    }
}

fn default_outline_width() -> u32 {
    2
}

impl Default for SubtitleStyle {
    fn default() -> Self {
        Self {
            font_family: "Arial".to_string(),
            font_size: 50,
            bold: false,
            italic: false,
            text_color: Rgba::WHITE,
            outline_color: Rgba::BLACK,
            outline_opacity: 100,
            outline_width: default_outline_width(),
            margin: Margin::Pixels(60),
            shadow: Shadow::default(),
        }
    }
}

impl Default for Shadow {
    fn default() -> Self {
        Self {
            offset: 2,
            opacity: 50,
        }
    }
}

impl SubtitleStyle {
    /// Check every style field, naming the first invalid one.
    pub fn validate(&self) -> GreensubResult<()> {
        validate_font_family(&self.font_family)?;

        if self.font_size == 0 || self.font_size > MAX_FONT_SIZE {
            return Err(GreensubError::validation(
                "style.font_size",
                format!(
                    "{} is out of range (1..={MAX_FONT_SIZE})",
                    self.font_size
                ),
            ));
        }
        if self.outline_opacity > 100 {
            return Err(GreensubError::validation(
                "style.outline_opacity",
                format!("{} is not a percentage", self.outline_opacity),
            ));
        }
        if self.outline_width > MAX_STROKE_PX {
            return Err(GreensubError::validation(
                "style.outline_width",
                format!("{} exceeds {MAX_STROKE_PX}px", self.outline_width),
            ));
        }
        if let Margin::Percent(pct) = self.margin {
            if pct > 100 {
                return Err(GreensubError::validation(
                    "style.margin",
                    format!("{pct}% is not a percentage"),
                ));
            }
        }
        if self.shadow.offset > MAX_STROKE_PX {
            return Err(GreensubError::validation(
                "style.shadow.offset",
                format!("{} exceeds {MAX_STROKE_PX}px", self.shadow.offset),
            ));
        }
        if self.shadow.opacity > 100 {
            return Err(GreensubError::validation(
                "style.shadow.opacity",
                format!("{} is not a percentage", self.shadow.opacity),
            ));
        }
        Ok(())
    }
}

// The subtitle renderer splits style overrides on ',' and '=' without any
// escape mechanism, so those characters can never reach it inside a name.
fn validate_font_family(family: &str) -> GreensubResult<()> {
    let field = "style.font_family";
    if family.trim().is_empty() {
        return Err(GreensubError::validation(field, "must not be empty"));
    }
    if family.chars().count() > MAX_FONT_FAMILY_LEN {
        return Err(GreensubError::validation(
            field,
            format!("longer than {MAX_FONT_FAMILY_LEN} characters"),
        ));
    }
    if let Some(bad) = family
        .chars()
        .find(|c| *c == ',' || *c == '=' || c.is_control())
    {
        return Err(GreensubError::validation(
            field,
            format!("contains unsupported character {bad:?}"),
        ));
    }
    Ok(())
}
