//! Frame layout: canvas size, orientation, safe-area guides, and background.

use serde::{Deserialize, Serialize};

use greensub_common::error::{GreensubError, GreensubResult};

use crate::color::Rgba;

/// Smallest accepted canvas side, in pixels.
pub const MIN_CANVAS_SIDE: u32 = 16;
/// Largest accepted canvas side, in pixels.
pub const MAX_CANVAS_SIDE: u32 = 8192;

/// Frame orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Orientation {
    /// 16:9
    #[default]
    Landscape,
    /// 9:16
    Portrait,
}

impl Orientation {
    /// Width-to-height ratio as `(width, height)` units.
    pub fn aspect(&self) -> (u32, u32) {
        match self {
            Orientation::Landscape => (16, 9),
            Orientation::Portrait => (9, 16),
        }
    }
}

/// Output frame size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Canvas {
    pub width: u32,
    pub height: u32,
}

impl Canvas {
    pub const FULL_HD: Canvas = Canvas {
        width: 1920,
        height: 1080,
    };

    /// Canvas with the given orientation whose short side is `short_side`.
    pub fn for_orientation(orientation: Orientation, short_side: u32) -> Self {
        let (w, h) = orientation.aspect();
        let long_side = short_side * 16 / 9;
        if w > h {
            Self {
                width: long_side,
                height: short_side,
            }
        } else {
            Self {
                width: short_side,
                height: long_side,
            }
        }
        .even()
    }

    /// Orientation implied by the frame size (square counts as landscape).
    pub fn orientation(&self) -> Orientation {
        if self.height > self.width {
            Orientation::Portrait
        } else {
            Orientation::Landscape
        }
    }

    /// Same canvas with odd sides rounded up; 4:2:0 output needs even sizes.
    pub fn even(&self) -> Self {
        Self {
            width: self.width + self.width % 2,
            height: self.height + self.height % 2,
        }
    }

    pub fn validate(&self) -> GreensubResult<()> {
        for (name, side) in [("canvas.width", self.width), ("canvas.height", self.height)] {
            if !(MIN_CANVAS_SIDE..=MAX_CANVAS_SIDE).contains(&side) {
                return Err(GreensubError::validation(
                    name,
                    format!("{side} is out of range ({MIN_CANVAS_SIDE}..={MAX_CANVAS_SIDE})"),
                ));
            }
        }
        Ok(())
    }
}

impl Default for Canvas {
    fn default() -> Self {
        Self::FULL_HD
    }
}

/// One safe-area guide toggle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GuideToggle {
    pub enabled: bool,
    pub orientation: Orientation,
}

impl GuideToggle {
    pub fn on(orientation: Orientation) -> Self {
        Self {
            enabled: true,
            orientation,
        }
    }

    pub fn off() -> Self {
        Self::default()
    }
}

/// Title-safe (80%) and action-safe (90%) guide overlays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Guides {
    pub title_safe: GuideToggle,
    pub action_safe: GuideToggle,
}

impl Guides {
    pub fn any_enabled(&self) -> bool {
        self.title_safe.enabled || self.action_safe.enabled
    }
}

/// Solid background behind the source video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Background {
    #[default]
    Green,
    Blue,
    Custom(Rgba),
}

impl Background {
    /// The background as an opaque color; chroma-key backgrounds ignore alpha.
    pub fn color(&self) -> Rgba {
        match self {
            Background::Green => Rgba::GREEN,
            Background::Blue => Rgba::BLUE,
            Background::Custom(color) => color.with_alpha(0xFF),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canvas_for_orientation() {
        assert_eq!(
            Canvas::for_orientation(Orientation::Landscape, 1080),
            Canvas::FULL_HD
        );
        assert_eq!(
            Canvas::for_orientation(Orientation::Portrait, 1080),
            Canvas {
                width: 1080,
                height: 1920
            }
        );
        assert_eq!(
            Canvas::for_orientation(Orientation::Portrait, 1080).orientation(),
            Orientation::Portrait
        );
    }

    #[test]
    fn test_canvas_even_rounds_up() {
        let canvas = Canvas {
            width: 1279,
            height: 721,
        };
        assert_eq!(
            canvas.even(),
            Canvas {
                width: 1280,
                height: 722
            }
        );
    }

    #[test]
    fn test_canvas_validation_names_side() {
        let err = Canvas {
            width: 1920,
            height: 8,
        }
        .validate()
        .unwrap_err();
        assert!(err.to_string().contains("canvas.height"));
    }

    #[test]
    fn test_background_colors() {
        assert_eq!(Background::Green.color(), Rgba::GREEN);
        assert_eq!(Background::Blue.color(), Rgba::BLUE);
        assert_eq!(
            Background::Custom(Rgba::rgba(10, 20, 30, 40)).color(),
            Rgba::rgb(10, 20, 30)
        );
    }

    #[test]
    fn test_background_serde_shape() {
        let green: Background = serde_json::from_str("\"green\"").unwrap();
        assert_eq!(green, Background::Green);
        let custom: Background = serde_json::from_str(r##"{"custom":"#FF00FF"}"##).unwrap();
        assert_eq!(custom, Background::Custom(Rgba::rgb(0xFF, 0x00, 0xFF)));
    }
}
