//! Job flags shared by every subcommand that builds a `JobSpec`.

use std::path::{Path, PathBuf};

use clap::{Args, ValueEnum};

use greensub_common::config::AppConfig;
use greensub_job_model::{
    Background, Canvas, Container, GuideToggle, Guides, JobMode, JobSpec, Margin, Orientation,
    Quality, Rgba, SubtitleTrack,
};

#[derive(Args, Debug)]
pub struct JobArgs {
    /// Subtitle file (.srt, .ass, .ssa or .vtt)
    #[arg(short, long)]
    pub subtitles: Option<PathBuf>,

    /// Font family
    #[arg(long)]
    pub font: Option<String>,

    /// Font size in pixels
    #[arg(long)]
    pub font_size: Option<u32>,

    #[arg(long)]
    pub bold: bool,

    #[arg(long)]
    pub italic: bool,

    /// Text color (#RRGGBB, #RRGGBBAA or a color name)
    #[arg(long)]
    pub text_color: Option<Rgba>,

    /// Outline color
    #[arg(long)]
    pub outline_color: Option<Rgba>,

    /// Outline opacity in percent
    #[arg(long)]
    pub outline_opacity: Option<u8>,

    /// Outline width in pixels
    #[arg(long)]
    pub outline_width: Option<u32>,

    /// Bottom margin in pixels, or a percentage of the height ("5%")
    #[arg(long, value_parser = parse_margin)]
    pub margin: Option<Margin>,

    /// Shadow offset in pixels
    #[arg(long)]
    pub shadow_offset: Option<u32>,

    /// Shadow opacity in percent
    #[arg(long)]
    pub shadow_opacity: Option<u8>,

    /// Draw the 80% title-safe guide for this aspect
    #[arg(long, value_enum)]
    pub title_safe: Option<GuideAspect>,

    /// Draw the 90% action-safe guide for this aspect
    #[arg(long, value_enum)]
    pub action_safe: Option<GuideAspect>,

    /// Background: green, blue, or any color
    #[arg(long, value_parser = parse_background, default_value = "green")]
    pub background: Background,

    /// Canvas width
    #[arg(long)]
    pub width: Option<u32>,

    /// Canvas height
    #[arg(long)]
    pub height: Option<u32>,

    /// Output frame rate
    #[arg(long)]
    pub fps: Option<u32>,

    /// Encoder id (software-h264, software-hevc, hardware-h264, hardware-hevc,
    /// nvenc-h264, nvenc-hevc)
    #[arg(long)]
    pub encoder: Option<String>,

    /// Quality preset: low, medium, best
    #[arg(long)]
    pub quality: Option<Quality>,

    /// Container: mp4, mov, mkv
    #[arg(long)]
    pub container: Option<Container>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum GuideAspect {
    Landscape,
    Portrait,
}

impl From<GuideAspect> for Orientation {
    fn from(aspect: GuideAspect) -> Self {
        match aspect {
            GuideAspect::Landscape => Orientation::Landscape,
            GuideAspect::Portrait => Orientation::Portrait,
        }
    }
}

impl JobArgs {
    /// Build a spec from the flags, filling gaps from the config defaults.
    pub fn to_spec(
        &self,
        config: &AppConfig,
        source: PathBuf,
        mode: JobMode,
        output: Option<PathBuf>,
    ) -> anyhow::Result<JobSpec> {
        let defaults = &config.defaults;
        let mut spec = JobSpec::render(source, PathBuf::new());
        spec.mode = mode;
        spec.output = output;

        if let Some(path) = &self.subtitles {
            spec.subtitle = Some(SubtitleTrack::from_path(path)?);
        }

        let style = &mut spec.style;
        if let Some(font) = &self.font {
            style.font_family = font.clone();
        }
        if let Some(size) = self.font_size {
            style.font_size = size;
        }
        style.bold = self.bold;
        style.italic = self.italic;
        if let Some(color) = self.text_color {
            style.text_color = color;
        }
        if let Some(color) = self.outline_color {
            style.outline_color = color;
        }
        if let Some(opacity) = self.outline_opacity {
            style.outline_opacity = opacity;
        }
        if let Some(width) = self.outline_width {
            style.outline_width = width;
        }
        if let Some(margin) = self.margin {
            style.margin = margin;
        }
        if let Some(offset) = self.shadow_offset {
            style.shadow.offset = offset;
        }
        if let Some(opacity) = self.shadow_opacity {
            style.shadow.opacity = opacity;
        }

        spec.guides = Guides {
            title_safe: self
                .title_safe
                .map_or_else(GuideToggle::off, |a| GuideToggle::on(a.into())),
            action_safe: self
                .action_safe
                .map_or_else(GuideToggle::off, |a| GuideToggle::on(a.into())),
        };
        spec.background = self.background;
        spec.canvas = Canvas {
            width: self.width.unwrap_or(defaults.width),
            height: self.height.unwrap_or(defaults.height),
        };
        spec.frame_rate = self.fps.unwrap_or(defaults.frame_rate);

        spec.encoding.encoder = self
            .encoder
            .clone()
            .unwrap_or_else(|| defaults.encoder.clone());
        spec.encoding.quality = match self.quality {
            Some(quality) => quality,
            None => defaults.quality.parse()?,
        };
        spec.encoding.container = match self.container {
            Some(container) => container,
            None => defaults.container.parse()?,
        };

        Ok(spec)
    }
}

/// `<dir>/<stem>_greensub.<ext>` next to the source.
pub fn default_output(source: &Path, container: Container) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    source.with_file_name(format!("{stem}_greensub.{}", container.extension()))
}

fn parse_margin(text: &str) -> Result<Margin, String> {
    let text = text.trim();
    match text.strip_suffix('%') {
        Some(pct) => pct
            .trim()
            .parse::<u8>()
            .map(Margin::Percent)
            .map_err(|e| format!("invalid percentage {text:?}: {e}")),
        None => text
            .parse::<u32>()
            .map(Margin::Pixels)
            .map_err(|e| format!("invalid pixel margin {text:?}: {e}")),
    }
}

fn parse_background(text: &str) -> Result<Background, String> {
    match text.trim().to_ascii_lowercase().as_str() {
        "green" => Ok(Background::Green),
        "blue" => Ok(Background::Blue),
        _ => text
            .parse::<Rgba>()
            .map(Background::Custom)
            .map_err(|e| e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_margin() {
        assert_eq!(parse_margin("60"), Ok(Margin::Pixels(60)));
        assert_eq!(parse_margin("5%"), Ok(Margin::Percent(5)));
        assert!(parse_margin("five").is_err());
    }

    #[test]
    fn test_parse_background() {
        assert_eq!(parse_background("Blue"), Ok(Background::Blue));
        assert_eq!(
            parse_background("#FF00FF"),
            Ok(Background::Custom(Rgba::rgb(0xFF, 0x00, 0xFF)))
        );
        assert!(parse_background("chartreuse-ish").is_err());
    }

    #[test]
    fn test_default_output_sits_next_to_source() {
        assert_eq!(
            default_output(Path::new("/clips/interview.mov"), Container::Mkv),
            PathBuf::from("/clips/interview_greensub.mkv")
        );
    }
}
