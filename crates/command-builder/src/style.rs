//! Translation of a [`SubtitleStyle`] into libass `force_style` overrides.

use greensub_job_model::{Canvas, Rgba, SubtitleFormat, SubtitleStyle};

use crate::color::ass_color;

/// ASS numpad alignment for bottom-centre.
const ALIGN_BOTTOM_CENTER: u8 = 2;

/// ASS border style "outline plus drop shadow".
const BORDER_OUTLINE_SHADOW: u8 = 1;

/// Ordered `Key=Value` overrides for the subtitles filter.
///
/// Plain-text formats are rendered against a default 384x288 script
/// resolution; pinning `PlayResX`/`PlayResY` to the canvas makes sizes and
/// margins count in output pixels. ASS files keep their own resolution.
pub fn style_overrides(
    style: &SubtitleStyle,
    canvas: Canvas,
    format: SubtitleFormat,
) -> Vec<(&'static str, String)> {
    let outline = style.outline_color.with_opacity_percent(style.outline_opacity);
    let shadow = Rgba::BLACK.with_opacity_percent(style.shadow.opacity);

    let mut overrides = Vec::with_capacity(14);
    if !format.is_styled() {
        overrides.push(("PlayResX", canvas.width.to_string()));
        overrides.push(("PlayResY", canvas.height.to_string()));
    }
    overrides.extend([
        ("FontName", style.font_family.trim().to_string()),
        ("FontSize", style.font_size.to_string()),
        ("PrimaryColour", ass_color(style.text_color)),
        ("OutlineColour", ass_color(outline)),
        ("BackColour", ass_color(shadow)),
        ("Bold", ass_bool(style.bold).to_string()),
        ("Italic", ass_bool(style.italic).to_string()),
        ("BorderStyle", BORDER_OUTLINE_SHADOW.to_string()),
        ("Outline", style.outline_width.to_string()),
        ("Shadow", style.shadow.offset.to_string()),
        ("MarginV", style.margin.resolve(canvas.height).to_string()),
        ("Alignment", ALIGN_BOTTOM_CENTER.to_string()),
    ]);
    overrides
}

/// The `force_style` option value: overrides joined by `,`.
///
/// libass splits this on `,` and `=` with no escape mechanism, so values
/// must not contain either. Font family validation guarantees that for the
/// only free-text field.
pub fn force_style(style: &SubtitleStyle, canvas: Canvas, format: SubtitleFormat) -> String {
    style_overrides(style, canvas, format)
        .into_iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join(",")
}

fn ass_bool(flag: bool) -> i8 {
    if flag {
        -1
    } else {
        0
    }
}
