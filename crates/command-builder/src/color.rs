//! Color literals in the notations the engine understands.

use greensub_job_model::Rgba;

/// Encode a color as an ASS style color, `&HAABBGGRR`.
///
/// ASS stores transparency rather than opacity: `00` is opaque, `FF` is
/// invisible. Channels are written blue first.
pub fn ass_color(color: Rgba) -> String {
    format!(
        "&H{:02X}{:02X}{:02X}{:02X}",
        0xFF - color.a,
        color.b,
        color.g,
        color.r
    )
}

/// Decode an ASS style color. Accepts `&HAABBGGRR`, `&HBBGGRR` (opaque) and
/// an optional trailing `&`.
pub fn decode_ass_color(text: &str) -> Option<Rgba> {
    let hex = text
        .strip_prefix("&H")
        .or_else(|| text.strip_prefix("&h"))?;
    let hex = hex.strip_suffix('&').unwrap_or(hex);
    if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let value = u32::from_str_radix(hex, 16).ok()?;
    let byte = |shift: u32| ((value >> shift) & 0xFF) as u8;
    match hex.len() {
        6 => Some(Rgba::rgb(byte(0), byte(8), byte(16))),
        8 => Some(Rgba::rgba(byte(0), byte(8), byte(16), 0xFF - byte(24))),
        _ => None,
    }
}

/// Encode a color for lavfi sources and drawing filters: `0xRRGGBB`, or
/// `0xRRGGBBAA` when translucent.
pub fn engine_color(color: Rgba) -> String {
    if color.a == 0xFF {
        format!("0x{:02X}{:02X}{:02X}", color.r, color.g, color.b)
    } else {
        format!(
            "0x{:02X}{:02X}{:02X}{:02X}",
            color.r, color.g, color.b, color.a
        )
    }
}
