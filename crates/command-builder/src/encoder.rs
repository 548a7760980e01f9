//! Encoder identifiers and the engine flags each one maps to.

use greensub_common::error::{GreensubError, GreensubResult};
use greensub_job_model::{Container, Quality};

/// How an encoder family expresses the quality preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateControl {
    /// Software encoders: constant rate factor plus a speed preset.
    Crf { low: u8, medium: u8, best: u8 },
    /// VideoToolbox constant quality (higher is better).
    ConstantQuality { low: u8, medium: u8, best: u8 },
    /// NVENC variable bitrate with a constant-quality target.
    NvencCq { low: u8, medium: u8, best: u8 },
}

/// One selectable encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderProfile {
    /// Identifier accepted in a job spec.
    pub id: &'static str,
    /// Engine codec name, also accepted as an identifier.
    pub codec: &'static str,
    /// Hardware decode backend passed as `-hwaccel`.
    pub hwaccel: Option<&'static str>,
    pub rate_control: RateControl,
    /// HEVC output needs the `hvc1` tag to play in QuickTime-family players.
    pub hevc: bool,
}

pub const ENCODERS: &[EncoderProfile] = &[
    EncoderProfile {
        id: "software-h264",
        codec: "libx264",
        hwaccel: None,
        rate_control: RateControl::Crf {
            low: 28,
            medium: 20,
            best: 14,
        },
        hevc: false,
    },
    EncoderProfile {
        id: "software-hevc",
        codec: "libx265",
        hwaccel: None,
        rate_control: RateControl::Crf {
            low: 32,
            medium: 24,
            best: 16,
        },
        hevc: true,
    },
    EncoderProfile {
        id: "hardware-h264",
        codec: "h264_videotoolbox",
        hwaccel: Some("videotoolbox"),
        rate_control: RateControl::ConstantQuality {
            low: 45,
            medium: 60,
            best: 75,
        },
        hevc: false,
    },
    EncoderProfile {
        id: "hardware-hevc",
        codec: "hevc_videotoolbox",
        hwaccel: Some("videotoolbox"),
        rate_control: RateControl::ConstantQuality {
            low: 45,
            medium: 60,
            best: 75,
        },
        hevc: true,
    },
    EncoderProfile {
        id: "nvenc-h264",
        codec: "h264_nvenc",
        hwaccel: Some("cuda"),
        rate_control: RateControl::NvencCq {
            low: 30,
            medium: 23,
            best: 17,
        },
        hevc: false,
    },
    EncoderProfile {
        id: "nvenc-hevc",
        codec: "hevc_nvenc",
        hwaccel: Some("cuda"),
        rate_control: RateControl::NvencCq {
            low: 32,
            medium: 25,
            best: 19,
        },
        hevc: true,
    },
];

/// Find an encoder by identifier or engine codec name (case-insensitive).
pub fn lookup_encoder(id: &str) -> GreensubResult<&'static EncoderProfile> {
    let wanted = id.trim();
    ENCODERS
        .iter()
        .find(|e| e.id.eq_ignore_ascii_case(wanted) || e.codec.eq_ignore_ascii_case(wanted))
        .ok_or_else(|| {
            let known: Vec<&str> = ENCODERS.iter().map(|e| e.id).collect();
            GreensubError::validation(
                "encoding.encoder",
                format!("unsupported encoder {wanted:?} (known: {})", known.join(", ")),
            )
        })
}

impl EncoderProfile {
    /// Flags placed before the input.
    pub fn input_args(&self) -> Vec<String> {
        match self.hwaccel {
            Some(backend) => vec!["-hwaccel".to_string(), backend.to_string()],
            None => Vec::new(),
        }
    }

    /// Video codec and rate-control flags.
    pub fn video_args(&self, quality: Quality, container: Container) -> Vec<String> {
        let mut args = vec!["-c:v".to_string(), self.codec.to_string()];
        match self.rate_control {
            RateControl::Crf { low, medium, best } => {
                let (crf, preset) = match quality {
                    Quality::Low => (low, "fast"),
                    Quality::Medium => (medium, "medium"),
                    Quality::Best => (best, "slow"),
                };
                args.extend([
                    "-crf".to_string(),
                    crf.to_string(),
                    "-preset".to_string(),
                    preset.to_string(),
                ]);
            }
            RateControl::ConstantQuality { low, medium, best } => {
                args.extend([
                    "-q:v".to_string(),
                    pick(quality, low, medium, best).to_string(),
                ]);
            }
            RateControl::NvencCq { low, medium, best } => {
                args.extend([
                    "-rc".to_string(),
                    "vbr".to_string(),
                    "-cq".to_string(),
                    pick(quality, low, medium, best).to_string(),
                    "-b:v".to_string(),
                    "0".to_string(),
                ]);
            }
        }
        if self.hevc && container.supports_faststart() {
            args.extend(["-tag:v".to_string(), "hvc1".to_string()]);
        }
        args
    }
}

/// AAC audio flags for a quality preset.
pub fn audio_args(quality: Quality) -> Vec<String> {
    let kbps = pick(quality, 128, 192, 320);
    vec![
        "-c:a".to_string(),
        "aac".to_string(),
        "-b:a".to_string(),
        format!("{kbps}k"),
    ]
}

/// Muxer selection plus container-specific flags.
pub fn container_args(container: Container) -> Vec<String> {
    let muxer = match container {
        Container::Mp4 => "mp4",
        Container::Mov => "mov",
        Container::Mkv => "matroska",
    };
    let mut args = vec!["-f".to_string(), muxer.to_string()];
    if container.supports_faststart() {
        args.extend(["-movflags".to_string(), "+faststart".to_string()]);
    }
    args
}

fn pick<T>(quality: Quality, low: T, medium: T, best: T) -> T {
    match quality {
        Quality::Low => low,
        Quality::Medium => medium,
        Quality::Best => best,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_by_id_and_codec() {
        assert_eq!(lookup_encoder("hardware-h264").unwrap().codec, "h264_videotoolbox");
        assert_eq!(lookup_encoder("LIBX265").unwrap().id, "software-hevc");
        let err = lookup_encoder("prores").unwrap_err();
        assert!(err.to_string().contains("encoding.encoder"));
    }

    #[test]
    fn test_software_uses_crf() {
        let args = lookup_encoder("software-h264")
            .unwrap()
            .video_args(Quality::Best, Container::Mp4);
        assert_eq!(args, ["-c:v", "libx264", "-crf", "14", "-preset", "slow"]);
    }

    #[test]
    fn test_hardware_uses_constant_quality() {
        let profile = lookup_encoder("hardware-hevc").unwrap();
        assert_eq!(profile.input_args(), ["-hwaccel", "videotoolbox"]);
        assert_eq!(
            profile.video_args(Quality::Medium, Container::Mov),
            ["-c:v", "hevc_videotoolbox", "-q:v", "60", "-tag:v", "hvc1"]
        );
        assert_eq!(
            profile.video_args(Quality::Medium, Container::Mkv),
            ["-c:v", "hevc_videotoolbox", "-q:v", "60"]
        );
    }

    #[test]
    fn test_nvenc_flags() {
        let args = lookup_encoder("nvenc-h264")
            .unwrap()
            .video_args(Quality::Low, Container::Mkv);
        assert_eq!(args, ["-c:v", "h264_nvenc", "-rc", "vbr", "-cq", "30", "-b:v", "0"]);
    }

    #[test]
    fn test_audio_and_container_flags() {
        assert_eq!(audio_args(Quality::Best), ["-c:a", "aac", "-b:a", "320k"]);
        assert_eq!(
            container_args(Container::Mp4),
            ["-f", "mp4", "-movflags", "+faststart"]
        );
        assert_eq!(container_args(Container::Mkv), ["-f", "matroska"]);
    }
}
