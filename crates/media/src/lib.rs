//! GreenSub Media
//!
//! The caller-facing surface of the render core:
//! - `MediaFacade::request_preview` renders one frame and decodes it
//! - `MediaFacade::request_render` starts the single active render and
//!   returns its event stream
//! - `MediaFacade::cancel_active_render` stops it
//!
//! Subtitle files are staged into private temporary copies before every
//! job, and the source is probed for its duration so renders can report a
//! completion ratio.

pub mod facade;
pub mod probe;
pub mod subtitles;

pub use facade::{FrameImage, MediaFacade, RenderEvent, RenderStream};
pub use probe::{parse_probe_output, MediaInfo, MediaProbe};
pub use subtitles::{stage_subtitle, StagedSubtitle, SubtitleCue};
