//! GreenSub Command Builder
//!
//! Turns a [`JobSpec`](greensub_job_model::JobSpec) into the exact argument
//! list handed to the engine. Nothing in this crate touches the filesystem or
//! spawns processes; the same spec always yields the same plan.
//!
//! # Graph layout
//!
//! ```text
//! color ──────────────────────┐
//!                             ├── overlay ── [drawbox…] ── [subtitles] ── format ── [vout]
//! [0:v] ── scale ── setsar ───┘
//! ```
//!
//! Bracketed stages are omitted entirely when the job does not ask for them.

pub mod color;
pub mod encoder;
pub mod escape;
pub mod graph;
pub mod plan;
pub mod style;

pub use color::{ass_color, decode_ass_color, engine_color};
pub use encoder::{lookup_encoder, EncoderProfile};
pub use graph::{build_graph, FilterGraph};
pub use plan::{build_plan, CommandPlan};
