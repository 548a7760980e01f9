//! GreenSub Process Runner
//!
//! Executes one [`CommandPlan`](greensub_command_builder::CommandPlan) as an
//! engine process on the tokio runtime and reports back through channels:
//! - `RunEvent`s (start, progress, stall, completion) on an mpsc channel
//! - `JobStatus` snapshots on a watch channel
//! - cancellation through a `CancellationToken`
//!
//! Render output is written to a hidden staging file next to the declared
//! output and only renamed into place once the engine exits cleanly.

pub mod diagnostics;
pub mod engine;
pub mod handle;
pub mod progress;
pub mod runner;

pub use diagnostics::DiagnosticTail;
pub use engine::locate_program;
pub use handle::{JobHandle, JobState, JobStatus};
pub use progress::{ProgressEvent, ProgressParser, ProgressSample, ProgressTracker};
pub use runner::{staging_path, Completion, ProcessRunner, RunEvent, RunningJob};
