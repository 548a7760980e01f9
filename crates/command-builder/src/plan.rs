//! Command plans: the argument list for one engine invocation.

use std::path::{Path, PathBuf};

use serde::Serialize;

use greensub_common::error::{GreensubError, GreensubResult};
use greensub_job_model::{Container, JobMode, JobSpec};

use crate::encoder::{audio_args, container_args, lookup_encoder};
use crate::escape::path_argument;
use crate::graph::{build_graph, OUTPUT_LABEL};

/// Flags shared by every invocation. Diagnostics on stderr are limited to
/// errors so the failure excerpt stays readable.
const COMMON_ARGS: &[&str] = &["-y", "-hide_banner", "-loglevel", "error", "-nostats"];

/// Everything the runner needs to start the engine.
///
/// `args` stops short of the output target; [`CommandPlan::command_line`]
/// appends it so the runner can redirect output to a staging file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommandPlan {
    mode: JobMode,
    args: Vec<String>,
    filter_graph: String,
    output: PathBuf,
    container: Option<Container>,
}

impl CommandPlan {
    pub fn mode(&self) -> JobMode {
        self.mode
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn filter_graph(&self) -> &str {
        &self.filter_graph
    }

    /// The declared output path.
    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Output container; `None` for previews.
    pub fn container(&self) -> Option<Container> {
        self.container
    }

    /// Full argument list writing to `target`.
    pub fn command_line(&self, target: &Path) -> GreensubResult<Vec<String>> {
        let mut args = self.args.clone();
        args.push(path_argument(target, "output")?);
        Ok(args)
    }

    /// Argument list writing to the declared output.
    pub fn full_args(&self) -> GreensubResult<Vec<String>> {
        self.command_line(&self.output)
    }
}

/// Build the plan for `spec`, writing to `output`.
///
/// For renders `output` is the final file; for previews it is the image path.
pub fn build_plan(spec: &JobSpec, output: &Path) -> GreensubResult<CommandPlan> {
    spec.validate()?;
    let encoder = lookup_encoder(&spec.encoding.encoder)?;
    let source = path_argument(&spec.source, "source")?;
    path_argument(output, "output")?;
    if output.file_name().is_none() {
        return Err(GreensubError::validation(
            "output",
            format!("{} does not name a file", output.display()),
        ));
    }

    let graph = build_graph(spec)?;
    let filter_graph = graph.to_string();
    let video_map = format!("[{OUTPUT_LABEL}]");

    let mut args: Vec<String> = COMMON_ARGS.iter().map(|s| s.to_string()).collect();
    let container = match spec.mode {
        JobMode::Render => {
            let container = spec.encoding.container;
            args.extend(["-progress".to_string(), "pipe:1".to_string()]);
            args.extend(encoder.input_args());
            args.extend(["-i".to_string(), source]);
            args.extend(["-filter_complex".to_string(), filter_graph.clone()]);
            args.extend([
                "-map".to_string(),
                video_map,
                "-map".to_string(),
                "0:a?".to_string(),
            ]);
            args.extend(["-r".to_string(), spec.frame_rate.to_string()]);
            args.extend(encoder.video_args(spec.encoding.quality, container));
            args.extend(audio_args(spec.encoding.quality));
            args.extend(container_args(container));
            Some(container)
        }
        JobMode::Preview { at_secs } => {
            // Seeking after the inputs keeps source, background and subtitle
            // timestamps aligned with a full render.
            args.extend(["-i".to_string(), source]);
            args.extend(["-filter_complex".to_string(), filter_graph.clone()]);
            args.extend(["-map".to_string(), video_map]);
            args.extend(["-ss".to_string(), format!("{at_secs:.3}")]);
            args.extend(
                ["-frames:v", "1", "-c:v", "png", "-f", "image2", "-update", "1"]
                    .iter()
                    .map(|s| s.to_string()),
            );
            None
        }
    };

    tracing::debug!(
        mode = ?spec.mode,
        encoder = encoder.id,
        nodes = graph.node_names().len(),
        filter_len = filter_graph.len(),
        "Command plan built"
    );

    Ok(CommandPlan {
        mode: spec.mode,
        args,
        filter_graph,
        output: output.to_path_buf(),
        container,
    })
}
