//! Print the engine command for a job without running it.

use std::path::PathBuf;

use greensub_command_builder::build_plan;
use greensub_common::config::AppConfig;
use greensub_job_model::JobMode;

use crate::args::{default_output, JobArgs};

pub fn run(
    config: &AppConfig,
    source: PathBuf,
    output: Option<PathBuf>,
    at: Option<f64>,
    json: bool,
    job: JobArgs,
) -> anyhow::Result<()> {
    let mode = match at {
        Some(at_secs) => JobMode::Preview { at_secs },
        None => JobMode::Render,
    };
    let mut spec = job.to_spec(config, source, mode, None)?;
    let output = match (output, mode) {
        (Some(output), _) => output,
        (None, JobMode::Render) => default_output(&spec.source, spec.encoding.container),
        (None, JobMode::Preview { .. }) => PathBuf::from("preview.png"),
    };
    if mode == JobMode::Render {
        spec.output = Some(output.clone());
    }

    let plan = build_plan(&spec, &output)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    println!("Filter graph:");
    for chain in plan.filter_graph().split(';') {
        println!("  {chain}");
    }
    println!();
    println!("Command:");
    let mut line = vec![config.engine.ffmpeg.display().to_string()];
    line.extend(plan.full_args()?.iter().map(|arg| shell_quote(arg)));
    println!("  {}", line.join(" "));
    Ok(())
}

/// Quote `arg` for a POSIX shell when it contains anything unusual.
fn shell_quote(arg: &str) -> String {
    let plain = !arg.is_empty()
        && arg
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b"-_./:=+,@%".contains(&b));
    if plain {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', r"'\''"))
    }
}
