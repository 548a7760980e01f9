//! Render a single preview frame.

use std::path::PathBuf;

use greensub_common::config::AppConfig;
use greensub_job_model::JobMode;
use greensub_media::MediaFacade;

use crate::args::JobArgs;

pub async fn run(
    config: &AppConfig,
    source: PathBuf,
    at: f64,
    output: PathBuf,
    job: JobArgs,
) -> anyhow::Result<()> {
    let spec = job.to_spec(config, source, JobMode::Preview { at_secs: at }, None)?;
    let facade = MediaFacade::from_config(config);

    println!("Rendering preview of {} at {at:.3}s", spec.source.display());
    let frame = facade.request_preview(spec).await?;
    frame.save_png(&output)?;
    tracing::debug!(output = %output.display(), at_secs = frame.at_secs, "Preview written");
    println!(
        "Preview saved: {} ({}x{})",
        output.display(),
        frame.width,
        frame.height
    );
    Ok(())
}
