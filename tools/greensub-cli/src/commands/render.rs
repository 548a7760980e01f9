//! Render a full clip.

use std::io::Write;
use std::path::PathBuf;

use greensub_common::config::AppConfig;
use greensub_job_model::JobMode;
use greensub_media::{MediaFacade, RenderEvent};

use crate::args::{default_output, JobArgs};

pub async fn run(
    config: &AppConfig,
    source: PathBuf,
    output: Option<PathBuf>,
    job: JobArgs,
) -> anyhow::Result<()> {
    let mut spec = job.to_spec(config, source, JobMode::Render, None)?;
    let output = output.unwrap_or_else(|| default_output(&spec.source, spec.encoding.container));
    spec.output = Some(output.clone());

    println!("Rendering {}", spec.source.display());
    println!("  Output: {}", output.display());
    println!(
        "  Canvas: {}x{} @ {} fps",
        spec.canvas.width, spec.canvas.height, spec.frame_rate
    );
    println!(
        "  Encoder: {} ({}, {})",
        spec.encoding.encoder, spec.encoding.quality, spec.encoding.container
    );

    let facade = MediaFacade::from_config(config);
    let mut stream = facade.request_render(spec).await?;
    let render_id = stream.id();
    tracing::info!(render = %render_id, "Render started");
    let mut interrupted = false;

    let result = loop {
        let event = tokio::select! {
            _ = tokio::signal::ctrl_c(), if !interrupted => {
                interrupted = true;
                tracing::info!(render = %render_id, "Interrupt received, cancelling render");
                println!("\n  Cancelling...");
                facade.cancel_active_render();
                continue;
            }
            event = stream.next() => event,
        };
        match event {
            Some(RenderEvent::Progress(p)) => {
                let eta = p
                    .eta_secs
                    .map(|secs| format!(", ETA: {secs:.0}s"))
                    .unwrap_or_default();
                let speed = p
                    .speed
                    .map(|s| format!(", {s:.2}x"))
                    .unwrap_or_default();
                print!("\r  Progress: {:.1}%{speed}{eta}    ", p.ratio * 100.0);
                std::io::stdout().flush().ok();
            }
            Some(RenderEvent::Stalled { idle }) => {
                tracing::warn!(idle_secs = idle.as_secs(), "Render stalled");
                println!("\n  Engine has made no progress for {}s", idle.as_secs());
            }
            Some(RenderEvent::Finished(result)) => break result,
            None => anyhow::bail!("render ended without a result"),
        }
    };

    match result {
        Ok(path) => {
            println!("\nRender complete: {}", path.display());
            Ok(())
        }
        Err(err) if !err.is_failure() => {
            tracing::info!(render = %render_id, "Render cancelled by user");
            println!("\nRender cancelled");
            Ok(())
        }
        Err(err) => {
            tracing::error!(render = %render_id, error = %err, "Render failed");
            println!("\nRender failed");
            Err(err.into())
        }
    }
}
