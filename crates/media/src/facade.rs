//! Preview and render entry points.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use image::RgbaImage;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use greensub_command_builder::{build_plan, CommandPlan};
use greensub_common::config::AppConfig;
use greensub_common::error::{GreensubError, GreensubResult};
use greensub_job_model::{JobMode, JobSpec};
use greensub_process_runner::{ProcessRunner, ProgressEvent, RunEvent};

use crate::probe::MediaProbe;
use crate::subtitles::{stage_subtitle, StagedSubtitle};

/// A decoded preview frame.
#[derive(Debug, Clone)]
pub struct FrameImage {
    /// Source timestamp the frame was taken at.
    pub at_secs: f64,
    pub width: u32,
    pub height: u32,
    pub pixels: RgbaImage,
}

impl FrameImage {
    pub fn save_png(&self, path: &Path) -> GreensubResult<()> {
        self.pixels.save_with_format(path, image::ImageFormat::Png)?;
        Ok(())
    }
}

/// Caller-visible render events. `Finished` is always the last one.
#[derive(Debug)]
pub enum RenderEvent {
    Progress(ProgressEvent),
    Stalled { idle: Duration },
    Finished(GreensubResult<PathBuf>),
}

/// Event stream of one render.
#[derive(Debug)]
pub struct RenderStream {
    id: Uuid,
    events: mpsc::UnboundedReceiver<RenderEvent>,
}

impl RenderStream {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Next event, or `None` after `Finished` has been delivered.
    pub async fn next(&mut self) -> Option<RenderEvent> {
        self.events.recv().await
    }

    /// Drain the stream and return the final result.
    pub async fn finish(mut self) -> GreensubResult<PathBuf> {
        while let Some(event) = self.next().await {
            if let RenderEvent::Finished(result) = event {
                return result;
            }
        }
        Err(missing_result())
    }
}

#[derive(Debug)]
struct ActiveRender {
    id: Uuid,
    cancel: CancellationToken,
}

type Slot = Arc<Mutex<Option<ActiveRender>>>;

fn lock(slot: &Slot) -> MutexGuard<'_, Option<ActiveRender>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Holds the active-render slot; frees it on drop.
struct SlotGuard {
    slot: Slot,
    id: Uuid,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        let mut active = lock(&self.slot);
        if active.as_ref().is_some_and(|a| a.id == self.id) {
            *active = None;
        }
    }
}

/// Entry point for front ends. At most one render runs at a time; previews
/// are independent of it and of each other.
#[derive(Debug, Clone)]
pub struct MediaFacade {
    runner: ProcessRunner,
    probe: MediaProbe,
    active: Slot,
}

impl MediaFacade {
    pub fn new(runner: ProcessRunner, probe: MediaProbe) -> Self {
        Self {
            runner,
            probe,
            active: Arc::new(Mutex::new(None)),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            ProcessRunner::from_config(config),
            MediaProbe::new(config.engine.ffprobe.clone()),
        )
    }

    pub fn runner(&self) -> &ProcessRunner {
        &self.runner
    }

    pub fn probe(&self) -> &MediaProbe {
        &self.probe
    }

    /// Id of the render currently holding the slot.
    pub fn active_render(&self) -> Option<Uuid> {
        lock(&self.active).as_ref().map(|a| a.id)
    }

    /// Render a single frame of `spec` and decode it.
    pub async fn request_preview(&self, spec: JobSpec) -> GreensubResult<FrameImage> {
        let JobMode::Preview { at_secs } = spec.mode else {
            return Err(GreensubError::validation(
                "mode",
                "a preview needs a preview spec",
            ));
        };
        spec.check_inputs()?;
        self.runner.locate_engine()?;

        let workdir = tempfile::Builder::new()
            .prefix("greensub-preview-")
            .tempdir()?;
        let staged = stage(&spec).await?;
        let spec = staged_spec(&spec, staged.as_ref());
        let frame_path = workdir.path().join("frame.png");
        let plan = build_plan(&spec, &frame_path)?;

        let (tx, mut rx) = mpsc::unbounded_channel();
        let job = self.runner.launch(plan, None, tx)?;
        // A caller that stops polling this future stops the engine too.
        let _stop_on_drop = job.cancel_token().drop_guard();
        let mut completion = None;
        while let Some(event) = rx.recv().await {
            if let RunEvent::Finished(done) = event {
                completion = Some(done);
            }
        }
        completion.ok_or_else(missing_result)?.into_result()?;
        drop(staged);

        if !frame_path.exists() {
            return Err(GreensubError::runtime(
                Some(0),
                format!("engine produced no frame at {at_secs:.3}s, past the end of the source?"),
            ));
        }
        let pixels = tokio::task::spawn_blocking(move || image::open(&frame_path))
            .await
            .map_err(anyhow::Error::new)??
            .to_rgba8();
        tracing::debug!(
            at_secs,
            width = pixels.width(),
            height = pixels.height(),
            "Preview frame decoded"
        );

        Ok(FrameImage {
            at_secs,
            width: pixels.width(),
            height: pixels.height(),
            pixels,
        })
    }

    /// Start a render. Validation, engine lookup and the slot check happen
    /// before this returns; everything after is reported on the stream.
    pub async fn request_render(&self, spec: JobSpec) -> GreensubResult<RenderStream> {
        if spec.mode != JobMode::Render {
            return Err(GreensubError::validation(
                "mode",
                "a render needs a render spec",
            ));
        }
        spec.check_inputs()?;
        self.runner.locate_engine()?;
        let output = spec
            .output
            .clone()
            .ok_or_else(|| GreensubError::validation("output", "a render needs an output path"))?;

        let cancel = CancellationToken::new();
        let guard = self.reserve(cancel.clone())?;
        let staged = stage(&spec).await?;
        let plan = build_plan(&staged_spec(&spec, staged.as_ref()), &output)?;

        let id = guard.id;
        let runner = self.runner.clone();
        let probe = self.probe.clone();
        let source = spec.source.clone();
        let (tx, rx) = mpsc::unbounded_channel();
        tracing::info!(render = %id, output = %output.display(), "Render requested");

        tokio::spawn(async move {
            let result = drive_render(&runner, &probe, plan, &source, &cancel, &tx).await;
            drop(staged);
            // The slot is free before the caller sees the result.
            drop(guard);
            let _ = tx.send(RenderEvent::Finished(result));
        });

        Ok(RenderStream { id, events: rx })
    }

    /// Cancel the active render. Returns false when none is running.
    pub fn cancel_active_render(&self) -> bool {
        match lock(&self.active).as_ref() {
            Some(active) => {
                tracing::info!(render = %active.id, "Cancelling active render");
                active.cancel.cancel();
                true
            }
            None => false,
        }
    }

    fn reserve(&self, cancel: CancellationToken) -> GreensubResult<SlotGuard> {
        let mut active = lock(&self.active);
        if active.is_some() {
            return Err(GreensubError::Busy);
        }
        let id = Uuid::new_v4();
        *active = Some(ActiveRender { id, cancel });
        Ok(SlotGuard {
            slot: Arc::clone(&self.active),
            id,
        })
    }
}

async fn stage(spec: &JobSpec) -> GreensubResult<Option<StagedSubtitle>> {
    let Some(track) = spec.subtitle.clone() else {
        return Ok(None);
    };
    let staged = tokio::task::spawn_blocking(move || stage_subtitle(&track))
        .await
        .map_err(anyhow::Error::new)??;
    Ok(Some(staged))
}

fn staged_spec(spec: &JobSpec, staged: Option<&StagedSubtitle>) -> JobSpec {
    match staged {
        Some(staged) => spec.with_subtitle_path(staged.path()),
        None => spec.clone(),
    }
}

async fn drive_render(
    runner: &ProcessRunner,
    probe: &MediaProbe,
    plan: CommandPlan,
    source: &Path,
    cancel: &CancellationToken,
    events: &mpsc::UnboundedSender<RenderEvent>,
) -> GreensubResult<PathBuf> {
    let duration = tokio::select! {
        _ = cancel.cancelled() => return Err(GreensubError::Cancelled),
        duration = probe.duration(source) => duration,
    };

    let (run_tx, mut run_rx) = mpsc::unbounded_channel();
    let job = runner.launch(plan, duration, run_tx)?;
    let mut cancel_sent = false;

    loop {
        tokio::select! {
            _ = cancel.cancelled(), if !cancel_sent => {
                job.cancel();
                cancel_sent = true;
            }
            event = run_rx.recv() => match event {
                Some(RunEvent::Started { pid }) => {
                    tracing::debug!(job = %job.id(), pid, "Render engine started");
                }
                Some(RunEvent::Progress(progress)) => {
                    let _ = events.send(RenderEvent::Progress(progress));
                }
                Some(RunEvent::Stalled { idle }) => {
                    let _ = events.send(RenderEvent::Stalled { idle });
                }
                Some(RunEvent::Finished(completion)) => return completion.into_result(),
                None => return Err(missing_result()),
            },
        }
    }
}

fn missing_result() -> GreensubError {
    GreensubError::Other(anyhow::anyhow!("engine job ended without reporting a result"))
}
