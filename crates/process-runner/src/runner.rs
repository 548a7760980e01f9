//! Engine process execution.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use greensub_command_builder::CommandPlan;
use greensub_common::clock::StallDetector;
use greensub_common::config::{AppConfig, RunnerSettings, StallPolicy};
use greensub_common::error::{GreensubError, GreensubResult};
use greensub_job_model::JobMode;

use crate::diagnostics::{self, DiagnosticTail};
use crate::engine::locate_program;
use crate::handle::{JobHandle, JobState, JobStatus};
use crate::progress::{ProgressEvent, ProgressParser, ProgressTracker};

/// Events delivered for one job, in order. `Finished` is always last and is
/// sent exactly once, after the engine process has exited.
#[derive(Debug)]
pub enum RunEvent {
    Started { pid: Option<u32> },
    Progress(ProgressEvent),
    /// No progress advancement for `idle`.
    Stalled { idle: Duration },
    Finished(Completion),
}

/// How a job ended.
#[derive(Debug)]
pub enum Completion {
    Succeeded { output: PathBuf, elapsed: Duration },
    Failed(GreensubError),
    Cancelled,
}

impl Completion {
    pub fn state(&self) -> JobState {
        match self {
            Completion::Succeeded { .. } => JobState::Completed,
            Completion::Failed(_) => JobState::Failed,
            Completion::Cancelled => JobState::Cancelled,
        }
    }

    pub fn into_result(self) -> GreensubResult<PathBuf> {
        match self {
            Completion::Succeeded { output, .. } => Ok(output),
            Completion::Failed(err) => Err(err),
            Completion::Cancelled => Err(GreensubError::Cancelled),
        }
    }
}

/// A launched job.
#[derive(Debug)]
pub struct RunningJob {
    id: Uuid,
    cancel: CancellationToken,
    status: watch::Receiver<JobStatus>,
    task: JoinHandle<()>,
}

impl RunningJob {
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Request cancellation. The outcome arrives as `Completion::Cancelled`.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn status(&self) -> JobStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<JobStatus> {
        self.status.clone()
    }

    /// Wait until the job task has delivered its completion.
    pub async fn wait(self) {
        if let Err(err) = self.task.await {
            tracing::error!(job = %self.id, error = %err, "Runner task panicked");
        }
    }
}

/// Starts engine processes. Cheap to share; every launch is independent.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    program: PathBuf,
    settings: RunnerSettings,
}

impl ProcessRunner {
    pub fn new(program: impl Into<PathBuf>, settings: RunnerSettings) -> Self {
        Self {
            program: program.into(),
            settings,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.engine.ffmpeg.clone(), config.runner.clone())
    }

    pub fn settings(&self) -> &RunnerSettings {
        &self.settings
    }

    /// Resolve the engine binary without spawning it.
    pub fn locate_engine(&self) -> GreensubResult<PathBuf> {
        locate_program(&self.program)
    }

    /// Start `plan` on the runtime and return immediately.
    ///
    /// Fails synchronously only for configuration problems; everything after
    /// the lookup is reported through `events`. `expected_duration` is the
    /// media length used as the progress denominator.
    pub fn launch(
        &self,
        plan: CommandPlan,
        expected_duration: Option<Duration>,
        events: mpsc::UnboundedSender<RunEvent>,
    ) -> GreensubResult<RunningJob> {
        let program = self.locate_engine()?;
        let target = match plan.mode() {
            JobMode::Render => Target::Staged {
                staging: staging_path(plan.output())?,
                output: plan.output().to_path_buf(),
            },
            JobMode::Preview { .. } => Target::Direct(plan.output().to_path_buf()),
        };
        let args = plan.command_line(target.write_path())?;

        let id = Uuid::new_v4();
        let handle = JobHandle::new(id);
        let (status_tx, status_rx) = watch::channel(handle.status());
        let cancel = CancellationToken::new();

        let (stall_timeout, time_limit) = match plan.mode() {
            JobMode::Render => (self.settings.stall_timeout(), None),
            JobMode::Preview { .. } => (None, self.settings.preview_timeout()),
        };
        let job = Job {
            program,
            args,
            target,
            tracker: ProgressTracker::new(expected_duration),
            stall_timeout,
            time_limit,
            settings: self.settings.clone(),
            handle,
            events,
            status: status_tx,
            cancel: cancel.clone(),
        };
        let task = tokio::spawn(job.run());

        Ok(RunningJob {
            id,
            cancel,
            status: status_rx,
            task,
        })
    }
}

/// Hidden sibling of `output` that receives the engine's writes.
pub fn staging_path(output: &Path) -> GreensubResult<PathBuf> {
    let name = output.file_name().ok_or_else(|| {
        GreensubError::validation(
            "output",
            format!("{} does not name a file", output.display()),
        )
    })?;
    let mut staged = OsString::from(".");
    staged.push(name);
    staged.push(".partial");
    Ok(output.with_file_name(staged))
}

#[derive(Debug)]
enum Target {
    Staged { staging: PathBuf, output: PathBuf },
    Direct(PathBuf),
}

impl Target {
    fn write_path(&self) -> &Path {
        match self {
            Target::Staged { staging, .. } => staging,
            Target::Direct(path) => path,
        }
    }

    fn output(&self) -> &Path {
        match self {
            Target::Staged { output, .. } => output,
            Target::Direct(path) => path,
        }
    }

    async fn discard(&self) {
        let path = self.write_path();
        match tokio::fs::remove_file(path).await {
            Ok(()) => tracing::debug!(path = %path.display(), "Removed partial output"),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "Failed to remove partial output")
            }
        }
    }

    async fn commit(&self) -> GreensubResult<()> {
        if let Target::Staged { staging, output } = self {
            tokio::fs::rename(staging, output).await?;
        }
        Ok(())
    }
}

/// Why the stdout loop stopped.
enum StreamEnd {
    Closed,
    Cancelled,
    Stalled(Duration),
    TimedOut(Duration),
    ReadError(std::io::Error),
}

struct Job {
    program: PathBuf,
    args: Vec<String>,
    target: Target,
    tracker: ProgressTracker,
    stall_timeout: Option<Duration>,
    /// Hard bound on the whole run, counted from spawn.
    time_limit: Option<Duration>,
    settings: RunnerSettings,
    handle: JobHandle,
    events: mpsc::UnboundedSender<RunEvent>,
    status: watch::Sender<JobStatus>,
    cancel: CancellationToken,
}

impl Job {
    async fn run(mut self) {
        let completion = self.execute().await;
        let next = completion.state();
        if let Err(err) = self.handle.transition(next) {
            tracing::error!(job = %self.handle.id(), error = %err, "Unexpected job state");
        }
        self.publish();

        match &completion {
            Completion::Succeeded { output, elapsed } => tracing::info!(
                job = %self.handle.id(),
                output = %output.display(),
                elapsed_secs = elapsed.as_secs_f64(),
                "Engine job completed"
            ),
            Completion::Failed(err) => {
                tracing::warn!(job = %self.handle.id(), error = %err, "Engine job failed")
            }
            Completion::Cancelled => tracing::info!(job = %self.handle.id(), "Engine job cancelled"),
        }
        self.emit(RunEvent::Finished(completion));
    }

    async fn execute(&mut self) -> Completion {
        self.set_state(JobState::Starting);
        if self.cancel.is_cancelled() {
            return Completion::Cancelled;
        }

        tracing::debug!(program = %self.program.display(), args = ?self.args, "Spawning engine");
        let spawned = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn();
        let mut child = match spawned {
            Ok(child) => child,
            Err(err) => {
                return Completion::Failed(GreensubError::configuration(format!(
                    "failed to start {}: {err}",
                    self.program.display()
                )))
            }
        };

        let (stdout, stderr) = match (child.stdout.take(), child.stderr.take()) {
            (Some(stdout), Some(stderr)) => (stdout, stderr),
            _ => {
                self.terminate(&mut child).await;
                return Completion::Failed(GreensubError::runtime(
                    None,
                    "engine streams were not captured",
                ));
            }
        };

        let pid = child.id();
        self.handle.attach(pid);
        self.set_state(JobState::Running);
        tracing::info!(
            job = %self.handle.id(),
            pid,
            args_len = self.args.len(),
            "Engine process started"
        );
        self.emit(RunEvent::Started { pid });

        // Drain stderr concurrently so a chatty engine never blocks on a full pipe.
        let stderr_task = tokio::spawn(diagnostics::collect(stderr, self.settings.diagnostic_lines));

        let started = Instant::now();
        let limit = self.time_limit.map(|limit| started + limit);
        let end = self.consume_progress(stdout, started, limit).await;

        let completion = match end {
            StreamEnd::Closed => {
                tokio::select! {
                    _ = self.cancel.cancelled() => {
                        self.terminate(&mut child).await;
                        self.target.discard().await;
                        Completion::Cancelled
                    }
                    _ = deadline_timer(limit) => {
                        self.terminate(&mut child).await;
                        self.target.discard().await;
                        self.timed_out(started.elapsed())
                    }
                    status = child.wait() => match status {
                        Ok(status) if status.success() => {
                            let tail = join_tail(stderr_task).await;
                            self.handle.set_diagnostics(tail.excerpt());
                            return self.succeed(started).await;
                        }
                        Ok(status) => {
                            let tail = join_tail(stderr_task).await;
                            self.target.discard().await;
                            let excerpt = tail.excerpt();
                            self.handle.set_diagnostics(excerpt.clone());
                            return Completion::Failed(GreensubError::runtime(status.code(), excerpt));
                        }
                        Err(err) => {
                            self.terminate(&mut child).await;
                            self.target.discard().await;
                            Completion::Failed(GreensubError::runtime(
                                None,
                                format!("waiting for engine failed: {err}"),
                            ))
                        }
                    }
                }
            }
            StreamEnd::Cancelled => {
                self.terminate(&mut child).await;
                self.target.discard().await;
                Completion::Cancelled
            }
            StreamEnd::Stalled(idle) => {
                self.terminate(&mut child).await;
                self.target.discard().await;
                Completion::Failed(GreensubError::Stalled {
                    idle_secs: idle.as_secs(),
                })
            }
            StreamEnd::TimedOut(elapsed) => {
                self.terminate(&mut child).await;
                self.target.discard().await;
                self.timed_out(elapsed)
            }
            StreamEnd::ReadError(err) => {
                self.terminate(&mut child).await;
                self.target.discard().await;
                let tail = join_tail(stderr_task).await;
                let mut excerpt = tail.excerpt();
                if !excerpt.is_empty() {
                    excerpt.push('\n');
                }
                excerpt.push_str(&format!("reading engine progress failed: {err}"));
                self.handle.set_diagnostics(excerpt.clone());
                return Completion::Failed(GreensubError::runtime(None, excerpt));
            }
        };

        // The engine is gone at this point, so stderr reaches EOF promptly.
        let tail = join_tail(stderr_task).await;
        self.handle.set_diagnostics(tail.excerpt());
        completion
    }

    async fn consume_progress(
        &mut self,
        stdout: tokio::process::ChildStdout,
        started: Instant,
        limit: Option<Instant>,
    ) -> StreamEnd {
        let mut lines = BufReader::new(stdout).lines();
        let mut parser = ProgressParser::new();
        let mut detector = self
            .stall_timeout
            .map(|threshold| StallDetector::starting_at(threshold, started));

        loop {
            let deadline = detector.as_ref().map(StallDetector::deadline);
            tokio::select! {
                _ = self.cancel.cancelled() => return StreamEnd::Cancelled,
                _ = deadline_timer(limit) => return StreamEnd::TimedOut(started.elapsed()),
                _ = deadline_timer(deadline) => {
                    let Some(detector) = detector.as_mut() else { continue };
                    if let Some(idle) = detector.check(Instant::now()) {
                        tracing::warn!(
                            job = %self.handle.id(),
                            idle_secs = idle.as_secs_f64(),
                            "Engine made no progress"
                        );
                        self.emit(RunEvent::Stalled { idle });
                        if self.settings.stall_policy == StallPolicy::Abort {
                            return StreamEnd::Stalled(idle);
                        }
                    }
                }
                line = lines.next_line() => match line {
                    Ok(Some(line)) => {
                        let Some(sample) = parser.feed(&line) else { continue };
                        if let Some(detector) = detector.as_mut() {
                            detector.observe(sample.out_time_secs, Instant::now());
                        }
                        let event = self.tracker.update(&sample, started.elapsed());
                        self.progress(event);
                    }
                    Ok(None) => return StreamEnd::Closed,
                    Err(err) => return StreamEnd::ReadError(err),
                },
            }
        }
    }

    fn timed_out(&self, elapsed: Duration) -> Completion {
        tracing::warn!(
            job = %self.handle.id(),
            elapsed_secs = elapsed.as_secs_f64(),
            "Engine exceeded its time limit"
        );
        Completion::Failed(GreensubError::Stalled {
            idle_secs: elapsed.as_secs(),
        })
    }

    async fn succeed(&mut self, started: Instant) -> Completion {
        if let Err(err) = self.target.commit().await {
            self.target.discard().await;
            return Completion::Failed(err);
        }
        if let Some(event) = self.tracker.finish() {
            self.progress(event);
        }
        Completion::Succeeded {
            output: self.target.output().to_path_buf(),
            elapsed: started.elapsed(),
        }
    }

    /// SIGTERM first so the engine can shut down cleanly, then kill once the
    /// grace period has passed.
    async fn terminate(&self, child: &mut Child) {
        if request_shutdown(child) {
            let grace = self.settings.grace_period();
            if let Ok(Ok(status)) = tokio::time::timeout(grace, child.wait()).await {
                tracing::debug!(?status, "Engine exited after shutdown request");
                return;
            }
            tracing::warn!(
                grace_ms = grace.as_millis() as u64,
                "Engine ignored shutdown request, killing"
            );
        }

        if let Err(err) = child.kill().await {
            tracing::warn!(error = %err, "Failed to kill engine process");
        }
    }

    fn progress(&mut self, event: ProgressEvent) {
        self.handle.record_progress(event.ratio);
        self.publish();
        self.emit(RunEvent::Progress(event));
    }

    fn set_state(&mut self, next: JobState) {
        if let Err(err) = self.handle.transition(next) {
            tracing::error!(job = %self.handle.id(), error = %err, "Unexpected job state");
        }
        self.publish();
    }

    fn publish(&self) {
        self.status.send_replace(self.handle.status());
    }

    fn emit(&self, event: RunEvent) {
        // A dropped receiver only means nobody is listening any more.
        let _ = self.events.send(event);
    }
}

#[cfg(unix)]
fn request_shutdown(child: &Child) -> bool {
    let Some(pid) = child.id() else {
        return false;
    };
    // SAFETY: `pid` belongs to our own child, which has not been reaped yet
    // because `child.id()` still returned it.
    unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) == 0 }
}

#[cfg(not(unix))]
fn request_shutdown(_child: &Child) -> bool {
    false
}

async fn deadline_timer(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline.into()).await,
        None => std::future::pending().await,
    }
}

async fn join_tail(task: JoinHandle<DiagnosticTail>) -> DiagnosticTail {
    match task.await {
        Ok(tail) => tail,
        Err(err) => {
            let mut tail = DiagnosticTail::new(1);
            tail.push(&format!("<failed to collect engine diagnostics: {err}>"));
            tail
        }
    }
}
