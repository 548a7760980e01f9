//! Per-invocation job record and its lifecycle.

use std::fmt;

use serde::Serialize;
use uuid::Uuid;

use greensub_common::clock::JobClock;
use greensub_common::error::{GreensubError, GreensubResult};

/// Lifecycle of one engine invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    /// Created, nothing spawned yet.
    Idle,
    /// Spawning the engine and attaching its streams.
    Starting,
    /// Engine running; progress is being consumed.
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::Failed | JobState::Cancelled
        )
    }

    pub fn can_transition_to(&self, next: JobState) -> bool {
        use JobState::*;
        matches!(
            (self, next),
            (Idle, Starting)
                | (Idle, Cancelled)
                | (Starting, Running)
                | (Starting, Failed)
                | (Starting, Cancelled)
                | (Running, Completed)
                | (Running, Failed)
                | (Running, Cancelled)
        )
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobState::Idle => "idle",
            JobState::Starting => "starting",
            JobState::Running => "running",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
            JobState::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// Point-in-time view of a job, published on the status channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobStatus {
    pub id: Uuid,
    pub state: JobState,
    pub pid: Option<u32>,
    pub progress: f64,
    pub elapsed_secs: f64,
}

/// Mutable record owned by the runner task for a single invocation.
#[derive(Debug)]
pub struct JobHandle {
    id: Uuid,
    state: JobState,
    pid: Option<u32>,
    clock: Option<JobClock>,
    progress: f64,
    diagnostics: String,
}

impl JobHandle {
    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            state: JobState::Idle,
            pid: None,
            clock: None,
            progress: 0.0,
            diagnostics: String::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn progress(&self) -> f64 {
        self.progress
    }

    pub fn clock(&self) -> Option<&JobClock> {
        self.clock.as_ref()
    }

    pub fn diagnostics(&self) -> &str {
        &self.diagnostics
    }

    /// Move to `next`, rejecting transitions the lifecycle does not allow.
    pub fn transition(&mut self, next: JobState) -> GreensubResult<()> {
        if !self.state.can_transition_to(next) {
            return Err(GreensubError::InvalidTransition {
                from: self.state.to_string(),
                to: next.to_string(),
            });
        }
        tracing::debug!(job = %self.id, from = %self.state, to = %next, "Job state change");
        self.state = next;
        Ok(())
    }

    /// Record the spawned process and start the job clock.
    pub fn attach(&mut self, pid: Option<u32>) {
        self.pid = pid;
        self.clock = Some(JobClock::start());
    }

    /// Record a progress ratio; lower values than already seen are ignored.
    pub fn record_progress(&mut self, ratio: f64) {
        self.progress = self.progress.max(ratio.clamp(0.0, 1.0));
    }

    pub fn set_diagnostics(&mut self, excerpt: String) {
        self.diagnostics = excerpt;
    }

    pub fn status(&self) -> JobStatus {
        JobStatus {
            id: self.id,
            state: self.state,
            pid: self.pid,
            progress: self.progress,
            elapsed_secs: self.clock.as_ref().map_or(0.0, JobClock::elapsed_secs),
        }
    }
}
