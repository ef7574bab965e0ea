use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::backend::{GenerationBackend, UpdateStream};
use crate::config::GenerationConfig;
use crate::document::{CelebrationStats, MethodStatement};
use crate::error::{GenerationError, Result};
use crate::models::{GenerationInput, JobStatus, JobUpdate};
use crate::session::{SessionMarker, SessionStore};
use crate::stages;

/// Where a generation currently stands. The variants carry everything a
/// front end needs to render that phase; there are no side flags to keep
/// in agreement with each other.
#[derive(Debug, Clone)]
pub enum GenerationState {
    /// Nothing in flight; the input form is editable.
    Idle,
    /// Creation request sent, no job id yet.
    Creating,
    /// A job exists and is being watched. `resumed` marks jobs adopted from
    /// a previous session rather than submitted in this one.
    Polling {
        job_id: Uuid,
        resumed: bool,
        progress: u8,
        current_step: Option<String>,
    },
    /// The finished document, editable in place until saved or discarded.
    Completed {
        job_id: Uuid,
        document: MethodStatement,
    },
    Cancelled {
        job_id: Uuid,
    },
    /// The job failed remotely, or polling gave up on it. Creation failures
    /// never reach this state; they land back in `Idle`.
    Errored {
        job_id: Uuid,
        message: String,
    },
}

impl GenerationState {
    pub fn is_idle(&self) -> bool {
        matches!(self, GenerationState::Idle)
    }

    pub fn is_polling(&self) -> bool {
        matches!(self, GenerationState::Polling { .. })
    }

    pub fn job_id(&self) -> Option<Uuid> {
        match self {
            GenerationState::Idle | GenerationState::Creating => None,
            GenerationState::Polling { job_id, .. }
            | GenerationState::Completed { job_id, .. }
            | GenerationState::Cancelled { job_id }
            | GenerationState::Errored { job_id, .. } => Some(*job_id),
        }
    }
}

/// Drives one method-statement generation end to end: submit the request,
/// follow the job's progress, adopt an in-flight job after a restart, and
/// hold the finished document for editing and saving.
pub struct GenerationController {
    backend: Arc<dyn GenerationBackend>,
    session: Arc<dyn SessionStore>,
    config: GenerationConfig,
    user_id: Uuid,
    state: GenerationState,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
    last_saved_at: Option<DateTime<Utc>>,
    celebration_shown: bool,
    pending_celebration: Option<CelebrationStats>,
}

impl GenerationController {
    pub fn new(
        backend: Arc<dyn GenerationBackend>,
        session: Arc<dyn SessionStore>,
        config: GenerationConfig,
        user_id: Uuid,
    ) -> Self {
        Self {
            backend,
            session,
            config,
            user_id,
            state: GenerationState::Idle,
            started_at: None,
            ended_at: None,
            last_saved_at: None,
            celebration_shown: false,
            pending_celebration: None,
        }
    }

    pub fn state(&self) -> &GenerationState {
        &self.state
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn last_saved_at(&self) -> Option<DateTime<Utc>> {
        self.last_saved_at
    }

    /// Validates the input and creates a job. Returns the job id, or `None`
    /// when creation failed and failures are configured to stay quiet.
    #[instrument(skip(self, input))]
    pub async fn submit(&mut self, input: &GenerationInput) -> Result<Option<Uuid>> {
        if !self.state.is_idle() {
            return Err(GenerationError::AlreadyRunning);
        }
        // Invalid input never reaches the backend.
        let request = input.validate()?;

        self.state = GenerationState::Creating;
        match self.backend.create_job(self.user_id, &request).await {
            Ok(job_id) => {
                let now = Utc::now();
                self.started_at = Some(now);
                self.ended_at = None;
                self.write_marker(SessionMarker {
                    job_id: Some(job_id),
                    started_at: now,
                });
                self.state = GenerationState::Polling {
                    job_id,
                    resumed: false,
                    progress: 0,
                    current_step: None,
                };
                info!(%job_id, "Generation job created");
                Ok(Some(job_id))
            }
            Err(e) => {
                self.state = GenerationState::Idle;
                if self.config.surface_creation_failures {
                    Err(GenerationError::CreationFailed(e))
                } else {
                    error!(error = %e, "Job creation failed");
                    Ok(None)
                }
            }
        }
    }

    /// Picks up a job left running by a previous session. Returns the job id
    /// when one was adopted; a stale marker is cleared quietly.
    #[instrument(skip(self))]
    pub async fn resume(&mut self) -> Result<Option<Uuid>> {
        if !self.state.is_idle() {
            return Err(GenerationError::AlreadyRunning);
        }
        let Some(marker) = self.session.load()? else {
            return Ok(None);
        };

        let job = match self.backend.find_active_job(self.user_id).await {
            Ok(job) => job,
            // The marker stays put so a later mount can retry the lookup.
            Err(e) => return Err(GenerationError::ResumeFailed(e)),
        };

        match job {
            Some(job) => {
                if let Some(cached) = marker.job_id {
                    if cached != job.id {
                        warn!(%cached, found = %job.id, "Active job differs from the cached id");
                    }
                }
                let started = job.started_at.unwrap_or(job.created_at);
                self.started_at = Some(started);
                self.ended_at = None;
                self.write_marker(SessionMarker {
                    job_id: Some(job.id),
                    started_at: started,
                });
                info!(job_id = %job.id, progress = job.progress, "Resumed in-flight generation");
                let job_id = job.id;
                self.state = GenerationState::Polling {
                    job_id,
                    resumed: true,
                    progress: job.progress.min(100),
                    current_step: job.current_step,
                };
                Ok(Some(job_id))
            }
            None => {
                info!("Session marker is stale, clearing it");
                self.session.clear()?;
                Ok(None)
            }
        }
    }

    /// Folds one monitor observation into the state. Updates arriving
    /// outside `Polling`, or for a different job, are ignored.
    pub fn apply_update(&mut self, update: JobUpdate) {
        let (job_id, resumed) = match &self.state {
            GenerationState::Polling { job_id, resumed, .. } => (*job_id, *resumed),
            _ => {
                debug!(update_job = %update.job_id, "Ignoring update outside an active poll");
                return;
            }
        };
        if update.job_id != job_id {
            warn!(update_job = %update.job_id, %job_id, "Ignoring update for a different job");
            return;
        }

        match update.status {
            JobStatus::Pending | JobStatus::Processing => {
                self.state = GenerationState::Polling {
                    job_id,
                    resumed,
                    progress: update.progress,
                    current_step: update.current_step,
                };
            }
            JobStatus::Complete => match update.document {
                Some(document) if !document.steps.is_empty() => {
                    self.complete(job_id, document);
                }
                // A complete status without usable steps is a backend race;
                // keep polling until the document arrives.
                _ => {
                    warn!(%job_id, "Complete status without method steps, still waiting");
                    self.state = GenerationState::Polling {
                        job_id,
                        resumed,
                        progress: update.progress,
                        current_step: update.current_step,
                    };
                }
            },
            JobStatus::Cancelled => {
                info!(%job_id, "Generation cancelled remotely");
                self.clear_marker();
                self.ended_at = Some(Utc::now());
                self.state = GenerationState::Cancelled { job_id };
            }
            JobStatus::Error => {
                let message = update
                    .error
                    .unwrap_or_else(|| "generation failed".to_string());
                error!(%job_id, error = %message, "Generation failed");
                self.clear_marker();
                self.ended_at = Some(Utc::now());
                self.state = GenerationState::Errored { job_id, message };
            }
        }
    }

    /// Applies updates from the stream until the state leaves `Polling`.
    pub async fn drive(&mut self, mut updates: UpdateStream) {
        while let Some(update) = updates.next().await {
            self.apply_update(update);
            if !self.state.is_polling() {
                break;
            }
        }
    }

    /// Asks the backend to stop the watched job. Local state only resets on
    /// confirmation; until then the job is presumed still running.
    #[instrument(skip(self))]
    pub async fn cancel(&mut self) -> Result<()> {
        let job_id = match &self.state {
            GenerationState::Polling { job_id, .. } => *job_id,
            _ => return Err(GenerationError::NoActiveJob),
        };
        match self.backend.cancel_job(job_id).await {
            Ok(()) => {
                info!(%job_id, "Generation cancelled");
                self.reset_local_state();
                Ok(())
            }
            Err(e) => {
                warn!(%job_id, error = %e, "Cancellation failed, job keeps running");
                Err(GenerationError::CancellationFailed(e))
            }
        }
    }

    /// Drops everything local and returns to the input form. Never touches
    /// the remote job, so it also recovers from wedged states.
    pub fn start_over(&mut self) {
        info!("Starting over, discarding local generation state");
        self.reset_local_state();
    }

    /// Writes the completed document back to the job record.
    #[instrument(skip(self))]
    pub async fn save(&mut self) -> Result<()> {
        let (job_id, document) = match &self.state {
            GenerationState::Completed { job_id, document } => (*job_id, document.clone()),
            _ => return Err(GenerationError::NothingToSave),
        };
        match self.backend.save_document(job_id, self.user_id, &document).await {
            Ok(()) => {
                self.last_saved_at = Some(Utc::now());
                info!(%job_id, "Method statement saved");
                Ok(())
            }
            Err(e) => {
                warn!(%job_id, error = %e, "Save failed, document kept locally");
                Err(GenerationError::SaveFailed(e))
            }
        }
    }

    /// The completion banner's numbers, handed out at most once per run.
    pub fn take_celebration(&mut self) -> Option<CelebrationStats> {
        self.pending_celebration.take()
    }

    pub fn document(&self) -> Option<&MethodStatement> {
        match &self.state {
            GenerationState::Completed { document, .. } => Some(document),
            _ => None,
        }
    }

    /// Mutable access for the result editor; edits persist on [`save`].
    ///
    /// [`save`]: GenerationController::save
    pub fn document_mut(&mut self) -> Option<&mut MethodStatement> {
        match &mut self.state {
            GenerationState::Completed { document, .. } => Some(document),
            _ => None,
        }
    }

    pub fn progress(&self) -> u8 {
        match &self.state {
            GenerationState::Polling { progress, .. } => *progress,
            GenerationState::Completed { .. } => 100,
            _ => 0,
        }
    }

    /// Whole seconds since the run started; frozen once it ends.
    pub fn elapsed_seconds(&self) -> u64 {
        self.elapsed_seconds_at(Utc::now())
    }

    fn elapsed_seconds_at(&self, now: DateTime<Utc>) -> u64 {
        let Some(start) = self.started_at else {
            return 0;
        };
        stages::elapsed_seconds(start, self.ended_at.unwrap_or(now))
    }

    /// Linear remaining-time guess from the configured budget. Zero outside
    /// `Polling`.
    pub fn remaining_estimate(&self) -> u64 {
        match &self.state {
            GenerationState::Polling { progress, .. } => {
                stages::remaining_estimate(self.config.total_budget_secs, *progress)
            }
            _ => 0,
        }
    }

    /// True once a watched run has overstayed the configured patience window
    /// and the host should offer a way out.
    pub fn is_overdue(&self) -> bool {
        self.state.is_polling() && self.elapsed_seconds() > self.config.overdue_after_secs
    }

    fn complete(&mut self, job_id: Uuid, document: MethodStatement) {
        self.clear_marker();
        self.ended_at = Some(Utc::now());
        if !self.celebration_shown {
            self.celebration_shown = true;
            let seconds = self
                .started_at
                .zip(self.ended_at)
                .map(|(start, end)| stages::elapsed_seconds(start, end))
                .unwrap_or(0);
            self.pending_celebration = Some(CelebrationStats::from_document(&document, seconds));
        }
        info!(%job_id, steps = document.steps.len(), "Generation completed");
        self.state = GenerationState::Completed { job_id, document };
    }

    fn write_marker(&self, marker: SessionMarker) {
        // The marker only enables resumption; losing it never blocks the run.
        if let Err(e) = self.session.save(&marker) {
            warn!(error = %e, "Failed to write session marker");
        }
    }

    fn clear_marker(&self) {
        if let Err(e) = self.session.clear() {
            warn!(error = %e, "Failed to clear session marker");
        }
    }

    fn reset_local_state(&mut self) {
        self.clear_marker();
        self.state = GenerationState::Idle;
        self.started_at = None;
        self.ended_at = None;
        self.last_saved_at = None;
        self.celebration_shown = false;
        self.pending_celebration = None;
    }
}
