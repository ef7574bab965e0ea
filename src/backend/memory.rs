// rams-generation-client/src/backend/memory.rs

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::backend::{BackendError, GenerationBackend};
use crate::document::MethodStatement;
use crate::models::{GenerationJob, GenerationRequest, JobStatus};

#[derive(Default)]
struct Inner {
    jobs: HashMap<Uuid, GenerationJob>,
    fail_creation: bool,
    reject_cancellation: bool,
    fail_save: bool,
    create_calls: u32,
    cancel_calls: u32,
    save_calls: u32,
    find_calls: u32,
}

/// Backend that keeps jobs in a map. Used by the test suite and by hosts
/// running without a remote project; tests drive job progress by hand.
#[derive(Default)]
pub struct InMemoryBackend {
    inner: Mutex<Inner>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert_job(&self, job: GenerationJob) {
        self.inner.lock().await.jobs.insert(job.id, job);
    }

    pub async fn set_progress(&self, job_id: Uuid, progress: u8, current_step: Option<&str>) {
        let mut inner = self.inner.lock().await;
        if let Some(job) = inner.jobs.get_mut(&job_id) {
            job.status = JobStatus::Processing;
            job.progress = progress;
            job.current_step = current_step.map(str::to_string);
            if job.started_at.is_none() {
                job.started_at = Some(Utc::now());
            }
        }
    }

    pub async fn complete_job(&self, job_id: Uuid, document: MethodStatement) {
        let mut inner = self.inner.lock().await;
        if let Some(job) = inner.jobs.get_mut(&job_id) {
            job.status = JobStatus::Complete;
            job.progress = 100;
            job.document = Some(document);
            job.completed_at = Some(Utc::now());
        }
    }

    pub async fn fail_job(&self, job_id: Uuid, message: &str) {
        let mut inner = self.inner.lock().await;
        if let Some(job) = inner.jobs.get_mut(&job_id) {
            job.status = JobStatus::Error;
            job.error_message = Some(message.to_string());
            job.completed_at = Some(Utc::now());
        }
    }

    pub async fn remove_job(&self, job_id: Uuid) {
        self.inner.lock().await.jobs.remove(&job_id);
    }

    pub async fn job(&self, job_id: Uuid) -> Option<GenerationJob> {
        self.inner.lock().await.jobs.get(&job_id).cloned()
    }

    pub async fn set_fail_creation(&self, fail: bool) {
        self.inner.lock().await.fail_creation = fail;
    }

    pub async fn set_reject_cancellation(&self, reject: bool) {
        self.inner.lock().await.reject_cancellation = reject;
    }

    pub async fn set_fail_save(&self, fail: bool) {
        self.inner.lock().await.fail_save = fail;
    }

    pub async fn create_calls(&self) -> u32 {
        self.inner.lock().await.create_calls
    }

    pub async fn cancel_calls(&self) -> u32 {
        self.inner.lock().await.cancel_calls
    }

    pub async fn save_calls(&self) -> u32 {
        self.inner.lock().await.save_calls
    }

    pub async fn find_calls(&self) -> u32 {
        self.inner.lock().await.find_calls
    }
}

#[async_trait]
impl GenerationBackend for InMemoryBackend {
    async fn create_job(
        &self,
        user_id: Uuid,
        request: &GenerationRequest,
    ) -> Result<Uuid, BackendError> {
        let mut inner = self.inner.lock().await;
        inner.create_calls += 1;
        if inner.fail_creation {
            return Err(BackendError::Request(
                "generation service unavailable".to_string(),
            ));
        }
        let job = GenerationJob {
            id: Uuid::new_v4(),
            user_id,
            status: JobStatus::Pending,
            progress: 0,
            current_step: Some(format!("Queued: {}", request.job_description)),
            document: None,
            error_message: None,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        };
        let job_id = job.id;
        inner.jobs.insert(job_id, job);
        Ok(job_id)
    }

    async fn cancel_job(&self, job_id: Uuid) -> Result<(), BackendError> {
        let mut inner = self.inner.lock().await;
        inner.cancel_calls += 1;
        if inner.reject_cancellation {
            return Err(BackendError::Rejected("cancellation refused".to_string()));
        }
        match inner.jobs.get_mut(&job_id) {
            Some(job) if !job.status.is_terminal() => {
                job.status = JobStatus::Cancelled;
                job.completed_at = Some(Utc::now());
                Ok(())
            }
            Some(job) => Err(BackendError::Rejected(format!(
                "job already {}",
                job.status
            ))),
            None => Err(BackendError::Rejected(format!("job {job_id} not found"))),
        }
    }

    async fn fetch_job(&self, job_id: Uuid) -> Result<Option<GenerationJob>, BackendError> {
        Ok(self.inner.lock().await.jobs.get(&job_id).cloned())
    }

    async fn find_active_job(&self, user_id: Uuid) -> Result<Option<GenerationJob>, BackendError> {
        let mut inner = self.inner.lock().await;
        inner.find_calls += 1;
        Ok(inner
            .jobs
            .values()
            .filter(|job| job.user_id == user_id && !job.status.is_terminal())
            .max_by_key(|job| job.created_at)
            .cloned())
    }

    async fn save_document(
        &self,
        job_id: Uuid,
        user_id: Uuid,
        document: &MethodStatement,
    ) -> Result<(), BackendError> {
        let mut inner = self.inner.lock().await;
        inner.save_calls += 1;
        if inner.fail_save {
            return Err(BackendError::Request("storage unavailable".to_string()));
        }
        match inner.jobs.get_mut(&job_id) {
            Some(job) if job.user_id == user_id => {
                job.document = Some(document.clone());
                Ok(())
            }
            Some(_) => Err(BackendError::Rejected(
                "job belongs to another user".to_string(),
            )),
            None => Err(BackendError::Rejected(format!("job {job_id} not found"))),
        }
    }
}
