// rams-generation-client/src/backend/mod.rs

mod memory;
mod supabase;

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use thiserror::Error;
use uuid::Uuid;

use crate::document::MethodStatement;
use crate::models::{GenerationJob, GenerationRequest, JobUpdate};

pub use memory::InMemoryBackend;
pub use supabase::SupabaseBackend;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Backend request failed: {0}")]
    Request(String),

    #[error("Backend response carried no job id")]
    MissingJobId,

    #[error("Backend rejected the operation: {0}")]
    Rejected(String),
}

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("Could not start watching the job: {0}")]
    Backend(#[from] BackendError),
}

/// Remote generation service. One implementation talks to the hosted
/// Supabase project; the in-memory one backs tests and offline work.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Starts a generation job for the user and returns its id.
    async fn create_job(
        &self,
        user_id: Uuid,
        request: &GenerationRequest,
    ) -> Result<Uuid, BackendError>;

    /// Asks the backend to stop a running job. `Ok` means the backend
    /// confirmed the cancellation.
    async fn cancel_job(&self, job_id: Uuid) -> Result<(), BackendError>;

    /// Reads the current job record, or `None` if it no longer exists.
    async fn fetch_job(&self, job_id: Uuid) -> Result<Option<GenerationJob>, BackendError>;

    /// The user's most recent job that is still pending or processing.
    async fn find_active_job(&self, user_id: Uuid) -> Result<Option<GenerationJob>, BackendError>;

    /// Persists the (possibly edited) document against the job record.
    async fn save_document(
        &self,
        job_id: Uuid,
        user_id: Uuid,
        document: &MethodStatement,
    ) -> Result<(), BackendError>;
}

pub type UpdateStream = Pin<Box<dyn Stream<Item = JobUpdate> + Send>>;

/// Produces a stream of job observations ending with exactly one final
/// update. How the observations are obtained (polling, push) is up to the
/// implementation.
#[async_trait]
pub trait JobMonitor: Send + Sync {
    async fn watch(&self, job_id: Uuid) -> Result<UpdateStream, MonitorError>;
}
