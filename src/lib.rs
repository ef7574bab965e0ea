// rams-generation-client/src/lib.rs

//! Client-side lifecycle for AI-generated electrical method statements:
//! submit a job, follow its progress, survive page reloads, and hold the
//! finished document for editing, saving and export.

pub mod backend;
pub mod config;
pub mod controller;
pub mod document;
pub mod error;
pub mod models;
pub mod poller;
pub mod render;
pub mod session;
pub mod stages;
pub mod telemetry;

pub use backend::{
    BackendError, GenerationBackend, InMemoryBackend, JobMonitor, MonitorError, SupabaseBackend,
    UpdateStream,
};
pub use config::Config;
pub use controller::{GenerationController, GenerationState};
pub use document::{
    CelebrationStats, Hazard, MethodStatement, MethodStep, PpeItem, RiskAssessment, RiskLevel,
    StepBody,
};
pub use error::{GenerationError, Result};
pub use models::{
    GenerationInput, GenerationJob, GenerationRequest, JobScale, JobStatus, JobUpdate, ProjectInfo,
};
pub use poller::IntervalPoller;
pub use render::MethodStatementRenderer;
pub use session::{
    FileSessionStore, InMemorySessionStore, SessionMarker, SessionStore, SESSION_MARKER_KEY,
};
