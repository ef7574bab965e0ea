// rams-generation-client/src/models.rs

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::document::MethodStatement;
use crate::error::{GenerationError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Processing,
    Complete,
    Cancelled,
    Error,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Complete => "complete",
            JobStatus::Cancelled => "cancelled",
            JobStatus::Error => "error",
        }
    }

    /// Terminal statuses never transition again; polling stops on the first one.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Complete | JobStatus::Cancelled | JobStatus::Error
        )
    }
}

impl FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "processing" => Ok(JobStatus::Processing),
            "complete" => Ok(JobStatus::Complete),
            "cancelled" => Ok(JobStatus::Cancelled),
            "error" => Ok(JobStatus::Error),
            other => Err(format!("unknown job status: {other}")),
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobScale {
    Domestic,
    Commercial,
    Industrial,
}

impl JobScale {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobScale::Domestic => "domestic",
            JobScale::Commercial => "commercial",
            JobScale::Industrial => "industrial",
        }
    }
}

impl fmt::Display for JobScale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectInfo {
    pub project_name: String,
    pub location: String,
    pub assessor: String,
    pub contractor: String,
    pub supervisor: String,
}

/// What the operator has typed so far. Validated into a [`GenerationRequest`]
/// at submission time.
#[derive(Debug, Clone)]
pub struct GenerationInput {
    pub description: String,
    pub project_info: ProjectInfo,
    pub scale: JobScale,
}

impl GenerationInput {
    /// Both the job description and the project name must be non-blank after
    /// trimming. Everything else is optional colour.
    pub fn is_submittable(&self) -> bool {
        !self.description.trim().is_empty() && !self.project_info.project_name.trim().is_empty()
    }

    pub fn validate(&self) -> Result<GenerationRequest> {
        let description = self.description.trim();
        if description.is_empty() {
            return Err(GenerationError::MissingField("job description"));
        }
        if self.project_info.project_name.trim().is_empty() {
            return Err(GenerationError::MissingField("project name"));
        }
        Ok(GenerationRequest {
            job_description: description.to_string(),
            project_info: self.project_info.clone(),
            job_scale: self.scale,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub job_description: String,
    pub project_info: ProjectInfo,
    pub job_scale: JobScale,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationJob {
    pub id: Uuid,
    pub user_id: Uuid,
    pub status: JobStatus,
    pub progress: u8,
    pub current_step: Option<String>,
    pub document: Option<MethodStatement>,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// One observation of a job, either read from the backend or synthesised by
/// the monitor when the backend stops answering.
#[derive(Debug, Clone)]
pub struct JobUpdate {
    pub job_id: Uuid,
    pub status: JobStatus,
    pub progress: u8,
    pub current_step: Option<String>,
    pub document: Option<MethodStatement>,
    pub error: Option<String>,
}

impl JobUpdate {
    pub fn from_job(job: &GenerationJob) -> Self {
        Self {
            job_id: job.id,
            status: job.status,
            progress: job.progress.min(100),
            current_step: job.current_step.clone(),
            document: job.document.clone(),
            error: job.error_message.clone(),
        }
    }

    /// Whether this observation ends the watch. Cancelled and error rows
    /// are always final; a complete row only counts once its document
    /// carries method steps, because the status column can flip to
    /// complete before `method_data` lands.
    pub fn is_final(&self) -> bool {
        match self.status {
            JobStatus::Cancelled | JobStatus::Error => true,
            JobStatus::Complete => self
                .document
                .as_ref()
                .map_or(false, |document| !document.steps.is_empty()),
            JobStatus::Pending | JobStatus::Processing => false,
        }
    }

    pub fn failed(job_id: Uuid, message: impl Into<String>) -> Self {
        Self {
            job_id,
            status: JobStatus::Error,
            progress: 0,
            current_step: None,
            document: None,
            error: Some(message.into()),
        }
    }
}
