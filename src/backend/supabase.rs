use std::time::Duration;

use anyhow::{bail, Context};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::backend::{BackendError, GenerationBackend};
use crate::config::BackendConfig;
use crate::document::MethodStatement;
use crate::models::{GenerationJob, GenerationRequest, JobStatus};

const CREATE_FUNCTION: &str = "generate-method-statement";
const CANCEL_FUNCTION: &str = "cancel-generation";
const JOBS_TABLE: &str = "rams_generation_jobs";

// ============================================================
// Wire types
// ============================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateJobResponse {
    job_id: Option<Uuid>,
}

#[derive(Debug, Deserialize)]
struct CancelResponse {
    success: bool,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JobRow {
    id: Uuid,
    user_id: Uuid,
    status: String,
    progress: Option<i32>,
    current_step: Option<String>,
    method_data: Option<serde_json::Value>,
    error_message: Option<String>,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
}

impl JobRow {
    fn into_job(self) -> anyhow::Result<GenerationJob> {
        let status = self
            .status
            .parse::<JobStatus>()
            .map_err(anyhow::Error::msg)
            .with_context(|| format!("job {}", self.id))?;
        let document = self
            .method_data
            .map(serde_json::from_value::<MethodStatement>)
            .transpose()
            .with_context(|| format!("decoding method_data for job {}", self.id))?;
        Ok(GenerationJob {
            id: self.id,
            user_id: self.user_id,
            status,
            progress: self.progress.unwrap_or(0).clamp(0, 100) as u8,
            current_step: self.current_step,
            document,
            error_message: self.error_message,
            created_at: self.created_at,
            started_at: self.started_at,
            completed_at: self.completed_at,
        })
    }
}

// ============================================================
// Client
// ============================================================

/// Talks to the hosted project: edge functions for create/cancel, the
/// PostgREST table endpoint for job reads and document saves. Row-level
/// security scopes every call to the key's user.
pub struct SupabaseBackend {
    client: reqwest::Client,
    base_url: String,
    anon_key: String,
}

impl SupabaseBackend {
    pub fn new(config: &BackendConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .expect("failed to build reqwest client");
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            anon_key: config.anon_key.clone(),
        }
    }

    fn authed(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        builder
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", self.anon_key))
    }

    async fn call_function<T: DeserializeOwned>(
        &self,
        name: &str,
        body: &impl Serialize,
    ) -> anyhow::Result<T> {
        let url = format!("{}/functions/v1/{}", self.base_url, name);
        let response = self
            .authed(self.client.post(&url))
            .json(body)
            .send()
            .await
            .with_context(|| format!("POST {url}"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("{name} returned {status}: {body}");
        }

        response
            .json::<T>()
            .await
            .with_context(|| format!("decoding {name} response"))
    }

    async fn query_jobs(&self, query: &[(&str, String)]) -> anyhow::Result<Vec<JobRow>> {
        let url = format!("{}/rest/v1/{}", self.base_url, JOBS_TABLE);
        let response = self
            .authed(self.client.get(&url))
            .query(query)
            .send()
            .await
            .with_context(|| format!("GET {url}"))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("{JOBS_TABLE} query returned {status}: {body}");
        }

        response
            .json::<Vec<JobRow>>()
            .await
            .context("decoding job rows")
    }
}

fn request_error(e: anyhow::Error) -> BackendError {
    BackendError::Request(format!("{e:#}"))
}

#[async_trait]
impl GenerationBackend for SupabaseBackend {
    // The edge function derives the user from the bearer token, so the id
    // passed here is only used by backends without an auth context.
    #[instrument(skip(self, request), fields(scale = %request.job_scale))]
    async fn create_job(
        &self,
        _user_id: Uuid,
        request: &GenerationRequest,
    ) -> Result<Uuid, BackendError> {
        let response: CreateJobResponse = self
            .call_function(CREATE_FUNCTION, request)
            .await
            .map_err(request_error)?;
        let job_id = response.job_id.ok_or(BackendError::MissingJobId)?;
        debug!(%job_id, "Generation job created");
        Ok(job_id)
    }

    async fn cancel_job(&self, job_id: Uuid) -> Result<(), BackendError> {
        let response: CancelResponse = self
            .call_function(CANCEL_FUNCTION, &json!({ "jobId": job_id }))
            .await
            .map_err(request_error)?;
        if response.success {
            Ok(())
        } else {
            Err(BackendError::Rejected(
                response
                    .error
                    .unwrap_or_else(|| "cancellation refused".to_string()),
            ))
        }
    }

    async fn fetch_job(&self, job_id: Uuid) -> Result<Option<GenerationJob>, BackendError> {
        let rows = self
            .query_jobs(&[
                ("select", "*".to_string()),
                ("id", format!("eq.{job_id}")),
                ("limit", "1".to_string()),
            ])
            .await
            .map_err(request_error)?;
        rows.into_iter()
            .next()
            .map(JobRow::into_job)
            .transpose()
            .map_err(request_error)
    }

    async fn find_active_job(&self, user_id: Uuid) -> Result<Option<GenerationJob>, BackendError> {
        let rows = self
            .query_jobs(&[
                ("select", "*".to_string()),
                ("user_id", format!("eq.{user_id}")),
                ("status", "in.(pending,processing)".to_string()),
                ("order", "created_at.desc".to_string()),
                ("limit", "1".to_string()),
            ])
            .await
            .map_err(request_error)?;
        rows.into_iter()
            .next()
            .map(JobRow::into_job)
            .transpose()
            .map_err(request_error)
    }

    #[instrument(skip(self, document))]
    async fn save_document(
        &self,
        job_id: Uuid,
        user_id: Uuid,
        document: &MethodStatement,
    ) -> Result<(), BackendError> {
        let url = format!("{}/rest/v1/{}", self.base_url, JOBS_TABLE);
        let result: anyhow::Result<()> = async {
            let response = self
                .authed(self.client.patch(&url))
                .query(&[
                    ("id", format!("eq.{job_id}")),
                    ("user_id", format!("eq.{user_id}")),
                ])
                .header("Prefer", "return=minimal")
                .json(&json!({ "method_data": document }))
                .send()
                .await
                .with_context(|| format!("PATCH {url}"))?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                bail!("document save returned {status}: {body}");
            }
            Ok(())
        }
        .await;
        result.map_err(request_error)?;
        debug!(%job_id, "Method statement saved to job record");
        Ok(())
    }
}
