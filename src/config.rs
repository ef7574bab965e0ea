// rams-generation-client/src/config.rs

use config::{Config as ConfigLoader, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub backend: BackendConfig,
    pub generation: GenerationConfig,
    pub session: SessionConfig,
    pub templates: TemplateConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub log_level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    pub base_url: String,
    pub anon_key: String,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerationConfig {
    pub poll_interval_ms: u64,
    pub poll_failure_threshold: u32,
    pub total_budget_secs: u64,
    pub overdue_after_secs: u64,
    pub surface_creation_failures: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    pub path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TemplateConfig {
    pub path: String,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        let config = ConfigLoader::builder()
            // Start with default values
            .set_default("service.name", "rams-generation-client")?
            .set_default("service.log_level", "info")?
            .set_default("backend.base_url", "http://localhost:54321")?
            .set_default("backend.anon_key", "")?
            .set_default("backend.request_timeout_secs", "30")?
            .set_default("generation.poll_interval_ms", "2000")?
            .set_default("generation.poll_failure_threshold", "3")?
            .set_default("generation.total_budget_secs", "300")?
            .set_default("generation.overdue_after_secs", "240")?
            .set_default("generation.surface_creation_failures", "true")?
            .set_default("session.path", "./method-statement-generation-active.json")?
            .set_default("templates.path", "./templates")?
            // Load from config file if it exists
            .add_source(File::with_name("config").required(false))
            // Override with environment variables (e.g., RAMS__BACKEND__BASE_URL)
            .add_source(Environment::with_prefix("RAMS").separator("__"))
            .build()?;

        config.try_deserialize()
    }
}
