// rams-generation-client/src/error.rs

use thiserror::Error;

use crate::backend::BackendError;
use crate::session::SessionStoreError;

pub type Result<T> = std::result::Result<T, GenerationError>;

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("A generation is already in progress")]
    AlreadyRunning,

    #[error("No generation in progress")]
    NoActiveJob,

    #[error("Nothing to save: generation has not completed")]
    NothingToSave,

    #[error("Job creation failed: {0}")]
    CreationFailed(#[source] BackendError),

    #[error("Cancellation failed: {0}")]
    CancellationFailed(#[source] BackendError),

    #[error("Resume lookup failed: {0}")]
    ResumeFailed(#[source] BackendError),

    #[error("Save failed: {0}")]
    SaveFailed(#[source] BackendError),

    #[error("Session store error: {0}")]
    Session(#[from] SessionStoreError),

    #[error("Template error: {0}")]
    Template(#[from] handlebars::TemplateError),

    #[error("Rendering error: {0}")]
    Render(#[from] handlebars::RenderError),
}

impl GenerationError {
    /// Short message suitable for a toast or banner, without the error chain.
    pub fn user_message(&self) -> String {
        match self {
            GenerationError::MissingField(field) => {
                format!("Please fill in the {field} before generating")
            }
            GenerationError::AlreadyRunning => {
                "A method statement is already being generated".to_string()
            }
            GenerationError::NoActiveJob => "There is no generation to cancel".to_string(),
            GenerationError::NothingToSave => "Generate a method statement first".to_string(),
            GenerationError::CreationFailed(_) => {
                "Could not start the generation, please try again".to_string()
            }
            GenerationError::CancellationFailed(_) => {
                "Could not cancel the generation, it is still running".to_string()
            }
            GenerationError::ResumeFailed(_) => {
                "Could not check for an in-progress generation".to_string()
            }
            GenerationError::SaveFailed(_) => {
                "Could not save the method statement, please try again".to_string()
            }
            GenerationError::Session(_) => "Could not update the local session".to_string(),
            GenerationError::Template(_) | GenerationError::Render(_) => {
                "Could not export the method statement".to_string()
            }
        }
    }
}
