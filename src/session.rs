// rams-generation-client/src/session.rs

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

/// Storage key the browser client used for the same marker; kept as the
/// default file stem so both clients recognise each other's sessions.
pub const SESSION_MARKER_KEY: &str = "method-statement-generation-active";

/// Breadcrumb left while a generation is in flight so a fresh mount can pick
/// the job back up. The job id is a cached hint; resumption re-queries the
/// backend for the authoritative record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionMarker {
    pub job_id: Option<Uuid>,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum SessionStoreError {
    #[error("Session store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Session marker serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub trait SessionStore: Send + Sync {
    fn load(&self) -> Result<Option<SessionMarker>, SessionStoreError>;
    fn save(&self, marker: &SessionMarker) -> Result<(), SessionStoreError>;
    fn clear(&self) -> Result<(), SessionStoreError>;
}

/// Marker persisted as a small JSON file. Writes go through a temp file in
/// the same directory so a crash mid-write never leaves a half-written
/// marker behind.
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn parent_dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("."))
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> Result<Option<SessionMarker>, SessionStoreError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_slice(&bytes) {
            Ok(marker) => Ok(Some(marker)),
            Err(e) => {
                // A corrupt marker is treated the same as no marker.
                warn!(path = %self.path.display(), error = %e, "Discarding unreadable session marker");
                Ok(None)
            }
        }
    }

    fn save(&self, marker: &SessionMarker) -> Result<(), SessionStoreError> {
        let mut file = NamedTempFile::new_in(self.parent_dir())?;
        file.write_all(&serde_json::to_vec(marker)?)?;
        file.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }

    fn clear(&self) -> Result<(), SessionStoreError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Marker held in memory, for tests and for hosts that do not want
/// cross-process resumption.
#[derive(Default)]
pub struct InMemorySessionStore {
    marker: Mutex<Option<SessionMarker>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn cell(&self) -> MutexGuard<'_, Option<SessionMarker>> {
        self.marker.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SessionStore for InMemorySessionStore {
    fn load(&self) -> Result<Option<SessionMarker>, SessionStoreError> {
        Ok(self.cell().clone())
    }

    fn save(&self, marker: &SessionMarker) -> Result<(), SessionStoreError> {
        *self.cell() = Some(marker.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), SessionStoreError> {
        *self.cell() = None;
        Ok(())
    }
}
