//! Persistence boundary for suites, runs, logs and artifacts.
//!
//! The engine reports to a [`RunStore`] and never cares where the data
//! lands. [`FsStore`] is the directory-backed implementation; a deployment
//! fronted by a real database only needs to supply another `RunStore`.
//! Writes are insert/keyed-update operations scoped to one run's identity,
//! so concurrent runs can share a store without cross-run locking.

pub mod fs;
pub mod types;

use async_trait::async_trait;
use std::path::Path;

pub use fs::FsStore;
pub use types::{
    ArtifactKind, ArtifactMeta, LogLevel, LogRecord, Pod, PodStatus, PodUpdate, RunStatus, Suite,
    SuiteStep,
};

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur talking to the run store
#[derive(Debug)]
pub enum StoreError {
    /// The requested record does not exist
    NotFound(String),
    /// A stored document failed to (de)serialize
    Serialization(serde_json::Error),
    /// I/O error
    Io(std::io::Error),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::NotFound(what) => write!(f, "Not found: {}", what),
            StoreError::Serialization(e) => write!(f, "Serialization error: {}", e),
            StoreError::Io(e) => write!(f, "I/O error: {}", e),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StoreError::NotFound(_) => None,
            StoreError::Serialization(e) => Some(e),
            StoreError::Io(e) => Some(e),
        }
    }
}

impl From<std::io::Error> for StoreError {
    fn from(e: std::io::Error) -> Self {
        StoreError::Io(e)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Serialization(e)
    }
}

/// Persistence capability consumed by the run controller and state machine.
#[async_trait]
pub trait RunStore: Send + Sync {
    /// Look up the run record registered for a job name.
    async fn pod_by_job_name(&self, jobname: &str) -> StoreResult<Pod>;

    /// The steps of a suite, ordered by `order_index`.
    async fn suite_steps(&self, suite_id: &str) -> StoreResult<Vec<SuiteStep>>;

    /// Apply a partial update to a run record.
    async fn update_pod(&self, id: i64, update: PodUpdate) -> StoreResult<Pod>;

    /// Append a structured log line for a run.
    async fn append_log(&self, pod_id: i64, record: LogRecord) -> StoreResult<()>;

    /// Persist an artifact file, returning its storage path.
    async fn put_artifact(&self, meta: &ArtifactMeta, file: &Path) -> StoreResult<String>;

    /// A retrievable URL for a stored artifact path.
    async fn artifact_url(&self, storage_path: &str) -> StoreResult<String>;

    /// Best-effort synchronous log write, callable from a panic hook where
    /// no runtime is available. Implementations without a cheap synchronous
    /// path may leave this as the default no-op.
    fn crash_log(&self, _pod_id: i64, _message: &str) {}
}
