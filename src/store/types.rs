//! Records exchanged with the run store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A stored test suite: name plus its ordered steps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Suite {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub steps: Vec<SuiteStep>,
}

/// One natural-language test step within a suite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteStep {
    pub id: i64,
    pub testsuite_id: String,
    pub description: String,
    /// Unique within the suite; defines execution order.
    pub order_index: i64,
    pub created_at: DateTime<Utc>,
}

/// Lifecycle status of the run process itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PodStatus {
    Starting,
    Running,
    Terminating,
    Stopped,
    Error,
}

/// Outcome status of the suite run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Cancelled,
    Failed,
    Progress,
}

/// The persisted record of one suite run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pod {
    pub id: i64,
    pub testsuite_id: String,
    pub status: PodStatus,
    pub task_status: RunStatus,
    pub jobname: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

/// Partial update applied to a [`Pod`] at a state transition.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PodUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<PodStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_status: Option<RunStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl PodUpdate {
    /// Mark the run stopped with a final outcome.
    pub fn stopped(task_status: RunStatus) -> Self {
        Self {
            status: Some(PodStatus::Stopped),
            task_status: Some(task_status),
            finished_at: Some(Utc::now()),
            ..Self::default()
        }
    }
}

/// Log severity (serialized uppercase, matching the stored log schema).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// One structured log line appended for a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogRecord {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

impl LogRecord {
    pub fn new(level: LogLevel, message: impl Into<String>, meta: Option<Value>) -> Self {
        Self {
            timestamp: Utc::now(),
            level,
            message: message.into(),
            meta,
        }
    }

    pub fn info(message: impl Into<String>, meta: Option<Value>) -> Self {
        Self::new(LogLevel::Info, message, meta)
    }

    pub fn warn(message: impl Into<String>, meta: Option<Value>) -> Self {
        Self::new(LogLevel::Warn, message, meta)
    }

    pub fn error(message: impl Into<String>, meta: Option<Value>) -> Self {
        Self::new(LogLevel::Error, message, meta)
    }
}

/// Category of a persisted run artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ArtifactKind {
    Task,
    Verification,
    Video,
    Error,
}

/// Metadata for a screenshot or video artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactMeta {
    pub jobname: String,
    pub pod_id: i64,
    pub file_name: String,
    pub page_url: String,
    pub mime_type: String,
    pub kind: ArtifactKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}
