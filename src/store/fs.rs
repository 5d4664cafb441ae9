//! Directory-backed run store.
//!
//! Layout under the base directory:
//!
//! ```text
//! suites/<suite_id>.json          suite definition with its steps
//! pods/<jobname>.json             one run record per job name
//! logs/<pod_id>.jsonl             append-only structured log
//! artifacts/<jobname>/<ts>_<name> uploaded screenshots and videos
//! ```
//!
//! Documents are plain JSON so a run can be inspected with nothing but a
//! pager. All writes are keyed by one run's identity, so concurrent runs
//! sharing a base directory do not contend.

use async_trait::async_trait;
use chrono::Utc;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::types::{
    ArtifactMeta, LogLevel, LogRecord, Pod, PodStatus, PodUpdate, RunStatus, Suite, SuiteStep,
};
use super::{RunStore, StoreError, StoreResult};

/// Directory-backed [`RunStore`].
#[derive(Debug, Clone)]
pub struct FsStore {
    base: PathBuf,
}

impl FsStore {
    /// Open (and create if needed) a store rooted at `base`.
    pub fn open(base: impl Into<PathBuf>) -> StoreResult<Self> {
        let base = base.into();
        for sub in ["suites", "pods", "logs", "artifacts"] {
            fs::create_dir_all(base.join(sub))?;
        }
        Ok(Self { base })
    }

    /// Create a suite from a name and its ordered step descriptions.
    pub fn create_suite(&self, name: &str, steps: &[String]) -> StoreResult<Suite> {
        let now = Utc::now();
        let id = format!("suite_{}_{}", now.timestamp_millis(), std::process::id());
        let suite = Suite {
            id: id.clone(),
            name: name.to_string(),
            created_at: now,
            steps: steps
                .iter()
                .enumerate()
                .map(|(i, description)| SuiteStep {
                    id: i as i64 + 1,
                    testsuite_id: id.clone(),
                    description: description.clone(),
                    order_index: i as i64,
                    created_at: now,
                })
                .collect(),
        };
        write_json(&self.suite_path(&suite.id), &suite)?;
        Ok(suite)
    }

    /// Register a run record for a job name.
    pub fn create_pod(&self, jobname: &str, suite_id: &str) -> StoreResult<Pod> {
        let now = Utc::now();
        let pod = Pod {
            id: now.timestamp_millis(),
            testsuite_id: suite_id.to_string(),
            status: PodStatus::Starting,
            task_status: RunStatus::Progress,
            jobname: jobname.to_string(),
            host: hostname::get().ok().map(|h| h.to_string_lossy().to_string()),
            error_message: None,
            created_at: now,
            started_at: None,
            finished_at: None,
        };
        write_json(&self.pod_path(jobname), &pod)?;
        Ok(pod)
    }

    fn suite_path(&self, suite_id: &str) -> PathBuf {
        self.base.join("suites").join(format!("{}.json", sanitize_name(suite_id)))
    }

    fn pod_path(&self, jobname: &str) -> PathBuf {
        self.base.join("pods").join(format!("{}.json", sanitize_name(jobname)))
    }

    fn log_path(&self, pod_id: i64) -> PathBuf {
        self.base.join("logs").join(format!("{}.jsonl", pod_id))
    }

    fn find_pod_by_id(&self, id: i64) -> StoreResult<(PathBuf, Pod)> {
        for entry in fs::read_dir(self.base.join("pods"))? {
            let path = entry?.path();
            if path.extension().map(|e| e == "json").unwrap_or(false) {
                let pod: Pod = read_json(&path)?;
                if pod.id == id {
                    return Ok((path, pod));
                }
            }
        }
        Err(StoreError::NotFound(format!("pod {}", id)))
    }

    fn append_log_line(&self, pod_id: i64, record: &LogRecord) -> StoreResult<()> {
        let line = serde_json::to_string(record)?;
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.log_path(pod_id))?;
        writeln!(file, "{}", line)?;
        Ok(())
    }

    /// Read back every log record for a run, in append order.
    pub fn read_logs(&self, pod_id: i64) -> StoreResult<Vec<LogRecord>> {
        let path = self.log_path(pod_id);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(path)?;
        let mut records = Vec::new();
        for line in content.lines().filter(|l| !l.trim().is_empty()) {
            records.push(serde_json::from_str(line)?);
        }
        Ok(records)
    }

    /// List the stored artifact metadata for a job, in storage order.
    pub fn list_artifacts(&self, jobname: &str) -> StoreResult<Vec<ArtifactMeta>> {
        let dir = self.base.join("artifacts").join(sanitize_name(jobname));
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut paths: Vec<PathBuf> = fs::read_dir(&dir)?
            .filter_map(|e| e.ok().map(|e| e.path()))
            .filter(|p| p.extension().map(|e| e == "meta").unwrap_or(false))
            .collect();
        paths.sort();
        let mut metas = Vec::new();
        for path in paths {
            metas.push(read_json(&path)?);
        }
        Ok(metas)
    }
}

#[async_trait]
impl RunStore for FsStore {
    async fn pod_by_job_name(&self, jobname: &str) -> StoreResult<Pod> {
        let path = self.pod_path(jobname);
        if !path.exists() {
            return Err(StoreError::NotFound(format!("pod for job {}", jobname)));
        }
        read_json(&path)
    }

    async fn suite_steps(&self, suite_id: &str) -> StoreResult<Vec<SuiteStep>> {
        let path = self.suite_path(suite_id);
        if !path.exists() {
            return Err(StoreError::NotFound(format!("suite {}", suite_id)));
        }
        let suite: Suite = read_json(&path)?;
        let mut steps = suite.steps;
        steps.sort_by_key(|s| s.order_index);
        Ok(steps)
    }

    async fn update_pod(&self, id: i64, update: PodUpdate) -> StoreResult<Pod> {
        let (path, mut pod) = self.find_pod_by_id(id)?;
        if let Some(status) = update.status {
            pod.status = status;
        }
        if let Some(task_status) = update.task_status {
            pod.task_status = task_status;
        }
        if let Some(error_message) = update.error_message {
            pod.error_message = Some(error_message);
        }
        if let Some(started_at) = update.started_at {
            pod.started_at = Some(started_at);
        }
        if let Some(finished_at) = update.finished_at {
            pod.finished_at = Some(finished_at);
        }
        write_json(&path, &pod)?;
        Ok(pod)
    }

    async fn append_log(&self, pod_id: i64, record: LogRecord) -> StoreResult<()> {
        self.append_log_line(pod_id, &record)
    }

    async fn put_artifact(&self, meta: &ArtifactMeta, file: &Path) -> StoreResult<String> {
        let dir = self.base.join("artifacts").join(sanitize_name(&meta.jobname));
        fs::create_dir_all(&dir)?;

        let stored_name = format!(
            "{}_{}",
            Utc::now().timestamp_millis(),
            sanitize_name(&meta.file_name)
        );
        let dest = dir.join(&stored_name);
        fs::copy(file, &dest)?;
        write_json(&dir.join(format!("{}.meta", stored_name)), meta)?;

        Ok(format!("{}/{}", sanitize_name(&meta.jobname), stored_name))
    }

    async fn artifact_url(&self, storage_path: &str) -> StoreResult<String> {
        let path = self.base.join("artifacts").join(storage_path);
        if !path.exists() {
            return Err(StoreError::NotFound(format!("artifact {}", storage_path)));
        }
        Ok(format!("file://{}", path.display()))
    }

    fn crash_log(&self, pod_id: i64, message: &str) {
        let record = LogRecord::new(LogLevel::Error, "uncaught_panic", Some(serde_json::json!({
            "message": message,
        })));
        let _ = self.append_log_line(pod_id, &record);
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> StoreResult<T> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> StoreResult<()> {
    fs::write(path, serde_json::to_string_pretty(value)?)?;
    Ok(())
}

/// Sanitize a name for use in filenames
fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' | '.' => c,
            _ => '_',
        })
        .collect()
}
