//! The run controller: drives a whole suite through the step state machine.
//!
//! Owns the run record lifecycle (STARTING → RUNNING → SUCCESS | FAILED),
//! executes steps strictly in order-index order, and always finishes by
//! closing the browser and persisting the session video, whatever happened
//! before.

use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::browser::BrowserDriver;
use crate::config;
use crate::oracle::{Exchange, OracleTransport};
use crate::session::Session;
use crate::store::{
    ArtifactKind, ArtifactMeta, LogRecord, Pod, PodStatus, PodUpdate, RunStatus, RunStore,
    SuiteStep,
};

use super::step::StepRunner;
use super::{EngineError, EngineResult};

/// Controller for one suite run.
pub struct RunController {
    driver: Arc<dyn BrowserDriver>,
    transport: Arc<dyn OracleTransport>,
    store: Arc<dyn RunStore>,
    job_name: String,
    suite_id: String,
    session: Session,
    video_size: (u32, u32),
}

impl RunController {
    pub fn new(
        driver: Arc<dyn BrowserDriver>,
        transport: Arc<dyn OracleTransport>,
        store: Arc<dyn RunStore>,
        job_name: impl Into<String>,
        suite_id: impl Into<String>,
        session: Session,
    ) -> Self {
        let browser = &config::get().browser;
        Self {
            driver,
            transport,
            store,
            job_name: job_name.into(),
            suite_id: suite_id.into(),
            session,
            video_size: (browser.video_width, browser.video_height),
        }
    }

    /// Execute the whole suite run to a terminal state.
    ///
    /// The returned error is the run's fatal cause; by the time it is
    /// returned the run record is already marked failed, the browser closed
    /// and the video persisted.
    pub async fn start(&mut self) -> EngineResult<()> {
        if self.job_name.is_empty() || self.suite_id.is_empty() {
            return Err(EngineError::Configuration(
                "job name and test suite id are required".to_string(),
            ));
        }

        let pod = self.store.pod_by_job_name(&self.job_name).await?;
        let steps = self.store.suite_steps(&self.suite_id).await?;
        install_crash_handler(Arc::clone(&self.store), pod.id);

        self.store
            .update_pod(
                pod.id,
                PodUpdate {
                    status: Some(PodStatus::Running),
                    task_status: Some(RunStatus::Progress),
                    started_at: Some(Utc::now()),
                    ..PodUpdate::default()
                },
            )
            .await?;

        let (width, height) = self.video_size;
        self.driver
            .start_video_recording(self.session.dir(), width, height)
            .await
            .map_err(EngineError::Browser)?;

        let result = self.run_steps(&pod, &steps).await;

        match &result {
            Ok(()) => {
                info!(job = %self.job_name, "suite run succeeded");
                if let Err(e) = self
                    .store
                    .update_pod(pod.id, PodUpdate::stopped(RunStatus::Success))
                    .await
                {
                    warn!("Failed to mark run successful: {}", e);
                }
            }
            Err(cause) => {
                error!(job = %self.job_name, "suite run failed: {}", cause);
                if let Err(e) = self
                    .store
                    .append_log(
                        pod.id,
                        LogRecord::error("exec_error", Some(json!({ "error": cause.to_string() }))),
                    )
                    .await
                {
                    warn!("Failed to log run error: {}", e);
                }
                let update = PodUpdate {
                    error_message: Some(cause.to_string()),
                    ..PodUpdate::stopped(RunStatus::Failed)
                };
                if let Err(e) = self.store.update_pod(pod.id, update).await {
                    warn!("Failed to mark run failed: {}", e);
                }
            }
        }

        self.finalize(&pod).await;
        result
    }

    async fn run_steps(&mut self, pod: &Pod, steps: &[SuiteStep]) -> EngineResult<()> {
        let dimensions = self.driver.dimensions().await.map_err(EngineError::Browser)?;

        // Separate conversations for planning and iterating, each
        // accumulating context across the whole run.
        let mut plan_chat = Exchange::new(Arc::clone(&self.transport));
        let mut iterate_chat = Exchange::new(Arc::clone(&self.transport));

        for (index, step) in steps.iter().enumerate() {
            let lookahead = steps.get(index + 1).map(|s| s.description.as_str());
            let mut runner = StepRunner::new(
                self.driver.as_ref(),
                self.store.as_ref(),
                &mut plan_chat,
                &mut iterate_chat,
                &mut self.session,
                pod,
                &dimensions,
            );
            runner.execute(index, &step.description, lookahead).await?;
        }
        Ok(())
    }

    /// Always runs, success or failure: stop the recording, persist the
    /// video artifact, close the browser. Failures here are logged, never
    /// propagated - they must not mask the run's own outcome.
    async fn finalize(&self, pod: &Pod) {
        match self.driver.stop_video_recording().await {
            Ok(Some(video_path)) => {
                let file_name = video_path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_else(|| "recording.mjpeg".to_string());
                let meta = ArtifactMeta {
                    jobname: self.job_name.clone(),
                    pod_id: pod.id,
                    file_name,
                    page_url: String::new(),
                    mime_type: "video/x-motion-jpeg".to_string(),
                    kind: ArtifactKind::Video,
                    details: Some(json!({ "task": "final_video" })),
                };
                if let Err(e) = self.store.put_artifact(&meta, &video_path).await {
                    warn!("Failed to persist session video: {}", e);
                }
            }
            Ok(None) => {}
            Err(e) => warn!("Failed to stop video recording: {}", e),
        }

        if let Err(e) = self.driver.close().await {
            warn!("Failed to close browser: {}", e);
        }
    }
}

/// Route panics into the run's log before the process dies, so a crashed
/// run is diagnosable from its persisted record alone.
fn install_crash_handler(store: Arc<dyn RunStore>, pod_id: i64) {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        store.crash_log(pod_id, &info.to_string());
        previous(info);
    }));
}
