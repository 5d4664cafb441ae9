//! The per-step retry state machine.
//!
//! One test step goes PLANNING → ITERATING → (COMPLETE | FAILED |
//! RETRY_EXHAUSTED). Planning seeds a [`StepPlan`] from a single oracle
//! call; iterating then alternates oracle evaluation and action execution
//! until the oracle declares the step complete, declares it failed, reports
//! a page bug, or the retry budget runs out.

use serde_json::json;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::action::{execute_action, ActionSpec};
use crate::browser::{BrowserDriver, ScreenDimensions, CARET_STABILIZER_CSS};
use crate::oracle::Exchange;
use crate::protocol::{
    decode_json, iterate_user_prompt, plan_user_prompt, Decoded, IterateContext,
    ITERATE_SYSTEM_PROMPT, PLAN_SYSTEM_PROMPT,
};
use crate::session::Session;
use crate::store::{ArtifactKind, ArtifactMeta, LogRecord, Pod, RunStore};

use super::plan::{OracleFault, StepEvaluation, StepPlan, StepResponse};
use super::{EngineError, EngineResult, MAX_RETRIES, SETTLE_DELAY};

const STATUS_COMPLETE: &str = "complete";
const STATUS_FAILED: &str = "failed";

/// Executes one test step against the injected collaborators.
pub struct StepRunner<'a> {
    driver: &'a dyn BrowserDriver,
    store: &'a dyn RunStore,
    plan_chat: &'a mut Exchange,
    iterate_chat: &'a mut Exchange,
    session: &'a mut Session,
    pod: &'a Pod,
    dimensions: &'a ScreenDimensions,
}

impl<'a> StepRunner<'a> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        driver: &'a dyn BrowserDriver,
        store: &'a dyn RunStore,
        plan_chat: &'a mut Exchange,
        iterate_chat: &'a mut Exchange,
        session: &'a mut Session,
        pod: &'a Pod,
        dimensions: &'a ScreenDimensions,
    ) -> Self {
        Self {
            driver,
            store,
            plan_chat,
            iterate_chat,
            session,
            pod,
            dimensions,
        }
    }

    /// Run one test step to a terminal state.
    pub async fn execute(
        &mut self,
        step_index: usize,
        step_text: &str,
        lookahead: Option<&str>,
    ) -> EngineResult<()> {
        let mut plan = self.build_plan(step_text, lookahead).await?;
        info!(step = step_index, "test step planned");
        self.store
            .append_log(
                self.pod.id,
                LogRecord::info("test_step_flow", serde_json::to_value(&plan).ok()),
            )
            .await?;

        let mut retries: u32 = 0;
        while retries < MAX_RETRIES {
            let eval = self.evaluate(&plan).await?;

            let verdict = match decode_json::<StepResponse>(&eval.test_step_response) {
                Decoded::Value(v) => v,
                // Absent or malformed verdicts count as partial progress.
                _ => StepResponse::default(),
            };
            let is_complete = verdict.status.as_deref() == Some(STATUS_COMPLETE);

            if !is_complete {
                if let Decoded::Value(action) = decode_json::<ActionSpec>(&eval.action) {
                    self.run_action(step_text, &action).await?;
                    plan.previous_action = Some(eval.action.trim().to_string());
                }
            }

            self.store
                .append_log(
                    self.pod.id,
                    LogRecord::info("test_step_flow_eval", serde_json::to_value(&eval).ok()),
                )
                .await?;

            // A fault report outranks everything else in the response,
            // including a complete verdict.
            if let Decoded::Value(fault) = decode_json::<OracleFault>(&eval.error) {
                if let Some(err_type) = fault.err_type.filter(|t| !t.is_empty()) {
                    return Err(EngineError::Protocol {
                        err_type,
                        description: fault.description.unwrap_or_default(),
                    });
                }
            }

            match verdict.status.as_deref() {
                Some(STATUS_COMPLETE) => {
                    info!(step = step_index, "test step complete");
                    return Ok(());
                }
                Some(STATUS_FAILED) => {
                    return Err(EngineError::StepFailed {
                        step_index,
                        message: verdict
                            .message
                            .unwrap_or_else(|| "oracle declared the step failed".to_string()),
                    });
                }
                _ => {}
            }

            if !eval.visual_steps.is_empty() {
                plan.visual_steps = eval.visual_steps;
            }
            if !eval.action_steps.is_empty() {
                plan.action_steps = eval.action_steps;
            }

            retries += 1;
            let message = format!("Retrying step \"{}\", attempt {}", step_text, retries);
            warn!(step = step_index, attempt = retries, "retrying test step");
            self.store
                .append_log(
                    self.pod.id,
                    LogRecord::warn("retry_task", Some(json!({ "message": message }))),
                )
                .await?;
        }

        Err(EngineError::RetryExhausted {
            step_index,
            attempts: MAX_RETRIES,
        })
    }

    /// PLANNING: capture a screenshot and ask the oracle to decompose the
    /// step into checklists.
    async fn build_plan(&mut self, step_text: &str, lookahead: Option<&str>) -> EngineResult<StepPlan> {
        self.driver
            .inject_css(CARET_STABILIZER_CSS)
            .await
            .map_err(EngineError::Browser)?;
        let shot = self.capture().await?;

        self.plan_chat.add_turn(
            Some(&plan_user_prompt(step_text)),
            Some(&[shot.as_path()]),
            Some(PLAN_SYSTEM_PROMPT),
        )?;
        let response = self.plan_chat.complete().await?;

        let mut plan = StepPlan::from_plan_response(&response);
        plan.next_step = lookahead.map(str::to_string);
        Ok(plan)
    }

    /// One iterate request with the latest one or two screenshots.
    async fn evaluate(&mut self, plan: &StepPlan) -> EngineResult<StepEvaluation> {
        let latest = self.session.latest().ok_or_else(|| {
            EngineError::Configuration("no screenshot captured before iteration".to_string())
        })?;
        let mut images: Vec<PathBuf> = Vec::new();
        if let Some(previous) = self.session.previous() {
            images.push(previous);
        }
        images.push(latest);
        let image_refs: Vec<&Path> = images.iter().map(|p| p.as_path()).collect();

        let dimensions = serde_json::to_value(self.dimensions).unwrap_or(serde_json::Value::Null);
        let ctx = IterateContext {
            analysis: &plan.analysis,
            visual_steps: &plan.visual_steps,
            action_steps: &plan.action_steps,
            execution_notes: &plan.execution_notes,
            previous_action: plan.previous_action.as_deref(),
            next_step: plan.next_step.as_deref(),
            screen_dimensions: &dimensions,
        };

        self.iterate_chat.add_turn(
            Some(&iterate_user_prompt(&ctx)),
            Some(&image_refs),
            Some(ITERATE_SYSTEM_PROMPT),
        )?;
        let response = self.iterate_chat.complete().await?;
        Ok(StepEvaluation::from_response(&response))
    }

    /// Execute an oracle-requested action, wait for the UI to settle,
    /// capture the after-screenshot and persist it as a TASK artifact.
    async fn run_action(&mut self, step_text: &str, action: &ActionSpec) -> EngineResult<()> {
        execute_action(self.driver, action)
            .await
            .map_err(EngineError::Browser)?;
        tokio::time::sleep(SETTLE_DELAY).await;

        let after = self.capture().await?;
        let page_url = self.driver.current_url().await.map_err(EngineError::Browser)?;
        let file_name = after
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "screenshot.png".to_string());

        let meta = ArtifactMeta {
            jobname: self.session.job_name().to_string(),
            pod_id: self.pod.id,
            file_name,
            page_url,
            mime_type: "image/png".to_string(),
            kind: ArtifactKind::Task,
            details: Some(json!({ "task": step_text, "action": action })),
        };
        self.store.put_artifact(&meta, &after).await?;
        Ok(())
    }

    async fn capture(&mut self) -> EngineResult<PathBuf> {
        let bytes = self.driver.screenshot().await.map_err(EngineError::Browser)?;
        let path = self.session.next_screenshot_path();
        tokio::fs::write(&path, &bytes).await?;
        Ok(path)
    }
}
