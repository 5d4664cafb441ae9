//! Per-step working state and parsed oracle responses.

use serde::{Deserialize, Serialize};

use crate::protocol::{
    extract_tag, TAG_ACTION, TAG_ACTION_STEPS, TAG_ERROR, TAG_EXECUTION_NOTES,
    TAG_TEST_STEP_ANALYSIS, TAG_TEST_STEP_RESPONSE, TAG_VISUAL_STEPS,
};

/// Working state for one test step, produced once at step start and mutated
/// across retries. Discarded when the step completes or fails for good.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StepPlan {
    /// The oracle's reading of the test step.
    pub analysis: String,
    /// Checklist of visual checks, `[]`-prefixed, `[x]` once confirmed.
    pub visual_steps: String,
    /// Checklist of actions, same marker convention.
    pub action_steps: String,
    /// Free-text notes on executing the steps.
    pub execution_notes: String,
    /// Raw JSON of the last executed action, carried as oracle context.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_action: Option<String>,
    /// The following test step's text, for lookahead context.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_step: Option<String>,
}

impl StepPlan {
    /// Seed a plan from a plan-request response.
    pub fn from_plan_response(text: &str) -> Self {
        Self {
            analysis: extract_tag(text, TAG_TEST_STEP_ANALYSIS),
            visual_steps: extract_tag(text, TAG_VISUAL_STEPS),
            action_steps: extract_tag(text, TAG_ACTION_STEPS),
            execution_notes: extract_tag(text, TAG_EXECUTION_NOTES),
            previous_action: None,
            next_step: None,
        }
    }
}

/// The tagged fields of one iterate-request response. All fields are plain
/// strings straight out of tag extraction; empty means the tag was absent.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StepEvaluation {
    pub visual_steps: String,
    pub action_steps: String,
    /// JSON text of the requested action, or empty.
    pub action: String,
    /// JSON text of the `{status, message}` verdict, or empty.
    pub test_step_response: String,
    /// JSON text of the `{err_type, description}` fault report, or empty.
    pub error: String,
}

impl StepEvaluation {
    /// Extract the protocol fields from a raw oracle response.
    pub fn from_response(text: &str) -> Self {
        Self {
            visual_steps: extract_tag(text, TAG_VISUAL_STEPS),
            action_steps: extract_tag(text, TAG_ACTION_STEPS),
            action: extract_tag(text, TAG_ACTION),
            test_step_response: extract_tag(text, TAG_TEST_STEP_RESPONSE),
            error: extract_tag(text, TAG_ERROR),
        }
    }
}

/// The oracle's per-iteration verdict. Every field is optional; a missing
/// or malformed verdict is treated as `partial`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StepResponse {
    pub status: Option<String>,
    pub message: Option<String>,
}

/// The oracle's fault report: the task cannot proceed because the page
/// itself is broken.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OracleFault {
    pub err_type: Option<String>,
    pub description: Option<String>,
}
