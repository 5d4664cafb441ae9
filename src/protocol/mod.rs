//! Tagged-section prompt/response protocol spoken with the oracle.
//!
//! The oracle answers in plain text containing `<tag>...</tag>` sections,
//! some of which embed JSON payloads. This module owns:
//! - tag extraction ([`extract_tag`]) — tolerant, never fails
//! - embedded-JSON decoding ([`decode_json`]) — returns a typed
//!   success/absence/malformed result instead of throwing
//! - the prompt templates for planning a test step and for requesting the
//!   next action during iteration

pub mod decode;
pub mod prompts;
pub mod tags;

pub use decode::{decode_json, first_json_object, Decoded};
pub use prompts::{
    iterate_user_prompt, plan_user_prompt, IterateContext, ITERATE_SYSTEM_PROMPT,
    PLAN_SYSTEM_PROMPT,
};
pub use tags::extract_tag;

/// Response tags produced by a plan request.
pub const TAG_TEST_STEP_ANALYSIS: &str = "test_step_analysis";
pub const TAG_VISUAL_STEPS: &str = "visual_steps";
pub const TAG_ACTION_STEPS: &str = "action_steps";
pub const TAG_EXECUTION_NOTES: &str = "execution_notes";

/// Response tags produced by an iterate request.
pub const TAG_ACTION: &str = "action";
pub const TAG_TEST_STEP_RESPONSE: &str = "test_step_response";
pub const TAG_ERROR: &str = "error";

/// Context tags used when building requests.
pub const TAG_TEST_STEP: &str = "test_step";
pub const TAG_SCREEN_DIMENSIONS: &str = "screen_dimensions";
pub const TAG_NEXT_TEST_STEP: &str = "next_test_step";
pub const TAG_PREVIOUS_ACTION: &str = "previous_action";
