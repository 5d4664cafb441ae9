//! The test-step execution engine.
//!
//! [`step`] holds the per-step retry state machine, [`runner`] the
//! controller that sequences a whole suite through it. Both operate purely
//! on the browser, oracle and store capability traits, so the engine runs
//! identically against Chromium or against in-process fakes.

pub mod plan;
pub mod runner;
pub mod step;

use std::time::Duration;

use crate::browser::BrowserError;
use crate::oracle::OracleError;
use crate::store::StoreError;

pub use plan::{OracleFault, StepEvaluation, StepPlan, StepResponse};
pub use runner::RunController;
pub use step::StepRunner;

/// Retry ceiling per test step. Reaching it without a `complete` verdict
/// fails the whole run.
pub const MAX_RETRIES: u32 = 4;

/// Pause after executing an action before the next screenshot, so the UI
/// has rendered what the action caused.
pub const SETTLE_DELAY: Duration = Duration::from_secs(5);

/// Result type for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that can end a run
#[derive(Debug)]
pub enum EngineError {
    /// Missing or unusable run identity at startup
    Configuration(String),
    /// The oracle reported an application bug via the error tag; the target
    /// page is broken, not flaky
    Protocol { err_type: String, description: String },
    /// The oracle declared the step failed
    StepFailed { step_index: usize, message: String },
    /// A step burned through its whole retry budget
    RetryExhausted { step_index: usize, attempts: u32 },
    /// Oracle transport/parse failure
    Oracle(OracleError),
    /// Browser action failure
    Browser(BrowserError),
    /// Persistence failure
    Store(StoreError),
    /// I/O error (screenshot files)
    Io(std::io::Error),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::Configuration(msg) => write!(f, "Configuration error: {}", msg),
            EngineError::Protocol { err_type, description } => {
                write!(f, "Oracle reported a blocking bug: {}: {}", err_type, description)
            }
            EngineError::StepFailed { step_index, message } => {
                write!(f, "Step {} failed: {}", step_index, message)
            }
            EngineError::RetryExhausted { step_index, attempts } => {
                write!(f, "Step {} failed after {} attempts", step_index, attempts)
            }
            EngineError::Oracle(e) => write!(f, "Oracle error: {}", e),
            EngineError::Browser(e) => write!(f, "Browser error: {}", e),
            EngineError::Store(e) => write!(f, "Store error: {}", e),
            EngineError::Io(e) => write!(f, "IO error: {}", e),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::Oracle(e) => Some(e),
            EngineError::Browser(e) => Some(e),
            EngineError::Store(e) => Some(e),
            EngineError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<OracleError> for EngineError {
    fn from(e: OracleError) -> Self {
        EngineError::Oracle(e)
    }
}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        EngineError::Store(e)
    }
}

impl From<std::io::Error> for EngineError {
    fn from(e: std::io::Error) -> Self {
        EngineError::Io(e)
    }
}
