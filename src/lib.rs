//! Web Vision - autonomous end-to-end browser testing with vision model analysis.
//!
//! This crate provides:
//! - A closed browser action vocabulary with a forgiving executor
//! - A vision-oracle adapter with multi-turn exchange accumulation
//! - The tagged-section prompt/response protocol spoken with the oracle
//! - The per-step retry state machine and whole-suite run controller
//! - Capability traits (browser, oracle, store) with production and mock
//!   implementations
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use web_vision::browser::MockDriver;
//! use web_vision::engine::RunController;
//! use web_vision::oracle::HttpTransport;
//! use web_vision::session::Session;
//! use web_vision::store::FsStore;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(FsStore::open("/tmp/web-vision")?);
//! let session = Session::new("job-1", "screenshots")?;
//! let mut controller = RunController::new(
//!     Arc::new(MockDriver::new()),
//!     Arc::new(HttpTransport::new()),
//!     store,
//!     "job-1",
//!     "suite_1",
//!     session,
//! );
//! controller.start().await?;
//! # Ok(())
//! # }
//! ```

pub mod action;
pub mod browser;
pub mod config;
pub mod engine;
pub mod oracle;
pub mod protocol;
pub mod session;
pub mod store;

// Re-export the action vocabulary
pub use action::{execute_action, ActionKind, ActionSpec, ScreenCoord, ScrollSpec};

// Re-export the browser boundary
pub use browser::{BrowserDriver, BrowserError, BrowserResult, CdpDriver, MockDriver, ScreenDimensions};

// Re-export the engine
pub use engine::{EngineError, EngineResult, RunController, StepPlan, StepRunner, MAX_RETRIES, SETTLE_DELAY};

// Re-export the oracle boundary
pub use oracle::{check_health, Exchange, HttpTransport, OracleError, OracleResult, OracleTransport};

// Re-export the store boundary
pub use store::{FsStore, RunStore, StoreError, StoreResult};

// Re-export session management
pub use session::Session;
