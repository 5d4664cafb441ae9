//! Browser automation boundary.
//!
//! The engine only ever talks to [`BrowserDriver`], a small capability trait
//! covering navigation, raw pointer/keyboard input, screenshots, dimension
//! queries and session video recording. [`CdpDriver`] is the production
//! implementation on headless Chromium via the DevTools Protocol;
//! [`MockDriver`] is an in-process double that records calls and serves
//! generated screenshots.

pub mod cdp;
pub mod driver;
pub mod mock;

pub use cdp::CdpDriver;
pub use driver::{
    BrowserDriver, BrowserError, BrowserResult, ScreenDimensions, Viewport, WindowDimensions,
    CARET_STABILIZER_CSS,
};
pub use mock::{DriverCall, MockDriver};
