//! The browser capability trait and its supporting types.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Result type for browser operations
pub type BrowserResult<T> = Result<T, BrowserError>;

/// Errors that can occur while driving the browser
#[derive(Debug)]
pub enum BrowserError {
    /// Browser process could not be launched or attached
    Launch(String),
    /// A DevTools command failed
    Command(String),
    /// Navigation failed or timed out
    Navigation(String),
    /// IO error (screenshot/video file handling)
    Io(std::io::Error),
}

impl std::fmt::Display for BrowserError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BrowserError::Launch(msg) => write!(f, "Browser launch failed: {}", msg),
            BrowserError::Command(msg) => write!(f, "Browser command failed: {}", msg),
            BrowserError::Navigation(msg) => write!(f, "Navigation failed: {}", msg),
            BrowserError::Io(e) => write!(f, "IO error: {}", e),
        }
    }
}

impl std::error::Error for BrowserError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BrowserError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for BrowserError {
    fn from(e: std::io::Error) -> Self {
        BrowserError::Io(e)
    }
}

/// The page viewport size, when one is set.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

/// Window metrics as reported by the page's `window` object.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WindowDimensions {
    pub width: u32,
    pub height: u32,
    pub outer_width: u32,
    pub outer_height: u32,
    pub screen_width: u32,
    pub screen_height: u32,
}

/// Combined screen dimensions handed to the oracle alongside screenshots so
/// it can produce coordinates that land inside the visible page.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct ScreenDimensions {
    pub viewport: Option<Viewport>,
    pub window: WindowDimensions,
}

/// Browser automation primitives consumed by the execution engine.
///
/// All pointer coordinates are CSS pixels in the page coordinate space.
/// Implementations are expected to keep a current pointer position so that
/// `mouse_down` can press at wherever the pointer last moved.
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    /// Navigate the page to a URL and wait for the load to settle.
    async fn navigate(&self, url: &str) -> BrowserResult<()>;

    /// Move the pointer to a position.
    async fn mouse_move(&self, x: f64, y: f64) -> BrowserResult<()>;

    /// Click (press + release) at a position.
    async fn mouse_click(&self, x: f64, y: f64) -> BrowserResult<()>;

    /// Press the primary button at the current pointer position.
    async fn mouse_down(&self) -> BrowserResult<()>;

    /// Release the primary button at the current pointer position.
    async fn mouse_up(&self) -> BrowserResult<()>;

    /// Scroll by a wheel delta at the current pointer position.
    async fn wheel(&self, delta_x: f64, delta_y: f64) -> BrowserResult<()>;

    /// Type text into the focused element.
    async fn type_text(&self, text: &str) -> BrowserResult<()>;

    /// Capture the current viewport as PNG bytes.
    async fn screenshot(&self) -> BrowserResult<Vec<u8>>;

    /// The page's current URL.
    async fn current_url(&self) -> BrowserResult<String>;

    /// Viewport and window dimensions of the page.
    async fn dimensions(&self) -> BrowserResult<ScreenDimensions>;

    /// Inject a stylesheet into the current page.
    async fn inject_css(&self, css: &str) -> BrowserResult<()>;

    /// Begin recording the session video into `dir`.
    async fn start_video_recording(&self, dir: &Path, width: u32, height: u32) -> BrowserResult<()>;

    /// Stop recording and return the video path, if anything was recorded.
    async fn stop_video_recording(&self) -> BrowserResult<Option<PathBuf>>;

    /// Close the browser and release its resources.
    async fn close(&self) -> BrowserResult<()>;
}

/// CSS injected before each planning screenshot: blinking carets make
/// otherwise-identical screenshots differ, which confuses the before/after
/// comparison the oracle performs.
pub const CARET_STABILIZER_CSS: &str = "input:focus,\ntextarea:focus {\n  -webkit-animation: none !important;\n  animation: none !important;\n  caret-color: black !important;\n}";
