//! In-process browser double for tests and offline dry runs.
//!
//! Records every driver call and serves a generated placeholder screenshot,
//! so engine behavior can be asserted without a Chromium install.

use async_trait::async_trait;
use image::{ImageOutputFormat, Rgb, RgbImage};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::driver::{
    BrowserDriver, BrowserError, BrowserResult, ScreenDimensions, Viewport, WindowDimensions,
};

/// One recorded driver interaction.
#[derive(Debug, Clone, PartialEq)]
pub enum DriverCall {
    Navigate(String),
    MouseMove { x: f64, y: f64 },
    MouseClick { x: f64, y: f64 },
    MouseDown,
    MouseUp,
    Wheel { delta_x: f64, delta_y: f64 },
    TypeText(String),
    Screenshot,
    InjectCss,
}

/// A [`BrowserDriver`] that performs no real browser work.
pub struct MockDriver {
    calls: Mutex<Vec<DriverCall>>,
    url: Mutex<String>,
    screenshot_png: Vec<u8>,
    video_path: Mutex<Option<PathBuf>>,
    /// When set, `navigate` fails with this message (for failure-path tests).
    navigation_failure: Option<String>,
}

impl MockDriver {
    pub fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            url: Mutex::new("about:blank".to_string()),
            screenshot_png: placeholder_png(64, 48),
            video_path: Mutex::new(None),
            navigation_failure: None,
        }
    }

    /// A driver whose `navigate` calls fail, for exercising the
    /// execution-error path.
    pub fn failing_navigation(message: impl Into<String>) -> Self {
        Self {
            navigation_failure: Some(message.into()),
            ..Self::new()
        }
    }

    /// Snapshot of the recorded calls.
    pub fn calls(&self) -> Vec<DriverCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Count of calls matching a predicate.
    pub fn count_calls(&self, predicate: impl Fn(&DriverCall) -> bool) -> usize {
        self.calls().iter().filter(|c| predicate(c)).count()
    }

    fn record(&self, call: DriverCall) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }
}

impl Default for MockDriver {
    fn default() -> Self {
        Self::new()
    }
}

/// Render a small solid PNG with a single highlight block, mimicking a page.
fn placeholder_png(width: u32, height: u32) -> Vec<u8> {
    let mut img = RgbImage::from_pixel(width, height, Rgb([24, 26, 32]));
    for y in height / 4..height / 2 {
        for x in width / 4..(3 * width / 4) {
            img.put_pixel(x, y, Rgb([200, 200, 210]));
        }
    }
    let mut buf = Cursor::new(Vec::new());
    // Encoding a freshly built RGB image into PNG cannot fail.
    image::DynamicImage::ImageRgb8(img)
        .write_to(&mut buf, ImageOutputFormat::Png)
        .ok();
    buf.into_inner()
}

#[async_trait]
impl BrowserDriver for MockDriver {
    async fn navigate(&self, url: &str) -> BrowserResult<()> {
        self.record(DriverCall::Navigate(url.to_string()));
        if let Some(message) = &self.navigation_failure {
            return Err(BrowserError::Navigation(message.clone()));
        }
        if let Ok(mut current) = self.url.lock() {
            *current = url.to_string();
        }
        Ok(())
    }

    async fn mouse_move(&self, x: f64, y: f64) -> BrowserResult<()> {
        self.record(DriverCall::MouseMove { x, y });
        Ok(())
    }

    async fn mouse_click(&self, x: f64, y: f64) -> BrowserResult<()> {
        self.record(DriverCall::MouseClick { x, y });
        Ok(())
    }

    async fn mouse_down(&self) -> BrowserResult<()> {
        self.record(DriverCall::MouseDown);
        Ok(())
    }

    async fn mouse_up(&self) -> BrowserResult<()> {
        self.record(DriverCall::MouseUp);
        Ok(())
    }

    async fn wheel(&self, delta_x: f64, delta_y: f64) -> BrowserResult<()> {
        self.record(DriverCall::Wheel { delta_x, delta_y });
        Ok(())
    }

    async fn type_text(&self, text: &str) -> BrowserResult<()> {
        self.record(DriverCall::TypeText(text.to_string()));
        Ok(())
    }

    async fn screenshot(&self) -> BrowserResult<Vec<u8>> {
        self.record(DriverCall::Screenshot);
        Ok(self.screenshot_png.clone())
    }

    async fn current_url(&self) -> BrowserResult<String> {
        Ok(self.url.lock().map(|u| u.clone()).unwrap_or_default())
    }

    async fn dimensions(&self) -> BrowserResult<ScreenDimensions> {
        Ok(ScreenDimensions {
            viewport: Some(Viewport { width: 1280, height: 720 }),
            window: WindowDimensions {
                width: 1280,
                height: 720,
                outer_width: 1280,
                outer_height: 800,
                screen_width: 1920,
                screen_height: 1080,
            },
        })
    }

    async fn inject_css(&self, _css: &str) -> BrowserResult<()> {
        self.record(DriverCall::InjectCss);
        Ok(())
    }

    async fn start_video_recording(&self, dir: &Path, _width: u32, _height: u32) -> BrowserResult<()> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join("recording.mjpeg");
        std::fs::write(&path, self.screenshot_png.as_slice())?;
        if let Ok(mut video) = self.video_path.lock() {
            *video = Some(path);
        }
        Ok(())
    }

    async fn stop_video_recording(&self) -> BrowserResult<Option<PathBuf>> {
        Ok(self.video_path.lock().map(|v| v.clone()).unwrap_or(None))
    }

    async fn close(&self) -> BrowserResult<()> {
        Ok(())
    }
}
