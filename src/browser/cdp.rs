//! Headless Chromium driver over the DevTools Protocol.
//!
//! Pointer and keyboard input go through raw `Input.dispatchMouseEvent` /
//! `Input.insertText` commands rather than element handles: the oracle emits
//! bare screen coordinates, so there is never a DOM node to resolve. The
//! session video is captured from CDP screencast frames appended to a
//! motion-JPEG file (Chromium exposes no muxed video over CDP).

use async_trait::async_trait;
use base64::Engine;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::input::{
    DispatchMouseEventParams, DispatchMouseEventType, InsertTextParams, MouseButton,
};
use chromiumoxide::cdp::browser_protocol::page::{
    CaptureScreenshotFormat, EventScreencastFrame, ScreencastFrameAckParams,
    StartScreencastFormat, StartScreencastParams, StopScreencastParams,
};
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::StreamExt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::config::BrowserSettings;

use super::driver::{
    BrowserDriver, BrowserError, BrowserResult, ScreenDimensions, Viewport, WindowDimensions,
};

/// Evaluated on the page to collect the window metrics the oracle needs.
const DIMENSIONS_JS: &str = "({\
    width: window.innerWidth,\
    height: window.innerHeight,\
    outerWidth: window.outerWidth,\
    outerHeight: window.outerHeight,\
    screenWidth: window.screen.width,\
    screenHeight: window.screen.height\
})";

struct VideoRecorder {
    path: PathBuf,
    wrote_frames: Arc<AtomicBool>,
    writer_task: JoinHandle<()>,
}

/// Production [`BrowserDriver`] backed by chromiumoxide.
pub struct CdpDriver {
    browser: Mutex<Option<Browser>>,
    page: Page,
    handler_task: JoinHandle<()>,
    /// Last pointer position, so `mouse_down` can press in place.
    pointer: Mutex<(f64, f64)>,
    recorder: Mutex<Option<VideoRecorder>>,
}

impl CdpDriver {
    /// Launch a Chromium instance and open a blank page.
    pub async fn launch(settings: &BrowserSettings) -> BrowserResult<Self> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .window_size(settings.video_width, settings.video_height);
        if !settings.headless {
            builder = builder.with_head();
        }
        let config = builder.build().map_err(BrowserError::Launch)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| BrowserError::Launch(e.to_string()))?;

        // Drive the CDP websocket until the browser goes away.
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    debug!("CDP handler loop ended");
                    break;
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| BrowserError::Launch(e.to_string()))?;

        Ok(Self {
            browser: Mutex::new(Some(browser)),
            page,
            handler_task,
            pointer: Mutex::new((0.0, 0.0)),
            recorder: Mutex::new(None),
        })
    }

    fn set_pointer(&self, x: f64, y: f64) {
        if let Ok(mut pos) = self.pointer.lock() {
            *pos = (x, y);
        }
    }

    fn pointer(&self) -> (f64, f64) {
        self.pointer.lock().map(|p| *p).unwrap_or((0.0, 0.0))
    }

    async fn dispatch_mouse(
        &self,
        kind: DispatchMouseEventType,
        x: f64,
        y: f64,
        button: Option<MouseButton>,
        click_count: Option<i64>,
    ) -> BrowserResult<()> {
        let mut builder = DispatchMouseEventParams::builder().r#type(kind).x(x).y(y);
        if let Some(button) = button {
            builder = builder.button(button);
        }
        if let Some(count) = click_count {
            builder = builder.click_count(count);
        }
        let params = builder.build().map_err(BrowserError::Command)?;
        self.page
            .execute(params)
            .await
            .map_err(|e| BrowserError::Command(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl BrowserDriver for CdpDriver {
    async fn navigate(&self, url: &str) -> BrowserResult<()> {
        self.page
            .goto(url)
            .await
            .map_err(|e| BrowserError::Navigation(format!("{}: {}", url, e)))?;
        Ok(())
    }

    async fn mouse_move(&self, x: f64, y: f64) -> BrowserResult<()> {
        self.dispatch_mouse(DispatchMouseEventType::MouseMoved, x, y, None, None)
            .await?;
        self.set_pointer(x, y);
        Ok(())
    }

    async fn mouse_click(&self, x: f64, y: f64) -> BrowserResult<()> {
        self.dispatch_mouse(
            DispatchMouseEventType::MousePressed,
            x,
            y,
            Some(MouseButton::Left),
            Some(1),
        )
        .await?;
        self.dispatch_mouse(
            DispatchMouseEventType::MouseReleased,
            x,
            y,
            Some(MouseButton::Left),
            Some(1),
        )
        .await?;
        self.set_pointer(x, y);
        Ok(())
    }

    async fn mouse_down(&self) -> BrowserResult<()> {
        let (x, y) = self.pointer();
        self.dispatch_mouse(
            DispatchMouseEventType::MousePressed,
            x,
            y,
            Some(MouseButton::Left),
            Some(1),
        )
        .await
    }

    async fn mouse_up(&self) -> BrowserResult<()> {
        let (x, y) = self.pointer();
        self.dispatch_mouse(
            DispatchMouseEventType::MouseReleased,
            x,
            y,
            Some(MouseButton::Left),
            Some(1),
        )
        .await
    }

    async fn wheel(&self, delta_x: f64, delta_y: f64) -> BrowserResult<()> {
        let (x, y) = self.pointer();
        let params = DispatchMouseEventParams::builder()
            .r#type(DispatchMouseEventType::MouseWheel)
            .x(x)
            .y(y)
            .delta_x(delta_x)
            .delta_y(delta_y)
            .build()
            .map_err(BrowserError::Command)?;
        self.page
            .execute(params)
            .await
            .map_err(|e| BrowserError::Command(e.to_string()))?;
        Ok(())
    }

    async fn type_text(&self, text: &str) -> BrowserResult<()> {
        self.page
            .execute(InsertTextParams::new(text))
            .await
            .map_err(|e| BrowserError::Command(e.to_string()))?;
        Ok(())
    }

    async fn screenshot(&self) -> BrowserResult<Vec<u8>> {
        self.page
            .screenshot(
                ScreenshotParams::builder()
                    .format(CaptureScreenshotFormat::Png)
                    .full_page(false)
                    .build(),
            )
            .await
            .map_err(|e| BrowserError::Command(e.to_string()))
    }

    async fn current_url(&self) -> BrowserResult<String> {
        let url = self
            .page
            .url()
            .await
            .map_err(|e| BrowserError::Command(e.to_string()))?;
        Ok(url.unwrap_or_else(|| "about:blank".to_string()))
    }

    async fn dimensions(&self) -> BrowserResult<ScreenDimensions> {
        let window: WindowDimensions = self
            .page
            .evaluate(DIMENSIONS_JS)
            .await
            .map_err(|e| BrowserError::Command(e.to_string()))?
            .into_value()
            .map_err(|e| BrowserError::Command(e.to_string()))?;
        Ok(ScreenDimensions {
            viewport: Some(Viewport {
                width: window.width,
                height: window.height,
            }),
            window,
        })
    }

    async fn inject_css(&self, css: &str) -> BrowserResult<()> {
        let js = format!(
            "(() => {{ const s = document.createElement('style'); s.textContent = {}; document.head.appendChild(s); }})()",
            serde_json::to_string(css).unwrap_or_default()
        );
        self.page
            .evaluate(js)
            .await
            .map_err(|e| BrowserError::Command(e.to_string()))?;
        Ok(())
    }

    async fn start_video_recording(&self, dir: &Path, width: u32, height: u32) -> BrowserResult<()> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join("recording.mjpeg");
        let mut file = std::fs::File::create(&path)?;

        let mut frames = self
            .page
            .event_listener::<EventScreencastFrame>()
            .await
            .map_err(|e| BrowserError::Command(e.to_string()))?;

        let params = StartScreencastParams::builder()
            .format(StartScreencastFormat::Jpeg)
            .every_nth_frame(2)
            .max_width(width as i64)
            .max_height(height as i64)
            .build();
        self.page
            .execute(params)
            .await
            .map_err(|e| BrowserError::Command(e.to_string()))?;

        let wrote_frames = Arc::new(AtomicBool::new(false));
        let wrote = Arc::clone(&wrote_frames);
        let page = self.page.clone();
        let writer_task = tokio::spawn(async move {
            while let Some(frame) = frames.next().await {
                match base64::engine::general_purpose::STANDARD.decode(&frame.data) {
                    Ok(bytes) => {
                        if file.write_all(&bytes).is_ok() {
                            wrote.store(true, Ordering::Relaxed);
                        }
                    }
                    Err(e) => warn!("Dropping undecodable screencast frame: {}", e),
                }
                let ack = ScreencastFrameAckParams::new(frame.session_id);
                if page.execute(ack).await.is_err() {
                    break;
                }
            }
        });

        let mut recorder = self
            .recorder
            .lock()
            .map_err(|_| BrowserError::Command("video recorder lock poisoned".to_string()))?;
        *recorder = Some(VideoRecorder {
            path,
            wrote_frames,
            writer_task,
        });
        Ok(())
    }

    async fn stop_video_recording(&self) -> BrowserResult<Option<PathBuf>> {
        let recorder = {
            let mut guard = self
                .recorder
                .lock()
                .map_err(|_| BrowserError::Command("video recorder lock poisoned".to_string()))?;
            guard.take()
        };
        let Some(recorder) = recorder else {
            return Ok(None);
        };

        // Best effort: the page may already be gone when the run failed.
        if let Err(e) = self.page.execute(StopScreencastParams::default()).await {
            debug!("StopScreencast failed: {}", e);
        }
        recorder.writer_task.abort();

        if recorder.wrote_frames.load(Ordering::Relaxed) {
            Ok(Some(recorder.path))
        } else {
            Ok(None)
        }
    }

    async fn close(&self) -> BrowserResult<()> {
        let browser = {
            let mut guard = self
                .browser
                .lock()
                .map_err(|_| BrowserError::Command("browser lock poisoned".to_string()))?;
            guard.take()
        };
        if let Some(mut browser) = browser {
            browser
                .close()
                .await
                .map_err(|e| BrowserError::Command(e.to_string()))?;
            let _ = browser.wait().await;
        }
        self.handler_task.abort();
        Ok(())
    }
}
