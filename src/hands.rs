//! The platform automation capability set, and its headless Chrome
//! implementation.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use headless_chrome::browser::tab::point::Point;
use headless_chrome::protocol::cdp::Input::{DispatchMouseEvent, DispatchMouseEventTypeOption};
use headless_chrome::protocol::cdp::Page::{
    CaptureScreenshot, CaptureScreenshotFormatOption, Viewport,
};
use headless_chrome::{Browser, LaunchOptions, Tab};
use tracing::{debug, info};

use crate::dom;
use crate::error::BackendError;

const VISIBILITY_POLL: Duration = Duration::from_millis(100);

/// What an executor needs from a web automation backend.
///
/// `wait_visible` is the only method with a soft failure mode: running out of
/// time is reported as [`BackendError::Timeout`] so callers can tell it apart
/// from a broken connection.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<(), BackendError>;

    /// Full-page PNG.
    async fn screenshot(&self) -> Result<Vec<u8>, BackendError>;

    /// Serialized document.
    async fn content(&self) -> Result<String, BackendError>;

    async fn click_selector(&self, selector: &str) -> Result<(), BackendError>;

    /// Click at a point in page coordinates, the pixel space of
    /// [`Backend::screenshot`].
    async fn click_point(&self, x: i64, y: i64) -> Result<(), BackendError>;

    async fn type_text(&self, text: &str, per_key_delay: Duration) -> Result<(), BackendError>;

    /// One wheel event over the middle of the viewport.
    async fn scroll(&self, dx: f64, dy: f64) -> Result<(), BackendError>;

    async fn wait_visible(&self, selector: &str, timeout: Duration) -> Result<(), BackendError>;
}

/// A Chrome instance and the single tab this session drives.
pub struct BrowserSession {
    _browser: Browser,
    tab: Arc<Tab>,
}

impl BrowserSession {
    /// Blocking; call from `spawn_blocking` or use [`BrowserSession::start`].
    pub fn launch(headless: bool) -> Result<Self, BackendError> {
        let options = LaunchOptions {
            headless,
            args: vec![
                std::ffi::OsStr::new("--no-first-run"),
                std::ffi::OsStr::new("--no-default-browser-check"),
                std::ffi::OsStr::new("--disable-infobars"),
            ],
            idle_browser_timeout: Duration::from_secs(300),
            ..Default::default()
        };

        info!(target: "hands", headless, "starting Chrome");
        let browser = Browser::new(options).map_err(BackendError::cdp)?;
        let tab = browser.new_tab().map_err(BackendError::cdp)?;
        tab.navigate_to("about:blank").map_err(BackendError::cdp)?;
        info!(target: "hands", "Chrome ready");

        Ok(Self {
            _browser: browser,
            tab,
        })
    }

    pub async fn start(headless: bool) -> Result<Self, BackendError> {
        tokio::task::spawn_blocking(move || Self::launch(headless)).await?
    }

    /// Run a blocking CDP call against the tab without stalling the runtime.
    async fn with_tab<T, F>(&self, f: F) -> Result<T, BackendError>
    where
        T: Send + 'static,
        F: FnOnce(&Tab) -> Result<T, BackendError> + Send + 'static,
    {
        let tab = self.tab.clone();
        tokio::task::spawn_blocking(move || f(&tab)).await?
    }
}

#[async_trait]
impl Backend for BrowserSession {
    async fn navigate(&self, url: &str) -> Result<(), BackendError> {
        let url = url.to_string();
        self.with_tab(move |tab| {
            tab.navigate_to(&url)
                .and_then(|t| t.wait_until_navigated())
                .map_err(BackendError::cdp)?;
            Ok(())
        })
        .await
    }

    async fn screenshot(&self) -> Result<Vec<u8>, BackendError> {
        self.with_tab(|tab| {
            let (width, height) = dom::page_size(tab).map_err(BackendError::cdp)?;
            let clip = Viewport {
                x: 0.0,
                y: 0.0,
                width,
                height,
                scale: 1.0,
            };
            // `Tab::capture_screenshot` never sets `captureBeyondViewport`,
            // which leaves everything below the fold blank.
            let shot = tab
                .call_method(CaptureScreenshot {
                    format: Some(CaptureScreenshotFormatOption::Png),
                    quality: None,
                    clip: Some(clip),
                    from_surface: Some(true),
                    capture_beyond_viewport: Some(true),
                    optimize_for_speed: None,
                })
                .map_err(BackendError::cdp)?;
            STANDARD.decode(shot.data).map_err(BackendError::cdp)
        })
        .await
    }

    async fn content(&self) -> Result<String, BackendError> {
        self.with_tab(|tab| tab.get_content().map_err(BackendError::cdp))
            .await
    }

    async fn click_selector(&self, selector: &str) -> Result<(), BackendError> {
        let selector = selector.to_string();
        self.with_tab(move |tab| {
            let element = dom::find(tab, &selector).map_err(BackendError::cdp)?;
            element.click().map_err(BackendError::cdp)?;
            Ok(())
        })
        .await
    }

    async fn click_point(&self, x: i64, y: i64) -> Result<(), BackendError> {
        self.with_tab(move |tab| {
            let (x, y) = (x as f64, y as f64);
            let view = dom::reveal_point(tab, x, y).map_err(BackendError::cdp)?;
            let (cx, cy) = view.to_client(x, y);
            debug!(target: "hands", x, y, cx, cy, "clicking page point");
            tab.click_point(Point { x: cx, y: cy })
                .map_err(BackendError::cdp)?;
            Ok(())
        })
        .await
    }

    async fn type_text(&self, text: &str, per_key_delay: Duration) -> Result<(), BackendError> {
        let text = text.to_string();
        self.with_tab(move |tab| {
            let mut buf = [0u8; 4];
            for ch in text.chars() {
                tab.type_str(ch.encode_utf8(&mut buf))
                    .map_err(BackendError::cdp)?;
                std::thread::sleep(per_key_delay);
            }
            Ok(())
        })
        .await
    }

    async fn scroll(&self, dx: f64, dy: f64) -> Result<(), BackendError> {
        self.with_tab(move |tab| {
            let (x, y) = dom::viewport(tab).map_err(BackendError::cdp)?.center();
            tab.call_method(DispatchMouseEvent {
                Type: DispatchMouseEventTypeOption::MouseWheel,
                x,
                y,
                modifiers: None,
                timestamp: None,
                button: None,
                buttons: None,
                click_count: None,
                force: None,
                tangential_pressure: None,
                tilt_x: None,
                tilt_y: None,
                twist: None,
                delta_x: Some(dx),
                delta_y: Some(dy),
                pointer_Type: None,
            })
            .map_err(BackendError::cdp)?;
            Ok(())
        })
        .await
    }

    async fn wait_visible(&self, selector: &str, timeout: Duration) -> Result<(), BackendError> {
        let selector = selector.to_string();
        self.with_tab(move |tab| {
            let deadline = Instant::now() + timeout;
            loop {
                if let Ok(element) = dom::find(tab, &selector) {
                    if dom::is_visible(&element) {
                        return Ok(());
                    }
                }
                if Instant::now() >= deadline {
                    debug!(target: "hands", %selector, "visibility wait timed out");
                    return Err(BackendError::Timeout { selector, timeout });
                }
                std::thread::sleep(VISIBILITY_POLL);
            }
        })
        .await
    }
}

#[cfg(test)]
pub(crate) mod fake {
    //! In-memory backend that records every call.

    use std::collections::HashSet;
    use std::sync::Mutex;

    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    pub enum Call {
        Navigate(String),
        Screenshot,
        Content,
        ClickSelector(String),
        ClickPoint(i64, i64),
        Type(String),
        Scroll(f64, f64),
        WaitVisible(String),
    }

    #[derive(Default)]
    pub struct FakeBackend {
        calls: Mutex<Vec<Call>>,
        visible: Mutex<HashSet<String>>,
        fail_clicks: bool,
        fail_observation: bool,
    }

    impl FakeBackend {
        pub fn with_visible(selectors: &[&str]) -> Self {
            let backend = Self::default();
            backend.show(selectors);
            backend
        }

        pub fn failing_clicks(mut self) -> Self {
            self.fail_clicks = true;
            self
        }

        pub fn failing_observation(mut self) -> Self {
            self.fail_observation = true;
            self
        }

        pub fn show(&self, selectors: &[&str]) {
            let mut visible = self.visible.lock().unwrap();
            visible.extend(selectors.iter().map(|s| s.to_string()));
        }

        pub fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: Call) {
            self.calls.lock().unwrap().push(call);
        }
    }

    #[async_trait]
    impl Backend for FakeBackend {
        async fn navigate(&self, url: &str) -> Result<(), BackendError> {
            self.record(Call::Navigate(url.to_string()));
            Ok(())
        }

        async fn screenshot(&self) -> Result<Vec<u8>, BackendError> {
            self.record(Call::Screenshot);
            if self.fail_observation {
                return Err(BackendError::Cdp("tab crashed".into()));
            }
            Ok(vec![0x89, b'P', b'N', b'G'])
        }

        async fn content(&self) -> Result<String, BackendError> {
            self.record(Call::Content);
            if self.fail_observation {
                return Err(BackendError::Cdp("tab crashed".into()));
            }
            Ok("<html><body><button id=\"go\">Go</button></body></html>".into())
        }

        async fn click_selector(&self, selector: &str) -> Result<(), BackendError> {
            self.record(Call::ClickSelector(selector.to_string()));
            if self.fail_clicks {
                return Err(BackendError::Cdp("element detached".into()));
            }
            Ok(())
        }

        async fn click_point(&self, x: i64, y: i64) -> Result<(), BackendError> {
            self.record(Call::ClickPoint(x, y));
            Ok(())
        }

        async fn type_text(&self, text: &str, _per_key_delay: Duration) -> Result<(), BackendError> {
            self.record(Call::Type(text.to_string()));
            Ok(())
        }

        async fn scroll(&self, dx: f64, dy: f64) -> Result<(), BackendError> {
            self.record(Call::Scroll(dx, dy));
            Ok(())
        }

        async fn wait_visible(&self, selector: &str, timeout: Duration) -> Result<(), BackendError> {
            self.record(Call::WaitVisible(selector.to_string()));
            if self.visible.lock().unwrap().contains(selector) {
                Ok(())
            } else {
                Err(BackendError::Timeout {
                    selector: selector.to_string(),
                    timeout,
                })
            }
        }
    }
}
