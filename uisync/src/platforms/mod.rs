use crate::errors::AutomationError;
use crate::types::{KeyStroke, Match, MouseButton, PatternId, PixelGrid, Point, Rect, WindowHandle};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

#[cfg(feature = "desktop")]
pub mod desktop;

/// Poll interval used by the default `wait_for` / `wait_vanish` implementations
const DEFAULT_WAIT_POLL: Duration = Duration::from_millis(50);

/// Template matching against the live screen.
///
/// Implementations answer each call from a fresh capture; the engine never
/// caches a `Match` across polls.
#[async_trait::async_trait]
pub trait ElementLocator: Send + Sync {
    /// Find the best match for `pattern` inside `region` scoring at least
    /// `min_similarity`, or `None` if nothing qualifies.
    async fn locate(
        &self,
        pattern: &PatternId,
        region: Rect,
        min_similarity: f64,
    ) -> Result<Option<Match>, AutomationError>;

    /// Wait for `pattern` to appear, polling `locate` until `timeout`.
    async fn wait_for(
        &self,
        pattern: &PatternId,
        region: Rect,
        min_similarity: f64,
        timeout: Duration,
    ) -> Result<Option<Match>, AutomationError> {
        let start = Instant::now();
        loop {
            if let Some(found) = self.locate(pattern, region, min_similarity).await? {
                return Ok(Some(found));
            }
            if start.elapsed() >= timeout {
                return Ok(None);
            }
            tokio::time::sleep(DEFAULT_WAIT_POLL).await;
        }
    }

    /// Wait for `pattern` to disappear. Returns `true` once it is gone.
    async fn wait_vanish(
        &self,
        pattern: &PatternId,
        region: Rect,
        min_similarity: f64,
        timeout: Duration,
    ) -> Result<bool, AutomationError> {
        let start = Instant::now();
        loop {
            if self.locate(pattern, region, min_similarity).await?.is_none() {
                return Ok(true);
            }
            if start.elapsed() >= timeout {
                return Ok(false);
            }
            tokio::time::sleep(DEFAULT_WAIT_POLL).await;
        }
    }
}

/// Raw pixel capture
#[async_trait::async_trait]
pub trait PixelSampler: Send + Sync {
    async fn sample_colors(&self, rect: Rect) -> Result<PixelGrid, AutomationError>;
}

/// Synthesized keyboard and mouse input
#[async_trait::async_trait]
pub trait InputInjector: Send + Sync {
    async fn inject_key(&self, key: KeyStroke) -> Result<(), AutomationError>;

    async fn inject_click(&self, point: Point, button: MouseButton) -> Result<(), AutomationError>;

    async fn inject_text(&self, text: &str) -> Result<(), AutomationError>;
}

/// The combined screen capability the engine drives.
pub trait VisionPort: ElementLocator + PixelSampler + InputInjector {}

impl<T> VisionPort for T where T: ElementLocator + PixelSampler + InputInjector + ?Sized {}

#[async_trait::async_trait]
pub trait ClipboardPort: Send + Sync {
    async fn set_content(&self, text: &str) -> Result<(), AutomationError>;
}

/// Top-level window management for the target application and the
/// secondary windows it opens.
#[async_trait::async_trait]
pub trait WindowHost: Send + Sync {
    async fn find_window(&self, title: &str) -> Result<Option<WindowHandle>, AutomationError>;

    async fn focus_window(&self, window: &WindowHandle) -> Result<(), AutomationError>;

    /// Whether the window still exists and can take focus.
    async fn is_window_valid(&self, window: &WindowHandle) -> Result<bool, AutomationError>;

    async fn send_key(&self, window: &WindowHandle, key: KeyStroke) -> Result<(), AutomationError>;

    async fn window_bounds(&self, window: &WindowHandle) -> Result<Rect, AutomationError>;
}

/// The set of external capabilities a session is built from
#[derive(Clone)]
pub struct Ports {
    pub vision: Arc<dyn VisionPort>,
    pub clipboard: Arc<dyn ClipboardPort>,
    pub windows: Arc<dyn WindowHost>,
}

impl Ports {
    pub fn new(
        vision: Arc<dyn VisionPort>,
        clipboard: Arc<dyn ClipboardPort>,
        windows: Arc<dyn WindowHost>,
    ) -> Self {
        Self {
            vision,
            clipboard,
            windows,
        }
    }
}
