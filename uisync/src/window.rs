use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::config::EngineConfig;
use crate::errors::AutomationError;
use crate::platforms::WindowHost;
use crate::types::{KeyStroke, WindowHandle};

/// Tracks which window of the target application holds focus.
///
/// Configuration sub-flows open transient secondary windows; this keeps a
/// reference to the one currently focused and can always fall back to the
/// main window.
pub struct WindowStateManager {
    host: Arc<dyn WindowHost>,
    main: WindowHandle,
    current: Mutex<Option<WindowHandle>>,
    focus_delay: Duration,
    cleanup_delay: Duration,
}

impl WindowStateManager {
    pub fn new(host: Arc<dyn WindowHost>, main: WindowHandle, config: &EngineConfig) -> Self {
        debug!("WindowStateManager initialized with main window '{}'", main.title);
        Self {
            host,
            main,
            current: Mutex::new(None),
            focus_delay: config.timing.focus_delay(),
            cleanup_delay: config.timing.post_cleanup_delay(),
        }
    }

    /// Find the main window by title and build a manager around it.
    pub async fn attach(
        host: Arc<dyn WindowHost>,
        main_title: &str,
        config: &EngineConfig,
    ) -> Result<Self, AutomationError> {
        let main = host.find_window(main_title).await?.ok_or_else(|| {
            AutomationError::ElementNotFound(format!("main window '{main_title}' not found"))
        })?;
        if !host.is_window_valid(&main).await? {
            return Err(AutomationError::PlatformError(format!(
                "main window '{main_title}' is not accessible"
            )));
        }
        Ok(Self::new(host, main, config))
    }

    pub fn main_window(&self) -> &WindowHandle {
        &self.main
    }

    /// The window most recently focused through this manager.
    pub fn current(&self) -> Option<WindowHandle> {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_current(&self, window: Option<WindowHandle>) {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = window;
    }

    /// The focused window if it is a secondary one.
    pub fn focused_secondary(&self) -> Option<WindowHandle> {
        self.current().filter(|w| *w != self.main)
    }

    /// Focus the window titled `title` and confirm it is still valid after
    /// the focus settles. A focus call that merely did not fail is not
    /// treated as success.
    pub async fn focus_and_verify(&self, title: &str) -> bool {
        match self.try_focus_and_verify(title).await {
            Ok(focused) => focused,
            Err(e) => {
                error!("Error focusing window '{}': {}", title, e);
                false
            }
        }
    }

    async fn try_focus_and_verify(&self, title: &str) -> Result<bool, AutomationError> {
        let Some(window) = self.host.find_window(title).await? else {
            warn!("Window '{}' does not exist", title);
            return Ok(false);
        };

        self.host.focus_window(&window).await?;
        tokio::time::sleep(self.focus_delay).await;

        if self.host.is_window_valid(&window).await? {
            debug!("Focused window '{}'", title);
            self.set_current(Some(window));
            Ok(true)
        } else {
            warn!("Window '{}' is no longer valid after focus", title);
            Ok(false)
        }
    }

    pub async fn return_to_main(&self) -> bool {
        match self.host.focus_window(&self.main).await {
            Ok(()) => {
                tokio::time::sleep(self.focus_delay).await;
                self.set_current(Some(self.main.clone()));
                true
            }
            Err(e) => {
                error!("Failed to return to main window: {}", e);
                false
            }
        }
    }

    /// Send Escape to the focused secondary window, if any. Returns whether
    /// a key was sent.
    pub async fn escape_focused_secondary(&self) -> bool {
        let Some(window) = self.focused_secondary() else {
            return false;
        };
        match self.host.send_key(&window, KeyStroke::ESCAPE).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Could not send Escape to '{}': {}", window.title, e);
                false
            }
        }
    }

    /// Cancel out of any focused secondary window, then return to the main
    /// window.
    pub async fn cleanup(&self) -> bool {
        if self.escape_focused_secondary().await {
            tokio::time::sleep(self.cleanup_delay).await;
        }
        let restored = self.return_to_main().await;
        if restored {
            info!("Window state cleaned up, main window focused");
        }
        restored
    }
}
