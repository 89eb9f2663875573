//! Detection of and recovery from out-of-band blocking dialogs

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::config::{EngineConfig, PrinterConfig};
use crate::errors::AutomationError;
use crate::platforms::VisionPort;
use crate::regions::SearchRegions;
use crate::state::{AutomationStage, ConfigStage};
use crate::types::{KeyStroke, PatternId, Rect};
use crate::window::WindowStateManager;

/// What to close when leaving a stage because of a dialog
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CleanupAction {
    /// Nothing is open beyond the main window
    None,
    /// Escape out of a menu or dialog owned by the main window
    EscapeMain,
    /// Escape out of the focused secondary window
    EscapeFocused,
}

/// Where focus must land to continue from a stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResumeAction {
    MainWindow,
    /// Re-acquire the secondary window with this title
    Window(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryPlan {
    pub cleanup: CleanupAction,
    pub resume: ResumeAction,
}

impl RecoveryPlan {
    pub fn new(cleanup: CleanupAction, resume: ResumeAction) -> Self {
        Self { cleanup, resume }
    }
}

/// Per-context mapping from stage to its recovery plan.
///
/// Stages missing from the table fall back to "no cleanup, resume on the
/// main window".
#[derive(Debug, Clone)]
pub struct RecoveryTable<S> {
    plans: HashMap<S, RecoveryPlan>,
}

impl<S> Default for RecoveryTable<S> {
    fn default() -> Self {
        Self {
            plans: HashMap::new(),
        }
    }
}

impl<S: Eq + Hash> RecoveryTable<S> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, stage: S, cleanup: CleanupAction, resume: ResumeAction) -> Self {
        self.plans.insert(stage, RecoveryPlan::new(cleanup, resume));
        self
    }

    pub fn plan(&self, stage: &S) -> RecoveryPlan {
        self.plans
            .get(stage)
            .cloned()
            .unwrap_or_else(|| RecoveryPlan::new(CleanupAction::None, ResumeAction::MainWindow))
    }
}

impl RecoveryTable<AutomationStage> {
    /// Recovery for the per-document save workflow. Everything happens on the
    /// main window, so every stage resumes there.
    pub fn document_workflow() -> Self {
        use AutomationStage::*;
        Self::new()
            .with(Selecting, CleanupAction::None, ResumeAction::MainWindow)
            .with(ContextMenuOpen, CleanupAction::EscapeMain, ResumeAction::MainWindow)
            .with(PrintDialogOpen, CleanupAction::EscapeMain, ResumeAction::MainWindow)
            .with(SaveDialogOpen, CleanupAction::EscapeMain, ResumeAction::MainWindow)
            .with(Saving, CleanupAction::EscapeMain, ResumeAction::MainWindow)
            .with(NavigationPending, CleanupAction::None, ResumeAction::MainWindow)
    }
}

impl RecoveryTable<ConfigStage> {
    /// Recovery for the printer configuration sub-flow, which moves through
    /// two secondary windows.
    pub fn printer_configuration(printer: &PrinterConfig) -> Self {
        use ConfigStage::*;
        Self::new()
            .with(DocumentSelection, CleanupAction::EscapeMain, ResumeAction::MainWindow)
            .with(ContextMenu, CleanupAction::EscapeMain, ResumeAction::MainWindow)
            .with(
                DocumentUpdate,
                CleanupAction::EscapeFocused,
                ResumeAction::Window(printer.document_update_title.clone()),
            )
            .with(
                PrinterSettings,
                CleanupAction::EscapeFocused,
                ResumeAction::Window(printer.printer_settings_title.clone()),
            )
    }
}

/// Result of [`InterruptWatchdog::handle_if_present`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptOutcome {
    /// No dialog was showing
    Clear,
    /// A dialog was dismissed and the workflow resumed at the requested stage
    Recovered,
    /// The dialog would not go away, or focus could not be re-established
    Failed,
}

/// Watches for the blocking-dialog pattern and drives recovery through a
/// [`RecoveryTable`].
pub struct InterruptWatchdog<S> {
    port: Arc<dyn VisionPort>,
    windows: Arc<WindowStateManager>,
    pattern: PatternId,
    similarity: f64,
    search_region: Rect,
    expected_box: Rect,
    settle_delay: Duration,
    cleanup_delay: Duration,
    max_dismiss_attempts: u32,
    table: RecoveryTable<S>,
    stage: Mutex<S>,
}

impl<S> InterruptWatchdog<S>
where
    S: Copy + Eq + Hash + fmt::Display + Send + Sync,
{
    pub fn new(
        port: Arc<dyn VisionPort>,
        windows: Arc<WindowStateManager>,
        regions: &SearchRegions,
        config: &EngineConfig,
        table: RecoveryTable<S>,
        initial_stage: S,
    ) -> Self {
        Self {
            port,
            windows,
            pattern: config.patterns.popup.clone(),
            similarity: config.popup.similarity,
            search_region: regions.window(),
            expected_box: regions.popup_box(),
            settle_delay: config.timing.popup_dismiss_delay(),
            cleanup_delay: config.timing.menu_cleanup_delay(),
            max_dismiss_attempts: config.popup.max_dismiss_attempts,
            table,
            stage: Mutex::new(initial_stage),
        }
    }

    pub fn stage(&self) -> S {
        *self.stage.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn set_stage(&self, stage: S) {
        let mut current = self.stage.lock().unwrap_or_else(PoisonError::into_inner);
        if *current != stage {
            debug!("Stage {} -> {}", *current, stage);
            *current = stage;
        }
    }

    pub fn max_dismiss_attempts(&self) -> u32 {
        self.max_dismiss_attempts
    }

    /// Whether a dialog is showing in `region`. The match must also sit
    /// inside the expected dialog box; the same glyph elsewhere on screen
    /// (an icon in a toolbar, say) is ignored.
    pub async fn is_present(&self, region: Rect) -> bool {
        match self.port.locate(&self.pattern, region, self.similarity).await {
            Ok(Some(found)) => {
                let inside = self.expected_box.contains(found.position());
                if !inside {
                    debug!(
                        x = found.x,
                        y = found.y,
                        "Popup pattern matched outside {}, ignoring",
                        self.expected_box
                    );
                }
                inside
            }
            Ok(None) => false,
            Err(e) => {
                warn!("Popup check failed: {}", e);
                false
            }
        }
    }

    /// [`is_present`](Self::is_present) over the whole main window.
    pub async fn check(&self) -> bool {
        self.is_present(self.search_region).await
    }

    /// Send Enter (`accept`) or Escape, wait for the dialog to settle, and
    /// report whether it is gone.
    pub async fn dismiss(&self, accept: bool) -> Result<bool, AutomationError> {
        let key = if accept {
            KeyStroke::ENTER
        } else {
            KeyStroke::ESCAPE
        };
        self.port.inject_key(key).await?;
        tokio::time::sleep(self.settle_delay).await;

        let gone = !self.check().await;
        if !gone {
            debug!("Popup still present after dismissal");
        }
        Ok(gone)
    }

    /// Close whatever the current stage had open, return to the main window,
    /// then re-establish the focus `target` needs.
    #[instrument(level = "debug", skip(self), fields(target = %target))]
    pub async fn resume_to(&self, target: S) -> Result<bool, AutomationError> {
        let current = self.stage();
        match self.table.plan(&current).cleanup {
            CleanupAction::None => {}
            CleanupAction::EscapeMain => {
                self.port.inject_key(KeyStroke::ESCAPE).await?;
                tokio::time::sleep(self.cleanup_delay).await;
            }
            CleanupAction::EscapeFocused => {
                if self.windows.escape_focused_secondary().await {
                    tokio::time::sleep(self.cleanup_delay).await;
                }
            }
        }

        if !self.windows.return_to_main().await {
            warn!("Could not return to the main window while leaving {}", current);
            return Ok(false);
        }

        self.set_stage(target);
        let resumed = match self.table.plan(&target).resume {
            ResumeAction::MainWindow => true,
            ResumeAction::Window(title) => self.windows.focus_and_verify(&title).await,
        };
        if !resumed {
            warn!("Could not resume at {}", target);
        }
        Ok(resumed)
    }

    /// If a dialog is showing, dismiss it (up to the configured number of
    /// attempts) and resume at `resume`.
    pub async fn handle_if_present(
        &self,
        resume: S,
        accept: bool,
    ) -> Result<InterruptOutcome, AutomationError> {
        if !self.check().await {
            return Ok(InterruptOutcome::Clear);
        }

        info!("Blocking dialog detected during {}", self.stage());
        let mut dismissed = false;
        for attempt in 1..=self.max_dismiss_attempts {
            if self.dismiss(accept).await? {
                dismissed = true;
                break;
            }
            debug!("Dismiss attempt {}/{} failed", attempt, self.max_dismiss_attempts);
        }
        if !dismissed {
            warn!(
                "Dialog still present after {} dismiss attempts",
                self.max_dismiss_attempts
            );
            return Ok(InterruptOutcome::Failed);
        }

        if self.resume_to(resume).await? {
            info!("Recovered from dialog, resuming at {}", resume);
            Ok(InterruptOutcome::Recovered)
        } else {
            Ok(InterruptOutcome::Failed)
        }
    }
}
