//! Pointing the target application's scanned-document printing at the PDF
//! printer. Runs once, before a batch, across two secondary windows.

use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

use crate::cancellation::CancellationSignal;
use crate::config::EngineConfig;
use crate::errors::AutomationError;
use crate::interrupt::{InterruptOutcome, InterruptWatchdog, RecoveryTable};
use crate::platforms::Ports;
use crate::regions::SearchRegions;
use crate::retry::{RetryOrchestrator, RetryPolicy};
use crate::stability::StabilityWaiter;
use crate::state::ConfigStage;
use crate::types::{KeyStroke, Match, MouseButton, PatternId, Rect, WindowHandle};
use crate::window::WindowStateManager;

pub struct PrinterConfigurator {
    ports: Ports,
    windows: Arc<WindowStateManager>,
    watchdog: InterruptWatchdog<ConfigStage>,
    waiter: StabilityWaiter,
    retry: RetryOrchestrator,
    regions: SearchRegions,
    config: EngineConfig,
}

impl PrinterConfigurator {
    pub fn new(
        ports: Ports,
        windows: Arc<WindowStateManager>,
        regions: SearchRegions,
        config: EngineConfig,
        cancel: CancellationSignal,
    ) -> Self {
        let watchdog = InterruptWatchdog::new(
            ports.vision.clone(),
            windows.clone(),
            &regions,
            &config,
            RecoveryTable::printer_configuration(&config.printer),
            ConfigStage::DocumentSelection,
        );
        let waiter = StabilityWaiter::new(ports.vision.clone(), &config, cancel.clone());
        let retry = RetryOrchestrator::new(
            RetryPolicy::new(config.retry.window_attempts, config.retry.delay()),
            cancel,
        );
        Self {
            ports,
            windows,
            watchdog,
            waiter,
            retry,
            regions,
            config,
        }
    }

    pub fn stage(&self) -> ConfigStage {
        self.watchdog.stage()
    }

    /// Select the PDF printer. Any failure leaves focus on the main window
    /// and is reported as `false`.
    #[instrument(skip(self))]
    pub async fn configure_pdf_printer(&self) -> bool {
        info!("Starting PDF printer configuration");
        match self.run().await {
            Ok(()) => {
                info!("Configured {}", self.config.printer.printer_name);
                true
            }
            Err(e) => {
                error!("Printer configuration failed at {}: {}", self.stage(), e);
                self.windows.cleanup().await;
                false
            }
        }
    }

    async fn run(&self) -> Result<(), AutomationError> {
        let printer = &self.config.printer;
        let timing = &self.config.timing;
        let vision = &self.ports.vision;

        self.enter(ConfigStage::DocumentSelection).await?;
        let document = self
            .waiter
            .require_stable(
                &self.config.patterns.selection_border,
                self.regions.selection(),
                timing.dialog_timeout(),
            )
            .await?;

        self.enter(ConfigStage::ContextMenu).await?;
        self.choose_no_ocr_entry(&document).await?;

        self.enter(ConfigStage::DocumentUpdate).await?;
        let update_window = self.acquire_window(&printer.document_update_title).await?;
        let update_bounds = self.ports.windows.window_bounds(&update_window).await?;
        let button = self
            .find_in(
                &self.config.patterns.printer_settings_button,
                update_bounds.fraction(0.0, 0.0, 1.0 / 3.0, 0.25),
                self.config.patterns.similarity,
            )
            .await?;
        vision.inject_click(button.center(), MouseButton::Left).await?;
        tokio::time::sleep(timing.focus_delay()).await;

        self.enter(ConfigStage::PrinterSettings).await?;
        let settings_window = self.acquire_window(&printer.printer_settings_title).await?;
        let settings_bounds = self.ports.windows.window_bounds(&settings_window).await?;
        tokio::time::sleep(timing.focus_delay()).await;
        self.select_printer(settings_bounds).await?;

        // OK closes the settings window; the update window is still open behind it.
        if self.windows.focus_and_verify(&printer.document_update_title).await {
            debug!("Closing {}", printer.document_update_title);
        }
        self.windows.cleanup().await;
        Ok(())
    }

    /// Enter `stage`, clearing any dialog already in the way.
    async fn enter(&self, stage: ConfigStage) -> Result<(), AutomationError> {
        self.watchdog.set_stage(stage);
        match self.watchdog.handle_if_present(stage, false).await? {
            InterruptOutcome::Failed => Err(AutomationError::InterruptedWorkflow(format!(
                "could not clear dialog while entering {stage}"
            ))),
            InterruptOutcome::Clear | InterruptOutcome::Recovered => Ok(()),
        }
    }

    /// The no-OCR entry sits directly below the top of the context menu.
    async fn choose_no_ocr_entry(&self, document: &Match) -> Result<(), AutomationError> {
        let vision = &self.ports.vision;
        let timing = &self.config.timing;

        vision
            .inject_click(document.center(), MouseButton::Right)
            .await?;
        tokio::time::sleep(timing.context_menu_delay()).await;
        vision.inject_key(KeyStroke::DOWN).await?;
        tokio::time::sleep(timing.navigation_delay()).await;
        vision.inject_key(KeyStroke::ENTER).await?;
        debug!("Selected no-OCR entry");
        Ok(())
    }

    async fn acquire_window(&self, title: &str) -> Result<WindowHandle, AutomationError> {
        let label = format!("Find window '{title}'");
        self.retry
            .execute_with_retry(
                &label,
                |_| self.try_focus(title),
                || self.clear_dialog(),
            )
            .await
            .into_result(&label)
    }

    async fn try_focus(&self, title: &str) -> Result<Option<WindowHandle>, AutomationError> {
        if self.windows.focus_and_verify(title).await {
            Ok(self.windows.current())
        } else {
            Ok(None)
        }
    }

    async fn clear_dialog(&self) {
        let stage = self.watchdog.stage();
        if let Ok(InterruptOutcome::Failed) = self.watchdog.handle_if_present(stage, false).await {
            warn!("Dialog still blocking {}", stage);
        }
    }

    async fn find_in(
        &self,
        pattern: &PatternId,
        region: Rect,
        similarity: f64,
    ) -> Result<Match, AutomationError> {
        self.ports
            .vision
            .wait_for(pattern, region, similarity, self.config.timing.menu_timeout())
            .await?
            .ok_or_else(|| AutomationError::ElementNotFound(format!("{pattern} not found in {region}")))
    }

    /// Open the printer drop-down, type the printer name and confirm with OK.
    async fn select_printer(&self, window: Rect) -> Result<(), AutomationError> {
        let vision = &self.ports.vision;
        let timing = &self.config.timing;
        let patterns = &self.config.patterns;

        // Fourth and fifth columns of the second row, on a 5x5 grid
        let column = window.width / 5;
        let row = window.height / 5;
        let dropdown_region = Rect::new(window.x + column * 3, window.y + row - 20, column * 2, row);
        let arrow = self
            .find_in(&patterns.dropdown_arrow, dropdown_region, patterns.dropdown_similarity)
            .await?;
        info!(x = arrow.x, y = arrow.y, "Found printer drop-down");
        vision.inject_click(arrow.center(), MouseButton::Left).await?;
        tokio::time::sleep(timing.context_menu_delay()).await;

        vision.inject_text(&self.config.printer.printer_name).await?;
        vision.inject_key(KeyStroke::ENTER).await?;
        tokio::time::sleep(timing.context_menu_delay()).await;

        let ok = self
            .find_in(
                &patterns.ok_button,
                window.fraction(0.0, 0.5, 1.0, 0.5),
                patterns.similarity,
            )
            .await?;
        vision.inject_click(ok.center(), MouseButton::Left).await?;
        tokio::time::sleep(timing.focus_delay()).await;
        Ok(())
    }
}
