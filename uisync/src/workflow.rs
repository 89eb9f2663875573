//! The per-document batch loop

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};

use crate::cancellation::CancellationSignal;
use crate::config::EngineConfig;
use crate::errors::AutomationError;
use crate::interrupt::{InterruptOutcome, InterruptWatchdog, RecoveryTable};
use crate::platforms::Ports;
use crate::regions::SearchRegions;
use crate::retry::{RetryOrchestrator, RetryPolicy};
use crate::scrollbar::{ProgressVerdict, ScrollProgressTracker};
use crate::stability::StabilityWaiter;
use crate::state::{AutomationStage, AutomationState, ProcessingStats};
use crate::types::{KeyStroke, Match, MouseButton};
use crate::utils::document_path;
use crate::window::WindowStateManager;

/// Saves a run of documents one at a time, navigating with the Down key
/// between them.
pub struct DocumentBatchProcessor {
    ports: Ports,
    config: EngineConfig,
    regions: SearchRegions,
    waiter: StabilityWaiter,
    tracker: ScrollProgressTracker,
    watchdog: Arc<InterruptWatchdog<AutomationStage>>,
    cancel: CancellationSignal,
    output_folder: PathBuf,
    state: AutomationState,
}

impl DocumentBatchProcessor {
    pub fn new(
        ports: Ports,
        windows: Arc<WindowStateManager>,
        regions: SearchRegions,
        config: EngineConfig,
        output_folder: impl Into<PathBuf>,
        cancel: CancellationSignal,
    ) -> Self {
        let watchdog = Arc::new(InterruptWatchdog::new(
            ports.vision.clone(),
            windows,
            &regions,
            &config,
            RecoveryTable::document_workflow(),
            AutomationStage::Selecting,
        ));
        let waiter = StabilityWaiter::new(ports.vision.clone(), &config, cancel.clone());
        let tracker = ScrollProgressTracker::new(
            ports.vision.clone(),
            watchdog.clone(),
            &regions,
            &config,
            cancel.clone(),
        );

        Self {
            ports,
            config,
            regions,
            waiter,
            tracker,
            watchdog,
            cancel,
            output_folder: output_folder.into(),
            state: AutomationState::new(),
        }
    }

    pub fn output_folder(&self) -> &Path {
        &self.output_folder
    }

    /// Copy of the current workflow position
    pub fn state(&self) -> AutomationState {
        let mut state = self.state.snapshot();
        state.set_stage(self.watchdog.stage());
        state
    }

    /// The watchdog owns the live stage; recovery moves it too.
    fn set_stage(&self, stage: AutomationStage) {
        self.watchdog.set_stage(stage);
    }

    fn begin_document(&mut self, number: usize) -> PathBuf {
        let path = document_path(&self.output_folder, number);
        self.state.begin_document(number, path.clone());
        self.watchdog.set_stage(AutomationStage::Selecting);
        path
    }

    fn retry(&self, max_attempts: u32) -> RetryOrchestrator {
        RetryOrchestrator::new(
            RetryPolicy::new(max_attempts, self.config.retry.delay()),
            self.cancel.clone(),
        )
    }

    /// Process `total` documents, starting from the one currently selected.
    ///
    /// Failed documents are recorded and skipped. Cancellation is honoured
    /// between documents; a document already in flight is finished first.
    #[instrument(skip(self))]
    pub async fn process_documents(&mut self, total: usize) -> ProcessingStats {
        let mut stats = ProcessingStats::new(total);
        if total == 0 {
            warn!("No documents to process");
            return stats;
        }

        info!("Beginning processing of {} documents", total);
        self.initialize_tracking().await;

        for index in 0..total {
            if self.cancel.is_set() {
                break;
            }
            let number = index + 1;

            let outcome = self
                .process_single_document(number, total, stats.processed_documents())
                .await;
            match outcome {
                Ok(()) => stats.record_success(),
                Err(AutomationError::Cancelled) => {
                    // Saved already; only the move to the next document was cut short.
                    if self.state().stage() == AutomationStage::NavigationPending {
                        stats.record_success();
                    }
                    info!(document = number, "Document interrupted by cancellation");
                    break;
                }
                Err(e) => {
                    let message = format!("Error processing document {number}: {e}");
                    error!(document = number, "{}", message);
                    let failed_stage = self.state().stage();
                    stats.record_failure(number, message);
                    if number < total && failed_stage != AutomationStage::NavigationPending {
                        self.realign_after_failure(number).await;
                    }
                }
            }
        }

        if self.cancel.is_set() {
            info!(
                "Processing terminated by kill switch after {} documents",
                stats.processed_documents()
            );
        } else {
            info!(
                "Processing complete: {}/{} documents saved",
                stats.processed_documents(),
                total
            );
        }
        stats
    }

    async fn initialize_tracking(&mut self) {
        let selection = match self
            .waiter
            .wait_for_stable(
                &self.config.patterns.selection_border,
                self.regions.selection(),
                self.config.timing.dialog_timeout(),
            )
            .await
        {
            Ok(Some(selection)) => selection,
            Ok(None) => {
                warn!("No selected document found, scrollbar tracking disabled");
                return;
            }
            Err(e) => {
                warn!("Could not look for the selected document: {}", e);
                return;
            }
        };

        match self.tracker.initialize(&selection).await {
            Ok(true) => {}
            Ok(false) => warn!("Failed to initialize scrollbar tracking, using basic verification"),
            Err(e) => warn!("Scrollbar tracking unavailable: {}", e),
        }
    }

    async fn process_single_document(
        &mut self,
        number: usize,
        total: usize,
        processed: usize,
    ) -> Result<(), AutomationError> {
        let path = self.begin_document(number);

        let selection = self.select_document(number).await?;
        info!(
            document = number,
            x = selection.x,
            y = selection.y,
            "Processing document {} of {}",
            number,
            total
        );

        self.save_document(number, &selection, &path).await?;
        self.set_stage(AutomationStage::NavigationPending);
        info!(document = number, "Saved {}", path.display());

        if number < total {
            self.navigate_next(processed).await?;
        } else {
            info!("Reached final document");
        }
        Ok(())
    }

    async fn select_document(&self, number: usize) -> Result<Match, AutomationError> {
        let pattern = &self.config.patterns.selection_border;
        let region = self.regions.selection();
        let timeout = self.config.timing.dialog_timeout();
        let label = format!("Select document {number}");

        self.retry(self.config.retry.selection_attempts)
            .execute_with_retry(
                &label,
                |_| self.waiter.wait_for_stable(pattern, region, timeout),
                || self.recover(false),
            )
            .await
            .into_result(&label)
    }

    async fn save_document(
        &self,
        number: usize,
        selection: &Match,
        path: &Path,
    ) -> Result<(), AutomationError> {
        let label = format!("Save document {number}");
        self.retry(self.config.retry.save_attempts)
            .execute_with_retry(
                &label,
                |attempt| self.save_attempt(attempt, selection, path),
                || self.recover(true),
            )
            .await
            .into_result(&label)
    }

    /// Clear any dialog and put the workflow back at `Selecting`. Runs after
    /// every failed attempt.
    async fn recover(&self, accept: bool) {
        match self
            .watchdog
            .handle_if_present(AutomationStage::Selecting, accept)
            .await
        {
            Ok(InterruptOutcome::Recovered) => {}
            Ok(InterruptOutcome::Clear) => {
                if let Err(e) = self.watchdog.resume_to(AutomationStage::Selecting).await {
                    warn!("Cleanup after failed attempt: {}", e);
                }
            }
            Ok(InterruptOutcome::Failed) => warn!("Could not clear blocking dialog"),
            Err(e) => warn!("Dialog recovery failed: {}", e),
        }
        self.set_stage(AutomationStage::Selecting);
    }

    /// One pass of the save action. `Ok(None)` means an expected element
    /// never appeared and the attempt should be retried.
    async fn save_attempt(
        &self,
        attempt: u32,
        selection: &Match,
        path: &Path,
    ) -> Result<Option<()>, AutomationError> {
        let vision = &self.ports.vision;
        let patterns = &self.config.patterns;
        let timing = &self.config.timing;
        debug!(attempt, "Starting save attempt");

        self.ports
            .clipboard
            .set_content(&path.to_string_lossy())
            .await?;

        self.set_stage(AutomationStage::ContextMenuOpen);
        vision
            .inject_click(selection.center(), MouseButton::Right)
            .await?;
        tokio::time::sleep(timing.context_menu_delay()).await;

        let Some(menu_item) = self.wait_for_print_menu_item(selection).await? else {
            warn!("Print menu item did not appear");
            return Ok(None);
        };
        vision
            .inject_click(menu_item.center(), MouseButton::Left)
            .await?;
        self.set_stage(AutomationStage::PrintDialogOpen);

        let dialog = vision
            .wait_for(
                &patterns.save_dialog,
                self.regions.window(),
                patterns.similarity,
                timing.dialog_timeout(),
            )
            .await?;
        if dialog.is_none() {
            warn!("Save dialog did not appear");
            return Ok(None);
        }
        self.set_stage(AutomationStage::SaveDialogOpen);

        vision.inject_key(KeyStroke::ctrl('a')).await?;
        vision.inject_key(KeyStroke::ctrl('v')).await?;
        vision.inject_key(KeyStroke::ENTER).await?;
        self.set_stage(AutomationStage::Saving);

        if !self.wait_for_save_dialog_close().await? {
            warn!("Save dialog did not close");
            return Ok(None);
        }
        Ok(Some(()))
    }

    /// Poll for the print entry of the context menu. A popup covering the
    /// menu is cancelled and the menu reopened.
    async fn wait_for_print_menu_item(
        &self,
        selection: &Match,
    ) -> Result<Option<Match>, AutomationError> {
        let vision = &self.ports.vision;
        let patterns = &self.config.patterns;
        let timing = &self.config.timing;
        let start = Instant::now();

        while start.elapsed() < timing.menu_timeout() {
            if let Some(item) = vision
                .locate(
                    &patterns.print_menu_item,
                    self.regions.window(),
                    patterns.similarity,
                )
                .await?
            {
                return Ok(Some(item));
            }

            if self.watchdog.check().await {
                info!("Popup over context menu, dismissing and reopening");
                self.watchdog.dismiss(false).await?;
                vision
                    .inject_click(selection.center(), MouseButton::Right)
                    .await?;
                tokio::time::sleep(timing.context_menu_delay()).await;
            }

            tokio::time::sleep(timing.poll_interval()).await;
        }
        Ok(None)
    }

    /// Wait for the save dialog to go away in short slices, cancelling any
    /// popup that appears in between.
    async fn wait_for_save_dialog_close(&self) -> Result<bool, AutomationError> {
        let patterns = &self.config.patterns;
        let timing = &self.config.timing;
        let start = Instant::now();

        while start.elapsed() < timing.dialog_timeout() {
            let gone = self
                .ports
                .vision
                .wait_vanish(
                    &patterns.save_dialog,
                    self.regions.window(),
                    patterns.similarity,
                    timing.save_vanish_slice(),
                )
                .await?;
            if gone {
                return Ok(true);
            }
            if self.watchdog.check().await {
                info!("Popup while saving, dismissing");
                self.watchdog.dismiss(false).await?;
            }
        }
        Ok(false)
    }

    /// Move to the next document and confirm the move.
    async fn navigate_next(&mut self, processed: usize) -> Result<(), AutomationError> {
        if processed < self.config.batch.min_documents_for_scrollbar {
            return self.basic_navigation().await;
        }

        let Some(region) = self.tracker.tracking_region() else {
            debug!("Scrollbar tracking not initialized, using basic verification");
            return self.basic_navigation().await;
        };
        match self.tracker.start_tracking(region).await {
            Ok(true) => {}
            Ok(false) => {
                warn!("Scrollbar tracking failed, falling back to basic verification");
                return self.basic_navigation().await;
            }
            Err(AutomationError::Cancelled) => return Err(AutomationError::Cancelled),
            Err(e) => {
                warn!("Scrollbar baseline capture failed ({}), falling back to basic verification", e);
                return self.basic_navigation().await;
            }
        }

        self.ports.vision.inject_key(KeyStroke::DOWN).await?;
        match self
            .tracker
            .verify_progress(self.config.timing.navigation_timeout())
            .await
        {
            Ok(ProgressVerdict::Confirmed) => Ok(()),
            Ok(verdict) => {
                warn!(?verdict, "Scrollbar verification inconclusive, checking selection instead");
                self.confirm_selection().await
            }
            Err(AutomationError::Cancelled) => Err(AutomationError::Cancelled),
            Err(e) => {
                warn!("Scrollbar verification failed ({}), checking selection instead", e);
                self.confirm_selection().await
            }
        }
    }

    async fn basic_navigation(&self) -> Result<(), AutomationError> {
        self.ports.vision.inject_key(KeyStroke::DOWN).await?;
        tokio::time::sleep(self.config.timing.navigation_delay()).await;
        self.confirm_selection().await
    }

    async fn confirm_selection(&self) -> Result<(), AutomationError> {
        let timeout = self.config.timing.navigation_timeout();
        match self
            .waiter
            .wait_for_stable(
                &self.config.patterns.selection_border,
                self.regions.selection(),
                timeout,
            )
            .await?
        {
            Some(_) => Ok(()),
            None => Err(AutomationError::VerificationTimeout(format!(
                "selection did not settle within {timeout:?} after navigation"
            ))),
        }
    }

    /// After a failure before navigation, step onto the next document so the
    /// next index does not re-save the failed one.
    async fn realign_after_failure(&self, number: usize) {
        if let Err(e) = self.watchdog.resume_to(AutomationStage::Selecting).await {
            warn!("Cleanup after document {} failed: {}", number, e);
        }
        self.set_stage(AutomationStage::Selecting);

        match self.basic_navigation().await {
            Ok(()) => debug!("Moved past failed document {}", number),
            Err(e) => warn!("Could not move past failed document {}: {}", number, e),
        }
    }
}
