//! UI synchronization and recovery for unattended document extraction
//!
//! Drives a desktop application that has no programmatic API by watching the
//! screen, synthesizing input and confirming every transition visually before
//! moving on. Screen, clipboard and window access are supplied by the caller
//! through the traits in [`platforms`].

use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, instrument};

pub mod cancellation;
pub mod config;
pub mod errors;
pub mod interrupt;
pub mod platforms;
pub mod printer;
pub mod regions;
pub mod report;
pub mod retry;
pub mod scrollbar;
pub mod stability;
pub mod state;
#[cfg(test)]
mod tests;
pub mod types;
pub mod utils;
pub mod window;
pub mod workflow;

pub use cancellation::CancellationSignal;
pub use config::EngineConfig;
pub use errors::AutomationError;
pub use interrupt::{InterruptOutcome, InterruptWatchdog, RecoveryTable};
pub use platforms::Ports;
pub use printer::PrinterConfigurator;
pub use regions::SearchRegions;
pub use report::ProcessingSummary;
pub use retry::{RetryOrchestrator, RetryOutcome, RetryPolicy};
pub use scrollbar::{ProgressVerdict, ScrollProgressTracker};
pub use stability::StabilityWaiter;
pub use state::{AutomationStage, AutomationState, ConfigStage, DocumentError, ProcessingStats};
pub use types::{Match, PatternId, Point, Rect, Rgb};
pub use window::WindowStateManager;
pub use workflow::DocumentBatchProcessor;

/// A connection to one running instance of the target application
pub struct Session {
    ports: Ports,
    config: EngineConfig,
    regions: SearchRegions,
    windows: Arc<WindowStateManager>,
    cancel: CancellationSignal,
}

impl Session {
    /// Validate `config`, find the main window and derive the search regions
    /// from its bounds.
    #[instrument(skip_all, fields(title = %config.app_title))]
    pub async fn attach(
        ports: Ports,
        config: EngineConfig,
        cancel: CancellationSignal,
    ) -> Result<Self, AutomationError> {
        config.validate()?;

        let windows = WindowStateManager::attach(ports.windows.clone(), &config.app_title, &config).await?;
        let bounds = ports.windows.window_bounds(windows.main_window()).await?;
        if bounds.is_empty() {
            return Err(AutomationError::PlatformError(format!(
                "main window has no usable area: {bounds}"
            )));
        }
        info!("Attached to '{}' at {}", windows.main_window().title, bounds);

        Ok(Self {
            regions: SearchRegions::new(bounds, &config),
            windows: Arc::new(windows),
            ports,
            config,
            cancel,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn regions(&self) -> &SearchRegions {
        &self.regions
    }

    pub fn windows(&self) -> &Arc<WindowStateManager> {
        &self.windows
    }

    pub fn cancellation(&self) -> &CancellationSignal {
        &self.cancel
    }

    /// Point document printing at the PDF printer. Skipped, and reported as
    /// done, when disabled in the configuration.
    pub async fn configure_printer(&self) -> bool {
        if !self.config.printer.enabled {
            info!("Printer configuration disabled");
            return true;
        }
        PrinterConfigurator::new(
            self.ports.clone(),
            self.windows.clone(),
            self.regions.clone(),
            self.config.clone(),
            self.cancel.clone(),
        )
        .configure_pdf_printer()
        .await
    }

    /// A batch processor saving into `output_folder`
    pub fn processor(&self, output_folder: impl Into<PathBuf>) -> DocumentBatchProcessor {
        DocumentBatchProcessor::new(
            self.ports.clone(),
            self.windows.clone(),
            self.regions.clone(),
            self.config.clone(),
            output_folder,
            self.cancel.clone(),
        )
    }
}
