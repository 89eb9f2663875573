use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

use crate::cancellation::CancellationSignal;
use crate::config::EngineConfig;
use crate::errors::AutomationError;
use crate::platforms::VisionPort;
use crate::types::{Match, PatternId, Rect};

/// Waits for an element to be found at the same position on several
/// consecutive polls.
///
/// A freshly rendered element can match before its layout settles (for
/// example mid-scroll), so presence alone is not accepted.
#[derive(Clone)]
pub struct StabilityWaiter {
    port: Arc<dyn VisionPort>,
    poll_interval: Duration,
    required_count: u32,
    min_similarity: f64,
    cancel: CancellationSignal,
}

impl StabilityWaiter {
    pub fn new(port: Arc<dyn VisionPort>, config: &EngineConfig, cancel: CancellationSignal) -> Self {
        Self {
            port,
            poll_interval: config.timing.poll_interval(),
            required_count: config.stability.required_count.max(1),
            min_similarity: config.patterns.similarity,
            cancel,
        }
    }

    /// Override the number of consecutive identical polls required.
    pub fn with_required_count(mut self, required_count: u32) -> Self {
        self.required_count = required_count.max(1);
        self
    }

    pub fn required_count(&self) -> u32 {
        self.required_count
    }

    /// Poll until `pattern` has been found at an unchanged position
    /// `required_count` times in a row, or `timeout` elapses.
    ///
    /// Returns `Ok(None)` on timeout and `Err(Cancelled)` if the cancellation
    /// signal is raised while waiting. Locator errors count as a miss.
    #[instrument(level = "debug", skip(self, pattern), fields(pattern = %pattern))]
    pub async fn wait_for_stable(
        &self,
        pattern: &PatternId,
        region: Rect,
        timeout: Duration,
    ) -> Result<Option<Match>, AutomationError> {
        let start = Instant::now();
        let mut last_match: Option<Match> = None;
        let mut stability_count: u32 = 0;

        while start.elapsed() < timeout {
            if self.cancel.is_set() {
                return Err(AutomationError::Cancelled);
            }

            let current = match self.port.locate(pattern, region, self.min_similarity).await {
                Ok(found) => found,
                Err(e) => {
                    warn!("Locate failed while waiting for {}: {}", pattern, e);
                    None
                }
            };

            match current {
                None => {
                    stability_count = 0;
                    last_match = None;
                }
                Some(found) => {
                    stability_count = match &last_match {
                        Some(previous) if previous.same_position(&found) => stability_count + 1,
                        _ => 1,
                    };
                    if stability_count >= self.required_count {
                        debug!(
                            x = found.x,
                            y = found.y,
                            polls = stability_count,
                            "Element stable"
                        );
                        return Ok(Some(found));
                    }
                    last_match = Some(found);
                }
            }

            tokio::time::sleep(self.poll_interval).await;
        }

        debug!(
            "Timed out after {:?} waiting for {} to stabilize (count {})",
            timeout, pattern, stability_count
        );
        Ok(None)
    }

    /// Like [`wait_for_stable`](Self::wait_for_stable) but turns a timeout into
    /// `ElementNotFound`.
    pub async fn require_stable(
        &self,
        pattern: &PatternId,
        region: Rect,
        timeout: Duration,
    ) -> Result<Match, AutomationError> {
        self.wait_for_stable(pattern, region, timeout)
            .await?
            .ok_or_else(|| {
                AutomationError::ElementNotFound(format!(
                    "{pattern} did not stabilize within {timeout:?} in {region}"
                ))
            })
    }
}
