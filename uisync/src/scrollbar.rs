//! Color-based scrollbar thumb tracking, used as an independent signal that
//! a navigation key press actually moved the selection.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};

use crate::cancellation::CancellationSignal;
use crate::config::{EngineConfig, ScrollbarConfig};
use crate::errors::AutomationError;
use crate::interrupt::InterruptWatchdog;
use crate::platforms::VisionPort;
use crate::regions::{anchored_tracking_region, scrollbar_search_region, SearchRegions};
use crate::state::AutomationStage;
use crate::types::{KeyStroke, Match, PatternId, Rect, Rgb};

/// A contiguous run of thumb-colored pixels, relative to the top of the strip
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThumbRun {
    pub start: u32,
    pub len: u32,
}

/// Longest run of pixels matching any of `colors`, or `None` if it is shorter
/// than `min_height`. Ties keep the topmost run.
pub fn find_thumb_run(strip: &[Rgb], colors: &[Rgb], tolerance: u8, min_height: u32) -> Option<ThumbRun> {
    let is_thumb = |px: &Rgb| colors.iter().any(|c| px.matches(c, tolerance));

    let mut best: Option<ThumbRun> = None;
    let mut run_start = 0u32;
    let mut run_len = 0u32;

    for (y, px) in strip.iter().enumerate() {
        if is_thumb(px) {
            if run_len == 0 {
                run_start = y as u32;
            }
            run_len += 1;
        } else {
            if run_len > best.map_or(0, |b| b.len) {
                best = Some(ThumbRun {
                    start: run_start,
                    len: run_len,
                });
            }
            run_len = 0;
        }
    }
    if run_len > best.map_or(0, |b| b.len) {
        best = Some(ThumbRun {
            start: run_start,
            len: run_len,
        });
    }

    best.filter(|run| run.len >= min_height)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Movement {
    Forward,
    Still,
    Reversed,
}

/// Progress needs strictly more than `min_movement` pixels of downward travel.
pub fn classify_movement(movement: i32, min_movement: i32) -> Movement {
    if movement < 0 {
        Movement::Reversed
    } else if movement > min_movement {
        Movement::Forward
    } else {
        Movement::Still
    }
}

/// Thumb position captured just before a navigation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollbarBaseline {
    pub y: i32,
    pub height: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressVerdict {
    /// The thumb settled below the baseline
    Confirmed,
    /// The thumb moved up; the reading cannot be trusted
    Reversed { movement: i32 },
    TimedOut,
    /// No thumb could be found in the tracking strip
    ThumbLost,
}

impl ProgressVerdict {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, ProgressVerdict::Confirmed)
    }
}

pub struct ScrollProgressTracker {
    port: Arc<dyn VisionPort>,
    watchdog: Arc<InterruptWatchdog<AutomationStage>>,
    config: ScrollbarConfig,
    selection_pattern: PatternId,
    selection_region: Rect,
    similarity: f64,
    poll_interval: Duration,
    navigation_delay: Duration,
    cancel: CancellationSignal,
    tracking_region: Option<Rect>,
    baseline: Option<ScrollbarBaseline>,
}

impl ScrollProgressTracker {
    pub fn new(
        port: Arc<dyn VisionPort>,
        watchdog: Arc<InterruptWatchdog<AutomationStage>>,
        regions: &SearchRegions,
        config: &EngineConfig,
        cancel: CancellationSignal,
    ) -> Self {
        Self {
            port,
            watchdog,
            config: config.scrollbar.clone(),
            selection_pattern: config.patterns.selection_border.clone(),
            selection_region: regions.selection(),
            similarity: config.patterns.similarity,
            poll_interval: config.timing.poll_interval(),
            navigation_delay: config.timing.navigation_delay(),
            cancel,
            tracking_region: None,
            baseline: None,
        }
    }

    /// The strip anchored at the thumb, once [`initialize`](Self::initialize)
    /// has found it.
    pub fn tracking_region(&self) -> Option<Rect> {
        self.tracking_region
    }

    pub fn baseline(&self) -> Option<ScrollbarBaseline> {
        self.baseline
    }

    pub fn is_tracking(&self) -> bool {
        self.baseline.is_some()
    }

    /// Sample the vertical centre line of `region` and return the thumb's
    /// absolute bounds.
    pub async fn locate_thumb(&self, region: Rect) -> Result<Option<Rect>, AutomationError> {
        let strip_rect = Rect::new(region.x + region.width / 2, region.y, 1, region.height);
        let grid = self.port.sample_colors(strip_rect).await?;
        let strip = grid.column(0);

        let run = find_thumb_run(
            &strip,
            &self.config.colors,
            self.config.color_tolerance,
            self.config.min_thumb_height,
        );
        Ok(run.map(|run| {
            Rect::new(
                region.x,
                region.y + run.start as i32,
                region.width,
                run.len as i32,
            )
        }))
    }

    /// Find the thumb next to `selection` and anchor the tracking strip on it.
    #[instrument(level = "debug", skip(self, selection))]
    pub async fn initialize(&mut self, selection: &Match) -> Result<bool, AutomationError> {
        let search = scrollbar_search_region(selection, &self.config);
        debug!("Searching for scrollbar thumb in {}", search);

        match self.locate_thumb(search).await? {
            Some(thumb) => {
                let region = anchored_tracking_region(thumb.x, thumb.y, &self.config);
                info!(
                    thumb_y = thumb.y,
                    height = thumb.height,
                    "Scrollbar tracking initialized, strip {}",
                    region
                );
                self.tracking_region = Some(region);
                Ok(true)
            }
            None => {
                warn!("Could not locate scrollbar thumb in {}", search);
                Ok(false)
            }
        }
    }

    /// Capture a fresh baseline in `region`. With `confirm_baseline` set the
    /// thumb must be read twice at the same position; any disagreement fails
    /// closed.
    pub async fn start_tracking(&mut self, region: Rect) -> Result<bool, AutomationError> {
        self.baseline = None;

        let Some(first) = self.locate_thumb(region).await? else {
            error!("Could not establish baseline position in {}", region);
            return Ok(false);
        };

        if self.config.confirm_baseline {
            tokio::time::sleep(self.poll_interval).await;
            match self.locate_thumb(region).await? {
                Some(second) if second.y == first.y => {}
                Some(second) => {
                    warn!(
                        "Baseline unstable: y={} then y={}, not tracking",
                        first.y, second.y
                    );
                    return Ok(false);
                }
                None => {
                    warn!("Thumb vanished while confirming baseline");
                    return Ok(false);
                }
            }
        }

        self.tracking_region = Some(region);
        self.baseline = Some(ScrollbarBaseline {
            y: first.y,
            height: first.height,
        });
        debug!(y = first.y, height = first.height, "Baseline captured");
        Ok(true)
    }

    /// Poll the tracking strip until the thumb has settled below the
    /// baseline. The baseline is consumed whatever the outcome.
    #[instrument(level = "debug", skip(self))]
    pub async fn verify_progress(
        &mut self,
        timeout: Duration,
    ) -> Result<ProgressVerdict, AutomationError> {
        let (Some(region), Some(baseline)) = (self.tracking_region, self.baseline.take()) else {
            return Err(AutomationError::ScrollFailed(
                "document tracking not started".to_string(),
            ));
        };

        tokio::time::sleep(self.navigation_delay).await;

        let max_dismissals = self.watchdog.max_dismiss_attempts();
        let mut start = Instant::now();
        let mut checks: u32 = 0;
        let mut still_checks: u32 = 0;
        let mut confirmations: u32 = 0;
        let mut last_y: Option<i32> = None;
        let mut dismissals: u32 = 0;

        while start.elapsed() < timeout {
            if self.cancel.is_set() {
                return Err(AutomationError::Cancelled);
            }

            if self.watchdog.check().await {
                if dismissals >= max_dismissals {
                    return Err(AutomationError::InterruptedWorkflow(format!(
                        "dialog kept reappearing during navigation ({dismissals} dismissed)"
                    )));
                }
                dismissals += 1;
                info!("Popup during navigation check, dismissing ({}/{})", dismissals, max_dismissals);
                self.watchdog.dismiss(true).await?;

                confirmations = 0;
                last_y = None;
                tokio::time::sleep(self.navigation_delay).await;
                self.ensure_selection_visible().await?;
                start = Instant::now();
                continue;
            }

            let Some(thumb) = self.locate_thumb(region).await? else {
                if self.watchdog.check().await {
                    debug!("Thumb hidden by a popup");
                    continue;
                }
                error!("Could not find current thumb position");
                return Ok(ProgressVerdict::ThumbLost);
            };

            checks += 1;
            let movement = thumb.y - baseline.y;
            debug!(
                check = checks,
                baseline = baseline.y,
                current = thumb.y,
                movement,
                "Thumb sample"
            );

            match classify_movement(movement, self.config.min_movement) {
                Movement::Reversed => {
                    warn!("Thumb moved up by {} pixels", -movement);
                    return Ok(ProgressVerdict::Reversed { movement });
                }
                Movement::Forward => {
                    still_checks = 0;
                    confirmations = if last_y == Some(thumb.y) {
                        confirmations + 1
                    } else {
                        1
                    };
                    if confirmations >= self.config.progress_confirmations {
                        info!("Verified downward thumb movement of {} pixels", movement);
                        return Ok(ProgressVerdict::Confirmed);
                    }
                }
                Movement::Still => {
                    confirmations = 0;
                    still_checks += 1;
                    if still_checks >= self.config.nudge_after_checks {
                        still_checks = 0;
                        if !self.watchdog.check().await {
                            warn!("No movement after {} checks, resending Down", checks);
                            self.port.inject_key(KeyStroke::DOWN).await?;
                            tokio::time::sleep(self.navigation_delay).await;
                        }
                    }
                }
            }

            last_y = Some(thumb.y);
            tokio::time::sleep(self.poll_interval).await;
        }

        debug!("No stable movement after {} checks", checks);
        Ok(ProgressVerdict::TimedOut)
    }

    async fn ensure_selection_visible(&self) -> Result<(), AutomationError> {
        let border = self
            .port
            .locate(&self.selection_pattern, self.selection_region, self.similarity)
            .await?;
        if border.is_none() {
            warn!("Lost document selection after popup, resending Down");
            self.port.inject_key(KeyStroke::DOWN).await?;
            tokio::time::sleep(self.navigation_delay).await;
        }
        Ok(())
    }
}
