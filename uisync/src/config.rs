//! Engine configuration
//!
//! Every section is `#[serde(default)]`, so a JSON file only needs to name
//! the values it overrides. Defaults are the values the engine was tuned with
//! against a 1920x1080 desktop.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::errors::AutomationError;
use crate::types::{PatternId, Rgb};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Title prefix of the target application's main window
    pub app_title: String,
    pub timing: TimingConfig,
    pub stability: StabilityConfig,
    pub scrollbar: ScrollbarConfig,
    pub popup: PopupConfig,
    pub retry: RetryConfig,
    pub batch: BatchConfig,
    pub regions: RegionConfig,
    pub patterns: PatternConfig,
    pub printer: PrinterConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            app_title: "SystmOne GP:".to_string(),
            timing: TimingConfig::default(),
            stability: StabilityConfig::default(),
            scrollbar: ScrollbarConfig::default(),
            popup: PopupConfig::default(),
            retry: RetryConfig::default(),
            batch: BatchConfig::default(),
            regions: RegionConfig::default(),
            patterns: PatternConfig::default(),
            printer: PrinterConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(json: &str) -> Result<Self, AutomationError> {
        let config: EngineConfig = serde_json::from_str(json)
            .map_err(|e| AutomationError::Config(format!("failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, AutomationError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            AutomationError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<(), AutomationError> {
        fn invalid(msg: impl Into<String>) -> Result<(), AutomationError> {
            Err(AutomationError::Config(msg.into()))
        }

        if self.app_title.trim().is_empty() {
            return invalid("app_title must not be empty");
        }
        if self.stability.required_count == 0 {
            return invalid("stability.required_count must be at least 1");
        }
        if self.timing.poll_interval_ms == 0 {
            return invalid("timing.poll_interval_ms must be greater than 0");
        }
        if self.timing.save_vanish_slice_ms == 0 {
            return invalid("timing.save_vanish_slice_ms must be greater than 0");
        }
        if self.retry.save_attempts == 0
            || self.retry.selection_attempts == 0
            || self.retry.window_attempts == 0
        {
            return invalid("retry attempt counts must be at least 1");
        }
        if self.popup.max_dismiss_attempts == 0 {
            return invalid("popup.max_dismiss_attempts must be at least 1");
        }
        for (name, value) in [
            ("patterns.similarity", self.patterns.similarity),
            ("patterns.dropdown_similarity", self.patterns.dropdown_similarity),
            ("popup.similarity", self.popup.similarity),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return invalid(format!("{name} must be in (0, 1], got {value}"));
            }
        }
        if self.scrollbar.colors.is_empty() {
            return invalid("scrollbar.colors must list at least one thumb color");
        }
        if self.scrollbar.min_thumb_height == 0 {
            return invalid("scrollbar.min_thumb_height must be at least 1");
        }
        if self.scrollbar.progress_confirmations == 0 {
            return invalid("scrollbar.progress_confirmations must be at least 1");
        }
        self.popup.expected_box.validate("popup.expected_box")?;
        self.regions.selection.validate("regions.selection")?;
        Ok(())
    }
}

/// All delays and timeouts, in milliseconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub poll_interval_ms: u64,
    pub focus_delay_ms: u64,
    pub navigation_delay_ms: u64,
    pub context_menu_delay_ms: u64,
    pub popup_dismiss_delay_ms: u64,
    pub menu_cleanup_delay_ms: u64,
    pub post_cleanup_delay_ms: u64,
    pub dialog_timeout_ms: u64,
    pub menu_timeout_ms: u64,
    pub navigation_timeout_ms: u64,
    /// Length of each short wait for the save dialog to close
    pub save_vanish_slice_ms: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 10,
            focus_delay_ms: 1000,
            navigation_delay_ms: 100,
            context_menu_delay_ms: 500,
            popup_dismiss_delay_ms: 500,
            menu_cleanup_delay_ms: 300,
            post_cleanup_delay_ms: 500,
            dialog_timeout_ms: 10_000,
            menu_timeout_ms: 5_000,
            navigation_timeout_ms: 10_000,
            save_vanish_slice_ms: 1_000,
        }
    }
}

impl TimingConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn focus_delay(&self) -> Duration {
        Duration::from_millis(self.focus_delay_ms)
    }

    pub fn navigation_delay(&self) -> Duration {
        Duration::from_millis(self.navigation_delay_ms)
    }

    pub fn context_menu_delay(&self) -> Duration {
        Duration::from_millis(self.context_menu_delay_ms)
    }

    pub fn popup_dismiss_delay(&self) -> Duration {
        Duration::from_millis(self.popup_dismiss_delay_ms)
    }

    pub fn menu_cleanup_delay(&self) -> Duration {
        Duration::from_millis(self.menu_cleanup_delay_ms)
    }

    pub fn post_cleanup_delay(&self) -> Duration {
        Duration::from_millis(self.post_cleanup_delay_ms)
    }

    pub fn dialog_timeout(&self) -> Duration {
        Duration::from_millis(self.dialog_timeout_ms)
    }

    pub fn menu_timeout(&self) -> Duration {
        Duration::from_millis(self.menu_timeout_ms)
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_millis(self.navigation_timeout_ms)
    }

    pub fn save_vanish_slice(&self) -> Duration {
        Duration::from_millis(self.save_vanish_slice_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilityConfig {
    /// Consecutive polls at the same position before a match is accepted
    pub required_count: u32,
}

impl Default for StabilityConfig {
    fn default() -> Self {
        Self { required_count: 2 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrollbarConfig {
    /// Thumb colors: default, hover and pressed
    pub colors: Vec<Rgb>,
    pub color_tolerance: u8,
    /// Runs shorter than this are arrow glyphs, not the thumb
    pub min_thumb_height: u32,
    /// Movement must exceed this many pixels to count as progress
    pub min_movement: i32,
    /// Consecutive still samples before the navigation key is re-sent
    pub nudge_after_checks: u32,
    /// Consecutive samples at the same advanced position required to confirm
    pub progress_confirmations: u32,
    /// Re-read the baseline once before accepting it
    pub confirm_baseline: bool,
    /// Horizontal distance from the selection match to the scrollbar
    pub offset_x: i32,
    pub width: i32,
    pub track_height: i32,
    pub upward_padding: i32,
    pub downward_padding: i32,
}

impl Default for ScrollbarConfig {
    fn default() -> Self {
        Self {
            colors: vec![
                Rgb::new(205, 205, 205),
                Rgb::new(166, 166, 166),
                Rgb::new(96, 96, 96),
            ],
            color_tolerance: 3,
            min_thumb_height: 15,
            min_movement: 3,
            nudge_after_checks: 5,
            progress_confirmations: 2,
            confirm_baseline: true,
            offset_x: 935,
            width: 18,
            track_height: 400,
            upward_padding: 15,
            downward_padding: 150,
        }
    }
}

/// A rectangle expressed as fractions of a parent rectangle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RelativeBox {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl RelativeBox {
    fn validate(&self, name: &str) -> Result<(), AutomationError> {
        let in_unit = |v: f64| (0.0..=1.0).contains(&v);
        if !(in_unit(self.left) && in_unit(self.top) && in_unit(self.width) && in_unit(self.height))
            || self.width == 0.0
            || self.height == 0.0
            || self.left + self.width > 1.0
            || self.top + self.height > 1.0
        {
            return Err(AutomationError::Config(format!(
                "{name} must lie within its parent, got {:?}",
                self
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PopupConfig {
    pub similarity: f64,
    /// Where a genuine blocking dialog appears, relative to the main window
    pub expected_box: RelativeBox,
    /// Dismissals tolerated inside one verification before giving up
    pub max_dismiss_attempts: u32,
}

impl Default for PopupConfig {
    fn default() -> Self {
        Self {
            similarity: 0.9,
            expected_box: RelativeBox {
                left: 0.25,
                top: 0.25,
                width: 0.5,
                height: 0.5,
            },
            max_dismiss_attempts: 3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub save_attempts: u32,
    pub selection_attempts: u32,
    pub window_attempts: u32,
    pub delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            save_attempts: 3,
            selection_attempts: 2,
            window_attempts: 5,
            delay_ms: 500,
        }
    }
}

impl RetryConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Documents processed before scrollbar tracking replaces plain stability checks
    pub min_documents_for_scrollbar: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            min_documents_for_scrollbar: 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionConfig {
    /// Part of the main window where the selected document row is searched
    pub selection: RelativeBox,
}

impl Default for RegionConfig {
    fn default() -> Self {
        Self {
            selection: RelativeBox {
                left: 0.0,
                top: 0.4,
                width: 0.5,
                height: 0.6,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternConfig {
    pub similarity: f64,
    /// Looser threshold for the printer drop-down arrow, which renders inconsistently
    pub dropdown_similarity: f64,
    pub selection_border: PatternId,
    pub print_menu_item: PatternId,
    pub save_dialog: PatternId,
    pub popup: PatternId,
    pub printer_settings_button: PatternId,
    pub dropdown_arrow: PatternId,
    pub ok_button: PatternId,
}

impl Default for PatternConfig {
    fn default() -> Self {
        Self {
            similarity: 0.8,
            dropdown_similarity: 0.6,
            selection_border: PatternId::new("selection_border"),
            print_menu_item: PatternId::new("print_menu_item"),
            save_dialog: PatternId::new("save_dialog_title"),
            popup: PatternId::new("popup"),
            printer_settings_button: PatternId::new("printer_settings_button"),
            dropdown_arrow: PatternId::new("dropdown_arrow"),
            ok_button: PatternId::new("ok_button"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrinterConfig {
    pub enabled: bool,
    pub document_update_title: String,
    pub printer_settings_title: String,
    pub printer_name: String,
}

impl Default for PrinterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            document_update_title: "Scanned Document Update".to_string(),
            printer_settings_title: "Actioned Scanned Image Printer Settings".to_string(),
            printer_name: "Microsoft Print to PDF".to_string(),
        }
    }
}
