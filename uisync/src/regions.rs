//! Screen regions derived from the main window bounds

use crate::config::{EngineConfig, ScrollbarConfig};
use crate::types::{Match, Rect};

/// Fixed search areas, computed once from the main window when a session
/// attaches.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRegions {
    window: Rect,
    selection: Rect,
    popup_box: Rect,
}

impl SearchRegions {
    pub fn new(window: Rect, config: &EngineConfig) -> Self {
        let sel = config.regions.selection;
        let pop = config.popup.expected_box;
        Self {
            window,
            selection: window.fraction(sel.left, sel.top, sel.width, sel.height),
            popup_box: window.fraction(pop.left, pop.top, pop.width, pop.height),
        }
    }

    pub fn window(&self) -> Rect {
        self.window
    }

    /// Where the highlighted document row is expected
    pub fn selection(&self) -> Rect {
        self.selection
    }

    /// Where a genuine blocking dialog's pattern must land
    pub fn popup_box(&self) -> Rect {
        self.popup_box
    }
}

/// Initial scrollbar strip to the right of a selected row. It reaches a
/// little above the row to keep the up-arrow in view and well below it to
/// leave room for the thumb to travel.
pub fn scrollbar_search_region(selection: &Match, config: &ScrollbarConfig) -> Rect {
    Rect::new(
        selection.x + config.offset_x,
        selection.y - config.upward_padding,
        config.width,
        config.track_height + config.upward_padding + config.downward_padding,
    )
}

/// Tracking strip anchored at a detected thumb, used for every navigation
/// after the first detection.
pub fn anchored_tracking_region(strip_x: i32, thumb_y: i32, config: &ScrollbarConfig) -> Rect {
    Rect::new(
        strip_x,
        thumb_y - config.upward_padding,
        config.width,
        config.track_height + config.upward_padding + config.downward_padding,
    )
}
