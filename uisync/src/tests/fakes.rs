//! A scripted desktop that reacts to injected input the way the target
//! application does: menus open on right-click, the save dialog closes on
//! Enter, the scrollbar thumb moves on Down.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, PoisonError};

use crate::cancellation::CancellationSignal;
use crate::config::EngineConfig;
use crate::errors::AutomationError;
use crate::platforms::{ClipboardPort, ElementLocator, InputInjector, PixelSampler, Ports, VisionPort, WindowHost};
use crate::regions::SearchRegions;
use crate::types::{Key, KeyStroke, Match, MouseButton, PatternId, PixelGrid, Point, Rect, Rgb, WindowHandle};
use crate::window::WindowStateManager;

pub const MAIN_TITLE: &str = "SystmOne GP: Test Surgery";
pub const UPDATE_TITLE: &str = "Scanned Document Update";
pub const SETTINGS_TITLE: &str = "Actioned Scanned Image Printer Settings";

pub const WINDOW: Rect = Rect::new(0, 0, 1920, 1080);
pub const SELECTION: Rect = Rect::new(100, 500, 800, 20);
const MENU_ITEM: Rect = Rect::new(150, 520, 120, 18);
const SAVE_DIALOG: Rect = Rect::new(700, 400, 400, 30);
pub const UPDATE_BOUNDS: Rect = Rect::new(400, 200, 900, 600);
const SETTINGS_BUTTON: Rect = Rect::new(450, 250, 100, 24);
const SETTINGS_BOUNDS: Rect = Rect::new(500, 250, 700, 500);
const DROPDOWN_ARROW: Rect = Rect::new(1100, 350, 16, 16);
const OK_BUTTON: Rect = Rect::new(900, 650, 80, 24);

/// Inside the expected popup box of a 1920x1080 main window
pub const POPUP_INSIDE: Point = Point::new(900, 500);
pub const POPUP_OUTSIDE: Point = Point::new(50, 50);

/// Scrollbar strip to the right of the selection row
pub const STRIP_X: i32 = 1035;
pub const STRIP_WIDTH: i32 = 18;
pub const THUMB_START: i32 = 520;
pub const THUMB_HEIGHT: i32 = 40;
pub const THUMB_STEP: i32 = 8;
const ARROW_TOP: i32 = 490;
const ARROW_HEIGHT: i32 = 10;

pub const THUMB_COLOR: Rgb = Rgb::new(205, 205, 205);
const ARROW_COLOR: Rgb = Rgb::new(96, 96, 96);
const TRACK_COLOR: Rgb = Rgb::new(240, 240, 240);
const BACKGROUND: Rgb = Rgb::new(255, 255, 255);

const MAIN_ID: u64 = 1;

pub fn selection_match() -> Match {
    Match::new(SELECTION.x, SELECTION.y, SELECTION.width, SELECTION.height, 0.97)
}

#[derive(Debug, Clone)]
pub struct FakeWindow {
    pub handle: WindowHandle,
    pub bounds: Rect,
    pub valid: bool,
}

/// Everything the fake screen shows, plus knobs for misbehaviour
#[derive(Debug)]
pub struct Model {
    pub selection_visible: bool,
    /// Consumed one per selection locate before falling back to `selection_visible`
    pub selection_script: VecDeque<Option<Match>>,
    /// 1-based document currently highlighted
    pub document: usize,
    /// Documents whose selection border never renders
    pub selection_missing_for: Vec<usize>,

    pub thumb_visible: bool,
    pub thumb_y: i32,
    /// Thumb travel per navigation Down; 0 freezes it, negative reverses it
    pub thumb_step: i32,
    /// Consumed one per capture, overriding `thumb_y` for that capture only
    pub thumb_script: VecDeque<i32>,
    /// 1-based capture numbers that fail with a platform error
    pub failing_captures: Vec<usize>,
    pub captures: usize,

    pub menu_open: bool,
    pub menu_highlighted: bool,
    pub menu_missing_for: Vec<usize>,
    pub save_dialog_open: bool,
    pub typed_path: Option<String>,
    pub clipboard: String,
    pub saved: Vec<String>,

    pub popup: Option<Point>,
    /// Keys do not close the popup
    pub popup_sticky: bool,
    pub popup_on_right_click: Option<usize>,
    pub popup_on_navigation: Option<usize>,
    pub popup_on_window_open: bool,

    pub right_clicks: usize,
    pub navigation_downs: usize,
    pub cancel_on_save: Option<(usize, CancellationSignal)>,

    pub windows: HashMap<u64, FakeWindow>,
    next_window_id: u64,
    pub focused: Option<u64>,
    pub invalid_after_focus: Vec<String>,
    pub block_update_window: bool,
    pub dropdown_open: bool,
    pub typed_text: String,
    pub printer_selected: Option<String>,

    pub events: Vec<String>,
}

impl Default for Model {
    fn default() -> Self {
        let mut windows = HashMap::new();
        windows.insert(
            MAIN_ID,
            FakeWindow {
                handle: WindowHandle::new(MAIN_ID, MAIN_TITLE),
                bounds: WINDOW,
                valid: true,
            },
        );
        Self {
            selection_visible: true,
            selection_script: VecDeque::new(),
            document: 1,
            selection_missing_for: Vec::new(),
            thumb_visible: true,
            thumb_y: THUMB_START,
            thumb_step: THUMB_STEP,
            thumb_script: VecDeque::new(),
            failing_captures: Vec::new(),
            captures: 0,
            menu_open: false,
            menu_highlighted: false,
            menu_missing_for: Vec::new(),
            save_dialog_open: false,
            typed_path: None,
            clipboard: String::new(),
            saved: Vec::new(),
            popup: None,
            popup_sticky: false,
            popup_on_right_click: None,
            popup_on_navigation: None,
            popup_on_window_open: false,
            right_clicks: 0,
            navigation_downs: 0,
            cancel_on_save: None,
            windows,
            next_window_id: MAIN_ID + 1,
            focused: Some(MAIN_ID),
            invalid_after_focus: Vec::new(),
            block_update_window: false,
            dropdown_open: false,
            typed_text: String::new(),
            printer_selected: None,
            events: Vec::new(),
        }
    }
}

impl Model {
    fn log(&mut self, event: impl Into<String>) {
        self.events.push(event.into());
    }

    fn show_popup(&mut self) {
        self.popup = Some(POPUP_INSIDE);
        self.log("popup shown");
    }

    pub fn open_window(&mut self, title: &str, bounds: Rect) {
        let id = self.next_window_id;
        self.next_window_id += 1;
        self.windows.insert(
            id,
            FakeWindow {
                handle: WindowHandle::new(id, title),
                bounds,
                valid: true,
            },
        );
        self.log(format!("opened {title}"));
        if self.popup_on_window_open {
            self.popup_on_window_open = false;
            self.show_popup();
        }
    }

    fn window_open(&self, title: &str) -> Option<&FakeWindow> {
        self.windows
            .values()
            .find(|w| w.valid && w.handle.title == title)
    }

    fn close_window(&mut self, title: &str) {
        self.windows.retain(|_, w| w.handle.title != title);
        self.log(format!("closed {title}"));
    }

    pub fn open_window_titles(&self) -> Vec<String> {
        let mut titles: Vec<String> = self
            .windows
            .values()
            .filter(|w| w.valid)
            .map(|w| w.handle.title.clone())
            .collect();
        titles.sort();
        titles
    }

    pub fn focused_title(&self) -> Option<String> {
        self.focused
            .and_then(|id| self.windows.get(&id))
            .map(|w| w.handle.title.clone())
    }

    pub fn count(&self, event: &str) -> usize {
        self.events.iter().filter(|e| e.as_str() == event).count()
    }

    fn pixel(&self, x: i32, y: i32, thumb_y: i32) -> Rgb {
        if !(STRIP_X..STRIP_X + STRIP_WIDTH).contains(&x) {
            return BACKGROUND;
        }
        if (ARROW_TOP..ARROW_TOP + ARROW_HEIGHT).contains(&y) {
            ARROW_COLOR
        } else if self.thumb_visible && (thumb_y..thumb_y + THUMB_HEIGHT).contains(&y) {
            THUMB_COLOR
        } else {
            TRACK_COLOR
        }
    }

    fn find(&mut self, pattern: &str) -> Option<Match> {
        let at = |r: Rect| Some(Match::new(r.x, r.y, r.width, r.height, 0.95));
        match pattern {
            "selection_border" => match self.selection_script.pop_front() {
                Some(scripted) => scripted,
                None if self.selection_visible
                    && !self.selection_missing_for.contains(&self.document) =>
                {
                    Some(selection_match())
                }
                None => None,
            },
            "print_menu_item" if self.menu_open && self.popup.is_none() => at(MENU_ITEM),
            "save_dialog_title" if self.save_dialog_open => at(SAVE_DIALOG),
            "popup" => self.popup.map(|p| Match::new(p.x, p.y, 80, 40, 0.96)),
            "printer_settings_button" if self.window_open(UPDATE_TITLE).is_some() => {
                at(SETTINGS_BUTTON)
            }
            "dropdown_arrow" if self.window_open(SETTINGS_TITLE).is_some() => at(DROPDOWN_ARROW),
            "ok_button" if self.window_open(SETTINGS_TITLE).is_some() => at(OK_BUTTON),
            _ => None,
        }
    }

    fn press(&mut self, stroke: KeyStroke) {
        match (stroke.key, stroke.ctrl) {
            (Key::Escape, _) => {
                self.log("key Escape");
                if self.popup.is_some() {
                    if !self.popup_sticky {
                        self.popup = None;
                        self.log("popup dismissed");
                    }
                } else if self.dropdown_open {
                    self.dropdown_open = false;
                } else if self.save_dialog_open {
                    self.save_dialog_open = false;
                    self.log("save dialog cancelled");
                } else if self.menu_open {
                    self.menu_open = false;
                    self.log("menu closed");
                }
            }
            (Key::Enter, _) => {
                self.log("key Enter");
                if self.popup.is_some() {
                    if !self.popup_sticky {
                        self.popup = None;
                        self.log("popup dismissed");
                    }
                } else if self.menu_open && self.menu_highlighted {
                    self.menu_open = false;
                    if !self.block_update_window {
                        self.open_window(UPDATE_TITLE, UPDATE_BOUNDS);
                    }
                } else if self.dropdown_open {
                    self.dropdown_open = false;
                    self.printer_selected = Some(self.typed_text.clone());
                } else if self.save_dialog_open {
                    if let Some(path) = self.typed_path.take() {
                        self.save_dialog_open = false;
                        self.log(format!("saved {path}"));
                        self.saved.push(path);
                        if let Some((document, signal)) = &self.cancel_on_save {
                            if *document == self.document {
                                signal.set();
                            }
                        }
                    }
                }
            }
            (Key::Down, _) => {
                self.log("key Down");
                if self.menu_open {
                    self.menu_highlighted = true;
                    return;
                }
                self.navigation_downs += 1;
                self.document += 1;
                self.thumb_y += self.thumb_step;
                if self.popup_on_navigation == Some(self.navigation_downs) {
                    self.show_popup();
                }
            }
            (Key::Char(c), true) => {
                self.log(format!("key Ctrl+{c}"));
                if c == 'v' && self.save_dialog_open {
                    self.typed_path = Some(self.clipboard.clone());
                }
            }
            (key, _) => self.log(format!("key {key:?}")),
        }
    }

    fn click(&mut self, point: Point, button: MouseButton) {
        match button {
            MouseButton::Right => {
                self.right_clicks += 1;
                self.log("right click");
                if self.popup_on_right_click == Some(self.right_clicks) {
                    self.show_popup();
                }
                if SELECTION.contains(point) && !self.menu_missing_for.contains(&self.document) {
                    self.menu_open = true;
                    self.menu_highlighted = false;
                }
            }
            MouseButton::Left => {
                self.log("left click");
                if self.menu_open && MENU_ITEM.contains(point) {
                    self.menu_open = false;
                    self.save_dialog_open = true;
                    self.typed_path = None;
                } else if self.window_open(UPDATE_TITLE).is_some()
                    && self.window_open(SETTINGS_TITLE).is_none()
                    && SETTINGS_BUTTON.contains(point)
                {
                    self.open_window(SETTINGS_TITLE, SETTINGS_BOUNDS);
                } else if self.window_open(SETTINGS_TITLE).is_some() && DROPDOWN_ARROW.contains(point) {
                    self.dropdown_open = true;
                } else if self.window_open(SETTINGS_TITLE).is_some() && OK_BUTTON.contains(point) {
                    self.close_window(SETTINGS_TITLE);
                }
            }
        }
    }
}

pub struct FakeDesktop {
    model: Mutex<Model>,
}

impl FakeDesktop {
    pub fn new() -> Arc<Self> {
        Self::with_model(Model::default())
    }

    pub fn with_model(model: Model) -> Arc<Self> {
        Arc::new(Self {
            model: Mutex::new(model),
        })
    }

    /// Inspect or adjust the model
    pub fn with<R>(&self, f: impl FnOnce(&mut Model) -> R) -> R {
        f(&mut self.model.lock().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn ports(self: &Arc<Self>) -> Ports {
        let vision: Arc<dyn VisionPort> = self.clone();
        let clipboard: Arc<dyn ClipboardPort> = self.clone();
        let windows: Arc<dyn WindowHost> = self.clone();
        Ports::new(vision, clipboard, windows)
    }

    pub fn main_handle() -> WindowHandle {
        WindowHandle::new(MAIN_ID, MAIN_TITLE)
    }
}

#[async_trait::async_trait]
impl ElementLocator for FakeDesktop {
    async fn locate(
        &self,
        pattern: &PatternId,
        region: Rect,
        _min_similarity: f64,
    ) -> Result<Option<Match>, AutomationError> {
        let found = self.with(|m| m.find(pattern.as_str()));
        Ok(found.filter(|m| region.contains(m.position())))
    }
}

#[async_trait::async_trait]
impl PixelSampler for FakeDesktop {
    async fn sample_colors(&self, rect: Rect) -> Result<PixelGrid, AutomationError> {
        if rect.is_empty() {
            return Err(AutomationError::InvalidArgument(format!("empty capture {rect}")));
        }
        self.with(|m| {
            m.captures += 1;
            if m.failing_captures.contains(&m.captures) {
                return Err(AutomationError::PlatformError(format!(
                    "transient capture failure #{}",
                    m.captures
                )));
            }
            let thumb_y = m.thumb_script.pop_front().unwrap_or(m.thumb_y);
            Ok(PixelGrid::from_fn(rect.width as u32, rect.height as u32, |x, y| {
                m.pixel(rect.x + x as i32, rect.y + y as i32, thumb_y)
            }))
        })
    }
}

#[async_trait::async_trait]
impl InputInjector for FakeDesktop {
    async fn inject_key(&self, key: KeyStroke) -> Result<(), AutomationError> {
        self.with(|m| m.press(key));
        Ok(())
    }

    async fn inject_click(&self, point: Point, button: MouseButton) -> Result<(), AutomationError> {
        self.with(|m| m.click(point, button));
        Ok(())
    }

    async fn inject_text(&self, text: &str) -> Result<(), AutomationError> {
        self.with(|m| {
            m.log(format!("typed {text}"));
            m.typed_text = text.to_string();
        });
        Ok(())
    }
}

#[async_trait::async_trait]
impl ClipboardPort for FakeDesktop {
    async fn set_content(&self, text: &str) -> Result<(), AutomationError> {
        self.with(|m| m.clipboard = text.to_string());
        Ok(())
    }
}

#[async_trait::async_trait]
impl WindowHost for FakeDesktop {
    async fn find_window(&self, title: &str) -> Result<Option<WindowHandle>, AutomationError> {
        Ok(self.with(|m| {
            m.windows
                .values()
                .find(|w| w.valid && w.handle.title.starts_with(title))
                .map(|w| w.handle.clone())
        }))
    }

    async fn focus_window(&self, window: &WindowHandle) -> Result<(), AutomationError> {
        self.with(|m| {
            if !m.windows.contains_key(&window.id) {
                return Err(AutomationError::PlatformError(format!(
                    "no window {}",
                    window.title
                )));
            }
            m.focused = Some(window.id);
            m.log(format!("focus {}", window.title));
            if m.invalid_after_focus.contains(&window.title) {
                if let Some(w) = m.windows.get_mut(&window.id) {
                    w.valid = false;
                }
            }
            Ok(())
        })
    }

    async fn is_window_valid(&self, window: &WindowHandle) -> Result<bool, AutomationError> {
        Ok(self.with(|m| m.windows.get(&window.id).is_some_and(|w| w.valid)))
    }

    async fn send_key(&self, window: &WindowHandle, key: KeyStroke) -> Result<(), AutomationError> {
        self.with(|m| {
            if !m.windows.contains_key(&window.id) {
                return Err(AutomationError::PlatformError(format!(
                    "no window {}",
                    window.title
                )));
            }
            m.log(format!("{:?} to {}", key.key, window.title));
            if key.key == Key::Escape && window.id != MAIN_ID {
                m.close_window(&window.title);
            }
            Ok(())
        })
    }

    async fn window_bounds(&self, window: &WindowHandle) -> Result<Rect, AutomationError> {
        self.with(|m| {
            m.windows
                .get(&window.id)
                .map(|w| w.bounds)
                .ok_or_else(|| AutomationError::ElementNotFound(window.title.clone()))
        })
    }
}

pub fn regions(config: &EngineConfig) -> SearchRegions {
    SearchRegions::new(WINDOW, config)
}

pub fn window_manager(desktop: &Arc<FakeDesktop>, config: &EngineConfig) -> Arc<WindowStateManager> {
    let host: Arc<dyn WindowHost> = desktop.clone();
    Arc::new(WindowStateManager::new(host, FakeDesktop::main_handle(), config))
}
