use std::sync::Arc;

use super::fakes::{window_manager, FakeDesktop, MAIN_TITLE, UPDATE_BOUNDS, UPDATE_TITLE, WINDOW};
use crate::config::EngineConfig;
use crate::errors::AutomationError;
use crate::platforms::WindowHost;
use crate::window::WindowStateManager;

#[tokio::test(start_paused = true)]
async fn missing_window_is_not_focused() {
    let desktop = FakeDesktop::new();
    let windows = window_manager(&desktop, &EngineConfig::default());

    assert!(!windows.focus_and_verify(UPDATE_TITLE).await);
    assert_eq!(windows.current(), None);
}

#[tokio::test(start_paused = true)]
async fn focused_window_becomes_current() {
    let desktop = FakeDesktop::new();
    desktop.with(|m| m.open_window(UPDATE_TITLE, UPDATE_BOUNDS));
    let windows = window_manager(&desktop, &EngineConfig::default());

    assert!(windows.focus_and_verify(UPDATE_TITLE).await);

    let current = windows.focused_secondary().expect("secondary window focused");
    assert_eq!(current.title, UPDATE_TITLE);
    assert_eq!(
        desktop.with(|m| m.focused_title()).as_deref(),
        Some(UPDATE_TITLE)
    );
}

#[tokio::test(start_paused = true)]
async fn window_invalid_after_focus_is_rejected() {
    let desktop = FakeDesktop::new();
    desktop.with(|m| {
        m.open_window(UPDATE_TITLE, UPDATE_BOUNDS);
        m.invalid_after_focus.push(UPDATE_TITLE.to_string());
    });
    let windows = window_manager(&desktop, &EngineConfig::default());

    assert!(!windows.focus_and_verify(UPDATE_TITLE).await);
    assert_eq!(windows.focused_secondary(), None);
}

#[tokio::test(start_paused = true)]
async fn cleanup_escapes_secondary_and_returns_to_main() {
    let desktop = FakeDesktop::new();
    desktop.with(|m| m.open_window(UPDATE_TITLE, UPDATE_BOUNDS));
    let windows = window_manager(&desktop, &EngineConfig::default());
    assert!(windows.focus_and_verify(UPDATE_TITLE).await);

    assert!(windows.cleanup().await);

    assert_eq!(windows.current().as_ref(), Some(windows.main_window()));
    desktop.with(|m| {
        assert_eq!(m.open_window_titles(), vec![MAIN_TITLE.to_string()]);
        assert_eq!(m.focused_title().as_deref(), Some(MAIN_TITLE));
    });
}

#[tokio::test(start_paused = true)]
async fn cleanup_on_main_window_sends_nothing() {
    let desktop = FakeDesktop::new();
    let windows = window_manager(&desktop, &EngineConfig::default());

    assert!(!windows.escape_focused_secondary().await);
    assert!(windows.cleanup().await);
    assert_eq!(desktop.with(|m| m.count("Escape to SystmOne GP: Test Surgery")), 0);
}

#[tokio::test(start_paused = true)]
async fn attach_finds_main_window_by_title_prefix() {
    let desktop = FakeDesktop::new();
    let host: Arc<dyn WindowHost> = desktop.clone();

    let windows = WindowStateManager::attach(host, "SystmOne GP", &EngineConfig::default())
        .await
        .unwrap();

    assert_eq!(windows.main_window().title, MAIN_TITLE);
    assert_eq!(
        desktop.window_bounds(windows.main_window()).await.unwrap(),
        WINDOW
    );
}

#[tokio::test(start_paused = true)]
async fn attach_without_main_window_fails() {
    let desktop = FakeDesktop::new();
    let host: Arc<dyn WindowHost> = desktop.clone();

    let result = WindowStateManager::attach(host, "Some Other App", &EngineConfig::default()).await;

    assert!(matches!(result, Err(AutomationError::ElementNotFound(_))));
}
