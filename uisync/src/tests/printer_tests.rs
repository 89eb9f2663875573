use std::sync::Arc;

use super::fakes::{regions, window_manager, FakeDesktop, MAIN_TITLE};
use super::init_tracing;
use crate::cancellation::CancellationSignal;
use crate::config::EngineConfig;
use crate::printer::PrinterConfigurator;
use crate::state::ConfigStage;

fn configurator(desktop: &Arc<FakeDesktop>) -> PrinterConfigurator {
    let config = EngineConfig::default();
    PrinterConfigurator::new(
        desktop.ports(),
        window_manager(desktop, &config),
        regions(&config),
        config,
        CancellationSignal::new(),
    )
}

#[tokio::test(start_paused = true)]
async fn selects_pdf_printer_and_returns_to_main() {
    init_tracing();
    let desktop = FakeDesktop::new();
    let printer = configurator(&desktop);

    assert!(printer.configure_pdf_printer().await);

    assert_eq!(printer.stage(), ConfigStage::PrinterSettings);
    desktop.with(|m| {
        assert_eq!(m.printer_selected.as_deref(), Some("Microsoft Print to PDF"));
        assert_eq!(m.open_window_titles(), vec![MAIN_TITLE.to_string()]);
        assert_eq!(m.focused_title().as_deref(), Some(MAIN_TITLE));
        assert_eq!(m.count("typed Microsoft Print to PDF"), 1);
    });
}

#[tokio::test(start_paused = true)]
async fn missing_update_window_fails_with_main_focused() {
    let desktop = FakeDesktop::new();
    desktop.with(|m| m.block_update_window = true);
    let printer = configurator(&desktop);

    assert!(!printer.configure_pdf_printer().await);

    assert_eq!(printer.stage(), ConfigStage::DocumentUpdate);
    desktop.with(|m| {
        assert_eq!(m.printer_selected, None);
        assert_eq!(m.focused_title().as_deref(), Some(MAIN_TITLE));
    });
}

#[tokio::test(start_paused = true)]
async fn dialog_over_update_window_is_cleared() {
    let desktop = FakeDesktop::new();
    desktop.with(|m| m.popup_on_window_open = true);
    let printer = configurator(&desktop);

    assert!(printer.configure_pdf_printer().await);

    desktop.with(|m| {
        assert_eq!(m.count("popup dismissed"), 1);
        assert_eq!(m.printer_selected.as_deref(), Some("Microsoft Print to PDF"));
        assert_eq!(m.open_window_titles(), vec![MAIN_TITLE.to_string()]);
    });
}

#[tokio::test(start_paused = true)]
async fn missing_document_aborts_before_any_click() {
    let desktop = FakeDesktop::new();
    desktop.with(|m| m.selection_visible = false);
    let printer = configurator(&desktop);

    assert!(!printer.configure_pdf_printer().await);

    assert_eq!(desktop.with(|m| m.right_clicks), 0);
}
