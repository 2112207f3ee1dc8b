// GUI-subsystem binary: no console window is ever allocated by Windows.
#![windows_subsystem = "windows"]

use eframe::egui;
use mattefe::app::MatteFEApp;
use mattefe::{log_info, logger};

fn main() -> Result<(), eframe::Error> {
    // Initialize session log (overwrites previous session log)
    logger::init();
    log_info!("MatteFE starting");

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1280.0, 800.0])
            .with_min_inner_size([900.0, 600.0])
            .with_title("MatteFE"),
        ..Default::default()
    };

    eframe::run_native(
        "MatteFE",
        options,
        Box::new(|cc| Box::new(MatteFEApp::new(cc))),
    )
}
