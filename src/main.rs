// src/main.rs
#![warn(clippy::all, rust_2018_idioms)]
#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

mod capture;
mod config;
mod edges;
mod overlay;
mod selection;
mod ui;

use config::OverlayConfig;

fn main() -> eframe::Result {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("Starting edge_overlay");

    // Starts as the full-screen translucent selector; becomes the overlay afterwards.
    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("Select Region")
            .with_fullscreen(true)
            .with_decorations(false)
            .with_transparent(true),
        ..Default::default()
    };

    let config = OverlayConfig::default();
    eframe::run_native(
        "edge_overlay",
        native_options,
        Box::new(move |cc| Ok(Box::new(ui::EdgeOverlayApp::new(cc, config)))),
    )
}
