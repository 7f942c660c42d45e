#![warn(clippy::all, rust_2018_idioms)]
#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")] // hide console window on Windows in release

fn main() -> eframe::Result {
    env_logger::init(); // Log to stderr (if you run with `RUST_LOG=debug`).

    let config = match ink_calc::Config::from_env() {
        Ok(config) => config,
        Err(error) => {
            log::error!("{error}");
            return Err(eframe::Error::AppCreation(Box::new(error)));
        }
    };

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("ink_calc")
            .with_fullscreen(true)
            .with_min_inner_size([400.0, 300.0]),
        ..Default::default()
    };
    eframe::run_native(
        "ink_calc",
        native_options,
        Box::new(move |cc| Ok(Box::new(ink_calc::App::new(cc, &config)?))),
    )
}
