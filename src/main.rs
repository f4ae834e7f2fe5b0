//! E-paper picture frame
//!
//! Cycles the photos in a directory onto a Waveshare 2.13" e-paper HAT,
//! one every `refresh_interval` seconds, sleeping the panel in between.
//! Without the HAT (or with `--simulate`) frames are written to PNG files
//! instead.
//!
//! ## Usage
//! ```sh
//! sudo ./target/release/picture-frame config/frame_config.toml
//! ./target/release/picture-frame --simulate config/frame_config.toml
//! ```

use clap::Parser;
use epaper_frame::display::DisplayAdapter;
use epaper_frame::frame::{LoopState, PictureFrame};
use epaper_frame::{FrameConfig, logging, setup_signal_handler};
use std::path::PathBuf;
use std::process::ExitCode;

/// E-paper picture frame
#[derive(Parser)]
#[command(name = "picture-frame")]
#[command(about = "Cycle photos from a directory onto an e-paper panel")]
#[command(version)]
struct Args {
    /// Path to the TOML configuration file
    #[arg(default_value = "config/frame_config.toml")]
    config: PathBuf,

    /// Write frames to PNG files instead of driving the panel
    #[arg(long)]
    simulate: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let config = match FrameConfig::load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = logging::init(&config.logging) {
        eprintln!("Error: failed to set up logging: {e}");
        return ExitCode::FAILURE;
    }

    tracing::info!("E-paper picture frame v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Config: {}", args.config.display());
    tracing::info!("Panel: {}x{}", config.display.width, config.display.height);
    tracing::info!("Photos: {}", config.frame.photo_directory.display());
    tracing::info!("Refresh every {}s", config.frame.refresh_interval);

    let display = match DisplayAdapter::from_config(&config, args.simulate) {
        Ok(display) => display,
        Err(e) => {
            tracing::error!("{}", e);
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let running = match setup_signal_handler() {
        Ok(running) => running,
        Err(e) => {
            tracing::error!("Error setting Ctrl-C handler: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let mut frame = PictureFrame::new(&config, display);
    if let Err(e) = frame.initialize() {
        tracing::error!("{}", e);
        frame.cleanup();
        eprintln!("Failed to initialize picture frame: {e}");
        return ExitCode::FAILURE;
    }

    match frame.run(&running) {
        LoopState::Failed => ExitCode::FAILURE,
        _ => ExitCode::SUCCESS,
    }
}
