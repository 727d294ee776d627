// ============================================================================
// main.rs — shader-fluid
// Entry point. Initializes logging, parses flags, and starts either the
// event loop or a headless run.
// ============================================================================

mod app;
mod codec;
mod config;
mod error;
mod headless;
mod input;
mod pipeline;
mod renderer;
mod shader;
mod simulation;
mod state_io;
mod texture;
mod world;

use std::process::ExitCode;

use app::App;
use config::{AppConfig, USAGE};
use error::SimError;
use headless::HeadlessConfig;
use winit::event_loop::EventLoop;

fn main() -> ExitCode {
    env_logger::init();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{err}\n\n{USAGE}");
            return ExitCode::from(2);
        }
    };
    if config.show_help {
        println!("{USAGE}");
        return ExitCode::SUCCESS;
    }

    match run(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn run(config: &AppConfig) -> Result<(), SimError> {
    if let Some(frames) = config.headless_frames {
        return headless::run_headless(&HeadlessConfig {
            variant: config.variant,
            frames,
            export_path: config.export_path.clone(),
            progress_interval: 600,
        });
    }

    let event_loop = EventLoop::new()?;
    let mut app = App::new(config.variant);
    event_loop.run_app(&mut app)?;

    match app.take_error() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
