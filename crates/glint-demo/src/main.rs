mod config;
mod oscillator;
mod quad;

use std::process::ExitCode;

use glint_engine::device::GpuInit;
use glint_engine::logging::{LoggingConfig, init_logging};
use glint_engine::window::{Runtime, RuntimeConfig};

use config::DemoConfig;
use quad::QuadDemo;

fn main() -> ExitCode {
    init_logging(LoggingConfig::default());

    let config = DemoConfig::from_args(std::env::args().skip(1));
    log::info!("shader: {}", config.shader_path.display());

    let runtime = RuntimeConfig {
        title: "glint quad".to_string(),
        ..RuntimeConfig::default()
    };

    match Runtime::run(runtime, GpuInit::default(), QuadDemo::new(config)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}
