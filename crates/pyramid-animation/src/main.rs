use std::process::ExitCode;

use pyramid_animation::config::{self, PyramidConfig};
use pyramid_animation::app::report_failure;
use pyramid_animation::PyramidApp;
use pyramid_engine::logging::{init_logging, LoggingConfig};
use pyramid_engine::window::Runtime;

fn main() -> ExitCode {
    init_logging(LoggingConfig::default());

    let app = PyramidApp::new(PyramidConfig::default());

    match Runtime::run(config::runtime_config(), config::gpu_init(), app) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report_failure(&err);
            ExitCode::FAILURE
        }
    }
}
