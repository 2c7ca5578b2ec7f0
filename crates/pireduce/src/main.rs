//! pireduce: partitioned reduction of the Leibniz series.

use std::process::ExitCode;

use pireduce_cli::ui::print_error;
use pireduce_lib::{app, config, errors};

fn main() -> ExitCode {
    let config = config::AppConfig::parse();

    // Logs go to stderr; worker modes use stdout for data.
    let default_level = if config.verbose { "info" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match app::run(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            print_error(&format!("{err:#}"));
            ExitCode::from(u8::try_from(errors::exit_code(&err)).unwrap_or(1))
        }
    }
}
