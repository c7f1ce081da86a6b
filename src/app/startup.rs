//! Binary entry point

use crate::app::cli::Args;
use crate::app::config::AppConfig;
use crate::app::driver::{self, RunSettings};
use crate::app::error::AppError;
use crate::core::error_handling::log_error_with_context;
use crate::core::logging::init_logging;
use crate::core::version::long_version;
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::time::Duration;

/// Parse the command line, run, and return the process exit code
pub async fn startup() -> i32 {
    let args = Args::parse();

    // Logging needs the merged configuration, so errors found while merging
    // are reported once the logger is up.
    let mut config = AppConfig::default();
    let prepared = prepare(&args, &mut config);

    let use_color = config
        .logging
        .color
        .unwrap_or_else(|| std::io::stderr().is_terminal());
    colored::control::set_override(use_color);
    let log_file = config
        .logging
        .file
        .as_ref()
        .map(|path| path.to_string_lossy().into_owned());
    if let Err(e) = init_logging(
        config.logging.level.as_deref(),
        config.logging.format.as_deref(),
        log_file.as_deref(),
        use_color,
    ) {
        eprintln!("correlator: {}", AppError::Logging(e.to_string()));
        return 1;
    }

    log::info!("correlator {}", long_version());
    let config_path = match prepared {
        Ok(path) => path,
        Err(e) => {
            log_error_with_context(&e, "Failed to load configuration");
            return 1;
        }
    };
    match &config_path {
        Some(path) => log::info!("Configuration loaded from {}", path.display()),
        None => log::debug!("No configuration file, using defaults"),
    }

    let settings = RunSettings {
        config,
        input: if args.is_stdin() { None } else { args.input.clone() },
        flush_on_exit: args.flush_on_exit,
        drain: Duration::from_millis(args.drain_ms),
    };
    match driver::run(settings, Box::new(std::io::stdout())).await {
        Ok(summary) => {
            log::info!(
                "Processed {} line(s): {} released, {} discarded, {} rejected",
                summary.lines,
                summary.released,
                summary.statistics.messages_discarded,
                summary.rejected
            );
            log::debug!("Handler statistics: {:?}", summary.statistics);
            0
        }
        Err(e) => {
            log_error_with_context(&e, "Message processing failed");
            1
        }
    }
}

/// Load the configuration file and fold the command line over it
fn prepare(args: &Args, config: &mut AppConfig) -> Result<Option<PathBuf>, AppError> {
    let path = match AppConfig::load(args.config_file.as_deref()) {
        Ok(Some((path, loaded))) => {
            *config = loaded;
            Some(path)
        }
        Ok(None) => None,
        Err(e) => {
            // Still honour the logging options given on the command line
            let _ = args.apply_to(config);
            return Err(e.into());
        }
    };
    args.apply_to(config)?;
    Ok(path)
}
