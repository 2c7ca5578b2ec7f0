//! Application entry point and dispatch.

use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info};

use pireduce_cli::completion::generate_completion;
use pireduce_cli::output::write_report;
use pireduce_cli::presenter::CLIResultPresenter;
use pireduce_core::protocol::serve;
use pireduce_core::{
    CommandTransport, LeibnizKernel, ReductionError, Segment, SegmentKernel, WorkerCommand,
};
use pireduce_orchestration::{select_backend, Driver, ResultPresenter, SelectionContext};

use crate::config::AppConfig;

/// Run the application.
///
/// # Errors
///
/// Returns the configuration, reduction, or I/O error that ended the run.
pub fn run(config: &AppConfig) -> Result<()> {
    if let Some(shell) = config.completion {
        let mut cmd = <AppConfig as clap::CommandFactory>::command();
        generate_completion(&mut cmd, shell, &mut io::stdout());
        return Ok(());
    }

    if config.internal {
        return run_internal(config);
    }

    if config.worker {
        return run_worker();
    }

    run_cli(config)
}

/// Evaluate one segment and print the partial with round-trip formatting.
fn run_internal(config: &AppConfig) -> Result<()> {
    let (Some(start), Some(count)) = (config.start, config.count) else {
        return Err(ReductionError::InvalidConfiguration(
            "--internal needs --start and --count".into(),
        )
        .into());
    };
    let segment = Segment::new(start, count);
    let value = LeibnizKernel::new()
        .evaluate(segment)
        .map_err(ReductionError::from)?;
    debug!(%segment, value, "single segment evaluated");

    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{value}")?;
    stdout.flush()?;
    Ok(())
}

/// Serve pool requests on stdin until shutdown or end of input.
fn run_worker() -> Result<()> {
    let mut input = io::stdin().lock();
    let mut output = io::stdout().lock();
    let served = serve(&mut input, &mut output, &LeibnizKernel::new())
        .context("pool worker protocol failure")?;
    debug!(served, "pool worker exiting");
    Ok(())
}

fn run_cli(config: &AppConfig) -> Result<()> {
    let presenter = CLIResultPresenter::new(config.verbose, config.quiet);

    let local = WorkerCommand::current_exe().context("cannot locate the running executable")?;
    let remote = config
        .remote_program
        .clone()
        .map_or_else(|| local.clone(), WorkerCommand::new);
    let context = SelectionContext {
        worker: local.clone(),
        timeout: config.timeout,
        transport: Arc::new(CommandTransport::new(remote, local)),
        queue_capacity: config.queue_capacity(),
    };
    let backend = select_backend(&config.backend_selection(), &context)?;
    info!(
        backend = %backend.kind(),
        iterations = config.iterations,
        seg_size = config.seg_size,
        runs = config.runs,
        "starting"
    );

    let driver = Driver::default();
    if config.runs == 1 {
        let report = driver.run(config.iterations, config.seg_size, &backend)?;
        presenter.present_report(&report);
        if let Some(path) = &config.output {
            write_report(path, &report)
                .with_context(|| format!("cannot write report to {}", path.display()))?;
        }
    } else {
        let stats = driver.run_repeated(config.runs, config.iterations, config.seg_size, &backend)?;
        presenter.present_statistics(&stats);
        if let Some(path) = &config.output {
            write_report(path, &stats)
                .with_context(|| format!("cannot write report to {}", path.display()))?;
        }
    }
    Ok(())
}
