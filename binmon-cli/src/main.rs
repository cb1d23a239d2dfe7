mod cli;
mod config;
mod error;

use std::fs;
use std::process;

use bytes::Bytes;
use clap::Parser;
use monitor::{FilterSet, RunCoordinator};
use notify::Dispatcher;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::Args;
use crate::error::AppError;

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let _guard = init_logging(&args);

    if let Err(e) = run(args).await {
        error!("{e}");
        // also printed, for non-interactive callers scraping stdout
        println!("{e}");
        info!("done");
        process::exit(1);
    }
    info!("done");
}

/// Console output is only attached with `--debug`; the rolling file log
/// is always on, one file per day under the log directory.
fn init_logging(args: &Args) -> tracing_appender::non_blocking::WorkerGuard {
    let file_appender = tracing_appender::rolling::daily(&args.log_dir, "binmon.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let filter = if args.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(file_writer).with_ansi(false))
        .with(args.debug.then(|| fmt::layer()))
        .init();

    guard
}

async fn run(args: Args) -> Result<(), AppError> {
    info!(version = env!("CARGO_PKG_VERSION"), "binmon starting");

    let resolved = config::load(&args.config)?;
    let filters = FilterSet::compile(&resolved.whitelist, &resolved.blacklist)?;
    let channels = notify::build_channels(resolved.gateway, resolved.sms, resolved.call)?;
    let dispatcher = Dispatcher::new(channels)?;
    let coordinator = RunCoordinator::new(
        resolved.layout,
        resolved.epoch,
        filters,
        resolved.cache,
        resolved.lock,
    );

    info!(path = %args.file.display(), "reading file");
    let buffer = fs::read(&args.file).map_err(|source| AppError::ReadLog {
        path: args.file.clone(),
        source,
    })?;

    let report = coordinator
        .run(Bytes::from(buffer), &dispatcher, args.dry_run)
        .await?;
    info!(
        decoded = report.decoded,
        admitted = report.admitted,
        fresh = report.fresh,
        committed = report.watermark_committed,
        "run complete"
    );
    Ok(())
}
