//! `permscan` binary: permission reports over a tenant inventory

use anyhow::Context;
use clap::ArgMatches;
use permscan_cli::app::{self, AppError, EXIT_RUN};
use permscan_cli::cli;
use permscan_sinks::ConsoleReportSink;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> ExitCode {
    // stdout carries the progress stream; logs go to stderr
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "permscan=info".into()))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    let matches = cli::command().get_matches();

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, cancelling run");
            on_interrupt.cancel();
        }
    });

    let result = match matches.subcommand() {
        Some(("sites", sub)) => sites(sub).await,
        _ => report(&matches, cancel).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let code = e.downcast_ref::<AppError>().map_or(EXIT_RUN, AppError::exit_code);
            tracing::error!(exit_code = code, "{e:#}");
            eprintln!("error: {e:#}");
            ExitCode::from(code)
        }
    }
}

async fn report(matches: &ArgMatches, cancel: CancellationToken) -> anyhow::Result<()> {
    let config = cli::resolve_config(matches).map_err(AppError::from)?;
    let sink = Arc::new(ConsoleReportSink::stdout());

    let report = app::run_report(&config, sink, cancel)
        .await
        .context("permission report failed")?;

    if let Some(dest) = &config.destination {
        println!("Report saved to {} ({} rows)", dest.display(), report.len());
    }
    Ok(())
}

async fn sites(matches: &ArgMatches) -> anyhow::Result<()> {
    let config = cli::resolve_sites_config(matches).map_err(AppError::from)?;
    let listing = app::list_sites(&config)
        .await
        .context("site listing failed")?;
    println!("{}", listing.render());
    Ok(())
}
