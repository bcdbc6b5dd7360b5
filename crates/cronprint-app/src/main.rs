// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// cronprint: scheduled print dispatch over IPP.
//
// Entry point. Initialises logging, loads configuration, registers jobs with
// the scheduler and serves the status API until SIGINT/SIGTERM.

mod dispatch;
mod shutdown;
mod status;

use std::process::ExitCode;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{error, info, warn};

use cronprint_core::AppConfig;
use cronprint_core::error::{CronprintError, Result};
use cronprint_print::{ClientOptions, PrinterClient};
use cronprint_schedule::JobScheduler;

use status::AppState;

#[tokio::main]
async fn main() -> ExitCode {
    let dotenv = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    match dotenv {
        Ok(path) => info!(path = %path.display(), "loaded environment file"),
        Err(e) if e.not_found() => {}
        Err(e) => warn!(error = %e, "ignoring unreadable .env file"),
    }

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(kind = %e.kind(), fatal = e.kind().is_fatal(), error = %e, "cronprint failed to start");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    let config = AppConfig::from_env()?;
    info!(
        printer = %config.printer,
        jobs = config.jobs.len(),
        "cronprint starting"
    );

    let client = Arc::new(PrinterClient::new(
        config.printer.clone(),
        ClientOptions {
            user_name: config.user_name.clone(),
            accept_invalid_certs: config.accept_invalid_certs,
        },
    )?);
    let scheduler = Arc::new(JobScheduler::new(&config.timezone)?);
    info!(timezone = %scheduler.timezone(), "schedules evaluated in local time");

    let registered =
        dispatch::register_jobs(&scheduler, &client, &config.jobs, config.printer_timeout)?;
    if registered == 0 {
        warn!("no jobs scheduled; only the status API is running");
    }

    let addr = config.bind_addr();
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| CronprintError::config(format!("bind status API on {addr}: {e}")))?;
    info!(addr = %addr, "status API listening");

    let cancel = shutdown::install_shutdown_handler();
    let scheduler_task = scheduler.start(cancel.clone());

    let state = AppState {
        printer_uri: client.endpoint().uri.clone(),
        client,
        scheduler,
        timeout: config.printer_timeout,
    };
    if let Err(e) = status::serve(listener, state, cancel.clone(), config.shutdown_grace).await {
        error!(error = %e, "status API failed");
        cancel.cancel();
    }

    if let Err(e) = scheduler_task.await {
        warn!(error = %e, "scheduler task ended abnormally");
    }
    info!("cronprint stopped");
    Ok(())
}
