// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// printbridge — local print-job relay.
//
// Entry point. Initialises logging and backend services, starts the HTTP
// print server when configured to, logs job events, and runs until Ctrl-C.

mod services;

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use printbridge_print::PrintEvent;
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::MakeWriterExt;

use services::app_services::AppServices;
use services::data_dir;

const LOG_FILE: &str = "print.log";

#[tokio::main]
async fn main() {
    let data_dir = data_dir::data_dir();
    init_logging(&data_dir);

    let services = match AppServices::init(&data_dir) {
        Ok(services) => services,
        Err(e) => {
            tracing::error!(error = %e, "failed to initialise printbridge");
            std::process::exit(1);
        }
    };

    tokio::spawn(log_events(services.subscribe()));

    match services.printers().await {
        Ok(printers) => tracing::info!(count = printers.len(), "printers found"),
        Err(e) => tracing::warn!(error = %e, "cannot list printers"),
    }

    let config = services.config();
    if config.auto_start {
        if let Err(e) = services.start_server(config.port) {
            tracing::error!(port = config.port, error = %e, "print server failed to start");
        }
    }
    tracing::info!(
        port = config.port,
        server_running = services.is_server_running(),
        autostart = services.autostart_enabled(),
        "printbridge started"
    );

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "cannot listen for Ctrl-C");
    }
    services.shutdown().await;
}

/// Write every job notification to the log until the server side goes
/// away.  Returns the number of events logged.
async fn log_events(mut events: broadcast::Receiver<PrintEvent>) -> usize {
    let mut logged = 0;
    loop {
        match events.recv().await {
            Ok(PrintEvent::Received { kind, printer, time, .. }) => {
                tracing::info!(event = "print-received", kind = %kind, printer = %printer, time = %time, "job event");
            }
            Ok(PrintEvent::Success { kind, printer, time }) => {
                tracing::info!(event = "print-success", kind = %kind, printer = %printer, time = %time, "job event");
            }
            Ok(PrintEvent::Error { error, time }) => {
                tracing::warn!(event = "print-error", error = %error, time = %time, "job event");
            }
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                tracing::warn!(missed, "job event log fell behind");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => return logged,
        }
        logged += 1;
    }
}

/// Log to stdout and append to `<data_dir>/logs/print.log`.
///
/// Filtering follows `RUST_LOG`, defaulting to `info`.
fn init_logging(data_dir: &Path) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let log_path = data_dir::data_subdir(data_dir, "logs").join(LOG_FILE);

    match OpenOptions::new().create(true).append(true).open(&log_path) {
        Ok(file) => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(std::io::stdout.and(Mutex::new(file)))
                .init();
        }
        Err(e) => {
            tracing_subscriber::fmt().with_env_filter(filter).init();
            tracing::warn!(path = %log_path.display(), error = %e, "log file unavailable, logging to stdout only");
        }
    }
}
