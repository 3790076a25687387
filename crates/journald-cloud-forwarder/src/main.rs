// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

use std::fmt::Display;
use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{CommandFactory, Parser};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use journal_forwarder::{
    checkpoint::CheckpointFile,
    config::Config,
    filter::add_log_filters,
    forwarder::{forward, PipelineSettings},
    journal::export::ExportJournal,
    reader::ReaderConfig,
    writer::{HttpBatchWriter, HttpWriterConfig},
    ForwarderError,
};

#[derive(Parser)]
#[command(
    name = "journald-cloud-forwarder",
    version,
    about = "Forwards the systemd journal to a batched log ingestion service"
)]
struct Cli {
    /// Path of the TOML configuration file
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let Some(config_path) = cli.config else {
        let _ = Cli::command().print_help();
        return ExitCode::from(1);
    };

    let config = match Config::load(&config_path) {
        Ok(config) => config,
        Err(e) => return report_failure(&mut std::io::stderr(), ForwarderError::from(e)),
    };

    if let Err(e) = init_logging(&config.log_level) {
        return report_failure(&mut std::io::stderr(), e);
    }
    debug!("Logging subsystem enabled");

    match run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => report_failure(&mut std::io::stderr(), e),
    }
}

/// Writes `e` to `out` as a single line and returns the failure exit code.
fn report_failure(out: &mut impl Write, e: impl Display) -> ExitCode {
    let _ = writeln!(out, "{e}");
    ExitCode::from(2)
}

/// Logs go to stderr so they never end up back in the journal being forwarded.
fn init_logging(log_level: &str) -> Result<(), String> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(format!("h2=off,hyper=off,rustls=off,{log_level}")))
        .map_err(|e| format!("could not parse log level in configuration: {e}"))?;

    let subscriber = tracing_subscriber::fmt::Subscriber::builder()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_level(true)
        .with_thread_names(false)
        .with_thread_ids(false)
        .with_line_number(false)
        .with_file(false)
        .with_target(true)
        .without_time()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| format!("setting default subscriber failed: {e}"))
}

async fn run(config: Config) -> Result<(), ForwarderError> {
    let mut checkpoint_file =
        CheckpointFile::open(&config.state_file).map_err(|source| ForwarderError::CheckpointOpen {
            path: config.state_file.clone(),
            source,
        })?;
    let stored = checkpoint_file.read();

    let mut journal =
        ExportJournal::spawn(config.journal_dir.as_deref()).map_err(ForwarderError::JournalOpen)?;
    let filtered = add_log_filters(&mut journal, config.log_priority, &config.log_unit)?;
    if filtered {
        info!(
            "Filtering journal by priority {} and units '{}'",
            config.log_priority, config.log_unit
        );
    }

    let log_stream = config.log_stream().unwrap_or_default().to_string();
    let mut writer_config =
        HttpWriterConfig::new(config.endpoint.clone(), config.log_group.clone(), log_stream);
    writer_config.api_key.clone_from(&config.api_key);
    let writer =
        HttpBatchWriter::new(writer_config, stored.sequence_token).map_err(ForwarderError::WriterInit)?;

    let settings = PipelineSettings {
        reader: ReaderConfig {
            instance_id: config.instance_id.clone(),
            ..Default::default()
        },
        max_batch_size: config.buffer_size,
        ..Default::default()
    };

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_signal(cancel.clone()));

    let checkpoint = forward(journal, checkpoint_file, writer, filtered, settings, cancel).await?;
    info!(
        "Stopped at boot {} entry {}",
        checkpoint.boot_id, checkpoint.last_entry_time_micros
    );
    Ok(())
}

async fn cancel_on_signal(cancel: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(e) => {
                error!("Failed to register SIGTERM handler: {e}");
                wait_for_ctrl_c().await;
                cancel.cancel();
                return;
            }
        };
        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
            () = wait_for_ctrl_c() => info!("Received interrupt, shutting down"),
            () = cancel.cancelled() => return,
        }
    }
    #[cfg(not(unix))]
    {
        tokio::select! {
            () = wait_for_ctrl_c() => info!("Received interrupt, shutting down"),
            () = cancel.cancelled() => return,
        }
    }
    cancel.cancel();
}

async fn wait_for_ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for interrupt: {e}");
        std::future::pending::<()>().await;
    }
}
