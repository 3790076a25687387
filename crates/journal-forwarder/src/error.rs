// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::path::PathBuf;

use crate::config::ConfigError;
use crate::journal::JournalError;
use crate::writer::WriteError;

/// Failures that stop the forwarder. Anything recoverable is handled inside the
/// pipeline and never surfaces here.
#[derive(Debug, thiserror::Error)]
pub enum ForwarderError {
    #[error("error reading config: {0}")]
    Config(#[from] ConfigError),

    #[error("error opening journal: {0}")]
    JournalOpen(#[source] JournalError),

    #[error("unable to seek to first item in journal")]
    EmptyJournal,

    #[error("unable to seek to first item in journal: {0}")]
    FirstEntry(#[source] JournalError),

    #[error("unable to retrieve boot id: {0}")]
    BootId(#[source] JournalError),

    #[error("journal error: {0}")]
    Journal(#[from] JournalError),

    #[error("failed to open {}: {source}", path.display())]
    CheckpointOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write state: {0}")]
    CheckpointWrite(#[source] std::io::Error),

    #[error("error initializing writer: {0}")]
    WriterInit(#[source] WriteError),

    #[error("failed to write batch: {0}")]
    Write(#[from] WriteError),

    #[error("pipeline task failed: {0}")]
    Task(String),
}
