// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Pipeline orchestration.
//!
//! [`forward`] resumes the cursor, starts the reader and batcher, and drives
//! [`Forwarder::run`] until the pipeline drains. The checkpoint is persisted
//! after every delivered batch and once more on the way out.

use std::time::Duration;

use tokio::sync::mpsc::{self, Receiver};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::batcher::{Batch, Batcher};
use crate::checkpoint::{Checkpoint, CheckpointFile};
use crate::constants::{
    BATCH_CHANNEL_CAPACITY, DEFAULT_BATCH_SIZE, FLUSH_INTERVAL, RECORD_CHANNEL_CAPACITY,
};
use crate::error::ForwarderError;
use crate::journal::JournalCursor;
use crate::reader::{ReaderConfig, RecordReader};
use crate::resume::resume;
use crate::writer::BatchWriter;

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub reader: ReaderConfig,
    pub max_batch_size: usize,
    pub flush_interval: Duration,
    pub record_channel_capacity: usize,
    pub batch_channel_capacity: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            reader: ReaderConfig::default(),
            max_batch_size: DEFAULT_BATCH_SIZE,
            flush_interval: FLUSH_INTERVAL,
            record_channel_capacity: RECORD_CHANNEL_CAPACITY,
            batch_channel_capacity: BATCH_CHANNEL_CAPACITY,
        }
    }
}

/// Delivers batches and keeps the checkpoint current.
pub struct Forwarder<W> {
    writer: W,
    checkpoint_file: CheckpointFile,
    checkpoint: Checkpoint,
    cancel: CancellationToken,
}

impl<W: BatchWriter> Forwarder<W> {
    #[must_use]
    pub fn new(
        writer: W,
        checkpoint_file: CheckpointFile,
        checkpoint: Checkpoint,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            writer,
            checkpoint_file,
            checkpoint,
            cancel,
        }
    }

    /// Writes every batch until the channel closes. A failed write cancels the
    /// pipeline and ends the loop with that error.
    pub async fn run(mut self, mut batches: Receiver<Batch>) -> Result<Checkpoint, ForwarderError> {
        while let Some(batch) = batches.recv().await {
            let receipt = match self.writer.write_batch(&batch).await {
                Ok(receipt) => receipt,
                Err(e) => {
                    error!("Failed to write batch of {} records: {e}", batch.len());
                    self.cancel.cancel();
                    if let Err(persist_err) = self.persist() {
                        error!("Failed to persist checkpoint: {persist_err}");
                    }
                    return Err(e.into());
                }
            };

            self.checkpoint.sequence_token = receipt.sequence_token;
            if receipt.last_timestamp_micros != 0 {
                self.checkpoint.last_entry_time_micros = receipt.last_timestamp_micros;
            }
            if let Err(e) = self.persist() {
                self.cancel.cancel();
                return Err(e);
            }
        }

        debug!("Batch channel closed, persisting final checkpoint");
        self.persist()?;
        Ok(self.checkpoint)
    }

    fn persist(&mut self) -> Result<(), ForwarderError> {
        self.checkpoint_file
            .write(&self.checkpoint)
            .map_err(ForwarderError::CheckpointWrite)
    }
}

/// Runs the whole pipeline over `cursor` until `cancel` fires, the writer
/// fails, or the journal source closes. `filtered` tells whether journal
/// filters were installed on `cursor`.
///
/// Returns the last persisted checkpoint.
pub async fn forward<C, W>(
    cursor: C,
    checkpoint_file: CheckpointFile,
    writer: W,
    filtered: bool,
    settings: PipelineSettings,
    cancel: CancellationToken,
) -> Result<Checkpoint, ForwarderError>
where
    C: JournalCursor + 'static,
    W: BatchWriter,
{
    let (cursor, checkpoint_file, outcome) = tokio::task::spawn_blocking(move || {
        let mut cursor = cursor;
        let mut checkpoint_file = checkpoint_file;
        let outcome = resume(&mut cursor, &mut checkpoint_file, filtered);
        (cursor, checkpoint_file, outcome)
    })
    .await
    .map_err(|e| ForwarderError::Task(e.to_string()))?;
    let outcome = outcome?;
    info!(
        "Forwarding boot {} from {}",
        outcome.checkpoint.boot_id, outcome.checkpoint.last_entry_time_micros
    );

    let (record_tx, record_rx) = mpsc::channel(settings.record_channel_capacity.max(1));
    let (batch_tx, batch_rx) = mpsc::channel(settings.batch_channel_capacity.max(1));

    let reader =
        RecordReader::new(cursor, settings.reader, record_tx, cancel.clone()).spawn(outcome.on_entry);
    let batcher = Batcher::new(record_rx, batch_tx, settings.max_batch_size)
        .with_flush_interval(settings.flush_interval)
        .spawn();

    let result = Forwarder::new(writer, checkpoint_file, outcome.checkpoint, cancel.clone())
        .run(batch_rx)
        .await;

    // The loop may end on its own when the reader stops; make sure both tasks wind down.
    cancel.cancel();
    let read_result = reader
        .await
        .map_err(|e| ForwarderError::Task(e.to_string()))?;
    batcher
        .await
        .map_err(|e| ForwarderError::Task(e.to_string()))?;

    let checkpoint = result?;
    read_result?;
    info!("Forwarder stopped");
    Ok(checkpoint)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Record;
    use crate::writer::{WriteError, WriteReceipt};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Returns scripted results and records what it was asked to write.
    struct ScriptedWriter {
        results: VecDeque<Result<WriteReceipt, WriteError>>,
        written: Arc<Mutex<Vec<usize>>>,
    }

    #[async_trait]
    impl BatchWriter for ScriptedWriter {
        async fn write_batch(&mut self, batch: &[Record]) -> Result<WriteReceipt, WriteError> {
            self.written.lock().unwrap().push(batch.len());
            self.results
                .pop_front()
                .unwrap_or_else(|| Err(WriteError::InvalidResponse("unscripted".to_string())))
        }
    }

    fn receipt(token: &str, last: u64) -> Result<WriteReceipt, WriteError> {
        Ok(WriteReceipt {
            sequence_token: token.to_string(),
            last_timestamp_micros: last,
        })
    }

    fn start_checkpoint() -> Checkpoint {
        Checkpoint {
            boot_id: "b1".to_string(),
            sequence_token: String::new(),
            last_entry_time_micros: 5,
        }
    }

    fn batch(n: usize) -> Batch {
        (0..n).map(|_| Record::synthetic("m")).collect()
    }

    #[tokio::test]
    async fn test_run_updates_and_persists_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state");
        let written = Arc::new(Mutex::new(Vec::new()));
        let writer = ScriptedWriter {
            results: VecDeque::from([receipt("t1", 10), receipt("t2", 0)]),
            written: Arc::clone(&written),
        };
        let forwarder = Forwarder::new(
            writer,
            CheckpointFile::open(&path).unwrap(),
            start_checkpoint(),
            CancellationToken::new(),
        );

        let (tx, rx) = mpsc::channel(2);
        tx.send(batch(3)).await.unwrap();
        tx.send(batch(1)).await.unwrap();
        drop(tx);

        let checkpoint = forwarder.run(rx).await.unwrap();
        let expected = Checkpoint {
            boot_id: "b1".to_string(),
            sequence_token: "t2".to_string(),
            last_entry_time_micros: 10,
        };
        assert_eq!(checkpoint, expected);
        assert_eq!(*written.lock().unwrap(), vec![3, 1]);
        assert_eq!(CheckpointFile::open(&path).unwrap().read(), expected);
    }

    #[tokio::test]
    async fn test_run_with_no_batches_persists_starting_checkpoint() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state");
        let writer = ScriptedWriter {
            results: VecDeque::new(),
            written: Arc::default(),
        };
        let forwarder = Forwarder::new(
            writer,
            CheckpointFile::open(&path).unwrap(),
            start_checkpoint(),
            CancellationToken::new(),
        );
        let (tx, rx) = mpsc::channel(1);
        drop(tx);
        assert_eq!(forwarder.run(rx).await.unwrap(), start_checkpoint());
        assert_eq!(CheckpointFile::open(&path).unwrap().read(), start_checkpoint());
    }

    #[tokio::test]
    async fn test_write_failure_cancels_pipeline() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state");
        let writer = ScriptedWriter {
            results: VecDeque::from([
                receipt("t1", 10),
                Err(WriteError::InvalidResponse("boom".to_string())),
            ]),
            written: Arc::default(),
        };
        let cancel = CancellationToken::new();
        let forwarder = Forwarder::new(
            writer,
            CheckpointFile::open(&path).unwrap(),
            start_checkpoint(),
            cancel.clone(),
        );

        let (tx, rx) = mpsc::channel(3);
        for _ in 0..3 {
            tx.send(batch(1)).await.unwrap();
        }

        let err = forwarder.run(rx).await.unwrap_err();
        assert!(matches!(err, ForwarderError::Write(WriteError::InvalidResponse(_))));
        assert!(cancel.is_cancelled());
        let stored = CheckpointFile::open(&path).unwrap().read();
        assert_eq!(stored.sequence_token, "t1");
        assert_eq!(stored.last_entry_time_micros, 10);
    }
}
