// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Mock batch writers

use std::time::Duration;

use journal_forwarder::record::Record;
use journal_forwarder::writer::{BatchWriter, WriteError, WriteReceipt};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Accepts every batch, hands a copy to the test, and numbers the sequence
/// tokens it returns.
pub struct RecordingWriter {
    batches: UnboundedSender<Vec<Record>>,
    writes: u64,
    /// Fail the write with this index (0-based) and every write after it.
    fail_from: Option<u64>,
}

impl RecordingWriter {
    pub fn new() -> (Self, UnboundedReceiver<Vec<Record>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                batches: tx,
                writes: 0,
                fail_from: None,
            },
            rx,
        )
    }

    pub fn failing_from(mut self, index: u64) -> Self {
        self.fail_from = Some(index);
        self
    }
}

#[async_trait::async_trait]
impl BatchWriter for RecordingWriter {
    async fn write_batch(&mut self, batch: &[Record]) -> Result<WriteReceipt, WriteError> {
        if self.fail_from.is_some_and(|index| self.writes >= index) {
            return Err(WriteError::InvalidResponse("destination unavailable".to_string()));
        }
        self.writes += 1;
        let _ = self.batches.send(batch.to_vec());
        Ok(WriteReceipt {
            sequence_token: format!("token-{}", self.writes),
            last_timestamp_micros: batch
                .iter()
                .rev()
                .map(|r| r.timestamp_micros)
                .find(|ts| *ts != 0)
                .unwrap_or(0),
        })
    }
}

/// Waits for the next batch the writer accepted.
pub async fn next_batch(batches: &mut UnboundedReceiver<Vec<Record>>) -> Vec<Record> {
    tokio::time::timeout(Duration::from_secs(10), batches.recv())
        .await
        .expect("timed out waiting for a batch")
        .expect("writer dropped")
}

pub fn messages(batch: &[Record]) -> Vec<String> {
    batch
        .iter()
        .map(|r| String::from_utf8_lossy(&r.message).into_owned())
        .collect()
}
