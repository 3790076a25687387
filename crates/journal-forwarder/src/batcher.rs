// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Groups records into batches.
//!
//! A batch is cut when it reaches the size limit or when the flush timer
//! fires, whichever comes first. The timer restarts after every flush, so an
//! idle stream produces nothing and a slow one is flushed once per interval.

use std::time::Duration;

use tokio::sync::mpsc::{Receiver, Sender};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

use crate::constants::FLUSH_INTERVAL;
use crate::record::Record;

pub type Batch = Vec<Record>;

pub struct Batcher {
    records: Receiver<Record>,
    batches: Sender<Batch>,
    max_batch_size: usize,
    flush_interval: Duration,
}

impl Batcher {
    /// A `max_batch_size` of 0 is treated as 1.
    #[must_use]
    pub fn new(records: Receiver<Record>, batches: Sender<Batch>, max_batch_size: usize) -> Self {
        Self {
            records,
            batches,
            max_batch_size: max_batch_size.max(1),
            flush_interval: FLUSH_INTERVAL,
        }
    }

    #[must_use]
    pub fn with_flush_interval(mut self, flush_interval: Duration) -> Self {
        self.flush_interval = flush_interval;
        self
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Runs until the record channel closes or the batch receiver goes away.
    /// Records still buffered when the record channel closes go out as a
    /// final batch.
    pub async fn run(mut self) {
        let mut buffer: Batch = Vec::with_capacity(self.max_batch_size);
        let timer = tokio::time::sleep(self.flush_interval);
        tokio::pin!(timer);

        loop {
            tokio::select! {
                record = self.records.recv() => {
                    let Some(record) = record else {
                        debug!("Record channel closed, flushing {} buffered records", buffer.len());
                        self.flush(&mut buffer).await;
                        return;
                    };
                    buffer.push(record);
                    if buffer.len() < self.max_batch_size {
                        continue;
                    }
                }
                () = &mut timer => {}
            }

            if !self.flush(&mut buffer).await {
                debug!("Batch receiver closed, stopping batcher");
                return;
            }
            timer.as_mut().reset(Instant::now() + self.flush_interval);
        }
    }

    /// Sends the buffer if it holds anything. Returns false once the batch
    /// receiver is gone.
    async fn flush(&self, buffer: &mut Batch) -> bool {
        if buffer.is_empty() {
            return true;
        }
        let batch = std::mem::replace(buffer, Vec::with_capacity(self.max_batch_size));
        debug!("Flushing batch of {} records", batch.len());
        self.batches.send(batch).await.is_ok()
    }
}
