// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Journal reader task.
//!
//! Cursor calls block, so the reader runs on the blocking pool and hands
//! records to the async side with `blocking_send`. The record channel is
//! bounded, which keeps the reader from racing ahead of delivery.
//!
//! For each entry the reader:
//!
//! 1. turns it into a [`Record`], or into a synthetic error record if the
//!    entry cannot be read,
//! 2. drops it if it is older than the destination accepts,
//! 3. pauses first if it lies more than a batch span after the previous
//!    record, so the batcher's timer cuts the batch in between,
//! 4. emits it and advances, waiting on the journal while nothing is new.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::runtime::Handle;
use tokio::sync::mpsc::Sender;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::constants::{
    JOURNAL_WAIT_TIMEOUT, MAX_BATCH_SPAN, MAX_ENTRY_AGE, PACING_PAUSE, READ_RETRY_BACKOFF,
};
use crate::journal::{JournalCursor, JournalError};
use crate::record::Record;

#[derive(Debug, Clone)]
pub struct ReaderConfig {
    /// Attached to every emitted record.
    pub instance_id: Option<String>,
    pub max_entry_age: Duration,
    /// Largest gap between consecutive records emitted without a pause.
    pub pacing_gap: Duration,
    pub pacing_pause: Duration,
    pub retry_backoff: Duration,
    pub wait_timeout: Duration,
    /// Admissible records consumed without being emitted.
    pub skip: usize,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            instance_id: None,
            max_entry_age: MAX_ENTRY_AGE,
            pacing_gap: MAX_BATCH_SPAN,
            pacing_pause: PACING_PAUSE,
            retry_backoff: READ_RETRY_BACKOFF,
            wait_timeout: JOURNAL_WAIT_TIMEOUT,
            skip: 0,
        }
    }
}

/// Journal timestamps are microseconds since the Unix epoch.
#[must_use]
pub fn micros_to_system_time(micros: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_micros(micros)
}

/// Entries stamped in the future are never too old.
#[must_use]
pub fn is_too_old(timestamp_micros: u64, now: SystemTime, max_age: Duration) -> bool {
    now.duration_since(micros_to_system_time(timestamp_micros))
        .is_ok_and(|age| age > max_age)
}

#[must_use]
pub fn needs_pause(last_emitted: Option<u64>, timestamp_micros: u64, gap: Duration) -> bool {
    last_emitted.is_some_and(|last| {
        Duration::from_micros(timestamp_micros.saturating_sub(last)) > gap
    })
}

/// Reads a positioned cursor and emits records until cancelled.
pub struct RecordReader<C> {
    cursor: C,
    config: ReaderConfig,
    records: Sender<Record>,
    cancel: CancellationToken,
}

/// Why the reader loop stopped early.
enum Stop {
    Cancelled,
    ReceiverGone,
    Failed(JournalError),
}

impl<C: JournalCursor + 'static> RecordReader<C> {
    #[must_use]
    pub fn new(
        cursor: C,
        config: ReaderConfig,
        records: Sender<Record>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            cursor,
            config,
            records,
            cancel,
        }
    }

    /// Starts the reader on the blocking pool. `on_entry` tells whether the
    /// cursor already rests on an entry that must be emitted before advancing.
    ///
    /// The task finishes with an error only when the journal source is gone
    /// for good. The record channel is closed whenever the task ends.
    pub fn spawn(self, on_entry: bool) -> JoinHandle<Result<(), JournalError>> {
        let runtime = Handle::current();
        tokio::task::spawn_blocking(move || self.run(on_entry, &runtime))
    }

    fn run(mut self, on_entry: bool, runtime: &Handle) -> Result<(), JournalError> {
        let result = self.read_loop(on_entry, runtime);
        match result {
            Stop::Cancelled => {
                debug!("Journal reader cancelled");
                Ok(())
            }
            Stop::ReceiverGone => {
                debug!("Record receiver closed, stopping journal reader");
                Ok(())
            }
            Stop::Failed(e) => {
                error!("Journal reader stopped: {e}");
                Err(e)
            }
        }
    }

    fn read_loop(&mut self, on_entry: bool, runtime: &Handle) -> Stop {
        let mut advance = !on_entry;
        let mut last_emitted: Option<u64> = None;
        let mut skip = self.config.skip;

        loop {
            if advance {
                if let Err(stop) = self.advance(runtime) {
                    return stop;
                }
            }
            advance = true;

            if self.cancel.is_cancelled() {
                return Stop::Cancelled;
            }
            let record = match Record::from_cursor(&self.cursor) {
                Ok(record) => record,
                Err(e) => {
                    warn!("Unable to read journal entry: {e}");
                    let report = Record::synthetic(format!("error unmarshalling journal entry: {e}"));
                    if let Err(stop) = self.emit(report) {
                        return stop;
                    }
                    continue;
                }
            };

            let ts = record.timestamp_micros;
            if is_too_old(ts, SystemTime::now(), self.config.max_entry_age) {
                continue;
            }
            if skip > 0 {
                skip -= 1;
                continue;
            }
            if needs_pause(last_emitted, ts, self.config.pacing_gap) {
                debug!("Pausing before entry {ts} to close the current batch");
                if self.sleep(runtime, self.config.pacing_pause) {
                    return Stop::Cancelled;
                }
            }

            last_emitted = Some(ts);
            if let Err(stop) = self.emit(record) {
                return stop;
            }
        }
    }

    /// Moves the cursor to the next entry, waiting and retrying as needed.
    fn advance(&mut self, runtime: &Handle) -> Result<(), Stop> {
        loop {
            if self.cancel.is_cancelled() {
                return Err(Stop::Cancelled);
            }
            let err = match self.cursor.next() {
                Ok(0) => match self.cursor.wait(self.config.wait_timeout) {
                    Ok(()) => continue,
                    Err(e) => e,
                },
                Ok(_) => return Ok(()),
                Err(e) => e,
            };

            if matches!(err, JournalError::SourceClosed) {
                return Err(Stop::Failed(err));
            }
            warn!("Error reading from journal, retrying: {err}");
            self.emit(Record::synthetic(format!("error reading from journal: {err}")))?;
            if self.sleep(runtime, self.config.retry_backoff) {
                return Err(Stop::Cancelled);
            }
        }
    }

    fn emit(&self, mut record: Record) -> Result<(), Stop> {
        if record.instance_id.is_none() {
            record.instance_id.clone_from(&self.config.instance_id);
        }
        self.records
            .blocking_send(record)
            .map_err(|_| Stop::ReceiverGone)
    }

    /// Sleeps for `duration` unless cancelled first. Returns whether the sleep
    /// was cut short by cancellation.
    fn sleep(&self, runtime: &Handle, duration: Duration) -> bool {
        runtime
            .block_on(tokio::time::timeout(duration, self.cancel.cancelled()))
            .is_ok()
    }
}
