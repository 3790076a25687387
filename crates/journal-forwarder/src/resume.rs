// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Startup positioning of the journal cursor.
//!
//! On every start the forwarder compares the boot id of the first journal
//! entry with the one in the checkpoint:
//!
//! - **Fresh boot**: the ids differ (or nothing was stored). Forward the whole
//!   journal from its first entry.
//! - **Same boot**: the process was restarted. Continue near where delivery
//!   stopped, using one of two [`SameBootStrategy`]s:
//!   - [`SameBootStrategy::TailSeek`] jumps to the end of the journal. Entries
//!     written while the forwarder was down are skipped.
//!   - [`SameBootStrategy::ReplayScan`] walks forward to the first entry newer
//!     than the checkpoint. Needed once filters are installed, because the
//!     cursor does not honor the tail then.
//!
//! The resulting position is persisted before any delivery starts so an
//! immediate restart does not rescan.

use tracing::{debug, info};

use crate::checkpoint::{Checkpoint, CheckpointFile};
use crate::constants::BOOT_ID_FIELD;
use crate::error::ForwarderError;
use crate::journal::{JournalCursor, JournalError};

/// How to continue reading within the boot recorded in the checkpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameBootStrategy {
    TailSeek,
    ReplayScan,
}

impl SameBootStrategy {
    /// Tail seeking is unreliable with filters installed.
    #[must_use]
    pub fn for_filters(filtered: bool) -> Self {
        if filtered {
            SameBootStrategy::ReplayScan
        } else {
            SameBootStrategy::TailSeek
        }
    }

    /// Positions `cursor` for a restart within the same boot. `last_entry_time`
    /// is the timestamp of the last delivered entry.
    pub fn position<C: JournalCursor + ?Sized>(
        self,
        cursor: &mut C,
        last_entry_time: u64,
    ) -> Result<Position, JournalError> {
        match self {
            SameBootStrategy::TailSeek => tail_seek(cursor, last_entry_time),
            SameBootStrategy::ReplayScan => replay_scan(cursor, last_entry_time),
        }
    }
}

/// The three-way startup decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeDecision {
    FreshBoot,
    SameBoot(SameBootStrategy),
}

impl ResumeDecision {
    #[must_use]
    pub fn decide(current_boot_id: &str, checkpoint: &Checkpoint, filtered: bool) -> Self {
        if checkpoint.boot_id.is_empty() || checkpoint.boot_id != current_boot_id {
            ResumeDecision::FreshBoot
        } else {
            ResumeDecision::SameBoot(SameBootStrategy::for_filters(filtered))
        }
    }
}

/// Where a strategy left the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Position {
    /// The cursor rests on an entry that has not been forwarded yet and must
    /// be read before advancing.
    pub on_entry: bool,
    pub last_entry_time: u64,
}

/// Result of [`resume`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumeOutcome {
    pub decision: ResumeDecision,
    /// The checkpoint persisted before delivery starts.
    pub checkpoint: Checkpoint,
    pub on_entry: bool,
}

fn tail_seek<C: JournalCursor + ?Sized>(
    cursor: &mut C,
    last_entry_time: u64,
) -> Result<Position, JournalError> {
    cursor.seek_tail()?;
    let advanced = cursor.next()?;
    Ok(Position {
        on_entry: advanced > 0,
        last_entry_time,
    })
}

fn replay_scan<C: JournalCursor + ?Sized>(
    cursor: &mut C,
    last_entry_time: u64,
) -> Result<Position, JournalError> {
    cursor.seek_tail()?;

    let mut latest = None;
    let mut entry = match cursor.current_entry() {
        Ok(entry) => Some(entry),
        Err(JournalError::NoCurrentEntry) => None,
        Err(e) => return Err(e),
    };
    loop {
        if let Some(entry) = entry.take() {
            let ts = entry.realtime_timestamp;
            if ts > last_entry_time {
                debug!("Replay scan stopped at entry {ts}, after {last_entry_time}");
                return Ok(Position {
                    on_entry: true,
                    last_entry_time: ts,
                });
            }
            latest = Some(ts);
        }
        if cursor.next()? == 0 {
            break;
        }
        entry = Some(cursor.current_entry()?);
    }

    debug!("Replay scan found nothing after {last_entry_time}");
    Ok(Position {
        on_entry: false,
        last_entry_time: latest.unwrap_or(last_entry_time),
    })
}

/// Positions `cursor` for delivery and persists the resulting checkpoint.
///
/// `filtered` tells whether journal filters are installed. Every failure is
/// fatal: retries belong to the reader, not to startup.
pub fn resume<C: JournalCursor + ?Sized>(
    cursor: &mut C,
    checkpoint_file: &mut CheckpointFile,
    filtered: bool,
) -> Result<ResumeOutcome, ForwarderError> {
    let stored = checkpoint_file.read();

    match cursor.next() {
        Ok(0) => return Err(ForwarderError::EmptyJournal),
        Ok(_) => {}
        Err(e) => return Err(ForwarderError::FirstEntry(e)),
    }

    let boot_id = cursor
        .get_field(BOOT_ID_FIELD)
        .map_err(ForwarderError::BootId)?;
    let boot_id = String::from_utf8_lossy(&boot_id).into_owned();

    let decision = ResumeDecision::decide(&boot_id, &stored, filtered);
    let position = match decision {
        ResumeDecision::FreshBoot => {
            info!("New boot {boot_id}, forwarding from the start of the journal");
            Position {
                on_entry: true,
                last_entry_time: 0,
            }
        }
        ResumeDecision::SameBoot(strategy) => {
            info!("Resuming boot {boot_id} with {strategy:?}");
            strategy.position(cursor, stored.last_entry_time_micros)?
        }
    };

    let checkpoint = Checkpoint {
        boot_id,
        sequence_token: stored.sequence_token,
        last_entry_time_micros: position.last_entry_time,
    };
    checkpoint_file
        .write(&checkpoint)
        .map_err(ForwarderError::CheckpointWrite)?;

    Ok(ResumeOutcome {
        decision,
        checkpoint,
        on_entry: position.on_entry,
    })
}
