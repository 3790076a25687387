// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Destination limits and pipeline timings.
//!
//! The ingestion service rejects events older than [`MAX_ENTRY_AGE`] and
//! batches whose events span more than [`MAX_BATCH_SPAN`]. The reader enforces
//! both before records ever reach the batcher, since the forwarder never asks
//! the destination for its limits.

use std::time::Duration;

/// Entries older than this, relative to the current wall time, are dropped.
///
/// # Value: 14 days
pub const MAX_ENTRY_AGE: Duration = Duration::from_secs(14 * 24 * 60 * 60);

/// Maximum distance between the first and last event of a single batch.
///
/// # Value: 24 hours
///
/// When two consecutive records are further apart than this, the reader pauses
/// for [`PACING_PAUSE`] so that the batcher's timer closes the earlier batch
/// before the later record arrives.
pub const MAX_BATCH_SPAN: Duration = Duration::from_secs(24 * 60 * 60);

/// Pause inserted by the reader ahead of a record that would stretch a batch
/// past [`MAX_BATCH_SPAN`]. Must exceed [`FLUSH_INTERVAL`].
pub const PACING_PAUSE: Duration = Duration::from_secs(2);

/// Batcher flush period, reset after every flush.
pub const FLUSH_INTERVAL: Duration = Duration::from_secs(1);

/// Backoff after the journal cursor fails to advance.
pub const READ_RETRY_BACKOFF: Duration = Duration::from_secs(2);

/// Upper bound on a single journal wait. Also bounds how long shutdown can
/// take to be noticed by the reader.
pub const JOURNAL_WAIT_TIMEOUT: Duration = Duration::from_secs(2);

/// Default number of records per batch.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Largest batch the ingestion service accepts.
pub const MAX_BATCH_SIZE: usize = 10_000;

/// Capacity of the reader -> batcher channel.
pub const RECORD_CHANNEL_CAPACITY: usize = 1;

/// Capacity of the batcher -> forwarder channel.
pub const BATCH_CHANNEL_CAPACITY: usize = 1;

/// `command` of the synthetic records reporting the forwarder's own errors.
pub const SYNTHETIC_COMMAND: &str = "journald-cloud-forwarder";

/// Journal field holding the boot identifier.
pub const BOOT_ID_FIELD: &str = "_BOOT_ID";
