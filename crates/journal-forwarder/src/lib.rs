// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Journal forwarding pipeline.
//!
//! Tails the systemd journal and ships its entries, in order, to a batched
//! log ingestion service. A checkpoint file records how far delivery got so
//! that a restart resumes where the previous process stopped.
//!
//! ```text
//!   resume ──> reader ──(Record)──> batcher ──(Batch)──> forwarder ──> BatchWriter
//!     │                                                      │
//!     └──────────────── checkpoint file <────────────────────┘
//! ```
//!
//! - [`resume`] positions the journal cursor once at startup.
//! - [`reader`] turns journal entries into [`record::Record`]s on a blocking task.
//! - [`batcher`] groups records by count or by a one second timer.
//! - [`forwarder`] writes batches and persists the [`checkpoint`] after each one.

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod batcher;
pub mod checkpoint;
pub mod config;
pub mod constants;
pub mod error;
pub mod filter;
pub mod forwarder;
pub mod journal;
pub mod reader;
pub mod record;
pub mod resume;
pub mod writer;

pub use error::ForwarderError;
