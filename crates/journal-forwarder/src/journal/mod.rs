// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Sequential journal cursor capability.
//!
//! The forwarder only needs a small slice of what sd-journal offers: install
//! match filters, step forward, jump to the tail, read fields of the current
//! entry, and block until something new shows up. [`JournalCursor`] captures
//! that slice so the pipeline can run over any store that provides it.
//!
//! Two implementations live here:
//!
//! - [`memory::MemoryJournal`]: appendable in-memory store.
//! - [`export::ExportJournal`]: reads the journal export format, usually from
//!   `journalctl --output=export`.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

pub mod export;
pub mod memory;

/// Errors raised by journal cursors.
#[derive(Debug, thiserror::Error)]
pub enum JournalError {
    #[error("cursor is not positioned on an entry")]
    NoCurrentEntry,

    #[error("field {0} not present in journal entry")]
    FieldNotFound(String),

    #[error("invalid match clause: {0}")]
    InvalidMatch(String),

    #[error("malformed journal export data: {0}")]
    Malformed(String),

    #[error("journal source closed")]
    SourceClosed,

    #[error("journal I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A single journal entry: its realtime timestamp and all of its fields.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct JournalEntry {
    /// `__REALTIME_TIMESTAMP`, microseconds since the Unix epoch.
    pub realtime_timestamp: u64,
    pub fields: BTreeMap<String, Vec<u8>>,
}

impl JournalEntry {
    #[must_use]
    pub fn new(realtime_timestamp: u64) -> Self {
        Self {
            realtime_timestamp,
            fields: BTreeMap::new(),
        }
    }

    /// Builder-style field setter, mostly useful when assembling entries by hand.
    #[must_use]
    pub fn with_field(mut self, name: &str, value: impl Into<Vec<u8>>) -> Self {
        self.fields.insert(name.to_string(), value.into());
        self
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<&[u8]> {
        self.fields.get(name).map(Vec::as_slice)
    }

    /// Field value as text, if present and valid UTF-8.
    #[must_use]
    pub fn field_str(&self, name: &str) -> Option<&str> {
        self.field(name).and_then(|v| std::str::from_utf8(v).ok())
    }
}

/// A `FIELD=value` match clause.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Match {
    pub field: String,
    pub value: Vec<u8>,
}

impl Match {
    #[must_use]
    pub fn new(field: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Parses a `FIELD=value` clause. The field name must be non-empty.
    pub fn parse(clause: &str) -> Result<Self, JournalError> {
        match clause.split_once('=') {
            Some((field, value)) if !field.is_empty() => Ok(Self::new(field, value)),
            _ => Err(JournalError::InvalidMatch(clause.to_string())),
        }
    }
}

impl fmt::Display for Match {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.field, String::from_utf8_lossy(&self.value))
    }
}

/// Evaluates installed matches against entries, the way sd-journal does.
///
/// Clauses added between two disjunctions form a group. Inside a group,
/// clauses on the same field are ORed and clauses on different fields are
/// ANDed. Groups are ORed. An empty matcher accepts every entry.
#[derive(Debug, Clone, Default)]
pub struct Matcher {
    groups: Vec<Vec<Match>>,
    open: Vec<Match>,
}

impl Matcher {
    pub fn add_match(&mut self, m: Match) {
        self.open.push(m);
    }

    pub fn add_disjunction(&mut self) {
        if !self.open.is_empty() {
            self.groups.push(std::mem::take(&mut self.open));
        }
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.groups.is_empty() || !self.open.is_empty()
    }

    #[must_use]
    pub fn matches(&self, entry: &JournalEntry) -> bool {
        if !self.is_active() {
            return true;
        }
        self.groups
            .iter()
            .chain(std::iter::once(&self.open))
            .filter(|group| !group.is_empty())
            .any(|group| group_matches(group, entry))
    }
}

fn group_matches(group: &[Match], entry: &JournalEntry) -> bool {
    let mut by_field: BTreeMap<&str, Vec<&[u8]>> = BTreeMap::new();
    for m in group {
        by_field
            .entry(m.field.as_str())
            .or_default()
            .push(m.value.as_slice());
    }
    by_field.iter().all(|(field, values)| {
        entry
            .field(field)
            .is_some_and(|actual| values.iter().any(|v| *v == actual))
    })
}

/// Sequential read access to a journal.
///
/// Cursor methods block. The pipeline drives a cursor from a single blocking
/// task and never shares it.
pub trait JournalCursor: Send {
    /// Adds a match clause to the currently open OR-group.
    fn add_match(&mut self, m: &Match) -> Result<(), JournalError>;

    /// Closes the current OR-group.
    fn add_disjunction(&mut self) -> Result<(), JournalError>;

    /// Advances to the next matching entry. Returns the number of entries
    /// advanced: 0 means nothing new is available yet.
    fn next(&mut self) -> Result<u64, JournalError>;

    /// Moves past the last entry. Like sd-journal, implementations may ignore
    /// this while matches are installed.
    fn seek_tail(&mut self) -> Result<(), JournalError>;

    /// Value of `name` in the current entry, without the `NAME=` prefix.
    fn get_field(&self, name: &str) -> Result<Vec<u8>, JournalError>;

    /// Blocks until the journal may have changed or `timeout` elapses.
    fn wait(&mut self, timeout: Duration) -> Result<(), JournalError>;

    /// The entry the cursor currently rests on.
    fn current_entry(&self) -> Result<JournalEntry, JournalError>;
}

impl<C: JournalCursor + ?Sized> JournalCursor for Box<C> {
    fn add_match(&mut self, m: &Match) -> Result<(), JournalError> {
        (**self).add_match(m)
    }

    fn add_disjunction(&mut self) -> Result<(), JournalError> {
        (**self).add_disjunction()
    }

    fn next(&mut self) -> Result<u64, JournalError> {
        (**self).next()
    }

    fn seek_tail(&mut self) -> Result<(), JournalError> {
        (**self).seek_tail()
    }

    fn get_field(&self, name: &str) -> Result<Vec<u8>, JournalError> {
        (**self).get_field(name)
    }

    fn wait(&mut self, timeout: Duration) -> Result<(), JournalError> {
        (**self).wait(timeout)
    }

    fn current_entry(&self) -> Result<JournalEntry, JournalError> {
        (**self).current_entry()
    }
}
