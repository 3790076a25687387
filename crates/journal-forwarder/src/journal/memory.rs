// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! In-memory journal.
//!
//! Entries are appended through a [`MemoryJournalHandle`], which can be cloned
//! and handed to another thread while a [`MemoryJournal`] cursor reads. Useful
//! for replaying captured entries and for exercising the pipeline without a
//! systemd journal.

use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::Duration;

use super::{JournalCursor, JournalEntry, JournalError, Match, Matcher};

#[derive(Debug, Default)]
struct Shared {
    entries: Mutex<Vec<JournalEntry>>,
    appended: Condvar,
}

impl Shared {
    fn entries(&self) -> MutexGuard<'_, Vec<JournalEntry>> {
        // A poisoned lock only means an appender panicked mid-push; the Vec is intact.
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// Appends entries to a [`MemoryJournal`] and wakes waiting readers.
#[derive(Debug, Clone)]
pub struct MemoryJournalHandle {
    shared: Arc<Shared>,
}

impl MemoryJournalHandle {
    pub fn append(&self, entry: JournalEntry) {
        self.shared.entries().push(entry);
        self.shared.appended.notify_all();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Position {
    /// Before the first entry.
    Head,
    /// On the entry at this index.
    At(usize),
    /// Past every entry that existed when the tail was sought.
    Tail(usize),
}

/// Cursor over an in-memory journal.
#[derive(Debug)]
pub struct MemoryJournal {
    shared: Arc<Shared>,
    matcher: Matcher,
    position: Position,
    /// Entry count observed by the last `next`, used by `wait`.
    seen: usize,
}

impl MemoryJournal {
    /// Creates an empty journal and the handle used to append to it.
    #[must_use]
    pub fn new() -> (Self, MemoryJournalHandle) {
        let shared = Arc::new(Shared::default());
        let journal = Self {
            shared: Arc::clone(&shared),
            matcher: Matcher::default(),
            position: Position::Head,
            seen: 0,
        };
        (journal, MemoryJournalHandle { shared })
    }

    /// Creates a journal pre-filled with `entries`.
    #[must_use]
    pub fn with_entries(entries: impl IntoIterator<Item = JournalEntry>) -> (Self, MemoryJournalHandle) {
        let (journal, handle) = Self::new();
        for entry in entries {
            handle.append(entry);
        }
        (journal, handle)
    }
}

impl JournalCursor for MemoryJournal {
    fn add_match(&mut self, m: &Match) -> Result<(), JournalError> {
        if m.field.is_empty() {
            return Err(JournalError::InvalidMatch(m.to_string()));
        }
        self.matcher.add_match(m.clone());
        Ok(())
    }

    fn add_disjunction(&mut self) -> Result<(), JournalError> {
        self.matcher.add_disjunction();
        Ok(())
    }

    fn next(&mut self) -> Result<u64, JournalError> {
        let entries = self.shared.entries();
        self.seen = entries.len();
        let start = match self.position {
            Position::Head => 0,
            Position::At(i) => i + 1,
            Position::Tail(n) => n,
        };
        let found = entries
            .iter()
            .enumerate()
            .skip(start)
            .find(|(_, entry)| self.matcher.matches(entry))
            .map(|(i, _)| i);
        match found {
            Some(i) => {
                self.position = Position::At(i);
                Ok(1)
            }
            None => {
                // Nothing matched up to the end; skip the scanned entries next time.
                if let Position::Head | Position::Tail(_) = self.position {
                    self.position = Position::Tail(entries.len());
                }
                Ok(0)
            }
        }
    }

    fn seek_tail(&mut self) -> Result<(), JournalError> {
        // sd-journal does not honor the tail while matches are installed.
        if self.matcher.is_active() {
            return Ok(());
        }
        let len = self.shared.entries().len();
        self.position = Position::Tail(len);
        Ok(())
    }

    fn get_field(&self, name: &str) -> Result<Vec<u8>, JournalError> {
        let entry = self.current_entry()?;
        entry
            .fields
            .get(name)
            .cloned()
            .ok_or_else(|| JournalError::FieldNotFound(name.to_string()))
    }

    fn wait(&mut self, timeout: Duration) -> Result<(), JournalError> {
        let entries = self.shared.entries();
        if entries.len() > self.seen {
            return Ok(());
        }
        let seen = self.seen;
        let _guard = self
            .shared
            .appended
            .wait_timeout_while(entries, timeout, |entries| entries.len() <= seen)
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        Ok(())
    }

    fn current_entry(&self) -> Result<JournalEntry, JournalError> {
        match self.position {
            Position::At(i) => self
                .shared
                .entries()
                .get(i)
                .cloned()
                .ok_or(JournalError::NoCurrentEntry),
            Position::Head | Position::Tail(_) => Err(JournalError::NoCurrentEntry),
        }
    }
}
