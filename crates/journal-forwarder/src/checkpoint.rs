// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Durable resume checkpoint.
//!
//! The checkpoint is a single three-line record, rewritten in place:
//!
//! ```text
//! <boot id>\n<sequence token>\n<last entry time, microseconds>\n
//! ```
//!
//! Reading never fails: a missing, empty, or corrupt record means "no prior
//! state" and yields [`Checkpoint::default`]. The file handle is held for the
//! lifetime of the process; nothing guards against two processes sharing the
//! same path.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

/// Where delivery stands: the boot being read, the destination's continuation
/// token, and the timestamp of the last entry known to be delivered.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Checkpoint {
    pub boot_id: String,
    pub sequence_token: String,
    pub last_entry_time_micros: u64,
}

impl Checkpoint {
    fn encode(&self) -> String {
        format!(
            "{}\n{}\n{}\n",
            self.boot_id, self.sequence_token, self.last_entry_time_micros
        )
    }

    fn decode(raw: &str) -> Option<Self> {
        let mut lines = raw.split('\n');
        let boot_id = lines.next()?;
        let sequence_token = lines.next()?;
        let last_entry_time_micros = lines.next()?.trim().parse().ok()?;
        Some(Self {
            boot_id: boot_id.to_string(),
            sequence_token: sequence_token.to_string(),
            last_entry_time_micros,
        })
    }
}

/// Exclusively owned handle on the checkpoint file.
#[derive(Debug)]
pub struct CheckpointFile {
    file: File,
    path: PathBuf,
}

impl CheckpointFile {
    /// Opens the checkpoint file read/write, creating it if needed.
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut options = OpenOptions::new();
        options.read(true).write(true).create(true).truncate(false);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let file = options.open(&path)?;
        Ok(Self { file, path })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the stored checkpoint, or the zero checkpoint if there is none.
    pub fn read(&mut self) -> Checkpoint {
        let mut raw = String::new();
        let read = self
            .file
            .seek(SeekFrom::Start(0))
            .and_then(|_| self.file.read_to_string(&mut raw));
        if let Err(e) = read {
            debug!("Ignoring unreadable checkpoint {}: {e}", self.path.display());
            return Checkpoint::default();
        }
        Checkpoint::decode(&raw).unwrap_or_else(|| {
            if !raw.is_empty() {
                debug!("Ignoring malformed checkpoint {}", self.path.display());
            }
            Checkpoint::default()
        })
    }

    /// Overwrites the stored checkpoint and syncs it to disk.
    pub fn write(&mut self, checkpoint: &Checkpoint) -> io::Result<()> {
        let encoded = checkpoint.encode();
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(encoded.as_bytes())?;
        // Drop whatever a longer previous record left behind.
        self.file.set_len(encoded.len() as u64)?;
        self.file.sync_data()
    }
}
