// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Journal entries and pipeline settings shared by the integration tests

use std::collections::VecDeque;
use std::io::Read;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use journal_forwarder::forwarder::PipelineSettings;
use journal_forwarder::journal::JournalEntry;
use journal_forwarder::reader::ReaderConfig;

pub const BOOT: &str = "4f6a1b2c3d4e5f60718293a4b5c6d7e8";

pub const OTHER_BOOT: &str = "0123456789abcdef0123456789abcdef";

pub fn now_micros() -> u64 {
    u64::try_from(
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_micros(),
    )
    .unwrap()
}

/// An sshd entry of `boot`, `age_micros` before now.
pub fn entry(boot: &str, age_micros: u64, message: &str) -> JournalEntry {
    unit_entry(boot, age_micros, message, "sshd.service")
}

pub fn unit_entry(boot: &str, age_micros: u64, message: &str, unit: &str) -> JournalEntry {
    JournalEntry::new(now_micros() - age_micros)
        .with_field("_BOOT_ID", boot)
        .with_field("MESSAGE", message)
        .with_field("PRIORITY", "6")
        .with_field("_COMM", "sshd")
        .with_field("_SYSTEMD_UNIT", unit)
}

/// Pipeline settings with test-sized timings.
pub fn settings(max_batch_size: usize) -> PipelineSettings {
    PipelineSettings {
        reader: ReaderConfig {
            instance_id: Some("i-0abc".to_string()),
            retry_backoff: Duration::from_millis(10),
            wait_timeout: Duration::from_millis(20),
            pacing_pause: Duration::from_millis(100),
            ..Default::default()
        },
        max_batch_size,
        flush_interval: Duration::from_millis(200),
        ..Default::default()
    }
}

/// Export-format text of an sshd entry of `boot` at `ts`.
pub fn export_entry(boot: &str, ts: u64) -> String {
    format!(
        "__CURSOR=s={boot};t={ts}\n__REALTIME_TIMESTAMP={ts}\n_BOOT_ID={boot}\n\
         _SYSTEMD_UNIT=sshd.service\nPRIORITY=6\n_COMM=sshd\nMESSAGE=entry {ts}\n\n"
    )
}

/// Byte stream that yields one chunk per read after `delay`, the way a
/// `journalctl` pipe delivers a large backlog.
pub struct TrickleReader {
    chunks: VecDeque<Vec<u8>>,
    delay: Duration,
}

impl TrickleReader {
    pub fn new(chunks: impl IntoIterator<Item = String>, delay: Duration) -> Self {
        Self {
            chunks: chunks.into_iter().map(String::into_bytes).collect(),
            delay,
        }
    }
}

impl Read for TrickleReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        std::thread::sleep(self.delay);
        let Some(mut chunk) = self.chunks.pop_front() else {
            return Ok(0);
        };
        let n = chunk.len().min(buf.len());
        buf[..n].copy_from_slice(&chunk[..n]);
        if n < chunk.len() {
            let rest = chunk.split_off(n);
            self.chunks.push_front(rest);
        }
        Ok(n)
    }
}
