// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Journal cursor over the journal export format.
//!
//! `journalctl --output=export` writes one field per line and separates
//! entries with an empty line. Text fields are written as `NAME=value`.
//! Fields holding binary data or newlines are written as `NAME`, followed by
//! the value length as a little-endian `u64`, the raw value, and a newline.
//!
//! A parser thread decodes the stream into a bounded queue; the cursor pulls
//! from that queue and applies matches in-process.
//!
//! The local journal is read in two passes: a finite `journalctl` run over
//! everything already stored, then a `--follow` run starting after the last
//! `__CURSOR` of the first. Until the first pass ends the cursor blocks for
//! entries instead of reporting that nothing is available, so a read that
//! comes back empty always means the stored journal was read to its end.

use std::collections::VecDeque;
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TryRecvError};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{debug, warn};

use super::{JournalCursor, JournalEntry, JournalError, Match, Matcher};

const REALTIME_TIMESTAMP_FIELD: &str = "__REALTIME_TIMESTAMP";
const CURSOR_FIELD: &str = "__CURSOR";

/// Entries decoded ahead of the cursor.
const EXPORT_QUEUE_DEPTH: usize = 1024;

/// Largest binary field accepted from the export stream.
const MAX_FIELD_SIZE: u64 = 64 * 1024 * 1024;

/// Incremental decoder for the journal export format.
pub struct ExportParser<R> {
    reader: R,
    line: Vec<u8>,
}

impl<R: BufRead> ExportParser<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: Vec::new(),
        }
    }

    /// Reads the next entry. Returns `Ok(None)` at end of stream.
    pub fn next_entry(&mut self) -> Result<Option<JournalEntry>, JournalError> {
        let mut fields = std::collections::BTreeMap::new();
        loop {
            self.line.clear();
            let read = self.reader.read_until(b'\n', &mut self.line)?;
            if read == 0 {
                return if fields.is_empty() {
                    Ok(None)
                } else {
                    finish_entry(fields).map(Some)
                };
            }
            if self.line.last() == Some(&b'\n') {
                self.line.pop();
            }
            if self.line.is_empty() {
                if fields.is_empty() {
                    continue;
                }
                return finish_entry(fields).map(Some);
            }

            let (name, value) = match self.line.iter().position(|b| *b == b'=') {
                Some(eq) => (
                    field_name(&self.line[..eq])?,
                    self.line[eq + 1..].to_vec(),
                ),
                None => {
                    let name = field_name(&self.line)?;
                    let value = self.read_binary_value(&name)?;
                    (name, value)
                }
            };
            fields.insert(name, value);
        }
    }

    fn read_binary_value(&mut self, name: &str) -> Result<Vec<u8>, JournalError> {
        let mut len = [0u8; 8];
        self.reader.read_exact(&mut len)?;
        let len = u64::from_le_bytes(len);
        if len > MAX_FIELD_SIZE {
            return Err(JournalError::Malformed(format!(
                "field {name} claims {len} bytes"
            )));
        }
        let mut value = vec![0u8; len as usize];
        self.reader.read_exact(&mut value)?;
        let mut newline = [0u8; 1];
        self.reader.read_exact(&mut newline)?;
        if newline[0] != b'\n' {
            return Err(JournalError::Malformed(format!(
                "binary field {name} not terminated by newline"
            )));
        }
        Ok(value)
    }
}

fn field_name(raw: &[u8]) -> Result<String, JournalError> {
    if raw.is_empty() {
        return Err(JournalError::Malformed("empty field name".to_string()));
    }
    String::from_utf8(raw.to_vec())
        .map_err(|_| JournalError::Malformed("field name is not UTF-8".to_string()))
}

fn finish_entry(
    fields: std::collections::BTreeMap<String, Vec<u8>>,
) -> Result<JournalEntry, JournalError> {
    let realtime_timestamp = fields
        .get(REALTIME_TIMESTAMP_FIELD)
        .and_then(|v| std::str::from_utf8(v).ok())
        .and_then(|v| v.parse::<u64>().ok())
        .ok_or_else(|| {
            JournalError::Malformed(format!("entry without valid {REALTIME_TIMESTAMP_FIELD}"))
        })?;
    Ok(JournalEntry {
        realtime_timestamp,
        fields,
    })
}

enum Decoded {
    Entry(JournalEntry),
    Failed(JournalError),
    /// Everything stored when the stream was opened has been decoded.
    CaughtUp,
}

/// Producer of export streams: a finite backlog, then an optional live stream.
trait ExportSource: Send + 'static {
    type Stream: Read + Send + 'static;

    fn backlog(&mut self) -> io::Result<Self::Stream>;

    /// Entries after `after_cursor`, or every entry when it is `None`.
    /// `Ok(None)` means there is nothing to follow.
    fn follow(&mut self, after_cursor: Option<&str>) -> io::Result<Option<Self::Stream>>;
}

/// A finite export stream, such as a file or a captured buffer.
struct Capture<R>(Option<R>);

impl<R: Read + Send + 'static> ExportSource for Capture<R> {
    type Stream = R;

    fn backlog(&mut self) -> io::Result<R> {
        self.0
            .take()
            .ok_or_else(|| io::Error::other("export stream already consumed"))
    }

    fn follow(&mut self, _after_cursor: Option<&str>) -> io::Result<Option<R>> {
        Ok(None)
    }
}

/// The `journalctl` process currently feeding the cursor.
#[derive(Default)]
struct Running {
    child: Option<Child>,
    stopped: bool,
}

impl Running {
    fn stop(&mut self) {
        self.stopped = true;
        if let Some(mut child) = self.child.take() {
            if let Err(e) = child.kill() {
                debug!("Failed to stop journalctl: {e}");
            }
            let _ = child.wait();
        }
    }
}

struct Journalctl {
    directory: Option<PathBuf>,
    running: Arc<Mutex<Running>>,
    backlog: Option<ChildStdout>,
}

impl Journalctl {
    fn start(&self, extra_args: &[String]) -> io::Result<ChildStdout> {
        let mut running = self
            .running
            .lock()
            .map_err(|_| io::Error::other("journalctl state poisoned"))?;
        if running.stopped {
            return Err(io::Error::other("journal cursor closed"));
        }

        let mut command = Command::new("journalctl");
        command
            .args(["--output=export", "--all", "--quiet", "--no-pager"])
            .args(extra_args);
        if let Some(directory) = &self.directory {
            command.arg(format!("--directory={}", directory.display()));
        }
        let mut child = command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| io::Error::other("journalctl stdout unavailable"))?;
        debug!("Reading journal via journalctl {extra_args:?} (pid {})", child.id());

        // The backlog run has finished by the time the follow run starts.
        if let Some(mut previous) = running.child.replace(child) {
            let _ = previous.wait();
        }
        Ok(stdout)
    }
}

impl ExportSource for Journalctl {
    type Stream = ChildStdout;

    fn backlog(&mut self) -> io::Result<ChildStdout> {
        self.backlog
            .take()
            .ok_or_else(|| io::Error::other("journal backlog already consumed"))
    }

    fn follow(&mut self, after_cursor: Option<&str>) -> io::Result<Option<ChildStdout>> {
        let mut args = vec!["--follow".to_string(), "--no-tail".to_string()];
        if let Some(cursor) = after_cursor {
            args.push(format!("--after-cursor={cursor}"));
        }
        self.start(&args).map(Some)
    }
}

enum StreamEnd {
    Drained { last_cursor: Option<String> },
    Stopped,
}

fn decode_stream<R: Read>(stream: R, tx: &SyncSender<Decoded>) -> StreamEnd {
    let mut parser = ExportParser::new(BufReader::new(stream));
    let mut last_cursor = None;
    loop {
        let decoded = match parser.next_entry() {
            Ok(Some(entry)) => {
                if let Some(cursor) = entry.field_str(CURSOR_FIELD) {
                    last_cursor = Some(cursor.to_string());
                }
                Decoded::Entry(entry)
            }
            Ok(None) => return StreamEnd::Drained { last_cursor },
            // The stream position is unknown after an I/O error.
            Err(JournalError::Io(e)) => {
                let _ = tx.send(Decoded::Failed(JournalError::Io(e)));
                return StreamEnd::Stopped;
            }
            Err(e) => Decoded::Failed(e),
        };
        if tx.send(decoded).is_err() {
            return StreamEnd::Stopped;
        }
    }
}

fn read_source<S: ExportSource>(mut source: S, tx: &SyncSender<Decoded>) {
    let backlog = match source.backlog() {
        Ok(stream) => stream,
        Err(e) => {
            let _ = tx.send(Decoded::Failed(e.into()));
            return;
        }
    };
    let StreamEnd::Drained { last_cursor } = decode_stream(backlog, tx) else {
        return;
    };
    if tx.send(Decoded::CaughtUp).is_err() {
        return;
    }

    match source.follow(last_cursor.as_deref()) {
        Ok(Some(stream)) => {
            debug!("Following journal after cursor {last_cursor:?}");
            decode_stream(stream, tx);
        }
        Ok(None) => {}
        Err(e) => {
            let _ = tx.send(Decoded::Failed(e.into()));
        }
    }
    debug!("Journal export stream ended");
}

/// Journal cursor fed by an export-format stream.
///
/// The export stream only moves forward, so the cursor keeps no history:
/// seeking the tail reads through the stored journal and drops it.
pub struct ExportJournal {
    rx: Receiver<Decoded>,
    matcher: Matcher,
    current: Option<JournalEntry>,
    pending: VecDeque<JournalEntry>,
    /// Set when following the local journal.
    running: Option<Arc<Mutex<Running>>>,
    caught_up: bool,
    closed: bool,
}

impl ExportJournal {
    /// Follows the local journal through `journalctl`, optionally reading the
    /// journal files under `directory` instead of the system journal.
    pub fn spawn(directory: Option<&Path>) -> Result<Self, JournalError> {
        let running = Arc::new(Mutex::new(Running::default()));
        let mut source = Journalctl {
            directory: directory.map(Path::to_path_buf),
            running: Arc::clone(&running),
            backlog: None,
        };
        source.backlog = Some(source.start(&[])?);

        let mut journal = Self::from_source(source);
        journal.running = Some(running);
        Ok(journal)
    }

    /// Reads a finite export stream, such as a saved `journalctl` capture.
    /// Once it is exhausted the cursor stays idle.
    pub fn from_reader<R: Read + Send + 'static>(reader: R) -> Self {
        Self::from_source(Capture(Some(reader)))
    }

    fn from_source<S: ExportSource>(source: S) -> Self {
        let (tx, rx) = mpsc::sync_channel(EXPORT_QUEUE_DEPTH);
        // If the thread cannot start, `tx` is dropped and the cursor reads as closed.
        if let Err(e) = std::thread::Builder::new()
            .name("journal-export".to_string())
            .spawn(move || read_source(source, &tx))
        {
            warn!("Failed to start journal export parser: {e}");
        }
        Self {
            rx,
            matcher: Matcher::default(),
            current: None,
            pending: VecDeque::new(),
            running: None,
            caught_up: false,
            closed: false,
        }
    }

    /// Pulls the next decoded entry, matching or not. Blocks while the
    /// backlog is still being read; afterwards returns `None` when nothing
    /// new has been decoded.
    fn pull(&mut self) -> Result<Option<JournalEntry>, JournalError> {
        if let Some(entry) = self.pending.pop_front() {
            return Ok(Some(entry));
        }
        loop {
            if self.closed {
                return self.closed_result().map(|()| None);
            }
            let decoded = if self.caught_up {
                match self.rx.try_recv() {
                    Ok(decoded) => decoded,
                    Err(TryRecvError::Empty) => return Ok(None),
                    Err(TryRecvError::Disconnected) => {
                        self.closed = true;
                        continue;
                    }
                }
            } else {
                match self.rx.recv() {
                    Ok(decoded) => decoded,
                    Err(_) => {
                        self.closed = true;
                        self.caught_up = true;
                        continue;
                    }
                }
            };
            match decoded {
                Decoded::Entry(entry) => return Ok(Some(entry)),
                Decoded::Failed(e) => return Err(e),
                Decoded::CaughtUp => {
                    debug!("Journal backlog read");
                    self.caught_up = true;
                }
            }
        }
    }

    /// A finished stream is normal when replaying a capture, but not when
    /// following a live journal.
    fn closed_result(&self) -> Result<(), JournalError> {
        if self.running.is_some() {
            Err(JournalError::SourceClosed)
        } else {
            Ok(())
        }
    }
}

impl JournalCursor for ExportJournal {
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
        while let Some(entry) = self.pull()? {
            if self.matcher.matches(&entry) {
                self.current = Some(entry);
                return Ok(1);
            }
        }
        Ok(0)
    }

    fn seek_tail(&mut self) -> Result<(), JournalError> {
        // Matches out-rank the tail, as with sd-journal.
        if self.matcher.is_active() {
            return Ok(());
        }
        self.current = None;
        self.pending.clear();
        loop {
            match self.pull() {
                Ok(Some(_)) => {}
                Ok(None) => return Ok(()),
                Err(JournalError::Malformed(e)) => warn!("Skipping malformed journal entry: {e}"),
                Err(e) => return Err(e),
            }
        }
    }

    fn get_field(&self, name: &str) -> Result<Vec<u8>, JournalError> {
        let entry = self.current.as_ref().ok_or(JournalError::NoCurrentEntry)?;
        entry
            .fields
            .get(name)
            .cloned()
            .ok_or_else(|| JournalError::FieldNotFound(name.to_string()))
    }

    fn wait(&mut self, timeout: Duration) -> Result<(), JournalError> {
        // Before the backlog is read, `next` blocks on its own.
        if !self.pending.is_empty() || !self.caught_up {
            return Ok(());
        }
        if self.closed {
            std::thread::sleep(timeout);
            return Ok(());
        }
        match self.rx.recv_timeout(timeout) {
            Ok(Decoded::Entry(entry)) => {
                self.pending.push_back(entry);
                Ok(())
            }
            Ok(Decoded::Failed(e)) => Err(e),
            Ok(Decoded::CaughtUp) | Err(RecvTimeoutError::Timeout) => Ok(()),
            Err(RecvTimeoutError::Disconnected) => {
                self.closed = true;
                Ok(())
            }
        }
    }

    fn current_entry(&self) -> Result<JournalEntry, JournalError> {
        self.current.clone().ok_or(JournalError::NoCurrentEntry)
    }
}

impl Drop for ExportJournal {
    fn drop(&mut self) {
        if let Some(running) = &self.running {
            running
                .lock()
                .unwrap_or_else(std::sync::PoisonError::into_inner)
                .stop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn export_entry(ts: u64, extra: &str) -> String {
        format!("__REALTIME_TIMESTAMP={ts}\n_BOOT_ID=b1\n{extra}\n")
    }

    fn binary_field(name: &str, value: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(name.as_bytes());
        out.push(b'\n');
        out.extend_from_slice(&(value.len() as u64).to_le_bytes());
        out.extend_from_slice(value);
        out.push(b'\n');
        out
    }

    /// Hands out one chunk per read after a short pause, like a pipe fed by
    /// a busy writer.
    struct Trickle {
        chunks: VecDeque<Vec<u8>>,
    }

    impl Trickle {
        fn new(chunks: Vec<String>) -> Self {
            Self {
                chunks: chunks.into_iter().map(String::into_bytes).collect(),
            }
        }
    }

    impl Read for Trickle {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            std::thread::sleep(Duration::from_millis(1));
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

    struct ScriptedSource {
        backlog: Option<Vec<u8>>,
        live: Option<Vec<u8>>,
        followed_after: Arc<Mutex<Option<Option<String>>>>,
    }

    impl ExportSource for ScriptedSource {
        type Stream = Cursor<Vec<u8>>;

        fn backlog(&mut self) -> io::Result<Self::Stream> {
            Ok(Cursor::new(self.backlog.take().unwrap_or_default()))
        }

        fn follow(&mut self, after_cursor: Option<&str>) -> io::Result<Option<Self::Stream>> {
            *self.followed_after.lock().unwrap() = Some(after_cursor.map(str::to_string));
            Ok(self.live.take().map(Cursor::new))
        }
    }

    fn drain(journal: &mut ExportJournal) -> Vec<u64> {
        let mut seen = Vec::new();
        for _ in 0..50 {
            match journal.next().unwrap() {
                1 => seen.push(journal.current_entry().unwrap().realtime_timestamp),
                _ => journal.wait(Duration::from_millis(20)).unwrap(),
            }
        }
        seen
    }

    #[test]
    fn test_parse_text_fields() {
        let data = export_entry(10, "MESSAGE=key=value\nPRIORITY=6\n");
        let mut parser = ExportParser::new(Cursor::new(data));
        let entry = parser.next_entry().unwrap().unwrap();
        assert_eq!(entry.realtime_timestamp, 10);
        assert_eq!(entry.field_str("MESSAGE"), Some("key=value"));
        assert_eq!(entry.field_str("PRIORITY"), Some("6"));
        assert!(parser.next_entry().unwrap().is_none());
    }

    #[test]
    fn test_parse_binary_field() {
        let mut data = b"__REALTIME_TIMESTAMP=7\n".to_vec();
        data.extend(binary_field("MESSAGE", b"line one\nline two\x00"));
        data.extend_from_slice(b"PRIORITY=3\n\n");

        let mut parser = ExportParser::new(Cursor::new(data));
        let entry = parser.next_entry().unwrap().unwrap();
        assert_eq!(entry.field("MESSAGE"), Some(&b"line one\nline two\x00"[..]));
        assert_eq!(entry.field_str("PRIORITY"), Some("3"));
    }

    #[test]
    fn test_parse_multiple_entries_and_missing_trailing_blank() {
        let data = format!(
            "{}{}",
            export_entry(1, "MESSAGE=a\n"),
            "__REALTIME_TIMESTAMP=2\nMESSAGE=b"
        );
        let mut parser = ExportParser::new(Cursor::new(data));
        assert_eq!(parser.next_entry().unwrap().unwrap().realtime_timestamp, 1);
        let last = parser.next_entry().unwrap().unwrap();
        assert_eq!(last.realtime_timestamp, 2);
        assert_eq!(last.field_str("MESSAGE"), Some("b"));
        assert!(parser.next_entry().unwrap().is_none());
    }

    #[test]
    fn test_parse_entry_without_timestamp_is_malformed() {
        let mut parser = ExportParser::new(Cursor::new("MESSAGE=a\n\n"));
        assert!(matches!(
            parser.next_entry(),
            Err(JournalError::Malformed(_))
        ));
    }

    #[test]
    fn test_parse_truncated_binary_field() {
        let mut data = b"__REALTIME_TIMESTAMP=7\nMESSAGE\n".to_vec();
        data.extend_from_slice(&100u64.to_le_bytes());
        data.extend_from_slice(b"short");
        let mut parser = ExportParser::new(Cursor::new(data));
        assert!(matches!(parser.next_entry(), Err(JournalError::Io(_))));
    }

    #[test]
    fn test_cursor_reads_stream_in_order() {
        let data = format!(
            "{}{}{}",
            export_entry(1, "MESSAGE=a\n"),
            export_entry(2, "MESSAGE=b\n"),
            export_entry(3, "MESSAGE=c\n"),
        );
        let mut journal = ExportJournal::from_reader(Cursor::new(data));
        assert_eq!(drain(&mut journal), vec![1, 2, 3]);
        assert_eq!(journal.get_field("MESSAGE").unwrap(), b"c");
        assert_eq!(journal.get_field("_BOOT_ID").unwrap(), b"b1");
    }

    #[test]
    fn test_next_reads_slow_backlog_to_the_end() {
        let entries = (1..=200).map(|ts| export_entry(ts, "MESSAGE=m\n")).collect();
        let mut journal = ExportJournal::from_reader(Trickle::new(entries));
        for ts in 1..=200 {
            assert_eq!(journal.next().unwrap(), 1);
            assert_eq!(journal.current_entry().unwrap().realtime_timestamp, ts);
        }
        assert_eq!(journal.next().unwrap(), 0);
    }

    #[test]
    fn test_seek_tail_waits_for_slow_backlog() {
        let entries = (1..=200).map(|ts| export_entry(ts, "MESSAGE=m\n")).collect();
        let mut journal = ExportJournal::from_reader(Trickle::new(entries));
        journal.seek_tail().unwrap();
        assert_eq!(journal.next().unwrap(), 0);
    }

    #[test]
    fn test_follow_starts_after_last_backlog_cursor() {
        let backlog = format!(
            "{}{}",
            export_entry(1, "__CURSOR=s=a;i=1\n"),
            export_entry(2, "__CURSOR=s=a;i=2\n"),
        );
        let followed_after = Arc::new(Mutex::new(None));
        let mut journal = ExportJournal::from_source(ScriptedSource {
            backlog: Some(backlog.into_bytes()),
            live: Some(export_entry(3, "__CURSOR=s=a;i=3\n").into_bytes()),
            followed_after: Arc::clone(&followed_after),
        });

        assert_eq!(drain(&mut journal), vec![1, 2, 3]);
        assert_eq!(
            *followed_after.lock().unwrap(),
            Some(Some("s=a;i=2".to_string()))
        );
    }

    #[test]
    fn test_empty_backlog_follows_from_the_start() {
        let followed_after = Arc::new(Mutex::new(None));
        let mut journal = ExportJournal::from_source(ScriptedSource {
            backlog: Some(Vec::new()),
            live: Some(export_entry(7, "MESSAGE=new\n").into_bytes()),
            followed_after: Arc::clone(&followed_after),
        });

        assert_eq!(drain(&mut journal), vec![7]);
        assert_eq!(*followed_after.lock().unwrap(), Some(None));
    }

    #[test]
    fn test_first_next_waits_for_parser() {
        let mut journal =
            ExportJournal::from_reader(Cursor::new(export_entry(1, "MESSAGE=a\n")));
        assert_eq!(journal.next().unwrap(), 1);
        assert_eq!(journal.current_entry().unwrap().realtime_timestamp, 1);
    }

    #[test]
    fn test_empty_stream_reads_as_empty() {
        let mut journal = ExportJournal::from_reader(Cursor::new(Vec::new()));
        assert_eq!(journal.next().unwrap(), 0);
        assert_eq!(journal.next().unwrap(), 0);
    }

    #[test]
    fn test_cursor_applies_matches() {
        let data = format!(
            "{}{}{}",
            export_entry(1, "_SYSTEMD_UNIT=a.service\n"),
            export_entry(2, "_SYSTEMD_UNIT=b.service\n"),
            export_entry(3, "_SYSTEMD_UNIT=a.service\n"),
        );
        let mut journal = ExportJournal::from_reader(Cursor::new(data));
        journal
            .add_match(&Match::new("_SYSTEMD_UNIT", "a.service"))
            .unwrap();
        journal.add_disjunction().unwrap();
        assert_eq!(drain(&mut journal), vec![1, 3]);
    }

    #[test]
    fn test_seek_tail_skips_decoded_entries() {
        let data = format!(
            "{}{}",
            export_entry(1, "MESSAGE=a\n"),
            export_entry(2, "MESSAGE=b\n"),
        );
        let mut journal = ExportJournal::from_reader(Cursor::new(data));
        journal.seek_tail().unwrap();
        assert!(matches!(
            journal.current_entry(),
            Err(JournalError::NoCurrentEntry)
        ));
        assert_eq!(journal.next().unwrap(), 0);
    }
}
