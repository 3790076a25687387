// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Records forwarded to the ingestion service.
//!
//! A [`Record`] is built from one journal entry, or synthesized to report the
//! forwarder's own errors. Records serialize to JSON and that document is the
//! message of the event sent to the destination:
//!
//! ```json
//! {"instanceId":"i-0abc","realtimeTimestamp":1700000000000000,"command":"sshd",
//!  "priority":"info","message":"Accepted publickey for ops","systemdUnit":"sshd.service"}
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

use crate::constants::SYNTHETIC_COMMAND;
use crate::journal::{JournalCursor, JournalError};

/// Syslog priority levels, most severe first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(u8)]
pub enum Priority {
    Emergency = 0,
    Alert = 1,
    Critical = 2,
    Error = 3,
    Warning = 4,
    Notice = 5,
    #[default]
    Info = 6,
    Debug = 7,
}

impl Priority {
    pub const ALL: [Priority; 8] = [
        Priority::Emergency,
        Priority::Alert,
        Priority::Critical,
        Priority::Error,
        Priority::Warning,
        Priority::Notice,
        Priority::Info,
        Priority::Debug,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Emergency => "emerg",
            Priority::Alert => "alert",
            Priority::Critical => "crit",
            Priority::Error => "err",
            Priority::Warning => "warning",
            Priority::Notice => "notice",
            Priority::Info => "info",
            Priority::Debug => "debug",
        }
    }

    #[must_use]
    pub fn level(self) -> u8 {
        self as u8
    }

    #[must_use]
    pub fn from_level(level: u8) -> Option<Self> {
        Self::ALL.get(usize::from(level)).copied()
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid priority '{0}'")]
pub struct InvalidPriority(pub String);

impl FromStr for Priority {
    type Err = InvalidPriority;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        let priority = match normalized.as_str() {
            "emerg" | "emergency" | "panic" => Priority::Emergency,
            "alert" => Priority::Alert,
            "crit" | "critical" => Priority::Critical,
            "err" | "error" => Priority::Error,
            "warning" | "warn" => Priority::Warning,
            "notice" => Priority::Notice,
            "info" => Priority::Info,
            "debug" => Priority::Debug,
            other => other
                .parse::<u8>()
                .ok()
                .and_then(Priority::from_level)
                .ok_or_else(|| InvalidPriority(s.to_string()))?,
        };
        Ok(priority)
    }
}

impl Serialize for Priority {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// One log event on its way to the destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,
    /// Microseconds since the Unix epoch; 0 for synthetic records, which are
    /// stamped when written.
    #[serde(rename = "realtimeTimestamp")]
    pub timestamp_micros: u64,
    pub command: String,
    pub priority: Priority,
    #[serde(serialize_with = "serialize_message")]
    pub message: Vec<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub systemd_unit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub syslog_identifier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pid: Option<u32>,
}

/// Text messages go out as strings, anything else as a byte array.
fn serialize_message<S: Serializer>(message: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    match std::str::from_utf8(message) {
        Ok(text) => serializer.serialize_str(text),
        Err(_) => message.serialize(serializer),
    }
}

impl Record {
    /// Builds a record reporting one of the forwarder's own errors. These are
    /// shipped with the journal stream rather than logged to the journal,
    /// which would feed them straight back into the forwarder.
    pub fn synthetic(err: impl fmt::Display) -> Self {
        Self {
            instance_id: None,
            timestamp_micros: 0,
            command: SYNTHETIC_COMMAND.to_string(),
            priority: Priority::Error,
            message: err.to_string().into_bytes(),
            hostname: None,
            systemd_unit: None,
            syslog_identifier: None,
            pid: None,
        }
    }

    /// Reads the cursor's current entry into a record.
    pub fn from_cursor<C: JournalCursor + ?Sized>(cursor: &C) -> Result<Self, UnmarshalError> {
        let entry = cursor.current_entry()?;
        let text = |name: &str| entry.field_str(name).map(str::to_string);

        let priority = match entry.field_str("PRIORITY") {
            Some(raw) => raw.parse::<Priority>()?,
            None if entry.field("PRIORITY").is_some() => {
                return Err(UnmarshalError::Priority(InvalidPriority(
                    "<binary>".to_string(),
                )))
            }
            None => Priority::default(),
        };
        let pid = match entry.field_str("_PID") {
            Some(raw) => Some(
                raw.parse::<u32>()
                    .map_err(|_| UnmarshalError::Field("_PID", raw.to_string()))?,
            ),
            None => None,
        };

        Ok(Self {
            instance_id: None,
            timestamp_micros: entry.realtime_timestamp,
            command: text("_COMM").unwrap_or_default(),
            priority,
            message: entry.field("MESSAGE").map(<[u8]>::to_vec).unwrap_or_default(),
            hostname: text("_HOSTNAME"),
            systemd_unit: text("_SYSTEMD_UNIT"),
            syslog_identifier: text("SYSLOG_IDENTIFIER"),
            pid,
        })
    }
}

/// Reasons a journal entry could not become a [`Record`].
#[derive(Debug, thiserror::Error)]
pub enum UnmarshalError {
    #[error(transparent)]
    Journal(#[from] JournalError),

    #[error(transparent)]
    Priority(#[from] InvalidPriority),

    #[error("invalid {0} value '{1}'")]
    Field(&'static str, String),
}
