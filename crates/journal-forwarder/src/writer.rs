// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Batch delivery to the ingestion service.
//!
//! [`BatchWriter`] is the seam between the pipeline and the destination. The
//! pipeline only needs two things back from a successful write: the token the
//! next write must carry, and the timestamp of the newest entry it delivered.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::record::Record;

const API_KEY_HEADER: &str = "X-Api-Key";

/// Default attempts per batch, including the first.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default pause between attempts.
pub const DEFAULT_RETRY_BACKOFF: Duration = Duration::from_secs(1);

/// Acknowledgement of a delivered batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteReceipt {
    pub sequence_token: String,
    /// Timestamp of the last entry in the batch with a known time, or 0 when
    /// the batch held only synthetic records.
    pub last_timestamp_micros: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("destination returned {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("invalid response from destination: {0}")]
    InvalidResponse(String),

    #[error("failed to encode record: {0}")]
    Payload(#[from] serde_json::Error),
}

#[async_trait]
pub trait BatchWriter: Send {
    /// Delivers `batch` in order. An error means nothing in the batch may be
    /// assumed delivered.
    async fn write_batch(&mut self, batch: &[Record]) -> Result<WriteReceipt, WriteError>;
}

#[async_trait]
impl<W: BatchWriter + ?Sized> BatchWriter for Box<W> {
    async fn write_batch(&mut self, batch: &[Record]) -> Result<WriteReceipt, WriteError> {
        (**self).write_batch(batch).await
    }
}

#[derive(Debug, Clone)]
pub struct HttpWriterConfig {
    pub endpoint: String,
    pub log_group: String,
    pub log_stream: String,
    pub api_key: Option<String>,
    pub max_attempts: u32,
    pub retry_backoff: Duration,
    /// Per-request timeout. None waits for as long as the destination takes.
    pub timeout: Option<Duration>,
}

impl HttpWriterConfig {
    #[must_use]
    pub fn new(endpoint: String, log_group: String, log_stream: String) -> Self {
        Self {
            endpoint,
            log_group,
            log_stream,
            api_key: None,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_backoff: DEFAULT_RETRY_BACKOFF,
            timeout: None,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PutLogEvents<'a> {
    log_group_name: &'a str,
    log_stream_name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sequence_token: Option<&'a str>,
    log_events: Vec<LogEvent>,
}

#[derive(Debug, Serialize)]
struct LogEvent {
    /// Milliseconds since the Unix epoch.
    timestamp: u64,
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PutLogEventsResponse {
    next_sequence_token: String,
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or_default()
}

/// Event times in milliseconds. A synthetic record takes the time of the
/// closest real record before it, or after it when it leads the batch, so the
/// batch keeps its order and span. Only an all-synthetic batch uses the clock.
fn event_timestamps(batch: &[Record]) -> Vec<u64> {
    let mut previous = batch
        .iter()
        .map(|r| r.timestamp_micros)
        .find(|ts| *ts != 0)
        .map_or_else(now_millis, |ts| ts / 1000);
    batch
        .iter()
        .map(|record| {
            if record.timestamp_micros != 0 {
                previous = record.timestamp_micros / 1000;
            }
            previous
        })
        .collect()
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// Writes batches as JSON over HTTP, carrying the destination's sequence token
/// from one call to the next.
#[derive(Debug)]
pub struct HttpBatchWriter {
    client: reqwest::Client,
    config: HttpWriterConfig,
    sequence_token: String,
}

impl HttpBatchWriter {
    /// `sequence_token` is the token persisted by the previous run, or empty.
    pub fn new(config: HttpWriterConfig, sequence_token: String) -> Result<Self, WriteError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
            config,
            sequence_token,
        })
    }

    #[must_use]
    pub fn sequence_token(&self) -> &str {
        &self.sequence_token
    }

    fn body(&self, batch: &[Record]) -> Result<PutLogEvents<'_>, WriteError> {
        let log_events = batch
            .iter()
            .zip(event_timestamps(batch))
            .map(|(record, timestamp)| {
                Ok(LogEvent {
                    timestamp,
                    message: serde_json::to_string(record)?,
                })
            })
            .collect::<Result<Vec<_>, WriteError>>()?;
        Ok(PutLogEvents {
            log_group_name: &self.config.log_group,
            log_stream_name: &self.config.log_stream,
            sequence_token: Some(self.sequence_token.as_str()).filter(|t| !t.is_empty()),
            log_events,
        })
    }

    async fn send(&self, body: &PutLogEvents<'_>) -> Result<String, WriteError> {
        let mut attempts = 0;
        loop {
            attempts += 1;
            let mut request = self.client.post(&self.config.endpoint).json(body);
            if let Some(api_key) = &self.config.api_key {
                request = request.header(API_KEY_HEADER, api_key);
            }

            let err = match request.send().await {
                Ok(resp) if resp.status().is_success() => {
                    let text = resp.text().await?;
                    let parsed: PutLogEventsResponse = serde_json::from_str(&text)
                        .map_err(|e| WriteError::InvalidResponse(e.to_string()))?;
                    return Ok(parsed.next_sequence_token);
                }
                Ok(resp) => {
                    let status = resp.status();
                    let body = resp.text().await.unwrap_or_default();
                    let err = WriteError::Status { status, body };
                    if !is_retryable(status) {
                        error!("Batch rejected by destination: {err}");
                        return Err(err);
                    }
                    err
                }
                Err(e) => WriteError::Http(e),
            };

            if attempts >= self.config.max_attempts {
                error!("Failed to write batch after {attempts} attempts: {err}");
                return Err(err);
            }
            warn!("Batch write attempt {attempts} failed, retrying: {err}");
            tokio::time::sleep(self.config.retry_backoff).await;
        }
    }
}

#[async_trait]
impl BatchWriter for HttpBatchWriter {
    async fn write_batch(&mut self, batch: &[Record]) -> Result<WriteReceipt, WriteError> {
        let last_timestamp_micros = batch
            .iter()
            .rev()
            .map(|r| r.timestamp_micros)
            .find(|ts| *ts != 0)
            .unwrap_or(0);
        if batch.is_empty() {
            return Ok(WriteReceipt {
                sequence_token: self.sequence_token.clone(),
                last_timestamp_micros,
            });
        }

        let body = self.body(batch)?;
        let next = self.send(&body).await?;
        debug!("Wrote {} records to {}", batch.len(), self.config.log_stream);
        self.sequence_token = next;

        Ok(WriteReceipt {
            sequence_token: self.sequence_token.clone(),
            last_timestamp_micros,
        })
    }
}
