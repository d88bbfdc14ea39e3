//! Dead-letter recording for forwards that timed out or failed in transport.
//!
//! Records are written once and never touched again here; a separate retry
//! consumer reads `next_retry_at` and owns every later state transition.

use crate::errors::StorageError;
use crate::metrics_defs::{DEAD_LETTER_PERSIST_FAILED, DEAD_LETTER_RECORDED};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use shared::counter;
use std::sync::Arc;
use std::time::Duration;

/// Persisted shape consumed by the retry job.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FailedWebhookEvent {
    pub page_id: String,
    pub destination_url: String,
    /// The full inbound batch exactly as received.
    pub payload: String,
    pub error_message: String,
    pub next_retry_at: DateTime<Utc>,
}

#[async_trait]
pub trait DeadLetterStore: Send + Sync {
    async fn insert_failed_event(&self, event: &FailedWebhookEvent) -> Result<(), StorageError>;
}

#[derive(Clone)]
pub struct DeadLetterRecorder {
    store: Arc<dyn DeadLetterStore>,
    retry_delay: Duration,
}

impl DeadLetterRecorder {
    pub fn new(store: Arc<dyn DeadLetterStore>, retry_delay: Duration) -> Self {
        Self { store, retry_delay }
    }

    /// Best effort: a failed insert is logged and dropped.
    pub async fn record_failure(
        &self,
        page_id: &str,
        destination_url: &str,
        payload: &str,
        error_message: &str,
    ) {
        let retry_delay =
            chrono::Duration::from_std(self.retry_delay).unwrap_or(chrono::Duration::MAX);
        let next_retry_at = Utc::now()
            .checked_add_signed(retry_delay)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        let event = FailedWebhookEvent {
            page_id: page_id.to_string(),
            destination_url: destination_url.to_string(),
            payload: payload.to_string(),
            error_message: error_message.to_string(),
            next_retry_at,
        };

        match self.store.insert_failed_event(&event).await {
            Ok(()) => {
                counter!(DEAD_LETTER_RECORDED).increment(1);
                tracing::info!(
                    page_id,
                    destination = destination_url,
                    %next_retry_at,
                    "Stored failed event for retry"
                );
            }
            Err(e) => {
                counter!(DEAD_LETTER_PERSIST_FAILED).increment(1);
                tracing::error!(
                    page_id,
                    destination = destination_url,
                    error = %e,
                    "Failed to store event in dead letter queue"
                );
            }
        }
    }
}
