//! Fan-out Forwarder
//!
//! Takes an acknowledged event batch and delivers the whole batch once per
//! entry to the destination registered for that entry's page id.
//!
//! # Delivery model
//!
//! - Entries are forwarded concurrently; there is no ordering between entries
//!   or between tenants.
//! - Each forward has its own deadline. A timeout and a transport error are
//!   treated alike: the attempt is dead-lettered and siblings are unaffected.
//! - Any HTTP status from the tenant counts as delivered and is not retried.
//! - Entries without a page id, and pages without an active route, are skipped
//!   without a dead-letter record. They are configuration gaps, not delivery
//!   failures.
//!
//! # Background execution
//!
//! [`Forwarder::submit`] detaches the work onto a task tracker and returns
//! immediately; the caller never awaits delivery. [`Forwarder::shutdown`] gives
//! tracked work a grace period before the process exits.

use crate::dead_letter::DeadLetterRecorder;
use crate::envelope::EventBatch;
use crate::http::send_to_destination;
use crate::metrics_defs::{FORWARD_DELIVERED, FORWARD_DURATION, FORWARD_FAILED, FORWARD_SKIPPED};
use crate::resolver::RouteResolver;
use http::StatusCode;
use shared::{counter, histogram};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tokio_util::task::TaskTracker;

/// What happened to one entry of a batch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ForwardOutcome {
    MissingPageId,
    NoRoute {
        page_id: String,
    },
    LookupFailed {
        page_id: String,
    },
    Delivered {
        page_id: String,
        status: StatusCode,
    },
    DeadLettered {
        page_id: String,
        error: String,
    },
}

#[derive(Clone)]
pub struct Forwarder {
    resolver: RouteResolver,
    dead_letters: DeadLetterRecorder,
    client: reqwest::Client,
    timeout: Duration,
    tasks: TaskTracker,
}

impl Forwarder {
    pub fn new(
        resolver: RouteResolver,
        dead_letters: DeadLetterRecorder,
        client: reqwest::Client,
        timeout: Duration,
    ) -> Self {
        Self {
            resolver,
            dead_letters,
            client,
            timeout,
            tasks: TaskTracker::new(),
        }
    }

    /// Starts forwarding `batch` in the background. The caller does not await it.
    pub fn submit(&self, batch: EventBatch) {
        let forwarder = self.clone();
        self.tasks.spawn(async move {
            let started = Instant::now();
            let outcomes = forwarder.forward_batch(Arc::new(batch)).await;
            let delivered = outcomes
                .iter()
                .filter(|o| matches!(o, ForwardOutcome::Delivered { .. }))
                .count();
            tracing::debug!(
                entries = outcomes.len(),
                delivered,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Batch forwarding complete"
            );
        });
    }

    /// Forwards every entry concurrently and waits for all of them to settle.
    ///
    /// Never fails: per-entry problems are reported in the returned outcomes.
    pub async fn forward_batch(&self, batch: Arc<EventBatch>) -> Vec<ForwardOutcome> {
        let mut join_set = JoinSet::new();

        for page_id in batch.page_ids().iter().cloned() {
            let forwarder = self.clone();
            let batch = batch.clone();
            join_set.spawn(async move {
                forwarder.forward_entry(page_id, &batch).await
            });
        }

        let mut outcomes = Vec::with_capacity(batch.page_ids().len());
        while let Some(result) = join_set.join_next().await {
            match result {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => tracing::error!("Forward task panicked: {}", e),
            }
        }
        outcomes
    }

    async fn forward_entry(&self, page_id: Option<String>, batch: &EventBatch) -> ForwardOutcome {
        let Some(page_id) = page_id else {
            tracing::warn!("Entry missing page ID, skipping");
            counter!(FORWARD_SKIPPED, "reason" => "missing_page_id").increment(1);
            return ForwardOutcome::MissingPageId;
        };

        let destination = match self.resolver.resolve_destination(&page_id).await {
            Ok(Some(destination)) => destination,
            Ok(None) => {
                tracing::warn!(page_id = %page_id, "No route found for page");
                counter!(FORWARD_SKIPPED, "reason" => "no_route").increment(1);
                return ForwardOutcome::NoRoute { page_id };
            }
            Err(e) => {
                tracing::error!(
                    page_id = %page_id,
                    error = %e,
                    "Route lookup failed, skipping entry"
                );
                counter!(FORWARD_SKIPPED, "reason" => "lookup_failed").increment(1);
                return ForwardOutcome::LookupFailed { page_id };
            }
        };

        let started = Instant::now();
        let result = send_to_destination(
            &self.client,
            &destination,
            &page_id,
            batch.body().clone(),
            self.timeout,
        )
        .await;
        histogram!(FORWARD_DURATION).record(started.elapsed().as_secs_f64());

        match result {
            Ok(status) => {
                counter!(FORWARD_DELIVERED).increment(1);
                tracing::info!(
                    page_id = %page_id,
                    destination = %destination,
                    status = status.as_u16(),
                    "Forwarded event batch"
                );
                ForwardOutcome::Delivered { page_id, status }
            }
            Err(e) => {
                let error = e.to_string();
                counter!(FORWARD_FAILED).increment(1);
                tracing::error!(
                    page_id = %page_id,
                    destination = %destination,
                    error = %error,
                    "Failed to forward event batch"
                );
                self.dead_letters
                    .record_failure(&page_id, &destination, &batch.payload(), &error)
                    .await;
                ForwardOutcome::DeadLettered { page_id, error }
            }
        }
    }

    /// Waits up to `grace` for submitted batches to finish. Returns whether
    /// everything completed in time.
    pub async fn shutdown(&self, grace: Duration) -> bool {
        self.tasks.close();
        let pending = self.tasks.len();
        if pending > 0 {
            tracing::info!(pending, "Waiting for in-flight forwards");
        }

        match tokio::time::timeout(grace, self.tasks.wait()).await {
            Ok(()) => true,
            Err(_) => {
                tracing::warn!(
                    pending = self.tasks.len(),
                    "Shutdown grace period elapsed with forwards still in flight"
                );
                false
            }
        }
    }
}
