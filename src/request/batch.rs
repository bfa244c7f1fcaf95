//! Request Batching Queue
//!
//! Accumulates requests per named batch and signals when a batch has reached
//! its size threshold. Flushing is left to the caller; batches that sit
//! longer than their timeout can be drained with
//! [`RequestBatcher::flush_overdue`], which the background flush task calls.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{ResourceKind, Result, ShapingError};
use crate::events::{noop_sink, notify, ShapingEvent, SharedSink};

// == Batch Id ==
/// Opaque identifier returned by [`RequestBatcher::create_batch`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct BatchId(String);

impl BatchId {
    fn generate() -> Self {
        Self(format!("batch_{}", Uuid::new_v4().simple()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for BatchId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for BatchId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for BatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Result of adding a request to a batch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchStatus<R> {
    /// True once the batch holds at least `max_size` requests
    pub ready: bool,
    /// Requests currently pending, oldest first
    pub requests: Vec<R>,
}

/// A batch drained by [`RequestBatcher::flush_overdue`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlushedBatch<R> {
    pub batch_id: BatchId,
    pub name: String,
    pub requests: Vec<R>,
}

#[derive(Debug)]
struct BatchQueue<R> {
    name: String,
    max_size: usize,
    timeout: Duration,
    pending: Vec<R>,
    oldest_pending_at: Option<Instant>,
}

impl<R> BatchQueue<R> {
    fn drain(&mut self) -> Vec<R> {
        self.oldest_pending_at = None;
        std::mem::take(&mut self.pending)
    }
}

// == Request Batcher ==
#[derive(Debug)]
pub struct RequestBatcher<R> {
    batches: HashMap<BatchId, BatchQueue<R>>,
    events: SharedSink,
}

impl<R> Default for RequestBatcher<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> RequestBatcher<R> {
    pub fn new() -> Self {
        Self {
            batches: HashMap::new(),
            events: noop_sink(),
        }
    }

    pub fn with_events(mut self, sink: SharedSink) -> Self {
        self.events = sink;
        self
    }

    // == Create Batch ==
    /// Registers a batch that becomes ready at `max_size` requests.
    pub fn create_batch(
        &mut self,
        name: impl Into<String>,
        max_size: usize,
        timeout: Duration,
    ) -> Result<BatchId> {
        if max_size < 1 {
            return Err(ShapingError::InvalidArgument(
                "max_size must be at least 1".to_string(),
            ));
        }

        let id = BatchId::generate();
        let name = name.into();
        info!(
            "Batch created: id={}, name={}, max_size={}, timeout={}ms",
            id,
            name,
            max_size,
            timeout.as_millis()
        );
        self.batches.insert(
            id.clone(),
            BatchQueue {
                name,
                max_size,
                timeout,
                pending: Vec::new(),
                oldest_pending_at: None,
            },
        );
        Ok(id)
    }

    fn batch_mut(&mut self, batch_id: &BatchId) -> Result<&mut BatchQueue<R>> {
        self.batches
            .get_mut(batch_id)
            .ok_or_else(|| ShapingError::not_found(ResourceKind::Batch, batch_id.as_str()))
    }

    // == Flush ==
    /// Drains a batch, returning its pending requests oldest first.
    pub fn flush(&mut self, batch_id: &BatchId) -> Result<Vec<R>> {
        let batch = self.batch_mut(batch_id)?;
        let requests = batch.drain();
        let size = requests.len();
        debug!("Batch {} flushed with {} requests", batch_id, size);
        notify(
            &*self.events,
            ShapingEvent::BatchFlushed {
                batch_id: batch_id.to_string(),
                size,
            },
        );
        Ok(requests)
    }

    /// Drains every non-empty batch whose oldest request has waited at least
    /// the batch timeout.
    pub fn flush_overdue(&mut self) -> Vec<FlushedBatch<R>> {
        let now = Instant::now();
        let mut flushed = Vec::new();

        for (id, batch) in self.batches.iter_mut() {
            let overdue = batch
                .oldest_pending_at
                .is_some_and(|since| now.duration_since(since) >= batch.timeout);
            if !overdue {
                continue;
            }

            let requests = batch.drain();
            debug!(
                "Batch {} timed out, flushing {} requests",
                id,
                requests.len()
            );
            notify(
                &*self.events,
                ShapingEvent::BatchFlushed {
                    batch_id: id.to_string(),
                    size: requests.len(),
                },
            );
            flushed.push(FlushedBatch {
                batch_id: id.clone(),
                name: batch.name.clone(),
                requests,
            });
        }
        flushed
    }

    /// Number of requests waiting in a batch.
    pub fn pending(&self, batch_id: &BatchId) -> Result<usize> {
        self.batches
            .get(batch_id)
            .map(|batch| batch.pending.len())
            .ok_or_else(|| ShapingError::not_found(ResourceKind::Batch, batch_id.as_str()))
    }

    pub fn batch_count(&self) -> usize {
        self.batches.len()
    }
}

impl<R: Clone> RequestBatcher<R> {
    // == Add Request ==
    /// Appends `request`; the returned status is ready once the batch holds
    /// at least `max_size` requests. The batch is not flushed here.
    pub fn add_request(&mut self, batch_id: &BatchId, request: R) -> Result<BatchStatus<R>> {
        let batch = self.batch_mut(batch_id)?;

        if batch.pending.is_empty() {
            batch.oldest_pending_at = Some(Instant::now());
        }
        batch.pending.push(request);

        let ready = batch.pending.len() >= batch.max_size;
        let status = BatchStatus {
            ready,
            requests: batch.pending.clone(),
        };

        if ready {
            debug!("Batch {} ready with {} requests", batch_id, status.requests.len());
            notify(
                &*self.events,
                ShapingEvent::BatchReady {
                    batch_id: batch_id.to_string(),
                    size: status.requests.len(),
                },
            );
        }
        Ok(status)
    }
}
