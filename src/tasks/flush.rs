//! Batch Flush Task
//!
//! Background task that drains batches whose oldest request has waited past
//! the batch timeout and hands them to a consumer over a channel.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::request::{FlushedBatch, RequestBatcher};

/// Spawns a task that calls [`RequestBatcher::flush_overdue`] every
/// `interval` and sends each flushed batch to `tx`.
///
/// The task exits on its own once the receiving side is dropped.
pub fn spawn_batch_flush_task<R>(
    batcher: Arc<RwLock<RequestBatcher<R>>>,
    interval: Duration,
    tx: mpsc::UnboundedSender<FlushedBatch<R>>,
) -> JoinHandle<()>
where
    R: Send + Sync + 'static,
{
    tokio::spawn(async move {
        info!(
            "Starting batch flush task with interval of {}ms",
            interval.as_millis()
        );

        loop {
            tokio::time::sleep(interval).await;

            if tx.is_closed() {
                info!("Batch consumer gone, stopping flush task");
                return;
            }

            let flushed = batcher.write().await.flush_overdue();
            if !flushed.is_empty() {
                debug!("Flush task drained {} overdue batches", flushed.len());
            }

            for batch in flushed {
                if tx.send(batch).is_err() {
                    info!("Batch consumer gone, stopping flush task");
                    return;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_flush_task_forwards_overdue_batches() {
        let batcher = Arc::new(RwLock::new(RequestBatcher::<u32>::new()));
        let id = batcher
            .write()
            .await
            .create_batch("telemetry", 100, Duration::from_millis(200))
            .unwrap();
        batcher.write().await.add_request(&id, 7).unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = spawn_batch_flush_task(batcher.clone(), Duration::from_millis(50), tx);

        let flushed = rx.recv().await.unwrap();
        assert_eq!(flushed.batch_id, id);
        assert_eq!(flushed.name, "telemetry");
        assert_eq!(flushed.requests, vec![7]);
        assert_eq!(batcher.read().await.pending(&id).unwrap(), 0);

        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_task_stops_when_receiver_dropped() {
        let batcher = Arc::new(RwLock::new(RequestBatcher::<u32>::new()));
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = spawn_batch_flush_task(batcher, Duration::from_millis(10), tx);

        drop(rx);
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(handle.is_finished());
    }
}
