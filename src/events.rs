//! Shaping Events
//!
//! Best-effort notification channel for cache and request-shaping activity.
//! Components emit events through an injected [`EventSink`]; a failing sink
//! is logged and ignored so it can never change the outcome of the
//! operation that produced the event.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

// == Shaping Event ==
/// Activity reported by the shaping components.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ShapingEvent {
    CacheHit { key: String },
    CacheMiss { key: String },
    CacheEviction { key: String },
    CacheExpired { key: String },
    RequestCoalesced { key: String },
    BatchReady { batch_id: String, size: usize },
    BatchFlushed { batch_id: String, size: usize },
    RateLimited { identifier: String },
}

// == Event Sink ==
/// Destination for shaping events.
pub trait EventSink: Send + Sync + fmt::Debug {
    fn emit(&self, event: &ShapingEvent) -> anyhow::Result<()>;
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl EventSink for NoopSink {
    fn emit(&self, _event: &ShapingEvent) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Writes every event to the `tracing` subscriber at debug level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: &ShapingEvent) -> anyhow::Result<()> {
        let payload = serde_json::to_string(event)?;
        debug!(target: "request_shaper::events", "{}", payload);
        Ok(())
    }
}

/// Shared handle to an event sink.
pub type SharedSink = Arc<dyn EventSink>;

/// Returns a sink that drops everything.
pub fn noop_sink() -> SharedSink {
    Arc::new(NoopSink)
}

/// Emits `event`, swallowing and logging any sink failure.
pub fn notify(sink: &dyn EventSink, event: ShapingEvent) {
    if let Err(err) = sink.emit(&event) {
        warn!("Event sink failed for {:?}: {:#}", event, err);
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use parking_lot::Mutex;

    /// Sink that records everything it receives.
    #[derive(Debug, Default)]
    pub struct RecordingSink {
        pub events: Mutex<Vec<ShapingEvent>>,
    }

    impl RecordingSink {
        pub fn taken(&self) -> Vec<ShapingEvent> {
            std::mem::take(&mut *self.events.lock())
        }
    }

    impl EventSink for RecordingSink {
        fn emit(&self, event: &ShapingEvent) -> anyhow::Result<()> {
            self.events.lock().push(event.clone());
            Ok(())
        }
    }

    /// Sink that always fails.
    #[derive(Debug, Default)]
    pub struct FailingSink;

    impl EventSink for FailingSink {
        fn emit(&self, _event: &ShapingEvent) -> anyhow::Result<()> {
            anyhow::bail!("sink offline")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{FailingSink, RecordingSink};
    use super::*;

    #[test]
    fn test_notify_delivers_event() {
        let sink = RecordingSink::default();
        notify(&sink, ShapingEvent::CacheHit { key: "a".into() });
        assert_eq!(sink.taken(), vec![ShapingEvent::CacheHit { key: "a".into() }]);
    }

    #[test]
    fn test_notify_swallows_sink_failure() {
        // Must not panic or propagate.
        notify(&FailingSink, ShapingEvent::RateLimited { identifier: "ip".into() });
    }

    #[test]
    fn test_tracing_sink_serializes() {
        let event = ShapingEvent::BatchReady {
            batch_id: "b1".into(),
            size: 3,
        };
        assert!(TracingSink.emit(&event).is_ok());

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"batch_ready\""));
        assert!(json.contains("\"size\":3"));
    }
}
