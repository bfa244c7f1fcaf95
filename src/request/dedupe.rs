//! Request Deduplicator
//!
//! Collapses identical outbound requests issued while one is already in
//! flight into a single shared future.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::events::{noop_sink, notify, ShapingEvent, SharedSink};

// == Request Key ==
/// Deterministic coalescing key built from method, URL and body.
///
/// Comparison is byte-exact and case-sensitive; the URL is not normalized.
/// Method and URL are length-prefixed so that no two distinct
/// `(method, url, body)` triples share a key. A missing body and an empty
/// body produce the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestKey(String);

impl RequestKey {
    pub fn new(url: &str, method: &str, body: Option<&str>) -> Self {
        Self(format!(
            "{}:{}{}:{}{}",
            method.len(),
            method,
            url.len(),
            url,
            body.unwrap_or("")
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A request future that any number of callers can await.
pub type Flight<T, E> = Shared<BoxFuture<'static, Result<T, E>>>;

struct InFlight<T, E> {
    generation: u64,
    flight: Flight<T, E>,
}

struct Registry<T, E> {
    in_flight: Mutex<HashMap<RequestKey, InFlight<T, E>>>,
    next_generation: AtomicU64,
    events: SharedSink,
}

impl<T, E> Registry<T, E> {
    fn settle(&self, key: &RequestKey, generation: u64) {
        let removed = {
            let mut in_flight = self.in_flight.lock();
            if in_flight
                .get(key)
                .is_some_and(|entry| entry.generation == generation)
            {
                in_flight.remove(key)
            } else {
                None
            }
        };
        // Dropped outside the lock: it may hold the last handle to a flight
        if removed.is_some() {
            trace!("Request settled: {}", key);
        }
    }
}

/// Settles a registration when dropped. Lives inside the flight future so
/// the registration goes away when the request completes or panics.
struct SettleGuard<T, E> {
    registry: Weak<Registry<T, E>>,
    key: RequestKey,
    generation: u64,
}

impl<T, E> Drop for SettleGuard<T, E> {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.settle(&self.key, self.generation);
        }
    }
}

// == Request Deduplicator ==
/// Cloning yields another handle to the same in-flight registry.
pub struct RequestDeduplicator<T, E> {
    registry: Arc<Registry<T, E>>,
}

impl<T, E> Clone for RequestDeduplicator<T, E> {
    fn clone(&self) -> Self {
        Self {
            registry: Arc::clone(&self.registry),
        }
    }
}

impl<T, E> fmt::Debug for RequestDeduplicator<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestDeduplicator")
            .field("in_flight", &self.in_flight())
            .finish()
    }
}

impl<T, E> Default for RequestDeduplicator<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> RequestDeduplicator<T, E> {
    pub fn new() -> Self {
        Self::with_events(noop_sink())
    }

    pub fn with_events(sink: SharedSink) -> Self {
        Self {
            registry: Arc::new(Registry {
                in_flight: Mutex::new(HashMap::new()),
                next_generation: AtomicU64::new(0),
                events: sink,
            }),
        }
    }

    /// Number of requests currently in flight.
    pub fn in_flight(&self) -> usize {
        self.registry.in_flight.lock().len()
    }

    pub fn is_in_flight(&self, key: &RequestKey) -> bool {
        self.registry.in_flight.lock().contains_key(key)
    }
}

impl<T, E> RequestDeduplicator<T, E>
where
    T: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    // == Dedupe ==
    /// Joins the flight registered under `key`, or calls `issue` once and
    /// registers its future.
    ///
    /// The check and the registration happen under one lock with no await in
    /// between, so concurrent callers can never both call `issue`. The
    /// registration is dropped as soon as the future settles, whether it
    /// succeeded or failed; every joined caller sees the same outcome.
    ///
    /// `issue` runs while the registry lock is held and must not call back
    /// into this deduplicator.
    pub fn dedupe<F, Fut>(&self, key: RequestKey, issue: F) -> Flight<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        let mut in_flight = self.registry.in_flight.lock();

        if let Some(existing) = in_flight.get(&key) {
            debug!("Joining in-flight request: {}", key);
            notify(
                &*self.registry.events,
                ShapingEvent::RequestCoalesced {
                    key: key.to_string(),
                },
            );
            return existing.flight.clone();
        }

        let generation = self.registry.next_generation.fetch_add(1, Ordering::Relaxed);
        let request = issue();
        // Built after `issue` so a panicking `issue` never settles under the lock
        let guard = SettleGuard {
            registry: Arc::downgrade(&self.registry),
            key: key.clone(),
            generation,
        };

        let flight = async move {
            let _guard = guard;
            request.await
        }
        .boxed()
        .shared();

        trace!("Issuing request: {}", key);
        in_flight.insert(
            key,
            InFlight {
                generation,
                flight: flight.clone(),
            },
        );
        flight
    }
}
