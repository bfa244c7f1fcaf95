//! Sliding-Window Rate Limiter
//!
//! Per-identifier timestamp log admitting at most `max_requests` within the
//! trailing window.
//!
//! Each identifier carries two independent pieces of state: the live
//! admission decision, which recovers as timestamps age out, and a
//! historical "blocked" marker set on the first denial that stays until
//! [`RateLimiter::unblock`] is called.

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::events::{noop_sink, notify, ShapingEvent, SharedSink};

/// Reason reported when the window is full.
pub const REASON_LIMIT_EXCEEDED: &str = "Rate limit exceeded";
/// Reason reported when an unconfigured identifier is denied.
pub const REASON_NOT_CONFIGURED: &str = "No rate limit configured";

// == Rate Decision ==
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RateDecision {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl RateDecision {
    fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    fn deny(reason: &str) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.to_string()),
        }
    }
}

#[derive(Debug)]
struct RateLimitWindow {
    max_requests: usize,
    window: Duration,
    timestamps: VecDeque<Instant>,
}

impl RateLimitWindow {
    fn purge(&mut self, now: Instant) {
        while let Some(&oldest) = self.timestamps.front() {
            if now.duration_since(oldest) >= self.window {
                self.timestamps.pop_front();
            } else {
                break;
            }
        }
    }
}

// == Rate Limiter ==
#[derive(Debug)]
pub struct RateLimiter {
    windows: HashMap<String, RateLimitWindow>,
    blocked: HashSet<String>,
    allow_by_default: bool,
    events: SharedSink,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(true)
    }
}

impl RateLimiter {
    /// `allow_by_default` decides unconfigured identifiers: `true` fails
    /// open, `false` fails closed.
    pub fn new(allow_by_default: bool) -> Self {
        Self {
            windows: HashMap::new(),
            blocked: HashSet::new(),
            allow_by_default,
            events: noop_sink(),
        }
    }

    pub fn with_events(mut self, sink: SharedSink) -> Self {
        self.events = sink;
        self
    }

    // == Configure ==
    /// Creates or replaces the window for `identifier`.
    ///
    /// Replacing a window resets its request log.
    pub fn set_rate_limit(
        &mut self,
        identifier: impl Into<String>,
        max_requests: usize,
        window: Duration,
    ) {
        let identifier = identifier.into();
        info!(
            "Rate limit set: identifier={}, max_requests={}, window={}ms",
            identifier,
            max_requests,
            window.as_millis()
        );
        self.windows.insert(
            identifier,
            RateLimitWindow {
                max_requests,
                window,
                timestamps: VecDeque::new(),
            },
        );
    }

    // == Check ==
    /// Admits or denies one request for `identifier` at the current time.
    ///
    /// Denied requests are not recorded, so they do not extend the window.
    pub fn check_rate_limit(&mut self, identifier: &str) -> RateDecision {
        let now = Instant::now();

        let Some(window) = self.windows.get_mut(identifier) else {
            return if self.allow_by_default {
                RateDecision::allow()
            } else {
                RateDecision::deny(REASON_NOT_CONFIGURED)
            };
        };

        window.purge(now);

        if window.timestamps.len() >= window.max_requests {
            if self.blocked.insert(identifier.to_string()) {
                warn!("Identifier {} blocked by rate limiter", identifier);
            }
            notify(
                &*self.events,
                ShapingEvent::RateLimited {
                    identifier: identifier.to_string(),
                },
            );
            return RateDecision::deny(REASON_LIMIT_EXCEEDED);
        }

        window.timestamps.push_back(now);
        RateDecision::allow()
    }

    /// Requests still admissible in the current window. None if the
    /// identifier is unconfigured.
    pub fn remaining(&mut self, identifier: &str) -> Option<usize> {
        let window = self.windows.get_mut(identifier)?;
        window.purge(Instant::now());
        Some(window.max_requests.saturating_sub(window.timestamps.len()))
    }

    /// Whether `identifier` has ever been denied.
    pub fn is_blocked(&self, identifier: &str) -> bool {
        self.blocked.contains(identifier)
    }

    /// Clears the historical blocked marker. Returns false if it was not set.
    pub fn unblock(&mut self, identifier: &str) -> bool {
        self.blocked.remove(identifier)
    }

    pub fn blocked_count(&self) -> usize {
        self.blocked.len()
    }

    pub fn allow_by_default(&self) -> bool {
        self.allow_by_default
    }
}
