//! Priority Request Queue
//!
//! Requests ordered by a four-level priority, highest first; equal
//! priorities leave in the order they arrived.

use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::trace;

use crate::error::ShapingError;

// == Priority ==
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low = 1,
    Normal = 2,
    High = 3,
    Critical = 4,
}

impl Priority {
    /// Numeric rank: critical = 4 down to low = 1.
    pub fn rank(self) -> u8 {
        self as u8
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Normal => "normal",
            Priority::High => "high",
            Priority::Critical => "critical",
        }
    }
}

impl FromStr for Priority {
    type Err = ShapingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Priority::Low),
            "normal" => Ok(Priority::Normal),
            "high" => Ok(Priority::High),
            "critical" => Ok(Priority::Critical),
            other => Err(ShapingError::InvalidArgument(format!(
                "invalid priority '{}', expected one of low, normal, high, critical",
                other
            ))),
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// == Priority Item ==
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriorityItem {
    pub request_id: String,
    pub priority: Priority,
    pub enqueued_at: Instant,
}

// == Priority Queue ==
/// Kept sorted descending by priority rank.
#[derive(Debug, Default)]
pub struct PriorityQueue {
    items: VecDeque<PriorityItem>,
}

impl PriorityQueue {
    pub fn new() -> Self {
        Self::default()
    }

    // == Prioritize ==
    /// Enqueues a request behind every item of equal or higher priority.
    pub fn prioritize_request(&mut self, request_id: impl Into<String>, priority: Priority) {
        let item = PriorityItem {
            request_id: request_id.into(),
            priority,
            enqueued_at: Instant::now(),
        };
        let pos = self.items.partition_point(|queued| queued.priority >= priority);
        trace!(
            "Request {} queued at position {} with priority {}",
            item.request_id,
            pos,
            priority
        );
        self.items.insert(pos, item);
    }

    // == Next ==
    /// Pops the highest priority, oldest request. None when empty.
    pub fn get_next_request(&mut self) -> Option<PriorityItem> {
        self.items.pop_front()
    }

    pub fn peek(&self) -> Option<&PriorityItem> {
        self.items.front()
    }

    /// Items in dequeue order.
    pub fn snapshot(&self) -> Vec<PriorityItem> {
        self.items.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_priority_ordering() {
        let mut queue = PriorityQueue::new();
        queue.prioritize_request("a", Priority::Low);
        queue.prioritize_request("b", Priority::Critical);
        queue.prioritize_request("c", Priority::Normal);
        queue.prioritize_request("d", Priority::High);

        let order: Vec<Priority> = std::iter::from_fn(|| queue.get_next_request())
            .map(|item| item.priority)
            .collect();
        assert_eq!(
            order,
            vec![
                Priority::Critical,
                Priority::High,
                Priority::Normal,
                Priority::Low
            ]
        );
    }

    #[test]
    fn test_equal_priority_fifo() {
        let mut queue = PriorityQueue::new();
        queue.prioritize_request("n1", Priority::Normal);
        queue.prioritize_request("h1", Priority::High);
        queue.prioritize_request("n2", Priority::Normal);
        queue.prioritize_request("h2", Priority::High);
        queue.prioritize_request("n3", Priority::Normal);

        let ids: Vec<String> = queue.snapshot().into_iter().map(|i| i.request_id).collect();
        assert_eq!(ids, vec!["h1", "h2", "n1", "n2", "n3"]);
    }

    #[test]
    fn test_empty_queue_returns_none() {
        let mut queue = PriorityQueue::new();
        assert!(queue.is_empty());
        assert!(queue.peek().is_none());
        assert!(queue.get_next_request().is_none());
    }

    #[test]
    fn test_parse_priority() {
        assert_eq!("critical".parse::<Priority>().unwrap(), Priority::Critical);
        assert_eq!("low".parse::<Priority>().unwrap().rank(), 1);
        assert_eq!(Priority::Critical.rank(), 4);

        for bad in ["urgent", "HIGH", ""] {
            assert!(matches!(
                bad.parse::<Priority>(),
                Err(ShapingError::InvalidArgument(_))
            ));
        }
    }

    fn priority_strategy() -> impl Strategy<Value = Priority> {
        prop_oneof![
            Just(Priority::Low),
            Just(Priority::Normal),
            Just(Priority::High),
            Just(Priority::Critical),
        ]
    }

    proptest! {
        // Dequeue order equals a stable descending sort of the input.
        #[test]
        fn prop_matches_stable_sort(
            priorities in prop::collection::vec(priority_strategy(), 0..40)
        ) {
            let mut queue = PriorityQueue::new();
            for (i, p) in priorities.iter().enumerate() {
                queue.prioritize_request(i.to_string(), *p);
            }

            let mut expected: Vec<(usize, Priority)> =
                priorities.iter().copied().enumerate().collect();
            expected.sort_by(|a, b| b.1.cmp(&a.1));

            let actual: Vec<(usize, Priority)> = std::iter::from_fn(|| queue.get_next_request())
                .map(|item| (item.request_id.parse().unwrap(), item.priority))
                .collect();
            prop_assert_eq!(actual, expected);
        }
    }
}
