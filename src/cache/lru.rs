//! LRU Order Module
//!
//! Recency tracking for cache eviction. Keys run from least recently used
//! (head) to most recently used (tail).
//!
//! Two implementations are provided:
//! - [`ScanOrder`]: a `VecDeque` with linear-scan touches, fine for caches of
//!   tens to low hundreds of entries
//! - [`LinkedOrder`]: a slab-backed doubly linked list with a hash index,
//!   constant-time touches for larger caches

use std::collections::{HashMap, VecDeque};
use std::fmt;

// == Recency Order ==
/// Tracks access order for LRU eviction.
pub trait RecencyOrder: Default + fmt::Debug {
    /// Marks a key as most recently used, inserting it if new.
    fn touch(&mut self, key: &str);

    /// Removes a key. Returns false if the key was not tracked.
    fn remove(&mut self, key: &str) -> bool;

    /// Removes and returns the least recently used key.
    fn pop_lru(&mut self) -> Option<String>;

    /// Returns the least recently used key without removing it.
    fn peek_lru(&self) -> Option<&str>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn contains(&self, key: &str) -> bool;

    /// Keys from least to most recently used.
    fn keys(&self) -> Vec<String>;

    fn clear(&mut self);
}

// == Scan Order ==
/// `VecDeque`-backed order: front = least recent, back = most recent.
#[derive(Debug, Default)]
pub struct ScanOrder {
    order: VecDeque<String>,
}

impl RecencyOrder for ScanOrder {
    fn touch(&mut self, key: &str) {
        self.remove(key);
        self.order.push_back(key.to_string());
    }

    fn remove(&mut self, key: &str) -> bool {
        match self.order.iter().position(|k| k == key) {
            Some(pos) => {
                self.order.remove(pos);
                true
            }
            None => false,
        }
    }

    fn pop_lru(&mut self) -> Option<String> {
        self.order.pop_front()
    }

    fn peek_lru(&self) -> Option<&str> {
        self.order.front().map(String::as_str)
    }

    fn len(&self) -> usize {
        self.order.len()
    }

    fn contains(&self, key: &str) -> bool {
        self.order.iter().any(|k| k == key)
    }

    fn keys(&self) -> Vec<String> {
        self.order.iter().cloned().collect()
    }

    fn clear(&mut self) {
        self.order.clear();
    }
}

// == Linked Order ==
#[derive(Debug, Default)]
struct Node {
    key: String,
    prev: Option<usize>,
    next: Option<usize>,
}

/// Doubly linked list stored in a slab, indexed by key.
///
/// Freed slots are recycled through `free`; their key is left empty.
#[derive(Debug, Default)]
pub struct LinkedOrder {
    nodes: Vec<Node>,
    free: Vec<usize>,
    index: HashMap<String, usize>,
    head: Option<usize>,
    tail: Option<usize>,
}

impl LinkedOrder {
    fn alloc(&mut self, key: &str) -> usize {
        let node = Node {
            key: key.to_string(),
            prev: None,
            next: None,
        };
        match self.free.pop() {
            Some(idx) => {
                self.nodes[idx] = node;
                idx
            }
            None => {
                self.nodes.push(node);
                self.nodes.len() - 1
            }
        }
    }

    fn unlink(&mut self, idx: usize) {
        let prev = self.nodes[idx].prev;
        let next = self.nodes[idx].next;

        match prev {
            Some(p) => self.nodes[p].next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.nodes[n].prev = prev,
            None => self.tail = prev,
        }

        self.nodes[idx].prev = None;
        self.nodes[idx].next = None;
    }

    fn link_back(&mut self, idx: usize) {
        let old_tail = self.tail;
        self.nodes[idx].prev = old_tail;
        self.nodes[idx].next = None;

        match old_tail {
            Some(t) => self.nodes[t].next = Some(idx),
            None => self.head = Some(idx),
        }
        self.tail = Some(idx);
    }

    fn release(&mut self, idx: usize) -> String {
        self.unlink(idx);
        let key = std::mem::take(&mut self.nodes[idx].key);
        self.index.remove(&key);
        self.free.push(idx);
        key
    }
}

impl RecencyOrder for LinkedOrder {
    fn touch(&mut self, key: &str) {
        if let Some(&idx) = self.index.get(key) {
            if self.tail != Some(idx) {
                self.unlink(idx);
                self.link_back(idx);
            }
            return;
        }

        let idx = self.alloc(key);
        self.index.insert(key.to_string(), idx);
        self.link_back(idx);
    }

    fn remove(&mut self, key: &str) -> bool {
        match self.index.get(key).copied() {
            Some(idx) => {
                self.release(idx);
                true
            }
            None => false,
        }
    }

    fn pop_lru(&mut self) -> Option<String> {
        let idx = self.head?;
        Some(self.release(idx))
    }

    fn peek_lru(&self) -> Option<&str> {
        self.head.map(|idx| self.nodes[idx].key.as_str())
    }

    fn len(&self) -> usize {
        self.index.len()
    }

    fn contains(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    fn keys(&self) -> Vec<String> {
        let mut keys = Vec::with_capacity(self.len());
        let mut cursor = self.head;
        while let Some(idx) = cursor {
            keys.push(self.nodes[idx].key.clone());
            cursor = self.nodes[idx].next;
        }
        keys
    }

    fn clear(&mut self) {
        *self = Self::default();
    }
}
