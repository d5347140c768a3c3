//! Sample ledger
//!
//! Bounded FIFO of the sample records one publisher printed, drained by
//! subscriber-side check strategies to cross-check reliability and
//! ordering. Capacity exhaustion silently stops further recording.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use super::MAX_SAMPLES_SAVED;

/// Cloneable handle to one publisher's bounded sample FIFO.
#[derive(Clone)]
pub struct SampleLedger {
    inner: Arc<Mutex<VecDeque<String>>>,
    capacity: usize,
}

impl SampleLedger {
    pub fn new() -> Self {
        Self::with_capacity(MAX_SAMPLES_SAVED)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            capacity,
        }
    }

    /// Record one sample. Dropped without error once the ledger is full.
    pub fn push(&self, record: String) {
        let mut queue = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        if queue.len() < self.capacity {
            queue.push_back(record);
        }
    }

    /// Remove and return the oldest record.
    pub fn pop(&self) -> Option<String> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
    }

    /// Copy of the current contents in emission order, without consuming.
    pub fn snapshot(&self) -> Vec<String> {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SampleLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fifo_order_preserved() {
        let ledger = SampleLedger::new();
        ledger.push("a".into());
        ledger.push("b".into());
        ledger.push("c".into());
        assert_eq!(ledger.pop().as_deref(), Some("a"));
        assert_eq!(ledger.pop().as_deref(), Some("b"));
        assert_eq!(ledger.pop().as_deref(), Some("c"));
        assert_eq!(ledger.pop(), None);
    }

    #[test]
    fn overflow_drops_silently_at_capacity() {
        let ledger = SampleLedger::new();
        for i in 0..(MAX_SAMPLES_SAVED + 100) {
            ledger.push(format!("{i}"));
        }
        assert_eq!(ledger.len(), MAX_SAMPLES_SAVED);
        // The first records survive; late arrivals are the ones dropped.
        assert_eq!(ledger.pop().as_deref(), Some("0"));
        assert_eq!(ledger.snapshot().last().map(String::as_str), Some("499"));
    }
}
