//! Single-slot debounce queue keyed by source name.
//!
//! # Invariants
//!
//! 1. At most one pending write per key. Scheduling replaces the previous
//!    entry (last-write-wins) and re-arms its deadline.
//! 2. [`DebounceQueue::take_due`] yields entries ordered by deadline, then by
//!    scheduling order, so writes become visible in the order they were made.
//! 3. A pending entry remembers the registration generation and the writer
//!    that scheduled it; the host uses both to refuse stale writes.

use ahash::AHashMap;
use formbind_core::Value;
use web_time::{Duration, Instant};

/// Debounce setting of a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Debounce {
    /// Commit immediately.
    #[default]
    Off,
    /// Use the host's default delay.
    Default,
    /// Use this delay.
    After(Duration),
}

impl Debounce {
    /// Effective delay, or `None` to commit immediately.
    #[must_use]
    pub fn resolve(self, default: Duration) -> Option<Duration> {
        let delay = match self {
            Self::Off => return None,
            Self::Default => default,
            Self::After(delay) => delay,
        };
        (!delay.is_zero()).then_some(delay)
    }
}

impl From<bool> for Debounce {
    fn from(enabled: bool) -> Self {
        if enabled { Self::Default } else { Self::Off }
    }
}

impl From<Duration> for Debounce {
    fn from(delay: Duration) -> Self {
        Self::After(delay)
    }
}

/// Milliseconds.
impl From<u64> for Debounce {
    fn from(ms: u64) -> Self {
        Self::After(Duration::from_millis(ms))
    }
}

/// Identifier of a [`SourceWriter`](crate::SourceWriter).
pub type WriterId = u64;

/// A write waiting for its deadline.
#[derive(Debug, Clone)]
pub struct PendingWrite {
    pub generation: u64,
    pub value: Value,
    pub due: Instant,
    pub writer: Option<WriterId>,
    seq: u64,
}

/// Pending debounced writes.
#[derive(Debug, Default)]
pub struct DebounceQueue {
    pending: AHashMap<String, PendingWrite>,
    next_seq: u64,
}

impl DebounceQueue {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm (or re-arm) the slot for `key`. Returns the write it replaced.
    pub fn schedule(
        &mut self,
        key: &str,
        generation: u64,
        value: Value,
        due: Instant,
        writer: Option<WriterId>,
    ) -> Option<PendingWrite> {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.pending.insert(
            key.to_owned(),
            PendingWrite {
                generation,
                value,
                due,
                writer,
                seq,
            },
        )
    }

    /// Drop the pending write for `key`.
    pub fn cancel(&mut self, key: &str) -> Option<PendingWrite> {
        self.pending.remove(key)
    }

    /// Drop the pending write for `key` only if `writer` scheduled it.
    pub fn cancel_from(&mut self, key: &str, writer: WriterId) -> Option<PendingWrite> {
        if self.pending.get(key)?.writer == Some(writer) {
            self.pending.remove(key)
        } else {
            None
        }
    }

    /// Remove and return every write whose deadline is at or before `now`.
    pub fn take_due(&mut self, now: Instant) -> Vec<(String, PendingWrite)> {
        let due_keys: Vec<String> = self
            .pending
            .iter()
            .filter(|(_, write)| write.due <= now)
            .map(|(key, _)| key.clone())
            .collect();
        self.take_keys(due_keys)
    }

    /// Remove and return pending writes regardless of deadline; all of them,
    /// or just the one for `key`.
    pub fn take_all(&mut self, key: Option<&str>) -> Vec<(String, PendingWrite)> {
        let keys: Vec<String> = match key {
            Some(key) => self
                .pending
                .contains_key(key)
                .then(|| key.to_owned())
                .into_iter()
                .collect(),
            None => self.pending.keys().cloned().collect(),
        };
        self.take_keys(keys)
    }

    /// Earliest deadline, if anything is pending.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.values().map(|write| write.due).min()
    }

    #[must_use]
    pub fn is_pending(&self, key: &str) -> bool {
        self.pending.contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    fn take_keys(&mut self, keys: Vec<String>) -> Vec<(String, PendingWrite)> {
        let mut taken: Vec<(String, PendingWrite)> = keys
            .into_iter()
            .filter_map(|key| self.pending.remove(&key).map(|write| (key, write)))
            .collect();
        taken.sort_by_key(|(_, write)| (write.due, write.seq));
        taken
    }
}
