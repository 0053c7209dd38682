//! Keyed expiry queue with explicit arm/cancel handles.
//!
//! At most one timer is outstanding per key: arming a key replaces its
//! previous timer. A popped timer is gone, so each arm fires at most once.

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

use chrono::{DateTime, Utc};

/// Identifies one arm of a timer. Re-arming yields a new handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(u64);

#[derive(Debug)]
pub struct TimerQueue<K> {
    by_key: HashMap<K, (DateTime<Utc>, TimerHandle)>,
    by_deadline: BTreeMap<(DateTime<Utc>, TimerHandle), K>,
    next_handle: u64,
}

impl<K> TimerQueue<K>
where
    K: Clone + Eq + Hash,
{
    pub fn new() -> Self {
        Self {
            by_key: HashMap::new(),
            by_deadline: BTreeMap::new(),
            next_handle: 0,
        }
    }

    /// Arm (or re-arm) the timer for `key`, cancelling any outstanding one.
    pub fn arm(&mut self, key: K, deadline: DateTime<Utc>) -> TimerHandle {
        self.cancel(&key);
        let handle = TimerHandle(self.next_handle);
        self.next_handle += 1;
        self.by_deadline.insert((deadline, handle), key.clone());
        self.by_key.insert(key, (deadline, handle));
        handle
    }

    /// Cancel the outstanding timer for `key`. Returns whether one existed.
    pub fn cancel(&mut self, key: &K) -> bool {
        match self.by_key.remove(key) {
            Some(slot) => {
                self.by_deadline.remove(&slot);
                true
            }
            None => false,
        }
    }

    /// Earliest outstanding deadline.
    pub fn next_deadline(&self) -> Option<DateTime<Utc>> {
        self.by_deadline.keys().next().map(|(deadline, _)| *deadline)
    }

    /// Remove and return every timer whose deadline lies strictly before `now`.
    pub fn pop_expired(&mut self, now: DateTime<Utc>) -> Vec<(K, TimerHandle)> {
        let mut fired = Vec::new();
        while let Some(entry) = self.by_deadline.first_entry() {
            let (deadline, handle) = *entry.key();
            if deadline >= now {
                break;
            }
            let key = entry.remove();
            self.by_key.remove(&key);
            fired.push((key, handle));
        }
        fired
    }

    pub fn len(&self) -> usize {
        self.by_key.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_key.is_empty()
    }
}

impl<K> Default for TimerQueue<K>
where
    K: Clone + Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}
