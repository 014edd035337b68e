//! Per-relay task map with lazy TTL expiration.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, Utc};
use indexmap::IndexMap;
use tracing::debug;

use crate::domain::{RelayId, Task, TaskId};
use crate::error::{BrokerError, StoreError};
use crate::ports::Clock;

type Entries = IndexMap<TaskId, Arc<Task>>;

/// Validated ttl: strictly positive and representable.
pub(crate) fn ttl_from_seconds(ttl_seconds: i64) -> Result<Duration, BrokerError> {
    if ttl_seconds <= 0 {
        return Err(BrokerError::InvalidConfiguration(format!(
            "ttl_seconds must be > 0 (got {ttl_seconds})"
        )));
    }
    Duration::try_seconds(ttl_seconds).ok_or_else(|| {
        BrokerError::InvalidConfiguration(format!("ttl_seconds out of range (got {ttl_seconds})"))
    })
}

/// Tasks of exactly one relay.
///
/// Every access except [`len`](Self::len) first sweeps out tasks whose
/// `update_timestamp` is more than `ttl` in the past. A task whose age equals
/// the ttl is still live.
///
/// Design:
/// - No background timer is needed; the sweep is O(n) and n is bounded by the
///   repository's per-relay capacity.
/// - Entries are `Arc<Task>`. Readers keep the record they were handed even if
///   the slot is replaced afterwards.
/// - Insertion order is preserved; replacing a task keeps its position.
pub struct TimedTaskStore {
    relay_id: RelayId,
    ttl: Duration,
    clock: Arc<dyn Clock>,
    entries: Mutex<Entries>,
}

impl TimedTaskStore {
    pub fn new(relay_id: RelayId, ttl_seconds: i64, clock: Arc<dyn Clock>) -> Result<Self, BrokerError> {
        Ok(Self::from_parts(relay_id, ttl_from_seconds(ttl_seconds)?, clock))
    }

    /// Store with an already validated ttl.
    pub(crate) fn from_parts(relay_id: RelayId, ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            relay_id,
            ttl,
            clock,
            entries: Mutex::new(IndexMap::new()),
        }
    }

    pub fn relay_id(&self) -> &RelayId {
        &self.relay_id
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Look up a live task.
    pub fn get(&self, id: &TaskId) -> Result<Arc<Task>, StoreError> {
        let mut entries = self.lock();
        self.sweep_locked(&mut entries, self.clock.now());
        entries
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    /// Insert or replace unconditionally. Capacity is the caller's concern.
    pub fn set(&self, id: TaskId, task: impl Into<Arc<Task>>) {
        let mut entries = self.lock();
        self.sweep_locked(&mut entries, self.clock.now());
        entries.insert(id, task.into());
    }

    /// All live tasks in insertion order.
    pub fn values(&self) -> Vec<Arc<Task>> {
        let mut entries = self.lock();
        self.sweep_locked(&mut entries, self.clock.now());
        entries.values().cloned().collect()
    }

    pub fn contains(&self, id: &TaskId) -> bool {
        let mut entries = self.lock();
        self.sweep_locked(&mut entries, self.clock.now());
        entries.contains_key(id)
    }

    /// Number of entries currently held.
    ///
    /// Does not sweep, so tasks that expired since the last access are still
    /// counted.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop expired tasks now and return their ids.
    pub fn sweep(&self) -> Vec<TaskId> {
        let mut entries = self.lock();
        self.sweep_locked(&mut entries, self.clock.now())
    }

    /// Capacity check and insert under one lock.
    ///
    /// The check uses the unswept length, like [`len`](Self::len). On refusal
    /// the store is left untouched. Both timestamps of the stored record are
    /// set from the store's clock; whatever the caller put there is ignored.
    pub(crate) fn insert_within(&self, task: Task, max: usize) -> Result<Arc<Task>, BrokerError> {
        let mut entries = self.lock();
        if entries.len() >= max {
            return Err(BrokerError::TooManyTasks(max));
        }
        let now = self.clock.now();
        self.sweep_locked(&mut entries, now);

        let task = Arc::new(Task {
            creation_timestamp: now,
            update_timestamp: now,
            ..task
        });
        entries.insert(task.id.clone(), Arc::clone(&task));
        Ok(task)
    }

    /// Lookup and copy-on-write replacement under one lock.
    pub(crate) fn replace_with<F>(&self, id: &TaskId, replace: F) -> Result<Arc<Task>, StoreError>
    where
        F: FnOnce(&Task, DateTime<Utc>) -> Task,
    {
        let mut entries = self.lock();
        let now = self.clock.now();
        self.sweep_locked(&mut entries, now);

        let slot = entries
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        let replacement = Arc::new(replace(&**slot, now));
        *slot = Arc::clone(&replacement);
        Ok(replacement)
    }

    fn lock(&self) -> MutexGuard<'_, Entries> {
        // Critical sections never leave the map half-updated.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn sweep_locked(&self, entries: &mut Entries, now: DateTime<Utc>) -> Vec<TaskId> {
        let mut expired = Vec::new();
        entries.retain(|id, task| {
            let live = task.idle_for(now) <= self.ttl;
            if !live {
                expired.push(id.clone());
            }
            live
        });

        if !expired.is_empty() {
            debug!(relay_id = %self.relay_id, expired = ?expired, "expired tasks removed");
        }
        expired
    }
}
