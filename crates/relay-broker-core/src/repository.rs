//! Relay-scoped façade over the per-relay timed stores.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use crate::config::BrokerConfig;
use crate::domain::{RelayId, ResultType, Task, TaskCounts, TaskId, TaskSpec, TaskStatus};
use crate::error::BrokerError;
use crate::ports::{Clock, IdGenerator, SystemClock, UlidGenerator};
use crate::store::{TimedTaskStore, ttl_from_seconds};

/// Task broker shared by every request handler.
///
/// Design:
/// - One instance per process, constructed at startup and passed around as
///   `Arc<TasksRepository>`.
/// - The relay map and each relay's store have their own lock. The map lock is
///   only held long enough to find or create a store.
/// - Stores are created on the first `store_task` for a relay and never
///   removed.
pub struct TasksRepository {
    ttl_seconds: i64,
    ttl: chrono::Duration,
    max_tasks_per_relay: usize,
    clock: Arc<dyn Clock>,
    id_generator: Arc<dyn IdGenerator>,
    stores: Mutex<HashMap<RelayId, Arc<TimedTaskStore>>>,
}

impl TasksRepository {
    /// Repository on the host clock.
    pub fn new(ttl_seconds: i64, max_tasks_per_relay: usize) -> Result<Self, BrokerError> {
        Self::with_clock(ttl_seconds, max_tasks_per_relay, Arc::new(SystemClock))
    }

    pub fn with_clock(
        ttl_seconds: i64,
        max_tasks_per_relay: usize,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, BrokerError> {
        let id_generator = Arc::new(UlidGenerator::new(Arc::clone(&clock)));
        Self::with_ports(ttl_seconds, max_tasks_per_relay, clock, id_generator)
    }

    pub fn with_ports(
        ttl_seconds: i64,
        max_tasks_per_relay: usize,
        clock: Arc<dyn Clock>,
        id_generator: Arc<dyn IdGenerator>,
    ) -> Result<Self, BrokerError> {
        let ttl = ttl_from_seconds(ttl_seconds)?;
        Ok(Self {
            ttl_seconds,
            ttl,
            max_tasks_per_relay,
            clock,
            id_generator,
            stores: Mutex::new(HashMap::new()),
        })
    }

    /// Repository from a validated configuration.
    pub fn from_config(config: &BrokerConfig, clock: Arc<dyn Clock>) -> Result<Self, BrokerError> {
        config.validate()?;
        Self::with_clock(config.ttl_seconds, config.max_tasks_per_relay, clock)
    }

    pub fn ttl_seconds(&self) -> i64 {
        self.ttl_seconds
    }

    pub fn max_tasks_per_relay(&self) -> usize {
        self.max_tasks_per_relay
    }

    /// Pending task with a generated id, stamped with this repository's clock.
    pub fn new_task(&self, spec: TaskSpec) -> Task {
        Task::with_id(self.id_generator.generate_task_id(), spec, self.clock.now())
    }

    /// All live tasks of a relay.
    ///
    /// A relay that never received a task has none; that is not an error.
    pub fn get_tasks(&self, relay_id: &RelayId) -> Vec<Arc<Task>> {
        match self.store(relay_id) {
            Some(store) => store.values(),
            None => {
                warn!(relay_id = %relay_id, "no tasks recorded for relay");
                Vec::new()
            }
        }
    }

    /// Live tasks of a relay, optionally restricted to one status.
    pub fn get_tasks_with_status(&self, relay_id: &RelayId, status: Option<TaskStatus>) -> Vec<Arc<Task>> {
        let tasks = self.get_tasks(relay_id);
        match status {
            Some(status) => tasks.into_iter().filter(|t| t.status == status).collect(),
            None => tasks,
        }
    }

    pub fn get_task(&self, relay_id: &RelayId, task_id: &TaskId) -> Result<Arc<Task>, BrokerError> {
        let store = self
            .store(relay_id)
            .ok_or_else(|| BrokerError::TaskNotFound(task_id.clone()))?;
        Ok(store.get(task_id)?)
    }

    /// Record a new task for a relay.
    ///
    /// The stored record is stamped with this repository's clock; the
    /// timestamps carried by `task` are not used.
    ///
    /// Refused with `TooManyTasks` when the relay's store already holds
    /// `max_tasks_per_relay` entries. The count is taken before expired entries
    /// are swept, so a relay whose tasks have silently expired may still be
    /// refused until the next read.
    pub fn store_task(&self, relay_id: &RelayId, task: Task) -> Result<Arc<Task>, BrokerError> {
        let store = self.store_or_create(relay_id);
        let task_id = task.id.clone();

        match store.insert_within(task, self.max_tasks_per_relay) {
            Ok(stored) => {
                info!(relay_id = %relay_id, task_id = %task_id, "task stored");
                Ok(stored)
            }
            Err(err) => {
                warn!(relay_id = %relay_id, task_id = %task_id, error = %err, "task refused");
                Err(err)
            }
        }
    }

    /// Record a relay's result for a task.
    ///
    /// The stored record is replaced by a copy carrying the new status and
    /// result and a fresh `update_timestamp`, which also restarts its ttl.
    /// Repeating the call simply replaces the record again.
    pub fn update_task(
        &self,
        relay_id: &RelayId,
        task_id: &TaskId,
        result_type: ResultType,
        result_payload: impl Into<String>,
        status: TaskStatus,
    ) -> Result<Arc<Task>, BrokerError> {
        let store = self
            .store(relay_id)
            .ok_or_else(|| BrokerError::TaskNotFound(task_id.clone()))?;
        let result_payload = result_payload.into();

        let updated = store.replace_with(task_id, |current, now| {
            current.with_result(result_type, result_payload, status, now)
        })?;

        info!(
            relay_id = %relay_id,
            task_id = %task_id,
            status = ?updated.status,
            result_type = ?result_type,
            "task updated"
        );
        Ok(updated)
    }

    /// Per-status counts of a relay's live tasks.
    pub fn counts(&self, relay_id: &RelayId) -> TaskCounts {
        self.store(relay_id)
            .map(|store| store.values().iter().map(|t| &**t).collect())
            .unwrap_or_default()
    }

    /// Entries held for a relay, including expired ones not yet swept.
    pub fn held_len(&self, relay_id: &RelayId) -> usize {
        self.store(relay_id).map(|store| store.len()).unwrap_or(0)
    }

    /// Relays that have a store, in no particular order.
    pub fn relay_ids(&self) -> Vec<RelayId> {
        self.lock().keys().cloned().collect()
    }

    /// Sweep every relay's store; returns how many tasks were dropped.
    pub fn sweep_all(&self) -> usize {
        let stores: Vec<Arc<TimedTaskStore>> = self.lock().values().cloned().collect();
        stores.iter().map(|store| store.sweep().len()).sum()
    }

    fn store(&self, relay_id: &RelayId) -> Option<Arc<TimedTaskStore>> {
        self.lock().get(relay_id).cloned()
    }

    fn store_or_create(&self, relay_id: &RelayId) -> Arc<TimedTaskStore> {
        let mut stores = self.lock();
        if let Some(store) = stores.get(relay_id) {
            return Arc::clone(store);
        }

        debug!(relay_id = %relay_id, "creating task store for relay");
        let store = Arc::new(TimedTaskStore::from_parts(
            relay_id.clone(),
            self.ttl,
            Arc::clone(&self.clock),
        ));
        stores.insert(relay_id.clone(), Arc::clone(&store));
        store
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<RelayId, Arc<TimedTaskStore>>> {
        self.stores.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
