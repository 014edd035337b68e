//! Task record handed out to relays.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::TaskId;

/// Lifecycle of a task.
///
/// State transitions:
/// - Pending -> Finished
/// - Pending -> Failed
///
/// Finished and Failed have no defined outgoing transition, but nothing forbids
/// reporting a result again; the record is simply replaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Pending,
    Finished,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Finished | TaskStatus::Failed)
    }
}

/// Classification of a reported result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResultType {
    Ok,
    Error,
}

/// What the relay is asked to do.
///
/// The broker never looks inside the payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskSpec {
    /// Ad-hoc fetch request.
    #[serde(rename = "FETCH_AD_HOC")]
    Fetch { payload: String, timeout_secs: u64 },

    /// Configuration push: a serial plus the packed configuration archive.
    RelayConfig { serial: String, tar_data: Vec<u8> },
}

/// One unit of work for one relay.
///
/// Design:
/// - Never mutated in place. A result report produces a new record via
///   [`Task::with_result`] and the store slot is overwritten.
/// - `status != Pending` implies `result_type` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub spec: TaskSpec,
    pub creation_timestamp: DateTime<Utc>,
    pub update_timestamp: DateTime<Utc>,
    pub status: TaskStatus,
    pub result_type: Option<ResultType>,
    pub result_payload: Option<String>,
}

impl Task {
    /// Create a pending task with a caller-supplied id.
    ///
    /// `now` only stamps the unstored record. `TasksRepository::store_task`
    /// restamps both timestamps from its own clock, and
    /// `TasksRepository::new_task` is the usual way to get an id.
    pub fn with_id(id: TaskId, spec: TaskSpec, now: DateTime<Utc>) -> Self {
        Self {
            id,
            spec,
            creation_timestamp: now,
            update_timestamp: now,
            status: TaskStatus::Pending,
            result_type: None,
            result_payload: None,
        }
    }

    /// Build the replacement record for a reported result.
    ///
    /// Everything except the result fields, the status and `update_timestamp`
    /// is copied. `update_timestamp` never moves before `creation_timestamp`.
    pub fn with_result(
        &self,
        result_type: ResultType,
        result_payload: String,
        status: TaskStatus,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: self.id.clone(),
            spec: self.spec.clone(),
            creation_timestamp: self.creation_timestamp,
            update_timestamp: now.max(self.creation_timestamp),
            status,
            result_type: Some(result_type),
            result_payload: Some(result_payload),
        }
    }

    /// Age of the last state change relative to `now`.
    pub fn idle_for(&self, now: DateTime<Utc>) -> chrono::Duration {
        now - self.update_timestamp
    }
}
