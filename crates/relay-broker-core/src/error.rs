use thiserror::Error;

use crate::domain::TaskId;

/// Errors surfaced by the tasks repository.
///
/// At the HTTP boundary `TaskNotFound` maps to 404, `TooManyTasks` to 429, and
/// `InvalidConfiguration` must stop the service from starting.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BrokerError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("task not found: task_id={0}")]
    TaskNotFound(TaskId),

    #[error("too many tasks for relay (max {0})")]
    TooManyTasks(usize),
}

/// Errors surfaced by a single relay's timed task store.
///
/// An expired task is reported exactly like one that was never stored.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("task not found: task_id={0}")]
    NotFound(TaskId),
}

impl From<StoreError> for BrokerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(task_id) => BrokerError::TaskNotFound(task_id),
        }
    }
}
