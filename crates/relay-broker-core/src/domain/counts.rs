use serde::{Deserialize, Serialize};

use super::{Task, TaskStatus};

/// Per-status counts of a relay's live tasks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskCounts {
    pub pending: usize,
    pub finished: usize,
    pub failed: usize,
}

impl TaskCounts {
    pub fn total(&self) -> usize {
        self.pending + self.finished + self.failed
    }

    fn record(&mut self, task: &Task) {
        match task.status {
            TaskStatus::Pending => self.pending += 1,
            TaskStatus::Finished => self.finished += 1,
            TaskStatus::Failed => self.failed += 1,
        }
    }
}

impl<'a> FromIterator<&'a Task> for TaskCounts {
    fn from_iter<I: IntoIterator<Item = &'a Task>>(iter: I) -> Self {
        let mut counts = TaskCounts::default();
        for task in iter {
            counts.record(task);
        }
        counts
    }
}
