//! Domain model - ドメインモデル（ids, task record, counts）

pub mod counts;
pub mod ids;
pub mod task;

pub use counts::TaskCounts;
pub use ids::{RelayId, TaskId};
pub use task::{ResultType, Task, TaskSpec, TaskStatus};
