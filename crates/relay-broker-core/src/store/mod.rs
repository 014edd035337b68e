//! Per-relay task storage.

mod timed;

pub use timed::TimedTaskStore;
pub(crate) use timed::ttl_from_seconds;
