//! Bootstrap - 起動時の relay config タスク投入

use tracing::{info, warn};

use crate::domain::{RelayId, TaskId, TaskSpec};
use crate::error::BrokerError;
use crate::repository::TasksRepository;

/// relay ごとに `RelayConfig` タスクを 1 つ登録
///
/// 上限に達している relay は warn を出してスキップします（次回の push で届く）。
/// 戻り値は `relay_ids` の順で、登録できた (relay, task id) の組。
pub fn seed_relay_configs<'a, I>(
    repository: &TasksRepository,
    relay_ids: I,
    serial: &str,
    tar_data: &[u8],
) -> Vec<(RelayId, TaskId)>
where
    I: IntoIterator<Item = &'a RelayId>,
{
    let mut seeded = Vec::new();
    for relay_id in relay_ids {
        let task = repository.new_task(TaskSpec::RelayConfig {
            serial: serial.to_string(),
            tar_data: tar_data.to_vec(),
        });
        match repository.store_task(relay_id, task) {
            Ok(stored) => seeded.push((relay_id.clone(), stored.id.clone())),
            Err(err @ BrokerError::TooManyTasks(_)) => {
                warn!(relay_id = %relay_id, error = %err, "skipping config push");
            }
            Err(err) => {
                warn!(relay_id = %relay_id, error = %err, "config push failed");
            }
        }
    }
    info!(seeded = seeded.len(), serial, "relay config tasks seeded");
    seeded
}
