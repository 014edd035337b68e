//! Simulated relays driving the broker concurrently.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use relay_broker_core::bootstrap::seed_relay_configs;
use relay_broker_core::{
    BrokerError, RelayId, ResultType, Task, TaskCounts, TaskSpec, TaskStatus, TasksRepository,
};
use serde::Serialize;
use tokio::task::JoinSet;
use tracing::{debug, info};

const POLL_INTERVAL: Duration = Duration::from_millis(20);
const SUBMIT_INTERVAL: Duration = Duration::from_millis(15);

pub struct Plan {
    pub relays: usize,
    pub fetches_per_relay: usize,
    pub serial: String,
}

#[derive(Debug, Default, Serialize)]
pub struct RelaySummary {
    pub submitted: usize,
    pub refused: usize,
    pub reported: usize,
    pub live: TaskCounts,
}

#[derive(Debug, Serialize)]
pub struct Summary {
    pub relays: BTreeMap<String, RelaySummary>,
}

pub async fn run(repository: Arc<TasksRepository>, plan: Plan) -> anyhow::Result<Summary> {
    let relay_ids: Vec<RelayId> = (0..plan.relays)
        .map(|i| RelayId::new(format!("relay-{i:02}")))
        .collect();

    // startup push, one per relay
    let seeded = seed_relay_configs(&repository, &relay_ids, &plan.serial, b"config-archive");
    info!(seeded = seeded.len(), "bootstrap done");

    let mut join_set = JoinSet::new();
    for relay_id in &relay_ids {
        let submitter = {
            let repository = Arc::clone(&repository);
            let relay_id = relay_id.clone();
            let fetches = plan.fetches_per_relay;
            async move { submit_fetches(&repository, &relay_id, fetches).await }
        };
        let poller = {
            let repository = Arc::clone(&repository);
            let relay_id = relay_id.clone();
            async move { poll_and_report(&repository, &relay_id).await }
        };
        let relay_id = relay_id.clone();
        join_set.spawn(async move {
            let ((submitted, refused), reported) = tokio::join!(submitter, poller);
            (relay_id, submitted, refused, reported)
        });
    }

    let mut relays = BTreeMap::new();
    while let Some(joined) = join_set.join_next().await {
        let (relay_id, submitted, refused, reported) = joined.context("relay task panicked")?;
        let live = repository.counts(&relay_id);
        relays.insert(
            relay_id.to_string(),
            RelaySummary {
                submitted,
                refused,
                reported,
                live,
            },
        );
    }
    Ok(Summary { relays })
}

/// Returns (accepted, refused).
async fn submit_fetches(repository: &TasksRepository, relay_id: &RelayId, count: usize) -> (usize, usize) {
    let mut accepted = 0;
    let mut refused = 0;
    for i in 0..count {
        let task = repository.new_task(TaskSpec::Fetch {
            payload: format!("fetch #{i} for {relay_id}"),
            timeout_secs: 60,
        });
        match repository.store_task(relay_id, task) {
            Ok(_) => accepted += 1,
            Err(BrokerError::TooManyTasks(_)) => refused += 1,
            Err(err) => debug!(relay_id = %relay_id, error = %err, "submit failed"),
        }
        tokio::time::sleep(SUBMIT_INTERVAL).await;
    }
    (accepted, refused)
}

/// Polls until a few consecutive polls find nothing pending.
async fn poll_and_report(repository: &TasksRepository, relay_id: &RelayId) -> usize {
    let mut reported = 0;
    let mut idle_polls = 0;
    while idle_polls < 5 {
        let pending = repository.get_tasks_with_status(relay_id, Some(TaskStatus::Pending));
        if pending.is_empty() {
            idle_polls += 1;
        } else {
            idle_polls = 0;
        }

        for task in pending {
            let (result_type, payload, status) = execute(&task);
            if repository
                .update_task(relay_id, &task.id, result_type, payload, status)
                .is_ok()
            {
                reported += 1;
            }
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
    reported
}

fn execute(task: &Task) -> (ResultType, String, TaskStatus) {
    match &task.spec {
        TaskSpec::RelayConfig { serial, tar_data } => (
            ResultType::Ok,
            format!("applied config serial {serial} ({} bytes)", tar_data.len()),
            TaskStatus::Finished,
        ),
        // some fetches fail so both terminal states show up
        TaskSpec::Fetch { payload, .. } if payload.len() % 3 == 0 => (
            ResultType::Error,
            format!("fetch failed: {payload}"),
            TaskStatus::Failed,
        ),
        TaskSpec::Fetch { payload, .. } => (
            ResultType::Ok,
            format!("fetched: {payload}"),
            TaskStatus::Finished,
        ),
    }
}
