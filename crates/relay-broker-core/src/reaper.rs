//! ReaperLoop - 期限切れタスクの定期回収
//!
//! 読み取りは access 時の遅延 sweep だけで正しく動きます。
//! reaper は、ポーリングを止めた relay の期限切れタスクがメモリに残る時間を抑え、
//! 上限チェックが使う sweep 前の `len()` を実態に近づけます。
//!
//! # フロー
//! 1. interval ごとに TasksRepository::sweep_all() を呼ぶ
//! 2. shutdown が来たらループを抜ける

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::repository::TasksRepository;

pub struct ReaperLoop {
    repository: Arc<TasksRepository>,
    interval: Duration,
}

/// Running reaper.
/// - handle を drop してもループは止まらない。`shutdown_and_join` を呼ぶ
pub struct ReaperHandle {
    shutdown_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

impl ReaperLoop {
    pub fn new(repository: Arc<TasksRepository>, interval: Duration) -> Self {
        Self {
            repository,
            interval,
        }
    }

    /// 現在の tokio runtime 上で起動
    pub fn spawn(self) -> ReaperHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let join = tokio::spawn(self.run(shutdown_rx));
        ReaperHandle { shutdown_tx, join }
    }

    async fn run(self, mut shutdown_rx: watch::Receiver<bool>) {
        info!(interval_ms = self.interval.as_millis() as u64, "reaper started");
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            tokio::select! {
                changed = shutdown_rx.changed() => {
                    // sender gone counts as shutdown
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
                _ = ticker.tick() => {}
            }

            let removed = self.repository.sweep_all();
            if removed > 0 {
                info!(removed, "reaper removed expired tasks");
            } else {
                debug!("reaper pass found nothing to remove");
            }
        }
        info!("reaper stopped");
    }
}

impl ReaperHandle {
    pub fn request_shutdown(&self) {
        // ignore send error: the loop may already have exited
        let _ = self.shutdown_tx.send(true);
    }

    pub async fn shutdown_and_join(self) {
        self.request_shutdown();
        let _ = self.join.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{RelayId, TaskSpec};
    use crate::ports::FixedClock;
    use chrono::{TimeZone, Utc};

    #[tokio::test]
    async fn reaper_sweeps_stores_nobody_reads() {
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
        ));
        let repo = Arc::new(TasksRepository::with_clock(60, 4, clock.clone()).unwrap());
        let relay = RelayId::from("silent-relay");
        let task = repo.new_task(TaskSpec::Fetch {
            payload: "p".to_string(),
            timeout_secs: 5,
        });
        repo.store_task(&relay, task).unwrap();

        let handle = ReaperLoop::new(Arc::clone(&repo), Duration::from_millis(10)).spawn();
        clock.advance(chrono::Duration::seconds(61));

        let mut swept = false;
        for _ in 0..100 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            // held_len does not sweep, so only the reaper can bring it to zero
            if repo.held_len(&relay) == 0 {
                swept = true;
                break;
            }
        }
        handle.shutdown_and_join().await;
        assert!(swept, "reaper never removed the expired task");
    }

    #[tokio::test]
    async fn shutdown_stops_the_loop() {
        let repo = Arc::new(TasksRepository::new(60, 4).unwrap());
        let handle = ReaperLoop::new(repo, Duration::from_secs(3600)).spawn();

        tokio::time::timeout(Duration::from_secs(1), handle.shutdown_and_join())
            .await
            .expect("reaper did not stop");
    }
}
