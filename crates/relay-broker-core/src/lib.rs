//! relay-broker-core
//!
//! In-memory task broker for relays polling an agent receiver.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, Task, TaskStatus, ResultType, TaskCounts）
//! - **ports**: 抽象化レイヤー（Clock, IdGenerator）
//! - **store**: TimedTaskStore（relay ごとのタスク、TTL による遅延削除）
//! - **repository**: TasksRepository（relay 単位のファサード、上限チェック）
//! - **reaper**: バックグラウンドの定期 sweep（任意）
//! - **bootstrap**: 起動時の relay config タスク投入
//! - **config** / **observability**: 設定ファイルとロガー初期化

pub mod bootstrap;
pub mod config;
pub mod domain;
pub mod error;
pub mod observability;
pub mod ports;
pub mod reaper;
pub mod repository;
pub mod store;

pub use config::{BrokerConfig, ConfigError};
pub use domain::{RelayId, ResultType, Task, TaskCounts, TaskId, TaskSpec, TaskStatus};
pub use error::{BrokerError, StoreError};
pub use reaper::{ReaperHandle, ReaperLoop};
pub use repository::TasksRepository;
pub use store::TimedTaskStore;
