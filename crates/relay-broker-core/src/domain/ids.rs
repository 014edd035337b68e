//! Domain identifiers (strongly-typed IDs).
//!
//! relay id と task id は不透明なトークンです。呼び出し側が渡すか、
//! task の場合は [`IdGenerator`](crate::ports::IdGenerator) が生成します。
//! broker は map のキーとして使うだけで、中身は解釈しません。
//!
//! ## Phantom Type パターン
//! `Id<T>` で共通実装を提供し、`T`（PhantomData のマーカー型）で
//! `RelayId` と `TaskId` を取り違えないようにしています。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use ulid::Ulid;

/// IdMarker は各 ID 型のマーカー trait
pub trait IdMarker: Send + Sync + 'static {
    /// Debug 出力で使う型名（例: "TaskId"）
    fn kind() -> &'static str;
}

/// ジェネリック ID 型
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id<T: IdMarker> {
    value: String,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            _marker: PhantomData,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }
}

impl<T: IdMarker> From<&str> for Id<T> {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl<T: IdMarker> From<String> for Id<T> {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

impl<T: IdMarker> fmt::Debug for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({:?})", T::kind(), self.value)
    }
}

/// Relay マーカー
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Relay {}

impl IdMarker for Relay {
    fn kind() -> &'static str {
        "RelayId"
    }
}

/// Task マーカー
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Task {}

impl IdMarker for Task {
    fn kind() -> &'static str {
        "TaskId"
    }
}

/// Relay ID（ポーリングするエージェントプロセス）
pub type RelayId = Id<Relay>;

/// Task ID（relay の store 内で一意）
pub type TaskId = Id<Task>;

impl Id<Task> {
    /// ULID の timestamp 部分が `now` の新しい ID
    pub(crate) fn generate(now: DateTime<Utc>) -> Self {
        let timestamp_ms = now.timestamp_millis().max(0) as u64;
        Self::new(Ulid::from_parts(timestamp_ms, rand::random()).to_string())
    }
}
