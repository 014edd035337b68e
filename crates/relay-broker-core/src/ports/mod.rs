//! Ports - 抽象化レイヤー
//!
//! 時刻と ID の生成はここを経由します。
//! trait なので、テストでは時刻を固定して sleep なしで期限切れを再現できます。

pub mod clock;
pub mod id_generator;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
