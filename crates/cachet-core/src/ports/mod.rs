//! Ports - 抽象化レイヤー
//!
//! 外部システム（Redis, PostgreSQL, メッセージブローカー）への
//! インターフェースを trait として定義し、実装の詳細を隠蔽する。
//! 実装は `impls`（開発用・テスト用の InMemory 実装）にある。

pub mod cache_store;
pub mod clock;
pub mod durable_store;
pub mod id_generator;
pub mod result_store;
pub mod task_broker;

pub use self::cache_store::{CacheError, CacheStore};
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::durable_store::{DurableError, DurableStore};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::result_store::{ResultStore, ResultStoreError};
pub use self::task_broker::{BrokerError, TaskBroker};
