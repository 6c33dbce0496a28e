//! Impls - ports の実装（開発用・テスト用）
//!
//! # 含まれる実装
//! - **InMemoryCacheStore**: TTL 付きキャッシュ
//! - **InMemoryTaskBroker**: 遅延 eligible 対応のタスクキュー
//! - **InMemoryResultStore**: TTL 付きの結果保存
//! - **InMemoryRecordStore**: DurableStore のデモ実装
//!
//! 本番用（Redis, PostgreSQL など）の実装は別クレートに置く想定。

pub mod memory_broker;
pub mod memory_cache;
pub mod memory_records;
pub mod memory_results;

pub use self::memory_broker::InMemoryTaskBroker;
pub use self::memory_cache::InMemoryCacheStore;
pub use self::memory_records::InMemoryRecordStore;
pub use self::memory_results::InMemoryResultStore;
