//! cachet-core
//!
//! Cache-aside reads and a background task executor with retries.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, task record, outcome, result, retry policy）
//! - **ports**: 抽象化レイヤー（CacheStore, TaskBroker, ResultStore, DurableStore, Clock）
//! - **impls**: InMemory 実装（開発用・テスト用）
//! - **typed**: 型付き Task API（Task trait, Handler trait, TypedRegistry）
//! - **app**: 構築・提出・cache-aside・worker pool・sweeper
//! - **config**: Settings（YAML + 環境変数）
//! - **observability**: tracing subscriber の初期化

pub mod app;
pub mod config;
pub mod domain;
pub mod impls;
pub mod observability;
pub mod ports;
pub mod typed;

pub use app::{App, AppBuilder, AppContext, AppError, BuildError, CacheAsideCoordinator};
pub use config::{ConfigError, Settings};
pub use domain::{Outcome, ResultView, Submission, TaskId, TaskState};
pub use typed::{Handler, Task};
