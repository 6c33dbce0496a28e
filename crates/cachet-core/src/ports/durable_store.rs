//! DurableStore port - source of truth（PostgreSQL など）
//!
//! キャッシュはここから再構築できるデータだけを持つ。
//! スキーマやトランザクションはこの crate の外側の責務。

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;

#[derive(Debug, thiserror::Error)]
pub enum DurableError {
    #[error("durable store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait DurableStore: Send + Sync {
    type Record: Serialize + DeserializeOwned + Send + Sync + 'static;

    /// Resource name used as the cache key namespace.
    fn resource(&self) -> &str;

    /// `Ok(None)` means the record does not exist.
    async fn fetch(&self, id: &str) -> Result<Option<Self::Record>, DurableError>;
}
