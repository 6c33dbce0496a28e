//! Task trait - task_type と payload 型の対応付け

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::domain::DEFAULT_MAX_ATTEMPTS;

/// Binds a payload type to its task-type name.
///
/// ```ignore
/// #[derive(Serialize, Deserialize)]
/// struct SendEmail {
///     recipient: String,
/// }
///
/// impl Task for SendEmail {
///     const TYPE: &'static str = "examples.send_email.v1";
///     const MAX_ATTEMPTS: u32 = 5;
/// }
/// ```
pub trait Task: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// `{namespace}.{action}.v{major}`
    const TYPE: &'static str;

    /// Total executions allowed, the first one included.
    const MAX_ATTEMPTS: u32 = DEFAULT_MAX_ATTEMPTS;
}
