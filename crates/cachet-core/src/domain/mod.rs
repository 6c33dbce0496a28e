//! Domain model (IDs, task records, counts, outcomes, results, retry policy).

pub mod cache_key;
pub mod counts;
pub mod errors;
pub mod ids;
pub mod outcome;
pub mod result;
pub mod retry;
pub mod task;

pub use cache_key::CacheKey;
pub use counts::QueueCounts;
pub use errors::ErrorKind;
pub use ids::{ParseIdError, TaskId};
pub use outcome::Outcome;
pub use result::{ResultBody, ResultStatus, ResultView, Submission, TaskResult};
pub use retry::{Decision, RetryPolicy};
pub use task::{DEFAULT_MAX_ATTEMPTS, TaskEnvelope, TaskRecord, TaskState, TaskType, Transition};
