//! Handler trait と type erasure
//!
//! - 表層: `Handler<T>` - Task 型ごとに型安全
//! - 内部: `DynHandler` - object-safe、registry に格納するための形

use std::marker::PhantomData;

use async_trait::async_trait;

use super::task::Task;
use crate::domain::Outcome;

/// Executes one task and reports a tagged `Outcome`.
///
/// # Precondition: idempotence
/// Delivery is at-least-once. A handler may run again with the same input
/// after a transient failure, or after it succeeded but the result could not
/// be recorded. Repeated runs must have the same externally observable effect
/// as a single run; the worker pool does not enforce this.
#[async_trait]
pub trait Handler<T: Task>: Send + Sync {
    async fn handle(&self, task: T) -> Outcome;
}

/// Object-safe handler over raw JSON payloads.
#[async_trait]
pub trait DynHandler: Send + Sync {
    async fn handle_dyn(&self, payload: serde_json::Value) -> Outcome;
    fn task_type(&self) -> &'static str;
    fn max_attempts(&self) -> u32;
}

pub struct TypedHandler<T: Task, H: Handler<T>> {
    handler: H,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Task, H: Handler<T>> TypedHandler<T, H> {
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<T: Task, H: Handler<T>> DynHandler for TypedHandler<T, H> {
    async fn handle_dyn(&self, payload: serde_json::Value) -> Outcome {
        // A payload that does not decode never will.
        match serde_json::from_value::<T>(payload) {
            Ok(task) => self.handler.handle(task).await,
            Err(e) => Outcome::terminal(format!("payload decode for {}: {e}", T::TYPE)),
        }
    }

    fn task_type(&self) -> &'static str {
        T::TYPE
    }

    fn max_attempts(&self) -> u32 {
        T::MAX_ATTEMPTS
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ErrorKind;
    use crate::typed::fixtures::{Echo, EchoHandler};
    use serde_json::json;

    #[tokio::test]
    async fn typed_handler_decodes_and_runs() {
        let handler = TypedHandler::<Echo, _>::new(EchoHandler);
        let outcome = handler.handle_dyn(json!({ "message": "hi" })).await;
        assert_eq!(outcome, Outcome::Success(json!({ "echo": "hi" })));
        assert_eq!(handler.task_type(), Echo::TYPE);
        assert_eq!(handler.max_attempts(), 3);
    }

    #[tokio::test]
    async fn undecodable_payload_is_terminal() {
        let handler = TypedHandler::<Echo, _>::new(EchoHandler);
        let outcome = handler.handle_dyn(json!({ "wrong": 1 })).await;
        assert_eq!(outcome.error_kind(), Some(ErrorKind::Terminal));
    }
}
