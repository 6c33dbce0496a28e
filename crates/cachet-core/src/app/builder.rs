//! AppBuilder - アプリケーションの構築とワイヤリング
//!
//! 起動時検証（Fail-fast）: 期待される task_type が揃っていなければ
//! `build()` が失敗する。

use std::sync::Arc;

use super::context::AppContext;
use super::App;
use crate::config::{ConfigError, Settings};
use crate::typed::{Handler, RegistryError, Task, TypedRegistry};

/// ```ignore
/// let app = AppBuilder::new()
///     .settings(settings)
///     .register::<SendEmail, _>(SendEmailHandler)?
///     .expect_tasks(&[SendEmail::TYPE])
///     .build()?;
/// ```
pub struct AppBuilder {
    registry: TypedRegistry,
    expected_tasks: Option<Vec<String>>,
    settings: Settings,
    context: Option<AppContext>,
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("Missing task types: {0:?}. These tasks were expected but not registered.")]
    MissingTaskTypes(Vec<String>),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl AppBuilder {
    pub fn new() -> Self {
        Self {
            registry: TypedRegistry::new(),
            expected_tasks: None,
            settings: Settings::default(),
            context: None,
        }
    }

    pub fn register<T: Task, H: Handler<T> + 'static>(
        mut self,
        handler: H,
    ) -> Result<Self, RegistryError> {
        self.registry.register::<T, H>(handler)?;
        Ok(self)
    }

    pub fn expect_tasks(mut self, task_types: &[&str]) -> Self {
        self.expected_tasks = Some(task_types.iter().map(|t| t.to_string()).collect());
        self
    }

    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// Backing stores. In-memory stores on the system clock when not set.
    pub fn context(mut self, context: AppContext) -> Self {
        self.context = Some(context);
        self
    }

    pub fn build(self) -> Result<App, BuildError> {
        if let Some(expected_tasks) = &self.expected_tasks {
            let registered_types = self.registry.registered_types();
            let missing_tasks: Vec<String> = expected_tasks
                .iter()
                .filter(|x| !registered_types.contains(x))
                .cloned()
                .collect();
            if !missing_tasks.is_empty() {
                return Err(BuildError::MissingTaskTypes(missing_tasks));
            }
        }
        self.settings.validate()?;

        Ok(App {
            registry: Arc::new(self.registry),
            context: self.context.unwrap_or_default(),
            settings: self.settings,
        })
    }
}

impl Default for AppBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::typed::fixtures::{Echo, EchoHandler, Flaky};

    #[test]
    fn test_build_success() {
        let app = AppBuilder::new()
            .register::<Echo, _>(EchoHandler)
            .unwrap()
            .expect_tasks(&[Echo::TYPE])
            .build();
        assert!(app.is_ok());
    }

    #[test]
    fn test_build_missing_task_types() {
        let app = AppBuilder::new()
            .register::<Echo, _>(EchoHandler)
            .unwrap()
            .expect_tasks(&[Echo::TYPE, Flaky::TYPE])
            .build();
        assert!(matches!(
            app,
            Err(BuildError::MissingTaskTypes(missing)) if missing == vec![Flaky::TYPE.to_string()]
        ));
    }

    #[test]
    fn test_build_no_expect_tasks() {
        let app = AppBuilder::new()
            .register::<Echo, _>(EchoHandler)
            .unwrap()
            .build();
        assert!(app.is_ok());
    }

    #[test]
    fn test_build_rejects_invalid_settings() {
        let mut settings = Settings::default();
        settings.workers.count = 0;
        let app = AppBuilder::new().settings(settings).build();
        assert!(matches!(app, Err(BuildError::Config(ConfigError::Invalid(_)))));
    }
}
