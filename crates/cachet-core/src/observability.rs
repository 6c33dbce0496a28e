//! Logging setup.
//!
//! ライブラリ側は `tracing` のイベントを出すだけ。subscriber を入れるのは
//! バイナリ（または テスト）の責務。

use tracing_subscriber::EnvFilter;

use crate::config::{LogFormat, LoggingSettings};

/// `RUST_LOG` if set and valid, else the configured directive, else `info`.
pub fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level.trim()))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber.
///
/// Returns `false` when one was already installed; the existing subscriber
/// is left in place.
pub fn init_logging(settings: &LoggingSettings) -> bool {
    let filter = env_filter(&settings.level);
    let installed = match settings.format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_current_span(false)
            .try_init()
            .is_ok(),
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init()
            .is_ok(),
    };

    if installed {
        tracing::debug!(level = %settings.level, format = ?settings.format, "logging initialised");
    }
    installed
}
