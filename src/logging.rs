// 📜 Logging - tracing subscriber setup shared by both binaries
use crate::config::LoggingConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is not set
pub fn default_filter(config: &LoggingConfig) -> String {
    format!("dish_ledger={},ledger_server={}", config.level, config.level)
}

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
/// Calling it twice is harmless: the second install is ignored.
pub fn init_logger(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(config)));

    let registry = tracing_subscriber::registry().with(filter);

    let result = if config.json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false)
                    .json(),
            )
            .try_init()
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false)
                    .compact(),
            )
            .try_init()
    };

    if result.is_err() {
        tracing::debug!("logger already initialised");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_uses_level() {
        let config = LoggingConfig {
            level: "debug".to_string(),
            json: false,
        };
        assert_eq!(default_filter(&config), "dish_ledger=debug,ledger_server=debug");
    }

    #[test]
    fn test_init_twice_does_not_panic() {
        let config = LoggingConfig::default();
        init_logger(&config);
        init_logger(&LoggingConfig {
            json: true,
            ..config
        });
    }
}
