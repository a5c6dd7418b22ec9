//! Structured logging.
//!
//! Log level comes from `observability.log_level` and can be overridden at
//! runtime through `RUST_LOG`. Logging starts at a default level so that
//! configuration loading is itself logged, then switches to the configured one.

use tracing_subscriber::{
    layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter, Registry,
};

/// Level used until the configuration is loaded.
pub const BOOTSTRAP_LEVEL: &str = "info";

/// Default filter directive for a configured log level.
pub fn default_directive(log_level: &str) -> String {
    format!("agent_custody={}", log_level)
}

/// Handle for changing the filter of the installed subscriber.
#[derive(Debug, Clone)]
pub struct LogHandle {
    filter: reload::Handle<EnvFilter, Registry>,
}

impl LogHandle {
    /// Switch to `log_level`. A `RUST_LOG` override stays in force.
    pub fn set_level(&self, log_level: &str) {
        if std::env::var_os(EnvFilter::DEFAULT_ENV).is_some() {
            return;
        }
        if let Err(e) = self.filter.reload(EnvFilter::new(default_directive(log_level))) {
            tracing::warn!(error = %e, "Failed to apply configured log level");
        }
    }
}

/// Initialize the global tracing subscriber.
///
/// Returns `None` if a subscriber was already installed.
pub fn init(log_level: &str) -> Option<LogHandle> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(log_level)));
    let (filter, handle) = reload::Layer::new(filter);

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .try_init()
        .ok()
        .map(|()| LogHandle { filter: handle })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directive() {
        assert_eq!(default_directive("debug"), "agent_custody=debug");
    }

    #[test]
    fn test_second_init_is_ignored() {
        let first = init(BOOTSTRAP_LEVEL);
        assert!(init("debug").is_none());
        if let Some(handle) = first {
            handle.set_level("debug");
        }
    }
}
