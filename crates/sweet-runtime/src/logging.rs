//! Diagnostic logging for the runtime.
//!
//! Events go to stderr through a `tracing-subscriber` formatter so they never
//! interleave with program output on stdout.

use tracing_subscriber::EnvFilter;

use crate::config::RuntimeConfig;

/// Install the runtime's subscriber. Returns `false` if a global subscriber
/// was already set (by an embedder or an earlier call), in which case the
/// existing one is kept.
pub fn init(config: &RuntimeConfig) -> bool {
    let (filter, bad_filter) = match EnvFilter::try_new(&config.log_filter) {
        Ok(filter) => (filter, None),
        Err(e) => (EnvFilter::new("warn"), Some(e)),
    };

    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .try_init()
        .is_ok();

    if let Some(e) = bad_filter {
        tracing::warn!(filter = %config.log_filter, error = %e, "ignoring invalid log filter");
    }

    installed
}

/// Warn about every environment value `config` fell back from.
pub fn report_rejected(config: &RuntimeConfig) {
    for (key, value) in &config.rejected {
        tracing::warn!(key, value = %value, "ignoring invalid environment setting");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_keeps_first() {
        let config = RuntimeConfig::default();
        init(&config);
        // Whichever install ran first, a repeated one never succeeds
        assert!(!init(&config));
    }

    #[test]
    fn test_invalid_filter_does_not_panic() {
        let config = RuntimeConfig {
            log_filter: "sweet_runtime=[".to_owned(),
            ..RuntimeConfig::default()
        };
        init(&config);
    }
}
