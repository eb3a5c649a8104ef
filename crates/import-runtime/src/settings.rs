use std::{collections::HashMap, time::Duration};
use tracing::warn;

pub const POLL_INTERVAL_ENV: &str = "IMPORT_MONITOR_POLL_MS";

/// Timings and buffer sizes of one coordinator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoordinatorSettings {
    /// Forced reload after a start request, in case no push event arrives.
    pub start_reload_delay: Duration,
    /// Reload after progress reports the last record.
    pub completion_refresh_delay: Duration,
    /// Reload after the stop RPC resolved.
    pub stop_reload_delay: Duration,
    pub mailbox_capacity: usize,
    pub event_buffer: usize,
    pub log_page_size: usize,
    pub poll_interval: Duration,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        CoordinatorSettings {
            start_reload_delay: Duration::from_millis(1000),
            completion_refresh_delay: Duration::from_millis(2000),
            stop_reload_delay: Duration::from_millis(3000),
            mailbox_capacity: 64,
            event_buffer: 64,
            log_page_size: import_core::log_view::DEFAULT_PAGE_SIZE,
            poll_interval: Duration::from_secs(2),
        }
    }
}

impl CoordinatorSettings {
    /// Defaults with overrides taken from `vars`. Unparsable values are
    /// logged and ignored.
    pub fn from_vars(vars: &HashMap<String, String>) -> Self {
        let mut settings = CoordinatorSettings::default();

        if let Some(raw) = vars.get(POLL_INTERVAL_ENV) {
            match raw.trim().parse::<u64>() {
                Ok(ms) if ms > 0 => settings.poll_interval = Duration::from_millis(ms),
                _ => warn!(
                    key = POLL_INTERVAL_ENV,
                    value = %raw,
                    "Ignoring invalid poll interval"
                ),
            }
        }

        settings
    }

    pub fn from_env() -> Self {
        Self::from_vars(&std::env::vars().collect())
    }
}
