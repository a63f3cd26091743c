//! Caller-supplied configuration values (spec §6).
//!
//! The core does not read configuration files itself — persistent
//! configuration is an explicit external collaborator (§1) — but derives
//! `Serialize`/`Deserialize` so an embedding binary's own file/flag loader
//! can populate one of these and hand it to the core, the same separation
//! the teacher crate draws between a caller-supplied `CellularConfig` trait
//! and the driver itself.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
}

impl LogLevel {
    pub fn as_tracing_filter(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
        }
    }
}

impl Default for LogLevel {
    fn default() -> Self {
        LogLevel::Info
    }
}

/// Configuration values consumed by the core (spec §6 table).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Consecutive timeouts per port before the owning modem is failed.
    pub max_timeouts: u32,
    /// Where plugin descriptors are loaded from, if file-backed plugins are
    /// used; the bundled reference plugins (`generic`, `huawei`) ignore it.
    pub plugin_dir: Option<String>,
    /// APN to attach the initial EPS bearer with, or empty for modem
    /// default.
    pub initial_eps_bearer_apn: Option<String>,
    pub log_level: LogLevel,
    /// Seconds between registration re-checks while Enabled-but-not-
    /// Registered (§4.4.2).
    pub registration_poll_interval_secs: u64,
    /// Seconds between CDMA registration poll attempts (§4.4.3).
    pub cdma_registration_poll_interval_secs: u64,
    /// Upper bound on a CDMA register-in-network attempt (§4.4.3,
    /// `max_registration_time`).
    pub max_registration_time_secs: u64,
    /// Discovery-loop cycles a non-interface-0 port's probing may be
    /// deferred for (§4.6, `max_defers`).
    pub max_defers: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_timeouts: 3,
            plugin_dir: None,
            initial_eps_bearer_apn: None,
            log_level: LogLevel::default(),
            registration_poll_interval_secs: 30,
            cdma_registration_poll_interval_secs: 3,
            max_registration_time_secs: 120,
            max_defers: 5,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let c = Config::default();
        assert_eq!(c.max_timeouts, 3);
        assert_eq!(c.max_defers, 5);
        assert_eq!(c.registration_poll_interval_secs, 30);
    }
}
