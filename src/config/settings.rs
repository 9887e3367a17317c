//! Typed settings with defaults.

use super::ConfigError;
use super::file::APP_NAME;
use camino::Utf8PathBuf;
use serde::Deserialize;
use std::net::IpAddr;
use std::time::Duration;

/// Upper bound for the post-spawn startup wait.
const MAX_STARTUP_WAIT_MS: u64 = 1_000;

/// Environment override for the state directory.
const STATE_DIR_ENV_VAR: &str = "TOOLBRIDGE_STATE_DIR";

/// Environment override for the port allocation base.
const PORT_BASE_ENV_VAR: &str = "TOOLBRIDGE_PORT_BASE";

/// Environment override for the log filter.
const LOG_ENV_VAR: &str = "TOOLBRIDGE_LOG";

/// Complete runtime configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Root for persisted definitions, instance descriptors and logs.
    pub state_dir: Option<Utf8PathBuf>,
    /// Port allocation.
    pub ports: PortSettings,
    /// Child process supervision.
    pub process: ProcessSettings,
    /// Socket bridge behaviour.
    pub bridge: BridgeSettings,
    /// Interactive assistant session policy.
    pub assistant: AssistantSettings,
    /// Logging.
    pub logging: LoggingSettings,
}

/// Port allocation settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PortSettings {
    /// First port considered for `auto` allocation.
    pub base: u16,
    /// Number of ports scanned upward from `base`.
    pub scan_limit: u16,
    /// Address every bridge listens on.
    pub bind_address: IpAddr,
    /// Bind attempts for `auto` ports before a launch fails.
    pub bind_attempts: u8,
}

impl Default for PortSettings {
    fn default() -> Self {
        Self {
            base: 8400,
            scan_limit: 200,
            bind_address: IpAddr::from([127, 0, 0, 1]),
            bind_attempts: 5,
        }
    }
}

/// Child process supervision settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessSettings {
    /// Time a fresh process must survive before it counts as started.
    pub startup_wait_ms: u64,
    /// Timeout for a health-check command.
    pub health_check_timeout_ms: u64,
    /// Grace period between SIGTERM and SIGKILL.
    pub termination_grace_ms: u64,
    /// Time allowed for the adapter's own shutdown action.
    pub adapter_shutdown_grace_ms: u64,
    /// Time allowed for the process to disappear after SIGKILL.
    pub kill_timeout_ms: u64,
    /// Capacity of the stdin and process event queues.
    pub queue_capacity: usize,
}

impl Default for ProcessSettings {
    fn default() -> Self {
        Self {
            startup_wait_ms: 500,
            health_check_timeout_ms: 5_000,
            termination_grace_ms: 5_000,
            adapter_shutdown_grace_ms: 1_000,
            kill_timeout_ms: 2_000,
            queue_capacity: 256,
        }
    }
}

impl ProcessSettings {
    /// Startup wait as a [`Duration`].
    #[must_use]
    pub const fn startup_wait(&self) -> Duration {
        Duration::from_millis(self.startup_wait_ms)
    }

    /// Health-check timeout as a [`Duration`].
    #[must_use]
    pub const fn health_check_timeout(&self) -> Duration {
        Duration::from_millis(self.health_check_timeout_ms)
    }

    /// Termination grace as a [`Duration`].
    #[must_use]
    pub const fn termination_grace(&self) -> Duration {
        Duration::from_millis(self.termination_grace_ms)
    }

    /// Adapter shutdown grace as a [`Duration`].
    #[must_use]
    pub const fn adapter_shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.adapter_shutdown_grace_ms)
    }

    /// Kill timeout as a [`Duration`].
    #[must_use]
    pub const fn kill_timeout(&self) -> Duration {
        Duration::from_millis(self.kill_timeout_ms)
    }
}

/// Socket bridge settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BridgeSettings {
    /// Longest time any bridge loop waits before re-checking shutdown.
    pub poll_interval_ms: u64,
    /// Capacity of the inbound and outbound queues.
    pub queue_capacity: usize,
    /// How long replies keep flowing to a client that closed its write
    /// side, counted from its end of input or the last delivered frame.
    pub linger_ms: u64,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: 200,
            queue_capacity: 256,
            linger_ms: 5_000,
        }
    }
}

impl BridgeSettings {
    /// Poll interval as a [`Duration`].
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Half-close linger as a [`Duration`].
    #[must_use]
    pub const fn linger(&self) -> Duration {
        Duration::from_millis(self.linger_ms)
    }
}

/// Interactive assistant session policy.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AssistantSettings {
    /// Completed exchanges after which the session is reset.
    pub exchange_ceiling: u32,
    /// Turns kept in the local context window.
    pub context_window: usize,
    /// Consecutive rate-limit errors that force a session reset.
    pub rate_limit_escalation: u32,
}

impl Default for AssistantSettings {
    fn default() -> Self {
        Self {
            exchange_ceiling: 50,
            context_window: 20,
            rate_limit_escalation: 3,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingSettings {
    /// Default filter directive, e.g. `info` or `toolbridge=debug`.
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "warn".to_owned(),
        }
    }
}

impl Settings {
    /// Applies `TOOLBRIDGE_*` overrides read through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidOverride`] for unparsable values.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(dir) = lookup(STATE_DIR_ENV_VAR).filter(|value| !value.trim().is_empty()) {
            self.state_dir = Some(Utf8PathBuf::from(dir));
        }
        if let Some(raw) = lookup(PORT_BASE_ENV_VAR) {
            self.ports.base = raw
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidOverride {
                    variable: PORT_BASE_ENV_VAR.to_owned(),
                    value: raw.clone(),
                })?;
        }
        if let Some(level) = lookup(LOG_ENV_VAR).filter(|value| !value.trim().is_empty()) {
            self.logging.level = level;
        }
        Ok(())
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ports.base == 0 {
            return Err(invalid("ports.base", "must be a non-zero port"));
        }
        if self.ports.scan_limit == 0 {
            return Err(invalid("ports.scan_limit", "must be at least 1"));
        }
        if self.ports.bind_attempts == 0 {
            return Err(invalid("ports.bind_attempts", "must be at least 1"));
        }
        if self.process.startup_wait_ms > MAX_STARTUP_WAIT_MS {
            return Err(invalid("process.startup_wait_ms", "must not exceed 1000"));
        }
        if self.process.queue_capacity == 0 || self.bridge.queue_capacity == 0 {
            return Err(invalid("queue_capacity", "must be at least 1"));
        }
        if self.bridge.poll_interval_ms == 0 {
            return Err(invalid("bridge.poll_interval_ms", "must be at least 1"));
        }
        if self.assistant.exchange_ceiling == 0 {
            return Err(invalid("assistant.exchange_ceiling", "must be at least 1"));
        }
        if self.assistant.rate_limit_escalation == 0 {
            return Err(invalid("assistant.rate_limit_escalation", "must be at least 1"));
        }
        Ok(())
    }

    /// Resolves the state directory, falling back to the platform state or
    /// local data directory.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NoStateDirectory`] when neither is available.
    pub fn resolved_state_dir(&self) -> Result<Utf8PathBuf, ConfigError> {
        if let Some(dir) = &self.state_dir {
            return Ok(dir.clone());
        }
        dirs::state_dir()
            .or_else(dirs::data_local_dir)
            .and_then(|dir| Utf8PathBuf::from_path_buf(dir).ok())
            .map(|dir| dir.join(APP_NAME))
            .ok_or(ConfigError::NoStateDirectory)
    }
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.to_owned(),
    }
}
