//! Configuration management for Latchkey
//!
//! Settings are layered with the `config` crate: an optional file, then
//! environment variables prefixed with `LATCHKEY_` (`__` separates nesting
//! levels, so `LATCHKEY_LOCK__POLL_INTERVAL_MS` sets `lock.poll_interval_ms`).

use std::time::Duration;

use config::{Config, ConfigError, Environment};

use crate::{
    DEFAULT_LOCKS_TABLE, DEFAULT_MAX_CONNECTIONS, DEFAULT_POLL_INTERVAL_MS,
    DEFAULT_SWEEP_INTERVAL_MS, ENV_PREFIX,
};

pub const LOCK_POLL_INTERVAL_MS: &str = "lock.poll_interval_ms";
pub const LOCK_TABLE: &str = "lock.table";
pub const STORE_SWEEP_INTERVAL_MS: &str = "store.sweep_interval_ms";
pub const STORE_DATABASE_URL: &str = "store.database_url";
pub const STORE_MAX_CONNECTIONS: &str = "store.max_connections";

/// Application configuration loaded from an optional file and the environment
#[derive(Clone, Debug, Default)]
pub struct Configuration {
    pub config: Config,
}

impl Configuration {
    /// Load configuration from `path` (if given and present) and `LATCHKEY_*` variables.
    ///
    /// Environment variables take precedence over the file.
    pub fn new(path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        let config = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        Ok(Self::from_config(config))
    }

    /// Wrap an already-built `config::Config`
    pub fn from_config(config: Config) -> Self {
        Configuration { config }
    }

    // ========================================================================
    // Lock Configuration
    // ========================================================================

    /// Delay between conditional-insert attempts, never below one millisecond
    pub fn poll_interval(&self) -> Duration {
        let ms = self
            .config
            .get_int(LOCK_POLL_INTERVAL_MS)
            .unwrap_or(DEFAULT_POLL_INTERVAL_MS as i64);
        Duration::from_millis(ms.max(1) as u64)
    }

    pub fn locks_table(&self) -> String {
        self.config
            .get_string(LOCK_TABLE)
            .unwrap_or(DEFAULT_LOCKS_TABLE.to_string())
    }

    // ========================================================================
    // Store Configuration
    // ========================================================================

    pub fn sweep_interval(&self) -> Duration {
        let ms = self
            .config
            .get_int(STORE_SWEEP_INTERVAL_MS)
            .unwrap_or(DEFAULT_SWEEP_INTERVAL_MS as i64);
        Duration::from_millis(ms.max(1) as u64)
    }

    pub fn database_url(&self) -> Option<String> {
        self.config
            .get_string(STORE_DATABASE_URL)
            .ok()
            .filter(|url| !url.is_empty())
    }

    pub fn max_connections(&self) -> u32 {
        self.config
            .get_int(STORE_MAX_CONNECTIONS)
            .ok()
            .and_then(|v| u32::try_from(v).ok())
            .filter(|v| *v > 0)
            .unwrap_or(DEFAULT_MAX_CONNECTIONS)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_defaults() {
        let config = Configuration::default();

        assert_eq!(config.poll_interval(), Duration::from_millis(10));
        assert_eq!(config.locks_table(), "locks");
        assert_eq!(config.sweep_interval(), Duration::from_millis(1000));
        assert_eq!(config.database_url(), None);
        assert_eq!(config.max_connections(), 10);
    }

    #[test]
    fn test_overrides() {
        let config = Config::builder()
            .set_default(LOCK_POLL_INTERVAL_MS, 25)
            .unwrap()
            .set_default(LOCK_TABLE, "job_locks")
            .unwrap()
            .set_default(STORE_DATABASE_URL, "postgres://localhost/locks")
            .unwrap()
            .set_default(STORE_MAX_CONNECTIONS, 4)
            .unwrap()
            .build()
            .unwrap();
        let config = Configuration::from_config(config);

        assert_eq!(config.poll_interval(), Duration::from_millis(25));
        assert_eq!(config.locks_table(), "job_locks");
        assert_eq!(
            config.database_url().as_deref(),
            Some("postgres://localhost/locks")
        );
        assert_eq!(config.max_connections(), 4);
    }

    #[test]
    fn test_out_of_range_values_fall_back() {
        let config = Config::builder()
            .set_default(LOCK_POLL_INTERVAL_MS, 0)
            .unwrap()
            .set_default(STORE_SWEEP_INTERVAL_MS, -5)
            .unwrap()
            .set_default(STORE_MAX_CONNECTIONS, 0)
            .unwrap()
            .set_default(STORE_DATABASE_URL, "")
            .unwrap()
            .build()
            .unwrap();
        let config = Configuration::from_config(config);

        assert_eq!(config.poll_interval(), Duration::from_millis(1));
        assert_eq!(config.sweep_interval(), Duration::from_millis(1));
        assert_eq!(config.max_connections(), 10);
        assert_eq!(config.database_url(), None);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[lock]\npoll_interval_ms = 50\ntable = \"batch_locks\"\n\n[store]\nsweep_interval_ms = 250"
        )
        .unwrap();

        let config = Configuration::new(file.path().to_str()).unwrap();

        assert_eq!(config.poll_interval(), Duration::from_millis(50));
        assert_eq!(config.locks_table(), "batch_locks");
        assert_eq!(config.sweep_interval(), Duration::from_millis(250));
    }

    #[test]
    fn test_missing_file_is_not_an_error() {
        let config = Configuration::new(Some("/nonexistent/latchkey.toml")).unwrap();
        assert_eq!(config.locks_table(), "locks");
    }
}
