//! Store configuration: builder values first, then environment, then defaults.

use std::path::PathBuf;
use std::time::Duration;

use crate::db::{ExhaustionPolicy, PoolConfig};
use crate::error::{Result, StoreError};
use crate::utils::get_database_path;

/// Overrides the database file location.
pub const ENV_DB_PATH: &str = "NOTEPOOL_DB_PATH";
/// Maximum number of pooled connections.
pub const ENV_MAX_CONNECTIONS: &str = "NOTEPOOL_MAX_CONNECTIONS";
/// `transient` or `block`.
pub const ENV_POOL_POLICY: &str = "NOTEPOOL_POOL_POLICY";
/// How long `block` waits for a connection, in milliseconds.
pub const ENV_ACQUIRE_TIMEOUT_MS: &str = "NOTEPOOL_ACQUIRE_TIMEOUT_MS";
/// Default cache TTL in seconds.
pub const ENV_CACHE_TTL_SECS: &str = "NOTEPOOL_CACHE_TTL_SECS";

pub const DEFAULT_MAX_CONNECTIONS: usize = 10;
pub const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Fully resolved configuration for a [`crate::NoteService`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub pool: PoolConfig,
    pub cache_ttl: Duration,
}

impl StoreConfig {
    /// Configuration for a database at `path` with every other value defaulted.
    ///
    /// Ignores the environment, which keeps tests hermetic.
    pub fn for_path(path: impl Into<PathBuf>) -> Self {
        Self {
            pool: PoolConfig::new(path),
            cache_ttl: DEFAULT_CACHE_TTL,
        }
    }
}

/// Builder for [`StoreConfig`].
///
/// # Examples
///
/// ```
/// use notepool::config::StoreConfigBuilder;
///
/// let config = StoreConfigBuilder::new()
///     .database_path("/tmp/notes.db")
///     .max_connections(4)
///     .build()
///     .expect("valid configuration");
///
/// assert_eq!(config.pool.max_connections, 4);
/// ```
#[derive(Debug, Default)]
pub struct StoreConfigBuilder {
    database_path: Option<PathBuf>,
    max_connections: Option<usize>,
    policy: Option<ExhaustionPolicy>,
    cache_ttl: Option<Duration>,
}

impl StoreConfigBuilder {
    /// Creates a builder with nothing set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the database file path.
    pub fn database_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.database_path = Some(path.into());
        self
    }

    /// Sets the pool's idle-connection bound.
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = Some(max);
        self
    }

    /// Sets what `acquire` does when no idle connection is available.
    pub fn exhaustion_policy(mut self, policy: ExhaustionPolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Sets the cache's default TTL.
    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = Some(ttl);
        self
    }

    /// Resolves the configuration.
    ///
    /// # Environment Variables
    ///
    /// Each unset builder value is read from `NOTEPOOL_DB_PATH`,
    /// `NOTEPOOL_MAX_CONNECTIONS`, `NOTEPOOL_POOL_POLICY`,
    /// `NOTEPOOL_ACQUIRE_TIMEOUT_MS`, and `NOTEPOOL_CACHE_TTL_SECS` before
    /// falling back to defaults. Malformed values are validation errors.
    pub fn build(self) -> Result<StoreConfig> {
        let path = match self.database_path {
            Some(path) => path,
            None => match env_var(ENV_DB_PATH) {
                Some(path) => PathBuf::from(path),
                None => get_database_path()?,
            },
        };

        let max_connections = match self.max_connections {
            Some(max) => max,
            None => parse_env(ENV_MAX_CONNECTIONS)?.unwrap_or(DEFAULT_MAX_CONNECTIONS),
        };
        if max_connections == 0 {
            return Err(StoreError::validation("max_connections must be at least 1"));
        }

        let policy = match self.policy {
            Some(policy) => policy,
            None => policy_from_env()?,
        };

        let cache_ttl = match self.cache_ttl {
            Some(ttl) => ttl,
            None => parse_env::<u64>(ENV_CACHE_TTL_SECS)?
                .map(Duration::from_secs)
                .unwrap_or(DEFAULT_CACHE_TTL),
        };
        if cache_ttl.is_zero() {
            return Err(StoreError::validation("cache TTL must be positive"));
        }

        Ok(StoreConfig {
            pool: PoolConfig {
                path,
                max_connections,
                policy,
                busy_timeout: DEFAULT_BUSY_TIMEOUT,
            },
            cache_ttl,
        })
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Result<Option<T>> {
    match env_var(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| StoreError::validation(format!("{name}: invalid value '{raw}'"))),
        None => Ok(None),
    }
}

fn policy_from_env() -> Result<ExhaustionPolicy> {
    let timeout = parse_env::<u64>(ENV_ACQUIRE_TIMEOUT_MS)?
        .map(Duration::from_millis)
        .unwrap_or(DEFAULT_ACQUIRE_TIMEOUT);

    match env_var(ENV_POOL_POLICY).map(|p| p.trim().to_ascii_lowercase()) {
        None => Ok(ExhaustionPolicy::Transient),
        Some(p) if p == "transient" => Ok(ExhaustionPolicy::Transient),
        Some(p) if p == "block" => Ok(ExhaustionPolicy::Block { timeout }),
        Some(other) => Err(StoreError::validation(format!(
            "{ENV_POOL_POLICY}: expected 'transient' or 'block', got '{other}'"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        for name in [
            ENV_DB_PATH,
            ENV_MAX_CONNECTIONS,
            ENV_POOL_POLICY,
            ENV_ACQUIRE_TIMEOUT_MS,
            ENV_CACHE_TTL_SECS,
        ] {
            unsafe {
                std::env::remove_var(name);
            }
        }
    }

    #[test]
    #[serial]
    fn build_uses_defaults_when_nothing_is_set() {
        clear_env();

        let config = StoreConfigBuilder::new()
            .database_path("/tmp/notepool-test.db")
            .build()
            .unwrap();

        assert_eq!(config.pool.path, PathBuf::from("/tmp/notepool-test.db"));
        assert_eq!(config.pool.max_connections, DEFAULT_MAX_CONNECTIONS);
        assert_eq!(config.pool.policy, ExhaustionPolicy::Transient);
        assert_eq!(config.pool.busy_timeout, DEFAULT_BUSY_TIMEOUT);
        assert_eq!(config.cache_ttl, DEFAULT_CACHE_TTL);
    }

    #[test]
    #[serial]
    fn build_reads_environment_variables() {
        clear_env();
        unsafe {
            std::env::set_var(ENV_DB_PATH, "/tmp/from-env.db");
            std::env::set_var(ENV_MAX_CONNECTIONS, "3");
            std::env::set_var(ENV_POOL_POLICY, "Block");
            std::env::set_var(ENV_ACQUIRE_TIMEOUT_MS, "250");
            std::env::set_var(ENV_CACHE_TTL_SECS, "42");
        }

        let config = StoreConfigBuilder::new().build().unwrap();

        assert_eq!(config.pool.path, PathBuf::from("/tmp/from-env.db"));
        assert_eq!(config.pool.max_connections, 3);
        assert_eq!(
            config.pool.policy,
            ExhaustionPolicy::Block {
                timeout: Duration::from_millis(250)
            }
        );
        assert_eq!(config.cache_ttl, Duration::from_secs(42));

        clear_env();
    }

    #[test]
    #[serial]
    fn builder_values_take_precedence_over_environment() {
        clear_env();
        unsafe {
            std::env::set_var(ENV_DB_PATH, "/tmp/from-env.db");
            std::env::set_var(ENV_MAX_CONNECTIONS, "3");
        }

        let config = StoreConfigBuilder::new()
            .database_path("/tmp/explicit.db")
            .max_connections(8)
            .build()
            .unwrap();

        assert_eq!(config.pool.path, PathBuf::from("/tmp/explicit.db"));
        assert_eq!(config.pool.max_connections, 8);

        clear_env();
    }

    #[test]
    #[serial]
    fn malformed_environment_value_is_a_validation_error() {
        clear_env();
        unsafe {
            std::env::set_var(ENV_MAX_CONNECTIONS, "lots");
        }

        let err = StoreConfigBuilder::new()
            .database_path("/tmp/x.db")
            .build()
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation { .. }));
        assert!(err.to_string().contains(ENV_MAX_CONNECTIONS));

        clear_env();
    }

    #[test]
    #[serial]
    fn unknown_policy_is_rejected() {
        clear_env();
        unsafe {
            std::env::set_var(ENV_POOL_POLICY, "queue");
        }

        let err = StoreConfigBuilder::new()
            .database_path("/tmp/x.db")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("queue"));

        clear_env();
    }

    #[test]
    #[serial]
    fn zero_connections_is_rejected() {
        clear_env();
        let err = StoreConfigBuilder::new()
            .database_path("/tmp/x.db")
            .max_connections(0)
            .build()
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation { .. }));
    }

    #[test]
    fn for_path_ignores_environment() {
        let config = StoreConfig::for_path("/tmp/direct.db");
        assert_eq!(config.pool.max_connections, DEFAULT_MAX_CONNECTIONS);
        assert_eq!(config.cache_ttl, DEFAULT_CACHE_TTL);
    }
}
