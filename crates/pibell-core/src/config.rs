//! Optional TOML configuration shared by the daemon and the client.
//!
//! Lookup order for the file:
//! 1. an explicit `--config <path>` (must exist)
//! 2. `$PIBELL_CONFIG` (must exist)
//! 3. `<config_dir>/pibell/config.toml` (skipped when absent)
//!
//! Command-line flags override whatever the file sets.
//!
//! ```toml
//! [server]
//! listen = "0.0.0.0:12321"
//! write_timeout_ms = 2000
//!
//! [client]
//! backoff_secs = 30
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::address::DEFAULT_LISTEN_ADDRESS;
use crate::error::{ConfigError, ConfigResult};

/// Environment variable naming an alternative config file.
pub const CONFIG_ENV_VAR: &str = "PIBELL_CONFIG";

/// Per-peer write deadline used by the broadcaster.
pub const DEFAULT_WRITE_TIMEOUT_MS: u64 = 2_000;

/// Fixed delay between reconnect attempts after an I/O error.
pub const DEFAULT_BACKOFF_SECS: u64 = 30;

/// Top-level configuration file contents.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PibellConfig {
    pub server: ServerSection,
    pub client: ClientSection,
}

/// `[server]` table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerSection {
    /// Listen address, validated later by `Address::parse_listen`
    pub listen: String,

    pub write_timeout_ms: u64,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            listen: DEFAULT_LISTEN_ADDRESS.to_string(),
            write_timeout_ms: DEFAULT_WRITE_TIMEOUT_MS,
        }
    }
}

impl ServerSection {
    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}

/// `[client]` table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientSection {
    pub backoff_secs: u64,
}

impl Default for ClientSection {
    fn default() -> Self {
        Self {
            backoff_secs: DEFAULT_BACKOFF_SECS,
        }
    }
}

impl ClientSection {
    pub fn backoff(&self) -> Duration {
        Duration::from_secs(self.backoff_secs)
    }
}

impl PibellConfig {
    /// Parses configuration from TOML text. `origin` is only used in errors.
    pub fn from_toml_str(contents: &str, origin: &Path) -> ConfigResult<Self> {
        toml::from_str(contents).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })
    }

    /// Reads and parses the file at `path`.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), "Loaded config file");
        Self::from_toml_str(&contents, path)
    }

    /// Loads the configuration following the documented lookup order.
    ///
    /// Returns defaults when no file was requested and the default location
    /// does not exist.
    pub fn discover(explicit: Option<&Path>) -> ConfigResult<Self> {
        let from_env = std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from);
        Self::discover_in(explicit, from_env.as_deref(), default_path().as_deref())
    }

    fn discover_in(
        explicit: Option<&Path>,
        from_env: Option<&Path>,
        fallback: Option<&Path>,
    ) -> ConfigResult<Self> {
        if let Some(path) = explicit.or(from_env) {
            return Self::load(path);
        }

        match fallback {
            Some(path) if path.exists() => Self::load(path),
            _ => Ok(Self::default()),
        }
    }
}

/// Default config file location, if the platform has a config directory.
pub fn default_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("pibell").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = PibellConfig::default();
        assert_eq!(config.server.listen, "0.0.0.0:12321");
        assert_eq!(config.server.write_timeout(), Duration::from_secs(2));
        assert_eq!(config.client.backoff(), Duration::from_secs(30));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config = PibellConfig::from_toml_str(
            "[client]\nbackoff_secs = 5\n",
            Path::new("inline"),
        )
        .unwrap();

        assert_eq!(config.client.backoff_secs, 5);
        assert_eq!(config.server, ServerSection::default());
    }

    #[test]
    fn test_unknown_key_rejected() {
        let err = PibellConfig::from_toml_str("[server]\nlisten_on = \"x\"\n", Path::new("inline"))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("inline"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[server]\nlisten = \"127.0.0.1:4000\"\nwrite_timeout_ms = 250"
        )
        .unwrap();

        let config = PibellConfig::load(file.path()).unwrap();
        assert_eq!(config.server.listen, "127.0.0.1:4000");
        assert_eq!(config.server.write_timeout(), Duration::from_millis(250));
    }

    #[test]
    fn test_explicit_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope.toml");

        let err = PibellConfig::discover_in(Some(&missing), None, None).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn test_missing_fallback_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let fallback = dir.path().join("config.toml");

        let config = PibellConfig::discover_in(None, None, Some(&fallback)).unwrap();
        assert_eq!(config, PibellConfig::default());
    }

    #[test]
    fn test_explicit_wins_over_env() {
        let dir = tempfile::tempdir().unwrap();
        let explicit = dir.path().join("explicit.toml");
        let env = dir.path().join("env.toml");
        std::fs::write(&explicit, "[client]\nbackoff_secs = 1\n").unwrap();
        std::fs::write(&env, "[client]\nbackoff_secs = 2\n").unwrap();

        let config = PibellConfig::discover_in(Some(&explicit), Some(&env), None).unwrap();
        assert_eq!(config.client.backoff_secs, 1);

        let config = PibellConfig::discover_in(None, Some(&env), None).unwrap();
        assert_eq!(config.client.backoff_secs, 2);
    }
}
