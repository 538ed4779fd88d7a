//! Configuration for minidfs clients

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::common::{Error, Result};

/// Environment variable pointing at a TOML config file
pub const CONFIG_ENV: &str = "MINIDFS_CONFIG";

/// Config file looked up in the working directory when `MINIDFS_CONFIG` is unset
pub const DEFAULT_CONFIG_FILE: &str = "minidfs.toml";

/// Prefix for environment overrides (`MINIDFS_NODES`, `MINIDFS_TIMEOUTS__UPLOAD_MS`, ...)
pub const ENV_PREFIX: &str = "MINIDFS";

/// Local development cluster
pub const DEFAULT_NODES: [&str; 3] = [
    "http://localhost:8081",
    "http://localhost:8082",
    "http://localhost:8083",
];

/// Global configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Cluster node base URLs, in scan order
    #[serde(default = "default_nodes")]
    pub nodes: Vec<String>,

    /// Per-operation request timeouts
    #[serde(default)]
    pub timeouts: TimeoutConfig,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_nodes() -> Vec<String> {
    DEFAULT_NODES.iter().map(|n| n.to_string()).collect()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            nodes: default_nodes(),
            timeouts: TimeoutConfig::default(),
            log_level: default_log_level(),
        }
    }
}

/// Request timeouts, in milliseconds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Role probe used by the cluster snapshot
    #[serde(default = "default_role_probe")]
    pub role_probe_ms: u64,

    /// Role probe used while locating the leader
    #[serde(default = "default_leader_probe")]
    pub leader_probe_ms: u64,

    /// Single chunk upload
    #[serde(default = "default_transfer")]
    pub upload_ms: u64,

    /// Single chunk download from one node
    #[serde(default = "default_transfer")]
    pub download_ms: u64,

    /// TCP connect
    #[serde(default = "default_connect")]
    pub connect_ms: u64,
}

fn default_role_probe() -> u64 {
    2_000
}
fn default_leader_probe() -> u64 {
    3_000
}
fn default_transfer() -> u64 {
    5_000
}
fn default_connect() -> u64 {
    1_000
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            role_probe_ms: default_role_probe(),
            leader_probe_ms: default_leader_probe(),
            upload_ms: default_transfer(),
            download_ms: default_transfer(),
            connect_ms: default_connect(),
        }
    }
}

impl TimeoutConfig {
    /// Same timeout for every operation (handy for tests)
    pub fn uniform(timeout: Duration) -> Self {
        let ms = timeout.as_millis() as u64;
        Self {
            role_probe_ms: ms,
            leader_probe_ms: ms,
            upload_ms: ms,
            download_ms: ms,
            connect_ms: ms,
        }
    }

    pub fn role_probe(&self) -> Duration {
        Duration::from_millis(self.role_probe_ms)
    }

    pub fn leader_probe(&self) -> Duration {
        Duration::from_millis(self.leader_probe_ms)
    }

    pub fn upload(&self) -> Duration {
        Duration::from_millis(self.upload_ms)
    }

    pub fn download(&self) -> Duration {
        Duration::from_millis(self.download_ms)
    }

    pub fn connect(&self) -> Duration {
        Duration::from_millis(self.connect_ms)
    }
}

impl Config {
    /// Load configuration: defaults, then the TOML file, then `MINIDFS_*` env vars.
    pub fn load() -> Result<Self> {
        let config = Self::layered()?;
        config.validate()?;
        Ok(config)
    }

    /// Same layering as [`Config::load`], without validation.
    ///
    /// For callers that still apply their own overrides (e.g. `--nodes`)
    /// before the result is checked.
    pub fn layered() -> Result<Self> {
        let path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        let settings = ::config::Config::builder()
            .add_source(::config::File::with_name(&path).required(false))
            .add_source(env_source())
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    /// Load configuration from one explicit TOML file, without env overrides.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let settings = ::config::Config::builder()
            .add_source(::config::File::from(path).format(::config::FileFormat::Toml))
            .build()?;
        let config: Config = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Check node URLs and timeouts
    pub fn validate(&self) -> Result<()> {
        crate::client::NodeRegistry::new(self.nodes.clone())?;

        let t = &self.timeouts;
        for (name, value) in [
            ("role_probe_ms", t.role_probe_ms),
            ("leader_probe_ms", t.leader_probe_ms),
            ("upload_ms", t.upload_ms),
            ("download_ms", t.download_ms),
            ("connect_ms", t.connect_ms),
        ] {
            if value == 0 {
                return Err(Error::InvalidConfig(format!(
                    "timeouts.{} must be greater than zero",
                    name
                )));
            }
        }
        Ok(())
    }
}

fn env_source() -> ::config::Environment {
    ::config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .list_separator(",")
        .with_list_parse_key("nodes")
        .try_parsing(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;

    // env vars are process-wide
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const ENV_KEYS: [&str; 4] = [
        CONFIG_ENV,
        "MINIDFS_NODES",
        "MINIDFS_TIMEOUTS__UPLOAD_MS",
        "MINIDFS_LOG_LEVEL",
    ];

    fn clear_env() {
        for key in ENV_KEYS {
            std::env::remove_var(key);
        }
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.nodes.len(), 3);
        assert_eq!(config.nodes[0], "http://localhost:8081");
        assert_eq!(config.timeouts.role_probe(), Duration::from_secs(2));
        assert_eq!(config.timeouts.leader_probe(), Duration::from_secs(3));
        assert_eq!(config.timeouts.download(), Duration::from_secs(5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_file_partial() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "nodes = ['http://10.0.0.1:8080', 'http://10.0.0.2:8080']\n\n[timeouts]\nupload_ms = 9000"
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.nodes, vec!["http://10.0.0.1:8080", "http://10.0.0.2:8080"]);
        assert_eq!(config.timeouts.upload_ms, 9000);
        assert_eq!(config.timeouts.role_probe_ms, 2000);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_from_file_rejects_bad_node() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "nodes = ['not a url']").unwrap();
        assert!(Config::from_file(file.path()).is_err());
    }

    #[test]
    fn test_zero_timeout_invalid() {
        let mut config = Config::default();
        config.timeouts.download_ms = 0;
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_load_layers_env_over_file() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();

        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "nodes = ['http://10.0.0.1:8080']\nlog_level = 'warn'\n\n[timeouts]\nupload_ms = 9000\ndownload_ms = 7000"
        )
        .unwrap();

        std::env::set_var(CONFIG_ENV, file.path());
        let from_file = Config::load().unwrap();
        assert_eq!(from_file.nodes, vec!["http://10.0.0.1:8080"]);
        assert_eq!(from_file.timeouts.upload_ms, 9000);
        assert_eq!(from_file.log_level, "warn");

        std::env::set_var("MINIDFS_NODES", "http://a:1,http://b:2");
        std::env::set_var("MINIDFS_TIMEOUTS__UPLOAD_MS", "8000");
        let config = Config::load();
        clear_env();

        let config = config.unwrap();
        assert_eq!(config.nodes, vec!["http://a:1", "http://b:2"]);
        assert_eq!(config.timeouts.upload_ms, 8000);
        // untouched keys keep the file value, then the built-in default
        assert_eq!(config.timeouts.download_ms, 7000);
        assert_eq!(config.timeouts.role_probe_ms, 2000);
        assert_eq!(config.log_level, "warn");
    }

    #[test]
    fn test_env_single_node_is_a_list() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();

        let dir = tempfile::tempdir().unwrap();
        std::env::set_var(CONFIG_ENV, dir.path().join("absent.toml"));
        std::env::set_var("MINIDFS_NODES", "http://solo:9000");
        let config = Config::load();
        clear_env();

        let config = config.unwrap();
        assert_eq!(config.nodes, vec!["http://solo:9000"]);
        assert_eq!(config.timeouts.upload_ms, 5000);
    }

    #[test]
    fn test_layered_defers_validation() {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
        clear_env();

        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "nodes = ['not a url']").unwrap();
        std::env::set_var(CONFIG_ENV, file.path());
        let loaded = Config::load();
        let layered = Config::layered();
        clear_env();

        assert!(loaded.is_err());
        let mut config = layered.unwrap();
        assert!(config.validate().is_err());
        config.nodes = vec!["http://10.0.0.9:8080".to_string()];
        assert!(config.validate().is_ok());
    }
}
