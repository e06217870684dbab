use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log_level: Option<String>,
    pub api: ApiSection,
    pub storage: StorageSection,
    pub daemon: DaemonSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSection {
    pub base_url: String,
    pub timeout_ms: u64,
    pub rate_limit_per_minute: u32,
}

impl Default for ApiSection {
    fn default() -> Self {
        Self {
            base_url: "https://api.torn.com".to_string(),
            timeout_ms: 15000,
            rate_limit_per_minute: 90,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    pub data_dir: PathBuf,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            data_dir: dirs::data_local_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("warwatch"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonSection {
    pub socket_path: Option<PathBuf>,
    /// Seconds between war-detection sweeps while no war is active.
    pub war_check_interval_seconds: u64,
}

impl Default for DaemonSection {
    fn default() -> Self {
        Self {
            socket_path: None,
            war_check_interval_seconds: 300,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: Some("info".to_string()),
            api: ApiSection::default(),
            storage: StorageSection::default(),
            daemon: DaemonSection::default(),
        }
    }
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try primary location: ~/.config/<project>/<project>.yml
        if let Some(config_dir) = dirs::config_dir() {
            let project_name = env!("CARGO_PKG_NAME");
            let primary_config = config_dir.join(project_name).join(format!("{}.yml", project_name));
            if primary_config.exists() {
                match Self::load_from_file(&primary_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        log::warn!("Failed to load config from {}: {}", primary_config.display(), e);
                    }
                }
            }
        }

        // Try fallback location: ./<project>.yml
        let project_name = env!("CARGO_PKG_NAME");
        let fallback_config = PathBuf::from(format!("{}.yml", project_name));
        if fallback_config.exists() {
            match Self::load_from_file(&fallback_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    log::warn!("Failed to load config from {}: {}", fallback_config.display(), e);
                }
            }
        }

        // No config file found, use defaults
        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        log::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }

    /// Resolve the daemon socket path, configured or default.
    pub fn socket_path(&self) -> PathBuf {
        self.daemon
            .socket_path
            .clone()
            .unwrap_or_else(|| PathBuf::from("/tmp/warwatch-daemon.sock"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.api.rate_limit_per_minute, 90);
        assert_eq!(config.api.base_url, "https://api.torn.com");
        assert_eq!(config.daemon.war_check_interval_seconds, 300);
        assert!(config.socket_path().ends_with("warwatch-daemon.sock"));
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("warwatch.yml");
        fs::write(&path, "api:\n  rate_limit_per_minute: 60\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.api.rate_limit_per_minute, 60);
        assert_eq!(config.api.timeout_ms, 15000);
        assert_eq!(config.daemon.war_check_interval_seconds, 300);
    }

    #[test]
    fn test_explicit_missing_path_errors() {
        let path = PathBuf::from("/nonexistent/warwatch.yml");
        assert!(Config::load(Some(&path)).is_err());
    }
}
