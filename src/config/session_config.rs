use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use tokio::fs;
use uuid::Uuid;

use crate::core::bluetooth::constants::{
    DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_SCAN_TIMEOUT_SECS, SENSOR_NAME,
    UUID_DEVICE_INFORMATION_SERVICE, UUID_GLUCOSE_SERVICE,
};
use crate::utils::ensure_directory_exists;

const CONFIG_FILE_NAME: &str = "session_config.json";
const CONFIG_DIR_NAME: &str = "glucowatch-bridge";
const CONFIG_DIR_ENV: &str = "GLUCOWATCH_CONFIG_DIR";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Advertised name accepted when the glucose service is not advertised
    pub sensor_name: String,

    /// Glucose service identifier, advertised by the sensor and required on connect
    pub glucose_service_uuid: Uuid,

    /// Device information service identifier, required on connect
    pub device_information_service_uuid: Uuid,

    /// Seconds to scan before failing with a scan timeout
    pub scan_timeout_secs: u64,

    /// Seconds to wait for a connection before failing
    pub connect_timeout_secs: u64,

    /// Advertisements weaker than this (dBm) are ignored
    pub min_rssi: Option<i16>,

    /// Subscribe to periodic glucose notifications after the first read
    pub subscribe_to_glucose: bool,

    /// Log filter, overridden by `RUST_LOG`
    pub log_level: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            sensor_name: SENSOR_NAME.to_string(),
            glucose_service_uuid: UUID_GLUCOSE_SERVICE,
            device_information_service_uuid: UUID_DEVICE_INFORMATION_SERVICE,
            scan_timeout_secs: DEFAULT_SCAN_TIMEOUT_SECS,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            min_rssi: None,
            subscribe_to_glucose: true,
            log_level: "info".to_string(),
        }
    }
}

impl SessionConfig {
    /// Directory holding the config file: `GLUCOWATCH_CONFIG_DIR` if set,
    /// otherwise the platform config directory.
    pub fn default_dir() -> Result<PathBuf> {
        if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV) {
            return Ok(PathBuf::from(dir));
        }
        dirs::config_dir()
            .map(|dir| dir.join(CONFIG_DIR_NAME))
            .ok_or_else(|| anyhow!("No platform config directory available"))
    }

    /// Loads the config from a configuration file.
    pub async fn load_config(config_dir: &Path) -> Result<Self> {
        let file_path = config_dir.join(CONFIG_FILE_NAME);
        let file_path_str = file_path.to_string_lossy().into_owned();

        if !file_path.exists() {
            warn!("Config file not found at {:?}, using default.", file_path_str);
            return Ok(Self::default());
        }

        let config_json = fs::read_to_string(file_path).await?;
        let config: Self = serde_json::from_str(&config_json)?;

        info!("Config loaded from {:?}", file_path_str);
        Ok(config)
    }

    /// Saves the current config to a configuration file.
    pub async fn save_config(&self, config_dir: &Path) -> Result<()> {
        ensure_directory_exists(config_dir).await?;

        let file_path = config_dir.join(CONFIG_FILE_NAME);
        let file_path_str = file_path.to_string_lossy().into_owned();

        let config_json = match serde_json::to_string_pretty(&self) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize session config to JSON: {}", e);
                return Err(e.into());
            }
        };

        fs::write(file_path, config_json).await?;
        info!("Session config saved to {:?}", file_path_str);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("glucowatch-config-{}-{}", name, std::process::id()))
    }

    #[tokio::test]
    async fn missing_file_yields_defaults() {
        let dir = scratch_dir("missing");
        let config = SessionConfig::load_config(&dir).await.unwrap();
        assert_eq!(config, SessionConfig::default());
    }

    #[tokio::test]
    async fn saved_config_loads_back() {
        let dir = scratch_dir("saved").join("nested");
        let config = SessionConfig {
            sensor_name: "GlucoWatch Pro".to_string(),
            scan_timeout_secs: 30,
            min_rssi: Some(-80),
            subscribe_to_glucose: false,
            ..SessionConfig::default()
        };
        config.save_config(&dir).await.unwrap();

        let loaded = SessionConfig::load_config(&dir).await.unwrap();
        assert_eq!(loaded, config);
        let _ = std::fs::remove_dir_all(scratch_dir("saved"));
    }

    #[test]
    fn partial_files_fill_in_defaults() {
        let config: SessionConfig = serde_json::from_str(r#"{ "connect_timeout_secs": 3 }"#).unwrap();
        assert_eq!(config.connect_timeout_secs, 3);
        assert_eq!(config.sensor_name, SENSOR_NAME);
        assert_eq!(config.glucose_service_uuid, UUID_GLUCOSE_SERVICE);
        assert!(config.subscribe_to_glucose);
    }
}
