//! Bridge configuration.
//!
//! Read from `$SENSOR_BRIDGE_CONFIG` or `~/.config/sensor-bridge/config.toml`.
//! A missing file is created with the defaults below, and every section falls
//! back to its defaults when omitted, so a file holding only `[cloud]`
//! credentials is a valid configuration.

use crate::actuator::ActuatorId;
use crate::mqtt::config::{BrokerConfig, Credentials};
use color_eyre::{eyre::eyre, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

const CONFIG_DIR: &str = ".config/sensor-bridge";
const CONFIG_FILE: &str = "config.toml";
const CONFIG_ENV: &str = "SENSOR_BRIDGE_CONFIG";

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct BridgeConfig {
    /// Period of the coordinator tick
    pub tick_interval_ms: u64,
    pub local: LocalBrokerConfig,
    pub cloud: CloudBrokerConfig,
    pub schedule: ScheduleConfig,
    pub pins: PinConfig,
    pub hardware: HardwareConfig,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 100,
            local: LocalBrokerConfig::default(),
            cloud: CloudBrokerConfig::default(),
            schedule: ScheduleConfig::default(),
            pins: PinConfig::default(),
            hardware: HardwareConfig::default(),
        }
    }
}

/// Local broker: receives commands, carries sensor telemetry.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct LocalBrokerConfig {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    pub keep_alive_secs: u64,
    pub reconnect_delay_ms: u64,
    pub inbound_capacity: usize,
    pub command_topic: String,
    pub telemetry_topic: String,
}

impl Default for LocalBrokerConfig {
    fn default() -> Self {
        Self {
            host: "192.168.26.42".into(),
            port: 1883,
            client_id: "ESP32Client".into(),
            username: None,
            password: None,
            keep_alive_secs: 15,
            reconnect_delay_ms: 5000,
            inbound_capacity: 32,
            command_topic: "esp/cmd".into(),
            telemetry_topic: "home/sensors/data".into(),
        }
    }
}

impl LocalBrokerConfig {
    pub fn broker(&self) -> BrokerConfig {
        let credentials = self.username.as_ref().map(|username| Credentials {
            username: username.clone(),
            password: self.password.clone().unwrap_or_default(),
        });

        BrokerConfig {
            name: "local".into(),
            host: self.host.clone(),
            port: self.port,
            client_id: self.client_id.clone(),
            credentials,
            keep_alive: Duration::from_secs(self.keep_alive_secs),
            reconnect_delay: Duration::from_millis(self.reconnect_delay_ms),
            inbound_capacity: self.inbound_capacity,
            topics: vec![self.command_topic.clone()],
        }
    }
}

/// Cloud feed broker. The account name doubles as the MQTT username and as
/// the prefix of every feed topic.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct CloudBrokerConfig {
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub account: String,
    pub key: String,
    pub keep_alive_secs: u64,
    pub reconnect_delay_ms: u64,
    pub inbound_capacity: usize,
}

impl Default for CloudBrokerConfig {
    fn default() -> Self {
        Self {
            host: "io.adafruit.com".into(),
            port: 1883,
            client_id: "ESP32Client".into(),
            account: "your_adafruit_username".into(),
            key: "your_adafruit_io_key".into(),
            keep_alive_secs: 30,
            reconnect_delay_ms: 5000,
            inbound_capacity: 32,
        }
    }
}

impl CloudBrokerConfig {
    pub fn broker(&self) -> BrokerConfig {
        BrokerConfig {
            name: "cloud".into(),
            host: self.host.clone(),
            port: self.port,
            client_id: self.client_id.clone(),
            credentials: Some(Credentials {
                username: self.account.clone(),
                password: self.key.clone(),
            }),
            keep_alive: Duration::from_secs(self.keep_alive_secs),
            reconnect_delay: Duration::from_millis(self.reconnect_delay_ms),
            inbound_capacity: self.inbound_capacity,
            topics: crate::mqtt::feeds::CloudFeed::ALL
                .iter()
                .map(|feed| feed.topic(&self.account))
                .collect(),
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct ScheduleConfig {
    pub sensor_interval_ms: u64,
    pub mirror_interval_ms: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            sensor_interval_ms: 5_000,
            mirror_interval_ms: 30_000,
        }
    }
}

impl ScheduleConfig {
    pub fn sensor_interval(&self) -> Duration {
        Duration::from_millis(self.sensor_interval_ms)
    }

    pub fn mirror_interval(&self) -> Duration {
        Duration::from_millis(self.mirror_interval_ms)
    }
}

/// BCM pin numbers per actuator.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct PinConfig {
    pub temperature: u8,
    pub pressure: u8,
    pub air: u8,
    pub light: u8,
    pub fan: u8,
}

impl Default for PinConfig {
    fn default() -> Self {
        Self {
            temperature: 17,
            pressure: 27,
            air: 13,
            light: 22,
            fan: 23,
        }
    }
}

impl PinConfig {
    pub fn pin_for(&self, id: ActuatorId) -> u8 {
        match id {
            ActuatorId::Temperature => self.temperature,
            ActuatorId::Pressure => self.pressure,
            ActuatorId::Air => self.air,
            ActuatorId::Light => self.light,
            ActuatorId::Fan => self.fan,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct HardwareConfig {
    /// Keep outputs in memory instead of touching GPIO
    pub simulated: bool,
}

impl BridgeConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| eyre!("Failed to parse config: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.tick_interval_ms == 0 {
            return Err(eyre!("tick_interval_ms must be greater than zero"));
        }
        if self.schedule.sensor_interval_ms == 0 || self.schedule.mirror_interval_ms == 0 {
            return Err(eyre!("schedule intervals must be greater than zero"));
        }

        for (section, host, capacity) in [
            ("local", &self.local.host, self.local.inbound_capacity),
            ("cloud", &self.cloud.host, self.cloud.inbound_capacity),
        ] {
            if host.trim().is_empty() {
                return Err(eyre!("[{}] host must not be empty", section));
            }
            if capacity == 0 {
                return Err(eyre!("[{}] inbound_capacity must be greater than zero", section));
            }
        }

        if self.local.command_topic.is_empty() || self.local.telemetry_topic.is_empty() {
            return Err(eyre!("[local] topics must not be empty"));
        }
        if self.cloud.account.trim().is_empty() {
            return Err(eyre!("[cloud] account must not be empty"));
        }

        let mut claimed: HashMap<u8, ActuatorId> = HashMap::new();
        for id in ActuatorId::ALL {
            let pin = self.pins.pin_for(id);
            if let Some(other) = claimed.insert(pin, id) {
                return Err(eyre!("GPIO {} assigned to both {} and {}", pin, other, id));
            }
        }

        Ok(())
    }
}

/// Location of the configuration file.
pub fn config_path() -> PathBuf {
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        return PathBuf::from(path);
    }
    let mut path = get_home_dir();
    path.push(CONFIG_DIR);
    path.push(CONFIG_FILE);
    path
}

fn get_home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| {
        warn!("Could not determine home directory, using current directory");
        PathBuf::from(".")
    })
}

/// Loads the configuration at `path`, writing the defaults there first if the
/// file does not exist yet.
pub async fn load_or_create(path: &Path) -> Result<BridgeConfig> {
    if !tokio::fs::try_exists(path)
        .await
        .map_err(|e| eyre!("Failed to check if config file exists: {}", e))?
    {
        info!("No configuration at {}, writing defaults", path.display());
        let config = BridgeConfig::default();
        save(&config, path).await?;
        return Ok(config);
    }

    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;
    let config = BridgeConfig::from_toml(&content)?;
    debug!("Loaded configuration from {}", path.display());
    Ok(config)
}

pub async fn save(config: &BridgeConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| eyre!("Failed to create config directory: {}", e))?;
    }

    let content = toml::to_string_pretty(config)
        .map_err(|e| eyre!("Failed to serialize config: {}", e))?;
    tokio::fs::write(path, content)
        .await
        .map_err(|e| eyre!("Failed to write config file: {}", e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_falls_back_to_defaults() {
        let config = BridgeConfig::from_toml(
            r#"
            [cloud]
            account = "alice"
            key = "aio_secret"

            [pins]
            fan = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.cloud.account, "alice");
        assert_eq!(config.cloud.host, "io.adafruit.com");
        assert_eq!(config.pins.fan, 5);
        assert_eq!(config.pins.light, PinConfig::default().light);
        assert_eq!(config.local, LocalBrokerConfig::default());
        assert_eq!(config.schedule.sensor_interval(), Duration::from_secs(5));
        assert_eq!(config.schedule.mirror_interval(), Duration::from_secs(30));
    }

    #[test]
    fn test_default_config_survives_serialization() {
        let content = toml::to_string_pretty(&BridgeConfig::default()).unwrap();
        assert_eq!(BridgeConfig::from_toml(&content).unwrap(), BridgeConfig::default());
    }

    #[test]
    fn test_duplicate_pins_rejected() {
        let result = BridgeConfig::from_toml(
            r#"
            [pins]
            light = 23
            fan = 23
            "#,
        );
        let message = result.unwrap_err().to_string();
        assert!(message.contains("GPIO 23"), "{message}");
    }

    #[test]
    fn test_zero_intervals_rejected() {
        assert!(BridgeConfig::from_toml("tick_interval_ms = 0").is_err());
        assert!(BridgeConfig::from_toml("[schedule]\nmirror_interval_ms = 0").is_err());
        assert!(BridgeConfig::from_toml("[local]\ninbound_capacity = 0").is_err());
    }

    #[test]
    fn test_broker_identities() {
        let mut config = BridgeConfig::default();
        config.local.username = Some("device".into());
        config.cloud.account = "alice".into();

        let local = config.local.broker();
        assert_eq!(local.topics, vec!["esp/cmd".to_string()]);
        assert_eq!(local.credentials.unwrap().password, "");

        let cloud = config.cloud.broker();
        assert_eq!(
            cloud.topics,
            vec!["alice/feeds/fan".to_string(), "alice/feeds/light".to_string()]
        );
        assert_eq!(cloud.credentials.unwrap().username, "alice");
        assert_eq!(cloud.reconnect_delay, Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_load_or_create_writes_defaults() {
        let mut path = std::env::temp_dir();
        path.push(format!("sensor-bridge-test-{}", std::process::id()));
        path.push(CONFIG_FILE);
        let _ = tokio::fs::remove_file(&path).await;

        let created = load_or_create(&path).await.unwrap();
        assert_eq!(created, BridgeConfig::default());
        assert!(path.exists());

        let reloaded = load_or_create(&path).await.unwrap();
        assert_eq!(reloaded, created);

        let _ = tokio::fs::remove_dir_all(path.parent().unwrap()).await;
    }
}
