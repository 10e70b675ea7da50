use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::guard::GuardPolicy;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WallboxConfig {
    pub wallbox_url: String,

    /// Seconds to wait after navigating before the page is read.
    pub page_load_timeout: u64,

    /// Seconds to wait after a click before the page is read again.
    pub settle_delay: u64,

    pub guard_policy: GuardPolicy,

    pub webdriver: WebDriverConfig,
}

impl Default for WallboxConfig {
    fn default() -> Self {
        Self {
            wallbox_url: String::from("http://enpal.fritz.box/wallbox"),
            page_load_timeout: 5,
            settle_delay: 3,
            guard_policy: GuardPolicy::default(),
            webdriver: WebDriverConfig::default(),
        }
    }
}

impl WallboxConfig {
    pub fn page_load_timeout(&self) -> Duration {
        Duration::from_secs(self.page_load_timeout)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_secs(self.settle_delay)
    }

    /// Read the config, writing a default one first if `path` doesn't exist.
    pub fn load_or_create(path: &Path) -> Result<Self> {
        if !path.exists() {
            let contents = toml::to_string_pretty(&Self::default())?;
            std::fs::write(path, contents).map_err(|source| Error::ConfigIo {
                path: path.display().to_string(),
                source,
            })?;
            tracing::info!("Created default configuration file: {}", path.display());
        }
        read_toml(path)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebDriverConfig {
    /// Where the WebDriver server listens.
    pub url: String,

    /// Spawn `geckodriver` for every session, listening on the port of `url`.
    /// Turn off to use an already running WebDriver server.
    pub spawn_geckodriver: bool,
    pub geckodriver: String,

    pub headless: bool,
}

impl Default for WebDriverConfig {
    fn default() -> Self {
        Self {
            url: String::from("http://localhost:4444"),
            spawn_geckodriver: true,
            geckodriver: String::from("geckodriver"),
            headless: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub log_level: String,

    /// Bearer token every request must carry.  No auth when unset.
    pub auth_token: Option<String>,

    /// Path of the wallbox config used by the controller.
    pub wallbox_config: String,

    /// Solar production (W) above which MQTT solar data switches to solar mode.
    pub solar_threshold_w: f64,

    pub influxdb: Option<InfluxConfig>,
    pub mqtt: Option<MqttConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: String::from("0.0.0.0"),
            port: 8080,
            log_level: String::from("info"),
            auth_token: None,
            wallbox_config: String::from("wallbox.toml"),
            solar_threshold_w: 3000.0,
            influxdb: None,
            mqtt: None,
        }
    }
}

impl ServerConfig {
    /// Unlike the wallbox config, a missing server config is not written out.
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            read_toml(path)
        } else {
            Ok(Self::default())
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InfluxConfig {
    pub url: Option<String>,
    pub token: Option<String>,
    pub org: Option<String>,
    pub bucket: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    pub broker: String,
    pub port: u16,
    pub client_id: String,

    /// Observed status is published here.
    pub topic: String,
    pub command_topic: String,
    pub solar_topic: String,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            broker: String::from("localhost"),
            port: 1883,
            client_id: String::from("wallbox-remote"),
            topic: String::from("wallbox/status"),
            command_topic: String::from("wallbox/command"),
            solar_topic: String::from("solar/production"),
        }
    }
}

fn read_toml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let contents = std::fs::read_to_string(path).map_err(|source| Error::ConfigIo {
        path: path.display().to_string(),
        source,
    })?;
    toml::from_str(&contents).map_err(|source| Error::ConfigParse {
        path: path.display().to_string(),
        source,
    })
}
