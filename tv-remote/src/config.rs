//! Setup input for devices
//!
//! A device comes either from manual configuration or from a discovery
//! announcement, never both. Durations are written as seconds in JSON.

use std::path::Path;
use std::time::Duration;

use remote_client::MacAddress;
use serde::{Deserialize, Serialize};

use crate::Result;

pub const DEFAULT_NAME: &str = "TV Remote";
pub const DEFAULT_PORT: u16 = 55000;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

/// One entry of the TV's source menu
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceEntry {
    pub name: String,
    /// Steps right of the menu's leftmost entry
    pub right_clicks: u32,
}

/// Manually configured device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManualConfig {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default)]
    pub mac: Option<MacAddress>,
    #[serde(default = "default_timeout", with = "secs")]
    pub timeout: Duration,
    #[serde(default)]
    pub sources: Vec<SourceEntry>,
}

impl ManualConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_PORT,
            name: DEFAULT_NAME.to_string(),
            mac: None,
            timeout: DEFAULT_TIMEOUT,
            sources: Vec::new(),
        }
    }
}

/// Device announced by discovery
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscoveryInfo {
    pub name: String,
    pub model_name: String,
    pub host: String,
    /// UPnP device name, e.g. `uuid:0ee9...`
    #[serde(default)]
    pub udn: Option<String>,
}

impl DiscoveryInfo {
    pub fn display_name(&self) -> String {
        format!("{} ({})", self.name, self.model_name)
    }

    /// Stable identifier derived from the UDN, only for `uuid:` UDNs
    pub fn unique_id(&self) -> Option<String> {
        self.udn
            .as_deref()
            .and_then(|udn| udn.strip_prefix("uuid:"))
            .filter(|id| !id.is_empty())
            .map(str::to_string)
    }
}

/// Exactly one source of setup input per device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceSetup {
    Manual(ManualConfig),
    Discovered(DiscoveryInfo),
}

impl DeviceSetup {
    pub fn host(&self) -> &str {
        match self {
            DeviceSetup::Manual(config) => &config.host,
            DeviceSetup::Discovered(info) => &info.host,
        }
    }
}

/// Timing constants of the controller
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlTimings {
    /// How long after a power-off the TV is treated as off
    #[serde(with = "secs")]
    pub power_off_grace: Duration,
    /// Pause between digit keys during channel entry
    #[serde(with = "secs")]
    pub key_press_interval: Duration,
    /// Timeout of the reachability probe
    #[serde(with = "secs")]
    pub probe_timeout: Duration,
}

impl Default for ControlTimings {
    fn default() -> Self {
        Self {
            power_off_grace: Duration::from_secs(15),
            key_press_interval: Duration::from_millis(1200),
            probe_timeout: Duration::from_secs(1),
        }
    }
}

/// Whole configuration file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemConfig {
    #[serde(default)]
    pub devices: Vec<ManualConfig>,
    #[serde(default)]
    pub timings: ControlTimings,
}

impl SystemConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_name() -> String {
    DEFAULT_NAME.to_string()
}

fn default_timeout() -> Duration {
    DEFAULT_TIMEOUT
}

mod secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}
