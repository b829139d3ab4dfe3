//! Immutable identity and connection parameters of one TV

use std::time::Duration;

use remote_client::{MacAddress, SessionConfig, TransportMethod};

use crate::config::{DiscoveryInfo, ManualConfig, DEFAULT_PORT, DEFAULT_TIMEOUT};
use crate::{ControlError, Result};

/// Name the controller announces to the TV when pairing
const CONTROLLER_NAME: &str = "tv-remote";
const CONTROLLER_ID: &str = "tv-remote.controller";

/// Port on which the status endpoint is served over TLS
const SECURE_PORT: u16 = 8002;

#[derive(Debug, Clone, PartialEq)]
pub struct DeviceDescriptor {
    host: String,
    port: u16,
    name: String,
    mac: Option<MacAddress>,
    unique_id: Option<String>,
    timeout: Duration,
    method: TransportMethod,
}

impl DeviceDescriptor {
    /// Build a descriptor; the transport method follows from `port`
    pub fn new(
        host: impl Into<String>,
        port: u16,
        name: impl Into<String>,
        mac: Option<MacAddress>,
        unique_id: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let host = host.into();
        if host.trim().is_empty() {
            return Err(ControlError::InvalidConfig("host must not be empty".to_string()));
        }
        if port == 0 {
            return Err(ControlError::InvalidConfig(format!("invalid port 0 for {}", host)));
        }
        if timeout.is_zero() {
            return Err(ControlError::InvalidConfig(format!(
                "timeout for {} must be positive",
                host
            )));
        }

        Ok(Self {
            host,
            port,
            name: name.into(),
            mac,
            unique_id,
            timeout,
            method: TransportMethod::for_port(port),
        })
    }

    pub fn from_manual(config: &ManualConfig) -> Result<Self> {
        Self::new(
            config.host.clone(),
            config.port,
            config.name.clone(),
            config.mac,
            None,
            config.timeout,
        )
    }

    /// Discovered devices use the default port and timeout and have no MAC
    pub fn from_discovery(info: &DiscoveryInfo) -> Result<Self> {
        Self::new(
            info.host.clone(),
            DEFAULT_PORT,
            info.display_name(),
            None,
            info.unique_id(),
            DEFAULT_TIMEOUT,
        )
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn mac(&self) -> Option<&MacAddress> {
        self.mac.as_ref()
    }

    pub fn unique_id(&self) -> Option<&str> {
        self.unique_id.as_deref()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn method(&self) -> TransportMethod {
        self.method
    }

    /// Key that turns this TV off
    pub fn power_off_key(&self) -> remote_client::Key {
        match self.method {
            TransportMethod::Session => remote_client::Key::Power,
            TransportMethod::Legacy => remote_client::Key::PowerOff,
        }
    }

    /// REST status endpoint used by the power probe
    pub fn status_url(&self) -> String {
        let scheme = if self.port == SECURE_PORT { "https" } else { "http" };
        format!("{}://{}:{}/api/v2/", scheme, self.host, self.port)
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            name: CONTROLLER_NAME.to_string(),
            description: self.name.clone(),
            id: CONTROLLER_ID.to_string(),
            host: self.host.clone(),
            port: self.port,
            timeout: self.timeout,
            method: self.method,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use remote_client::Key;

    fn descriptor(port: u16) -> DeviceDescriptor {
        DeviceDescriptor::new("192.168.1.50", port, "Den TV", None, None, Duration::from_secs(1))
            .unwrap()
    }

    #[test]
    fn test_method_follows_port() {
        assert_eq!(descriptor(8001).method(), TransportMethod::Session);
        assert_eq!(descriptor(8002).method(), TransportMethod::Session);
        assert_eq!(descriptor(55000).method(), TransportMethod::Legacy);
    }

    #[test]
    fn test_status_url_scheme() {
        assert_eq!(descriptor(8002).status_url(), "https://192.168.1.50:8002/api/v2/");
        assert_eq!(descriptor(8001).status_url(), "http://192.168.1.50:8001/api/v2/");
    }

    #[test]
    fn test_power_off_key_by_method() {
        assert_eq!(descriptor(8001).power_off_key(), Key::Power);
        assert_eq!(descriptor(55000).power_off_key(), Key::PowerOff);
    }

    #[test]
    fn test_invalid_descriptors() {
        let timeout = Duration::from_secs(1);
        assert!(DeviceDescriptor::new("", 8001, "x", None, None, timeout).is_err());
        assert!(DeviceDescriptor::new("tv", 0, "x", None, None, timeout).is_err());
        assert!(DeviceDescriptor::new("tv", 8001, "x", None, None, Duration::ZERO).is_err());
    }

    #[test]
    fn test_from_discovery() {
        let info = DiscoveryInfo {
            name: "Samsung".into(),
            model_name: "QE65".into(),
            host: "10.1.1.9".into(),
            udn: Some("uuid:abc-123".into()),
        };
        let descriptor = DeviceDescriptor::from_discovery(&info).unwrap();
        assert_eq!(descriptor.name(), "Samsung (QE65)");
        assert_eq!(descriptor.unique_id(), Some("abc-123"));
        assert_eq!(descriptor.port(), DEFAULT_PORT);
        assert!(descriptor.mac().is_none());
    }

    #[test]
    fn test_session_config() {
        let config = descriptor(8001).session_config();
        assert_eq!(config.description, "Den TV");
        assert_eq!(config.host, "192.168.1.50");
        assert_eq!(config.method, TransportMethod::Session);
    }
}
