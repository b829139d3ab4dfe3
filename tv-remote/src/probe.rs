//! Session-independent power detection
//!
//! Session-method TVs serve a small REST status document while they are on.
//! Fetching it tells us whether the TV is powered without touching the
//! (fragile) control session.

use std::time::Duration;

use reqwest::blocking::Client;

use crate::descriptor::DeviceDescriptor;
use crate::state::PowerState;

/// Infers power state from outside the control session
///
/// Implementations never fail: anything that is not a positive answer
/// means the TV is off.
pub trait PowerProber: Send + Sync {
    fn probe(&self, descriptor: &DeviceDescriptor) -> PowerState;
}

/// Probes `GET /api/v2/` on the TV
#[derive(Debug, Clone)]
pub struct HttpPowerProber {
    client: Option<Client>,
}

impl HttpPowerProber {
    pub fn new(timeout: Duration) -> Self {
        // The TV presents a self-signed certificate on its secure port
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .danger_accept_invalid_certs(true)
            .build();

        match client {
            Ok(client) => Self { client: Some(client) },
            Err(e) => {
                tracing::error!("Failed to build probe HTTP client, TVs will read as off: {}", e);
                Self { client: None }
            }
        }
    }
}

impl Default for HttpPowerProber {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

impl PowerProber for HttpPowerProber {
    fn probe(&self, descriptor: &DeviceDescriptor) -> PowerState {
        let Some(client) = &self.client else {
            return PowerState::Off;
        };

        let url = descriptor.status_url();
        match client.get(&url).send() {
            Ok(response) if response.status().is_success() => PowerState::On,
            Ok(response) => {
                tracing::info!(
                    "Error status returned when checking if {} is on: {}",
                    descriptor.name(),
                    response.status()
                );
                PowerState::Off
            }
            Err(e) => {
                tracing::debug!("{} did not answer {}: {}", descriptor.name(), url, e);
                PowerState::Off
            }
        }
    }
}
