//! Known-device registry
//!
//! The same TV can be configured manually and announced by discovery. The
//! registry keys devices by resolved address so only the first one wins.

use std::collections::HashSet;
use std::net::{IpAddr, ToSocketAddrs};

use parking_lot::Mutex;

use crate::{ControlError, Result};

#[derive(Debug, Default)]
pub struct DeviceRegistry {
    known: Mutex<HashSet<IpAddr>>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `host`; returns `false` if its address is already known
    pub fn register(&self, host: &str) -> Result<bool> {
        let ip = resolve(host)?;
        Ok(self.register_ip(ip))
    }

    pub fn register_ip(&self, ip: IpAddr) -> bool {
        self.known.lock().insert(ip)
    }

    /// Forget `host` again, e.g. when building its controller failed
    pub fn unregister_ip(&self, ip: IpAddr) -> bool {
        self.known.lock().remove(&ip)
    }

    pub fn contains(&self, ip: &IpAddr) -> bool {
        self.known.lock().contains(ip)
    }

    pub fn len(&self) -> usize {
        self.known.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.known.lock().is_empty()
    }

    /// Forget every device; only called at shutdown
    pub fn clear(&self) {
        self.known.lock().clear();
    }
}

/// First address `host` resolves to
pub fn resolve(host: &str) -> Result<IpAddr> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(ip);
    }

    let resolve_error = |source| ControlError::Resolve {
        host: host.to_string(),
        source,
    };
    (host, 0)
        .to_socket_addrs()
        .map_err(resolve_error)?
        .next()
        .map(|addr| addr.ip())
        .ok_or_else(|| {
            resolve_error(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "no addresses returned",
            ))
        })
}
