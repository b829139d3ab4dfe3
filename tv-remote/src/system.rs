//! RemoteSystem - entry point for hosts managing several TVs
//!
//! Owns the shared collaborators (session connector, power prober, waker)
//! and the dedup registry, and builds one [`DeviceController`] per TV.

use std::sync::Arc;

use parking_lot::RwLock;
use remote_client::{MagicPacketWaker, SessionConnector, WakeSignal};

use crate::config::{ControlTimings, DeviceSetup, SystemConfig};
use crate::controller::DeviceController;
use crate::descriptor::DeviceDescriptor;
use crate::probe::{HttpPowerProber, PowerProber};
use crate::registry::{self, DeviceRegistry};
use crate::sources::SourceMap;
use crate::{ControlError, Result};

/// Set of controlled TVs
///
/// # Example
///
/// ```rust,ignore
/// use tv_remote::{DeviceSetup, ManualConfig, RemoteSystem};
///
/// let system = RemoteSystem::new(connector);
/// system.add_device(DeviceSetup::Manual(ManualConfig::new("192.168.1.40")))?;
///
/// let tv = system.get_by_name("TV Remote").unwrap();
/// tv.volume_up();
/// system.refresh_all();
/// ```
pub struct RemoteSystem {
    registry: DeviceRegistry,
    connector: Arc<dyn SessionConnector>,
    prober: Arc<dyn PowerProber>,
    waker: Arc<dyn WakeSignal>,
    timings: ControlTimings,
    /// Controllers in setup order
    controllers: RwLock<Vec<DeviceController>>,
}

impl RemoteSystem {
    /// System with default timings, HTTP probing and broadcast wake
    pub fn new(connector: Arc<dyn SessionConnector>) -> Self {
        let timings = ControlTimings::default();
        Self::with_parts(
            connector,
            Arc::new(HttpPowerProber::new(timings.probe_timeout)),
            Arc::new(MagicPacketWaker::new()),
            timings,
        )
    }

    pub fn with_parts(
        connector: Arc<dyn SessionConnector>,
        prober: Arc<dyn PowerProber>,
        waker: Arc<dyn WakeSignal>,
        timings: ControlTimings,
    ) -> Self {
        Self {
            registry: DeviceRegistry::new(),
            connector,
            prober,
            waker,
            timings,
            controllers: RwLock::new(Vec::new()),
        }
    }

    /// Build a system and add every configured device
    pub fn from_config(config: SystemConfig, connector: Arc<dyn SessionConnector>) -> Result<Self> {
        let system = Self::with_parts(
            connector,
            Arc::new(HttpPowerProber::new(config.timings.probe_timeout)),
            Arc::new(MagicPacketWaker::new()),
            config.timings,
        );
        for device in config.devices {
            system.add_device(DeviceSetup::Manual(device))?;
        }
        Ok(system)
    }

    /// Add a device unless its address is already controlled
    ///
    /// Returns `Ok(None)` for duplicates. Errors are construction-fatal:
    /// bad configuration or a host that does not resolve.
    pub fn add_device(&self, setup: DeviceSetup) -> Result<Option<DeviceController>> {
        let (descriptor, sources) = match &setup {
            DeviceSetup::Manual(config) => (
                DeviceDescriptor::from_manual(config)?,
                SourceMap::new(config.sources.clone())?,
            ),
            DeviceSetup::Discovered(info) => {
                (DeviceDescriptor::from_discovery(info)?, SourceMap::default())
            }
        };

        let ip = registry::resolve(descriptor.host())?;
        if !self.registry.register_ip(ip) {
            tracing::info!(
                "Ignoring duplicate TV {}:{}",
                descriptor.host(),
                descriptor.port()
            );
            return Ok(None);
        }

        let host = descriptor.host().to_string();
        let port = descriptor.port();
        let controller = DeviceController::builder(descriptor)
            .sources(sources)
            .timings(self.timings)
            .connector(Arc::clone(&self.connector))
            .prober(Arc::clone(&self.prober))
            .waker(Arc::clone(&self.waker))
            .build()
            .map_err(|e| {
                self.registry.unregister_ip(ip);
                e
            })?;

        tracing::info!("TV {}:{} added as '{}'", host, port, controller.name());
        self.controllers.write().push(controller.clone());
        Ok(Some(controller))
    }

    pub fn controllers(&self) -> Vec<DeviceController> {
        self.controllers.read().clone()
    }

    pub fn get_by_name(&self, name: &str) -> Option<DeviceController> {
        self.controllers
            .read()
            .iter()
            .find(|c| c.name() == name)
            .cloned()
    }

    pub fn get_by_unique_id(&self, unique_id: &str) -> Option<DeviceController> {
        self.controllers
            .read()
            .iter()
            .find(|c| c.unique_id() == Some(unique_id))
            .cloned()
    }

    /// Like [`get_by_name`](Self::get_by_name) but an error when missing
    pub fn controller(&self, name: &str) -> Result<DeviceController> {
        self.get_by_name(name)
            .ok_or_else(|| ControlError::DeviceNotFound(name.to_string()))
    }

    pub fn device_names(&self) -> Vec<String> {
        self.controllers
            .read()
            .iter()
            .map(|c| c.name().to_string())
            .collect()
    }

    /// Run one poll cycle on every device, one thread per device
    pub fn refresh_all(&self) {
        let controllers = self.controllers();
        std::thread::scope(|scope| {
            for controller in &controllers {
                scope.spawn(move || controller.update());
            }
        });
    }

    /// Tear down every controller and forget all devices
    pub fn shutdown(&self) {
        let controllers = std::mem::take(&mut *self.controllers.write());
        for controller in &controllers {
            controller.teardown();
        }
        self.registry.clear();
        tracing::info!("Shut down {} TV controllers", controllers.len());
    }
}

impl Drop for RemoteSystem {
    fn drop(&mut self) {
        self.shutdown();
    }
}
