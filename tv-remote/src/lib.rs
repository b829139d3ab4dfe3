//! # tv-remote - power and session state machine for network TVs
//!
//! Turns high-level intents (power, volume, source, playback, channel) into
//! key presses sent over a control session that drops often, while keeping
//! track of whether the TV is on:
//!
//! ```rust,ignore
//! use tv_remote::{DeviceController, DeviceDescriptor};
//!
//! let descriptor =
//!     DeviceDescriptor::new("192.168.1.40", 8001, "Living Room", None, None, timeout)?;
//! let tv = DeviceController::builder(descriptor)
//!     .connector(connector)
//!     .build()?;
//!
//! tv.update();                   // probe power, refresh volume/mute
//! tv.volume_up();                // lazily connects, retries once on a dropped session
//! tv.select_source("HDMI1")?;    // drives the source menu
//! tv.turn_off();                 // starts the 15 s grace window
//! ```
//!
//! ## Architecture
//!
//! ```text
//! RemoteSystem (registry, shared collaborators)
//!     ↓
//! DeviceController (one lock per TV)
//!     ↓
//! CommandDispatcher ── GraceTimer, PowerProber
//!     ↓
//! SessionManager
//!     ↓
//! remote-client (RemoteSession / SessionConnector)
//! ```
//!
//! The TV protocol itself is not implemented here; plug one in through
//! [`remote_client::SessionConnector`].

pub use config::{
    ControlTimings, DeviceSetup, DiscoveryInfo, ManualConfig, SourceEntry, SystemConfig,
};
pub use controller::{
    channel_keys, DeviceController, DeviceControllerBuilder, MediaType, NavigationOutcome,
};
pub use descriptor::DeviceDescriptor;
pub use dispatch::{CommandDispatcher, Dispatch};
pub use error::{ControlError, Result};
pub use features::SupportedFeatures;
pub use grace::GraceTimer;
pub use probe::{HttpPowerProber, PowerProber};
pub use registry::DeviceRegistry;
pub use session::SessionManager;
pub use sources::{navigation_keys, SourceMap, MAX_RIGHT_CLICKS};
pub use state::{PowerState, StateSnapshot};
pub use system::RemoteSystem;

pub use remote_client::{Key, MacAddress, Property, PropertyValue, TransportMethod};

pub mod config;
mod controller;
mod descriptor;
mod dispatch;
mod error;
mod features;
mod grace;
mod probe;
pub mod registry;
mod session;
mod sources;
mod state;
mod system;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
