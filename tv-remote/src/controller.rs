//! Device controller - host-facing operations for one TV
//!
//! Wraps the dispatcher in a per-device lock so that commands, polls and
//! key sequences for one TV never interleave, while different TVs stay
//! independent.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use remote_client::{Key, MagicPacketWaker, Property, PropertyValue, SessionConnector, WakeSignal};

use crate::config::ControlTimings;
use crate::descriptor::DeviceDescriptor;
use crate::dispatch::{CommandDispatcher, Dispatch};
use crate::features::SupportedFeatures;
use crate::probe::{HttpPowerProber, PowerProber};
use crate::sources::{navigation_keys, SourceMap};
use crate::state::{PowerState, StateSnapshot};
use crate::{ControlError, Result};

/// Kind of media passed to [`DeviceController::play_media`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    Channel,
    Music,
    Video,
    Playlist,
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MediaType::Channel => "channel",
            MediaType::Music => "music",
            MediaType::Video => "video",
            MediaType::Playlist => "playlist",
        };
        f.write_str(name)
    }
}

/// Result of a source selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationOutcome {
    /// The full key sequence was sent
    Selected,
    /// The TV is not on; nothing (or only the first exit) was sent
    Skipped,
}

/// One key per digit of a channel number
///
/// Rejects anything that is not a positive decimal integer.
pub fn channel_keys(channel: &str) -> Result<Vec<Key>> {
    let keys: Option<Vec<Key>> = channel.chars().map(Key::from_digit).collect();
    match keys {
        Some(keys) if !keys.is_empty() && keys.iter().any(|k| *k != Key::Digit(0)) => Ok(keys),
        _ => Err(ControlError::InvalidInput(format!(
            "channel must be a positive integer, got {:?}",
            channel
        ))),
    }
}

/// Wakes a sleeping key sequence early when the controller is torn down
#[derive(Default)]
struct CancelSignal {
    cancelled: Mutex<bool>,
    condvar: Condvar,
}

impl CancelSignal {
    fn cancel(&self) {
        *self.cancelled.lock() = true;
        self.condvar.notify_all();
    }

    fn is_cancelled(&self) -> bool {
        *self.cancelled.lock()
    }

    /// Sleep for `timeout`; returns true if cancelled meanwhile
    fn wait(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut cancelled = self.cancelled.lock();
        while !*cancelled {
            if self.condvar.wait_until(&mut cancelled, deadline).timed_out() {
                break;
            }
        }
        *cancelled
    }
}

struct ControllerInner {
    descriptor: Arc<DeviceDescriptor>,
    sources: SourceMap,
    timings: ControlTimings,
    dispatcher: Mutex<CommandDispatcher>,
    prober: Arc<dyn PowerProber>,
    waker: Arc<dyn WakeSignal>,
    cancel: CancelSignal,
}

/// Handle to one TV
///
/// Cloning is cheap; all clones share the same state and lock. No method
/// returns transport failures: they are logged and folded into the
/// inferred state. Errors are only returned for input that was rejected
/// before anything was sent.
#[derive(Clone)]
pub struct DeviceController {
    inner: Arc<ControllerInner>,
}

impl DeviceController {
    pub fn builder(descriptor: DeviceDescriptor) -> DeviceControllerBuilder {
        DeviceControllerBuilder::new(descriptor)
    }

    pub fn descriptor(&self) -> &DeviceDescriptor {
        &self.inner.descriptor
    }

    pub fn name(&self) -> &str {
        self.inner.descriptor.name()
    }

    pub fn unique_id(&self) -> Option<&str> {
        self.inner.descriptor.unique_id()
    }

    pub fn snapshot(&self) -> StateSnapshot {
        self.inner.dispatcher.lock().snapshot()
    }

    pub fn power_state(&self) -> PowerState {
        self.inner.dispatcher.lock().power()
    }

    pub fn is_volume_muted(&self) -> bool {
        self.snapshot().muted
    }

    /// Last known volume as a 0.0-1.0 fraction
    pub fn volume_level(&self) -> f32 {
        self.snapshot().volume_level()
    }

    pub fn source_list(&self) -> Vec<String> {
        self.inner.sources.names()
    }

    pub fn supported_features(&self) -> SupportedFeatures {
        if self.inner.descriptor.mac().is_some() {
            SupportedFeatures::BASE | SupportedFeatures::TURN_ON
        } else {
            SupportedFeatures::BASE
        }
    }

    /// Poll cycle, see [`CommandDispatcher::refresh`]
    pub fn update(&self) {
        self.inner.dispatcher.lock().refresh(self.inner.prober.as_ref());
    }

    pub fn turn_on(&self) -> Dispatch {
        let Some(mac) = self.inner.descriptor.mac() else {
            return self.send_key(Key::PowerOn);
        };

        // A fully-off TV cannot receive keys
        match self.inner.waker.send_wake(mac) {
            Ok(()) => {
                tracing::info!("Sent wake-on-LAN to {} ({})", self.name(), mac);
                Dispatch::Delivered
            }
            Err(e) => {
                tracing::warn!("Failed to send wake-on-LAN to {} ({}): {}", self.name(), mac, e);
                Dispatch::Failed
            }
        }
    }

    /// Power off and start the grace window
    ///
    /// The session is closed right away so the host sees the TV as off
    /// immediately, even though the TV takes longer to shut down.
    pub fn turn_off(&self) -> Dispatch {
        let mut dispatcher = self.inner.dispatcher.lock();
        dispatcher.begin_power_off(self.inner.timings.power_off_grace);
        let outcome = dispatcher.send_key(self.inner.descriptor.power_off_key());
        dispatcher.close_session();
        outcome
    }

    pub fn volume_up(&self) -> Dispatch {
        self.send_key(Key::VolumeUp)
    }

    pub fn volume_down(&self) -> Dispatch {
        self.send_key(Key::VolumeDown)
    }

    /// Toggle mute; the TV only has a toggle key, so `mute` is not consulted
    pub fn mute_volume(&self, _mute: bool) -> Dispatch {
        self.send_key(Key::Mute)
    }

    /// Set volume from a 0.0-1.0 fraction
    pub fn set_volume(&self, level: f32) -> Result<Dispatch> {
        if !level.is_finite() || !(0.0..=1.0).contains(&level) {
            tracing::error!("Invalid volume level for {}: {}", self.name(), level);
            return Err(ControlError::InvalidInput(format!(
                "volume must be within 0.0..=1.0, got {}",
                level
            )));
        }

        let value = PropertyValue::Int((level * 100.0).round() as i64);
        Ok(self
            .inner
            .dispatcher
            .lock()
            .set_property(self.inner.prober.as_ref(), Property::Volume, value))
    }

    pub fn media_play(&self) -> Dispatch {
        let mut dispatcher = self.inner.dispatcher.lock();
        dispatcher.set_playing(true);
        dispatcher.send_key(Key::Play)
    }

    pub fn media_pause(&self) -> Dispatch {
        let mut dispatcher = self.inner.dispatcher.lock();
        dispatcher.set_playing(false);
        dispatcher.send_key(Key::Pause)
    }

    pub fn media_play_pause(&self) -> Dispatch {
        let mut dispatcher = self.inner.dispatcher.lock();
        let playing = dispatcher.snapshot().playing;
        dispatcher.set_playing(!playing);
        dispatcher.send_key(if playing { Key::Pause } else { Key::Play })
    }

    pub fn media_next_track(&self) -> Dispatch {
        self.send_key(Key::FastForward)
    }

    pub fn media_previous_track(&self) -> Dispatch {
        self.send_key(Key::Rewind)
    }

    /// Select a configured source by driving the source menu
    ///
    /// The whole sequence runs under the device lock.
    pub fn select_source(&self, source: &str) -> Result<NavigationOutcome> {
        let keys = navigation_keys(&self.inner.sources, source).map_err(|e| {
            tracing::error!("Cannot select source on {}: {}", self.name(), e);
            e
        })?;

        let mut dispatcher = self.inner.dispatcher.lock();
        let Some((first, rest)) = keys.split_first() else {
            return Ok(NavigationOutcome::Skipped);
        };

        if dispatcher.power() == PowerState::On {
            dispatcher.send_key(*first);
        }
        if dispatcher.power() != PowerState::On {
            tracing::info!("{} is powered off, not selecting source: {}", self.name(), source);
            return Ok(NavigationOutcome::Skipped);
        }

        for key in rest {
            dispatcher.send_key(*key);
        }
        Ok(NavigationOutcome::Selected)
    }

    /// Only channels are supported
    pub fn play_media(&self, media_type: MediaType, media_id: &str) -> Result<()> {
        if media_type != MediaType::Channel {
            tracing::error!("Unsupported media type: {}", media_type);
            return Err(ControlError::UnsupportedMediaType(media_type.to_string()));
        }
        self.play_channel(media_id)
    }

    /// Type a channel number, one digit at a time
    ///
    /// The device lock is released while waiting between digits. A
    /// [`teardown`](Self::teardown) during the sequence stops it; digits
    /// already sent stay sent.
    pub fn play_channel(&self, channel: &str) -> Result<()> {
        let keys = channel_keys(channel).map_err(|e| {
            tracing::error!("Rejecting channel for {}: {}", self.name(), e);
            e
        })?;

        for (sent, key) in keys.iter().enumerate() {
            let cancelled = if sent == 0 {
                self.inner.cancel.is_cancelled()
            } else {
                self.inner.cancel.wait(self.inner.timings.key_press_interval)
            };
            if cancelled {
                tracing::info!("Channel entry on {} cancelled after {} digits", self.name(), sent);
                return Err(ControlError::Cancelled { sent });
            }
            self.send_key(*key);
        }
        Ok(())
    }

    /// Stop running sequences and close the session
    pub fn teardown(&self) {
        self.inner.cancel.cancel();
        self.inner.dispatcher.lock().close_session();
        tracing::debug!("Controller for {} torn down", self.name());
    }

    fn send_key(&self, key: Key) -> Dispatch {
        self.inner.dispatcher.lock().send_key(key)
    }
}

impl fmt::Debug for DeviceController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceController")
            .field("descriptor", &self.inner.descriptor)
            .field("sources", &self.inner.sources)
            .finish()
    }
}

/// Builder for [`DeviceController`]
///
/// Only the connector is required. The prober defaults to the HTTP status
/// probe and the waker to a UDP broadcast magic packet.
pub struct DeviceControllerBuilder {
    descriptor: DeviceDescriptor,
    sources: SourceMap,
    timings: ControlTimings,
    connector: Option<Arc<dyn SessionConnector>>,
    prober: Option<Arc<dyn PowerProber>>,
    waker: Option<Arc<dyn WakeSignal>>,
}

impl DeviceControllerBuilder {
    fn new(descriptor: DeviceDescriptor) -> Self {
        Self {
            descriptor,
            sources: SourceMap::default(),
            timings: ControlTimings::default(),
            connector: None,
            prober: None,
            waker: None,
        }
    }

    pub fn sources(mut self, sources: SourceMap) -> Self {
        self.sources = sources;
        self
    }

    pub fn timings(mut self, timings: ControlTimings) -> Self {
        self.timings = timings;
        self
    }

    pub fn connector(mut self, connector: Arc<dyn SessionConnector>) -> Self {
        self.connector = Some(connector);
        self
    }

    pub fn prober(mut self, prober: Arc<dyn PowerProber>) -> Self {
        self.prober = Some(prober);
        self
    }

    pub fn waker(mut self, waker: Arc<dyn WakeSignal>) -> Self {
        self.waker = Some(waker);
        self
    }

    pub fn build(self) -> Result<DeviceController> {
        let connector = self.connector.ok_or_else(|| {
            ControlError::InvalidConfig(format!(
                "no session connector for {}",
                self.descriptor.name()
            ))
        })?;
        let prober = self
            .prober
            .unwrap_or_else(|| Arc::new(HttpPowerProber::new(self.timings.probe_timeout)));
        let waker = self.waker.unwrap_or_else(|| Arc::new(MagicPacketWaker::new()));

        let descriptor = Arc::new(self.descriptor);
        let dispatcher = CommandDispatcher::new(Arc::clone(&descriptor), connector);

        Ok(DeviceController {
            inner: Arc::new(ControllerInner {
                descriptor,
                sources: self.sources,
                timings: self.timings,
                dispatcher: Mutex::new(dispatcher),
                prober,
                waker,
                cancel: CancelSignal::default(),
            }),
        })
    }
}
