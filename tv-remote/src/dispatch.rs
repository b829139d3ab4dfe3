//! Command dispatch and power-state inference
//!
//! Every key and property write for a device goes through one
//! [`CommandDispatcher`]. It decides whether a command may be sent at all,
//! reconnects once when the session dropped under it, and turns the outcome
//! into a power-state update. Nothing here returns transport errors to the
//! caller.
//!
//! Outcome handling:
//!
//! | result                      | power | session        |
//! |-----------------------------|-------|----------------|
//! | success (first try or retry)| on    | kept           |
//! | rejected but answered       | on    | closed         |
//! | unreachable                 | off   | dropped        |
//!
//! An active power-off grace window overrides all of the above with off.

use std::sync::Arc;
use std::time::Duration;

use remote_client::{
    ErrorKind, Key, Property, PropertyValue, RemoteError, RemoteSession, SessionConnector,
    TransportMethod,
};

use crate::descriptor::DeviceDescriptor;
use crate::probe::PowerProber;
use crate::session::SessionManager;
use crate::state::{PowerState, RuntimeState, StateSnapshot};

/// Resends after a dropped session. Worst-case latency per command is
/// `timeout * (1 + SEND_RETRIES)`.
const SEND_RETRIES: usize = 1;

/// Result of handing a command to the dispatcher
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// The TV acknowledged the command
    Delivered,
    /// The TV answered but refused the command
    Rejected,
    /// Not sent: TV assumed off or powering off
    Suppressed,
    /// Sent but the TV could not be reached
    Failed,
}

pub struct CommandDispatcher {
    descriptor: Arc<DeviceDescriptor>,
    sessions: SessionManager,
    state: RuntimeState,
}

impl CommandDispatcher {
    pub fn new(descriptor: Arc<DeviceDescriptor>, connector: Arc<dyn SessionConnector>) -> Self {
        let sessions = SessionManager::new(connector, descriptor.session_config());
        Self {
            descriptor,
            sessions,
            state: RuntimeState::default(),
        }
    }

    pub fn descriptor(&self) -> &DeviceDescriptor {
        &self.descriptor
    }

    pub fn snapshot(&self) -> StateSnapshot {
        StateSnapshot {
            power: self.power(),
            muted: self.state.muted,
            volume: self.state.volume,
            playing: self.state.playing,
            powering_off: self.state.grace.is_active(),
            session_open: self.sessions.is_open(),
        }
    }

    /// Inferred power state; always off while the grace window runs
    pub fn power(&self) -> PowerState {
        if self.state.grace.is_active() {
            PowerState::Off
        } else {
            self.state.power
        }
    }

    pub fn is_powering_off(&self) -> bool {
        self.state.grace.is_active()
    }

    pub fn set_playing(&mut self, playing: bool) {
        self.state.playing = playing;
    }

    /// Start the power-off grace window
    ///
    /// The stored state is left alone so the power-off key itself still
    /// passes the hardware-address guard.
    pub fn begin_power_off(&mut self, grace: Duration) {
        self.state.grace.begin(grace);
    }

    /// Close the session, ignoring failures
    pub fn close_session(&mut self) {
        self.sessions.close_session();
    }

    /// Send one key press
    pub fn send_key(&mut self, key: Key) -> Dispatch {
        // Without a MAC there is no wake path, so sending keys is the only
        // way to find out the TV came back.
        if self.descriptor.mac().is_some() && self.state.power != PowerState::On {
            tracing::debug!("{} is not on, not sending {}", self.descriptor.name(), key);
            return Dispatch::Suppressed;
        }
        if self.state.grace.is_active() && !key.is_power_off() {
            tracing::info!(
                "{} is powering off, not sending command: {}",
                self.descriptor.name(),
                key
            );
            return Dispatch::Suppressed;
        }

        let result = self.with_session(|session| session.send_key(&key));
        let outcome = self.record_outcome(result, &key.to_string());
        self.apply_grace();
        outcome
    }

    /// Write a device property
    ///
    /// Refused during the grace window and when the probe says the TV is
    /// off. A successful write triggers a refresh of cached values.
    pub fn set_property(
        &mut self,
        prober: &dyn PowerProber,
        property: Property,
        value: PropertyValue,
    ) -> Dispatch {
        if self.state.grace.is_active() {
            tracing::info!(
                "{} is powering off, not setting property: {}",
                self.descriptor.name(),
                property
            );
            return Dispatch::Suppressed;
        }
        if self.probe_power(prober) != PowerState::On {
            tracing::debug!("{} is off, not setting {}", self.descriptor.name(), property);
            return Dispatch::Suppressed;
        }

        let what = format!("{}={}", property, value);
        let result = self.with_session(|session| session.set_property(property, value.clone()));
        let outcome = self.record_outcome(result, &what);
        self.apply_grace();

        if outcome == Dispatch::Delivered {
            self.refresh(prober);
        }
        outcome
    }

    /// Run the probe and apply its result
    pub fn probe_power(&mut self, prober: &dyn PowerProber) -> PowerState {
        let power = prober.probe(&self.descriptor);
        self.state.power = power;
        if power == PowerState::Off {
            self.sessions.invalidate();
        }
        power
    }

    /// Poll cycle: re-infer power, then refresh volume and mute if on
    pub fn refresh(&mut self, prober: &dyn PowerProber) {
        if self.state.grace.is_active() {
            self.state.power = PowerState::Off;
            return;
        }

        match self.descriptor.method() {
            TransportMethod::Session => {
                if self.probe_power(prober) == PowerState::On {
                    self.refresh_properties();
                }
            }
            // Legacy TVs have no status endpoint; a bare key answers instead.
            // It bypasses the MAC guard since it is how a woken TV is seen.
            TransportMethod::Legacy => {
                let result = self.with_session(|session| session.send_key(&Key::Ping));
                self.record_outcome(result, &Key::Ping.to_string());
            }
        }
    }

    fn refresh_properties(&mut self) {
        match self.read_property(Property::Volume) {
            Some(value) => match value.as_int() {
                Some(volume) => self.state.volume = volume.clamp(0, 100) as u8,
                None => tracing::debug!(
                    "Ignoring malformed volume from {}: {}",
                    self.descriptor.name(),
                    value
                ),
            },
            None => tracing::debug!(
                "Failed to get volume from {}. Is the TV turning off?",
                self.descriptor.name()
            ),
        }

        match self.read_property(Property::Mute) {
            Some(value) => match value.as_bool() {
                Some(muted) => self.state.muted = muted,
                None => tracing::debug!(
                    "Ignoring malformed mute from {}: {}",
                    self.descriptor.name(),
                    value
                ),
            },
            None => tracing::debug!(
                "Failed to get mute from {}. Is the TV turning off?",
                self.descriptor.name()
            ),
        }
    }

    /// Read one property; a failed read drops the session but says
    /// nothing about power, only a failed connect does
    fn read_property(&mut self, property: Property) -> Option<PropertyValue> {
        let session = match self.sessions.session() {
            Ok(session) => session,
            Err(e) => {
                tracing::debug!(
                    "Could not connect to {} to read {}: {}",
                    self.descriptor.name(),
                    property,
                    e
                );
                if e.kind() != ErrorKind::Rejected {
                    self.state.power = PowerState::Off;
                }
                return None;
            }
        };

        match session.get_property(property) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::debug!(
                    "Reading {} from {} failed: {}",
                    property,
                    self.descriptor.name(),
                    e
                );
                self.sessions.invalidate();
                None
            }
        }
    }

    /// Run `op` on the session, reconnecting and retrying once if the
    /// session dropped
    fn with_session<T>(
        &mut self,
        mut op: impl FnMut(&mut dyn RemoteSession) -> Result<T, RemoteError>,
    ) -> Result<T, RemoteError> {
        let mut attempt = 0;
        loop {
            let session = self.sessions.session()?;
            match op(session) {
                Ok(value) => return Ok(value),
                Err(e) if e.kind() == ErrorKind::SessionBroken => {
                    // Commands sent too fast can also break the pipe
                    self.sessions.invalidate();
                    if attempt >= SEND_RETRIES {
                        return Err(e);
                    }
                    attempt += 1;
                    tracing::debug!(
                        "Session to {} dropped ({}), reconnecting",
                        self.descriptor.name(),
                        e
                    );
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn record_outcome(&mut self, result: Result<(), RemoteError>, what: &str) -> Dispatch {
        let error = match result {
            Ok(()) => {
                self.state.power = PowerState::On;
                return Dispatch::Delivered;
            }
            Err(error) => error,
        };

        match error.kind() {
            ErrorKind::Rejected => {
                // An answer at all means the TV is on
                self.state.power = PowerState::On;
                self.sessions.close_session();
                tracing::warn!(
                    "Failed sending command {} to {}: {}",
                    what,
                    self.descriptor.name(),
                    error
                );
                Dispatch::Rejected
            }
            // Both attempts lost the session; the TV was still answering the connect
            ErrorKind::SessionBroken => {
                self.state.power = PowerState::On;
                tracing::debug!("Giving up on {} for {}: {}", what, self.descriptor.name(), error);
                Dispatch::Failed
            }
            ErrorKind::Unreachable => {
                self.state.power = PowerState::Off;
                self.sessions.invalidate();
                tracing::debug!(
                    "{} unreachable while sending {}: {}",
                    self.descriptor.name(),
                    what,
                    error
                );
                Dispatch::Failed
            }
            ErrorKind::InvalidValue => {
                tracing::error!("{} refused value {}: {}", self.descriptor.name(), what, error);
                Dispatch::Rejected
            }
        }
    }

    fn apply_grace(&mut self) {
        if self.state.grace.is_active() {
            self.state.power = PowerState::Off;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeConnector, FakeProber, Step};
    use remote_client::MacAddress;

    const GRACE: Duration = Duration::from_secs(15);

    fn descriptor(port: u16, mac: Option<MacAddress>) -> Arc<DeviceDescriptor> {
        Arc::new(
            DeviceDescriptor::new("10.0.0.9", port, "Lounge TV", mac, None, Duration::from_secs(1))
                .unwrap(),
        )
    }

    fn dispatcher(connector: &Arc<FakeConnector>) -> CommandDispatcher {
        CommandDispatcher::new(descriptor(8001, None), connector.clone())
    }

    #[test]
    fn test_success_marks_on() {
        let connector = FakeConnector::new();
        let mut dispatcher = dispatcher(&connector);
        assert_eq!(dispatcher.power(), PowerState::Unknown);

        assert_eq!(dispatcher.send_key(Key::VolumeUp), Dispatch::Delivered);

        assert_eq!(dispatcher.power(), PowerState::On);
        assert_eq!(connector.delivered_keys(), vec![Key::VolumeUp]);
    }

    #[test]
    fn test_closed_session_retries_once_on_fresh_session() {
        let connector = FakeConnector::new();
        connector.script_send([Step::Closed, Step::Ok]);
        let mut dispatcher = dispatcher(&connector);

        assert_eq!(dispatcher.send_key(Key::Mute), Dispatch::Delivered);

        let sessions: Vec<_> = connector.sent().iter().map(|s| s.session).collect();
        assert_eq!(sessions, vec![1, 2]);
        assert_eq!(dispatcher.power(), PowerState::On);
        assert_eq!(connector.max_live(), 1);
    }

    #[test]
    fn test_retry_then_unreachable_ends_off_without_session() {
        let connector = FakeConnector::new();
        connector.script_send([Step::BrokenPipe, Step::Unreachable]);
        let mut dispatcher = dispatcher(&connector);

        assert_eq!(dispatcher.send_key(Key::Mute), Dispatch::Failed);

        assert_eq!(connector.sent().len(), 2);
        assert_eq!(dispatcher.power(), PowerState::Off);
        assert!(!dispatcher.snapshot().session_open);
        assert_eq!(connector.live(), 0);
    }

    #[test]
    fn test_no_second_retry() {
        let connector = FakeConnector::new();
        connector.script_send([Step::Closed, Step::Closed, Step::Ok]);
        let mut dispatcher = dispatcher(&connector);

        assert_eq!(dispatcher.send_key(Key::Mute), Dispatch::Failed);
        assert_eq!(connector.sent().len(), 2);
        assert_eq!(connector.connects(), 2);
    }

    #[test]
    fn test_rejected_means_on_and_forces_reconnect() {
        let connector = FakeConnector::new();
        connector.script_send([Step::AccessDenied]);
        let mut dispatcher = dispatcher(&connector);

        assert_eq!(dispatcher.send_key(Key::Play), Dispatch::Rejected);

        assert_eq!(dispatcher.power(), PowerState::On);
        assert!(!dispatcher.snapshot().session_open);
        assert_eq!(connector.sent().len(), 1);
    }

    #[test]
    fn test_connect_failure_marks_off() {
        let connector = FakeConnector::new();
        connector.fail_connects(1);
        let mut dispatcher = dispatcher(&connector);

        assert_eq!(dispatcher.send_key(Key::VolumeUp), Dispatch::Failed);
        assert_eq!(dispatcher.power(), PowerState::Off);
        assert!(connector.sent().is_empty());
    }

    #[test]
    fn test_mac_guard_suppresses_until_on() {
        let connector = FakeConnector::new();
        let mac = "00:11:22:33:44:55".parse().unwrap();
        let mut dispatcher = CommandDispatcher::new(descriptor(8001, Some(mac)), connector.clone());

        assert_eq!(dispatcher.send_key(Key::VolumeUp), Dispatch::Suppressed);
        assert_eq!(connector.connects(), 0);

        dispatcher.probe_power(&*FakeProber::new(PowerState::On));
        assert_eq!(dispatcher.send_key(Key::VolumeUp), Dispatch::Delivered);
    }

    #[test]
    fn test_grace_blocks_all_but_power_off() {
        let connector = FakeConnector::new();
        let mut dispatcher = dispatcher(&connector);
        dispatcher.send_key(Key::Mute);
        dispatcher.begin_power_off(GRACE);

        assert_eq!(dispatcher.send_key(Key::VolumeUp), Dispatch::Suppressed);
        assert_eq!(dispatcher.send_key(Key::Power), Dispatch::Delivered);

        // Acknowledged, but the window still wins
        assert_eq!(dispatcher.power(), PowerState::Off);
        assert_eq!(connector.delivered_keys(), vec![Key::Mute, Key::Power]);
    }

    #[test]
    fn test_probe_off_drops_session() {
        let connector = FakeConnector::new();
        let mut dispatcher = dispatcher(&connector);
        dispatcher.send_key(Key::Mute);
        assert!(dispatcher.snapshot().session_open);

        let state = dispatcher.probe_power(&*FakeProber::new(PowerState::Off));

        assert_eq!(state, PowerState::Off);
        assert!(!dispatcher.snapshot().session_open);
        assert_eq!(connector.live(), 0);
    }

    #[test]
    fn test_refresh_reads_properties_independently() {
        let connector = FakeConnector::new();
        connector.set_value(Property::Volume, PropertyValue::Int(35));
        connector.fail_get(Property::Mute, Step::Rejected);
        let prober = FakeProber::new(PowerState::On);
        let mut dispatcher = dispatcher(&connector);

        dispatcher.refresh(&*prober);

        let snapshot = dispatcher.snapshot();
        assert_eq!(snapshot.power, PowerState::On);
        assert_eq!(snapshot.volume, 35);
        assert!(!snapshot.muted);
    }

    #[test]
    fn test_failed_read_keeps_probed_power() {
        let connector = FakeConnector::new();
        connector.fail_get(Property::Volume, Step::Unreachable);
        connector.set_value(Property::Mute, PropertyValue::Bool(true));
        let prober = FakeProber::new(PowerState::On);
        let mut dispatcher = dispatcher(&connector);

        dispatcher.refresh(&*prober);

        let snapshot = dispatcher.snapshot();
        assert_eq!(snapshot.power, PowerState::On);
        assert!(snapshot.muted);
        // Volume read dropped the first session, mute opened a second one
        assert_eq!(connector.connects(), 2);
        assert_eq!(connector.live(), 1);
    }

    #[test]
    fn test_refresh_connect_failure_marks_off() {
        let connector = FakeConnector::new();
        connector.fail_connects(2);
        let prober = FakeProber::new(PowerState::On);
        let mut dispatcher = dispatcher(&connector);

        dispatcher.refresh(&*prober);

        assert_eq!(dispatcher.power(), PowerState::Off);
        assert!(!dispatcher.snapshot().session_open);
    }

    #[test]
    fn test_refresh_during_grace_skips_probe() {
        let connector = FakeConnector::new();
        let prober = FakeProber::new(PowerState::On);
        let mut dispatcher = dispatcher(&connector);
        dispatcher.begin_power_off(GRACE);

        dispatcher.refresh(&*prober);

        assert_eq!(dispatcher.power(), PowerState::Off);
        assert_eq!(prober.probes(), 0);
    }

    #[test]
    fn test_legacy_refresh_pings() {
        let connector = FakeConnector::new();
        let prober = FakeProber::new(PowerState::Off);
        let mut dispatcher = CommandDispatcher::new(descriptor(55000, None), connector.clone());

        dispatcher.refresh(&*prober);

        assert_eq!(connector.delivered_keys(), vec![Key::Ping]);
        assert_eq!(dispatcher.power(), PowerState::On);
        assert_eq!(prober.probes(), 0);
    }

    #[test]
    fn test_legacy_ping_ignores_mac_guard() {
        let connector = FakeConnector::new();
        let mac = "00:11:22:33:44:55".parse().unwrap();
        let mut dispatcher =
            CommandDispatcher::new(descriptor(55000, Some(mac)), connector.clone());
        assert_eq!(dispatcher.send_key(Key::VolumeUp), Dispatch::Suppressed);

        dispatcher.refresh(&*FakeProber::new(PowerState::Off));

        assert_eq!(dispatcher.power(), PowerState::On);
        assert_eq!(dispatcher.send_key(Key::VolumeUp), Dispatch::Delivered);
        assert_eq!(connector.delivered_keys(), vec![Key::Ping, Key::VolumeUp]);
    }

    #[test]
    fn test_legacy_ping_unreachable_marks_off() {
        let connector = FakeConnector::new();
        connector.fail_connects(1);
        let mut dispatcher = CommandDispatcher::new(descriptor(55000, None), connector.clone());

        dispatcher.refresh(&*FakeProber::new(PowerState::On));

        assert_eq!(dispatcher.power(), PowerState::Off);
    }

    #[test]
    fn test_set_property_refreshes_on_success() {
        let connector = FakeConnector::new();
        let prober = FakeProber::new(PowerState::On);
        let mut dispatcher = dispatcher(&connector);

        let outcome = dispatcher.set_property(&*prober, Property::Volume, PropertyValue::Int(20));

        assert_eq!(outcome, Dispatch::Delivered);
        assert_eq!(dispatcher.snapshot().volume, 20);
        assert_eq!(connector.sets(), vec![(Property::Volume, PropertyValue::Int(20))]);
    }

    #[test]
    fn test_set_property_refused_when_off() {
        let connector = FakeConnector::new();
        let prober = FakeProber::new(PowerState::Off);
        let mut dispatcher = dispatcher(&connector);

        let outcome = dispatcher.set_property(&*prober, Property::Volume, PropertyValue::Int(20));

        assert_eq!(outcome, Dispatch::Suppressed);
        assert!(connector.sets().is_empty());
    }

    #[test]
    fn test_set_property_invalid_value_is_dropped() {
        let connector = FakeConnector::new();
        connector.script_set([Step::InvalidValue]);
        let prober = FakeProber::new(PowerState::On);
        let mut dispatcher = dispatcher(&connector);

        let outcome =
            dispatcher.set_property(&*prober, Property::Source, PropertyValue::Text("??".into()));

        assert_eq!(outcome, Dispatch::Rejected);
        assert_eq!(dispatcher.power(), PowerState::On);
        assert!(connector.sets().is_empty());
    }
}
