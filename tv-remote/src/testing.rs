//! In-memory fakes for driving a controller without a TV
//!
//! [`FakeConnector`] hands out scripted sessions and records everything the
//! controller does with them. [`FakeProber`] and [`FakeWaker`] stand in for
//! the reachability probe and wake-on-LAN.

use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use remote_client::{
    Key, MacAddress, Property, PropertyValue, RemoteError, RemoteSession, SessionConfig,
    SessionConnector, WakeSignal,
};

use crate::descriptor::DeviceDescriptor;
use crate::probe::PowerProber;
use crate::state::PowerState;

/// Scripted outcome of one session call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Ok,
    /// Session closed by the TV
    Closed,
    BrokenPipe,
    /// TV answered with something unexpected
    Rejected,
    AccessDenied,
    Unreachable,
    InvalidValue,
}

impl Step {
    fn outcome(self) -> Result<(), RemoteError> {
        match self {
            Step::Ok => Ok(()),
            Step::Closed => Err(RemoteError::ConnectionClosed("closed by peer".into())),
            Step::BrokenPipe => Err(RemoteError::BrokenPipe),
            Step::Rejected => Err(RemoteError::UnhandledResponse("unexpected frame".into())),
            Step::AccessDenied => Err(RemoteError::AccessDenied),
            Step::Unreachable => Err(RemoteError::Unreachable(io::Error::new(
                io::ErrorKind::ConnectionRefused,
                "connection refused",
            ))),
            Step::InvalidValue => Err(RemoteError::InvalidValue("bad value".into())),
        }
    }
}

/// A key call as seen by the fake transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SentKey {
    /// 1-based number of the session that carried it
    pub session: usize,
    pub key: Key,
    pub at: Instant,
    pub outcome: Step,
}

#[derive(Default)]
struct Shared {
    connect_script: VecDeque<Step>,
    send_script: VecDeque<Step>,
    set_script: VecDeque<Step>,
    close_script: VecDeque<Step>,
    get_failures: HashMap<Property, Step>,
    values: HashMap<Property, PropertyValue>,
    sent: Vec<SentKey>,
    sets: Vec<(Property, PropertyValue)>,
    connects: usize,
    closes: usize,
    live: usize,
    max_live: usize,
}

/// Connector whose sessions follow a script
///
/// Calls without a scripted step succeed.
#[derive(Default)]
pub struct FakeConnector {
    shared: Arc<Mutex<Shared>>,
}

impl FakeConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Next `count` connects fail as unreachable
    pub fn fail_connects(&self, count: usize) {
        let mut shared = self.shared.lock();
        shared.connect_script.extend(std::iter::repeat(Step::Unreachable).take(count));
    }

    pub fn script_connect(&self, step: Step) {
        self.shared.lock().connect_script.push_back(step);
    }

    pub fn script_send(&self, steps: impl IntoIterator<Item = Step>) {
        self.shared.lock().send_script.extend(steps);
    }

    pub fn script_set(&self, steps: impl IntoIterator<Item = Step>) {
        self.shared.lock().set_script.extend(steps);
    }

    pub fn script_close(&self, step: Step) {
        self.shared.lock().close_script.push_back(step);
    }

    /// Every read of `property` fails with `step`
    pub fn fail_get(&self, property: Property, step: Step) {
        self.shared.lock().get_failures.insert(property, step);
    }

    /// Value reported by the TV for `property`
    pub fn set_value(&self, property: Property, value: PropertyValue) {
        self.shared.lock().values.insert(property, value);
    }

    pub fn sent(&self) -> Vec<SentKey> {
        self.shared.lock().sent.clone()
    }

    /// Keys the TV accepted, in order
    pub fn delivered_keys(&self) -> Vec<Key> {
        self.shared
            .lock()
            .sent
            .iter()
            .filter(|s| s.outcome == Step::Ok)
            .map(|s| s.key)
            .collect()
    }

    pub fn sets(&self) -> Vec<(Property, PropertyValue)> {
        self.shared.lock().sets.clone()
    }

    pub fn connects(&self) -> usize {
        self.shared.lock().connects
    }

    pub fn closes(&self) -> usize {
        self.shared.lock().closes
    }

    /// Sessions currently open
    pub fn live(&self) -> usize {
        self.shared.lock().live
    }

    /// Most sessions ever open at once
    pub fn max_live(&self) -> usize {
        self.shared.lock().max_live
    }
}

impl SessionConnector for FakeConnector {
    fn connect(&self, _config: &SessionConfig) -> Result<Box<dyn RemoteSession>, RemoteError> {
        let mut shared = self.shared.lock();
        let step = shared.connect_script.pop_front().unwrap_or(Step::Ok);
        step.outcome()?;

        shared.connects += 1;
        shared.live += 1;
        shared.max_live = shared.max_live.max(shared.live);
        Ok(Box::new(FakeSession {
            id: shared.connects,
            shared: Arc::clone(&self.shared),
            open: true,
        }))
    }
}

struct FakeSession {
    id: usize,
    shared: Arc<Mutex<Shared>>,
    open: bool,
}

impl FakeSession {
    fn release(&mut self, shared: &mut Shared) {
        if self.open {
            self.open = false;
            shared.live -= 1;
        }
    }
}

impl RemoteSession for FakeSession {
    fn send_key(&mut self, key: &Key) -> Result<(), RemoteError> {
        let mut shared = self.shared.lock();
        let step = shared.send_script.pop_front().unwrap_or(Step::Ok);
        shared.sent.push(SentKey {
            session: self.id,
            key: *key,
            at: Instant::now(),
            outcome: step,
        });
        step.outcome()
    }

    fn get_property(&mut self, property: Property) -> Result<PropertyValue, RemoteError> {
        let shared = self.shared.lock();
        if let Some(step) = shared.get_failures.get(&property) {
            step.outcome()?;
        }
        shared
            .values
            .get(&property)
            .cloned()
            .ok_or_else(|| RemoteError::UnhandledResponse(format!("no {} reported", property)))
    }

    fn set_property(
        &mut self,
        property: Property,
        value: PropertyValue,
    ) -> Result<(), RemoteError> {
        let mut shared = self.shared.lock();
        let step = shared.set_script.pop_front().unwrap_or(Step::Ok);
        step.outcome()?;
        shared.sets.push((property, value.clone()));
        shared.values.insert(property, value);
        Ok(())
    }

    fn close(&mut self) -> Result<(), RemoteError> {
        let shared = Arc::clone(&self.shared);
        let mut shared = shared.lock();
        shared.closes += 1;
        self.release(&mut shared);
        let step = shared.close_script.pop_front().unwrap_or(Step::Ok);
        step.outcome()
    }
}

impl Drop for FakeSession {
    fn drop(&mut self) {
        let shared = Arc::clone(&self.shared);
        let mut shared = shared.lock();
        self.release(&mut shared);
    }
}

/// Probe that reports whatever it was told
pub struct FakeProber {
    state: Mutex<PowerState>,
    probes: Mutex<usize>,
}

impl FakeProber {
    pub fn new(state: PowerState) -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(state),
            probes: Mutex::new(0),
        })
    }

    pub fn set(&self, state: PowerState) {
        *self.state.lock() = state;
    }

    pub fn probes(&self) -> usize {
        *self.probes.lock()
    }
}

impl PowerProber for FakeProber {
    fn probe(&self, _descriptor: &DeviceDescriptor) -> PowerState {
        *self.probes.lock() += 1;
        *self.state.lock()
    }
}

/// Records wake requests instead of sending packets
#[derive(Default)]
pub struct FakeWaker {
    woken: Mutex<Vec<MacAddress>>,
}

impl FakeWaker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn woken(&self) -> Vec<MacAddress> {
        self.woken.lock().clone()
    }
}

impl WakeSignal for FakeWaker {
    fn send_wake(&self, mac: &MacAddress) -> io::Result<()> {
        self.woken.lock().push(*mac);
        Ok(())
    }
}
