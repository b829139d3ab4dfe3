//! Inferred runtime state of a device

use std::fmt;

use crate::grace::GraceTimer;

/// Best guess of whether the TV is powered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PowerState {
    On,
    Off,
    /// Nothing observed yet
    #[default]
    Unknown,
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PowerState::On => f.write_str("on"),
            PowerState::Off => f.write_str("off"),
            PowerState::Unknown => f.write_str("unknown"),
        }
    }
}

/// Mutable per-device state, owned by the dispatcher
///
/// `muted`, `volume` and `playing` are last-known values; nothing guarantees
/// they match the TV.
#[derive(Debug, Clone)]
pub struct RuntimeState {
    pub(crate) power: PowerState,
    pub(crate) muted: bool,
    /// 0-100
    pub(crate) volume: u8,
    pub(crate) playing: bool,
    pub(crate) grace: GraceTimer,
}

impl Default for RuntimeState {
    fn default() -> Self {
        Self {
            power: PowerState::Unknown,
            muted: false,
            volume: 0,
            // Assume play mode so the first play/pause toggle pauses
            playing: true,
            grace: GraceTimer::new(),
        }
    }
}

/// Read-only copy of the state for callers
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StateSnapshot {
    pub power: PowerState,
    pub muted: bool,
    pub volume: u8,
    pub playing: bool,
    pub powering_off: bool,
    pub session_open: bool,
}

impl StateSnapshot {
    /// Volume as a 0.0-1.0 fraction
    pub fn volume_level(&self) -> f32 {
        f32::from(self.volume) / 100.0
    }
}
