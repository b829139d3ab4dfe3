//! Remote key codes

use std::fmt;

/// A single remote-control key press
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    /// Power toggle, used as "off" by session-method TVs
    Power,
    /// Discrete power off, used by legacy-method TVs
    PowerOff,
    /// Discrete power on
    PowerOn,
    VolumeUp,
    VolumeDown,
    Mute,
    Play,
    Pause,
    FastForward,
    Rewind,
    Exit,
    /// Opens the input source menu
    Source,
    Left,
    Right,
    Enter,
    /// Numeric key, always in `0..=9`
    Digit(u8),
    /// Bare `KEY` code: ignored by the TV but answered, so it doubles as a liveness check
    Ping,
}

impl Key {
    /// Key for a decimal digit character, `None` for anything else
    pub fn from_digit(c: char) -> Option<Key> {
        c.to_digit(10).map(|d| Key::Digit(d as u8))
    }

    /// Whether this key turns the TV off
    ///
    /// Power-off keys are the only ones allowed through during the
    /// power-off grace window.
    pub fn is_power_off(&self) -> bool {
        matches!(self, Key::Power | Key::PowerOff)
    }

    /// Code sent on the wire, e.g. `KEY_VOLUP`
    pub fn code(&self) -> String {
        match self {
            Key::Digit(d) => format!("KEY_{}", d),
            Key::Ping => "KEY".to_string(),
            other => format!("KEY_{}", other.name()),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Key::Power => "POWER",
            Key::PowerOff => "POWEROFF",
            Key::PowerOn => "POWERON",
            Key::VolumeUp => "VOLUP",
            Key::VolumeDown => "VOLDOWN",
            Key::Mute => "MUTE",
            Key::Play => "PLAY",
            Key::Pause => "PAUSE",
            Key::FastForward => "FF",
            Key::Rewind => "REWIND",
            Key::Exit => "EXIT",
            Key::Source => "SOURCE",
            Key::Left => "LEFT",
            Key::Right => "RIGHT",
            Key::Enter => "ENTER",
            Key::Digit(_) | Key::Ping => "",
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.code())
    }
}
