//! Private remote-session capability for network-controlled TVs
//!
//! This crate describes what the controller needs from a TV control
//! session (send a key, read or write a property, close) without
//! implementing any particular TV protocol. Concrete sessions plug in
//! through [`SessionConnector`]. It also carries the wake-on-LAN sender
//! used to power on TVs that cannot receive keys while off.

mod error;
mod key;
pub mod wake;

pub use error::{ErrorKind, RemoteError, Result};
pub use key::Key;
pub use wake::{MacAddress, MagicPacketWaker, WakeSignal};

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Wire protocol family spoken by the TV
///
/// Chosen once from the port number and fixed for the device's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportMethod {
    /// Persistent session on ports 8001/8002
    Session,
    /// Older per-connection protocol, everything else
    Legacy,
}

impl TransportMethod {
    pub fn for_port(port: u16) -> Self {
        match port {
            8001 | 8002 => TransportMethod::Session,
            _ => TransportMethod::Legacy,
        }
    }
}

/// Constructor arguments for a session
#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// Name this controller announces to the TV
    pub name: String,
    /// Human readable description, usually the device's display name
    pub description: String,
    /// Stable controller identifier the TV uses to remember pairing
    pub id: String,
    pub host: String,
    pub port: u16,
    /// Upper bound for connect and each request
    pub timeout: Duration,
    pub method: TransportMethod,
}

/// Device properties readable or writable through a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Property {
    /// Volume on the device's 0-100 scale
    Volume,
    Mute,
    /// Active input source name
    Source,
}

impl Property {
    pub fn name(&self) -> &'static str {
        match self {
            Property::Volume => "volume",
            Property::Mute => "mute",
            Property::Source => "source",
        }
    }
}

impl fmt::Display for Property {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A property value as exchanged with the session
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Int(i64),
    Bool(bool),
    Text(String),
}

impl PropertyValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            PropertyValue::Int(v) => Some(*v),
            PropertyValue::Text(s) => s.trim().parse().ok(),
            PropertyValue::Bool(_) => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            PropertyValue::Bool(v) => Some(*v),
            PropertyValue::Int(v) => Some(*v != 0),
            PropertyValue::Text(s) => match s.trim() {
                "true" | "1" | "on" => Some(true),
                "false" | "0" | "off" => Some(false),
                _ => None,
            },
        }
    }
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Int(v) => write!(f, "{}", v),
            PropertyValue::Bool(v) => write!(f, "{}", v),
            PropertyValue::Text(v) => f.write_str(v),
        }
    }
}

/// A live control session with one TV
///
/// Every call may fail; callers decide what a failure means through
/// [`RemoteError::kind`]. Dropping a session must release its connection.
pub trait RemoteSession: Send {
    fn send_key(&mut self, key: &Key) -> Result<()>;

    fn get_property(&mut self, property: Property) -> Result<PropertyValue>;

    fn set_property(&mut self, property: Property, value: PropertyValue) -> Result<()>;

    fn close(&mut self) -> Result<()>;
}

/// Factory for sessions
pub trait SessionConnector: Send + Sync {
    fn connect(&self, config: &SessionConfig) -> Result<Box<dyn RemoteSession>>;
}

/// Connector that picks an implementation by [`TransportMethod`]
pub struct MethodRouter {
    session: Box<dyn SessionConnector>,
    legacy: Box<dyn SessionConnector>,
}

impl MethodRouter {
    pub fn new(session: Box<dyn SessionConnector>, legacy: Box<dyn SessionConnector>) -> Self {
        Self { session, legacy }
    }
}

impl SessionConnector for MethodRouter {
    fn connect(&self, config: &SessionConfig) -> Result<Box<dyn RemoteSession>> {
        match config.method {
            TransportMethod::Session => self.session.connect(config),
            TransportMethod::Legacy => self.legacy.connect(config),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(8001, TransportMethod::Session)]
    #[case(8002, TransportMethod::Session)]
    #[case(55000, TransportMethod::Legacy)]
    #[case(8000, TransportMethod::Legacy)]
    fn test_transport_method_for_port(#[case] port: u16, #[case] expected: TransportMethod) {
        assert_eq!(TransportMethod::for_port(port), expected);
    }

    #[test]
    fn test_property_value_coercion() {
        assert_eq!(PropertyValue::Int(42).as_int(), Some(42));
        assert_eq!(PropertyValue::Text(" 17 ".into()).as_int(), Some(17));
        assert_eq!(PropertyValue::Text("loud".into()).as_int(), None);
        assert_eq!(PropertyValue::Bool(true).as_int(), None);

        assert_eq!(PropertyValue::Bool(false).as_bool(), Some(false));
        assert_eq!(PropertyValue::Int(1).as_bool(), Some(true));
        assert_eq!(PropertyValue::Text("on".into()).as_bool(), Some(true));
        assert_eq!(PropertyValue::Text("maybe".into()).as_bool(), None);
    }

    struct Refusing(&'static str);

    impl SessionConnector for Refusing {
        fn connect(&self, _config: &SessionConfig) -> Result<Box<dyn RemoteSession>> {
            Err(RemoteError::InvalidValue(self.0.to_string()))
        }
    }

    fn config(method: TransportMethod) -> SessionConfig {
        SessionConfig {
            name: "tv-remote".into(),
            description: "Living Room TV".into(),
            id: "tv-remote.controller".into(),
            host: "192.168.1.20".into(),
            port: 8001,
            timeout: Duration::from_secs(1),
            method,
        }
    }

    #[rstest]
    #[case(TransportMethod::Session, "session")]
    #[case(TransportMethod::Legacy, "legacy")]
    fn test_router_picks_connector(#[case] method: TransportMethod, #[case] expected: &str) {
        let router = MethodRouter::new(Box::new(Refusing("session")), Box::new(Refusing("legacy")));
        match router.connect(&config(method)) {
            Err(RemoteError::InvalidValue(which)) => assert_eq!(which, expected),
            _ => panic!("Expected the {} connector to answer", expected),
        }
    }
}
