//! Wake-on-LAN support
//!
//! A TV that is fully off cannot receive key presses, so turning it on goes
//! through a magic packet addressed to its network card instead.

use std::fmt;
use std::io;
use std::net::{Ipv4Addr, SocketAddr, UdpSocket};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Hardware (MAC) address of the TV's network interface
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MacAddress([u8; 6]);

impl MacAddress {
    pub fn new(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }

    pub fn octets(&self) -> [u8; 6] {
        self.0
    }

    /// Build the 102-byte magic packet for this address
    pub fn magic_packet(&self) -> Vec<u8> {
        let mut packet = vec![0xFF; 6];
        for _ in 0..16 {
            packet.extend_from_slice(&self.0);
        }
        packet
    }
}

/// Error returned when a MAC address string is malformed
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Invalid MAC address: {0}")]
pub struct ParseMacError(String);

impl FromStr for MacAddress {
    type Err = ParseMacError;

    /// Accepts `aa:bb:cc:dd:ee:ff`, `aa-bb-cc-dd-ee-ff` or `aabbccddeeff`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex: String = s.chars().filter(|c| *c != ':' && *c != '-').collect();
        if hex.len() != 12 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ParseMacError(s.to_string()));
        }

        let mut bytes = [0u8; 6];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16)
                .map_err(|_| ParseMacError(s.to_string()))?;
        }
        Ok(Self(bytes))
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

impl Serialize for MacAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MacAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Capability to wake a device by hardware address
///
/// Fire and forget: a successful return only means the packet left this host.
pub trait WakeSignal: Send + Sync {
    fn send_wake(&self, mac: &MacAddress) -> io::Result<()>;
}

/// Sends magic packets by UDP broadcast
#[derive(Debug, Clone)]
pub struct MagicPacketWaker {
    target: SocketAddr,
}

impl MagicPacketWaker {
    /// Broadcast to 255.255.255.255:9
    pub fn new() -> Self {
        Self::with_target(SocketAddr::from((Ipv4Addr::BROADCAST, 9)))
    }

    /// Send to a specific address, e.g. a subnet-directed broadcast
    pub fn with_target(target: SocketAddr) -> Self {
        Self { target }
    }
}

impl Default for MagicPacketWaker {
    fn default() -> Self {
        Self::new()
    }
}

impl WakeSignal for MagicPacketWaker {
    fn send_wake(&self, mac: &MacAddress) -> io::Result<()> {
        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;
        socket.set_broadcast(true)?;
        socket.send_to(&mac.magic_packet(), self.target)?;
        tracing::debug!("Sent magic packet for {} to {}", mac, self.target);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_separators() {
        let expected = MacAddress::new([0xaa, 0xbb, 0xcc, 0x01, 0x02, 0x03]);
        assert_eq!("aa:bb:cc:01:02:03".parse::<MacAddress>().unwrap(), expected);
        assert_eq!("AA-BB-CC-01-02-03".parse::<MacAddress>().unwrap(), expected);
        assert_eq!("aabbcc010203".parse::<MacAddress>().unwrap(), expected);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!("aa:bb:cc".parse::<MacAddress>().is_err());
        assert!("zz:bb:cc:01:02:03".parse::<MacAddress>().is_err());
        assert!("".parse::<MacAddress>().is_err());
    }

    #[test]
    fn test_magic_packet_layout() {
        let mac = MacAddress::new([1, 2, 3, 4, 5, 6]);
        let packet = mac.magic_packet();
        assert_eq!(packet.len(), 102);
        assert!(packet[..6].iter().all(|b| *b == 0xFF));
        assert_eq!(&packet[6..12], &[1, 2, 3, 4, 5, 6]);
        assert_eq!(&packet[96..102], &[1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_serde_string_form() {
        let mac: MacAddress = serde_json::from_str("\"00:11:22:33:44:55\"").unwrap();
        assert_eq!(serde_json::to_string(&mac).unwrap(), "\"00:11:22:33:44:55\"");
        assert!(serde_json::from_str::<MacAddress>("\"nope\"").is_err());
    }

    #[test]
    fn test_waker_sends_to_target() {
        let receiver = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        receiver
            .set_read_timeout(Some(std::time::Duration::from_secs(5)))
            .unwrap();
        let waker = MagicPacketWaker::with_target(receiver.local_addr().unwrap());
        let mac = MacAddress::new([9, 8, 7, 6, 5, 4]);

        waker.send_wake(&mac).unwrap();

        let mut buf = [0u8; 128];
        let (len, _) = receiver.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..len], mac.magic_packet().as_slice());
    }

    proptest! {
        #[test]
        fn prop_display_parses_back(bytes in any::<[u8; 6]>()) {
            let mac = MacAddress::new(bytes);
            prop_assert_eq!(mac.to_string().parse::<MacAddress>().unwrap(), mac);
        }
    }
}
