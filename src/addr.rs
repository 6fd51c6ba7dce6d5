//! Canonical IP address representation shared by the parser, flow tracker,
//! and classifier.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

/// An immutable IPv4 or IPv6 address, serialized as its canonical dotted or
/// colon string form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IpAddress {
    V4([u8; 4]),
    V6([u8; 16]),
}

impl IpAddress {
    pub fn v4(octets: [u8; 4]) -> Self {
        IpAddress::V4(octets)
    }

    pub fn v6(octets: [u8; 16]) -> Self {
        IpAddress::V6(octets)
    }

    pub fn is_v4(&self) -> bool {
        matches!(self, IpAddress::V4(_))
    }

    pub fn is_v6(&self) -> bool {
        matches!(self, IpAddress::V6(_))
    }

    /// Canonical string form, e.g. `"10.0.0.1"` or `"2001:db8::1"`.
    pub fn canonical(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for IpAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IpAddress::V4(octets) => write!(f, "{}", Ipv4Addr::from(*octets)),
            IpAddress::V6(octets) => write!(f, "{}", Ipv6Addr::from(*octets)),
        }
    }
}

impl From<Ipv4Addr> for IpAddress {
    fn from(addr: Ipv4Addr) -> Self {
        IpAddress::V4(addr.octets())
    }
}

impl From<Ipv6Addr> for IpAddress {
    fn from(addr: Ipv6Addr) -> Self {
        IpAddress::V6(addr.octets())
    }
}

impl Serialize for IpAddress {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.canonical())
    }
}

impl<'de> Deserialize<'de> for IpAddress {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        if let Ok(v4) = s.parse::<Ipv4Addr>() {
            return Ok(IpAddress::from(v4));
        }
        if let Ok(v6) = s.parse::<Ipv6Addr>() {
            return Ok(IpAddress::from(v6));
        }
        Err(serde::de::Error::custom(format!(
            "'{s}' is not a valid IPv4 or IPv6 address"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_form_v4() {
        let addr = IpAddress::v4([10, 0, 0, 2]);
        assert_eq!(addr.canonical(), "10.0.0.2");
    }

    #[test]
    fn canonical_form_v6() {
        let addr = IpAddress::v6([0x20, 0x01, 0x0d, 0xb8, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1]);
        assert_eq!(addr.canonical(), "2001:db8::1");
    }

    #[test]
    fn json_round_trip() {
        let addr = IpAddress::v4([1, 1, 1, 1]);
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, "\"1.1.1.1\"");
        let back: IpAddress = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);
    }
}
