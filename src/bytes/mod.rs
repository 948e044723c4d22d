//! Byte, string, and numeric conversions shared by every protocol parser:
//! MAC/IPv4/IPv6 textual <-> network forms, hex-string decoding, and
//! content hashing. Every conversion that may fail reports the offending
//! input through [`ParseError`] rather than panicking.

use std::net::{Ipv4Addr, Ipv6Addr};

use mac_address::MacAddress;
use sha2::{Digest, Sha256};

use crate::errors::ParseError;

/// Parses a 6-byte buffer into a [`MacAddress`].
///
/// # Examples
/// ```
/// use smarthome_dpi_core::bytes::mac_from_bytes;
/// let mac = mac_from_bytes(&[0x78, 0x8b, 0x2a, 0xb2, 0x20, 0xea]).unwrap();
/// assert_eq!(mac.to_string(), "78:8B:2A:B2:20:EA");
/// ```
pub fn mac_from_bytes(raw: &[u8]) -> Result<MacAddress, ParseError> {
    let bytes: [u8; 6] = raw.try_into().map_err(|_| ParseError::Truncated {
        needed: 6,
        got: raw.len(),
    })?;
    Ok(MacAddress::new(bytes))
}

/// Renders a MAC address as the customary colon-separated 17-char form.
pub fn mac_to_string(mac: &MacAddress) -> String {
    mac.to_string()
}

/// Parses the customary colon-separated MAC textual form back into bytes.
pub fn mac_from_string(s: &str) -> Result<MacAddress, ParseError> {
    s.parse::<MacAddress>()
        .map_err(|e| ParseError::InvalidField(format!("bad MAC address {s:?}: {e}")))
}

/// Parses a 4-byte network-order buffer into an [`Ipv4Addr`].
pub fn ipv4_from_bytes(raw: &[u8]) -> Result<Ipv4Addr, ParseError> {
    let bytes: [u8; 4] = raw.try_into().map_err(|_| ParseError::Truncated {
        needed: 4,
        got: raw.len(),
    })?;
    Ok(Ipv4Addr::from(bytes))
}

/// Serializes an [`Ipv4Addr`] to its 4-byte network-order form.
pub fn ipv4_to_bytes(addr: Ipv4Addr) -> [u8; 4] {
    addr.octets()
}

/// Parses the dotted-quad textual form into an [`Ipv4Addr`].
pub fn ipv4_from_str(s: &str) -> Result<Ipv4Addr, ParseError> {
    s.parse().map_err(|_| ParseError::InvalidField(format!("bad IPv4 address {s:?}")))
}

/// Parses a 16-byte buffer into an [`Ipv6Addr`].
pub fn ipv6_from_bytes(raw: &[u8]) -> Result<Ipv6Addr, ParseError> {
    let bytes: [u8; 16] = raw.try_into().map_err(|_| ParseError::Truncated {
        needed: 16,
        got: raw.len(),
    })?;
    Ok(Ipv6Addr::from(bytes))
}

/// Serializes an [`Ipv6Addr`] to its 16-byte form.
pub fn ipv6_to_bytes(addr: Ipv6Addr) -> [u8; 16] {
    addr.octets()
}

/// Parses the canonical (possibly `::`-compressed) textual form into an
/// [`Ipv6Addr`].
pub fn ipv6_from_str(s: &str) -> Result<Ipv6Addr, ParseError> {
    s.parse().map_err(|_| ParseError::InvalidField(format!("bad IPv6 address {s:?}")))
}

/// Decodes a hex string (two digits per byte, no whitespace or separators)
/// into an owned byte buffer.
///
/// # Examples
/// ```
/// use smarthome_dpi_core::bytes::hex_to_bytes;
/// assert_eq!(hex_to_bytes("48656c6c6f").unwrap(), b"Hello");
/// ```
pub fn hex_to_bytes(s: &str) -> Result<Vec<u8>, ParseError> {
    hex::decode(s).map_err(|e| ParseError::InvalidField(format!("bad hex string: {e}")))
}

/// Encodes a byte buffer as a lowercase hex string.
pub fn bytes_to_hex(data: &[u8]) -> String {
    hex::encode(data)
}

/// Computes the SHA-256 digest of an arbitrary buffer.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mac_round_trip() {
        let raw = [0x78u8, 0x8b, 0x2a, 0xb2, 0x20, 0xea];
        let mac = mac_from_bytes(&raw).unwrap();
        let s = mac_to_string(&mac);
        let back = mac_from_string(&s).unwrap();
        assert_eq!(back.bytes(), raw);
    }

    #[test]
    fn ipv4_round_trip_from_text() {
        let text = "20.47.97.231";
        let addr = ipv4_from_str(text).unwrap();
        assert_eq!(addr.to_string(), text);
        let bytes = ipv4_to_bytes(addr);
        assert_eq!(ipv4_from_bytes(&bytes).unwrap(), addr);
    }

    #[test]
    fn ipv4_round_trip_from_bytes() {
        let raw = [192u8, 168, 1, 1];
        let addr = ipv4_from_bytes(&raw).unwrap();
        assert_eq!(ipv4_to_bytes(addr), raw);
    }

    #[test]
    fn ipv6_round_trip_compressed() {
        let text = "fe80::1";
        let addr = ipv6_from_str(text).unwrap();
        assert_eq!(addr.to_string(), text);
        let bytes = ipv6_to_bytes(addr);
        assert_eq!(ipv6_from_bytes(&bytes).unwrap(), addr);
    }

    #[test]
    fn hex_round_trip() {
        let s = "deadbeef";
        let bytes = hex_to_bytes(s).unwrap();
        assert_eq!(bytes.len(), s.len() / 2);
        assert_eq!(bytes_to_hex(&bytes), s);
    }

    #[test]
    fn hex_rejects_odd_length() {
        assert!(hex_to_bytes("abc").is_err());
    }

    #[test]
    fn sha256_known_vector() {
        let digest = sha256(b"abc");
        assert_eq!(
            bytes_to_hex(&digest),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
