//! DHCP (RFC 2131/2132) BOOTP-compatible header and options parser.
//!
//! The fixed 236-byte header is trusted length (delivered whole by the
//! UDP/IP layer below); the options area is untrusted and parsed with
//! bounds checks throughout, unlike a fixed-length struct `memcpy`.

use std::net::Ipv4Addr;

use log::debug;
use mac_address::MacAddress;

use crate::bytes::{ipv4_from_bytes, mac_from_bytes};
use crate::errors::ParseError;

pub const MAGIC_COOKIE: u32 = 0x6382_5363;
pub const FIXED_HEADER_LEN: usize = 236;
const OPTION_INITIAL_CAPACITY: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Discover,
    Offer,
    Request,
    Decline,
    Ack,
    Nak,
    Release,
    Inform,
}

impl MessageType {
    fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(Self::Discover),
            2 => Some(Self::Offer),
            3 => Some(Self::Request),
            4 => Some(Self::Decline),
            5 => Some(Self::Ack),
            6 => Some(Self::Nak),
            7 => Some(Self::Release),
            8 => Some(Self::Inform),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DhcpOption {
    pub code: u8,
    pub value: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct DhcpMessage {
    pub op: u8,
    pub htype: u8,
    pub hlen: u8,
    pub hops: u8,
    pub xid: u32,
    pub secs: u16,
    pub flags: u16,
    pub ciaddr: Ipv4Addr,
    pub yiaddr: Ipv4Addr,
    pub siaddr: Ipv4Addr,
    pub giaddr: Ipv4Addr,
    pub chaddr: [u8; 16],
    pub sname: String,
    pub file: String,
    pub options: Vec<DhcpOption>,
    pub message_type: Option<MessageType>,
}

impl DhcpMessage {
    /// The client hardware address, when `htype`/`hlen` indicate Ethernet
    /// (the common case).
    pub fn chaddr_mac(&self) -> Option<MacAddress> {
        mac_from_bytes(&self.chaddr[..6]).ok()
    }

    pub fn option(&self, code: u8) -> Option<&DhcpOption> {
        self.options.iter().find(|o| o.code == code)
    }
}

fn require(data: &[u8], range: std::ops::Range<usize>) -> Result<&[u8], ParseError> {
    data.get(range.clone()).ok_or(ParseError::Truncated { needed: range.end, got: data.len() })
}

fn parse_options(data: &[u8]) -> Vec<DhcpOption> {
    let mut options = Vec::with_capacity(OPTION_INITIAL_CAPACITY);
    let mut pos = 0usize;

    while pos < data.len() {
        let code = data[pos];
        if code == 0 {
            pos += 1; // Pad
            continue;
        }
        if code == 255 {
            break; // End
        }
        let Some(&len) = data.get(pos + 1) else {
            debug!("dhcp: truncated option length at offset {pos}");
            break;
        };
        let len = len as usize;
        let value_start = pos + 2;
        let value_end = value_start + len;
        let Some(value) = data.get(value_start..value_end) else {
            debug!("dhcp: option {code} claims {len} bytes past end of buffer");
            break;
        };
        options.push(DhcpOption { code, value: value.to_vec() });
        pos = value_end;
    }

    options
}

/// Parses a DHCP message from `raw`, which must contain at least the fixed
/// 236-byte BOOTP header. If the magic cookie at offset 236 does not match
/// [`MAGIC_COOKIE`], the options list is left empty and `message_type`
/// stays `None` (the mismatch is logged, not fatal).
pub fn parse(raw: &[u8]) -> Result<DhcpMessage, ParseError> {
    if raw.len() < FIXED_HEADER_LEN {
        return Err(ParseError::Truncated { needed: FIXED_HEADER_LEN, got: raw.len() });
    }

    let op = raw[0];
    let htype = raw[1];
    let hlen = raw[2];
    let hops = raw[3];
    let xid = u32::from_be_bytes(require(raw, 4..8)?.try_into().unwrap());
    let secs = u16::from_be_bytes(require(raw, 8..10)?.try_into().unwrap());
    let flags = u16::from_be_bytes(require(raw, 10..12)?.try_into().unwrap());
    let ciaddr = ipv4_from_bytes(require(raw, 12..16)?)?;
    let yiaddr = ipv4_from_bytes(require(raw, 16..20)?)?;
    let siaddr = ipv4_from_bytes(require(raw, 20..24)?)?;
    let giaddr = ipv4_from_bytes(require(raw, 24..28)?)?;
    let chaddr: [u8; 16] = require(raw, 28..44)?.try_into().unwrap();
    let sname = String::from_utf8_lossy(require(raw, 44..108)?)
        .trim_end_matches('\0')
        .to_string();
    let file = String::from_utf8_lossy(require(raw, 108..236)?)
        .trim_end_matches('\0')
        .to_string();

    let (options, message_type) = match raw.get(236..240) {
        Some(cookie) if u32::from_be_bytes(cookie.try_into().unwrap()) == MAGIC_COOKIE => {
            let options = parse_options(&raw[240..]);
            let mtype = options
                .iter()
                .find(|o| o.code == 53)
                .and_then(|o| o.value.first())
                .and_then(|b| MessageType::from_byte(*b));
            (options, mtype)
        }
        Some(_) => {
            debug!("dhcp: magic cookie mismatch, ignoring options");
            (Vec::new(), None)
        }
        None => {
            debug!("dhcp: message has no options area");
            (Vec::new(), None)
        }
    };

    Ok(DhcpMessage {
        op,
        htype,
        hlen,
        hops,
        xid,
        secs,
        flags,
        ciaddr,
        yiaddr,
        siaddr,
        giaddr,
        chaddr,
        sname,
        file,
        options,
        message_type,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Builds a BOOTREQUEST/Discover packet with the fields named in the
    /// DHCP Discover end-to-end scenario: xid 0x6617ca54, chaddr prefix
    /// 78:8b:2a:b2:20:ea, message-type option 53 = Discover, and a 12-byte
    /// vendor class identifier "udhcp 1.28.1".
    fn discover_packet() -> Vec<u8> {
        let mut raw = vec![0u8; FIXED_HEADER_LEN];
        raw[0] = 1; // BOOTREQUEST
        raw[1] = 1; // htype: Ethernet
        raw[2] = 6; // hlen
        raw[4..8].copy_from_slice(&0x6617ca54u32.to_be_bytes());
        raw[28..34].copy_from_slice(&[0x78, 0x8b, 0x2a, 0xb2, 0x20, 0xea]);

        raw.extend_from_slice(&MAGIC_COOKIE.to_be_bytes());
        raw.extend_from_slice(&[53, 1, 1]); // message-type = Discover
        let vendor_class = b"udhcp 1.28.1";
        raw.push(60);
        raw.push(vendor_class.len() as u8);
        raw.extend_from_slice(vendor_class);
        raw.push(255); // End

        raw
    }

    #[test]
    fn discover_header_and_message_type() {
        let msg = parse(&discover_packet()).unwrap();
        assert_eq!(msg.op, 1);
        assert_eq!(msg.xid, 0x6617ca54);
        assert_eq!(msg.chaddr[..6], [0x78, 0x8b, 0x2a, 0xb2, 0x20, 0xea]);
        assert_eq!(msg.message_type, Some(MessageType::Discover));
        let vendor_class = msg.option(60).unwrap();
        assert_eq!(vendor_class.value.len(), 12);
        assert_eq!(vendor_class.value, b"udhcp 1.28.1");
    }

    #[test]
    fn magic_cookie_mismatch_clears_options() {
        let mut data = discover_packet();
        // Corrupt the magic cookie.
        data[236] = 0x00;
        let msg = parse(&data).unwrap();
        assert!(msg.options.is_empty());
        assert!(msg.message_type.is_none());
    }

    #[test]
    fn too_short_buffer_is_rejected() {
        let data = vec![0u8; 100];
        assert!(parse(&data).is_err());
    }

    #[test]
    fn option_scan_skips_padding_and_stops_at_end() {
        let mut raw = vec![0u8; FIXED_HEADER_LEN];
        raw.extend_from_slice(&MAGIC_COOKIE.to_be_bytes());
        raw.extend_from_slice(&[0, 0, 0, 53, 1, 1, 255, 9, 9]);
        let msg = parse(&raw).unwrap();
        assert_eq!(msg.options.len(), 1);
        assert_eq!(msg.options[0].code, 53);
        assert_eq!(msg.message_type, Some(MessageType::Discover));
    }
}
