//! DNS (RFC 1035) wire-format parser: header, questions, and answers.
//! The authority and additional sections are explicitly skipped for
//! efficiency (a core scope cut, per spec).
//!
//! Malformed input is never fatal: [`parse`] returns the best-effort
//! partial message it could decode and logs the reason it stopped.

use std::net::IpAddr;

use log::debug;

use crate::bytes::{ipv4_from_bytes, ipv6_from_bytes};
use crate::errors::ParseError;

pub const TYPE_A: u16 = 1;
pub const TYPE_NS: u16 = 2;
pub const TYPE_CNAME: u16 = 5;
pub const TYPE_PTR: u16 = 12;
pub const TYPE_AAAA: u16 = 28;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DnsHeader {
    pub id: u16,
    pub flags: u16,
    pub qdcount: u16,
    pub ancount: u16,
    pub nscount: u16,
    pub arcount: u16,
}

impl DnsHeader {
    /// The QR bit: 0 for query, 1 for response.
    pub fn is_response(&self) -> bool {
        (self.flags >> 15) & 1 == 1
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    pub name: String,
    pub qtype: u16,
    pub qclass: u16,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RData {
    Ip(IpAddr),
    Name(String),
    Opaque(Vec<u8>),
    Null,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResourceRecord {
    pub name: String,
    pub rtype: u16,
    pub rclass: u16,
    pub ttl: u32,
    pub rdlength: u16,
    pub rdata: RData,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DnsMessage {
    pub header: Option<DnsHeader>,
    pub questions: Vec<Question>,
    pub answers: Vec<ResourceRecord>,
}

/// Decodes a domain name starting at `start`, following compression
/// pointers. Returns the name and the cursor position to resume reading
/// the *original* stream at: once a pointer is taken, that cursor freezes
/// at the position immediately after the two pointer bytes, regardless of
/// how many further pointers are chased to resolve the name.
fn decode_name(data: &[u8], start: usize) -> Result<(String, usize), ParseError> {
    let mut pos = start;
    let mut resume_at: Option<usize> = None;
    let mut labels: Vec<String> = Vec::new();
    let mut jumps = 0usize;
    let max_jumps = data.len().max(1);

    loop {
        let len_byte = *data.get(pos).ok_or(ParseError::Truncated {
            needed: pos + 1,
            got: data.len(),
        })?;

        if len_byte == 0 {
            pos += 1;
            resume_at.get_or_insert(pos);
            break;
        }

        if len_byte & 0xC0 == 0xC0 {
            let lo = *data.get(pos + 1).ok_or(ParseError::Truncated {
                needed: pos + 2,
                got: data.len(),
            })?;
            let offset = (((len_byte & 0x3f) as usize) << 8) | lo as usize;
            resume_at.get_or_insert(pos + 2);

            jumps += 1;
            if jumps > max_jumps || offset >= data.len() {
                return Err(ParseError::CompressionCycle);
            }
            pos = offset;
            continue;
        }

        if len_byte & 0xC0 != 0 {
            return Err(ParseError::InvalidField(format!(
                "reserved label length bits at offset {pos}"
            )));
        }

        let len = len_byte as usize;
        let label_start = pos + 1;
        let label_end = label_start + len;
        let label = data.get(label_start..label_end).ok_or(ParseError::Truncated {
            needed: label_end,
            got: data.len(),
        })?;
        labels.push(String::from_utf8_lossy(label).into_owned());
        pos = label_end;

        if labels.iter().map(|l| l.len() + 1).sum::<usize>() > data.len().max(256) {
            return Err(ParseError::NameTooLong);
        }
    }

    Ok((labels.join("."), resume_at.unwrap_or(pos)))
}

fn parse_header(data: &[u8]) -> Result<DnsHeader, ParseError> {
    if data.len() < 12 {
        return Err(ParseError::Truncated { needed: 12, got: data.len() });
    }
    let u16_at = |off: usize| u16::from_be_bytes([data[off], data[off + 1]]);
    Ok(DnsHeader {
        id: u16_at(0),
        flags: u16_at(2),
        qdcount: u16_at(4),
        ancount: u16_at(6),
        nscount: u16_at(8),
        arcount: u16_at(10),
    })
}

fn parse_question(data: &[u8], pos: usize) -> Result<(Question, usize), ParseError> {
    let (name, after_name) = decode_name(data, pos)?;
    let qtype_qclass = data.get(after_name..after_name + 4).ok_or(ParseError::Truncated {
        needed: after_name + 4,
        got: data.len(),
    })?;
    let qtype = u16::from_be_bytes([qtype_qclass[0], qtype_qclass[1]]);
    let qclass = u16::from_be_bytes([qtype_qclass[2], qtype_qclass[3]]);
    Ok((Question { name, qtype, qclass }, after_name + 4))
}

fn parse_rdata(data: &[u8], rtype: u16, rdata_start: usize, rdlength: u16) -> RData {
    if rdlength == 0 {
        return RData::Null;
    }
    let end = rdata_start + rdlength as usize;
    let Some(slice) = data.get(rdata_start..end) else {
        return RData::Null;
    };
    match rtype {
        TYPE_A => ipv4_from_bytes(slice).map(|a| RData::Ip(IpAddr::V4(a))).unwrap_or(RData::Null),
        TYPE_AAAA => ipv6_from_bytes(slice).map(|a| RData::Ip(IpAddr::V6(a))).unwrap_or(RData::Null),
        TYPE_NS | TYPE_CNAME | TYPE_PTR => {
            decode_name(data, rdata_start).map(|(n, _)| RData::Name(n)).unwrap_or(RData::Null)
        }
        _ => RData::Opaque(slice.to_vec()),
    }
}

fn parse_resource_record(data: &[u8], pos: usize) -> Result<(ResourceRecord, usize), ParseError> {
    let (name, after_name) = decode_name(data, pos)?;
    let fixed = data.get(after_name..after_name + 10).ok_or(ParseError::Truncated {
        needed: after_name + 10,
        got: data.len(),
    })?;
    let rtype = u16::from_be_bytes([fixed[0], fixed[1]]);
    let rclass = u16::from_be_bytes([fixed[2], fixed[3]]);
    let ttl = u32::from_be_bytes([fixed[4], fixed[5], fixed[6], fixed[7]]);
    let rdlength = u16::from_be_bytes([fixed[8], fixed[9]]);
    let rdata_start = after_name + 10;
    let rdata = parse_rdata(data, rtype, rdata_start, rdlength);
    let next = rdata_start + rdlength as usize;
    Ok((ResourceRecord { name, rtype, rclass, ttl, rdlength, rdata }, next))
}

/// Parses a DNS message from `data`. Never panics; on malformed input it
/// returns whatever prefix (header / questions / answers) was already
/// successfully decoded.
pub fn parse(data: &[u8]) -> DnsMessage {
    let mut message = DnsMessage::default();

    let header = match parse_header(data) {
        Ok(h) => h,
        Err(e) => {
            debug!("dns: failed to parse header: {e}");
            return message;
        }
    };
    message.header = Some(header);

    let mut pos = 12usize;
    for _ in 0..header.qdcount {
        match parse_question(data, pos) {
            Ok((q, next)) => {
                message.questions.push(q);
                pos = next;
            }
            Err(e) => {
                debug!("dns: stopped parsing questions: {e}");
                return message;
            }
        }
    }

    for _ in 0..header.ancount {
        match parse_resource_record(data, pos) {
            Ok((rr, next)) => {
                message.answers.push(rr);
                pos = next;
            }
            Err(e) => {
                debug!("dns: stopped parsing answers: {e}");
                return message;
            }
        }
    }

    message
}

/// True iff any question's name ends with `suffix` (byte-wise).
pub fn contains_suffix(questions: &[Question], suffix: &str) -> bool {
    questions.iter().any(|q| q.name.as_bytes().ends_with(suffix.as_bytes()))
}

/// True iff any question's name exactly equals `name`.
pub fn contains_full(questions: &[Question], name: &str) -> bool {
    get_question(questions, name).is_some()
}

/// Returns the first question whose name exactly equals `name`.
pub fn get_question<'a>(questions: &'a [Question], name: &str) -> Option<&'a Question> {
    questions.iter().find(|q| q.name == name)
}

/// Follows CNAME chains within `answers`, starting from `name`, and
/// collects every A/AAAA address reached along the way, preserving
/// answer-list order. Chain following only considers records present in
/// the same answer list; returns empty if `name` has no matching record.
pub fn addresses_for_name(answers: &[ResourceRecord], name: &str) -> Vec<IpAddr> {
    let mut addresses = Vec::new();
    let mut current = name.to_string();
    let mut visited = std::collections::HashSet::new();

    loop {
        if !visited.insert(current.clone()) {
            break; // cycle guard
        }
        let mut followed_cname = false;
        for rr in answers {
            if rr.name != current {
                continue;
            }
            match &rr.rdata {
                RData::Ip(ip) => addresses.push(*ip),
                RData::Name(next) if rr.rtype == TYPE_CNAME => {
                    current = next.clone();
                    followed_cname = true;
                }
                _ => {}
            }
        }
        if !followed_cname {
            break;
        }
    }

    addresses
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push_name(buf: &mut Vec<u8>, name: &str) {
        for label in name.split('.').filter(|s| !s.is_empty()) {
            buf.push(label.len() as u8);
            buf.extend_from_slice(label.as_bytes());
        }
        buf.push(0);
    }

    fn build_response(qname: &str, cname_target: &str, ip: [u8; 4]) -> Vec<u8> {
        let mut buf = vec![0u8; 12];
        buf[0..2].copy_from_slice(&0x1234u16.to_be_bytes());
        buf[2..4].copy_from_slice(&0x8180u16.to_be_bytes()); // qr=1
        buf[4..6].copy_from_slice(&1u16.to_be_bytes()); // qdcount
        buf[6..8].copy_from_slice(&2u16.to_be_bytes()); // ancount

        push_name(&mut buf, qname);
        buf.extend_from_slice(&TYPE_A.to_be_bytes());
        buf.extend_from_slice(&1u16.to_be_bytes()); // IN

        // Answer 1: CNAME qname -> cname_target
        push_name(&mut buf, qname);
        buf.extend_from_slice(&TYPE_CNAME.to_be_bytes());
        buf.extend_from_slice(&1u16.to_be_bytes());
        buf.extend_from_slice(&60u32.to_be_bytes());
        let rdata_pos = buf.len() + 2;
        let mut rdata = Vec::new();
        push_name(&mut rdata, cname_target);
        buf.extend_from_slice(&(rdata.len() as u16).to_be_bytes());
        buf.extend_from_slice(&rdata);
        let _ = rdata_pos;

        // Answer 2: A cname_target -> ip
        push_name(&mut buf, cname_target);
        buf.extend_from_slice(&TYPE_A.to_be_bytes());
        buf.extend_from_slice(&1u16.to_be_bytes());
        buf.extend_from_slice(&60u32.to_be_bytes());
        buf.extend_from_slice(&4u16.to_be_bytes());
        buf.extend_from_slice(&ip);

        buf
    }

    #[test]
    fn parses_header_questions_and_answers() {
        let data = build_response("business.smartcamera.api.io.mi.com", "cname-app-com-amsproxy.w.mi-dun.com", [20, 47, 97, 231]);
        let msg = parse(&data);
        let header = msg.header.unwrap();
        assert_eq!(header.qdcount, 1);
        assert_eq!(header.ancount, 2);
        assert!(header.is_response());
        assert_eq!(msg.questions[0].name, "business.smartcamera.api.io.mi.com");
        assert_eq!(msg.questions[0].qtype, TYPE_A);
        assert!(matches!(&msg.answers[0].rdata, RData::Name(n) if n == "cname-app-com-amsproxy.w.mi-dun.com"));
    }

    #[test]
    fn addresses_for_name_follows_cname_chain() {
        let data = build_response("business.smartcamera.api.io.mi.com", "cname-app-com-amsproxy.w.mi-dun.com", [20, 47, 97, 231]);
        let msg = parse(&data);
        let addrs = addresses_for_name(&msg.answers, "business.smartcamera.api.io.mi.com");
        assert_eq!(addrs, vec![IpAddr::V4([20, 47, 97, 231].into())]);
    }

    #[test]
    fn addresses_for_name_empty_when_absent() {
        let data = build_response("a.com", "b.com", [1, 2, 3, 4]);
        let msg = parse(&data);
        assert!(addresses_for_name(&msg.answers, "nope.example").is_empty());
    }

    #[test]
    fn lookup_consistency() {
        let data = build_response("a.example", "b.example", [1, 2, 3, 4]);
        let msg = parse(&data);
        assert!(contains_full(&msg.questions, "a.example"));
        assert!(get_question(&msg.questions, "a.example").is_some());
        assert!(contains_suffix(&msg.questions, "example"));
        assert!(!contains_full(&msg.questions, "nope"));
    }

    #[test]
    fn compression_pointer_is_followed() {
        // Build: question "a.example", then an answer whose name is a
        // pointer back to the question's name.
        let mut buf = vec![0u8; 12];
        buf[4..6].copy_from_slice(&1u16.to_be_bytes());
        buf[6..8].copy_from_slice(&1u16.to_be_bytes());
        let qname_offset = buf.len() as u16;
        push_name(&mut buf, "a.example");
        buf.extend_from_slice(&TYPE_A.to_be_bytes());
        buf.extend_from_slice(&1u16.to_be_bytes());

        // Answer: pointer to qname_offset, type A, ttl, rdlength=4, ip
        let pointer = 0xC000u16 | qname_offset;
        buf.extend_from_slice(&pointer.to_be_bytes());
        buf.extend_from_slice(&TYPE_A.to_be_bytes());
        buf.extend_from_slice(&1u16.to_be_bytes());
        buf.extend_from_slice(&30u32.to_be_bytes());
        buf.extend_from_slice(&4u16.to_be_bytes());
        buf.extend_from_slice(&[9, 9, 9, 9]);

        let msg = parse(&buf);
        assert_eq!(msg.answers[0].name, "a.example");
        assert!(matches!(msg.answers[0].rdata, RData::Ip(IpAddr::V4(_))));
    }

    #[test]
    fn compression_cycle_terminates() {
        // Pointer that points to itself must not infinite-loop.
        let mut buf = vec![0u8; 12];
        buf[4..6].copy_from_slice(&1u16.to_be_bytes());
        let pointer_pos = buf.len();
        let pointer = 0xC000u16 | pointer_pos as u16;
        buf.extend_from_slice(&pointer.to_be_bytes());
        buf.extend_from_slice(&TYPE_A.to_be_bytes());
        buf.extend_from_slice(&1u16.to_be_bytes());

        let msg = parse(&buf); // must return, not hang
        assert!(msg.questions.is_empty());
    }

    #[test]
    fn truncated_message_yields_partial_result() {
        let mut buf = vec![0u8; 12];
        buf[4..6].copy_from_slice(&5u16.to_be_bytes()); // claims 5 questions, has 0
        let msg = parse(&buf);
        assert!(msg.header.is_some());
        assert!(msg.questions.is_empty());
    }
}
