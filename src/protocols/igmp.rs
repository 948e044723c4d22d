//! IGMPv2 (RFC 2236) and IGMPv3 membership-report (RFC 3376) parsing.
//! IGMPv3 membership *queries* are out of scope (spec Non-goals /
//! Open Questions — the correct semantics were never specified upstream).

use std::net::Ipv4Addr;

use crate::bytes::ipv4_from_bytes;
use crate::errors::ParseError;

const TYPE_MEMBERSHIP_QUERY: u8 = 0x11;
const TYPE_V1_REPORT: u8 = 0x12;
const TYPE_V2_REPORT: u8 = 0x16;
const TYPE_LEAVE_GROUP: u8 = 0x17;
const TYPE_V3_REPORT: u8 = 0x22;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct V2Body {
    pub max_resp_time: u8,
    pub checksum: u16,
    pub group_address: Ipv4Addr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupRecord {
    pub record_type: u8,
    pub aux_data_len: u8,
    pub num_sources: u16,
    pub group_address: Ipv4Addr,
    pub source_list: Vec<Ipv4Addr>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct V3Report {
    pub checksum: u16,
    pub num_groups: u16,
    pub group_records: Vec<GroupRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IgmpBody {
    V2(V2Body),
    V3(V3Report),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IgmpMessage {
    pub version: u8,
    pub igmp_type: u8,
    pub body: IgmpBody,
}

fn parse_v2(data: &[u8]) -> Result<V2Body, ParseError> {
    if data.len() < 8 {
        return Err(ParseError::Truncated { needed: 8, got: data.len() });
    }
    Ok(V2Body {
        max_resp_time: data[1],
        checksum: u16::from_be_bytes([data[2], data[3]]),
        group_address: ipv4_from_bytes(&data[4..8])?,
    })
}

fn parse_group_record(data: &[u8], pos: usize) -> Result<(GroupRecord, usize), ParseError> {
    let header = data.get(pos..pos + 8).ok_or(ParseError::Truncated { needed: pos + 8, got: data.len() })?;
    let record_type = header[0];
    let aux_data_len = header[1];
    let num_sources = u16::from_be_bytes([header[2], header[3]]);
    let group_address = ipv4_from_bytes(&header[4..8])?;

    let sources_start = pos + 8;
    let sources_end = sources_start + 4 * num_sources as usize;
    let sources_bytes = data.get(sources_start..sources_end).ok_or(ParseError::Truncated {
        needed: sources_end,
        got: data.len(),
    })?;
    let source_list = sources_bytes.chunks_exact(4).map(|c| ipv4_from_bytes(c).unwrap()).collect();

    Ok((
        GroupRecord { record_type, aux_data_len, num_sources, group_address, source_list },
        sources_end,
    ))
}

fn parse_v3_report(data: &[u8]) -> Result<V3Report, ParseError> {
    if data.len() < 8 {
        return Err(ParseError::Truncated { needed: 8, got: data.len() });
    }
    let checksum = u16::from_be_bytes([data[2], data[3]]);
    let num_groups = u16::from_be_bytes([data[6], data[7]]);

    let mut pos = 8;
    let mut group_records = Vec::with_capacity(num_groups as usize);
    for _ in 0..num_groups {
        let (record, next) = parse_group_record(data, pos)?;
        group_records.push(record);
        pos = next;
    }

    Ok(V3Report { checksum, num_groups, group_records })
}

/// Dispatches on the IGMP type byte. Returns
/// [`ParseError::Unsupported`] for IGMPv3 membership queries, which are
/// explicitly out of scope.
pub fn parse(data: &[u8]) -> Result<IgmpMessage, ParseError> {
    let igmp_type = *data.first().ok_or(ParseError::Truncated { needed: 1, got: 0 })?;
    match igmp_type {
        TYPE_MEMBERSHIP_QUERY | TYPE_V1_REPORT | TYPE_V2_REPORT | TYPE_LEAVE_GROUP => {
            Ok(IgmpMessage { version: 2, igmp_type, body: IgmpBody::V2(parse_v2(data)?) })
        }
        TYPE_V3_REPORT => Ok(IgmpMessage { version: 3, igmp_type, body: IgmpBody::V3(parse_v3_report(data)?) }),
        other => Err(ParseError::Unsupported(format!("IGMP type {other:#04x}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn v2_report_parses() {
        let mut data = vec![TYPE_V2_REPORT, 0, 0, 0];
        data.extend_from_slice(&[224, 0, 0, 1]);
        let msg = parse(&data).unwrap();
        assert_eq!(msg.version, 2);
        match msg.body {
            IgmpBody::V2(body) => assert_eq!(body.group_address, Ipv4Addr::new(224, 0, 0, 1)),
            _ => panic!("expected v2 body"),
        }
    }

    #[test]
    fn v3_membership_report_single_group() {
        let mut data = vec![TYPE_V3_REPORT, 0, 0, 0, 0, 0, 0, 1]; // num_groups=1
        data.push(4); // record type
        data.push(0); // aux_data_len
        data.extend_from_slice(&0u16.to_be_bytes()); // num_sources
        data.extend_from_slice(&[224, 0, 0, 251]); // group_address

        let msg = parse(&data).unwrap();
        assert_eq!(msg.version, 3);
        match msg.body {
            IgmpBody::V3(report) => {
                assert_eq!(report.group_records.len(), 1);
                assert_eq!(report.group_records[0].record_type, 4);
                assert_eq!(report.group_records[0].group_address, Ipv4Addr::new(224, 0, 0, 251));
            }
            _ => panic!("expected v3 report"),
        }
    }

    #[test]
    fn unsupported_type_is_an_error() {
        assert!(parse(&[0x00, 0, 0, 0]).is_err());
    }

    #[test]
    fn truncated_v2_is_an_error() {
        assert!(parse(&[TYPE_V2_REPORT, 0, 0]).is_err());
    }
}
