//! BER writer for the wire subset SNMP needs: definite-length TLVs,
//! two's-complement integers, octet strings, object identifiers, the
//! application-class typed values, and the SNMPv3 global-data/USM/scoped-PDU
//! envelope. Encoding only; this tool never parses responses.

use super::{Pdu, PduType, SnmpMessage, Value};

use std::fmt;

const TAG_INTEGER: u8 = 0x02;
const TAG_OCTET_STRING: u8 = 0x04;
const TAG_NULL: u8 = 0x05;
const TAG_OID: u8 = 0x06;
const TAG_SEQUENCE: u8 = 0x30;
const TAG_IP_ADDRESS: u8 = 0x40;
const TAG_TIME_TICKS: u8 = 0x43;

const MSG_ID: i64 = 1;
const MAX_MESSAGE_SIZE: i64 = 65507;
const USM_SECURITY_MODEL: i64 = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BerError {
    /// OID did not parse as dotted numeric arcs.
    BadOid(String),
}

impl fmt::Display for BerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BerError::BadOid(oid) => write!(f, "malformed OID: {oid}"),
        }
    }
}

impl std::error::Error for BerError {}

fn push_length(out: &mut Vec<u8>, len: usize) {
    if len < 0x80 {
        out.push(len as u8);
    } else {
        let bytes = len.to_be_bytes();
        let skip = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len() - 1);
        let significant = &bytes[skip..];
        out.push(0x80 | significant.len() as u8);
        out.extend_from_slice(significant);
    }
}

fn push_tlv(out: &mut Vec<u8>, tag: u8, content: &[u8]) {
    out.push(tag);
    push_length(out, content.len());
    out.extend_from_slice(content);
}

/// Minimal two's-complement encoding.
fn int_bytes(v: i64) -> Vec<u8> {
    let mut bytes = v.to_be_bytes().to_vec();
    while bytes.len() > 1
        && ((bytes[0] == 0x00 && bytes[1] & 0x80 == 0)
            || (bytes[0] == 0xFF && bytes[1] & 0x80 != 0))
    {
        bytes.remove(0);
    }
    bytes
}

/// Minimal unsigned encoding, zero-padded when the high bit would flip the
/// sign (TimeTicks and friends are unsigned application types).
fn uint_bytes(v: u32) -> Vec<u8> {
    let mut bytes = v.to_be_bytes().to_vec();
    while bytes.len() > 1 && bytes[0] == 0 && bytes[1] & 0x80 == 0 {
        bytes.remove(0);
    }
    if bytes[0] & 0x80 != 0 {
        bytes.insert(0, 0);
    }
    bytes
}

fn base128(v: u64) -> Vec<u8> {
    let mut rev = vec![(v & 0x7F) as u8];
    let mut v = v >> 7;
    while v > 0 {
        rev.push((v & 0x7F) as u8 | 0x80);
        v >>= 7;
    }
    rev.reverse();
    rev
}

fn oid_bytes(oid: &str) -> Result<Vec<u8>, BerError> {
    let arcs: Vec<u64> = oid
        .trim_start_matches('.')
        .split('.')
        .map(str::parse)
        .collect::<Result<_, _>>()
        .map_err(|_| BerError::BadOid(oid.to_string()))?;
    if arcs.len() < 2 || arcs[0] > 2 || arcs[1] > 39 {
        return Err(BerError::BadOid(oid.to_string()));
    }
    let mut out = vec![(arcs[0] * 40 + arcs[1]) as u8];
    for &arc in &arcs[2..] {
        out.extend_from_slice(&base128(arc));
    }
    Ok(out)
}

fn push_value(out: &mut Vec<u8>, value: &Value) {
    match value {
        Value::Null => push_tlv(out, TAG_NULL, &[]),
        Value::OctetString(s) => push_tlv(out, TAG_OCTET_STRING, s.as_bytes()),
        Value::TimeTicks(v) => push_tlv(out, TAG_TIME_TICKS, &uint_bytes(*v)),
    }
}

fn varbind_list(msg: &SnmpMessage) -> Result<Vec<u8>, BerError> {
    let mut list = Vec::new();
    for vb in &msg.variables {
        let mut content = Vec::new();
        let oid = oid_bytes(&vb.oid)?;
        push_tlv(&mut content, TAG_OID, &oid);
        push_value(&mut content, &vb.value);
        push_tlv(&mut list, TAG_SEQUENCE, &content);
    }
    let mut out = Vec::new();
    push_tlv(&mut out, TAG_SEQUENCE, &list);
    Ok(out)
}

fn pdu_bytes(msg: &SnmpMessage) -> Result<Vec<u8>, BerError> {
    let mut content = Vec::new();
    let tag = match &msg.pdu {
        Pdu::Standard {
            pdu_type,
            request_id,
            error_status,
            error_index,
        } => {
            push_tlv(&mut content, TAG_INTEGER, &int_bytes(*request_id as i64));
            push_tlv(&mut content, TAG_INTEGER, &int_bytes(*error_status as i64));
            push_tlv(&mut content, TAG_INTEGER, &int_bytes(*error_index as i64));
            pdu_type.tag()
        }
        Pdu::V1Trap {
            enterprise,
            agent_addr,
            generic_trap,
            specific_trap,
            timestamp,
        } => {
            let enterprise = oid_bytes(enterprise)?;
            push_tlv(&mut content, TAG_OID, &enterprise);
            push_tlv(&mut content, TAG_IP_ADDRESS, &agent_addr.octets());
            push_tlv(&mut content, TAG_INTEGER, &int_bytes(*generic_trap as i64));
            push_tlv(&mut content, TAG_INTEGER, &int_bytes(*specific_trap as i64));
            push_tlv(&mut content, TAG_TIME_TICKS, &uint_bytes(*timestamp));
            PduType::Trap.tag()
        }
    };
    content.extend_from_slice(&varbind_list(msg)?);
    let mut out = Vec::new();
    push_tlv(&mut out, tag, &content);
    Ok(out)
}

/// Encodes an assembled message to canonical bytes.
pub fn encode(msg: &SnmpMessage) -> Result<Vec<u8>, BerError> {
    let pdu = pdu_bytes(msg)?;

    let mut body = Vec::new();
    push_tlv(
        &mut body,
        TAG_INTEGER,
        &int_bytes(msg.version.wire_code() as i64),
    );
    match &msg.security {
        None => {
            push_tlv(&mut body, TAG_OCTET_STRING, msg.community.as_bytes());
            body.extend_from_slice(&pdu);
        }
        Some(usm) => {
            let mut global = Vec::new();
            push_tlv(&mut global, TAG_INTEGER, &int_bytes(MSG_ID));
            push_tlv(&mut global, TAG_INTEGER, &int_bytes(MAX_MESSAGE_SIZE));
            push_tlv(&mut global, TAG_OCTET_STRING, &[usm.flags_byte()]);
            push_tlv(&mut global, TAG_INTEGER, &int_bytes(USM_SECURITY_MODEL));
            push_tlv(&mut body, TAG_SEQUENCE, &global);

            // msgSecurityParameters: an octet string wrapping the USM sequence.
            // Auth and priv parameters stay empty, see V3Security.
            let mut usm_seq = Vec::new();
            push_tlv(&mut usm_seq, TAG_OCTET_STRING, &[]); // engine id
            push_tlv(&mut usm_seq, TAG_INTEGER, &int_bytes(0)); // engine boots
            push_tlv(&mut usm_seq, TAG_INTEGER, &int_bytes(0)); // engine time
            push_tlv(&mut usm_seq, TAG_OCTET_STRING, usm.username.as_bytes());
            push_tlv(&mut usm_seq, TAG_OCTET_STRING, &[]); // auth parameters
            push_tlv(&mut usm_seq, TAG_OCTET_STRING, &[]); // priv parameters
            let mut usm_wrapped = Vec::new();
            push_tlv(&mut usm_wrapped, TAG_SEQUENCE, &usm_seq);
            push_tlv(&mut body, TAG_OCTET_STRING, &usm_wrapped);

            // plaintext scoped PDU
            let mut scoped = Vec::new();
            push_tlv(
                &mut scoped,
                TAG_OCTET_STRING,
                usm.context_engine_id.as_bytes(),
            );
            push_tlv(&mut scoped, TAG_OCTET_STRING, usm.context_name.as_bytes());
            scoped.extend_from_slice(&pdu);
            push_tlv(&mut body, TAG_SEQUENCE, &scoped);
        }
    }

    let mut out = Vec::new();
    push_tlv(&mut out, TAG_SEQUENCE, &body);
    Ok(out)
}
