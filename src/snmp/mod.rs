//! SNMP message synthesis.
//!
//! One message is assembled per (version, request kind) pair, encoded to
//! canonical bytes by the [`ber`] codec, and optionally corrupted when the
//! caller asked for an unrecognized version. The synthesizer never talks to
//! the network; it only produces bytes for a pacing loop to send.

pub mod ber;

use crate::errors::Error;

use rand_core::RngCore;
use std::net::Ipv4Addr;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

const SYS_DESCR_OID: &str = ".1.3.6.1.2.1.1.1.0";
const SYS_CONTACT_OID: &str = ".1.3.6.1.2.1.1.4.0";
const SYS_UPTIME_OID: &str = ".1.3.6.1.2.1.1.3.0";
const SNMP_TRAP_OID: &str = ".1.3.6.1.6.3.1.1.4.1.0";
const ENTERPRISE_OID: &str = ".1.3.6.1.4.1.8072.2.3";
const TRAP_NOTIFICATION_OID: &str = ".1.3.6.1.4.1.8072.2.3.0.1";

/// Uptime value carried by notification-shaped PDUs.
const NOTIFICATION_UPTIME: u32 = 12345;

const REQUEST_ID: i32 = 1;
const GETBULK_NON_REPEATERS: i32 = 0;
const GETBULK_MAX_REPETITIONS: i32 = 10;

/// Reportable bit of the v3 msgFlags byte.
const FLAG_REPORTABLE: u8 = 0x04;

/// Raw synthesis inputs, straight from the CLI.
#[derive(Debug, Clone)]
pub struct SnmpParams {
    pub version: String,
    pub community: String,
    pub v3_user: String,
    pub v3_sec_level: String,
    pub v3_auth_proto: String,
    pub v3_auth_pass: String,
    pub v3_priv_proto: String,
    pub v3_priv_pass: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionTag {
    V1,
    V2c,
    V3,
    /// Unrecognized version strings deliberately fall back to a V2c encoding
    /// marked for later corruption; this is a negative-testing feature.
    Unknown,
}

impl VersionTag {
    pub fn from_flag(s: &str) -> VersionTag {
        match s {
            "v1" => VersionTag::V1,
            "v2" | "v2c" | "2c" => VersionTag::V2c,
            "v3" => VersionTag::V3,
            _ => VersionTag::Unknown,
        }
    }

    pub fn wire_code(self) -> i32 {
        match self {
            VersionTag::V1 => 0,
            VersionTag::V2c | VersionTag::Unknown => 1,
            VersionTag::V3 => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthProtocol {
    NoAuth,
    Md5,
    Sha,
}

impl AuthProtocol {
    fn from_flag(s: &str) -> AuthProtocol {
        match s {
            "MD5" => AuthProtocol::Md5,
            "SHA" => AuthProtocol::Sha,
            _ => AuthProtocol::NoAuth,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrivProtocol {
    NoPriv,
    Des,
    Aes,
}

impl PrivProtocol {
    fn from_flag(s: &str) -> PrivProtocol {
        match s {
            "DES" => PrivProtocol::Des,
            "AES" => PrivProtocol::Aes,
            _ => PrivProtocol::NoPriv,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityLevel {
    NoAuthNoPriv,
    AuthNoPriv,
    AuthPriv,
}

impl SecurityLevel {
    /// Unlike the auth/priv protocols, an unrecognized security level is a
    /// hard failure: there is no sensible message to build for it.
    fn from_flag(s: &str) -> Result<SecurityLevel, Error> {
        match s {
            "noAuthNoPriv" => Ok(SecurityLevel::NoAuthNoPriv),
            "authNoPriv" => Ok(SecurityLevel::AuthNoPriv),
            "authPriv" => Ok(SecurityLevel::AuthPriv),
            _ => Err(Error::UnsupportedSecurityLevel(s.to_string())),
        }
    }

    fn flags(self) -> u8 {
        match self {
            SecurityLevel::NoAuthNoPriv => 0x0,
            SecurityLevel::AuthNoPriv => 0x1,
            SecurityLevel::AuthPriv => 0x3,
        }
    }
}

/// Resolved SNMPv3 user-security-model block. The passphrases are carried
/// along but the wire-level auth/priv parameters stay empty: actual USM
/// crypto is out of scope for a traffic generator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct V3Security {
    pub username: String,
    pub sec_level: SecurityLevel,
    pub auth_proto: AuthProtocol,
    pub auth_pass: String,
    pub priv_proto: PrivProtocol,
    pub priv_pass: String,
    pub context_engine_id: String,
    pub context_name: String,
}

impl V3Security {
    fn resolve(params: &SnmpParams) -> Result<V3Security, Error> {
        Ok(V3Security {
            username: params.v3_user.clone(),
            sec_level: SecurityLevel::from_flag(&params.v3_sec_level)?,
            auth_proto: AuthProtocol::from_flag(&params.v3_auth_proto),
            auth_pass: params.v3_auth_pass.clone(),
            priv_proto: PrivProtocol::from_flag(&params.v3_priv_proto),
            priv_pass: params.v3_priv_pass.clone(),
            context_engine_id: String::new(),
            context_name: String::new(),
        })
    }

    pub fn flags_byte(&self) -> u8 {
        self.sec_level.flags() | FLAG_REPORTABLE
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Get,
    GetNext,
    Set,
    Trap,
    GetBulk,
    Inform,
    Report,
}

impl RequestKind {
    pub fn name(self) -> &'static str {
        match self {
            RequestKind::Get => "get",
            RequestKind::GetNext => "getnext",
            RequestKind::Set => "set",
            RequestKind::Trap => "trap",
            RequestKind::GetBulk => "getbulk",
            RequestKind::Inform => "inform",
            RequestKind::Report => "report",
        }
    }
}

impl std::fmt::Display for RequestKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RequestKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<RequestKind, Error> {
        match s {
            "get" => Ok(RequestKind::Get),
            "getnext" => Ok(RequestKind::GetNext),
            "set" => Ok(RequestKind::Set),
            "trap" => Ok(RequestKind::Trap),
            "getbulk" => Ok(RequestKind::GetBulk),
            "inform" => Ok(RequestKind::Inform),
            "report" => Ok(RequestKind::Report),
            _ => Err(Error::UnsupportedRequestType(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PduType {
    GetRequest,
    GetNextRequest,
    SetRequest,
    Trap,
    GetBulkRequest,
    InformRequest,
    SnmpV2Trap,
    Report,
}

impl PduType {
    /// Context-class constructed BER tag.
    pub fn tag(self) -> u8 {
        match self {
            PduType::GetRequest => 0xA0,
            PduType::GetNextRequest => 0xA1,
            PduType::SetRequest => 0xA3,
            PduType::Trap => 0xA4,
            PduType::GetBulkRequest => 0xA5,
            PduType::InformRequest => 0xA6,
            PduType::SnmpV2Trap => 0xA7,
            PduType::Report => 0xA8,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Null,
    OctetString(String),
    TimeTicks(u32),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarBind {
    pub oid: String,
    pub value: Value,
}

impl VarBind {
    fn null(oid: &str) -> VarBind {
        VarBind {
            oid: oid.to_string(),
            value: Value::Null,
        }
    }

    fn string(oid: &str, s: &str) -> VarBind {
        VarBind {
            oid: oid.to_string(),
            value: Value::OctetString(s.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pdu {
    /// The request-id / error-status / error-index body shared by every
    /// v2-style PDU. GetBulk reuses the two error fields for non-repeaters
    /// and max-repetitions.
    Standard {
        pdu_type: PduType,
        request_id: i32,
        error_status: i32,
        error_index: i32,
    },
    /// Legacy SNMPv1 trap body.
    V1Trap {
        enterprise: String,
        agent_addr: Ipv4Addr,
        generic_trap: i32,
        specific_trap: i32,
        timestamp: u32,
    },
}

/// A fully assembled SNMP message, immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnmpMessage {
    pub version: VersionTag,
    pub community: String,
    pub security: Option<V3Security>,
    pub pdu: Pdu,
    pub variables: Vec<VarBind>,
}

impl SnmpMessage {
    pub fn pdu_type(&self) -> PduType {
        match &self.pdu {
            Pdu::Standard { pdu_type, .. } => *pdu_type,
            Pdu::V1Trap { .. } => PduType::Trap,
        }
    }
}

fn standard(pdu_type: PduType) -> Pdu {
    Pdu::Standard {
        pdu_type,
        request_id: REQUEST_ID,
        error_status: 0,
        error_index: 0,
    }
}

fn notification_bindings(description: &str) -> Vec<VarBind> {
    vec![
        VarBind {
            oid: SYS_UPTIME_OID.to_string(),
            value: Value::TimeTicks(NOTIFICATION_UPTIME),
        },
        VarBind::string(SNMP_TRAP_OID, TRAP_NOTIFICATION_OID),
        VarBind::string(SYS_DESCR_OID, description),
    ]
}

/// Assembles the message for one request kind. The RNG only feeds the v1
/// specific-trap code.
pub fn build_message(
    kind: RequestKind,
    params: &SnmpParams,
    rng: &mut impl RngCore,
) -> Result<SnmpMessage, Error> {
    let version = VersionTag::from_flag(&params.version);
    let security = if version == VersionTag::V3 {
        Some(V3Security::resolve(params)?)
    } else {
        None
    };
    let (pdu, variables) = match kind {
        RequestKind::Get => (
            standard(PduType::GetRequest),
            vec![VarBind::null(SYS_DESCR_OID)],
        ),
        RequestKind::GetNext => (
            standard(PduType::GetNextRequest),
            vec![VarBind::null(SYS_DESCR_OID)],
        ),
        RequestKind::Set => (
            standard(PduType::SetRequest),
            vec![VarBind::string(SYS_CONTACT_OID, "test")],
        ),
        RequestKind::Trap if version == VersionTag::V1 => (
            Pdu::V1Trap {
                enterprise: ENTERPRISE_OID.to_string(),
                agent_addr: Ipv4Addr::UNSPECIFIED,
                generic_trap: 6,
                specific_trap: (rng.next_u32() >> 1) as i32,
                timestamp: unix_now(),
            },
            vec![VarBind::string(SYS_DESCR_OID, "SNMPv1 Trap")],
        ),
        RequestKind::Trap => (
            standard(PduType::SnmpV2Trap),
            notification_bindings("SNMP Trap"),
        ),
        RequestKind::GetBulk => (
            Pdu::Standard {
                pdu_type: PduType::GetBulkRequest,
                request_id: REQUEST_ID,
                error_status: GETBULK_NON_REPEATERS,
                error_index: GETBULK_MAX_REPETITIONS,
            },
            vec![VarBind::null(SYS_DESCR_OID)],
        ),
        RequestKind::Inform => (
            standard(PduType::InformRequest),
            notification_bindings("SNMP Inform"),
        ),
        RequestKind::Report => (
            standard(PduType::Report),
            vec![VarBind::string(SYS_DESCR_OID, "SNMP Report")],
        ),
    };
    Ok(SnmpMessage {
        version,
        community: params.community.clone(),
        security,
        pdu,
        variables,
    })
}

/// Builds and encodes the packet bytes for one request kind.
///
/// Messages tagged [`VersionTag::Unknown`] get the byte at offset 4 of the
/// encoded output (the BER version value) overwritten with a pseudo-random
/// value in [4, 101]: a malformed-but-plausible packet for negative testing.
/// Bytes before offset 4 stay deterministic for identical inputs.
pub fn synthesize(
    kind: RequestKind,
    params: &SnmpParams,
    rng: &mut impl RngCore,
) -> Result<Vec<u8>, Error> {
    let message = build_message(kind, params, rng)?;
    let mut data = ber::encode(&message).map_err(|e| Error::Encoding(e.to_string()))?;
    if message.version == VersionTag::Unknown && data.len() >= 5 {
        data[4] = (rng.next_u32() % 98) as u8 + 4;
    }
    Ok(data)
}

fn unix_now() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs() as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_core::SeedableRng;
    use rand_pcg::Pcg32;

    fn params(version: &str) -> SnmpParams {
        SnmpParams {
            version: version.to_string(),
            community: "public".to_string(),
            v3_user: "snmpuser".to_string(),
            v3_sec_level: "noAuthNoPriv".to_string(),
            v3_auth_proto: String::new(),
            v3_auth_pass: String::new(),
            v3_priv_proto: String::new(),
            v3_priv_pass: String::new(),
        }
    }

    #[test]
    fn get_request_shape() {
        let mut rng = Pcg32::seed_from_u64(0);
        let msg = build_message(RequestKind::Get, &params("2c"), &mut rng).unwrap();
        assert_eq!(msg.version, VersionTag::V2c);
        assert_eq!(msg.pdu_type(), PduType::GetRequest);
        assert!(matches!(msg.pdu, Pdu::Standard { request_id: 1, .. }));
        assert_eq!(msg.variables, vec![VarBind::null(SYS_DESCR_OID)]);
    }

    #[test]
    fn get_request_golden_bytes() {
        let mut rng = Pcg32::seed_from_u64(0);
        let data = synthesize(RequestKind::Get, &params("2c"), &mut rng).unwrap();
        let expected: &[u8] = &[
            0x30, 0x26, // message sequence
            0x02, 0x01, 0x01, // version 1 (v2c)
            0x04, 0x06, b'p', b'u', b'b', b'l', b'i', b'c', // community
            0xA0, 0x19, // GetRequest PDU
            0x02, 0x01, 0x01, // request id 1
            0x02, 0x01, 0x00, // error status
            0x02, 0x01, 0x00, // error index
            0x30, 0x0E, 0x30, 0x0C, // varbind list, one varbind
            0x06, 0x08, 0x2B, 0x06, 0x01, 0x02, 0x01, 0x01, 0x01, 0x00, // sysDescr.0
            0x05, 0x00, // null
        ];
        assert_eq!(&data[..], expected);
    }

    #[test]
    fn trap_shape_depends_on_version() {
        let mut rng = Pcg32::seed_from_u64(1);
        let v1 = build_message(RequestKind::Trap, &params("v1"), &mut rng).unwrap();
        let v2 = build_message(RequestKind::Trap, &params("2c"), &mut rng).unwrap();
        assert_eq!(v1.pdu_type(), PduType::Trap);
        assert_eq!(v2.pdu_type(), PduType::SnmpV2Trap);
        assert_eq!(v1.variables.len(), 1);
        assert_eq!(v2.variables.len(), 3);
        match &v1.pdu {
            Pdu::V1Trap {
                enterprise,
                agent_addr,
                generic_trap,
                specific_trap,
                ..
            } => {
                assert_eq!(enterprise, ENTERPRISE_OID);
                assert_eq!(*agent_addr, Ipv4Addr::UNSPECIFIED);
                assert_eq!(*generic_trap, 6);
                assert!(*specific_trap >= 0);
            }
            other => panic!("expected a v1 trap body, got {other:?}"),
        }
        assert_eq!(v2.variables[0].value, Value::TimeTicks(NOTIFICATION_UPTIME));
        assert_eq!(v2.variables[1].oid, SNMP_TRAP_OID);
    }

    #[test]
    fn inform_uses_the_notification_shape() {
        let mut rng = Pcg32::seed_from_u64(0);
        let msg = build_message(RequestKind::Inform, &params("2c"), &mut rng).unwrap();
        assert_eq!(msg.pdu_type(), PduType::InformRequest);
        assert_eq!(msg.variables.len(), 3);
    }

    #[test]
    fn getbulk_fixes_the_repetition_fields() {
        let mut rng = Pcg32::seed_from_u64(0);
        let msg = build_message(RequestKind::GetBulk, &params("2c"), &mut rng).unwrap();
        match msg.pdu {
            Pdu::Standard {
                pdu_type: PduType::GetBulkRequest,
                error_status,
                error_index,
                ..
            } => {
                assert_eq!(error_status, 0);
                assert_eq!(error_index, 10);
            }
            other => panic!("expected a getbulk body, got {other:?}"),
        }
    }

    #[test]
    fn unknown_version_corrupts_only_the_version_byte() {
        let corrupted =
            synthesize(RequestKind::Get, &params("bogus"), &mut Pcg32::seed_from_u64(7)).unwrap();
        let clean =
            synthesize(RequestKind::Get, &params("2c"), &mut Pcg32::seed_from_u64(7)).unwrap();
        assert_eq!(corrupted.len(), clean.len());
        assert_eq!(corrupted[..4], clean[..4]);
        assert_eq!(corrupted[5..], clean[5..]);
        assert_ne!(corrupted[4], clean[4]);
        assert!((4..=101).contains(&corrupted[4]));
        // identical inputs and seed give identical bytes
        let again =
            synthesize(RequestKind::Get, &params("bogus"), &mut Pcg32::seed_from_u64(7)).unwrap();
        assert_eq!(corrupted, again);
    }

    #[test]
    fn bogus_security_level_is_rejected() {
        let mut p = params("v3");
        p.v3_sec_level = "bogus".to_string();
        let err = synthesize(RequestKind::Get, &p, &mut Pcg32::seed_from_u64(0)).unwrap_err();
        assert!(matches!(err, Error::UnsupportedSecurityLevel(_)));
    }

    #[test]
    fn v3_message_carries_the_usm_block() {
        let mut rng = Pcg32::seed_from_u64(0);
        let msg = build_message(RequestKind::Get, &params("v3"), &mut rng).unwrap();
        let usm = msg.security.as_ref().unwrap();
        assert_eq!(usm.username, "snmpuser");
        assert_eq!(usm.flags_byte(), FLAG_REPORTABLE);
        let data = ber::encode(&msg).unwrap();
        assert_eq!(data[4], 3); // version byte
        assert!(data.windows(8).any(|w| w == b"snmpuser"));
    }

    #[test]
    fn auth_and_priv_protocols_default_leniently() {
        let mut p = params("v3");
        p.v3_auth_proto = "whatever".to_string();
        p.v3_priv_proto = "bogus".to_string();
        let mut rng = Pcg32::seed_from_u64(0);
        let msg = build_message(RequestKind::Get, &p, &mut rng).unwrap();
        let usm = msg.security.unwrap();
        assert_eq!(usm.auth_proto, AuthProtocol::NoAuth);
        assert_eq!(usm.priv_proto, PrivProtocol::NoPriv);

        p.v3_auth_proto = "SHA".to_string();
        p.v3_priv_proto = "AES".to_string();
        let msg = build_message(RequestKind::Get, &p, &mut rng).unwrap();
        let usm = msg.security.unwrap();
        assert_eq!(usm.auth_proto, AuthProtocol::Sha);
        assert_eq!(usm.priv_proto, PrivProtocol::Aes);
    }

    #[test]
    fn request_kind_strings() {
        assert_eq!("getbulk".parse::<RequestKind>().unwrap(), RequestKind::GetBulk);
        let err = "bogus".parse::<RequestKind>().unwrap_err();
        assert!(matches!(err, Error::UnsupportedRequestType(_)));
    }
}
