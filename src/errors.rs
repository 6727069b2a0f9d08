use thiserror::Error;

/// Failures that abort a single traffic loop before its first packet.
/// Per-packet write failures are not part of this taxonomy: they are logged
/// and counted by the send loop but never abort it.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid rate: {0}")]
    InvalidRate(String),

    #[error("unsupported request type: {0}")]
    UnsupportedRequestType(String),

    #[error("unknown SNMPv3 security level: {0}")]
    UnsupportedSecurityLevel(String),

    #[error("encoding failed: {0}")]
    Encoding(String),

    #[error("cannot open transport: {0}")]
    TransportOpen(String),
}
