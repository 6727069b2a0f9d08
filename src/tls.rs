//! TLS record-layer frame synthesis.
//!
//! A record is a 5-byte header (content type, 16-bit protocol version,
//! 16-bit payload length, both big-endian) followed by an opaque payload.
//! Payloads are fixed literals standing in for real handshake or application
//! data; the point is a structurally valid record, not a TLS session.

/// TLS 1.2 record version, emitted in every header.
const RECORD_VERSION: u16 = 0x0303;

const HEADER_LEN: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TlsRecord {
    pub content_type: u8,
    pub version: u16,
    payload: Vec<u8>,
}

impl TlsRecord {
    /// 22 (handshake) gets a dummy ClientHello, 23 (application data) gets a
    /// placeholder message, every other content type an empty payload.
    pub fn build(content_type: u8) -> TlsRecord {
        let payload = match content_type {
            22 => b"ClientHello".to_vec(),
            23 => b"TLSMSG".to_vec(),
            _ => Vec::new(),
        };
        TlsRecord {
            content_type,
            version: RECORD_VERSION,
            payload,
        }
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    fn header(&self) -> [u8; HEADER_LEN] {
        let len = self.payload.len() as u16;
        [
            self.content_type,
            (self.version >> 8) as u8,
            self.version as u8,
            (len >> 8) as u8,
            len as u8,
        ]
    }

    /// Header followed by the payload, as a standalone record.
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + self.payload.len());
        out.extend_from_slice(&self.header());
        out.extend_from_slice(&self.payload);
        out
    }

    /// Inserts the record ahead of whatever is already staged in `buf`, so
    /// it can sit under link/network/transport framing built around it.
    pub fn prepend_to(&self, buf: &mut Vec<u8>) {
        let mut staged = Vec::with_capacity(HEADER_LEN + self.payload.len() + buf.len());
        staged.extend_from_slice(&self.header());
        staged.extend_from_slice(&self.payload);
        staged.append(buf);
        *buf = staged;
    }
}
