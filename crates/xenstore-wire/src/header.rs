/// Size in bytes of an encoded [`Header`] (§6 "Frame format").
pub const HEADER_LEN: usize = 16;

/// The 16-byte frame header preceding every request and reply payload.
///
/// Encoded host-endian, matching the shared-memory ABI: both sides of a ring
/// run on the same physical host, so there is no cross-endian concern.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub msg_type: u32,
    pub req_id: u32,
    pub tx_id: u32,
    pub len: u32,
}

impl Header {
    #[must_use]
    pub fn encode(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[0..4].copy_from_slice(&self.msg_type.to_ne_bytes());
        out[4..8].copy_from_slice(&self.req_id.to_ne_bytes());
        out[8..12].copy_from_slice(&self.tx_id.to_ne_bytes());
        out[12..16].copy_from_slice(&self.len.to_ne_bytes());
        out
    }

    #[must_use]
    pub fn decode(bytes: &[u8; HEADER_LEN]) -> Self {
        Self {
            msg_type: u32::from_ne_bytes(bytes[0..4].try_into().unwrap()),
            req_id: u32::from_ne_bytes(bytes[4..8].try_into().unwrap()),
            tx_id: u32::from_ne_bytes(bytes[8..12].try_into().unwrap()),
            len: u32::from_ne_bytes(bytes[12..16].try_into().unwrap()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_round_trips_through_bytes() {
        let header = Header { msg_type: 11, req_id: 7, tx_id: 0, len: 42 };
        let bytes = header.encode();
        assert_eq!(bytes.len(), HEADER_LEN);
        assert_eq!(Header::decode(&bytes), header);
    }
}
