use sha2::{Digest, Sha256};

pub const SUM_LEN: usize = 32;
pub const TIME_LEN: usize = 8;
pub const HEADER_LEN: usize = SUM_LEN + TIME_LEN;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("packet shorter than the {HEADER_LEN}-byte envelope header")]
    ShortPacket,
}

/// A parsed, not-yet-verified envelope: three non-copying views into the
/// original datagram.
#[derive(Debug, PartialEq, Eq)]
pub struct Envelope<'a> {
    pub sum: &'a [u8],
    pub time_bytes: &'a [u8],
    pub payload: &'a [u8],
}

impl<'a> Envelope<'a> {
    /// Parses `data` into its three fields without allocating. Fails only on
    /// a too-short packet; the caller owns `data` for the envelope's lifetime.
    pub fn unpack(data: &'a [u8]) -> Result<Self, CodecError> {
        if data.len() < HEADER_LEN {
            return Err(CodecError::ShortPacket);
        }
        Ok(Self {
            sum: &data[0..SUM_LEN],
            time_bytes: &data[SUM_LEN..HEADER_LEN],
            payload: &data[HEADER_LEN..],
        })
    }

    /// Decodes the envelope's big-endian nanosecond timestamp.
    pub fn timestamp_nanos(&self) -> i64 {
        let mut buf = [0u8; TIME_LEN];
        buf.copy_from_slice(self.time_bytes);
        i64::from_be_bytes(buf)
    }

    /// Recomputes `SHA256(secret ‖ time_bytes ‖ payload)` and compares it
    /// against `self.sum` in constant time.
    pub fn verify(&self, secret: &[u8]) -> bool {
        let expected = compute_sum(secret, self.time_bytes, self.payload);
        constant_time_eq(&expected, self.sum)
    }
}

/// Computes `SHA256(secret ‖ time_bytes ‖ payload)`.
pub fn compute_sum(secret: &[u8], time_bytes: &[u8], payload: &[u8]) -> [u8; SUM_LEN] {
    let mut hasher = Sha256::new();
    hasher.update(secret);
    hasher.update(time_bytes);
    hasher.update(payload);
    hasher.finalize().into()
}

/// Packs `(secret, payload, t)` into `sum ‖ time_bytes ‖ payload`.
pub fn pack(secret: &[u8], payload: &[u8], t_nanos: i64) -> Vec<u8> {
    let time_bytes = t_nanos.to_be_bytes();
    let sum = compute_sum(secret, &time_bytes, payload);
    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    out.extend_from_slice(&sum);
    out.extend_from_slice(&time_bytes);
    out.extend_from_slice(payload);
    out
}

/// Bitwise constant-time comparison; avoids a short-circuiting `==` on
/// attacker-influenced data.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unpack_rejects_short_packets() {
        assert_eq!(Envelope::unpack(&[0u8; 39]), Err(CodecError::ShortPacket));
        assert!(Envelope::unpack(&[0u8; 40]).is_ok());
    }

    #[test]
    fn round_trip_verifies() {
        let secret = b"write-secret";
        let payload = b"hello world";
        let packed = pack(secret, payload, 123_456_789);
        let env = Envelope::unpack(&packed).unwrap();
        assert_eq!(env.payload, payload);
        assert_eq!(env.timestamp_nanos(), 123_456_789);
        assert!(env.verify(secret));
    }

    #[test]
    fn bit_flip_in_secret_fails_verification() {
        let packed = pack(b"secret-a", b"payload", 1);
        let env = Envelope::unpack(&packed).unwrap();
        assert!(!env.verify(b"secret-b"));
    }

    #[test]
    fn bit_flip_in_payload_fails_verification() {
        let secret = b"secret";
        let mut packed = pack(secret, b"payload", 1);
        let last = packed.len() - 1;
        packed[last] ^= 0x01;
        let env = Envelope::unpack(&packed).unwrap();
        assert!(!env.verify(secret));
    }

    #[test]
    fn bit_flip_in_time_bytes_fails_verification() {
        let secret = b"secret";
        let mut packed = pack(secret, b"payload", 1);
        packed[HEADER_LEN - 1] ^= 0x01;
        let env = Envelope::unpack(&packed).unwrap();
        assert!(!env.verify(secret));
    }
}
