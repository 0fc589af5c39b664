//! DP record wire codec
//!
//! A distinguished point travels as a 41-byte record, little-endian within
//! fields:
//!
//! ```text
//! bytes  0..12   low 12 bytes of x (identifying prefix)
//! bytes 12..16   reserved
//! bytes 16..38   signed walk distance, 22 bytes
//! bytes 38..40   reserved
//! byte  40       kangaroo type: 0=TAME, 1=WILD1, 2=WILD2
//! ```
//!
//! A distance whose byte 21 is 0xFF sign-extends to the full scalar width.

use anyhow::{anyhow, Result};

use crate::math::Scalar320;
use crate::types::KangType;

/// On-wire size of one DP record.
pub const DP_RECORD_SIZE: usize = 41;

/// One distinguished point: x-prefix, signed distance, walk type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DpRecord {
    pub x: [u8; 12],
    pub d: [u8; 22],
    pub kang: KangType,
}

impl DpRecord {
    pub fn new(x: [u8; 12], d: [u8; 22], kang: KangType) -> Self {
        DpRecord { x, d, kang }
    }

    /// Build a record from a scalar distance, truncating to 22 bytes.
    pub fn from_distance(x: [u8; 12], distance: &Scalar320, kang: KangType) -> Self {
        DpRecord { x, d: distance.to_le22(), kang }
    }

    /// The 12-byte collision key.
    pub fn key(&self) -> [u8; 12] {
        self.x
    }

    /// Materialise the 22-byte distance into a full signed scalar: byte 21
    /// equal to 0xFF marks a negative value and the upper bytes fill with
    /// 0xFF.
    pub fn distance(&self) -> Scalar320 {
        let mut bytes = [0u8; 40];
        bytes[..22].copy_from_slice(&self.d);
        if self.d[21] == 0xFF {
            for b in bytes[22..].iter_mut() {
                *b = 0xFF;
            }
        }
        Scalar320::from_le_bytes(&bytes)
    }

    /// Low 8 bytes of the raw distance, used by the self-collision filter.
    pub fn distance_low_u64(&self) -> u64 {
        let mut chunk = [0u8; 8];
        chunk.copy_from_slice(&self.d[..8]);
        u64::from_le_bytes(chunk)
    }

    pub fn encode(&self) -> [u8; DP_RECORD_SIZE] {
        let mut out = [0u8; DP_RECORD_SIZE];
        out[..12].copy_from_slice(&self.x);
        out[16..38].copy_from_slice(&self.d);
        out[40] = self.kang.tag();
        out
    }

    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() != DP_RECORD_SIZE {
            return Err(anyhow!(
                "DP record must be {} bytes, got {}",
                DP_RECORD_SIZE,
                buf.len()
            ));
        }
        let mut x = [0u8; 12];
        x.copy_from_slice(&buf[..12]);
        let mut d = [0u8; 22];
        d.copy_from_slice(&buf[16..38]);
        let kang = KangType::from_tag(buf[40])?;
        Ok(DpRecord { x, d, kang })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_round_trip() {
        let mut x = [0u8; 12];
        x.copy_from_slice(&[9u8; 12]);
        let mut d = [0u8; 22];
        d[0] = 0xAB;
        d[10] = 0x55;
        for kang in KangType::ALL {
            let rec = DpRecord::new(x, d, kang);
            let decoded = DpRecord::decode(&rec.encode()).unwrap();
            assert_eq!(decoded, rec);
        }
    }

    #[test]
    fn decode_rejects_bad_type_and_length() {
        let mut buf = [0u8; DP_RECORD_SIZE];
        buf[40] = 3;
        assert!(DpRecord::decode(&buf).is_err());
        assert!(DpRecord::decode(&buf[..40]).is_err());
    }

    #[test]
    fn negative_distance_sign_extends() {
        // bytes 0..12: 01 02 .. 0C, then a distance whose top byte is 0xFF
        let mut buf = [0u8; DP_RECORD_SIZE];
        for i in 0..12 {
            buf[i] = (i + 1) as u8;
        }
        for i in 16..38 {
            buf[i] = 0;
        }
        buf[16] = 0x00;
        buf[37] = 0xFF; // byte 21 of the distance
        buf[40] = 1;
        let rec = DpRecord::decode(&buf).unwrap();
        assert_eq!(rec.key(), [1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12]);
        assert_eq!(rec.kang, KangType::Wild1);
        assert!(rec.distance().is_negative());
    }

    #[test]
    fn positive_distance_does_not_extend() {
        let d = Scalar320::from_u64(0x1_0000_0000);
        let rec = DpRecord::from_distance([0u8; 12], &d, KangType::Tame);
        assert_eq!(rec.distance(), d);
        assert!(!rec.distance().is_negative());
    }

    #[test]
    fn distance_round_trips_through_truncation() {
        let values = [
            Scalar320::from_u64(1),
            Scalar320::from_pow2(170),
            Scalar320::from_u64(77).neg(),
            Scalar320::from_pow2(100).neg(),
        ];
        for v in values {
            let rec = DpRecord::from_distance([3u8; 12], &v, KangType::Wild2);
            assert_eq!(rec.distance(), v);
        }
    }

    #[test]
    fn reserved_bytes_are_zero() {
        let rec = DpRecord::new([0xAA; 12], [0xBB; 22], KangType::Tame);
        let buf = rec.encode();
        assert_eq!(&buf[12..16], &[0, 0, 0, 0]);
        assert_eq!(&buf[38..40], &[0, 0]);
    }
}
