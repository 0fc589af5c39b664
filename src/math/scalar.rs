//! Signed 320-bit integer arithmetic
//!
//! Walk distances and collision candidates are 256-bit quantities that can
//! go negative during resolution, so they are carried as 5 little-endian
//! u64 limbs in two's complement. The extra limb absorbs sign extension of
//! the 22-byte wire distances without losing magnitude.

use std::cmp::Ordering;

use anyhow::{anyhow, Result};
use rand::Rng;

/// secp256k1 group order, little-endian limbs.
pub const ORDER: Scalar320 = Scalar320 {
    limbs: [
        0xBFD25E8CD0364141,
        0xBAAEDCE6AF48A03B,
        0xFFFFFFFFFFFFFFFE,
        0xFFFFFFFFFFFFFFFF,
        0,
    ],
};

/// 320-bit signed integer, two's complement, little-endian limbs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scalar320 {
    pub limbs: [u64; 5],
}

impl Scalar320 {
    pub const ZERO: Scalar320 = Scalar320 { limbs: [0; 5] };
    pub const ONE: Scalar320 = Scalar320 { limbs: [1, 0, 0, 0, 0] };

    pub fn from_u64(x: u64) -> Self {
        Scalar320 { limbs: [x, 0, 0, 0, 0] }
    }

    /// `2^e`; `e` must be below 320.
    pub fn from_pow2(e: u32) -> Self {
        let mut limbs = [0u64; 5];
        limbs[(e / 64) as usize] = 1u64 << (e % 64);
        Scalar320 { limbs }
    }

    /// Indexed 64-bit limb access, least significant first.
    pub fn limb(&self, i: usize) -> u64 {
        self.limbs[i]
    }

    pub fn is_zero(&self) -> bool {
        self.limbs == [0; 5]
    }

    /// Sign bit of the two's complement representation.
    pub fn is_negative(&self) -> bool {
        self.limbs[4] >> 63 == 1
    }

    pub fn add(&self, other: &Self) -> Self {
        let mut limbs = [0u64; 5];
        let mut carry = 0u128;
        for i in 0..5 {
            let sum = self.limbs[i] as u128 + other.limbs[i] as u128 + carry;
            limbs[i] = sum as u64;
            carry = sum >> 64;
        }
        Scalar320 { limbs }
    }

    pub fn sub(&self, other: &Self) -> Self {
        let mut limbs = [0u64; 5];
        let mut borrow = 0u64;
        for i in 0..5 {
            let (d, b1) = self.limbs[i].overflowing_sub(other.limbs[i]);
            let (d, b2) = d.overflowing_sub(borrow);
            limbs[i] = d;
            borrow = (b1 as u64) | (b2 as u64);
        }
        Scalar320 { limbs }
    }

    /// Two's complement negation.
    pub fn neg(&self) -> Self {
        let mut flipped = Scalar320 { limbs: [0; 5] };
        for i in 0..5 {
            flipped.limbs[i] = !self.limbs[i];
        }
        flipped.add(&Scalar320::ONE)
    }

    /// Absolute value as an unsigned quantity.
    pub fn abs(&self) -> Self {
        if self.is_negative() {
            self.neg()
        } else {
            *self
        }
    }

    /// Left shift by `bits` (zero fill); bits >= 320 yields zero.
    pub fn shl(&self, bits: u32) -> Self {
        if bits >= 320 {
            return Scalar320::ZERO;
        }
        let limb_shift = (bits / 64) as usize;
        let bit_shift = bits % 64;
        let mut limbs = [0u64; 5];
        for i in (limb_shift..5).rev() {
            let src = i - limb_shift;
            limbs[i] = self.limbs[src] << bit_shift;
            if bit_shift > 0 && src > 0 {
                limbs[i] |= self.limbs[src - 1] >> (64 - bit_shift);
            }
        }
        Scalar320 { limbs }
    }

    /// Logical right shift by one bit.
    pub fn shr1(&self) -> Self {
        let mut limbs = [0u64; 5];
        for i in 0..5 {
            limbs[i] = self.limbs[i] >> 1;
            if i + 1 < 5 {
                limbs[i] |= self.limbs[i + 1] << 63;
            }
        }
        Scalar320 { limbs }
    }

    /// Unsigned comparison of the raw limbs.
    pub fn cmp_unsigned(&self, other: &Self) -> Ordering {
        for i in (0..5).rev() {
            match self.limbs[i].cmp(&other.limbs[i]) {
                Ordering::Equal => continue,
                ord => return ord,
            }
        }
        Ordering::Equal
    }

    fn bit(&self, i: u32) -> bool {
        (self.limbs[(i / 64) as usize] >> (i % 64)) & 1 == 1
    }

    /// Bit length of the unsigned interpretation (0 for zero).
    pub fn bit_length(&self) -> u32 {
        for i in (0..5).rev() {
            if self.limbs[i] != 0 {
                return (i as u32) * 64 + 64 - self.limbs[i].leading_zeros();
            }
        }
        0
    }

    /// Uniform value in `[0, bound)` by rejection sampling. `bound` must be
    /// positive; draws are deterministic for a seeded RNG.
    pub fn random_below<R: Rng>(bound: &Self, rng: &mut R) -> Self {
        let bits = bound.bit_length().max(1);
        let top_limb = ((bits - 1) / 64) as usize;
        let top_mask = if bits % 64 == 0 {
            u64::MAX
        } else {
            (1u64 << (bits % 64)) - 1
        };
        loop {
            let mut limbs = [0u64; 5];
            for limb in limbs.iter_mut().take(top_limb + 1) {
                *limb = rng.gen();
            }
            limbs[top_limb] &= top_mask;
            let candidate = Scalar320 { limbs };
            if candidate.cmp_unsigned(bound) == Ordering::Less {
                return candidate;
            }
        }
    }

    /// Little-endian 40-byte export of the raw two's complement value.
    pub fn to_le_bytes(&self) -> [u8; 40] {
        let mut out = [0u8; 40];
        for i in 0..5 {
            out[i * 8..(i + 1) * 8].copy_from_slice(&self.limbs[i].to_le_bytes());
        }
        out
    }

    pub fn from_le_bytes(bytes: &[u8; 40]) -> Self {
        let mut limbs = [0u64; 5];
        for (i, limb) in limbs.iter_mut().enumerate() {
            let mut chunk = [0u8; 8];
            chunk.copy_from_slice(&bytes[i * 8..(i + 1) * 8]);
            *limb = u64::from_le_bytes(chunk);
        }
        Scalar320 { limbs }
    }

    /// Low 22 bytes of the two's complement value: the wire form of a walk
    /// distance. Lossless for values in `(-2^175, 2^175)` together with the
    /// sign-extension rule of the DP codec.
    pub fn to_le22(&self) -> [u8; 22] {
        let bytes = self.to_le_bytes();
        let mut out = [0u8; 22];
        out.copy_from_slice(&bytes[..22]);
        out
    }

    /// Parse a hex string (optionally `0x`-prefixed, up to 80 digits) as an
    /// unsigned value.
    pub fn from_hex(hex_str: &str) -> Result<Self> {
        let trimmed = hex_str.trim().trim_start_matches("0x").trim_start_matches("0X");
        if trimmed.is_empty() || trimmed.len() > 80 {
            return Err(anyhow!("invalid hex scalar: {:?}", hex_str));
        }
        let padded = if trimmed.len() % 2 == 1 {
            format!("0{}", trimmed)
        } else {
            trimmed.to_string()
        };
        let be = hex::decode(&padded)?;
        let mut le = [0u8; 40];
        for (i, b) in be.iter().rev().enumerate() {
            le[i] = *b;
        }
        Ok(Scalar320::from_le_bytes(&le))
    }

    /// Uppercase hex without leading zeros ("0" for zero). Meaningful for
    /// non-negative values.
    pub fn to_hex(&self) -> String {
        if self.is_zero() {
            return "0".to_string();
        }
        let le = self.to_le_bytes();
        let be: Vec<u8> = le.iter().rev().copied().collect();
        let full = hex::encode_upper(be);
        full.trim_start_matches('0').to_string()
    }

    /// Value mod the group order, as 32 big-endian bytes. Negative inputs
    /// map to `n - (|v| mod n)`.
    pub fn mod_order_bytes(&self) -> [u8; 32] {
        let negative = self.is_negative();
        let magnitude = self.abs();
        // shift-subtract; the remainder never reaches 2n so it fits easily
        let mut rem = Scalar320::ZERO;
        for i in (0..320).rev() {
            rem = rem.shl(1);
            if magnitude.bit(i) {
                rem.limbs[0] |= 1;
            }
            if rem.cmp_unsigned(&ORDER) != Ordering::Less {
                rem = rem.sub(&ORDER);
            }
        }
        if negative && !rem.is_zero() {
            rem = ORDER.sub(&rem);
        }
        let mut out = [0u8; 32];
        for i in 0..4 {
            out[i * 8..(i + 1) * 8].copy_from_slice(&rem.limbs[3 - i].to_be_bytes());
        }
        out
    }
}
