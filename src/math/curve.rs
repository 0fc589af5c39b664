//! secp256k1 curve capability
//!
//! Thin wrappers over `k256` for the handful of curve operations the
//! solver needs: multiplication by the generator, point negation and
//! equality, SEC1 hex codec, and x-coordinate views for the DP pipeline.

use anyhow::{anyhow, Result};
use k256::elliptic_curve::ops::MulByGenerator;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use k256::elliptic_curve::PrimeField;
use k256::{FieldBytes, ProjectivePoint, PublicKey, Scalar};
use rand::Rng;

use crate::math::scalar::{Scalar320, ORDER};

/// Curve point used throughout the solver.
pub type CurvePoint = ProjectivePoint;

/// Parse a SEC1 public key (compressed or uncompressed hex).
pub fn parse_point(hex_str: &str) -> Result<CurvePoint> {
    let bytes = hex::decode(hex_str.trim())?;
    let key = PublicKey::from_sec1_bytes(&bytes)
        .map_err(|e| anyhow!("invalid public key {:?}: {}", hex_str, e))?;
    Ok(ProjectivePoint::from(*key.as_affine()))
}

/// Compressed SEC1 hex of a point, uppercase.
pub fn point_to_hex(point: &CurvePoint) -> String {
    let encoded = point.to_affine().to_encoded_point(true);
    hex::encode_upper(encoded.as_bytes())
}

/// `k * G` with the signed scalar reduced mod the group order.
pub fn mul_g(k: &Scalar320) -> CurvePoint {
    let repr = FieldBytes::from(k.mod_order_bytes());
    // reduction guarantees a canonical representation below the order
    let scalar = Option::<Scalar>::from(Scalar::from_repr(repr)).unwrap_or_default();
    ProjectivePoint::mul_by_generator(&scalar)
}

/// `y := -y mod p`.
pub fn negate(point: &CurvePoint) -> CurvePoint {
    -*point
}

/// Affine x-coordinate, 32 big-endian bytes (zero for the identity).
pub fn x_bytes_be(point: &CurvePoint) -> [u8; 32] {
    let encoded = point.to_affine().to_encoded_point(false);
    let mut out = [0u8; 32];
    if let Some(x) = encoded.x() {
        out.copy_from_slice(x);
    }
    out
}

/// Low 12 bytes of x, little-endian: the DP identifying prefix.
pub fn x_prefix_le12(x_be: &[u8; 32]) -> [u8; 12] {
    let mut out = [0u8; 12];
    for (i, b) in out.iter_mut().enumerate() {
        *b = x_be[31 - i];
    }
    out
}

/// True when the x-coordinate has `dp_bits` trailing zero bits.
pub fn is_distinguished(x_be: &[u8; 32], dp_bits: u32) -> bool {
    let full_bytes = (dp_bits / 8) as usize;
    let rem_bits = dp_bits % 8;
    for i in 0..full_bytes {
        if x_be[31 - i] != 0 {
            return false;
        }
    }
    if rem_bits > 0 {
        let mask = (1u8 << rem_bits) - 1;
        if x_be[31 - full_bytes] & mask != 0 {
            return false;
        }
    }
    true
}

/// Low 64 bits of x as an integer, for jump selection.
pub fn x_low_u64(x_be: &[u8; 32]) -> u64 {
    let mut chunk = [0u8; 8];
    chunk.copy_from_slice(&x_be[24..32]);
    u64::from_be_bytes(chunk)
}

/// Random curve point with an unknown discrete log position, for benchmark
/// targets.
pub fn random_point<R: Rng>(rng: &mut R) -> CurvePoint {
    let k = Scalar320::random_below(&ORDER, rng);
    mul_g(&k)
}
