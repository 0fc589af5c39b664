//! Math layer: signed 320-bit scalars and secp256k1 curve operations.

pub mod curve;
pub mod scalar;

pub use curve::CurvePoint;
pub use scalar::Scalar320;
