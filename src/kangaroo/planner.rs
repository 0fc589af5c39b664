//! Walk planner
//!
//! Builds the per-solve constants every walker shares: the three jump
//! tables, the range-centering scalars and points, and the range-adjusted
//! target. Jump tables are drawn from a deterministically seeded RNG so
//! clients working the same unit agree on them; per-walk randomness comes
//! from entropy-seeded RNGs afterwards.

use anyhow::{bail, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::math::{curve, CurvePoint, Scalar320};

/// Entries per jump table.
pub const JMP_CNT: usize = 32;

/// Supported range width, bits.
pub const MIN_RANGE_BITS: u32 = 32;
pub const MAX_RANGE_BITS: u32 = 180;

/// Supported distinguishing threshold, bits.
pub const MIN_DP_BITS: u32 = 14;
pub const MAX_DP_BITS: u32 = 60;

/// One jump: an even distance and its precomputed point `dist * G`.
#[derive(Debug, Clone)]
pub struct JumpEntry {
    pub dist: Scalar320,
    pub p: CurvePoint,
}

/// Per-solve walk constants, shared read-only by every worker.
#[derive(Debug, Clone)]
pub struct WalkPlan {
    pub range_bits: u32,
    pub dp_bits: u32,
    /// Range start `S`.
    pub start: Scalar320,
    /// `H = 2^(R-1)`, the range-centering offset.
    pub half_range: Scalar320,
    pub p_half: CurvePoint,
    pub p_neg_half: CurvePoint,
    /// Tame walks begin near `2^(R-1) - 2^(R-5)`.
    pub tame_offset: Scalar320,
    /// Range-adjusted target `Q' = Q - S*G`; candidates verify against it.
    pub target: CurvePoint,
    /// Centered wild base `W = Q' - H*G`.
    pub wild_base: CurvePoint,
    /// Bulk-walk table, distances in `[2^(R/2+3), 2^(R/2+4))`.
    pub j1: Vec<JumpEntry>,
    /// Large table for start jumps, distances in `[2^(R-10), 2^(R-9))`.
    pub j2: Vec<JumpEntry>,
    /// Second large table, distances in `[2^(R-12), 2^(R-11))`.
    pub j3: Vec<JumpEntry>,
}

impl WalkPlan {
    /// Build the plan for one solve. `table_seed` pins the jump tables so
    /// every client on the same work unit draws identical tables.
    pub fn build(
        pubkey: &CurvePoint,
        start: &Scalar320,
        range_bits: u32,
        dp_bits: u32,
        table_seed: u64,
    ) -> Result<Self> {
        if !(MIN_RANGE_BITS..=MAX_RANGE_BITS).contains(&range_bits) {
            bail!("unsupported range value ({})", range_bits);
        }
        if !(MIN_DP_BITS..=MAX_DP_BITS).contains(&dp_bits) {
            bail!("unsupported DP value ({})", dp_bits);
        }

        let mut rng = StdRng::seed_from_u64(table_seed);
        let j1 = build_table(range_bits / 2 + 3, &mut rng);
        let j2 = build_table(range_bits - 10, &mut rng);
        let j3 = build_table(range_bits - 12, &mut rng);

        let half_range = Scalar320::from_pow2(range_bits - 1);
        let p_half = curve::mul_g(&half_range);
        let p_neg_half = curve::negate(&p_half);
        let tame_offset =
            Scalar320::from_pow2(range_bits - 1).sub(&Scalar320::from_pow2(range_bits - 5));

        let target = *pubkey + curve::negate(&curve::mul_g(start));
        let wild_base = target + p_neg_half;

        Ok(WalkPlan {
            range_bits,
            dp_bits,
            start: *start,
            half_range,
            p_half,
            p_neg_half,
            tame_offset,
            target,
            wild_base,
            j1,
            j2,
            j3,
        })
    }

    /// Expected group operations for the three-walk method.
    pub fn expected_ops(&self) -> f64 {
        1.15 * 2f64.powf(self.range_bits as f64 / 2.0)
    }

    /// Expected DP count at the configured threshold.
    pub fn expected_dps(&self) -> f64 {
        self.expected_ops() / 2f64.powi(self.dp_bits as i32)
    }
}

fn build_table(exponent: u32, rng: &mut StdRng) -> Vec<JumpEntry> {
    let floor = Scalar320::from_pow2(exponent);
    let mut table = Vec::with_capacity(JMP_CNT);
    for _ in 0..JMP_CNT {
        let mut dist = floor.add(&Scalar320::random_below(&floor, rng));
        dist.limbs[0] &= !1u64; // even distances keep wild residues apart
        table.push(JumpEntry { p: curve::mul_g(&dist), dist });
    }
    table
}
