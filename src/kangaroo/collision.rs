//! Collision resolver
//!
//! Two distinguished points with the same x-prefix and opposing walk types
//! pin the private key down to a handful of candidates; each candidate is
//! verified by multiplying the generator and comparing against the
//! range-adjusted target. Same-type pairs are filtered before any curve
//! work happens.

use crate::dp::codec::DpRecord;
use crate::kangaroo::planner::WalkPlan;
use crate::math::{curve, CurvePoint, Scalar320};
use crate::types::KangType;

/// Outcome of examining a colliding record pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Expected and harmless: tame x tame, or a wild self-collision.
    Ignored,
    /// Same-type pair that is not a self-collision; counted as an internal
    /// inconsistency.
    TypeMismatch,
    /// Tame x wild pair whose candidates all failed verification; counted.
    Spurious,
    /// Wild1 x wild2 pair that failed verification; these happen before
    /// the walks converge and are not errors.
    SpuriousWild,
    /// Verified in-range key offset (add the range start for the absolute
    /// private key).
    Solved(Scalar320),
}

/// Candidate construction and verification for one search.
pub struct CollisionResolver {
    half_range: Scalar320,
    target: CurvePoint,
}

impl CollisionResolver {
    pub fn new(half_range: Scalar320, target: CurvePoint) -> Self {
        CollisionResolver { half_range, target }
    }

    pub fn for_plan(plan: &WalkPlan) -> Self {
        CollisionResolver::new(plan.half_range, plan.target)
    }

    /// Apply the collision policy to a prior record and a fresh record
    /// sharing its x-prefix.
    pub fn examine(&self, prior: &DpRecord, fresh: &DpRecord) -> Verdict {
        if prior.kang == fresh.kang {
            if prior.kang == KangType::Tame {
                return Verdict::Ignored;
            }
            // a wild meeting its own trail reports the same step
            if prior.distance_low_u64() == fresh.distance_low_u64() {
                return Verdict::Ignored;
            }
            return Verdict::TypeMismatch;
        }

        if prior.kang == KangType::Tame || fresh.kang == KangType::Tame {
            let (t, w) = if prior.kang == KangType::Tame {
                (prior.distance(), fresh.distance())
            } else {
                (fresh.distance(), prior.distance())
            };
            match self.resolve_tame_wild(&t, &w) {
                Some(k) => Verdict::Solved(k),
                None => Verdict::Spurious,
            }
        } else {
            let (a, b) = (prior.distance(), fresh.distance());
            match self.resolve_wild_pair(&a, &b) {
                Some(k) => Verdict::Solved(k),
                None => Verdict::SpuriousWild,
            }
        }
    }

    /// Tame x wild: `k = +/-(t - w) + H`.
    fn resolve_tame_wild(&self, t: &Scalar320, w: &Scalar320) -> Option<Scalar320> {
        let base = t.sub(w);
        self.check(&base.add(&self.half_range))
            .or_else(|| self.check(&base.neg().add(&self.half_range)))
    }

    /// Wild1 x wild2: the carried difference is twice the true offset, so
    /// normalise the sign, halve, and try both signs of the result.
    fn resolve_wild_pair(&self, a: &Scalar320, b: &Scalar320) -> Option<Scalar320> {
        let mut base = a.sub(b);
        if base.is_negative() {
            base = base.neg();
        }
        let base = base.shr1();
        self.check(&base.add(&self.half_range))
            .or_else(|| self.check(&base.neg().add(&self.half_range)))
    }

    fn check(&self, k: &Scalar320) -> Option<Scalar320> {
        if curve::mul_g(k) == self.target {
            Some(*k)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::curve;

    fn rec(kang: KangType, dist: &Scalar320) -> DpRecord {
        DpRecord::from_distance([0x42; 12], dist, kang)
    }

    fn resolver(range_bits: u32, key_offset: &Scalar320) -> CollisionResolver {
        let half = Scalar320::from_pow2(range_bits - 1);
        CollisionResolver::new(half, curve::mul_g(key_offset))
    }

    #[test]
    fn tame_wild1_first_variant() {
        // R=40, H=2^39, t=0x10_0000_0000, w=0x0F_FFFF_FE00 -> k = H + (t-w)
        let h = Scalar320::from_pow2(39);
        let t = Scalar320::from_u64(0x10_0000_0000);
        let w = Scalar320::from_u64(0x0F_FFFF_FE00);
        let k = h.add(&t.sub(&w));
        let r = CollisionResolver::new(h, curve::mul_g(&k));

        let verdict = r.examine(&rec(KangType::Tame, &t), &rec(KangType::Wild1, &w));
        assert_eq!(verdict, Verdict::Solved(k));
    }

    #[test]
    fn tame_wild_negated_variant() {
        // key below the half range forces the -(t-w) branch
        let h = Scalar320::from_pow2(39);
        let t = Scalar320::from_u64(1000);
        let w = Scalar320::from_u64(901_000);
        // k = -(t-w) + H = (w-t) + H
        let k = w.sub(&t).add(&h);
        let r = CollisionResolver::new(h, curve::mul_g(&k));
        let verdict = r.examine(&rec(KangType::Wild2, &w), &rec(KangType::Tame, &t));
        assert_eq!(verdict, Verdict::Solved(k));
    }

    #[test]
    fn wild_pair_halves_the_difference() {
        let h = Scalar320::from_pow2(39);
        let v = Scalar320::from_u64(0x1234_5678);
        // wild1 at distance w1, wild2 at w2 with w2 - w1 = 2v, key = v + H
        let w1 = Scalar320::from_u64(0x10_0000);
        let w2 = w1.add(&v).add(&v);
        let k = v.add(&h);
        let r = CollisionResolver::new(h, curve::mul_g(&k));

        let verdict = r.examine(&rec(KangType::Wild1, &w1), &rec(KangType::Wild2, &w2));
        assert_eq!(verdict, Verdict::Solved(k));
        // order of the pair must not matter
        let verdict = r.examine(&rec(KangType::Wild2, &w2), &rec(KangType::Wild1, &w1));
        assert_eq!(verdict, Verdict::Solved(k));
    }

    #[test]
    fn wild_pair_negative_offset() {
        let h = Scalar320::from_pow2(39);
        let v = Scalar320::from_u64(0xBEEF);
        // key below H: k = H - v, so the halved base needs its negation
        let k = h.sub(&v);
        let w1 = Scalar320::from_u64(0x40_0000);
        let w2 = w1.add(&v).add(&v);
        let r = CollisionResolver::new(h, curve::mul_g(&k));
        let verdict = r.examine(&rec(KangType::Wild2, &w2), &rec(KangType::Wild1, &w1));
        assert_eq!(verdict, Verdict::Solved(k));
    }

    #[test]
    fn tame_tame_is_ignored() {
        let r = resolver(40, &Scalar320::from_u64(5));
        let a = rec(KangType::Tame, &Scalar320::from_u64(100));
        let b = rec(KangType::Tame, &Scalar320::from_u64(200));
        assert_eq!(r.examine(&a, &b), Verdict::Ignored);
    }

    #[test]
    fn wild_self_collision_is_ignored() {
        let r = resolver(40, &Scalar320::from_u64(5));
        let d = Scalar320::from_u64(0xAABB_CCDD);
        let a = rec(KangType::Wild1, &d);
        // same low 8 bytes of distance: the walk met itself
        let mut b = a;
        b.d[20] = 0x7;
        assert_eq!(r.examine(&a, &b), Verdict::Ignored);
    }

    #[test]
    fn wild_same_type_mismatch_counts() {
        let r = resolver(40, &Scalar320::from_u64(5));
        let a = rec(KangType::Wild2, &Scalar320::from_u64(100));
        let b = rec(KangType::Wild2, &Scalar320::from_u64(200));
        assert_eq!(r.examine(&a, &b), Verdict::TypeMismatch);
    }

    #[test]
    fn unrelated_tame_wild_is_spurious() {
        let r = resolver(40, &Scalar320::from_u64(0xDEAD_BEEF_CAFE));
        let a = rec(KangType::Tame, &Scalar320::from_u64(100));
        let b = rec(KangType::Wild1, &Scalar320::from_u64(200));
        assert_eq!(r.examine(&a, &b), Verdict::Spurious);
    }

    #[test]
    fn unrelated_wild_pair_is_silent_spurious() {
        let r = resolver(40, &Scalar320::from_u64(0xDEAD_BEEF_CAFE));
        let a = rec(KangType::Wild1, &Scalar320::from_u64(100));
        let b = rec(KangType::Wild2, &Scalar320::from_u64(200));
        assert_eq!(r.examine(&a, &b), Verdict::SpuriousWild);
    }

    #[test]
    fn negative_wire_distances_resolve() {
        // tame distance smaller than wild distance: t - w is negative on
        // the wire and must sign-extend correctly through the codec
        let h = Scalar320::from_pow2(39);
        let t = Scalar320::from_u64(500);
        let w = Scalar320::from_u64(1_000_000);
        let k = w.sub(&t).add(&h);
        let r = CollisionResolver::new(h, curve::mul_g(&k));
        let verdict = r.examine(&rec(KangType::Tame, &t), &rec(KangType::Wild1, &w));
        assert_eq!(verdict, Verdict::Solved(k));
    }
}
