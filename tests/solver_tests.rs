//! End-to-end solver tests: tiny local solves driven by the CPU reference
//! walker, resolver completeness over synthetic walks, and the ops-limit
//! cancellation path.

use std::fs;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use sotacrack::dp::codec::DpRecord;
use sotacrack::kangaroo::collision::{CollisionResolver, Verdict};
use sotacrack::kangaroo::orchestrator::{Orchestrator, SolveRequest};
use sotacrack::kangaroo::worker::{CpuKang, Worker};
use sotacrack::math::{curve, Scalar320};
use sotacrack::types::KangType;

fn workers(count: usize, kangs: usize) -> Vec<Box<dyn Worker>> {
    (0..count)
        .map(|i| Box::new(CpuKang::with_kang_cnt(i, kangs)) as Box<dyn Worker>)
        .collect()
}

#[test]
fn tiny_local_solve_recovers_key() {
    // 32-bit range starting at 2^31; the key sits at S + 0x1234ABCD
    let start = Scalar320::from_pow2(31);
    let key = start.add(&Scalar320::from_u64(0x1234_ABCD));
    let pubkey = curve::mul_g(&key);

    let dir = tempfile::tempdir().unwrap();
    let results = dir.path().join("RESULTS.TXT");

    let mut req = SolveRequest::new(pubkey, start, 32, 14);
    req.results_path = results.clone();
    req.max_factor = 64.0; // generous stop so a wedged run fails instead of hanging
    let outcome = Orchestrator::new(req).run_local(workers(3, 16)).unwrap();

    let found = outcome.key.expect("solve should recover the key");
    assert_eq!(found, key);
    assert!(outcome.total_ops > 0);

    // exactly one PRIVATE KEY line lands in the results file
    let contents = fs::read_to_string(&results).unwrap();
    let lines: Vec<&str> = contents
        .lines()
        .filter(|l| l.starts_with("PRIVATE KEY: "))
        .collect();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0], format!("PRIVATE KEY: {}", key.to_hex()));
}

#[test]
fn ops_limit_cancels_unsolvable_run() {
    // random target: essentially never inside the interval
    let mut rng = StdRng::seed_from_u64(99);
    let pubkey = curve::random_point(&mut rng);
    let dir = tempfile::tempdir().unwrap();

    let mut req = SolveRequest::new(pubkey, Scalar320::from_pow2(31), 32, 14);
    req.results_path = dir.path().join("RESULTS.TXT");
    req.max_factor = 0.05;
    let outcome = Orchestrator::new(req).run_local(workers(2, 8)).unwrap();

    assert!(outcome.key.is_none());
    assert!(!dir.path().join("RESULTS.TXT").exists());
}

#[test]
fn failed_workers_are_skipped_and_empty_set_is_fatal() {
    let start = Scalar320::from_pow2(31);
    let pubkey = curve::mul_g(&start.add(&Scalar320::from_u64(42)));

    // a zero-kangaroo walker fails prepare; the solve must refuse to start
    // when nothing survives
    let dir = tempfile::tempdir().unwrap();
    let mut req = SolveRequest::new(pubkey, start, 32, 14);
    req.results_path = dir.path().join("RESULTS.TXT");
    let broken: Vec<Box<dyn Worker>> = vec![Box::new(CpuKang::with_kang_cnt(0, 0))];
    assert!(Orchestrator::new(req).run_local(broken).is_err());
}

/// For a true collision between opposing walks, one of the resolver's
/// candidates must verify. Synthetic walks, random widths, every pairing.
#[test]
fn resolver_completeness_over_synthetic_walks() {
    let mut rng = StdRng::seed_from_u64(0xC0FFEE);
    for _ in 0..100 {
        let range_bits = rng.gen_range(32..=60);
        let half = Scalar320::from_pow2(range_bits - 1);
        let key_offset = Scalar320::random_below(&Scalar320::from_pow2(range_bits), &mut rng);
        let resolver = CollisionResolver::new(half, curve::mul_g(&key_offset));
        // v = k0 - H, the scalar the wild walks are displaced by
        let v = key_offset.sub(&half);

        // tame meets wild1: t = v + w1
        let w1 = Scalar320::random_below(&Scalar320::from_pow2(range_bits + 2), &mut rng);
        let t = v.add(&w1);
        let tame = DpRecord::from_distance([1u8; 12], &t, KangType::Tame);
        let wild1 = DpRecord::from_distance([1u8; 12], &w1, KangType::Wild1);
        match resolver.examine(&tame, &wild1) {
            Verdict::Solved(k) => assert_eq!(k, key_offset),
            other => panic!("tame x wild1 unresolved at R={}: {:?}", range_bits, other),
        }

        // tame meets wild2: t = -v + w2
        let w2 = Scalar320::random_below(&Scalar320::from_pow2(range_bits + 2), &mut rng);
        let t2 = w2.sub(&v);
        let tame2 = DpRecord::from_distance([2u8; 12], &t2, KangType::Tame);
        let wild2 = DpRecord::from_distance([2u8; 12], &w2, KangType::Wild2);
        match resolver.examine(&wild2, &tame2) {
            Verdict::Solved(k) => assert_eq!(k, key_offset),
            other => panic!("tame x wild2 unresolved at R={}: {:?}", range_bits, other),
        }

        // wild1 meets wild2: w1' - w2' = -2v up to sign
        let w1b = Scalar320::random_below(&Scalar320::from_pow2(range_bits + 2), &mut rng);
        let w2b = w1b.add(&v).add(&v);
        let rec1 = DpRecord::from_distance([3u8; 12], &w1b, KangType::Wild1);
        let rec2 = DpRecord::from_distance([3u8; 12], &w2b, KangType::Wild2);
        match resolver.examine(&rec1, &rec2) {
            Verdict::Solved(k) => assert_eq!(k, key_offset),
            other => panic!("wild1 x wild2 unresolved at R={}: {:?}", range_bits, other),
        }
    }
}

/// Spurious pairs must never report a key, and soundness holds: whatever
/// the resolver reports verifies against the target.
#[test]
fn resolver_soundness_on_random_pairs() {
    let mut rng = StdRng::seed_from_u64(77);
    let half = Scalar320::from_pow2(39);
    let key_offset = Scalar320::from_u64(0xABCD_0123);
    let target = curve::mul_g(&key_offset);
    let resolver = CollisionResolver::new(half, target);

    for _ in 0..50 {
        let t = Scalar320::random_below(&Scalar320::from_pow2(42), &mut rng);
        let w = Scalar320::random_below(&Scalar320::from_pow2(42), &mut rng);
        let tame = DpRecord::from_distance([9u8; 12], &t, KangType::Tame);
        let wild = DpRecord::from_distance([9u8; 12], &w, KangType::Wild1);
        if let Verdict::Solved(k) = resolver.examine(&tame, &wild) {
            assert_eq!(curve::mul_g(&k), target);
        }
    }
}
