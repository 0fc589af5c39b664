//! Worker contract and the CPU reference walker
//!
//! Compute devices are external DP producers: they receive the walk plan,
//! run kangaroos, and push encoded DP batches into the ingest scheduler.
//! `CpuKang` implements the contract in plain Rust so benchmarks, small
//! solves and property tests run without any device.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use anyhow::{anyhow, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::dp::codec::DpRecord;
use crate::kangaroo::context::SolveContext;
use crate::kangaroo::planner::{WalkPlan, JMP_CNT};
use crate::math::{curve, CurvePoint, Scalar320};
use crate::types::KangType;

/// Rolling ops meter backing the per-worker speed statistic.
pub struct SpeedMeter {
    window: Mutex<MeterWindow>,
}

struct MeterWindow {
    total: u64,
    last_total: u64,
    last_instant: Instant,
}

impl SpeedMeter {
    pub fn new() -> Self {
        SpeedMeter {
            window: Mutex::new(MeterWindow {
                total: 0,
                last_total: 0,
                last_instant: Instant::now(),
            }),
        }
    }

    pub fn credit(&self, ops: u64) {
        self.lock().total += ops;
    }

    /// Speed in M ops/s since the previous call.
    pub fn mops(&self) -> u32 {
        let mut w = self.lock();
        let elapsed = w.last_instant.elapsed().as_secs_f64();
        if elapsed <= 0.0 {
            return 0;
        }
        let delta = w.total - w.last_total;
        w.last_total = w.total;
        w.last_instant = Instant::now();
        (delta as f64 / elapsed / 1_000_000.0) as u32
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MeterWindow> {
        self.window.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for SpeedMeter {
    fn default() -> Self {
        Self::new()
    }
}

/// Control handle the orchestrator keeps after moving a worker into its
/// thread: cooperative stop plus the speed statistic.
#[derive(Clone)]
pub struct WorkerHandle {
    stop: Arc<AtomicBool>,
    meter: Arc<SpeedMeter>,
}

impl WorkerHandle {
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    pub fn stats_speed(&self) -> u32 {
        self.meter.mops()
    }
}

/// External compute contract: prepare with the plan, run until stopped or
/// solved, report speed through the handle.
pub trait Worker: Send {
    fn label(&self) -> String;
    fn prepare(&mut self, plan: &Arc<WalkPlan>) -> Result<()>;
    fn handle(&self) -> WorkerHandle;
    fn execute(self: Box<Self>, ctx: Arc<SolveContext>);
}

const FLUSH_OPS: u64 = 4096;

/// Reference CPU walker: a herd of kangaroos stepped one jump at a time.
pub struct CpuKang {
    device_index: usize,
    kang_cnt: usize,
    stop: Arc<AtomicBool>,
    meter: Arc<SpeedMeter>,
    plan: Option<Arc<WalkPlan>>,
}

impl CpuKang {
    pub fn new(device_index: usize) -> Self {
        Self::with_kang_cnt(device_index, 32)
    }

    pub fn with_kang_cnt(device_index: usize, kang_cnt: usize) -> Self {
        CpuKang {
            device_index,
            kang_cnt,
            stop: Arc::new(AtomicBool::new(false)),
            meter: Arc::new(SpeedMeter::new()),
            plan: None,
        }
    }
}

struct Walk {
    pos: CurvePoint,
    dist: Scalar320,
    kind: KangType,
}

fn start_walk(plan: &WalkPlan, kind: KangType, rng: &mut StdRng) -> Walk {
    let spread = Scalar320::from_pow2(plan.range_bits - 5);
    let mut d0 = Scalar320::random_below(&spread, rng);
    let mut walk = match kind {
        KangType::Tame => {
            let dist = plan.tame_offset.add(&d0);
            Walk { pos: curve::mul_g(&dist), dist, kind }
        }
        KangType::Wild1 => {
            d0.limbs[0] &= !1u64;
            Walk { pos: plan.wild_base + curve::mul_g(&d0), dist: d0, kind }
        }
        KangType::Wild2 => {
            d0.limbs[0] &= !1u64;
            Walk {
                pos: curve::negate(&plan.wild_base) + curve::mul_g(&d0),
                dist: d0,
                kind,
            }
        }
    };
    // one large jump at the start shatters short cycles between restarts
    let entry = &plan.j2[rng.gen_range(0..JMP_CNT)];
    walk.pos += entry.p;
    walk.dist = walk.dist.add(&entry.dist);
    walk
}

impl Worker for CpuKang {
    fn label(&self) -> String {
        format!("cpu{}", self.device_index)
    }

    fn prepare(&mut self, plan: &Arc<WalkPlan>) -> Result<()> {
        if self.kang_cnt == 0 {
            return Err(anyhow!("worker {} has no kangaroos", self.label()));
        }
        self.plan = Some(Arc::clone(plan));
        Ok(())
    }

    fn handle(&self) -> WorkerHandle {
        WorkerHandle {
            stop: Arc::clone(&self.stop),
            meter: Arc::clone(&self.meter),
        }
    }

    fn execute(self: Box<Self>, ctx: Arc<SolveContext>) {
        let plan = match &self.plan {
            Some(plan) => Arc::clone(plan),
            None => return,
        };
        let mut rng = StdRng::from_entropy();
        let mut walks: Vec<Walk> = (0..self.kang_cnt)
            .map(|i| start_walk(&plan, KangType::ALL[i % 3], &mut rng))
            .collect();

        let mut batch: Vec<u8> = Vec::new();
        let mut ops = 0u64;
        while !self.stop.load(Ordering::Acquire) && !ctx.is_solved() {
            for walk in walks.iter_mut() {
                let x = curve::x_bytes_be(&walk.pos);
                if curve::is_distinguished(&x, plan.dp_bits) {
                    let rec = DpRecord::from_distance(
                        curve::x_prefix_le12(&x),
                        &walk.dist,
                        walk.kind,
                    );
                    batch.extend_from_slice(&rec.encode());
                }
                let entry = &plan.j1[(curve::x_low_u64(&x) >> 8) as usize % JMP_CNT];
                walk.pos += entry.p;
                walk.dist = walk.dist.add(&entry.dist);
                ops += 1;
            }
            if ops >= FLUSH_OPS {
                ctx.ingest.add_batch(&batch, ops);
                self.meter.credit(ops);
                batch.clear();
                ops = 0;
            }
        }
        if ops > 0 || !batch.is_empty() {
            ctx.ingest.add_batch(&batch, ops);
            self.meter.credit(ops);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dp::codec::DP_RECORD_SIZE;
    use crate::dp::ingest::IngestMode;

    fn tiny_plan() -> Arc<WalkPlan> {
        let key = Scalar320::from_pow2(31).add(&Scalar320::from_u64(0xABCD));
        let q = curve::mul_g(&key);
        Arc::new(WalkPlan::build(&q, &Scalar320::ZERO, 32, 14, 0).unwrap())
    }

    #[test]
    fn prepare_requires_kangaroos() {
        let plan = tiny_plan();
        let mut worker = CpuKang::with_kang_cnt(0, 0);
        assert!(worker.prepare(&plan).is_err());
        let mut worker = CpuKang::with_kang_cnt(0, 3);
        assert!(worker.prepare(&plan).is_ok());
    }

    #[test]
    fn execute_without_prepare_returns_quietly() {
        let plan = tiny_plan();
        let ctx = Arc::new(SolveContext::new(plan, IngestMode::Local));
        let worker = Box::new(CpuKang::new(0));
        worker.execute(Arc::clone(&ctx));
        assert_eq!(ctx.ingest.total_ops(), 0);
    }

    #[test]
    fn walks_emit_valid_records_and_ops() {
        let plan = tiny_plan();
        let ctx = Arc::new(SolveContext::new(Arc::clone(&plan), IngestMode::Local));
        let mut worker = Box::new(CpuKang::with_kang_cnt(0, 6));
        worker.prepare(&plan).unwrap();
        let handle = worker.handle();

        let thread_ctx = Arc::clone(&ctx);
        let join = std::thread::spawn(move || worker.execute(thread_ctx));
        std::thread::sleep(std::time::Duration::from_millis(300));
        handle.stop();
        join.join().unwrap();

        assert!(ctx.ingest.total_ops() > 0);
        let drained = ctx.ingest.drain();
        assert_eq!(drained.len() % DP_RECORD_SIZE, 0);
        for chunk in drained.chunks_exact(DP_RECORD_SIZE) {
            let rec = DpRecord::decode(chunk).unwrap();
            // the contract: every emitted prefix satisfies the DP predicate
            let low_u16 = u16::from_le_bytes([rec.x[0], rec.x[1]]);
            assert_eq!(low_u16 & 0x3FFF, 0);
        }
    }

    #[test]
    fn start_positions_track_distances() {
        let plan = tiny_plan();
        let mut rng = StdRng::seed_from_u64(3);
        let tame = start_walk(&plan, KangType::Tame, &mut rng);
        assert_eq!(tame.pos, curve::mul_g(&tame.dist));
        let wild1 = start_walk(&plan, KangType::Wild1, &mut rng);
        assert_eq!(wild1.pos, plan.wild_base + curve::mul_g(&wild1.dist));
        let wild2 = start_walk(&plan, KangType::Wild2, &mut rng);
        assert_eq!(
            wild2.pos,
            curve::negate(&plan.wild_base) + curve::mul_g(&wild2.dist)
        );
    }
}
