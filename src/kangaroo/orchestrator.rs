//! Solve orchestrator
//!
//! Drives one solve through Prepare, Running, Draining and Finalising:
//! builds the walk plan, readies workers, polls the ingest scheduler for
//! collisions (or ships batches to the server in distributed mode), and
//! writes the recovered key.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use log::{error, info, warn};

use crate::dp::codec::{DpRecord, DP_RECORD_SIZE};
use crate::dp::index::DpIndex;
use crate::dp::ingest::IngestMode;
use crate::dp::tames;
use crate::kangaroo::collision::{CollisionResolver, Verdict};
use crate::kangaroo::context::SolveContext;
use crate::kangaroo::planner::WalkPlan;
use crate::kangaroo::worker::{Worker, WorkerHandle};
use crate::math::{CurvePoint, Scalar320};
use crate::server::api::SubmitPoint;
use crate::server::client::WorkApi;
use crate::types::KangType;

/// Ingest poll cadence.
const POLL_INTERVAL: Duration = Duration::from_millis(5);
/// Stats line cadence.
const STATS_INTERVAL: Duration = Duration::from_secs(5);
/// Default server submission cadence.
pub const SUBMIT_INTERVAL: Duration = Duration::from_secs(30);

/// What the orchestrator does with ingested records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexPolicy {
    /// Index records and resolve collisions.
    Solve,
    /// Force every record to TAME and only index it (tame-table
    /// generation); the resolver never runs.
    IndexOnly,
}

/// Parameters for one solve.
pub struct SolveRequest {
    pub pubkey: CurvePoint,
    pub start: Scalar320,
    pub range_bits: u32,
    pub dp_bits: u32,
    /// Cancel once actual ops exceed `max_factor * expected`; 0 disables.
    pub max_factor: f64,
    pub tames: Option<PathBuf>,
    pub policy: IndexPolicy,
    pub results_path: PathBuf,
    /// Jump-table seed shared by clients on the same work unit.
    pub table_seed: u64,
    pub submit_interval: Duration,
    /// Prefix on stats lines ("MAIN", "BENCH", "CLIENT").
    pub stats_prefix: String,
}

impl SolveRequest {
    pub fn new(pubkey: CurvePoint, start: Scalar320, range_bits: u32, dp_bits: u32) -> Self {
        SolveRequest {
            pubkey,
            start,
            range_bits,
            dp_bits,
            max_factor: 0.0,
            tames: None,
            policy: IndexPolicy::Solve,
            results_path: PathBuf::from("RESULTS.TXT"),
            table_seed: 0,
            submit_interval: SUBMIT_INTERVAL,
            stats_prefix: "MAIN".to_string(),
        }
    }
}

/// What a finished solve produced.
#[derive(Debug, Clone)]
pub struct SolveOutcome {
    /// Absolute private key (`k + S`), when solved.
    pub key: Option<Scalar320>,
    pub total_ops: u64,
    pub seconds: f64,
    /// Overhead factor `K = expected / (1.15 * actual)`.
    pub overhead: f64,
    pub dp_count: usize,
}

/// Runs one solve to completion or cancellation.
pub struct Orchestrator {
    req: SolveRequest,
}

impl Orchestrator {
    pub fn new(req: SolveRequest) -> Self {
        Orchestrator { req }
    }

    /// Local mode: collisions are resolved in-process against the local
    /// index.
    pub fn run_local(&self, workers: Vec<Box<dyn Worker>>) -> Result<SolveOutcome> {
        let plan = Arc::new(WalkPlan::build(
            &self.req.pubkey,
            &self.req.start,
            self.req.range_bits,
            self.req.dp_bits,
            self.req.table_seed,
        )?);
        info!(
            "solving: range {} bits, DP {}, estimated ops 2^{:.3}, estimated DPs {:.0}",
            plan.range_bits,
            plan.dp_bits,
            plan.expected_ops().log2(),
            plan.expected_dps()
        );

        let ctx = Arc::new(SolveContext::new(Arc::clone(&plan), IngestMode::Local));
        let index = DpIndex::new();
        if let Some(path) = &self.req.tames {
            tames::preload(path, &index)?;
        }
        let resolver = CollisionResolver::for_plan(&plan);

        let (handles, joins) = spawn_workers(workers, &plan, &ctx)?;
        let started = Instant::now();
        let mut last_stats = Instant::now();
        let ops_limit = ops_limit(self.req.max_factor, plan.expected_ops());
        let mut key = None;

        while !ctx.is_solved() {
            thread::sleep(POLL_INTERVAL);
            if let Some(found) = self.process_batch(&ctx, &index, &resolver) {
                key = Some(found);
                ctx.mark_solved();
                break;
            }
            if let Some(limit) = ops_limit {
                if ctx.ingest.total_ops() > limit {
                    info!("ops limit reached, cancelling solve");
                    break;
                }
            }
            if last_stats.elapsed() >= STATS_INTERVAL {
                print_stats(
                    &self.req.stats_prefix,
                    &handles,
                    &ctx,
                    index.len() as u64,
                    &plan,
                    started,
                );
                last_stats = Instant::now();
            }
        }

        drain_workers(&handles, joins);
        // records that arrived while draining can still hold the collision
        if key.is_none() && !ctx.is_solved() {
            key = self.process_batch(&ctx, &index, &resolver);
        }

        let outcome = self.finalise(&ctx, &plan, started, key, index.len());
        Ok(outcome)
    }

    /// Distributed mode: batches go to the server, which owns the index
    /// and resolver. Returns the solution hex when any client solved the
    /// search.
    pub fn run_client(
        &self,
        workers: Vec<Box<dyn Worker>>,
        api: &dyn WorkApi,
        client_id: &str,
    ) -> Result<Option<String>> {
        let plan = Arc::new(WalkPlan::build(
            &self.req.pubkey,
            &self.req.start,
            self.req.range_bits,
            self.req.dp_bits,
            self.req.table_seed,
        )?);
        let ctx = Arc::new(SolveContext::new(Arc::clone(&plan), IngestMode::Distributed));
        let (handles, joins) = spawn_workers(workers, &plan, &ctx)?;

        let started = Instant::now();
        let mut last_stats = Instant::now();
        let mut last_submit = Instant::now();
        let ops_limit = ops_limit(self.req.max_factor, plan.expected_ops());
        let mut solution = None;

        while !ctx.is_solved() {
            thread::sleep(POLL_INTERVAL);
            if last_submit.elapsed() >= self.req.submit_interval {
                last_submit = Instant::now();
                if let Some(sol) = submit_pending(&ctx, api, client_id) {
                    println!("*** SOLUTION FOUND BY SERVER! ***");
                    println!("Solution: {}", sol);
                    solution = Some(sol);
                    ctx.mark_solved();
                    break;
                }
                // a solution found by any other client short-circuits us
                match api.status() {
                    Ok(status) if status.solved => {
                        let sol = status.solution.unwrap_or_default();
                        println!("*** SOLUTION FOUND BY ANOTHER CLIENT! ***");
                        println!("Solution: {}", sol);
                        solution = Some(sol);
                        ctx.mark_solved();
                        break;
                    }
                    Ok(_) => {}
                    Err(e) => warn!("status poll failed: {}", e),
                }
            }
            if let Some(limit) = ops_limit {
                if ctx.ingest.total_ops() > limit {
                    info!("ops limit reached, finishing work unit");
                    break;
                }
            }
            if last_stats.elapsed() >= STATS_INTERVAL {
                print_stats(
                    "CLIENT",
                    &handles,
                    &ctx,
                    ctx.ingest.pending_len() as u64,
                    &plan,
                    started,
                );
                last_stats = Instant::now();
            }
        }

        drain_workers(&handles, joins);
        // flush whatever the walkers produced while draining
        if solution.is_none() {
            if let Some(sol) = submit_pending(&ctx, api, client_id) {
                solution = Some(sol);
            }
        }
        self.finalise(&ctx, &plan, started, None, 0);
        Ok(solution)
    }

    fn process_batch(
        &self,
        ctx: &SolveContext,
        index: &DpIndex,
        resolver: &CollisionResolver,
    ) -> Option<Scalar320> {
        let buf = ctx.ingest.drain();
        if buf.is_empty() {
            return None;
        }
        let mut found = None;
        for chunk in buf.chunks_exact(DP_RECORD_SIZE) {
            let mut rec = match DpRecord::decode(chunk) {
                Ok(rec) => rec,
                Err(e) => {
                    warn!("skipping undecodable DP record: {}", e);
                    continue;
                }
            };
            if self.req.policy == IndexPolicy::IndexOnly {
                rec.kang = KangType::Tame;
            }
            let prior = match index.find_or_insert(rec) {
                Some(prior) => prior,
                None => continue,
            };
            if self.req.policy == IndexPolicy::IndexOnly {
                continue;
            }
            match resolver.examine(&prior, &rec) {
                Verdict::Solved(k) => {
                    found = Some(k.add(&self.req.start));
                    break;
                }
                Verdict::TypeMismatch | Verdict::Spurious => {
                    warn!("collision error");
                    ctx.count_error();
                }
                Verdict::Ignored | Verdict::SpuriousWild => {}
            }
        }
        ctx.ingest.recycle(buf);
        found
    }

    fn finalise(
        &self,
        ctx: &SolveContext,
        plan: &WalkPlan,
        started: Instant,
        key: Option<Scalar320>,
        dp_count: usize,
    ) -> SolveOutcome {
        let seconds = started.elapsed().as_secs_f64();
        let total_ops = ctx.ingest.total_ops();
        let overhead = if total_ops > 0 {
            plan.expected_ops() / (1.15 * total_ops as f64)
        } else {
            0.0
        };
        println!("Total time: {}", format_duration(started.elapsed()));
        if let Some(k) = &key {
            println!("Point solved, K: {:.3} (with DP and walker overheads)", overhead);
            let hex = k.to_hex();
            println!("PRIVATE KEY: {}", hex);
            if let Err(e) = append_result(&self.req.results_path, &hex) {
                error!("failed to write {:?}: {}", self.req.results_path, e);
            }
        }
        SolveOutcome {
            key,
            total_ops,
            seconds,
            overhead,
            dp_count,
        }
    }
}

fn ops_limit(max_factor: f64, expected_ops: f64) -> Option<u64> {
    if max_factor > 0.0 {
        Some((max_factor * expected_ops) as u64)
    } else {
        None
    }
}

fn spawn_workers(
    workers: Vec<Box<dyn Worker>>,
    plan: &Arc<WalkPlan>,
    ctx: &Arc<SolveContext>,
) -> Result<(Vec<WorkerHandle>, Vec<JoinHandle<()>>)> {
    let mut handles = Vec::new();
    let mut joins = Vec::new();
    for mut worker in workers {
        let label = worker.label();
        if let Err(e) = worker.prepare(plan) {
            // a failed device is skipped; the solve continues with the rest
            error!("worker {} prepare failed: {}", label, e);
            continue;
        }
        handles.push(worker.handle());
        let thread_ctx = Arc::clone(ctx);
        let join = thread::Builder::new()
            .name(label.clone())
            .spawn(move || worker.execute(thread_ctx))
            .with_context(|| format!("spawning worker thread {}", label))?;
        joins.push(join);
    }
    if handles.is_empty() {
        bail!("no workers available");
    }
    info!("{} workers started", handles.len());
    Ok((handles, joins))
}

fn drain_workers(handles: &[WorkerHandle], joins: Vec<JoinHandle<()>>) {
    for handle in handles {
        handle.stop();
    }
    for join in joins {
        let _ = join.join();
    }
}

fn submit_pending(ctx: &SolveContext, api: &dyn WorkApi, client_id: &str) -> Option<String> {
    let records = ctx.ingest.take_pending();
    if records.is_empty() {
        return None;
    }
    let points: Vec<SubmitPoint> = records.iter().map(SubmitPoint::from_record).collect();
    match api.submit_points(client_id, &points) {
        Ok(resp) if resp.status == "solved" => resp.solution,
        Ok(resp) => {
            if let Some(n) = resp.points_processed {
                info!("submitted {} points to server", n);
            }
            None
        }
        Err(e) => {
            // transport failure is non-fatal; retry the batch next tick
            warn!("point submission failed, keeping batch pending: {}", e);
            ctx.ingest.requeue_pending(records);
            None
        }
    }
}

fn print_stats(
    prefix: &str,
    handles: &[WorkerHandle],
    ctx: &SolveContext,
    dp_count: u64,
    plan: &WalkPlan,
    started: Instant,
) {
    let speed: u32 = handles.iter().map(|h| h.stats_speed()).sum();
    let est_dps = plan.expected_dps() as u64;
    let eta = if speed > 0 {
        let secs = plan.expected_ops() / 1_000_000.0 / speed as f64;
        format_duration(Duration::from_secs(secs as u64))
    } else {
        "-".to_string()
    };
    println!(
        "{}: Speed: {} MKeys/s, Err: {}, Ovf: {}, DPs: {}K/{}K, Time: {}/{}",
        prefix,
        speed,
        ctx.total_errors(),
        ctx.ingest.overflow_count(),
        dp_count / 1000,
        est_dps / 1000,
        format_duration(started.elapsed()),
        eta
    );
}

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    let days = secs / 86_400;
    let hours = (secs % 86_400) / 3600;
    let mins = (secs % 3600) / 60;
    let rem = secs % 60;
    format!("{}d:{:02}h:{:02}m:{:02}s", days, hours, mins, rem)
}

fn append_result(path: &PathBuf, hex: &str) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening {:?}", path))?;
    write!(file, "PRIVATE KEY: {}\r\n", hex)?;
    Ok(())
}
