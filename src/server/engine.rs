//! Coordinator engine
//!
//! Server-side half of the distributed mode, kept transport-agnostic: it
//! owns the global DP index and the collision resolver, partitions the
//! configured search into work ranges, and turns submitted points into a
//! solution. HTTP framing stays outside this crate; the engine also
//! implements `WorkApi`, so tests and embedded setups can drive a client
//! against it in-process.

use std::cmp::Ordering;
use std::sync::Mutex;

use anyhow::Result;
use log::{info, warn};

use crate::dp::index::DpIndex;
use crate::kangaroo::collision::{CollisionResolver, Verdict};
use crate::kangaroo::planner::{MAX_DP_BITS, MAX_RANGE_BITS, MIN_DP_BITS, MIN_RANGE_BITS};
use crate::math::{curve, Scalar320};
use crate::server::api::{
    ConfigureRequest, ConfigureResponse, GetWorkResponse, StatusResponse, SubmitPoint,
    SubmitResponse, WorkAssignment,
};
use crate::server::client::WorkApi;

const MAX_WORK_RANGES: usize = 1 << 20;

struct Search {
    start: Scalar320,
    pubkey_hex: String,
    dp_bits: u32,
    bit_range: u32,
    resolver: CollisionResolver,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RangeStatus {
    Pending,
    Assigned,
}

struct WorkRange {
    id: String,
    start_hex: String,
    end_hex: String,
    status: RangeStatus,
    assigned_to: Option<String>,
}

#[derive(Default)]
struct EngineState {
    search: Option<Search>,
    ranges: Vec<WorkRange>,
    solved: bool,
    solution: Option<String>,
    errors: u64,
}

/// Global coordination state for one distributed search.
pub struct CoordinatorEngine {
    state: Mutex<EngineState>,
    index: DpIndex,
}

impl CoordinatorEngine {
    pub fn new() -> Self {
        CoordinatorEngine {
            state: Mutex::new(EngineState::default()),
            index: DpIndex::new(),
        }
    }

    /// Set the search parameters and carve the interval into work ranges.
    pub fn configure(&self, req: &ConfigureRequest) -> ConfigureResponse {
        let mut state = self.lock();
        if state.solved {
            return fail("Search already solved");
        }

        let start = match Scalar320::from_hex(&req.start_range) {
            Ok(v) => v,
            Err(e) => return fail(&format!("invalid start_range: {}", e)),
        };
        let end = match Scalar320::from_hex(&req.end_range) {
            Ok(v) => v,
            Err(e) => return fail(&format!("invalid end_range: {}", e)),
        };
        if end.cmp_unsigned(&start) != Ordering::Greater {
            return fail("end_range must be above start_range");
        }
        let target_point = match curve::parse_point(&req.pubkey) {
            Ok(p) => p,
            Err(e) => return fail(&format!("invalid pubkey: {}", e)),
        };
        let range_size = match Scalar320::from_hex(&req.range_size) {
            Ok(v) if !v.is_zero() => v,
            Ok(_) => return fail("range_size must be non-zero"),
            Err(e) => return fail(&format!("invalid range_size: {}", e)),
        };

        let bit_range = end.sub(&start).bit_length();
        if !(MIN_RANGE_BITS..=MAX_RANGE_BITS).contains(&bit_range) {
            return fail(&format!("unsupported range width ({} bits)", bit_range));
        }
        if !(MIN_DP_BITS..=MAX_DP_BITS).contains(&req.dp_bits) {
            return fail(&format!("unsupported DP value ({})", req.dp_bits));
        }

        // resolver context: H from the search width, target shifted by the
        // search start
        let half_range = Scalar320::from_pow2(bit_range - 1);
        let adjusted = target_point + curve::negate(&curve::mul_g(&start));
        let resolver = CollisionResolver::new(half_range, adjusted);

        let mut ranges = Vec::new();
        let mut current = start;
        while current.cmp_unsigned(&end) == Ordering::Less {
            if ranges.len() >= MAX_WORK_RANGES {
                return fail("range_size produces too many work ranges");
            }
            let mut chunk_end = current.add(&range_size);
            if end.cmp_unsigned(&chunk_end) == Ordering::Less {
                chunk_end = end;
            }
            ranges.push(WorkRange {
                id: format!("range_{:06}", ranges.len()),
                start_hex: current.to_hex(),
                end_hex: chunk_end.to_hex(),
                status: RangeStatus::Pending,
                assigned_to: None,
            });
            current = chunk_end;
        }
        let range_count = ranges.len();

        self.index.clear();
        state.ranges = ranges;
        state.search = Some(Search {
            start,
            pubkey_hex: req.pubkey.clone(),
            dp_bits: req.dp_bits,
            bit_range,
            resolver,
        });
        state.solution = None;
        state.errors = 0;

        info!(
            "search configured: {} to {}, {} bits, dp {}, {} work ranges",
            req.start_range, req.end_range, bit_range, req.dp_bits, range_count
        );
        ConfigureResponse {
            success: true,
            message: format!("Search configured successfully ({} work ranges)", range_count),
        }
    }

    /// Hand the lowest pending range to a client.
    pub fn get_work(&self, client_id: &str) -> GetWorkResponse {
        let mut state = self.lock();
        if state.solved || state.search.is_none() {
            return no_work();
        }
        let (dp_bits, bit_range, pubkey_hex) = match &state.search {
            Some(s) => (s.dp_bits, s.bit_range, s.pubkey_hex.clone()),
            None => return no_work(),
        };
        let slot = state
            .ranges
            .iter_mut()
            .find(|r| r.status == RangeStatus::Pending);
        let slot = match slot {
            Some(slot) => slot,
            None => return no_work(),
        };
        slot.status = RangeStatus::Assigned;
        slot.assigned_to = Some(client_id.to_string());
        info!("assigned work {} to client {}", slot.id, client_id);
        GetWorkResponse {
            success: true,
            work: Some(WorkAssignment {
                range_id: slot.id.clone(),
                start_range: slot.start_hex.clone(),
                end_range: slot.end_hex.clone(),
                bit_range,
                dp_bits,
                pubkey: pubkey_hex,
            }),
            message: None,
        }
    }

    /// Index a batch of points and resolve any collisions they expose.
    pub fn submit_points(&self, client_id: &str, points: &[SubmitPoint]) -> SubmitResponse {
        let mut state = self.lock();
        if state.solved {
            return SubmitResponse {
                status: "solved".to_string(),
                solution: state.solution.clone(),
                points_processed: None,
            };
        }
        let search = match &state.search {
            Some(search) => search,
            None => {
                return SubmitResponse {
                    status: "ok".to_string(),
                    solution: None,
                    points_processed: Some(0),
                }
            }
        };

        let mut processed = 0usize;
        let mut solution = None;
        let mut errors = 0u64;
        for point in points {
            let rec = match point.to_record() {
                Ok(rec) => rec,
                Err(e) => {
                    warn!("rejecting point from {}: {}", client_id, e);
                    continue;
                }
            };
            processed += 1;
            let prior = match self.index.find_or_insert(rec) {
                Some(prior) => prior,
                None => continue,
            };
            match search.resolver.examine(&prior, &rec) {
                Verdict::Solved(k) => {
                    let absolute = k.add(&search.start);
                    let hex = absolute.to_hex();
                    info!("collision solved by client {}: {}", client_id, hex);
                    solution = Some(hex);
                    break;
                }
                Verdict::TypeMismatch | Verdict::Spurious => errors += 1,
                Verdict::Ignored | Verdict::SpuriousWild => {}
            }
        }
        state.errors += errors;

        if let Some(hex) = solution {
            state.solved = true;
            state.solution = Some(hex.clone());
            SubmitResponse {
                status: "solved".to_string(),
                solution: Some(hex),
                points_processed: None,
            }
        } else {
            SubmitResponse {
                status: "ok".to_string(),
                solution: None,
                points_processed: Some(processed),
            }
        }
    }

    pub fn status(&self) -> StatusResponse {
        let state = self.lock();
        StatusResponse {
            solved: state.solved,
            solution: state.solution.clone(),
            dp_count: Some(self.index.len() as u64),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for CoordinatorEngine {
    fn default() -> Self {
        Self::new()
    }
}

// the engine is itself a WorkApi, so a client orchestrator can run
// against it without any transport in between
impl WorkApi for CoordinatorEngine {
    fn configure(&self, req: &ConfigureRequest) -> Result<ConfigureResponse> {
        Ok(CoordinatorEngine::configure(self, req))
    }

    fn get_work(&self, client_id: &str) -> Result<GetWorkResponse> {
        Ok(CoordinatorEngine::get_work(self, client_id))
    }

    fn submit_points(&self, client_id: &str, points: &[SubmitPoint]) -> Result<SubmitResponse> {
        Ok(CoordinatorEngine::submit_points(self, client_id, points))
    }

    fn status(&self) -> Result<StatusResponse> {
        Ok(CoordinatorEngine::status(self))
    }
}

fn fail(message: &str) -> ConfigureResponse {
    ConfigureResponse {
        success: false,
        message: message.to_string(),
    }
}

fn no_work() -> GetWorkResponse {
    GetWorkResponse {
        success: false,
        work: None,
        message: Some("No work available".to_string()),
    }
}
