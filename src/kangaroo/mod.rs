//! Kangaroo core: walk planning, collision resolution, worker contract and
//! the solve orchestrator.

pub mod collision;
pub mod context;
pub mod orchestrator;
pub mod planner;
pub mod worker;

pub use collision::{CollisionResolver, Verdict};
pub use context::SolveContext;
pub use orchestrator::{IndexPolicy, Orchestrator, SolveOutcome, SolveRequest};
pub use planner::{JumpEntry, WalkPlan, JMP_CNT};
pub use worker::{CpuKang, Worker, WorkerHandle};
