//! sotacrack - three-way Pollard kangaroo ECDLP solver for secp256k1
//!
//! Solves `k*G = Q` for `k` inside a bounded interval using the SOTA
//! (tame/wild1/wild2) kangaroo variant: many pseudo-random walks on the
//! curve emit distinguished points, and collisions between walks of
//! opposing types reveal the private key.
//!
//! The crate covers the DP pipeline (codec, index, ingest scheduler), the
//! walk planner (jump tables and range-centering constants), the collision
//! resolver, the solve orchestrator, and the distributed coordination
//! layer (work assignment, DP submission, solved signalling). GPU compute
//! kernels are external producers behind the [`kangaroo::worker::Worker`]
//! contract; a CPU reference walker is included.

#![deny(unsafe_code)]

pub mod config;
pub mod types;
pub mod math;
pub mod dp;
pub mod kangaroo;
pub mod server;

pub use config::Args;
pub use kangaroo::orchestrator::{IndexPolicy, Orchestrator, SolveOutcome, SolveRequest};
pub use types::KangType;
