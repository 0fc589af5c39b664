//! Distributed coordination layer: wire payloads, the client-side work
//! API, and the transport-agnostic coordinator engine.

pub mod api;
pub mod client;
pub mod engine;

pub use client::{HttpWorkApi, WorkApi};
pub use engine::CoordinatorEngine;
