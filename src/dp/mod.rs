//! Distinguished point pipeline: wire codec, collision index, ingest
//! scheduler, and tame-table preload.

pub mod codec;
pub mod index;
pub mod ingest;
pub mod tames;

pub use codec::{DpRecord, DP_RECORD_SIZE};
pub use index::DpIndex;
pub use ingest::{IngestMode, IngestScheduler, MAX_CNT_LIST};
