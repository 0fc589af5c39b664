//! DP collision index
//!
//! Insertion-time lookup keyed on the 12-byte x-prefix. The single
//! mutating operation is find-or-insert: the first record stored for a
//! prefix is immutable and every later arrival with the same prefix gets
//! that first record back. Sharded on the leading x-byte so concurrent
//! ingest paths rarely contend on one lock.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::dp::codec::DpRecord;

const SHARD_COUNT: usize = 256;

/// Sharded x-prefix index of distinguished points.
pub struct DpIndex {
    shards: Vec<Mutex<HashMap<[u8; 12], DpRecord>>>,
}

impl DpIndex {
    pub fn new() -> Self {
        let mut shards = Vec::with_capacity(SHARD_COUNT);
        for _ in 0..SHARD_COUNT {
            shards.push(Mutex::new(HashMap::new()));
        }
        DpIndex { shards }
    }

    /// Look up the prefix; if present return the first record stored for
    /// it, otherwise store `rec` and return `None`. Atomic per shard.
    pub fn find_or_insert(&self, rec: DpRecord) -> Option<DpRecord> {
        let shard = &self.shards[rec.x[0] as usize];
        let mut map = shard.lock().unwrap_or_else(|e| e.into_inner());
        match map.get(&rec.x) {
            Some(prior) => Some(*prior),
            None => {
                map.insert(rec.x, rec);
                None
            }
        }
    }

    /// Total records stored.
    pub fn len(&self) -> usize {
        self.shards
            .iter()
            .map(|s| s.lock().unwrap_or_else(|e| e.into_inner()).len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every record; used between solves.
    pub fn clear(&self) {
        for shard in &self.shards {
            shard.lock().unwrap_or_else(|e| e.into_inner()).clear();
        }
    }
}

impl Default for DpIndex {
    fn default() -> Self {
        Self::new()
    }
}
