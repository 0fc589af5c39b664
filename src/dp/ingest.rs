//! DP ingest scheduler
//!
//! Workers hand over encoded DP batches together with their accumulated
//! op counts; the orchestrator polls the scheduler and processes records
//! outside the critical section. Local mode keeps two flip-flop byte
//! buffers; distributed mode accumulates decoded records in a pending
//! vector that is swapped out on the submission tick. The lock only ever
//! covers appends and pointer swaps.

use std::mem;
use std::sync::Mutex;

use log::warn;

use crate::dp::codec::{DpRecord, DP_RECORD_SIZE};

/// Capacity of each flip-flop buffer, in records. A full buffer means the
/// DP threshold is too low for the compute throughput.
pub const MAX_CNT_LIST: usize = 1 << 20;

/// Where ingested batches go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestMode {
    /// Feed the local index via the flip-flop buffers.
    Local,
    /// Queue decoded records for submission to the server.
    Distributed,
}

struct Inner {
    active: Vec<u8>,
    standby: Vec<u8>,
    pending: Vec<DpRecord>,
    ops: u64,
    overflows: u64,
}

/// Mutex-guarded ingest state shared by all workers.
pub struct IngestScheduler {
    mode: IngestMode,
    inner: Mutex<Inner>,
}

impl IngestScheduler {
    pub fn new(mode: IngestMode) -> Self {
        IngestScheduler {
            mode,
            inner: Mutex::new(Inner {
                active: Vec::new(),
                standby: Vec::new(),
                pending: Vec::new(),
                ops: 0,
                overflows: 0,
            }),
        }
    }

    pub fn mode(&self) -> IngestMode {
        self.mode
    }

    /// Append a batch of encoded records and credit `ops` group operations.
    /// A batch that does not fit is dropped whole (raise the DP value).
    pub fn add_batch(&self, batch: &[u8], ops: u64) {
        if batch.len() % DP_RECORD_SIZE != 0 {
            warn!("ignoring malformed DP batch of {} bytes", batch.len());
            return;
        }
        match self.mode {
            IngestMode::Local => {
                let mut inner = self.lock();
                if inner.active.len() + batch.len() > MAX_CNT_LIST * DP_RECORD_SIZE {
                    inner.overflows += 1;
                    drop(inner);
                    warn!("DPs buffer overflow, some points lost, increase DP value!");
                    return;
                }
                inner.active.extend_from_slice(batch);
                inner.ops += ops;
            }
            IngestMode::Distributed => {
                // decode outside the critical section
                let mut decoded = Vec::with_capacity(batch.len() / DP_RECORD_SIZE);
                for chunk in batch.chunks_exact(DP_RECORD_SIZE) {
                    match DpRecord::decode(chunk) {
                        Ok(rec) => decoded.push(rec),
                        Err(e) => {
                            warn!("dropping DP batch with bad record: {}", e);
                            return;
                        }
                    }
                }
                let mut inner = self.lock();
                inner.pending.extend(decoded);
                inner.ops += ops;
            }
        }
    }

    /// Swap out the active buffer and return its contents for processing.
    pub fn drain(&self) -> Vec<u8> {
        let mut inner = self.lock();
        if inner.active.is_empty() {
            return Vec::new();
        }
        let standby = mem::take(&mut inner.standby);
        let out = mem::replace(&mut inner.active, standby);
        out
    }

    /// Return a drained buffer for reuse as the standby.
    pub fn recycle(&self, mut buf: Vec<u8>) {
        buf.clear();
        let mut inner = self.lock();
        if inner.standby.capacity() < buf.capacity() {
            inner.standby = buf;
        }
    }

    /// Swap out the pending vector for server submission.
    pub fn take_pending(&self) -> Vec<DpRecord> {
        mem::take(&mut self.lock().pending)
    }

    /// Put unsubmitted records back at the front of the pending queue.
    pub fn requeue_pending(&self, records: Vec<DpRecord>) {
        let mut inner = self.lock();
        let tail = mem::replace(&mut inner.pending, records);
        inner.pending.extend(tail);
    }

    pub fn pending_len(&self) -> usize {
        self.lock().pending.len()
    }

    /// Group operations credited by all workers so far.
    pub fn total_ops(&self) -> u64 {
        self.lock().ops
    }

    pub fn overflow_count(&self) -> u64 {
        self.lock().overflows
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::KangType;

    fn encoded(n: u8) -> Vec<u8> {
        let mut x = [0u8; 12];
        x[0] = n;
        DpRecord::new(x, [0u8; 22], KangType::Tame).encode().to_vec()
    }

    #[test]
    fn local_add_and_drain() {
        let sched = IngestScheduler::new(IngestMode::Local);
        sched.add_batch(&encoded(1), 100);
        sched.add_batch(&encoded(2), 50);
        assert_eq!(sched.total_ops(), 150);

        let drained = sched.drain();
        assert_eq!(drained.len(), 2 * DP_RECORD_SIZE);
        let records: Vec<DpRecord> = drained
            .chunks_exact(DP_RECORD_SIZE)
            .map(|c| DpRecord::decode(c).unwrap())
            .collect();
        assert_eq!(records[0].x[0], 1);
        assert_eq!(records[1].x[0], 2);
        sched.recycle(drained);

        assert!(sched.drain().is_empty());
        // ops survive the drain
        assert_eq!(sched.total_ops(), 150);
    }

    #[test]
    fn malformed_batch_is_dropped() {
        let sched = IngestScheduler::new(IngestMode::Local);
        sched.add_batch(&[0u8; 40], 10);
        assert_eq!(sched.total_ops(), 0);
        assert!(sched.drain().is_empty());
    }

    #[test]
    fn overflow_drops_batch_and_counts() {
        let sched = IngestScheduler::new(IngestMode::Local);
        // fill right up to capacity
        let big = vec![0u8; MAX_CNT_LIST * DP_RECORD_SIZE];
        sched.add_batch(&big, 1);
        assert_eq!(sched.overflow_count(), 0);
        sched.add_batch(&encoded(1), 5);
        assert_eq!(sched.overflow_count(), 1);
        // dropped batch contributes no ops
        assert_eq!(sched.total_ops(), 1);
    }

    #[test]
    fn distributed_pending_swap() {
        let sched = IngestScheduler::new(IngestMode::Distributed);
        sched.add_batch(&encoded(9), 42);
        sched.add_batch(&encoded(8), 8);
        assert_eq!(sched.pending_len(), 2);

        let taken = sched.take_pending();
        assert_eq!(taken.len(), 2);
        assert_eq!(sched.pending_len(), 0);
        assert_eq!(sched.total_ops(), 50);

        // failed submission puts records back ahead of newer arrivals
        sched.add_batch(&encoded(7), 1);
        sched.requeue_pending(taken);
        let again = sched.take_pending();
        assert_eq!(again[0].x[0], 9);
        assert_eq!(again[2].x[0], 7);
    }
}
