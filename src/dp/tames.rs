//! Tame-table preload
//!
//! An optional binary file of 41-byte DP records can seed the index at the
//! start of a solve. Every preloaded record is indexed as TAME regardless
//! of its stored tag, matching how generated tame tables are produced.

use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use log::info;

use crate::dp::codec::{DpRecord, DP_RECORD_SIZE};
use crate::dp::index::DpIndex;
use crate::types::KangType;

/// Load a tame file into the index. Returns the number of records stored
/// (duplicates by x-prefix are skipped).
pub fn preload(path: &Path, index: &DpIndex) -> Result<usize> {
    let bytes = fs::read(path).with_context(|| format!("reading tames file {:?}", path))?;
    if bytes.len() % DP_RECORD_SIZE != 0 {
        return Err(anyhow!(
            "tames file {:?} is not a whole number of {}-byte records",
            path,
            DP_RECORD_SIZE
        ));
    }
    let mut stored = 0usize;
    for chunk in bytes.chunks_exact(DP_RECORD_SIZE) {
        let mut rec = DpRecord::decode(chunk)
            .with_context(|| format!("corrupt record in tames file {:?}", path))?;
        rec.kang = KangType::Tame;
        if index.find_or_insert(rec).is_none() {
            stored += 1;
        }
    }
    info!("preloaded {} tame DPs from {:?}", stored, path);
    Ok(stored)
}
