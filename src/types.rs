//! Shared types for the kangaroo solver
//!
//! Kangaroo type tags and the solved-key result structure.

use std::fmt;

use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

/// Walk type tag carried in byte 40 of every DP record.
///
/// Tames start near the tame offset and their accumulated distance is a
/// direct curve scalar; wilds start at offsets of the target point and
/// carry relative distances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum KangType {
    Tame = 0,
    Wild1 = 1,
    Wild2 = 2,
}

impl KangType {
    /// All three walk types, in tag order.
    pub const ALL: [KangType; 3] = [KangType::Tame, KangType::Wild1, KangType::Wild2];

    pub fn from_tag(tag: u8) -> Result<Self> {
        match tag {
            0 => Ok(KangType::Tame),
            1 => Ok(KangType::Wild1),
            2 => Ok(KangType::Wild2),
            other => Err(anyhow!("invalid kangaroo type tag {}", other)),
        }
    }

    pub fn tag(self) -> u8 {
        self as u8
    }

    pub fn is_wild(self) -> bool {
        !matches!(self, KangType::Tame)
    }
}

impl fmt::Display for KangType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            KangType::Tame => "TAME",
            KangType::Wild1 => "WILD1",
            KangType::Wild2 => "WILD2",
        };
        write!(f, "{}", name)
    }
}

/// Result of a completed solve.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Solution {
    /// Recovered private key, uppercase hex without leading zeros.
    pub private_key: String,
    /// Total group operations performed by all workers.
    pub total_ops: u64,
    /// Wall-clock seconds for the solve.
    pub time_seconds: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_round_trip() {
        for kind in KangType::ALL {
            assert_eq!(KangType::from_tag(kind.tag()).unwrap(), kind);
        }
        assert!(KangType::from_tag(3).is_err());
        assert!(KangType::from_tag(0xFF).is_err());
    }

    #[test]
    fn wild_predicate() {
        assert!(!KangType::Tame.is_wild());
        assert!(KangType::Wild1.is_wild());
        assert!(KangType::Wild2.is_wild());
    }
}
