//! Core type definitions for the Lightproof indexer

use chrono::{DateTime, Utc};

/// A single active node hash of the incremental Merkle accumulator
pub type NodeHash = Vec<u8>;

/// Fork step of a delivered block notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ForkStep {
    /// Tentatively produced, may still be displaced by a fork
    New,

    /// Finalised, will never be reorganised away
    Irreversible,
}

/// Block wall-clock timestamp as delivered on the wire
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BlockTimestamp {
    pub seconds: i64,

    /// Non-zero marks the half-interval block of a sub-second producer
    pub nanos: i32,
}

impl BlockTimestamp {
    /// ISO-8601-like string with millisecond resolution. Blocks flagged
    /// with a non-zero fractional field render as `.500` so the two
    /// half-interval cases stay distinguishable.
    pub fn to_iso_string(&self) -> String {
        let dt = DateTime::from_timestamp(self.seconds, 0).unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
        let millis = if self.nanos != 0 { 500 } else { 0 };
        format!("{}.{:03}", dt.format("%Y-%m-%dT%H:%M:%S"), millis)
    }
}

/// A decoded chain block as delivered by the block stream
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Block {
    /// Height, monotonic on the chain but not in arrival order
    pub number: u64,

    /// Chain-specific block id, hex
    pub id: String,

    /// Producer wall-clock timestamp
    pub timestamp: BlockTimestamp,

    /// Accumulator active-node list as of this height
    pub active_nodes: Vec<NodeHash>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_renders_whole_second() {
        let ts = BlockTimestamp {
            seconds: 1700000000,
            nanos: 0,
        };
        assert_eq!(ts.to_iso_string(), "2023-11-14T22:13:20.000");
    }

    #[test]
    fn timestamp_renders_half_interval() {
        let ts = BlockTimestamp {
            seconds: 1700000000,
            nanos: 500_000_000,
        };
        assert_eq!(ts.to_iso_string(), "2023-11-14T22:13:20.500");
    }

    #[test]
    fn timestamp_survives_out_of_range_seconds() {
        let ts = BlockTimestamp {
            seconds: i64::MAX,
            nanos: 0,
        };
        assert_eq!(ts.to_iso_string(), "1970-01-01T00:00:00.000");
    }
}
