//! Merkle annotator seam
//!
//! The annotator is a pure decision function over an accumulator state: in
//! live mode it names the single ancestor whose pruning horizon is
//! finalised by the arrival of a new tip, in bootstrap mode it names the
//! minimal ancestor set needed to reconstruct state from a given height.
//! The controller and planner only ever see this trait, so alternate
//! accumulator geometries can be substituted without touching them.

use crate::types::NodeHash;

/// Live-mode decision: the one ancestor record to finalise
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiveAnnotation {
    pub block_num: u64,
    pub alive_until: u64,
}

/// Bootstrap-mode requirement: an ancestor height with its precomputed horizon
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequiredBlock {
    pub block_num: u64,
    pub alive_until: u64,
}

pub trait Annotator: Send + Sync + 'static {
    /// Which single ancestor's horizon is finalised by block `tip_number`.
    /// `None` only when no ancestor exists (genesis edge).
    fn annotate_live(&self, tip_number: u64, active_nodes: &[NodeHash]) -> Option<LiveAnnotation>;

    /// Ordered minimal ancestor set the accumulator at `number` depends on.
    fn annotate_bootstrap(&self, number: u64, active_nodes: &[NodeHash]) -> Vec<RequiredBlock>;
}

/// Annotator for the append-only incremental Merkle accumulator.
///
/// The snapshot stored at height `k` is superseded once the subtree of
/// size `2^trailing_zeros(k)` containing leaf `k` completes, so its
/// horizon is `k + 2^trailing_zeros(k)`. The still-needed ancestors of
/// height `n` are exactly the heights where each active subtree root
/// completed, i.e. the strict prefix sums of the 1-bits of `n`.
#[derive(Debug, Default, Clone, Copy)]
pub struct IncrementalMerkleAnnotator;

fn horizon_of(height: u64) -> u64 {
    height + (1u64 << height.trailing_zeros())
}

impl Annotator for IncrementalMerkleAnnotator {
    fn annotate_live(&self, tip_number: u64, _active_nodes: &[NodeHash]) -> Option<LiveAnnotation> {
        let previous = tip_number.checked_sub(1)?;
        if previous == 0 {
            return None;
        }
        Some(LiveAnnotation {
            block_num: previous,
            alive_until: horizon_of(previous),
        })
    }

    fn annotate_bootstrap(&self, number: u64, _active_nodes: &[NodeHash]) -> Vec<RequiredBlock> {
        let mut required = Vec::new();
        let mut prefix = 0u64;
        for bit in (0..64).rev() {
            let subtree = 1u64 << bit;
            if number & subtree == 0 {
                continue;
            }
            prefix += subtree;
            if prefix != number {
                required.push(RequiredBlock {
                    block_num: prefix,
                    alive_until: horizon_of(prefix),
                });
            }
        }
        required
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ANNOTATOR: IncrementalMerkleAnnotator = IncrementalMerkleAnnotator;

    #[test]
    fn live_finalises_previous_height() {
        for tip in [3u64, 100, 4096, 150_000_001] {
            let edit = ANNOTATOR.annotate_live(tip, &[]).unwrap();
            assert_eq!(edit.block_num, tip - 1);
            assert!(edit.alive_until > edit.block_num);
        }
    }

    #[test]
    fn live_horizon_of_odd_height_is_next_block() {
        let edit = ANNOTATOR.annotate_live(8, &[]).unwrap();
        assert_eq!(edit.block_num, 7);
        assert_eq!(edit.alive_until, 8);
    }

    #[test]
    fn live_horizon_of_subtree_boundary() {
        // Height 4 (binary 100) stays needed until the size-4 subtree
        // merges at height 8
        let edit = ANNOTATOR.annotate_live(5, &[]).unwrap();
        assert_eq!(edit.block_num, 4);
        assert_eq!(edit.alive_until, 8);
    }

    #[test]
    fn live_has_no_ancestor_at_genesis() {
        assert_eq!(ANNOTATOR.annotate_live(0, &[]), None);
        assert_eq!(ANNOTATOR.annotate_live(1, &[]), None);
    }

    #[test]
    fn bootstrap_returns_prefix_sums() {
        // 22 = 10110b -> prefixes 16, 20 (22 itself excluded)
        let required = ANNOTATOR.annotate_bootstrap(22, &[]);
        let heights: Vec<u64> = required.iter().map(|b| b.block_num).collect();
        assert_eq!(heights, vec![16, 20]);
        assert_eq!(required[0].alive_until, 32);
        assert_eq!(required[1].alive_until, 24);
    }

    #[test]
    fn bootstrap_of_power_of_two_needs_nothing() {
        assert!(ANNOTATOR.annotate_bootstrap(16, &[]).is_empty());
    }

    #[test]
    fn bootstrap_set_matches_unpruned_ancestors() {
        // The required set must be exactly the heights below n whose
        // horizon is still beyond n
        for n in [6u64, 7, 22, 1000, 12345] {
            let required: Vec<u64> =
                ANNOTATOR.annotate_bootstrap(n, &[]).iter().map(|b| b.block_num).collect();
            let alive: Vec<u64> = (1..n).filter(|k| horizon_of(*k) > n).collect();
            assert_eq!(required, alive, "mismatch at height {n}");
        }
    }

    #[test]
    fn bootstrap_horizons_outlive_sync_height() {
        for block in ANNOTATOR.annotate_bootstrap(150_000_000, &[]) {
            assert!(block.alive_until > 150_000_000);
        }
    }
}
