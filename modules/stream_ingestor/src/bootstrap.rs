//! Tiny bootstrap planner
//!
//! Populates an empty store with the minimal ancestor set required to
//! keep future horizon annotations and pruning correct, so live
//! ingestion can start from a recent height instead of replaying from
//! genesis. Ancestors are fetched from the alternate endpoint so the
//! live endpoint's state is untouched.

use std::sync::Arc;

use anyhow::Result;
use thiserror::Error;
use tracing::{debug, info};

use lightproof_common::{AccumulatorRecord, Annotator, PointFetch};
use lightproof_module_accumulator_store::AccumulatorStore;

use crate::configuration::IngestorConfig;

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("sync block {height} could not be fetched from the boot endpoint")]
    SyncBlockUnavailable { height: u64 },

    #[error("required ancestor block {height} could not be fetched")]
    MissingAncestor { height: u64 },

    #[error("block {height} carries no accumulator nodes")]
    EmptyAccumulator { height: u64 },
}

pub struct BootstrapPlanner<F, A> {
    fetcher: F,
    annotator: Arc<A>,
    store: Arc<AccumulatorStore>,
    config: IngestorConfig,
}

impl<F: PointFetch, A: Annotator> BootstrapPlanner<F, A> {
    pub fn new(
        fetcher: F,
        annotator: Arc<A>,
        store: Arc<AccumulatorStore>,
        config: IngestorConfig,
    ) -> Self {
        Self {
            fetcher,
            annotator,
            store,
            config,
        }
    }

    /// Bootstrap the store if it is empty and a sync height is
    /// configured. Returns the height live ingestion should resume from,
    /// or `None` when no bootstrap was performed.
    ///
    /// Any missing ancestor aborts the whole attempt before the first
    /// write, so a failed bootstrap leaves the store empty and
    /// retryable.
    pub async fn maybe_bootstrap(&self) -> Result<Option<u64>> {
        let Some(sync_height) = self.config.sync_height else {
            return Ok(None);
        };
        if self.store.range()?.first_block.is_some() {
            return Ok(None);
        }

        info!(
            sync_height,
            cutoff = self.config.pruning_cutoff,
            "bootstrapping tiny from sync height"
        );

        let sync_block = self
            .fetcher
            .fetch_irreversible(sync_height, true)
            .await
            .ok_or(BootstrapError::SyncBlockUnavailable {
                height: sync_height,
            })?;

        let required =
            self.annotator.annotate_bootstrap(sync_block.number, &sync_block.active_nodes);
        debug!(count = required.len(), "ancestor blocks required");

        // Fan out the ancestor fetches, join before any write
        let fetches =
            required.iter().map(|needed| self.fetcher.fetch_irreversible(needed.block_num, true));
        let results = futures::future::join_all(fetches).await;

        let mut ancestors = Vec::with_capacity(required.len());
        for (needed, fetched) in required.iter().zip(results) {
            let block = fetched.ok_or(BootstrapError::MissingAncestor {
                height: needed.block_num,
            })?;
            // Only the leading node is needed to reconstruct horizons
            let first_node =
                block.active_nodes.first().cloned().ok_or(BootstrapError::EmptyAccumulator {
                    height: block.number,
                })?;
            ancestors.push((
                block.number,
                AccumulatorRecord::new(block.id, vec![first_node], needed.alive_until),
            ));
        }

        let mut batch = self.store.batch();
        batch.put_record(
            sync_block.number,
            &AccumulatorRecord::new(sync_block.id.clone(), sync_block.active_nodes.clone(), 0),
        )?;
        for (height, record) in &ancestors {
            batch.put_record(*height, record)?;
        }
        batch.put_lib(sync_block.number);
        batch.commit()?;

        info!(records = ancestors.len() + 1, "finished bootstrapping");
        Ok(Some(sync_block.number + 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{block, MapFetcher, ScriptedAnnotator};
    use lightproof_common::RequiredBlock;

    fn temp_store() -> (tempfile::TempDir, Arc<AccumulatorStore>) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(AccumulatorStore::open(dir.path().join("db")).unwrap());
        (dir, store)
    }

    fn sync_config(sync_height: Option<u64>) -> IngestorConfig {
        IngestorConfig {
            sync_height,
            ..IngestorConfig::default()
        }
    }

    fn annotator_requiring(required: Vec<RequiredBlock>) -> Arc<ScriptedAnnotator> {
        Arc::new(ScriptedAnnotator::default().with_bootstrap(required))
    }

    #[tokio::test]
    async fn no_op_without_sync_height() {
        let (_dir, store) = temp_store();
        let planner = BootstrapPlanner::new(
            MapFetcher::default(),
            annotator_requiring(vec![]),
            store,
            sync_config(None),
        );
        assert_eq!(planner.maybe_bootstrap().await.unwrap(), None);
    }

    #[tokio::test]
    async fn no_op_when_store_already_populated() {
        let (_dir, store) = temp_store();
        let mut batch = store.batch();
        batch.put_record(5, &AccumulatorRecord::new("aa05", vec![vec![1; 32]], 0)).unwrap();
        batch.commit().unwrap();

        let planner = BootstrapPlanner::new(
            MapFetcher::default(),
            annotator_requiring(vec![]),
            store,
            sync_config(Some(22)),
        );
        assert_eq!(planner.maybe_bootstrap().await.unwrap(), None);
    }

    #[tokio::test]
    async fn writes_exactly_the_minimal_ancestor_set() {
        let (_dir, store) = temp_store();
        let fetcher = MapFetcher::default()
            .with_block(block(22, "aa16", vec![vec![0xa; 32], vec![0xb; 32], vec![0xc; 32]]))
            .with_block(block(16, "aa10", vec![vec![0x1; 32], vec![0x2; 32]]))
            .with_block(block(20, "aa14", vec![vec![0x3; 32], vec![0x4; 32]]));
        let requests = fetcher.requests.clone();

        let planner = BootstrapPlanner::new(
            fetcher,
            annotator_requiring(vec![
                RequiredBlock {
                    block_num: 16,
                    alive_until: 32,
                },
                RequiredBlock {
                    block_num: 20,
                    alive_until: 24,
                },
            ]),
            store.clone(),
            sync_config(Some(22)),
        );

        assert_eq!(planner.maybe_bootstrap().await.unwrap(), Some(23));

        // Sync block stored in full with an open horizon
        let sync = store.get_record(22).unwrap().unwrap();
        assert_eq!(sync.id, "aa16");
        assert_eq!(sync.nodes.len(), 3);
        assert_eq!(sync.alive_until, 0);

        // Ancestors truncated to their first node, horizons precomputed
        let a16 = store.get_record(16).unwrap().unwrap();
        assert_eq!(a16.nodes, vec![vec![0x1; 32]]);
        assert_eq!(a16.alive_until, 32);
        let a20 = store.get_record(20).unwrap().unwrap();
        assert_eq!(a20.nodes, vec![vec![0x3; 32]]);
        assert_eq!(a20.alive_until, 24);

        // Nothing else, lib at the sync height
        let range = store.range().unwrap();
        assert_eq!(range.first_block, Some(16));
        assert_eq!(range.last_block, Some(22));
        assert_eq!(store.get_record(17).unwrap(), None);
        assert_eq!(store.lib().unwrap(), Some(22));

        // Every fetch targeted the alternate endpoint
        let requests = requests.lock().unwrap();
        assert!(requests.iter().all(|(_, alternate)| *alternate));
        assert_eq!(requests.len(), 3);
    }

    #[tokio::test]
    async fn aborts_on_missing_ancestor_leaving_store_empty() {
        let (_dir, store) = temp_store();
        let fetcher = MapFetcher::default()
            .with_block(block(22, "aa16", vec![vec![0xa; 32]]))
            .with_block(block(16, "aa10", vec![vec![0x1; 32]]));
        // block 20 missing: its fetch budget is exhausted upstream

        let planner = BootstrapPlanner::new(
            fetcher,
            annotator_requiring(vec![
                RequiredBlock {
                    block_num: 16,
                    alive_until: 32,
                },
                RequiredBlock {
                    block_num: 20,
                    alive_until: 24,
                },
            ]),
            store.clone(),
            sync_config(Some(22)),
        );

        assert!(planner.maybe_bootstrap().await.is_err());
        assert_eq!(store.range().unwrap().first_block, None);
        assert_eq!(store.lib().unwrap(), None);
    }

    #[tokio::test]
    async fn aborts_when_sync_block_unavailable() {
        let (_dir, store) = temp_store();
        let planner = BootstrapPlanner::new(
            MapFetcher::default(),
            annotator_requiring(vec![]),
            store.clone(),
            sync_config(Some(22)),
        );
        assert!(planner.maybe_bootstrap().await.is_err());
        assert_eq!(store.range().unwrap().first_block, None);
    }
}
