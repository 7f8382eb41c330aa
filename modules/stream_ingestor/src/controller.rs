//! Stream ingestion controller
//!
//! Consumes the live block subscription one notification at a time and
//! applies each inside a single store batch: status updates, fork
//! resolution with displaced-node retirement, and the ancestor horizon
//! rewrite named by the annotator. Transport failures reconnect from the
//! persisted cursor; consistency violations abort so a corrupted
//! accumulator is never persisted.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use futures::StreamExt;
use thiserror::Error;
use tracing::{error, info, warn};

use lightproof_common::{
    AccumulatorRecord, Annotator, BlockEvent, BlockSource, ForkStep, PointFetch,
};
use lightproof_module_accumulator_store::AccumulatorStore;

use crate::bootstrap::BootstrapPlanner;
use crate::configuration::IngestorConfig;
use crate::retire::NodeRetirer;

#[derive(Debug, Error)]
pub enum IngestError {
    /// The annotator named an ancestor that is not in the store: the
    /// durable state itself is inconsistent, not a transient condition
    #[error("no record at height {height} to annotate from tip {tip}")]
    MissingAncestor { height: u64, tip: u64 },
}

pub struct StreamIngestor<S, F, A, R> {
    source: S,
    planner: BootstrapPlanner<F, A>,
    store: Arc<AccumulatorStore>,
    annotator: Arc<A>,
    retirer: R,
    config: IngestorConfig,
}

impl<S, F, A, R> StreamIngestor<S, F, A, R>
where
    S: BlockSource,
    F: PointFetch,
    A: Annotator,
    R: NodeRetirer,
{
    pub fn new(
        source: S,
        planner: BootstrapPlanner<F, A>,
        store: Arc<AccumulatorStore>,
        annotator: Arc<A>,
        retirer: R,
        config: IngestorConfig,
    ) -> Self {
        Self {
            source,
            planner,
            store,
            annotator,
            retirer,
            config,
        }
    }

    /// Run the ingestion loop until cancelled or a fatal error.
    ///
    /// `force_start` overrides start-height resolution for the first
    /// subscription only; reconnects always resume from the persisted
    /// cursor, never the in-memory position.
    pub async fn run(&self, force_start: Option<u64>) -> Result<()> {
        let mut force = force_start;
        loop {
            let start_block = match force.take() {
                Some(height) => height,
                None => self.resolve_start().await?,
            };
            info!(start_block, "starting block stream");

            let mut stream = match self.source.subscribe(start_block).await {
                Ok(stream) => stream,
                Err(e) if e.is_cancelled() => {
                    info!("stream manually cancelled");
                    return Ok(());
                }
                Err(e) => {
                    error!("cannot subscribe to block stream: {e}");
                    self.wait_reconnect().await;
                    continue;
                }
            };

            loop {
                match stream.next().await {
                    Some(Ok(event)) => self.process_event(event).await?,
                    Some(Err(e)) if e.is_cancelled() => {
                        info!("stream manually cancelled");
                        return Ok(());
                    }
                    Some(Err(e)) => {
                        error!("error in block stream: {e}");
                        break;
                    }
                    None => {
                        warn!("block stream ended");
                        break;
                    }
                }
            }

            // Close the connection before backing off
            drop(stream);
            self.wait_reconnect().await;
        }
    }

    async fn resolve_start(&self) -> Result<u64> {
        if let Some(resume) = self.planner.maybe_bootstrap().await? {
            return Ok(resume);
        }
        self.store.start_block(self.config.default_start_block)
    }

    async fn wait_reconnect(&self) {
        let delay = Duration::from_millis(self.config.reconnect_delay_ms);
        info!("reconnecting in {delay:?}");
        tokio::time::sleep(delay).await;
    }

    /// Apply one delivered notification atomically
    async fn process_event(&self, event: BlockEvent) -> Result<()> {
        match event.step {
            ForkStep::Irreversible => self.process_irreversible(event.block.number),
            ForkStep::New => self.process_new(event),
        }
    }

    fn process_irreversible(&self, number: u64) -> Result<()> {
        let mut batch = self.store.batch();
        batch.put_lib(number);
        batch.commit()?;

        if number % self.config.prune_interval == 0 {
            info!(lib = number, "LIB stored, pruning");
            self.store.prune()?;
        }
        Ok(())
    }

    fn process_new(&self, event: BlockEvent) -> Result<()> {
        let block = event.block;
        let mut batch = self.store.batch();
        batch.put_last_block_timestamp(&block.timestamp.to_iso_string());

        // Fork resolution: a prior branch already occupied this height.
        // Every pre-existing record counts as a displacement, identical
        // redeliveries included; the retire hook runs per node in the
        // displaced record's stored order before the overwrite.
        if let Some(displaced) = self.store.get_record(block.number)? {
            warn!(
                number = block.number,
                displaced_id = %displaced.id,
                "block already exists, retiring the forked block's active nodes"
            );
            for node in &displaced.nodes {
                self.retirer.retire(node);
            }
        }

        batch.put_record(
            block.number,
            &AccumulatorRecord::new(block.id.clone(), block.active_nodes.clone(), 0),
        )?;

        // Finalise the horizon of the one ancestor this block supersedes
        if let Some(edit) = self.annotator.annotate_live(block.number, &block.active_nodes) {
            let ancestor =
                self.store.get_record(edit.block_num)?.ok_or(IngestError::MissingAncestor {
                    height: edit.block_num,
                    tip: block.number,
                })?;
            batch.put_record(edit.block_num, &ancestor.with_alive_until(edit.alive_until))?;
        }

        batch.commit()?;
        Ok(())
    }
}
