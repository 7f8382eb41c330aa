//! Displacement hook for forked-out accumulator nodes
//!
//! Invoked once per displaced node, in the displaced record's stored
//! order, before a fork replacement overwrites a height. Fire-and-forget
//! from the controller's perspective.

use std::sync::Arc;

use tracing::error;

use lightproof_module_accumulator_store::AccumulatorStore;

pub trait NodeRetirer: Send + Sync + 'static {
    fn retire(&self, node: &[u8]);
}

/// Discards displacement notifications
pub struct NoopRetirer;

impl NodeRetirer for NoopRetirer {
    fn retire(&self, _node: &[u8]) {}
}

/// Durable displacement bookkeeping in the store's retired-node keyspace
pub struct RetiredNodeLog {
    store: Arc<AccumulatorStore>,
}

impl RetiredNodeLog {
    pub fn new(store: Arc<AccumulatorStore>) -> Self {
        Self { store }
    }
}

impl NodeRetirer for RetiredNodeLog {
    fn retire(&self, node: &[u8]) {
        if let Err(e) = self.store.log_retired_node(node) {
            error!(node = hex::encode(node), "cannot log retired node: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retired_node_log_is_durable() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(AccumulatorStore::open(dir.path().join("db")).unwrap());
        let log = RetiredNodeLog::new(store.clone());

        let node = vec![0xcd; 32];
        log.retire(&node);
        log.retire(&node);

        assert_eq!(store.retired_count(&node).unwrap(), 2);
    }
}
