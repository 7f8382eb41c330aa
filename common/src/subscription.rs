//! Block stream seams consumed by the ingestion controller
//!
//! Delivery is modelled as a plain stream of `{block, step}` items so the
//! controller can process one item fully before the next, independent of
//! the transport behind it.

use std::future::Future;

use futures::stream::BoxStream;
use thiserror::Error;

use crate::types::{Block, ForkStep};

/// One delivered stream notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockEvent {
    pub block: Block,
    pub step: ForkStep,
}

#[derive(Debug, Error)]
pub enum SourceError {
    /// Caller-initiated cancellation, terminal but not a failure
    #[error("stream cancelled")]
    Cancelled,

    #[error("stream transport failure: {0}")]
    Transport(String),

    #[error("cannot decode block payload: {0}")]
    Decode(String),
}

impl SourceError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

pub type EventStream = BoxStream<'static, Result<BlockEvent, SourceError>>;

/// A subscribable source of live block notifications
pub trait BlockSource: Send + Sync + 'static {
    /// Subscribe to NEW + IRREVERSIBLE notifications for every height from
    /// `start_block` onward, in upstream emission order.
    fn subscribe(
        &self,
        start_block: u64,
    ) -> impl Future<Output = Result<EventStream, SourceError>> + Send;
}

/// A one-shot fetcher for a single block at a known height
pub trait PointFetch: Send + Sync + 'static {
    /// Fetch the irreversible block at `height`, optionally from the
    /// alternate (bootstrap) endpoint. `None` uniformly signals retry
    /// exhaustion or cancellation.
    fn fetch_irreversible(
        &self,
        height: u64,
        alternate: bool,
    ) -> impl Future<Output = Option<Block>> + Send;
}
