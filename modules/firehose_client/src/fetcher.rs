//! Retrying point fetcher
//!
//! Issues a one-shot, bounded-retry request for exactly one block. The
//! connection is dropped as soon as the first item arrives. Callers get
//! `None` as the uniform failure signal; an optional channel receives a
//! structured notice on retry exhaustion.

use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, error, info};

use lightproof_common::{Block, BlockEvent, ForkStep, PointFetch, SourceError};

use crate::client::{decode_response, status_to_source, FirehoseClient};
use crate::proto;

pub const DEFAULT_RETRY_BUDGET: u32 = 10;

const RETRY_STEP: Duration = Duration::from_millis(100);

/// Height/step filter for a one-item subscription
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamFilter {
    pub start_block: u64,

    /// Inclusive stop height; `None` leaves the subscription unbounded
    pub stop_block: Option<u64>,

    pub steps: Vec<ForkStep>,

    /// Target the alternate (bootstrap) endpoint
    pub alternate: bool,
}

impl StreamFilter {
    /// Irreversible-only filter pinned to a single height
    pub fn irreversible_at(height: u64, alternate: bool) -> Self {
        Self {
            start_block: height,
            stop_block: Some(height),
            steps: vec![ForkStep::Irreversible],
            alternate,
        }
    }

    fn to_request(&self) -> proto::BlocksRequest {
        proto::BlocksRequest {
            start_block_num: self.start_block as i64,
            stop_block_num: self.stop_block.unwrap_or(0),
            fork_steps: self
                .steps
                .iter()
                .map(|step| match step {
                    ForkStep::New => proto::ForkStep::StepNew as i32,
                    ForkStep::Irreversible => proto::ForkStep::StepIrreversible as i32,
                })
                .collect(),
            include_filter_expr: String::new(),
        }
    }
}

/// Best-effort side notification for irrecoverable fetch failures
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientNotice {
    Error { error: String },
}

impl FirehoseClient {
    /// Fetch exactly one block matching `filter`.
    ///
    /// Transient transport failures are retried up to `retry_budget`
    /// times with linearly growing waits (0.1s, 0.2s, ... capped by the
    /// budget). Cancellation short-circuits with no retry and no notice.
    pub async fn fetch_one(
        &self,
        filter: &StreamFilter,
        retry_budget: u32,
        notify: Option<&mpsc::UnboundedSender<ClientNotice>>,
    ) -> Option<BlockEvent> {
        let mut remaining = retry_budget;
        loop {
            match self.try_fetch(filter).await {
                Ok(event) => return Some(event),
                Err(SourceError::Cancelled) => {
                    info!("stream manually cancelled");
                    return None;
                }
                Err(e) if remaining > 0 => {
                    let wait = RETRY_STEP * (retry_budget + 1 - remaining);
                    debug!(remaining, "fetch failed ({e}), retrying in {wait:?}");
                    tokio::time::sleep(wait).await;
                    remaining -= 1;
                }
                Err(e) => {
                    error!(
                        start_block = filter.start_block,
                        "cannot fetch block: {e}"
                    );
                    if let Some(channel) = notify {
                        let _ = channel.send(ClientNotice::Error {
                            error: "Could not stream block from firehose".to_string(),
                        });
                    }
                    return None;
                }
            }
        }
    }

    async fn try_fetch(&self, filter: &StreamFilter) -> Result<BlockEvent, SourceError> {
        let mut client = self.connect(filter.alternate).await?;
        let mut stream = client
            .blocks(filter.to_request())
            .await
            .map_err(status_to_source)?
            .into_inner();

        // Dropping the stream on return closes the connection
        match stream.message().await.map_err(status_to_source)? {
            Some(response) => decode_response(response),
            None => Err(SourceError::Transport(
                "stream closed without delivering a block".to_string(),
            )),
        }
    }
}

impl PointFetch for FirehoseClient {
    async fn fetch_irreversible(&self, height: u64, alternate: bool) -> Option<Block> {
        self.fetch_one(
            &StreamFilter::irreversible_at(height, alternate),
            DEFAULT_RETRY_BUDGET,
            None,
        )
        .await
        .map(|event| event.block)
    }
}
