use futures::StreamExt;
use prost::Message;
use tonic::{
    transport::{Channel, ClientTlsConfig},
    Code, Status,
};
use tracing::debug;

use lightproof_common::{Block, BlockEvent, BlockSource, BlockTimestamp, EventStream, ForkStep, SourceError};

use crate::configuration::FirehoseConfig;
use crate::proto::{self, stream_client::StreamClient};

/// Client for the upstream firehose service
#[derive(Clone)]
pub struct FirehoseClient {
    config: FirehoseConfig,
}

impl FirehoseClient {
    pub fn new(config: FirehoseConfig) -> Self {
        Self { config }
    }

    pub(crate) async fn connect(
        &self,
        alternate: bool,
    ) -> Result<StreamClient<Channel>, SourceError> {
        let (address, insecure) = self.config.upstream(alternate);
        debug!(address, insecure, "connecting to firehose");

        let mut endpoint = Channel::from_shared(address.to_string())
            .map_err(|e| SourceError::Transport(format!("invalid endpoint {address}: {e}")))?;
        if !insecure {
            endpoint = endpoint
                .tls_config(ClientTlsConfig::new().with_native_roots())
                .map_err(|e| SourceError::Transport(e.to_string()))?;
        }
        let channel = endpoint
            .connect()
            .await
            .map_err(|e| SourceError::Transport(e.to_string()))?;

        Ok(StreamClient::new(channel).max_decoding_message_size(self.config.max_message_bytes))
    }
}

impl BlockSource for FirehoseClient {
    async fn subscribe(&self, start_block: u64) -> Result<EventStream, SourceError> {
        let mut client = self.connect(false).await?;
        let request = proto::BlocksRequest {
            start_block_num: start_block as i64,
            stop_block_num: 0,
            fork_steps: vec![
                proto::ForkStep::StepNew as i32,
                proto::ForkStep::StepIrreversible as i32,
            ],
            include_filter_expr: String::new(),
        };

        let stream = client
            .blocks(request)
            .await
            .map_err(status_to_source)?
            .into_inner();

        Ok(stream
            .map(|item| item.map_err(status_to_source).and_then(decode_response))
            .boxed())
    }
}

pub(crate) fn status_to_source(status: Status) -> SourceError {
    if status.code() == Code::Cancelled {
        SourceError::Cancelled
    } else {
        SourceError::Transport(format!("{}: {}", status.code(), status.message()))
    }
}

pub(crate) fn decode_response(response: proto::BlockResponse) -> Result<BlockEvent, SourceError> {
    let step = match proto::ForkStep::try_from(response.step) {
        Ok(proto::ForkStep::StepNew) => ForkStep::New,
        Ok(proto::ForkStep::StepIrreversible) => ForkStep::Irreversible,
        other => {
            return Err(SourceError::Decode(format!(
                "unsupported fork step {other:?}"
            )))
        }
    };

    let payload = response
        .block
        .ok_or_else(|| SourceError::Decode("response without block payload".to_string()))?;
    let raw = proto::Block::decode(payload.value.as_slice())
        .map_err(|e| SourceError::Decode(e.to_string()))?;

    let timestamp = raw
        .header
        .and_then(|h| h.timestamp)
        .map(|ts| BlockTimestamp {
            seconds: ts.seconds,
            nanos: ts.nanos,
        })
        .unwrap_or_default();
    let active_nodes = raw.blockroot_merkle.map(|m| m.active_nodes).unwrap_or_default();

    Ok(BlockEvent {
        block: Block {
            number: raw.number,
            id: raw.id,
            timestamp,
            active_nodes,
        },
        step,
    })
}
