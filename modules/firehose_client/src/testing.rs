//! In-process mock firehose server for client tests

use std::sync::{
    atomic::{AtomicU32, Ordering},
    Arc, Mutex,
};
use std::time::Instant;

use prost::Message;
use tokio::sync::mpsc;
use tokio_stream::wrappers::{ReceiverStream, TcpListenerStream};
use tonic::{transport::Server, Request, Response, Status};

use crate::proto::{
    self,
    stream_server::{Stream as StreamService, StreamServer},
};

#[derive(Default)]
pub struct MockStream {
    /// Fail this many leading attempts with `unavailable`
    fail_times: u32,
    /// Items delivered once an attempt gets through
    items: Vec<Result<proto::BlockResponse, Status>>,
    pub attempts: Arc<AtomicU32>,
    pub attempt_times: Arc<Mutex<Vec<Instant>>>,
}

impl MockStream {
    pub fn failing_times(mut self, fail_times: u32) -> Self {
        self.fail_times = fail_times;
        self
    }

    pub fn with_items(mut self, items: Vec<Result<proto::BlockResponse, Status>>) -> Self {
        self.items = items;
        self
    }
}

#[tonic::async_trait]
impl StreamService for MockStream {
    type BlocksStream = ReceiverStream<Result<proto::BlockResponse, Status>>;

    async fn blocks(
        &self,
        _request: Request<proto::BlocksRequest>,
    ) -> Result<Response<Self::BlocksStream>, Status> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        self.attempt_times.lock().unwrap().push(Instant::now());

        if attempt < self.fail_times {
            return Err(Status::unavailable("upstream flake"));
        }

        let (tx, rx) = mpsc::channel(self.items.len().max(1));
        for item in self.items.clone() {
            let _ = tx.try_send(item);
        }
        Ok(Response::new(ReceiverStream::new(rx)))
    }
}

impl Clone for MockStream {
    fn clone(&self) -> Self {
        Self {
            fail_times: self.fail_times,
            items: self.items.clone(),
            attempts: self.attempts.clone(),
            attempt_times: self.attempt_times.clone(),
        }
    }
}

/// Serve the mock on an ephemeral port, returning its endpoint URL
pub async fn spawn_server(mock: MockStream) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        Server::builder()
            .add_service(StreamServer::new(mock))
            .serve_with_incoming(TcpListenerStream::new(listener))
            .await
            .unwrap();
    });
    format!("http://{addr}")
}

/// Encoded block response as the upstream would send it
pub fn block_response(
    number: u64,
    id: &str,
    nanos: i32,
    step: proto::ForkStep,
) -> proto::BlockResponse {
    let block = proto::Block {
        number,
        id: id.to_string(),
        header: Some(proto::BlockHeader {
            timestamp: Some(proto::BlockTimestamp {
                seconds: 1_700_000_000 + number as i64,
                nanos,
            }),
        }),
        blockroot_merkle: Some(proto::IncrementalMerkle {
            node_count: number,
            active_nodes: vec![vec![0xaa; 32], vec![0xbb; 32]],
        }),
    };
    proto::BlockResponse {
        block: Some(prost_types::Any {
            type_url: "type.googleapis.com/lightproof.firehose.v1.Block".to_string(),
            value: block.encode_to_vec(),
        }),
        step: step as i32,
    }
}
