//! gRPC firehose client for the Lightproof indexer
//!
//! Wraps the upstream block stream service behind the `BlockSource` and
//! `PointFetch` seams: a live subscription for the ingestion controller
//! and a bounded-retry single-block fetcher used standalone and by the
//! bootstrap planner.

pub mod proto {
    tonic::include_proto!("lightproof.firehose.v1");
}

mod client;
mod configuration;
mod fetcher;

#[cfg(test)]
mod testing;

pub use client::FirehoseClient;
pub use configuration::FirehoseConfig;
pub use fetcher::{ClientNotice, StreamFilter, DEFAULT_RETRY_BUDGET};
