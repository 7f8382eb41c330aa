//! Lightproof stream ingestor module
//!
//! The long-running ingestion controller: owns the live block
//! subscription, resolves forks, drives transactional accumulator
//! writes and pruning, and bootstraps an empty store from a minimal
//! ancestor set so ingestion can start mid-chain.

pub mod bootstrap;
pub mod configuration;
pub mod controller;
pub mod retire;

#[cfg(test)]
mod testing;

pub use bootstrap::{BootstrapError, BootstrapPlanner};
pub use configuration::IngestorConfig;
pub use controller::{IngestError, StreamIngestor};
pub use retire::{NodeRetirer, NoopRetirer, RetiredNodeLog};
