//! Persistence gateway for the accumulator indexer
//!
//! One fjall database holding three keyspaces: `records` (height keyed,
//! big-endian, one accumulator record per height), `status` (resume
//! cursor and latest block timestamp) and `retired-nodes` (displaced
//! hashes logged on fork replacement). All multi-key mutations go through
//! a single write batch so a notification either commits fully or not at
//! all.

use std::{path::PathBuf, sync::Arc};

use anyhow::Result;
use config::Config;
use fjall::{Database, Keyspace, OwnedWriteBatch};
use tracing::debug;

use lightproof_common::AccumulatorRecord;

const DEFAULT_DATABASE_PATH: &str = "lightproof-db";
const RECORDS_KEYSPACE: &str = "records";
const STATUS_KEYSPACE: &str = "status";
const RETIRED_NODES_KEYSPACE: &str = "retired-nodes";

const STATUS_LIB: &[u8] = b"lib";
const STATUS_LAST_BLOCK_TIMESTAMP: &[u8] = b"last_block_timestamp";

/// First and last stored record heights
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreRange {
    pub first_block: Option<u64>,
    pub last_block: Option<u64>,
}

pub struct AccumulatorStore {
    database: Database,
    records: Keyspace,
    status: Keyspace,
    retired_nodes: Keyspace,
}

impl AccumulatorStore {
    pub fn new(config: Arc<Config>) -> Result<Self> {
        let path = config
            .get_string("database-path")
            .unwrap_or_else(|_| DEFAULT_DATABASE_PATH.to_string());
        Self::open(PathBuf::from(path))
    }

    pub fn open(path: PathBuf) -> Result<Self> {
        let database = Database::builder(&path).open()?;
        let records = database.keyspace(RECORDS_KEYSPACE, fjall::KeyspaceCreateOptions::default)?;
        let status = database.keyspace(STATUS_KEYSPACE, fjall::KeyspaceCreateOptions::default)?;
        let retired_nodes =
            database.keyspace(RETIRED_NODES_KEYSPACE, fjall::KeyspaceCreateOptions::default)?;

        Ok(Self {
            database,
            records,
            status,
            retired_nodes,
        })
    }

    pub fn get_record(&self, height: u64) -> Result<Option<AccumulatorRecord>> {
        let Some(bytes) = self.records.get(height.to_be_bytes())? else {
            return Ok(None);
        };
        Ok(Some(AccumulatorRecord::from_bytes(&bytes)?))
    }

    /// Latest confirmed-irreversible height, if any has been stored yet
    pub fn lib(&self) -> Result<Option<u64>> {
        let Some(bytes) = self.status.get(STATUS_LIB)? else {
            return Ok(None);
        };
        Ok(Some(decode_height(bytes.as_ref())?))
    }

    pub fn last_block_timestamp(&self) -> Result<Option<String>> {
        let Some(bytes) = self.status.get(STATUS_LAST_BLOCK_TIMESTAMP)? else {
            return Ok(None);
        };
        Ok(Some(String::from_utf8(bytes.as_ref().to_vec())?))
    }

    /// Resume cursor: one past the persisted LIB, or `default_start` when
    /// the status store is still empty
    pub fn start_block(&self, default_start: u64) -> Result<u64> {
        Ok(self.lib()?.map(|lib| lib + 1).unwrap_or(default_start))
    }

    pub fn range(&self) -> Result<StoreRange> {
        let first_block = match self.records.iter().next() {
            Some(entry) => Some(decode_height(entry.key()?.as_ref())?),
            None => None,
        };
        let last_block = match self.records.iter().next_back() {
            Some(entry) => Some(decode_height(entry.key()?.as_ref())?),
            None => None,
        };
        Ok(StoreRange {
            first_block,
            last_block,
        })
    }

    /// Open an atomic write scope over records and status
    pub fn batch(&self) -> StoreBatch<'_> {
        StoreBatch {
            store: self,
            batch: self.database.batch(),
        }
    }

    /// Remove every record whose horizon the persisted LIB has reached.
    /// Records with an undetermined horizon (`alive_until == 0`) are never
    /// touched. Returns the number of records removed.
    pub fn prune(&self) -> Result<usize> {
        let Some(lib) = self.lib()? else {
            return Ok(0);
        };

        let mut batch = self.database.batch();
        let mut removed = 0usize;
        for entry in self.records.iter() {
            let (key, value) = entry.into_inner()?;
            let record = AccumulatorRecord::from_bytes(value.as_ref())?;
            if record.alive_until > 0 && record.alive_until <= lib {
                batch.remove(&self.records, key.as_ref());
                removed += 1;
            }
        }
        if removed > 0 {
            batch.commit()?;
        }

        debug!(lib, removed, "pruned accumulator records");
        Ok(removed)
    }

    /// Append a displaced node hash to the retired-node log. Invoked per
    /// node on fork replacement; the value is the displacement count so
    /// repeated retirements of the same hash stay visible.
    pub fn log_retired_node(&self, node: &[u8]) -> Result<()> {
        let count = match self.retired_nodes.get(node)? {
            Some(bytes) => decode_height(bytes.as_ref())? + 1,
            None => 1,
        };
        let mut batch = self.database.batch();
        batch.insert(&self.retired_nodes, node, count.to_be_bytes());
        batch.commit()?;
        Ok(())
    }

    pub fn retired_count(&self, node: &[u8]) -> Result<u64> {
        match self.retired_nodes.get(node)? {
            Some(bytes) => decode_height(bytes.as_ref()),
            None => Ok(0),
        }
    }
}

fn decode_height(bytes: &[u8]) -> Result<u64> {
    let bytes: [u8; 8] = bytes
        .try_into()
        .map_err(|_| anyhow::anyhow!("malformed height key of {} bytes", bytes.len()))?;
    Ok(u64::from_be_bytes(bytes))
}

/// Buffered writes applied atomically on commit
pub struct StoreBatch<'a> {
    store: &'a AccumulatorStore,
    batch: OwnedWriteBatch,
}

impl StoreBatch<'_> {
    pub fn put_record(&mut self, height: u64, record: &AccumulatorRecord) -> Result<()> {
        self.batch.insert(
            &self.store.records,
            height.to_be_bytes(),
            record.to_bytes()?,
        );
        Ok(())
    }

    pub fn put_lib(&mut self, height: u64) {
        self.batch.insert(&self.store.status, STATUS_LIB, height.to_be_bytes());
    }

    pub fn put_last_block_timestamp(&mut self, timestamp: &str) {
        self.batch.insert(
            &self.store.status,
            STATUS_LAST_BLOCK_TIMESTAMP,
            timestamp.as_bytes(),
        );
    }

    pub fn commit(self) -> Result<()> {
        self.batch.commit()?;
        Ok(())
    }
}
