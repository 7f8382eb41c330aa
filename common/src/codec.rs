//! Binary codec for stored accumulator records
//!
//! Records are CBOR arrays of `[id, [node, ...], alive_until]` so the
//! layout stays stable across schema-free keyspaces.

use anyhow::Result;
use minicbor::{decode, encode, Decode, Decoder, Encode, Encoder};

use crate::types::NodeHash;

/// One stored accumulator snapshot, keyed by height in the record store
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct AccumulatorRecord {
    /// Block id at this height, used for identity and fork detection
    pub id: String,

    /// Active-node list at write time; bootstrap-reconstructed ancestors
    /// carry a single node only
    pub nodes: Vec<NodeHash>,

    /// Height past which this record is prunable; zero while the horizon
    /// is still undetermined
    pub alive_until: u64,
}

impl AccumulatorRecord {
    pub fn new(id: impl Into<String>, nodes: Vec<NodeHash>, alive_until: u64) -> Self {
        Self {
            id: id.into(),
            nodes,
            alive_until,
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        minicbor::encode(self, &mut bytes)?;
        Ok(bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(minicbor::decode(bytes)?)
    }

    /// Copy of this record with only the horizon changed
    pub fn with_alive_until(&self, alive_until: u64) -> Self {
        Self {
            id: self.id.clone(),
            nodes: self.nodes.clone(),
            alive_until,
        }
    }
}

impl<C> Encode<C> for AccumulatorRecord {
    fn encode<W: encode::Write>(
        &self,
        e: &mut Encoder<W>,
        _ctx: &mut C,
    ) -> Result<(), encode::Error<W::Error>> {
        e.array(3)?;
        e.str(&self.id)?;
        e.array(self.nodes.len() as u64)?;
        for node in &self.nodes {
            e.bytes(node)?;
        }
        e.u64(self.alive_until)?;
        Ok(())
    }
}

impl<'b, C> Decode<'b, C> for AccumulatorRecord {
    fn decode(d: &mut Decoder<'b>, _ctx: &mut C) -> Result<Self, decode::Error> {
        match d.array()? {
            Some(3) => (),
            _ => return Err(decode::Error::message("expected 3-element record array")),
        }
        let id = d.str()?.to_string();
        let count = d
            .array()?
            .ok_or_else(|| decode::Error::message("expected definite node list"))?;
        let mut nodes = Vec::with_capacity(count as usize);
        for _ in 0..count {
            nodes.push(d.bytes()?.to_vec());
        }
        let alive_until = d.u64()?;
        Ok(Self {
            id,
            nodes,
            alive_until,
        })
    }
}
