//! Shared scripted doubles for controller and planner tests

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use futures::StreamExt;

use lightproof_common::{
    Annotator, Block, BlockEvent, BlockSource, BlockTimestamp, EventStream, ForkStep,
    LiveAnnotation, NodeHash, PointFetch, RequiredBlock, SourceError,
};
use lightproof_module_accumulator_store::AccumulatorStore;

use crate::bootstrap::BootstrapPlanner;
use crate::configuration::IngestorConfig;
use crate::controller::StreamIngestor;
use crate::retire::NodeRetirer;

pub fn block(number: u64, id: &str, active_nodes: Vec<NodeHash>) -> Block {
    Block {
        number,
        id: id.to_string(),
        timestamp: BlockTimestamp {
            seconds: 1_700_000_005,
            nanos: 0,
        },
        active_nodes,
    }
}

pub fn new_event(block: Block) -> BlockEvent {
    BlockEvent {
        block,
        step: ForkStep::New,
    }
}

/// Point fetcher backed by a fixed height map, recording every request
#[derive(Default)]
pub struct MapFetcher {
    blocks: HashMap<u64, Block>,
    pub requests: Arc<Mutex<Vec<(u64, bool)>>>,
}

impl MapFetcher {
    pub fn with_block(mut self, block: Block) -> Self {
        self.blocks.insert(block.number, block);
        self
    }
}

impl PointFetch for MapFetcher {
    async fn fetch_irreversible(&self, height: u64, alternate: bool) -> Option<Block> {
        self.requests.lock().unwrap().push((height, alternate));
        self.blocks.get(&height).cloned()
    }
}

/// Annotator answering from precomputed tables
#[derive(Default)]
pub struct ScriptedAnnotator {
    live: HashMap<u64, LiveAnnotation>,
    bootstrap: Vec<RequiredBlock>,
}

impl ScriptedAnnotator {
    pub fn with_live(mut self, tip_number: u64, annotation: LiveAnnotation) -> Self {
        self.live.insert(tip_number, annotation);
        self
    }

    pub fn with_bootstrap(mut self, required: Vec<RequiredBlock>) -> Self {
        self.bootstrap = required;
        self
    }
}

impl Annotator for ScriptedAnnotator {
    fn annotate_live(&self, tip_number: u64, _active_nodes: &[NodeHash]) -> Option<LiveAnnotation> {
        self.live.get(&tip_number).copied()
    }

    fn annotate_bootstrap(&self, _number: u64, _active_nodes: &[NodeHash]) -> Vec<RequiredBlock> {
        self.bootstrap.clone()
    }
}

/// Source replaying one scripted item sequence per subscription.
///
/// Records every requested start height; once the scripts run out, each
/// further subscription yields a single cancellation so tests terminate.
pub struct ScriptedSource {
    scripts: Mutex<VecDeque<Vec<Result<BlockEvent, SourceError>>>>,
    pub starts: Arc<Mutex<Vec<u64>>>,
}

impl ScriptedSource {
    pub fn scripted(scripts: Vec<Vec<Result<BlockEvent, SourceError>>>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            starts: Arc::default(),
        }
    }
}

impl BlockSource for ScriptedSource {
    async fn subscribe(&self, start_block: u64) -> Result<EventStream, SourceError> {
        self.starts.lock().unwrap().push(start_block);
        let items = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| vec![Err(SourceError::Cancelled)]);
        Ok(futures::stream::iter(items).boxed())
    }
}

#[derive(Default, Clone)]
pub struct RecordingRetirer {
    nodes: Arc<Mutex<Vec<NodeHash>>>,
}

impl NodeRetirer for RecordingRetirer {
    fn retire(&self, node: &[u8]) {
        self.nodes.lock().unwrap().push(node.to_vec());
    }
}

pub struct Harness {
    ingestor: StreamIngestor<ScriptedSource, MapFetcher, ScriptedAnnotator, RecordingRetirer>,
    retirer: RecordingRetirer,
    _dir: tempfile::TempDir,
}

impl Harness {
    pub async fn run(&self, force_start: Option<u64>) -> anyhow::Result<()> {
        self.ingestor.run(force_start).await
    }

    pub fn retired(&self) -> Vec<NodeHash> {
        self.retirer.nodes.lock().unwrap().clone()
    }
}

/// Controller over a fresh temp store, wired for short test timings
pub fn scripted_ingestor(
    source: ScriptedSource,
    annotator: ScriptedAnnotator,
) -> (Harness, Arc<AccumulatorStore>) {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(AccumulatorStore::open(dir.path().join("db")).unwrap());
    let annotator = Arc::new(annotator);
    let config = IngestorConfig {
        prune_interval: 5,
        reconnect_delay_ms: 10,
        ..IngestorConfig::default()
    };
    let retirer = RecordingRetirer::default();
    let planner = BootstrapPlanner::new(
        MapFetcher::default(),
        annotator.clone(),
        store.clone(),
        config.clone(),
    );
    let ingestor = StreamIngestor::new(
        source,
        planner,
        store.clone(),
        annotator,
        retirer.clone(),
        config,
    );
    (
        Harness {
            ingestor,
            retirer,
            _dir: dir,
        },
        store,
    )
}
