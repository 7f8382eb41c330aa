// Lightproof common library - main library exports

pub mod codec;
pub mod merkle;
pub mod subscription;
pub mod types;

// Flattened re-exports
pub use self::codec::AccumulatorRecord;
pub use self::merkle::{Annotator, IncrementalMerkleAnnotator, LiveAnnotation, RequiredBlock};
pub use self::subscription::{BlockEvent, BlockSource, EventStream, PointFetch, SourceError};
pub use self::types::*;
