//! Core functionality for the sequencing engine.
//!
//! This module contains:
//! - The transform registry (saccade distance, fixation duration)
//! - Positional windowing of transform values around each fixation
//! - Feature groups and pairwise combinations
//! - Per-trial sequence emission

pub mod features;
pub mod schema;
pub mod sequence;
pub mod transforms;
pub mod windowing;

// Re-export commonly used types
pub use features::{CombineConfig, FeatureCombiner, FeatureRow, FeatureTable};
pub use schema::{
    format_number, Aggregate, ColumnKey, FeatureRef, FeatureValue, OffsetWindow, Passthrough,
};
pub use sequence::{
    FeatureDict, Producer, SequenceEmitter, SequenceSet, TrialSequence, BOS, EOS, PRODUCER_NAME,
};
pub use transforms::{Relativity, Transform};
pub use windowing::{SnippetRow, TrialSnippets, WindowConfig, WindowedTable, Windower};
