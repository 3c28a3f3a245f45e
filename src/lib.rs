//! Gaze Sequencer - snippet feature sequences from annotated eye fixations.
//!
//! This library turns a table of fixations, already annotated with the
//! region (AOI) each one landed on, into fixed-width positional feature
//! windows and per-trial sequences ready for a sequence-labeling model.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       Gaze Sequencer                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐       │
//! │  │   Input     │──▶│  Windowing  │──▶│  Features   │       │
//! │  │ (fixations) │   │ (transforms)│   │ (combine)   │       │
//! │  └─────────────┘   └─────────────┘   └─────────────┘       │
//! │                           │                 │               │
//! │                           ▼                 ▼               │
//! │                    ┌─────────────┐   ┌─────────────┐       │
//! │                    │ CoNLL lines │   │  Sequences  │       │
//! │                    │  (export)   │   │ (BOS / EOS) │       │
//! │                    └─────────────┘   └─────────────┘       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use gaze_sequencer::{input, Pipeline, PipelineConfig};
//!
//! let table = input::read_fixations("fixations.jsonl")?;
//! let output = Pipeline::new(PipelineConfig::default()).run(&table)?;
//!
//! for trial in output.sequences.iter() {
//!     println!("{}: {} fixations", trial.trial, trial.len());
//! }
//! # Ok::<(), gaze_sequencer::SequencerError>(())
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod export;
pub mod input;
pub mod pipeline;
pub mod progress;

// Re-export key types at crate root for convenience
pub use config::{Config, ConfigError};
pub use core::{
    CombineConfig, FeatureCombiner, FeatureTable, OffsetWindow, SequenceEmitter, SequenceSet,
    Transform, WindowConfig, WindowedTable, Windower,
};
pub use error::{Result, SequencerError};
pub use export::{ConllConfig, ConllExporter};
pub use input::{read_fixations, FixationRecord, FixationTable, IndexBase, TrialKey, UniqueId};
pub use pipeline::{Pipeline, PipelineConfig, PipelineOutput};
pub use progress::{NoopObserver, ProgressObserver, RunLog, SharedRunLog};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
