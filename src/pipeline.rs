//! End-to-end run: fixation table to windowed table, combined features and
//! sequences.

use crate::core::features::{CombineConfig, FeatureCombiner, FeatureTable};
use crate::core::sequence::{SequenceEmitter, SequenceSet};
use crate::core::windowing::{WindowConfig, WindowedTable, Windower};
use crate::error::Result;
use crate::input::FixationTable;
use crate::progress::{NoopObserver, ProgressObserver};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Stage settings for one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub window: WindowConfig,
    #[serde(default)]
    pub combine: CombineConfig,
}

/// Everything a run produces.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub windowed: WindowedTable,
    pub features: FeatureTable,
    pub sequences: SequenceSet,
}

/// Chains windower, combiner and emitter.
pub struct Pipeline {
    windower: Windower,
    combiner: FeatureCombiner,
    emitter: SequenceEmitter,
    observer: Arc<dyn ProgressObserver>,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            windower: Windower::new(config.window),
            combiner: FeatureCombiner::new(config.combine),
            emitter: SequenceEmitter::new(),
            observer: Arc::new(NoopObserver),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn windower(&self) -> &Windower {
        &self.windower
    }

    pub fn combiner(&self) -> &FeatureCombiner {
        &self.combiner
    }

    pub fn emitter(&self) -> &SequenceEmitter {
        &self.emitter
    }

    /// Window only.
    pub fn window(&self, table: &FixationTable) -> Result<WindowedTable> {
        self.windower.process(table, self.observer.as_ref())
    }

    /// Run every stage. Any stage error aborts the whole run.
    pub fn run(&self, table: &FixationTable) -> Result<PipelineOutput> {
        let windowed = self.window(table)?;
        let features = self.combiner.combine(&windowed)?;
        let sequences = self.emitter.emit(&features);
        self.observer.on_sequences_emitted(sequences.len());

        Ok(PipelineOutput {
            windowed,
            features,
            sequences,
        })
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(PipelineConfig::default())
    }
}
