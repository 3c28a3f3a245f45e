//! Positional windows of transform values around every fixation.
//!
//! For a fixation at position `f` of a trial with `L` fixations, each
//! transform yields `L` values; value `k` lands at offset `k - f`. The offset
//! schema is fixed dataset-wide to `[-(M+1), M+1]` with `M` the largest
//! fixID, so every row shares one column set even though only offsets
//! `-f ..= L-f-1` are populated.

use crate::core::schema::{ColumnKey, FeatureValue, OffsetWindow, Passthrough};
use crate::core::transforms::Transform;
use crate::error::{Result, SequencerError};
use crate::input::{FixationTable, IndexAdjustment, IndexBase, Trial, TrialKey, UniqueId};
use crate::progress::ProgressObserver;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Settings for the windowing stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowConfig {
    /// Transforms to evaluate, in column order
    pub transforms: Vec<Transform>,
    /// How fixID / aoi_id are numbered in the input
    #[serde(default)]
    pub index_base: IndexBase,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            transforms: Transform::defaults(),
            index_base: IndexBase::Auto,
        }
    }
}

impl WindowConfig {
    pub fn new(transforms: Vec<Transform>) -> Self {
        Self {
            transforms,
            ..Self::default()
        }
    }

    pub fn with_index_base(mut self, index_base: IndexBase) -> Self {
        self.index_base = index_base;
        self
    }
}

/// One fixation with its windowed transform series.
#[derive(Debug, Clone, PartialEq)]
pub struct SnippetRow {
    pub id: UniqueId,
    pub trial: TrialKey,
    /// Position within the trial (the normalized fixID)
    pub fix_id: i64,
    /// Number of fixations in the trial
    pub trial_len: usize,
    /// One series of `trial_len` values per table transform
    series: Vec<Vec<Option<f64>>>,
    pub aoi: Option<String>,
    pub aoi_id: Option<i64>,
    pub label: Option<String>,
    pub fixcount: u32,
}

impl SnippetRow {
    /// Offsets that carry a value slot for this fixation.
    pub fn populated_offsets(&self) -> OffsetWindow {
        let f = self.fix_id as i32;
        OffsetWindow::new(-f, self.trial_len as i32 - f - 1)
    }

    /// Value of transform `index` at `offset`; `None` when unset or undefined.
    pub fn value_at(&self, index: usize, offset: i32) -> Option<f64> {
        let k = self.fix_id + offset as i64;
        if k < 0 {
            return None;
        }
        self.series
            .get(index)
            .and_then(|s| s.get(k as usize))
            .copied()
            .flatten()
    }

    pub fn passthrough(&self, column: Passthrough) -> FeatureValue {
        match column {
            Passthrough::Aoi => FeatureValue::from_text(self.aoi.as_deref()),
            Passthrough::AoiId => FeatureValue::from_option(self.aoi_id.map(|v| v as f64)),
            Passthrough::Label => FeatureValue::from_text(self.label.as_deref()),
            Passthrough::Fixcount => FeatureValue::Number(self.fixcount as f64),
        }
    }
}

/// Rows produced for one trial; immutable once built.
#[derive(Debug, Clone)]
pub struct TrialSnippets {
    pub key: TrialKey,
    pub rows: Vec<SnippetRow>,
}

/// The windowed snippet table.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowedTable {
    transforms: Vec<Transform>,
    offsets: OffsetWindow,
    adjustment: IndexAdjustment,
    rows: Vec<SnippetRow>,
    /// Position of each row by primary key
    index: HashMap<UniqueId, usize>,
}

impl WindowedTable {
    fn from_trials(
        transforms: Vec<Transform>,
        offsets: OffsetWindow,
        adjustment: IndexAdjustment,
        trials: Vec<TrialSnippets>,
    ) -> Self {
        let rows: Vec<SnippetRow> = trials.into_iter().flat_map(|t| t.rows).collect();
        let index = rows
            .iter()
            .enumerate()
            .map(|(position, row)| (row.id.clone(), position))
            .collect();
        Self {
            transforms,
            offsets,
            adjustment,
            rows,
            index,
        }
    }

    pub fn transforms(&self) -> &[Transform] {
        &self.transforms
    }

    /// Dataset-wide offset schema.
    pub fn offsets(&self) -> OffsetWindow {
        self.offsets
    }

    /// Index corrections applied before windowing.
    pub fn adjustment(&self) -> IndexAdjustment {
        self.adjustment
    }

    pub fn rows(&self) -> &[SnippetRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Whether a passthrough column carries any value in the table.
    ///
    /// `fixcount` is a required input column and always counts as present.
    pub fn has_passthrough(&self, column: Passthrough) -> bool {
        match column {
            Passthrough::Aoi => self.rows.iter().any(|r| r.aoi.is_some()),
            Passthrough::AoiId => self.rows.iter().any(|r| r.aoi_id.is_some()),
            Passthrough::Label => self.rows.iter().any(|r| r.label.is_some()),
            Passthrough::Fixcount => true,
        }
    }

    pub fn transform_index(&self, transform: Transform) -> Option<usize> {
        self.transforms.iter().position(|t| *t == transform)
    }

    pub fn row(&self, id: &UniqueId) -> Option<&SnippetRow> {
        self.index.get(id).and_then(|&position| self.rows.get(position))
    }

    /// Full fixed schema: every transform at every offset, then passthroughs.
    pub fn column_keys(&self) -> Vec<ColumnKey> {
        let mut keys: Vec<ColumnKey> = self
            .transforms
            .iter()
            .flat_map(|&transform| {
                self.offsets
                    .iter()
                    .map(move |offset| ColumnKey::Window { transform, offset })
            })
            .collect();
        keys.extend(Passthrough::ALL.iter().map(|&p| ColumnKey::Passthrough(p)));
        keys
    }

    /// Cell lookup for window and passthrough columns.
    pub fn value(&self, row: &SnippetRow, key: &ColumnKey) -> FeatureValue {
        match *key {
            ColumnKey::Window { transform, offset } => self
                .transform_index(transform)
                .map(|index| FeatureValue::from_option(row.value_at(index, offset)))
                .unwrap_or_default(),
            ColumnKey::Passthrough(p) => row.passthrough(p),
            _ => FeatureValue::Missing,
        }
    }
}

/// Builds [`WindowedTable`]s from annotated fixation tables.
pub struct Windower {
    config: WindowConfig,
}

impl Windower {
    pub fn new(config: WindowConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &WindowConfig {
        &self.config
    }

    /// Window every fixation of every trial.
    ///
    /// Validation covers the whole table before any row is produced, so an
    /// error never comes with partial output.
    pub fn process(
        &self,
        table: &FixationTable,
        observer: &dyn ProgressObserver,
    ) -> Result<WindowedTable> {
        let (table, adjustment) = table.normalize_indexing(self.config.index_base);
        if adjustment.fix_id_shifted || adjustment.aoi_id_shifted {
            tracing::info!(
                fix_id = adjustment.fix_id_shifted,
                aoi_id = adjustment.aoi_id_shifted,
                "no zero index found, shifted columns down by one"
            );
        }

        if self.config.transforms.iter().any(Transform::requires_rel_dur) && !table.has_rel_dur()
        {
            return Err(SequencerError::missing_rel_dur(None));
        }

        let trials = table.trials();
        validate_trials(&trials)?;

        let radius = table.max_fix_id().map(|m| m as i32 + 1).unwrap_or(0);
        let offsets = OffsetWindow::symmetric(radius);

        observer.on_run_start(trials.len());
        let mut built = Vec::with_capacity(trials.len());
        for (index, trial) in trials.iter().enumerate() {
            observer.on_trial_start(&trial.key, index);
            let snippets = self.window_trial(trial)?;
            observer.on_trial_complete(&trial.key, snippets.rows.len());
            built.push(snippets);
        }

        let windowed =
            WindowedTable::from_trials(self.config.transforms.clone(), offsets, adjustment, built);
        tracing::info!(
            "windowed {} fixations over offsets {}",
            windowed.len(),
            windowed.offsets()
        );
        Ok(windowed)
    }

    fn window_trial(&self, trial: &Trial<'_>) -> Result<TrialSnippets> {
        // Position-independent series are computed once per trial.
        let mut shared: Vec<Option<Vec<Option<f64>>>> =
            Vec::with_capacity(self.config.transforms.len());
        for transform in &self.config.transforms {
            shared.push(if transform.depends_on_position() {
                None
            } else {
                Some(transform.evaluate(trial, 0)?)
            });
        }

        let mut rows = Vec::with_capacity(trial.len());
        for (position, record) in trial.fixations.iter().enumerate() {
            let mut series = Vec::with_capacity(self.config.transforms.len());
            for (transform, cached) in self.config.transforms.iter().zip(&shared) {
                series.push(match cached {
                    Some(values) => values.clone(),
                    None => transform.evaluate(trial, position)?,
                });
            }

            rows.push(SnippetRow {
                id: record.unique_id(),
                trial: trial.key.clone(),
                fix_id: record.fix_id,
                trial_len: trial.len(),
                series,
                aoi: record.aoi.clone(),
                aoi_id: record.aoi_id,
                label: record.label.clone(),
                fixcount: record.fixcount,
            });
        }

        Ok(TrialSnippets {
            key: trial.key.clone(),
            rows,
        })
    }
}

fn validate_trials(trials: &[Trial<'_>]) -> Result<()> {
    let mut seen = HashSet::new();

    for trial in trials {
        for (expected, record) in trial.fixations.iter().enumerate() {
            if record.fix_id != expected as i64 {
                return Err(SequencerError::NonContiguousTrial {
                    trial: trial.key.clone(),
                    expected: expected as i64,
                    found: record.fix_id,
                });
            }
            let id = record.unique_id();
            if !seen.insert(id.clone()) {
                return Err(SequencerError::DuplicateFixation { id: id.to_string() });
            }
        }

        if let Some(first) = trial.fixations.first() {
            if first.fixcount > 1 {
                return Err(SequencerError::UnindexedSequence {
                    trial: trial.key.clone(),
                    fixcount: first.fixcount,
                });
            }
        }
    }

    Ok(())
}
