//! Feature groups and pairwise combinations over a windowed table.
//!
//! Step one fuses the selected offsets of each transform into a single
//! group value. Step two combines every unordered pair of groups and
//! auxiliary columns exactly once, plus offset-aligned pairs between groups.

use crate::core::schema::{
    Aggregate, ColumnKey, FeatureRef, FeatureValue, OffsetWindow, Passthrough,
};
use crate::core::transforms::{Relativity, Transform};
use crate::core::windowing::{SnippetRow, WindowedTable};
use crate::error::{Result, SequencerError};
use crate::input::{TrialKey, UniqueId};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Settings for the combination stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombineConfig {
    /// Transforms whose offset columns are grouped
    pub prefixes: Vec<Transform>,
    /// Offsets eligible for grouping
    pub window: OffsetWindow,
    /// Passthrough columns added to the table and to the pairing
    pub auxiliary: Vec<Passthrough>,
    /// How values are fused
    #[serde(default)]
    pub aggregate: Aggregate,
    /// Keep the selected raw offset columns next to the groups
    #[serde(default = "default_true")]
    pub include_raw: bool,
    /// Also emit offset-aligned pairs between groups
    #[serde(default = "default_true")]
    pub offset_pairs: bool,
}

fn default_true() -> bool {
    true
}

impl Default for CombineConfig {
    fn default() -> Self {
        Self {
            prefixes: vec![
                Transform::FixationDuration(Relativity::Absolute),
                Transform::SaccadeDistance(Relativity::Absolute),
            ],
            window: OffsetWindow::default(),
            auxiliary: vec![Passthrough::Aoi, Passthrough::Fixcount],
            aggregate: Aggregate::Sum,
            include_raw: true,
            offset_pairs: true,
        }
    }
}

/// One fixation of the combined table.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub id: UniqueId,
    pub trial: TrialKey,
    pub fix_id: i64,
    pub label: Option<String>,
    pub aoi: Option<String>,
    /// Aligned with [`FeatureTable::columns`]
    pub values: Vec<FeatureValue>,
}

/// Fixed-schema table of raw, grouped and combined features.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTable {
    columns: Vec<ColumnKey>,
    rows: Vec<FeatureRow>,
}

impl FeatureTable {
    pub fn new(columns: Vec<ColumnKey>, rows: Vec<FeatureRow>) -> Self {
        Self { columns, rows }
    }

    pub fn columns(&self) -> &[ColumnKey] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(ColumnKey::name).collect()
    }

    pub fn column_index(&self, key: &ColumnKey) -> Option<usize> {
        self.columns.iter().position(|c| c == key)
    }

    pub fn rows(&self) -> &[FeatureRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn value<'a>(&self, row: &'a FeatureRow, key: &ColumnKey) -> Option<&'a FeatureValue> {
        self.column_index(key).and_then(|i| row.values.get(i))
    }
}

/// Derives group and pair columns from a [`WindowedTable`].
pub struct FeatureCombiner {
    config: CombineConfig,
}

impl FeatureCombiner {
    pub fn new(config: CombineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CombineConfig {
        &self.config
    }

    /// Build the combined table.
    ///
    /// Prefixes whose window selects no offsets yield empty groups, not errors.
    pub fn combine(&self, table: &WindowedTable) -> Result<FeatureTable> {
        let plan = self.plan(table)?;

        let rows = table
            .rows()
            .iter()
            .map(|row| self.combine_row(&plan, row))
            .collect();

        tracing::info!(
            "combined {} groups into {} columns",
            plan.prefixes.len(),
            plan.columns.len()
        );
        Ok(FeatureTable::new(plan.columns, rows))
    }

    fn plan(&self, table: &WindowedTable) -> Result<Plan> {
        let prefixes = dedup(&self.config.prefixes);
        let auxiliary = dedup(&self.config.auxiliary);

        let mut prefix_indices = Vec::with_capacity(prefixes.len());
        for &prefix in &prefixes {
            let index = table
                .transform_index(prefix)
                .ok_or_else(|| SequencerError::SchemaMismatch {
                    column: prefix.name().to_string(),
                })?;
            prefix_indices.push(index);
        }
        if let Some(absent) = auxiliary.iter().find(|&&p| !table.has_passthrough(p)) {
            return Err(SequencerError::SchemaMismatch {
                column: absent.name().to_string(),
            });
        }

        let offsets = self.config.window.intersect(&table.offsets());
        if offsets.is_empty() {
            tracing::warn!(
                "window {} selects no offsets from {}",
                self.config.window,
                table.offsets()
            );
        }

        let mut columns: Vec<ColumnKey> =
            auxiliary.iter().map(|&p| ColumnKey::Passthrough(p)).collect();

        if self.config.include_raw {
            for &transform in &prefixes {
                columns.extend(
                    offsets
                        .iter()
                        .map(|offset| ColumnKey::Window { transform, offset }),
                );
            }
        }

        columns.extend(prefixes.iter().map(|&t| ColumnKey::Group(t)));

        let operands: Vec<FeatureRef> = prefixes
            .iter()
            .map(|&t| FeatureRef::Group(t))
            .chain(auxiliary.iter().map(|&p| FeatureRef::Aux(p)))
            .collect();

        let mut seen: HashSet<ColumnKey> = HashSet::new();
        for (i, &a) in operands.iter().enumerate() {
            for &b in &operands[i + 1..] {
                let key = ColumnKey::pair(a, b);
                if seen.insert(key) {
                    columns.push(key);
                }
            }
        }

        if self.config.offset_pairs {
            for (i, &a) in prefixes.iter().enumerate() {
                for &b in &prefixes[i + 1..] {
                    for offset in offsets.iter() {
                        let key = ColumnKey::offset_pair(a, b, offset);
                        if seen.insert(key) {
                            columns.push(key);
                        }
                    }
                }
            }
        }

        Ok(Plan {
            prefixes: prefixes.into_iter().zip(prefix_indices).collect(),
            offsets,
            columns,
        })
    }

    fn combine_row(&self, plan: &Plan, row: &SnippetRow) -> FeatureRow {
        let aggregate = self.config.aggregate;
        let index_of: HashMap<Transform, usize> = plan.prefixes.iter().copied().collect();

        let raw = |transform: Transform, offset: i32| -> FeatureValue {
            index_of
                .get(&transform)
                .map(|&index| FeatureValue::from_option(row.value_at(index, offset)))
                .unwrap_or_default()
        };

        // Group values are computed once per row and reused by every pair.
        let groups: HashMap<Transform, FeatureValue> = plan
            .prefixes
            .iter()
            .map(|&(transform, _)| {
                let values = plan.offsets.iter().map(|offset| raw(transform, offset));
                (transform, aggregate.fold(values))
            })
            .collect();

        let operand = |r: FeatureRef| -> FeatureValue {
            match r {
                FeatureRef::Group(t) => groups.get(&t).cloned().unwrap_or_default(),
                FeatureRef::Aux(p) => row.passthrough(p),
            }
        };

        let values = plan
            .columns
            .iter()
            .map(|key| match *key {
                ColumnKey::Window { transform, offset } => raw(transform, offset),
                ColumnKey::Passthrough(p) => row.passthrough(p),
                ColumnKey::Group(t) => operand(FeatureRef::Group(t)),
                ColumnKey::Pair { first, second } => {
                    FeatureValue::conjoin(&operand(first), &operand(second))
                }
                ColumnKey::OffsetPair {
                    first,
                    second,
                    offset,
                } => FeatureValue::conjoin(&raw(first, offset), &raw(second, offset)),
            })
            .collect();

        FeatureRow {
            id: row.id.clone(),
            trial: row.trial.clone(),
            fix_id: row.fix_id,
            label: row.label.clone(),
            aoi: row.aoi.clone(),
            values,
        }
    }
}

struct Plan {
    /// Selected transforms with their index in the windowed table
    prefixes: Vec<(Transform, usize)>,
    offsets: OffsetWindow,
    columns: Vec<ColumnKey>,
}

fn dedup<T: Copy + PartialEq>(items: &[T]) -> Vec<T> {
    let mut out: Vec<T> = Vec::with_capacity(items.len());
    for &item in items {
        if !out.contains(&item) {
            out.push(item);
        }
    }
    out
}
