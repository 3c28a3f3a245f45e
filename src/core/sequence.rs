//! Per-trial feature sequences for sequence-labeling models.
//!
//! Each trial becomes an ordered list of feature dictionaries, one per
//! fixation, with a parallel label sequence and region sequence.

use crate::core::features::{FeatureRow, FeatureTable};
use crate::input::TrialKey;
use chrono::Utc;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// The name of this producer.
pub const PRODUCER_NAME: &str = "gaze-sequencer";

/// Marker set on the first fixation of every trial.
pub const BOS: &str = "BOS";

/// Marker set on the last fixation of every trial.
pub const EOS: &str = "EOS";

const MARKER_VALUE: &str = "true";

/// Feature name to rendered value, in column order.
pub type FeatureDict = IndexMap<String, String>;

/// Producer metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Producer {
    /// Name of the producing software
    pub name: String,
    /// Version of the producing software
    pub version: String,
    /// Unique run identifier (UUID)
    pub run_id: String,
}

/// Emitted sequences for a whole dataset.
///
/// `trials`, `features`, `labels` and `regions` are parallel: entry `i` of
/// each belongs to the same trial.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SequenceSet {
    pub producer: Producer,
    /// When the set was emitted (RFC3339)
    pub created_at: String,
    pub trials: Vec<TrialKey>,
    pub features: Vec<Vec<FeatureDict>>,
    pub labels: Vec<Vec<String>>,
    pub regions: Vec<Vec<String>>,
}

/// Borrowed view of one trial's sequences.
#[derive(Debug, Clone, Copy)]
pub struct TrialSequence<'a> {
    pub trial: &'a TrialKey,
    pub features: &'a [FeatureDict],
    pub labels: &'a [String],
    pub regions: &'a [String],
}

impl TrialSequence<'_> {
    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

impl SequenceSet {
    /// Number of trials.
    pub fn len(&self) -> usize {
        self.trials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trials.is_empty()
    }

    /// Total number of fixations across trials.
    pub fn fixation_count(&self) -> usize {
        self.features.iter().map(Vec::len).sum()
    }

    pub fn get(&self, trial: &TrialKey) -> Option<TrialSequence<'_>> {
        self.iter().find(|seq| seq.trial == trial)
    }

    pub fn iter(&self) -> impl Iterator<Item = TrialSequence<'_>> {
        self.trials
            .iter()
            .zip(&self.features)
            .zip(&self.labels)
            .zip(&self.regions)
            .map(|(((trial, features), labels), regions)| TrialSequence {
                trial,
                features,
                labels,
                regions,
            })
    }
}

/// Turns a [`FeatureTable`] into per-trial sequences.
pub struct SequenceEmitter {
    instance_id: Uuid,
}

impl SequenceEmitter {
    /// Create an emitter with a unique run ID.
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4(),
        }
    }

    /// Get the run ID stamped on emitted sets.
    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    /// Group rows by trial, order them by fixID and render every fixation.
    pub fn emit(&self, table: &FeatureTable) -> SequenceSet {
        let names = table.column_names();

        let mut grouped: BTreeMap<&TrialKey, Vec<&FeatureRow>> = BTreeMap::new();
        for row in table.rows() {
            grouped.entry(&row.trial).or_default().push(row);
        }

        let mut set = SequenceSet {
            producer: Producer {
                name: PRODUCER_NAME.to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                run_id: self.instance_id.to_string(),
            },
            created_at: Utc::now().to_rfc3339(),
            trials: Vec::with_capacity(grouped.len()),
            features: Vec::with_capacity(grouped.len()),
            labels: Vec::with_capacity(grouped.len()),
            regions: Vec::with_capacity(grouped.len()),
        };

        for (trial, mut rows) in grouped {
            rows.sort_by_key(|row| row.fix_id);
            let last = rows.len().saturating_sub(1);

            let features = rows
                .iter()
                .enumerate()
                .map(|(position, row)| {
                    let mut dict = feature_dict(&names, row);
                    if position == 0 {
                        dict.insert(BOS.to_string(), MARKER_VALUE.to_string());
                    }
                    if position == last {
                        dict.insert(EOS.to_string(), MARKER_VALUE.to_string());
                    }
                    dict
                })
                .collect();

            set.trials.push(trial.clone());
            set.features.push(features);
            set.labels
                .push(rows.iter().map(|r| r.label.clone().unwrap_or_default()).collect());
            set.regions
                .push(rows.iter().map(|r| r.aoi.clone().unwrap_or_default()).collect());
        }

        tracing::info!(
            "emitted {} sequences covering {} fixations",
            set.len(),
            set.fixation_count()
        );
        set
    }
}

impl Default for SequenceEmitter {
    fn default() -> Self {
        Self::new()
    }
}

fn feature_dict(names: &[String], row: &FeatureRow) -> FeatureDict {
    names
        .iter()
        .zip(&row.values)
        .filter_map(|(name, value)| value.render().map(|v| (name.clone(), v)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::features::{CombineConfig, FeatureCombiner};
    use crate::core::schema::{Aggregate, OffsetWindow, Passthrough};
    use crate::core::transforms::{Relativity, Transform};
    use crate::core::windowing::{WindowConfig, Windower};
    use crate::input::types::tests::record;
    use crate::input::FixationTable;
    use crate::progress::NoopObserver;

    const SACC: Transform = Transform::SaccadeDistance(Relativity::Absolute);
    const FIXD: Transform = Transform::FixationDuration(Relativity::Absolute);

    fn features(records: Vec<crate::input::FixationRecord>) -> FeatureTable {
        let windowed = Windower::new(WindowConfig::new(vec![FIXD, SACC]))
            .process(&FixationTable::new(records), &NoopObserver)
            .unwrap();
        FeatureCombiner::new(CombineConfig {
            prefixes: vec![FIXD, SACC],
            window: OffsetWindow::new(-1, 1),
            auxiliary: vec![Passthrough::Aoi],
            aggregate: Aggregate::Sum,
            include_raw: true,
            offset_pairs: false,
        })
        .combine(&windowed)
        .unwrap()
    }

    fn dataset() -> FeatureTable {
        // Records deliberately out of order.
        let mut labelled = vec![
            record("s1", "t1", 2, 1, 120.0),
            record("s1", "t1", 0, 0, 100.0),
            record("s1", "t1", 1, 1, 150.0),
            record("s2", "t1", 0, 4, 80.0),
        ];
        labelled[0].label = Some("B".into());
        labelled[1].label = Some("A".into());
        features(labelled)
    }

    #[test]
    fn test_rows_grouped_and_ordered() {
        let set = SequenceEmitter::new().emit(&dataset());
        assert_eq!(set.len(), 2);
        assert_eq!(set.fixation_count(), 4);

        let seq = set.get(&TrialKey::new("s1", "t1")).unwrap();
        assert_eq!(seq.len(), 3);
        assert_eq!(seq.features[0].get("fixd0").map(String::as_str), Some("100"));
        assert_eq!(seq.features[1].get("fixd0").map(String::as_str), Some("150"));
        assert_eq!(seq.features[2].get("fixd0").map(String::as_str), Some("120"));
        assert_eq!(seq.labels, &["A".to_string(), String::new(), "B".to_string()]);
        assert_eq!(seq.regions, &["w0".to_string(), "w1".to_string(), "w1".to_string()]);
    }

    #[test]
    fn test_boundary_markers() {
        let set = SequenceEmitter::new().emit(&dataset());
        for seq in set.iter() {
            let bos: Vec<usize> = (0..seq.len())
                .filter(|&i| seq.features[i].contains_key(BOS))
                .collect();
            let eos: Vec<usize> = (0..seq.len())
                .filter(|&i| seq.features[i].contains_key(EOS))
                .collect();
            assert_eq!(bos, vec![0]);
            assert_eq!(eos, vec![seq.len() - 1]);
        }

        let single = set.get(&TrialKey::new("s2", "t1")).unwrap();
        assert_eq!(single.len(), 1);
        assert_eq!(single.features[0].get(BOS).map(String::as_str), Some("true"));
        assert_eq!(single.features[0].get(EOS).map(String::as_str), Some("true"));
    }

    #[test]
    fn test_missing_values_omitted() {
        let set = SequenceEmitter::new().emit(&dataset());
        let seq = set.get(&TrialKey::new("s1", "t1")).unwrap();
        // no fixation before the first one
        assert!(!seq.features[0].contains_key("fixd-1"));
        assert!(seq.features[1].contains_key("fixd-1"));
    }

    #[test]
    fn test_dict_follows_column_order() {
        let table = dataset();
        let set = SequenceEmitter::new().emit(&table);
        let seq = set.get(&TrialKey::new("s1", "t1")).unwrap();
        let keys: Vec<&String> = seq.features[1]
            .keys()
            .filter(|k| k.as_str() != BOS && k.as_str() != EOS)
            .collect();
        let names = table.column_names();
        let expected: Vec<&String> = names.iter().filter(|n| keys.contains(n)).collect();
        assert_eq!(keys, expected);
        assert_eq!(keys[0], "aoi");
    }

    #[test]
    fn test_producer_metadata() {
        let emitter = SequenceEmitter::new();
        let set = emitter.emit(&dataset());
        assert_eq!(set.producer.name, PRODUCER_NAME);
        assert_eq!(set.producer.run_id, emitter.instance_id().to_string());
        assert!(chrono::DateTime::parse_from_rfc3339(&set.created_at).is_ok());

        let json = serde_json::to_string(&set).unwrap();
        let back: SequenceSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, set);
    }

    #[test]
    fn test_empty_table() {
        let set = SequenceEmitter::new().emit(&FeatureTable::new(Vec::new(), Vec::new()));
        assert!(set.is_empty());
        assert_eq!(set.iter().count(), 0);
    }
}
