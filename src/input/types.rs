//! Annotated fixation records and their grouping into trials.
//!
//! Records arrive already annotated with region-of-interest ids and fixation
//! counts. The engine never alters a caller's table in place: every
//! correction returns a new [`FixationTable`].

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// Separator used when joining subject, stimulus and fixID into a [`UniqueId`].
pub const ID_SEPARATOR: &str = "_";

/// One fixation as produced by the annotation step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FixationRecord {
    /// Subject identifier
    #[serde(deserialize_with = "lenient::string")]
    pub subj: String,
    /// Stimulus (trial) identifier
    #[serde(deserialize_with = "lenient::string")]
    pub stim: String,
    /// Rank of the fixation within its trial
    #[serde(rename = "fixID")]
    pub fix_id: i64,
    /// Fixation duration
    pub dur: f64,
    /// Index of the fixated region; the key is required, `null` when no region matched
    #[serde(deserialize_with = "lenient::nullable")]
    pub aoi_id: Option<i64>,
    /// Label of the fixated region; the key is required, may be `null`
    #[serde(deserialize_with = "lenient::opt_string")]
    pub aoi: Option<String>,
    /// Visits to the same region so far, inclusive of this one
    pub fixcount: u32,
    /// Ground-truth tag for sequence labeling
    #[serde(default, deserialize_with = "lenient::opt_string")]
    pub label: Option<String>,
    /// Duration relative to a subject-level baseline
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rel_dur: Option<f64>,
}

impl FixationRecord {
    pub fn trial_key(&self) -> TrialKey {
        TrialKey::new(&self.subj, &self.stim)
    }

    pub fn unique_id(&self) -> UniqueId {
        UniqueId::new(&self.subj, &self.stim, self.fix_id)
    }
}

/// Identifies a trial: one subject reading one stimulus.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TrialKey {
    pub subj: String,
    pub stim: String,
}

impl TrialKey {
    pub fn new(subj: impl Into<String>, stim: impl Into<String>) -> Self {
        Self {
            subj: subj.into(),
            stim: stim.into(),
        }
    }
}

impl fmt::Display for TrialKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.subj, self.stim)
    }
}

/// Dataset-wide primary key of a fixation.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UniqueId(String);

impl UniqueId {
    pub fn new(subj: &str, stim: &str, fix_id: i64) -> Self {
        Self([subj, stim, &fix_id.to_string()].join(ID_SEPARATOR))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UniqueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How `fixID` and `aoi_id` are numbered in the input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexBase {
    /// Decrement a column only when no zero value occurs anywhere in it
    #[default]
    Auto,
    /// Already 0-indexed; never adjust
    ZeroBased,
    /// Uniformly 1-indexed; always decrement both columns
    OneBased,
}

impl std::str::FromStr for IndexBase {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(IndexBase::Auto),
            "0" | "zero" | "zero_based" => Ok(IndexBase::ZeroBased),
            "1" | "one" | "one_based" => Ok(IndexBase::OneBased),
            other => Err(format!("unknown index base `{other}` (auto, zero, one)")),
        }
    }
}

/// Which columns an indexing pass shifted down by one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexAdjustment {
    pub fix_id_shifted: bool,
    pub aoi_id_shifted: bool,
}

/// The caller-supplied table of annotated fixations.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FixationTable {
    records: Vec<FixationRecord>,
}

impl FixationTable {
    pub fn new(records: Vec<FixationRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[FixationRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Whether the optional `rel_dur` column carries any value.
    pub fn has_rel_dur(&self) -> bool {
        self.records.iter().any(|r| r.rel_dur.is_some())
    }

    /// Whether the optional `label` column carries any value.
    pub fn has_labels(&self) -> bool {
        self.records.iter().any(|r| r.label.is_some())
    }

    /// Largest fixID in the whole dataset.
    pub fn max_fix_id(&self) -> Option<i64> {
        self.records.iter().map(|r| r.fix_id).max()
    }

    /// Group records by trial, trials ordered by key and fixations by fixID.
    pub fn trials(&self) -> Vec<Trial<'_>> {
        let mut grouped: BTreeMap<TrialKey, Vec<&FixationRecord>> = BTreeMap::new();
        for record in &self.records {
            grouped.entry(record.trial_key()).or_default().push(record);
        }

        grouped
            .into_iter()
            .map(|(key, mut fixations)| {
                fixations.sort_by_key(|r| r.fix_id);
                Trial { key, fixations }
            })
            .collect()
    }

    /// Bring `fixID` and `aoi_id` to 0-based numbering.
    ///
    /// With [`IndexBase::Auto`] each column is checked over the whole
    /// dataset, never per trial. A dataset whose globally-first fixation is
    /// genuinely missing is indistinguishable from a 1-indexed one and gets
    /// shifted as well; pass an explicit base when that matters.
    pub fn normalize_indexing(&self, base: IndexBase) -> (FixationTable, IndexAdjustment) {
        let adjustment = match base {
            IndexBase::ZeroBased => IndexAdjustment::default(),
            IndexBase::OneBased => IndexAdjustment {
                fix_id_shifted: true,
                aoi_id_shifted: true,
            },
            IndexBase::Auto if self.records.is_empty() => IndexAdjustment::default(),
            IndexBase::Auto => IndexAdjustment {
                fix_id_shifted: !self.records.iter().any(|r| r.fix_id == 0),
                aoi_id_shifted: !self.records.iter().any(|r| r.aoi_id == Some(0)),
            },
        };

        let records = self
            .records
            .iter()
            .cloned()
            .map(|mut record| {
                if adjustment.fix_id_shifted {
                    record.fix_id -= 1;
                }
                if adjustment.aoi_id_shifted {
                    record.aoi_id = record.aoi_id.map(|id| id - 1);
                }
                record
            })
            .collect();

        (FixationTable::new(records), adjustment)
    }

    /// Derive `rel_dur` as each duration divided by its subject's mean duration.
    ///
    /// Subjects whose mean duration is not positive keep `rel_dur` unset.
    pub fn with_relative_durations(&self) -> FixationTable {
        let mut totals: HashMap<&str, (f64, usize)> = HashMap::new();
        for record in &self.records {
            let entry = totals.entry(record.subj.as_str()).or_insert((0.0, 0));
            entry.0 += record.dur;
            entry.1 += 1;
        }

        let means: HashMap<String, f64> = totals
            .into_iter()
            .map(|(subj, (sum, n))| (subj.to_string(), sum / n as f64))
            .collect();

        let records = self
            .records
            .iter()
            .cloned()
            .map(|mut record| {
                record.rel_dur = means
                    .get(&record.subj)
                    .filter(|&&mean| mean > 0.0)
                    .map(|mean| record.dur / mean);
                record
            })
            .collect();

        FixationTable::new(records)
    }
}

impl From<Vec<FixationRecord>> for FixationTable {
    fn from(records: Vec<FixationRecord>) -> Self {
        Self::new(records)
    }
}

/// The fixations of one trial in increasing fixID order.
#[derive(Debug, Clone)]
pub struct Trial<'a> {
    pub key: TrialKey,
    pub fixations: Vec<&'a FixationRecord>,
}

impl<'a> Trial<'a> {
    pub fn len(&self) -> usize {
        self.fixations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fixations.is_empty()
    }

    pub fn region_ids(&self) -> Vec<Option<i64>> {
        self.fixations.iter().map(|r| r.aoi_id).collect()
    }

    pub fn durations(&self) -> Vec<f64> {
        self.fixations.iter().map(|r| r.dur).collect()
    }

    pub fn relative_durations(&self) -> Vec<Option<f64>> {
        self.fixations.iter().map(|r| r.rel_dur).collect()
    }

    pub fn has_rel_dur(&self) -> bool {
        self.fixations.iter().any(|r| r.rel_dur.is_some())
    }
}

/// Accept identifiers that annotators sometimes emit as numbers.
mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    fn stringify<E: serde::de::Error>(value: Value) -> Result<Option<String>, E> {
        match value {
            Value::Null => Ok(None),
            Value::String(s) => Ok(Some(s)),
            Value::Number(n) => Ok(Some(n.to_string())),
            Value::Bool(b) => Ok(Some(b.to_string())),
            other => Err(E::custom(format!("expected string or number, got {other}"))),
        }
    }

    pub fn string<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        stringify(Value::deserialize(deserializer)?)?
            .ok_or_else(|| serde::de::Error::custom("expected string or number, got null"))
    }

    pub fn opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        stringify(Value::deserialize(deserializer)?)
    }

    pub fn nullable<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: Deserialize<'de>,
    {
        Option::<T>::deserialize(deserializer)
    }
}
