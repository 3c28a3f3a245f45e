//! Per-fixation derivations evaluated over a whole trial.
//!
//! A transform pairs a base computation (saccade distance, fixation
//! duration) with a relativity mode. Evaluating it for the fixation at
//! `position` yields one value per fixation of the trial, in trial order;
//! `None` marks an undefined entry (the first element of a delta series, or
//! a fixation without a region).

use crate::error::{Result, SequencerError};
use crate::input::Trial;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How a base series is relativized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relativity {
    /// Raw values (or, for saccades, distance from the evaluated fixation)
    Absolute,
    /// First difference to the preceding fixation
    Relative,
    /// Sign of the change: -1, 0 or +1
    Directional,
}

/// A registered transform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Transform {
    /// Signed distance between fixated regions, counted in region ids
    SaccadeDistance(Relativity),
    /// Fixation duration
    FixationDuration(Relativity),
}

impl Transform {
    /// Every transform the registry knows, in default column order.
    pub const ALL: [Transform; 6] = [
        Transform::FixationDuration(Relativity::Absolute),
        Transform::FixationDuration(Relativity::Relative),
        Transform::FixationDuration(Relativity::Directional),
        Transform::SaccadeDistance(Relativity::Absolute),
        Transform::SaccadeDistance(Relativity::Relative),
        Transform::SaccadeDistance(Relativity::Directional),
    ];

    /// Transforms computable from the required input columns alone.
    pub fn defaults() -> Vec<Transform> {
        Self::ALL
            .iter()
            .copied()
            .filter(|t| !t.requires_rel_dur())
            .collect()
    }

    /// Column-name prefix for this transform.
    pub fn name(&self) -> &'static str {
        match self {
            Transform::SaccadeDistance(Relativity::Absolute) => "sacc",
            Transform::SaccadeDistance(Relativity::Relative) => "saccRel",
            Transform::SaccadeDistance(Relativity::Directional) => "saccDir",
            Transform::FixationDuration(Relativity::Absolute) => "fixd",
            Transform::FixationDuration(Relativity::Relative) => "fixdRel",
            Transform::FixationDuration(Relativity::Directional) => "fixdDir",
        }
    }

    /// Relative duration reads the externally supplied `rel_dur` column.
    pub fn requires_rel_dur(&self) -> bool {
        matches!(self, Transform::FixationDuration(Relativity::Relative))
    }

    /// Only absolute saccade distance changes with the evaluated fixation.
    pub fn depends_on_position(&self) -> bool {
        matches!(self, Transform::SaccadeDistance(Relativity::Absolute))
    }

    /// Evaluate the transform for the fixation at `position` of `trial`.
    pub fn evaluate(&self, trial: &Trial<'_>, position: usize) -> Result<Vec<Option<f64>>> {
        match self {
            Transform::SaccadeDistance(mode) => Ok(saccade_distance(trial, position, *mode)),
            Transform::FixationDuration(mode) => fixation_duration(trial, *mode),
        }
    }
}

fn saccade_distance(trial: &Trial<'_>, position: usize, mode: Relativity) -> Vec<Option<f64>> {
    let regions = trial.region_ids();

    match mode {
        Relativity::Absolute => {
            let anchor = regions.get(position).copied().flatten();
            regions
                .iter()
                .map(|region| match (region, anchor) {
                    (Some(r), Some(a)) => Some((r - a) as f64),
                    _ => None,
                })
                .collect()
        }
        Relativity::Relative => first_difference(&regions_as_f64(&regions)),
        Relativity::Directional => first_difference(&regions_as_f64(&regions))
            .into_iter()
            .map(|v| v.map(sign))
            .collect(),
    }
}

fn fixation_duration(trial: &Trial<'_>, mode: Relativity) -> Result<Vec<Option<f64>>> {
    match mode {
        Relativity::Absolute => Ok(trial.durations().into_iter().map(Some).collect()),
        Relativity::Directional => {
            let durations: Vec<Option<f64>> = trial.durations().into_iter().map(Some).collect();
            Ok(first_difference(&durations)
                .into_iter()
                .map(|v| v.map(sign))
                .collect())
        }
        Relativity::Relative => {
            // Never substitute raw durations.
            if !trial.has_rel_dur() {
                return Err(SequencerError::missing_rel_dur(Some(trial.key.clone())));
            }
            Ok(trial.relative_durations())
        }
    }
}

fn regions_as_f64(regions: &[Option<i64>]) -> Vec<Option<f64>> {
    regions.iter().map(|r| r.map(|v| v as f64)).collect()
}

/// `values[j] - values[j - 1]`, undefined at `j = 0`.
fn first_difference(values: &[Option<f64>]) -> Vec<Option<f64>> {
    std::iter::once(None)
        .chain(values.windows(2).map(|pair| match (pair[0], pair[1]) {
            (Some(prev), Some(curr)) => Some(curr - prev),
            _ => None,
        }))
        .take(values.len())
        .collect()
}

/// Three-way sign; unlike `f64::signum`, zero stays zero.
fn sign(value: f64) -> f64 {
    if value > 0.0 {
        1.0
    } else if value < 0.0 {
        -1.0
    } else {
        0.0
    }
}

impl fmt::Display for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Transform {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let wanted = s.trim();
        Transform::ALL
            .iter()
            .copied()
            .find(|t| t.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| format!("unknown transform `{wanted}`"))
    }
}

impl TryFrom<String> for Transform {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Transform> for String {
    fn from(value: Transform) -> Self {
        value.name().to_string()
    }
}
