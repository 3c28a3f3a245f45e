//! Error types for the sequencing engine.

use crate::input::TrialKey;

/// Result type alias for the sequencing engine.
pub type Result<T> = std::result::Result<T, SequencerError>;

/// Errors surfaced by the windowing, combination and export stages.
///
/// All of these abort the run: the transform is a pure function of its
/// input, so repeating it on the same table fails the same way.
#[derive(Debug, thiserror::Error)]
pub enum SequencerError {
    /// A transform needs a column the input table does not carry.
    #[error("missing column `{column}`{}", trial_suffix(.trial))]
    MissingColumn {
        column: String,
        trial: Option<TrialKey>,
    },

    /// A selected prefix or auxiliary column is absent from the table.
    #[error("schema mismatch: column `{column}` is not present in the input table")]
    SchemaMismatch { column: String },

    /// The zero-position fixation of a trial already counts earlier visits.
    #[error(
        "trial {trial}: fixation at position 0 reports fixcount {fixcount}, \
         fixation numbering is not 0-indexed"
    )]
    UnindexedSequence { trial: TrialKey, fixcount: u32 },

    /// fixID values of a trial do not form the range `0..len`.
    #[error("trial {trial}: expected fixID {expected}, found {found}")]
    NonContiguousTrial {
        trial: TrialKey,
        expected: i64,
        found: i64,
    },

    /// Two fixations map to the same unique identifier.
    #[error("duplicate fixation identifier `{id}`")]
    DuplicateFixation { id: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn trial_suffix(trial: &Option<TrialKey>) -> String {
    match trial {
        Some(key) => format!(" in trial {key}"),
        None => String::new(),
    }
}

impl SequencerError {
    /// Missing `rel_dur`, optionally scoped to one trial.
    pub fn missing_rel_dur(trial: Option<TrialKey>) -> Self {
        Self::MissingColumn {
            column: "rel_dur".to_string(),
            trial,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_column_message_names_trial() {
        let err = SequencerError::missing_rel_dur(Some(TrialKey::new("s01", "text3")));
        let msg = err.to_string();
        assert!(msg.contains("rel_dur"));
        assert!(msg.contains("s01/text3"));

        let err = SequencerError::missing_rel_dur(None);
        assert_eq!(err.to_string(), "missing column `rel_dur`");
    }

    #[test]
    fn test_unindexed_message() {
        let err = SequencerError::UnindexedSequence {
            trial: TrialKey::new("a", "b"),
            fixcount: 3,
        };
        assert!(err.to_string().contains("fixcount 3"));
    }
}
