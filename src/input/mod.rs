//! Input side of the engine: annotated fixation records and their readers.
//!
//! Format-specific eye-tracker parsing and region assignment happen upstream;
//! this module only accepts the already-annotated table.

pub mod reader;
pub mod types;

pub use reader::{read_fixations, read_json_lines};
pub use types::{
    FixationRecord, FixationTable, IndexAdjustment, IndexBase, Trial, TrialKey, UniqueId,
    ID_SEPARATOR,
};
