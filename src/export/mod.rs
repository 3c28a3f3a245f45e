//! Writers for the engine's outputs.

pub mod conll;
pub mod table;

pub use conll::{ConllConfig, ConllExporter};
pub use table::{write_features_jsonl, write_sequences_json, write_windowed_jsonl, ID_FIELD};
