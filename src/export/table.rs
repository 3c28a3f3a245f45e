//! JSON writers for the tabular outputs.
//!
//! Windowed and combined tables are written as JSON Lines, one object per
//! fixation keyed by `uniqID`, with `null` for missing cells. Sequence sets
//! are written as a single pretty-printed JSON document.

use crate::core::features::FeatureTable;
use crate::core::sequence::SequenceSet;
use crate::core::windowing::WindowedTable;
use crate::error::Result;
use crate::input::{TrialKey, UniqueId};
use indexmap::IndexMap;
use serde_json::Value;
use std::io::Write;

/// Key of the identifier field in every exported row.
pub const ID_FIELD: &str = "uniqID";

fn row_object(id: &UniqueId, trial: &TrialKey, fix_id: i64) -> IndexMap<String, Value> {
    let mut object = IndexMap::new();
    object.insert(ID_FIELD.to_string(), Value::String(id.to_string()));
    object.insert("subj".to_string(), Value::String(trial.subj.clone()));
    object.insert("stim".to_string(), Value::String(trial.stim.clone()));
    object.insert("fixID".to_string(), Value::from(fix_id));
    object
}

/// Write the full windowed schema, one line per fixation.
pub fn write_windowed_jsonl<W: Write>(table: &WindowedTable, mut writer: W) -> Result<usize> {
    let keys = table.column_keys();
    let names: Vec<String> = keys.iter().map(|k| k.name()).collect();

    for row in table.rows() {
        let mut object = row_object(&row.id, &row.trial, row.fix_id);
        for (key, name) in keys.iter().zip(&names) {
            object.insert(name.clone(), table.value(row, key).to_json());
        }
        serde_json::to_writer(&mut writer, &object)?;
        writeln!(writer)?;
    }
    writer.flush()?;
    Ok(table.len())
}

/// Write the combined feature table, one line per fixation.
pub fn write_features_jsonl<W: Write>(table: &FeatureTable, mut writer: W) -> Result<usize> {
    let names = table.column_names();

    for row in table.rows() {
        let mut object = row_object(&row.id, &row.trial, row.fix_id);
        for (name, value) in names.iter().zip(&row.values) {
            object.insert(name.clone(), value.to_json());
        }
        serde_json::to_writer(&mut writer, &object)?;
        writeln!(writer)?;
    }
    writer.flush()?;
    Ok(table.len())
}

/// Write a sequence set as pretty JSON.
pub fn write_sequences_json<W: Write>(set: &SequenceSet, mut writer: W) -> Result<()> {
    serde_json::to_writer_pretty(&mut writer, set)?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}
