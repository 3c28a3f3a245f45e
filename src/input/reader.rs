//! Loading annotated fixation tables from disk.
//!
//! Two layouts are accepted: a JSON array of records, or JSON Lines with one
//! record per line (`.jsonl` / `.ndjson`).

use crate::error::Result;
use crate::input::types::{FixationRecord, FixationTable};
use std::io::BufRead;
use std::path::Path;

/// Read a fixation table, choosing the layout from the file extension.
pub fn read_fixations(path: impl AsRef<Path>) -> Result<FixationTable> {
    let path = path.as_ref();
    let is_lines = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("jsonl") || e.eq_ignore_ascii_case("ndjson"))
        .unwrap_or(false);

    let file = std::fs::File::open(path)?;
    let reader = std::io::BufReader::new(file);

    let table = if is_lines {
        read_json_lines(reader)?
    } else {
        let records: Vec<FixationRecord> = serde_json::from_reader(reader)?;
        FixationTable::new(records)
    };

    tracing::info!(
        "loaded {} fixations from {}",
        table.len(),
        path.display()
    );
    Ok(table)
}

/// Parse JSON Lines, skipping blank lines.
pub fn read_json_lines<R: BufRead>(reader: R) -> Result<FixationTable> {
    let mut records = Vec::new();
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        records.push(serde_json::from_str(&line)?);
    }
    Ok(FixationTable::new(records))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_json_lines_skip_blank() {
        let data = "{\"subj\":\"a\",\"stim\":\"x\",\"fixID\":0,\"dur\":100,\"aoi_id\":0,\"aoi\":\"The\",\"fixcount\":1}\n\
                    \n\
                    {\"subj\":\"a\",\"stim\":\"x\",\"fixID\":1,\"dur\":90,\"aoi_id\":1,\"aoi\":\"cat\",\"fixcount\":1}\n";
        let table = read_json_lines(data.as_bytes()).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.records()[1].aoi.as_deref(), Some("cat"));
    }

    #[test]
    fn test_read_array_file() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(
            file,
            r#"[{{"subj":"a","stim":"x","fixID":0,"dur":100,"aoi_id":null,"aoi":null,
                  "fixcount":1,"label":"O"}}]"#
        )
        .unwrap();

        let table = read_fixations(file.path()).unwrap();
        assert_eq!(table.len(), 1);
        assert!(table.has_labels());
    }

    #[test]
    fn test_record_without_region_columns_is_rejected() {
        let data = "{\"subj\":\"a\",\"stim\":\"x\",\"fixID\":0,\"dur\":100,\"fixcount\":1}\n";
        let err = read_json_lines(data.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("aoi"));

        let data = "{\"subj\":\"a\",\"stim\":\"x\",\"fixID\":0,\"dur\":100,\
                    \"aoi_id\":null,\"aoi\":null,\"fixcount\":1}\n";
        let table = read_json_lines(data.as_bytes()).unwrap();
        assert_eq!(table.records()[0].aoi, None);
    }

    #[test]
    fn test_bad_json_is_error() {
        let err = read_json_lines("{not json}".as_bytes()).unwrap_err();
        assert!(err.to_string().contains("JSON"));
    }
}
