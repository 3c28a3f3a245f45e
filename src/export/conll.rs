//! CoNLL-style line export of the windowed table.
//!
//! One header line, then one line per fixation. A blank line precedes every
//! fixation with fixID 0, so each trial forms one block.

use crate::core::schema::{ColumnKey, OffsetWindow, Passthrough};
use crate::core::transforms::{Relativity, Transform};
use crate::core::windowing::{SnippetRow, WindowedTable};
use crate::error::{Result, SequencerError};
use crate::progress::ProgressObserver;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

/// Settings for the line export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConllConfig {
    /// Field separator
    pub delimiter: String,
    /// Offsets written per prefix
    pub window: OffsetWindow,
    /// Transforms written, in order
    pub prefixes: Vec<Transform>,
    /// Passthrough columns written after the label
    pub auxiliary: Vec<Passthrough>,
    /// Token written for missing cells
    pub missing: String,
}

impl Default for ConllConfig {
    fn default() -> Self {
        Self {
            delimiter: " ".to_string(),
            window: OffsetWindow::default(),
            prefixes: vec![
                Transform::SaccadeDistance(Relativity::Absolute),
                Transform::FixationDuration(Relativity::Absolute),
            ],
            auxiliary: vec![Passthrough::Aoi, Passthrough::Fixcount],
            missing: "NA".to_string(),
        }
    }
}

/// Writes a [`WindowedTable`] as a CoNLL-style sequence file.
pub struct ConllExporter {
    config: ConllConfig,
    observer: Option<Arc<dyn ProgressObserver>>,
}

impl ConllExporter {
    pub fn new(config: ConllConfig) -> Self {
        Self {
            config,
            observer: None,
        }
    }

    /// Report written line counts to `observer`.
    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn config(&self) -> &ConllConfig {
        &self.config
    }

    /// Columns after the leading label, in output order.
    pub fn columns(&self) -> Vec<ColumnKey> {
        let mut columns: Vec<ColumnKey> = self
            .config
            .auxiliary
            .iter()
            .filter(|&&p| p != Passthrough::Label)
            .map(|&p| ColumnKey::Passthrough(p))
            .collect();
        for &transform in &self.config.prefixes {
            columns.extend(
                self.config
                    .window
                    .iter()
                    .map(|offset| ColumnKey::Window { transform, offset }),
            );
        }
        columns
    }

    /// Header line without the trailing newline.
    pub fn header(&self) -> String {
        std::iter::once(Passthrough::Label.name().to_string())
            .chain(self.columns().iter().map(ColumnKey::name))
            .collect::<Vec<_>>()
            .join(&self.config.delimiter)
    }

    /// Write header and data lines; returns the number of data lines.
    pub fn write<W: Write>(&self, table: &WindowedTable, mut writer: W) -> Result<usize> {
        for &transform in &self.config.prefixes {
            if table.transform_index(transform).is_none() {
                return Err(SequencerError::SchemaMismatch {
                    column: transform.name().to_string(),
                });
            }
        }
        if let Some(absent) = self.config.auxiliary.iter().find(|&&p| !table.has_passthrough(p)) {
            return Err(SequencerError::SchemaMismatch {
                column: absent.name().to_string(),
            });
        }

        let columns = self.columns();
        writeln!(writer, "{}", self.header())?;

        let mut lines = 0;
        for row in table.rows() {
            if row.fix_id == 0 {
                writeln!(writer)?;
            }
            writeln!(writer, "{}", self.line(table, &columns, row))?;
            lines += 1;
        }
        writer.flush()?;

        if let Some(observer) = &self.observer {
            observer.on_lines_exported(lines);
        }
        tracing::debug!("wrote {lines} sequence lines");
        Ok(lines)
    }

    /// Write to a file, creating or truncating it.
    pub fn write_to_path(&self, table: &WindowedTable, path: &Path) -> Result<usize> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = File::create(path)?;
        let lines = self.write(table, BufWriter::new(file))?;
        tracing::info!("exported {lines} lines to {}", path.display());
        Ok(lines)
    }

    fn line(&self, table: &WindowedTable, columns: &[ColumnKey], row: &SnippetRow) -> String {
        let label = ColumnKey::Passthrough(Passthrough::Label);
        std::iter::once(&label)
            .chain(columns)
            .map(|key| {
                table
                    .value(row, key)
                    .render()
                    .unwrap_or_else(|| self.config.missing.clone())
            })
            .collect::<Vec<_>>()
            .join(&self.config.delimiter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::windowing::{WindowConfig, Windower};
    use crate::input::types::tests::record;
    use crate::input::FixationTable;
    use crate::progress::{NoopObserver, RunLog};

    const SACC: Transform = Transform::SaccadeDistance(Relativity::Absolute);
    const FIXD: Transform = Transform::FixationDuration(Relativity::Absolute);

    fn windowed() -> WindowedTable {
        let mut records = vec![
            record("s", "t1", 0, 0, 100.0),
            record("s", "t1", 1, 1, 150.0),
            record("s", "t2", 0, 2, 90.0),
        ];
        records[0].label = Some("O".into());
        records[1].label = Some("B".into());
        Windower::new(WindowConfig::new(vec![FIXD, SACC]))
            .process(&FixationTable::new(records), &NoopObserver)
            .unwrap()
    }

    fn exporter() -> ConllExporter {
        ConllExporter::new(ConllConfig {
            delimiter: " ".into(),
            window: OffsetWindow::new(-1, 1),
            prefixes: vec![SACC],
            auxiliary: vec![Passthrough::Aoi],
            missing: "NA".into(),
        })
    }

    #[test]
    fn test_header_order() {
        assert_eq!(exporter().header(), "label aoi sacc-1 sacc0 sacc1");
    }

    #[test]
    fn test_lines_and_trial_breaks() {
        let mut out = Vec::new();
        let lines = exporter().write(&windowed(), &mut out).unwrap();
        assert_eq!(lines, 3);

        let text = String::from_utf8(out).unwrap();
        let expected = "label aoi sacc-1 sacc0 sacc1\n\
                        \n\
                        O w0 NA 0 1\n\
                        B w1 -1 0 NA\n\
                        \n\
                        NA w2 NA 0 NA\n";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_custom_delimiter() {
        let mut config = exporter().config().clone();
        config.delimiter = "\t".into();
        config.missing = "_".into();
        let mut out = Vec::new();
        ConllExporter::new(config).write(&windowed(), &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("label\taoi\tsacc-1"));
        assert!(text.contains("O\tw0\t_\t0\t1"));
    }

    #[test]
    fn test_unknown_prefix_rejected() {
        let mut config = exporter().config().clone();
        config.prefixes = vec![Transform::FixationDuration(Relativity::Relative)];
        let err = ConllExporter::new(config)
            .write(&windowed(), Vec::new())
            .unwrap_err();
        assert!(matches!(err, SequencerError::SchemaMismatch { .. }));
    }

    #[test]
    fn test_absent_aux_column_rejected() {
        let mut records = vec![record("s", "t1", 0, 0, 100.0)];
        records[0].aoi = None;
        let table = Windower::new(WindowConfig::new(vec![SACC]))
            .process(&FixationTable::new(records), &NoopObserver)
            .unwrap();
        let err = exporter().write(&table, Vec::new()).unwrap_err();
        assert!(matches!(
            err,
            SequencerError::SchemaMismatch { ref column } if column == "aoi"
        ));
    }

    #[test]
    fn test_write_to_path_reports_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("train.conll");
        let log = Arc::new(RunLog::new());

        let lines = exporter()
            .with_observer(log.clone())
            .write_to_path(&windowed(), &path)
            .unwrap();
        assert_eq!(lines, 3);
        assert_eq!(log.stats().lines_exported, 3);

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.lines().count(), 6);
    }
}
