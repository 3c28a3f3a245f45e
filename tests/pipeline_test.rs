//! Integration tests for the windowing and sequencing pipeline

use gaze_sequencer::core::{
    Aggregate, ColumnKey, FeatureRef, FeatureValue, Passthrough, Relativity, BOS, EOS,
};
use gaze_sequencer::input::read_json_lines;
use gaze_sequencer::{
    read_fixations, CombineConfig, ConllConfig, ConllExporter, FixationRecord, FixationTable,
    IndexBase, NoopObserver, OffsetWindow, Pipeline, PipelineConfig, RunLog, SequencerError,
    Transform, TrialKey, UniqueId, WindowConfig, Windower,
};
use serde_json::json;
use std::io::Write;
use std::sync::Arc;

const SACC: Transform = Transform::SaccadeDistance(Relativity::Absolute);
const SACC_REL: Transform = Transform::SaccadeDistance(Relativity::Relative);
const SACC_DIR: Transform = Transform::SaccadeDistance(Relativity::Directional);
const FIXD: Transform = Transform::FixationDuration(Relativity::Absolute);
const FIXD_REL: Transform = Transform::FixationDuration(Relativity::Relative);
const FIXD_DIR: Transform = Transform::FixationDuration(Relativity::Directional);

fn fixation(
    subj: &str,
    stim: &str,
    fix_id: i64,
    aoi_id: i64,
    dur: f64,
    label: &str,
) -> FixationRecord {
    serde_json::from_value(json!({
        "subj": subj,
        "stim": stim,
        "fixID": fix_id,
        "dur": dur,
        "aoi_id": aoi_id,
        "aoi": format!("word{aoi_id}"),
        "fixcount": 1,
        "label": label,
    }))
    .unwrap()
}

/// Three trials of lengths 4, 2 and 1, deliberately shuffled.
fn dataset() -> FixationTable {
    FixationTable::new(vec![
        fixation("s1", "t1", 2, 1, 120.0, "O"),
        fixation("s2", "t1", 0, 1, 90.0, "B"),
        fixation("s1", "t1", 0, 0, 100.0, "B"),
        fixation("s1", "t2", 1, 2, 80.0, "O"),
        fixation("s1", "t1", 3, 3, 200.0, "B"),
        fixation("s1", "t1", 1, 1, 150.0, "O"),
        fixation("s1", "t2", 0, 0, 110.0, "B"),
    ])
}

fn trial_lengths() -> Vec<(TrialKey, usize)> {
    vec![
        (TrialKey::new("s1", "t1"), 4),
        (TrialKey::new("s1", "t2"), 2),
        (TrialKey::new("s2", "t1"), 1),
    ]
}

fn pipeline_config() -> PipelineConfig {
    PipelineConfig {
        window: WindowConfig::new(vec![FIXD, FIXD_DIR, SACC, SACC_REL, SACC_DIR]),
        combine: CombineConfig {
            prefixes: vec![SACC, FIXD, SACC_DIR],
            window: OffsetWindow::new(-1, 2),
            auxiliary: vec![Passthrough::Aoi, Passthrough::Label],
            aggregate: Aggregate::Sum,
            include_raw: true,
            offset_pairs: true,
        },
    }
}

#[test]
fn test_sequence_lengths_and_order_match_input() {
    let output = Pipeline::new(pipeline_config()).run(&dataset()).unwrap();
    let sequences = &output.sequences;

    assert_eq!(sequences.len(), 3);
    for (trial, len) in trial_lengths() {
        let seq = sequences.get(&trial).unwrap();
        assert_eq!(seq.len(), len, "trial {trial}");
        assert_eq!(seq.labels.len(), len);
        assert_eq!(seq.regions.len(), len);
    }

    let seq = sequences.get(&TrialKey::new("s1", "t1")).unwrap();
    let durations: Vec<&str> = seq
        .features
        .iter()
        .map(|f| f["fixd0"].as_str())
        .collect();
    assert_eq!(durations, vec!["100", "150", "120", "200"]);
    assert_eq!(seq.labels, &["B", "O", "O", "B"]);
    assert_eq!(seq.regions, &["word0", "word1", "word1", "word3"]);
}

#[test]
fn test_exactly_trial_length_offsets_populated() {
    let windowed = Windower::new(WindowConfig::new(vec![SACC, FIXD]))
        .process(&dataset(), &NoopObserver)
        .unwrap();
    // M = 3, so offsets -4..=4
    assert_eq!(windowed.offsets(), OffsetWindow::symmetric(4));

    let lengths = trial_lengths();
    for row in windowed.rows() {
        let len = lengths
            .iter()
            .find(|(key, _)| *key == row.trial)
            .map(|(_, len)| *len)
            .unwrap();
        for transform in [SACC, FIXD] {
            let populated: Vec<i32> = windowed
                .offsets()
                .iter()
                .filter(|&offset| {
                    !windowed
                        .value(row, &ColumnKey::Window { transform, offset })
                        .is_missing()
                })
                .collect();
            let f = row.fix_id as i32;
            let expected: Vec<i32> = (-f..len as i32 - f).collect();
            assert_eq!(populated, expected, "{} {transform}", row.id);
        }
    }
}

#[test]
fn test_windowing_is_idempotent() {
    let table = dataset();
    let windower = Windower::new(WindowConfig::default());
    let first = windower.process(&table, &NoopObserver).unwrap();
    let second = windower.process(&table, &NoopObserver).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_each_unordered_pair_materialized_once() {
    let output = Pipeline::new(pipeline_config()).run(&dataset()).unwrap();
    let columns = output.features.columns();

    let operands = [
        FeatureRef::Group(SACC),
        FeatureRef::Group(FIXD),
        FeatureRef::Group(SACC_DIR),
        FeatureRef::Aux(Passthrough::Aoi),
        FeatureRef::Aux(Passthrough::Label),
    ];
    for (i, a) in operands.iter().enumerate() {
        for b in &operands[i + 1..] {
            let matching = columns
                .iter()
                .filter(|c| match c {
                    ColumnKey::Pair { first, second } => {
                        (first == a && second == b) || (first == b && second == a)
                    }
                    _ => false,
                })
                .count();
            assert_eq!(matching, 1, "{} / {}", a.name(), b.name());
        }
    }

    let names = output.features.column_names();
    let mut sorted = names.clone();
    sorted.sort();
    sorted.dedup();
    assert_eq!(sorted.len(), names.len());
}

#[test]
fn test_boundary_markers_per_trial() {
    let output = Pipeline::new(pipeline_config()).run(&dataset()).unwrap();

    for seq in output.sequences.iter() {
        let bos = seq.features.iter().filter(|f| f.contains_key(BOS)).count();
        let eos = seq.features.iter().filter(|f| f.contains_key(EOS)).count();
        assert_eq!((bos, eos), (1, 1), "trial {}", seq.trial);
        assert_eq!(seq.features[0][BOS], "true");
        assert_eq!(seq.features[seq.len() - 1][EOS], "true");
    }

    let single = output
        .sequences
        .get(&TrialKey::new("s2", "t1"))
        .unwrap();
    assert!(single.features[0].contains_key(BOS));
    assert!(single.features[0].contains_key(EOS));
}

#[test]
fn test_transform_series_scenario() {
    let table = FixationTable::new(vec![
        fixation("s", "t", 0, 0, 100.0, "O"),
        fixation("s", "t", 1, 1, 150.0, "O"),
        fixation("s", "t", 2, 1, 120.0, "O"),
    ]);
    let trials = table.trials();
    let trial = &trials[0];

    assert_eq!(
        SACC.evaluate(trial, 0).unwrap(),
        vec![Some(0.0), Some(1.0), Some(1.0)]
    );
    assert_eq!(
        SACC.evaluate(trial, 2).unwrap(),
        vec![Some(-1.0), Some(0.0), Some(0.0)]
    );
    assert_eq!(SACC_REL.evaluate(trial, 0).unwrap(), vec![None, Some(1.0), Some(0.0)]);
    assert_eq!(SACC_DIR.evaluate(trial, 0).unwrap(), vec![None, Some(1.0), Some(0.0)]);
    assert_eq!(
        FIXD.evaluate(trial, 1).unwrap(),
        vec![Some(100.0), Some(150.0), Some(120.0)]
    );
    assert_eq!(
        FIXD_DIR.evaluate(trial, 1).unwrap(),
        vec![None, Some(1.0), Some(-1.0)]
    );
}

#[test]
fn test_relative_duration_without_column_fails_whole_run() {
    let mut config = pipeline_config();
    config.window.transforms.push(FIXD_REL);
    let log = Arc::new(RunLog::new());

    let err = Pipeline::new(config)
        .with_observer(log.clone())
        .run(&dataset())
        .unwrap_err();
    assert!(matches!(
        err,
        SequencerError::MissingColumn { ref column, .. } if column == "rel_dur"
    ));
    // nothing was windowed before the failure
    assert_eq!(log.stats().trials_processed, 0);
}

#[test]
fn test_derived_relative_durations_enable_relative_mode() {
    let mut config = pipeline_config();
    config.window.transforms.push(FIXD_REL);
    let table = dataset().with_relative_durations();

    let windowed = Windower::new(config.window)
        .process(&table, &NoopObserver)
        .unwrap();
    let row = windowed.row(&UniqueId::new("s2", "t1", 0)).unwrap();
    let value = windowed.value(
        row,
        &ColumnKey::Window {
            transform: FIXD_REL,
            offset: 0,
        },
    );
    // s2 has a single fixation, so its duration equals its mean
    assert_eq!(value, FeatureValue::Number(1.0));
}

#[test]
fn test_global_zero_check_decrements_one_based_input() {
    let one_based = FixationTable::new(vec![
        fixation("s", "t", 1, 1, 100.0, "O"),
        fixation("s", "t", 2, 2, 150.0, "O"),
        fixation("s", "u", 1, 3, 90.0, "O"),
    ]);
    let windowed = Windower::new(WindowConfig::default())
        .process(&one_based, &NoopObserver)
        .unwrap();
    assert!(windowed.adjustment().fix_id_shifted);
    assert!(windowed.adjustment().aoi_id_shifted);
    let first = windowed.row(&UniqueId::new("s", "t", 0)).unwrap();
    assert_eq!(first.aoi_id, Some(0));
    assert!(windowed.row(&UniqueId::new("s", "u", 0)).is_some());

    let zero_based = Windower::new(WindowConfig::default())
        .process(&dataset(), &NoopObserver)
        .unwrap();
    assert!(!zero_based.adjustment().fix_id_shifted);
    assert!(!zero_based.adjustment().aoi_id_shifted);
    assert!(zero_based.row(&UniqueId::new("s1", "t1", 3)).is_some());
}

#[test]
fn test_explicit_index_base_overrides_heuristic() {
    // A zero-based trial whose first fixation is missing would be shifted by
    // the heuristic; declaring the base keeps it and reports the gap.
    let table = FixationTable::new(vec![
        fixation("s", "t", 1, 0, 100.0, "O"),
        fixation("s", "t", 2, 1, 150.0, "O"),
    ]);
    let err = Windower::new(WindowConfig::default().with_index_base(IndexBase::ZeroBased))
        .process(&table, &NoopObserver)
        .unwrap_err();
    assert!(matches!(
        err,
        SequencerError::NonContiguousTrial {
            expected: 0,
            found: 1,
            ..
        }
    ));
}

#[test]
fn test_conll_export_from_jsonl_file() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("fixations.jsonl");
    {
        let mut file = std::fs::File::create(&input).unwrap();
        for record in dataset().records() {
            writeln!(file, "{}", serde_json::to_string(record).unwrap()).unwrap();
        }
    }

    let table = read_fixations(&input).unwrap();
    assert_eq!(table.len(), 7);

    let windowed = Windower::new(WindowConfig::default())
        .process(&table, &NoopObserver)
        .unwrap();
    let exporter = ConllExporter::new(ConllConfig {
        delimiter: "\t".to_string(),
        window: OffsetWindow::new(-1, 1),
        prefixes: vec![FIXD],
        auxiliary: vec![Passthrough::Aoi],
        missing: "NA".to_string(),
    });
    let output = dir.path().join("train.conll");
    let lines = exporter.write_to_path(&windowed, &output).unwrap();
    assert_eq!(lines, 7);

    let content = std::fs::read_to_string(&output).unwrap();
    let all: Vec<&str> = content.lines().collect();
    assert_eq!(all[0], "label\taoi\tfixd-1\tfixd0\tfixd1");
    // header + 7 fixations + one blank line per trial
    assert_eq!(all.len(), 1 + 7 + 3);
    assert_eq!(all[1], "");
    assert_eq!(all[2], "B\tword0\tNA\t100\t150");
    assert_eq!(all.iter().filter(|l| l.is_empty()).count(), 3);
}

#[test]
fn test_json_lines_reader_accepts_numeric_ids() {
    let data = "{\"subj\": 7, \"stim\": 3, \"fixID\": 0, \"dur\": 210.5, \"aoi_id\": 0, \"aoi\": \"Der\", \"fixcount\": 1, \"label\": 1}\n";
    let table = read_json_lines(data.as_bytes()).unwrap();
    let record = &table.records()[0];
    assert_eq!(record.unique_id().as_str(), "7_3_0");
    assert_eq!(record.label.as_deref(), Some("1"));
}
