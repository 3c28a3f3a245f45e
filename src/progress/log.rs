//! Run statistics and progress reporting at trial boundaries.
//!
//! The engine never prints. Stages call a [`ProgressObserver`] when a run
//! starts, when a trial starts and when it completes; [`RunLog`] is the
//! stock observer that counts what happened and emits `tracing` events.

use crate::input::TrialKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Hooks invoked by the engine at run and trial boundaries.
pub trait ProgressObserver: Send + Sync {
    /// A windowing run over `trials` trials is starting.
    fn on_run_start(&self, _trials: usize) {}

    /// Trial `index` (0-based) is about to be processed.
    fn on_trial_start(&self, _trial: &TrialKey, _index: usize) {}

    /// Trial finished with `fixations` rows produced.
    fn on_trial_complete(&self, _trial: &TrialKey, _fixations: usize) {}

    /// Sequences were emitted for `trials` trials.
    fn on_sequences_emitted(&self, _trials: usize) {}

    /// `lines` data lines were written by an exporter.
    fn on_lines_exported(&self, _lines: usize) {}
}

/// Observer that ignores every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ProgressObserver for NoopObserver {}

/// Counters for one engine session.
#[derive(Debug)]
pub struct RunLog {
    /// Trials fully windowed
    trials_processed: AtomicU64,
    /// Fixation rows produced by the windower
    fixations_windowed: AtomicU64,
    /// Trials turned into sequences
    sequences_emitted: AtomicU64,
    /// Data lines written by exporters
    lines_exported: AtomicU64,
    /// Trials announced at run start
    trials_expected: AtomicU64,
    /// Subject of the trial in progress
    current_subject: Mutex<Option<String>>,
    /// Session start time
    session_start: DateTime<Utc>,
    /// Path for persisting stats
    persist_path: Option<PathBuf>,
}

impl RunLog {
    pub fn new() -> Self {
        Self {
            trials_processed: AtomicU64::new(0),
            fixations_windowed: AtomicU64::new(0),
            sequences_emitted: AtomicU64::new(0),
            lines_exported: AtomicU64::new(0),
            trials_expected: AtomicU64::new(0),
            current_subject: Mutex::new(None),
            session_start: Utc::now(),
            persist_path: None,
        }
    }

    /// Create a run log that accumulates into a JSON file across runs.
    pub fn with_persistence(path: PathBuf) -> Self {
        let mut log = Self::new();
        log.persist_path = Some(path);

        if let Err(e) = log.load() {
            tracing::warn!("could not load previous run stats: {e}");
        }

        log
    }

    /// Get the current statistics.
    pub fn stats(&self) -> RunStats {
        RunStats {
            trials_processed: self.trials_processed.load(Ordering::Relaxed),
            fixations_windowed: self.fixations_windowed.load(Ordering::Relaxed),
            sequences_emitted: self.sequences_emitted.load(Ordering::Relaxed),
            lines_exported: self.lines_exported.load(Ordering::Relaxed),
            session_start: self.session_start,
            session_duration_secs: (Utc::now() - self.session_start).num_seconds().max(0) as u64,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.stats();
        format!(
            "Run Statistics:\n\
             - Trials windowed: {}\n\
             - Fixations windowed: {}\n\
             - Sequences emitted: {}\n\
             - Lines exported: {}\n\
             - Session duration: {} seconds",
            stats.trials_processed,
            stats.fixations_windowed,
            stats.sequences_emitted,
            stats.lines_exported,
            stats.session_duration_secs
        )
    }

    /// Save stats to disk.
    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let stats = self.stats();
            let persisted = PersistedStats {
                trials_processed: stats.trials_processed,
                fixations_windowed: stats.fixations_windowed,
                sequences_emitted: stats.sequences_emitted,
                lines_exported: stats.lines_exported,
                last_updated: Utc::now(),
            };

            let json = serde_json::to_string_pretty(&persisted).map_err(std::io::Error::other)?;
            std::fs::write(path, json)?;
        }
        Ok(())
    }

    fn load(&mut self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if path.exists() {
                let content = std::fs::read_to_string(path)?;
                let persisted: PersistedStats =
                    serde_json::from_str(&content).map_err(std::io::Error::other)?;

                self.trials_processed
                    .store(persisted.trials_processed, Ordering::Relaxed);
                self.fixations_windowed
                    .store(persisted.fixations_windowed, Ordering::Relaxed);
                self.sequences_emitted
                    .store(persisted.sequences_emitted, Ordering::Relaxed);
                self.lines_exported
                    .store(persisted.lines_exported, Ordering::Relaxed);
            }
        }
        Ok(())
    }

    /// Reset all counters.
    pub fn reset(&self) {
        self.trials_processed.store(0, Ordering::Relaxed);
        self.fixations_windowed.store(0, Ordering::Relaxed);
        self.sequences_emitted.store(0, Ordering::Relaxed);
        self.lines_exported.store(0, Ordering::Relaxed);
        self.trials_expected.store(0, Ordering::Relaxed);
    }
}

impl Default for RunLog {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressObserver for RunLog {
    fn on_run_start(&self, trials: usize) {
        self.trials_expected.store(trials as u64, Ordering::Relaxed);
        tracing::info!("windowing {trials} trials");
    }

    fn on_trial_start(&self, trial: &TrialKey, index: usize) {
        let expected = self.trials_expected.load(Ordering::Relaxed);
        let mut current = match self.current_subject.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if current.as_deref() != Some(trial.subj.as_str()) {
            *current = Some(trial.subj.clone());
            tracing::debug!(
                subject = %trial.subj,
                remaining = expected.saturating_sub(index as u64),
                "starting subject"
            );
        }
    }

    fn on_trial_complete(&self, trial: &TrialKey, fixations: usize) {
        self.trials_processed.fetch_add(1, Ordering::Relaxed);
        self.fixations_windowed
            .fetch_add(fixations as u64, Ordering::Relaxed);
        tracing::trace!(trial = %trial, fixations, "trial windowed");
    }

    fn on_sequences_emitted(&self, trials: usize) {
        self.sequences_emitted
            .fetch_add(trials as u64, Ordering::Relaxed);
    }

    fn on_lines_exported(&self, lines: usize) {
        self.lines_exported.fetch_add(lines as u64, Ordering::Relaxed);
    }
}

/// Snapshot of run statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunStats {
    pub trials_processed: u64,
    pub fixations_windowed: u64,
    pub sequences_emitted: u64,
    pub lines_exported: u64,
    pub session_start: DateTime<Utc>,
    pub session_duration_secs: u64,
}

/// Stats format for persistence.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedStats {
    trials_processed: u64,
    fixations_windowed: u64,
    sequences_emitted: u64,
    lines_exported: u64,
    last_updated: DateTime<Utc>,
}

/// Thread-safe shared run log.
pub type SharedRunLog = Arc<RunLog>;

pub fn create_shared_log_with_persistence(path: PathBuf) -> SharedRunLog {
    Arc::new(RunLog::with_persistence(path))
}
