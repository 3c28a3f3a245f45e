//! Progress reporting for engine runs.

mod log;

pub use log::{
    create_shared_log_with_persistence, NoopObserver, ProgressObserver, RunLog, RunStats,
    SharedRunLog,
};
