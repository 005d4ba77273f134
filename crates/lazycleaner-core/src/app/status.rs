//! Status - cleaner の状態スナップショット

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Point-in-time view of a cleaner.
///
/// `watched` and `thread_running` are read in the same critical section;
/// `pending` (notifications not yet taken by the worker) is read right after.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleanerStatus {
    pub watched: usize,
    pub thread_running: bool,
    pub keep_alive: bool,
    pub pending: usize,
    pub observed_at: DateTime<Utc>,
}
