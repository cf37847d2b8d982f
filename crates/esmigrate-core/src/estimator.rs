//! Reindex parameter estimation.
//!
//! | Documents | Slices | Timeout | Poll interval |
//! |-----------|--------|---------|---------------|
//! | < 100K    | 1      | 300 s   | 5 s           |
//! | < 1M      | 4      | 600 s   | 10 s          |
//! | < 5M      | 8      | 1800 s  | 15 s          |
//! | < 50M     | 16     | 7200 s  | 30 s          |
//! | < 100M    | 32     | 10800 s | 45 s          |
//! | >= 100M   | refused                          ||
//!
//! Datasets of 100M documents and more must be migrated in operator-driven
//! batches.

use std::time::Duration;

/// Parameters for one reindex job, derived from the source document count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EstimatedParams {
    /// Number of slices. Zero means "do not migrate automatically".
    pub parallelism: u32,
    /// Ceiling on how long the task is observed.
    pub timeout: Duration,
    /// Delay between status polls.
    pub poll_interval: Duration,
}

impl EstimatedParams {
    const fn new(parallelism: u32, timeout_secs: u64, poll_secs: u64) -> Self {
        Self {
            parallelism,
            timeout: Duration::from_secs(timeout_secs),
            poll_interval: Duration::from_secs(poll_secs),
        }
    }

    /// The refusal sentinel.
    pub const REFUSED: EstimatedParams = EstimatedParams::new(0, 0, 0);

    /// Whether automatic migration is refused.
    pub fn is_refused(&self) -> bool {
        self.parallelism == 0
    }

    /// Upper bound on status polls: `ceil(timeout / poll_interval)`.
    pub fn max_polls(&self) -> u64 {
        let interval = self.poll_interval.as_millis();
        if interval == 0 {
            return 0;
        }
        self.timeout.as_millis().div_ceil(interval) as u64
    }
}

/// Exclusive upper document bounds and the parameters that apply below them.
const THRESHOLDS: [(u64, EstimatedParams); 5] = [
    (100_000, EstimatedParams::new(1, 300, 5)),
    (1_000_000, EstimatedParams::new(4, 600, 10)),
    (5_000_000, EstimatedParams::new(8, 1_800, 15)),
    (50_000_000, EstimatedParams::new(16, 7_200, 30)),
    (100_000_000, EstimatedParams::new(32, 10_800, 45)),
];

/// Map a document count to reindex parameters.
pub fn estimate(doc_count: u64) -> EstimatedParams {
    THRESHOLDS
        .iter()
        .find(|(bound, _)| doc_count < *bound)
        .map(|(_, params)| *params)
        .unwrap_or(EstimatedParams::REFUSED)
}
