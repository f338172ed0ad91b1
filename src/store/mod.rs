/// Run store abstraction layer
///
/// Provides the RunStore trait and the persisted record types. A stored run is
/// split over two relations sharing one generated identity: measured results
/// in `index_bench`, the arguments the run used in `execution_args`.
/// The store is append-only: nothing here updates or deletes runs.

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::analysis::{RunConfiguration, RunResult};
use crate::errors::BenchError;

pub mod sqlite;

/// Identity shared by a run's `index_bench` and `execution_args` rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RunId(pub i64);

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A run as persisted, joined back together from both relations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredRun {
    pub id: RunId,
    /// Assigned by the store at insertion time. None for rows written
    /// without one by older harness versions.
    pub timestamp: Option<DateTime<Utc>>,
    /// Name of the benchmarked executable
    pub index_type: String,
    /// Name of the workload input file
    pub workload_file: String,
    pub result: RunResult,
    pub config: RunConfiguration,
}

/// Core abstraction for run persistence.
///
/// One store wraps one stateful connection. The harness drives it
/// sequentially and never shares it between concurrent tasks.
#[async_trait]
pub trait RunStore: Send + Sync {
    /// Persist one run under a freshly generated identity.
    ///
    /// Both rows are written in a single transaction: either both exist
    /// afterwards or neither does.
    async fn insert_run(
        &self,
        index_type: &str,
        workload_file: &str,
        config: &RunConfiguration,
        result: &RunResult,
    ) -> Result<RunId, BenchError>;

    /// Most recent runs first, at most `limit` of them.
    async fn list_runs(&self, limit: i64) -> Result<Vec<StoredRun>, BenchError>;

    /// Number of rows in the results relation.
    async fn count_runs(&self) -> Result<i64, BenchError>;
}
