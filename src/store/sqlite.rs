/// SQLite-backed implementation of RunStore
///
/// Uses sqlx with WAL mode and foreign keys enabled.
/// Runs migrations automatically on initialization, creating both relations
/// if they are absent.

use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, SubsecRound, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqliteConnection, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow, SqliteSynchronous},
    Row,
};

use crate::analysis::{RunConfiguration, RunResult};
use crate::errors::BenchError;
use crate::store::{RunId, RunStore, StoredRun};

/// SQLite-backed run store over a single pooled connection.
pub struct SqliteRunStore {
    pool: SqlitePool,
}

impl SqliteRunStore {
    /// Open (or create) the database at db_path and apply pending migrations.
    ///
    /// Accepts plain paths, `sqlite://` URIs and `sqlite::memory:`.
    pub async fn new(db_path: &str) -> Result<Self, BenchError> {
        let path = db_path.strip_prefix("sqlite://").unwrap_or(db_path);

        let opts = path
            .parse::<SqliteConnectOptions>()
            .map_err(|e| BenchError::Storage(format!("Invalid db_path '{}': {}", db_path, e)))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true);

        // One long-lived connection; an in-memory database lives exactly as long as it.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(opts)
            .await
            .map_err(|e| BenchError::Storage(format!("Failed to connect to database: {}", e)))?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        Ok(SqliteRunStore { pool })
    }
}

/// Next insertion timestamp: now, but strictly after every stored timestamp.
async fn next_timestamp(conn: &mut SqliteConnection) -> Result<DateTime<Utc>, BenchError> {
    let now = Utc::now().trunc_subsecs(6);

    let latest: Option<String> = sqlx::query_scalar("SELECT MAX(timestamp) FROM index_bench")
        .fetch_one(&mut *conn)
        .await?;

    let latest = latest.and_then(|s| s.parse::<DateTime<Utc>>().ok());
    Ok(match latest {
        Some(last) if now <= last => last + Duration::microseconds(1),
        _ => now,
    })
}

/// Both inserts of one run. The caller owns the transaction.
async fn insert_linked(
    conn: &mut SqliteConnection,
    index_type: &str,
    workload_file: &str,
    config: &RunConfiguration,
    result: &RunResult,
) -> Result<RunId, BenchError> {
    let timestamp = next_timestamp(conn).await?;

    let id = sqlx::query(
        "INSERT INTO index_bench (\
             timestamp, index_type, workload_file, N, K, L, threads, \
             preload_time, raw_writes_time, raw_reads_time, mixed_time, updates_time, \
             short_range_time, mid_range_time, long_range_time, \
             size, height, internal, leaves, fast_inserts, redistribute, \
             soft_resets, hard_resets, fast_inserts_fail, sort\
         ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(timestamp.to_rfc3339_opts(SecondsFormat::Micros, true))
    .bind(index_type)
    .bind(workload_file)
    .bind(result.n)
    .bind(result.k)
    .bind(result.l)
    .bind(result.threads)
    .bind(result.preload_time)
    .bind(result.raw_writes_time)
    .bind(result.raw_reads_time)
    .bind(result.mixed_time)
    .bind(result.updates_time)
    .bind(result.short_range_time)
    .bind(result.mid_range_time)
    .bind(result.long_range_time)
    .bind(result.size)
    .bind(result.height)
    .bind(result.internal)
    .bind(result.leaves)
    .bind(result.fast_inserts)
    .bind(result.redistribute)
    .bind(result.soft_resets)
    .bind(result.hard_resets)
    .bind(result.fast_inserts_fail)
    .bind(result.sort)
    .execute(&mut *conn)
    .await
    .map_err(|e| BenchError::Storage(format!("Failed to insert run results: {}", e)))?
    .last_insert_rowid();

    sqlx::query(
        "INSERT INTO execution_args (\
             id, blocks_in_memory, raw_read_perc, raw_write_perc, \
             mixed_writes_perc, mixed_reads_perc, updates_perc, \
             short_range, mid_range, long_range, runs, repeat, seed, \
             num_threads, results_csv, results_log, \
             binary_input, validate, verbose, input_file\
         ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(id)
    .bind(config.blocks_in_memory)
    .bind(config.raw_read_perc)
    .bind(config.raw_write_perc)
    .bind(config.mixed_writes_perc)
    .bind(config.mixed_reads_perc)
    .bind(config.updates_perc)
    .bind(config.short_range)
    .bind(config.mid_range)
    .bind(config.long_range)
    .bind(config.runs)
    .bind(config.repeat)
    .bind(config.seed)
    .bind(config.num_threads)
    .bind(&config.results_csv)
    .bind(&config.results_log)
    .bind(i64::from(config.binary_input))
    .bind(i64::from(config.validate))
    .bind(i64::from(config.verbose))
    .bind(&config.input_file)
    .execute(&mut *conn)
    .await
    .map_err(|e| BenchError::Storage(format!("Failed to insert run arguments: {}", e)))?;

    Ok(RunId(id))
}

// Columns written by older harness versions may be NULL; read them as unreported.
// A NULL timestamp is kept as None rather than invented.

fn int(row: &SqliteRow, column: &str) -> Result<i64, BenchError> {
    let v: Option<i64> = row.try_get(column).map_err(|e| BenchError::Storage(e.to_string()))?;
    Ok(v.unwrap_or_default())
}

fn real(row: &SqliteRow, column: &str) -> Result<f64, BenchError> {
    let v: Option<f64> = row.try_get(column).map_err(|e| BenchError::Storage(e.to_string()))?;
    Ok(v.unwrap_or_default())
}

fn text(row: &SqliteRow, column: &str) -> Result<String, BenchError> {
    let v: Option<String> = row.try_get(column).map_err(|e| BenchError::Storage(e.to_string()))?;
    Ok(v.unwrap_or_default())
}

fn flag(row: &SqliteRow, column: &str) -> Result<bool, BenchError> {
    Ok(int(row, column)? != 0)
}

/// Map a joined index_bench/execution_args row to a StoredRun.
fn row_to_stored_run(row: &SqliteRow) -> Result<StoredRun, BenchError> {
    let timestamp_str: Option<String> = row
        .try_get("timestamp")
        .map_err(|e| BenchError::Storage(e.to_string()))?;
    let timestamp = timestamp_str
        .map(|s| {
            s.parse::<DateTime<Utc>>()
                .map_err(|e| BenchError::Storage(format!("Parse timestamp '{}': {}", s, e)))
        })
        .transpose()?;

    let result = RunResult {
        preload_time: int(row, "preload_time")?,
        raw_writes_time: int(row, "raw_writes_time")?,
        raw_reads_time: int(row, "raw_reads_time")?,
        mixed_time: int(row, "mixed_time")?,
        updates_time: int(row, "updates_time")?,
        short_range_time: int(row, "short_range_time")?,
        mid_range_time: int(row, "mid_range_time")?,
        long_range_time: int(row, "long_range_time")?,
        size: int(row, "size")?,
        height: int(row, "height")?,
        internal: int(row, "internal")?,
        leaves: int(row, "leaves")?,
        fast_inserts: int(row, "fast_inserts")?,
        redistribute: int(row, "redistribute")?,
        soft_resets: int(row, "soft_resets")?,
        hard_resets: int(row, "hard_resets")?,
        fast_inserts_fail: int(row, "fast_inserts_fail")?,
        sort: int(row, "sort")?,
        n: int(row, "N")?,
        k: int(row, "K")?,
        l: int(row, "L")?,
        threads: int(row, "threads")?,
    };

    let config = RunConfiguration {
        blocks_in_memory: int(row, "blocks_in_memory")?,
        raw_read_perc: real(row, "raw_read_perc")?,
        raw_write_perc: real(row, "raw_write_perc")?,
        mixed_writes_perc: real(row, "mixed_writes_perc")?,
        mixed_reads_perc: real(row, "mixed_reads_perc")?,
        updates_perc: real(row, "updates_perc")?,
        short_range: real(row, "short_range")?,
        mid_range: real(row, "mid_range")?,
        long_range: real(row, "long_range")?,
        runs: int(row, "runs")?,
        repeat: int(row, "repeat")?,
        seed: int(row, "seed")?,
        num_threads: int(row, "num_threads")?,
        results_csv: text(row, "results_csv")?,
        results_log: text(row, "results_log")?,
        binary_input: flag(row, "binary_input")?,
        validate: flag(row, "validate")?,
        verbose: flag(row, "verbose")?,
        input_file: text(row, "input_file")?,
    };

    Ok(StoredRun {
        id: RunId(int(row, "id")?),
        timestamp,
        index_type: text(row, "index_type")?,
        workload_file: text(row, "workload_file")?,
        result,
        config,
    })
}

#[async_trait]
impl RunStore for SqliteRunStore {
    async fn insert_run(
        &self,
        index_type: &str,
        workload_file: &str,
        config: &RunConfiguration,
        result: &RunResult,
    ) -> Result<RunId, BenchError> {
        let mut tx = self.pool.begin().await?;

        match insert_linked(&mut tx, index_type, workload_file, config, result).await {
            Ok(id) => {
                tx.commit().await?;
                tracing::debug!(id = %id, index_type, workload_file, "Run stored");
                Ok(id)
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::error!(error = %rollback_err, "Rollback failed after insert error");
                }
                Err(e)
            }
        }
    }

    async fn list_runs(&self, limit: i64) -> Result<Vec<StoredRun>, BenchError> {
        let rows = sqlx::query(
            "SELECT b.id, b.timestamp, b.index_type, b.workload_file, b.N, b.K, b.L, b.threads, \
                    b.preload_time, b.raw_writes_time, b.raw_reads_time, b.mixed_time, b.updates_time, \
                    b.short_range_time, b.mid_range_time, b.long_range_time, \
                    b.size, b.height, b.internal, b.leaves, b.fast_inserts, b.redistribute, \
                    b.soft_resets, b.hard_resets, b.fast_inserts_fail, b.sort, \
                    a.blocks_in_memory, a.raw_read_perc, a.raw_write_perc, \
                    a.mixed_writes_perc, a.mixed_reads_perc, a.updates_perc, \
                    a.short_range, a.mid_range, a.long_range, a.runs, a.repeat, a.seed, \
                    a.num_threads, a.results_csv, a.results_log, \
                    a.binary_input, a.validate, a.verbose, a.input_file \
             FROM index_bench b \
             JOIN execution_args a ON a.id = b.id \
             ORDER BY b.id DESC \
             LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_stored_run).collect()
    }

    async fn count_runs(&self) -> Result<i64, BenchError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM index_bench")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}
