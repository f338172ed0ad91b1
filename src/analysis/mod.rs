/// Benchmark run model: what a run was configured with and what it measured.
///
/// The executable echoes its effective configuration into its own log, so both
/// records are normally recovered by `parser` from captured output. The TOML
/// loader here only exists to state what the harness asked for.

pub mod executor;
pub mod parser;

use std::path::Path;

use figment::{
    Figment,
    providers::{Format, Toml},
};
use serde::{Deserialize, Serialize};

use crate::errors::BenchError;

/// Parameters of a single benchmark invocation (stored in `execution_args`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfiguration {
    pub blocks_in_memory: i64,
    pub raw_read_perc: f64,
    pub raw_write_perc: f64,
    pub mixed_writes_perc: f64,
    pub mixed_reads_perc: f64,
    pub updates_perc: f64,
    pub short_range: f64,
    pub mid_range: f64,
    pub long_range: f64,
    pub runs: i64,
    pub repeat: i64,
    pub seed: i64,
    pub num_threads: i64,
    pub results_csv: String,
    pub results_log: String,
    pub binary_input: bool,
    pub validate: bool,
    pub verbose: bool,
    /// Workload path(s) the executable was invoked with
    pub input_file: String,
}

impl Default for RunConfiguration {
    fn default() -> Self {
        RunConfiguration {
            blocks_in_memory: 2_000_000,
            raw_read_perc: 0.0,
            raw_write_perc: 0.0,
            mixed_writes_perc: 0.0,
            mixed_reads_perc: 0.0,
            updates_perc: 0.0,
            short_range: 0.0,
            mid_range: 0.0,
            long_range: 0.0,
            runs: 1,
            repeat: 1,
            seed: 1234,
            num_threads: 1,
            results_csv: "results.csv".to_string(),
            results_log: "results.log".to_string(),
            binary_input: true,
            validate: false,
            verbose: false,
            input_file: String::new(),
        }
    }
}

impl RunConfiguration {
    /// Configuration with every field at its "not reported" value: 0, "" or false.
    ///
    /// This is what the parser starts from, so a field the log never mentions
    /// is recorded as absent rather than as a plausible-looking default.
    pub fn unreported() -> Self {
        RunConfiguration {
            blocks_in_memory: 0,
            raw_read_perc: 0.0,
            raw_write_perc: 0.0,
            mixed_writes_perc: 0.0,
            mixed_reads_perc: 0.0,
            updates_perc: 0.0,
            short_range: 0.0,
            mid_range: 0.0,
            long_range: 0.0,
            runs: 0,
            repeat: 0,
            seed: 0,
            num_threads: 0,
            results_csv: String::new(),
            results_log: String::new(),
            binary_input: false,
            validate: false,
            verbose: false,
            input_file: String::new(),
        }
    }

    /// Load a run configuration file (TOML with uppercase knob names).
    ///
    /// Every key is required; a partial file is a configuration error.
    pub fn from_file(path: &Path) -> Result<Self, BenchError> {
        if !path.is_file() {
            return Err(BenchError::Config(format!(
                "Run configuration file '{}' does not exist",
                path.display()
            )));
        }

        let file: RunConfigurationFile = Figment::from(Toml::file(path))
            .extract()
            .map_err(|e| {
                BenchError::Config(format!(
                    "Invalid run configuration '{}': {}",
                    path.display(),
                    e
                ))
            })?;

        Ok(file.into())
    }
}

/// On-disk layout of a run configuration file. No serde defaults on purpose:
/// a missing key must fail extraction.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RunConfigurationFile {
    #[serde(rename = "BLOCKS_IN_MEMORY")]
    blocks_in_memory: i64,
    #[serde(rename = "RAW_READ_PERCENTAGE")]
    raw_read_perc: f64,
    #[serde(rename = "RAW_WRITE_PERCENTAGE")]
    raw_write_perc: f64,
    #[serde(rename = "MIXED_WRITES_PERCENTAGE")]
    mixed_writes_perc: f64,
    #[serde(rename = "MIXED_READS_PERCENTAGE")]
    mixed_reads_perc: f64,
    #[serde(rename = "UPDATES_PERCENTAGE")]
    updates_perc: f64,
    #[serde(rename = "SHORT_RANGE_QUERIES")]
    short_range: f64,
    #[serde(rename = "MID_RANGE_QUERIES")]
    mid_range: f64,
    #[serde(rename = "LONG_RANGE_QUERIES")]
    long_range: f64,
    #[serde(rename = "RUNS")]
    runs: i64,
    #[serde(rename = "REPEAT")]
    repeat: i64,
    #[serde(rename = "SEED")]
    seed: i64,
    #[serde(rename = "NUM_THREADS")]
    num_threads: i64,
    #[serde(rename = "RESULTS_FILE")]
    results_csv: String,
    #[serde(rename = "RESULTS_LOG")]
    results_log: String,
    #[serde(rename = "BINARY_INPUT")]
    binary_input: bool,
    #[serde(rename = "VALIDATE")]
    validate: bool,
    #[serde(rename = "VERBOSE")]
    verbose: bool,
}

impl From<RunConfigurationFile> for RunConfiguration {
    fn from(f: RunConfigurationFile) -> Self {
        RunConfiguration {
            blocks_in_memory: f.blocks_in_memory,
            raw_read_perc: f.raw_read_perc,
            raw_write_perc: f.raw_write_perc,
            mixed_writes_perc: f.mixed_writes_perc,
            mixed_reads_perc: f.mixed_reads_perc,
            updates_perc: f.updates_perc,
            short_range: f.short_range,
            mid_range: f.mid_range,
            long_range: f.long_range,
            runs: f.runs,
            repeat: f.repeat,
            seed: f.seed,
            num_threads: f.num_threads,
            results_csv: f.results_csv,
            results_log: f.results_log,
            binary_input: f.binary_input,
            validate: f.validate,
            verbose: f.verbose,
            input_file: String::new(),
        }
    }
}

/// Measured outcome of one invocation (stored in `index_bench`).
///
/// Every field is zero when the benchmark did not report it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunResult {
    // latency, in the executable's native time unit
    pub preload_time: i64,
    pub raw_writes_time: i64,
    pub raw_reads_time: i64,
    pub mixed_time: i64,
    pub updates_time: i64,
    pub short_range_time: i64,
    pub mid_range_time: i64,
    pub long_range_time: i64,

    // index structure and maintenance counters
    pub size: i64,
    pub height: i64,
    pub internal: i64,
    pub leaves: i64,
    pub fast_inserts: i64,
    pub redistribute: i64,
    pub soft_resets: i64,
    pub hard_resets: i64,
    pub fast_inserts_fail: i64,
    pub sort: i64,

    // workload identity
    pub n: i64,
    pub k: i64,
    pub l: i64,
    /// Copied from the configuration, never measured
    pub threads: i64,
}

/// Both records recovered from one benchmark's output.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedRun {
    pub config: RunConfiguration,
    pub result: RunResult,
}

/// Log every measured value of a run at info level.
pub fn log_stats(result: &RunResult) {
    tracing::info!(
        n = result.n,
        k = result.k,
        l = result.l,
        threads = result.threads,
        preload_time = result.preload_time,
        raw_writes_time = result.raw_writes_time,
        raw_reads_time = result.raw_reads_time,
        mixed_time = result.mixed_time,
        updates_time = result.updates_time,
        short_range_time = result.short_range_time,
        mid_range_time = result.mid_range_time,
        long_range_time = result.long_range_time,
        "Run latencies"
    );
    tracing::info!(
        size = result.size,
        height = result.height,
        internal = result.internal,
        leaves = result.leaves,
        fast_inserts = result.fast_inserts,
        redistribute = result.redistribute,
        soft_resets = result.soft_resets,
        hard_resets = result.hard_resets,
        fast_inserts_fail = result.fast_inserts_fail,
        sort = result.sort,
        "Index statistics"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_FILE: &str = r#"
        BLOCKS_IN_MEMORY = 4096
        RAW_READ_PERCENTAGE = 10
        RAW_WRITE_PERCENTAGE = 20
        MIXED_WRITES_PERCENTAGE = 30
        MIXED_READS_PERCENTAGE = 25
        UPDATES_PERCENTAGE = 15
        SHORT_RANGE_QUERIES = 0.5
        MID_RANGE_QUERIES = 0.3
        LONG_RANGE_QUERIES = 0.2
        RUNS = 3
        REPEAT = 2
        SEED = 42
        NUM_THREADS = 8
        RESULTS_FILE = "out.csv"
        RESULTS_LOG = "out.log"
        BINARY_INPUT = false
        VALIDATE = true
        VERBOSE = false
    "#;

    #[test]
    fn test_from_file_reads_every_knob() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.toml");
        std::fs::write(&path, FULL_FILE).unwrap();

        let config = RunConfiguration::from_file(&path).unwrap();
        assert_eq!(config.blocks_in_memory, 4096);
        assert_eq!(config.raw_read_perc, 10.0);
        assert_eq!(config.mixed_reads_perc, 25.0);
        assert_eq!(config.short_range, 0.5);
        assert_eq!(config.runs, 3);
        assert_eq!(config.num_threads, 8);
        assert_eq!(config.results_csv, "out.csv");
        assert!(!config.binary_input);
        assert!(config.validate);
        assert_eq!(config.input_file, "");
    }

    #[test]
    fn test_from_file_rejects_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.toml");
        let partial: String = FULL_FILE
            .lines()
            .filter(|l| !l.contains("NUM_THREADS"))
            .collect::<Vec<_>>()
            .join("\n");
        std::fs::write(&path, partial).unwrap();

        let err = RunConfiguration::from_file(&path).unwrap_err();
        assert!(matches!(err, BenchError::Config(_)));
        assert!(err.to_string().contains("NUM_THREADS"));
    }

    #[test]
    fn test_from_file_missing_file() {
        let err = RunConfiguration::from_file(Path::new("/nonexistent/run.toml")).unwrap_err();
        assert!(matches!(err, BenchError::Config(_)));
    }

    #[test]
    fn test_defaults_differ_from_unreported() {
        let defaults = RunConfiguration::default();
        assert_eq!(defaults.blocks_in_memory, 2_000_000);
        assert_eq!(defaults.seed, 1234);
        assert!(defaults.binary_input);

        let unreported = RunConfiguration::unreported();
        assert_eq!(unreported.blocks_in_memory, 0);
        assert_eq!(unreported.results_csv, "");
        assert!(!unreported.binary_input);
    }
}
