/// Experiment matrix runner.
///
/// Crosses every executable with every workload file and runs the pairs one
/// at a time: execute -> parse -> store. A failing pair is logged and counted,
/// then the next pair starts. Pairs already stored are never rolled back.

use std::path::{Path, PathBuf};

use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;

use crate::analysis::executor::BenchmarkExecutor;
use crate::analysis::log_stats;
use crate::errors::BenchError;
use crate::store::{RunId, RunStore};

/// One (executable, workload file) pair of the matrix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Experiment {
    pub executable: PathBuf,
    pub input_file: PathBuf,
}

impl Experiment {
    /// Label stored as `index_type`: the executable's file name.
    pub fn index_type(&self) -> String {
        file_name(&self.executable)
    }

    /// Label stored as `workload_file`: the input's file name.
    pub fn workload_file(&self) -> String {
        file_name(&self.input_file)
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Outcome counts for a whole matrix.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MatrixSummary {
    pub attempted: usize,
    pub stored: usize,
    pub failed: usize,
}

/// Build the experiment matrix: executables x files in `input_dir`.
///
/// Files are sorted by name so repeated invocations run in the same order.
/// Subdirectories are skipped.
pub fn enumerate_experiments(executables: &[PathBuf], input_dir: &Path) -> Result<Vec<Experiment>, BenchError> {
    let entries = std::fs::read_dir(input_dir).map_err(|e| {
        BenchError::validation(
            "input_dir",
            &format!("Cannot read input directory '{}': {}", input_dir.display(), e),
        )
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| BenchError::validation("input_dir", &e.to_string()))?;
        let path = entry.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();

    tracing::info!(count = files.len(), "Input files");

    let experiments: Vec<Experiment> = executables
        .iter()
        .flat_map(|executable| {
            files.iter().map(move |file| Experiment {
                executable: executable.clone(),
                input_file: file.clone(),
            })
        })
        .collect();

    tracing::info!(count = experiments.len(), "Experiments");
    Ok(experiments)
}

/// Run a single pair end to end and store it.
pub async fn run_experiment(
    experiment: &Experiment,
    executor: &BenchmarkExecutor,
    store: &dyn RunStore,
) -> Result<RunId, BenchError> {
    let run = executor
        .run(&experiment.executable, std::slice::from_ref(&experiment.input_file))
        .await?;
    log_stats(&run.result);

    store
        .insert_run(
            &experiment.index_type(),
            &experiment.workload_file(),
            &run.config,
            &run.result,
        )
        .await
}

/// Run every pair sequentially, isolating failures per pair.
pub async fn run_matrix(
    experiments: &[Experiment],
    executor: &BenchmarkExecutor,
    store: &dyn RunStore,
) -> MatrixSummary {
    let mut summary = MatrixSummary::default();

    let pb = ProgressBar::new(experiments.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{pos}/{len}] {msg} [{elapsed_precise} / {eta_precise}]")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    for experiment in experiments {
        let index_type = experiment.index_type();
        let workload_file = experiment.workload_file();
        pb.set_message(format!("{} on {}", index_type, workload_file));
        tracing::info!(index_type = %index_type, workload_file = %workload_file, "Running experiment");

        summary.attempted += 1;
        match run_experiment(experiment, executor, store).await {
            Ok(id) => {
                summary.stored += 1;
                tracing::info!(id = %id, index_type = %index_type, workload_file = %workload_file, "Experiment stored");
            }
            Err(e) => {
                summary.failed += 1;
                tracing::error!(
                    index_type = %index_type,
                    workload_file = %workload_file,
                    error = %e,
                    "Experiment failed, continuing with next pair"
                );
            }
        }

        pb.inc(1);
    }

    pb.finish_with_message("done");
    summary
}
