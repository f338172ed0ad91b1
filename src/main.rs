use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use index_bench::analysis::RunConfiguration;
use index_bench::analysis::executor::BenchmarkExecutor;
use index_bench::config::{Config, ExitPolicy};
use index_bench::logging;
use index_bench::runner::{enumerate_experiments, run_matrix};
use index_bench::store::RunStore;
use index_bench::store::sqlite::SqliteRunStore;

#[derive(Parser)]
#[command(name = "index-bench", version, about = "Run index benchmarks and record their results")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Database path (overrides db_path from config)
    #[arg(long, global = true)]
    db_path: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every executable against every file in the input directory
    Run {
        /// Directory containing workload input files
        #[arg(long)]
        input_dir: PathBuf,

        /// Benchmark executables to run
        #[arg(long, required = true, num_args = 1..)]
        executable: Vec<PathBuf>,

        /// Run configuration file (TOML, uppercase knob names)
        #[arg(long)]
        run_config: Option<PathBuf>,

        /// Treat a non-zero benchmark exit status as a failed experiment
        #[arg(long)]
        fail_on_nonzero_exit: bool,
    },
    /// Create the database tables and exit
    Migrate,
    /// Print the most recent stored runs as JSON
    List {
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // 1. Parse CLI args
    let cli = Cli::parse();

    // 2. Load configuration
    let mut config = Config::load().unwrap_or_else(|e| {
        eprintln!("Config error (using defaults): {}", e);
        Config::default()
    });
    if let Some(db_path) = cli.db_path {
        config.db_path = db_path;
    }

    // 3. Initialize logging before anything else logs
    logging::init_logging(&config);

    match cli.command {
        Commands::Migrate => {
            tracing::info!(db_path = %config.db_path, "Running database migrations...");
            let _store = SqliteRunStore::new(&config.db_path).await?;
            println!("Migrations completed successfully.");
        }

        Commands::List { limit } => {
            let store = SqliteRunStore::new(&config.db_path).await?;
            let runs = store.list_runs(limit).await?;
            println!("{}", serde_json::to_string_pretty(&runs)?);
        }

        Commands::Run {
            input_dir,
            executable,
            run_config,
            fail_on_nonzero_exit,
        } => {
            if fail_on_nonzero_exit {
                config.exit_policy = ExitPolicy::Fail;
            }
            tracing::info!(executables = ?executable, exit_policy = ?config.exit_policy, "index-bench starting");

            // Pre-flight: a bad run configuration aborts before any process starts
            let mut executor = BenchmarkExecutor::new(config.exit_policy)?;
            if let Some(path) = run_config {
                executor = executor.with_requested(RunConfiguration::from_file(&path)?);
            }

            let experiments = enumerate_experiments(&executable, &input_dir)?;

            let store = SqliteRunStore::new(&config.db_path).await?;
            tracing::info!(db_path = %config.db_path, "Run store ready");

            let summary = run_matrix(&experiments, &executor, &store).await;
            tracing::info!(
                attempted = summary.attempted,
                stored = summary.stored,
                failed = summary.failed,
                "Experiment matrix finished"
            );
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
    }

    Ok(())
}
