/// Configuration management using figment
///
/// Loads harness configuration with this precedence (highest wins):
/// 1. Defaults (hardcoded)
/// 2. TOML file: index_bench.toml (in working directory)
/// 3. Environment variables: prefixed INDEX_BENCH_ (e.g., INDEX_BENCH_LOG_LEVEL=debug)
///
/// This is the harness's own configuration. The per-run benchmark knobs live in
/// `analysis::RunConfiguration` and have their own file format.

use figment::{
    Figment,
    providers::{Env, Format, Toml, Serialized},
};
use serde::{Deserialize, Serialize};
use crate::errors::BenchError;

/// What to do when a benchmark process exits with a non-zero status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExitPolicy {
    /// Record whatever the process logged, regardless of exit status.
    #[default]
    Ignore,
    /// Treat a non-zero exit as a failure of that experiment pair.
    Fail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// SQLite database path. Supports sqlite:// URI scheme.
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// Exit status policy for benchmark processes
    #[serde(default)]
    pub exit_policy: ExitPolicy,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_db_path() -> String {
    "sqlite://index_bench.db".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Config {
            log_level: default_log_level(),
            db_path: default_db_path(),
            exit_policy: ExitPolicy::default(),
        }
    }
}

impl Config {
    /// Load configuration from defaults, TOML file, and environment variables
    ///
    /// Environment variables override TOML file values.
    /// Example: INDEX_BENCH_EXIT_POLICY=fail overrides exit_policy in index_bench.toml
    pub fn load() -> Result<Config, BenchError> {
        Self::figment("index_bench.toml")
            .extract()
            .map_err(|e| BenchError::Config(format!("Failed to load config: {}", e)))
    }

    fn figment(toml_path: &str) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(toml_path))
            .merge(Env::prefixed("INDEX_BENCH_"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = Config::default();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.db_path, "sqlite://index_bench.db");
        assert_eq!(config.exit_policy, ExitPolicy::Ignore);
    }

    #[test]
    fn test_config_toml_overrides_defaults() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "index_bench.toml",
                r#"
                    db_path = "sqlite://runs.db"
                    exit_policy = "fail"
                "#,
            )?;
            let config: Config = Config::figment("index_bench.toml").extract()?;
            assert_eq!(config.db_path, "sqlite://runs.db");
            assert_eq!(config.exit_policy, ExitPolicy::Fail);
            assert_eq!(config.log_level, "info");
            Ok(())
        });
    }

    #[test]
    fn test_config_env_overrides_toml() {
        figment::Jail::expect_with(|jail| {
            jail.create_file("index_bench.toml", r#"log_level = "warn""#)?;
            jail.set_env("INDEX_BENCH_LOG_LEVEL", "debug");
            let config: Config = Config::figment("index_bench.toml").extract()?;
            assert_eq!(config.log_level, "debug");
            Ok(())
        });
    }
}
