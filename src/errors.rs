/// Domain-specific error types for index-bench
///
/// Parse gaps never surface here: missing log fields are defaulted and logged
/// by the parser. Everything in this enum aborts at least one experiment pair.

#[derive(Debug, thiserror::Error)]
pub enum BenchError {
    /// Harness or run configuration could not be loaded. Aborts the whole run.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The benchmark executable could not be spawned or its output read.
    #[error("Process error: {0}")]
    Process(String),

    /// The benchmark exited unsuccessfully and the exit policy rejects it.
    #[error("Process '{executable}' exited with {status}")]
    ProcessExit {
        executable: String,
        status: String,
    },

    #[error("Validation error: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<sqlx::Error> for BenchError {
    fn from(e: sqlx::Error) -> Self {
        BenchError::Storage(e.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for BenchError {
    fn from(e: sqlx::migrate::MigrateError) -> Self {
        BenchError::Storage(format!("Migration failed: {}", e))
    }
}

impl BenchError {
    /// Helper to create validation errors with field names
    ///
    /// Example:
    /// ```
    /// use index_bench::errors::BenchError;
    /// let err = BenchError::validation("input_dir", "Input directory is empty");
    /// ```
    pub fn validation(field: &str, message: &str) -> Self {
        BenchError::Validation {
            message: message.to_string(),
            field: Some(field.to_string()),
        }
    }
}
