//! CLI-specific error types and exit code mapping

use passiverecon_core::error::{PassiveReconError, StorageError};
use passiverecon_pipeline::ReconPipelineError;

/// CLI-specific error type.
///
/// The `exit_code()` method maps errors to process exit codes.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Configuration or ignore rule loading failure (before any record).
    #[error("configuration error: {0}")]
    Config(String),

    /// Single-mode run finished, but some records could not be stored.
    #[error("{failed} record(s) failed to store ({committed} committed)")]
    PartialFailure { failed: u64, committed: u64 },

    /// Unrecoverable storage failure (open, bulk commit).
    #[error("storage error: {0}")]
    Storage(String),

    /// IO error (stdin read, database file).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Anything else (worker task panicked, tracing init).
    #[error("{0}")]
    Runtime(String),
}

impl CliError {
    /// Map the error to a process exit code.
    ///
    /// | Code | Meaning                                  |
    /// |------|------------------------------------------|
    /// | 0    | Success                                  |
    /// | 1    | General / runtime error                  |
    /// | 2    | Configuration error                      |
    /// | 3    | Single mode finished with failed records |
    /// | 4    | Unrecoverable storage failure            |
    /// | 10   | IO error                                 |
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config(_) => 2,
            Self::PartialFailure { .. } => 3,
            Self::Storage(_) => 4,
            Self::Io(_) => 10,
            Self::Runtime(_) => 1,
        }
    }
}

impl From<PassiveReconError> for CliError {
    fn from(e: PassiveReconError) -> Self {
        match e {
            PassiveReconError::Config(e) => Self::Config(e.to_string()),
            PassiveReconError::Storage(e) => Self::Storage(e.to_string()),
            PassiveReconError::Io(e) => Self::Io(e),
            e @ PassiveReconError::Record(_) => Self::Runtime(e.to_string()),
        }
    }
}

impl From<ReconPipelineError> for CliError {
    fn from(e: ReconPipelineError) -> Self {
        PassiveReconError::from(e).into()
    }
}

impl From<StorageError> for CliError {
    fn from(e: StorageError) -> Self {
        Self::Storage(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use passiverecon_core::error::ConfigError;

    #[test]
    fn test_exit_code_config_error() {
        let err = CliError::Config("test error".to_owned());
        assert_eq!(err.exit_code(), 2, "config error should return exit code 2");
    }

    #[test]
    fn test_exit_code_partial_failure() {
        let err = CliError::PartialFailure {
            failed: 2,
            committed: 8,
        };
        assert_eq!(
            err.exit_code(),
            3,
            "partial failure should return exit code 3"
        );
        assert!(err.to_string().contains("2 record(s)"));
    }

    #[test]
    fn test_exit_code_storage_error() {
        let err: CliError = StorageError::Connection("locked".to_owned()).into();
        assert_eq!(err.exit_code(), 4, "storage error should return exit code 4");
    }

    #[test]
    fn test_exit_code_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "stdin closed");
        let err = CliError::Io(io_err);
        assert_eq!(err.exit_code(), 10, "io error should return exit code 10");
    }

    #[test]
    fn test_ignore_spec_error_maps_to_config() {
        let err: CliError = ReconPipelineError::IgnoreSpec {
            path: "/nonexistent.yml".to_owned(),
            reason: "file not found".to_owned(),
        }
        .into();
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("/nonexistent.yml"));
    }

    #[test]
    fn test_pipeline_store_error_maps_to_storage() {
        let err: CliError = ReconPipelineError::Store(StorageError::Write {
            records: 500,
            reason: "disk full".to_owned(),
        })
        .into();
        assert_eq!(err.exit_code(), 4);
    }

    #[test]
    fn test_core_config_error_maps_to_config() {
        let err: CliError = PassiveReconError::Config(ConfigError::InvalidValue {
            field: "store.path".to_owned(),
            reason: "must not be empty".to_owned(),
        })
        .into();
        assert_eq!(err.exit_code(), 2);
        assert!(err.to_string().contains("store.path"));
    }

    #[test]
    fn test_exit_code_runtime_error() {
        let err = CliError::Runtime("worker panicked".to_owned());
        assert_eq!(err.exit_code(), 1, "runtime error should return exit code 1");
    }
}
