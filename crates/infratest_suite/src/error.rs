//! Error types for suite loading and execution.

use thiserror::Error;

/// Result type alias for suite operations.
pub type SuiteResult<T> = Result<T, SuiteError>;

/// Errors that can occur before or around an acceptance run.
#[derive(Error, Debug)]
pub enum SuiteError {
    #[error("Unknown built-in suite: {0}")]
    UnknownBuiltin(String),

    #[error("Invalid suite definition: {0}")]
    InvalidSuite(String),

    #[error("Invalid pattern for output {output}: {source}")]
    InvalidPattern {
        output: String,
        #[source]
        source: regex::Error,
    },

    #[error("Terraform error: {0}")]
    Terraform(#[from] infratest_terraform::TerraformError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
