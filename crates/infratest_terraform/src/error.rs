//! Error types for terraform operations.

use infratest_runner::RunnerError;
use thiserror::Error;

/// Result type alias for terraform operations.
pub type TerraformResult<T> = Result<T, TerraformError>;

/// Errors that can occur while driving terraform.
#[derive(Error, Debug)]
pub enum TerraformError {
    #[error("Terraform not available: {0}")]
    TerraformNotAvailable(String),

    #[error("Terraform init failed: {0}")]
    InitFailed(String),

    #[error("Terraform apply failed: {0}")]
    ApplyFailed(String),

    #[error("Terraform destroy failed: {0}")]
    DestroyFailed(String),

    #[error("Terraform output {name} failed: {message}")]
    OutputFailed { name: String, message: String },

    #[error("Terraform output {0} not found")]
    OutputNotFound(String),

    #[error("Failed to decode terraform output {name}: {source}")]
    Decode {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid variable {name}: {reason}")]
    InvalidVariable { name: String, reason: String },

    #[error("Environment error: {0}")]
    Environment(String),

    #[error("Runner error: {0}")]
    Runner(#[from] RunnerError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
