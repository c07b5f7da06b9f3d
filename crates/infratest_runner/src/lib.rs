//! # infratest_runner
//!
//! Process execution wrapper for infratest.
//!
//! Terraform is always driven as an external program. This crate owns how
//! that program is spawned: directly on the host, or inside the upstream
//! `hashicorp/terraform` image through the Docker or Podman CLI.
//!
//! # Features
//!
//! - **Local and containerized execution** behind one `CommandRunner` trait
//! - **Runtime Detection**: Auto-detect Docker vs Podman in container mode
//! - **Timeouts**: long-running commands are killed and reported
//! - **Dry-Run Mode**: log commands without executing them
//! - **CI Integration**: timestamped log lines when `CI` is set
//! - **Mock Runner**: rule-based responses for tests without terraform
//!
//! # Example
//!
//! ```rust,no_run
//! use infratest_runner::{CliRunner, CommandConfig, CommandRunner, RunConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let runner = CliRunner::local();
//!
//!     let command = CommandConfig::new("terraform")
//!         .args(["version", "-json"])
//!         .workdir("/tmp");
//!
//!     let result = runner.run(&command, &RunConfig::default()).await?;
//!     println!("Exit code: {}", result.exit_code);
//!
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod mock;
pub mod runner;

pub use cli::{
    passthrough_env_names, CliRunner, CliRunnerOptions, ContainerRuntime, ExecutionMode,
    LogHandler, LogLine, LogStream, PASSTHROUGH_ENV_PREFIXES,
};
pub use config::{CommandConfig, CommonImages, MountConfig, RunConfig};
pub use error::{RunnerError, RunnerResult};
pub use mock::{CapturedCall, MockResponse, MockRunner};
pub use runner::{CommandRunner, ExecutionResult};
