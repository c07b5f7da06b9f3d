//! CLI command definitions.
//!
//! Each subcommand lives in its own module exposing an `execute` entry point.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};

use infratest_suite::{builtin, SuiteConfig};

pub mod list;
pub mod run;
pub mod show;
pub mod unique_id;

/// infratest - acceptance tests for terraform modules
#[derive(Parser)]
#[command(name = "infratest")]
#[command(version, about = "infratest - acceptance tests for terraform modules")]
#[command(long_about = r#"
infratest provisions a terraform module with test inputs, checks its outputs
against expectations, and always destroys what it created.

COMMANDS:
  run        → Apply a suite, check outputs, destroy
  list       → List built-in suites
  unique-id  → Print a fresh resource-name suffix
  show       → Print a resolved suite as YAML

ENVIRONMENT:
  INFRATEST_ROOT           Module repository root
  INFRATEST_TERRAFORM_BIN  Terraform binary (default: terraform)
  CI                       Timestamp streamed terraform output

EXIT CODES:
  0 - Success
  1 - General error
  2 - Invalid arguments
  3 - Check failure
  5 - Terraform error
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Apply a suite, check its outputs, and destroy it
    Run(run::RunArgs),

    /// List built-in suites
    List(list::ListArgs),

    /// Print a fresh lower-case unique id
    #[command(name = "unique-id")]
    UniqueId(unique_id::UniqueIdArgs),

    /// Print a suite with its placeholders resolved
    Show(show::ShowArgs),
}

/// Where a suite comes from: a YAML file or a built-in name.
#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
pub struct SuiteSource {
    /// Path to a YAML suite file
    #[arg(short, long)]
    pub suite: Option<PathBuf>,

    /// Name of a built-in suite (see `infratest list`)
    #[arg(short, long)]
    pub builtin: Option<String>,
}

impl SuiteSource {
    pub fn load(&self) -> Result<SuiteConfig> {
        match (&self.suite, &self.builtin) {
            (Some(path), _) => SuiteConfig::load(path)
                .with_context(|| format!("Failed to load suite file {}", path.display())),
            (None, Some(name)) => Ok(builtin(name)?),
            (None, None) => anyhow::bail!("Missing argument: --suite or --builtin"),
        }
    }
}
