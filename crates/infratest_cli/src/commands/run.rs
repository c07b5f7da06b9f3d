//! Run command - Apply a suite, check its outputs, destroy it.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use thiserror::Error;
use tracing::{info, warn};

use infratest_runner::{CliRunner, CliRunnerOptions, CommandRunner, ExecutionMode};
use infratest_suite::{run_suite, RunSettings, SuiteReport};
use infratest_terraform::{Terraform, TerraformOptions};

use super::SuiteSource;

#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub source: SuiteSource,

    /// Module repository root (overrides INFRATEST_ROOT)
    #[arg(short, long)]
    pub root: Option<PathBuf>,

    /// Fixed run id instead of a random one
    #[arg(long)]
    pub id: Option<String>,

    /// Apply the module in place instead of a temp copy
    #[arg(long)]
    pub no_temp: bool,

    /// Print terraform commands without running them
    #[arg(long)]
    pub dry_run: bool,

    /// Run terraform in a container (Docker or Podman)
    #[arg(long)]
    pub container: bool,

    /// Stream terraform output to the console
    #[arg(long)]
    pub stream: bool,
}

/// A run that completed but did not pass.
#[derive(Error, Debug)]
pub enum RunFailure {
    #[error("Suite {suite} failed: {failed} of {total} checks failed")]
    Checks {
        suite: String,
        failed: usize,
        total: usize,
    },

    #[error("Suite {suite} failed: terraform error during {stage}")]
    Terraform { suite: String, stage: &'static str },
}

impl RunFailure {
    fn from_report(report: &SuiteReport) -> Self {
        let outcome = &report.outcome;
        let stage = if outcome.provision_error.is_some() {
            Some("provisioning")
        } else if outcome.destroy_error.is_some() {
            Some("destroy")
        } else if outcome.cleanup_error.is_some() {
            Some("cleanup")
        } else {
            None
        };

        match stage {
            Some(stage) if outcome.checks.passed() => Self::Terraform {
                suite: report.suite.clone(),
                stage,
            },
            _ => Self::Checks {
                suite: report.suite.clone(),
                failed: outcome.checks.failure_count() + usize::from(outcome.panic.is_some()),
                total: outcome.checks.len(),
            },
        }
    }
}

fn build_runner(args: &RunArgs) -> Result<Arc<dyn CommandRunner>> {
    let mut options = CliRunnerOptions::new();
    if args.dry_run {
        options = options.dry_run();
    }
    if args.container {
        options = options.containerized(ExecutionMode::terraform_container());
    }
    let runner = CliRunner::new(options).context("Failed to set up command runner")?;
    Ok(Arc::new(runner))
}

pub async fn execute(args: RunArgs) -> Result<()> {
    let suite = args.source.load()?;
    info!("Running suite: {}", suite.name);

    let runner = build_runner(&args)?;
    if !args.dry_run && !args.container {
        Terraform::new(runner.clone(), TerraformOptions::default())
            .ensure_available()
            .await?;
    }

    let mut settings = RunSettings::default().stream_logs(args.stream);
    if let Some(root) = &args.root {
        settings = settings.with_root(root);
    }
    if let Some(id) = &args.id {
        settings = settings.with_id(id);
    }
    if args.no_temp {
        settings = settings.copy_to_temp(false);
    }

    let report = run_suite(runner, &suite, &settings).await?;

    println!("{}", report);

    if args.dry_run {
        warn!("Dry run: terraform was not executed, check results are not meaningful");
        return Ok(());
    }

    if report.passed() {
        Ok(())
    } else {
        Err(RunFailure::from_report(&report).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use infratest_runner::{MockResponse, MockRunner};
    use infratest_suite::eks_workers;

    async fn report_with(runner: MockRunner) -> SuiteReport {
        let settings = RunSettings::default()
            .with_root("/tmp/eks-workers")
            .with_id("abc123")
            .copy_to_temp(false);
        run_suite(Arc::new(runner), &eks_workers::disabled(), &settings)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_check_failure_classified() {
        let runner = MockRunner::new().on(
            ["output", "-json"],
            MockResponse::success(r#"{"datadog_monitor_names":{"value":["m"]}}"#),
        );
        let report = report_with(runner).await;

        assert!(matches!(
            RunFailure::from_report(&report),
            RunFailure::Checks { failed: 1, total: 1, .. }
        ));
    }

    #[tokio::test]
    async fn test_apply_failure_classified_as_terraform() {
        let runner = MockRunner::new().on(["apply"], MockResponse::failure(1, "Error: boom"));
        let report = report_with(runner).await;

        assert!(matches!(
            RunFailure::from_report(&report),
            RunFailure::Terraform {
                stage: "provisioning",
                ..
            }
        ));
    }
}
