//! Running a suite through the acceptance lifecycle.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use infratest_runner::CommandRunner;
use infratest_terraform::{random, AcceptanceRun, CheckReport, RunOutcome};

use crate::config::SuiteConfig;
use crate::error::SuiteResult;

/// Per-invocation settings layered over a suite.
#[derive(Debug, Clone, Default)]
pub struct RunSettings {
    /// Module repository root override
    pub root: Option<PathBuf>,
    /// Fixed run id instead of a random one
    pub id: Option<String>,
    /// Override the suite's `copy_to_temp`
    pub copy_to_temp: Option<bool>,
    /// Echo terraform output while it runs
    pub stream_logs: bool,
}

impl RunSettings {
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn copy_to_temp(mut self, enabled: bool) -> Self {
        self.copy_to_temp = Some(enabled);
        self
    }

    pub fn stream_logs(mut self, enabled: bool) -> Self {
        self.stream_logs = enabled;
        self
    }
}

/// Result of one suite invocation.
#[derive(Debug)]
pub struct SuiteReport {
    pub suite: String,
    pub id: String,
    pub outcome: RunOutcome,
}

impl SuiteReport {
    pub fn passed(&self) -> bool {
        self.outcome.passed()
    }
}

impl fmt::Display for SuiteReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "suite {} (id {})", self.suite, self.id)?;
        write!(f, "{}", self.outcome)
    }
}

/// Provision the suite's module, check every output, and tear it down.
///
/// Errors are returned only for problems found before anything is
/// provisioned; everything after apply starts is part of the report.
pub async fn run_suite(
    runner: Arc<dyn CommandRunner>,
    suite: &SuiteConfig,
    settings: &RunSettings,
) -> SuiteResult<SuiteReport> {
    suite.validate()?;

    let id = settings
        .id
        .clone()
        .unwrap_or_else(random::lower_unique_id)
        .to_lowercase();
    let placeholders = suite.placeholders(&id);
    let options = suite
        .terraform_options(&placeholders)
        .stream_logs(settings.stream_logs);
    let root = suite.resolve_root(settings.root.as_deref());

    info!(
        "Running suite {} with id {} against {:?}",
        suite.name, id, root
    );

    let run = if settings.copy_to_temp.unwrap_or(suite.copy_to_temp) {
        AcceptanceRun::in_temp_copy(runner, &root, &suite.module, options)?
    } else {
        AcceptanceRun::new(
            runner,
            options.with_dir(root.join(&suite.module)).mount_root(&root),
        )
    };

    let checks = suite.outputs.clone();
    let outcome = run
        .execute(|tf| async move {
            let mut report = CheckReport::new();
            for check in &checks {
                check.evaluate(&tf, &placeholders, &mut report).await;
            }
            report
        })
        .await;

    Ok(SuiteReport {
        suite: suite.name.clone(),
        id,
        outcome,
    })
}
