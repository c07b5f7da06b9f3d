//! Acceptance run lifecycle: apply, check, always destroy.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::Arc;

use futures_util::FutureExt;
use tracing::{error, info, warn};

use infratest_runner::CommandRunner;

use crate::checks::CheckReport;
use crate::error::{TerraformError, TerraformResult};
use crate::options::TerraformOptions;
use crate::terraform::Terraform;
use crate::workspace::{copy_terraform_folder_to_temp, TempModule};

/// Everything that happened during one acceptance run.
#[derive(Debug, Default)]
pub struct RunOutcome {
    /// Checks recorded by the body
    pub checks: CheckReport,
    /// init/apply failure; the body did not run
    pub provision_error: Option<TerraformError>,
    /// Panic message from the body
    pub panic: Option<String>,
    /// destroy failure, reported alongside any earlier failure
    pub destroy_error: Option<TerraformError>,
    /// Temp copy removal failure
    pub cleanup_error: Option<TerraformError>,
    /// Whether destroy was attempted
    pub destroyed: bool,
}

impl RunOutcome {
    pub fn passed(&self) -> bool {
        self.provision_error.is_none()
            && self.panic.is_none()
            && self.destroy_error.is_none()
            && self.cleanup_error.is_none()
            && self.checks.passed()
    }

    /// Panic with the full report unless the run passed.
    pub fn assert_passed(&self) {
        if !self.passed() {
            panic!("acceptance run failed:\n{}", self);
        }
    }
}

impl fmt::Display for RunOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(err) = &self.provision_error {
            writeln!(f, "provisioning failed: {}", err)?;
        }
        if let Some(msg) = &self.panic {
            writeln!(f, "checks panicked: {}", msg)?;
        }
        if !self.checks.is_empty() {
            writeln!(f, "{}", self.checks)?;
        }
        if let Some(err) = &self.destroy_error {
            writeln!(f, "destroy failed: {}", err)?;
        }
        if let Some(err) = &self.cleanup_error {
            writeln!(f, "cleanup failed: {}", err)?;
        }
        write!(f, "{}", if self.passed() { "PASSED" } else { "FAILED" })
    }
}

/// One provisioned module under test.
///
/// `execute` owns the whole apply/destroy pair: destroy runs exactly once
/// whatever the body does, then the temp copy (if any) is removed.
pub struct AcceptanceRun {
    terraform: Terraform,
    temp: Option<TempModule>,
}

impl AcceptanceRun {
    /// Run against `options.terraform_dir` in place.
    pub fn new(runner: Arc<dyn CommandRunner>, options: TerraformOptions) -> Self {
        Self {
            terraform: Terraform::new(runner, options),
            temp: None,
        }
    }

    /// Run against a private copy of `root/relative`; `options.terraform_dir`
    /// is replaced with the copy's module directory.
    pub fn in_temp_copy(
        runner: Arc<dyn CommandRunner>,
        root: &Path,
        relative: impl AsRef<Path>,
        options: TerraformOptions,
    ) -> TerraformResult<Self> {
        let temp = copy_terraform_folder_to_temp(root, relative)?;
        let options = options.with_dir(temp.path()).mount_root(temp.root());
        Ok(Self {
            terraform: Terraform::new(runner, options),
            temp: Some(temp),
        })
    }

    pub fn terraform(&self) -> &Terraform {
        &self.terraform
    }

    /// init + apply, run `body`, then destroy and clean up.
    ///
    /// The body only runs after a successful apply. A panicking body is
    /// recorded in the outcome rather than unwinding past destroy.
    pub async fn execute<F, Fut>(mut self, body: F) -> RunOutcome
    where
        F: FnOnce(Terraform) -> Fut,
        Fut: Future<Output = CheckReport>,
    {
        let mut outcome = RunOutcome::default();
        let dir = self.terraform.options().terraform_dir.clone();
        info!("Starting acceptance run in {:?}", dir);

        match self.terraform.init_and_apply().await {
            Ok(()) => {
                let terraform = self.terraform.clone();
                let checks = AssertUnwindSafe(async move { body(terraform).await })
                    .catch_unwind()
                    .await;
                match checks {
                    Ok(report) => outcome.checks = report,
                    Err(payload) => {
                        let message = panic_message(payload.as_ref());
                        error!("Checks panicked: {}", message);
                        outcome.panic = Some(message);
                    }
                }
            }
            Err(e) => {
                error!("Provisioning failed, skipping checks: {}", e);
                outcome.provision_error = Some(e);
            }
        }

        outcome.destroyed = true;
        if let Err(e) = self.terraform.destroy().await {
            error!("Destroy failed for {:?}: {}", dir, e);
            outcome.destroy_error = Some(e);
        }

        if let Some(temp) = self.temp.take() {
            if let Err(e) = temp.close() {
                warn!("{}", e);
                outcome.cleanup_error = Some(e);
            }
        }

        info!(
            "Acceptance run in {:?} {}",
            dir,
            if outcome.passed() { "passed" } else { "failed" }
        );
        outcome
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use infratest_runner::{MockResponse, MockRunner};

    fn run(runner: &MockRunner) -> AcceptanceRun {
        AcceptanceRun::new(Arc::new(runner.clone()), TerraformOptions::new("/tmp/complete"))
    }

    #[tokio::test]
    async fn test_destroy_after_checks() {
        let runner = MockRunner::new();

        let outcome = run(&runner)
            .execute(|_tf| async {
                let mut report = CheckReport::new();
                report.equal("x", "1", "1");
                report
            })
            .await;

        assert!(outcome.passed());
        assert!(outcome.destroyed);
        assert_eq!(runner.subcommands(), vec!["init", "apply", "destroy"]);
    }

    #[tokio::test]
    async fn test_apply_failure_skips_body_and_destroys() {
        let runner = MockRunner::new().on(["apply"], MockResponse::failure(1, "quota exceeded"));

        let outcome = run(&runner)
            .execute(|_tf| async {
                if true {
                    panic!("body must not run");
                }
                CheckReport::new()
            })
            .await;

        assert!(!outcome.passed());
        assert!(matches!(outcome.provision_error, Some(TerraformError::ApplyFailed(_))));
        assert!(outcome.panic.is_none());
        assert_eq!(runner.get_subcommand_calls("destroy").len(), 1);
    }

    #[tokio::test]
    async fn test_panicking_body_still_destroys() {
        let runner = MockRunner::new();

        let outcome = run(&runner)
            .execute(|_tf| async {
                if true {
                    panic!("boom");
                }
                CheckReport::new()
            })
            .await;

        assert_eq!(outcome.panic.as_deref(), Some("boom"));
        assert_eq!(runner.get_subcommand_calls("destroy").len(), 1);
    }

    #[tokio::test]
    async fn test_destroy_failure_does_not_mask_check_failure() {
        let runner = MockRunner::new().on(["destroy"], MockResponse::failure(1, "DependencyViolation"));

        let outcome = run(&runner)
            .execute(|_tf| async {
                let mut report = CheckReport::new();
                report.equal("vpc_cidr", "172.16.0.0/16", "10.0.0.0/16");
                report
            })
            .await;

        assert!(matches!(outcome.destroy_error, Some(TerraformError::DestroyFailed(_))));
        assert_eq!(outcome.checks.failure_count(), 1);

        let text = outcome.to_string();
        assert!(text.contains("10.0.0.0/16"));
        assert!(text.contains("DependencyViolation"));
        assert!(text.ends_with("FAILED"));
    }
}
