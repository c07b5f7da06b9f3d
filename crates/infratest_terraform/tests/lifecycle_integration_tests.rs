//! Integration tests for module copying and the acceptance lifecycle.
//!
//! Terraform itself is replaced by `MockRunner`; the filesystem side is real.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::json;
use tempfile::tempdir;

use infratest_runner::{MockResponse, MockRunner};
use infratest_terraform::{
    copy_terraform_folder_to_temp, AcceptanceRun, AsgTag, AsgTags, CheckReport, TerraformError,
    TerraformOptions,
};

/// Lay out a module repository the way terraform modules are published.
fn module_repo(root: &Path) {
    let module = root.join("examples/complete");
    fs::create_dir_all(module.join(".terraform/providers")).unwrap();
    fs::write(root.join("main.tf"), "# root module").unwrap();
    fs::write(module.join("main.tf"), "module \"eks_workers\" { source = \"../../\" }").unwrap();
    fs::write(module.join("fixtures.us-east-2.tfvars"), "region = \"us-east-2\"").unwrap();
    fs::write(module.join("terraform.tfstate"), "{}").unwrap();
    fs::write(module.join("terraform.tfvars"), "enabled = true").unwrap();
    fs::write(module.join(".terraform/providers/lock"), "x").unwrap();
    fs::write(module.join(".terraform.lock.hcl"), "# provider pins").unwrap();
    fs::write(root.join(".terraform-version"), "1.5.7").unwrap();
    fs::create_dir_all(root.join(".git")).unwrap();
    fs::write(root.join(".git/HEAD"), "ref: refs/heads/main").unwrap();
}

#[test]
fn test_copy_terraform_folder_to_temp_filters_state() {
    let repo = tempdir().unwrap();
    module_repo(repo.path());

    let copy = copy_terraform_folder_to_temp(repo.path(), "examples/complete").unwrap();

    assert!(copy.path().ends_with("examples/complete"));
    assert!(copy.root().join("main.tf").exists());
    assert!(copy.path().join("main.tf").exists());
    assert!(copy.path().join("fixtures.us-east-2.tfvars").exists());
    assert!(!copy.path().join("terraform.tfstate").exists());
    assert!(!copy.path().join("terraform.tfvars").exists());
    assert!(!copy.path().join(".terraform").exists());
    assert!(copy.path().join(".terraform.lock.hcl").exists());
    assert!(copy.root().join(".terraform-version").exists());
    assert!(!copy.root().join(".git").exists());

    let root = copy.root().to_path_buf();
    copy.close().unwrap();
    assert!(!root.exists());
}

#[test]
fn test_copy_missing_module_is_environment_error() {
    let repo = tempdir().unwrap();

    let err = copy_terraform_folder_to_temp(repo.path(), "examples/complete").unwrap_err();
    assert!(matches!(err, TerraformError::Environment(_)));
}

#[test]
fn test_copy_rejects_module_outside_root() {
    let base = tempdir().unwrap();
    let repo = base.path().join("repo");
    module_repo(&repo);
    fs::create_dir_all(base.path().join("outside")).unwrap();

    for relative in ["../outside", "examples/../../outside"] {
        let err = copy_terraform_folder_to_temp(&repo, relative).unwrap_err();
        assert!(matches!(err, TerraformError::Environment(_)), "{}", relative);
    }
}

#[test]
fn test_parallel_copies_are_isolated() {
    let repo = tempdir().unwrap();
    module_repo(repo.path());

    let a = copy_terraform_folder_to_temp(repo.path(), "examples/complete").unwrap();
    let b = copy_terraform_folder_to_temp(repo.path(), "examples/complete").unwrap();

    assert_ne!(a.root(), b.root());
}

/// Destroy runs once and the temp copy is gone, whatever the checks report.
#[tokio::test]
async fn test_run_in_temp_copy_cleans_up() {
    let repo = tempdir().unwrap();
    module_repo(repo.path());

    let runner = MockRunner::new().on(
        ["output", "vpc_cidr"],
        MockResponse::success("\"10.0.0.0/16\""),
    );
    let options = TerraformOptions::new(".")
        .upgrade(true)
        .var_file("fixtures.us-east-2.tfvars")
        .var("attributes", json!(["abc123"]));

    let run = AcceptanceRun::in_temp_copy(
        Arc::new(runner.clone()),
        repo.path(),
        "examples/complete",
        options,
    )
    .unwrap();

    let seen_dir: Arc<Mutex<Option<PathBuf>>> = Arc::new(Mutex::new(None));
    let seen = seen_dir.clone();

    let outcome = run
        .execute(|tf| async move {
            *seen.lock() = Some(tf.options().terraform_dir.clone());
            let mut report = CheckReport::new();
            let cidr = tf.output("vpc_cidr").await.unwrap_or_default();
            report.equal("vpc_cidr", "172.16.0.0/16", &cidr);
            report
        })
        .await;

    assert!(!outcome.passed());
    assert_eq!(outcome.checks.failure_count(), 1);
    assert_eq!(runner.get_subcommand_calls("destroy").len(), 1);
    assert_eq!(runner.subcommands().last().map(String::as_str), Some("destroy"));

    let dir = seen_dir.lock().clone().unwrap();
    assert!(dir.ends_with("examples/complete"));
    assert!(!dir.exists(), "temp copy should be removed after the run");

    let init = &runner.get_subcommand_calls("init")[0];
    assert_eq!(init.workdir.as_deref(), Some(dir.as_path()));

    // The whole copied tree is the mount root, so `source = "../../"` resolves
    // inside a container too.
    let mount_root = init.mount_root.clone().unwrap();
    assert_eq!(dir.strip_prefix(&mount_root).unwrap(), Path::new("examples/complete"));
}

#[tokio::test]
async fn test_tag_output_decodes_through_client() {
    let runner = MockRunner::new().on(
        ["output", "autoscaling_group_tags"],
        MockResponse::success(
            r#"[{"key":"Name","value":"eg-test-suite-abc123","propagate_at_launch":true},
                {"key":"Namespace","value":"eg","propagate_at_launch":true}]"#,
        ),
    );

    let outcome = AcceptanceRun::new(Arc::new(runner.clone()), TerraformOptions::new("."))
        .execute(|tf| async move {
            let mut report = CheckReport::new();
            match tf.output_struct::<AsgTags>("autoscaling_group_tags").await {
                Ok(AsgTags::Records(records)) => {
                    report.contains(
                        "autoscaling_group_tags",
                        &records,
                        &AsgTag::propagated("Name", "eg-test-suite-abc123"),
                    );
                }
                Ok(other) => report.fail("autoscaling_group_tags", format!("{:?}", other)),
                Err(e) => report.fail("autoscaling_group_tags", e.to_string()),
            }
            report
        })
        .await;

    outcome.assert_passed();
}
