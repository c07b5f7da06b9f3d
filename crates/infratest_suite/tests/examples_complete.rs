//! Acceptance tests for the EKS workers `examples/complete` module.
//!
//! These provision real AWS infrastructure and take several minutes each.
//! They need terraform on `PATH` (or `INFRATEST_TERRAFORM_BIN`), AWS
//! credentials, and `INFRATEST_ROOT` pointing at the module checkout:
//!
//! ```sh
//! INFRATEST_ROOT=../terraform-aws-eks-workers cargo test -p infratest_suite \
//!     --test examples_complete -- --ignored
//! ```
//!
//! Each test copies the module into its own temp dir and uses its own
//! random id, so both can run in parallel.

use std::path::PathBuf;
use std::sync::Arc;

use infratest_runner::CliRunner;
use infratest_suite::config::ROOT_ENV;
use infratest_suite::{eks_workers, run_suite, RunSettings};
use infratest_terraform::{
    random, AcceptanceRun, AsgTag, AsgTags, CheckReport, TerraformOptions,
};
use regex::Regex;

fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter("infratest=info,warn")
        .try_init();
}

fn module_root() -> PathBuf {
    std::env::var(ROOT_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("../../"))
}

fn verbose() -> bool {
    std::env::var("INFRATEST_VERBOSE").is_ok()
}

#[tokio::test]
#[ignore = "provisions real AWS infrastructure"]
async fn test_examples_complete() {
    init_logging();

    let rand_id = random::lower_unique_id();
    let options = TerraformOptions::default()
        .upgrade(true)
        .var_file(eks_workers::VAR_FILE)
        .var("attributes", vec![rand_id.clone()])
        .stream_logs(verbose());

    let run = AcceptanceRun::in_temp_copy(
        Arc::new(CliRunner::local()),
        &module_root(),
        eks_workers::MODULE_DIR,
        options,
    )
    .expect("copy module to temp dir");

    let expected_prefix = format!("eg-test-suite-{}", rand_id);

    let outcome = run
        .execute(|tf| async move {
            let mut report = CheckReport::new();

            match tf.output("vpc_cidr").await {
                Ok(cidr) => {
                    report.equal("vpc_cidr", eks_workers::VPC_CIDR, &cidr);
                }
                Err(e) => report.fail("vpc_cidr", e.to_string()),
            }

            match tf.output_list("private_subnet_cidrs").await {
                Ok(cidrs) => {
                    report.list_equal(
                        "private_subnet_cidrs",
                        &eks_workers::PRIVATE_SUBNET_CIDRS,
                        &cidrs,
                    );
                }
                Err(e) => report.fail("private_subnet_cidrs", e.to_string()),
            }

            match tf.output_list("public_subnet_cidrs").await {
                Ok(cidrs) => {
                    report.list_equal(
                        "public_subnet_cidrs",
                        &eks_workers::PUBLIC_SUBNET_CIDRS,
                        &cidrs,
                    );
                }
                Err(e) => report.fail("public_subnet_cidrs", e.to_string()),
            }

            // autoscaling_group_name = eg-test-suite-<id>-20210416185727403200000006
            let asg_pattern = Regex::new(&format!("^{}-", regex::escape(&expected_prefix)))
                .expect("valid pattern");
            match tf.output("autoscaling_group_name").await {
                Ok(name) => {
                    report.matches("autoscaling_group_name", &asg_pattern, &name);
                }
                Err(e) => report.fail("autoscaling_group_name", e.to_string()),
            }

            match tf.output_struct::<AsgTags>("autoscaling_group_tags").await {
                Ok(tags) => {
                    for expected in [
                        AsgTag::propagated("Name", expected_prefix.clone()),
                        AsgTag::propagated(
                            format!("kubernetes.io/cluster/{}", eks_workers::CLUSTER_NAME),
                            "owned",
                        ),
                    ] {
                        match &tags {
                            AsgTags::Records(records) => {
                                report.contains("autoscaling_group_tags", records, &expected);
                            }
                            AsgTags::Map(_) => {
                                report.add_check(
                                    "autoscaling_group_tags",
                                    tags.contains(&expected),
                                    format!(
                                        "expected tag {}={}, got {:?}",
                                        expected.key, expected.value, tags
                                    ),
                                );
                            }
                        }
                    }
                }
                Err(e) => report.fail("autoscaling_group_tags", e.to_string()),
            }

            match (
                tf.output("launch_template_arn").await,
                tf.output("launch_template_id").await,
            ) {
                (Ok(arn), Ok(id)) => {
                    let expected = format!("{}{}", eks_workers::LAUNCH_TEMPLATE_ARN_PREFIX, id);
                    report.equal("launch_template_arn", &expected, &arn);
                }
                (Err(e), _) | (_, Err(e)) => report.fail("launch_template_arn", e.to_string()),
            }

            let workers_name = format!("{}-workers", expected_prefix);
            for output in ["security_group_name", "workers_role_name"] {
                match tf.output(output).await {
                    Ok(actual) => {
                        report.equal(output, &workers_name, &actual);
                    }
                    Err(e) => report.fail(output, e.to_string()),
                }
            }

            report
        })
        .await;

    outcome.assert_passed();
}

#[tokio::test]
#[ignore = "provisions real AWS infrastructure"]
async fn test_examples_complete_disabled() {
    init_logging();

    let settings = RunSettings::default()
        .with_root(module_root())
        .stream_logs(verbose());

    let report = run_suite(
        Arc::new(CliRunner::local()),
        &eks_workers::disabled(),
        &settings,
    )
    .await
    .expect("suite starts");

    assert!(report.passed(), "When disabled, module should have no outputs.\n{}", report);
}
