//! Built-in suites for the EKS workers `examples/complete` module.
//!
//! The fixture (`fixtures.us-east-2.tfvars`) sets namespace `eg`, stage
//! `test`, name `suite` and cluster `eg-test-eks-workers-cluster`; the run id
//! is appended through the `attributes` variable.

use serde_json::json;

use infratest_terraform::AsgTag;

use crate::config::SuiteConfig;
use crate::error::{SuiteError, SuiteResult};
use crate::expectation::{Expectation, OutputCheck};

pub const MODULE_DIR: &str = "examples/complete";
pub const VAR_FILE: &str = "fixtures.us-east-2.tfvars";
pub const NAME_PREFIX: &str = "eg-test-suite-{id}";
pub const CLUSTER_NAME: &str = "eg-test-eks-workers-cluster";
pub const LAUNCH_TEMPLATE_ARN_PREFIX: &str = "arn:aws:ec2:us-east-2:126450723953:launch-template/";

pub const VPC_CIDR: &str = "172.16.0.0/16";
pub const PRIVATE_SUBNET_CIDRS: [&str; 2] = ["172.16.0.0/19", "172.16.32.0/19"];
pub const PUBLIC_SUBNET_CIDRS: [&str; 2] = ["172.16.96.0/19", "172.16.128.0/19"];

/// Output that must be empty when the module is disabled.
pub const DISABLED_OUTPUT: &str = "datadog_monitor_names";

/// Names accepted by [`builtin`].
pub const BUILTIN_SUITES: [&str; 2] = ["eks-workers", "eks-workers-disabled"];

fn base(name: &str) -> SuiteConfig {
    let mut suite = SuiteConfig::new(name, MODULE_DIR);
    suite.var_files.push(VAR_FILE.to_string());
    suite.vars.insert("attributes".to_string(), json!(["{id}"]));
    suite.name_prefix = Some(NAME_PREFIX.to_string());
    suite
}

/// The enabled module: networking, ASG, launch template, security group and
/// worker role.
pub fn complete() -> SuiteConfig {
    let mut suite = base("eks-workers");

    suite.outputs = vec![
        OutputCheck::new(
            "vpc_cidr",
            Expectation::Equals {
                value: VPC_CIDR.to_string(),
            },
        ),
        OutputCheck::new(
            "private_subnet_cidrs",
            Expectation::List {
                values: PRIVATE_SUBNET_CIDRS.iter().map(|s| s.to_string()).collect(),
            },
        ),
        OutputCheck::new(
            "public_subnet_cidrs",
            Expectation::List {
                values: PUBLIC_SUBNET_CIDRS.iter().map(|s| s.to_string()).collect(),
            },
        ),
        OutputCheck::new(
            "autoscaling_group_name",
            Expectation::Matches {
                pattern: "^{prefix}-".to_string(),
            },
        ),
        OutputCheck::new(
            "autoscaling_group_tags",
            Expectation::ContainsTags {
                tags: vec![
                    AsgTag::propagated("Name", "{prefix}"),
                    AsgTag::propagated(format!("kubernetes.io/cluster/{}", CLUSTER_NAME), "owned"),
                ],
            },
        ),
        OutputCheck::new(
            "launch_template_arn",
            Expectation::Equals {
                value: format!("{}{{output:launch_template_id}}", LAUNCH_TEMPLATE_ARN_PREFIX),
            },
        ),
        OutputCheck::new(
            "security_group_name",
            Expectation::Equals {
                value: "{prefix}-workers".to_string(),
            },
        ),
        OutputCheck::new(
            "workers_role_name",
            Expectation::Equals {
                value: "{prefix}-workers".to_string(),
            },
        ),
    ];

    suite
}

/// The same module with `enabled = false`: nothing should be exposed.
pub fn disabled() -> SuiteConfig {
    let mut suite = base("eks-workers-disabled");
    suite.vars.insert("enabled".to_string(), json!("false"));
    suite.outputs = vec![OutputCheck::new(DISABLED_OUTPUT, Expectation::Empty)];
    suite
}

/// Look up a built-in suite by name.
pub fn builtin(name: &str) -> SuiteResult<SuiteConfig> {
    match name {
        "eks-workers" => Ok(complete()),
        "eks-workers-disabled" => Ok(disabled()),
        other => Err(SuiteError::UnknownBuiltin(other.to_string())),
    }
}
