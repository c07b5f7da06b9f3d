//! # infratest_terraform
//!
//! Terraform acceptance testing for infratest.
//!
//! This crate drives the terraform CLI through an `infratest_runner`
//! `CommandRunner`, decodes outputs into typed values, and wraps the
//! apply/destroy pair in a lifecycle that always tears infrastructure down.
//!
//! ## Features
//!
//! - `TerraformOptions` rendering `-var`/`-var-file` arguments as HCL
//! - init, apply, destroy and JSON output decoding
//! - Private temp copies of module trees for parallel runs
//! - Accumulating `CheckReport` assertions
//! - Random unique ids for collision-free resource names
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! use infratest_runner::CliRunner;
//! use infratest_terraform::{random, AcceptanceRun, CheckReport, TerraformOptions};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let id = random::lower_unique_id();
//! let options = TerraformOptions::new(".")
//!     .upgrade(true)
//!     .var_file("fixtures.us-east-2.tfvars")
//!     .var("attributes", vec![id.clone()]);
//!
//! let run = AcceptanceRun::in_temp_copy(
//!     Arc::new(CliRunner::local()),
//!     Path::new("../../"),
//!     "examples/complete",
//!     options,
//! )?;
//!
//! let outcome = run
//!     .execute(|tf| async move {
//!         let mut report = CheckReport::new();
//!         match tf.output("vpc_cidr").await {
//!             Ok(cidr) => {
//!                 report.equal("vpc_cidr", "172.16.0.0/16", &cidr);
//!             }
//!             Err(e) => report.fail("vpc_cidr", e.to_string()),
//!         }
//!         report
//!     })
//!     .await;
//!
//! outcome.assert_passed();
//! # Ok(())
//! # }
//! ```

pub mod checks;
pub mod error;
pub mod lifecycle;
pub mod options;
pub mod random;
pub mod tags;
pub mod terraform;
pub mod workspace;

pub use checks::{is_empty_value, CheckOutcome, CheckReport};
pub use error::{TerraformError, TerraformResult};
pub use lifecycle::{AcceptanceRun, RunOutcome};
pub use options::{to_hcl, var_assignment, TerraformOptions, TERRAFORM_BIN_ENV};
pub use tags::{AsgTag, AsgTags};
pub use terraform::{scalar_to_string, Terraform};
pub use workspace::{copy_terraform_folder_to_temp, is_confined_path, TempModule};
