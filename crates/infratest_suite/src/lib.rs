//! # infratest_suite
//!
//! Acceptance suites for infratest.
//!
//! A suite names a terraform module, the inputs used to apply it, and the
//! outputs expected afterwards. Suites are either built in (the EKS workers
//! `examples/complete` module, enabled and disabled) or loaded from YAML:
//!
//! ```yaml
//! name: eks-workers
//! module: examples/complete
//! var_files: [fixtures.us-east-2.tfvars]
//! vars:
//!   attributes: ["{id}"]
//! name_prefix: eg-test-suite-{id}
//! outputs:
//!   - output: autoscaling_group_name
//!     expect: { kind: matches, pattern: "^{prefix}-" }
//! ```

pub mod config;
pub mod eks_workers;
pub mod error;
pub mod execute;
pub mod expectation;

pub use config::{SuiteConfig, ROOT_ENV};
pub use eks_workers::{builtin, BUILTIN_SUITES};
pub use error::{SuiteError, SuiteResult};
pub use execute::{run_suite, RunSettings, SuiteReport};
pub use expectation::{Expectation, OutputCheck, Placeholders};
