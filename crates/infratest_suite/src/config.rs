//! Suite definitions loaded from YAML or built in code.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use infratest_terraform::{is_confined_path, TerraformOptions};

use crate::error::{SuiteError, SuiteResult};
use crate::expectation::{OutputCheck, Placeholders};

/// Environment variable pointing at the module repository root.
pub const ROOT_ENV: &str = "INFRATEST_ROOT";

fn default_true() -> bool {
    true
}

/// A module, its inputs, and the outputs expected after apply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuiteConfig {
    pub name: String,
    /// Repository root holding the module; `INFRATEST_ROOT` overrides it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,
    /// Module directory relative to the root
    pub module: PathBuf,
    #[serde(default)]
    pub var_files: Vec<String>,
    /// `-var` overlay; strings may use `{id}` and `{prefix}`
    #[serde(default)]
    pub vars: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    #[serde(default = "default_true")]
    pub upgrade: bool,
    /// Apply a private temp copy instead of the module in place
    #[serde(default = "default_true")]
    pub copy_to_temp: bool,
    /// Resource-name prefix template, e.g. `eg-test-suite-{id}`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
    #[serde(default)]
    pub outputs: Vec<OutputCheck>,
}

impl SuiteConfig {
    pub fn new(name: impl Into<String>, module: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            root: None,
            module: module.into(),
            var_files: Vec::new(),
            vars: BTreeMap::new(),
            env: BTreeMap::new(),
            upgrade: true,
            copy_to_temp: true,
            name_prefix: None,
            timeout_seconds: None,
            outputs: Vec::new(),
        }
    }

    pub fn from_yaml_str(content: &str) -> SuiteResult<Self> {
        let suite: Self = serde_yaml::from_str(content)?;
        suite.validate()?;
        Ok(suite)
    }

    pub fn load(path: &Path) -> SuiteResult<Self> {
        debug!("Loading suite from {:?}", path);
        let content = fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    pub fn to_yaml(&self) -> SuiteResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    pub fn validate(&self) -> SuiteResult<()> {
        if self.name.trim().is_empty() {
            return Err(SuiteError::InvalidSuite("suite name is empty".to_string()));
        }
        if !is_confined_path(&self.module) {
            return Err(SuiteError::InvalidSuite(format!(
                "module must be a path inside the root: {}",
                self.module.display()
            )));
        }
        for check in &self.outputs {
            check.validate()?;
        }
        Ok(())
    }

    pub fn placeholders(&self, id: &str) -> Placeholders {
        Placeholders::new(id, self.name_prefix.as_deref())
    }

    /// Root resolution: explicit override, then `INFRATEST_ROOT`, then the
    /// suite's own root, then the current directory.
    pub fn resolve_root(&self, explicit: Option<&Path>) -> PathBuf {
        if let Some(root) = explicit {
            return root.to_path_buf();
        }
        if let Ok(root) = std::env::var(ROOT_ENV) {
            if !root.is_empty() {
                return PathBuf::from(root);
            }
        }
        self.root.clone().unwrap_or_else(|| PathBuf::from("."))
    }

    /// Options for this suite with placeholders substituted into the vars.
    /// The terraform dir is filled in by the caller.
    pub fn terraform_options(&self, placeholders: &Placeholders) -> TerraformOptions {
        let mut options = TerraformOptions::default().upgrade(self.upgrade);
        for file in &self.var_files {
            options = options.var_file(placeholders.apply(file));
        }
        for (name, value) in &self.vars {
            options = options.var(name.clone(), placeholders.apply_value(value));
        }
        for (key, value) in &self.env {
            options = options.env(key.clone(), value.clone());
        }
        if let Some(timeout) = self.timeout_seconds {
            options = options.timeout(timeout);
        }
        options
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SUITE: &str = r#"
name: vpc-only
module: examples/vpc
var_files:
  - fixtures.us-east-2.tfvars
vars:
  attributes: ["{id}"]
  enabled: "true"
name_prefix: eg-test-{id}
outputs:
  - output: vpc_cidr
    expect:
      kind: equals
      value: 172.16.0.0/16
"#;

    #[test]
    fn test_load_yaml_defaults() {
        let suite = SuiteConfig::from_yaml_str(SUITE).unwrap();

        assert_eq!(suite.name, "vpc-only");
        assert!(suite.upgrade);
        assert!(suite.copy_to_temp);
        assert_eq!(suite.root, None);
        assert_eq!(suite.outputs.len(), 1);
    }

    #[test]
    fn test_terraform_options_substitutes_id() {
        let suite = SuiteConfig::from_yaml_str(SUITE).unwrap();
        let placeholders = suite.placeholders("abc123");
        let options = suite.terraform_options(&placeholders);

        assert!(options.upgrade);
        assert_eq!(options.var_files, vec!["fixtures.us-east-2.tfvars"]);
        assert_eq!(options.vars.get("attributes"), Some(&json!(["abc123"])));
        assert_eq!(options.vars.get("enabled"), Some(&json!("true")));
        assert_eq!(placeholders.prefix, "eg-test-abc123");
    }

    #[test]
    fn test_module_outside_root_rejected() {
        for module in ["/abs/module", "../outside", "examples/../../outside"] {
            let suite = SuiteConfig::new("bad", module);
            assert!(
                matches!(suite.validate(), Err(SuiteError::InvalidSuite(_))),
                "{} accepted",
                module
            );
        }
        SuiteConfig::new("ok", "examples/complete").validate().unwrap();
    }

    #[test]
    fn test_load_from_file_and_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("suite.yaml");
        fs::write(&path, SUITE).unwrap();

        let suite = SuiteConfig::load(&path).unwrap();
        let again = SuiteConfig::from_yaml_str(&suite.to_yaml().unwrap()).unwrap();
        assert_eq!(suite, again);
    }

    #[test]
    fn test_explicit_root_wins() {
        let mut suite = SuiteConfig::new("s", "examples/complete");
        suite.root = Some(PathBuf::from("/from/suite"));
        assert_eq!(
            suite.resolve_root(Some(Path::new("/explicit"))),
            PathBuf::from("/explicit")
        );
    }
}
