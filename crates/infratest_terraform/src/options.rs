//! Terraform invocation options and argument rendering.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{TerraformError, TerraformResult};

/// Environment variable overriding the terraform binary.
pub const TERRAFORM_BIN_ENV: &str = "INFRATEST_TERRAFORM_BIN";

/// Options shared by every terraform command of one acceptance run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerraformOptions {
    /// Terraform binary name or path
    pub terraform_binary: String,
    /// Directory holding the root module
    pub terraform_dir: PathBuf,
    /// Tree containing `terraform_dir`, mounted whole when containerized
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mount_root: Option<PathBuf>,
    /// Pass `-upgrade=true` to init
    pub upgrade: bool,
    /// `-var-file` arguments, relative to `terraform_dir`
    pub var_files: Vec<String>,
    /// `-var` overlay, rendered as HCL literals
    pub vars: BTreeMap<String, Value>,
    /// Extra environment for every command
    pub env: BTreeMap<String, String>,
    /// Pass `-no-color`
    pub no_color: bool,
    /// Pass `-lock=true` to apply/destroy
    pub lock: bool,
    /// Echo terraform output while it runs
    pub stream_logs: bool,
    /// Per-command timeout in seconds (0 = none)
    pub timeout_seconds: u64,
}

impl Default for TerraformOptions {
    fn default() -> Self {
        Self {
            terraform_binary: std::env::var(TERRAFORM_BIN_ENV)
                .unwrap_or_else(|_| "terraform".to_string()),
            terraform_dir: PathBuf::from("."),
            mount_root: None,
            upgrade: false,
            var_files: Vec::new(),
            vars: BTreeMap::new(),
            env: BTreeMap::new(),
            no_color: true,
            lock: true,
            stream_logs: false,
            timeout_seconds: 3600,
        }
    }
}

impl TerraformOptions {
    pub fn new(terraform_dir: impl Into<PathBuf>) -> Self {
        Self {
            terraform_dir: terraform_dir.into(),
            ..Self::default()
        }
    }

    pub fn binary(mut self, binary: impl Into<String>) -> Self {
        self.terraform_binary = binary.into();
        self
    }

    pub fn upgrade(mut self, upgrade: bool) -> Self {
        self.upgrade = upgrade;
        self
    }

    pub fn var_file(mut self, file: impl Into<String>) -> Self {
        self.var_files.push(file.into());
        self
    }

    pub fn var(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.vars.insert(name.into(), value.into());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn stream_logs(mut self, enabled: bool) -> Self {
        self.stream_logs = enabled;
        self
    }

    pub fn timeout(mut self, seconds: u64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    pub fn with_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.terraform_dir = dir.as_ref().to_path_buf();
        self
    }

    pub fn mount_root(mut self, root: impl AsRef<Path>) -> Self {
        self.mount_root = Some(root.as_ref().to_path_buf());
        self
    }

    pub fn init_args(&self) -> Vec<String> {
        let mut args = vec![
            "init".to_string(),
            format!("-upgrade={}", self.upgrade),
            "-input=false".to_string(),
        ];
        if self.no_color {
            args.push("-no-color".to_string());
        }
        args
    }

    pub fn apply_args(&self) -> TerraformResult<Vec<String>> {
        let mut args = vec![
            "apply".to_string(),
            "-input=false".to_string(),
            "-auto-approve".to_string(),
        ];
        self.push_common(&mut args)?;
        Ok(args)
    }

    pub fn destroy_args(&self) -> TerraformResult<Vec<String>> {
        let mut args = vec![
            "destroy".to_string(),
            "-auto-approve".to_string(),
            "-input=false".to_string(),
        ];
        self.push_common(&mut args)?;
        Ok(args)
    }

    /// `terraform output` is always JSON so values decode uniformly.
    pub fn output_args(&self, name: Option<&str>) -> Vec<String> {
        let mut args = vec![
            "output".to_string(),
            "-no-color".to_string(),
            "-json".to_string(),
        ];
        if let Some(name) = name {
            args.push(name.to_string());
        }
        args
    }

    fn push_common(&self, args: &mut Vec<String>) -> TerraformResult<()> {
        args.push(format!("-lock={}", self.lock));
        if self.no_color {
            args.push("-no-color".to_string());
        }
        for file in &self.var_files {
            args.push(format!("-var-file={}", file));
        }
        for (name, value) in &self.vars {
            args.push("-var".to_string());
            args.push(var_assignment(name, value)?);
        }
        Ok(())
    }
}

/// Render `name=value` for `-var`. Top-level strings are passed raw, as the
/// terraform CLI expects; everything else becomes an HCL literal.
pub fn var_assignment(name: &str, value: &Value) -> TerraformResult<String> {
    if name.is_empty() || name.contains('=') {
        return Err(TerraformError::InvalidVariable {
            name: name.to_string(),
            reason: "variable names must be non-empty and contain no '='".to_string(),
        });
    }
    match value {
        Value::String(s) => Ok(format!("{}={}", name, s)),
        other => Ok(format!("{}={}", name, to_hcl(other))),
    }
}

/// Render a JSON value as an HCL expression.
pub fn to_hcl(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => quote(s),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().map(to_hcl).collect();
            format!("[{}]", parts.join(", "))
        }
        Value::Object(map) => {
            let parts: Vec<String> = map
                .iter()
                .map(|(k, v)| format!("{} = {}", quote(k), to_hcl(v)))
                .collect();
            format!("{{{}}}", parts.join(", "))
        }
    }
}

fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            _ => out.push(c),
        }
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_hcl_rendering() {
        assert_eq!(to_hcl(&json!(["abc123"])), "[\"abc123\"]");
        assert_eq!(to_hcl(&json!(true)), "true");
        assert_eq!(to_hcl(&json!(3)), "3");
        assert_eq!(to_hcl(&json!({"Env": "test"})), "{\"Env\" = \"test\"}");
        assert_eq!(to_hcl(&json!("say \"hi\"")), "\"say \\\"hi\\\"\"");
        assert_eq!(to_hcl(&json!([[1, 2], null])), "[[1, 2], null]");
    }

    #[test]
    fn test_var_assignment() {
        assert_eq!(
            var_assignment("attributes", &json!(["xk3p9q"])).unwrap(),
            "attributes=[\"xk3p9q\"]"
        );
        assert_eq!(
            var_assignment("enabled", &json!("false")).unwrap(),
            "enabled=false"
        );
        assert!(var_assignment("", &json!(1)).is_err());
        assert!(var_assignment("a=b", &json!(1)).is_err());
    }

    #[test]
    fn test_apply_args() {
        let options = TerraformOptions::new("/tmp/complete")
            .upgrade(true)
            .var_file("fixtures.us-east-2.tfvars")
            .var("attributes", json!(["xk3p9q"]));

        let args = options.apply_args().unwrap();
        assert_eq!(
            args,
            vec![
                "apply",
                "-input=false",
                "-auto-approve",
                "-lock=true",
                "-no-color",
                "-var-file=fixtures.us-east-2.tfvars",
                "-var",
                "attributes=[\"xk3p9q\"]",
            ]
        );

        let destroy = options.destroy_args().unwrap();
        assert_eq!(destroy[0], "destroy");
        assert!(destroy.contains(&"-var-file=fixtures.us-east-2.tfvars".to_string()));
    }

    #[test]
    fn test_init_and_output_args() {
        let options = TerraformOptions::new(".").upgrade(true);
        assert_eq!(
            options.init_args(),
            vec!["init", "-upgrade=true", "-input=false", "-no-color"]
        );
        assert_eq!(
            options.output_args(Some("vpc_cidr")),
            vec!["output", "-no-color", "-json", "vpc_cidr"]
        );
        assert_eq!(options.output_args(None).len(), 3);
    }
}
