//! Terraform client driving init, apply, output and destroy.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use infratest_runner::{CommandConfig, CommandRunner, ExecutionResult, RunConfig};

use crate::error::{TerraformError, TerraformResult};
use crate::options::TerraformOptions;

/// One entry of `terraform output -json`.
#[derive(Debug, Clone, Deserialize)]
struct OutputMeta {
    #[serde(default)]
    value: Value,
}

/// Terraform client bound to one module directory.
#[derive(Clone)]
pub struct Terraform {
    runner: Arc<dyn CommandRunner>,
    options: TerraformOptions,
}

impl Terraform {
    pub fn new(runner: Arc<dyn CommandRunner>, options: TerraformOptions) -> Self {
        Self { runner, options }
    }

    pub fn options(&self) -> &TerraformOptions {
        &self.options
    }

    /// Fail early when the terraform binary cannot be executed.
    pub async fn ensure_available(&self) -> TerraformResult<()> {
        if self.runner.is_available(&self.options.terraform_binary).await? {
            Ok(())
        } else {
            Err(TerraformError::TerraformNotAvailable(
                self.options.terraform_binary.clone(),
            ))
        }
    }

    /// Run terraform init.
    pub async fn init(&self) -> TerraformResult<()> {
        info!("Running terraform init in {:?}", self.options.terraform_dir);
        let result = self.run_command(self.options.init_args()).await?;
        if !result.success() {
            return Err(TerraformError::InitFailed(result.combined_output()));
        }
        Ok(())
    }

    /// Run terraform apply.
    pub async fn apply(&self) -> TerraformResult<()> {
        info!("Running terraform apply in {:?}", self.options.terraform_dir);
        let result = self.run_command(self.options.apply_args()?).await?;
        if !result.success() {
            return Err(TerraformError::ApplyFailed(result.combined_output()));
        }
        Ok(())
    }

    /// Run init followed by apply.
    pub async fn init_and_apply(&self) -> TerraformResult<()> {
        self.init().await?;
        self.apply().await
    }

    /// Run terraform destroy.
    pub async fn destroy(&self) -> TerraformResult<()> {
        info!("Running terraform destroy in {:?}", self.options.terraform_dir);
        let result = self.run_command(self.options.destroy_args()?).await?;
        if !result.success() {
            return Err(TerraformError::DestroyFailed(result.combined_output()));
        }
        Ok(())
    }

    /// Fetch one output as raw JSON.
    pub async fn output_json(&self, name: &str) -> TerraformResult<Value> {
        let result = self.run_command(self.options.output_args(Some(name))).await?;
        if !result.success() {
            let message = result.combined_output();
            if message.contains("not found") {
                return Err(TerraformError::OutputNotFound(name.to_string()));
            }
            return Err(TerraformError::OutputFailed {
                name: name.to_string(),
                message,
            });
        }
        serde_json::from_str(result.stdout.trim()).map_err(|source| TerraformError::Decode {
            name: name.to_string(),
            source,
        })
    }

    /// Fetch a scalar output as a string.
    pub async fn output(&self, name: &str) -> TerraformResult<String> {
        let value = self.output_json(name).await?;
        Ok(scalar_to_string(&value))
    }

    /// Fetch a list output as strings, preserving order.
    pub async fn output_list(&self, name: &str) -> TerraformResult<Vec<String>> {
        let items: Vec<Value> = self.output_struct(name).await?;
        Ok(items.iter().map(scalar_to_string).collect())
    }

    /// Decode an output into a typed structure.
    pub async fn output_struct<T: DeserializeOwned>(&self, name: &str) -> TerraformResult<T> {
        let value = self.output_json(name).await?;
        serde_json::from_value(value).map_err(|source| TerraformError::Decode {
            name: name.to_string(),
            source,
        })
    }

    /// Fetch every output value keyed by name.
    pub async fn output_all(&self) -> TerraformResult<BTreeMap<String, Value>> {
        let result = self.run_command(self.options.output_args(None)).await?;
        if !result.success() {
            return Err(TerraformError::OutputFailed {
                name: "*".to_string(),
                message: result.combined_output(),
            });
        }

        let trimmed = result.stdout.trim();
        if trimmed.is_empty() {
            warn!("terraform output returned nothing, treating as no outputs");
            return Ok(BTreeMap::new());
        }

        let outputs: BTreeMap<String, OutputMeta> =
            serde_json::from_str(trimmed).map_err(|source| TerraformError::Decode {
                name: "*".to_string(),
                source,
            })?;

        Ok(outputs.into_iter().map(|(k, v)| (k, v.value)).collect())
    }

    fn command(&self, args: Vec<String>) -> CommandConfig {
        let mut command = CommandConfig::new(&self.options.terraform_binary)
            .args(args)
            .workdir(&self.options.terraform_dir)
            .env("TF_IN_AUTOMATION", "1");
        if let Some(root) = &self.options.mount_root {
            command = command.mount_root(root);
        }
        for (key, value) in &self.options.env {
            command = command.env(key, value);
        }
        command
    }

    async fn run_command(&self, args: Vec<String>) -> TerraformResult<ExecutionResult> {
        let command = self.command(args);
        let run_config = RunConfig::default()
            .timeout(self.options.timeout_seconds)
            .stream_logs(self.options.stream_logs);

        debug!("Executing {}", command.display());

        Ok(self.runner.run(&command, &run_config).await?)
    }
}

/// Strings unquoted, everything else as compact JSON.
pub fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
