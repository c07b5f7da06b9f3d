//! Process-based command runner.
//!
//! Commands run either directly on the host or inside a container started
//! through the Docker or Podman CLI, with automatic runtime detection.

use std::io::{BufRead, BufReader, Read};
use std::path::{Component, Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::config::{CommandConfig, CommonImages, MountConfig, RunConfig};
use crate::error::{RunnerError, RunnerResult};
use crate::runner::{CommandRunner, ExecutionResult};

/// Container runtime type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerRuntime {
    Docker,
    Podman,
}

impl ContainerRuntime {
    /// Get the CLI command name.
    pub fn command(&self) -> &'static str {
        match self {
            Self::Docker => "docker",
            Self::Podman => "podman",
        }
    }
}

impl std::fmt::Display for ContainerRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.command())
    }
}

/// Where commands are executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Spawn the program directly on the host.
    Local,
    /// Run inside `image:tag`; the image entrypoint is the program.
    Container { image: String, tag: String },
}

impl ExecutionMode {
    /// Containerized terraform using the pinned upstream image.
    pub fn terraform_container() -> Self {
        Self::Container {
            image: CommonImages::TERRAFORM.to_string(),
            tag: CommonImages::TERRAFORM_TAG.to_string(),
        }
    }
}

/// Log output from command execution.
#[derive(Debug, Clone)]
pub struct LogLine {
    pub timestamp: chrono::DateTime<Utc>,
    pub stream: LogStream,
    pub message: String,
}

/// Log stream type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStream {
    Stdout,
    Stderr,
}

impl std::fmt::Display for LogStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stdout => write!(f, "stdout"),
            Self::Stderr => write!(f, "stderr"),
        }
    }
}

/// Log handler callback type.
pub type LogHandler = Arc<dyn Fn(LogLine) + Send + Sync>;

/// CLI runner options.
#[derive(Debug, Clone)]
pub struct CliRunnerOptions {
    /// Local or containerized execution
    pub mode: ExecutionMode,
    /// Preferred container runtime (if not set, auto-detect)
    pub preferred_runtime: Option<ContainerRuntime>,
    /// Dry-run mode (log commands without executing)
    pub dry_run: bool,
    /// CI mode (timestamped log lines)
    pub ci_mode: bool,
}

impl Default for CliRunnerOptions {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::Local,
            preferred_runtime: None,
            dry_run: false,
            ci_mode: std::env::var("CI").is_ok(),
        }
    }
}

impl CliRunnerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dry_run(mut self) -> Self {
        self.dry_run = true;
        self
    }

    pub fn ci_mode(mut self) -> Self {
        self.ci_mode = true;
        self
    }

    pub fn containerized(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn prefer_docker(mut self) -> Self {
        self.preferred_runtime = Some(ContainerRuntime::Docker);
        self
    }

    pub fn prefer_podman(mut self) -> Self {
        self.preferred_runtime = Some(ContainerRuntime::Podman);
        self
    }
}

/// Host environment variables forwarded into containers by name.
pub const PASSTHROUGH_ENV_PREFIXES: [&str; 2] = ["AWS_", "TF_VAR_"];

/// Container path the mount root is mounted at.
const CONTAINER_WORKSPACE: &str = "/workspace";

/// Fully resolved process invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Invocation {
    program: String,
    args: Vec<String>,
    cwd: Option<PathBuf>,
    /// Named container started by this invocation
    container: Option<(ContainerRuntime, String)>,
}

impl Invocation {
    /// `<runtime> rm -f <name>`, which stops a container the client process
    /// left behind.
    fn cleanup_command(&self) -> Option<Command> {
        let (runtime, name) = self.container.as_ref()?;
        let mut cmd = Command::new(runtime.command());
        cmd.args(["rm", "-f", name.as_str()])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        Some(cmd)
    }
}

/// Names of host variables to forward with `-e NAME`, sorted.
pub fn passthrough_env_names<I>(vars: I) -> Vec<String>
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut names: Vec<String> = vars
        .into_iter()
        .map(|(name, _)| name)
        .filter(|name| PASSTHROUGH_ENV_PREFIXES.iter().any(|p| name.starts_with(p)))
        .collect();
    names.sort();
    names
}

/// CLI-based command runner.
pub struct CliRunner {
    runtime: Option<ContainerRuntime>,
    options: CliRunnerOptions,
    log_handler: Option<LogHandler>,
}

impl CliRunner {
    /// Create a runner; container mode detects a runtime up front.
    pub fn new(options: CliRunnerOptions) -> RunnerResult<Self> {
        let runtime = match options.mode {
            ExecutionMode::Local => None,
            ExecutionMode::Container { .. } => {
                let runtime = Self::detect_runtime(&options)?;
                info!("Using container runtime: {}", runtime);
                Some(runtime)
            }
        };

        Ok(Self {
            runtime,
            options,
            log_handler: None,
        })
    }

    /// Create a local runner.
    pub fn local() -> Self {
        Self {
            runtime: None,
            options: CliRunnerOptions::default(),
            log_handler: None,
        }
    }

    /// Create a runner with a specific runtime.
    pub fn with_runtime(runtime: ContainerRuntime, options: CliRunnerOptions) -> Self {
        Self {
            runtime: Some(runtime),
            options,
            log_handler: None,
        }
    }

    /// Set a log handler for streaming logs.
    pub fn with_log_handler(mut self, handler: LogHandler) -> Self {
        self.log_handler = Some(handler);
        self
    }

    /// Detect available container runtime.
    pub fn detect_runtime(options: &CliRunnerOptions) -> RunnerResult<ContainerRuntime> {
        if let Some(preferred) = options.preferred_runtime {
            if Self::program_available(preferred.command(), "version") {
                return Ok(preferred);
            }
            warn!(
                "Preferred runtime {} not available, trying alternatives",
                preferred
            );
        }

        for runtime in [ContainerRuntime::Docker, ContainerRuntime::Podman] {
            if Self::program_available(runtime.command(), "version") {
                return Ok(runtime);
            }
        }

        Err(RunnerError::ToolNotAvailable(
            "Neither Docker nor Podman is available".to_string(),
        ))
    }

    fn program_available(program: &str, version_arg: &str) -> bool {
        Command::new(program)
            .arg(version_arg)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    /// Get the container runtime, if running containerized.
    pub fn runtime(&self) -> Option<ContainerRuntime> {
        self.runtime
    }

    /// Check if dry-run mode is enabled.
    pub fn is_dry_run(&self) -> bool {
        self.options.dry_run
    }

    /// Resolve a command into the process that actually gets spawned.
    fn build_invocation(&self, command: &CommandConfig) -> RunnerResult<Invocation> {
        let (image, tag, runtime) = match (&self.options.mode, self.runtime) {
            (ExecutionMode::Local, _) => {
                return Ok(Invocation {
                    program: command.program.clone(),
                    args: command.args.clone(),
                    cwd: command.workdir.clone(),
                    container: None,
                });
            }
            (ExecutionMode::Container { image, tag }, Some(runtime)) => (image, tag, runtime),
            (ExecutionMode::Container { .. }, None) => {
                return Err(RunnerError::ToolNotAvailable(
                    "container mode requires a detected runtime".to_string(),
                ));
            }
        };

        let mut args = vec!["run".to_string(), "--rm".to_string()];

        if let Some(workdir) = &command.workdir {
            let (mount, container_workdir) =
                container_paths(workdir, command.mount_root.as_deref())?;
            args.push("-v".to_string());
            args.push(mount.volume_spec());
            args.push("-w".to_string());
            args.push(container_workdir);
        }

        if let Some(aws_dir) = host_aws_config() {
            args.push("-v".to_string());
            args.push(MountConfig::new(aws_dir, "/root/.aws").read_only().volume_spec());
        }

        for name in passthrough_env_names(std::env::vars()) {
            if command.env.contains_key(&name) {
                continue;
            }
            args.push("-e".to_string());
            args.push(name);
        }

        for (key, value) in &command.env {
            args.push("-e".to_string());
            args.push(format!("{}={}", key, value));
        }

        let name = format!(
            "infratest-{}",
            &uuid::Uuid::new_v4().simple().to_string()[..8]
        );
        args.push("--name".to_string());
        args.push(name.clone());

        args.push(format!("{}:{}", image, tag));
        args.extend(command.args.iter().cloned());

        Ok(Invocation {
            program: runtime.command().to_string(),
            args,
            cwd: None,
            container: Some((runtime, name)),
        })
    }
}

/// Mount for `workdir` and the matching container working directory. With a
/// mount root the whole root is mounted and the workdir is addressed
/// relative to it.
fn container_paths(
    workdir: &Path,
    mount_root: Option<&Path>,
) -> RunnerResult<(MountConfig, String)> {
    if !workdir.is_absolute() {
        return Err(RunnerError::InvalidMount(format!(
            "workdir must be absolute: {}",
            workdir.display()
        )));
    }

    let root = match mount_root {
        Some(root) => root,
        None => {
            return Ok((
                MountConfig::new(workdir.to_path_buf(), CONTAINER_WORKSPACE),
                CONTAINER_WORKSPACE.to_string(),
            ))
        }
    };

    let relative = workdir.strip_prefix(root).map_err(|_| {
        RunnerError::InvalidMount(format!(
            "workdir {} is not under mount root {}",
            workdir.display(),
            root.display()
        ))
    })?;

    let mut container_workdir = CONTAINER_WORKSPACE.to_string();
    for component in relative.components() {
        match component {
            Component::Normal(part) => {
                container_workdir.push('/');
                container_workdir.push_str(&part.to_string_lossy());
            }
            Component::CurDir => {}
            _ => {
                return Err(RunnerError::InvalidMount(format!(
                    "workdir escapes mount root: {}",
                    workdir.display()
                )))
            }
        }
    }

    Ok((
        MountConfig::new(root.to_path_buf(), CONTAINER_WORKSPACE),
        container_workdir,
    ))
}

/// `~/.aws`, when it exists, for shared credentials and profiles.
fn host_aws_config() -> Option<PathBuf> {
    let home = std::env::var_os("HOME")?;
    let dir = PathBuf::from(home).join(".aws");
    dir.is_dir().then_some(dir)
}

/// Spawn a process, collect its output with optional streaming, and enforce
/// the timeout.
fn execute_with_streaming(
    invocation: &Invocation,
    env: &std::collections::BTreeMap<String, String>,
    run_config: &RunConfig,
    ci_mode: bool,
    log_handler: Option<LogHandler>,
) -> RunnerResult<(i64, String, String)> {
    let mut cmd = Command::new(&invocation.program);
    cmd.args(&invocation.args);
    cmd.envs(env);
    if let Some(cwd) = &invocation.cwd {
        cmd.current_dir(cwd);
    }
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());

    let mut child = cmd.spawn().map_err(|e| {
        RunnerError::ExecutionFailed(format!("Failed to spawn {}: {}", invocation.program, e))
    })?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| RunnerError::ExecutionFailed("stdout not captured".to_string()))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| RunnerError::ExecutionFailed("stderr not captured".to_string()))?;

    let stdout_handle = spawn_collector(
        stdout,
        LogStream::Stdout,
        run_config.stream_logs,
        ci_mode,
        log_handler.clone(),
    );
    let stderr_handle = spawn_collector(
        stderr,
        LogStream::Stderr,
        run_config.stream_logs,
        ci_mode,
        log_handler,
    );

    let status = if run_config.timeout_seconds > 0 {
        let timeout = Duration::from_secs(run_config.timeout_seconds);
        let start = Instant::now();
        loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {
                    if start.elapsed() > timeout {
                        let _ = child.kill();
                        let _ = child.wait();
                        if let Some(mut cleanup) = invocation.cleanup_command() {
                            warn!("Timed out, removing container: {:?}", invocation.container);
                            if let Err(e) = cleanup.status() {
                                error!("Failed to remove timed-out container: {}", e);
                            }
                        }
                        return Err(RunnerError::Timeout(run_config.timeout_seconds));
                    }
                    std::thread::sleep(Duration::from_millis(100));
                }
                Err(e) => {
                    return Err(RunnerError::ExecutionFailed(format!(
                        "Failed to wait for process: {}",
                        e
                    )));
                }
            }
        }
    } else {
        child.wait().map_err(|e| {
            RunnerError::ExecutionFailed(format!("Failed to wait for process: {}", e))
        })?
    };

    let stdout_output = stdout_handle.join().unwrap_or_default();
    let stderr_output = stderr_handle.join().unwrap_or_default();

    let exit_code = status.code().unwrap_or(-1) as i64;

    Ok((exit_code, stdout_output, stderr_output))
}

fn spawn_collector<R: Read + Send + 'static>(
    source: R,
    stream: LogStream,
    stream_logs: bool,
    ci_mode: bool,
    log_handler: Option<LogHandler>,
) -> std::thread::JoinHandle<String> {
    std::thread::spawn(move || {
        let reader = BufReader::new(source);
        let mut output = String::new();
        for line in reader.lines().map_while(Result::ok) {
            output.push_str(&line);
            output.push('\n');
            if !stream_logs {
                continue;
            }
            let log_line = LogLine {
                timestamp: Utc::now(),
                stream,
                message: line,
            };
            if ci_mode {
                println!(
                    "[{}] [{}] {}",
                    log_line.timestamp.format("%Y-%m-%dT%H:%M:%S%.3fZ"),
                    log_line.stream,
                    log_line.message
                );
            } else {
                match stream {
                    LogStream::Stdout => println!("{}", log_line.message),
                    LogStream::Stderr => eprintln!("{}", log_line.message),
                }
            }
            if let Some(handler) = &log_handler {
                handler(log_line);
            }
        }
        output
    })
}

#[async_trait]
impl CommandRunner for CliRunner {
    async fn is_available(&self, program: &str) -> RunnerResult<bool> {
        match self.runtime {
            Some(runtime) => Ok(Self::program_available(runtime.command(), "version")),
            None => Ok(Self::program_available(program, "version")),
        }
    }

    async fn run(
        &self,
        command: &CommandConfig,
        run_config: &RunConfig,
    ) -> RunnerResult<ExecutionResult> {
        let invocation = self.build_invocation(command)?;
        let rendered = command.display();

        info!("Running: {}", rendered);
        debug!("Spawning {} {:?}", invocation.program, invocation.args);

        if self.options.dry_run {
            info!("[DRY-RUN] Would execute: {}", rendered);
            return Ok(ExecutionResult {
                command: rendered,
                exit_code: 0,
                stdout: String::new(),
                stderr: String::new(),
                started_at: Utc::now(),
                finished_at: Utc::now(),
                duration_ms: 0,
            });
        }

        let env = command.env.clone();
        let run_config_owned = run_config.clone();
        let ci_mode = self.options.ci_mode;
        let log_handler = self.log_handler.clone();

        let started_at = Utc::now();
        let (exit_code, stdout, stderr) = tokio::task::spawn_blocking(move || {
            execute_with_streaming(&invocation, &env, &run_config_owned, ci_mode, log_handler)
        })
        .await
        .map_err(|e| RunnerError::ExecutionFailed(format!("execution task failed: {}", e)))??;
        let finished_at = Utc::now();
        let duration_ms = (finished_at - started_at).num_milliseconds().max(0) as u64;

        if exit_code == 0 {
            info!("Command completed successfully in {}ms", duration_ms);
        } else {
            error!(
                "Command failed with exit code {} after {}ms",
                exit_code, duration_ms
            );
        }

        Ok(ExecutionResult {
            command: rendered,
            exit_code,
            stdout,
            stderr,
            started_at,
            finished_at,
            duration_ms,
        })
    }
}
