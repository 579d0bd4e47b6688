//! Isolated Plugin Runner (component D): executes one plugin request in
//! a resource-bounded child process.
//!
//! Sandboxing via POSIX resource limits and process groups is new
//! ground for this codebase, which otherwise never spawns subprocesses;
//! the `libc::setrlimit`/`setpgid`/`killpg` usage here follows standard
//! POSIX sandboxing idiom.

use crate::config::IsolationConfig;
use crate::monitoring::MetricsRegistry;
use chrono::Utc;
use dashmap::DashMap;
use serde::Serialize;
use serde_json::Value;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tracing::{debug, warn};

#[derive(Debug, Clone, Serialize)]
pub struct IsolationResult {
    pub success: bool,
    pub output: Option<Value>,
    pub error: Option<String>,
    pub duration_ms: u64,
    pub memory_peak_mb: u64,
    pub exit_code: i32,
}

impl IsolationResult {
    fn timeout(duration_ms: u64) -> Self {
        Self {
            success: false,
            output: None,
            error: Some("timeout".to_string()),
            duration_ms,
            memory_peak_mb: 0,
            exit_code: 124,
        }
    }

    fn spawn_error(duration_ms: u64, error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: None,
            error: Some(error.into()),
            duration_ms,
            memory_peak_mb: 0,
            exit_code: 1,
        }
    }
}

/// Runs plugin requests in isolated child processes and tracks the
/// active PID set so `shutdown()` can guarantee no orphans.
pub struct IsolatedPluginRunner {
    config: IsolationConfig,
    metrics: MetricsRegistry,
    active_pids: DashMap<u32, ()>,
}

impl IsolatedPluginRunner {
    pub fn new(config: IsolationConfig, metrics: MetricsRegistry) -> Arc<Self> {
        Arc::new(Self {
            config,
            metrics,
            active_pids: DashMap::new(),
        })
    }

    /// Run `plugin_code` (a command line whose first token is an
    /// executable implementing the loader contract: read one JSON
    /// request line on stdin, write one JSON response line to stdout)
    /// against `request`, bounded by `timeout_seconds`.
    pub async fn execute_request(&self, plugin_name: &str, request: &Value, plugin_code: &str) -> IsolationResult {
        let start = std::time::Instant::now();
        let timeout = std::time::Duration::from_secs(self.config.timeout_seconds);

        let mut parts = plugin_code.split_whitespace();
        let Some(program) = parts.next() else {
            return self.finish(plugin_name, IsolationResult::spawn_error(elapsed_ms(start), "empty plugin_code"));
        };
        let mut command = Command::new(program);
        command.args(parts);
        command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        apply_resource_limits(&mut command, &self.config);

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(err) => {
                warn!(plugin = plugin_name, error = %err, "failed to spawn isolated plugin process");
                return self.finish(plugin_name, IsolationResult::spawn_error(elapsed_ms(start), err.to_string()));
            }
        };

        let pid = child.id().unwrap_or(0);
        if pid != 0 {
            self.active_pids.insert(pid, ());
        }

        if let Some(mut stdin) = child.stdin.take() {
            let payload = serde_json::to_vec(request).unwrap_or_default();
            if let Err(err) = stdin.write_all(&payload).await {
                debug!(plugin = plugin_name, error = %err, "failed writing request to plugin stdin");
            }
        }

        let result = tokio::time::timeout(timeout, wait_with_output(&mut child)).await;
        self.active_pids.remove(&pid);

        let outcome = match result {
            Ok(Ok((exit_code, stdout, stderr))) => {
                if !stderr.is_empty() {
                    debug!(plugin = plugin_name, stderr = %String::from_utf8_lossy(&stderr), "plugin stderr");
                }
                let output = serde_json::from_slice::<Value>(&stdout).ok().or_else(|| {
                    let text = String::from_utf8_lossy(&stdout).trim().to_string();
                    (!text.is_empty()).then_some(Value::String(text))
                });
                IsolationResult {
                    success: exit_code == 0,
                    error: (exit_code != 0).then(|| format!("plugin exited with status {exit_code}")),
                    output,
                    duration_ms: elapsed_ms(start),
                    memory_peak_mb: 0,
                    exit_code,
                }
            }
            Ok(Err(err)) => IsolationResult::spawn_error(elapsed_ms(start), err.to_string()),
            Err(_) => {
                kill_process_group(pid);
                let _ = child.kill().await;
                IsolationResult::timeout(elapsed_ms(start))
            }
        };

        self.finish(plugin_name, outcome)
    }

    fn finish(&self, plugin_name: &str, result: IsolationResult) -> IsolationResult {
        self.metrics.set_gauge(
            "isolation_execution_duration_ms",
            vec![("plugin", plugin_name.to_string())],
            result.duration_ms as f64,
        );
        result
    }

    /// Kill every tracked child. Completes without waiting on orphaned
    /// processes past a best-effort signal delivery.
    pub async fn shutdown(&self) {
        let pids: Vec<u32> = self.active_pids.iter().map(|e| *e.key()).collect();
        for pid in pids {
            kill_process_group(pid);
            self.active_pids.remove(&pid);
        }
    }

    pub fn active_count(&self) -> usize {
        self.active_pids.len()
    }
}

async fn wait_with_output(child: &mut tokio::process::Child) -> std::io::Result<(i32, Vec<u8>, Vec<u8>)> {
    let mut stdout_buf = Vec::new();
    let mut stderr_buf = Vec::new();
    if let Some(mut stdout) = child.stdout.take() {
        stdout.read_to_end(&mut stdout_buf).await?;
    }
    if let Some(mut stderr) = child.stderr.take() {
        stderr.read_to_end(&mut stderr_buf).await?;
    }
    let status = child.wait().await?;
    Ok((status.code().unwrap_or(-1), stdout_buf, stderr_buf))
}

fn elapsed_ms(start: std::time::Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

#[cfg(unix)]
fn apply_resource_limits(command: &mut Command, config: &IsolationConfig) {
    use std::os::unix::process::CommandExt;

    let memory_limit_bytes = config.memory_limit_mb * 1024 * 1024;
    // CPU-time limit is derived as ceil(1.5 * wall clock timeout), giving
    // the child headroom over the outer deadline before the kernel itself
    // kills it on CPU exhaustion.
    let cpu_limit_seconds = ((config.timeout_seconds as f64) * 1.5).ceil() as u64;

    unsafe {
        command.pre_exec(move || {
            let as_limit = libc::rlimit {
                rlim_cur: memory_limit_bytes,
                rlim_max: memory_limit_bytes,
            };
            if libc::setrlimit(libc::RLIMIT_AS, &as_limit) != 0 {
                return Err(std::io::Error::last_os_error());
            }
            let cpu_limit = libc::rlimit {
                rlim_cur: cpu_limit_seconds,
                rlim_max: cpu_limit_seconds,
            };
            if libc::setrlimit(libc::RLIMIT_CPU, &cpu_limit) != 0 {
                return Err(std::io::Error::last_os_error());
            }
            if libc::setpgid(0, 0) != 0 {
                return Err(std::io::Error::last_os_error());
            }
            Ok(())
        });
    }
}

#[cfg(not(unix))]
fn apply_resource_limits(_command: &mut Command, _config: &IsolationConfig) {
    // Best-effort only off POSIX: the wall-clock timeout above is the
    // sole enforced bound.
}

#[cfg(unix)]
fn kill_process_group(pid: u32) {
    if pid == 0 {
        return;
    }
    unsafe {
        libc::killpg(pid as i32, libc::SIGKILL);
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: u32) {}
