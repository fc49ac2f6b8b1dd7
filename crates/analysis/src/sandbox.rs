//! Sandboxed code execution.
//!
//! Generated analysis code runs in an isolated interpreter subprocess with a
//! hard wall-clock timeout, the only operation in the system with one.
//! Package installation gets its own subprocess and a longer limit.
//!
//! Execution is infallible at the type level: every failure mode (non-zero
//! exit, timeout, unspawnable interpreter) folds into an
//! [`ExecutionOutcome`] so the retry loop stays total.

use async_trait::async_trait;
use regex::Regex;
use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Default execution timeout.
pub const DEFAULT_EXEC_TIMEOUT: Duration = Duration::from_secs(60);

/// Default package-install timeout.
pub const DEFAULT_INSTALL_TIMEOUT: Duration = Duration::from_secs(120);

/// Result of one code execution.
#[derive(Debug, Clone)]
pub struct ExecutionOutcome {
    /// Exit code was zero.
    pub success: bool,
    /// stdout on success, stderr (or a timeout note) on failure.
    pub output: String,
    /// Module names scraped from `ModuleNotFoundError` lines.
    pub missing_packages: Vec<String>,
}

/// Result of a package installation.
#[derive(Debug, Clone)]
pub struct InstallOutcome {
    pub success: bool,
    pub message: String,
}

/// The execution collaborator consumed by the analysis loop.
#[async_trait]
pub trait CodeSandbox: Send + Sync {
    async fn execute(&self, code: &str) -> ExecutionOutcome;
    async fn install(&self, packages: &[String]) -> InstallOutcome;
}

fn module_not_found() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"ModuleNotFoundError: No module named '([^']+)'").expect("valid regex")
    })
}

/// Scan stderr for missing-module errors, deduplicated in first-seen order.
pub fn scan_missing_packages(stderr: &str) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    module_not_found()
        .captures_iter(stderr)
        .map(|c| c[1].to_string())
        .filter(|name| seen.insert(name.clone()))
        .collect()
}

/// Subprocess-backed sandbox running a Python interpreter.
pub struct ProcessSandbox {
    python_bin: String,
    exec_timeout: Duration,
    install_timeout: Duration,
    scratch_dir: PathBuf,
}

impl ProcessSandbox {
    pub fn new(python_bin: impl Into<String>) -> Self {
        Self {
            python_bin: python_bin.into(),
            exec_timeout: DEFAULT_EXEC_TIMEOUT,
            install_timeout: DEFAULT_INSTALL_TIMEOUT,
            scratch_dir: std::env::temp_dir().join("hearth_code_exec"),
        }
    }

    pub fn with_timeouts(mut self, exec: Duration, install: Duration) -> Self {
        self.exec_timeout = exec;
        self.install_timeout = install;
        self
    }

    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = dir.into();
        self
    }

    async fn write_script(&self, code: &str) -> std::io::Result<tempfile::TempPath> {
        tokio::fs::create_dir_all(&self.scratch_dir).await?;

        let file = tempfile::Builder::new()
            .prefix("analysis_")
            .suffix(".py")
            .tempfile_in(&self.scratch_dir)?;
        let path = file.into_temp_path();
        tokio::fs::write(&path, code).await?;

        // Debug copy of whatever ran last
        let debug_copy = self.scratch_dir.join("last_executed.py");
        if let Err(e) = tokio::fs::write(&debug_copy, code).await {
            debug!(error = %e, "Could not write last_executed.py copy");
        }

        Ok(path)
    }
}

#[async_trait]
impl CodeSandbox for ProcessSandbox {
    async fn execute(&self, code: &str) -> ExecutionOutcome {
        let script = match self.write_script(code).await {
            Ok(path) => path,
            Err(e) => {
                return ExecutionOutcome {
                    success: false,
                    output: format!("Error preparing code for execution: {e}"),
                    missing_packages: Vec::new(),
                };
            }
        };

        debug!(interpreter = %self.python_bin, "Executing analysis code");

        let child = Command::new(&self.python_bin)
            .arg(script.as_os_str())
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(self.exec_timeout, child).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return ExecutionOutcome {
                    success: false,
                    output: format!("Error executing code: {e}"),
                    missing_packages: Vec::new(),
                };
            }
            Err(_) => {
                warn!(timeout_secs = self.exec_timeout.as_secs(), "Code execution timed out");
                return ExecutionOutcome {
                    success: false,
                    output: format!(
                        "Execution timed out after {} seconds",
                        self.exec_timeout.as_secs()
                    ),
                    missing_packages: Vec::new(),
                };
            }
        };

        if output.status.success() {
            ExecutionOutcome {
                success: true,
                output: String::from_utf8_lossy(&output.stdout).into_owned(),
                missing_packages: Vec::new(),
            }
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            let missing_packages = scan_missing_packages(&stderr);
            debug!(
                exit_code = output.status.code().unwrap_or(-1),
                missing = missing_packages.len(),
                "Code execution failed"
            );
            ExecutionOutcome {
                success: false,
                output: stderr,
                missing_packages,
            }
        }
    }

    async fn install(&self, packages: &[String]) -> InstallOutcome {
        if packages.is_empty() {
            return InstallOutcome {
                success: true,
                message: "No packages to install".into(),
            };
        }

        info!(packages = ?packages, "Installing missing packages");

        let child = Command::new(&self.python_bin)
            .args(["-m", "pip", "install"])
            .args(packages)
            .kill_on_drop(true)
            .output();

        match tokio::time::timeout(self.install_timeout, child).await {
            Ok(Ok(output)) if output.status.success() => InstallOutcome {
                success: true,
                message: format!("Successfully installed: {}", packages.join(" ")),
            },
            Ok(Ok(output)) => InstallOutcome {
                success: false,
                message: format!(
                    "Failed to install packages: {}",
                    String::from_utf8_lossy(&output.stderr)
                ),
            },
            Ok(Err(e)) => InstallOutcome {
                success: false,
                message: format!("Error installing packages: {e}"),
            },
            Err(_) => InstallOutcome {
                success: false,
                message: format!(
                    "Package installation timed out after {} seconds",
                    self.install_timeout.as_secs()
                ),
            },
        }
    }
}
