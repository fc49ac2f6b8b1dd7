//! The bounded code-generation analysis loop.
//!
//! State machine: GENERATE → EXECUTE → (SUCCESS | INSTALL_MISSING | FIX) →
//! EXECUTE, bounded by `max_attempts`. The data file path is fixed for the
//! life of the loop; only the generated code changes between attempts.
//! Exhausting the attempt budget is a terminal *result*, not an error — the
//! caller always gets a user-facing report.

use crate::codegen::{explain_results, fix_code, generate_analysis_code};
use crate::sandbox::CodeSandbox;
use hearth_core::provider::Provider;
use tracing::{debug, info, warn};

/// Default attempt budget.
pub const DEFAULT_MAX_ATTEMPTS: usize = 5;

/// Default number of data-file bytes shown to the model as a sample.
pub const DEFAULT_SAMPLE_BYTES: usize = 2000;

/// Terminal result of an analysis run.
#[derive(Debug, Clone)]
pub struct AnalysisReport {
    /// The user-facing answer (explanation or failure message).
    pub answer: String,
    /// The last code that ran (or tried to).
    pub code: String,
    /// Raw captured output of the last execution.
    pub output: String,
    /// How many execute attempts were made.
    pub attempts: usize,
    /// Whether an execution succeeded.
    pub succeeded: bool,
}

/// Orchestrates the generate/execute/fix loop.
pub struct CodeAnalysis<'a> {
    provider: &'a dyn Provider,
    sandbox: &'a dyn CodeSandbox,
    max_attempts: usize,
    sample_bytes: usize,
}

impl<'a> CodeAnalysis<'a> {
    pub fn new(provider: &'a dyn Provider, sandbox: &'a dyn CodeSandbox) -> Self {
        Self {
            provider,
            sandbox,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            sample_bytes: DEFAULT_SAMPLE_BYTES,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_sample_bytes(mut self, sample_bytes: usize) -> Self {
        self.sample_bytes = sample_bytes;
        self
    }

    /// Analyze the data file by generating and executing code.
    ///
    /// `data_path` is passed to the model verbatim and never altered
    /// between attempts.
    pub async fn run(&self, data_path: &str, question: &str) -> AnalysisReport {
        let data_sample = self.read_sample(data_path).await;

        let mut code = String::new();
        let mut last_output = String::new();
        let mut last_missing: Vec<String> = Vec::new();
        let mut installed: Vec<String> = Vec::new();
        let mut retry_same_code = false;
        let mut attempts = 0;

        while attempts < self.max_attempts {
            attempts += 1;
            info!(attempt = attempts, max = self.max_attempts, "Analysis attempt");

            if attempts == 1 {
                code = match generate_analysis_code(
                    self.provider,
                    &data_sample,
                    data_path,
                    question,
                )
                .await
                {
                    Ok(code) => code,
                    Err(e) => {
                        warn!(error = %e, "Code generation failed");
                        last_output = format!("Code generation failed: {e}");
                        continue;
                    }
                };
            } else if retry_same_code {
                // Packages were just installed: re-run the same code.
                debug!("Re-executing unchanged code after package install");
                retry_same_code = false;
            } else {
                code = match fix_code(
                    self.provider,
                    &code,
                    &last_output,
                    question,
                    data_path,
                    &last_missing,
                )
                .await
                {
                    Ok(fixed) => fixed,
                    Err(e) => {
                        warn!(error = %e, "Code repair failed");
                        last_output = format!("Code repair failed: {e}");
                        continue;
                    }
                };
            }

            let outcome = self.sandbox.execute(&code).await;
            last_output = outcome.output.clone();
            last_missing = outcome.missing_packages.clone();

            if outcome.success {
                info!(attempts, "Code execution succeeded");
                let explanation = match explain_results(self.provider, question, &outcome.output)
                    .await
                {
                    Ok(text) => text,
                    Err(e) => {
                        // Degrade gracefully: the raw output still answers.
                        warn!(error = %e, "Result explanation failed, returning raw output");
                        format!("Analysis completed. Raw results:\n{}", outcome.output)
                    }
                };

                return AnalysisReport {
                    answer: format!(
                        "{explanation}\n\n**Technical Details**\n\n```python\n{code}\n```\n\n```\n{}\n```",
                        outcome.output.trim_end()
                    ),
                    code,
                    output: outcome.output,
                    attempts,
                    succeeded: true,
                };
            }

            // Missing packages not yet attempted: install and re-execute
            // the same code instead of regenerating.
            let to_install: Vec<String> = outcome
                .missing_packages
                .iter()
                .filter(|p| !installed.contains(*p))
                .cloned()
                .collect();

            if !to_install.is_empty() {
                let install = self.sandbox.install(&to_install).await;
                if install.success {
                    info!(message = %install.message, "Package install succeeded");
                    installed.extend(to_install);
                    retry_same_code = true;
                    continue;
                }
                warn!(message = %install.message, "Package install failed");
                // Fall through to a FIX pass on the next attempt.
            }

            warn!(attempt = attempts, "Code execution failed");
        }

        AnalysisReport {
            answer: format!(
                "I wasn't able to generate working code to analyze this data after {} \
                 attempts. Here's the last error encountered:\n\n```\n{}\n```\n\n\
                 You might try rephrasing your question or providing the data in a \
                 different format.",
                self.max_attempts, last_output
            ),
            code,
            output: last_output,
            attempts,
            succeeded: false,
        }
    }

    async fn read_sample(&self, data_path: &str) -> String {
        match tokio::fs::read_to_string(data_path).await {
            Ok(content) => {
                let mut sample = content;
                if sample.len() > self.sample_bytes {
                    let cut = (0..=self.sample_bytes)
                        .rev()
                        .find(|&i| sample.is_char_boundary(i))
                        .unwrap_or(0);
                    sample.truncate(cut);
                }
                sample
            }
            Err(e) => {
                warn!(path = data_path, error = %e, "Could not read data file for sampling");
                format!("Error reading file: {e}")
            }
        }
    }
}
