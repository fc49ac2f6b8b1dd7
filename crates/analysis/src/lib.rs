//! Document-analysis orchestrators.
//!
//! Two escalating strategies over the same completion service:
//!
//! - **Synthesis** — summarize, plan, then answer using only the model.
//! - **Code loop** — generate analysis code, execute it in a sandboxed
//!   subprocess, and repair it across a bounded number of attempts.

pub mod codegen;
pub mod runner;
pub mod sandbox;
pub mod synthesis;

pub use codegen::{ensure_path_reference, extract_code};
pub use runner::{AnalysisReport, CodeAnalysis};
pub use sandbox::{CodeSandbox, ExecutionOutcome, InstallOutcome, ProcessSandbox};
pub use synthesis::{analyze_documents, analyze_documents_with_code, analyze_hierarchical};
