//! Model-only document analysis: multi-document synthesis and hierarchical
//! single-document analysis.
//!
//! Stateless pipelines with no retries — each stage is one completion call
//! and any stage failure surfaces to the caller. The code-backed variant
//! concatenates the documents into one delimited scratch file and hands it
//! to the bounded code loop.

use crate::runner::{AnalysisReport, CodeAnalysis};
use crate::sandbox::CodeSandbox;
use hearth_core::context::Context;
use hearth_core::error::AnalysisError;
use hearth_core::message::Role;
use hearth_core::provider::Provider;
use hearth_retrieval::embed::Embedder;
use hearth_retrieval::enhance::{RewriteMode, rewrite_query};
use hearth_retrieval::index::VectorIndex;
use hearth_retrieval::retrieve::retrieve_relevant;
use hearth_retrieval::store::DocumentStore;
use std::io::Write;
use tracing::{debug, info};

/// Documents longer than this are truncated before the summary stage.
const SUMMARY_TRUNCATE_CHARS: usize = 10_000;

/// Documents longer than this get section-wise summaries.
const SECTION_SUMMARY_THRESHOLD: usize = 20_000;

/// Section size for section-wise summarization.
const SECTION_CHARS: usize = 10_000;

fn stage_error(stage: &str, e: impl std::fmt::Display) -> AnalysisError {
    AnalysisError::StageFailed {
        stage: stage.to_string(),
        reason: e.to_string(),
    }
}

/// Truncate at a char boundary at or below `max_chars` bytes worth of text.
fn truncate_content(content: &str, max_chars: usize) -> String {
    if content.chars().count() <= max_chars {
        return content.to_string();
    }
    let truncated: String = content.chars().take(max_chars).collect();
    format!("{truncated}...[content truncated for length]")
}

/// Split into fixed-size character sections.
fn char_sections(content: &str, section_chars: usize) -> Vec<String> {
    let chars: Vec<char> = content.chars().collect();
    chars
        .chunks(section_chars)
        .map(|c| c.iter().collect())
        .collect()
}

async fn summarize_document(
    provider: &dyn Provider,
    name: &str,
    content: &str,
) -> Result<String, AnalysisError> {
    let mut context = Context::with_system(
        "You are a document summarizer. Create a concise summary of the following document. \
         Focus on the key points and information that would be most relevant for analysis.",
    );
    context.add_message(Role::User, format!("Document: {name}\n\n{content}"));
    provider
        .generate(&context)
        .await
        .map_err(|e| stage_error("summarize", e))
}

/// Multi-document synthesis: summarize each document, plan the analysis,
/// then answer over the full text.
pub async fn analyze_documents(
    provider: &dyn Provider,
    store: &DocumentStore,
    names: &[String],
    question: &str,
) -> Result<String, AnalysisError> {
    info!(documents = names.len(), "Starting multi-document analysis");

    // Stage 1: per-document summaries
    let mut summaries: Vec<(String, String)> = Vec::new();
    for name in names {
        let sections = store.complete_document(name).await;
        if sections.is_empty() {
            continue;
        }
        let content = truncate_content(&sections.concat(), SUMMARY_TRUNCATE_CHARS);
        let summary = summarize_document(provider, name, &content).await?;
        debug!(document = %name, "Summary generated");
        summaries.push((name.clone(), summary));
    }

    if summaries.is_empty() {
        return Err(AnalysisError::DocumentNotFound(names.join(", ")));
    }

    // Stage 2: analysis plan
    let summaries_text: Vec<String> = summaries
        .iter()
        .map(|(name, summary)| format!("Document: {name}\nSummary: {summary}"))
        .collect();

    let mut plan_context = Context::with_system(
        "You are an analysis planning expert. You need to create a plan for analyzing \
         multiple documents to answer a user's question. Based on the document summaries \
         provided, determine which documents are most relevant to the question and how they \
         should be analyzed together.",
    );
    plan_context.add_message(
        Role::User,
        format!(
            "Question: {question}\n\nAvailable documents:\n{}\n\n\
             Create a plan for how to analyze these documents to answer the question. \
             Identify which documents are most relevant and what specific information to \
             look for.",
            summaries_text.join("\n\n")
        ),
    );
    let plan = provider
        .generate(&plan_context)
        .await
        .map_err(|e| stage_error("plan", e))?;
    debug!("Analysis plan generated");

    // Stage 3: final synthesis over the plan plus full document text
    let mut full_documents = Vec::new();
    for name in names {
        let sections = store.complete_document(name).await;
        if !sections.is_empty() {
            full_documents.push(format!("Document: {name}\n\n{}", sections.concat()));
        }
    }

    let mut analysis_context = Context::with_system(format!(
        "You are a document analysis expert. You have been given the following documents:\n\
         {}.\n\nYou also have a plan for analyzing these documents to answer a specific \
         question. Follow this plan and provide a comprehensive analysis.",
        names.join(", ")
    ));
    analysis_context.add_message(
        Role::User,
        format!(
            "Question: {question}\n\nAnalysis Plan:\n{plan}\n\nDocuments:\n\n{}",
            full_documents.join(&format!("\n\n{}\n\n", "=".repeat(60)))
        ),
    );
    let analysis = provider
        .generate(&analysis_context)
        .await
        .map_err(|e| stage_error("synthesize", e))?;

    Ok(format!(
        "# Multi-Document Analysis\n\n## Question\n{question}\n\n## Analysis\n{analysis}"
    ))
}

/// Hierarchical analysis of one document: summarize (section-wise for large
/// documents), retrieve question-relevant chunks, then answer over both.
pub async fn analyze_hierarchical(
    provider: &dyn Provider,
    store: &DocumentStore,
    index: &dyn VectorIndex,
    embedder: &dyn Embedder,
    document_name: &str,
    question: &str,
    top_k: usize,
) -> Result<String, AnalysisError> {
    info!(document = document_name, "Starting hierarchical analysis");

    let sections = store.complete_document(document_name).await;
    if sections.is_empty() {
        return Err(AnalysisError::DocumentNotFound(document_name.to_string()));
    }
    let all_content = sections.concat();

    // Stage 1: summary — section-wise when the document is large
    let combined_summary = if all_content.chars().count() > SECTION_SUMMARY_THRESHOLD {
        let parts = char_sections(&all_content, SECTION_CHARS);
        let total = parts.len();
        let mut section_summaries = Vec::with_capacity(total);
        for (i, part) in parts.iter().enumerate() {
            let mut context = Context::with_system("Summarize this document section concisely.");
            context.add_message(
                Role::User,
                format!("Document section {}/{total}:\n\n{part}", i + 1),
            );
            let summary = provider
                .generate(&context)
                .await
                .map_err(|e| stage_error("section summary", e))?;
            section_summaries.push(summary);
        }
        section_summaries.join("\n\n")
    } else {
        let mut context =
            Context::with_system("Create a comprehensive summary of this document.");
        context.add_message(
            Role::User,
            format!("Document: {document_name}\n\n{all_content}"),
        );
        provider
            .generate(&context)
            .await
            .map_err(|e| stage_error("summary", e))?
    };

    // Stage 2: question-driven retrieval, query enhanced best-effort
    let enhanced_query = match rewrite_query(provider, question, RewriteMode::Expansion).await {
        Ok(rewritten) => rewritten,
        Err(_) => question.to_string(),
    };
    let relevant = retrieve_relevant(store, index, embedder, &enhanced_query, top_k).await;

    // Stage 3: combined analysis
    let mut analysis_context = Context::with_system(format!(
        "You are analyzing document: {document_name}. You have a comprehensive summary of \
         the document AND specific relevant sections. Use both to provide a complete and \
         accurate analysis."
    ));
    analysis_context.add_message(
        Role::User,
        format!(
            "Question: {question}\n\nDocument Summary:\n{combined_summary}\n\n\
             Relevant Sections:\n{}\n\nPlease provide a comprehensive analysis that answers \
             the question.",
            relevant.concat()
        ),
    );
    let analysis = provider
        .generate(&analysis_context)
        .await
        .map_err(|e| stage_error("synthesize", e))?;

    Ok(format!(
        "# Deep Document Analysis: {document_name}\n\n## Question\n{question}\n\n\
         ## Analysis\n{analysis}"
    ))
}

/// Analyze multiple documents with generated code.
///
/// All named documents are concatenated into one scratch file with
/// `## DOCUMENT N:` section markers, and the bounded code loop runs over
/// that single fixed path.
pub async fn analyze_documents_with_code(
    provider: &dyn Provider,
    sandbox: &dyn CodeSandbox,
    store: &DocumentStore,
    names: &[String],
    question: &str,
    max_attempts: usize,
) -> Result<AnalysisReport, AnalysisError> {
    info!(documents = names.len(), "Starting code-backed multi-document analysis");

    let scratch = tempfile::tempdir().map_err(|e| AnalysisError::Sandbox(e.to_string()))?;
    let combined_path = scratch.path().join("combined_documents.txt");

    let mut found = 0usize;
    {
        let mut file = std::fs::File::create(&combined_path)
            .map_err(|e| AnalysisError::Sandbox(e.to_string()))?;

        writeln!(file, "# Combined Document Analysis")
            .and_then(|_| writeln!(file, "# Number of documents: {}", names.len()))
            .and_then(|_| writeln!(file, "# Analysis question: {question}"))
            .and_then(|_| writeln!(file, "# Document list: {}\n", names.join(", ")))
            .map_err(|e| AnalysisError::Sandbox(e.to_string()))?;

        for (i, name) in names.iter().enumerate() {
            let sections = store.complete_document(name).await;
            if sections.is_empty() {
                continue;
            }
            found += 1;
            writeln!(file, "## DOCUMENT {}: {name}", i + 1)
                .and_then(|_| writeln!(file, "{}\n", "=".repeat(80)))
                .and_then(|_| writeln!(file, "{}", sections.concat()))
                .and_then(|_| writeln!(file, "\n{}\n", "=".repeat(80)))
                .map_err(|e| AnalysisError::Sandbox(e.to_string()))?;
        }
    }

    if found == 0 {
        return Err(AnalysisError::DocumentNotFound(names.join(", ")));
    }

    let combined_question = format!(
        "Analyze these {} documents to answer: {question}\n\n\
         The combined file contains all documents with clear headers and separators.\n\
         Each document is marked with '## DOCUMENT X: [filename]' and separated by '===='.\n\n\
         Your analysis should consider all documents together to answer the question.",
        names.len()
    );

    let path = combined_path.to_string_lossy().into_owned();
    let report = CodeAnalysis::new(provider, sandbox)
        .with_max_attempts(max_attempts)
        .run(&path, &combined_question)
        .await;

    Ok(report)
}
