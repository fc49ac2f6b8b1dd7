//! Query enhancement — rewrite a query before retrieval to improve recall.
//!
//! Enhancement is strictly best-effort: callers fall back to the original,
//! unmodified query on any provider error. A failed rewrite must never
//! block retrieval.

use hearth_core::context::Context;
use hearth_core::error::ProviderError;
use hearth_core::message::Role;
use hearth_core::provider::Provider;
use tracing::debug;

/// Maximum length of a rewritten query, in characters.
const MAX_REWRITE_LEN: usize = 500;

/// How the query should be rewritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RewriteMode {
    /// Add related terms and concepts.
    #[default]
    Expansion,
    /// Clarify the likely intent of an ambiguous query.
    Disambiguation,
    /// Add synonyms and alternative phrasings.
    Synonyms,
}

impl RewriteMode {
    fn instruction(&self) -> &'static str {
        match self {
            RewriteMode::Expansion => {
                "You are a query expansion specialist. Your task is to expand user queries to \
                 improve search results by adding related terms and concepts. Maintain the \
                 original meaning but make the query more comprehensive. Return ONLY the \
                 expanded query without explanations."
            }
            RewriteMode::Disambiguation => {
                "You are a query disambiguation specialist. Your task is to identify potential \
                 ambiguities in the user's query and create a version that clarifies the likely \
                 intent. Return ONLY the disambiguated query without explanations."
            }
            RewriteMode::Synonyms => {
                "You are a query enrichment specialist. Your task is to add synonyms and \
                 alternative phrasings to the user's query to improve search results. Return \
                 ONLY the enriched query without explanations."
            }
        }
    }
}

/// Truncate to a character budget without splitting a code point.
fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((byte_index, _)) => &s[..byte_index],
        None => s,
    }
}

/// Rewrite a query through the completion service.
///
/// The raw completion is stripped of surrounding quotes and capped at 500
/// characters. Errors propagate so the caller can fall back to the
/// original query.
pub async fn rewrite_query(
    provider: &dyn Provider,
    query: &str,
    mode: RewriteMode,
) -> Result<String, ProviderError> {
    let mut context = Context::with_system(mode.instruction());
    context.add_message(
        Role::User,
        format!(
            "Original query: \"{query}\"\n\nRewrite this query to improve search results. \
             Focus on preserving the original intent while making it more comprehensive for \
             retrieval purposes."
        ),
    );

    let raw = provider.generate(&context).await?;
    let rewritten = raw.trim().trim_matches(['"', '\'']);
    let rewritten = truncate_chars(rewritten, MAX_REWRITE_LEN).to_string();

    debug!(original = query, rewritten = %rewritten, "Query rewritten");
    Ok(rewritten)
}

/// Generate a hypothetical document that would answer the query (HyDE).
///
/// The synthetic passage is embedded in place of the query, pulling the
/// search toward documents that read like an answer.
pub async fn hyde_document(
    provider: &dyn Provider,
    query: &str,
) -> Result<String, ProviderError> {
    let mut context = Context::with_system(
        "You are an expert at creating synthetic documents. Given a query, your task is to \
         create a short, factual passage that would directly answer the query. This synthetic \
         passage should mimic the style and content of a real document that would contain the \
         answer. Be concise but comprehensive.",
    );
    context.add_message(
        Role::User,
        format!(
            "Query: \"{query}\"\n\nGenerate a short passage (3-5 sentences) that directly \
             answers this query. The passage should read like an excerpt from a real document \
             or article that contains the answer to the query."
        ),
    );

    provider.generate(&context).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use hearth_providers::ScriptedProvider;

    #[tokio::test]
    async fn rewrite_strips_quotes() {
        let provider = ScriptedProvider::always("\"rust memory safety borrow checker\"");
        let rewritten = rewrite_query(&provider, "rust safety", RewriteMode::Expansion)
            .await
            .unwrap();
        assert_eq!(rewritten, "rust memory safety borrow checker");
    }

    #[tokio::test]
    async fn rewrite_truncates_long_output() {
        let long = "x".repeat(800);
        let provider = ScriptedProvider::always(&long);
        let rewritten = rewrite_query(&provider, "q", RewriteMode::Expansion)
            .await
            .unwrap();
        assert_eq!(rewritten.chars().count(), 500);
    }

    #[tokio::test]
    async fn rewrite_truncation_respects_char_boundaries() {
        let long = "é".repeat(600);
        let provider = ScriptedProvider::always(&long);
        let rewritten = rewrite_query(&provider, "q", RewriteMode::Expansion)
            .await
            .unwrap();
        assert_eq!(rewritten.chars().count(), 500);
    }

    #[tokio::test]
    async fn rewrite_error_propagates_for_caller_fallback() {
        let provider = ScriptedProvider::failing("server down");
        let result = rewrite_query(&provider, "query", RewriteMode::Synonyms).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn modes_use_distinct_instructions() {
        for mode in [
            RewriteMode::Expansion,
            RewriteMode::Disambiguation,
            RewriteMode::Synonyms,
        ] {
            let provider = ScriptedProvider::always("out");
            rewrite_query(&provider, "q", mode).await.unwrap();
            let call = &provider.recorded_calls()[0];
            let system = call.system_prompt.as_deref().unwrap();
            match mode {
                RewriteMode::Expansion => assert!(system.contains("expansion")),
                RewriteMode::Disambiguation => assert!(system.contains("disambiguation")),
                RewriteMode::Synonyms => assert!(system.contains("enrichment")),
            }
        }
    }

    #[tokio::test]
    async fn hyde_passes_query_through() {
        let provider = ScriptedProvider::always("Water boils at 100 degrees Celsius.");
        let passage = hyde_document(&provider, "boiling point of water").await.unwrap();
        assert!(passage.contains("100"));
        let call = &provider.recorded_calls()[0];
        assert!(call.messages[0].content.contains("boiling point of water"));
    }
}
