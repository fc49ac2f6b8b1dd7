//! Query-time retrieval: search the index, format hits for the prompt.

use crate::document::Document;
use crate::embed::Embedder;
use crate::index::{SearchHit, VectorIndex};
use crate::store::DocumentStore;
use tracing::{debug, warn};

/// Render a stored chunk with its provenance header.
pub fn format_document(doc: &Document) -> String {
    let mut out = format!("Document: {}\n", doc.metadata.filename);
    if let Some(page) = doc.metadata.page {
        out.push_str(&format!("Page: {page}\n"));
    }
    if let (Some(chunk), Some(chunk_of)) = (doc.metadata.chunk, doc.metadata.chunk_of) {
        out.push_str(&format!("Chunk: {chunk}/{chunk_of}\n"));
    }
    out.push_str(&doc.content);
    out.push_str("\n\n");
    out
}

/// Render a search hit the same way, pulling provenance from its metadata.
pub fn format_hit(hit: &SearchHit) -> String {
    let filename = hit.metadata["filename"].as_str().unwrap_or("unknown");
    let mut out = format!("Document: {filename}\n");
    if let Some(page) = hit.metadata["page"].as_u64() {
        out.push_str(&format!("Page: {page}\n"));
    }
    if let (Some(chunk), Some(chunk_of)) =
        (hit.metadata["chunk"].as_u64(), hit.metadata["chunk_of"].as_u64())
    {
        out.push_str(&format!("Chunk: {chunk}/{chunk_of}\n"));
    }
    out.push_str(&hit.text);
    out.push_str("\n\n");
    out
}

/// Retrieve documents relevant to a query via the vector index.
///
/// Returns `[]` without invoking the index when the store holds nothing —
/// an empty corpus has nothing to rank. Search failures also degrade to an
/// empty result (logged): retrieval never fails a turn.
pub async fn retrieve_relevant(
    store: &DocumentStore,
    index: &dyn VectorIndex,
    embedder: &dyn Embedder,
    query: &str,
    top_k: usize,
) -> Vec<String> {
    if store.is_empty().await {
        return Vec::new();
    }

    match index.search(query, embedder, top_k).await {
        Ok(hits) => {
            debug!(hits = hits.len(), top_k, "Retrieved relevant chunks");
            hits.iter().map(format_hit).collect()
        }
        Err(e) => {
            warn!(error = %e, "Document retrieval failed, continuing without evidence");
            Vec::new()
        }
    }
}
