//! End-to-end query pipeline: optional expansion, per-query vector search,
//! cross-query merge, optional hybrid fusion, per-file dedup, optional
//! rerank.

use super::{deduplicate_results, hybrid_merge, merge_vector_results, query_expansion, ResultRow};
use crate::config::EngineConfig;
use crate::embeddings::EmbeddingModel;
use crate::reranking;
use crate::storage::VectorStore;
use std::path::Path;

/// Per-request overrides of the configured feature flags; `None` means
/// "use the configured default".
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct SearchOptions {
    pub expansion: Option<bool>,
    pub hybrid: Option<bool>,
    pub reranker: Option<bool>,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct SearchMeta {
    pub used_llm: bool,
    pub expanded_queries: Vec<String>,
    pub hints: query_expansion::QueryHints,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct SearchResponse {
    pub results: Vec<ResultRow>,
    pub meta: SearchMeta,
}

/// Run the full retrieval pipeline for `query` against `store`.
///
/// 1. resolve feature flags (request overrides, falling back to config)
/// 2. optionally expand the query into paraphrases via an LLM
/// 3. vector-search each expanded query, `candidates_per_query = max(50, limit*5)`
/// 4. merge the per-query vector hits, keeping the minimum distance per chunk
/// 5. optionally fuse with a BM25 pass over the full corpus (RRF, `top_n = limit*3`)
/// 6. deduplicate to one hit per file (`limit*2`)
/// 7. optionally rerank with a cross-encoder, truncating to `limit`
/// 8. otherwise just truncate to `limit`
pub async fn search(
    config: &EngineConfig,
    model_dir: &Path,
    store: &VectorStore,
    embedder: &dyn EmbeddingModel,
    query: &str,
    limit: usize,
    options: SearchOptions,
) -> anyhow::Result<SearchResponse> {
    let use_expansion = options.expansion.unwrap_or(config.features.query_expansion);
    let use_hybrid = options.hybrid.unwrap_or(config.features.hybrid_search);
    let use_reranker = options.reranker.unwrap_or(config.features.reranker);

    let expanded = if use_expansion {
        query_expansion::expand_query(query).await
    } else {
        query_expansion::ExpandedQuery {
            queries: vec![query.to_string()],
            hints: query_expansion::QueryHints::default(),
            used_llm: false,
        }
    };

    let candidates_per_query = (limit * 5).max(50);

    let mut vector_results: Vec<ResultRow> = Vec::new();
    for expanded_query in &expanded.queries {
        let query_vector = embedder.embed_query(expanded_query)?;
        let hits = store.search(&query_vector, candidates_per_query).await?;
        vector_results.extend(hits.into_iter().map(ResultRow::from));
    }

    let merged = merge_vector_results(vector_results);

    let fused = if use_hybrid {
        let all_chunks: Vec<ResultRow> = store
            .scan_all()
            .await?
            .into_iter()
            .map(ResultRow::from)
            .collect();
        hybrid_merge(query, merged, &all_chunks, limit * 3)
    } else {
        merged
    };

    let deduped = deduplicate_results(fused, limit * 2);

    let results = if use_reranker {
        reranking::rerank(model_dir, query, deduped, limit)
    } else {
        let mut out = deduped;
        out.truncate(limit);
        out
    };

    Ok(SearchResponse {
        results,
        meta: SearchMeta {
            used_llm: expanded.used_llm,
            expanded_queries: expanded.queries,
            hints: expanded.hints,
        },
    })
}
