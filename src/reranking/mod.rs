//! Cross-encoder rescoring of candidate chunks. The model is instantiated
//! at most once per process, lazily, behind a one-shot cell; any failure
//! (missing model files, inference error) falls back to the unreranked
//! order with a logged warning rather than failing the search request.

pub mod cross_encoder;

pub use cross_encoder::CrossEncoderReranker;

use crate::search::ResultRow;
use std::path::Path;
use std::sync::OnceLock;

static RERANKER: OnceLock<Option<CrossEncoderReranker>> = OnceLock::new();

/// Lazily load the cross-encoder at most once per process. Caches the
/// failure too, so a missing model doesn't retry a load on every search.
fn reranker(model_dir: &Path) -> Option<&'static CrossEncoderReranker> {
    RERANKER
        .get_or_init(|| match CrossEncoderReranker::new(model_dir) {
            Ok(r) => Some(r),
            Err(e) => {
                tracing::warn!(error = %e, "failed to load cross-encoder reranker");
                None
            }
        })
        .as_ref()
}

/// Rerank `results` against `query`, keeping the top `top_n`. Empty input
/// stays empty. Any failure to load or run the model degrades to the first
/// `top_n` of the input, unchanged, with a warning logged — reranking never
/// fails a search outright.
pub fn rerank(model_dir: &Path, query: &str, results: Vec<ResultRow>, top_n: usize) -> Vec<ResultRow> {
    if results.is_empty() {
        return Vec::new();
    }

    let Some(model) = reranker(model_dir) else {
        let mut out = results;
        out.truncate(top_n);
        return out;
    };

    let candidates: Vec<(String, String)> = results
        .iter()
        .enumerate()
        .map(|(i, r)| (i.to_string(), r.text.clone()))
        .collect();

    match model.rerank_batch(query, &candidates, candidates.len()) {
        Ok(scored) => {
            let scores: std::collections::HashMap<String, f32> = scored.into_iter().collect();
            let mut out: Vec<ResultRow> = results
                .into_iter()
                .enumerate()
                .map(|(i, mut r)| {
                    r.rerank_score = scores.get(&i.to_string()).copied();
                    r
                })
                .collect();
            out.sort_by(|a, b| {
                b.rerank_score
                    .partial_cmp(&a.rerank_score)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            out.truncate(top_n);
            out
        }
        Err(e) => {
            tracing::warn!(error = %e, "reranker inference failed, returning unreranked order");
            let mut out = results;
            out.truncate(top_n);
            out
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(file_path: &str, text: &str) -> ResultRow {
        ResultRow {
            file_path: file_path.to_string(),
            chunk_index: 0,
            total_chunks: 1,
            text: text.to_string(),
            distance: 0.1,
            rrf_score: 0.0,
            rerank_score: None,
        }
    }

    #[test]
    fn empty_input_is_empty_output() {
        let model_dir = Path::new("/nonexistent/model/dir");
        assert!(rerank(model_dir, "q", Vec::new(), 5).is_empty());
    }

    #[test]
    fn missing_model_fails_open_to_truncated_input() {
        let model_dir = Path::new("/nonexistent/model/dir/for/reranker/test");
        let input = vec![row("a.txt", "x"), row("b.txt", "y"), row("c.txt", "z")];
        let out = rerank(model_dir, "q", input, 2);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].file_path, "a.txt");
        assert_eq!(out[1].file_path, "b.txt");
    }
}
