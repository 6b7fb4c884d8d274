//! Reciprocal-rank fusion of vector and BM25 rankings, and per-file
//! deduplication of fused results down to one hit per source file.

use super::bm25::bm25_search;
use super::ResultRow;
use std::collections::HashMap;

const DEFAULT_K: f32 = 60.0;
/// Sentinel distance for rows that only appear in the BM25 ranking, which
/// has no notion of vector distance.
const UNKNOWN_DISTANCE: f32 = 2.0;

/// Merge `vector_results` with a BM25 pass over the current corpus using
/// reciprocal rank fusion.
///
/// Vector-only results keep their place (enriched with `rrf_score`);
/// BM25-only results are appended with the sentinel distance. Sorted
/// descending by `rrf_score`; truncated to `top_n`.
pub fn hybrid_merge(
    query: &str,
    vector_results: Vec<ResultRow>,
    all_chunks: &[ResultRow],
    top_n: usize,
) -> Vec<ResultRow> {
    hybrid_merge_with_k(query, vector_results, all_chunks, top_n, DEFAULT_K)
}

pub fn hybrid_merge_with_k(
    query: &str,
    vector_results: Vec<ResultRow>,
    all_chunks: &[ResultRow],
    top_n: usize,
    k: f32,
) -> Vec<ResultRow> {
    if vector_results.is_empty() {
        return Vec::new();
    }

    if all_chunks.is_empty() {
        let mut out = vector_results;
        for r in &mut out {
            r.rrf_score = 0.0;
        }
        out.truncate(top_n);
        return out;
    }

    let texts: Vec<&str> = all_chunks.iter().map(|c| c.text.as_str()).collect();
    let bm25_hits = bm25_search(query, &texts, 50);

    let mut rrf: HashMap<(String, u32), f32> = HashMap::new();
    for (i, r) in vector_results.iter().enumerate() {
        *rrf.entry(r.key()).or_insert(0.0) += 1.0 / (k + i as f32 + 1.0);
    }
    for (rank, (idx, _score)) in bm25_hits.iter().enumerate() {
        let key = all_chunks[*idx].key();
        *rrf.entry(key).or_insert(0.0) += 1.0 / (k + rank as f32 + 1.0);
    }

    let mut seen: std::collections::HashSet<(String, u32)> = std::collections::HashSet::new();
    let mut merged: Vec<ResultRow> = Vec::new();

    for mut r in vector_results {
        let key = r.key();
        r.rrf_score = *rrf.get(&key).unwrap_or(&0.0);
        seen.insert(key);
        merged.push(r);
    }

    for (idx, _score) in &bm25_hits {
        let chunk = &all_chunks[*idx];
        let key = chunk.key();
        if seen.contains(&key) {
            continue;
        }
        seen.insert(key.clone());
        merged.push(ResultRow {
            file_path: chunk.file_path.clone(),
            chunk_index: chunk.chunk_index,
            total_chunks: chunk.total_chunks,
            text: chunk.text.clone(),
            distance: UNKNOWN_DISTANCE,
            rrf_score: *rrf.get(&key).unwrap_or(&0.0),
            rerank_score: None,
        });
    }

    merged.sort_by(|a, b| b.rrf_score.partial_cmp(&a.rrf_score).unwrap_or(std::cmp::Ordering::Equal));
    merged.truncate(top_n);
    merged
}

/// Group by `file_path`, keep the row with the smallest `_distance`; ties
/// broken by first occurrence. Output sorted ascending by `_distance`,
/// truncated to `limit`.
pub fn deduplicate_results(results: Vec<ResultRow>, limit: usize) -> Vec<ResultRow> {
    let mut best: HashMap<String, ResultRow> = HashMap::new();
    let mut order: Vec<String> = Vec::new();

    for row in results {
        match best.get(&row.file_path) {
            Some(existing) if existing.distance <= row.distance => {}
            Some(_) => {
                best.insert(row.file_path.clone(), row);
            }
            None => {
                order.push(row.file_path.clone());
                best.insert(row.file_path.clone(), row);
            }
        }
    }

    let mut out: Vec<ResultRow> = order.into_iter().filter_map(|p| best.remove(&p)).collect();
    out.sort_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap_or(std::cmp::Ordering::Equal));
    out.truncate(limit);
    out
}

/// Merge vector-search results gathered across multiple expanded queries:
/// group by `(file_path, chunk_index)`, keep the minimum distance. Sorted
/// ascending by distance.
pub fn merge_vector_results(results: Vec<ResultRow>) -> Vec<ResultRow> {
    let mut best: HashMap<(String, u32), ResultRow> = HashMap::new();
    let mut order: Vec<(String, u32)> = Vec::new();

    for row in results {
        let key = row.key();
        match best.get(&key) {
            Some(existing) if existing.distance <= row.distance => {}
            Some(_) => {
                best.insert(key, row);
            }
            None => {
                order.push(key.clone());
                best.insert(key, row);
            }
        }
    }

    let mut out: Vec<ResultRow> = order.into_iter().filter_map(|k| best.remove(&k)).collect();
    out.sort_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap_or(std::cmp::Ordering::Equal));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(file_path: &str, chunk_index: u32, text: &str, distance: f32) -> ResultRow {
        ResultRow {
            file_path: file_path.to_string(),
            chunk_index,
            total_chunks: 1,
            text: text.to_string(),
            distance,
            rrf_score: 0.0,
            rerank_score: None,
        }
    }

    #[test]
    fn empty_vector_results_is_empty() {
        assert!(hybrid_merge("q", Vec::new(), &[], 10).is_empty());
    }

    #[test]
    fn every_vector_key_appears_in_output() {
        let vector_results = vec![
            row("a.txt", 0, "database engines", 0.1),
            row("b.txt", 0, "hello world", 0.2),
        ];
        let all_chunks = vector_results.clone();
        let merged = hybrid_merge("database", vector_results.clone(), &all_chunks, 10);
        for r in &vector_results {
            assert!(merged.iter().any(|m| m.key() == r.key()));
        }
    }

    #[test]
    fn rrf_order_is_monotone_nonincreasing() {
        let vector_results = vec![
            row("a.txt", 0, "database vector", 0.1),
            row("b.txt", 0, "hello world", 0.2),
            row("c.txt", 0, "database database", 0.3),
        ];
        let all_chunks = vector_results.clone();
        let merged = hybrid_merge("database", vector_results, &all_chunks, 10);
        for w in merged.windows(2) {
            assert!(w[0].rrf_score >= w[1].rrf_score);
        }
    }

    #[test]
    fn dedup_keeps_min_distance_per_file() {
        let results = vec![
            row("a.txt", 0, "x", 0.5),
            row("a.txt", 1, "y", 0.1),
            row("b.txt", 0, "z", 0.3),
        ];
        let deduped = deduplicate_results(results, 10);
        assert_eq!(deduped.len(), 2);
        let a = deduped.iter().find(|r| r.file_path == "a.txt").unwrap();
        assert_eq!(a.chunk_index, 1);
        assert!(deduped.windows(2).all(|w| w[0].distance <= w[1].distance));
    }

    #[test]
    fn merge_across_queries_keeps_min_distance_per_key() {
        let results = vec![
            row("a.txt", 0, "x", 0.5),
            row("a.txt", 0, "x", 0.2),
            row("b.txt", 1, "y", 0.3),
        ];
        let merged = merge_vector_results(results);
        assert_eq!(merged.len(), 2);
        let a = merged.iter().find(|r| r.file_path == "a.txt").unwrap();
        assert_eq!(a.distance, 0.2);
    }
}
