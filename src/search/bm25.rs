//! In-memory lexical scoring over a provided chunk list. Pure function; no
//! persistent state.

use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

const K1: f32 = 1.5;
const B: f32 = 0.75;

fn token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[a-zA-Z0-9]+").unwrap())
}

fn stopwords() -> &'static HashSet<&'static str> {
    static WORDS: OnceLock<HashSet<&'static str>> = OnceLock::new();
    WORDS.get_or_init(|| {
        [
            "a", "an", "the", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with",
            "by", "from", "as", "is", "was", "are", "were", "be", "been", "being", "have", "has",
            "had", "do", "does", "did", "will", "would", "shall", "should", "may", "might",
            "must", "can", "could", "not", "no", "nor", "so", "if", "then", "than", "too",
            "very", "just", "about", "above", "after", "again", "all", "also", "am", "any",
            "because", "before", "between", "both", "each", "few", "here", "how", "into", "it",
            "its", "me", "more", "most", "my", "new", "now", "only", "other", "our", "out",
            "own", "re", "same", "she", "he", "some", "such", "that", "their", "them", "there",
            "these", "they", "this", "those", "through", "under", "until", "up", "we", "what",
            "when", "where", "which", "while", "who", "whom", "why", "you", "your",
        ]
        .into_iter()
        .collect()
    })
}

/// Lowercase, split on runs of `[a-zA-Z0-9]+`, drop single-character tokens
/// and stop-words.
pub fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    token_re()
        .find_iter(&lowered)
        .map(|m| m.as_str().to_string())
        .filter(|t| t.len() > 1 && !stopwords().contains(t.as_str()))
        .collect()
}

/// Score each document in `documents` against `query`; return `(index,
/// score)` pairs with `score > 0`, sorted descending by score with a stable
/// tie-break by input order, truncated to `top_n`.
pub fn bm25_search(query: &str, documents: &[&str], top_n: usize) -> Vec<(usize, f32)> {
    if documents.is_empty() || query.is_empty() {
        return Vec::new();
    }

    let query_tokens = tokenize(query);
    if query_tokens.is_empty() {
        return Vec::new();
    }

    let doc_tokens: Vec<Vec<String>> = documents.iter().map(|d| tokenize(d)).collect();
    let doc_lengths: Vec<usize> = doc_tokens.iter().map(|t| t.len()).collect();
    let n_docs = documents.len();
    let avg_dl = if n_docs > 0 {
        doc_lengths.iter().sum::<usize>() as f32 / n_docs as f32
    } else {
        1.0
    };

    let unique_query_terms: HashSet<&str> = query_tokens.iter().map(|s| s.as_str()).collect();
    let mut df: std::collections::HashMap<&str, usize> = std::collections::HashMap::new();
    for tokens in &doc_tokens {
        let unique: HashSet<&str> = tokens.iter().map(|s| s.as_str()).collect();
        for term in &unique_query_terms {
            if unique.contains(term) {
                *df.entry(term).or_insert(0) += 1;
            }
        }
    }

    let n = n_docs as f32;
    let mut scores: Vec<f32> = Vec::with_capacity(n_docs);

    for tokens in &doc_tokens {
        if tokens.is_empty() {
            scores.push(0.0);
            continue;
        }

        let mut tf: std::collections::HashMap<&str, usize> = std::collections::HashMap::new();
        for t in tokens {
            *tf.entry(t.as_str()).or_insert(0) += 1;
        }

        let dl = tokens.len() as f32;
        let mut score = 0.0f32;

        for term in &query_tokens {
            let Some(&term_freq) = tf.get(term.as_str()) else {
                continue;
            };
            let n_t = *df.get(term.as_str()).unwrap_or(&0) as f32;
            let idf = ((n - n_t + 0.5) / (n_t + 0.5) + 1.0).ln();
            let term_freq = term_freq as f32;
            let tf_norm = (term_freq * (K1 + 1.0)) / (term_freq + K1 * (1.0 - B + B * dl / avg_dl));
            score += idf * tf_norm;
        }

        scores.push(score);
    }

    let mut indexed_scores: Vec<(usize, f32)> = scores
        .into_iter()
        .enumerate()
        .filter(|(_, s)| *s > 0.0)
        .collect();
    indexed_scores.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    indexed_scores.truncate(top_n);
    indexed_scores
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_query_or_corpus_is_empty() {
        assert!(bm25_search("", &["hello"], 10).is_empty());
        assert!(bm25_search("hello", &[], 10).is_empty());
    }

    #[test]
    fn scores_are_nonnegative_and_matches_ranking() {
        let docs = [
            "vector database engines",
            "hello world",
            "database database database",
        ];
        let results = bm25_search("database", &docs, 5);
        let indices: Vec<usize> = results.iter().map(|(i, _)| *i).collect();
        assert_eq!(indices, vec![2, 0]);
        for (_, score) in &results {
            assert!(*score >= 0.0);
        }
    }

    #[test]
    fn document_with_zero_query_tokens_scores_zero() {
        let docs = ["completely unrelated content here"];
        let results = bm25_search("database", &docs, 5);
        assert!(results.is_empty());
    }

    #[test]
    fn tokenizer_drops_stopwords_and_short_tokens() {
        let tokens = tokenize("The a cat is on the mat");
        assert_eq!(tokens, vec!["cat", "mat"]);
    }
}
