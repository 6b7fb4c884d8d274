//! Optional LLM-driven fan-out of a query into paraphrases and entity
//! hints, via a local Ollama endpoint. Never fatal: any network, timeout,
//! or parse failure degrades to the original query.

use serde::{Deserialize, Serialize};
use std::time::Duration;

const OLLAMA_URL: &str = "http://localhost:11434/api/generate";
const TIMEOUT: Duration = Duration::from_secs(15);
const DEFAULT_MODEL: &str = "llama3.2";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryHints {
    #[serde(default)]
    pub people: Vec<String>,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub file_types: Vec<String>,
    #[serde(default)]
    pub projects: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ExpandedQuery {
    pub queries: Vec<String>,
    pub hints: QueryHints,
    pub used_llm: bool,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: String,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Deserialize)]
struct LlmPayload {
    #[serde(default)]
    queries: Vec<String>,
    #[serde(default)]
    hints: QueryHints,
}

fn fallback(query: &str) -> ExpandedQuery {
    ExpandedQuery {
        queries: vec![query.to_string()],
        hints: QueryHints::default(),
        used_llm: false,
    }
}

fn prompt_for(query: &str) -> String {
    format!(
        "Given the search query \"{query}\", generate 2-3 alternative phrasings \
         that capture the same intent, and extract any people, topics, file \
         types, or project names mentioned. Respond with JSON only in the form \
         {{\"queries\": [...], \"hints\": {{\"people\": [...], \"topics\": [...], \
         \"file_types\": [...], \"projects\": [...]}}}}."
    )
}

/// Extract a JSON object from `text`: try a direct parse first, then fall
/// back to the substring between the first `{` and the last `}`.
fn extract_json(text: &str) -> Option<LlmPayload> {
    if let Ok(payload) = serde_json::from_str::<LlmPayload>(text) {
        return Some(payload);
    }
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    serde_json::from_str(&text[start..=end]).ok()
}

pub async fn expand_query(query: &str) -> ExpandedQuery {
    let client = match reqwest::Client::builder().timeout(TIMEOUT).build() {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!(error = %e, "failed to build query-expansion http client");
            return fallback(query);
        }
    };

    let request = GenerateRequest {
        model: DEFAULT_MODEL,
        prompt: prompt_for(query),
        stream: false,
        options: GenerateOptions {
            temperature: 0.3,
            num_predict: 256,
        },
    };

    let response = match client.post(OLLAMA_URL).json(&request).send().await {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!(error = %e, "query expansion llm unreachable, falling back");
            return fallback(query);
        }
    };

    let body: GenerateResponse = match response.json().await {
        Ok(b) => b,
        Err(e) => {
            tracing::warn!(error = %e, "query expansion response was not valid json envelope");
            return fallback(query);
        }
    };

    let Some(payload) = extract_json(&body.response) else {
        tracing::warn!("query expansion llm output had no parseable json, falling back");
        return fallback(query);
    };

    let mut queries = payload.queries;
    if !queries.iter().any(|q| q == query) {
        queries.insert(0, query.to_string());
    }
    if queries.is_empty() {
        queries.push(query.to_string());
    }

    ExpandedQuery {
        queries,
        hints: payload.hints,
        used_llm: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_direct_json() {
        let payload = extract_json(r#"{"queries": ["a", "b"], "hints": {}}"#).unwrap();
        assert_eq!(payload.queries, vec!["a", "b"]);
    }

    #[test]
    fn extracts_json_embedded_in_prose() {
        let payload =
            extract_json(r#"Sure, here you go: {"queries": ["a"], "hints": {}} thanks!"#).unwrap();
        assert_eq!(payload.queries, vec!["a"]);
    }

    #[test]
    fn unparseable_text_yields_none() {
        assert!(extract_json("no json here").is_none());
    }

    #[test]
    fn fallback_always_contains_original_query() {
        let fb = fallback("hello");
        assert_eq!(fb.queries, vec!["hello"]);
        assert!(!fb.used_llm);
    }
}
