//! Splits document text into overlapping chunks at paragraph and sentence
//! boundaries, so each chunk stays close to the configured size without
//! cutting mid-sentence when it can be avoided.

use regex::Regex;
use std::sync::OnceLock;

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct TextChunk {
    pub text: String,
    pub chunk_index: usize,
    pub total_chunks: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct ChunkerConfig {
    pub chunk_size: usize,
    pub overlap: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            chunk_size: 2000,
            overlap: 200,
        }
    }
}

impl From<&crate::config::ChunkingConfig> for ChunkerConfig {
    fn from(cfg: &crate::config::ChunkingConfig) -> Self {
        Self {
            chunk_size: cfg.chunk_size,
            overlap: cfg.chunk_overlap,
        }
    }
}

fn paragraph_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\n\s*\n").unwrap())
}

fn sentence_split_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?<=[.!?])\s+").unwrap())
}

fn sentence_break_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[.!?]\s+").unwrap())
}

/// Split `text` into overlapping chunks. Deterministic for a given input.
pub fn chunk_text(text: &str, config: ChunkerConfig) -> Vec<TextChunk> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }

    if char_len(text) <= config.chunk_size {
        return vec![TextChunk {
            text: text.to_string(),
            chunk_index: 0,
            total_chunks: 1,
        }];
    }

    let paragraphs: Vec<&str> = paragraph_re().split(text).collect();
    let mut chunks: Vec<String> = Vec::new();
    let mut current = String::new();

    for para in paragraphs {
        let para = para.trim();
        if para.is_empty() {
            continue;
        }

        if char_len(&current) + char_len(para) + 2 > config.chunk_size {
            if !current.is_empty() {
                chunks.push(current.trim().to_string());
                let overlap_text = get_overlap(&current, config.overlap);
                current = if !overlap_text.is_empty() {
                    format!("{}\n\n{}", overlap_text, para)
                } else {
                    para.to_string()
                };
            } else {
                // A single paragraph exceeds chunk_size — split by sentences.
                let mut sentence_chunks = split_long_paragraph(para, config.chunk_size, config.overlap);
                if !sentence_chunks.is_empty() {
                    let last = sentence_chunks.pop().unwrap();
                    chunks.extend(sentence_chunks);
                    current = last;
                } else {
                    current = para.to_string();
                }
            }
        } else if !current.is_empty() {
            current.push_str("\n\n");
            current.push_str(para);
        } else {
            current = para.to_string();
        }
    }

    if !current.trim().is_empty() {
        chunks.push(current.trim().to_string());
    }

    let total = chunks.len();
    chunks
        .into_iter()
        .enumerate()
        .map(|(i, text)| TextChunk {
            text,
            chunk_index: i,
            total_chunks: total,
        })
        .collect()
}

/// Take the last `overlap_chars` characters of `text`, trimmed forward to a
/// sentence boundary; falling back to a word boundary, then the raw tail.
fn get_overlap(text: &str, overlap_chars: usize) -> String {
    if char_len(text) <= overlap_chars {
        return text.to_string();
    }

    let tail = char_tail(text, overlap_chars);

    if let Some(m) = sentence_break_re().find(&tail) {
        return tail[m.end()..].to_string();
    }
    if let Some(idx) = tail.find(' ') {
        return tail[idx + 1..].to_string();
    }
    tail
}

/// Split a single over-long paragraph by sentence boundaries, hard-splitting
/// any sentence that still exceeds `chunk_size` on its own.
fn split_long_paragraph(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let sentences: Vec<&str> = sentence_split_re().split(text).collect();
    let mut chunks = Vec::new();
    let mut current = String::new();

    for sentence in sentences {
        if char_len(&current) + char_len(sentence) + 1 > chunk_size {
            if !current.is_empty() {
                chunks.push(current.trim().to_string());
                let overlap_text = get_overlap(&current, overlap);
                current = if !overlap_text.is_empty() {
                    format!("{} {}", overlap_text, sentence)
                } else {
                    sentence.to_string()
                };
            } else {
                // A single sentence exceeds chunk_size — hard split.
                let step = chunk_size.saturating_sub(overlap).max(1);
                for piece in hard_split(sentence, step) {
                    chunks.push(piece);
                }
                current = String::new();
            }
        } else if !current.is_empty() {
            current.push(' ');
            current.push_str(sentence);
        } else {
            current = sentence.to_string();
        }
    }

    if !current.trim().is_empty() {
        chunks.push(current.trim().to_string());
    }

    chunks
}

/// Hard-split `text` every `step` characters, respecting UTF-8 char
/// boundaries (the original byte-oriented slicing is not safe in Rust).
fn hard_split(text: &str, step: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(step)
        .map(|c| c.iter().collect::<String>())
        .collect()
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Last `n` characters of `s`, counting by Unicode scalar value.
fn char_tail(s: &str, n: usize) -> String {
    let total = char_len(s);
    if n >= total {
        return s.to_string();
    }
    s.chars().skip(total - n).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_one_chunk() {
        let chunks = chunk_text("hello world", ChunkerConfig::default());
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].chunk_index, 0);
        assert_eq!(chunks[0].total_chunks, 1);
    }

    #[test]
    fn empty_text_is_no_chunks() {
        assert!(chunk_text("   ", ChunkerConfig::default()).is_empty());
        assert!(chunk_text("", ChunkerConfig::default()).is_empty());
    }

    #[test]
    fn long_unbroken_text_hard_splits_into_three() {
        let text = "a".repeat(5000);
        let chunks = chunk_text(&text, ChunkerConfig::default());
        assert_eq!(chunks.len(), 3);
        for c in &chunks {
            assert_eq!(c.total_chunks, 3);
        }
        // Chunk size 2000 overlap 200 -> hard-split step is 1800.
        assert_eq!(chunks[0].text.chars().count(), 1800);
        assert_eq!(chunks[1].text.chars().count(), 1800);
    }

    #[test]
    fn chunks_cover_all_text() {
        let paragraphs: Vec<String> = (0..50)
            .map(|i| format!("Paragraph number {i}. It has a sentence or two. And a third one."))
            .collect();
        let text = paragraphs.join("\n\n");
        let chunks = chunk_text(&text, ChunkerConfig::default());
        assert!(chunks.len() > 1);
        let total_len: usize = chunks.iter().map(|c| c.text.chars().count()).sum();
        assert!(total_len >= text.trim().chars().count());
        for c in &chunks {
            assert!(c.text.chars().count() <= 2000 + 200);
        }
    }

    #[test]
    fn total_chunks_is_consistent_across_all_chunks() {
        let text = "a".repeat(5000);
        let chunks = chunk_text(&text, ChunkerConfig::default());
        let totals: Vec<usize> = chunks.iter().map(|c| c.total_chunks).collect();
        assert!(totals.iter().all(|&t| t == chunks.len()));
    }
}
