use serde::{Deserialize, Serialize};

use crate::config::ChunkingConfig;

/// A contiguous slice of a source document, sized for embedding.
///
/// Adjacent chunks from the same pass share `chunk_overlap` characters:
/// each non-initial chunk starts with the tail of its predecessor.
/// `start_offset` is the character offset of the chunk within the
/// extracted document text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub content: String,
    pub source: String,
    pub chunk_index: usize,
    pub start_offset: usize,
}

/// Recursive separator splitter with greedy packing.
///
/// Splitting tries each separator in priority order and only descends to
/// the next one for pieces that are still too large; when no separator
/// helps, pieces are cut at fixed character counts. Fragments are then
/// packed back into chunks no larger than `chunk_size`, seeding each
/// chunk after the first with the final `chunk_overlap` characters of
/// the previous one. All sizes are in characters, never bytes.
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl TextSplitter {
    pub fn new(config: &ChunkingConfig) -> Self {
        Self {
            chunk_size: config.chunk_size,
            // Loaded configs reject overlap >= size; clamp here as well so
            // a hand-built config cannot stall or overrun the packer.
            chunk_overlap: config.chunk_overlap.min(config.chunk_size.saturating_sub(1)),
            separators: config.separators.clone(),
        }
    }

    /// Fragments must leave room for the overlap seed, otherwise a seeded
    /// chunk could exceed `chunk_size`. Clamped to at least one character
    /// so an overlap as large as the chunk size still makes progress.
    fn fragment_budget(&self) -> usize {
        self.chunk_size.saturating_sub(self.chunk_overlap).max(1)
    }

    pub fn split(&self, text: &str, source: &str) -> Vec<Chunk> {
        if text.is_empty() {
            return Vec::new();
        }
        let fragments = self.fragments(text, &self.separators);
        self.pack(fragments, source)
    }

    fn fragments(&self, text: &str, separators: &[String]) -> Vec<String> {
        if char_len(text) <= self.fragment_budget() {
            return vec![text.to_string()];
        }
        let Some((separator, rest)) = separators.split_first() else {
            return hard_split(text, self.fragment_budget());
        };
        if !text.contains(separator.as_str()) {
            return self.fragments(text, rest);
        }

        let mut out = Vec::new();
        for piece in split_keeping_separator(text, separator) {
            if char_len(&piece) <= self.fragment_budget() {
                out.push(piece);
            } else {
                out.extend(self.fragments(&piece, rest));
            }
        }
        out
    }

    fn pack(&self, fragments: Vec<String>, source: &str) -> Vec<Chunk> {
        let mut chunks = Vec::new();
        let mut current = String::new();
        let mut current_len = 0;
        let mut current_start = 0;
        // Character offset of the next fragment within the document.
        let mut cursor = 0;

        for fragment in fragments {
            let fragment_len = char_len(&fragment);
            if current_len > 0 && current_len + fragment_len > self.chunk_size {
                let seed = tail_chars(&current, self.chunk_overlap);
                let seed_len = char_len(&seed);
                chunks.push(Chunk {
                    content: std::mem::take(&mut current),
                    source: source.to_string(),
                    chunk_index: chunks.len(),
                    start_offset: current_start,
                });
                current = seed;
                current_len = seed_len;
                current_start = cursor - seed_len;
            }
            current.push_str(&fragment);
            current_len += fragment_len;
            cursor += fragment_len;
        }

        if current_len > 0 {
            chunks.push(Chunk {
                content: current,
                source: source.to_string(),
                chunk_index: chunks.len(),
                start_offset: current_start,
            });
        }

        chunks
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Last `count` characters of `text`, or all of it when shorter.
fn tail_chars(text: &str, count: usize) -> String {
    let len = char_len(text);
    text.chars().skip(len.saturating_sub(count)).collect()
}

fn hard_split(text: &str, size: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(size)
        .map(|window| window.iter().collect())
        .collect()
}

/// Split on `separator`, attaching the separator to the piece that
/// follows it so that concatenating the pieces reproduces the input.
fn split_keeping_separator(text: &str, separator: &str) -> Vec<String> {
    let mut parts = text.split(separator);
    let mut out = Vec::new();
    if let Some(first) = parts.next() {
        if !first.is_empty() {
            out.push(first.to_string());
        }
    }
    for part in parts {
        out.push(format!("{separator}{part}"));
    }
    out
}
