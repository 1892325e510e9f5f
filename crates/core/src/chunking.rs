use crate::error::IngestError;
use crate::extractor::PageText;
use crate::models::{Chunk, IngestionOptions, SourceOffset};
use regex::Regex;
use sha2::{Digest, Sha256};
use std::collections::VecDeque;

const SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

/// Splits text on the coarsest separator present, recursing into pieces
/// that are still too long, then merges neighbours back up to `chunk_size`
/// characters with `chunk_overlap` characters carried between chunks.
#[derive(Debug, Clone)]
pub struct RecursiveSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl RecursiveSplitter {
    pub fn new(options: &IngestionOptions) -> Result<Self, IngestError> {
        if options.chunk_size == 0 {
            return Err(IngestError::InvalidChunkConfig(
                "chunk size must be positive".to_string(),
            ));
        }
        if options.chunk_overlap >= options.chunk_size {
            return Err(IngestError::InvalidChunkConfig(format!(
                "overlap {} must be smaller than chunk size {}",
                options.chunk_overlap, options.chunk_size
            )));
        }

        Ok(Self {
            chunk_size: options.chunk_size,
            chunk_overlap: options.chunk_overlap,
        })
    }

    pub fn split(&self, text: &str) -> Vec<String> {
        self.split_with(text, &SEPARATORS)
    }

    fn split_with(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let position = separators
            .iter()
            .position(|separator| separator.is_empty() || text.contains(separator))
            .unwrap_or(separators.len().saturating_sub(1));
        let separator = separators.get(position).copied().unwrap_or("");
        let remaining = &separators[(position + 1).min(separators.len())..];

        let pieces: Vec<String> = if separator.is_empty() {
            text.chars().map(String::from).collect()
        } else {
            text.split(separator)
                .filter(|piece| !piece.is_empty())
                .map(str::to_string)
                .collect()
        };

        let mut chunks = Vec::new();
        let mut pending = Vec::new();
        for piece in pieces {
            if char_len(&piece) < self.chunk_size {
                pending.push(piece);
                continue;
            }

            if !pending.is_empty() {
                chunks.extend(self.merge(&pending, separator));
                pending.clear();
            }

            if remaining.is_empty() {
                chunks.push(piece);
            } else {
                chunks.extend(self.split_with(&piece, remaining));
            }
        }

        if !pending.is_empty() {
            chunks.extend(self.merge(&pending, separator));
        }

        chunks
    }

    fn merge(&self, pieces: &[String], separator: &str) -> Vec<String> {
        let separator_len = char_len(separator);
        let mut merged = Vec::new();
        let mut window: VecDeque<&str> = VecDeque::new();
        let mut total = 0usize;

        for piece in pieces {
            let len = char_len(piece);
            let joiner = if window.is_empty() { 0 } else { separator_len };

            if total + joiner + len > self.chunk_size && !window.is_empty() {
                push_joined(&mut merged, &window, separator);

                while total > self.chunk_overlap
                    || (total > 0
                        && total + len + if window.is_empty() { 0 } else { separator_len }
                            > self.chunk_size)
                {
                    let Some(front) = window.pop_front() else {
                        break;
                    };
                    let joiner = if window.is_empty() { 0 } else { separator_len };
                    total = total.saturating_sub(char_len(front) + joiner);
                }
            }

            total += len + if window.is_empty() { 0 } else { separator_len };
            window.push_back(piece);
        }

        push_joined(&mut merged, &window, separator);
        merged
    }
}

fn push_joined(target: &mut Vec<String>, window: &VecDeque<&str>, separator: &str) {
    let joined = window.iter().copied().collect::<Vec<_>>().join(separator);
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        target.push(trimmed.to_string());
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Collapses runs of horizontal whitespace and excess blank lines while
/// keeping paragraph breaks for the splitter.
pub fn normalize_whitespace(text: &str) -> String {
    let horizontal = Regex::new(r"[ \t\u{a0}]+").map(|re| re.replace_all(text, " ").into_owned());
    let text = horizontal.unwrap_or_else(|_| text.to_string());

    let lines = text
        .lines()
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n");

    match Regex::new(r"\n{3,}") {
        Ok(re) => re.replace_all(lines.trim(), "\n\n").into_owned(),
        Err(_) => lines.trim().to_string(),
    }
}

pub fn build_chunks(
    pages: &[PageText],
    options: &IngestionOptions,
) -> Result<Vec<Chunk>, IngestError> {
    let splitter = RecursiveSplitter::new(options)?;
    let mut chunks = Vec::new();
    let mut cursor = 0u64;

    for page in pages {
        let normalized = normalize_whitespace(&page.text);
        for text in splitter.split(&normalized) {
            chunks.push(Chunk {
                chunk_id: make_chunk_id(page.number, cursor, &text),
                text,
                source_offset: SourceOffset {
                    page: page.number,
                    chunk_index: cursor,
                },
            });
            cursor = cursor.saturating_add(1);
        }
    }

    Ok(chunks)
}

fn make_chunk_id(page: u32, index: u64, text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(page.to_le_bytes());
    hasher.update(index.to_le_bytes());
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}
