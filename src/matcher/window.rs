//! Overlapping word windows over a source document.
//!
//! A document is split into whitespace-delimited words and grouped into
//! windows of `window_size` words, advancing `window_size - overlap` words
//! at a time. Every window carries the character offsets of its span in the
//! original text, so a highlighter can locate the passage without searching.
//!
//! Offsets count characters (Unicode scalar values), not bytes.

use serde::Serialize;

/// A contiguous, word-bounded span of a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Window {
    /// The span's text, trimmed only at its boundaries
    pub text: String,
    /// Character offset of the first character
    pub start: usize,
    /// Character offset one past the last character
    pub end: usize,
}

/// Location of one word in the source text.
#[derive(Debug, Clone, Copy)]
struct Word {
    byte_start: usize,
    byte_end: usize,
    char_start: usize,
    char_end: usize,
}

/// Split `text` into overlapping word windows.
///
/// - Text with no words yields no windows.
/// - Text of at most `window_size` words yields one window holding the
///   trimmed text, with offsets covering the whole document.
/// - Otherwise windows start every `window_size - overlap` words and the
///   last window ends at the final word.
///
/// `window_size` must be greater than `overlap`. The stride is clamped to
/// at least one word so bad arguments cannot loop forever.
pub fn window(text: &str, window_size: usize, overlap: usize) -> Vec<Window> {
    let words = scan_words(text);
    if words.is_empty() {
        return Vec::new();
    }

    let window_size = window_size.max(1);
    if words.len() <= window_size {
        return vec![Window {
            text: text.trim().to_string(),
            start: 0,
            end: text.chars().count(),
        }];
    }

    let step = window_size.saturating_sub(overlap).max(1);

    let mut windows = Vec::with_capacity(words.len() / step + 1);
    let mut i = 0;
    while i < words.len() {
        let first = words[i];
        let last = words[(i + window_size).min(words.len()) - 1];

        windows.push(Window {
            text: text[first.byte_start..last.byte_end].to_string(),
            start: first.char_start,
            end: last.char_end,
        });

        if i + window_size >= words.len() {
            break;
        }
        i += step;
    }

    windows
}

/// Locate every whitespace-delimited word in a single forward pass.
///
/// Positions come from the scan itself, so repeated words and mixed
/// whitespace (tabs, newlines, non-breaking spaces) always resolve to the
/// occurrence actually being read.
fn scan_words(text: &str) -> Vec<Word> {
    let mut words = Vec::new();
    let mut current: Option<(usize, usize)> = None;
    let mut char_count = 0;

    for (char_idx, (byte_idx, c)) in text.char_indices().enumerate() {
        if c.is_whitespace() {
            if let Some((byte_start, char_start)) = current.take() {
                words.push(Word {
                    byte_start,
                    byte_end: byte_idx,
                    char_start,
                    char_end: char_idx,
                });
            }
        } else if current.is_none() {
            current = Some((byte_idx, char_idx));
        }
        char_count = char_idx + 1;
    }

    if let Some((byte_start, char_start)) = current {
        words.push(Word {
            byte_start,
            byte_end: text.len(),
            char_start,
            char_end: char_count,
        });
    }

    words
}
