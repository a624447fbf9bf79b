//! Keyword relevance scoring for candidate prefiltering.
//!
//! Scores how strongly a piece of content is about a set of keywords on a
//! 0-5 scale. Embedding every candidate title against every window is
//! expensive, so large candidate sets are cut down to the most relevant
//! few before the ranker runs.
//!
//! Two counting modes:
//! - `exact`: case-insensitive substring occurrences of each keyword
//! - `stemmed`: occurrences of words sharing a crude suffix-stripped stem
//!
//! Words are runs of ASCII letters, digits and `_`, so accented letters
//! split a word the same way an ASCII `\b` does.

use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::matcher::Candidate;

/// Suffixes stripped by [`stems`], tried in order; the first match wins.
const SUFFIXES: &[&str] = &[
    "ing", "ed", "es", "s", "ly", "tion", "ment", "ness", "able", "ible",
];

/// Minimum stem length kept after stripping a suffix.
const MIN_STEM_LEN: usize = 3;

static WORD_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?-u:\w)+").expect("word regex is valid"));

/// How keywords are matched against content.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MatchType {
    Exact,
    #[default]
    Stemmed,
}

/// Score `content` against `keywords` on a 0-5 scale.
///
/// Returns 0 for empty content or an empty keyword list.
pub fn relevance(content: &str, keywords: &[String], match_type: MatchType) -> u8 {
    if content.is_empty() || keywords.is_empty() {
        return 0;
    }
    ContentIndex::new(content).relevance(keywords, match_type)
}

/// Map an occurrence count onto the 0-5 relevance scale.
///
/// 0 → 0, 1-2 → 1, 3-5 → 2, 6-10 → 3, 11-20 → 4, 21+ → 5
pub fn bucket(occurrences: usize) -> u8 {
    match occurrences {
        0 => 0,
        1..=2 => 1,
        3..=5 => 2,
        6..=10 => 3,
        11..=20 => 4,
        _ => 5,
    }
}

fn words(lower: &str) -> Vec<String> {
    WORD_REGEX
        .find_iter(lower)
        .map(|m| m.as_str().to_string())
        .collect()
}

fn stems_of(words: &[String]) -> HashSet<String> {
    words
        .iter()
        .filter(|w| w.len() >= 3 && w.bytes().all(|b| b.is_ascii_alphabetic()))
        .map(|w| stem(w).to_string())
        .collect()
}

/// Lowercased stems of every word made of 3+ letters in `text`.
pub fn stems(text: &str) -> HashSet<String> {
    stems_of(&words(&text.to_lowercase()))
}

fn stem(word: &str) -> &str {
    SUFFIXES
        .iter()
        .find(|suffix| word.ends_with(*suffix) && word.len() >= suffix.len() + MIN_STEM_LEN)
        .map(|suffix| &word[..word.len() - suffix.len()])
        .unwrap_or(word)
}

/// Content tokenised once, with per-stem and per-keyword counts memoised.
///
/// Scoring many candidates against one document only walks the document
/// once per distinct stem or exact keyword.
pub struct ContentIndex {
    lower: String,
    words: Vec<String>,
    stems: HashSet<String>,
    stem_counts: HashMap<String, usize>,
    exact_counts: HashMap<String, usize>,
    keyword_stems: HashMap<String, Vec<String>>,
}

impl ContentIndex {
    pub fn new(content: &str) -> Self {
        let lower = content.to_lowercase();
        let words = words(&lower);
        let stems = stems_of(&words);

        Self {
            lower,
            words,
            stems,
            stem_counts: HashMap::new(),
            exact_counts: HashMap::new(),
            keyword_stems: HashMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.lower.is_empty()
    }

    /// Number of full passes over the content made so far.
    pub fn scans(&self) -> usize {
        self.stem_counts.len() + self.exact_counts.len()
    }

    pub fn relevance(&mut self, keywords: &[String], match_type: MatchType) -> u8 {
        if self.is_empty() || keywords.is_empty() {
            return 0;
        }

        let occurrences: usize = match match_type {
            MatchType::Exact => keywords.iter().map(|k| self.count_exact(k)).sum(),
            MatchType::Stemmed => keywords.iter().map(|k| self.count_keyword_stems(k)).sum(),
        };

        bucket(occurrences)
    }

    fn count_exact(&mut self, keyword: &str) -> usize {
        let keyword = keyword.to_lowercase();
        if keyword.is_empty() {
            return 0;
        }
        if let Some(&count) = self.exact_counts.get(&keyword) {
            return count;
        }
        let count = self.lower.matches(keyword.as_str()).count();
        self.exact_counts.insert(keyword, count);
        count
    }

    fn count_keyword_stems(&mut self, keyword: &str) -> usize {
        let keyword_stems = match self.keyword_stems.get(keyword) {
            Some(cached) => cached.clone(),
            None => {
                let fresh: Vec<String> = stems(keyword).into_iter().collect();
                self.keyword_stems.insert(keyword.to_string(), fresh.clone());
                fresh
            }
        };

        let mut total = 0;
        for stem in &keyword_stems {
            if self.stems.contains(stem) {
                total += self.count_stem(stem);
            }
        }
        total
    }

    /// Words of the content starting with `stem`.
    fn count_stem(&mut self, stem: &str) -> usize {
        if let Some(&count) = self.stem_counts.get(stem) {
            return count;
        }
        let count = self.words.iter().filter(|w| w.starts_with(stem)).count();
        self.stem_counts.insert(stem.to_string(), count);
        count
    }
}

/// Combine a target page's keywords with an explicit focus keyword.
///
/// A multi-word explicit keyword also contributes its individual words
/// (longer than two characters).
pub fn build_keyword_list(target_keywords: &[String], explicit: Option<&str>) -> Vec<String> {
    let mut keywords = target_keywords.to_vec();

    if let Some(explicit) = explicit.map(str::trim).filter(|k| !k.is_empty()) {
        keywords.push(explicit.to_string());

        let words: Vec<&str> = explicit
            .split_whitespace()
            .filter(|w| w.chars().count() > 2)
            .collect();
        if words.len() > 1 {
            keywords.extend(words.into_iter().map(str::to_string));
        }
    }

    keywords
}

/// Keep the `max_targets` candidates most relevant to `content`.
///
/// Each candidate is scored with its own keywords, or its title when it
/// has none, plus the optional explicit keyword. Ties keep input order.
pub fn prefilter(
    content: &str,
    candidates: &[Candidate],
    max_targets: usize,
    match_type: MatchType,
    explicit: Option<&str>,
) -> Vec<Candidate> {
    let mut index = ContentIndex::new(content);
    prefilter_indexed(&mut index, candidates, max_targets, match_type, explicit)
}

/// [`prefilter`] against an already built index.
pub fn prefilter_indexed(
    index: &mut ContentIndex,
    candidates: &[Candidate],
    max_targets: usize,
    match_type: MatchType,
    explicit: Option<&str>,
) -> Vec<Candidate> {
    let mut scored: Vec<(u8, &Candidate)> = candidates
        .iter()
        .map(|candidate| {
            let own = if candidate.keywords.is_empty() {
                vec![candidate.title.clone()]
            } else {
                candidate.keywords.clone()
            };
            let keywords = build_keyword_list(&own, explicit);
            (index.relevance(&keywords, match_type), candidate)
        })
        .collect();

    scored.sort_by(|a, b| b.0.cmp(&a.0));

    log::debug!(
        "prefilter scored {} candidates with {} content scans",
        candidates.len(),
        index.scans()
    );

    scored
        .into_iter()
        .take(max_targets)
        .map(|(_, candidate)| candidate.clone())
        .collect()
}
