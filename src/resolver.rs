//! Title resolution: map misspelled free text onto a known song title

use crate::types::{Catalog, TitleMatch, MAX_TITLE_CHARS};
use tracing::debug;

/// Suggestions scoring below this are treated as no match at all
pub const MIN_SUGGESTION_SCORE: u8 = 60;

/// Pluggable closest-title lookup
pub trait TitleResolver: Send + Sync {
    fn name(&self) -> &'static str;

    /// Best matching title and its confidence, or `None` when nothing can match
    fn resolve(&self, input: &str, titles: &[&str]) -> Option<TitleMatch>;
}

/// Edit-distance resolver built on `strsim`
#[derive(Debug, Clone, Default)]
pub struct FuzzyTitleResolver;

impl FuzzyTitleResolver {
    pub fn new() -> Self {
        Self
    }

    /// Lowercase, drop punctuation, collapse whitespace
    fn normalize(s: &str) -> String {
        s.to_lowercase()
            .chars()
            .map(|c| if c.is_alphanumeric() { c } else { ' ' })
            .collect::<String>()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn token_sort(s: &str) -> String {
        let mut tokens: Vec<&str> = s.split_whitespace().collect();
        tokens.sort_unstable();
        tokens.join(" ")
    }

    /// Best ratio of the shorter string against equally long windows of the longer one
    fn partial_ratio(a: &str, b: &str) -> f64 {
        let (short, long) = if a.chars().count() <= b.chars().count() {
            (a, b)
        } else {
            (b, a)
        };
        let short_len = short.chars().count();
        let long_chars: Vec<char> = long.chars().collect();
        if short_len == 0 {
            return 0.0;
        }

        (0..=long_chars.len() - short_len)
            .map(|start| {
                let window: String = long_chars[start..start + short_len].iter().collect();
                strsim::normalized_levenshtein(short, &window)
            })
            .fold(0.0, f64::max)
    }

    /// Similarity in 0..=100
    pub fn score(input: &str, title: &str) -> u8 {
        let a = Self::normalize(input);
        let b = Self::normalize(title);
        if a.is_empty() || b.is_empty() {
            return 0;
        }

        let full = strsim::normalized_levenshtein(&a, &b);
        let sorted =
            strsim::normalized_levenshtein(&Self::token_sort(&a), &Self::token_sort(&b)) * 0.95;

        let (la, lb) = (a.chars().count() as f64, b.chars().count() as f64);
        let partial = if la.max(lb) / la.min(lb) >= 1.5 {
            Self::partial_ratio(&a, &b) * 0.9
        } else {
            0.0
        };

        let best = full.max(sorted).max(partial);
        (best * 100.0).round().clamp(0.0, 100.0) as u8
    }
}

impl TitleResolver for FuzzyTitleResolver {
    fn name(&self) -> &'static str {
        "fuzzy"
    }

    fn resolve(&self, input: &str, titles: &[&str]) -> Option<TitleMatch> {
        // Scoring is quadratic in input length
        if input.chars().count() > MAX_TITLE_CHARS || Self::normalize(input).is_empty() {
            return None;
        }

        let mut best: Option<TitleMatch> = None;
        for title in titles {
            let score = Self::score(input, title);
            // First title with the highest score wins
            if best.as_ref().map_or(true, |b| score > b.score) {
                best = Some(TitleMatch {
                    title: title.to_string(),
                    score,
                });
            }
        }
        best
    }
}

/// Outcome of looking a free-text title up in the catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TitleLookup {
    /// Case-insensitive hit; carries the catalog's spelling
    Exact(String),
    /// No hit, but the resolver has a closest title to offer
    Suggestion(TitleMatch),
    NoMatch,
}

/// Exact case-insensitive lookup first, resolver only on a miss
pub fn lookup_title(catalog: &Catalog, resolver: &dyn TitleResolver, input: &str) -> TitleLookup {
    if let Some(idx) = catalog.find_title(input) {
        return TitleLookup::Exact(catalog.songs()[idx].title.clone());
    }
    match resolver.resolve(input, &catalog.titles()) {
        Some(m) if m.score >= MIN_SUGGESTION_SCORE => TitleLookup::Suggestion(m),
        Some(m) => {
            debug!(
                "{} resolver: best match '{}' for '{}' scored {}, ignoring",
                resolver.name(),
                m.title,
                input,
                m.score
            );
            TitleLookup::NoMatch
        }
        None => TitleLookup::NoMatch,
    }
}
