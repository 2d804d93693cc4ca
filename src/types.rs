//! Core type definitions for the song catalog and recommendation queries

use crate::error::WeightError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

pub const FEATURE_COUNT: usize = 7;

/// Weight every feature gets when the caller does not say otherwise
pub const DEFAULT_WEIGHT: f64 = 5.0;

/// Number of recommendations returned when the caller does not say otherwise
pub const DEFAULT_RECOMMENDATIONS: usize = 10;

/// Longest free-text title accepted for lookup, in characters
pub const MAX_TITLE_CHARS: usize = 256;

pub const TITLE_COLUMN: &str = "TRACK_NAME";
pub const ARTIST_COLUMN: &str = "TRACK_ARTIST";

/// One record of a table, keyed by column name
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Numeric audio feature used for similarity. Declaration order is the
/// column order of the feature matrix and of every weight vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Feature {
    Tempo,
    Loudness,
    TrackPopularity,
    Danceability,
    Energy,
    Liveness,
    Instrumentalness,
}

impl Feature {
    pub const ALL: [Feature; FEATURE_COUNT] = [
        Feature::Tempo,
        Feature::Loudness,
        Feature::TrackPopularity,
        Feature::Danceability,
        Feature::Energy,
        Feature::Liveness,
        Feature::Instrumentalness,
    ];

    /// Column name in the dataset payload
    pub fn column(self) -> &'static str {
        match self {
            Feature::Tempo => "TEMPO",
            Feature::Loudness => "LOUDNESS",
            Feature::TrackPopularity => "TRACK_POPULARITY",
            Feature::Danceability => "DANCEABILITY",
            Feature::Energy => "ENERGY",
            Feature::Liveness => "LIVENESS",
            Feature::Instrumentalness => "INSTRUMENTALNESS",
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

impl FromStr for Feature {
    type Err = WeightError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Feature::ALL
            .into_iter()
            .find(|f| f.column().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| WeightError::UnknownFeature(s.to_string()))
    }
}

/// One row of the catalog
#[derive(Debug, Clone, PartialEq)]
pub struct SongRecord {
    pub title: String,
    pub artist: String,
    pub features: [f64; FEATURE_COUNT],
}

/// Ordered, immutable set of songs available for one run
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    songs: Vec<SongRecord>,
}

impl Catalog {
    pub fn new(songs: Vec<SongRecord>) -> Self {
        Self { songs }
    }

    pub fn songs(&self) -> &[SongRecord] {
        &self.songs
    }

    pub fn len(&self) -> usize {
        self.songs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.songs.is_empty()
    }

    pub fn titles(&self) -> Vec<&str> {
        self.songs.iter().map(|s| s.title.as_str()).collect()
    }

    /// Index of the first song whose title matches case-insensitively
    pub fn find_title(&self, title: &str) -> Option<usize> {
        let wanted = title.to_lowercase();
        self.songs.iter().position(|s| s.title.to_lowercase() == wanted)
    }
}

/// Per-feature multipliers applied before cosine similarity
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightVector([f64; FEATURE_COUNT]);

impl WeightVector {
    pub fn new(weights: [f64; FEATURE_COUNT]) -> Result<Self, WeightError> {
        for (feature, w) in Feature::ALL.iter().zip(weights.iter()) {
            if !w.is_finite() || *w < 0.0 {
                return Err(WeightError::Invalid {
                    feature: *feature,
                    value: *w,
                });
            }
        }
        Ok(Self(weights))
    }

    pub fn uniform(weight: f64) -> Result<Self, WeightError> {
        Self::new([weight; FEATURE_COUNT])
    }

    /// Start from the defaults and override the features present in `overrides`
    pub fn from_overrides(overrides: &HashMap<Feature, f64>) -> Result<Self, WeightError> {
        let mut weights = [DEFAULT_WEIGHT; FEATURE_COUNT];
        for (feature, w) in overrides {
            weights[feature.index()] = *w;
        }
        Self::new(weights)
    }

    pub fn get(&self, feature: Feature) -> f64 {
        self.0[feature.index()]
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// Same proportions with the largest weight at 1; all-zero stays all-zero.
    /// Cosine similarity is unchanged by a common factor, and weighted values
    /// stay in [0,1] so their squares neither overflow nor underflow.
    pub fn rescaled(&self) -> Self {
        let max = self.0.iter().copied().fold(0.0, f64::max);
        if max > 0.0 {
            Self(self.0.map(|w| w / max))
        } else {
            *self
        }
    }
}

impl Default for WeightVector {
    fn default() -> Self {
        Self([DEFAULT_WEIGHT; FEATURE_COUNT])
    }
}

/// A recommended song, optionally carrying its similarity to the query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecommendedSong {
    pub title: String,
    pub artist: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

/// Closest known title for some free-text input
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TitleMatch {
    pub title: String,
    /// 0..=100
    pub score: u8,
}
