//! Core RecommendEngine: weighted similarity ranking over a fixed catalog

use crate::error::RecommendError;
use crate::scoring::{normalize_features, similarity_scores, FeatureMatrix};
use crate::selection::select_top;
use crate::types::*;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Catalog plus its normalized feature matrix, built once and shared read-only
pub struct RecommendEngine {
    catalog: Catalog,
    matrix: FeatureMatrix,
}

pub type SharedRecommendEngine = Arc<RecommendEngine>;

impl RecommendEngine {
    pub fn new(catalog: Catalog) -> SharedRecommendEngine {
        let matrix = normalize_features(&catalog);
        info!("Recommend engine ready: {} songs", catalog.len());
        Arc::new(Self { catalog, matrix })
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Up to `n` songs most similar to `query_title`, as (title, artist) pairs
    pub fn recommend(
        &self,
        query_title: &str,
        weights: &WeightVector,
        n: usize,
    ) -> Result<Vec<RecommendedSong>, RecommendError> {
        let mut songs = self.recommend_scored(query_title, weights, n)?;
        for song in &mut songs {
            song.score = None;
        }
        Ok(songs)
    }

    /// Same ranking as [`recommend`](Self::recommend), keeping each cosine score
    pub fn recommend_scored(
        &self,
        query_title: &str,
        weights: &WeightVector,
        n: usize,
    ) -> Result<Vec<RecommendedSong>, RecommendError> {
        let start = Instant::now();

        let idx = self
            .catalog
            .find_title(query_title)
            .ok_or_else(|| RecommendError::NotFound(query_title.to_string()))?;

        let scores = similarity_scores(&self.matrix, idx, weights);
        let selected = select_top(&self.catalog, &scores, query_title, n);

        debug!(
            "Ranked {} songs for '{}' in {:?}, returning {}",
            scores.len(),
            query_title,
            start.elapsed(),
            selected.len()
        );

        Ok(selected)
    }
}
