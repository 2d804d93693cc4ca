//! Feature normalization and weighted cosine similarity

use crate::types::*;

/// Catalog features min-max scaled to [0,1], one row per song
#[derive(Debug, Clone, Default)]
pub struct FeatureMatrix {
    rows: Vec<[f64; FEATURE_COUNT]>,
}

impl FeatureMatrix {
    pub fn rows(&self) -> &[[f64; FEATURE_COUNT]] {
        &self.rows
    }

    pub fn row(&self, idx: usize) -> &[f64; FEATURE_COUNT] {
        &self.rows[idx]
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Normalize each feature column independently across the whole catalog
pub fn normalize_features(catalog: &Catalog) -> FeatureMatrix {
    let songs = catalog.songs();
    if songs.is_empty() {
        return FeatureMatrix::default();
    }

    let mut mins = [f64::MAX; FEATURE_COUNT];
    let mut maxs = [f64::MIN; FEATURE_COUNT];

    for song in songs {
        for (col, value) in song.features.iter().enumerate() {
            mins[col] = mins[col].min(*value);
            maxs[col] = maxs[col].max(*value);
        }
    }

    let rows = songs
        .iter()
        .map(|song| {
            let mut row = [0.0; FEATURE_COUNT];
            for col in 0..FEATURE_COUNT {
                row[col] = normalize_value(song.features[col], mins[col], maxs[col]);
            }
            row
        })
        .collect();

    FeatureMatrix { rows }
}

fn normalize_value(x: f64, min: f64, max: f64) -> f64 {
    if max <= min + 1e-12 {
        // Constant column
        0.0
    } else {
        (x - min) / (max - min)
    }
}

/// Elementwise product of a row with the weight vector
pub fn apply_weights(row: &[f64; FEATURE_COUNT], weights: &WeightVector) -> [f64; FEATURE_COUNT] {
    let mut out = *row;
    for (value, w) in out.iter_mut().zip(weights.as_slice()) {
        *value *= w;
    }
    out
}

/// Cosine similarity; zero-length vectors are similar to nothing
pub fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    let dot: f64 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let denom = norm(a) * norm(b);
    if denom > 0.0 {
        dot / denom
    } else {
        0.0
    }
}

fn norm(v: &[f64]) -> f64 {
    v.iter().map(|x| x * x).sum::<f64>().sqrt()
}

/// Similarity of the weighted query row against every weighted row, in catalog order
pub fn similarity_scores(
    matrix: &FeatureMatrix,
    query_idx: usize,
    weights: &WeightVector,
) -> Vec<f64> {
    let weights = weights.rescaled();
    let query = apply_weights(matrix.row(query_idx), &weights);
    matrix
        .rows()
        .iter()
        .map(|row| cosine_similarity(&query, &apply_weights(row, &weights)))
        .collect()
}
