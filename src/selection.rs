//! Ranked walk over similarity scores with query exclusion and pair dedup

use crate::types::*;
use std::collections::HashSet;

/// Pick up to `n` distinct (title, artist) pairs by descending score.
///
/// Rows titled like the query (case-insensitive) are skipped wherever they
/// appear. Equal scores keep catalog order.
pub fn select_top(
    catalog: &Catalog,
    scores: &[f64],
    query_title: &str,
    n: usize,
) -> Vec<RecommendedSong> {
    let mut ranked: Vec<(usize, f64)> = scores.iter().copied().enumerate().collect();
    // sort_by is stable
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));

    let query = query_title.to_lowercase();
    let songs = catalog.songs();
    let mut seen: HashSet<(&str, &str)> = HashSet::new();
    let mut selected = Vec::with_capacity(n);

    for (idx, score) in ranked {
        if selected.len() >= n {
            break;
        }
        let song = &songs[idx];
        if song.title.to_lowercase() == query {
            continue;
        }
        if !seen.insert((song.title.as_str(), song.artist.as_str())) {
            tracing::debug!("  SKIP: duplicate '{}' by '{}'", song.title, song.artist);
            continue;
        }
        selected.push(RecommendedSong {
            title: song.title.clone(),
            artist: song.artist.clone(),
            score: Some(score),
        });
    }

    selected
}
