//! Ranking helpers shared by the retrievers.

pub mod bm25;

pub use bm25::BM25Index;

use std::cmp::Ordering;

use crate::document::ContextMatch;

/// Sort matches by descending score, keeping the incoming order for ties,
/// and cap the list at `limit`.
pub fn rank_matches(mut matches: Vec<ContextMatch>, limit: usize) -> Vec<ContextMatch> {
    matches.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    matches.truncate(limit);
    matches
}
