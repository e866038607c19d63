//! Similarity ranking over a loaded corpus.

use std::cmp::Reverse;

use ordered_float::OrderedFloat;
use pr_context_embeddings::{EmbeddingError, cosine_similarity, magnitude};
use tracing::debug;

use crate::error::{PrContextError, Result};
use crate::model::PrRecord;
use crate::scope::RepoScope;

/// Default number of results returned to callers.
pub const DEFAULT_TOP_K: usize = 3;

/// A corpus record together with its similarity to the query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredRecord<'a> {
    pub record: &'a PrRecord,
    pub score: f32,
}

/// Return up to `k` records from `scope` most similar to `query`.
///
/// Only records in `scope` with a non-empty embedding are candidates.
/// Results are ordered by cosine similarity, highest first; ties keep corpus
/// order. A zero-norm query has no direction and matches nothing. Candidates
/// with a zero-norm or non-finite score are skipped. A candidate whose
/// length differs from the query's fails the whole call.
pub fn rank<'a>(
    records: &'a [PrRecord],
    query: &[f32],
    scope: &RepoScope,
    k: usize,
) -> Result<Vec<ScoredRecord<'a>>> {
    if k == 0 || magnitude(query) == 0.0 {
        return Ok(Vec::new());
    }

    let mut scored: Vec<ScoredRecord<'a>> = Vec::new();
    for record in records
        .iter()
        .filter(|r| r.in_scope(scope) && r.has_embedding())
    {
        match cosine_similarity(query, &record.embedding) {
            Ok(score) if score.is_finite() => scored.push(ScoredRecord { record, score }),
            Ok(_) | Err(EmbeddingError::ZeroMagnitude) => {
                debug!("Skipping PR #{} with degenerate embedding", record.pr_id);
            }
            Err(EmbeddingError::DimensionMismatch { expected, actual }) => {
                return Err(PrContextError::DimensionMismatch {
                    expected: actual,
                    actual: expected,
                });
            }
            Err(e) => return Err(e.into()),
        }
    }

    // Stable sort: equal scores stay in corpus order.
    scored.sort_by_key(|s| Reverse(OrderedFloat(s.score)));
    scored.truncate(k);

    debug!("Ranked {} candidates in {scope}", scored.len());
    Ok(scored)
}
