//! Cosine similarity ranking over an in-memory candidate set.
//!
//! Pure functions with no I/O or shared state. Scores are clamped into
//! [0, 1]: opposite vectors are simply irrelevant, and a zero-magnitude
//! vector never matches anything.

use std::cmp::Ordering;

use crate::errors::Error;

/// A candidate vector with an attached payload carried through ranking.
#[derive(Debug, Clone)]
pub struct Candidate<T> {
    pub id: i64,
    pub vector: Vec<f32>,
    pub payload: T,
}

/// A candidate that survived ranking, with its score.
#[derive(Debug, Clone, PartialEq)]
pub struct Ranked<T> {
    pub id: i64,
    pub score: f64,
    pub payload: T,
}

/// Cosine of the angle between `a` and `b`, clamped into [0, 1].
///
/// Returns 0.0 when either vector has zero magnitude or the result is not
/// finite.
///
/// # Errors
///
/// Returns `Error::DimensionMismatch` if the vectors differ in length.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f64, Error> {
    if a.len() != b.len() {
        return Err(Error::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }

    let dot: f64 = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| (*x as f64) * (*y as f64))
        .sum();
    let norm_a: f64 = a.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();
    let norm_b: f64 = b.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return Ok(0.0);
    }

    let similarity = dot / (norm_a * norm_b);
    if !similarity.is_finite() {
        return Ok(0.0);
    }
    Ok(similarity.clamp(0.0, 1.0))
}

/// Score every candidate against `query`, drop those below `threshold`, and
/// return at most `top_k` by descending score.
///
/// Candidates with equal scores keep their input order.
///
/// # Errors
///
/// Returns `Error::DimensionMismatch` if any candidate's length differs from
/// the query's.
pub fn rank<T>(
    query: &[f32],
    candidates: Vec<Candidate<T>>,
    top_k: usize,
    threshold: f64,
) -> Result<Vec<Ranked<T>>, Error> {
    let mut scored = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let score = cosine_similarity(query, &candidate.vector)?;
        if score >= threshold {
            scored.push(Ranked {
                id: candidate.id,
                score,
                payload: candidate.payload,
            });
        }
    }

    // sort_by is stable, which is what keeps ties in input order.
    scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    scored.truncate(top_k);
    Ok(scored)
}
