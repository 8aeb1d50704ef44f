//! Confidence-point assignment: turns a week's per-game win-probability
//! estimates into the mandatory 1..N permutation, highest points to the
//! surest pick.
//!
//! Tie-break is a stable sort: games with equal probabilities keep their
//! input order, so the assignment is deterministic for a given input.

use std::collections::HashSet;

use crate::errors::PoolError;
use crate::models::{GameEstimate, RankedPick};

/// Pre-scaled confidence units from upstream models live in this band.
pub const MIN_CONFIDENCE: f64 = 1.0;
pub const MAX_CONFIDENCE: f64 = 16.0;

/// Assigns confidence points N..1 across one week of estimates, one per
/// game. `expected_games` is the number of games on that week's slate;
/// partial weeks and duplicate game ids are rejected. An empty week yields
/// an empty assignment.
pub fn assign(
    expected_games: usize,
    estimates: &[GameEstimate],
) -> Result<Vec<RankedPick>, PoolError> {
    let distinct: HashSet<i64> = estimates.iter().map(|e| e.game_id).collect();
    if distinct.len() != estimates.len() || estimates.len() != expected_games {
        return Err(PoolError::MismatchedGameCount {
            expected: expected_games,
            supplied: estimates.len(),
        });
    }

    let mut ordered: Vec<GameEstimate> = estimates.to_vec();
    ordered.sort_by(|a, b| {
        b.win_probability
            .partial_cmp(&a.win_probability)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let n = ordered.len() as u32;
    Ok(ordered
        .into_iter()
        .enumerate()
        .map(|(rank, est)| RankedPick {
            game_id: est.game_id,
            pick_team_id: est.pick_team_id,
            win_probability: est.win_probability,
            confidence_points: n - rank as u32,
        })
        .collect())
}

/// The post-Thursday-night rerank: games that have already resolved drop
/// out of the pool and the remaining picks are re-ranked over a range one
/// point shorter per exclusion.
pub fn rerank_excluding(
    expected_games: usize,
    estimates: &[GameEstimate],
    resolved_game_ids: &HashSet<i64>,
) -> Result<Vec<RankedPick>, PoolError> {
    let distinct: HashSet<i64> = estimates.iter().map(|e| e.game_id).collect();
    if distinct.len() != estimates.len() || estimates.len() != expected_games {
        return Err(PoolError::MismatchedGameCount {
            expected: expected_games,
            supplied: estimates.len(),
        });
    }

    let remaining: Vec<GameEstimate> = estimates
        .iter()
        .filter(|e| !resolved_game_ids.contains(&e.game_id))
        .copied()
        .collect();
    assign(remaining.len(), &remaining)
}

/// Clamps a pre-scaled 1-16 confidence unit into band. Out-of-band input is
/// a caller bug; it is clamped loudly rather than wrapped.
pub fn clamp_preassigned(raw: f64) -> f64 {
    if !(MIN_CONFIDENCE..=MAX_CONFIDENCE).contains(&raw) {
        tracing::warn!("confidence value {} outside [1, 16], clamping", raw);
    }
    raw.clamp(MIN_CONFIDENCE, MAX_CONFIDENCE)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn est(game_id: i64, prob: f64) -> GameEstimate {
        GameEstimate {
            game_id,
            pick_team_id: game_id * 10,
            win_probability: prob,
        }
    }

    fn points_for(picks: &[RankedPick], game_id: i64) -> u32 {
        picks
            .iter()
            .find(|p| p.game_id == game_id)
            .map(|p| p.confidence_points)
            .unwrap()
    }

    #[test]
    fn test_three_game_week() {
        // probabilities [0.9, 0.5, 0.7] -> points [3, 1, 2]
        let picks = assign(3, &[est(1, 0.9), est(2, 0.5), est(3, 0.7)]).unwrap();
        assert_eq!(points_for(&picks, 1), 3);
        assert_eq!(points_for(&picks, 2), 1);
        assert_eq!(points_for(&picks, 3), 2);
    }

    #[test]
    fn test_output_is_permutation() {
        for n in 0..=16usize {
            let estimates: Vec<GameEstimate> = (0..n)
                .map(|i| est(i as i64, (i as f64 * 0.37).fract()))
                .collect();
            let picks = assign(n, &estimates).unwrap();
            let mut points: Vec<u32> =
                picks.iter().map(|p| p.confidence_points).collect();
            points.sort_unstable();
            assert_eq!(points, (1..=n as u32).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_monotonicity() {
        let estimates = vec![est(1, 0.55), est(2, 0.91), est(3, 0.62), est(4, 0.78)];
        let picks = assign(4, &estimates).unwrap();
        for a in &estimates {
            for b in &estimates {
                if a.win_probability > b.win_probability {
                    assert!(points_for(&picks, a.game_id) > points_for(&picks, b.game_id));
                }
            }
        }
    }

    #[test]
    fn test_tie_break_preserves_input_order() {
        let picks = assign(3, &[est(7, 0.6), est(8, 0.6), est(9, 0.6)]).unwrap();
        assert_eq!(points_for(&picks, 7), 3);
        assert_eq!(points_for(&picks, 8), 2);
        assert_eq!(points_for(&picks, 9), 1);
    }

    #[test]
    fn test_empty_week_is_ok() {
        let picks = assign(0, &[]).unwrap();
        assert!(picks.is_empty());
    }

    #[test]
    fn test_partial_week_rejected() {
        let err = assign(16, &[est(1, 0.9)]).unwrap_err();
        assert!(matches!(
            err,
            PoolError::MismatchedGameCount { expected: 16, supplied: 1 }
        ));
    }

    #[test]
    fn test_duplicate_game_rejected() {
        let err = assign(2, &[est(1, 0.9), est(1, 0.8)]).unwrap_err();
        assert!(matches!(err, PoolError::MismatchedGameCount { .. }));
    }

    #[test]
    fn test_rerank_excluding_resolved_game() {
        let estimates = vec![est(1, 0.9), est(2, 0.5), est(3, 0.7), est(4, 0.8)];
        let resolved: HashSet<i64> = [3].into_iter().collect();
        let picks = rerank_excluding(4, &estimates, &resolved).unwrap();

        assert_eq!(picks.len(), 3);
        assert!(picks.iter().all(|p| p.game_id != 3));
        let mut points: Vec<u32> = picks.iter().map(|p| p.confidence_points).collect();
        points.sort_unstable();
        assert_eq!(points, vec![1, 2, 3]);

        // relative order matches the full ranking among survivors
        assert_eq!(points_for(&picks, 1), 3);
        assert_eq!(points_for(&picks, 4), 2);
        assert_eq!(points_for(&picks, 2), 1);
    }

    #[test]
    fn test_rerank_still_validates_full_slate() {
        let resolved: HashSet<i64> = [1].into_iter().collect();
        let err = rerank_excluding(3, &[est(1, 0.9)], &resolved).unwrap_err();
        assert!(matches!(err, PoolError::MismatchedGameCount { .. }));
    }

    #[test]
    fn test_clamp_preassigned() {
        assert_eq!(clamp_preassigned(8.0), 8.0);
        assert_eq!(clamp_preassigned(0.2), 1.0);
        assert_eq!(clamp_preassigned(22.0), 16.0);
    }
}
