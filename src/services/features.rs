//! Feature vectors for the learned-model strategy. The same layout is built
//! from live games (with stored odds) and from training rows, so a model
//! trained on one predicts cleanly on the other.
//!
//! Every feature lands in roughly unit scale so no single column dominates
//! the gradient steps: probabilities are already [0, 1], the implied spread
//! is the moneyline gap converted to points (half the cents gap per 100,
//! times 7) and then divided by two touchdowns, and the total line is
//! divided by 100.

use anyhow::Result;
use sqlx::SqlitePool;

use crate::db::{get_expert_picks_for_game, latest_odds_for_game};
use crate::models::{Game, TrainingRow};
use crate::utils::{
    american_to_probability, remove_vig, spread_to_win_probability, week_cycle_encoding,
};

/// League-average closing total, used when no line is stored.
const DEFAULT_TOTAL_LINE: f64 = 44.5;

/// Points-scale divisors that bring the spread and total features into
/// roughly [-1, 1].
const SPREAD_SCALE: f64 = 14.0;
const TOTAL_SCALE: f64 = 100.0;

const WEEKS_IN_SEASON: i32 = 18;

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    pub home_win_probability: f64,
    pub away_win_probability: f64,
    pub implied_spread: f64,
    pub total_points_line: f64,
    pub week_sin: f64,
    pub week_cos: f64,
    pub home_team_index: f64,
    pub away_team_index: f64,
    pub home_rolling_win_pct: f64,
    pub away_rolling_win_pct: f64,
}

impl FeatureVector {
    pub const DIM: usize = 10;

    pub fn to_vec(&self) -> Vec<f64> {
        vec![
            self.home_win_probability,
            self.away_win_probability,
            self.implied_spread,
            self.total_points_line,
            self.week_sin,
            self.week_cos,
            self.home_team_index,
            self.away_team_index,
            self.home_rolling_win_pct,
            self.away_rolling_win_pct,
        ]
    }

    /// Shared construction path for live and training features.
    #[allow(clippy::too_many_arguments)]
    fn from_parts(
        week: i32,
        home_team_id: i64,
        away_team_id: i64,
        home_moneyline: Option<i32>,
        away_moneyline: Option<i32>,
        total_points_line: Option<f64>,
        home_rolling_win_pct: f64,
        away_rolling_win_pct: f64,
    ) -> Self {
        let (home_prob, away_prob) = match (home_moneyline, away_moneyline) {
            (Some(h), Some(a)) => {
                remove_vig(american_to_probability(h), american_to_probability(a))
            }
            _ => (0.5, 0.5),
        };
        // implied spread from the moneyline gap: points, then unit scale
        let implied_spread = match (home_moneyline, away_moneyline) {
            (Some(h), Some(a)) => (a - h) as f64 / 2.0 / 100.0 * 7.0 / SPREAD_SCALE,
            _ => 0.0,
        };
        let (week_sin, week_cos) = week_cycle_encoding(week, WEEKS_IN_SEASON);

        Self {
            home_win_probability: home_prob,
            away_win_probability: away_prob,
            implied_spread,
            total_points_line: total_points_line.unwrap_or(DEFAULT_TOTAL_LINE) / TOTAL_SCALE,
            week_sin,
            week_cos,
            home_team_index: home_team_id as f64 / 32.0,
            away_team_index: away_team_id as f64 / 32.0,
            home_rolling_win_pct,
            away_rolling_win_pct,
        }
    }

    pub fn from_training_row(row: &TrainingRow) -> Self {
        // rolling win percentages are placeholders on the training path; the
        // stored odds carry the signal
        Self::from_parts(
            row.week,
            row.home_team_id,
            row.away_team_id,
            row.home_moneyline,
            row.away_moneyline,
            row.total_points_line,
            0.5,
            0.5,
        )
    }
}

/// Completed-game win percentage for a team earlier in the same season.
/// 0.5 when the team has no completed games yet.
pub async fn rolling_win_pct(
    pool: &SqlitePool,
    team_id: i64,
    season_year: i32,
    before_week: i32,
) -> Result<f64> {
    let row: (i64, i64) = sqlx::query_as(
        r#"
        SELECT COUNT(*),
               COALESCE(SUM(CASE WHEN winner_team_id = ? THEN 1 ELSE 0 END), 0)
        FROM games
        WHERE season_year = ? AND week < ? AND is_completed = 1
          AND (home_team_id = ? OR away_team_id = ?)
        "#,
    )
    .bind(team_id)
    .bind(season_year)
    .bind(before_week)
    .bind(team_id)
    .bind(team_id)
    .fetch_one(pool)
    .await?;

    let (played, won) = row;
    if played == 0 {
        Ok(0.5)
    } else {
        Ok(won as f64 / played as f64)
    }
}

/// Average expert spread from the home side's perspective (negative means
/// home favored), when any expert attached one.
async fn expert_home_spread(pool: &SqlitePool, game: &Game) -> Result<Option<f64>> {
    let picks = get_expert_picks_for_game(pool, game.id).await?;
    let spreads: Vec<f64> = picks
        .iter()
        .filter_map(|p| {
            p.spread.map(|s| if p.pick_team_id == game.home_team_id { s } else { -s })
        })
        .collect();
    if spreads.is_empty() {
        return Ok(None);
    }
    Ok(Some(spreads.iter().sum::<f64>() / spreads.len() as f64))
}

pub async fn build_features(pool: &SqlitePool, game: &Game) -> Result<FeatureVector> {
    let odds = latest_odds_for_game(pool, game.id).await?;
    let (home_ml, away_ml, total_line) = match &odds {
        Some(o) => (o.home_moneyline, o.away_moneyline, o.total_points_line),
        None => (None, None, None),
    };

    let home_pct =
        rolling_win_pct(pool, game.home_team_id, game.season_year, game.week).await?;
    let away_pct =
        rolling_win_pct(pool, game.away_team_id, game.season_year, game.week).await?;

    let mut features = FeatureVector::from_parts(
        game.week,
        game.home_team_id,
        game.away_team_id,
        home_ml,
        away_ml,
        total_line,
        home_pct,
        away_pct,
    );

    // no stored moneylines: fall back to the expert spreads for the
    // probability features instead of a flat coin flip
    if home_ml.is_none() && away_ml.is_none() {
        if let Some(spread) = expert_home_spread(pool, game).await? {
            let favored = spread_to_win_probability(spread);
            let home_prob = if spread <= 0.0 { favored } else { 1.0 - favored };
            features.home_win_probability = home_prob;
            features.away_win_probability = 1.0 - home_prob;
            features.implied_spread = -spread / SPREAD_SCALE;
        }
    }

    Ok(features)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector_dimension() {
        let row = TrainingRow {
            season_year: 2024,
            week: 5,
            home_team_id: 3,
            away_team_id: 9,
            pick_team_id: 3,
            home_moneyline: Some(-160),
            away_moneyline: Some(140),
            total_points_line: Some(47.0),
            win_probability: 0.62,
            is_correct: true,
        };
        let features = FeatureVector::from_training_row(&row);
        assert_eq!(features.to_vec().len(), FeatureVector::DIM);
    }

    #[test]
    fn test_moneyline_favorite_gets_higher_probability() {
        let row = TrainingRow {
            season_year: 2024,
            week: 5,
            home_team_id: 3,
            away_team_id: 9,
            pick_team_id: 3,
            home_moneyline: Some(-200),
            away_moneyline: Some(170),
            total_points_line: None,
            win_probability: 0.62,
            is_correct: true,
        };
        let features = FeatureVector::from_training_row(&row);
        assert!(features.home_win_probability > features.away_win_probability);
        assert!((features.home_win_probability + features.away_win_probability - 1.0).abs() < 1e-9);
        // home favorite: implied spread positive, comfortably under unit scale
        assert!(features.implied_spread > 0.0 && features.implied_spread < 1.0);
        assert_eq!(features.total_points_line, DEFAULT_TOTAL_LINE / TOTAL_SCALE);
    }

    #[test]
    fn test_missing_odds_default_to_coin_flip() {
        let row = TrainingRow {
            season_year: 2024,
            week: 1,
            home_team_id: 1,
            away_team_id: 2,
            pick_team_id: 1,
            home_moneyline: None,
            away_moneyline: None,
            total_points_line: None,
            win_probability: 0.5,
            is_correct: false,
        };
        let features = FeatureVector::from_training_row(&row);
        assert_eq!(features.home_win_probability, 0.5);
        assert_eq!(features.implied_spread, 0.0);
    }

    #[tokio::test]
    async fn test_expert_spread_fallback_when_no_odds_stored() {
        use crate::db::{get_game, seed_teams, test_pool, upsert_expert_pick, upsert_game};
        use crate::teams::TeamDirectory;
        use chrono::NaiveDate;

        let pool = test_pool().await;
        let dir = TeamDirectory::default();
        seed_teams(&pool, &dir).await.unwrap();

        let d = NaiveDate::from_ymd_opt(2025, 9, 21).unwrap();
        let game_id = upsert_game(&pool, &dir, 2025, 3, "Buffalo Bills", "Miami Dolphins",
            d, None, None).await.unwrap();
        let game = get_game(&pool, game_id).await.unwrap().unwrap();

        // both experts lay points with the home side, no odds rows exist
        upsert_expert_pick(&pool, game_id, "pete prisco", "Buffalo Bills", Some(-6.5), 12)
            .await
            .unwrap();
        upsert_expert_pick(&pool, game_id, "jared dubin", "Buffalo Bills", Some(-7.5), 10)
            .await
            .unwrap();

        let features = build_features(&pool, &game).await.unwrap();
        assert!(features.home_win_probability > 0.5);
        assert!((features.home_win_probability + features.away_win_probability - 1.0).abs() < 1e-9);
        // average -7.0 spread from the home side, over the 14-point scale
        assert!((features.implied_spread - 0.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_rolling_win_pct_from_completed_games() {
        use crate::db::{seed_teams, test_pool, upsert_game};
        use crate::teams::TeamDirectory;
        use chrono::NaiveDate;

        let pool = test_pool().await;
        let dir = TeamDirectory::default();
        seed_teams(&pool, &dir).await.unwrap();

        let d = NaiveDate::from_ymd_opt(2025, 9, 7).unwrap();
        upsert_game(&pool, &dir, 2025, 1, "Buffalo Bills", "Miami Dolphins", d, Some(30), Some(10))
            .await
            .unwrap();
        upsert_game(&pool, &dir, 2025, 2, "New York Jets", "Buffalo Bills", d, Some(13), Some(20))
            .await
            .unwrap();

        let bills = crate::db::get_team_id(&pool, "Buffalo Bills").await.unwrap().unwrap();
        let jets = crate::db::get_team_id(&pool, "New York Jets").await.unwrap().unwrap();

        assert_eq!(rolling_win_pct(&pool, bills, 2025, 3).await.unwrap(), 1.0);
        assert_eq!(rolling_win_pct(&pool, jets, 2025, 3).await.unwrap(), 0.0);
        // before any games, a coin flip
        assert_eq!(rolling_win_pct(&pool, bills, 2025, 1).await.unwrap(), 0.5);
    }
}
