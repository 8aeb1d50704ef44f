//! Post-week scoring: marks picks and pool entries right or wrong from final
//! scores, ranks participants, and writes the weekly rollups.

use anyhow::Result;
use sqlx::SqlitePool;
use std::collections::HashMap;

use crate::db::{
    get_expert_picks_for_game, get_games_for_week, get_picks_for_week,
    get_pool_results_for_week, update_expert_pick_result, update_pick_result,
    update_pool_result_outcome, upsert_analysis_result, upsert_confidence_accuracy,
    upsert_home_field_advantage,
};
use crate::models::{ConfidenceAccuracy, ExpertPickResult, Game, WeeklyAnalysis};

/// A pick on a completed game is correct iff its team won outright; a tied
/// game has no winner, so every pick on it scores as wrong.
fn pick_is_correct(game: &Game, pick_team_id: i64) -> bool {
    game.winner_team_id == Some(pick_team_id)
}

/// Score one week. Games without final scores are left alone, so this is
/// safe to run mid-week and again after Monday night.
pub async fn score_week(
    pool: &SqlitePool,
    season_year: i32,
    week: i32,
) -> Result<WeeklyAnalysis> {
    let games: HashMap<i64, Game> = get_games_for_week(pool, season_year, week)
        .await?
        .into_iter()
        .map(|g| (g.id, g))
        .collect();

    // ── our picks ──
    let picks = get_picks_for_week(pool, season_year, week).await?;
    let mut scored = 0i64;
    let mut correct = 0i64;
    let mut total_error = 0.0f64;
    let mut error_samples = 0i64;
    let mut per_confidence: HashMap<i32, (i64, i64)> = HashMap::new();

    for pick in &picks {
        let Some(game) = games.get(&pick.game_id) else {
            continue;
        };
        if !game.is_completed {
            continue;
        }
        let is_correct = pick_is_correct(game, pick.pick_team_id);
        update_pick_result(pool, pick.id, is_correct).await?;

        scored += 1;
        if is_correct {
            correct += 1;
        }
        let entry = per_confidence.entry(pick.confidence_points).or_insert((0, 0));
        entry.0 += 1;
        if is_correct {
            entry.1 += 1;
        }

        if let (Some(predicted), Some(actual)) =
            (pick.total_points_prediction, game.total_points)
        {
            total_error += (predicted - actual as f64).abs();
            error_samples += 1;
        }
    }

    // ── expert track records ──
    for game in games.values().filter(|g| g.is_completed) {
        for expert_pick in get_expert_picks_for_game(pool, game.id).await? {
            let result = if pick_is_correct(game, expert_pick.pick_team_id) {
                ExpertPickResult::Win
            } else {
                ExpertPickResult::Loss
            };
            update_expert_pick_result(pool, expert_pick.id, result).await?;
        }
    }

    // ── pool participants ──
    let pool_rows = get_pool_results_for_week(pool, season_year, week).await?;
    let mut outcomes: Vec<(i64, Option<bool>, i32)> = Vec::new(); // (row id, correct, points won)
    let mut participant_scores: HashMap<String, i32> = HashMap::new();

    for row in &pool_rows {
        let game = games.get(&row.game_id);
        let outcome = match (game, row.pick_team_id) {
            (Some(g), Some(team_id)) if g.is_completed => Some(pick_is_correct(g, team_id)),
            // a missed pick on a finished game scores zero
            (Some(g), None) if g.is_completed => Some(false),
            _ => None,
        };
        let points = match outcome {
            Some(true) => row.confidence_points.unwrap_or(0),
            _ => 0,
        };
        *participant_scores.entry(row.participant_name.clone()).or_insert(0) += points;
        outcomes.push((row.id, outcome, points));
    }

    let mut standings: Vec<(String, i32)> = participant_scores.clone().into_iter().collect();
    standings.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    let ranks: HashMap<String, i32> = standings
        .iter()
        .enumerate()
        .map(|(i, (name, _))| (name.clone(), i as i32 + 1))
        .collect();

    for (row, (row_id, outcome, _)) in pool_rows.iter().zip(outcomes) {
        let total = participant_scores.get(&row.participant_name).copied().unwrap_or(0);
        let rank = ranks.get(&row.participant_name).copied().unwrap_or(0);
        update_pool_result_outcome(pool, row_id, outcome, total, rank).await?;
    }

    // ── rollups ──
    let analysis = WeeklyAnalysis {
        season_year,
        week,
        total_picks: scored,
        correct_picks: correct,
        accuracy: if scored > 0 { correct as f64 / scored as f64 } else { 0.0 },
        avg_total_points_error: if error_samples > 0 {
            Some(total_error / error_samples as f64)
        } else {
            None
        },
    };
    upsert_analysis_result(pool, &analysis).await?;

    for (confidence_points, (total, right)) in per_confidence {
        upsert_confidence_accuracy(
            pool,
            &ConfidenceAccuracy {
                season_year,
                week,
                confidence_points,
                total_picks: total,
                correct_picks: right,
                accuracy: right as f64 / total as f64,
            },
        )
        .await?;
    }

    refresh_home_field_ratings(pool, season_year).await?;

    tracing::info!(
        "Scored week {} of {}: {}/{} picks correct",
        week,
        season_year,
        correct,
        scored
    );
    Ok(analysis)
}

/// Season-to-date home win fraction per team, recomputed from completed
/// games after every scoring pass.
async fn refresh_home_field_ratings(pool: &SqlitePool, season_year: i32) -> Result<()> {
    let rows: Vec<(i64, i64, i64)> = sqlx::query_as(
        r#"
        SELECT home_team_id,
               COUNT(*),
               COALESCE(SUM(CASE WHEN winner_team_id = home_team_id THEN 1 ELSE 0 END), 0)
        FROM games
        WHERE season_year = ? AND is_completed = 1
        GROUP BY home_team_id
        "#,
    )
    .bind(season_year)
    .fetch_all(pool)
    .await?;

    for (team_id, played, won) in rows {
        let rating = won as f64 / played as f64;
        upsert_home_field_advantage(pool, team_id, season_year, rating, played).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{
        get_confidence_accuracy_for_season, get_home_field_advantage,
        get_participant_weekly_summary, get_picks_for_week, get_team_id, seed_teams,
        test_pool, upsert_expert_pick, upsert_game, upsert_pick, upsert_pool_result,
    };
    use crate::teams::TeamDirectory;
    use chrono::NaiveDate;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[tokio::test]
    async fn test_score_week_end_to_end() {
        let pool = test_pool().await;
        let dir = TeamDirectory::default();
        seed_teams(&pool, &dir).await.unwrap();

        let g1 = upsert_game(&pool, &dir, 2025, 3, "Buffalo Bills", "Miami Dolphins",
            date("2025-09-21"), Some(28), Some(24)).await.unwrap();
        let g2 = upsert_game(&pool, &dir, 2025, 3, "Dallas Cowboys", "New York Giants",
            date("2025-09-21"), Some(17), Some(20)).await.unwrap();
        // not played yet, must be skipped
        let g3 = upsert_game(&pool, &dir, 2025, 3, "Green Bay Packers", "Chicago Bears",
            date("2025-09-22"), None, None).await.unwrap();

        upsert_expert_pick(&pool, g1, "pete prisco", "Buffalo Bills", Some(-3.5), 12)
            .await
            .unwrap();
        upsert_expert_pick(&pool, g1, "jared dubin", "Miami Dolphins", Some(3.5), 9)
            .await
            .unwrap();

        upsert_pick(&pool, g1, 2025, 3, "Buffalo Bills", 3, 0.8, Some(50.0)).await.unwrap();
        upsert_pick(&pool, g2, 2025, 3, "Dallas Cowboys", 2, 0.6, None).await.unwrap();
        upsert_pick(&pool, g3, 2025, 3, "Green Bay Packers", 1, 0.55, None).await.unwrap();

        let bills = get_team_id(&pool, "Buffalo Bills").await.unwrap().unwrap();
        let giants = get_team_id(&pool, "New York Giants").await.unwrap().unwrap();
        upsert_pool_result(&pool, 2025, 3, "alice", g1, Some(bills), Some(16)).await.unwrap();
        upsert_pool_result(&pool, 2025, 3, "alice", g2, Some(giants), Some(15)).await.unwrap();
        upsert_pool_result(&pool, 2025, 3, "bob", g1, Some(bills), Some(10)).await.unwrap();
        upsert_pool_result(&pool, 2025, 3, "bob", g2, None, None).await.unwrap();

        let analysis = score_week(&pool, 2025, 3).await.unwrap();
        assert_eq!(analysis.total_picks, 2);
        assert_eq!(analysis.correct_picks, 1);
        assert!((analysis.accuracy - 0.5).abs() < 1e-9);
        // |50 - 52| on the one pick carrying a total prediction
        assert_eq!(analysis.avg_total_points_error, Some(2.0));

        let picks = get_picks_for_week(&pool, 2025, 3).await.unwrap();
        let by_game: HashMap<i64, Option<bool>> =
            picks.iter().map(|p| (p.game_id, p.is_correct)).collect();
        assert_eq!(by_game[&g1], Some(true));
        assert_eq!(by_game[&g2], Some(false));
        assert_eq!(by_game[&g3], None);

        let summary = get_participant_weekly_summary(&pool, 2025, 3).await.unwrap();
        assert_eq!(summary[0].participant_name, "alice");
        assert_eq!(summary[0].points_won, 31);
        assert_eq!(summary[1].participant_name, "bob");
        assert_eq!(summary[1].points_won, 10);

        let accuracy = get_confidence_accuracy_for_season(&pool, 2025).await.unwrap();
        assert_eq!(accuracy.len(), 2);
        let three_point = accuracy.iter().find(|a| a.confidence_points == 3).unwrap();
        assert_eq!(three_point.correct_picks, 1);

        // expert track records updated from the final score
        let expert_picks = crate::db::get_expert_picks_for_game(&pool, g1).await.unwrap();
        let by_expert: HashMap<&str, Option<ExpertPickResult>> = expert_picks
            .iter()
            .map(|p| (p.expert_name.as_str(), p.result))
            .collect();
        assert_eq!(by_expert["pete prisco"], Some(ExpertPickResult::Win));
        assert_eq!(by_expert["jared dubin"], Some(ExpertPickResult::Loss));

        // Bills won their only home game, Cowboys lost theirs
        let cowboys = get_team_id(&pool, "Dallas Cowboys").await.unwrap().unwrap();
        let bills_hfa = get_home_field_advantage(&pool, bills, 2025).await.unwrap().unwrap();
        let cowboys_hfa = get_home_field_advantage(&pool, cowboys, 2025).await.unwrap().unwrap();
        assert_eq!(bills_hfa, 1.0);
        assert_eq!(cowboys_hfa, 0.0);
    }

    #[tokio::test]
    async fn test_tied_game_scores_picks_wrong() {
        let pool = test_pool().await;
        let dir = TeamDirectory::default();
        seed_teams(&pool, &dir).await.unwrap();

        let g = upsert_game(&pool, &dir, 2025, 4, "Detroit Lions", "Chicago Bears",
            date("2025-09-28"), Some(23), Some(23)).await.unwrap();
        upsert_pick(&pool, g, 2025, 4, "Detroit Lions", 1, 0.7, None).await.unwrap();

        let analysis = score_week(&pool, 2025, 4).await.unwrap();
        assert_eq!(analysis.correct_picks, 0);
        assert_eq!(analysis.total_picks, 1);
    }

    #[tokio::test]
    async fn test_rescoring_is_idempotent() {
        let pool = test_pool().await;
        let dir = TeamDirectory::default();
        seed_teams(&pool, &dir).await.unwrap();

        let g = upsert_game(&pool, &dir, 2025, 5, "Buffalo Bills", "New York Jets",
            date("2025-10-05"), Some(31), Some(13)).await.unwrap();
        upsert_pick(&pool, g, 2025, 5, "Buffalo Bills", 1, 0.85, None).await.unwrap();

        let first = score_week(&pool, 2025, 5).await.unwrap();
        let second = score_week(&pool, 2025, 5).await.unwrap();
        assert_eq!(first.correct_picks, second.correct_picks);
        assert_eq!(first.accuracy, second.accuracy);
    }
}
