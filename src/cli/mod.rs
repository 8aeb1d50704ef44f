use anyhow::{Context, Result};
use std::collections::HashSet;
use std::io::Write;
use std::path::Path;

use crate::confidence;
use crate::db::{
    create_pool, get_analysis_result, get_expert_consensus, get_game, get_games_for_week,
    get_participant_weekly_summary, get_team, init_database_with_pool, seed_teams, training_rows,
    upsert_pick,
};
use crate::export;
use crate::ingest;
use crate::models::RankedPick;
use crate::services::model::{LogisticModel, TrainingConfig};
use crate::services::odds_fetcher::refresh_odds_if_stale;
use crate::services::{
    analyzer, DefaultStrategy, ExpertConsensusStrategy, ModelStrategy, PickStrategy, StrategyChain,
};
use crate::teams::TeamDirectory;

pub const DEFAULT_MODEL_PATH: &str = "data/model.json";

pub async fn init_db() -> Result<()> {
    let pool = create_pool().await?;
    init_database_with_pool(&pool).await?;
    println!("✅ Database initialized");
    Ok(())
}

pub async fn seed() -> Result<()> {
    let pool = create_pool().await?;
    init_database_with_pool(&pool).await?;
    let directory = TeamDirectory::default();
    let count = seed_teams(&pool, &directory).await?;
    println!("✅ Seeded {} NFL teams", count);
    Ok(())
}

pub async fn import_picks(path: &str) -> Result<()> {
    let pool = create_pool().await?;
    init_database_with_pool(&pool).await?;
    let directory = TeamDirectory::default();

    println!("📥 Importing expert picks from {}...", path);
    let summary = ingest::import_path(&pool, &directory, path).await?;

    println!(
        "✅ Imported {} games, {} expert picks, {} odds snapshots",
        summary.games, summary.expert_picks, summary.odds_rows
    );
    if summary.skipped_games > 0 {
        println!("⚠️  Skipped {} non-standard games", summary.skipped_games);
    }
    Ok(())
}

pub async fn fetch_odds(season_year: i32, week: i32) -> Result<()> {
    let api_key = std::env::var("ODDS_API_KEY")
        .context("ODDS_API_KEY not set; get a free key at the-odds-api.com")?;

    let pool = create_pool().await?;
    init_database_with_pool(&pool).await?;
    let directory = TeamDirectory::default();

    println!("📡 Fetching NFL odds for {} week {}...", season_year, week);
    let appended = refresh_odds_if_stale(&pool, &directory, &api_key, season_year, week).await;

    if appended == 0 {
        println!("📭 No new odds stored (fresh within 12h, or fetch failed — see logs)");
    } else {
        println!("✅ Stored {} bookmaker snapshots", appended);
    }
    Ok(())
}

fn build_chain(strategy: &str, model_path: &str) -> Result<StrategyChain> {
    let chain = match strategy.to_lowercase().as_str() {
        "auto" => StrategyChain::standard(model_path),
        "consensus" => StrategyChain::new(vec![
            Box::new(ExpertConsensusStrategy::default()),
            Box::new(DefaultStrategy),
        ]),
        "model" => {
            let model = ModelStrategy::from_file(model_path).with_context(|| {
                format!("no trained model at {}; run: pickem train", model_path)
            })?;
            let strategies: Vec<Box<dyn PickStrategy>> =
                vec![Box::new(model), Box::new(DefaultStrategy)];
            StrategyChain::new(strategies)
        }
        "default" => StrategyChain::new(vec![Box::new(DefaultStrategy)]),
        other => anyhow::bail!(
            "unknown strategy '{}': use auto, consensus, model, or default",
            other
        ),
    };
    Ok(chain)
}

pub async fn generate_picks(
    season_year: i32,
    week: i32,
    strategy: &str,
    exclude: &[i64],
    save: bool,
    model_path: &str,
) -> Result<()> {
    let pool = create_pool().await?;
    init_database_with_pool(&pool).await?;

    let games = get_games_for_week(&pool, season_year, week).await?;
    if games.is_empty() {
        println!(
            "📭 No games stored for {} week {}. Import a picks file first: pickem import-picks <file>",
            season_year, week
        );
        return Ok(());
    }

    println!("🔮 Generating picks for {} week {} ({} games)...", season_year, week, games.len());

    let chain = build_chain(strategy, model_path)?;
    let estimates = chain.predict_week(&pool, &games).await?;

    let ranked = if exclude.is_empty() {
        confidence::assign(games.len(), &estimates)?
    } else {
        let resolved: HashSet<i64> = exclude.iter().copied().collect();
        println!("ℹ️  Re-ranking with {} game(s) excluded", resolved.len());
        confidence::rerank_excluding(games.len(), &estimates, &resolved)?
    };

    println!("\n🎯 Recommended picks:");
    for pick in &ranked {
        let team = get_team(&pool, pick.pick_team_id).await?;
        let name = team.map(|t| t.name).unwrap_or_else(|| "<unknown>".to_string());

        let consensus = get_expert_consensus(&pool, pick.game_id).await?;
        let experts = if consensus.total_experts > 0 {
            format!(
                " [{}/{} experts]",
                consensus.consensus_count, consensus.total_experts
            )
        } else {
            String::new()
        };

        println!(
            "   {:>2} pts — {} ({:.1}%){}",
            pick.confidence_points,
            name,
            pick.win_probability * 100.0,
            experts
        );
    }

    if save {
        save_picks(&pool, season_year, week, &ranked).await?;
        println!("\n💾 Saved {} picks for week {}", ranked.len(), week);
    } else {
        println!("\n💡 Re-run with --save to store these picks");
    }
    Ok(())
}

async fn save_picks(
    pool: &sqlx::SqlitePool,
    season_year: i32,
    week: i32,
    ranked: &[RankedPick],
) -> Result<()> {
    for pick in ranked {
        let team = get_team(pool, pick.pick_team_id)
            .await?
            .with_context(|| format!("pick references unknown team {}", pick.pick_team_id))?;
        upsert_pick(
            pool,
            pick.game_id,
            season_year,
            week,
            &team.name,
            pick.confidence_points as i32,
            pick.win_probability,
            None,
        )
        .await?;
    }
    Ok(())
}

pub async fn score_week(season_year: i32, week: i32) -> Result<()> {
    let pool = create_pool().await?;
    init_database_with_pool(&pool).await?;

    println!("📊 Scoring {} week {}...", season_year, week);
    let analysis = analyzer::score_week(&pool, season_year, week).await?;

    if analysis.total_picks == 0 {
        println!("📭 No picks on completed games yet for this week");
        return Ok(());
    }

    println!(
        "✅ {}/{} picks correct ({:.1}%)",
        analysis.correct_picks,
        analysis.total_picks,
        analysis.accuracy * 100.0
    );
    if let Some(error) = analysis.avg_total_points_error {
        println!("   Avg total-points error: {:.1}", error);
    }
    Ok(())
}

pub async fn export_picks(
    season_year: i32,
    week: i32,
    format: &str,
    output: Option<&str>,
) -> Result<()> {
    let pool = create_pool().await?;
    init_database_with_pool(&pool).await?;

    let rows = export::collect_week_rows(&pool, season_year, week).await?;
    if rows.is_empty() {
        println!("📭 No picks stored for {} week {}", season_year, week);
        return Ok(());
    }

    let rendered = match format.to_lowercase().as_str() {
        "csv" => {
            let mut buf = Vec::new();
            export::write_csv(&rows, &mut buf)?;
            String::from_utf8(buf)?
        }
        "markdown" | "md" => export::render_markdown(&rows, season_year, week),
        other => anyhow::bail!("unsupported format '{}': use csv or markdown", other),
    };

    match output {
        Some(path) => {
            if let Some(parent) = Path::new(path).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            std::fs::write(path, &rendered)?;
            println!("✅ Wrote {} picks to {}", rows.len(), path);
        }
        None => {
            std::io::stdout().write_all(rendered.as_bytes())?;
        }
    }
    Ok(())
}

pub async fn standings(season_year: i32, week: i32) -> Result<()> {
    let pool = create_pool().await?;
    init_database_with_pool(&pool).await?;

    let summary = get_participant_weekly_summary(&pool, season_year, week).await?;
    if summary.is_empty() {
        println!("📭 No pool results for {} week {}. Run score-week after entering them.", season_year, week);
        return Ok(());
    }

    println!("🏆 Week {} standings ({}):\n", week, season_year);
    for (i, participant) in summary.iter().enumerate() {
        println!(
            "{:>2}. {:<20} {:>3} pts ({}/{} correct)",
            i + 1,
            participant.participant_name,
            participant.points_won,
            participant.correct_picks,
            participant.total_picks
        );
    }

    if let Some(analysis) = get_analysis_result(&pool, season_year, week).await? {
        println!(
            "\n🤖 Our picks: {}/{} correct ({:.1}%)",
            analysis.correct_picks,
            analysis.total_picks,
            analysis.accuracy * 100.0
        );
    }
    Ok(())
}

pub async fn train(current_season: i32, current_weight: f64, model_path: &str) -> Result<()> {
    let pool = create_pool().await?;
    init_database_with_pool(&pool).await?;

    println!("🧠 Extracting training rows...");
    let rows = training_rows(&pool).await?;
    if rows.is_empty() {
        println!("📭 No resolved picks to train on. Score some weeks first: pickem score-week");
        return Ok(());
    }

    let current = rows.iter().filter(|r| r.season_year == current_season).count();
    println!(
        "   {} resolved picks ({} from {}, weighted {}x)",
        rows.len(),
        current,
        current_season,
        current_weight
    );

    let config = TrainingConfig {
        current_season_weight_multiplier: current_weight,
        ..Default::default()
    };
    let model = LogisticModel::fit(&rows, current_season, &config)
        .context("training produced no model")?;

    if let Some(parent) = Path::new(model_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    model.save(model_path)?;
    println!("✅ Model written to {}", model_path);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{test_pool, upsert_game};
    use chrono::NaiveDate;

    #[tokio::test]
    async fn test_save_picks_round_trip() {
        let pool = test_pool().await;
        let dir = TeamDirectory::default();
        seed_teams(&pool, &dir).await.unwrap();

        let d = NaiveDate::from_ymd_opt(2025, 9, 21).unwrap();
        let game_id = upsert_game(&pool, &dir, 2025, 3, "Buffalo Bills", "Miami Dolphins",
            d, None, None).await.unwrap();
        let game = get_game(&pool, game_id).await.unwrap().unwrap();

        let ranked = vec![RankedPick {
            game_id,
            pick_team_id: game.home_team_id,
            win_probability: 0.72,
            confidence_points: 1,
        }];
        save_picks(&pool, 2025, 3, &ranked).await.unwrap();

        let picks = crate::db::get_picks_for_week(&pool, 2025, 3).await.unwrap();
        assert_eq!(picks.len(), 1);
        assert_eq!(picks[0].pick_team_id, game.home_team_id);
        assert_eq!(picks[0].confidence_points, 1);
    }
}
