//! Importer for the expert-picks-with-odds JSON files produced by the
//! scraping side of the house. The file carries one week: games, each with
//! a list of expert picks and an odds map keyed by team name.

use anyhow::{Context, Result};
use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::Deserialize;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::path::Path;

use crate::db::{insert_odds, mark_international_game, upsert_expert_pick, upsert_game};
use crate::teams::TeamDirectory;
use crate::utils::{american_to_probability, parse_american_odds, remove_vig};

#[derive(Debug, Deserialize)]
pub struct ExpertPicksFile {
    pub week: i32,
    pub season: i32,
    pub source: String,
    pub games: Vec<GameEntry>,
}

#[derive(Debug, Deserialize)]
pub struct GameEntry {
    #[allow(dead_code)]
    pub game: String,
    pub home_team: String,
    pub away_team: String,
    /// Optional "YYYY-MM-DD"; the week's nominal Sunday when absent.
    #[serde(default)]
    pub date: Option<String>,
    /// Set for London/Munich/Mexico City games.
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub expert_picks: Vec<ExpertPickEntry>,
    /// team name -> American odds string, e.g. "+120" / "-145"
    #[serde(default)]
    pub odds: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
pub struct ExpertPickEntry {
    #[serde(default)]
    pub expert: Option<String>,
    /// A team name, or the side indicators "home"/"away" some producers emit.
    pub pick: String,
    #[serde(default)]
    pub spread: Option<f64>,
    #[serde(default = "default_confidence")]
    pub confidence: i32,
}

fn default_confidence() -> i32 {
    10
}

#[derive(Debug, Default, PartialEq)]
pub struct ImportSummary {
    pub games: u32,
    pub skipped_games: u32,
    pub expert_picks: u32,
    pub odds_rows: u32,
}

/// The Sunday of a given NFL week, counting from the first Sunday on or
/// after September 5th. Good enough for files that omit per-game dates.
pub fn nominal_week_date(season_year: i32, week: i32) -> NaiveDate {
    let mut day = NaiveDate::from_ymd_opt(season_year, 9, 5)
        .unwrap_or_else(|| NaiveDate::from_ymd_opt(season_year, 9, 6).expect("valid date"));
    while day.weekday() != Weekday::Sun {
        day += Duration::days(1);
    }
    day + Duration::days(7 * (week as i64 - 1))
}

pub fn parse_file(json: &str) -> Result<ExpertPicksFile> {
    serde_json::from_str(json).context("malformed expert-picks JSON")
}

pub async fn import_path<P: AsRef<Path>>(
    pool: &SqlitePool,
    directory: &TeamDirectory,
    path: P,
) -> Result<ImportSummary> {
    let json = std::fs::read_to_string(path.as_ref())
        .with_context(|| format!("reading {}", path.as_ref().display()))?;
    let file = parse_file(&json)?;
    import(pool, directory, &file).await
}

pub async fn import(
    pool: &SqlitePool,
    directory: &TeamDirectory,
    file: &ExpertPicksFile,
) -> Result<ImportSummary> {
    let mut summary = ImportSummary::default();

    for entry in &file.games {
        if directory.should_skip_game(&entry.home_team, &entry.away_team) {
            tracing::warn!(
                "Skipping non-standard game: {} vs {}",
                entry.home_team,
                entry.away_team
            );
            summary.skipped_games += 1;
            continue;
        }

        let date = match &entry.date {
            Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .with_context(|| format!("bad game date '{}'", s))?,
            None => nominal_week_date(file.season, file.week),
        };

        let game_id = upsert_game(
            pool, directory, file.season, file.week,
            &entry.home_team, &entry.away_team, date, None, None,
        )
        .await?;
        summary.games += 1;

        if let Some(location) = &entry.location {
            mark_international_game(pool, game_id, location).await?;
        }

        summary.odds_rows += import_odds(pool, directory, entry, game_id, &file.source).await?;

        let home = directory.resolve(&entry.home_team);
        let away = directory.resolve(&entry.away_team);
        for (i, pick) in entry.expert_picks.iter().enumerate() {
            let pick_team = match pick.pick.to_lowercase().as_str() {
                "home" => home.clone(),
                "away" => away.clone(),
                _ => directory.resolve(&pick.pick),
            };
            let expert_name = pick
                .expert
                .clone()
                .unwrap_or_else(|| format!("{} expert {}", file.source, i + 1));
            upsert_expert_pick(pool, game_id, &expert_name, &pick_team, pick.spread, pick.confidence)
                .await?;
            summary.expert_picks += 1;
        }
    }

    tracing::info!(
        "Imported week {} from {}: {} games, {} expert picks, {} odds rows ({} skipped)",
        file.week,
        file.source,
        summary.games,
        summary.expert_picks,
        summary.odds_rows,
        summary.skipped_games
    );
    Ok(summary)
}

/// One snapshot row per game from the file's odds map, when both sides
/// parse. Unparseable odds degrade to "no odds", never an error.
async fn import_odds(
    pool: &SqlitePool,
    directory: &TeamDirectory,
    entry: &GameEntry,
    game_id: i64,
    source: &str,
) -> Result<u32> {
    let home = directory.resolve(&entry.home_team);
    let away = directory.resolve(&entry.away_team);

    let mut home_ml = None;
    let mut away_ml = None;
    for (team, odds_str) in &entry.odds {
        let resolved = directory.resolve(team);
        let Some(ml) = parse_american_odds(odds_str) else {
            tracing::warn!("Unparseable odds '{}' for {}", odds_str, team);
            continue;
        };
        if resolved == home {
            home_ml = Some(ml);
        } else if resolved == away {
            away_ml = Some(ml);
        }
    }

    if home_ml.is_none() && away_ml.is_none() {
        return Ok(0);
    }

    let (home_prob, away_prob) = match (home_ml, away_ml) {
        (Some(h), Some(a)) => {
            let (hp, ap) = remove_vig(american_to_probability(h), american_to_probability(a));
            (Some(hp), Some(ap))
        }
        _ => (None, None),
    };

    insert_odds(pool, game_id, source, home_ml, away_ml, None, home_prob, away_prob).await?;
    Ok(1)
}
