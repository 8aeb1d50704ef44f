pub mod seed;
pub use seed::seed_teams;

use anyhow::Result;
use chrono::{NaiveDate, Utc};
use sqlx::{sqlite::SqliteConnectOptions, Row, SqlitePool};
use std::env;
use std::str::FromStr;

use crate::errors::PoolError;
use crate::models::*;
use crate::teams::TeamDirectory;

pub async fn create_pool() -> Result<SqlitePool> {
    let database_url =
        env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite:data/pickem.db".to_string());

    // Strip the "sqlite:" prefix to get the file path, create parent dir if needed
    let file_path = database_url
        .strip_prefix("sqlite:///")
        .or_else(|| database_url.strip_prefix("sqlite://"))
        .or_else(|| database_url.strip_prefix("sqlite:"))
        .unwrap_or(&database_url);

    if let Some(parent) = std::path::Path::new(file_path).parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await.ok();
        }
    }

    let options = SqliteConnectOptions::from_str(&database_url)?.create_if_missing(true);

    let pool = SqlitePool::connect_with(options).await?;
    Ok(pool)
}

/// Called from the CLI where no pool exists yet.
pub async fn init_database() -> Result<()> {
    let pool = create_pool().await?;
    init_database_with_pool(&pool).await
}

/// Idempotent schema creation; safe to run before every workflow.
pub async fn init_database_with_pool(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS teams (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            abbreviation TEXT NOT NULL,
            conference TEXT NOT NULL,
            division TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS games (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            season_year INTEGER NOT NULL,
            week INTEGER NOT NULL,
            home_team_id INTEGER NOT NULL REFERENCES teams(id),
            away_team_id INTEGER NOT NULL REFERENCES teams(id),
            game_date TEXT NOT NULL,
            home_score INTEGER,
            away_score INTEGER,
            total_points INTEGER,
            margin INTEGER,
            winner_team_id INTEGER REFERENCES teams(id),
            is_completed INTEGER NOT NULL DEFAULT 0,
            is_international INTEGER NOT NULL DEFAULT 0,
            stadium_type TEXT,
            UNIQUE(season_year, week, home_team_id, away_team_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Append-only: one row per bookmaker per fetch, no natural key.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS odds (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            game_id INTEGER NOT NULL REFERENCES games(id),
            bookmaker TEXT NOT NULL,
            home_moneyline INTEGER,
            away_moneyline INTEGER,
            total_points_line REAL,
            home_win_probability REAL,
            away_win_probability REAL,
            fetched_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Natural-key unique so re-running a generator updates in place instead
    // of duplicating the week.
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS picks (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            game_id INTEGER NOT NULL REFERENCES games(id),
            season_year INTEGER NOT NULL,
            week INTEGER NOT NULL,
            pick_team_id INTEGER NOT NULL REFERENCES teams(id),
            confidence_points INTEGER NOT NULL,
            win_probability REAL NOT NULL,
            total_points_prediction REAL,
            is_correct INTEGER,
            UNIQUE(season_year, week, game_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS expert_picks (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            game_id INTEGER NOT NULL REFERENCES games(id),
            expert_name TEXT NOT NULL,
            pick_team_id INTEGER NOT NULL REFERENCES teams(id),
            spread REAL,
            result TEXT,
            confidence INTEGER NOT NULL DEFAULT 10,
            UNIQUE(game_id, expert_name)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS pool_results (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            season_year INTEGER NOT NULL,
            week INTEGER NOT NULL,
            participant_name TEXT NOT NULL,
            game_id INTEGER NOT NULL REFERENCES games(id),
            pick_team_id INTEGER REFERENCES teams(id),
            confidence_points INTEGER,
            is_correct INTEGER,
            total_weekly_score INTEGER,
            weekly_rank INTEGER,
            UNIQUE(season_year, week, participant_name, game_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS analysis_results (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            season_year INTEGER NOT NULL,
            week INTEGER NOT NULL,
            total_picks INTEGER NOT NULL,
            correct_picks INTEGER NOT NULL,
            accuracy REAL NOT NULL,
            avg_total_points_error REAL,
            UNIQUE(season_year, week)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS confidence_accuracy (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            season_year INTEGER NOT NULL,
            week INTEGER NOT NULL,
            confidence_points INTEGER NOT NULL,
            total_picks INTEGER NOT NULL,
            correct_picks INTEGER NOT NULL,
            accuracy REAL NOT NULL,
            UNIQUE(season_year, week, confidence_points)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS home_field_advantage (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            team_id INTEGER NOT NULL REFERENCES teams(id),
            season_year INTEGER NOT NULL,
            rating REAL NOT NULL,
            games_sampled INTEGER NOT NULL DEFAULT 0,
            UNIQUE(team_id, season_year)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS international_games (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            game_id INTEGER NOT NULL UNIQUE REFERENCES games(id),
            location TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // odds_fetch_log: tracks last successful API call to avoid burning quota
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS odds_fetch_log (
            sport_key TEXT PRIMARY KEY,
            last_fetched TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_games_week ON games(season_year, week)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_odds_game ON odds(game_id)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_expert_picks_game ON expert_picks(game_id)")
        .execute(pool)
        .await?;

    tracing::info!("Database initialized successfully");
    Ok(())
}

// ── Row mapping ───────────────────────────────────────────────────────────────

fn team_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Team> {
    let conference: String = row.get("conference");
    let division: String = row.get("division");
    Ok(Team {
        id: row.get("id"),
        name: row.get("name"),
        abbreviation: row.get("abbreviation"),
        conference: Conference::parse(&conference)
            .ok_or_else(|| anyhow::anyhow!("bad conference value '{}'", conference))?,
        division: Division::parse(&division)
            .ok_or_else(|| anyhow::anyhow!("bad division value '{}'", division))?,
    })
}

fn game_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Game> {
    let date: String = row.get("game_date");
    Ok(Game {
        id: row.get("id"),
        season_year: row.get("season_year"),
        week: row.get("week"),
        home_team_id: row.get("home_team_id"),
        away_team_id: row.get("away_team_id"),
        game_date: NaiveDate::parse_from_str(&date, "%Y-%m-%d")?,
        home_score: row.get("home_score"),
        away_score: row.get("away_score"),
        total_points: row.get("total_points"),
        margin: row.get("margin"),
        winner_team_id: row.get("winner_team_id"),
        is_completed: row.get("is_completed"),
        is_international: row.get("is_international"),
        stadium_type: row.get("stadium_type"),
    })
}

fn pick_from_row(row: &sqlx::sqlite::SqliteRow) -> Pick {
    Pick {
        id: row.get("id"),
        game_id: row.get("game_id"),
        season_year: row.get("season_year"),
        week: row.get("week"),
        pick_team_id: row.get("pick_team_id"),
        confidence_points: row.get("confidence_points"),
        win_probability: row.get("win_probability"),
        total_points_prediction: row.get("total_points_prediction"),
        is_correct: row.get("is_correct"),
    }
}

fn expert_pick_from_row(row: &sqlx::sqlite::SqliteRow) -> ExpertPick {
    let result: Option<String> = row.get("result");
    ExpertPick {
        id: row.get("id"),
        game_id: row.get("game_id"),
        expert_name: row.get("expert_name"),
        pick_team_id: row.get("pick_team_id"),
        spread: row.get("spread"),
        result: result.as_deref().and_then(ExpertPickResult::parse),
        confidence: row.get("confidence"),
    }
}

fn pool_result_from_row(row: &sqlx::sqlite::SqliteRow) -> PoolResult {
    PoolResult {
        id: row.get("id"),
        season_year: row.get("season_year"),
        week: row.get("week"),
        participant_name: row.get("participant_name"),
        game_id: row.get("game_id"),
        pick_team_id: row.get("pick_team_id"),
        confidence_points: row.get("confidence_points"),
        is_correct: row.get("is_correct"),
        total_weekly_score: row.get("total_weekly_score"),
        weekly_rank: row.get("weekly_rank"),
    }
}

fn odds_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<OddsSnapshot> {
    let fetched: String = row.get("fetched_at");
    Ok(OddsSnapshot {
        id: row.get("id"),
        game_id: row.get("game_id"),
        bookmaker: row.get("bookmaker"),
        home_moneyline: row.get("home_moneyline"),
        away_moneyline: row.get("away_moneyline"),
        total_points_line: row.get("total_points_line"),
        home_win_probability: row.get("home_win_probability"),
        away_win_probability: row.get("away_win_probability"),
        fetched_at: chrono::DateTime::parse_from_rfc3339(&fetched)?.with_timezone(&Utc),
    })
}

// ── Team operations ───────────────────────────────────────────────────────────

pub async fn upsert_team(
    pool: &SqlitePool,
    name: &str,
    abbreviation: &str,
    conference: Conference,
    division: Division,
) -> Result<i64> {
    sqlx::query(
        r#"
        INSERT INTO teams (name, abbreviation, conference, division)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(name) DO UPDATE SET
            abbreviation = excluded.abbreviation,
            conference = excluded.conference,
            division = excluded.division
        "#,
    )
    .bind(name)
    .bind(abbreviation)
    .bind(conference.as_str())
    .bind(division.as_str())
    .execute(pool)
    .await?;

    let id: i64 = sqlx::query_scalar("SELECT id FROM teams WHERE name = ?")
        .bind(name)
        .fetch_one(pool)
        .await?;
    Ok(id)
}

/// Exact-name lookup only; callers pre-resolve via the TeamDirectory.
pub async fn get_team_id(pool: &SqlitePool, name: &str) -> Result<Option<i64>> {
    let id = sqlx::query_scalar("SELECT id FROM teams WHERE name = ?")
        .bind(name)
        .fetch_optional(pool)
        .await?;
    Ok(id)
}

pub async fn get_team(pool: &SqlitePool, team_id: i64) -> Result<Option<Team>> {
    let row = sqlx::query("SELECT * FROM teams WHERE id = ?")
        .bind(team_id)
        .fetch_optional(pool)
        .await?;
    row.map(|r| team_from_row(&r)).transpose()
}

pub async fn get_all_teams(pool: &SqlitePool) -> Result<Vec<Team>> {
    let rows = sqlx::query("SELECT * FROM teams ORDER BY conference, division, name")
        .fetch_all(pool)
        .await?;
    rows.iter().map(team_from_row).collect()
}

/// Resolve a name through the directory and return the stored team id,
/// auto-creating the row for a valid-but-unseen team.
async fn resolve_team_id(
    pool: &SqlitePool,
    directory: &TeamDirectory,
    name: &str,
) -> Result<Option<i64>> {
    let canonical = directory.resolve(name);
    if let Some(id) = get_team_id(pool, &canonical).await? {
        return Ok(Some(id));
    }
    if let Some(info) = directory.team_info(&canonical) {
        let id = upsert_team(pool, info.name, info.abbreviation, info.conference, info.division)
            .await?;
        return Ok(Some(id));
    }
    Ok(None)
}

// ── Game operations ───────────────────────────────────────────────────────────

/// Result fields only move forward: a scoreless re-upsert (a picks file
/// re-imported after the game finished) keeps the recorded final instead of
/// wiping it.
#[allow(clippy::too_many_arguments)]
pub async fn upsert_game(
    pool: &SqlitePool,
    directory: &TeamDirectory,
    season_year: i32,
    week: i32,
    home_name: &str,
    away_name: &str,
    game_date: NaiveDate,
    home_score: Option<i32>,
    away_score: Option<i32>,
) -> Result<i64> {
    if directory.should_skip_game(home_name, away_name) {
        return Err(PoolError::InvalidGame {
            home: home_name.to_string(),
            away: away_name.to_string(),
        }
        .into());
    }

    // should_skip_game passed, so both sides resolve to canonical teams
    let home_id = resolve_team_id(pool, directory, home_name)
        .await?
        .ok_or_else(|| PoolError::TeamNotFound(home_name.to_string()))?;
    let away_id = resolve_team_id(pool, directory, away_name)
        .await?
        .ok_or_else(|| PoolError::TeamNotFound(away_name.to_string()))?;

    let (total_points, margin, winner, is_completed) =
        derive_game_result(home_id, away_id, home_score, away_score);

    sqlx::query(
        r#"
        INSERT INTO games
            (season_year, week, home_team_id, away_team_id, game_date,
             home_score, away_score, total_points, margin, winner_team_id, is_completed)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(season_year, week, home_team_id, away_team_id) DO UPDATE SET
            game_date = excluded.game_date,
            home_score = CASE WHEN excluded.is_completed THEN excluded.home_score ELSE home_score END,
            away_score = CASE WHEN excluded.is_completed THEN excluded.away_score ELSE away_score END,
            total_points = CASE WHEN excluded.is_completed THEN excluded.total_points ELSE total_points END,
            margin = CASE WHEN excluded.is_completed THEN excluded.margin ELSE margin END,
            winner_team_id = CASE WHEN excluded.is_completed THEN excluded.winner_team_id ELSE winner_team_id END,
            is_completed = CASE WHEN excluded.is_completed THEN 1 ELSE is_completed END
        "#,
    )
    .bind(season_year)
    .bind(week)
    .bind(home_id)
    .bind(away_id)
    .bind(game_date.format("%Y-%m-%d").to_string())
    .bind(home_score)
    .bind(away_score)
    .bind(total_points)
    .bind(margin)
    .bind(winner)
    .bind(is_completed)
    .execute(pool)
    .await?;

    let id: i64 = sqlx::query_scalar(
        "SELECT id FROM games WHERE season_year = ? AND week = ? AND home_team_id = ? AND away_team_id = ?",
    )
    .bind(season_year)
    .bind(week)
    .bind(home_id)
    .bind(away_id)
    .fetch_one(pool)
    .await?;
    Ok(id)
}

/// Exact lookup by natural key; no auto-create on the read path.
pub async fn get_game_id(
    pool: &SqlitePool,
    season_year: i32,
    week: i32,
    home_name: &str,
    away_name: &str,
) -> Result<Option<i64>> {
    let Some(home_id) = get_team_id(pool, home_name).await? else {
        return Ok(None);
    };
    let Some(away_id) = get_team_id(pool, away_name).await? else {
        return Ok(None);
    };

    let id = sqlx::query_scalar(
        "SELECT id FROM games WHERE season_year = ? AND week = ? AND home_team_id = ? AND away_team_id = ?",
    )
    .bind(season_year)
    .bind(week)
    .bind(home_id)
    .bind(away_id)
    .fetch_optional(pool)
    .await?;
    Ok(id)
}

pub async fn get_game(pool: &SqlitePool, game_id: i64) -> Result<Option<Game>> {
    let row = sqlx::query("SELECT * FROM games WHERE id = ?")
        .bind(game_id)
        .fetch_optional(pool)
        .await?;
    row.map(|r| game_from_row(&r)).transpose()
}

pub async fn get_games_for_week(
    pool: &SqlitePool,
    season_year: i32,
    week: i32,
) -> Result<Vec<Game>> {
    let rows = sqlx::query(
        "SELECT * FROM games WHERE season_year = ? AND week = ? ORDER BY game_date, id",
    )
    .bind(season_year)
    .bind(week)
    .fetch_all(pool)
    .await?;
    rows.iter().map(game_from_row).collect()
}

pub async fn mark_international_game(
    pool: &SqlitePool,
    game_id: i64,
    location: &str,
) -> Result<()> {
    sqlx::query(
        r#"INSERT INTO international_games (game_id, location) VALUES (?, ?)
           ON CONFLICT(game_id) DO UPDATE SET location = excluded.location"#,
    )
    .bind(game_id)
    .bind(location)
    .execute(pool)
    .await?;

    sqlx::query("UPDATE games SET is_international = 1 WHERE id = ?")
        .bind(game_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn upsert_home_field_advantage(
    pool: &SqlitePool,
    team_id: i64,
    season_year: i32,
    rating: f64,
    games_sampled: i64,
) -> Result<()> {
    sqlx::query(
        r#"INSERT INTO home_field_advantage (team_id, season_year, rating, games_sampled)
           VALUES (?, ?, ?, ?)
           ON CONFLICT(team_id, season_year) DO UPDATE SET
               rating = excluded.rating,
               games_sampled = excluded.games_sampled"#,
    )
    .bind(team_id)
    .bind(season_year)
    .bind(rating)
    .bind(games_sampled)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get_home_field_advantage(
    pool: &SqlitePool,
    team_id: i64,
    season_year: i32,
) -> Result<Option<f64>> {
    let rating = sqlx::query_scalar(
        "SELECT rating FROM home_field_advantage WHERE team_id = ? AND season_year = ?",
    )
    .bind(team_id)
    .bind(season_year)
    .fetch_optional(pool)
    .await?;
    Ok(rating)
}

// ── Odds operations ───────────────────────────────────────────────────────────

#[allow(clippy::too_many_arguments)]
pub async fn insert_odds(
    pool: &SqlitePool,
    game_id: i64,
    bookmaker: &str,
    home_moneyline: Option<i32>,
    away_moneyline: Option<i32>,
    total_points_line: Option<f64>,
    home_win_probability: Option<f64>,
    away_win_probability: Option<f64>,
) -> Result<i64> {
    let result = sqlx::query(
        r#"
        INSERT INTO odds
            (game_id, bookmaker, home_moneyline, away_moneyline, total_points_line,
             home_win_probability, away_win_probability, fetched_at)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(game_id)
    .bind(bookmaker)
    .bind(home_moneyline)
    .bind(away_moneyline)
    .bind(total_points_line)
    .bind(home_win_probability)
    .bind(away_win_probability)
    .bind(Utc::now().to_rfc3339())
    .execute(pool)
    .await?;
    Ok(result.last_insert_rowid())
}

pub async fn latest_odds_for_game(
    pool: &SqlitePool,
    game_id: i64,
) -> Result<Option<OddsSnapshot>> {
    let row = sqlx::query(
        "SELECT * FROM odds WHERE game_id = ? ORDER BY fetched_at DESC, id DESC LIMIT 1",
    )
    .bind(game_id)
    .fetch_optional(pool)
    .await?;
    row.map(|r| odds_from_row(&r)).transpose()
}

// ── Pick operations ───────────────────────────────────────────────────────────

/// Upsert by (season_year, week, game_id): re-generating a week replaces its
/// picks in place and resets correctness for re-scoring.
#[allow(clippy::too_many_arguments)]
pub async fn upsert_pick(
    pool: &SqlitePool,
    game_id: i64,
    season_year: i32,
    week: i32,
    pick_team_name: &str,
    confidence_points: i32,
    win_probability: f64,
    total_points_prediction: Option<f64>,
) -> Result<i64> {
    let team_id = get_team_id(pool, pick_team_name)
        .await?
        .ok_or_else(|| PoolError::TeamNotFound(pick_team_name.to_string()))?;

    sqlx::query(
        r#"
        INSERT INTO picks
            (game_id, season_year, week, pick_team_id, confidence_points,
             win_probability, total_points_prediction, is_correct)
        VALUES (?, ?, ?, ?, ?, ?, ?, NULL)
        ON CONFLICT(season_year, week, game_id) DO UPDATE SET
            pick_team_id = excluded.pick_team_id,
            confidence_points = excluded.confidence_points,
            win_probability = excluded.win_probability,
            total_points_prediction = excluded.total_points_prediction,
            is_correct = NULL
        "#,
    )
    .bind(game_id)
    .bind(season_year)
    .bind(week)
    .bind(team_id)
    .bind(confidence_points)
    .bind(win_probability)
    .bind(total_points_prediction)
    .execute(pool)
    .await?;

    let id: i64 = sqlx::query_scalar(
        "SELECT id FROM picks WHERE season_year = ? AND week = ? AND game_id = ?",
    )
    .bind(season_year)
    .bind(week)
    .bind(game_id)
    .fetch_one(pool)
    .await?;
    Ok(id)
}

pub async fn update_pick_result(pool: &SqlitePool, pick_id: i64, is_correct: bool) -> Result<()> {
    sqlx::query("UPDATE picks SET is_correct = ? WHERE id = ?")
        .bind(is_correct)
        .bind(pick_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn get_picks_for_week(
    pool: &SqlitePool,
    season_year: i32,
    week: i32,
) -> Result<Vec<Pick>> {
    let rows = sqlx::query(
        "SELECT * FROM picks WHERE season_year = ? AND week = ? ORDER BY confidence_points DESC",
    )
    .bind(season_year)
    .bind(week)
    .fetch_all(pool)
    .await?;
    Ok(rows.iter().map(pick_from_row).collect())
}

// ── Expert pick operations ────────────────────────────────────────────────────

/// One row per (game, expert): re-importing a picks file replaces the
/// expert's pick in place and clears its result so the next scoring pass
/// re-derives it.
pub async fn upsert_expert_pick(
    pool: &SqlitePool,
    game_id: i64,
    expert_name: &str,
    pick_team_name: &str,
    spread: Option<f64>,
    confidence: i32,
) -> Result<i64> {
    let team_id = get_team_id(pool, pick_team_name)
        .await?
        .ok_or_else(|| PoolError::TeamNotFound(pick_team_name.to_string()))?;

    sqlx::query(
        r#"
        INSERT INTO expert_picks (game_id, expert_name, pick_team_id, spread, confidence)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(game_id, expert_name) DO UPDATE SET
            pick_team_id = excluded.pick_team_id,
            spread = excluded.spread,
            confidence = excluded.confidence,
            result = NULL
        "#,
    )
    .bind(game_id)
    .bind(expert_name)
    .bind(team_id)
    .bind(spread)
    .bind(confidence)
    .execute(pool)
    .await?;

    let id: i64 =
        sqlx::query_scalar("SELECT id FROM expert_picks WHERE game_id = ? AND expert_name = ?")
            .bind(game_id)
            .bind(expert_name)
            .fetch_one(pool)
            .await?;
    Ok(id)
}

pub async fn update_expert_pick_result(
    pool: &SqlitePool,
    expert_pick_id: i64,
    result: ExpertPickResult,
) -> Result<()> {
    sqlx::query("UPDATE expert_picks SET result = ? WHERE id = ?")
        .bind(result.as_str())
        .bind(expert_pick_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn get_expert_picks_for_game(
    pool: &SqlitePool,
    game_id: i64,
) -> Result<Vec<ExpertPick>> {
    let rows = sqlx::query("SELECT * FROM expert_picks WHERE game_id = ? ORDER BY expert_name")
        .bind(game_id)
        .fetch_all(pool)
        .await?;
    Ok(rows.iter().map(expert_pick_from_row).collect())
}

/// Plurality pick among all experts for the game. Zero expert picks is a
/// "no data" condition: an empty consensus, never an error.
pub async fn get_expert_consensus(pool: &SqlitePool, game_id: i64) -> Result<ExpertConsensus> {
    let rows = sqlx::query(
        r#"
        SELECT pick_team_id, COUNT(*) AS votes
        FROM expert_picks
        WHERE game_id = ?
        GROUP BY pick_team_id
        ORDER BY votes DESC, pick_team_id ASC
        "#,
    )
    .bind(game_id)
    .fetch_all(pool)
    .await?;

    if rows.is_empty() {
        return Ok(ExpertConsensus::empty());
    }

    let breakdown: Vec<TeamVote> = rows
        .iter()
        .map(|r| TeamVote {
            team_id: r.get("pick_team_id"),
            votes: r.get("votes"),
        })
        .collect();
    let total: i64 = breakdown.iter().map(|v| v.votes).sum();
    let top = &breakdown[0];

    Ok(ExpertConsensus {
        consensus_team_id: Some(top.team_id),
        consensus_count: top.votes,
        total_experts: total,
        consensus_percentage: top.votes as f64 / total as f64,
        pick_breakdown: breakdown,
    })
}

// ── Pool result operations ────────────────────────────────────────────────────

#[allow(clippy::too_many_arguments)]
pub async fn upsert_pool_result(
    pool: &SqlitePool,
    season_year: i32,
    week: i32,
    participant_name: &str,
    game_id: i64,
    pick_team_id: Option<i64>,
    confidence_points: Option<i32>,
) -> Result<i64> {
    sqlx::query(
        r#"
        INSERT INTO pool_results
            (season_year, week, participant_name, game_id, pick_team_id, confidence_points)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT(season_year, week, participant_name, game_id) DO UPDATE SET
            pick_team_id = excluded.pick_team_id,
            confidence_points = excluded.confidence_points,
            is_correct = NULL
        "#,
    )
    .bind(season_year)
    .bind(week)
    .bind(participant_name)
    .bind(game_id)
    .bind(pick_team_id)
    .bind(confidence_points)
    .execute(pool)
    .await?;

    let id: i64 = sqlx::query_scalar(
        "SELECT id FROM pool_results WHERE season_year = ? AND week = ? AND participant_name = ? AND game_id = ?",
    )
    .bind(season_year)
    .bind(week)
    .bind(participant_name)
    .bind(game_id)
    .fetch_one(pool)
    .await?;
    Ok(id)
}

pub async fn update_pool_result_outcome(
    pool: &SqlitePool,
    pool_result_id: i64,
    is_correct: Option<bool>,
    total_weekly_score: i32,
    weekly_rank: i32,
) -> Result<()> {
    sqlx::query(
        "UPDATE pool_results SET is_correct = ?, total_weekly_score = ?, weekly_rank = ? WHERE id = ?",
    )
    .bind(is_correct)
    .bind(total_weekly_score)
    .bind(weekly_rank)
    .bind(pool_result_id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get_pool_results_for_week(
    pool: &SqlitePool,
    season_year: i32,
    week: i32,
) -> Result<Vec<PoolResult>> {
    let rows = sqlx::query(
        "SELECT * FROM pool_results WHERE season_year = ? AND week = ? ORDER BY participant_name, confidence_points DESC",
    )
    .bind(season_year)
    .bind(week)
    .fetch_all(pool)
    .await?;
    Ok(rows.iter().map(pool_result_from_row).collect())
}

/// Participants ranked by confidence points won, best first.
pub async fn get_participant_weekly_summary(
    pool: &SqlitePool,
    season_year: i32,
    week: i32,
) -> Result<Vec<ParticipantSummary>> {
    let rows = sqlx::query(
        r#"
        SELECT participant_name,
               COUNT(*) AS total_picks,
               COALESCE(SUM(CASE WHEN is_correct = 1 THEN 1 ELSE 0 END), 0) AS correct_picks,
               COALESCE(SUM(CASE WHEN is_correct = 1 THEN confidence_points ELSE 0 END), 0) AS points_won
        FROM pool_results
        WHERE season_year = ? AND week = ?
        GROUP BY participant_name
        ORDER BY points_won DESC, correct_picks DESC, participant_name ASC
        "#,
    )
    .bind(season_year)
    .bind(week)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|r| ParticipantSummary {
            participant_name: r.get("participant_name"),
            total_picks: r.get("total_picks"),
            correct_picks: r.get("correct_picks"),
            points_won: r.get("points_won"),
        })
        .collect())
}

// ── Analysis rollups ──────────────────────────────────────────────────────────

pub async fn upsert_analysis_result(pool: &SqlitePool, analysis: &WeeklyAnalysis) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO analysis_results
            (season_year, week, total_picks, correct_picks, accuracy, avg_total_points_error)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT(season_year, week) DO UPDATE SET
            total_picks = excluded.total_picks,
            correct_picks = excluded.correct_picks,
            accuracy = excluded.accuracy,
            avg_total_points_error = excluded.avg_total_points_error
        "#,
    )
    .bind(analysis.season_year)
    .bind(analysis.week)
    .bind(analysis.total_picks)
    .bind(analysis.correct_picks)
    .bind(analysis.accuracy)
    .bind(analysis.avg_total_points_error)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get_analysis_result(
    pool: &SqlitePool,
    season_year: i32,
    week: i32,
) -> Result<Option<WeeklyAnalysis>> {
    let row = sqlx::query("SELECT * FROM analysis_results WHERE season_year = ? AND week = ?")
        .bind(season_year)
        .bind(week)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|r| WeeklyAnalysis {
        season_year: r.get("season_year"),
        week: r.get("week"),
        total_picks: r.get("total_picks"),
        correct_picks: r.get("correct_picks"),
        accuracy: r.get("accuracy"),
        avg_total_points_error: r.get("avg_total_points_error"),
    }))
}

pub async fn upsert_confidence_accuracy(
    pool: &SqlitePool,
    entry: &ConfidenceAccuracy,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO confidence_accuracy
            (season_year, week, confidence_points, total_picks, correct_picks, accuracy)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT(season_year, week, confidence_points) DO UPDATE SET
            total_picks = excluded.total_picks,
            correct_picks = excluded.correct_picks,
            accuracy = excluded.accuracy
        "#,
    )
    .bind(entry.season_year)
    .bind(entry.week)
    .bind(entry.confidence_points)
    .bind(entry.total_picks)
    .bind(entry.correct_picks)
    .bind(entry.accuracy)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get_confidence_accuracy_for_season(
    pool: &SqlitePool,
    season_year: i32,
) -> Result<Vec<ConfidenceAccuracy>> {
    let rows = sqlx::query(
        "SELECT * FROM confidence_accuracy WHERE season_year = ? ORDER BY week, confidence_points DESC",
    )
    .bind(season_year)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|r| ConfidenceAccuracy {
            season_year: r.get("season_year"),
            week: r.get("week"),
            confidence_points: r.get("confidence_points"),
            total_picks: r.get("total_picks"),
            correct_picks: r.get("correct_picks"),
            accuracy: r.get("accuracy"),
        })
        .collect())
}

// ── Training-set extraction ───────────────────────────────────────────────────

/// Resolved picks joined with their game and most recent odds snapshot.
/// Only rows where `is_correct` is known are usable as labels.
pub async fn training_rows(pool: &SqlitePool) -> Result<Vec<TrainingRow>> {
    let rows = sqlx::query(
        r#"
        SELECT p.season_year, p.week, g.home_team_id, g.away_team_id,
               p.pick_team_id, p.win_probability, p.is_correct,
               o.home_moneyline, o.away_moneyline, o.total_points_line
        FROM picks p
        JOIN games g ON g.id = p.game_id
        LEFT JOIN odds o ON o.id = (
            SELECT id FROM odds WHERE game_id = g.id
            ORDER BY fetched_at DESC, id DESC LIMIT 1
        )
        WHERE p.is_correct IS NOT NULL
        ORDER BY p.season_year, p.week
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|r| TrainingRow {
            season_year: r.get("season_year"),
            week: r.get("week"),
            home_team_id: r.get("home_team_id"),
            away_team_id: r.get("away_team_id"),
            pick_team_id: r.get("pick_team_id"),
            home_moneyline: r.get("home_moneyline"),
            away_moneyline: r.get("away_moneyline"),
            total_points_line: r.get("total_points_line"),
            win_probability: r.get("win_probability"),
            is_correct: r.get("is_correct"),
        })
        .collect())
}

#[cfg(test)]
pub(crate) async fn test_pool() -> SqlitePool {
    use sqlx::sqlite::SqlitePoolOptions;

    // One connection only: each in-memory SQLite connection is its own db.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory pool");
    init_database_with_pool(&pool).await.expect("schema");
    pool
}
