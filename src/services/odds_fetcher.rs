//! Fetches live NFL odds from The Odds API and appends them to the `odds`
//! table, one snapshot row per bookmaker per fetch.
//!
//! ## Credit budget (500 free req / month)
//! Each `refresh_odds_if_stale` call consumes at most **1 API request** and
//! skips entirely when the last successful fetch was < 12 hours ago, so the
//! worst case is ~60 req/month.

use anyhow::Result;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Deserialize;
use sqlx::SqlitePool;
use std::collections::HashMap;

use crate::db::{get_games_for_week, get_team, insert_odds};
use crate::models::Game;
use crate::teams::TeamDirectory;

const SPORT_KEY: &str = "americanfootball_nfl";

// ── Odds API response types ───────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct OddsEvent {
    #[allow(dead_code)]
    id: String,
    commence_time: DateTime<Utc>,
    home_team: String,
    away_team: String,
    bookmakers: Vec<Bookmaker>,
}

#[derive(Debug, Deserialize)]
struct Bookmaker {
    #[allow(dead_code)]
    key: String,
    title: String,
    markets: Vec<Market>,
}

#[derive(Debug, Deserialize)]
struct Market {
    key: String,
    outcomes: Vec<Outcome>,
}

#[derive(Debug, Deserialize)]
struct Outcome {
    name: String,
    price: f64,
    point: Option<f64>,
}

// ── Public entry point ────────────────────────────────────────────────────────

/// Refresh NFL odds for one week's stored games if stale. Returns the number
/// of snapshot rows appended. A failed fetch is reported and the run simply
/// stores nothing new.
pub async fn refresh_odds_if_stale(
    pool: &SqlitePool,
    directory: &TeamDirectory,
    api_key: &str,
    season_year: i32,
    week: i32,
) -> u32 {
    if !is_stale(pool).await {
        tracing::debug!("Odds: fetch skipped, last pull < 12h ago");
        return 0;
    }

    match fetch_week(pool, directory, api_key, season_year, week).await {
        Ok(n) => {
            tracing::info!("Odds: {} bookmaker snapshots stored", n);
            mark_fetched(pool).await;
            n
        }
        Err(e) => {
            tracing::error!("Odds fetch failed: {}", e);
            0
        }
    }
}

// ── Internal helpers ──────────────────────────────────────────────────────────

/// Returns true if we haven't fetched in the last 12 hours.
async fn is_stale(pool: &SqlitePool) -> bool {
    let last: Option<String> =
        sqlx::query_scalar("SELECT last_fetched FROM odds_fetch_log WHERE sport_key = ?")
            .bind(SPORT_KEY)
            .fetch_optional(pool)
            .await
            .ok()
            .flatten();

    match last {
        None => true,
        Some(ts) => {
            let fetched = DateTime::parse_from_rfc3339(&ts)
                .map(|d| d.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now() - Duration::hours(25));
            Utc::now().signed_duration_since(fetched) > Duration::hours(12)
        }
    }
}

async fn mark_fetched(pool: &SqlitePool) {
    let now = Utc::now().to_rfc3339();
    let _ = sqlx::query(
        "INSERT OR REPLACE INTO odds_fetch_log (sport_key, last_fetched) VALUES (?, ?)",
    )
    .bind(SPORT_KEY)
    .bind(&now)
    .execute(pool)
    .await;
}

async fn fetch_week(
    pool: &SqlitePool,
    directory: &TeamDirectory,
    api_key: &str,
    season_year: i32,
    week: i32,
) -> Result<u32> {
    let games = get_games_for_week(pool, season_year, week).await?;
    if games.is_empty() {
        tracing::warn!("Odds: no stored games for {} week {}", season_year, week);
        return Ok(0);
    }
    let lookup = game_lookup(pool, &games).await?;

    let url = format!(
        "https://api.the-odds-api.com/v4/sports/{}/odds/\
         ?apiKey={}&regions=us&markets=h2h,totals&oddsFormat=american&dateFormat=iso",
        SPORT_KEY, api_key
    );

    let client = reqwest::Client::new();
    let resp = client
        .get(&url)
        .timeout(std::time::Duration::from_secs(10))
        .send()
        .await?;

    let status = resp.status();
    if status == 401 {
        return Err(anyhow::anyhow!("Odds API: invalid API key (401)"));
    }
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(anyhow::anyhow!("Odds API HTTP {}: {}", status, body));
    }

    let events: Vec<OddsEvent> = resp.json().await?;
    let mut appended = 0u32;

    for event in &events {
        let Some(game_id) = match_event(
            directory,
            &lookup,
            &event.home_team,
            &event.away_team,
            event.commence_time.date_naive(),
        ) else {
            tracing::debug!(
                "Odds: no stored game for {} vs {} at {}",
                event.home_team,
                event.away_team,
                event.commence_time
            );
            continue;
        };

        for bookmaker in &event.bookmakers {
            let Some((home_ml, away_ml, total_line)) = extract_snapshot(bookmaker, event) else {
                continue;
            };
            let home_prob = home_ml.map(crate::utils::american_to_probability);
            let away_prob = away_ml.map(crate::utils::american_to_probability);
            let (home_prob, away_prob) = match (home_prob, away_prob) {
                (Some(h), Some(a)) => {
                    let (h, a) = crate::utils::remove_vig(h, a);
                    (Some(h), Some(a))
                }
                other => other,
            };

            match insert_odds(
                pool, game_id, &bookmaker.title, home_ml, away_ml, total_line,
                home_prob, away_prob,
            )
            .await
            {
                Ok(_) => appended += 1,
                Err(e) => tracing::error!("Odds insert failed for game {}: {}", game_id, e),
            }
        }
    }

    Ok(appended)
}

/// (canonical home name, canonical away name) -> (game id, game date) for
/// the week.
async fn game_lookup(
    pool: &SqlitePool,
    games: &[Game],
) -> Result<HashMap<(String, String), (i64, NaiveDate)>> {
    let mut lookup = HashMap::new();
    for game in games {
        let home = get_team(pool, game.home_team_id).await?;
        let away = get_team(pool, game.away_team_id).await?;
        if let (Some(home), Some(away)) = (home, away) {
            lookup.insert((home.name, away.name), (game.id, game.game_date));
        }
    }
    Ok(lookup)
}

/// Resolve the feed's names through the directory, then fall back to fuzzy
/// matching for spelling drift between feeds. The event's kickoff date must
/// land within a few days of the stored game date so a feed spanning two
/// weeks cannot cross-match.
fn match_event(
    directory: &TeamDirectory,
    lookup: &HashMap<(String, String), (i64, NaiveDate)>,
    home_team: &str,
    away_team: &str,
    event_date: NaiveDate,
) -> Option<i64> {
    let in_window = |game_date: NaiveDate| (event_date - game_date).num_days().abs() <= 3;

    let home = directory.resolve(home_team);
    let away = directory.resolve(away_team);
    if let Some(&(id, game_date)) = lookup.get(&(home.clone(), away.clone())) {
        if in_window(game_date) {
            return Some(id);
        }
        return None;
    }

    lookup
        .iter()
        .filter_map(|((h, a), &(id, game_date))| {
            if !in_window(game_date) {
                return None;
            }
            let score = strsim::jaro_winkler(&home.to_lowercase(), &h.to_lowercase())
                .min(strsim::jaro_winkler(&away.to_lowercase(), &a.to_lowercase()));
            if score > 0.88 {
                Some((id, score))
            } else {
                None
            }
        })
        .max_by(|x, y| x.1.partial_cmp(&y.1).unwrap_or(std::cmp::Ordering::Equal))
        .map(|(id, _)| id)
}

/// Pull the h2h moneylines and the totals point out of one bookmaker block.
fn extract_snapshot(
    bookmaker: &Bookmaker,
    event: &OddsEvent,
) -> Option<(Option<i32>, Option<i32>, Option<f64>)> {
    let h2h = bookmaker.markets.iter().find(|m| m.key == "h2h")?;
    let home_ml = h2h
        .outcomes
        .iter()
        .find(|o| o.name == event.home_team)
        .map(|o| o.price as i32)?;
    let away_ml = h2h
        .outcomes
        .iter()
        .find(|o| o.name == event.away_team)
        .map(|o| o.price as i32)?;

    let total_line = bookmaker
        .markets
        .iter()
        .find(|m| m.key == "totals")
        .and_then(|m| m.outcomes.first())
        .and_then(|o| o.point);

    Some((Some(home_ml), Some(away_ml), total_line))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn week_date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 9, 21).unwrap()
    }

    fn lookup_for(
        entries: &[(&str, &str, i64)],
    ) -> HashMap<(String, String), (i64, NaiveDate)> {
        entries
            .iter()
            .map(|(h, a, id)| ((h.to_string(), a.to_string()), (*id, week_date())))
            .collect()
    }

    #[test]
    fn test_match_event_exact_after_resolve() {
        let dir = TeamDirectory::default();
        let lookup = lookup_for(&[("Las Vegas Raiders", "Kansas City Chiefs", 7)]);
        // the feed still says Oakland; the alias table fixes it
        assert_eq!(
            match_event(&dir, &lookup, "Oakland Raiders", "Kansas City Chiefs", week_date()),
            Some(7)
        );
    }

    #[test]
    fn test_match_event_fuzzy_fallback() {
        let dir = TeamDirectory::default();
        let lookup = lookup_for(&[("Washington Commanders", "Dallas Cowboys", 3)]);
        assert_eq!(
            match_event(&dir, &lookup, "Washington Commandrs", "Dallas Cowboys", week_date()),
            Some(3)
        );
    }

    #[test]
    fn test_match_event_rejects_unrelated_names() {
        let dir = TeamDirectory::default();
        let lookup = lookup_for(&[("Buffalo Bills", "Miami Dolphins", 1)]);
        assert_eq!(
            match_event(&dir, &lookup, "Seattle Seahawks", "Arizona Cardinals", week_date()),
            None
        );
    }

    #[test]
    fn test_match_event_rejects_kickoff_outside_window() {
        let dir = TeamDirectory::default();
        let lookup = lookup_for(&[("Buffalo Bills", "Miami Dolphins", 1)]);
        let next_week = week_date() + Duration::days(7);
        assert_eq!(
            match_event(&dir, &lookup, "Buffalo Bills", "Miami Dolphins", next_week),
            None
        );
    }

    #[test]
    fn test_extract_snapshot() {
        let event = OddsEvent {
            id: "e".into(),
            commence_time: Utc::now(),
            home_team: "Buffalo Bills".into(),
            away_team: "Miami Dolphins".into(),
            bookmakers: vec![],
        };
        let bookmaker = Bookmaker {
            key: "book".into(),
            title: "Book".into(),
            markets: vec![
                Market {
                    key: "h2h".into(),
                    outcomes: vec![
                        Outcome { name: "Buffalo Bills".into(), price: -180.0, point: None },
                        Outcome { name: "Miami Dolphins".into(), price: 155.0, point: None },
                    ],
                },
                Market {
                    key: "totals".into(),
                    outcomes: vec![Outcome { name: "Over".into(), price: -110.0, point: Some(47.5) }],
                },
            ],
        };

        let (home_ml, away_ml, total) = extract_snapshot(&bookmaker, &event).unwrap();
        assert_eq!(home_ml, Some(-180));
        assert_eq!(away_ml, Some(155));
        assert_eq!(total, Some(47.5));
    }
}
