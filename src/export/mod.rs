//! Pick-sheet exports: CSV for spreadsheets, Markdown for pasting into the
//! pool's group chat. Both render the same week rows, highest confidence
//! first.

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::io::Write;

use crate::db::{get_all_teams, get_game, get_picks_for_week};

/// One pick joined with team names, ready to render.
#[derive(Debug, Clone)]
pub struct PickRow {
    pub confidence_points: i32,
    pub pick_team: String,
    pub opponent: String,
    pub is_home_pick: bool,
    pub game_date: chrono::NaiveDate,
    pub win_probability: f64,
    pub is_correct: Option<bool>,
}

/// The week's stored picks sorted by confidence, highest first.
pub async fn collect_week_rows(
    pool: &SqlitePool,
    season_year: i32,
    week: i32,
) -> Result<Vec<PickRow>> {
    let names: HashMap<i64, String> = get_all_teams(pool)
        .await?
        .into_iter()
        .map(|t| (t.id, t.name))
        .collect();

    let mut picks = get_picks_for_week(pool, season_year, week).await?;
    picks.sort_by(|a, b| b.confidence_points.cmp(&a.confidence_points));

    let mut rows = Vec::with_capacity(picks.len());
    for pick in picks {
        let game = get_game(pool, pick.game_id)
            .await?
            .with_context(|| format!("pick {} references missing game {}", pick.id, pick.game_id))?;
        let is_home_pick = pick.pick_team_id == game.home_team_id;
        let opponent_id = if is_home_pick {
            game.away_team_id
        } else {
            game.home_team_id
        };
        let unknown = || "<unknown team>".to_string();
        rows.push(PickRow {
            confidence_points: pick.confidence_points,
            pick_team: names.get(&pick.pick_team_id).cloned().unwrap_or_else(unknown),
            opponent: names.get(&opponent_id).cloned().unwrap_or_else(unknown),
            is_home_pick,
            game_date: game.game_date,
            win_probability: pick.win_probability,
            is_correct: pick.is_correct,
        });
    }
    Ok(rows)
}

pub fn write_csv<W: Write>(rows: &[PickRow], writer: W) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record([
        "confidence", "pick", "opponent", "venue", "game_date", "win_probability", "result",
    ])?;
    for row in rows {
        csv_writer.write_record([
            row.confidence_points.to_string(),
            row.pick_team.clone(),
            row.opponent.clone(),
            venue_label(row).to_string(),
            row.game_date.format("%Y-%m-%d").to_string(),
            format!("{:.3}", row.win_probability),
            result_label(row).to_string(),
        ])?;
    }
    csv_writer.flush()?;
    Ok(())
}

pub fn render_markdown(rows: &[PickRow], season_year: i32, week: i32) -> String {
    let mut out = String::new();
    out.push_str(&format!("# Week {} Picks ({})\n\n", week, season_year));

    if rows.is_empty() {
        out.push_str("_No picks stored for this week._\n");
        return out;
    }

    out.push_str("| Pts | Pick | Opponent | Venue | Date | Win % | Result |\n");
    out.push_str("|----:|------|----------|-------|------|------:|--------|\n");
    for row in rows {
        out.push_str(&format!(
            "| {} | {} | {} | {} | {} | {:.1}% | {} |\n",
            row.confidence_points,
            row.pick_team,
            row.opponent,
            venue_label(row),
            row.game_date.format("%b %-d"),
            row.win_probability * 100.0,
            result_label(row),
        ));
    }

    let total_points: i32 = rows.iter().map(|r| r.confidence_points).sum();
    out.push_str(&format!(
        "\n{} games, {} confidence points on the board\n",
        rows.len(),
        total_points
    ));
    out
}

fn venue_label(row: &PickRow) -> &'static str {
    if row.is_home_pick {
        "home"
    } else {
        "away"
    }
}

fn result_label(row: &PickRow) -> &'static str {
    match row.is_correct {
        Some(true) => "W",
        Some(false) => "L",
        None => "-",
    }
}
