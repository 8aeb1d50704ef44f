use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Conference {
    Afc,
    Nfc,
}

impl Conference {
    pub fn as_str(&self) -> &'static str {
        match self {
            Conference::Afc => "AFC",
            Conference::Nfc => "NFC",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "AFC" => Some(Conference::Afc),
            "NFC" => Some(Conference::Nfc),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Division {
    East,
    North,
    South,
    West,
}

impl Division {
    pub fn as_str(&self) -> &'static str {
        match self {
            Division::East => "East",
            Division::North => "North",
            Division::South => "South",
            Division::West => "West",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "east" => Some(Division::East),
            "north" => Some(Division::North),
            "south" => Some(Division::South),
            "west" => Some(Division::West),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    pub id: i64,
    pub name: String,
    pub abbreviation: String,
    pub conference: Conference,
    pub division: Division,
}

/// One scheduled or played matchup. Natural key: (season_year, week,
/// home_team_id, away_team_id). Derived fields are recomputed whenever
/// both scores are known.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Game {
    pub id: i64,
    pub season_year: i32,
    pub week: i32,
    pub home_team_id: i64,
    pub away_team_id: i64,
    pub game_date: NaiveDate,
    pub home_score: Option<i32>,
    pub away_score: Option<i32>,
    pub total_points: Option<i32>,
    pub margin: Option<i32>,
    pub winner_team_id: Option<i64>,
    pub is_completed: bool,
    pub is_international: bool,
    pub stadium_type: Option<String>,
}

/// Derived fields from a pair of final scores: (total_points, margin,
/// winner, is_completed). A tied game completes with no winner.
pub fn derive_game_result(
    home_team_id: i64,
    away_team_id: i64,
    home_score: Option<i32>,
    away_score: Option<i32>,
) -> (Option<i32>, Option<i32>, Option<i64>, bool) {
    match (home_score, away_score) {
        (Some(h), Some(a)) => {
            let winner = match h.cmp(&a) {
                std::cmp::Ordering::Greater => Some(home_team_id),
                std::cmp::Ordering::Less => Some(away_team_id),
                std::cmp::Ordering::Equal => None,
            };
            (Some(h + a), Some((h - a).abs()), winner, true)
        }
        _ => (None, None, None, false),
    }
}

/// One bookmaker's snapshot for a game. Append-only: repeated fetches add
/// rows, forming a time series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OddsSnapshot {
    pub id: i64,
    pub game_id: i64,
    pub bookmaker: String,
    pub home_moneyline: Option<i32>,
    pub away_moneyline: Option<i32>,
    pub total_points_line: Option<f64>,
    pub home_win_probability: Option<f64>,
    pub away_win_probability: Option<f64>,
    pub fetched_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pick {
    pub id: i64,
    pub game_id: i64,
    pub season_year: i32,
    pub week: i32,
    pub pick_team_id: i64,
    pub confidence_points: i32,
    pub win_probability: f64,
    pub total_points_prediction: Option<f64>,
    pub is_correct: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExpertPickResult {
    Win,
    Loss,
}

impl ExpertPickResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExpertPickResult::Win => "WIN",
            ExpertPickResult::Loss => "LOSS",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "WIN" => Some(ExpertPickResult::Win),
            "LOSS" => Some(ExpertPickResult::Loss),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpertPick {
    pub id: i64,
    pub game_id: i64,
    pub expert_name: String,
    pub pick_team_id: i64,
    pub spread: Option<f64>,
    pub result: Option<ExpertPickResult>,
    pub confidence: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamVote {
    pub team_id: i64,
    pub votes: i64,
}

/// Plurality pick among all experts for one game. `consensus_team_id` is
/// None when no expert picks exist for the game.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpertConsensus {
    pub consensus_team_id: Option<i64>,
    pub consensus_count: i64,
    pub total_experts: i64,
    pub consensus_percentage: f64,
    pub pick_breakdown: Vec<TeamVote>,
}

impl ExpertConsensus {
    pub fn empty() -> Self {
        Self {
            consensus_team_id: None,
            consensus_count: 0,
            total_experts: 0,
            consensus_percentage: 0.0,
            pick_breakdown: Vec::new(),
        }
    }
}

/// A human participant's recorded pick in a real-world pool, kept for
/// historical validation. `pick_team_id = None` means a missed pick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolResult {
    pub id: i64,
    pub season_year: i32,
    pub week: i32,
    pub participant_name: String,
    pub game_id: i64,
    pub pick_team_id: Option<i64>,
    pub confidence_points: Option<i32>,
    pub is_correct: Option<bool>,
    pub total_weekly_score: Option<i32>,
    pub weekly_rank: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantSummary {
    pub participant_name: String,
    pub total_picks: i64,
    pub correct_picks: i64,
    pub points_won: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeeklyAnalysis {
    pub season_year: i32,
    pub week: i32,
    pub total_picks: i64,
    pub correct_picks: i64,
    pub accuracy: f64,
    pub avg_total_points_error: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfidenceAccuracy {
    pub season_year: i32,
    pub week: i32,
    pub confidence_points: i32,
    pub total_picks: i64,
    pub correct_picks: i64,
    pub accuracy: f64,
}

/// One resolved pick joined with its game and latest odds — the training-set
/// extraction shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingRow {
    pub season_year: i32,
    pub week: i32,
    pub home_team_id: i64,
    pub away_team_id: i64,
    pub pick_team_id: i64,
    pub home_moneyline: Option<i32>,
    pub away_moneyline: Option<i32>,
    pub total_points_line: Option<f64>,
    pub win_probability: f64,
    pub is_correct: bool,
}

/// One game's chosen side and its estimated win probability — the input to
/// confidence assignment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GameEstimate {
    pub game_id: i64,
    pub pick_team_id: i64,
    pub win_probability: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankedPick {
    pub game_id: i64,
    pub pick_team_id: i64,
    pub win_probability: f64,
    pub confidence_points: u32,
}
