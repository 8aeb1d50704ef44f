//! Canonical NFL team identity: the 32 current franchises plus a
//! historical-alias resolver for relocated or renamed clubs.

use std::collections::HashMap;

use crate::models::{Conference, Division};

#[derive(Debug, Clone)]
pub struct TeamInfo {
    pub name: &'static str,
    pub abbreviation: &'static str,
    pub conference: Conference,
    pub division: Division,
}

/// The 32 current franchises.
pub const NFL_TEAMS: [TeamInfo; 32] = [
    TeamInfo { name: "Buffalo Bills", abbreviation: "BUF", conference: Conference::Afc, division: Division::East },
    TeamInfo { name: "Miami Dolphins", abbreviation: "MIA", conference: Conference::Afc, division: Division::East },
    TeamInfo { name: "New England Patriots", abbreviation: "NE", conference: Conference::Afc, division: Division::East },
    TeamInfo { name: "New York Jets", abbreviation: "NYJ", conference: Conference::Afc, division: Division::East },
    TeamInfo { name: "Baltimore Ravens", abbreviation: "BAL", conference: Conference::Afc, division: Division::North },
    TeamInfo { name: "Cincinnati Bengals", abbreviation: "CIN", conference: Conference::Afc, division: Division::North },
    TeamInfo { name: "Cleveland Browns", abbreviation: "CLE", conference: Conference::Afc, division: Division::North },
    TeamInfo { name: "Pittsburgh Steelers", abbreviation: "PIT", conference: Conference::Afc, division: Division::North },
    TeamInfo { name: "Houston Texans", abbreviation: "HOU", conference: Conference::Afc, division: Division::South },
    TeamInfo { name: "Indianapolis Colts", abbreviation: "IND", conference: Conference::Afc, division: Division::South },
    TeamInfo { name: "Jacksonville Jaguars", abbreviation: "JAX", conference: Conference::Afc, division: Division::South },
    TeamInfo { name: "Tennessee Titans", abbreviation: "TEN", conference: Conference::Afc, division: Division::South },
    TeamInfo { name: "Denver Broncos", abbreviation: "DEN", conference: Conference::Afc, division: Division::West },
    TeamInfo { name: "Kansas City Chiefs", abbreviation: "KC", conference: Conference::Afc, division: Division::West },
    TeamInfo { name: "Las Vegas Raiders", abbreviation: "LV", conference: Conference::Afc, division: Division::West },
    TeamInfo { name: "Los Angeles Chargers", abbreviation: "LAC", conference: Conference::Afc, division: Division::West },
    TeamInfo { name: "Dallas Cowboys", abbreviation: "DAL", conference: Conference::Nfc, division: Division::East },
    TeamInfo { name: "New York Giants", abbreviation: "NYG", conference: Conference::Nfc, division: Division::East },
    TeamInfo { name: "Philadelphia Eagles", abbreviation: "PHI", conference: Conference::Nfc, division: Division::East },
    TeamInfo { name: "Washington Commanders", abbreviation: "WAS", conference: Conference::Nfc, division: Division::East },
    TeamInfo { name: "Chicago Bears", abbreviation: "CHI", conference: Conference::Nfc, division: Division::North },
    TeamInfo { name: "Detroit Lions", abbreviation: "DET", conference: Conference::Nfc, division: Division::North },
    TeamInfo { name: "Green Bay Packers", abbreviation: "GB", conference: Conference::Nfc, division: Division::North },
    TeamInfo { name: "Minnesota Vikings", abbreviation: "MIN", conference: Conference::Nfc, division: Division::North },
    TeamInfo { name: "Atlanta Falcons", abbreviation: "ATL", conference: Conference::Nfc, division: Division::South },
    TeamInfo { name: "Carolina Panthers", abbreviation: "CAR", conference: Conference::Nfc, division: Division::South },
    TeamInfo { name: "New Orleans Saints", abbreviation: "NO", conference: Conference::Nfc, division: Division::South },
    TeamInfo { name: "Tampa Bay Buccaneers", abbreviation: "TB", conference: Conference::Nfc, division: Division::South },
    TeamInfo { name: "Arizona Cardinals", abbreviation: "ARI", conference: Conference::Nfc, division: Division::West },
    TeamInfo { name: "Los Angeles Rams", abbreviation: "LAR", conference: Conference::Nfc, division: Division::West },
    TeamInfo { name: "San Francisco 49ers", abbreviation: "SF", conference: Conference::Nfc, division: Division::West },
    TeamInfo { name: "Seattle Seahawks", abbreviation: "SEA", conference: Conference::Nfc, division: Division::West },
];

/// Historical names seen in scraped schedules and old pool spreadsheets,
/// mapped to the current franchise.
pub const HISTORICAL_ALIASES: [(&str, &str); 12] = [
    ("Washington Redskins", "Washington Commanders"),
    ("Washington Football Team", "Washington Commanders"),
    ("Washington", "Washington Commanders"),
    ("Oakland Raiders", "Las Vegas Raiders"),
    ("San Diego Chargers", "Los Angeles Chargers"),
    ("St. Louis Rams", "Los Angeles Rams"),
    ("St Louis Rams", "Los Angeles Rams"),
    ("Houston Oilers", "Tennessee Titans"),
    ("Tennessee Oilers", "Tennessee Titans"),
    ("Phoenix Cardinals", "Arizona Cardinals"),
    ("LA Chargers", "Los Angeles Chargers"),
    ("LA Rams", "Los Angeles Rams"),
];

/// Resolves naming variants onto the 32 canonical franchises. Built from
/// explicit tables so tests can substitute alternates.
pub struct TeamDirectory {
    teams: Vec<TeamInfo>,
    // lowercase canonical name -> index into teams
    by_name: HashMap<String, usize>,
    // lowercase alias -> canonical name
    aliases: HashMap<String, String>,
}

impl TeamDirectory {
    pub fn new(teams: &[TeamInfo], aliases: &[(&str, &str)]) -> Self {
        let teams: Vec<TeamInfo> = teams.to_vec();
        let by_name = teams
            .iter()
            .enumerate()
            .map(|(i, t)| (t.name.to_lowercase(), i))
            .collect();
        let aliases = aliases
            .iter()
            .map(|(from, to)| (from.to_lowercase(), to.to_string()))
            .collect();
        Self { teams, by_name, aliases }
    }

    /// Alias hit wins, then a case-insensitive canonical match; otherwise the
    /// input comes back unchanged and the caller must validate.
    pub fn resolve(&self, name: &str) -> String {
        let key = name.trim().to_lowercase();
        if let Some(canonical) = self.aliases.get(&key) {
            return canonical.clone();
        }
        if let Some(&idx) = self.by_name.get(&key) {
            return self.teams[idx].name.to_string();
        }
        name.trim().to_string()
    }

    /// True iff `name` resolves to one of the canonical franchises.
    pub fn is_valid(&self, name: &str) -> bool {
        let resolved = self.resolve(name);
        self.by_name.contains_key(&resolved.to_lowercase())
    }

    /// Pro Bowl / All-Star entities fail `is_valid`; ingestion drops those
    /// games with a warning rather than aborting.
    pub fn should_skip_game(&self, home: &str, away: &str) -> bool {
        !self.is_valid(home) || !self.is_valid(away)
    }

    pub fn team_info(&self, name: &str) -> Option<&TeamInfo> {
        let resolved = self.resolve(name).to_lowercase();
        self.by_name.get(&resolved).map(|&i| &self.teams[i])
    }

    pub fn all_teams(&self) -> &[TeamInfo] {
        &self.teams
    }
}

impl Default for TeamDirectory {
    fn default() -> Self {
        Self::new(&NFL_TEAMS, &HISTORICAL_ALIASES)
    }
}
