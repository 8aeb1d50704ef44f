use statrs::distribution::{ContinuousCDF, Normal};

/// Historical sigma of NFL final margins against the spread.
const MARGIN_SIGMA: f64 = 13.45;

/// Implied win probability from American odds (vig included).
pub fn american_to_probability(american: i32) -> f64 {
    if american >= 100 {
        100.0 / (american as f64 + 100.0)
    } else {
        let a = american.abs() as f64;
        a / (a + 100.0)
    }
}

/// Parse an American odds string like "+120" or "-145".
pub fn parse_american_odds(s: &str) -> Option<i32> {
    let trimmed = s.trim();
    let trimmed = trimmed.strip_prefix('+').unwrap_or(trimmed);
    trimmed.parse::<i32>().ok()
}

/// Strip the vig from a two-way market: scales both implied probabilities to
/// sum to 1.0.
pub fn remove_vig(home_prob: f64, away_prob: f64) -> (f64, f64) {
    let total = home_prob + away_prob;
    if total <= 0.0 {
        return (0.5, 0.5);
    }
    (home_prob / total, away_prob / total)
}

/// Win probability of the favored side implied by a point spread, via the
/// Normal CDF over historical margin variance.
pub fn spread_to_win_probability(spread: f64) -> f64 {
    match Normal::new(0.0, MARGIN_SIGMA) {
        Ok(dist) => dist.cdf(spread.abs()),
        Err(_) => 0.5,
    }
}

/// Cyclical encoding of week-of-season, so week 18 sits next to week 1 in
/// feature space.
pub fn week_cycle_encoding(week: i32, weeks_in_season: i32) -> (f64, f64) {
    let angle = 2.0 * std::f64::consts::PI * (week - 1) as f64 / weeks_in_season as f64;
    (angle.sin(), angle.cos())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_american_to_probability() {
        assert!((american_to_probability(100) - 0.5).abs() < 1e-9);
        assert!((american_to_probability(-150) - 0.6).abs() < 1e-9);
        assert!((american_to_probability(300) - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_parse_american_odds() {
        assert_eq!(parse_american_odds("+120"), Some(120));
        assert_eq!(parse_american_odds("-145"), Some(-145));
        assert_eq!(parse_american_odds(" -110 "), Some(-110));
        assert_eq!(parse_american_odds("even"), None);
    }

    #[test]
    fn test_remove_vig() {
        let (h, a) = remove_vig(0.55, 0.55);
        assert!((h - 0.5).abs() < 1e-9);
        assert!((h + a - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_spread_probability_monotonic() {
        let pk = spread_to_win_probability(0.0);
        let small = spread_to_win_probability(3.0);
        let big = spread_to_win_probability(10.0);
        assert!((pk - 0.5).abs() < 1e-9);
        assert!(small > pk);
        assert!(big > small);
        assert!(big < 1.0);
    }

    #[test]
    fn test_week_cycle_encoding() {
        let (sin1, cos1) = week_cycle_encoding(1, 18);
        assert!(sin1.abs() < 1e-9);
        assert!((cos1 - 1.0).abs() < 1e-9);
        let (sin10, _) = week_cycle_encoding(10, 18);
        assert!(sin10.abs() < 0.4); // halfway round the cycle
    }
}
