//! Pluggable predictor capability. The contract is deliberately small:
//! features in, probability in [0, 1] out. The built-in implementation is a
//! logistic regression fit by weighted gradient descent; anything honoring
//! `Predictor` can be slotted into the model strategy instead.

use anyhow::{Context, Result};
use nalgebra::DVector;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::models::TrainingRow;
use crate::services::features::FeatureVector;

pub trait Predictor: Send + Sync {
    /// Probability in [0, 1] that the home side wins.
    fn predict(&self, features: &FeatureVector) -> f64;
}

/// How much a current-season example counts relative to a historical one.
/// The pools this was tuned on used ratios between 3:1 and 5:1.
#[derive(Debug, Clone)]
pub struct TrainingConfig {
    pub current_season_weight_multiplier: f64,
    pub learning_rate: f64,
    pub epochs: usize,
    /// Seed for the epoch shuffle; the same rows and config always produce
    /// the same model.
    pub seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            current_season_weight_multiplier: 3.0,
            learning_rate: 0.05,
            epochs: 300,
            seed: 17,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticModel {
    weights: Vec<f64>,
    bias: f64,
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

impl Predictor for LogisticModel {
    fn predict(&self, features: &FeatureVector) -> f64 {
        let x = DVector::from_vec(features.to_vec());
        let w = DVector::from_vec(self.weights.clone());
        sigmoid(w.dot(&x) + self.bias)
    }
}

impl LogisticModel {
    /// Fit on resolved picks. The label is "home side won"; rows from
    /// `current_season` are up-weighted per the config. Returns None when
    /// there is nothing to learn from.
    pub fn fit(
        rows: &[TrainingRow],
        current_season: i32,
        config: &TrainingConfig,
    ) -> Option<Self> {
        if rows.is_empty() {
            return None;
        }

        let examples: Vec<(DVector<f64>, f64, f64)> = rows
            .iter()
            .map(|row| {
                let x = DVector::from_vec(FeatureVector::from_training_row(row).to_vec());
                // pick was on home side iff pick_team == home_team; a correct
                // home pick or an incorrect away pick means the home side won
                let picked_home = row.pick_team_id == row.home_team_id;
                let home_won = picked_home == row.is_correct;
                let label = if home_won { 1.0 } else { 0.0 };
                let weight = if row.season_year == current_season {
                    config.current_season_weight_multiplier
                } else {
                    1.0
                };
                (x, label, weight)
            })
            .collect();

        let dim = FeatureVector::DIM;
        let mut w = DVector::zeros(dim);
        let mut bias = 0.0f64;
        let mut order: Vec<usize> = (0..examples.len()).collect();
        let mut rng = StdRng::seed_from_u64(config.seed);

        for epoch in 0..config.epochs {
            // decaying step size so late epochs settle instead of oscillating
            let lr = config.learning_rate / (1.0 + epoch as f64 * 0.02);
            order.shuffle(&mut rng);
            for &i in &order {
                let (x, label, weight) = &examples[i];
                let p = sigmoid(w.dot(x) + bias);
                let grad = *weight * (p - *label);
                w.axpy(-(lr * grad), x, 1.0);
                bias -= lr * grad;
            }
        }

        Some(Self {
            weights: w.iter().copied().collect(),
            bias,
        })
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path.as_ref(), json)
            .with_context(|| format!("writing model to {}", path.as_ref().display()))?;
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("reading model from {}", path.as_ref().display()))?;
        Ok(serde_json::from_str(&json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(season: i32, home_ml: i32, away_ml: i32, picked_home: bool, correct: bool) -> TrainingRow {
        TrainingRow {
            season_year: season,
            week: 4,
            home_team_id: 1,
            away_team_id: 2,
            pick_team_id: if picked_home { 1 } else { 2 },
            home_moneyline: Some(home_ml),
            away_moneyline: Some(away_ml),
            total_points_line: Some(45.0),
            win_probability: 0.6,
            is_correct: correct,
        }
    }

    #[test]
    fn test_fit_on_empty_rows_returns_none() {
        assert!(LogisticModel::fit(&[], 2025, &TrainingConfig::default()).is_none());
    }

    #[test]
    fn test_predictions_stay_in_unit_interval() {
        let rows: Vec<TrainingRow> = (0..40)
            .map(|i| row(2025, -200, 170, true, i % 5 != 0))
            .collect();
        let model = LogisticModel::fit(&rows, 2025, &TrainingConfig::default()).unwrap();
        let p = model.predict(&FeatureVector::from_training_row(&rows[0]));
        assert!((0.0..=1.0).contains(&p));
    }

    #[test]
    fn test_learns_that_favorites_win() {
        // heavy home favorites win, heavy home underdogs lose
        let mut rows = Vec::new();
        for _ in 0..60 {
            rows.push(row(2025, -300, 250, true, true));
            rows.push(row(2025, 260, -320, false, true));
        }
        let model = LogisticModel::fit(&rows, 2025, &TrainingConfig::default()).unwrap();

        let favorite = FeatureVector::from_training_row(&row(2025, -300, 250, true, true));
        let underdog = FeatureVector::from_training_row(&row(2025, 260, -320, true, false));
        assert!(model.predict(&favorite) > 0.5);
        assert!(model.predict(&underdog) < 0.5);
    }

    #[test]
    fn test_current_season_weighting_dominates_conflicts() {
        // identical features: historical says home loses, current says home wins
        let mut rows = Vec::new();
        for _ in 0..30 {
            rows.push(row(2023, -150, 130, true, false));
            rows.push(row(2025, -150, 130, true, true));
        }
        let config = TrainingConfig {
            current_season_weight_multiplier: 5.0,
            ..Default::default()
        };
        let model = LogisticModel::fit(&rows, 2025, &config).unwrap();
        let p = model.predict(&FeatureVector::from_training_row(&rows[0]));
        assert!(p > 0.5, "current-season evidence should win, got {}", p);
    }

    #[test]
    fn test_fit_is_deterministic() {
        let rows: Vec<TrainingRow> = (0..50)
            .map(|i| row(2025, -180, 155, i % 2 == 0, i % 3 != 0))
            .collect();
        let config = TrainingConfig::default();
        let a = LogisticModel::fit(&rows, 2025, &config).unwrap();
        let b = LogisticModel::fit(&rows, 2025, &config).unwrap();
        assert_eq!(a.weights, b.weights);
        assert_eq!(a.bias, b.bias);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let model = LogisticModel {
            weights: vec![0.1; FeatureVector::DIM],
            bias: -0.2,
        };
        let dir = std::env::temp_dir().join("pickem-model-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("model.json");
        model.save(&path).unwrap();
        let loaded = LogisticModel::load(&path).unwrap();
        assert_eq!(loaded.weights, model.weights);
        assert_eq!(loaded.bias, model.bias);
    }
}
