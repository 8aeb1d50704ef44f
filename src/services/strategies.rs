//! The three-tier prediction fallback: expert consensus, then the learned
//! model, then a neutral home pick. Each strategy can decline; the chain
//! walks them in order and the terminal default cannot fail, so a week with
//! holes in its data still yields a full slate of estimates.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::path::Path;

use crate::db::get_expert_picks_for_game;
use crate::models::{Game, GameEstimate};
use crate::services::features::build_features;
use crate::services::model::{LogisticModel, Predictor};

/// Historical per-expert accuracy weights. Unknown experts get
/// `default_weight`. An explicit table rather than a module global so tests
/// can substitute their own.
#[derive(Debug, Clone)]
pub struct ExpertWeights {
    weights: HashMap<String, f64>,
    default_weight: f64,
}

impl ExpertWeights {
    pub fn new(weights: HashMap<String, f64>, default_weight: f64) -> Self {
        Self { weights, default_weight }
    }

    pub fn weight_for(&self, expert_name: &str) -> f64 {
        self.weights
            .get(&expert_name.to_lowercase())
            .copied()
            .unwrap_or(self.default_weight)
    }
}

impl Default for ExpertWeights {
    fn default() -> Self {
        // season-over-season against-the-spread records of the usual columns
        let weights = [
            ("pete prisco", 0.58),
            ("will brinson", 0.55),
            ("jared dubin", 0.54),
            ("john breech", 0.52),
            ("dave richard", 0.51),
            ("ryan wilson", 0.53),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
        Self::new(weights, 0.5)
    }
}

#[async_trait]
pub trait PickStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Ok(None) means "no data here, try the next strategy".
    async fn try_predict(&self, pool: &SqlitePool, game: &Game)
        -> Result<Option<GameEstimate>>;
}

// ── Tier 1: expert consensus ──────────────────────────────────────────────────

/// Weighted plurality of the experts' picks, blended with how lopsided the
/// average spread is.
pub struct ExpertConsensusStrategy {
    weights: ExpertWeights,
}

impl ExpertConsensusStrategy {
    pub fn new(weights: ExpertWeights) -> Self {
        Self { weights }
    }
}

impl Default for ExpertConsensusStrategy {
    fn default() -> Self {
        Self::new(ExpertWeights::default())
    }
}

#[async_trait]
impl PickStrategy for ExpertConsensusStrategy {
    fn name(&self) -> &'static str {
        "expert-consensus"
    }

    async fn try_predict(
        &self,
        pool: &SqlitePool,
        game: &Game,
    ) -> Result<Option<GameEstimate>> {
        let picks = get_expert_picks_for_game(pool, game.id).await?;
        if picks.is_empty() {
            return Ok(None);
        }

        // each vote scaled by the expert's track record and own stated
        // confidence (10 is the neutral stated confidence)
        let mut votes: HashMap<i64, f64> = HashMap::new();
        let mut total_vote = 0.0;
        for pick in &picks {
            let confidence = crate::confidence::clamp_preassigned(pick.confidence as f64);
            let vote = self.weights.weight_for(&pick.expert_name) * (confidence / 10.0);
            *votes.entry(pick.pick_team_id).or_insert(0.0) += vote;
            total_vote += vote;
        }

        // weighted plurality; ties break toward the lower team id so the
        // outcome is deterministic
        let Some((&team_id, &team_vote)) = votes
            .iter()
            .max_by(|a, b| {
                a.1.partial_cmp(b.1)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(b.0.cmp(a.0))
            })
        else {
            return Ok(None);
        };
        let consensus_strength = team_vote / total_vote;

        let spreads: Vec<f64> = picks.iter().filter_map(|p| p.spread).collect();
        let spread_confidence = if spreads.is_empty() {
            0.0
        } else {
            let avg = spreads.iter().sum::<f64>() / spreads.len() as f64;
            (avg.abs() / 7.0).min(1.0)
        };

        let blended = 0.7 * consensus_strength + 0.3 * spread_confidence;
        // the picked side is never worse than a coin flip, so weak-consensus
        // games all land at exactly 0.5 and rank among themselves (and the
        // terminal default) by slate order, same as any other probability tie
        let win_probability = blended.max(0.5);

        Ok(Some(GameEstimate {
            game_id: game.id,
            pick_team_id: team_id,
            win_probability,
        }))
    }
}

// ── Tier 2: learned model ─────────────────────────────────────────────────────

pub struct ModelStrategy {
    predictor: Box<dyn Predictor>,
}

impl ModelStrategy {
    pub fn new(predictor: Box<dyn Predictor>) -> Self {
        Self { predictor }
    }

    /// None when no model file exists yet — the chain then falls through.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Option<Self> {
        match LogisticModel::load(&path) {
            Ok(model) => Some(Self::new(Box::new(model))),
            Err(e) => {
                tracing::debug!("no trained model at {}: {}", path.as_ref().display(), e);
                None
            }
        }
    }
}

#[async_trait]
impl PickStrategy for ModelStrategy {
    fn name(&self) -> &'static str {
        "learned-model"
    }

    async fn try_predict(
        &self,
        pool: &SqlitePool,
        game: &Game,
    ) -> Result<Option<GameEstimate>> {
        let features = build_features(pool, game).await?;
        let home_prob = self.predictor.predict(&features).clamp(0.0, 1.0);

        let (pick_team_id, win_probability) = if home_prob >= 0.5 {
            (game.home_team_id, home_prob)
        } else {
            (game.away_team_id, 1.0 - home_prob)
        };

        Ok(Some(GameEstimate {
            game_id: game.id,
            pick_team_id,
            win_probability,
        }))
    }
}

// ── Tier 3: terminal default ──────────────────────────────────────────────────

/// Home team at a coin flip. Always succeeds.
pub struct DefaultStrategy;

#[async_trait]
impl PickStrategy for DefaultStrategy {
    fn name(&self) -> &'static str {
        "default"
    }

    async fn try_predict(
        &self,
        _pool: &SqlitePool,
        game: &Game,
    ) -> Result<Option<GameEstimate>> {
        Ok(Some(GameEstimate {
            game_id: game.id,
            pick_team_id: game.home_team_id,
            win_probability: 0.5,
        }))
    }
}

// ── Chain ─────────────────────────────────────────────────────────────────────

pub struct StrategyChain {
    strategies: Vec<Box<dyn PickStrategy>>,
}

impl StrategyChain {
    pub fn new(strategies: Vec<Box<dyn PickStrategy>>) -> Self {
        Self { strategies }
    }

    /// Expert consensus → learned model (if a file is present) → default.
    pub fn standard<P: AsRef<Path>>(model_path: P) -> Self {
        let mut strategies: Vec<Box<dyn PickStrategy>> =
            vec![Box::new(ExpertConsensusStrategy::default())];
        if let Some(model) = ModelStrategy::from_file(model_path) {
            strategies.push(Box::new(model));
        } else {
            tracing::info!("no trained model available, chain falls back to default");
        }
        strategies.push(Box::new(DefaultStrategy));
        Self::new(strategies)
    }

    pub async fn predict_game(&self, pool: &SqlitePool, game: &Game) -> Result<GameEstimate> {
        for strategy in &self.strategies {
            if let Some(estimate) = strategy.try_predict(pool, game).await? {
                tracing::debug!(
                    "game {} estimated by {} strategy at {:.3}",
                    game.id,
                    strategy.name(),
                    estimate.win_probability
                );
                return Ok(estimate);
            }
        }
        anyhow::bail!("strategy chain has no terminal default")
    }

    /// Best-effort over the whole week: a game with no data still gets an
    /// estimate from whatever tier can serve it.
    pub async fn predict_week(
        &self,
        pool: &SqlitePool,
        games: &[Game],
    ) -> Result<Vec<GameEstimate>> {
        let mut estimates = Vec::with_capacity(games.len());
        for game in games {
            estimates.push(self.predict_game(pool, game).await?);
        }
        Ok(estimates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{seed_teams, test_pool, upsert_expert_pick, upsert_game};
    use crate::teams::TeamDirectory;
    use chrono::NaiveDate;

    async fn week_game(pool: &SqlitePool) -> Game {
        let dir = TeamDirectory::default();
        seed_teams(pool, &dir).await.unwrap();
        let d = NaiveDate::from_ymd_opt(2025, 9, 21).unwrap();
        let id = upsert_game(pool, &dir, 2025, 3, "Buffalo Bills", "Miami Dolphins", d, None, None)
            .await
            .unwrap();
        crate::db::get_game(pool, id).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_consensus_declines_without_expert_picks() {
        let pool = test_pool().await;
        let game = week_game(&pool).await;
        let strategy = ExpertConsensusStrategy::default();
        assert!(strategy.try_predict(&pool, &game).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_consensus_picks_weighted_plurality() {
        let pool = test_pool().await;
        let game = week_game(&pool).await;

        for expert in ["pete prisco", "will brinson", "jared dubin"] {
            upsert_expert_pick(&pool, game.id, expert, "Buffalo Bills", Some(-6.5), 12)
                .await
                .unwrap();
        }
        upsert_expert_pick(&pool, game.id, "someone new", "Miami Dolphins", Some(6.5), 8)
            .await
            .unwrap();

        let strategy = ExpertConsensusStrategy::default();
        let estimate = strategy.try_predict(&pool, &game).await.unwrap().unwrap();
        assert_eq!(estimate.pick_team_id, game.home_team_id);
        assert!(estimate.win_probability >= 0.5);
        assert!(estimate.win_probability <= 1.0);
    }

    #[tokio::test]
    async fn test_split_consensus_floors_at_coin_flip() {
        let pool = test_pool().await;
        let game = week_game(&pool).await;

        // two unknown experts of equal weight on opposite sides, no spreads
        upsert_expert_pick(&pool, game.id, "expert one", "Buffalo Bills", None, 10)
            .await
            .unwrap();
        upsert_expert_pick(&pool, game.id, "expert two", "Miami Dolphins", None, 10)
            .await
            .unwrap();

        let strategy = ExpertConsensusStrategy::default();
        let estimate = strategy.try_predict(&pool, &game).await.unwrap().unwrap();
        assert_eq!(estimate.win_probability, 0.5);
    }

    #[tokio::test]
    async fn test_default_strategy_always_serves() {
        let pool = test_pool().await;
        let game = week_game(&pool).await;
        let estimate = DefaultStrategy.try_predict(&pool, &game).await.unwrap().unwrap();
        assert_eq!(estimate.pick_team_id, game.home_team_id);
        assert_eq!(estimate.win_probability, 0.5);
    }

    #[tokio::test]
    async fn test_chain_falls_through_to_default() {
        let pool = test_pool().await;
        let game = week_game(&pool).await;
        // no expert picks, no model file
        let chain = StrategyChain::new(vec![
            Box::new(ExpertConsensusStrategy::default()),
            Box::new(DefaultStrategy),
        ]);
        let estimate = chain.predict_game(&pool, &game).await.unwrap();
        assert_eq!(estimate.pick_team_id, game.home_team_id);
        assert_eq!(estimate.win_probability, 0.5);
    }

    #[tokio::test]
    async fn test_model_strategy_picks_stronger_side() {
        struct AlwaysAway;
        impl Predictor for AlwaysAway {
            fn predict(&self, _features: &crate::services::features::FeatureVector) -> f64 {
                0.2
            }
        }

        let pool = test_pool().await;
        let game = week_game(&pool).await;
        let strategy = ModelStrategy::new(Box::new(AlwaysAway));
        let estimate = strategy.try_predict(&pool, &game).await.unwrap().unwrap();
        assert_eq!(estimate.pick_team_id, game.away_team_id);
        assert!((estimate.win_probability - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_expert_weights_default_for_unknowns() {
        let weights = ExpertWeights::default();
        assert_eq!(weights.weight_for("nobody in particular"), 0.5);
        assert!(weights.weight_for("Pete Prisco") > 0.5);
    }
}
