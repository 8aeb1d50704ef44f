pub mod analyzer;
pub mod features;
pub mod model;
pub mod odds_fetcher;
pub mod strategies;

pub use model::{LogisticModel, Predictor, TrainingConfig};
pub use strategies::{
    DefaultStrategy, ExpertConsensusStrategy, ExpertWeights, ModelStrategy, PickStrategy,
    StrategyChain,
};
