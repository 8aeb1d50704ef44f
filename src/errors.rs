use thiserror::Error;

/// Caller-contract violations. These always propagate; "no data" conditions
/// (missing lookups, empty consensus) return None/empty instead.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("invalid matchup: '{home}' vs '{away}' is not a regular NFL game")]
    InvalidGame { home: String, away: String },

    #[error("unknown team: '{0}'")]
    TeamNotFound(String),

    #[error("expected {expected} games for the week, got {supplied} estimates")]
    MismatchedGameCount { expected: usize, supplied: usize },
}
