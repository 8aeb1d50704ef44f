use anyhow::Result;
use sqlx::SqlitePool;

use crate::db::upsert_team;
use crate::teams::TeamDirectory;

/// Seed the 32 canonical franchises. Runs before any ingestion; re-running
/// is a no-op thanks to name-keyed upserts.
pub async fn seed_teams(pool: &SqlitePool, directory: &TeamDirectory) -> Result<u32> {
    let mut seeded = 0u32;
    for info in directory.all_teams() {
        upsert_team(pool, info.name, info.abbreviation, info.conference, info.division).await?;
        seeded += 1;
    }
    tracing::info!("Seeded {} teams", seeded);
    Ok(seeded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{get_all_teams, test_pool};

    #[tokio::test]
    async fn test_seed_is_idempotent() {
        let pool = test_pool().await;
        let dir = TeamDirectory::default();
        assert_eq!(seed_teams(&pool, &dir).await.unwrap(), 32);
        assert_eq!(seed_teams(&pool, &dir).await.unwrap(), 32);
        assert_eq!(get_all_teams(&pool).await.unwrap().len(), 32);
    }
}
