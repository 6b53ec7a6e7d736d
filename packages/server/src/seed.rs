use sea_orm::sea_query::{Index, IndexCreateStatement, PostgresQueryBuilder};
use sea_orm::{ConnectionTrait, DatabaseConnection, DbErr};
use tracing::{info, warn};

use crate::entity::{flag, game_instance, submission};

fn required_indexes() -> Vec<(&'static str, IndexCreateStatement)> {
    vec![
        // One instance per (participation, challenge); lookups by either column pair.
        (
            "uq_instance_participation_challenge",
            Index::create()
                .if_not_exists()
                .unique()
                .name("uq_instance_participation_challenge")
                .table(game_instance::Entity)
                .col(game_instance::Column::ParticipationId)
                .col(game_instance::Column::ChallengeId)
                .to_owned(),
        ),
        // Answer lookup and flag-pool claims.
        (
            "idx_flag_challenge_flag",
            Index::create()
                .if_not_exists()
                .name("idx_flag_challenge_flag")
                .table(flag::Entity)
                .col(flag::Column::ChallengeId)
                .col(flag::Column::Flag)
                .to_owned(),
        ),
        // Scoreboard aggregation and startup requeue.
        (
            "idx_submission_game_status",
            Index::create()
                .if_not_exists()
                .name("idx_submission_game_status")
                .table(submission::Entity)
                .col(submission::Column::GameId)
                .col(submission::Column::Status)
                .to_owned(),
        ),
    ]
}

/// Ensure required database indexes exist.
///
/// Schema-sync does not create composite indexes, so they are created here on startup.
/// The unique instance index is required for correctness and its failure is fatal.
pub async fn ensure_indexes(db: &DatabaseConnection) -> Result<(), DbErr> {
    for (name, stmt) in required_indexes() {
        let sql = stmt.to_string(PostgresQueryBuilder);
        match db.execute_unprepared(&sql).await {
            Ok(_) => info!("Ensured index {name} exists"),
            Err(e) if name.starts_with("uq_") => return Err(e),
            Err(e) => warn!("Failed to create index {name}: {e}"),
        }
    }

    Ok(())
}
