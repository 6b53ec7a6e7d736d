use sea_orm::*;

use crate::entity::{game, member, participation};
use crate::error::AppError;

/// Find a game by ID or return 404.
pub async fn find_game<C: ConnectionTrait>(db: &C, id: i32) -> Result<game::Model, AppError> {
    game::Entity::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Game not found".into()))
}

/// Resolve the participation a user plays for in a game.
pub async fn find_user_participation<C: ConnectionTrait>(
    db: &C,
    game_id: i32,
    user_id: i32,
) -> Result<participation::Model, AppError> {
    let membership = member::Entity::find_by_id((game_id, user_id))
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("You are not participating in this game".into()))?;

    participation::Entity::find_by_id(membership.participation_id)
        .one(db)
        .await?
        .ok_or_else(|| AppError::NotFound("Participation not found".into()))
}

/// Refuse access before the game starts.
pub fn ensure_started(game: &game::Model) -> Result<(), AppError> {
    if chrono::Utc::now() < game.start_time {
        return Err(AppError::Denied("The game has not started".into()));
    }
    Ok(())
}

/// Refuse operations outside the game window. Practice mode keeps the game open after its end.
pub fn ensure_open(game: &game::Model) -> Result<(), AppError> {
    ensure_started(game)?;
    if chrono::Utc::now() >= game.end_time && !game.practice_mode {
        return Err(AppError::Denied("The game has ended".into()));
    }
    Ok(())
}

/// Refuse players whose participation has not been accepted.
pub fn ensure_accepted(participation: &participation::Model) -> Result<(), AppError> {
    if participation.status != common::ParticipationStatus::Accepted {
        return Err(AppError::Denied("Your participation is not accepted".into()));
    }
    Ok(())
}
