use chrono::Utc;
use common::AnswerStatus;
use sea_orm::sea_query::LockType;
use sea_orm::*;
use tracing::{debug, instrument, warn};

use crate::entity::{cheat_info, flag, game_instance, submission};

use super::error::EngineError;

/// Result of a leak scan for one submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheatCheckInfo {
    pub submission_id: i32,
    /// Set when the answer is another participation's dispatched flag.
    pub cheat: Option<cheat_info::Model>,
}

impl CheatCheckInfo {
    pub fn is_cheat(&self) -> bool {
        self.cheat.is_some()
    }
}

/// Look for the submitted answer among other participations' flags of the same challenge.
///
/// Only the first matching source is recorded. On a match the submission is reclassified as
/// `CheatDetected` whatever its previous status.
#[instrument(skip(db))]
pub async fn check_cheat(
    db: &DatabaseConnection,
    submission_id: i32,
) -> Result<CheatCheckInfo, EngineError> {
    let txn = db.begin().await?;

    let sub = submission::Entity::find_by_id(submission_id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or_else(|| EngineError::not_found(format!("submission {submission_id}")))?;

    if let Some(existing) = cheat_info::Entity::find()
        .filter(cheat_info::Column::SubmissionId.eq(submission_id))
        .one(&txn)
        .await?
    {
        txn.commit().await?;
        return Ok(CheatCheckInfo {
            submission_id,
            cheat: Some(existing),
        });
    }

    let matching_flags: Vec<i32> = flag::Entity::find()
        .select_only()
        .column(flag::Column::Id)
        .filter(flag::Column::ChallengeId.eq(sub.challenge_id))
        .filter(flag::Column::Flag.eq(sub.answer.as_str()))
        .into_tuple()
        .all(&txn)
        .await?;

    if matching_flags.is_empty() {
        txn.commit().await?;
        return Ok(CheatCheckInfo {
            submission_id,
            cheat: None,
        });
    }

    let source = game_instance::Entity::find()
        .filter(game_instance::Column::ChallengeId.eq(sub.challenge_id))
        .filter(game_instance::Column::ParticipationId.ne(sub.participation_id))
        .filter(game_instance::Column::FlagId.is_in(matching_flags))
        .order_by_asc(game_instance::Column::Id)
        .one(&txn)
        .await?;

    let Some(source) = source else {
        txn.commit().await?;
        return Ok(CheatCheckInfo {
            submission_id,
            cheat: None,
        });
    };

    let record = cheat_info::ActiveModel {
        game_id: Set(sub.game_id),
        submission_id: Set(sub.id),
        submit_participation_id: Set(sub.participation_id),
        source_participation_id: Set(source.participation_id),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    submission::ActiveModel {
        id: Set(sub.id),
        status: Set(AnswerStatus::CheatDetected),
        ..Default::default()
    }
    .update(&txn)
    .await?;

    txn.commit().await?;

    warn!(
        submission_id,
        challenge_id = sub.challenge_id,
        submit_participation_id = sub.participation_id,
        source_participation_id = source.participation_id,
        "Flag leak detected"
    );

    Ok(CheatCheckInfo {
        submission_id,
        cheat: Some(record),
    })
}

/// Cheat records of a game, newest first.
pub async fn list_cheat_info(
    db: &DatabaseConnection,
    game_id: i32,
) -> Result<Vec<cheat_info::Model>, EngineError> {
    let rows = cheat_info::Entity::find()
        .filter(cheat_info::Column::GameId.eq(game_id))
        .order_by_desc(cheat_info::Column::CreatedAt)
        .order_by_desc(cheat_info::Column::Id)
        .all(db)
        .await?;
    debug!(game_id, count = rows.len(), "Listed cheat records");
    Ok(rows)
}
