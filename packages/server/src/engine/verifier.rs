use chrono::{DateTime, Utc};
use common::{AnswerStatus, BloodRank, ChallengeType};
use sea_orm::sea_query::LockType;
use sea_orm::*;
use tracing::{debug, info, instrument};

use crate::entity::{challenge, flag, game, game_instance, submission};

use super::error::EngineError;

/// Outcome of verifying one submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub submission_id: i32,
    pub game_id: i32,
    pub challenge_id: i32,
    pub participation_id: i32,
    pub challenge_type: Option<ChallengeType>,
    pub submit_time: DateTime<Utc>,
    pub status: AnswerStatus,
    pub rank: BloodRank,
    /// The submission had already left `Unchecked`; nothing was written and `rank` is never a
    /// blood.
    pub already_checked: bool,
}

/// Decide whether an answer matches, given the challenge kind and dispatched flag.
async fn answer_matches<C: ConnectionTrait>(
    conn: &C,
    challenge: &challenge::Model,
    instance: &game_instance::Model,
    answer: &str,
) -> Result<bool, DbErr> {
    if challenge.challenge_type.is_static() {
        let hit = flag::Entity::find()
            .filter(flag::Column::ChallengeId.eq(challenge.id))
            .filter(flag::Column::Flag.eq(answer))
            .count(conn)
            .await?;
        return Ok(hit > 0);
    }

    let Some(flag_id) = instance.flag_id else {
        return Ok(false);
    };
    let dispatched = flag::Entity::find_by_id(flag_id).one(conn).await?;
    Ok(dispatched.is_some_and(|f| f.flag == answer))
}

/// Verify a stored submission and persist its final status.
///
/// Every row is re-read inside the transaction. The submission row lock makes verification
/// happen at most once; the challenge row lock orders concurrent first solves so each of the
/// first three blood ranks is handed out exactly once.
#[instrument(skip(db))]
pub async fn verify_answer(
    db: &DatabaseConnection,
    submission_id: i32,
) -> Result<Verdict, EngineError> {
    let txn = db.begin().await?;

    let sub = submission::Entity::find_by_id(submission_id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or_else(|| EngineError::not_found(format!("submission {submission_id}")))?;

    let challenge = challenge::Entity::find_by_id(sub.challenge_id)
        .one(&txn)
        .await?;

    let mut verdict = Verdict {
        submission_id,
        game_id: sub.game_id,
        challenge_id: sub.challenge_id,
        participation_id: sub.participation_id,
        challenge_type: challenge.as_ref().map(|c| c.challenge_type),
        submit_time: sub.submit_time,
        status: sub.status,
        rank: if sub.status.is_accepted() {
            BloodRank::Normal
        } else {
            BloodRank::Unaccepted
        },
        already_checked: true,
    };

    if sub.status != AnswerStatus::Unchecked {
        txn.commit().await?;
        debug!(submission_id, status = %sub.status, "Submission already verified, skipping");
        return Ok(verdict);
    }
    verdict.already_checked = false;

    let instance = game_instance::Entity::find()
        .filter(game_instance::Column::ParticipationId.eq(sub.participation_id))
        .filter(game_instance::Column::ChallengeId.eq(sub.challenge_id))
        .lock(LockType::Update)
        .one(&txn)
        .await?;

    let (status, rank) = match (instance, challenge) {
        (Some(instance), Some(challenge)) => judge(&txn, &sub, instance, challenge).await?,
        _ => (AnswerStatus::NotFound, BloodRank::Unaccepted),
    };

    submission::ActiveModel {
        id: Set(sub.id),
        status: Set(status),
        ..Default::default()
    }
    .update(&txn)
    .await?;

    txn.commit().await?;

    verdict.status = status;
    verdict.rank = rank;

    info!(
        submission_id,
        challenge_id = sub.challenge_id,
        participation_id = sub.participation_id,
        status = %status,
        rank = ?rank,
        "Submission verified"
    );

    Ok(verdict)
}

async fn judge(
    txn: &DatabaseTransaction,
    sub: &submission::Model,
    instance: game_instance::Model,
    challenge: challenge::Model,
) -> Result<(AnswerStatus, BloodRank), EngineError> {
    if !answer_matches(txn, &challenge, &instance, &sub.answer).await? {
        return Ok((AnswerStatus::WrongAnswer, BloodRank::Unaccepted));
    }

    if instance.is_solved {
        return Ok((AnswerStatus::Accepted, BloodRank::Normal));
    }

    let game = game::Entity::find_by_id(sub.game_id)
        .one(txn)
        .await?
        .ok_or_else(|| EngineError::not_found(format!("game {}", sub.game_id)))?;

    if sub.submit_time >= game.end_time {
        return Ok((AnswerStatus::Accepted, BloodRank::Normal));
    }

    let locked = challenge::Entity::find_by_id(challenge.id)
        .lock(LockType::Update)
        .one(txn)
        .await?
        .ok_or_else(|| EngineError::not_found(format!("challenge {}", challenge.id)))?;

    let accepted_count = locked.accepted_count + 1;
    challenge::ActiveModel {
        id: Set(locked.id),
        accepted_count: Set(accepted_count),
        ..Default::default()
    }
    .update(txn)
    .await?;

    game_instance::ActiveModel {
        id: Set(instance.id),
        is_solved: Set(true),
        ..Default::default()
    }
    .update(txn)
    .await?;

    Ok((
        AnswerStatus::Accepted,
        BloodRank::from_solve_order(accepted_count),
    ))
}
