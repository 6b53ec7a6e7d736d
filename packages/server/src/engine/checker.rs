use std::sync::Arc;

use chrono::Utc;
use common::event::{GameEvent, game_channel};
use common::{AnswerStatus, ParticipationStatus};
use sea_orm::*;
use tracing::{info, instrument};

use crate::entity::{challenge, game, participation, submission};
use crate::notify::{EventSink, EventSinkExt};

use super::cheat::check_cheat;
use super::error::EngineError;
use super::scoreboard::ScoreboardService;
use super::verifier::{Verdict, verify_answer};

/// A team member's answer for one challenge.
#[derive(Debug, Clone)]
pub struct SubmitAnswer {
    pub game_id: i32,
    pub challenge_id: i32,
    pub participation_id: i32,
    pub user_id: i32,
    pub answer: String,
}

/// Store an answer as `Unchecked`.
///
/// The game must have started and, unless it runs in practice mode, not yet ended.
#[instrument(skip(db, request), fields(game_id = request.game_id, challenge_id = request.challenge_id))]
pub async fn submit_answer(
    db: &DatabaseConnection,
    request: SubmitAnswer,
) -> Result<submission::Model, EngineError> {
    let game = game::Entity::find_by_id(request.game_id)
        .one(db)
        .await?
        .ok_or_else(|| EngineError::not_found(format!("game {}", request.game_id)))?;

    let now = Utc::now();
    if now < game.start_time {
        return Err(EngineError::denied("the game has not started"));
    }
    if now >= game.end_time && !game.practice_mode {
        return Err(EngineError::denied("the game has ended"));
    }

    let participation = participation::Entity::find_by_id(request.participation_id)
        .filter(participation::Column::GameId.eq(game.id))
        .one(db)
        .await?
        .ok_or_else(|| EngineError::not_found("participation"))?;
    if participation.status != ParticipationStatus::Accepted {
        return Err(EngineError::denied("participation is not accepted"));
    }

    challenge::Entity::find_by_id(request.challenge_id)
        .filter(challenge::Column::GameId.eq(game.id))
        .filter(challenge::Column::IsEnabled.eq(true))
        .one(db)
        .await?
        .ok_or_else(|| EngineError::not_found(format!("challenge {}", request.challenge_id)))?;

    let row = submission::ActiveModel {
        game_id: Set(game.id),
        challenge_id: Set(request.challenge_id),
        participation_id: Set(participation.id),
        team_id: Set(participation.team_id),
        user_id: Set(request.user_id),
        answer: Set(request.answer.trim().to_string()),
        status: Set(AnswerStatus::Unchecked),
        submit_time: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!(
        submission_id = row.id,
        participation_id = row.participation_id,
        user_id = row.user_id,
        "Answer submitted"
    );
    Ok(row)
}

/// Ids of submissions still waiting for verification, oldest first.
pub async fn unchecked_submissions(db: &DatabaseConnection) -> Result<Vec<(i32, i32)>, DbErr> {
    submission::Entity::find()
        .select_only()
        .column(submission::Column::Id)
        .column(submission::Column::GameId)
        .filter(submission::Column::Status.eq(AnswerStatus::Unchecked))
        .order_by_asc(submission::Column::Id)
        .into_tuple()
        .all(db)
        .await
}

/// Runs verification, leak detection and their side effects for one submission.
pub struct FlagChecker {
    db: DatabaseConnection,
    scoreboard: Arc<ScoreboardService>,
    events: Arc<dyn EventSink>,
}

impl FlagChecker {
    pub fn new(
        db: DatabaseConnection,
        scoreboard: Arc<ScoreboardService>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            db,
            scoreboard,
            events,
        }
    }

    /// Verify a submission and apply its side effects.
    ///
    /// Leak detection and scoreboard invalidation also run for a submission that was verified
    /// earlier, so a retry after a failed side effect completes it. Blood events are only
    /// published by the call that recorded the solve.
    #[instrument(skip(self))]
    pub async fn check(&self, submission_id: i32) -> Result<Verdict, EngineError> {
        let mut verdict = verify_answer(&self.db, submission_id).await?;

        let dynamic = verdict.challenge_type.is_some_and(|t| t.is_dynamic());
        if verdict.status == AnswerStatus::WrongAnswer && dynamic {
            let info = check_cheat(&self.db, submission_id).await?;
            if let Some(cheat) = info.cheat {
                verdict.status = AnswerStatus::CheatDetected;
                self.events.publish_event(
                    &game_channel(verdict.game_id),
                    &GameEvent::CheatDetected {
                        game_id: verdict.game_id,
                        challenge_id: verdict.challenge_id,
                        submission_id,
                        submit_participation_id: cheat.submit_participation_id,
                        source_participation_id: cheat.source_participation_id,
                    },
                );
            }
        }

        if verdict.status.is_accepted() {
            self.scoreboard.invalidate(verdict.game_id).await?;
        }

        if verdict.rank.is_blood() {
            self.events.publish_event(
                &game_channel(verdict.game_id),
                &GameEvent::NewBlood {
                    game_id: verdict.game_id,
                    challenge_id: verdict.challenge_id,
                    participation_id: verdict.participation_id,
                    rank: verdict.rank,
                    submit_time: verdict.submit_time,
                },
            );
        }

        Ok(verdict)
    }
}
