use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::flag_check::FlagCheckJob;
use sea_orm::*;
use tracing::instrument;

use crate::engine::{self, SubmitAnswer};
use crate::entity::submission;
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::extractors::json::AppJson;
use crate::models::submission::{SubmissionResponse, SubmitAnswerRequest};
use crate::queue::enqueue_flag_check;
use crate::state::AppState;
use crate::utils::game::{find_game, find_user_participation};

#[utoipa::path(
    post,
    path = "/{id}/challenges/{challenge_id}/submissions",
    tag = "Submissions",
    operation_id = "submitAnswer",
    summary = "Submit an answer",
    description = "Records the answer as `Unchecked` and schedules its verification. Poll the returned submission for the verdict.",
    params(
        ("id" = i32, Path, description = "Game ID"),
        ("challenge_id" = i32, Path, description = "Challenge ID"),
    ),
    request_body = SubmitAnswerRequest,
    responses(
        (status = 202, description = "Answer accepted for checking", body = SubmissionResponse),
        (status = 400, description = "Validation error or game closed (VALIDATION_ERROR, OPERATION_DENIED)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Not participating or challenge not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user, payload), fields(user_id = auth_user.user_id))]
pub async fn submit_answer(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path((game_id, challenge_id)): Path<(i32, i32)>,
    AppJson(payload): AppJson<SubmitAnswerRequest>,
) -> Result<(StatusCode, Json<SubmissionResponse>), AppError> {
    payload.validate()?;

    find_game(&state.db, game_id).await?;
    let participation = find_user_participation(&state.db, game_id, auth_user.user_id).await?;

    let mut row = engine::submit_answer(
        &state.db,
        SubmitAnswer {
            game_id,
            challenge_id,
            participation_id: participation.id,
            user_id: auth_user.user_id,
            answer: payload.answer,
        },
    )
    .await?;

    let queued = match &state.mq {
        Some(mq) => {
            let job = FlagCheckJob::new(row.id, game_id);
            enqueue_flag_check(mq, &state.config.mq.queue_name, &job).await
        }
        None => false,
    };

    // Unqueued answers are checked before responding.
    if !queued {
        let verdict = state.checker.check(row.id).await?;
        row.status = verdict.status;
    }

    Ok((StatusCode::ACCEPTED, Json(row.into())))
}

#[utoipa::path(
    get,
    path = "/{id}/challenges/{challenge_id}/submissions/{submission_id}",
    tag = "Submissions",
    operation_id = "getSubmission",
    summary = "Get the status of one of the team's submissions",
    params(
        ("id" = i32, Path, description = "Game ID"),
        ("challenge_id" = i32, Path, description = "Challenge ID"),
        ("submission_id" = i32, Path, description = "Submission ID"),
    ),
    responses(
        (status = 200, description = "Submission", body = SubmissionResponse),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Submission not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = auth_user.user_id))]
pub async fn get_submission(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path((game_id, challenge_id, submission_id)): Path<(i32, i32, i32)>,
) -> Result<Json<SubmissionResponse>, AppError> {
    let participation = find_user_participation(&state.db, game_id, auth_user.user_id).await?;

    let row = submission::Entity::find_by_id(submission_id)
        .filter(submission::Column::GameId.eq(game_id))
        .filter(submission::Column::ChallengeId.eq(challenge_id))
        .filter(submission::Column::ParticipationId.eq(participation.id))
        .one(&state.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Submission not found".into()))?;

    Ok(Json(row.into()))
}
