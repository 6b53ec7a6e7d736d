use axum::Json;
use axum::extract::{Path, State};
use sea_orm::*;
use tracing::instrument;

use crate::engine;
use crate::entity::container;
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::models::game::ChallengeInstanceResponse;
use crate::state::AppState;
use crate::utils::game::{ensure_accepted, ensure_started, find_game, find_user_participation};

#[utoipa::path(
    get,
    path = "/{id}/challenges/{challenge_id}",
    tag = "Challenges",
    operation_id = "getChallengeInstance",
    summary = "Get a challenge for the caller's team",
    description = "Returns the caller's instance of the challenge, dispatching its flag on first access. Dynamic-attachment challenges fail with `FLAG_POOL_EXHAUSTED` when no unclaimed flag is left.",
    params(
        ("id" = i32, Path, description = "Game ID"),
        ("challenge_id" = i32, Path, description = "Challenge ID"),
    ),
    responses(
        (status = 200, description = "Challenge instance", body = ChallengeInstanceResponse),
        (status = 400, description = "Game not started or participation not accepted (OPERATION_DENIED)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Not participating or no instance (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Flag pool exhausted (FLAG_POOL_EXHAUSTED)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = auth_user.user_id))]
pub async fn get_challenge_instance(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path((game_id, challenge_id)): Path<(i32, i32)>,
) -> Result<Json<ChallengeInstanceResponse>, AppError> {
    let game = find_game(&state.db, game_id).await?;
    ensure_started(&game)?;
    let participation = find_user_participation(&state.db, game_id, auth_user.user_id).await?;
    ensure_accepted(&participation)?;

    let loaded = engine::get_instance(&state.db, participation.id, challenge_id).await?;

    let running = container::Entity::find()
        .filter(container::Column::InstanceId.eq(loaded.instance.id))
        .one(&state.db)
        .await?;

    Ok(Json(ChallengeInstanceResponse {
        challenge_id: loaded.challenge.id,
        score: loaded.challenge.current_score(),
        title: loaded.challenge.title,
        category: loaded.challenge.category,
        challenge_type: loaded.challenge.challenge_type,
        is_solved: loaded.instance.is_solved,
        attachment: loaded.flag.and_then(|f| f.attachment_ref),
        container: running.map(Into::into),
    }))
}
