use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use tracing::{info, instrument};

use crate::engine;
use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::{AuthUser, GAME_MANAGE};
use crate::models::admin::CheatInfoResponse;
use crate::state::AppState;
use crate::utils::game::find_game;

#[utoipa::path(
    post,
    path = "/games/{id}/scoreboard/flush",
    tag = "Admin",
    operation_id = "flushScoreboard",
    summary = "Drop the cached scoreboard",
    params(("id" = i32, Path, description = "Game ID")),
    responses(
        (status = 204, description = "Cache flushed"),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Missing game:manage (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Game not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = auth_user.user_id))]
pub async fn flush_scoreboard(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(game_id): Path<i32>,
) -> Result<StatusCode, AppError> {
    auth_user.require_permission(GAME_MANAGE)?;
    find_game(&state.db, game_id).await?;

    state.scoreboard.invalidate(game_id).await?;
    info!(game_id, "Scoreboard flushed by admin");

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    get,
    path = "/games/{id}/cheat-info",
    tag = "Admin",
    operation_id = "listCheatInfo",
    summary = "List detected flag leaks",
    params(("id" = i32, Path, description = "Game ID")),
    responses(
        (status = 200, description = "Cheat records, newest first", body = Vec<CheatInfoResponse>),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 403, description = "Missing game:manage (PERMISSION_DENIED)", body = ErrorBody),
        (status = 404, description = "Game not found (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = auth_user.user_id))]
pub async fn list_cheat_info(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path(game_id): Path<i32>,
) -> Result<Json<Vec<CheatInfoResponse>>, AppError> {
    auth_user.require_permission(GAME_MANAGE)?;
    find_game(&state.db, game_id).await?;

    let rows = engine::list_cheat_info(&state.db, game_id).await?;
    Ok(Json(rows.into_iter().map(Into::into).collect()))
}
