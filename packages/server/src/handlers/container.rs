use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use tracing::instrument;

use crate::error::{AppError, ErrorBody};
use crate::extractors::auth::AuthUser;
use crate::models::container::ContainerResponse;
use crate::state::AppState;
use crate::utils::game::{ensure_accepted, ensure_open, find_game, find_user_participation};

#[utoipa::path(
    post,
    path = "/{id}/challenges/{challenge_id}/container",
    tag = "Containers",
    operation_id = "createContainer",
    summary = "Start the challenge container",
    description = "Starts a container for the caller's team with its flag injected. Returns the existing container if one is already running. When the team is at the game's container limit, the oldest container is destroyed or the request is refused, depending on deployment policy.",
    params(
        ("id" = i32, Path, description = "Game ID"),
        ("challenge_id" = i32, Path, description = "Challenge ID"),
    ),
    responses(
        (status = 201, description = "Container running", body = ContainerResponse),
        (status = 400, description = "Refused by policy (OPERATION_DENIED)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "Not participating or no instance (NOT_FOUND)", body = ErrorBody),
        (status = 409, description = "Flag pool exhausted (FLAG_POOL_EXHAUSTED)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = auth_user.user_id))]
pub async fn create_container(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path((game_id, challenge_id)): Path<(i32, i32)>,
) -> Result<(StatusCode, Json<ContainerResponse>), AppError> {
    let game = find_game(&state.db, game_id).await?;
    ensure_open(&game)?;
    let participation = find_user_participation(&state.db, game_id, auth_user.user_id).await?;
    ensure_accepted(&participation)?;

    let container = state
        .containers
        .create_container(participation.id, challenge_id, auth_user.user_id)
        .await?;

    Ok((StatusCode::CREATED, Json(container.into())))
}

#[utoipa::path(
    delete,
    path = "/{id}/challenges/{challenge_id}/container",
    tag = "Containers",
    operation_id = "destroyContainer",
    summary = "Stop the challenge container",
    params(
        ("id" = i32, Path, description = "Game ID"),
        ("challenge_id" = i32, Path, description = "Challenge ID"),
    ),
    responses(
        (status = 204, description = "Container destroyed"),
        (status = 400, description = "Operation too frequent (OPERATION_DENIED)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "No container (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = auth_user.user_id))]
pub async fn destroy_container(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path((game_id, challenge_id)): Path<(i32, i32)>,
) -> Result<StatusCode, AppError> {
    find_game(&state.db, game_id).await?;
    let participation = find_user_participation(&state.db, game_id, auth_user.user_id).await?;

    state
        .containers
        .destroy_for_instance(participation.id, challenge_id)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    post,
    path = "/{id}/challenges/{challenge_id}/container/extend",
    tag = "Containers",
    operation_id = "extendContainer",
    summary = "Extend the challenge container's lifetime",
    description = "Pushes back the container's expected stop time. Only allowed close to expiry.",
    params(
        ("id" = i32, Path, description = "Game ID"),
        ("challenge_id" = i32, Path, description = "Challenge ID"),
    ),
    responses(
        (status = 200, description = "Container extended", body = ContainerResponse),
        (status = 400, description = "Outside the renewal window (OPERATION_DENIED)", body = ErrorBody),
        (status = 401, description = "Unauthorized (TOKEN_MISSING, TOKEN_INVALID)", body = ErrorBody),
        (status = 404, description = "No container (NOT_FOUND)", body = ErrorBody),
    ),
    security(("jwt" = [])),
)]
#[instrument(skip(state, auth_user), fields(user_id = auth_user.user_id))]
pub async fn extend_container(
    auth_user: AuthUser,
    State(state): State<AppState>,
    Path((game_id, challenge_id)): Path<(i32, i32)>,
) -> Result<Json<ContainerResponse>, AppError> {
    let game = find_game(&state.db, game_id).await?;
    ensure_open(&game)?;
    let participation = find_user_participation(&state.db, game_id, auth_user.user_id).await?;

    let container = state
        .containers
        .prolong_for_instance(participation.id, challenge_id)
        .await?;

    Ok(Json(container.into()))
}
